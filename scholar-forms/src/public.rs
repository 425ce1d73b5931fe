//! Public form rendering, identifier lookup and response intake
//!
//! Nothing here requires a session except the owner preview. Drafts, reserved
//! slugs and forms without a published snapshot all look like missing forms.

use scholar_common::content::{renumber, section_number};
use scholar_common::models::{
    ContentStage, Form, FormContent, FormKind, FormResponse, FormStatus, Question, SectionKind,
    Student, SubmissionLimit,
};
use scholar_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::forms::slug;

/// Section as shown to respondents; the identity section is number 0
#[derive(Debug, Clone, Serialize)]
pub struct PublicSection {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub number: u32,
    pub kind: SectionKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicForm {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: FormKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub sections: Vec<PublicSection>,
    pub questions: Vec<Question>,
}

/// Build the respondent-facing projection of a form and one content snapshot
pub fn project(form: &Form, mut content: FormContent) -> PublicForm {
    renumber(&mut content);

    let sections = content
        .sections
        .iter()
        .map(|section| PublicSection {
            id: section.id.clone(),
            title: section.title.clone(),
            description: section.description.clone(),
            number: section_number(&content, &section.id).unwrap_or_default(),
            kind: section.kind,
        })
        .collect();

    PublicForm {
        id: form.id,
        name: form.name.clone(),
        description: form.description.clone(),
        kind: form.kind,
        welcome_message: form.settings.welcome_message.clone(),
        icon: form.settings.icon.clone(),
        deadline: form.settings.deadline,
        sections,
        questions: content.questions,
    }
}

async fn find_by_public_slug(pool: &SqlitePool, raw_slug: &str) -> Result<Form> {
    let slug = raw_slug.trim().to_ascii_lowercase();
    let not_found = || Error::not_found(format!("form '{}'", raw_slug));

    if slug::is_reserved(&slug) {
        return Err(not_found());
    }
    db::forms::get_form_by_slug(pool, &slug).await?.ok_or_else(not_found)
}

/// Published projection of an active form
pub async fn get_public_form(pool: &SqlitePool, raw_slug: &str) -> Result<PublicForm> {
    let form = find_by_public_slug(pool, raw_slug).await?;
    if form.status != FormStatus::Active {
        return Err(Error::not_found(format!("form '{}'", raw_slug)));
    }

    let content = db::forms::fetch_content(pool, form.id, ContentStage::Published)
        .await?
        .ok_or_else(|| Error::not_found(format!("form '{}'", raw_slug)))?;
    Ok(project(&form, content))
}

/// Owner-only projection of the preview snapshot (working content when no
/// preview was prepared)
pub async fn get_preview_form(
    pool: &SqlitePool,
    raw_slug: &str,
    requester_id: Uuid,
) -> Result<PublicForm> {
    let form = find_by_public_slug(pool, raw_slug).await?;
    if !form.is_owned_by(requester_id) {
        return Err(Error::Forbidden("only the form's creator may preview it".to_string()));
    }

    let preview = db::forms::fetch_content(pool, form.id, ContentStage::Preview)
        .await?
        .filter(|c| !c.is_empty());
    let content = match preview {
        Some(content) => content,
        None => db::forms::fetch_content(pool, form.id, ContentStage::Working)
            .await?
            .unwrap_or_default(),
    };
    Ok(project(&form, content))
}

/// Identifiers as a comma-separated string or as a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Identifiers {
    Text(String),
    List(Vec<String>),
}

impl Identifiers {
    /// Trimmed, non-blank identifiers in input order
    pub fn values(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Identifiers::Text(text) => text.split(',').collect(),
            Identifiers::List(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupRequest {
    pub identifiers: Identifiers,
    #[serde(default)]
    pub form_id: Option<Uuid>,
    /// Identifiers the respondent has already added in this session
    #[serde(default)]
    pub already_added: Vec<String>,
}

/// What a respondent may learn about a matched student
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl From<Student> for StudentSummary {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            student_id: student.student_id,
            name: student.name,
            level: student.level,
            class_name: student.class_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LookupResult {
    pub found: Vec<StudentSummary>,
    pub not_found: Vec<String>,
    pub not_selected: Vec<String>,
    pub duplicates: Vec<String>,
}

/// Resolve identifiers against the roster.
///
/// Each distinct identifier ends up in exactly one of `found`, `not_found` or
/// `not_selected`. Repeats, within the request or of `already_added`, go to
/// `duplicates` instead. The allow-list only applies to parents surveys that
/// have one.
pub async fn lookup_students(pool: &SqlitePool, request: &LookupRequest) -> Result<LookupResult> {
    let allow_list: Option<HashSet<String>> = match request.form_id {
        Some(form_id) => {
            let form = db::forms::get_form(pool, form_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("form {}", form_id)))?;
            let selected = &form.settings.selected_respondents;
            (form.kind == FormKind::ParentsSurvey && !selected.is_empty())
                .then(|| selected.iter().map(|s| s.trim().to_lowercase()).collect())
        }
        None => None,
    };

    let mut seen: HashSet<String> = request
        .already_added
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    let mut result = LookupResult::default();
    for identifier in request.identifiers.values() {
        let key = identifier.to_lowercase();
        if !seen.insert(key.clone()) {
            result.duplicates.push(identifier);
            continue;
        }

        match db::students::find_by_external_id(pool, &identifier).await? {
            None => result.not_found.push(identifier),
            Some(_) if allow_list.as_ref().map_or(false, |allowed| !allowed.contains(&key)) => {
                result.not_selected.push(identifier)
            }
            Some(student) => result.found.push(student.into()),
        }
    }

    debug!(
        found = result.found.len(),
        not_found = result.not_found.len(),
        not_selected = result.not_selected.len(),
        duplicates = result.duplicates.len(),
        "Student lookup"
    );
    Ok(result)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub respondent_id: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Record a response against the published snapshot of an active form
pub async fn submit_response(
    pool: &SqlitePool,
    form_id: Uuid,
    request: SubmitRequest,
) -> Result<FormResponse> {
    let form = db::forms::get_form(pool, form_id)
        .await?
        .filter(|f| f.status == FormStatus::Active)
        .ok_or_else(|| Error::not_found(format!("form {}", form_id)))?;
    let mut published = db::forms::fetch_content(pool, form.id, ContentStage::Published)
        .await?
        .ok_or_else(|| Error::not_found(format!("form {}", form_id)))?;
    renumber(&mut published);

    let now = time::now();
    if form.settings.deadline.map_or(false, |deadline| now > deadline) {
        return Err(Error::validation("this form is closed; the deadline has passed"));
    }

    let known: HashSet<&str> = published.questions.iter().map(|q| q.id.as_str()).collect();
    let unknown: Vec<&str> = request
        .answers
        .keys()
        .map(String::as_str)
        .filter(|id| !known.contains(id))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Validation(format!(
            "answers reference unknown question(s): {}",
            unknown.join(", ")
        )));
    }

    let missing: Vec<u32> = published
        .questions
        .iter()
        .filter(|q| q.required)
        .filter(|q| request.answers.get(&q.id).map_or(true, is_blank))
        .map(|q| q.sequence)
        .collect();
    if !missing.is_empty() {
        let numbers: Vec<String> = missing.iter().map(u32::to_string).collect();
        return Err(Error::Validation(format!(
            "required question(s) unanswered: {}",
            numbers.join(", ")
        )));
    }

    let respondent_id = request
        .respondent_id
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if form.settings.submission_limit == SubmissionLimit::OncePerRespondent {
        let respondent = respondent_id
            .as_deref()
            .ok_or_else(|| Error::validation("a respondent identifier is required for this form"))?;
        if db::responses::count_by_respondent(pool, form.id, respondent).await? > 0 {
            return Err(Error::Conflict(
                "a response from this respondent was already recorded".to_string(),
            ));
        }
    }

    let response = FormResponse {
        id: Uuid::new_v4(),
        form_id: form.id,
        respondent_id,
        answers: request.answers,
        submitted_at: now,
    };
    db::responses::insert_response(pool, &response).await?;

    info!(form_id = %form.id, response_id = %response.id, "Response submitted");
    Ok(response)
}
