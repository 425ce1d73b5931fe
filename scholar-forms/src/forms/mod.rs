//! Form lifecycle
//!
//! A form moves `draft --save--> draft`, `any --prepare_preview--> any` and
//! `any --publish--> active`. Working content is what the editor writes;
//! preview and published are copies taken at those transitions. Every
//! operation except creation is owner-only.

pub mod slug;

use scholar_common::content::renumber;
use scholar_common::models::{
    ContentStage, Form, FormBasics, FormContent, FormKind, FormResponse, FormSettings, FormStatus,
    StagedContent,
};
use scholar_common::{time, Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;

/// A form together with its renumbered working content
#[derive(Debug, Clone, Serialize)]
pub struct EditorForm {
    pub form: Form,
    pub content: FormContent,
}

/// Load a form and check that `requester_id` owns it
pub async fn load_owned(pool: &SqlitePool, form_id: Uuid, requester_id: Uuid) -> Result<Form> {
    let form = db::forms::get_form(pool, form_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("form {}", form_id)))?;
    if !form.is_owned_by(requester_id) {
        return Err(Error::Forbidden("only the form's creator may do this".to_string()));
    }
    Ok(form)
}

/// Create a draft form with empty working content
pub async fn create_form(pool: &SqlitePool, owner_id: Uuid, basics: FormBasics) -> Result<EditorForm> {
    let name = basics
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::validation("form name is required"))?
        .to_string();
    let kind = basics.kind.ok_or_else(|| Error::validation("form kind is required"))?;

    let slug = match basics.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(custom) => {
            let mut conn = pool.acquire().await?;
            claim_slug(&mut conn, custom, None).await?
        }
        None => slug::generate(&name),
    };

    let mut content = FormContent::default();
    if kind == FormKind::ParentsSurvey {
        content.ensure_identity_section();
    }

    let form = Form {
        id: Uuid::new_v4(),
        name,
        description: clean_optional(basics.description),
        kind,
        slug,
        status: FormStatus::Draft,
        settings: clean_settings(basics.settings.unwrap_or_default()),
        created_by: owner_id,
        created_at: time::now(),
        last_saved_at: None,
        last_published_at: None,
    };

    db::forms::insert_form(pool, &form, &content).await?;
    info!(form_id = %form.id, slug = %form.slug, kind = form.kind.as_str(), "Form created");

    Ok(EditorForm { form, content })
}

/// Update name, description, kind, slug and settings
pub async fn update_basics(
    pool: &SqlitePool,
    form_id: Uuid,
    requester_id: Uuid,
    basics: FormBasics,
) -> Result<Form> {
    let mut form = load_owned(pool, form_id, requester_id).await?;
    let mut tx = pool.begin().await?;

    apply_basics(&mut tx, &mut form, basics).await?;
    db::forms::update_form(&mut tx, &form).await?;

    tx.commit().await?;
    info!(form_id = %form.id, "Form basics updated");
    Ok(form)
}

/// Validate, normalise and overwrite the working content. Does not renumber.
pub async fn update_working_content(
    pool: &SqlitePool,
    form_id: Uuid,
    requester_id: Uuid,
    mut content: FormContent,
) -> Result<Form> {
    let mut form = load_owned(pool, form_id, requester_id).await?;
    validate_content(&mut content)?;

    form.last_saved_at = Some(time::now());

    let mut tx = pool.begin().await?;
    db::forms::upsert_content(&mut tx, form.id, &StagedContent::new(ContentStage::Working, content))
        .await?;
    db::forms::update_form(&mut tx, &form).await?;
    tx.commit().await?;

    debug!(form_id = %form.id, "Working content saved");
    Ok(form)
}

/// Copy working content into the preview stage
pub async fn prepare_preview(pool: &SqlitePool, form_id: Uuid, requester_id: Uuid) -> Result<Form> {
    let mut form = load_owned(pool, form_id, requester_id).await?;
    let mut tx = pool.begin().await?;

    let working = db::forms::load_content(&mut tx, form.id, ContentStage::Working)
        .await?
        .unwrap_or_default();
    let staged = StagedContent::new(ContentStage::Working, working).copy_to(ContentStage::Preview);
    db::forms::upsert_content(&mut tx, form.id, &staged).await?;

    form.last_saved_at = Some(time::now());
    db::forms::update_form(&mut tx, &form).await?;
    tx.commit().await?;

    info!(
        form_id = %form.id,
        questions = staged.content.questions.len(),
        "Preview prepared"
    );
    Ok(form)
}

/// Publish the preview snapshot, or the working content when no non-empty
/// preview exists. Optional basics are applied first.
pub async fn publish(
    pool: &SqlitePool,
    form_id: Uuid,
    requester_id: Uuid,
    basics: Option<FormBasics>,
) -> Result<Form> {
    let mut form = load_owned(pool, form_id, requester_id).await?;
    let mut tx = pool.begin().await?;

    if let Some(basics) = basics {
        apply_basics(&mut tx, &mut form, basics).await?;
    }

    let preview = db::forms::load_content(&mut tx, form.id, ContentStage::Preview)
        .await?
        .filter(|c| !c.is_empty());
    let source = match preview {
        Some(content) => StagedContent::new(ContentStage::Preview, content),
        None => {
            let working = db::forms::load_content(&mut tx, form.id, ContentStage::Working)
                .await?
                .unwrap_or_default();
            StagedContent::new(ContentStage::Working, working)
        }
    };
    let published = source.copy_to(ContentStage::Published);
    db::forms::upsert_content(&mut tx, form.id, &published).await?;

    form.status = FormStatus::Active;
    form.last_published_at = Some(time::now());
    db::forms::update_form(&mut tx, &form).await?;
    tx.commit().await?;

    info!(
        form_id = %form.id,
        source = source.stage.as_str(),
        questions = published.content.questions.len(),
        "Form published"
    );
    Ok(form)
}

/// Hard delete of the form and its snapshots. Responses are kept.
pub async fn delete_form(pool: &SqlitePool, form_id: Uuid, requester_id: Uuid) -> Result<()> {
    let form = load_owned(pool, form_id, requester_id).await?;
    db::forms::delete_form(pool, form.id).await?;
    info!(form_id = %form.id, "Form deleted");
    Ok(())
}

/// Form plus working content, renumbered so legacy gaps are healed on load
pub async fn load_for_editor(pool: &SqlitePool, form_id: Uuid, requester_id: Uuid) -> Result<EditorForm> {
    let form = load_owned(pool, form_id, requester_id).await?;
    let mut content = db::forms::fetch_content(pool, form.id, ContentStage::Working)
        .await?
        .unwrap_or_default();
    renumber(&mut content);
    Ok(EditorForm { form, content })
}

/// The requester's forms, newest first
pub async fn list_forms(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Form>> {
    db::forms::list_forms_by_owner(pool, owner_id).await
}

pub async fn list_responses(
    pool: &SqlitePool,
    form_id: Uuid,
    requester_id: Uuid,
) -> Result<Vec<FormResponse>> {
    let form = load_owned(pool, form_id, requester_id).await?;
    db::responses::list_responses(pool, form.id).await
}

/// Apply supplied basics to `form` in place. Switching the kind to a parents
/// survey adds the identity section to the working content.
async fn apply_basics(
    conn: &mut SqliteConnection,
    form: &mut Form,
    basics: FormBasics,
) -> Result<()> {
    if let Some(name) = basics.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("form name cannot be empty"));
        }
        form.name = name.to_string();
    }
    if basics.description.is_some() {
        form.description = clean_optional(basics.description);
    }
    if let Some(custom) = basics.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        if custom.trim().to_ascii_lowercase() != form.slug {
            form.slug = claim_slug(&mut *conn, custom, Some(form.id)).await?;
        }
    }
    if let Some(settings) = basics.settings {
        form.settings = clean_settings(settings);
    }
    if let Some(kind) = basics.kind {
        form.kind = kind;
        if kind == FormKind::ParentsSurvey {
            let mut working = db::forms::load_content(&mut *conn, form.id, ContentStage::Working)
                .await?
                .unwrap_or_default();
            if working.ensure_identity_section() {
                let staged = StagedContent::new(ContentStage::Working, working);
                db::forms::upsert_content(&mut *conn, form.id, &staged).await?;
                info!(form_id = %form.id, "Identity verification section added");
            }
        }
    }
    Ok(())
}

/// Validate a requested slug and make sure no other form holds it
async fn claim_slug(
    conn: &mut SqliteConnection,
    raw: &str,
    except: Option<Uuid>,
) -> Result<String> {
    let slug = slug::validate(raw)?;
    if db::forms::slug_taken(conn, &slug, except).await? {
        return Err(Error::Conflict(format!("slug '{}' is already in use", slug)));
    }
    Ok(slug)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_settings(mut settings: FormSettings) -> FormSettings {
    let mut seen = HashSet::new();
    settings.selected_respondents = settings
        .selected_respondents
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.to_ascii_lowercase()))
        .collect();
    settings
}

/// Normalise every question and reject content with shape problems
pub fn validate_content(content: &mut FormContent) -> Result<()> {
    let mut problems = Vec::new();

    let mut section_ids = HashSet::new();
    for section in &content.sections {
        if section.id.trim().is_empty() || !section_ids.insert(section.id.as_str()) {
            problems.push(format!("section '{}' has a missing or duplicate id", section.title));
        }
    }

    let mut question_ids = HashSet::new();
    for (index, question) in content.questions.iter_mut().enumerate() {
        question.normalize();
        if question.id.trim().is_empty() || !question_ids.insert(question.id.clone()) {
            problems.push(format!("question {}: missing or duplicate id", index + 1));
        }
        for problem in question.problems() {
            problems.push(format!("question {}: {}", index + 1, problem));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(problems.join("; ")))
    }
}
