//! Bulk import of students, form questions and form respondents
//!
//! An upload is parsed into a table, every row is mapped and validated, and
//! only valid rows are committed. Commits run row by row: a failing row is
//! logged and reported, never fatal to the rest of the file.

pub mod headers;
pub mod rows;
pub mod source;

use scholar_common::models::{
    ContentStage, FormBasics, FormContent, Question, Respondent, Student, StudentInput,
};
use scholar_common::{time, Error};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{db, forms};
use rows::{RowData, RowOutcome};
use source::Table;

/// Rows shown in an import preview
pub const PREVIEW_SAMPLE_ROWS: usize = 5;

/// Row errors listed in a commit result; the rest are only counted
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Whole-request import failures
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Unreadable(String),

    #[error("file contains no data rows")]
    NoDataRows,

    #[error("missing required column(s): {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    #[error(transparent)]
    Common(#[from] Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Questions,
    Respondents,
    Students,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Questions => "questions",
            ImportKind::Respondents => "respondents",
            ImportKind::Students => "students",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "questions" => Some(ImportKind::Questions),
            "respondents" => Some(ImportKind::Respondents),
            "students" => Some(ImportKind::Students),
            _ => None,
        }
    }

    /// Question and respondent imports write into an existing form
    pub fn needs_form(&self) -> bool {
        !matches!(self, ImportKind::Students)
    }
}

/// Problems of one row, by source line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub kind: ImportKind,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub headers: Vec<String>,
    pub sample: Vec<Value>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub kind: ImportKind,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub committed: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub more_errors: usize,
}

/// Parsed and validated upload
#[derive(Debug, Clone)]
pub struct Analysis {
    pub kind: ImportKind,
    pub headers: Vec<String>,
    pub rows: Vec<RowOutcome>,
}

impl Analysis {
    pub fn valid_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_valid()).count()
    }

    fn row_errors(&self) -> Vec<RowError> {
        self.rows
            .iter()
            .filter(|r| !r.is_valid())
            .map(|r| RowError {
                row: r.line,
                messages: r.errors.clone(),
            })
            .collect()
    }

    fn valid_rows(&self) -> impl Iterator<Item = (usize, &RowData)> {
        self.rows
            .iter()
            .filter(|r| r.is_valid())
            .filter_map(|r| r.data.as_ref().map(|d| (r.line, d)))
    }
}

/// Map and validate every row of a table
pub fn analyze_table(kind: ImportKind, table: Table) -> Result<Analysis, ImportError> {
    let rows = match kind {
        ImportKind::Students => rows::student_rows(&table)?,
        ImportKind::Questions => rows::question_rows(&table)?,
        ImportKind::Respondents => rows::respondent_rows(&table)?,
    };
    Ok(Analysis {
        kind,
        headers: table.headers,
        rows,
    })
}

pub fn analyze(kind: ImportKind, filename: &str, bytes: &[u8]) -> Result<Analysis, ImportError> {
    analyze_table(kind, source::read_table(filename, bytes)?)
}

/// Dry run: counts, a sample of mapped rows and every row error
pub fn preview(kind: ImportKind, filename: &str, bytes: &[u8]) -> Result<ImportPreview, ImportError> {
    let analysis = analyze(kind, filename, bytes)?;
    let valid = analysis.valid_count();

    let sample = analysis
        .rows
        .iter()
        .take(PREVIEW_SAMPLE_ROWS)
        .map(|r| {
            json!({
                "row": r.line,
                "valid": r.is_valid(),
                "data": r.data,
                "errors": r.errors,
            })
        })
        .collect();

    Ok(ImportPreview {
        kind,
        total: analysis.rows.len(),
        valid,
        invalid: analysis.rows.len() - valid,
        errors: analysis.row_errors(),
        headers: analysis.headers,
        sample,
    })
}

/// Parse, validate and commit an upload
pub async fn commit(
    pool: &SqlitePool,
    kind: ImportKind,
    filename: &str,
    bytes: &[u8],
    requester_id: Uuid,
    form_id: Option<Uuid>,
) -> Result<ImportResult, ImportError> {
    let analysis = analyze(kind, filename, bytes)?;
    commit_analysis(pool, &analysis, requester_id, form_id).await
}

/// Commit the valid rows of an analysis
pub async fn commit_analysis(
    pool: &SqlitePool,
    analysis: &Analysis,
    requester_id: Uuid,
    form_id: Option<Uuid>,
) -> Result<ImportResult, ImportError> {
    let form_id = if analysis.kind.needs_form() {
        Some(form_id.ok_or_else(|| {
            Error::validation(format!("form_id is required for {} imports", analysis.kind.as_str()))
        })?)
    } else {
        None
    };

    let failures = match (analysis.kind, form_id) {
        (ImportKind::Students, _) => commit_students(pool, analysis).await,
        (ImportKind::Questions, Some(form_id)) => {
            commit_questions(pool, analysis, form_id, requester_id).await?
        }
        (ImportKind::Respondents, Some(form_id)) => {
            commit_respondents(pool, analysis, form_id, requester_id).await?
        }
        (_, None) => Vec::new(),
    };

    let valid = analysis.valid_count();
    let failed = failures.len();
    let mut errors = analysis.row_errors();
    errors.extend(failures);
    let more_errors = errors.len().saturating_sub(MAX_REPORTED_ERRORS);
    errors.truncate(MAX_REPORTED_ERRORS);

    let result = ImportResult {
        kind: analysis.kind,
        total: analysis.rows.len(),
        valid,
        invalid: analysis.rows.len() - valid,
        committed: valid - failed,
        failed,
        errors,
        more_errors,
    };

    info!(
        kind = analysis.kind.as_str(),
        rows = result.total,
        committed = result.committed,
        invalid = result.invalid,
        failed = result.failed,
        "Import committed"
    );
    Ok(result)
}

/// Upsert each valid row by external identifier; returns per-row failures
async fn commit_students(pool: &SqlitePool, analysis: &Analysis) -> Vec<RowError> {
    let mut failures = Vec::new();
    for (line, data) in analysis.valid_rows() {
        let RowData::Student(input) = data else {
            continue;
        };
        if let Err(e) = upsert_student(pool, input).await {
            warn!(row = line, error = %e, "Student row failed to import");
            failures.push(RowError {
                row: line,
                messages: vec![e.to_string()],
            });
        }
    }
    failures
}

/// Create or merge one student, keyed on its external identifier
pub async fn upsert_student(pool: &SqlitePool, input: &StudentInput) -> scholar_common::Result<Student> {
    let student_id = input
        .external_id()
        .ok_or_else(|| Error::validation("BC No. (student id) is required"))?
        .to_string();
    let now = time::now();

    let student = match db::students::find_by_external_id(pool, &student_id).await? {
        Some(mut existing) => {
            existing.merge(input, now);
            existing
        }
        None => Student::from_input(student_id, input, now),
    };
    db::students::save_student(pool, &student).await?;
    Ok(student)
}

/// Append each valid question to its section and save the working content
async fn commit_questions(
    pool: &SqlitePool,
    analysis: &Analysis,
    form_id: Uuid,
    requester_id: Uuid,
) -> Result<Vec<RowError>, ImportError> {
    let form = forms::load_owned(pool, form_id, requester_id).await?;
    let mut content = db::forms::fetch_content(pool, form.id, ContentStage::Working)
        .await?
        .unwrap_or_default();

    let mut failures = Vec::new();
    for (line, data) in analysis.valid_rows() {
        let RowData::Question { question, section } = data else {
            continue;
        };
        if let Err(e) = append_question(&mut content, question.clone(), section.as_deref()) {
            warn!(row = line, form_id = %form.id, error = %e, "Question row failed to import");
            failures.push(RowError {
                row: line,
                messages: vec![e.to_string()],
            });
        }
    }

    forms::update_working_content(pool, form.id, requester_id, content).await?;
    Ok(failures)
}

/// Place a question in the section titled `section_title` (case-insensitive),
/// or the first standard section. Missing sections are created.
pub fn append_question(
    content: &mut FormContent,
    mut question: Question,
    section_title: Option<&str>,
) -> scholar_common::Result<String> {
    let section_id = match section_title {
        Some(title) => {
            let existing = content
                .sections
                .iter()
                .find(|s| !s.is_identity() && s.title.trim().eq_ignore_ascii_case(title.trim()))
                .map(|s| s.id.clone());
            existing.unwrap_or_else(|| content.add_section(title.trim()))
        }
        None => match content.first_standard_section() {
            Some(section) => section.id.clone(),
            None => content.add_section("Section 1"),
        },
    };

    // Imported rows always get fresh ids
    question.id = Uuid::new_v4().to_string();
    content.add_question(question, Some(&section_id))
}

/// Merge valid rows into the form's respondent list, one entry per email
async fn commit_respondents(
    pool: &SqlitePool,
    analysis: &Analysis,
    form_id: Uuid,
    requester_id: Uuid,
) -> Result<Vec<RowError>, ImportError> {
    let form = forms::load_owned(pool, form_id, requester_id).await?;
    let mut settings = form.settings.clone();

    for (_, data) in analysis.valid_rows() {
        if let RowData::Respondent(respondent) = data {
            merge_respondent(&mut settings.respondents, respondent.clone());
        }
    }

    let basics = FormBasics {
        settings: Some(settings),
        ..Default::default()
    };
    forms::update_basics(pool, form.id, requester_id, basics).await?;
    Ok(Vec::new())
}

/// Insert or update by lower-cased email; later rows win on the name
pub fn merge_respondent(list: &mut Vec<Respondent>, respondent: Respondent) {
    let key = respondent.email.trim().to_lowercase();
    match list.iter_mut().find(|r| r.email.trim().to_lowercase() == key) {
        Some(existing) => existing.name = respondent.name,
        None => list.push(Respondent {
            name: respondent.name,
            email: respondent.email.trim().to_string(),
        }),
    }
}
