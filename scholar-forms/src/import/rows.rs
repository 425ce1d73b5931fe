//! Per-row mapping and validation for each import kind

use once_cell::sync::Lazy;
use regex::Regex;
use scholar_common::models::{
    Question, QuestionType, Respondent, StudentField, StudentInput, StudentStatus, RATING_SCALES,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::headers::{question_column, respondent_column, QuestionColumn, RespondentColumn, STUDENT_HEADERS};
use super::source::{Record, Table};
use super::ImportError;

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

pub fn is_email(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value)
}

/// Parse a spreadsheet boolean (true/false, yes/no, y/n, 1/0)
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Split an option cell on `|`, or on `,` when no pipe is present
pub fn split_options(value: &str) -> Vec<String> {
    let separator = if value.contains('|') { '|' } else { ',' };
    value
        .split(separator)
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mapped content of one data row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowData {
    Student(StudentInput),
    Question {
        question: Question,
        #[serde(skip_serializing_if = "Option::is_none")]
        section: Option<String>,
    },
    Respondent(Respondent),
}

/// One analysed row: what it mapped to and what is wrong with it
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub line: usize,
    pub data: Option<RowData>,
    pub errors: Vec<String>,
}

impl RowOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.data.is_some()
    }
}

/// Map every student row. Requires a header that maps to the external identifier.
pub fn student_rows(table: &Table) -> Result<Vec<RowOutcome>, ImportError> {
    let fields = STUDENT_HEADERS.map_headers(&table.headers);
    if !fields.contains(&Some(StudentField::StudentId)) {
        return Err(ImportError::MissingHeaders(vec!["BC No. (student id)".to_string()]));
    }

    Ok(table
        .records
        .iter()
        .map(|record| student_row(&table.headers, &fields, record))
        .collect())
}

fn student_row(headers: &[String], fields: &[Option<StudentField>], record: &Record) -> RowOutcome {
    let mut input = StudentInput::default();

    for (column, header) in headers.iter().enumerate() {
        let value = record.cell(column);
        if value.is_empty() {
            continue;
        }
        let filled = match fields[column] {
            Some(field) => input.fill(field, value),
            None => false,
        };
        if !filled {
            input
                .additional_data
                .insert(header.clone(), Value::String(value.to_string()));
        }
    }

    let mut errors = Vec::new();
    if input.external_id().is_none() {
        errors.push("BC No. (student id) is required".to_string());
    }
    if let Some(status) = input.get(StudentField::Status) {
        if StudentStatus::parse(status).is_none() {
            errors.push(format!(
                "status '{}' must be one of active, inactive, transferred, graduated",
                status
            ));
        }
    }
    if let Some(email) = input.get(StudentField::GuardianEmail) {
        if !is_email(email) {
            errors.push(format!("guardian email '{}' is not a valid email address", email));
        }
    }

    RowOutcome {
        line: record.line,
        data: Some(RowData::Student(input)),
        errors,
    }
}

/// Map every question row. Type, text and required columns are mandatory.
pub fn question_rows(table: &Table) -> Result<Vec<RowOutcome>, ImportError> {
    let mut columns: HashMap<QuestionColumn, usize> = HashMap::new();
    for (index, header) in table.headers.iter().enumerate() {
        if let Some(column) = question_column(header) {
            columns.entry(column).or_insert(index);
        }
    }

    let missing: Vec<String> = [
        (QuestionColumn::QuestionType, "question_type"),
        (QuestionColumn::QuestionText, "question_text"),
        (QuestionColumn::Required, "required"),
    ]
    .into_iter()
    .filter(|(column, _)| !columns.contains_key(column))
    .map(|(_, name)| name.to_string())
    .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingHeaders(missing));
    }

    Ok(table
        .records
        .iter()
        .map(|record| question_row(&columns, record))
        .collect())
}

fn question_row(columns: &HashMap<QuestionColumn, usize>, record: &Record) -> RowOutcome {
    let cell = |column: QuestionColumn| columns.get(&column).map_or("", |i| record.cell(*i));
    let mut errors = Vec::new();

    let type_cell = cell(QuestionColumn::QuestionType);
    let question_type = if type_cell.is_empty() {
        errors.push("question_type is required".to_string());
        None
    } else {
        let parsed = QuestionType::parse(type_cell);
        if parsed.is_none() {
            errors.push(format!("unknown question type '{}'", type_cell));
        }
        parsed
    };

    let text = cell(QuestionColumn::QuestionText);
    if text.is_empty() {
        errors.push("question_text is required".to_string());
    }

    let required_cell = cell(QuestionColumn::Required);
    let required = if required_cell.is_empty() {
        errors.push("required is missing".to_string());
        false
    } else {
        parse_bool(required_cell).unwrap_or_else(|| {
            errors.push(format!("required '{}' is not a yes/no value", required_cell));
            false
        })
    };

    let options = split_options(cell(QuestionColumn::Options));
    if question_type.map_or(false, |t| t.requires_options()) && options.is_empty() {
        errors.push("choice questions need options".to_string());
    }

    let scale_cell = cell(QuestionColumn::Scale);
    let mut scale = None;
    if question_type == Some(QuestionType::Rating) {
        match scale_cell.parse::<u8>() {
            Ok(value) if RATING_SCALES.contains(&value) => scale = Some(value),
            Ok(value) => errors.push(format!("rating scale must be 3, 5, 7 or 10 (got {})", value)),
            Err(_) if scale_cell.is_empty() => errors.push("rating questions need a scale".to_string()),
            Err(_) => errors.push(format!("rating scale '{}' is not a number", scale_cell)),
        }
    }

    let data = question_type.map(|question_type| {
        let mut question = Question::new(question_type, text);
        question.required = required;
        question.options = options;
        question.scale = scale;
        let description = cell(QuestionColumn::Description);
        if !description.is_empty() {
            question.description = Some(description.to_string());
        }
        question.normalize();

        let section = cell(QuestionColumn::Section);
        RowData::Question {
            question,
            section: (!section.is_empty()).then(|| section.to_string()),
        }
    });

    RowOutcome {
        line: record.line,
        data,
        errors,
    }
}

/// Map every respondent row. Name and email columns are mandatory.
pub fn respondent_rows(table: &Table) -> Result<Vec<RowOutcome>, ImportError> {
    let mut name_column = None;
    let mut email_column = None;
    for (index, header) in table.headers.iter().enumerate() {
        match respondent_column(header) {
            Some(RespondentColumn::Name) if name_column.is_none() => name_column = Some(index),
            Some(RespondentColumn::Email) if email_column.is_none() => email_column = Some(index),
            _ => {}
        }
    }

    let (name_column, email_column) = match (name_column, email_column) {
        (Some(name), Some(email)) => (name, email),
        (name, email) => {
            let mut missing = Vec::new();
            if name.is_none() {
                missing.push("name".to_string());
            }
            if email.is_none() {
                missing.push("email".to_string());
            }
            return Err(ImportError::MissingHeaders(missing));
        }
    };

    Ok(table
        .records
        .iter()
        .map(|record| {
            let name = record.cell(name_column);
            let email = record.cell(email_column);
            let mut errors = Vec::new();
            if name.is_empty() {
                errors.push("name is required".to_string());
            }
            if email.is_empty() {
                errors.push("email is required".to_string());
            } else if !is_email(email) {
                errors.push(format!("'{}' is not a valid email address", email));
            }
            RowOutcome {
                line: record.line,
                data: Some(RowData::Respondent(Respondent {
                    name: name.to_string(),
                    email: email.to_string(),
                })),
                errors,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            records: rows
                .iter()
                .enumerate()
                .map(|(i, cells)| Record {
                    line: i + 2,
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_bc_no_and_name_headers() {
        let rows = student_rows(&table(&["Bc No", "Name"], &[&["A1", "Jane"]])).unwrap();
        assert!(rows[0].is_valid());

        let Some(RowData::Student(input)) = &rows[0].data else {
            panic!("expected a student row");
        };
        assert_eq!(input.external_id(), Some("A1"));
        assert_eq!(input.name, None);
        assert_eq!(input.additional_data["Name"], Value::String("Jane".into()));
    }

    #[test]
    fn test_student_header_does_not_take_the_id_column() {
        let rows = student_rows(&table(&["Student", "BC No"], &[&["Jane Doe", "A1"]])).unwrap();
        assert!(rows[0].is_valid());

        let Some(RowData::Student(input)) = &rows[0].data else {
            panic!("expected a student row");
        };
        assert_eq!(input.external_id(), Some("A1"));
        assert_eq!(input.additional_data["Student"], Value::String("Jane Doe".into()));
    }

    #[test]
    fn test_second_synonym_column_goes_to_bag() {
        let rows = student_rows(&table(
            &["BC No", "Student ID", "Notes"],
            &[&["A1", "X9", ""]],
        ))
        .unwrap();
        let Some(RowData::Student(input)) = &rows[0].data else {
            panic!("expected a student row");
        };
        assert_eq!(input.external_id(), Some("A1"));
        assert_eq!(input.additional_data["Student ID"], Value::String("X9".into()));
        assert!(!input.additional_data.contains_key("Notes"));
    }

    #[test]
    fn test_first_non_empty_synonym_wins() {
        let rows = student_rows(&table(&["BC No", "Student ID"], &[&["", "X9"]])).unwrap();
        let Some(RowData::Student(input)) = &rows[0].data else {
            panic!("expected a student row");
        };
        assert_eq!(input.external_id(), Some("X9"));
        assert!(input.additional_data.is_empty());
    }

    #[test]
    fn test_student_row_without_id_is_invalid() {
        let rows = student_rows(&table(&["BC No", "Gender"], &[&["", "F"]])).unwrap();
        assert!(!rows[0].is_valid());
    }

    #[test]
    fn test_student_status_and_email_checked() {
        let rows = student_rows(&table(
            &["BC No", "Status", "Parent Email"],
            &[&["A1", "expelled", "not-an-email"], &["A2", "Graduated", "p@example.com"]],
        ))
        .unwrap();
        assert_eq!(rows[0].errors.len(), 2);
        assert!(rows[1].is_valid());
    }

    #[test]
    fn test_students_need_id_header() {
        assert!(matches!(
            student_rows(&table(&["Name"], &[&["Jane"]])),
            Err(ImportError::MissingHeaders(_))
        ));
    }

    #[test]
    fn test_question_rows() {
        let rows = question_rows(&table(
            &["Question Type", "Question Text", "Required", "Options", "Scale", "Section"],
            &[
                &["Multiple Choice", "Favourite day?", "yes", "Mon|Tue, Wed", "", "General"],
                &["rating", "Rate the term", "n", "", "7", ""],
                &["rating", "Rate lunch", "n", "", "4", ""],
                &["rating", "Rate sport", "n", "", "ten", ""],
                &["select", "Pick one", "maybe", "", "", ""],
                &["agreementScale", "I feel heard", "no", "", "", ""],
            ],
        ))
        .unwrap();

        assert!(rows[0].is_valid());
        let Some(RowData::Question { question, section }) = &rows[0].data else {
            panic!("expected a question row");
        };
        assert_eq!(question.options, vec!["Mon", "Tue, Wed"]);
        assert!(question.required);
        assert_eq!(section.as_deref(), Some("General"));

        assert!(rows[1].is_valid());
        assert!(!rows[2].is_valid());
        assert!(!rows[3].is_valid());
        assert_eq!(rows[4].errors.len(), 2);

        let Some(RowData::Question { question, .. }) = &rows[5].data else {
            panic!("expected a question row");
        };
        assert!(question.required);
        assert_eq!(question.options.len(), 4);
    }

    #[test]
    fn test_question_rows_missing_headers() {
        let err = question_rows(&table(&["Question Text"], &[&["Hi"]])).unwrap_err();
        match err {
            ImportError::MissingHeaders(missing) => {
                assert_eq!(missing, vec!["question_type", "required"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_respondent_rows() {
        let rows = respondent_rows(&table(
            &["Name", "Email"],
            &[&["Ann", "ann@example.com"], &["Bob", "bob@example"], &["", "c@d.io"]],
        ))
        .unwrap();
        assert!(rows[0].is_valid());
        assert!(!rows[1].is_valid());
        assert!(!rows[2].is_valid());
    }

    #[test]
    fn test_split_options_and_bool() {
        assert_eq!(split_options("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_options("a|b,c"), vec!["a", "b,c"]);
        assert_eq!(parse_bool("Y"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }
}
