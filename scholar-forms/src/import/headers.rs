//! Column header matching
//!
//! Headers are compared after normalisation: lowercase, with everything but
//! letters and digits removed, so "BC No.", "bc_no" and "BcNo" are equal.

use once_cell::sync::Lazy;
use scholar_common::models::StudentField;
use std::collections::HashMap;

/// Minimum Jaro-Winkler similarity for a typo to count as a synonym
pub const FUZZY_THRESHOLD: f64 = 0.93;

/// Minimum normalised Levenshtein similarity a fuzzy match must also reach
pub const FUZZY_EDIT_FLOOR: f64 = 0.8;

/// Headers shorter than this (normalised) never fuzzy-match
pub const FUZZY_MIN_LEN: usize = 5;

pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Student header → typed field mapper
///
/// Exact synonym lookup first, then a Jaro-Winkler fallback for typos.
/// "Name" on its own is deliberately absent: it is ambiguous between the
/// student and the guardian and lands in the additional-data bag.
pub struct StudentHeaderMapper {
    synonyms: HashMap<String, StudentField>,
}

impl Default for StudentHeaderMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentHeaderMapper {
    pub fn new() -> Self {
        let table: [(StudentField, &[&str]); 15] = [
            (
                StudentField::StudentId,
                &[
                    "bcno", "bcnumber", "bcnum", "bc", "studentid", "studentno", "studentnumber",
                    "externalid", "birthcertificateno", "birthcertificatenumber",
                ],
            ),
            (
                StudentField::Name,
                &["studentname", "fullname", "childname", "childsname", "learnername", "pupilname"],
            ),
            (StudentField::DateOfBirth, &["dateofbirth", "dob", "birthdate", "birthday"]),
            (StudentField::Gender, &["gender", "sex"]),
            (StudentField::Level, &["level", "grade", "gradelevel", "yearlevel", "yeargroup"]),
            (StudentField::ClassName, &["class", "classname", "stream", "homeroom"]),
            (StudentField::Centre, &["centre", "center", "campus", "branch", "school"]),
            (
                StudentField::GuardianName,
                &["guardianname", "guardian", "parentname", "parent", "parentguardianname"],
            ),
            (
                StudentField::GuardianEmail,
                &["guardianemail", "parentemail", "email", "emailaddress"],
            ),
            (
                StudentField::GuardianPhone,
                &[
                    "guardianphone", "parentphone", "phone", "phonenumber", "mobile",
                    "contactnumber", "telephone",
                ],
            ),
            (StudentField::Address, &["address", "homeaddress", "residentialaddress"]),
            (
                StudentField::EmergencyContactName,
                &["emergencycontact", "emergencycontactname", "emergencyname"],
            ),
            (
                StudentField::EmergencyContactPhone,
                &[
                    "emergencyphone", "emergencycontactphone", "emergencynumber",
                    "emergencycontactnumber",
                ],
            ),
            (
                StudentField::MedicalNotes,
                &["medicalnotes", "medical", "medicalconditions", "allergies", "healthnotes"],
            ),
            (StudentField::Status, &["status", "studentstatus"]),
        ];

        let mut synonyms = HashMap::new();
        for (field, names) in table {
            for name in names {
                synonyms.insert(name.to_string(), field);
            }
        }
        Self { synonyms }
    }

    pub fn map_header(&self, header: &str) -> Option<StudentField> {
        let key = normalize_header(header);
        self.exact(&key).or_else(|| self.fuzzy(header, &key))
    }

    /// Map a whole header row. Exact synonyms claim their fields first; a
    /// fuzzy match only keeps a field that no exact column maps to.
    pub fn map_headers(&self, headers: &[String]) -> Vec<Option<StudentField>> {
        let keys: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let exact: Vec<Option<StudentField>> = keys.iter().map(|k| self.exact(k)).collect();

        headers
            .iter()
            .zip(&keys)
            .zip(&exact)
            .map(|((header, key), matched)| match matched {
                Some(field) => Some(*field),
                None => self
                    .fuzzy(header, key)
                    .filter(|field| !exact.contains(&Some(*field))),
            })
            .collect()
    }

    fn exact(&self, key: &str) -> Option<StudentField> {
        self.synonyms.get(key).copied()
    }

    fn fuzzy(&self, header: &str, key: &str) -> Option<StudentField> {
        if key.chars().count() < FUZZY_MIN_LEN {
            return None;
        }

        // Jaro-Winkler rewards shared prefixes, so "student" scores high
        // against "studentid"; the edit-distance floor rejects truncations.
        let best = self
            .synonyms
            .iter()
            .map(|(known, field)| (strsim::jaro_winkler(key, known), known, *field))
            .filter(|(score, known, _)| {
                *score >= FUZZY_THRESHOLD
                    && strsim::normalized_levenshtein(key, known) >= FUZZY_EDIT_FLOOR
            })
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)));

        best.map(|(score, known, field)| {
            tracing::debug!(header, matched = %known, score, "Fuzzy matched student header");
            field
        })
    }
}

pub static STUDENT_HEADERS: Lazy<StudentHeaderMapper> = Lazy::new(StudentHeaderMapper::new);

/// Column roles of a question import sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionColumn {
    QuestionType,
    QuestionText,
    Required,
    Options,
    Scale,
    Section,
    Description,
}

pub fn question_column(header: &str) -> Option<QuestionColumn> {
    match normalize_header(header).as_str() {
        "questiontype" | "type" => Some(QuestionColumn::QuestionType),
        "questiontext" | "question" | "text" => Some(QuestionColumn::QuestionText),
        "required" | "mandatory" | "isrequired" => Some(QuestionColumn::Required),
        "options" | "choices" => Some(QuestionColumn::Options),
        "scale" | "ratingscale" => Some(QuestionColumn::Scale),
        "section" | "sectiontitle" | "sectionname" => Some(QuestionColumn::Section),
        "description" | "helptext" => Some(QuestionColumn::Description),
        _ => None,
    }
}

/// Column roles of a respondent import sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RespondentColumn {
    Name,
    Email,
}

pub fn respondent_column(header: &str) -> Option<RespondentColumn> {
    match normalize_header(header).as_str() {
        "name" | "fullname" | "respondentname" | "parentname" => Some(RespondentColumn::Name),
        "email" | "emailaddress" | "respondentemail" => Some(RespondentColumn::Email),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" BC No. "), "bcno");
        assert_eq!(normalize_header("bc_no"), "bcno");
        assert_eq!(normalize_header("Date of Birth"), "dateofbirth");
    }

    #[test]
    fn test_external_id_synonyms() {
        for header in ["Bc No", "bc_no", "StudentId", "BC Number", "student_id"] {
            assert_eq!(
                STUDENT_HEADERS.map_header(header),
                Some(StudentField::StudentId),
                "{}",
                header
            );
        }
    }

    #[test]
    fn test_name_alone_is_not_a_student_field() {
        assert_eq!(STUDENT_HEADERS.map_header("Name"), None);
        assert_eq!(STUDENT_HEADERS.map_header("Student Name"), Some(StudentField::Name));
    }

    #[test]
    fn test_fuzzy_typo_match() {
        assert_eq!(STUDENT_HEADERS.map_header("Gendr"), Some(StudentField::Gender));
        assert_eq!(
            STUDENT_HEADERS.map_header("Date of Brith"),
            Some(StudentField::DateOfBirth)
        );
    }

    #[test]
    fn test_truncated_header_does_not_fuzzy_match() {
        assert_eq!(STUDENT_HEADERS.map_header("Student"), None);
        assert_eq!(STUDENT_HEADERS.map_header("Student No"), Some(StudentField::StudentId));
    }

    #[test]
    fn test_exact_columns_win_over_fuzzy_ones() {
        let headers = vec!["Gendr".to_string(), "Sex".to_string(), "BC No".to_string()];
        assert_eq!(
            STUDENT_HEADERS.map_headers(&headers),
            vec![None, Some(StudentField::Gender), Some(StudentField::StudentId)]
        );
    }

    #[test]
    fn test_short_headers_never_fuzzy_match() {
        assert_eq!(STUDENT_HEADERS.map_header("Sx"), None);
        assert_eq!(STUDENT_HEADERS.map_header("Foo"), None);
    }

    #[test]
    fn test_unrelated_header_unmatched() {
        assert_eq!(STUDENT_HEADERS.map_header("Favourite Colour"), None);
        assert_eq!(STUDENT_HEADERS.map_header("Bus Route"), None);
    }

    #[test]
    fn test_question_and_respondent_columns() {
        assert_eq!(question_column("Question Type"), Some(QuestionColumn::QuestionType));
        assert_eq!(question_column("question_text"), Some(QuestionColumn::QuestionText));
        assert_eq!(respondent_column("E-mail"), Some(RespondentColumn::Email));
        assert_eq!(respondent_column("Phone"), None);
    }
}
