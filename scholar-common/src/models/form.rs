//! Form, question and section types
//!
//! A form's questions live in staged content snapshots (working, preview,
//! published) rather than on the form row itself; see [`StagedContent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Rating questions accept exactly these scale sizes
pub const RATING_SCALES: [u8; 4] = [3, 5, 7, 10];

/// Fixed option list of the agreement-scale question type
pub const AGREEMENT_SCALE_OPTIONS: [&str; 4] =
    ["Strongly Disagree", "Disagree", "Agree", "Strongly Agree"];

/// Display order of the identity-verification section
pub const IDENTITY_SECTION_ORDER: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    General,
    ParentsSurvey,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::General => "general",
            FormKind::ParentsSurvey => "parents_survey",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Some(FormKind::General),
            "parents_survey" | "parents-survey" | "parentssurvey" => Some(FormKind::ParentsSurvey),
            _ => None,
        }
    }
}

/// Lifecycle status. Only publishing moves a form to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Draft,
    Active,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(FormStatus::Draft),
            "active" => Some(FormStatus::Active),
            _ => None,
        }
    }
}

/// Which copy of a form's content a snapshot represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStage {
    /// Live-edited, unreviewed content
    Working,
    /// Content staged for owner review
    Preview,
    /// Content served to the public
    Published,
}

impl ContentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStage::Working => "working",
            ContentStage::Preview => "preview",
            ContentStage::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "working" => Some(ContentStage::Working),
            "preview" => Some(ContentStage::Preview),
            "published" => Some(ContentStage::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    Text,
    Email,
    Phone,
    Number,
    Textarea,
    Select,
    MultipleChoice,
    Checkbox,
    Radio,
    Rating,
    Date,
    Datetime,
    TrueFalse,
    AgreementScale,
    StudentLookup,
}

impl QuestionType {
    pub const ALL: [QuestionType; 15] = [
        QuestionType::Text,
        QuestionType::Email,
        QuestionType::Phone,
        QuestionType::Number,
        QuestionType::Textarea,
        QuestionType::Select,
        QuestionType::MultipleChoice,
        QuestionType::Checkbox,
        QuestionType::Radio,
        QuestionType::Rating,
        QuestionType::Date,
        QuestionType::Datetime,
        QuestionType::TrueFalse,
        QuestionType::AgreementScale,
        QuestionType::StudentLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Email => "email",
            QuestionType::Phone => "phone",
            QuestionType::Number => "number",
            QuestionType::Textarea => "textarea",
            QuestionType::Select => "select",
            QuestionType::MultipleChoice => "multipleChoice",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Radio => "radio",
            QuestionType::Rating => "rating",
            QuestionType::Date => "date",
            QuestionType::Datetime => "datetime",
            QuestionType::TrueFalse => "trueFalse",
            QuestionType::AgreementScale => "agreementScale",
            QuestionType::StudentLookup => "studentLookup",
        }
    }

    /// Parse a type tag, ignoring case, spaces, underscores and hyphens
    /// ("Multiple Choice", "multiple_choice" and "multipleChoice" are equal).
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().to_ascii_lowercase() == key)
    }

    /// Choice-like types must carry a non-empty option list
    pub fn requires_options(&self) -> bool {
        matches!(
            self,
            QuestionType::Select
                | QuestionType::MultipleChoice
                | QuestionType::Checkbox
                | QuestionType::Radio
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Dense 1-based number across all sections; recomputed by renumbering
    #[serde(default)]
    pub sequence: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

impl Question {
    pub fn new(question_type: QuestionType, text: impl Into<String>) -> Self {
        let mut question = Self {
            id: Uuid::new_v4().to_string(),
            sequence: 0,
            question_type,
            text: text.into(),
            description: None,
            required: false,
            options: Vec::new(),
            scale: None,
            section_id: None,
        };
        question.normalize();
        question
    }

    /// Enforce per-type invariants that callers may not override.
    ///
    /// Agreement-scale questions are always required with the fixed option list.
    /// Option labels are trimmed and blank labels dropped.
    pub fn normalize(&mut self) {
        if self.question_type == QuestionType::AgreementScale {
            self.required = true;
            self.options = AGREEMENT_SCALE_OPTIONS.iter().map(|s| s.to_string()).collect();
            return;
        }

        self.options = self
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }

    /// Check shape rules for a single question. Returns human-readable problems.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.text.trim().is_empty() {
            problems.push("question text is required".to_string());
        }
        if self.question_type.requires_options() && self.options.is_empty() {
            problems.push(format!(
                "{} questions need at least one option",
                self.question_type.as_str()
            ));
        }
        if self.question_type == QuestionType::Rating {
            match self.scale {
                Some(scale) if RATING_SCALES.contains(&scale) => {}
                Some(scale) => problems.push(format!(
                    "rating scale must be one of 3, 5, 7 or 10 (got {})",
                    scale
                )),
                None => problems.push("rating questions need a scale".to_string()),
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    #[default]
    Standard,
    /// Auto-created identity-verification section of parents surveys
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub kind: SectionKind,
}

impl Section {
    pub fn new(title: impl Into<String>, order: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            order,
            kind: SectionKind::Standard,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.kind == SectionKind::Identity
    }
}

/// The editable document of a form: its sections and questions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormContent {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl FormContent {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.questions.is_empty()
    }
}

/// One snapshot of form content, tagged with the stage it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedContent {
    pub stage: ContentStage,
    pub content: FormContent,
}

impl StagedContent {
    pub fn new(stage: ContentStage, content: FormContent) -> Self {
        Self { stage, content }
    }

    /// Copy this snapshot's content into another stage
    pub fn copy_to(&self, stage: ContentStage) -> StagedContent {
        StagedContent {
            stage,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionLimit {
    #[default]
    Unlimited,
    OncePerRespondent,
}

/// Imported respondent on a form's distribution list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    pub name: String,
    pub email: String,
}

/// Free-form settings bag of a form. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    /// Object-storage reference of the form icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub submission_limit: SubmissionLimit,
    #[serde(default)]
    pub allow_response_edit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Student external identifiers allowed to answer a parents survey.
    /// Empty means no restriction.
    #[serde(default)]
    pub selected_respondents: Vec<String>,
    #[serde(default)]
    pub respondents: Vec<Respondent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: FormKind,
    pub slug: String,
    pub status: FormStatus,
    pub settings: FormSettings,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
}

impl Form {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }
}

/// Name, kind, slug and settings as supplied by the editor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormBasics {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<FormKind>,
    pub slug: Option<String>,
    pub settings: Option<FormSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormResponse {
    pub id: Uuid,
    pub form_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_id: Option<String>,
    pub answers: std::collections::BTreeMap<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_parse_is_lenient() {
        assert_eq!(QuestionType::parse("Multiple Choice"), Some(QuestionType::MultipleChoice));
        assert_eq!(QuestionType::parse("multiple_choice"), Some(QuestionType::MultipleChoice));
        assert_eq!(QuestionType::parse("trueFalse"), Some(QuestionType::TrueFalse));
        assert_eq!(QuestionType::parse("TEXTAREA"), Some(QuestionType::Textarea));
        assert_eq!(QuestionType::parse("slider"), None);
    }

    #[test]
    fn test_question_type_serde_tags() {
        let json = serde_json::to_string(&QuestionType::AgreementScale).unwrap();
        assert_eq!(json, "\"agreementScale\"");
        let parsed: QuestionType = serde_json::from_str("\"studentLookup\"").unwrap();
        assert_eq!(parsed, QuestionType::StudentLookup);
    }

    #[test]
    fn test_agreement_scale_cannot_be_overridden() {
        let mut question = Question::new(QuestionType::AgreementScale, "School is safe");
        question.required = false;
        question.options = vec!["Yes".to_string(), "No".to_string()];
        question.normalize();

        assert!(question.required);
        assert_eq!(question.options, AGREEMENT_SCALE_OPTIONS.map(String::from).to_vec());
    }

    #[test]
    fn test_rating_scale_rules() {
        for scale in 0u8..=12 {
            let mut question = Question::new(QuestionType::Rating, "Rate us");
            question.scale = Some(scale);
            let ok = question.problems().is_empty();
            assert_eq!(ok, RATING_SCALES.contains(&scale), "scale {}", scale);
        }

        let question = Question::new(QuestionType::Rating, "Rate us");
        assert_eq!(question.problems(), vec!["rating questions need a scale".to_string()]);
    }

    #[test]
    fn test_choice_questions_need_options() {
        let mut question = Question::new(QuestionType::Radio, "Pick one");
        question.options = vec!["  ".to_string()];
        question.normalize();
        assert_eq!(question.problems().len(), 1);

        question.options = vec!["A".to_string()];
        assert!(question.problems().is_empty());
    }

    #[test]
    fn test_settings_keep_unknown_keys() {
        let json = serde_json::json!({
            "welcome_message": "Hello",
            "theme": "blue"
        });
        let settings: FormSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.welcome_message.as_deref(), Some("Hello"));
        assert_eq!(settings.extra.get("theme"), Some(&Value::String("blue".into())));
        assert!(settings.selected_respondents.is_empty());
    }

    #[test]
    fn test_copy_to_changes_only_stage() {
        let mut content = FormContent::default();
        content.sections.push(Section::new("Intro", 0));
        let working = StagedContent::new(ContentStage::Working, content.clone());
        let preview = working.copy_to(ContentStage::Preview);
        assert_eq!(preview.stage, ContentStage::Preview);
        assert_eq!(preview.content, content);
    }
}
