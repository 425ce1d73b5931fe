//! Respondent-side tests: identifier lookup and response submission

use chrono::Duration;
use scholar_common::db::connect_in_memory;
use scholar_common::models::{
    FormBasics, FormContent, FormKind, FormSettings, Question, QuestionType, Role, StudentInput,
    SubmissionLimit, User,
};
use scholar_common::{time, Error};
use scholar_forms::public::{self, Identifiers, LookupRequest, SubmitRequest};
use scholar_forms::{db, forms, import};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

async fn create_user(pool: &SqlitePool) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: format!("{}@school.test", Uuid::new_v4().simple()),
        first_name: "Form".to_string(),
        last_name: "Owner".to_string(),
        department: None,
        role: Role::Hod,
        active: true,
        created_at: time::now(),
    };
    db::users::insert_user(pool, &user).await.unwrap();
    user
}

async fn add_student(pool: &SqlitePool, student_id: &str, name: &str) {
    let input = StudentInput {
        student_id: Some(student_id.to_string()),
        name: Some(name.to_string()),
        level: Some("Grade 4".to_string()),
        ..Default::default()
    };
    import::upsert_student(pool, &input).await.unwrap();
}

/// Publish a form whose single standard question is a required text field.
/// Returns the form id and that question's id.
async fn published_form(
    pool: &SqlitePool,
    owner: &User,
    kind: FormKind,
    settings: FormSettings,
) -> (Uuid, String) {
    let basics = FormBasics {
        name: Some("Feedback".to_string()),
        kind: Some(kind),
        settings: Some(settings),
        ..Default::default()
    };
    let created = forms::create_form(pool, owner.id, basics).await.unwrap();

    let mut content: FormContent = created.content;
    let section = content.add_section("Your views");
    let mut question = Question::new(QuestionType::Text, "What went well?");
    question.required = true;
    let question_id = content.add_question(question, Some(&section)).unwrap();

    forms::update_working_content(pool, created.form.id, owner.id, content)
        .await
        .unwrap();
    forms::publish(pool, created.form.id, owner.id, None).await.unwrap();
    (created.form.id, question_id)
}

fn answers(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_lookup_without_form_searches_whole_roster() {
    let pool = connect_in_memory().await.unwrap();
    add_student(&pool, "BC001", "Ada").await;

    let request = LookupRequest {
        identifiers: Identifiers::Text("bc001, BC404".to_string()),
        form_id: None,
        already_added: Vec::new(),
    };
    let result = public::lookup_students(&pool, &request).await.unwrap();

    assert_eq!(result.found.len(), 1);
    assert_eq!(result.found[0].student_id, "BC001");
    assert_eq!(result.found[0].name.as_deref(), Some("Ada"));
    assert_eq!(result.not_found, vec!["BC404"]);
    assert!(result.not_selected.is_empty());
}

#[tokio::test]
async fn test_lookup_honours_parents_survey_allow_list() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    for (id, name) in [("BC001", "Ada"), ("BC002", "Ben"), ("BC003", "Cleo")] {
        add_student(&pool, id, name).await;
    }
    let settings = FormSettings {
        selected_respondents: vec!["BC001".to_string(), "BC002".to_string()],
        ..Default::default()
    };
    let (form_id, _) = published_form(&pool, &owner, FormKind::ParentsSurvey, settings).await;

    let request = LookupRequest {
        identifiers: Identifiers::List(vec![
            "BC001".to_string(),
            "BC003".to_string(),
            "bc001".to_string(),
        ]),
        form_id: Some(form_id),
        already_added: Vec::new(),
    };
    let result = public::lookup_students(&pool, &request).await.unwrap();

    let found: Vec<&str> = result.found.iter().map(|s| s.student_id.as_str()).collect();
    assert_eq!(found, vec!["BC001"]);
    assert_eq!(result.not_selected, vec!["BC003"]);
    assert_eq!(result.duplicates, vec!["bc001"]);
    assert!(result.not_found.is_empty());
}

#[tokio::test]
async fn test_lookup_flags_already_added_identifiers() {
    let pool = connect_in_memory().await.unwrap();
    add_student(&pool, "BC002", "Ben").await;

    let request = LookupRequest {
        identifiers: Identifiers::Text("BC002".to_string()),
        form_id: None,
        already_added: vec!["bc002".to_string()],
    };
    let result = public::lookup_students(&pool, &request).await.unwrap();
    assert!(result.found.is_empty());
    assert_eq!(result.duplicates, vec!["BC002"]);
}

#[tokio::test]
async fn test_general_form_ignores_selected_respondents() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    add_student(&pool, "BC003", "Cleo").await;
    let settings = FormSettings {
        selected_respondents: vec!["BC001".to_string()],
        ..Default::default()
    };
    let (form_id, _) = published_form(&pool, &owner, FormKind::General, settings).await;

    let request = LookupRequest {
        identifiers: Identifiers::Text("BC003".to_string()),
        form_id: Some(form_id),
        already_added: Vec::new(),
    };
    let result = public::lookup_students(&pool, &request).await.unwrap();
    assert_eq!(result.found.len(), 1);
}

#[tokio::test]
async fn test_submit_records_response() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let (form_id, question_id) =
        published_form(&pool, &owner, FormKind::General, FormSettings::default()).await;

    let request = SubmitRequest {
        respondent_id: Some("  parent-1 ".to_string()),
        answers: answers(&[(question_id.as_str(), json!("The concert"))]),
    };
    let response = public::submit_response(&pool, form_id, request).await.unwrap();
    assert_eq!(response.respondent_id.as_deref(), Some("parent-1"));

    let stored = forms::list_responses(&pool, form_id, owner.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].answers[&question_id], json!("The concert"));
}

#[tokio::test]
async fn test_submit_rejects_missing_and_unknown_answers() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let (form_id, question_id) =
        published_form(&pool, &owner, FormKind::General, FormSettings::default()).await;

    let blank = SubmitRequest {
        respondent_id: None,
        answers: answers(&[(question_id.as_str(), json!("   "))]),
    };
    let result = public::submit_response(&pool, form_id, blank).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let unknown = SubmitRequest {
        respondent_id: None,
        answers: answers(&[(question_id.as_str(), json!("ok")), ("not-a-question", json!(1))]),
    };
    let result = public::submit_response(&pool, form_id, unknown).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_submit_once_per_respondent() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let settings = FormSettings {
        submission_limit: SubmissionLimit::OncePerRespondent,
        ..Default::default()
    };
    let (form_id, question_id) = published_form(&pool, &owner, FormKind::General, settings).await;

    let submit = |respondent: Option<&str>| SubmitRequest {
        respondent_id: respondent.map(str::to_string),
        answers: answers(&[(question_id.as_str(), json!("Fine"))]),
    };

    let anonymous = public::submit_response(&pool, form_id, submit(None)).await;
    assert!(matches!(anonymous, Err(Error::Validation(_))));

    public::submit_response(&pool, form_id, submit(Some("parent@home.test")))
        .await
        .unwrap();
    let repeat = public::submit_response(&pool, form_id, submit(Some("parent@home.test"))).await;
    assert!(matches!(repeat, Err(Error::Conflict(_))));

    public::submit_response(&pool, form_id, submit(Some("other@home.test")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_submit_after_deadline_is_rejected() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let settings = FormSettings {
        deadline: Some(time::now() - Duration::hours(1)),
        ..Default::default()
    };
    let (form_id, question_id) = published_form(&pool, &owner, FormKind::General, settings).await;

    let request = SubmitRequest {
        respondent_id: None,
        answers: answers(&[(question_id.as_str(), json!("Too late"))]),
    };
    let result = public::submit_response(&pool, form_id, request).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_submit_to_draft_is_not_found() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let basics = FormBasics {
        name: Some("Unpublished".to_string()),
        kind: Some(FormKind::General),
        ..Default::default()
    };
    let created = forms::create_form(&pool, owner.id, basics).await.unwrap();

    let request = SubmitRequest {
        respondent_id: None,
        answers: BTreeMap::new(),
    };
    let result = public::submit_response(&pool, created.form.id, request).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_parents_survey_requires_student_lookup_answer() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    let (form_id, question_id) =
        published_form(&pool, &owner, FormKind::ParentsSurvey, FormSettings::default()).await;

    let without_student = SubmitRequest {
        respondent_id: None,
        answers: answers(&[(question_id.as_str(), json!("Good term"))]),
    };
    let result = public::submit_response(&pool, form_id, without_student).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let form = db::forms::get_form(&pool, form_id).await.unwrap().unwrap();
    let public_form = public::get_public_form(&pool, &form.slug).await.unwrap();
    let lookup = public_form
        .questions
        .iter()
        .find(|q| q.question_type == QuestionType::StudentLookup)
        .unwrap();
    assert_eq!(lookup.sequence, 1);

    let with_student = SubmitRequest {
        respondent_id: None,
        answers: answers(&[(lookup.id.as_str(), json!(["BC001"])), (question_id.as_str(), json!("Good term"))]),
    };
    public::submit_response(&pool, form_id, with_student).await.unwrap();
}

#[tokio::test]
async fn test_lookup_session_with_single_allowed_student() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    add_student(&pool, "BC001", "Ada").await;
    add_student(&pool, "BC002", "Ben").await;
    let settings = FormSettings {
        selected_respondents: vec!["BC001".to_string()],
        ..Default::default()
    };
    let (form_id, _) = published_form(&pool, &owner, FormKind::ParentsSurvey, settings).await;

    let first = LookupRequest {
        identifiers: Identifiers::Text("BC001,BC002".to_string()),
        form_id: Some(form_id),
        already_added: Vec::new(),
    };
    let result = public::lookup_students(&pool, &first).await.unwrap();
    assert_eq!(result.found.len(), 1);
    assert_eq!(result.found[0].student_id, "BC001");
    assert_eq!(result.not_selected, vec!["BC002"]);
    assert!(result.not_found.is_empty());

    let again = LookupRequest {
        identifiers: Identifiers::Text("BC001".to_string()),
        form_id: Some(form_id),
        already_added: vec!["BC001".to_string()],
    };
    let result = public::lookup_students(&pool, &again).await.unwrap();
    assert!(result.found.is_empty());
    assert_eq!(result.duplicates, vec!["BC001"]);
}

#[tokio::test]
async fn test_lookup_unknown_identifier_is_not_found_despite_allow_list() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool).await;
    add_student(&pool, "BC001", "Ada").await;
    let settings = FormSettings {
        selected_respondents: vec!["BC001".to_string()],
        ..Default::default()
    };
    let (form_id, _) = published_form(&pool, &owner, FormKind::ParentsSurvey, settings).await;

    let request = LookupRequest {
        identifiers: Identifiers::Text("BC001,BC999".to_string()),
        form_id: Some(form_id),
        already_added: Vec::new(),
    };
    let result = public::lookup_students(&pool, &request).await.unwrap();

    assert_eq!(result.found.len(), 1);
    assert_eq!(result.found[0].student_id, "BC001");
    assert_eq!(result.not_found, vec!["BC999"]);
    assert!(result.not_selected.is_empty());
}
