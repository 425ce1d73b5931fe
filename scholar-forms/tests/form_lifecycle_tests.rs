//! Form lifecycle tests: drafting, preview, publish and ownership

use scholar_common::db::connect_in_memory;
use scholar_common::models::{
    ContentStage, FormBasics, FormContent, FormKind, FormSettings, FormStatus, Question,
    QuestionType, Role, SectionKind, User,
};
use scholar_common::{time, Error};
use scholar_forms::{db, forms, public};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn create_user(pool: &SqlitePool, email: &str) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "Teacher".to_string(),
        department: Some("Science".to_string()),
        role: Role::Hod,
        active: true,
        created_at: time::now(),
    };
    db::users::insert_user(pool, &user).await.unwrap();
    user
}

fn basics(name: &str, kind: FormKind) -> FormBasics {
    FormBasics {
        name: Some(name.to_string()),
        kind: Some(kind),
        ..Default::default()
    }
}

fn one_question(text: &str) -> FormContent {
    let mut content = FormContent::default();
    let section = content.add_section("General");
    content
        .add_question(Question::new(QuestionType::Text, text), Some(&section))
        .unwrap();
    content
}

#[tokio::test]
async fn test_create_form_generates_slug_and_starts_as_draft() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;

    let created = forms::create_form(&pool, owner.id, basics("Term 1 Feedback", FormKind::General))
        .await
        .unwrap();

    assert_eq!(created.form.status, FormStatus::Draft);
    assert!(created.form.slug.starts_with("term-1-feedback-"), "slug {}", created.form.slug);
    assert!(created.content.is_empty());
    assert!(created.form.last_published_at.is_none());
}

#[tokio::test]
async fn test_create_form_requires_name_and_kind() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;

    let no_name = forms::create_form(&pool, owner.id, basics("   ", FormKind::General)).await;
    assert!(matches!(no_name, Err(Error::Validation(_))));

    let no_kind = FormBasics {
        name: Some("Untyped".to_string()),
        ..Default::default()
    };
    let result = forms::create_form(&pool, owner.id, no_kind).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_reserved_and_taken_slugs_are_rejected() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;

    let reserved = FormBasics {
        slug: Some("api".to_string()),
        ..basics("Reserved", FormKind::General)
    };
    let result = forms::create_form(&pool, owner.id, reserved).await;
    assert!(matches!(result, Err(Error::Validation(_))), "{:?}", result);

    let first = FormBasics {
        slug: Some("sports-day".to_string()),
        ..basics("Sports Day", FormKind::General)
    };
    forms::create_form(&pool, owner.id, first).await.unwrap();

    let second = FormBasics {
        slug: Some("Sports-Day".to_string()),
        ..basics("Sports Day again", FormKind::General)
    };
    let result = forms::create_form(&pool, owner.id, second).await;
    assert!(matches!(result, Err(Error::Conflict(_))), "{:?}", result);
}

#[tokio::test]
async fn test_parents_survey_gets_identity_section() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;

    let created = forms::create_form(&pool, owner.id, basics("Parents Survey", FormKind::ParentsSurvey))
        .await
        .unwrap();

    let identity = created
        .content
        .sections
        .iter()
        .find(|s| s.kind == SectionKind::Identity)
        .expect("identity section");
    let lookup: Vec<_> = created
        .content
        .questions
        .iter()
        .filter(|q| q.section_id.as_deref() == Some(identity.id.as_str()))
        .collect();
    assert_eq!(lookup.len(), 1);
    assert_eq!(lookup[0].question_type, QuestionType::StudentLookup);
    assert!(lookup[0].required);
}

#[tokio::test]
async fn test_switching_kind_adds_identity_section_once() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Survey", FormKind::General))
        .await
        .unwrap();

    let switch = || FormBasics {
        kind: Some(FormKind::ParentsSurvey),
        ..Default::default()
    };
    forms::update_basics(&pool, created.form.id, owner.id, switch()).await.unwrap();
    forms::update_basics(&pool, created.form.id, owner.id, switch()).await.unwrap();

    let editor = forms::load_for_editor(&pool, created.form.id, owner.id).await.unwrap();
    assert_eq!(editor.form.kind, FormKind::ParentsSurvey);
    let identity_count = editor
        .content
        .sections
        .iter()
        .filter(|s| s.kind == SectionKind::Identity)
        .count();
    assert_eq!(identity_count, 1);
}

#[tokio::test]
async fn test_rating_scale_validated_on_save() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Ratings", FormKind::General))
        .await
        .unwrap();

    let mut content = FormContent::default();
    let section = content.add_section("General");
    let mut rating = Question::new(QuestionType::Rating, "How was the trip?");
    rating.scale = Some(4);
    content.add_question(rating, Some(&section)).unwrap();

    let result = forms::update_working_content(&pool, created.form.id, owner.id, content.clone()).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    content.questions[0].scale = Some(5);
    let saved = forms::update_working_content(&pool, created.form.id, owner.id, content)
        .await
        .unwrap();
    assert!(saved.last_saved_at.is_some());
}

#[tokio::test]
async fn test_publish_without_preview_uses_working_content() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Direct", FormKind::General))
        .await
        .unwrap();

    forms::update_working_content(&pool, created.form.id, owner.id, one_question("Working question"))
        .await
        .unwrap();
    let published = forms::publish(&pool, created.form.id, owner.id, None).await.unwrap();
    assert_eq!(published.status, FormStatus::Active);
    assert!(published.last_published_at.is_some());

    let public_form = public::get_public_form(&pool, &published.slug).await.unwrap();
    assert_eq!(public_form.questions.len(), 1);
    assert_eq!(public_form.questions[0].text, "Working question");
}

#[tokio::test]
async fn test_publish_prefers_prepared_preview() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Staged", FormKind::General))
        .await
        .unwrap();
    let form_id = created.form.id;

    forms::update_working_content(&pool, form_id, owner.id, one_question("Reviewed"))
        .await
        .unwrap();
    forms::prepare_preview(&pool, form_id, owner.id).await.unwrap();

    // Edits after the preview are not published
    forms::update_working_content(&pool, form_id, owner.id, one_question("Unreviewed"))
        .await
        .unwrap();
    let form = forms::publish(&pool, form_id, owner.id, None).await.unwrap();

    let published = db::forms::fetch_content(&pool, form_id, ContentStage::Published)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.questions[0].text, "Reviewed");

    let working = db::forms::fetch_content(&pool, form_id, ContentStage::Working)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(working.questions[0].text, "Unreviewed");

    let preview = public::get_preview_form(&pool, &form.slug, owner.id).await.unwrap();
    assert_eq!(preview.questions[0].text, "Reviewed");
}

#[tokio::test]
async fn test_publish_applies_supplied_basics() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Old name", FormKind::General))
        .await
        .unwrap();

    let basics = FormBasics {
        name: Some("New name".to_string()),
        slug: Some("new-name".to_string()),
        settings: Some(FormSettings {
            welcome_message: Some("Welcome, parents".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let form = forms::publish(&pool, created.form.id, owner.id, Some(basics)).await.unwrap();
    assert_eq!(form.name, "New name");
    assert_eq!(form.slug, "new-name");

    let public_form = public::get_public_form(&pool, "new-name").await.unwrap();
    assert_eq!(public_form.welcome_message.as_deref(), Some("Welcome, parents"));
}

#[tokio::test]
async fn test_draft_form_is_not_public() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Draft", FormKind::General))
        .await
        .unwrap();

    let result = public::get_public_form(&pool, &created.form.slug).await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let reserved = public::get_public_form(&pool, "admin").await;
    assert!(matches!(reserved, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_reserved_slug_never_resolves_even_when_stored() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Sneaky", FormKind::General))
        .await
        .unwrap();
    forms::update_working_content(&pool, created.form.id, owner.id, one_question("Hello?"))
        .await
        .unwrap();
    forms::publish(&pool, created.form.id, owner.id, None).await.unwrap();

    sqlx::query("UPDATE forms SET slug = 'api' WHERE id = ?")
        .bind(created.form.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let result = public::get_public_form(&pool, "api").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_only_owner_may_modify() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let other = create_user(&pool, "other@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Mine", FormKind::General))
        .await
        .unwrap();
    let form_id = created.form.id;

    let rename = FormBasics {
        name: Some("Theirs".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        forms::update_basics(&pool, form_id, other.id, rename).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        forms::publish(&pool, form_id, other.id, None).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        forms::delete_form(&pool, form_id, other.id).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        forms::load_for_editor(&pool, Uuid::new_v4(), owner.id).await,
        Err(Error::NotFound(_))
    ));

    assert!(forms::list_forms(&pool, other.id).await.unwrap().is_empty());
    assert_eq!(forms::list_forms(&pool, owner.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_form_removes_snapshots() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let created = forms::create_form(&pool, owner.id, basics("Short lived", FormKind::General))
        .await
        .unwrap();
    let form_id = created.form.id;

    forms::publish(&pool, form_id, owner.id, None).await.unwrap();
    forms::delete_form(&pool, form_id, owner.id).await.unwrap();

    assert!(db::forms::get_form(&pool, form_id).await.unwrap().is_none());
    assert!(db::forms::fetch_content(&pool, form_id, ContentStage::Published)
        .await
        .unwrap()
        .is_none());
}
