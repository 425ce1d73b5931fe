//! Bulk import tests: students, questions and respondents from CSV uploads

use scholar_common::db::connect_in_memory;
use scholar_common::models::{ContentStage, FormBasics, FormKind, QuestionType, Role, User};
use scholar_common::{time, Error};
use scholar_forms::import::{self, ImportError, ImportKind};
use scholar_forms::{db, forms};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn create_user(pool: &SqlitePool, email: &str) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Import".to_string(),
        last_name: "Tester".to_string(),
        department: None,
        role: Role::Hod,
        active: true,
        created_at: time::now(),
    };
    db::users::insert_user(pool, &user).await.unwrap();
    user
}

async fn create_form(pool: &SqlitePool, owner: &User) -> Uuid {
    let basics = FormBasics {
        name: Some("Imported".to_string()),
        kind: Some(FormKind::General),
        ..Default::default()
    };
    forms::create_form(pool, owner.id, basics).await.unwrap().form.id
}

const ROSTER: &str = "BC No,Student Name,Date of Birth,Gendr,Class,Name\n\
                      BC001,Ada Obi,14/03/2015,F,4A,Mrs Obi\n\
                      BC002,Ben Kay,2016-01-09,M,3B,\n";

#[tokio::test]
async fn test_student_import_is_idempotent() {
    let pool = connect_in_memory().await.unwrap();
    let requester = Uuid::new_v4();

    for _ in 0..2 {
        let result = import::commit(&pool, ImportKind::Students, "roster.csv", ROSTER.as_bytes(), requester, None)
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.committed, 2);
        assert_eq!(result.failed, 0);
    }

    let students = db::students::list_students(&pool, None, None).await.unwrap();
    assert_eq!(students.len(), 2);

    let ada = db::students::find_by_external_id(&pool, "BC001").await.unwrap().unwrap();
    assert_eq!(ada.name.as_deref(), Some("Ada Obi"));
    assert_eq!(ada.date_of_birth.as_deref(), Some("2015-03-14"));
    assert_eq!(ada.gender.as_deref(), Some("F"));
    assert_eq!(ada.class_name.as_deref(), Some("4A"));
    // A bare "Name" column is ambiguous and kept as extra data
    assert_eq!(ada.additional_data.get("Name"), Some(&json!("Mrs Obi")));
}

#[tokio::test]
async fn test_reimport_merges_without_erasing() {
    let pool = connect_in_memory().await.unwrap();
    let requester = Uuid::new_v4();
    import::commit(&pool, ImportKind::Students, "roster.csv", ROSTER.as_bytes(), requester, None)
        .await
        .unwrap();

    let update = "bc no,class\nbc001,5A\n";
    import::commit(&pool, ImportKind::Students, "update.csv", update.as_bytes(), requester, None)
        .await
        .unwrap();

    let students = db::students::list_students(&pool, None, None).await.unwrap();
    assert_eq!(students.len(), 2, "case-insensitive BC No. must not duplicate");

    let ada = db::students::find_by_external_id(&pool, "BC001").await.unwrap().unwrap();
    assert_eq!(ada.class_name.as_deref(), Some("5A"));
    assert_eq!(ada.name.as_deref(), Some("Ada Obi"));
}

#[tokio::test]
async fn test_rows_without_student_id_are_reported() {
    let pool = connect_in_memory().await.unwrap();
    let csv = "BC No,Student Name\nBC001,Ada\n,Nameless\n\nBC003,Cleo\n";

    let preview = import::preview(ImportKind::Students, "roster.csv", csv.as_bytes()).unwrap();
    assert_eq!(preview.total, 3);
    assert_eq!(preview.valid, 2);
    assert_eq!(preview.invalid, 1);
    assert_eq!(preview.errors.len(), 1);
    assert_eq!(preview.errors[0].row, 3);

    // Preview never writes
    assert!(db::students::list_students(&pool, None, None).await.unwrap().is_empty());

    let result = import::commit(&pool, ImportKind::Students, "roster.csv", csv.as_bytes(), Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(result.committed, 2);
    assert_eq!(result.invalid, 1);
    assert_eq!(result.errors[0].row, 3);
}

#[tokio::test]
async fn test_failed_row_does_not_abort_the_batch() {
    let pool = connect_in_memory().await.unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_bad_student BEFORE INSERT ON students \
         WHEN NEW.student_id = 'BAD' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let csv = "BC No,Student Name\nBC001,Ada\nBAD,Broken\nBC003,Cleo\n";
    let result = import::commit(&pool, ImportKind::Students, "roster.csv", csv.as_bytes(), Uuid::new_v4(), None)
        .await
        .unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.valid, 3);
    assert_eq!(result.committed, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 3);

    let students = db::students::list_students(&pool, None, None).await.unwrap();
    let ids: Vec<&str> = students.iter().map(|s| s.student_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"BC001"));
    assert!(ids.contains(&"BC003"));
}

#[tokio::test]
async fn test_student_import_without_id_column_fails_whole_file() {
    let result = import::preview(ImportKind::Students, "roster.csv", b"Name,Gender\nAda,F\n");
    assert!(matches!(result, Err(ImportError::MissingHeaders(_))));

    let empty = import::preview(ImportKind::Students, "roster.csv", b"BC No,Student Name\n");
    assert!(matches!(empty, Err(ImportError::NoDataRows)));
}

#[tokio::test]
async fn test_question_import_appends_to_sections() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let form_id = create_form(&pool, &owner).await;

    let csv = "question_type,question_text,required,options,scale,section\n\
               text,Child's favourite subject,yes,,,About your child\n\
               multiple choice,Preferred contact,no,Email|Phone|Letter,,Contact\n\
               rating,Rate the term,yes,,5,About your child\n\
               rating,Rate the food,yes,,4,About your child\n";
    let result = import::commit(&pool, ImportKind::Questions, "questions.csv", csv.as_bytes(), owner.id, Some(form_id))
        .await
        .unwrap();
    assert_eq!(result.total, 4);
    assert_eq!(result.committed, 3);
    assert_eq!(result.invalid, 1);
    assert_eq!(result.errors[0].row, 5);

    let editor = forms::load_for_editor(&pool, form_id, owner.id).await.unwrap();
    let titles: Vec<&str> = editor.content.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["About your child", "Contact"]);

    let texts: Vec<&str> = editor.content.questions.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Child's favourite subject", "Rate the term", "Preferred contact"]
    );
    let sequences: Vec<u32> = editor.content.questions.iter().map(|q| q.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(editor.content.questions[2].question_type, QuestionType::MultipleChoice);
    assert_eq!(editor.content.questions[2].options, vec!["Email", "Phone", "Letter"]);
}

#[tokio::test]
async fn test_question_import_requires_owned_form() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let other = create_user(&pool, "other@school.test").await;
    let form_id = create_form(&pool, &owner).await;
    let csv = "question_type,question_text,required\ntext,Anything else?,no\n";

    let missing_form =
        import::commit(&pool, ImportKind::Questions, "q.csv", csv.as_bytes(), owner.id, None).await;
    assert!(matches!(missing_form, Err(ImportError::Common(Error::Validation(_)))));

    let foreign =
        import::commit(&pool, ImportKind::Questions, "q.csv", csv.as_bytes(), other.id, Some(form_id))
            .await;
    assert!(matches!(foreign, Err(ImportError::Common(Error::Forbidden(_)))));

    let working = db::forms::fetch_content(&pool, form_id, ContentStage::Working)
        .await
        .unwrap()
        .unwrap();
    assert!(working.questions.is_empty());
}

#[tokio::test]
async fn test_respondent_import_dedupes_by_email() {
    let pool = connect_in_memory().await.unwrap();
    let owner = create_user(&pool, "owner@school.test").await;
    let form_id = create_form(&pool, &owner).await;

    let csv = "Name,Email\n\
               Ama Mensah,ama@home.test\n\
               Kofi Mensah,kofi@home.test\n\
               Ama K. Mensah,AMA@home.test\n\
               No Email,\n";
    let result = import::commit(&pool, ImportKind::Respondents, "parents.csv", csv.as_bytes(), owner.id, Some(form_id))
        .await
        .unwrap();
    assert_eq!(result.valid, 3);
    assert_eq!(result.invalid, 1);

    let form = db::forms::get_form(&pool, form_id).await.unwrap().unwrap();
    let respondents = &form.settings.respondents;
    assert_eq!(respondents.len(), 2);
    assert_eq!(respondents[0].email, "ama@home.test");
    assert_eq!(respondents[0].name, "Ama K. Mensah");
    assert_eq!(respondents[1].email, "kofi@home.test");
}

#[tokio::test]
async fn test_unreadable_upload() {
    let result = import::preview(ImportKind::Students, "roster.xlsx", b"definitely not a workbook");
    assert!(matches!(result, Err(ImportError::Unreadable(_))));
}
