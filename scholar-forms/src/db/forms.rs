//! Form and form-content persistence
//!
//! Content snapshots live in `form_content`, one row per (form, stage).
//! Functions taking `&mut SqliteConnection` are meant to be composed inside a
//! transaction by the lifecycle layer.

use scholar_common::models::{ContentStage, Form, FormContent, FormKind, FormSettings, FormStatus, StagedContent};
use scholar_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

const FORM_COLUMNS: &str = "id, name, description, kind, slug, status, settings, created_by, \
                            created_at, last_saved_at, last_published_at";

fn form_from_row(row: &SqliteRow) -> Result<Form> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let settings: String = row.get("settings");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");

    Ok(Form {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        description: row.get("description"),
        kind: FormKind::parse(&kind)
            .ok_or_else(|| Error::Internal(format!("Unknown form kind in database: {}", kind)))?,
        slug: row.get("slug"),
        status: FormStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown form status in database: {}", status)))?,
        settings: serde_json::from_str::<FormSettings>(&settings)?,
        created_by: parse_uuid(&created_by)?,
        created_at: time::from_db(&created_at)?,
        last_saved_at: time::from_db_opt(row.get("last_saved_at"))?,
        last_published_at: time::from_db_opt(row.get("last_published_at"))?,
    })
}

fn map_slug_conflict(e: sqlx::Error, slug: &str) -> Error {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::Conflict(format!("slug '{}' is already in use", slug))
        }
        other => Error::Database(other),
    }
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in database '{}': {}", value, e)))
}

/// Insert a new form together with its (empty or seeded) working content
pub async fn insert_form(pool: &SqlitePool, form: &Form, working: &FormContent) -> Result<()> {
    let settings = serde_json::to_string(&form.settings)?;
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO forms (id, name, description, kind, slug, status, settings, created_by,
                           created_at, last_saved_at, last_published_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.id.to_string())
    .bind(&form.name)
    .bind(&form.description)
    .bind(form.kind.as_str())
    .bind(&form.slug)
    .bind(form.status.as_str())
    .bind(&settings)
    .bind(form.created_by.to_string())
    .bind(time::to_db(&form.created_at))
    .bind(form.last_saved_at.as_ref().map(time::to_db))
    .bind(form.last_published_at.as_ref().map(time::to_db))
    .execute(&mut *tx)
    .await
    .map_err(|e| map_slug_conflict(e, &form.slug))?;

    let staged = StagedContent::new(ContentStage::Working, working.clone());
    upsert_content(&mut tx, form.id, &staged).await?;

    tx.commit().await?;
    Ok(())
}

/// Persist every mutable column of the form row
pub async fn update_form(conn: &mut SqliteConnection, form: &Form) -> Result<()> {
    let settings = serde_json::to_string(&form.settings)?;

    sqlx::query(
        r#"
        UPDATE forms
        SET name = ?, description = ?, kind = ?, slug = ?, status = ?, settings = ?,
            last_saved_at = ?, last_published_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(form.kind.as_str())
    .bind(&form.slug)
    .bind(form.status.as_str())
    .bind(&settings)
    .bind(form.last_saved_at.as_ref().map(time::to_db))
    .bind(form.last_published_at.as_ref().map(time::to_db))
    .bind(form.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_slug_conflict(e, &form.slug))?;

    Ok(())
}

pub async fn get_form(pool: &SqlitePool, form_id: Uuid) -> Result<Option<Form>> {
    let row = sqlx::query(&format!("SELECT {} FROM forms WHERE id = ?", FORM_COLUMNS))
        .bind(form_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(form_from_row).transpose()
}

pub async fn get_form_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Form>> {
    let row = sqlx::query(&format!("SELECT {} FROM forms WHERE slug = ?", FORM_COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(form_from_row).transpose()
}

/// Whether another form already uses `slug`
pub async fn slug_taken(
    conn: &mut SqliteConnection,
    slug: &str,
    except: Option<Uuid>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forms WHERE slug = ? AND id != ?")
        .bind(slug)
        .bind(except.map(|id| id.to_string()).unwrap_or_default())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

pub async fn list_forms_by_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Form>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM forms WHERE created_by = ? ORDER BY created_at DESC",
        FORM_COLUMNS
    ))
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(form_from_row).collect()
}

/// Hard delete; content snapshots cascade, responses are kept
pub async fn delete_form(pool: &SqlitePool, form_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM forms WHERE id = ?")
        .bind(form_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load one stage's snapshot, `None` when that stage was never written
pub async fn load_content(
    conn: &mut SqliteConnection,
    form_id: Uuid,
    stage: ContentStage,
) -> Result<Option<FormContent>> {
    let content: Option<String> =
        sqlx::query_scalar("SELECT content FROM form_content WHERE form_id = ? AND stage = ?")
            .bind(form_id.to_string())
            .bind(stage.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    content
        .map(|json| serde_json::from_str::<FormContent>(&json).map_err(Error::from))
        .transpose()
}

/// Pool convenience wrapper around [`load_content`]
pub async fn fetch_content(
    pool: &SqlitePool,
    form_id: Uuid,
    stage: ContentStage,
) -> Result<Option<FormContent>> {
    let mut conn = pool.acquire().await?;
    load_content(&mut conn, form_id, stage).await
}

/// Write a snapshot into its stage, replacing what was there
pub async fn upsert_content(
    conn: &mut SqliteConnection,
    form_id: Uuid,
    staged: &StagedContent,
) -> Result<()> {
    let content = serde_json::to_string(&staged.content)?;

    sqlx::query(
        r#"
        INSERT INTO form_content (form_id, stage, content, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(form_id, stage) DO UPDATE SET
            content = excluded.content,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(form_id.to_string())
    .bind(staged.stage.as_str())
    .bind(&content)
    .bind(time::to_db(&time::now()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}
