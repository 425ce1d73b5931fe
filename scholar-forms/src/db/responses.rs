//! Form responses (append-only)

use scholar_common::models::FormResponse;
use scholar_common::{time, Result};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::forms::parse_uuid;

pub async fn insert_response(pool: &SqlitePool, response: &FormResponse) -> Result<()> {
    let answers = serde_json::to_string(&response.answers)?;

    sqlx::query(
        r#"
        INSERT INTO form_responses (id, form_id, respondent_id, answers, submitted_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(response.id.to_string())
    .bind(response.form_id.to_string())
    .bind(&response.respondent_id)
    .bind(&answers)
    .bind(time::to_db(&response.submitted_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_responses(pool: &SqlitePool, form_id: Uuid) -> Result<Vec<FormResponse>> {
    let rows = sqlx::query(
        r#"
        SELECT id, form_id, respondent_id, answers, submitted_at
        FROM form_responses
        WHERE form_id = ?
        ORDER BY submitted_at
        "#,
    )
    .bind(form_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let form_id: String = row.get("form_id");
            let answers: String = row.get("answers");
            let submitted_at: String = row.get("submitted_at");
            Ok(FormResponse {
                id: parse_uuid(&id)?,
                form_id: parse_uuid(&form_id)?,
                respondent_id: row.get("respondent_id"),
                answers: serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&answers)?,
                submitted_at: time::from_db(&submitted_at)?,
            })
        })
        .collect()
}

/// Count earlier responses of one respondent (submission-limit policy)
pub async fn count_by_respondent(pool: &SqlitePool, form_id: Uuid, respondent_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM form_responses WHERE form_id = ? AND respondent_id = ?",
    )
    .bind(form_id.to_string())
    .bind(respondent_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
