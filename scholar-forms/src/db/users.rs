//! User accounts

use scholar_common::models::{Role, User};
use scholar_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::forms::parse_uuid;

const USER_COLUMNS: &str = "id, email, first_name, last_name, department, role, active, created_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");
    let active: i64 = row.get("active");
    let created_at: String = row.get("created_at");

    Ok(User {
        id: parse_uuid(&id)?,
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        department: row.get("department"),
        role: Role::parse(&role)
            .ok_or_else(|| Error::Internal(format!("Unknown role in database: {}", role)))?,
        active: active != 0,
        created_at: time::from_db(&created_at)?,
    })
}

fn map_unique_email(e: sqlx::Error, email: &str) -> Error {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::Conflict(format!("a user with email {} already exists", email))
        }
        other => Error::Database(other),
    }
}

pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, first_name, last_name, department, role, active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.department)
    .bind(user.role.as_str())
    .bind(user.active as i64)
    .bind(time::to_db(&user.created_at))
    .execute(pool)
    .await
    .map_err(|e| map_unique_email(e, &user.email))?;

    Ok(())
}

pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, first_name = ?, last_name = ?, department = ?, role = ?, active = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.department)
    .bind(user.role.as_str())
    .bind(user.active as i64)
    .bind(user.id.to_string())
    .execute(pool)
    .await
    .map_err(|e| map_unique_email(e, &user.email))?;

    Ok(())
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY last_name, first_name",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(user_from_row).collect()
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
