//! Student roster persistence
//!
//! `student_id` (the external identifier) is unique and compared
//! case-insensitively; bulk imports upsert on it.

use scholar_common::models::{Student, StudentStatus};
use scholar_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::forms::parse_uuid;

const STUDENT_COLUMNS: &str = "id, student_id, name, date_of_birth, gender, level, class_name, centre, \
     guardian_name, guardian_email, guardian_phone, address, emergency_contact_name, \
     emergency_contact_phone, medical_notes, status, additional_data, created_at, updated_at";

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let additional_data: String = row.get("additional_data");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Student {
        id: parse_uuid(&id)?,
        student_id: row.get("student_id"),
        name: row.get("name"),
        date_of_birth: row.get("date_of_birth"),
        gender: row.get("gender"),
        level: row.get("level"),
        class_name: row.get("class_name"),
        centre: row.get("centre"),
        guardian_name: row.get("guardian_name"),
        guardian_email: row.get("guardian_email"),
        guardian_phone: row.get("guardian_phone"),
        address: row.get("address"),
        emergency_contact_name: row.get("emergency_contact_name"),
        emergency_contact_phone: row.get("emergency_contact_phone"),
        medical_notes: row.get("medical_notes"),
        status: StudentStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown student status in database: {}", status)))?,
        additional_data: serde_json::from_str(&additional_data)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

/// Insert or fully rewrite a student row (keyed by `id`)
pub async fn save_student(pool: &SqlitePool, student: &Student) -> Result<()> {
    let additional_data = serde_json::to_string(&student.additional_data)?;

    sqlx::query(
        r#"
        INSERT INTO students (id, student_id, name, date_of_birth, gender, level, class_name, centre,
                              guardian_name, guardian_email, guardian_phone, address,
                              emergency_contact_name, emergency_contact_phone, medical_notes,
                              status, additional_data, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            student_id = excluded.student_id,
            name = excluded.name,
            date_of_birth = excluded.date_of_birth,
            gender = excluded.gender,
            level = excluded.level,
            class_name = excluded.class_name,
            centre = excluded.centre,
            guardian_name = excluded.guardian_name,
            guardian_email = excluded.guardian_email,
            guardian_phone = excluded.guardian_phone,
            address = excluded.address,
            emergency_contact_name = excluded.emergency_contact_name,
            emergency_contact_phone = excluded.emergency_contact_phone,
            medical_notes = excluded.medical_notes,
            status = excluded.status,
            additional_data = excluded.additional_data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(student.id.to_string())
    .bind(&student.student_id)
    .bind(&student.name)
    .bind(&student.date_of_birth)
    .bind(&student.gender)
    .bind(&student.level)
    .bind(&student.class_name)
    .bind(&student.centre)
    .bind(&student.guardian_name)
    .bind(&student.guardian_email)
    .bind(&student.guardian_phone)
    .bind(&student.address)
    .bind(&student.emergency_contact_name)
    .bind(&student.emergency_contact_phone)
    .bind(&student.medical_notes)
    .bind(student.status.as_str())
    .bind(&additional_data)
    .bind(time::to_db(&student.created_at))
    .bind(time::to_db(&student.updated_at))
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::Conflict(format!("student id {} already exists", student.student_id))
        }
        other => Error::Database(other),
    })?;

    Ok(())
}

pub async fn get_student(pool: &SqlitePool, id: Uuid) -> Result<Option<Student>> {
    let row = sqlx::query(&format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(student_from_row).transpose()
}

pub async fn find_by_external_id(pool: &SqlitePool, student_id: &str) -> Result<Option<Student>> {
    let row = sqlx::query(&format!("SELECT {} FROM students WHERE student_id = ?", STUDENT_COLUMNS))
        .bind(student_id.trim())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(student_from_row).transpose()
}

/// List students, optionally filtered by status and a name/identifier search
pub async fn list_students(
    pool: &SqlitePool,
    status: Option<StudentStatus>,
    search: Option<&str>,
) -> Result<Vec<Student>> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM students
        WHERE (? IS NULL OR status = ?)
          AND (? IS NULL OR name LIKE ? ESCAPE '\' OR student_id LIKE ? ESCAPE '\')
        ORDER BY student_id
        "#,
        STUDENT_COLUMNS
    ))
    .bind(status.map(|s| s.as_str()))
    .bind(status.map(|s| s.as_str()))
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    rows.iter().map(student_from_row).collect()
}

pub async fn delete_student(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
