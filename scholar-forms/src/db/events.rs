//! Events and their attendees

use scholar_common::models::{Attendee, AttendeeStatus, Event, EventStatus};
use scholar_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::forms::parse_uuid;

const EVENT_COLUMNS: &str = "id, title, description, event_type, location, capacity, starts_at, \
                             ends_at, status, created_by, settings, created_at, updated_at";

const ATTENDEE_COLUMNS: &str = "id, event_id, user_id, status, registered_at, attended_at";

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let created_by: String = row.get("created_by");
    let settings: String = row.get("settings");
    let starts_at: String = row.get("starts_at");
    let ends_at: String = row.get("ends_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Event {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        event_type: row.get("event_type"),
        location: row.get("location"),
        capacity: row.get("capacity"),
        starts_at: time::from_db(&starts_at)?,
        ends_at: time::from_db(&ends_at)?,
        status: EventStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown event status in database: {}", status)))?,
        created_by: parse_uuid(&created_by)?,
        settings: serde_json::from_str(&settings)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

fn attendee_from_row(row: &SqliteRow) -> Result<Attendee> {
    let id: String = row.get("id");
    let event_id: String = row.get("event_id");
    let user_id: String = row.get("user_id");
    let status: String = row.get("status");
    let registered_at: String = row.get("registered_at");

    Ok(Attendee {
        id: parse_uuid(&id)?,
        event_id: parse_uuid(&event_id)?,
        user_id: parse_uuid(&user_id)?,
        status: AttendeeStatus::parse(&status).ok_or_else(|| {
            Error::Internal(format!("Unknown attendee status in database: {}", status))
        })?,
        registered_at: time::from_db(&registered_at)?,
        attended_at: time::from_db_opt(row.get("attended_at"))?,
    })
}

/// Insert or fully rewrite an event row
pub async fn save_event(pool: &SqlitePool, event: &Event) -> Result<()> {
    let settings = serde_json::to_string(&event.settings)?;

    sqlx::query(
        r#"
        INSERT INTO events (id, title, description, event_type, location, capacity, starts_at,
                            ends_at, status, created_by, settings, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            event_type = excluded.event_type,
            location = excluded.location,
            capacity = excluded.capacity,
            starts_at = excluded.starts_at,
            ends_at = excluded.ends_at,
            status = excluded.status,
            settings = excluded.settings,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.event_type)
    .bind(&event.location)
    .bind(event.capacity)
    .bind(time::to_db(&event.starts_at))
    .bind(time::to_db(&event.ends_at))
    .bind(event.status.as_str())
    .bind(event.created_by.to_string())
    .bind(&settings)
    .bind(time::to_db(&event.created_at))
    .bind(time::to_db(&event.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_event(pool: &SqlitePool, id: Uuid) -> Result<Option<Event>> {
    let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(event_from_row).transpose()
}

pub async fn list_events_by_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Event>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM events WHERE created_by = ? ORDER BY starts_at",
        EVENT_COLUMNS
    ))
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(event_from_row).collect()
}

/// Delete an event; attendees cascade
pub async fn delete_event(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_attendees(pool: &SqlitePool, event_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_attendees WHERE event_id = ?")
        .bind(event_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert a registration. A second registration of the same user is a conflict.
pub async fn insert_attendee(pool: &SqlitePool, attendee: &Attendee) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_attendees (id, event_id, user_id, status, registered_at, attended_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attendee.id.to_string())
    .bind(attendee.event_id.to_string())
    .bind(attendee.user_id.to_string())
    .bind(attendee.status.as_str())
    .bind(time::to_db(&attendee.registered_at))
    .bind(attendee.attended_at.as_ref().map(time::to_db))
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::Conflict("user is already registered for this event".to_string())
        }
        other => Error::Database(other),
    })?;

    Ok(())
}

pub async fn get_attendee(pool: &SqlitePool, event_id: Uuid, id: Uuid) -> Result<Option<Attendee>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM event_attendees WHERE id = ? AND event_id = ?",
        ATTENDEE_COLUMNS
    ))
    .bind(id.to_string())
    .bind(event_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(attendee_from_row).transpose()
}

pub async fn list_attendees(pool: &SqlitePool, event_id: Uuid) -> Result<Vec<Attendee>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM event_attendees WHERE event_id = ? ORDER BY registered_at",
        ATTENDEE_COLUMNS
    ))
    .bind(event_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(attendee_from_row).collect()
}

pub async fn update_attendee(pool: &SqlitePool, attendee: &Attendee) -> Result<()> {
    sqlx::query("UPDATE event_attendees SET status = ?, attended_at = ? WHERE id = ?")
        .bind(attendee.status.as_str())
        .bind(attendee.attended_at.as_ref().map(time::to_db))
        .bind(attendee.id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
