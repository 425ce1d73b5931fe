//! Events and attendance
//!
//! Events are owned by their creator; only the owner edits, deletes or marks
//! attendance. Any signed-in user may read an event and register.

use scholar_common::models::{Attendee, AttendeeStatus, Event, EventInput, EventStatus};
use scholar_common::{time, Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db;

fn check_input(input: &EventInput) -> Result<()> {
    let problems = input.problems();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(problems.join("; ")))
    }
}

pub async fn get_event(pool: &SqlitePool, event_id: Uuid) -> Result<Event> {
    db::events::get_event(pool, event_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("event {}", event_id)))
}

async fn load_owned(pool: &SqlitePool, event_id: Uuid, requester_id: Uuid) -> Result<Event> {
    let event = get_event(pool, event_id).await?;
    if !event.is_owned_by(requester_id) {
        return Err(Error::Forbidden("only the event's creator may do this".to_string()));
    }
    Ok(event)
}

pub async fn create_event(pool: &SqlitePool, owner_id: Uuid, input: EventInput) -> Result<Event> {
    check_input(&input)?;
    let now = time::now();

    let event = Event {
        id: Uuid::new_v4(),
        title: input.title.trim().to_string(),
        description: input.description,
        event_type: input.event_type,
        location: input.location,
        capacity: input.capacity,
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        status: input.status.unwrap_or_default(),
        created_by: owner_id,
        settings: input.settings,
        created_at: now,
        updated_at: now,
    };
    db::events::save_event(pool, &event).await?;

    info!(event_id = %event.id, "Event created");
    Ok(event)
}

pub async fn update_event(
    pool: &SqlitePool,
    event_id: Uuid,
    requester_id: Uuid,
    input: EventInput,
) -> Result<Event> {
    let mut event = load_owned(pool, event_id, requester_id).await?;
    check_input(&input)?;

    if let Some(capacity) = input.capacity {
        let registered = db::events::count_attendees(pool, event.id).await?;
        if capacity < registered {
            return Err(Error::Conflict(format!(
                "capacity {} is below the {} attendees already registered",
                capacity, registered
            )));
        }
    }

    event.title = input.title.trim().to_string();
    event.description = input.description;
    event.event_type = input.event_type;
    event.location = input.location;
    event.capacity = input.capacity;
    event.starts_at = input.starts_at;
    event.ends_at = input.ends_at;
    if let Some(status) = input.status {
        event.status = status;
    }
    event.settings = input.settings;
    event.updated_at = time::now();
    db::events::save_event(pool, &event).await?;

    info!(event_id = %event.id, "Event updated");
    Ok(event)
}

pub async fn delete_event(pool: &SqlitePool, event_id: Uuid, requester_id: Uuid) -> Result<()> {
    let event = load_owned(pool, event_id, requester_id).await?;
    db::events::delete_event(pool, event.id).await?;
    info!(event_id = %event.id, "Event deleted");
    Ok(())
}

pub async fn list_events(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Event>> {
    db::events::list_events_by_owner(pool, owner_id).await
}

pub async fn list_attendees(pool: &SqlitePool, event_id: Uuid) -> Result<Vec<Attendee>> {
    let event = get_event(pool, event_id).await?;
    db::events::list_attendees(pool, event.id).await
}

/// Register `user_id` for an event. Cancelled or full events refuse.
pub async fn register_attendee(pool: &SqlitePool, event_id: Uuid, user_id: Uuid) -> Result<Attendee> {
    let event = get_event(pool, event_id).await?;
    if event.status == EventStatus::Cancelled {
        return Err(Error::Conflict("event is cancelled".to_string()));
    }
    if let Some(capacity) = event.capacity {
        if db::events::count_attendees(pool, event.id).await? >= capacity {
            return Err(Error::Conflict("event is at capacity".to_string()));
        }
    }
    if db::users::get_user(pool, user_id).await?.is_none() {
        return Err(Error::not_found(format!("user {}", user_id)));
    }

    let attendee = Attendee {
        id: Uuid::new_v4(),
        event_id: event.id,
        user_id,
        status: AttendeeStatus::Registered,
        registered_at: time::now(),
        attended_at: None,
    };
    db::events::insert_attendee(pool, &attendee).await?;

    info!(event_id = %event.id, user_id = %user_id, "Attendee registered");
    Ok(attendee)
}

/// Owner-only status change of one attendee
pub async fn set_attendee_status(
    pool: &SqlitePool,
    event_id: Uuid,
    attendee_id: Uuid,
    requester_id: Uuid,
    status: AttendeeStatus,
) -> Result<Attendee> {
    let event = load_owned(pool, event_id, requester_id).await?;
    let mut attendee = db::events::get_attendee(pool, event.id, attendee_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("attendee {}", attendee_id)))?;

    attendee.transition_to(status, time::now());
    db::events::update_attendee(pool, &attendee).await?;
    Ok(attendee)
}
