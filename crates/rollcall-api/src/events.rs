use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use rollcall_db::models::{EventRow, NewEvent};
use rollcall_db::queries::EventQuery;
use rollcall_types::api::{AttendanceResponse, Claims, CreateEventRequest};
use rollcall_types::events::GatewayEvent;
use rollcall_types::models::{AccountStatus, Event, EventStatus, Participant, Role};

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::require_role;
use crate::with_db;

const MAX_TITLE_LEN: usize = 120;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub department: Option<String>,
}

/// GET /events lists the public catalogue (approved events only).
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let rows = with_db(&state, move |db| {
        db.list_events(&EventQuery {
            status: Some(EventStatus::Approved),
            department: query.department.as_deref().filter(|d| !d.trim().is_empty()),
            organizer_id: None,
        })
    })
    .await?;

    Ok(Json(rows.into_iter().map(Event::from).collect()))
}

/// Approved events are visible to everyone; others only to their owner and admins.
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Event>, ApiError> {
    let event = with_db(&state, move |db| db.get_event(event_id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    let visible = event.status == EventStatus::Approved || can_manage(&claims, &event);
    if !visible {
        return Err(ApiError::NotFound("event"));
    }

    Ok(Json(event.into()))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Organizer])?;

    let title = req.title.trim().to_string();
    let venue = req.venue.trim().to_string();
    let department = req.department.trim().to_string();
    let description = req.description.trim().to_string();

    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request("title must be 1-120 characters"));
    }
    if venue.is_empty() {
        return Err(ApiError::bad_request("venue is required"));
    }
    if department.is_empty() {
        return Err(ApiError::bad_request("department is required"));
    }
    if req.capacity == Some(0) {
        return Err(ApiError::bad_request("capacity must be at least 1"));
    }

    let event_id = Uuid::new_v4();
    let organizer_id = claims.sub;
    let starts_at = req.starts_at;
    let capacity = req.capacity;

    let created = with_db(&state, move |db| {
        // Tokens outlive approval changes, so re-check the account here
        let approved = db
            .get_user_by_id(organizer_id)?
            .is_some_and(|u| u.status == AccountStatus::Approved);
        if !approved {
            return Ok(None);
        }

        db.create_event(&NewEvent {
            id: event_id,
            organizer_id,
            title: &title,
            description: &description,
            department: &department,
            venue: &venue,
            starts_at,
            capacity,
        })?;
        db.get_event(event_id)
    })
    .await?
    .ok_or_else(|| ApiError::forbidden("organizer account is not approved"))?;

    info!("{} proposed event {} '{}'", claims.name, created.id, created.title);
    Ok((StatusCode::CREATED, Json(Event::from(created))))
}

/// GET /organizer/events returns the caller's own events in every status.
pub async fn my_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Event>>, ApiError> {
    require_role(&claims, &[Role::Organizer])?;

    let organizer_id = claims.sub;
    let rows = with_db(&state, move |db| {
        db.list_events(&EventQuery {
            organizer_id: Some(organizer_id),
            ..Default::default()
        })
    })
    .await?;

    Ok(Json(rows.into_iter().map(Event::from).collect()))
}

pub async fn delete_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let event = with_db(&state, move |db| db.get_event(event_id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    if event.organizer_id != claims.sub {
        return Err(ApiError::forbidden("only the organizer can delete this event"));
    }

    let deleted = with_db(&state, move |db| db.delete_event(event_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("event"));
    }

    state.dispatcher.broadcast(GatewayEvent::EventRemoved { event_id });
    info!("{} deleted event {} '{}'", claims.name, event_id, event.title);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_participants(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    load_managed_event(&state, event_id, &claims).await?;

    let rows = with_db(&state, move |db| db.list_participants(event_id)).await?;
    Ok(Json(rows.into_iter().map(Participant::from).collect()))
}

pub async fn attendance(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    load_managed_event(&state, event_id, &claims).await?;

    let counts = with_db(&state, move |db| db.attendance(event_id)).await?;
    Ok(Json(AttendanceResponse {
        event_id,
        registered: counts.registered,
        checked_in: counts.checked_in,
    }))
}

/// Owner or admin.
fn can_manage(claims: &Claims, event: &EventRow) -> bool {
    claims.role == Role::Admin || event.organizer_id == claims.sub
}

async fn load_managed_event(
    state: &AppState,
    event_id: Uuid,
    claims: &Claims,
) -> Result<EventRow, ApiError> {
    let event = with_db(state, move |db| db.get_event(event_id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    if !can_manage(claims, &event) {
        return Err(ApiError::forbidden("only the organizer or an admin can view this"));
    }
    Ok(event)
}
