use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use rollcall_db::queries::EventQuery;
use rollcall_types::api::{Claims, EventFilter, StatsResponse, UserFilter};
use rollcall_types::models::{AccountStatus, Event, EventStatus, Role, User};

use crate::auth::AppState;
use crate::error::{ApiError, ApiPath, ApiQuery};
use crate::with_db;

// Every handler here sits behind `require_admin`.

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> Result<Json<Vec<User>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_users(filter.status, filter.role)).await?;
    Ok(Json(rows.into_iter().map(User::from).collect()))
}

pub async fn approve_user(
    state: State<AppState>,
    path: ApiPath<Uuid>,
    claims: Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    set_user_status(state, path, claims, AccountStatus::Approved).await
}

pub async fn reject_user(
    state: State<AppState>,
    path: ApiPath<Uuid>,
    claims: Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    set_user_status(state, path, claims, AccountStatus::Rejected).await
}

pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let rows = with_db(&state, move |db| {
        db.list_events(&EventQuery {
            status: filter.status,
            department: filter.department.as_deref().filter(|d| !d.trim().is_empty()),
            organizer_id: None,
        })
    })
    .await?;
    Ok(Json(rows.into_iter().map(Event::from).collect()))
}

pub async fn approve_event(
    state: State<AppState>,
    path: ApiPath<Uuid>,
    claims: Extension<Claims>,
) -> Result<Json<Event>, ApiError> {
    set_event_status(state, path, claims, EventStatus::Approved).await
}

pub async fn reject_event(
    state: State<AppState>,
    path: ApiPath<Uuid>,
    claims: Extension<Claims>,
) -> Result<Json<Event>, ApiError> {
    set_event_status(state, path, claims, EventStatus::Rejected).await
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let s = with_db(&state, |db| db.stats()).await?;
    Ok(Json(StatsResponse {
        students: s.students,
        organizers: s.organizers,
        admins: s.admins,
        pending_organizers: s.pending_organizers,
        pending_events: s.pending_events,
        approved_events: s.approved_events,
        rejected_events: s.rejected_events,
        registrations: s.registrations,
        check_ins: s.check_ins,
    }))
}

async fn set_user_status(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    status: AccountStatus,
) -> Result<Json<User>, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    // Students and admins are approved on creation and stay that way
    if user.role != Role::Organizer {
        return Err(ApiError::conflict("only organizer accounts need approval"));
    }

    let updated = with_db(&state, move |db| {
        if !db.set_user_status(user_id, status)? {
            return Ok(None);
        }
        db.get_user_by_id(user_id)
    })
    .await?
    .ok_or(ApiError::NotFound("user"))?;

    info!("{} marked organizer {} as {}", claims.name, updated.email, status);
    Ok(Json(updated.into()))
}

async fn set_event_status(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    status: EventStatus,
) -> Result<Json<Event>, ApiError> {
    let updated = with_db(&state, move |db| {
        if !db.set_event_status(event_id, status)? {
            return Ok(None);
        }
        db.get_event(event_id)
    })
    .await?
    .ok_or(ApiError::NotFound("event"))?;

    info!("{} marked event {} '{}' as {}", claims.name, event_id, updated.title, status);
    Ok(Json(updated.into()))
}
