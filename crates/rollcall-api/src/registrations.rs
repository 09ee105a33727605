use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use rollcall_db::checkin::{NewRegistration, RegisterOutcome};
use rollcall_db::models::RegistrationRow;
use rollcall_pass::AdmissionPass;
use rollcall_types::api::{Claims, PassResponse, RegistrationResponse};
use rollcall_types::models::{Event, Registration, Role};

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiPath};
use crate::middleware::require_role;
use crate::with_db;

pub async fn register_for_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Student])?;

    let pass = AdmissionPass::new(event_id, claims.sub);
    let registration_id = Uuid::new_v4();

    let (outcome, event) = with_db(&state, move |db| {
        let payload = pass.payload();
        let outcome = db.register_for_event(&NewRegistration {
            id: registration_id,
            event_id: pass.event_id,
            user_id: pass.user_id,
            qr_payload: &payload,
        })?;
        // Re-read so registered_count includes this registration
        let event = db.get_event(pass.event_id)?;
        Ok((outcome, event))
    })
    .await?;

    let row = match outcome {
        RegisterOutcome::Created(row) => row,
        RegisterOutcome::EventNotFound => return Err(ApiError::NotFound("event")),
        RegisterOutcome::EventNotOpen => {
            return Err(ApiError::conflict("event is not open for registration"));
        }
        RegisterOutcome::EventFull => return Err(ApiError::conflict("event is full")),
        RegisterOutcome::AlreadyRegistered => return Err(ApiError::conflict("already registered")),
    };
    let event = event.ok_or(ApiError::NotFound("event"))?;

    info!("{} registered for '{}'", claims.name, event.title);
    let body = RegistrationResponse {
        pass: pass_response(&state, &row),
        registration: row.into(),
        event: event.into(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /registrations returns the caller's registrations with event and pass.
pub async fn my_registrations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RegistrationResponse>>, ApiError> {
    require_role(&claims, &[Role::Student])?;

    let user_id = claims.sub;
    let rows = with_db(&state, move |db| db.list_registrations_for_user(user_id)).await?;

    let body = rows
        .into_iter()
        .map(|(registration, event)| RegistrationResponse {
            pass: pass_response(&state, &registration),
            registration: Registration::from(registration),
            event: Event::from(event),
        })
        .collect();
    Ok(Json(body))
}

pub async fn get_pass(
    State(state): State<AppState>,
    ApiPath(registration_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PassResponse>, ApiError> {
    let row = load_own_registration(&state, registration_id, &claims).await?;
    Ok(Json(pass_response(&state, &row)))
}

/// Proxy the rendered QR image so clients never talk to the renderer directly.
pub async fn pass_image(
    State(state): State<AppState>,
    ApiPath(registration_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_own_registration(&state, registration_id, &claims).await?;
    let url = image_url(&state, &row);

    let image = state
        .http
        .get(&url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(ApiError::Upstream)?
        .bytes()
        .await
        .map_err(ApiError::Upstream)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        image,
    ))
}

/// Registrations are only visible to the student holding them; anyone
/// else gets a 404.
async fn load_own_registration(
    state: &AppState,
    registration_id: Uuid,
    claims: &Claims,
) -> Result<RegistrationRow, ApiError> {
    let row = with_db(state, move |db| db.get_registration(registration_id))
        .await?
        .ok_or(ApiError::NotFound("registration"))?;

    if row.user_id != claims.sub {
        warn!("{} asked for someone else's pass {}", claims.sub, registration_id);
        return Err(ApiError::NotFound("registration"));
    }
    Ok(row)
}

fn image_url(state: &AppStateInner, row: &RegistrationRow) -> String {
    state
        .qr
        .image_url(&AdmissionPass::new(row.event_id, row.user_id))
}

fn pass_response(state: &AppStateInner, row: &RegistrationRow) -> PassResponse {
    PassResponse {
        registration_id: row.id,
        payload: row.qr_payload.clone(),
        qr_image_url: image_url(state, row),
    }
}
