use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{info, warn};

use rollcall_db::checkin::{CheckInOutcome, Scanner};
use rollcall_pass::AdmissionPass;
use rollcall_types::api::{CheckInRequest, CheckInResponse, CheckInResult, Claims};
use rollcall_types::events::GatewayEvent;
use rollcall_types::models::{Registration, Role};

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson};
use crate::middleware::require_role;
use crate::with_db;

/// POST /checkin: admit the holder of a scanned pass.
///
/// Unknown codes (404) and repeat scans (409) still carry a
/// `CheckInResponse` body with the result and, for repeats, the earlier record.
pub async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CheckInRequest>,
) -> Result<(StatusCode, Json<CheckInResponse>), ApiError> {
    require_role(&claims, &[Role::Organizer, Role::Admin])?;

    // Anything that isn't a well-formed pass can't match a stored payload
    let pass = match AdmissionPass::parse(&req.payload) {
        Ok(pass) => pass,
        Err(e) => {
            warn!("{} scanned an unreadable code: {}", claims.name, e);
            return Ok(invalid_code());
        }
    };

    let scanner = Scanner {
        user_id: claims.sub,
        is_admin: claims.role == Role::Admin,
    };
    let outcome = with_db(&state, move |db| db.check_in(&pass.payload(), scanner, Utc::now())).await?;

    match outcome {
        CheckInOutcome::CheckedIn { registration, attendee_name } => {
            if let Some(checked_in_at) = registration.checked_in_at {
                state.dispatcher.broadcast(GatewayEvent::CheckIn {
                    event_id: registration.event_id,
                    registration_id: registration.id,
                    user_id: registration.user_id,
                    attendee_name: attendee_name.clone(),
                    checked_in_at,
                });
            }

            info!("{} admitted {} to event {}", claims.name, attendee_name, registration.event_id);
            Ok((
                StatusCode::OK,
                Json(CheckInResponse {
                    result: CheckInResult::CheckedIn,
                    message: format!("{attendee_name} checked in"),
                    registration: Some(Registration::from(registration)),
                    attendee_name: Some(attendee_name),
                }),
            ))
        }
        CheckInOutcome::AlreadyCheckedIn { registration, attendee_name } => {
            warn!("Repeat scan for {} ({})", attendee_name, registration.id);
            Ok((
                StatusCode::CONFLICT,
                Json(CheckInResponse {
                    result: CheckInResult::AlreadyCheckedIn,
                    message: "already checked in".into(),
                    registration: Some(Registration::from(registration)),
                    attendee_name: Some(attendee_name),
                }),
            ))
        }
        CheckInOutcome::InvalidCode => {
            warn!("{} scanned an unknown code", claims.name);
            Ok(invalid_code())
        }
        CheckInOutcome::NotEventOrganizer { event_id } => {
            warn!("{} tried to scan a pass for event {} they don't run", claims.name, event_id);
            Err(ApiError::forbidden("only the event's organizer can check in attendees"))
        }
    }
}

fn invalid_code() -> (StatusCode, Json<CheckInResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(CheckInResponse {
            result: CheckInResult::InvalidCode,
            message: "invalid code".into(),
            registration: None,
            attendee_name: None,
        }),
    )
}
