pub mod admin;
pub mod auth;
pub mod checkin;
pub mod error;
pub mod events;
pub mod middleware;
pub mod registrations;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
};
use tracing::error;

use rollcall_db::Database;
use rollcall_gateway::connection;

use crate::auth::AppState;
use crate::error::ApiError;

/// Every route the service exposes. Cross-cutting layers (CORS, tracing)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(feed_upgrade));

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/{event_id}", get(events::get_event).delete(events::delete_event))
        .route("/events/{event_id}/participants", get(events::list_participants))
        .route("/events/{event_id}/attendance", get(events::attendance))
        .route("/events/{event_id}/register", post(registrations::register_for_event))
        .route("/organizer/events", get(events::my_events))
        .route("/registrations", get(registrations::my_registrations))
        .route("/registrations/{registration_id}/pass", get(registrations::get_pass))
        .route("/registrations/{registration_id}/pass/image", get(registrations::pass_image))
        .route("/checkin", post(checkin::check_in))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/approve", post(admin::approve_user))
        .route("/admin/users/{user_id}/reject", post(admin::reject_user))
        .route("/admin/events", get(admin::list_events))
        .route("/admin/events/{event_id}/approve", post(admin::approve_event))
        .route("/admin/events/{event_id}/reject", post(admin::reject_event))
        .route("/admin/stats", get(admin::stats))
        .route_layer(from_fn(middleware::require_admin))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn feed_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}

/// Run blocking database work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::from)
}
