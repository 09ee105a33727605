use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountStatus, Event, EventStatus, Registration, Role, User};

// -- JWT Claims --

/// JWT claims shared by rollcall-api (REST middleware) and rollcall-gateway
/// (WebSocket identify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
}

/// `token` is only issued when the new account is already approved.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: User,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub department: String,
    pub venue: String,
    pub starts_at: NaiveDateTime,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceResponse {
    pub event_id: Uuid,
    pub registered: u32,
    pub checked_in: u32,
}

// -- Registrations / passes --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassResponse {
    pub registration_id: Uuid,
    pub payload: String,
    pub qr_image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub registration: Registration,
    pub event: Event,
    pub pass: PassResponse,
}

// -- Check-in --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckInRequest {
    /// Decoded QR text as read by the scanner.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInResult {
    CheckedIn,
    AlreadyCheckedIn,
    InvalidCode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub result: CheckInResult,
    pub message: String,
    pub registration: Option<Registration>,
    pub attendee_name: Option<String>,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub status: Option<AccountStatus>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub department: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    pub students: u32,
    pub organizers: u32,
    pub admins: u32,
    pub pending_organizers: u32,
    pub pending_events: u32,
    pub approved_events: u32,
    pub rejected_events: u32,
    pub registrations: u32,
    pub check_ins: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
