//! Database row types. They map directly to SQLite rows and are converted
//! into rollcall-types models at the API boundary.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use rollcall_types::models::{
    AccountStatus, Event, EventStatus, Participant, Registration, RegistrationStatus, Role, User,
};

/// Format written for timestamps produced in Rust. SQLite's own
/// `datetime('now')` is the same without the fraction.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Format for event start times (local wall-clock, no zone).
pub const STARTS_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub status: AccountStatus,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub status: AccountStatus,
    pub department: Option<&'a str>,
}

pub struct EventRow {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub organizer_name: String,
    pub title: String,
    pub description: String,
    pub department: String,
    pub venue: String,
    pub starts_at: NaiveDateTime,
    pub capacity: Option<u32>,
    pub status: EventStatus,
    pub registered_count: u32,
    pub created_at: DateTime<Utc>,
}

pub struct NewEvent<'a> {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub department: &'a str,
    pub venue: &'a str,
    pub starts_at: NaiveDateTime,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub qr_payload: String,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

pub struct ParticipantRow {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub attendee_name: String,
    pub attendee_email: String,
    pub checked_in_by: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Attendance {
    pub registered: u32,
    pub checked_in: u32,
}

#[derive(Debug, Default)]
pub struct StatsRow {
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

// -- Column helpers --

/// Read a TEXT column and parse it, reporting failures as conversion errors
/// on that column.
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(crate) fn opt_timestamp_col(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp_col(row, idx).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn starts_at_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, STARTS_AT_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS[.fff]" without a zone;
/// they are always UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_PARSE_FORMAT)
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .map_err(|e| anyhow!("bad timestamp '{}': {}", raw, e))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// -- Conversions into API models --

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            status: row.status,
            department: row.department,
            created_at: row.created_at,
        }
    }
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            organizer_id: row.organizer_id,
            organizer_name: row.organizer_name,
            title: row.title,
            description: row.description,
            department: row.department,
            venue: row.venue,
            starts_at: row.starts_at,
            capacity: row.capacity,
            status: row.status,
            registered_count: row.registered_count,
            created_at: row.created_at,
        }
    }
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        Self {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            qr_payload: row.qr_payload,
            status: row.status,
            registered_at: row.registered_at,
            checked_in_at: row.checked_in_at,
        }
    }
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            registration_id: row.registration_id,
            event_id: row.event_id,
            user_id: row.user_id,
            attendee_name: row.attendee_name,
            attendee_email: row.attendee_email,
            checked_in_by: row.checked_in_by,
            checked_in_at: row.checked_in_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_sqlite_and_rust_timestamps() {
        let from_sqlite = parse_timestamp("2026-10-18 09:30:00").unwrap();
        assert_eq!(from_sqlite.hour(), 9);

        let now = Utc::now();
        let written = format_timestamp(now);
        let back = parse_timestamp(&written).unwrap();
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());

        let rfc = parse_timestamp("2026-10-18T09:30:00Z").unwrap();
        assert_eq!(rfc.day(), 18);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
