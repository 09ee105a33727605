//! Registrations and the check-in transition.
//!
//! Both operations are read-inspect-write sequences. They run inside a
//! single transaction on the shared connection so that two scanners (or two
//! registration clicks) racing on the same row serialize: one wins, the
//! other observes the result.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::{debug, info};
use uuid::Uuid;

use rollcall_types::models::{EventStatus, RegistrationStatus};

use crate::Database;
use crate::models::{
    EventRow, RegistrationRow, format_timestamp, opt_timestamp_col, parse_col, timestamp_col,
};
use crate::queries::{
    EVENT_SELECT, OptionalExt, is_constraint_violation, map_event_at, query_event_by_id,
};

const REGISTRATION_COLUMNS: &str =
    "r.id, r.event_id, r.user_id, r.qr_payload, r.status, r.registered_at, r.checked_in_at";

/// Everything needed to insert a registration. The payload is built by the
/// caller so the storage layer doesn't depend on the pass format.
pub struct NewRegistration<'a> {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub qr_payload: &'a str,
}

#[derive(Debug)]
pub enum RegisterOutcome {
    Created(RegistrationRow),
    AlreadyRegistered,
    EventNotFound,
    EventNotOpen,
    EventFull,
}

/// Who is holding the scanner.
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    pub user_id: Uuid,
    /// Admins may check in attendees for any event.
    pub is_admin: bool,
}

#[derive(Debug)]
pub enum CheckInOutcome {
    CheckedIn {
        registration: RegistrationRow,
        attendee_name: String,
    },
    /// Returned with the registration as it was already recorded.
    AlreadyCheckedIn {
        registration: RegistrationRow,
        attendee_name: String,
    },
    InvalidCode,
    /// The pass is real but belongs to someone else's event.
    NotEventOrganizer { event_id: Uuid },
}

impl Database {
    pub fn register_for_event(&self, new: &NewRegistration<'_>) -> Result<RegisterOutcome> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let event: Option<(String, Option<u32>)> = tx
                .query_row(
                    "SELECT status, capacity FROM events WHERE id = ?1",
                    [new.event_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((status, capacity)) = event else {
                return Ok(RegisterOutcome::EventNotFound);
            };
            if status != EventStatus::Approved.as_str() {
                return Ok(RegisterOutcome::EventNotOpen);
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM registrations WHERE event_id = ?1 AND user_id = ?2",
                    (new.event_id.to_string(), new.user_id.to_string()),
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(RegisterOutcome::AlreadyRegistered);
            }

            if let Some(capacity) = capacity {
                let taken: u32 = tx.query_row(
                    "SELECT COUNT(*) FROM registrations WHERE event_id = ?1",
                    [new.event_id.to_string()],
                    |row| row.get(0),
                )?;
                if taken >= capacity {
                    return Ok(RegisterOutcome::EventFull);
                }
            }

            let inserted = tx.execute(
                "INSERT INTO registrations (id, event_id, user_id, qr_payload, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    new.id.to_string(),
                    new.event_id.to_string(),
                    new.user_id.to_string(),
                    new.qr_payload,
                    RegistrationStatus::Registered.as_str(),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Ok(RegisterOutcome::AlreadyRegistered);
                }
                Err(e) => return Err(e.into()),
            }

            let row = query_registration(&tx, "r.id = ?1", &new.id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("registration {} vanished after insert", new.id))?;
            tx.commit()?;

            info!("User {} registered for event {}", new.user_id, new.event_id);
            Ok(RegisterOutcome::Created(row))
        })
    }

    pub fn get_registration(&self, id: Uuid) -> Result<Option<RegistrationRow>> {
        self.with_conn(|conn| query_registration(conn, "r.id = ?1", &id.to_string()))
    }

    /// A user's registrations, newest first, each paired with its event.
    pub fn list_registrations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(RegistrationRow, EventRow)>> {
        self.with_conn(|conn| {
            // Single JOIN instead of one event lookup per registration
            let sql = format!(
                "SELECT {REGISTRATION_COLUMNS}, ev.*
                 FROM registrations r
                 JOIN ({EVENT_SELECT}) ev ON ev.id = r.event_id
                 WHERE r.user_id = ?1
                 ORDER BY r.registered_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    let registration = map_registration(row)?;
                    let event = map_event_at(row, 7)?;
                    Ok((registration, event))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Admit the holder of `payload`.
    ///
    /// Lookup, ownership check, status flip and audit insert commit
    /// together or not at all.
    pub fn check_in(
        &self,
        payload: &str,
        scanner: Scanner,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let found: Option<(RegistrationRow, Uuid, String)> = tx
                .query_row(
                    &format!(
                        "SELECT {REGISTRATION_COLUMNS}, e.organizer_id, u.name
                         FROM registrations r
                         JOIN events e ON e.id = r.event_id
                         JOIN users u ON u.id = r.user_id
                         WHERE r.qr_payload = ?1"
                    ),
                    [payload],
                    |row| Ok((map_registration(row)?, parse_col(row, 7)?, row.get(8)?)),
                )
                .optional()?;

            let Some((registration, organizer_id, attendee_name)) = found else {
                return Ok(CheckInOutcome::InvalidCode);
            };

            if !scanner.is_admin && organizer_id != scanner.user_id {
                return Ok(CheckInOutcome::NotEventOrganizer {
                    event_id: registration.event_id,
                });
            }

            if registration.status == RegistrationStatus::CheckedIn {
                debug!("Registration {} already checked in", registration.id);
                return Ok(CheckInOutcome::AlreadyCheckedIn {
                    registration,
                    attendee_name,
                });
            }

            let stamp = format_timestamp(now);
            let changed = tx.execute(
                "UPDATE registrations SET status = ?2, checked_in_at = ?3
                 WHERE id = ?1 AND status = ?4",
                (
                    registration.id.to_string(),
                    RegistrationStatus::CheckedIn.as_str(),
                    &stamp,
                    RegistrationStatus::Registered.as_str(),
                ),
            )?;
            if changed != 1 {
                anyhow::bail!("registration {} changed status mid-transaction", registration.id);
            }

            tx.execute(
                "INSERT INTO participants (id, registration_id, event_id, user_id, checked_in_by, checked_in_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    registration.id.to_string(),
                    registration.event_id.to_string(),
                    registration.user_id.to_string(),
                    scanner.user_id.to_string(),
                    &stamp,
                ],
            )?;

            let updated = query_registration(&tx, "r.id = ?1", &registration.id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("registration {} vanished", registration.id))?;
            tx.commit()?;

            info!(
                "Checked in {} ({}) for event {}",
                attendee_name, updated.user_id, updated.event_id
            );
            Ok(CheckInOutcome::CheckedIn {
                registration: updated,
                attendee_name,
            })
        })
    }

    /// Look up the event a registration belongs to.
    pub fn get_registration_event(&self, registration_id: Uuid) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let event_id: Option<String> = conn
                .query_row(
                    "SELECT event_id FROM registrations WHERE id = ?1",
                    [registration_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            match event_id {
                Some(id) => query_event_by_id(conn, id.parse()?),
                None => Ok(None),
            }
        })
    }
}

fn query_registration(
    conn: &Connection,
    predicate: &str,
    value: &str,
) -> Result<Option<RegistrationRow>> {
    let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM registrations r WHERE {predicate}");
    conn.query_row(&sql, [value], map_registration).optional()
}

fn map_registration(row: &Row<'_>) -> rusqlite::Result<RegistrationRow> {
    Ok(RegistrationRow {
        id: parse_col(row, 0)?,
        event_id: parse_col(row, 1)?,
        user_id: parse_col(row, 2)?,
        qr_payload: row.get(3)?,
        status: parse_col(row, 4)?,
        registered_at: timestamp_col(row, 5)?,
        checked_in_at: opt_timestamp_col(row, 6)?,
    })
}
