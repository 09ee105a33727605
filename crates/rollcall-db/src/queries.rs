use crate::Database;
use crate::models::{
    Attendance, EventRow, NewEvent, NewUser, ParticipantRow, STARTS_AT_FORMAT, StatsRow, UserRow,
    parse_col, starts_at_col, timestamp_col,
};
use anyhow::Result;
use rollcall_types::models::{AccountStatus, EventStatus, Role};
use rusqlite::{Connection, ErrorCode, Row, params_from_iter};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password, role, status, department, created_at";

pub(crate) const EVENT_SELECT: &str = "
    SELECT e.id, e.organizer_id, u.name, e.title, e.description, e.department, e.venue,
           e.starts_at, e.capacity, e.status, e.created_at,
           (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id)
    FROM events e
    JOIN users u ON u.id = e.organizer_id";

/// Optional filters for event listings; `None` fields don't constrain.
#[derive(Debug, Default, Clone)]
pub struct EventQuery<'a> {
    pub status: Option<EventStatus>,
    pub department: Option<&'a str>,
    pub organizer_id: Option<Uuid>,
}

impl Database {
    // -- Users --

    /// Returns false when the email is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password, role, status, department)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.status.as_str(),
                    user.department,
                ],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            conn.query_row(&sql, [email], map_user).optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(
        &self,
        status: Option<AccountStatus>,
        role: Option<Role>,
    ) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut params = Vec::new();
            if let Some(status) = status {
                params.push(status.as_str().to_string());
                clauses.push(format!("status = ?{}", params.len()));
            }
            if let Some(role) = role {
                params.push(role.as_str().to_string());
                clauses.push(format!("role = ?{}", params.len()));
            }

            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users{} ORDER BY created_at DESC, name",
                where_clause(&clauses)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no such user exists.
    pub fn set_user_status(&self, id: Uuid, status: AccountStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET status = ?2 WHERE id = ?1",
                (id.to_string(), status.as_str()),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Events --

    pub fn create_event(&self, event: &NewEvent<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, organizer_id, title, description, department, venue, starts_at, capacity, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    event.id.to_string(),
                    event.organizer_id.to_string(),
                    event.title,
                    event.description,
                    event.department,
                    event.venue,
                    event.starts_at.format(STARTS_AT_FORMAT).to_string(),
                    event.capacity,
                    EventStatus::Pending.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event_by_id(conn, id))
    }

    pub fn list_events(&self, query: &EventQuery<'_>) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut params = Vec::new();
            if let Some(status) = query.status {
                params.push(status.as_str().to_string());
                clauses.push(format!("e.status = ?{}", params.len()));
            }
            if let Some(department) = query.department {
                params.push(department.to_string());
                clauses.push(format!("e.department = ?{} COLLATE NOCASE", params.len()));
            }
            if let Some(organizer_id) = query.organizer_id {
                params.push(organizer_id.to_string());
                clauses.push(format!("e.organizer_id = ?{}", params.len()));
            }

            let sql = format!(
                "{EVENT_SELECT}{} ORDER BY e.starts_at, e.title",
                where_clause(&clauses)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_event_status(&self, id: Uuid, status: EventStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = ?2 WHERE id = ?1",
                (id.to_string(), status.as_str()),
            )?;
            Ok(changed == 1)
        })
    }

    /// Deletes the event; registrations and participant rows go with it.
    pub fn delete_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id.to_string()])?;
            Ok(changed == 1)
        })
    }

    pub fn attendance(&self, event_id: Uuid) -> Result<Attendance> {
        self.with_conn(|conn| {
            let (registered, checked_in) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(status = 'checked-in'), 0)
                 FROM registrations WHERE event_id = ?1",
                [event_id.to_string()],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
            )?;
            Ok(Attendance { registered, checked_in })
        })
    }

    /// Check-in audit rows for an event, newest first.
    pub fn list_participants(&self, event_id: Uuid) -> Result<Vec<ParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.registration_id, p.event_id, p.user_id, u.name, u.email,
                        p.checked_in_by, p.checked_in_at
                 FROM participants p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.event_id = ?1
                 ORDER BY p.checked_in_at DESC",
            )?;
            let rows = stmt
                .query_map([event_id.to_string()], |row| {
                    Ok(ParticipantRow {
                        id: parse_col(row, 0)?,
                        registration_id: parse_col(row, 1)?,
                        event_id: parse_col(row, 2)?,
                        user_id: parse_col(row, 3)?,
                        attendee_name: row.get(4)?,
                        attendee_email: row.get(5)?,
                        checked_in_by: parse_col(row, 6)?,
                        checked_in_at: timestamp_col(row, 7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Admin --

    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users WHERE role = 'student'),
                    (SELECT COUNT(*) FROM users WHERE role = 'organizer'),
                    (SELECT COUNT(*) FROM users WHERE role = 'admin'),
                    (SELECT COUNT(*) FROM users WHERE role = 'organizer' AND status = 'pending'),
                    (SELECT COUNT(*) FROM events WHERE status = 'pending'),
                    (SELECT COUNT(*) FROM events WHERE status = 'approved'),
                    (SELECT COUNT(*) FROM events WHERE status = 'rejected'),
                    (SELECT COUNT(*) FROM registrations),
                    (SELECT COUNT(*) FROM participants)",
                [],
                |row| {
                    Ok(StatsRow {
                        students: row.get(0)?,
                        organizers: row.get(1)?,
                        admins: row.get(2)?,
                        pending_organizers: row.get(3)?,
                        pending_events: row.get(4)?,
                        approved_events: row.get(5)?,
                        rejected_events: row.get(6)?,
                        registrations: row.get(7)?,
                        check_ins: row.get(8)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], map_user).optional()
}

pub(crate) fn query_event_by_id(conn: &Connection, id: Uuid) -> Result<Option<EventRow>> {
    let sql = format!("{EVENT_SELECT} WHERE e.id = ?1");
    conn.query_row(&sql, [id.to_string()], map_event).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: parse_col(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: parse_col(row, 4)?,
        status: parse_col(row, 5)?,
        department: row.get(6)?,
        created_at: timestamp_col(row, 7)?,
    })
}

pub(crate) fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    map_event_at(row, 0)
}

/// Event columns in `EVENT_SELECT` order, starting at `offset`.
pub(crate) fn map_event_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: parse_col(row, offset)?,
        organizer_id: parse_col(row, offset + 1)?,
        organizer_name: row.get(offset + 2)?,
        title: row.get(offset + 3)?,
        description: row.get(offset + 4)?,
        department: row.get(offset + 5)?,
        venue: row.get(offset + 6)?,
        starts_at: starts_at_col(row, offset + 7)?,
        capacity: row.get(offset + 8)?,
        status: parse_col(row, offset + 9)?,
        created_at: timestamp_col(row, offset + 10)?,
        registered_count: row.get(offset + 11)?,
    })
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
