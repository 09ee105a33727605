use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('student', 'organizer', 'admin')),
                status      TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
                department  TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE events (
                id            TEXT PRIMARY KEY,
                organizer_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title         TEXT NOT NULL,
                description   TEXT NOT NULL DEFAULT '',
                department    TEXT NOT NULL,
                venue         TEXT NOT NULL,
                starts_at     TEXT NOT NULL,
                capacity      INTEGER,
                status        TEXT NOT NULL DEFAULT 'pending'
                              CHECK (status IN ('pending', 'approved', 'rejected')),
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_events_status ON events(status, starts_at);
            CREATE INDEX idx_events_organizer ON events(organizer_id);

            CREATE TABLE registrations (
                id             TEXT PRIMARY KEY,
                event_id       TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                qr_payload     TEXT NOT NULL UNIQUE,
                status         TEXT NOT NULL DEFAULT 'registered'
                               CHECK (status IN ('registered', 'checked-in')),
                registered_at  TEXT NOT NULL DEFAULT (datetime('now')),
                checked_in_at  TEXT,
                UNIQUE(event_id, user_id)
            );

            CREATE INDEX idx_registrations_user ON registrations(user_id);

            CREATE TABLE participants (
                id               TEXT PRIMARY KEY,
                registration_id  TEXT NOT NULL REFERENCES registrations(id) ON DELETE CASCADE,
                event_id         TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                checked_in_by    TEXT NOT NULL REFERENCES users(id),
                checked_in_at    TEXT NOT NULL
            );

            CREATE INDEX idx_participants_event ON participants(event_id, checked_in_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
