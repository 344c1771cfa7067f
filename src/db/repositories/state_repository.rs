use rusqlite::{named_params, Connection, OptionalExtension};

use crate::error::AppResult;

/// Access to the `app_state` table: JSON documents stored under a handful
/// of well-known keys (`scenarioState`, `mediaSchedules`, plus the legacy
/// key the migration consumes). Values are opaque here; callers own the
/// serialization.
pub struct StateRepository;

impl StateRepository {
    /// The stored JSON document, or `None` when the key has never been
    /// written.
    pub fn get(conn: &Connection, key: &str) -> AppResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    pub fn upsert(conn: &Connection, key: &str, value: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO app_state (key, value)
                VALUES (:key, :value)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP
            "#,
            named_params! {":key": key, ":value": value},
        )?;

        Ok(())
    }

    pub fn delete(conn: &Connection, key: &str) -> AppResult<()> {
        conn.execute("DELETE FROM app_state WHERE key = ?1", [key])?;
        Ok(())
    }
}
