use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::repositories::state_repository::StateRepository;
use crate::error::AppResult;
use crate::models::schedule::{Schedule, ScheduleState};

const USER_VERSION: i32 = 1;

/// Storage keys involved in the legacy migration. `exportedScenario` was
/// the single-schedule record written by earlier releases; it is wrapped
/// into the schedule collection once and never read again.
const KEY_SCHEDULE_STATE: &str = "mediaSchedules";
const KEY_LEGACY_SCHEDULE: &str = "exportedScenario";

/// Id assigned to the schedule produced by the legacy migration.
pub const INITIAL_SCHEDULE_ID: &str = "initial";

pub fn run(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migration_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )?;

    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "app::db", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        conn.execute(&format!("PRAGMA user_version = {USER_VERSION}"), [])?;
        record_migration(conn, 1, "Wrap legacy single-schedule record into the schedule collection")?;
    }

    Ok(())
}

/// If a legacy single-schedule record exists and no multi-schedule record
/// does, wrap it into a one-element collection with id `"initial"` and
/// discard the legacy record.
fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    if StateRepository::get(conn, KEY_SCHEDULE_STATE)?.is_some() {
        return Ok(());
    }
    let Some(legacy) = StateRepository::get(conn, KEY_LEGACY_SCHEDULE)? else {
        return Ok(());
    };

    match serde_json::from_str::<Schedule>(&legacy) {
        Ok(mut schedule) => {
            schedule.id = INITIAL_SCHEDULE_ID.to_string();
            let state = ScheduleState {
                schedules: vec![schedule],
                active_id: Some(INITIAL_SCHEDULE_ID.to_string()),
            };
            let json = serde_json::to_string(&state)?;
            StateRepository::upsert(conn, KEY_SCHEDULE_STATE, &json)?;
            StateRepository::delete(conn, KEY_LEGACY_SCHEDULE)?;
            info!(target: "app::db", "legacy schedule record migrated");
        }
        Err(err) => {
            warn!(
                target: "app::db",
                error = %err,
                "legacy schedule record unreadable, leaving it in place"
            );
        }
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, description: &str) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO migration_history (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, description, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
