use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::db::repositories::state_repository::StateRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::scenario::{BudgetSummary, Scenario};
use crate::models::schedule::{Schedule, ScheduleColumn, ScheduleState};
use crate::models::site::CampaignSite;
use crate::services::catalog_service::CatalogService;

const KEY_SCHEDULE_STATE: &str = "mediaSchedules";

/// Campaign metadata edits. `None` leaves a field unchanged; a value that
/// trims to empty clears it.
#[derive(Debug, Default, Clone)]
pub struct CampaignInfoUpdate {
    pub client_name: Option<String>,
    pub campaign_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// The media schedule store: an independently persisted collection of
/// export artifacts. Schedules share nothing with the scenarios they came
/// from; edits on either side never leak across.
pub struct ScheduleService {
    db: DbPool,
    state: RwLock<ScheduleState>,
}

impl ScheduleService {
    pub fn new(db: DbPool) -> AppResult<Self> {
        let state = load_state(&db)?;
        Ok(Self {
            db,
            state: RwLock::new(state),
        })
    }

    fn commit<T>(&self, apply: impl FnOnce(&mut ScheduleState) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.state.write().expect("schedule state lock poisoned");
        let mut next = guard.clone();
        let output = apply(&mut next)?;
        next.normalize();
        self.persist(&next)?;
        *guard = next;
        Ok(output)
    }

    fn persist(&self, state: &ScheduleState) -> AppResult<()> {
        let json = serde_json::to_string(state)?;
        self.db
            .with_connection(|conn| StateRepository::upsert(conn, KEY_SCHEDULE_STATE, &json))
    }

    pub fn create_schedule(&self, name: Option<&str>) -> AppResult<Schedule> {
        self.commit(|state| {
            let name = name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Schedule {}", state.schedules.len() + 1));

            let schedule = Schedule::new(name);
            state.active_id = Some(schedule.id.clone());
            state.schedules.push(schedule.clone());
            info!(target: "app::schedule", schedule_id = %schedule.id, name = %schedule.name, "schedule created");
            Ok(schedule)
        })
    }

    /// Exports a scenario as a new schedule: a structural deep copy of its
    /// id, name, budget, and sites, with empty campaign metadata and the
    /// default column order. Re-exporting a scenario replaces the schedule
    /// previously exported from it.
    pub fn export_from_scenario(&self, scenario: &Scenario) -> AppResult<Schedule> {
        self.commit(|state| {
            let schedule = Schedule::from_scenario(scenario);
            match state.schedule_mut(&schedule.id) {
                Some(existing) => *existing = schedule.clone(),
                None => state.schedules.push(schedule.clone()),
            }
            state.active_id = Some(schedule.id.clone());
            info!(
                target: "app::schedule",
                schedule_id = %schedule.id,
                sites = schedule.sites.len(),
                "scenario exported to schedule"
            );
            Ok(schedule)
        })
    }

    pub fn remove_schedule(&self, schedule_id: &str) -> AppResult<()> {
        self.commit(|state| {
            if state.schedule(schedule_id).is_none() {
                return Err(AppError::not_found());
            }
            state.schedules.retain(|schedule| schedule.id != schedule_id);
            info!(target: "app::schedule", %schedule_id, "schedule removed");
            Ok(())
        })
    }

    pub fn set_active(&self, schedule_id: &str) -> AppResult<()> {
        self.commit(|state| {
            if state.schedule(schedule_id).is_none() {
                return Err(AppError::not_found());
            }
            state.active_id = Some(schedule_id.to_string());
            Ok(())
        })
    }

    /// A blank rename is discarded; the previous name is retained.
    pub fn rename_schedule(&self, schedule_id: &str, new_name: &str) -> AppResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            debug!(target: "app::schedule", %schedule_id, "blank rename discarded");
            return Ok(());
        }
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            schedule.name = new_name.to_string();
            Ok(())
        })
    }

    pub fn set_budget(&self, schedule_id: &str, budget: Option<f64>) -> AppResult<()> {
        if let Some(value) = budget {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(
                    "budget must be a non-negative number",
                ));
            }
        }
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            schedule.budget = budget;
            Ok(())
        })
    }

    pub fn set_campaign_info(
        &self,
        schedule_id: &str,
        update: CampaignInfoUpdate,
    ) -> AppResult<()> {
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            apply_field(&mut schedule.client_name, update.client_name);
            apply_field(&mut schedule.campaign_name, update.campaign_name);
            apply_field(&mut schedule.start_date, update.start_date);
            apply_field(&mut schedule.end_date, update.end_date);
            Ok(())
        })
    }

    /// Adds a site looked up in the full catalog (not the filtered view),
    /// tagged "Uncategorized". A site already on the schedule is skipped.
    pub fn add_site_manually(
        &self,
        schedule_id: &str,
        site_id: &str,
        catalog: &CatalogService,
    ) -> AppResult<()> {
        let site = catalog.site_by_id(site_id).ok_or_else(AppError::not_found)?;
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            if schedule.contains_site(&site.id) {
                debug!(target: "app::schedule", %schedule_id, %site_id, "site already on schedule");
                return Ok(());
            }
            schedule.sites.push(CampaignSite::uncategorized(site));
            Ok(())
        })
    }

    pub fn remove_site(&self, schedule_id: &str, site_id: &str) -> AppResult<()> {
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            schedule.sites.retain(|site| site.id() != site_id);
            Ok(())
        })
    }

    /// Reorders the display columns. The input must be a permutation of
    /// the fixed column set; anything else is rejected and the previous
    /// order is kept.
    pub fn set_column_order(
        &self,
        schedule_id: &str,
        new_order: Vec<ScheduleColumn>,
    ) -> AppResult<()> {
        if !ScheduleColumn::is_permutation(&new_order) {
            return Err(AppError::validation(
                "column order must be a permutation of the fixed column set",
            ));
        }
        self.commit(|state| {
            let schedule = state
                .schedule_mut(schedule_id)
                .ok_or_else(AppError::not_found)?;
            schedule.column_order = new_order;
            Ok(())
        })
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.state
            .read()
            .expect("schedule state lock poisoned")
            .schedules
            .clone()
    }

    pub fn schedule(&self, schedule_id: &str) -> Option<Schedule> {
        self.state
            .read()
            .expect("schedule state lock poisoned")
            .schedule(schedule_id)
            .cloned()
    }

    pub fn active_schedule(&self) -> Option<Schedule> {
        let state = self.state.read().expect("schedule state lock poisoned");
        let active_id = state.active_id.as_deref()?;
        state.schedule(active_id).cloned()
    }

    pub fn budget_summary(&self, schedule_id: &str) -> AppResult<BudgetSummary> {
        self.schedule(schedule_id)
            .map(|schedule| schedule.budget_summary())
            .ok_or_else(AppError::not_found)
    }
}

fn apply_field(field: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        let trimmed = value.trim();
        *field = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

fn load_state(db: &DbPool) -> AppResult<ScheduleState> {
    let stored = db.with_connection(|conn| StateRepository::get(conn, KEY_SCHEDULE_STATE))?;
    let mut state = match stored {
        Some(json) => match serde_json::from_str::<ScheduleState>(&json) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    target: "app::schedule",
                    error = %err,
                    "persisted schedule state unreadable, starting empty"
                );
                ScheduleState::default()
            }
        },
        None => ScheduleState::default(),
    };
    state.normalize();
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::INITIAL_SCHEDULE_ID;
    use crate::models::schedule::DEFAULT_COLUMN_ORDER;
    use crate::models::site::Site;
    use crate::services::scenario_service::ScenarioService;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn setup() -> (ScheduleService, DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("planner.sqlite");
        let pool = DbPool::new(&db_path).unwrap();
        let service = ScheduleService::new(pool.clone()).unwrap();
        (service, pool, temp_dir)
    }

    fn site(id: &str, cost: f64) -> Site {
        Site {
            id: id.into(),
            name: format!("Site {id}"),
            format: "Billboard".into(),
            lat: 51.5,
            lng: -0.1,
            cost,
        }
    }

    fn catalog_with(sites: &[Site]) -> CatalogService {
        let catalog = CatalogService::new();
        let mut csv = String::from("frameId,panelName,formatName,lat,lng,cost\n");
        for site in sites {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                site.id, site.name, site.format, site.lat, site.lng, site.cost
            ));
        }
        catalog.load_csv(&csv).unwrap();
        catalog
    }

    #[test]
    fn export_is_a_deep_copy_decoupled_from_the_scenario() {
        let (schedules, pool, _guard) = setup();
        let scenarios = ScenarioService::new(pool).unwrap();
        let scenario_id = scenarios.active_id();
        scenarios.add_site(&scenario_id, site("a", 100.0), None).unwrap();

        let exported = schedules
            .export_from_scenario(&scenarios.active_scenario())
            .unwrap();
        assert_eq!(exported.sites.len(), 1);
        assert_eq!(exported.client_name, None);

        // Mutating the schedule leaves the scenario alone...
        schedules.remove_site(&exported.id, "a").unwrap();
        assert_eq!(scenarios.active_scenario().sites.len(), 1);

        // ...and mutating the scenario leaves the schedule alone.
        scenarios.add_site(&scenario_id, site("b", 50.0), None).unwrap();
        assert!(schedules.schedule(&exported.id).unwrap().sites.is_empty());
    }

    #[test]
    fn re_export_replaces_the_previous_export_of_that_scenario() {
        let (schedules, pool, _guard) = setup();
        let scenarios = ScenarioService::new(pool).unwrap();
        let scenario_id = scenarios.active_id();

        schedules
            .export_from_scenario(&scenarios.active_scenario())
            .unwrap();
        scenarios.add_site(&scenario_id, site("a", 100.0), None).unwrap();
        let second = schedules
            .export_from_scenario(&scenarios.active_scenario())
            .unwrap();

        assert_eq!(schedules.schedules().len(), 1);
        assert_eq!(schedules.schedule(&second.id).unwrap().sites.len(), 1);
    }

    #[test]
    fn column_order_accepts_permutations_and_rejects_everything_else() {
        let (service, pool, _guard) = setup();
        let schedule = service.create_schedule(Some("Launch")).unwrap();

        let mut reversed = DEFAULT_COLUMN_ORDER.to_vec();
        reversed.reverse();
        service.set_column_order(&schedule.id, reversed.clone()).unwrap();
        assert_eq!(service.schedule(&schedule.id).unwrap().column_order, reversed);

        let mut duplicated = DEFAULT_COLUMN_ORDER.to_vec();
        duplicated[0] = ScheduleColumn::Cost;
        let err = service.set_column_order(&schedule.id, duplicated).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(service.schedule(&schedule.id).unwrap().column_order, reversed);

        // The accepted order is persisted.
        drop(service);
        let revived = ScheduleService::new(pool).unwrap();
        assert_eq!(revived.schedule(&schedule.id).unwrap().column_order, reversed);
    }

    #[test]
    fn manual_add_tags_uncategorized_and_is_idempotent() {
        let (service, _pool, _guard) = setup();
        let schedule = service.create_schedule(None).unwrap();
        let catalog = catalog_with(&[site("a", 100.0)]);

        service.add_site_manually(&schedule.id, "a", &catalog).unwrap();
        service.add_site_manually(&schedule.id, "a", &catalog).unwrap();

        let schedule = service.schedule(&schedule.id).unwrap();
        assert_eq!(schedule.sites.len(), 1);
        assert_eq!(schedule.sites[0].target_area_name, "Uncategorized");
        assert_eq!(schedule.sites[0].target_area_id, None);

        let err = service
            .add_site_manually(&schedule.id, "missing", &catalog)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn campaign_info_updates_only_the_provided_fields() {
        let (service, _pool, _guard) = setup();
        let schedule = service.create_schedule(None).unwrap();

        service
            .set_campaign_info(
                &schedule.id,
                CampaignInfoUpdate {
                    client_name: Some("Acme".into()),
                    campaign_name: Some("Spring Push".into()),
                    start_date: Some("2026-03-01".into()),
                    end_date: Some("2026-03-28".into()),
                },
            )
            .unwrap();

        service
            .set_campaign_info(
                &schedule.id,
                CampaignInfoUpdate {
                    client_name: Some("  ".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let schedule = service.schedule(&schedule.id).unwrap();
        assert_eq!(schedule.client_name, None);
        assert_eq!(schedule.campaign_name.as_deref(), Some("Spring Push"));
        assert_eq!(schedule.start_date.as_deref(), Some("2026-03-01"));
    }

    #[test]
    fn removing_the_active_schedule_falls_back_to_the_first_remaining() {
        let (service, _pool, _guard) = setup();
        let first = service.create_schedule(None).unwrap();
        let second = service.create_schedule(None).unwrap();
        assert_eq!(service.active_schedule().unwrap().id, second.id);

        service.remove_schedule(&second.id).unwrap();
        assert_eq!(service.active_schedule().unwrap().id, first.id);

        service.remove_schedule(&first.id).unwrap();
        assert!(service.active_schedule().is_none());
    }

    #[test]
    fn legacy_single_schedule_record_is_wrapped_once() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("planner.sqlite");

        // Seed the database the way an earlier release would have left it:
        // an app_state table holding only the legacy record, user_version 0.
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE app_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (CURRENT_TIMESTAMP)
                );
                "#,
            )
            .unwrap();
            conn.execute(
                "INSERT INTO app_state (key, value) VALUES ('exportedScenario', ?1)",
                [r#"{"id":"old","name":"Legacy Plan","budget":5000.0,"sites":[]}"#],
            )
            .unwrap();
        }

        let pool = DbPool::new(&db_path).unwrap();
        let service = ScheduleService::new(pool.clone()).unwrap();

        let schedules = service.schedules();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].id, INITIAL_SCHEDULE_ID);
        assert_eq!(schedules[0].name, "Legacy Plan");
        assert_eq!(schedules[0].column_order, DEFAULT_COLUMN_ORDER.to_vec());
        assert_eq!(service.active_schedule().unwrap().id, INITIAL_SCHEDULE_ID);

        // The legacy record is gone and never read again.
        let legacy = pool
            .with_connection(|conn| StateRepository::get(conn, "exportedScenario"))
            .unwrap();
        assert!(legacy.is_none());
    }
}
