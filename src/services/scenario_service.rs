use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::db::repositories::state_repository::StateRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::scenario::{BudgetSummary, Scenario, ScenarioState};
use crate::models::site::{CampaignSite, Site};
use crate::models::target::TargetArea;

const KEY_SCENARIO_STATE: &str = "scenarioState";

/// The scenario store: a set of named planning alternatives with exactly
/// one active, an undo history of whole-set snapshots, and write-through
/// persistence to the key-value state store on every transition.
pub struct ScenarioService {
    db: DbPool,
    state: RwLock<ScenarioState>,
}

impl ScenarioService {
    pub fn new(db: DbPool) -> AppResult<Self> {
        let state = load_state(&db)?;
        let service = Self {
            db,
            state: RwLock::new(state),
        };
        // Write the normalized state back so a fresh database starts from
        // a persisted default scenario.
        let snapshot = service.state.read().expect("scenario state lock poisoned").clone();
        service.persist(&snapshot)?;
        Ok(service)
    }

    /// Applies `apply` to a copy of the state, re-establishes invariants
    /// (which records an undo snapshot only when the scenario set actually
    /// changed), persists, then publishes. Failed operations leave both
    /// memory and storage untouched.
    fn commit<T>(&self, apply: impl FnOnce(&mut ScenarioState) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.state.write().expect("scenario state lock poisoned");
        let mut next = guard.clone();
        let output = apply(&mut next)?;
        next.normalize();
        self.persist(&next)?;
        *guard = next;
        Ok(output)
    }

    fn persist(&self, state: &ScenarioState) -> AppResult<()> {
        let json = serde_json::to_string(state)?;
        self.db
            .with_connection(|conn| StateRepository::upsert(conn, KEY_SCENARIO_STATE, &json))
    }

    pub fn create_scenario(
        &self,
        name: Option<&str>,
        budget: Option<f64>,
    ) -> AppResult<Scenario> {
        validate_budget(budget)?;
        self.commit(|state| {
            let name = name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Scenario {}", state.scenarios.len() + 1));

            let scenario = Scenario::new(name, budget);
            state.active_id = scenario.id.clone();
            state.scenarios.push(scenario.clone());
            info!(target: "app::scenario", scenario_id = %scenario.id, name = %scenario.name, "scenario created");
            Ok(scenario)
        })
    }

    pub fn remove_scenario(&self, scenario_id: &str) -> AppResult<()> {
        self.commit(|state| {
            if state.scenario(scenario_id).is_none() {
                return Err(AppError::not_found());
            }
            state.scenarios.retain(|scenario| scenario.id != scenario_id);
            info!(target: "app::scenario", %scenario_id, "scenario removed");
            Ok(())
        })
    }

    pub fn set_active(&self, scenario_id: &str) -> AppResult<()> {
        self.commit(|state| {
            if state.scenario(scenario_id).is_none() {
                return Err(AppError::not_found());
            }
            state.active_id = scenario_id.to_string();
            Ok(())
        })
    }

    /// A blank rename is discarded; the previous name is retained.
    pub fn rename_scenario(&self, scenario_id: &str, new_name: &str) -> AppResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            debug!(target: "app::scenario", %scenario_id, "blank rename discarded");
            return Ok(());
        }
        self.commit(|state| {
            let scenario = state
                .scenario_mut(scenario_id)
                .ok_or_else(AppError::not_found)?;
            scenario.name = new_name.to_string();
            Ok(())
        })
    }

    pub fn set_budget(&self, scenario_id: &str, budget: Option<f64>) -> AppResult<()> {
        validate_budget(budget)?;
        self.commit(|state| {
            let scenario = state
                .scenario_mut(scenario_id)
                .ok_or_else(AppError::not_found)?;
            scenario.budget = budget;
            Ok(())
        })
    }

    /// Appends the site unless it is already in the scenario, tagging it
    /// with the target area active at the time of selection.
    pub fn add_site(
        &self,
        scenario_id: &str,
        site: Site,
        active_area: Option<&TargetArea>,
    ) -> AppResult<()> {
        self.add_sites(scenario_id, vec![site], active_area)
            .map(|_| ())
    }

    /// Bulk add. Sites already present are skipped; when nothing new is
    /// added the operation records no undo snapshot.
    pub fn add_sites(
        &self,
        scenario_id: &str,
        sites: Vec<Site>,
        active_area: Option<&TargetArea>,
    ) -> AppResult<usize> {
        self.commit(|state| {
            let scenario = state
                .scenario_mut(scenario_id)
                .ok_or_else(AppError::not_found)?;
            let mut added = 0;
            for site in sites {
                if scenario.contains_site(&site.id) {
                    continue;
                }
                scenario
                    .sites
                    .push(CampaignSite::from_site(site, active_area));
                added += 1;
            }
            debug!(target: "app::scenario", %scenario_id, added, "sites added to scenario");
            Ok(added)
        })
    }

    pub fn remove_site(&self, scenario_id: &str, site_id: &str) -> AppResult<()> {
        self.commit(|state| {
            let scenario = state
                .scenario_mut(scenario_id)
                .ok_or_else(AppError::not_found)?;
            scenario.sites.retain(|site| site.id() != site_id);
            Ok(())
        })
    }

    pub fn clear_scenario(&self, scenario_id: &str) -> AppResult<()> {
        self.commit(|state| {
            let scenario = state
                .scenario_mut(scenario_id)
                .ok_or_else(AppError::not_found)?;
            scenario.sites.clear();
            Ok(())
        })
    }

    /// Pops one history entry and restores the scenario set to the new
    /// last snapshot. A history of one entry cannot be undone away.
    pub fn undo(&self) -> AppResult<()> {
        let mut guard = self.state.write().expect("scenario state lock poisoned");
        if guard.history.len() <= 1 {
            debug!(target: "app::scenario", "undo ignored, nothing to undo");
            return Ok(());
        }
        let mut next = guard.clone();
        next.history.pop();
        next.scenarios = next
            .history
            .last()
            .cloned()
            .unwrap_or_else(|| vec![Scenario::new("Scenario 1", None)]);
        if next.scenario(&next.active_id).is_none() {
            next.active_id = next.scenarios[0].id.clone();
        }
        self.persist(&next)?;
        *guard = next;
        info!(target: "app::scenario", "undo applied");
        Ok(())
    }

    pub fn scenarios(&self) -> Vec<Scenario> {
        self.state
            .read()
            .expect("scenario state lock poisoned")
            .scenarios
            .clone()
    }

    pub fn scenario(&self, scenario_id: &str) -> Option<Scenario> {
        self.state
            .read()
            .expect("scenario state lock poisoned")
            .scenario(scenario_id)
            .cloned()
    }

    pub fn active_scenario(&self) -> Scenario {
        let state = self.state.read().expect("scenario state lock poisoned");
        state
            .active_scenario()
            .cloned()
            .unwrap_or_else(|| Scenario::new("Scenario 1", None))
    }

    pub fn active_id(&self) -> String {
        self.state
            .read()
            .expect("scenario state lock poisoned")
            .active_id
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.state
            .read()
            .expect("scenario state lock poisoned")
            .history
            .len()
    }

    pub fn active_budget_summary(&self) -> BudgetSummary {
        self.active_scenario().budget_summary()
    }
}

fn load_state(db: &DbPool) -> AppResult<ScenarioState> {
    let stored = db.with_connection(|conn| StateRepository::get(conn, KEY_SCENARIO_STATE))?;
    let mut state = match stored {
        Some(json) => match serde_json::from_str::<ScenarioState>(&json) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    target: "app::scenario",
                    error = %err,
                    "persisted scenario state unreadable, starting fresh"
                );
                ScenarioState::initial()
            }
        },
        None => ScenarioState::initial(),
    };
    state.normalize();
    Ok(state)
}

fn validate_budget(budget: Option<f64>) -> AppResult<()> {
    if let Some(value) = budget {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::validation(
                "budget must be a non-negative number",
            ));
        }
    }
    Ok(())
}
