use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::site::CampaignSite;

/// A named, budgeted planning alternative. Site order is insertion order;
/// no two sites share an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub budget: Option<f64>,
    pub sites: Vec<CampaignSite>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, budget: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            budget,
            sites: Vec::new(),
        }
    }

    pub fn contains_site(&self, site_id: &str) -> bool {
        self.sites.iter().any(|site| site.id() == site_id)
    }

    pub fn total_cost(&self) -> f64 {
        self.sites.iter().map(|site| site.cost()).sum()
    }

    pub fn budget_summary(&self) -> BudgetSummary {
        BudgetSummary::derive(self.budget, self.total_cost())
    }
}

/// Derived budget figures; always recomputed, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub total_cost: f64,
    pub remaining_budget: Option<f64>,
    pub is_over_budget: bool,
}

impl BudgetSummary {
    pub fn derive(budget: Option<f64>, total_cost: f64) -> Self {
        let remaining_budget = budget.map(|budget| budget - total_cost);
        Self {
            total_cost,
            remaining_budget,
            is_over_budget: remaining_budget.map(|value| value < 0.0).unwrap_or(false),
        }
    }
}

/// The persisted scenario slice: the scenario set, the active id, and the
/// undo history of whole-set snapshots. The last history entry always
/// equals the live set, and the history never drops below one entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub scenarios: Vec<Scenario>,
    pub active_id: String,
    pub history: Vec<Vec<Scenario>>,
}

impl ScenarioState {
    pub fn initial() -> Self {
        let scenario = Scenario::new("Scenario 1", None);
        let active_id = scenario.id.clone();
        let scenarios = vec![scenario];
        let history = vec![scenarios.clone()];
        Self {
            scenarios,
            active_id,
            history,
        }
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|scenario| scenario.id == id)
    }

    pub fn scenario_mut(&mut self, id: &str) -> Option<&mut Scenario> {
        self.scenarios.iter_mut().find(|scenario| scenario.id == id)
    }

    pub fn active_scenario(&self) -> Option<&Scenario> {
        self.scenario(&self.active_id)
    }

    /// Re-establishes the structural invariants after a mutation or after
    /// loading persisted state: at least one scenario, a valid active id,
    /// and a non-empty history ending in the live set.
    pub fn normalize(&mut self) {
        if self.scenarios.is_empty() {
            self.scenarios.push(Scenario::new("Scenario 1", None));
        }
        if self.scenario(&self.active_id).is_none() {
            self.active_id = self.scenarios[0].id.clone();
        }
        if self.history.is_empty() {
            self.history.push(self.scenarios.clone());
        } else if self.history.last() != Some(&self.scenarios) {
            self.history.push(self.scenarios.clone());
        }
    }
}
