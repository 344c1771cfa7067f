use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::scenario::{BudgetSummary, Scenario};
use crate::models::site::CampaignSite;

/// The fixed set of display columns a media schedule table can show.
/// Reordering is allowed; adding or removing columns is not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleColumn {
    MediaOwner,
    Format,
    Name,
    TargetAreaName,
    Postcode,
    FrameId,
    Cost,
}

pub const DEFAULT_COLUMN_ORDER: [ScheduleColumn; 7] = [
    ScheduleColumn::MediaOwner,
    ScheduleColumn::Format,
    ScheduleColumn::Name,
    ScheduleColumn::TargetAreaName,
    ScheduleColumn::Postcode,
    ScheduleColumn::FrameId,
    ScheduleColumn::Cost,
];

impl ScheduleColumn {
    /// True iff `order` contains every column exactly once.
    pub fn is_permutation(order: &[ScheduleColumn]) -> bool {
        if order.len() != DEFAULT_COLUMN_ORDER.len() {
            return false;
        }
        DEFAULT_COLUMN_ORDER
            .iter()
            .all(|column| order.contains(column))
    }
}

fn default_column_order() -> Vec<ScheduleColumn> {
    DEFAULT_COLUMN_ORDER.to_vec()
}

/// An independently persisted export artifact: a scenario-like site list
/// plus campaign metadata and a user-orderable column list. Legacy records
/// lack the metadata and column fields, hence the serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub budget: Option<f64>,
    pub sites: Vec<CampaignSite>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_column_order")]
    pub column_order: Vec<ScheduleColumn>,
}

impl Schedule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            budget: None,
            sites: Vec::new(),
            client_name: None,
            campaign_name: None,
            start_date: None,
            end_date: None,
            column_order: default_column_order(),
        }
    }

    /// Structural deep copy of a scenario. The schedule owns its own site
    /// list afterwards; no data is shared with the source scenario.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            budget: scenario.budget,
            sites: scenario.sites.clone(),
            client_name: None,
            campaign_name: None,
            start_date: None,
            end_date: None,
            column_order: default_column_order(),
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

/// The persisted schedule slice: the collection plus the active id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    pub schedules: Vec<Schedule>,
    pub active_id: Option<String>,
}

impl ScheduleState {
    pub fn schedule(&self, id: &str) -> Option<&Schedule> {
        self.schedules.iter().find(|schedule| schedule.id == id)
    }

    pub fn schedule_mut(&mut self, id: &str) -> Option<&mut Schedule> {
        self.schedules.iter_mut().find(|schedule| schedule.id == id)
    }

    pub fn normalize(&mut self) {
        let active_is_valid = self
            .active_id
            .as_ref()
            .map(|id| self.schedules.iter().any(|schedule| &schedule.id == id))
            .unwrap_or(false);
        if !active_is_valid {
            self.active_id = self.schedules.first().map(|schedule| schedule.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_ids_serialize_camel_case() {
        let json = serde_json::to_value(ScheduleColumn::TargetAreaName).unwrap();
        assert_eq!(json, json!("targetAreaName"));
        let json = serde_json::to_value(ScheduleColumn::MediaOwner).unwrap();
        assert_eq!(json, json!("mediaOwner"));
    }

    #[test]
    fn permutation_check_rejects_duplicates_and_short_lists() {
        assert!(ScheduleColumn::is_permutation(&DEFAULT_COLUMN_ORDER));

        let mut reversed = DEFAULT_COLUMN_ORDER.to_vec();
        reversed.reverse();
        assert!(ScheduleColumn::is_permutation(&reversed));

        let mut duplicated = DEFAULT_COLUMN_ORDER.to_vec();
        duplicated[0] = ScheduleColumn::Cost;
        assert!(!ScheduleColumn::is_permutation(&duplicated));

        assert!(!ScheduleColumn::is_permutation(&DEFAULT_COLUMN_ORDER[..6]));
    }

    #[test]
    fn legacy_record_deserializes_with_default_columns() {
        let schedule: Schedule = serde_json::from_value(json!({
            "id": "abc",
            "name": "Spring Push",
            "budget": 5000.0,
            "sites": []
        }))
        .unwrap();

        assert_eq!(schedule.column_order, DEFAULT_COLUMN_ORDER.to_vec());
        assert_eq!(schedule.client_name, None);
    }
}
