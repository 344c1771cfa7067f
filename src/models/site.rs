use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::target::TargetArea;

pub const UNCATEGORIZED_AREA_NAME: &str = "Uncategorized";

/// A candidate advertising placement, immutable once loaded from the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    pub format: String,
    pub lat: f64,
    pub lng: f64,
    pub cost: f64,
}

/// One record as emitted by the spreadsheet bridge. The bridge is lenient
/// about types (ids may arrive as numbers, cost as a formatted string), so
/// every field is captured as raw JSON and normalized in `into_site`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawSiteRecord {
    #[serde(default)]
    pub frame_id: JsonValue,
    #[serde(default)]
    pub panel_name: JsonValue,
    #[serde(default)]
    pub format_name: JsonValue,
    #[serde(default)]
    pub lat: JsonValue,
    #[serde(default)]
    pub lng: JsonValue,
    #[serde(default)]
    pub cost: JsonValue,
}

impl RawSiteRecord {
    pub fn into_site(self) -> Site {
        Site {
            id: value_to_string(&self.frame_id),
            name: value_to_string(&self.panel_name),
            format: value_to_string(&self.format_name),
            lat: value_to_coordinate(&self.lat),
            lng: value_to_coordinate(&self.lng),
            cost: value_to_cost(&self.cost),
        }
    }
}

fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.trim().to_string(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

/// Coordinates that fail to parse stay NaN so downstream consumers can
/// detect them; the radius filter treats NaN distances as non-matches.
fn value_to_coordinate(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        JsonValue::String(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Costs fall back to 0.0 when unparseable, on every load path. Currency
/// symbols and thousands separators are stripped the way the sheet bridge
/// strips them.
pub fn value_to_cost(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(number) => number.as_f64().unwrap_or(0.0),
        JsonValue::String(text) => parse_cost_text(text),
        _ => 0.0,
    }
}

pub fn parse_cost_text(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '£' | '$' | ','))
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// A site plus the target-area provenance recorded when it was added to a
/// scenario or schedule. Serializes flat, extending the site's own fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSite {
    #[serde(flatten)]
    pub site: Site,
    pub target_area_id: Option<String>,
    pub target_area_name: String,
}

impl CampaignSite {
    pub fn from_site(site: Site, area: Option<&TargetArea>) -> Self {
        match area {
            Some(area) => Self {
                site,
                target_area_id: Some(area.id.clone()),
                target_area_name: area.name.clone(),
            },
            None => Self::uncategorized(site),
        }
    }

    pub fn uncategorized(site: Site) -> Self {
        Self {
            site,
            target_area_id: None,
            target_area_name: UNCATEGORIZED_AREA_NAME.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.site.id
    }

    pub fn cost(&self) -> f64 {
        self.site.cost
    }
}
