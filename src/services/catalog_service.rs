use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::site::{parse_cost_text, RawSiteRecord, Site};
use crate::utils::csv;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The six headers a site upload or sheet record must carry, in the
/// casing the sheet bridge emits. CSV matching is case-insensitive.
const REQUIRED_HEADERS: [&str; 6] = ["frameId", "panelName", "formatName", "lat", "lng", "cost"];

/// External site source: anything that can produce the raw records the
/// sheet bridge emits. Failure is `SourceUnavailable`.
#[async_trait::async_trait]
pub trait SiteSource: Send + Sync {
    async fn fetch_sites(&self) -> AppResult<Vec<RawSiteRecord>>;
}

/// Client for the spreadsheet-to-JSON bridge. The bridge answers with
/// either a JSON array of records or an `{"error": "..."}` envelope.
pub struct HttpSiteSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSiteSource {
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AppError::source_unavailable(format!("failed to build client: {err}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl SiteSource for HttpSiteSource {
    async fn fetch_sites(&self) -> AppResult<Vec<RawSiteRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AppError::source_unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::source_unavailable(format!(
                "site source returned status {}",
                response.status()
            )));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|err| AppError::source_unavailable(format!("invalid response body: {err}")))?;

        match payload {
            JsonValue::Array(_) => {
                serde_json::from_value(payload).map_err(|err| {
                    AppError::source_unavailable(format!("malformed site records: {err}"))
                })
            }
            JsonValue::Object(ref object) => {
                let message = object
                    .get("error")
                    .and_then(|value| value.as_str())
                    .unwrap_or("site source returned an unexpected object");
                Err(AppError::source_unavailable(message))
            }
            _ => Err(AppError::source_unavailable(
                "site source returned an unexpected payload",
            )),
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    sites: Vec<Site>,
    formats: Vec<String>,
}

/// The current site catalog plus the distinct format values observed,
/// sorted and deduplicated for use as filter options. Wholly replaced on
/// each successful load; a failed load leaves the previous catalog as-is.
pub struct CatalogService {
    state: RwLock<CatalogState>,
}

impl CatalogService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
        }
    }

    pub async fn load_remote(&self, source: &dyn SiteSource) -> AppResult<Vec<String>> {
        let records = source.fetch_sites().await?;
        Ok(self.replace(records.into_iter().map(RawSiteRecord::into_site).collect()))
    }

    /// Load an uploaded CSV export. The header row must contain every
    /// required header (any order, any case); extra columns are ignored.
    /// A schema failure aborts the load without touching the catalog.
    pub fn load_csv(&self, text: &str) -> AppResult<Vec<String>> {
        let table = csv::parse(text)
            .ok_or_else(|| AppError::csv_schema_invalid(Vec::new()))?;

        let mut indices = Vec::with_capacity(REQUIRED_HEADERS.len());
        for header in REQUIRED_HEADERS {
            match table.header_index(header) {
                Some(index) => indices.push(index),
                None => {
                    let found = table
                        .headers
                        .iter()
                        .map(|header| header.trim().to_string())
                        .collect();
                    return Err(AppError::csv_schema_invalid(found));
                }
            }
        }

        let field = |row: &[String], slot: usize| -> String {
            row.get(indices[slot]).cloned().unwrap_or_default()
        };

        let sites = table
            .rows
            .iter()
            .map(|row| Site {
                id: field(row, 0).trim().to_string(),
                name: field(row, 1).trim().to_string(),
                format: field(row, 2).trim().to_string(),
                lat: field(row, 3).trim().parse::<f64>().unwrap_or(f64::NAN),
                lng: field(row, 4).trim().parse::<f64>().unwrap_or(f64::NAN),
                cost: parse_cost_text(&field(row, 5)),
            })
            .collect();

        Ok(self.replace(sites))
    }

    fn replace(&self, sites: Vec<Site>) -> Vec<String> {
        let formats: Vec<String> = sites
            .iter()
            .map(|site| site.format.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        info!(
            target: "app::catalog",
            sites = sites.len(),
            formats = formats.len(),
            "catalog replaced"
        );

        let mut state = self.state.write().expect("catalog state lock poisoned");
        state.sites = sites;
        state.formats = formats.clone();
        formats
    }

    pub fn sites(&self) -> Vec<Site> {
        self.state
            .read()
            .expect("catalog state lock poisoned")
            .sites
            .clone()
    }

    pub fn formats(&self) -> Vec<String> {
        self.state
            .read()
            .expect("catalog state lock poisoned")
            .formats
            .clone()
    }

    pub fn site_by_id(&self, site_id: &str) -> Option<Site> {
        let state = self.state.read().expect("catalog state lock poisoned");
        let site = state.sites.iter().find(|site| site.id == site_id).cloned();
        debug!(target: "app::catalog", %site_id, found = site.is_some(), "catalog lookup");
        site
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .read()
            .expect("catalog state lock poisoned")
            .sites
            .is_empty()
    }
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new()
    }
}
