use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::target::GeoPoint;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// External geocoding collaborator: free text in, first candidate out.
/// `Ok(None)` is the "not found" signal; transport or payload failures
/// surface as `GeocodeFailed`.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> AppResult<Option<GeoPoint>>;
}

/// Nominatim search client. The service returns candidates with string
/// `lat`/`lon` fields; only the first candidate is used.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimCandidate {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new() -> AppResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AppError::geocode_failed(format!("failed to build client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> AppResult<Option<GeoPoint>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("q", query)])
            .send()
            .await
            .map_err(|err| AppError::geocode_failed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::geocode_failed(format!(
                "geocoding service returned status {}",
                response.status()
            )));
        }

        let candidates: Vec<NominatimCandidate> = response
            .json()
            .await
            .map_err(|err| AppError::geocode_failed(format!("invalid response body: {err}")))?;

        debug!(target: "app::geocode", %query, candidates = candidates.len(), "geocode response");

        let Some(first) = candidates.first() else {
            return Ok(None);
        };

        let lat = first
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::geocode_failed("candidate has a non-numeric latitude"))?;
        let lng = first
            .lon
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::geocode_failed("candidate has a non-numeric longitude"))?;

        Ok(Some(GeoPoint { lat, lng }))
    }
}
