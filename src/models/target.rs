use serde::{Deserialize, Serialize};

/// A geocoded latitude/longitude pair as returned by the geocoding
/// collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A geocoded point of interest, keyed by its postcode text within the
/// owning target area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostcodeTarget {
    pub postcode: String,
    pub lat: f64,
    pub lng: f64,
}

/// A named group of geocoded postcode targets. Target order is insertion
/// order; no two targets share a postcode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetArea {
    pub id: String,
    pub name: String,
    pub targets: Vec<PostcodeTarget>,
}

impl TargetArea {
    pub fn contains_postcode(&self, postcode: &str) -> bool {
        self.targets.iter().any(|target| target.postcode == postcode)
    }
}
