use std::sync::{Arc, RwLock};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::target::{PostcodeTarget, TargetArea};
use crate::services::geocoding_service::Geocoder;

#[derive(Debug, Default)]
struct RegistryState {
    areas: Vec<TargetArea>,
    active_id: Option<String>,
}

/// Named groups of geocoded postcode targets, independent of scenarios.
/// The registry is process-local page state, not persisted.
pub struct TargetAreaService {
    geocoder: Arc<dyn Geocoder>,
    state: RwLock<RegistryState>,
}

impl TargetAreaService {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn create_area(&self, name: &str) -> AppResult<TargetArea> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("target area name cannot be empty"));
        }

        let area = TargetArea {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            targets: Vec::new(),
        };

        let mut state = self.state.write().expect("registry state lock poisoned");
        state.areas.push(area.clone());
        info!(target: "app::targets", area_id = %area.id, %name, "target area created");
        Ok(area)
    }

    pub fn remove_area(&self, area_id: &str) {
        let mut state = self.state.write().expect("registry state lock poisoned");
        state.areas.retain(|area| area.id != area_id);
        if state.active_id.as_deref() == Some(area_id) {
            state.active_id = None;
        }
        info!(target: "app::targets", %area_id, "target area removed");
    }

    /// A blank rename is discarded; the previous name is retained.
    pub fn rename_area(&self, area_id: &str, new_name: &str) -> AppResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            debug!(target: "app::targets", %area_id, "blank rename discarded");
            return Ok(());
        }

        let mut state = self.state.write().expect("registry state lock poisoned");
        let area = state
            .areas
            .iter_mut()
            .find(|area| area.id == area_id)
            .ok_or_else(AppError::not_found)?;
        area.name = new_name.to_string();
        Ok(())
    }

    pub fn set_active(&self, area_id: &str) -> AppResult<()> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        if !state.areas.iter().any(|area| area.id == area_id) {
            return Err(AppError::not_found());
        }
        state.active_id = Some(area_id.to_string());
        Ok(())
    }

    pub fn clear_active(&self) {
        let mut state = self.state.write().expect("registry state lock poisoned");
        state.active_id = None;
    }

    /// Geocode `postcode_text` and append the result to the area. An empty
    /// candidate list is "not found"; collaborator failures pass through
    /// as `GeocodeFailed`; duplicate postcodes within an area are
    /// rejected.
    pub async fn add_target(
        &self,
        area_id: &str,
        postcode_text: &str,
    ) -> AppResult<PostcodeTarget> {
        let postcode = postcode_text.trim().to_string();
        if postcode.is_empty() {
            return Err(AppError::validation("postcode cannot be empty"));
        }

        {
            let state = self.state.read().expect("registry state lock poisoned");
            let area = state
                .areas
                .iter()
                .find(|area| area.id == area_id)
                .ok_or_else(AppError::not_found)?;
            if area.contains_postcode(&postcode) {
                return Err(AppError::conflict(format!(
                    "postcode {postcode} is already targeted in this area"
                )));
            }
        }

        let point = self
            .geocoder
            .geocode(&postcode)
            .await?
            .ok_or_else(|| AppError::geocode_not_found(&postcode))?;

        let target = PostcodeTarget {
            postcode: postcode.clone(),
            lat: point.lat,
            lng: point.lng,
        };

        let mut state = self.state.write().expect("registry state lock poisoned");
        let area = state
            .areas
            .iter_mut()
            .find(|area| area.id == area_id)
            .ok_or_else(AppError::not_found)?;
        // The registry may have changed while the geocoder was in flight.
        if area.contains_postcode(&postcode) {
            return Err(AppError::conflict(format!(
                "postcode {postcode} is already targeted in this area"
            )));
        }
        area.targets.push(target.clone());
        info!(target: "app::targets", %area_id, %postcode, "target added");
        Ok(target)
    }

    pub fn remove_target(&self, area_id: &str, postcode: &str) {
        let mut state = self.state.write().expect("registry state lock poisoned");
        if let Some(area) = state.areas.iter_mut().find(|area| area.id == area_id) {
            area.targets.retain(|target| target.postcode != postcode);
        }
    }

    pub fn clear_targets(&self, area_id: &str) {
        let mut state = self.state.write().expect("registry state lock poisoned");
        if let Some(area) = state.areas.iter_mut().find(|area| area.id == area_id) {
            area.targets.clear();
        }
    }

    pub fn areas(&self) -> Vec<TargetArea> {
        self.state
            .read()
            .expect("registry state lock poisoned")
            .areas
            .clone()
    }

    pub fn area(&self, area_id: &str) -> Option<TargetArea> {
        self.state
            .read()
            .expect("registry state lock poisoned")
            .areas
            .iter()
            .find(|area| area.id == area_id)
            .cloned()
    }

    pub fn active_area(&self) -> Option<TargetArea> {
        let state = self.state.read().expect("registry state lock poisoned");
        let active_id = state.active_id.as_deref()?;
        state.areas.iter().find(|area| area.id == active_id).cloned()
    }

    /// Targets of the active area, or an empty list when nothing is
    /// active. The radius filter treats an empty list as "no constraint".
    pub fn active_targets(&self) -> Vec<PostcodeTarget> {
        self.active_area()
            .map(|area| area.targets)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::GeoPoint;

    struct FixedGeocoder {
        point: Option<GeoPoint>,
    }

    #[async_trait::async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, _query: &str) -> AppResult<Option<GeoPoint>> {
            Ok(self.point)
        }
    }

    struct FailingGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for FailingGeocoder {
        async fn geocode(&self, _query: &str) -> AppResult<Option<GeoPoint>> {
            Err(AppError::geocode_failed("network unreachable"))
        }
    }

    fn service_with_point() -> TargetAreaService {
        TargetAreaService::new(Arc::new(FixedGeocoder {
            point: Some(GeoPoint { lat: 51.5, lng: -0.1 }),
        }))
    }

    #[test]
    fn blank_area_name_is_rejected() {
        let service = service_with_point();
        assert!(matches!(
            service.create_area("   "),
            Err(AppError::Validation { .. })
        ));
        assert!(service.areas().is_empty());
    }

    #[test]
    fn removing_the_active_area_clears_the_selection() {
        let service = service_with_point();
        let area = service.create_area("North London").unwrap();
        service.set_active(&area.id).unwrap();
        assert!(service.active_area().is_some());

        service.remove_area(&area.id);
        assert!(service.active_area().is_none());
        assert!(service.active_targets().is_empty());
    }

    #[test]
    fn blank_rename_keeps_the_previous_name() {
        let service = service_with_point();
        let area = service.create_area("North London").unwrap();

        service.rename_area(&area.id, "  ").unwrap();
        assert_eq!(service.area(&area.id).unwrap().name, "North London");

        service.rename_area(&area.id, "Camden").unwrap();
        assert_eq!(service.area(&area.id).unwrap().name, "Camden");
    }

    #[tokio::test]
    async fn add_target_appends_the_geocoded_point() {
        let service = service_with_point();
        let area = service.create_area("North London").unwrap();

        let target = service.add_target(&area.id, " N1 9AL ").await.unwrap();
        assert_eq!(target.postcode, "N1 9AL");
        assert_eq!(target.lat, 51.5);
        assert_eq!(service.area(&area.id).unwrap().targets.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_postcode_in_one_area_is_rejected() {
        let service = service_with_point();
        let area = service.create_area("North London").unwrap();

        service.add_target(&area.id, "N1 9AL").await.unwrap();
        let err = service.add_target(&area.id, "N1 9AL").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(service.area(&area.id).unwrap().targets.len(), 1);
    }

    #[tokio::test]
    async fn unknown_postcode_surfaces_not_found() {
        let service = TargetAreaService::new(Arc::new(FixedGeocoder { point: None }));
        let area = service.create_area("North London").unwrap();

        let err = service.add_target(&area.id, "ZZ99 9ZZ").await.unwrap_err();
        assert!(matches!(err, AppError::GeocodeNotFound { .. }));
        assert!(service.area(&area.id).unwrap().targets.is_empty());
    }

    #[tokio::test]
    async fn collaborator_failure_surfaces_geocode_failed() {
        let service = TargetAreaService::new(Arc::new(FailingGeocoder));
        let area = service.create_area("North London").unwrap();

        let err = service.add_target(&area.id, "N1 9AL").await.unwrap_err();
        assert!(matches!(err, AppError::GeocodeFailed { .. }));
    }

    #[test]
    fn remove_target_is_a_noop_when_absent() {
        let service = service_with_point();
        let area = service.create_area("North London").unwrap();
        service.remove_target(&area.id, "N1 9AL");
        assert!(service.area(&area.id).unwrap().targets.is_empty());
    }
}
