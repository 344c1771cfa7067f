pub mod catalog_service;
pub mod filter_service;
pub mod geocoding_service;
pub mod scenario_service;
pub mod schedule_service;
pub mod target_area_service;

use std::sync::Arc;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::schedule::Schedule;
use crate::models::site::Site;
use crate::services::catalog_service::{CatalogService, SiteSource};
use crate::services::filter_service::FilterService;
use crate::services::geocoding_service::Geocoder;
use crate::services::scenario_service::ScenarioService;
use crate::services::schedule_service::ScheduleService;
use crate::services::target_area_service::TargetAreaService;

/// The application's service graph. Each service owns one slice of
/// state; `AppState` wires them together and hosts the flows that span
/// more than one of them.
pub struct AppState {
    db_pool: DbPool,
    catalog: Arc<CatalogService>,
    filter: Arc<FilterService>,
    target_areas: Arc<TargetAreaService>,
    scenarios: Arc<ScenarioService>,
    schedules: Arc<ScheduleService>,
}

impl AppState {
    pub fn new(db_pool: DbPool, geocoder: Arc<dyn Geocoder>) -> AppResult<Self> {
        let scenarios = Arc::new(ScenarioService::new(db_pool.clone())?);
        let schedules = Arc::new(ScheduleService::new(db_pool.clone())?);

        Ok(Self {
            db_pool,
            catalog: Arc::new(CatalogService::new()),
            filter: Arc::new(FilterService::new()),
            target_areas: Arc::new(TargetAreaService::new(geocoder)),
            scenarios,
            schedules,
        })
    }

    pub fn db_pool(&self) -> &DbPool {
        &self.db_pool
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn filter(&self) -> &FilterService {
        &self.filter
    }

    pub fn target_areas(&self) -> &TargetAreaService {
        &self.target_areas
    }

    pub fn scenarios(&self) -> &ScenarioService {
        &self.scenarios
    }

    pub fn schedules(&self) -> &ScheduleService {
        &self.schedules
    }

    /// Replace the catalog from a remote source and reset the format
    /// selection so the full catalog is visible again.
    pub async fn reload_catalog(&self, source: &dyn SiteSource) -> AppResult<Vec<String>> {
        let formats = self.catalog.load_remote(source).await?;
        self.filter.reset_formats(&formats);
        Ok(formats)
    }

    /// Replace the catalog from an uploaded CSV export.
    pub fn load_catalog_csv(&self, text: &str) -> AppResult<Vec<String>> {
        let formats = self.catalog.load_csv(text)?;
        self.filter.reset_formats(&formats);
        Ok(formats)
    }

    /// Geocode a postcode and add it to a target area.
    pub async fn add_target(
        &self,
        area_id: &str,
        postcode_text: &str,
    ) -> AppResult<crate::models::target::PostcodeTarget> {
        self.target_areas.add_target(area_id, postcode_text).await
    }

    /// Catalog sites that pass the current filter, evaluated against the
    /// active target area and the active scenario's remaining budget.
    pub fn visible_sites(&self) -> Vec<Site> {
        let sites = self.catalog.sites();
        let targets = self.target_areas.active_targets();
        let remaining = self.scenarios.active_budget_summary().remaining_budget;
        self.filter.visible_sites(&sites, &targets, remaining)
    }

    /// Add one catalog site to the active scenario, tagged with the
    /// active target area (or Uncategorized when none is active).
    pub fn add_site_to_plan(&self, site_id: &str) -> AppResult<()> {
        let site = self
            .catalog
            .site_by_id(site_id)
            .ok_or(AppError::NotFound)?;
        let area = self.target_areas.active_area();
        let scenario_id = self.scenarios.active_id();
        self.scenarios
            .add_site(&scenario_id, site, area.as_ref())
    }

    /// Add every currently visible site to the active scenario. Returns
    /// the number of sites actually added (already-planned sites are
    /// skipped).
    pub fn add_visible_sites(&self) -> AppResult<usize> {
        let sites = self.visible_sites();
        let area = self.target_areas.active_area();
        let scenario_id = self.scenarios.active_id();
        self.scenarios.add_sites(&scenario_id, sites, area.as_ref())
    }

    /// Drain the multi-select staging list into the active scenario and
    /// leave multi-select mode.
    pub fn add_selected_sites(&self) -> AppResult<usize> {
        let staged = self.filter.take_staged_sites();
        let area = self.target_areas.active_area();
        let scenario_id = self.scenarios.active_id();
        self.scenarios
            .add_sites(&scenario_id, staged, area.as_ref())
    }

    /// Export the active scenario into the schedule collection.
    pub fn export_active_scenario(&self) -> AppResult<Schedule> {
        let scenario = self.scenarios.active_scenario();
        self.schedules.export_from_scenario(&scenario)
    }
}
