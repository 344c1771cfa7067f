use std::collections::BTreeSet;
use std::sync::RwLock;

use tracing::debug;

use crate::models::site::Site;
use crate::models::target::PostcodeTarget;
use crate::utils::geo;

/// Radius slider bounds from the planner UI, in meters.
pub const RADIUS_MIN_M: f64 = 0.0;
pub const RADIUS_MAX_M: f64 = 2000.0;

#[derive(Debug, Clone, Default)]
struct FilterState {
    selected_formats: BTreeSet<String>,
    radius_mode: bool,
    radius_m: f64,
    budget_mode: bool,
    multi_select_mode: bool,
    staged_sites: Vec<Site>,
}

/// The derived view over the catalog: format selection, the radius and
/// budget mode toggles, and the multi-select staging list. Every state
/// change here is an explicit named transition; the only cross-control
/// side effect is `select_all_formats` switching radius mode off.
pub struct FilterService {
    state: RwLock<FilterState>,
}

impl FilterService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FilterState::default()),
        }
    }

    /// Replaces the selected-format set with the freshly loaded catalog's
    /// full format list. Called after a catalog load so every site starts
    /// visible; unlike `select_all_formats` this touches nothing else.
    pub fn reset_formats(&self, formats: &[String]) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.selected_formats = formats.iter().cloned().collect();
        state.staged_sites.clear();
        debug!(target: "app::filter", formats = formats.len(), "format selection reset");
    }

    pub fn toggle_format(&self, format: &str) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        if !state.selected_formats.remove(format) {
            state.selected_formats.insert(format.to_string());
        }
    }

    /// Select-All also switches radius mode off — a deliberate shortcut
    /// carried over from the planner UI, and the only coupling between
    /// the format and radius controls.
    pub fn select_all_formats(&self, formats: &[String]) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.selected_formats = formats.iter().cloned().collect();
        state.radius_mode = false;
    }

    pub fn clear_formats(&self) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.selected_formats.clear();
    }

    pub fn selected_formats(&self) -> Vec<String> {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .selected_formats
            .iter()
            .cloned()
            .collect()
    }

    pub fn set_radius_mode(&self, enabled: bool) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.radius_mode = enabled;
    }

    pub fn radius_mode(&self) -> bool {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .radius_mode
    }

    pub fn set_radius(&self, radius_m: f64) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.radius_m = radius_m.clamp(RADIUS_MIN_M, RADIUS_MAX_M);
    }

    pub fn radius(&self) -> f64 {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .radius_m
    }

    pub fn set_budget_mode(&self, enabled: bool) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.budget_mode = enabled;
    }

    pub fn budget_mode(&self) -> bool {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .budget_mode
    }

    /// Turning multi-select off discards the staged selection.
    pub fn set_multi_select_mode(&self, enabled: bool) {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.multi_select_mode = enabled;
        if !enabled {
            state.staged_sites.clear();
        }
    }

    pub fn multi_select_mode(&self) -> bool {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .multi_select_mode
    }

    /// Stages or unstages a site for bulk add. Sites already in the plan
    /// cannot be staged.
    pub fn toggle_staged_site(&self, site: Site, already_planned: bool) {
        if already_planned {
            return;
        }
        let mut state = self.state.write().expect("filter state lock poisoned");
        if let Some(index) = state
            .staged_sites
            .iter()
            .position(|staged| staged.id == site.id)
        {
            state.staged_sites.remove(index);
        } else {
            state.staged_sites.push(site);
        }
    }

    pub fn staged_sites(&self) -> Vec<Site> {
        self.state
            .read()
            .expect("filter state lock poisoned")
            .staged_sites
            .clone()
    }

    /// Empties the staging list and exits multi-select mode; returns what
    /// was staged. Used when the staged selection is added to the plan.
    pub fn take_staged_sites(&self) -> Vec<Site> {
        let mut state = self.state.write().expect("filter state lock poisoned");
        state.multi_select_mode = false;
        std::mem::take(&mut state.staged_sites)
    }

    /// The filter predicate: format selected, AND not priced out when
    /// budget mode is on, AND within radius when radius mode is on. Pure
    /// conjunction; evaluation order is free.
    pub fn visible_sites(
        &self,
        sites: &[Site],
        targets: &[PostcodeTarget],
        remaining_budget: Option<f64>,
    ) -> Vec<Site> {
        let state = self.state.read().expect("filter state lock poisoned");
        sites
            .iter()
            .filter(|site| {
                if !state.selected_formats.contains(&site.format) {
                    return false;
                }
                if state.budget_mode {
                    if let Some(remaining) = remaining_budget {
                        if site.cost > remaining {
                            return false;
                        }
                    }
                }
                if state.radius_mode {
                    return geo::is_within_radius(site, targets, state.radius_m);
                }
                true
            })
            .cloned()
            .collect()
    }
}

impl Default for FilterService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(id: &str, format: &str, cost: f64, lat: f64, lng: f64) -> Site {
        Site {
            id: id.into(),
            name: format!("Site {id}"),
            format: format.into(),
            lat,
            lng,
            cost,
        }
    }

    fn catalog() -> Vec<Site> {
        vec![
            site("a", "A", 100.0, 51.5, -0.1),
            site("b", "B", 200.0, 51.6, -0.2),
            site("c", "A", 900.0, 0.0, 0.0),
        ]
    }

    fn formats() -> Vec<String> {
        vec!["A".into(), "B".into()]
    }

    #[test]
    fn format_filter_is_independent_of_the_other_modes() {
        let filter = FilterService::new();
        filter.reset_formats(&formats());
        filter.toggle_format("B");

        let visible = filter.visible_sites(&catalog(), &[], None);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|site| site.format == "A"));

        // Radius mode with no targets changes nothing.
        filter.set_radius_mode(true);
        let visible = filter.visible_sites(&catalog(), &[], None);
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn budget_mode_hides_sites_that_would_overspend() {
        let filter = FilterService::new();
        filter.reset_formats(&formats());
        filter.set_budget_mode(true);

        let visible = filter.visible_sites(&catalog(), &[], Some(250.0));
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|site| site.cost <= 250.0));

        // An unset budget imposes no constraint.
        let visible = filter.visible_sites(&catalog(), &[], None);
        assert_eq!(visible.len(), 3);
    }

    #[test]
    fn radius_mode_applies_the_geospatial_filter() {
        let filter = FilterService::new();
        filter.reset_formats(&formats());
        filter.set_radius_mode(true);
        filter.set_radius(1000.0);

        let targets = vec![PostcodeTarget {
            postcode: "N1".into(),
            lat: 51.5,
            lng: -0.1,
        }];

        let visible = filter.visible_sites(&catalog(), &targets, None);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "a");
    }

    #[test]
    fn select_all_turns_radius_mode_off_but_toggle_does_not() {
        let filter = FilterService::new();
        filter.reset_formats(&formats());
        filter.set_radius_mode(true);

        filter.toggle_format("A");
        assert!(filter.radius_mode());

        filter.select_all_formats(&formats());
        assert!(!filter.radius_mode());
        assert_eq!(filter.selected_formats(), formats());
    }

    #[test]
    fn radius_is_clamped_to_the_slider_range() {
        let filter = FilterService::new();
        filter.set_radius(5000.0);
        assert_eq!(filter.radius(), RADIUS_MAX_M);
        filter.set_radius(-10.0);
        assert_eq!(filter.radius(), RADIUS_MIN_M);
    }

    #[test]
    fn staging_refuses_planned_sites_and_clears_on_mode_exit() {
        let filter = FilterService::new();
        filter.set_multi_select_mode(true);

        filter.toggle_staged_site(site("a", "A", 100.0, 51.5, -0.1), true);
        assert!(filter.staged_sites().is_empty());

        filter.toggle_staged_site(site("a", "A", 100.0, 51.5, -0.1), false);
        assert_eq!(filter.staged_sites().len(), 1);

        // Toggling again unstages.
        filter.toggle_staged_site(site("a", "A", 100.0, 51.5, -0.1), false);
        assert!(filter.staged_sites().is_empty());

        filter.toggle_staged_site(site("b", "B", 200.0, 51.6, -0.2), false);
        filter.set_multi_select_mode(false);
        assert!(filter.staged_sites().is_empty());
    }

    #[test]
    fn take_staged_sites_exits_multi_select_mode() {
        let filter = FilterService::new();
        filter.set_multi_select_mode(true);
        filter.toggle_staged_site(site("a", "A", 100.0, 51.5, -0.1), false);

        let staged = filter.take_staged_sites();
        assert_eq!(staged.len(), 1);
        assert!(!filter.multi_select_mode());
        assert!(filter.staged_sites().is_empty());
    }
}
