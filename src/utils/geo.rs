use crate::models::site::Site;
use crate::models::target::PostcodeTarget;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters via the haversine formula.
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Radius membership for the derived view.
///
/// No targets means no constraint. A non-empty target set with a zero
/// radius excludes everything. Otherwise the site matches if it is within
/// `radius_m` of any target. NaN coordinates produce NaN distances, which
/// compare false and so never match.
pub fn is_within_radius(site: &Site, targets: &[PostcodeTarget], radius_m: f64) -> bool {
    if targets.is_empty() {
        return true;
    }
    if radius_m == 0.0 {
        return false;
    }
    targets.iter().any(|target| {
        haversine_distance_m(site.lat, site.lng, target.lat, target.lng) <= radius_m
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(lat: f64, lng: f64) -> Site {
        Site {
            id: "s1".into(),
            name: "Panel".into(),
            format: "Billboard".into(),
            lat,
            lng,
            cost: 100.0,
        }
    }

    fn target(lat: f64, lng: f64) -> PostcodeTarget {
        PostcodeTarget {
            postcode: "N1 9AL".into(),
            lat,
            lng,
        }
    }

    #[test]
    fn no_targets_means_no_constraint() {
        let site = site(51.5, -0.1);
        assert!(is_within_radius(&site, &[], 0.0));
        assert!(is_within_radius(&site, &[], 500.0));
    }

    #[test]
    fn zero_radius_with_targets_excludes_everything() {
        let site = site(51.5, -0.1);
        let targets = vec![target(51.5, -0.1)];
        assert!(!is_within_radius(&site, &targets, 0.0));
    }

    #[test]
    fn site_on_top_of_target_is_within_one_meter() {
        let site = site(51.5, -0.1);
        let targets = vec![target(51.5, -0.1)];
        assert!(is_within_radius(&site, &targets, 1.0));
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        // (0,0) to (0,1) is roughly 111,195 m.
        let site = site(0.0, 1.0);
        let targets = vec![target(0.0, 0.0)];
        assert!(!is_within_radius(&site, &targets, 100_000.0));
        assert!(is_within_radius(&site, &targets, 120_000.0));
    }

    #[test]
    fn any_target_in_range_is_enough() {
        let site = site(51.5, -0.1);
        let targets = vec![target(0.0, 0.0), target(51.5001, -0.1)];
        assert!(is_within_radius(&site, &targets, 500.0));
    }

    #[test]
    fn nan_coordinates_never_match() {
        let site = site(f64::NAN, -0.1);
        let targets = vec![target(51.5, -0.1)];
        assert!(!is_within_radius(&site, &targets, 1_000_000.0));
    }
}
