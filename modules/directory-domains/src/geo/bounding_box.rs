use std::f64::consts::FRAC_PI_2;

use directory_core::Coordinates;

use super::distance::EARTH_RADIUS_MILES;

/// Slack added to every edge so float rounding never drops a point the exact
/// distance check would keep.
const EDGE_SLACK_DEGREES: f64 = 1e-9;

/// Conservative prefilter window around a query point.
///
/// Every point within `radius_miles` of the centre lies inside the box. The
/// longitude window is `None` when it cannot be expressed as one interval
/// (pole inside the circle, antimeridian crossing, or a radius over a quarter
/// of the globe); callers then filter on latitude only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub lng_range: Option<(f64, f64)>,
}

impl BoundingBox {
    pub fn around(center: Coordinates, radius_miles: f64) -> Self {
        let angular = radius_miles / EARTH_RADIUS_MILES;
        let dlat = angular.to_degrees();

        let min_lat = (center.latitude - dlat - EDGE_SLACK_DEGREES).max(-90.0);
        let max_lat = (center.latitude + dlat + EDGE_SLACK_DEGREES).min(90.0);

        let lng_range = if angular >= FRAC_PI_2 || min_lat <= -90.0 || max_lat >= 90.0 {
            None
        } else {
            let ratio = angular.sin() / center.latitude.to_radians().cos();
            if ratio >= 1.0 {
                None
            } else {
                let dlng = ratio.asin().to_degrees() + EDGE_SLACK_DEGREES;
                let (lo, hi) = (center.longitude - dlng, center.longitude + dlng);
                (lo >= -180.0 && hi <= 180.0).then_some((lo, hi))
            }
        };

        Self {
            min_lat,
            max_lat,
            lng_range,
        }
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        if point.latitude < self.min_lat || point.latitude > self.max_lat {
            return false;
        }
        match self.lng_range {
            Some((lo, hi)) => point.longitude >= lo && point.longitude <= hi,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_miles;

    fn point(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn contains_every_point_inside_the_radius() {
        let center = point(39.7392, -104.9903);
        let radius = 25.0;
        let bbox = BoundingBox::around(center, radius);
        assert!(bbox.lng_range.is_some());

        // Sweep a grid around the centre; anything within the radius must be kept.
        for i in -60..=60 {
            for j in -60..=60 {
                let p = point(center.latitude + i as f64 * 0.01, center.longitude + j as f64 * 0.01);
                if distance_miles(center, p) < radius {
                    assert!(bbox.contains(p), "dropped {p:?}");
                }
            }
        }
    }

    #[test]
    fn excludes_far_points() {
        let bbox = BoundingBox::around(point(39.7392, -104.9903), 25.0);
        assert!(!bbox.contains(point(40.8, -104.99)));
        assert!(!bbox.contains(point(39.74, -103.9)));
    }

    #[test]
    fn antimeridian_drops_longitude_window() {
        let bbox = BoundingBox::around(point(0.0, 179.9), 50.0);
        assert_eq!(bbox.lng_range, None);
        assert!(bbox.contains(point(0.0, -179.9)));
    }

    #[test]
    fn polar_circle_drops_longitude_window() {
        let bbox = BoundingBox::around(point(89.9, 0.0), 50.0);
        assert_eq!(bbox.lng_range, None);
        assert_eq!(bbox.max_lat, 90.0);
    }

    #[test]
    fn huge_radius_covers_everything() {
        let bbox = BoundingBox::around(point(10.0, 10.0), 20_000.0);
        assert_eq!(bbox.min_lat, -90.0);
        assert_eq!(bbox.max_lat, 90.0);
        assert!(bbox.contains(point(-45.0, -170.0)));
    }
}
