//! Great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, in range, and not the `(0, 0)` null-island placeholder that
    /// broken providers emit.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// Haversine distance between two points, in meters.
#[must_use]
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = ((d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn antipodal_points_give_half_circumference() {
        let pairs = [
            (Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 180.0)),
            (Coordinates::new(90.0, 0.0), Coordinates::new(-90.0, 0.0)),
            (
                Coordinates::new(40.712_776, -74.005_974),
                Coordinates::new(-40.712_776, 105.994_026),
            ),
        ];
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        for (a, b) in pairs {
            let d = haversine_meters(a, b);
            assert!(d.is_finite(), "{a:?} -> {b:?}");
            assert!((d - half).abs() < 1.0, "{d}");
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = Coordinates::new(52.520_008, 13.404_954);
        assert!(haversine_meters(p, p).abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let berlin = Coordinates::new(52.520_008, 13.404_954);
        let paris = Coordinates::new(48.856_614, 2.352_222);
        let there = haversine_meters(berlin, paris);
        let back = haversine_meters(paris, berlin);
        assert!((there - back).abs() < 1e-6);
    }

    #[test]
    fn berlin_to_paris_is_about_878_km() {
        let berlin = Coordinates::new(52.520_008, 13.404_954);
        let paris = Coordinates::new(48.856_614, 2.352_222);
        let km = haversine_meters(berlin, paris) / 1000.0;
        assert!((km - 878.0).abs() < 5.0, "got {km}");
    }

    #[test]
    fn short_distances_are_meter_accurate() {
        // ~15 m north
        let a = Coordinates::new(40.0, -74.0);
        let b = Coordinates::new(40.000_135, -74.0);
        let m = haversine_meters(a, b);
        assert!((m - 15.0).abs() < 0.5, "got {m}");
    }

    #[test]
    fn null_island_is_not_plausible() {
        assert!(!Coordinates::new(0.0, 0.0).is_plausible());
        assert!(!Coordinates::new(91.0, 10.0).is_plausible());
        assert!(Coordinates::new(37.8, -122.4).is_plausible());
    }
}
