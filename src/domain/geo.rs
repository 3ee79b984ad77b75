//! Geographic coordinates and distances.
//!
//! Two distance functions are provided on purpose: true haversine for
//! anything that feeds user-visible numbers (transfer durations, prices),
//! and a cheap planar approximation for pruning bounds inside the search,
//! where speed matters and a few percent of error does not.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Kilometres per degree of latitude, used by the planar approximation.
const KM_PER_DEGREE: f64 = 111.0;

/// A validated WGS84 coordinate pair.
///
/// Latitude is constrained to [-90, 90] and longitude to [-180, 180];
/// non-finite values are rejected. Code holding a `GeoPoint` can rely on
/// both components being usable in distance arithmetic.
///
/// # Examples
///
/// ```
/// use intermodal_router::domain::GeoPoint;
///
/// let boston = GeoPoint::new(42.3656, -71.0096).unwrap();
/// assert!((boston.lat() - 42.3656).abs() < 1e-9);
///
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Construct a coordinate pair, validating ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self, DomainError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(DomainError::InvalidCoordinate(
                "coordinates must be finite",
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::InvalidCoordinate(
                "latitude must be in [-90, 90]",
            ));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(DomainError::InvalidCoordinate(
                "longitude must be in [-180, 180]",
            ));
        }
        Ok(Self { lat, lon })
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn haversine_km(&self, other: &GeoPoint) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        Haversine.distance(a, b) / 1000.0
    }

    /// Planar approximation of the distance to `other` in kilometres:
    /// `√(Δlat² + Δlon²) · 111`.
    ///
    /// Cheap and monotone in the true distance at routing scales. Used for
    /// detour and lower-bound pruning only; never for transfer models.
    pub fn planar_km(&self, other: &GeoPoint) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        (dlat * dlat + dlon * dlon).sqrt() * KM_PER_DEGREE
    }
}

impl std::fmt::Debug for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn accepts_valid_ranges() {
        assert!(GeoPoint::new(0.0, 0.0).is_ok());
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(GeoPoint::new(90.01, 0.0).is_err());
        assert!(GeoPoint::new(-90.01, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 180.01).is_err());
        assert!(GeoPoint::new(0.0, -180.01).is_err());
    }

    #[test]
    fn rejects_non_finite() {
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(GeoPoint::new(f64::NEG_INFINITY, 0.0).is_err());
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = point(42.0, -71.0);
        assert!(p.haversine_km(&p) < 1e-9);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        // One degree of latitude is ~111 km everywhere.
        let a = point(0.0, 0.0);
        let b = point(1.0, 0.0);
        let d = a.haversine_km(&b);
        assert!((d - 111.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn planar_matches_haversine_on_meridian() {
        let a = point(10.0, 20.0);
        let b = point(11.0, 20.0);
        let planar = a.planar_km(&b);
        let true_d = a.haversine_km(&b);
        assert!((planar - true_d).abs() / true_d < 0.01);
    }

    #[test]
    fn planar_symmetric() {
        let a = point(42.0, -71.0);
        let b = point(40.7, -74.0);
        assert_eq!(a.planar_km(&b), b.planar_km(&a));
    }
}
