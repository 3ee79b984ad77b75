//! Geographic areas for city-level origin/destination resolution.

use serde::{Deserialize, Serialize};

use super::{DomainError, GeoPoint};

/// A named geographic region (city, metro, neighborhood, airport
/// catchment).
///
/// `parent_id` links form a forest; cycle freedom is a property of the
/// reference data, enforced at ingestion rather than here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub name: String,
    /// Free-form kind tag: `city`, `metro`, `neighborhood`, ...
    pub kind: String,
    pub country: Option<String>,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub parent_id: Option<i64>,
}

impl Area {
    /// Create an area, validating that the catchment radius is positive.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        kind: impl Into<String>,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Self, DomainError> {
        if !(radius_km > 0.0) {
            return Err(DomainError::NonPositiveRadius(id));
        }
        Ok(Self {
            id,
            name: name.into(),
            kind: kind.into(),
            country: None,
            center,
            radius_km,
            parent_id: None,
        })
    }

    /// True if `point` falls within the area's catchment circle.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.haversine_km(point) <= self.radius_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> GeoPoint {
        GeoPoint::new(42.36, -71.06).unwrap()
    }

    #[test]
    fn positive_radius_required() {
        assert!(Area::new(1, "Boston", "city", center(), 15.0).is_ok());
        assert!(Area::new(1, "Boston", "city", center(), 0.0).is_err());
        assert!(Area::new(1, "Boston", "city", center(), -3.0).is_err());
        assert!(Area::new(1, "Boston", "city", center(), f64::NAN).is_err());
    }

    #[test]
    fn containment() {
        let area = Area::new(1, "Boston", "city", center(), 15.0).unwrap();
        let inside = GeoPoint::new(42.35, -71.05).unwrap();
        let outside = GeoPoint::new(40.71, -74.00).unwrap();
        assert!(area.contains(&inside));
        assert!(!area.contains(&outside));
    }
}
