//! Generalized-cost evaluation: leg increments, the admissible lower
//! bound, and the detour predicate.
//!
//! All terms share one currency: cash price, time valued at the caller's
//! rate, and flat transfer/risk penalties.

use crate::domain::{EdgeLeg, GeoPoint, Offer};

use super::params::SearchParams;

/// Speed of the fastest admissible mode, km/h. Valid as a global bound
/// while flight is the fastest mode in scope; tighten per corridor before
/// adding anything quicker.
pub const LB_SPEED_KMH: f64 = 700.0;

/// The cost contribution of appending one leg to a partial itinerary.
#[derive(Debug, Clone, Copy)]
pub struct LegIncrement {
    /// In-leg duration, minutes.
    pub duration_min: i64,
    /// Cash component (absent prices count as zero).
    pub cash: f64,
    pub is_transfer: bool,
    /// Full generalized-cost increment: cash + time value + penalties.
    pub total: f64,
}

/// Evaluates generalized cost under one set of search parameters.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    time_value_per_hour: f64,
    transfer_penalty: f64,
    risk_penalty: f64,
    max_detour_factor: f64,
}

impl CostModel {
    pub fn from_params(params: &SearchParams) -> Self {
        Self {
            time_value_per_hour: params.time_value_per_hour,
            transfer_penalty: params.transfer_penalty,
            risk_penalty: params.risk_penalty,
            max_detour_factor: params.max_detour_factor,
        }
    }

    /// Incremental cost of traversing `edge` via `offer`.
    pub fn leg_increment(&self, edge: &EdgeLeg, offer: &Offer) -> LegIncrement {
        let duration_min = offer.duration_min();
        let cash = offer.price_or_zero();
        let is_transfer = edge.is_transfer;
        let transfer_cost = if is_transfer { self.transfer_penalty } else { 0.0 };

        let total = cash
            + self.time_value_per_hour * (duration_min as f64 / 60.0)
            + transfer_cost
            + self.risk_penalty;

        LegIncrement {
            duration_min,
            cash,
            is_transfer,
            total,
        }
    }

    /// Admissible lower bound on the remaining cost over `distance_km`:
    /// the time value of covering it at the fastest admissible speed.
    /// Never exceeds the true remaining optimal cost when a route exists.
    pub fn lower_bound(&self, distance_km: f64) -> f64 {
        self.time_value_per_hour * distance_km / LB_SPEED_KMH
    }

    /// Lower bound from a point to the nearest of the destination points.
    pub fn lower_bound_from(&self, from: &GeoPoint, dest_points: &[GeoPoint]) -> f64 {
        let nearest = dest_points
            .iter()
            .map(|p| from.planar_km(p))
            .fold(f64::INFINITY, f64::min);
        self.lower_bound(nearest)
    }

    /// Detour predicate: true when the traversed distance exceeds the
    /// allowed multiple of the direct origin-destination distance.
    pub fn is_detour(&self, dist_so_far_km: f64, direct_km: f64) -> bool {
        dist_so_far_km > self.max_detour_factor * direct_km
    }
}
