//! Search configuration for the routing engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transfer::RideshareModel;

/// Tunable parameters of a search request.
///
/// Everything here is echoed into the bundle's `search_params_json`, so
/// a stored result carries the exact knobs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Hard cap on the number of states popped from the frontier.
    pub max_expansions: u64,

    /// Wall-clock budget for the search, milliseconds.
    pub timeout_ms: u64,

    /// Value of one hour of travel time, currency units.
    pub time_value_per_hour: f64,

    /// Flat penalty per transfer leg, currency units.
    pub transfer_penalty: f64,

    /// Branches whose traversed distance exceeds this multiple of the
    /// origin-destination straight line are pruned.
    pub max_detour_factor: f64,

    /// Flat risk penalty per leg, currency units.
    pub risk_penalty: f64,

    /// Maximum distance over which first/last-mile transfers are
    /// synthesized, km.
    pub transfer_radius_km: f64,

    /// Rideshare pricing model overrides.
    pub rideshare: RideshareModel,

    /// Flat price of synthesized shuttle transfers, currency units.
    pub shuttle_price: f64,

    /// Earliest boarding time for the itinerary. `None` means now.
    pub depart_after: Option<DateTime<Utc>>,

    /// Fail on ambiguous area lookups instead of tie-breaking.
    pub strict_area_match: bool,
}

impl SearchParams {
    /// Wall-clock budget as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_expansions: 100_000,
            timeout_ms: 5_000,
            time_value_per_hour: 20.0,
            transfer_penalty: 6.0,
            max_detour_factor: 2.2,
            risk_penalty: 0.0,
            transfer_radius_km: 3.0,
            rideshare: RideshareModel::default(),
            shuttle_price: 12.0,
            depart_after: None,
            strict_area_match: false,
        }
    }
}
