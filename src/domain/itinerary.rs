//! Search results: itinerary legs and the bundle returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, GeoPoint, NodeId, TravelMode};

/// Terminal status of a search.
///
/// Budget exhaustion is a search outcome, not an error; fatal conditions
/// (persistence, normalization) propagate as error types instead of being
/// encoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "TIME_BUDGET_EXHAUSTED")]
    TimeBudgetExhausted,
    #[serde(rename = "NO_FEASIBLE_ROUTE")]
    NoFeasibleRoute,
}

impl SearchStatus {
    /// Stable tag used in the persisted schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Ok => "OK",
            SearchStatus::TimeBudgetExhausted => "TIME_BUDGET_EXHAUSTED",
            SearchStatus::NoFeasibleRoute => "NO_FEASIBLE_ROUTE",
        }
    }

    /// Parse a schema tag back into a status.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "OK" => Ok(SearchStatus::Ok),
            "TIME_BUDGET_EXHAUSTED" => Ok(SearchStatus::TimeBudgetExhausted),
            "NO_FEASIBLE_ROUTE" => Ok(SearchStatus::NoFeasibleRoute),
            other => Err(DomainError::UnknownTag {
                field: "search_status",
                value: other.to_string(),
            }),
        }
    }
}

/// One leg of a finished itinerary.
///
/// Carries scalar copies of the edge, the offer, and the endpoint
/// coordinates: a bundle must not hold references into the graph snapshot
/// that produced it. Departure and arrival are the *effective* times the
/// search bound the leg to, which for static offers differ from the
/// offer's anchor timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryLeg {
    pub edge_id: i64,
    pub offer_id: i64,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub from_coord: GeoPoint,
    pub to_coord: GeoPoint,
    pub mode: TravelMode,
    pub is_transfer: bool,
    pub depart_utc: DateTime<Utc>,
    pub arrive_utc: DateTime<Utc>,
    pub duration_min: i64,
    pub price: f64,
    pub currency: String,
}

/// The complete result of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryBundle {
    /// Origin node of the realized itinerary, or the first origin
    /// candidate when no route was found.
    pub origin_node_id: Option<NodeId>,
    /// Destination node of the realized itinerary, or the first
    /// destination candidate when no route was found.
    pub dest_node_id: Option<NodeId>,
    pub origin_spec_raw: String,
    pub dest_spec_raw: String,
    pub legs: Vec<ItineraryLeg>,
    pub price_total: f64,
    /// Door-to-door duration including inter-leg waits, minutes.
    pub duration_min: i64,
    pub num_transfers: u32,
    /// Mode carrying the largest share of in-leg time, if any legs exist.
    pub main_mode: Option<TravelMode>,
    pub time_value_per_hour: f64,
    pub transfer_penalty: f64,
    pub risk_penalty: f64,
    pub gen_cost: Option<f64>,
    pub search_status: SearchStatus,
    pub search_params_json: String,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
}

impl ItineraryBundle {
    /// Sum of leg prices; must equal `price_total`.
    pub fn leg_price_sum(&self) -> f64 {
        self.legs.iter().map(|l| l.price).sum()
    }

    /// Sum of in-leg durations, excluding waits.
    pub fn leg_duration_sum(&self) -> i64 {
        self.legs.iter().map(|l| l.duration_min).sum()
    }

    /// Number of legs flagged as transfers; must equal `num_transfers`.
    pub fn transfer_leg_count(&self) -> u32 {
        self.legs.iter().filter(|l| l.is_transfer).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tags_round_trip() {
        for status in [
            SearchStatus::Ok,
            SearchStatus::TimeBudgetExhausted,
            SearchStatus::NoFeasibleRoute,
        ] {
            assert_eq!(SearchStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(SearchStatus::parse("ok").is_err());
        assert!(SearchStatus::parse("FAILED").is_err());
    }

    #[test]
    fn status_serde_uses_schema_tags() {
        let json = serde_json::to_string(&SearchStatus::TimeBudgetExhausted).unwrap();
        assert_eq!(json, "\"TIME_BUDGET_EXHAUSTED\"");
        let back: SearchStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SearchStatus::TimeBudgetExhausted);
    }
}
