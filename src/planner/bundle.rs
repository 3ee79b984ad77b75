//! Bundle assembly: turning a search outcome into an `ItineraryBundle`.
//!
//! The bundle copies scalar fields out of the graph snapshot; nothing in
//! it may outlive or reference the snapshot that produced it.

use serde_json::json;
use tracing::warn;

use crate::domain::{ItineraryBundle, ItineraryLeg, NodeId, TravelMode};
use crate::graph::TimedGraph;
use crate::normalize::ResolvedPlace;

use super::engine::SearchOutcome;
use super::params::SearchParams;

/// Assemble the caller-facing bundle from a finished search.
///
/// `origin` and `dest` provide the raw specs, the fallback endpoint ids
/// for infeasible searches, and the ambiguity notes echoed into
/// `search_params_json`.
pub fn assemble(
    graph: &TimedGraph,
    outcome: &SearchOutcome,
    origin_raw: &str,
    dest_raw: &str,
    origin: &ResolvedPlace,
    dest: &ResolvedPlace,
    params: &SearchParams,
) -> ItineraryBundle {
    let legs: Vec<ItineraryLeg> = outcome
        .best
        .as_ref()
        .map(|best| {
            best.legs
                .iter()
                .map(|leg| {
                    let arc = graph.arc(leg.arc);
                    ItineraryLeg {
                        edge_id: arc.edge.id,
                        offer_id: arc.offer.id,
                        from_node: graph.node(arc.from).id,
                        to_node: graph.node(arc.to).id,
                        from_coord: graph.node(arc.from).coord,
                        to_coord: graph.node(arc.to).coord,
                        mode: arc.edge.mode,
                        is_transfer: arc.edge.is_transfer,
                        depart_utc: leg.depart_utc,
                        arrive_utc: leg.arrive_utc,
                        duration_min: arc.offer.duration_min(),
                        price: arc.offer.price_or_zero(),
                        currency: arc.offer.currency.clone(),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let price_total = legs.iter().map(|l| l.price).sum();
    // Door-to-door duration includes inter-leg waits, so it is measured
    // endpoint to endpoint rather than summed over legs.
    let duration_min = match (legs.first(), legs.last()) {
        (Some(first), Some(last)) => (last.arrive_utc - first.depart_utc).num_minutes(),
        _ => 0,
    };
    let num_transfers = legs.iter().filter(|l| l.is_transfer).count() as u32;

    let (origin_node_id, dest_node_id) = endpoint_ids(graph, outcome, &legs, origin, dest);

    let search_params_json = params_json(params, origin, dest);

    ItineraryBundle {
        origin_node_id,
        dest_node_id,
        origin_spec_raw: origin_raw.to_string(),
        dest_spec_raw: dest_raw.to_string(),
        main_mode: main_mode(&legs),
        legs,
        price_total,
        duration_min,
        num_transfers,
        time_value_per_hour: params.time_value_per_hour,
        transfer_penalty: params.transfer_penalty,
        risk_penalty: params.risk_penalty,
        gen_cost: outcome.best.as_ref().map(|b| b.gen_cost),
        search_status: outcome.status,
        search_params_json,
        started_at_utc: outcome.started_at_utc,
        finished_at_utc: outcome.finished_at_utc,
    }
}

/// Realized endpoints when a route exists, first candidates otherwise.
fn endpoint_ids(
    graph: &TimedGraph,
    outcome: &SearchOutcome,
    legs: &[ItineraryLeg],
    origin: &ResolvedPlace,
    dest: &ResolvedPlace,
) -> (Option<NodeId>, Option<NodeId>) {
    match (&outcome.best, legs.first(), legs.last()) {
        (Some(_), Some(first), Some(last)) => (Some(first.from_node), Some(last.to_node)),
        // Zero-leg solution: the origin itself matched the destination.
        (Some(best), None, None) => {
            let id = graph.node(best.node).id;
            (Some(id), Some(id))
        }
        _ => (
            origin.spec.nodes().first().map(|n| n.id),
            dest.spec.nodes().first().map(|n| n.id),
        ),
    }
}

/// Mode carrying the largest share of in-leg time; earlier legs win ties.
fn main_mode(legs: &[ItineraryLeg]) -> Option<TravelMode> {
    let mut best: Option<(TravelMode, i64)> = None;
    for leg in legs {
        let total: i64 = legs
            .iter()
            .filter(|l| l.mode == leg.mode)
            .map(|l| l.duration_min)
            .sum();
        match best {
            Some((_, best_total)) if best_total >= total => {}
            _ => best = Some((leg.mode, total)),
        }
    }
    best.map(|(mode, _)| mode)
}

/// Params echo carried by the bundle: the knobs plus how each endpoint
/// was interpreted, including any area candidates that lost a tie-break.
fn params_json(params: &SearchParams, origin: &ResolvedPlace, dest: &ResolvedPlace) -> String {
    let value = json!({
        "params": params,
        "origin": {
            "kind": origin.spec.kind(),
            "ambiguous_with": origin.discarded_candidates,
        },
        "dest": {
            "kind": dest.spec.kind(),
            "ambiguous_with": dest.discarded_candidates,
        },
    });
    serde_json::to_string(&value).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize search params");
        "{}".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeoPoint;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 15, h, m, 0).unwrap()
    }

    fn leg(mode: TravelMode, duration_min: i64, dep: DateTime<Utc>) -> ItineraryLeg {
        let p = GeoPoint::new(0.0, 0.0).unwrap();
        ItineraryLeg {
            edge_id: 1,
            offer_id: 1,
            from_node: NodeId(1),
            to_node: NodeId(2),
            from_coord: p,
            to_coord: p,
            mode,
            is_transfer: false,
            depart_utc: dep,
            arrive_utc: dep + chrono::Duration::minutes(duration_min),
            duration_min,
            price: 0.0,
            currency: "USD".into(),
        }
    }

    #[test]
    fn main_mode_picks_dominant_time_share() {
        let legs = vec![
            leg(TravelMode::Walk, 10, t(8, 0)),
            leg(TravelMode::Flight, 75, t(8, 20)),
            leg(TravelMode::Walk, 12, t(9, 40)),
        ];
        assert_eq!(main_mode(&legs), Some(TravelMode::Flight));
    }

    #[test]
    fn main_mode_sums_per_mode() {
        // Two bus hops out-sum one flight.
        let legs = vec![
            leg(TravelMode::Bus, 40, t(8, 0)),
            leg(TravelMode::Flight, 60, t(9, 0)),
            leg(TravelMode::Bus, 45, t(10, 30)),
        ];
        assert_eq!(main_mode(&legs), Some(TravelMode::Bus));
    }

    #[test]
    fn main_mode_empty() {
        assert_eq!(main_mode(&[]), None);
    }
}
