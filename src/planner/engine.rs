//! Best-first branch-and-bound search over the timed adjacency.
//!
//! States are `(node, arrival time, generalized cost, transfers, path)`;
//! the frontier is a binary min-heap keyed on cost with an insertion-
//! sequence tie-break, so expansion order is fully deterministic for a
//! given graph and parameters. Pruning combines an incumbent bound, an
//! admissible lower bound, a detour cap, and dominance on
//! `(node, 5-minute arrival bucket)`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, trace};

use crate::domain::{GeoPoint, NodeId, SearchStatus};
use crate::graph::TimedGraph;
use crate::normalize::DestinationMatcher;

use super::cost::CostModel;
use super::params::SearchParams;

/// Width of a dominance bucket, milliseconds.
const DOMINANCE_BUCKET_MS: i64 = 5 * 60 * 1000;

/// One traversed arc with the effective times the search bound it to.
///
/// For static offers the effective departure is the frontier arrival at
/// the boarding node, not the offer's anchor timestamp.
#[derive(Debug, Clone)]
pub struct PathLeg {
    /// Arc index into the graph that produced this path.
    pub arc: usize,
    pub depart_utc: DateTime<Utc>,
    pub arrive_utc: DateTime<Utc>,
}

/// The best itinerary found by a search.
#[derive(Debug, Clone)]
pub struct BestPath {
    pub legs: Vec<PathLeg>,
    pub gen_cost: f64,
    pub transfers: u32,
    /// Arena index of the seed origin node.
    pub origin: usize,
    /// Arena index of the matched destination node.
    pub node: usize,
    pub arrival_utc: DateTime<Utc>,
}

/// Outcome of a search run.
#[derive(Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub best: Option<BestPath>,
    /// Number of states popped from the frontier.
    pub expansions: u64,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
}

/// The destination side of a search: arena indices to match plus the
/// coordinates backing the lower bound and detour reference.
#[derive(Debug, Clone)]
pub struct DestinationTarget {
    indices: HashSet<usize>,
    points: Vec<GeoPoint>,
}

impl DestinationTarget {
    /// Project a destination matcher onto a graph snapshot.
    pub fn project(graph: &TimedGraph, matcher: &DestinationMatcher) -> Self {
        let mut indices = HashSet::new();
        let mut points = Vec::new();
        for (idx, node) in graph.nodes().iter().enumerate() {
            if matcher.matches(node.id) {
                indices.insert(idx);
                points.push(node.coord);
            }
        }
        Self { indices, points }
    }

    /// Build a target from explicit node ids (tests, single-node cases).
    pub fn from_ids(graph: &TimedGraph, ids: &[NodeId]) -> Self {
        let mut indices = HashSet::new();
        let mut points = Vec::new();
        for id in ids {
            if let Some(idx) = graph.node_index(*id) {
                indices.insert(idx);
                points.push(graph.node(idx).coord);
            }
        }
        Self { indices, points }
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.indices.contains(&idx)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Straight-line distance from `p` to the nearest destination point,
    /// planar approximation.
    pub fn min_planar_km(&self, p: &GeoPoint) -> f64 {
        self.points
            .iter()
            .map(|d| p.planar_km(d))
            .fold(f64::INFINITY, f64::min)
    }
}

/// A partial itinerary on the frontier.
#[derive(Debug, Clone)]
struct State {
    node: usize,
    arrival_utc: DateTime<Utc>,
    gen_cost: f64,
    transfers: u32,
    /// Approximate distance traversed so far, km.
    dist_km: f64,
    /// Straight-line origin-destination distance fixed at seeding, km.
    direct_km: f64,
    /// Seed origin of this state's ancestry.
    origin: usize,
    legs: Vec<PathLeg>,
}

/// Frontier entry. `BinaryHeap` is a max-heap, so the ordering is
/// inverted to pop the cheapest state; ties break on insertion sequence
/// for determinism.
struct FrontierEntry {
    seq: u64,
    state: State,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .state
            .gen_cost
            .total_cmp(&self.state.gen_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-first branch-and-bound search engine over one graph snapshot.
pub struct SearchEngine<'a> {
    graph: &'a TimedGraph,
    params: &'a SearchParams,
    cost: CostModel,
}

impl<'a> SearchEngine<'a> {
    pub fn new(graph: &'a TimedGraph, params: &'a SearchParams) -> Self {
        Self {
            graph,
            params,
            cost: CostModel::from_params(params),
        }
    }

    /// Run the search from the given origin indices to the destination
    /// target.
    ///
    /// Always returns an outcome; budget exhaustion and infeasibility are
    /// statuses, not errors.
    #[instrument(skip(self, origins, dest), fields(
        origins = origins.len(),
        nodes = self.graph.node_count(),
        arcs = self.graph.arc_count(),
    ))]
    pub fn search(&self, origins: &[usize], dest: &DestinationTarget) -> SearchOutcome {
        let started_at_utc = Utc::now();
        let started = Instant::now();
        let timeout = self.params.timeout();
        let depart_after = self.params.depart_after.unwrap_or(started_at_utc);

        let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut dominance: HashMap<(usize, i64), f64> = HashMap::new();
        let mut seq: u64 = 0;

        for &origin in origins {
            let direct_km = dest.min_planar_km(&self.graph.node(origin).coord);
            let state = State {
                node: origin,
                arrival_utc: depart_after,
                gen_cost: 0.0,
                transfers: 0,
                dist_km: 0.0,
                direct_km,
                origin,
                legs: Vec::new(),
            };
            dominance.insert((origin, bucket(depart_after)), 0.0);
            frontier.push(FrontierEntry { seq, state });
            seq += 1;
        }
        debug!(seeded = frontier.len(), depart = %depart_after, "search seeded");

        let mut best: Option<BestPath> = None;
        let mut best_cost = f64::INFINITY;
        let mut expansions: u64 = 0;

        loop {
            // Budget checks happen before popping each state, so a zero
            // budget terminates without exploring anything.
            if expansions >= self.params.max_expansions || started.elapsed() >= timeout {
                info!(
                    expansions,
                    best_cost = best.as_ref().map(|b| b.gen_cost),
                    "budget exhausted"
                );
                return SearchOutcome {
                    status: SearchStatus::TimeBudgetExhausted,
                    best,
                    expansions,
                    started_at_utc,
                    finished_at_utc: Utc::now(),
                };
            }

            let Some(FrontierEntry { state, .. }) = frontier.pop() else {
                break;
            };
            expansions += 1;

            // A cheaper state may have claimed this dominance key after
            // this one was pushed; stale states expand nothing.
            if let Some(&recorded) = dominance.get(&(state.node, bucket(state.arrival_utc)))
                && recorded < state.gen_cost
            {
                trace!(node = state.node, "skipped: dominated since push");
                continue;
            }

            if state.gen_cost >= best_cost {
                continue;
            }

            if dest.contains(state.node) {
                debug!(
                    node = state.node,
                    cost = state.gen_cost,
                    legs = state.legs.len(),
                    "destination reached"
                );
                best_cost = state.gen_cost;
                best = Some(BestPath {
                    legs: state.legs.clone(),
                    gen_cost: state.gen_cost,
                    transfers: state.transfers,
                    origin: state.origin,
                    node: state.node,
                    arrival_utc: state.arrival_utc,
                });

                // Early optimality: when even the cheapest frontier state
                // plus its lower bound cannot beat the incumbent, the
                // incumbent is provably optimal.
                let provably_optimal = match frontier.peek() {
                    Some(entry) => {
                        let lb = self
                            .cost
                            .lower_bound_from(&self.graph.node(entry.state.node).coord, &dest.points);
                        entry.state.gen_cost + lb >= best_cost
                    }
                    None => true,
                };
                if provably_optimal {
                    info!(expansions, cost = best_cost, "optimal itinerary proven");
                    return SearchOutcome {
                        status: SearchStatus::Ok,
                        best,
                        expansions,
                        started_at_utc,
                        finished_at_utc: Utc::now(),
                    };
                }
                continue;
            }

            self.expand(&state, dest, best_cost, &mut dominance, &mut frontier, &mut seq);
        }

        let status = if best.is_some() {
            SearchStatus::Ok
        } else {
            SearchStatus::NoFeasibleRoute
        };
        info!(expansions, ?status, "frontier drained");
        SearchOutcome {
            status,
            best,
            expansions,
            started_at_utc,
            finished_at_utc: Utc::now(),
        }
    }

    /// Generate successors of `state`, applying the prune predicates and
    /// the dominance check before anything is pushed.
    fn expand(
        &self,
        state: &State,
        dest: &DestinationTarget,
        best_cost: f64,
        dominance: &mut HashMap<(usize, i64), f64>,
        frontier: &mut BinaryHeap<FrontierEntry>,
        seq: &mut u64,
    ) {
        for &arc_idx in self.graph.arcs_from(state.node) {
            let arc = self.graph.arc(arc_idx);

            // Static and model-estimated offers board at the frontier
            // arrival; scheduled offers require their departure to still
            // be ahead of us.
            let (depart_utc, arrive_utc) = if arc.offer.boards_at_frontier() {
                (
                    state.arrival_utc,
                    state.arrival_utc + Duration::minutes(arc.offer.duration_min()),
                )
            } else {
                if arc.offer.departure_utc < state.arrival_utc {
                    continue;
                }
                (arc.offer.departure_utc, arc.offer.arrival_utc)
            };

            // The successor's cost is computed exactly once; every prune
            // predicate and the dominance update reuse it.
            let increment = self.cost.leg_increment(&arc.edge, &arc.offer);
            let gen_cost = state.gen_cost + increment.total;
            let transfers = state.transfers + u32::from(increment.is_transfer);
            let dist_km = state.dist_km
                + self
                    .graph
                    .node(state.node)
                    .coord
                    .planar_km(&self.graph.node(arc.to).coord);

            if gen_cost >= best_cost {
                trace!(arc = arc_idx, "pruned: incumbent bound");
                continue;
            }

            let lb = self
                .cost
                .lower_bound_from(&self.graph.node(arc.to).coord, &dest.points);
            if gen_cost + lb >= best_cost {
                trace!(arc = arc_idx, "pruned: lower bound");
                continue;
            }

            if self.cost.is_detour(dist_km, state.direct_km) {
                trace!(
                    arc = arc_idx,
                    dist_km,
                    direct_km = state.direct_km,
                    "pruned: detour cap"
                );
                continue;
            }

            let key = (arc.to, bucket(arrive_utc));
            if let Some(&recorded) = dominance.get(&key)
                && recorded <= gen_cost
            {
                trace!(arc = arc_idx, "pruned: dominated");
                continue;
            }
            dominance.insert(key, gen_cost);

            let mut legs = state.legs.clone();
            legs.push(PathLeg {
                arc: arc_idx,
                depart_utc,
                arrive_utc,
            });
            frontier.push(FrontierEntry {
                seq: *seq,
                state: State {
                    node: arc.to,
                    arrival_utc: arrive_utc,
                    gen_cost,
                    transfers,
                    dist_km,
                    direct_km: state.direct_km,
                    origin: state.origin,
                    legs,
                },
            });
            *seq += 1;
        }
    }
}

fn bucket(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis().div_euclid(DOMINANCE_BUCKET_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_boundaries_are_five_minutes() {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 15, 8, 0, 0).unwrap();
        let t4 = Utc.with_ymd_and_hms(2025, 11, 15, 8, 4, 59).unwrap();
        let t5 = Utc.with_ymd_and_hms(2025, 11, 15, 8, 5, 0).unwrap();
        assert_eq!(bucket(t0), bucket(t4));
        assert_ne!(bucket(t0), bucket(t5));
    }

    #[test]
    fn frontier_orders_by_cost_then_sequence() {
        let t = Utc.with_ymd_and_hms(2025, 11, 15, 8, 0, 0).unwrap();
        let mk = |seq: u64, cost: f64| FrontierEntry {
            seq,
            state: State {
                node: 0,
                arrival_utc: t,
                gen_cost: cost,
                transfers: 0,
                dist_km: 0.0,
                direct_km: 0.0,
                origin: 0,
                legs: Vec::new(),
            },
        };

        let mut heap = BinaryHeap::new();
        heap.push(mk(0, 10.0));
        heap.push(mk(1, 5.0));
        heap.push(mk(2, 5.0));
        heap.push(mk(3, 20.0));

        // Cheapest first; equal costs pop in insertion order.
        let order: Vec<(f64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|e| (e.state.gen_cost, e.seq))
            .collect();
        assert_eq!(order, vec![(5.0, 1), (5.0, 2), (10.0, 0), (20.0, 3)]);
    }
}
