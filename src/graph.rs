//! Graph assembly: a timed adjacency over persisted structure plus
//! synthesized transfers.
//!
//! The graph is an arena: nodes live in a `Vec`, arcs in a `Vec`, and the
//! adjacency maps node indices to arc indices. Built once per search and
//! read-only afterwards, so it can be shared freely across any parallel
//! searches on the same snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{EdgeLeg, LocationNode, NodeId, Offer};
use crate::transfer::TransferSynthesizer;

/// A searchable arc: one structural edge paired with one timed offer.
#[derive(Debug, Clone)]
pub struct TimedArc {
    pub edge: EdgeLeg,
    pub offer: Offer,
    /// Arena index of the boarding node.
    pub from: usize,
    /// Arena index of the alighting node.
    pub to: usize,
}

/// Read-only timed adjacency for one search.
#[derive(Debug)]
pub struct TimedGraph {
    nodes: Vec<LocationNode>,
    index: HashMap<NodeId, usize>,
    arcs: Vec<TimedArc>,
    adj: Vec<Vec<usize>>,
}

impl TimedGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn node(&self, idx: usize) -> &LocationNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[LocationNode] {
        &self.nodes
    }

    /// Arena index of a node id, if the node is in this snapshot.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn arc(&self, idx: usize) -> &TimedArc {
        &self.arcs[idx]
    }

    /// Outgoing arc indices from a node, in insertion order.
    pub fn arcs_from(&self, node_idx: usize) -> &[usize] {
        &self.adj[node_idx]
    }
}

/// Assembles a [`TimedGraph`] from store snapshots and the transfer
/// synthesizer.
pub struct GraphBuilder {
    synthesizer: TransferSynthesizer,
    transfer_radius_km: f64,
    now: DateTime<Utc>,
    next_synthetic_id: i64,
}

impl GraphBuilder {
    /// `now` anchors the synthesized offers' placeholder timestamps; the
    /// engine binds their effective departure to the frontier arrival.
    pub fn new(
        synthesizer: TransferSynthesizer,
        transfer_radius_km: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            synthesizer,
            transfer_radius_km,
            now,
            next_synthetic_id: 0,
        }
    }

    fn next_id(&mut self) -> i64 {
        self.next_synthetic_id -= 1;
        self.next_synthetic_id
    }

    /// Join nodes × edges × offers into a timed adjacency, then inject
    /// walk/rideshare/shuttle transfers between every ordered pair of
    /// nodes within the transfer radius.
    ///
    /// `nodes` may include per-search synthetic address nodes; they take
    /// part in transfer injection like any persisted node.
    pub fn build(
        mut self,
        nodes: Vec<LocationNode>,
        edges: Vec<EdgeLeg>,
        offers: Vec<Offer>,
    ) -> TimedGraph {
        let index: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        let mut offers_by_edge: HashMap<i64, Vec<Offer>> = HashMap::new();
        for offer in offers {
            if !offer.active {
                continue;
            }
            offers_by_edge.entry(offer.edge_id).or_default().push(offer);
        }

        let mut arcs: Vec<TimedArc> = Vec::new();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for edge in edges {
            let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
                warn!(edge_id = edge.id, "edge references unknown node, skipping");
                continue;
            };
            let Some(edge_offers) = offers_by_edge.get(&edge.id) else {
                continue;
            };
            for offer in edge_offers {
                let arc_idx = arcs.len();
                arcs.push(TimedArc {
                    edge: edge.clone(),
                    offer: offer.clone(),
                    from,
                    to,
                });
                adj[from].push(arc_idx);
            }
        }
        let structural_arcs = arcs.len();

        // First/last-mile injection: every ordered nearby pair gets a walk,
        // a rideshare, and a shuttle arc. The radius cap bounds fan-out.
        for a in 0..nodes.len() {
            for b in 0..nodes.len() {
                if a == b {
                    continue;
                }
                let distance = nodes[a].coord.haversine_km(&nodes[b].coord);
                if !(distance <= self.transfer_radius_km) {
                    continue;
                }

                let pairs = [
                    {
                        let id = self.next_id();
                        self.synthesizer.walk(&nodes[a], &nodes[b], id, id, self.now)
                    },
                    {
                        let id = self.next_id();
                        self.synthesizer
                            .rideshare(&nodes[a], &nodes[b], id, id, self.now)
                    },
                    {
                        let id = self.next_id();
                        self.synthesizer
                            .shuttle(&nodes[a], &nodes[b], id, id, self.now)
                    },
                ];
                for (edge, offer) in pairs.into_iter().flatten() {
                    let arc_idx = arcs.len();
                    arcs.push(TimedArc {
                        edge,
                        offer,
                        from: a,
                        to: b,
                    });
                    adj[a].push(arc_idx);
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            structural_arcs,
            synthesized_arcs = arcs.len() - structural_arcs,
            "assembled timed graph"
        );
        info!(nodes = nodes.len(), arcs = arcs.len(), "graph ready");

        TimedGraph {
            nodes,
            index,
            arcs,
            adj,
        }
    }
}
