//! Search orchestration: normalize endpoints, assemble the graph, run
//! the engine, package the bundle.

use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::ItineraryBundle;
use crate::graph::GraphBuilder;
use crate::normalize::{Geocoder, NormalizeError, PlaceNormalizer, ResolvedPlace};
use crate::planner::{DestinationTarget, SearchEngine, SearchParams, bundle};
use crate::store::{PersistenceError, Store};
use crate::transfer::TransferSynthesizer;

/// Fatal failures of a search request. Budget exhaustion and infeasible
/// routes are *not* errors; they come back as bundle statuses.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The origin or destination could not be normalized
    #[error(transparent)]
    Normalize(NormalizeError),

    /// Reference data could not be loaded
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Door-to-door routing facade over one store.
pub struct RoutingService<G: Geocoder> {
    store: Store,
    geocoder: G,
}

impl<G: Geocoder> RoutingService<G> {
    pub fn new(store: Store, geocoder: G) -> Self {
        Self { store, geocoder }
    }

    /// Plan one itinerary.
    ///
    /// Normalization errors short-circuit before any graph load;
    /// persistence errors during the load abort the search. Everything
    /// past that point always produces a bundle.
    #[instrument(skip(self, params), fields(origin = origin_raw, dest = dest_raw))]
    pub fn plan(
        &self,
        origin_raw: &str,
        dest_raw: &str,
        params: &SearchParams,
    ) -> Result<ItineraryBundle, PlanError> {
        let mut normalizer =
            PlaceNormalizer::new(&self.store, &self.geocoder).strict(params.strict_area_match);
        let origin = resolve(&mut normalizer, origin_raw)?;
        let dest = resolve(&mut normalizer, dest_raw)?;

        let mut nodes = self.store.load_nodes()?;
        let edges = self.store.load_edges()?;
        let offers = self.store.load_offers()?;

        // Synthetic address nodes join the snapshot so first/last-mile
        // transfers get synthesized for them like any persisted node.
        for place in [&origin, &dest] {
            for node in place.spec.nodes() {
                if node.id.is_synthetic() {
                    nodes.push(node.clone());
                }
            }
        }

        let now = params.depart_after.unwrap_or_else(Utc::now);
        let synthesizer =
            TransferSynthesizer::new(params.rideshare.clone(), params.shuttle_price);
        let graph = GraphBuilder::new(synthesizer, params.transfer_radius_km, now)
            .build(nodes, edges, offers);

        let origins: Vec<usize> = origin
            .spec
            .nodes()
            .iter()
            .filter_map(|n| graph.node_index(n.id))
            .collect();
        let target = DestinationTarget::project(&graph, &dest.spec.matcher());

        let outcome = SearchEngine::new(&graph, params).search(&origins, &target);
        info!(
            status = outcome.status.as_str(),
            expansions = outcome.expansions,
            "search finished"
        );

        Ok(bundle::assemble(
            &graph, &outcome, origin_raw, dest_raw, &origin, &dest, params,
        ))
    }

    /// Plan and persist the bundle. Returns the bundle and its row id.
    pub fn plan_and_store(
        &self,
        origin_raw: &str,
        dest_raw: &str,
        params: &SearchParams,
    ) -> Result<(ItineraryBundle, i64), PlanError> {
        let bundle = self.plan(origin_raw, dest_raw, params)?;
        let row_id = self.store.save_bundle(&bundle)?;
        Ok((bundle, row_id))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Keep the error taxonomy flat: store failures inside normalization
/// surface as persistence errors, not as a normalization wrapper.
fn resolve<G: Geocoder>(
    normalizer: &mut PlaceNormalizer<'_, G>,
    raw: &str,
) -> Result<ResolvedPlace, PlanError> {
    normalizer.resolve(raw).map_err(|e| match e {
        NormalizeError::Store(p) => PlanError::Persistence(p),
        other => PlanError::Normalize(other),
    })
}
