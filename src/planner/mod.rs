//! Itinerary planning: generalized-cost evaluation and branch-and-bound
//! search.

pub mod bundle;
mod cost;
mod engine;
mod params;

pub use cost::{CostModel, LB_SPEED_KMH, LegIncrement};
pub use engine::{BestPath, DestinationTarget, PathLeg, SearchEngine, SearchOutcome};
pub use params::SearchParams;
