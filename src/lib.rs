//! Door-to-door intermodal routing core.
//!
//! Resolves free-form origin/destination strings into graph nodes,
//! assembles a timed adjacency over persisted structure plus synthesized
//! first/last-mile transfers, and runs a best-first branch-and-bound
//! search for the minimum-generalized-cost itinerary.

pub mod cache;
pub mod domain;
pub mod graph;
pub mod normalize;
pub mod planner;
pub mod service;
pub mod store;
pub mod transfer;
