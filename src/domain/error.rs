//! Domain error types.
//!
//! These errors represent validation failures at construction time. They
//! are distinct from persistence and normalization errors, which live with
//! their adapters.

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// Coordinate outside the valid WGS84 ranges, or non-finite
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(&'static str),

    /// Timestamp not in `YYYY-MM-DDTHH:MM:SSZ` form
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Structural edge with identical endpoints
    #[error("edge {0} connects a node to itself")]
    SelfLoopEdge(i64),

    /// Offer whose arrival does not follow its departure
    #[error("offer {0}: arrival must be after departure")]
    NonPositiveOfferDuration(i64),

    /// Negative price on an offer
    #[error("offer {0}: price must be non-negative")]
    NegativePrice(i64),

    /// Area with a non-positive catchment radius
    #[error("area {0}: radius must be positive")]
    NonPositiveRadius(i64),

    /// Unknown enum tag read back from the store
    #[error("unknown {field} tag: {value:?}")]
    UnknownTag { field: &'static str, value: String },
}
