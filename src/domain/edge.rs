//! Structural edges: the route shape independent of any departure.

use serde::{Deserialize, Serialize};

use super::{DomainError, NodeId};

/// Travel mode of a leg. The search engine treats all modes uniformly;
/// only the transfer synthesizer dispatches on mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Flight,
    Train,
    Bus,
    Rideshare,
    Walk,
    Metro,
    Tram,
    Shuttle,
}

impl TravelMode {
    /// Stable tag used in the persisted schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Flight => "flight",
            TravelMode::Train => "train",
            TravelMode::Bus => "bus",
            TravelMode::Rideshare => "rideshare",
            TravelMode::Walk => "walk",
            TravelMode::Metro => "metro",
            TravelMode::Tram => "tram",
            TravelMode::Shuttle => "shuttle",
        }
    }

    /// Parse a schema tag back into a mode.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "flight" => Ok(TravelMode::Flight),
            "train" => Ok(TravelMode::Train),
            "bus" => Ok(TravelMode::Bus),
            "rideshare" => Ok(TravelMode::Rideshare),
            "walk" => Ok(TravelMode::Walk),
            "metro" => Ok(TravelMode::Metro),
            "tram" => Ok(TravelMode::Tram),
            "shuttle" => Ok(TravelMode::Shuttle),
            other => Err(DomainError::UnknownTag {
                field: "mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether an edge is a fixed route or a template instantiated per search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStructure {
    Static,
    DynamicTemplate,
}

impl EdgeStructure {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStructure::Static => "static",
            EdgeStructure::DynamicTemplate => "dynamic_template",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "static" => Ok(EdgeStructure::Static),
            "dynamic_template" => Ok(EdgeStructure::DynamicTemplate),
            other => Err(DomainError::UnknownTag {
                field: "structure",
                value: other.to_string(),
            }),
        }
    }
}

/// A directed structural leg between two nodes.
///
/// Combined with a timed [`Offer`](super::Offer) it becomes a searchable
/// arc. Synthesized first/last-mile edges carry `is_transfer = true` and a
/// negative id scoped to the graph snapshot that created them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeLeg {
    pub id: i64,
    pub from: NodeId,
    pub to: NodeId,
    pub mode: TravelMode,
    /// First/last-mile or inter-mode connection flag; such legs carry the
    /// transfer penalty in the objective.
    pub is_transfer: bool,
    pub carrier: Option<String>,
    pub service_code: Option<String>,
    pub distance_km: Option<f64>,
    /// Nominal duration in minutes.
    pub duration_min: u32,
    /// Per-edge minimum-connect-time override, minutes.
    pub mct_override_min: Option<u32>,
    /// True when the endpoints are effectively the same place.
    pub co_located: bool,
    pub structure: EdgeStructure,
}

impl EdgeLeg {
    /// Create an edge, rejecting self-loops.
    pub fn new(
        id: i64,
        from: NodeId,
        to: NodeId,
        mode: TravelMode,
        duration_min: u32,
    ) -> Result<Self, DomainError> {
        if from == to {
            return Err(DomainError::SelfLoopEdge(id));
        }
        Ok(Self {
            id,
            from,
            to,
            mode,
            is_transfer: false,
            carrier: None,
            service_code: None,
            distance_km: None,
            duration_min,
            mct_override_min: None,
            co_located: false,
            structure: EdgeStructure::Static,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_tags_round_trip() {
        for mode in [
            TravelMode::Flight,
            TravelMode::Train,
            TravelMode::Bus,
            TravelMode::Rideshare,
            TravelMode::Walk,
            TravelMode::Metro,
            TravelMode::Tram,
            TravelMode::Shuttle,
        ] {
            assert_eq!(TravelMode::parse(mode.as_str()).unwrap(), mode);
        }
        assert!(TravelMode::parse("ferry").is_err());
    }

    #[test]
    fn structure_tags_round_trip() {
        assert_eq!(
            EdgeStructure::parse("static").unwrap(),
            EdgeStructure::Static
        );
        assert_eq!(
            EdgeStructure::parse("dynamic_template").unwrap(),
            EdgeStructure::DynamicTemplate
        );
        assert!(EdgeStructure::parse("template").is_err());
    }

    #[test]
    fn self_loop_rejected() {
        let err = EdgeLeg::new(9, NodeId(3), NodeId(3), TravelMode::Bus, 10);
        assert!(matches!(err, Err(DomainError::SelfLoopEdge(9))));
    }

    #[test]
    fn new_defaults() {
        let edge = EdgeLeg::new(1, NodeId(1), NodeId(2), TravelMode::Flight, 75).unwrap();
        assert!(!edge.is_transfer);
        assert!(!edge.co_located);
        assert_eq!(edge.structure, EdgeStructure::Static);
        assert_eq!(edge.duration_min, 75);
    }
}
