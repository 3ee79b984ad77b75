//! Routable location nodes.

use serde::{Deserialize, Serialize};

use super::{DomainError, GeoPoint};

/// Identifier of a [`LocationNode`].
///
/// Persisted nodes carry non-negative ids. Negative ids are reserved for
/// synthetic nodes (geocoded addresses) created for the duration of a
/// single search; they are handed out from a per-search monotonic counter
/// and never collide with stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl NodeId {
    /// True if this id denotes an unpersisted synthetic node.
    pub fn is_synthetic(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of endpoint a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Airport,
    Station,
    BusTerminal,
    Hotel,
    Address,
    Area,
    Poi,
}

impl NodeKind {
    /// Stable tag used in the persisted schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Airport => "airport",
            NodeKind::Station => "station",
            NodeKind::BusTerminal => "bus_terminal",
            NodeKind::Hotel => "hotel",
            NodeKind::Address => "address",
            NodeKind::Area => "area",
            NodeKind::Poi => "poi",
        }
    }

    /// Parse a schema tag back into a kind.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "airport" => Ok(NodeKind::Airport),
            "station" => Ok(NodeKind::Station),
            "bus_terminal" => Ok(NodeKind::BusTerminal),
            "hotel" => Ok(NodeKind::Hotel),
            "address" => Ok(NodeKind::Address),
            "area" => Ok(NodeKind::Area),
            "poi" => Ok(NodeKind::Poi),
            other => Err(DomainError::UnknownTag {
                field: "node kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A routable point in the transport graph.
///
/// Minimum-connect-time defaults are carried on the node but not enforced
/// by the search engine; they are reserved for itinerary feasibility
/// checks downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationNode {
    pub id: NodeId,
    /// External reference such as `IATA:BOS`, if any.
    pub external_ref: Option<String>,
    pub name: String,
    pub kind: NodeKind,
    /// Owning area, if the node belongs to one.
    pub area_id: Option<i64>,
    pub coord: GeoPoint,
    pub is_hub: bool,
    /// Minimum connect time, air leg to ground leg, minutes.
    pub mct_air_to_ground_min: u32,
    /// Minimum connect time, ground leg to air leg, minutes.
    pub mct_ground_to_air_min: u32,
    /// Minimum connect time between any two legs, minutes.
    pub mct_any_min: u32,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

impl LocationNode {
    /// Create a node with the required fields; optional attributes default
    /// to absent and MCTs to zero.
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind, coord: GeoPoint) -> Self {
        Self {
            id,
            external_ref: None,
            name: name.into(),
            kind,
            area_id: None,
            coord,
            is_hub: false,
            mct_air_to_ground_min: 0,
            mct_ground_to_air_min: 0,
            mct_any_min: 0,
            country: None,
            timezone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            NodeKind::Airport,
            NodeKind::Station,
            NodeKind::BusTerminal,
            NodeKind::Hotel,
            NodeKind::Address,
            NodeKind::Area,
            NodeKind::Poi,
        ] {
            assert_eq!(NodeKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(NodeKind::parse("harbor").is_err());
        assert!(NodeKind::parse("").is_err());
        assert!(NodeKind::parse("Airport").is_err());
    }

    #[test]
    fn synthetic_ids_are_negative() {
        assert!(NodeId(-1).is_synthetic());
        assert!(!NodeId(0).is_synthetic());
        assert!(!NodeId(42).is_synthetic());
    }

    #[test]
    fn new_defaults() {
        let coord = GeoPoint::new(42.0, -71.0).unwrap();
        let node = LocationNode::new(NodeId(1), "South Station", NodeKind::Station, coord);
        assert_eq!(node.name, "South Station");
        assert!(!node.is_hub);
        assert_eq!(node.mct_any_min, 0);
        assert!(node.area_id.is_none());
    }
}
