//! Priced, timed instances of traversing a structural edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Where an offer's price/time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSource {
    ApiLive,
    Cached,
    ManualStatic,
    EstimatedModel,
}

impl OfferSource {
    /// Stable tag used in the persisted schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferSource::ApiLive => "api_live",
            OfferSource::Cached => "cached",
            OfferSource::ManualStatic => "manual_static",
            OfferSource::EstimatedModel => "estimated_model",
        }
    }

    /// Parse a schema tag back into a source.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "api_live" => Ok(OfferSource::ApiLive),
            "cached" => Ok(OfferSource::Cached),
            "manual_static" => Ok(OfferSource::ManualStatic),
            "estimated_model" => Ok(OfferSource::EstimatedModel),
            other => Err(DomainError::UnknownTag {
                field: "source_type",
                value: other.to_string(),
            }),
        }
    }
}

/// A priced, timed traversal of an [`EdgeLeg`](super::EdgeLeg).
///
/// Static offers (`is_static = true`) are usable at any departure time:
/// their timestamps are anchor placeholders whose difference carries the
/// duration, and the search binds the effective departure to the frontier
/// arrival at the boarding node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub edge_id: i64,
    pub departure_utc: DateTime<Utc>,
    pub arrival_utc: DateTime<Utc>,
    /// Total cash price; `None` is treated as zero by the evaluator.
    pub price_total: Option<f64>,
    pub currency: String,
    pub source: OfferSource,
    pub provider: Option<String>,
    pub provider_ref: Option<String>,
    pub cache_ref: Option<String>,
    pub is_static: bool,
    pub retrieved_at_utc: DateTime<Utc>,
    pub validity_window_hrs: Option<f64>,
    pub effective_from_utc: Option<DateTime<Utc>>,
    pub last_verified_utc: Option<DateTime<Utc>>,
    pub ttl_hrs: Option<f64>,
    pub active: bool,
    pub reliability: Option<f64>,
    pub meta: Option<serde_json::Value>,
}

impl Offer {
    /// Create an offer with the required fields, validating the timing and
    /// price invariants. Optional attributes default to absent and the
    /// offer to active.
    pub fn new(
        id: i64,
        edge_id: i64,
        departure_utc: DateTime<Utc>,
        arrival_utc: DateTime<Utc>,
        price_total: Option<f64>,
        currency: impl Into<String>,
        source: OfferSource,
    ) -> Result<Self, DomainError> {
        if arrival_utc <= departure_utc {
            return Err(DomainError::NonPositiveOfferDuration(id));
        }
        if let Some(p) = price_total
            && !(p >= 0.0)
        {
            return Err(DomainError::NegativePrice(id));
        }
        Ok(Self {
            id,
            edge_id,
            departure_utc,
            arrival_utc,
            price_total,
            currency: currency.into(),
            source,
            provider: None,
            provider_ref: None,
            cache_ref: None,
            is_static: false,
            retrieved_at_utc: departure_utc,
            validity_window_hrs: None,
            effective_from_utc: None,
            last_verified_utc: None,
            ttl_hrs: None,
            active: true,
            reliability: None,
            meta: None,
        })
    }

    /// Duration carried by the offer timestamps, in whole minutes.
    pub fn duration_min(&self) -> i64 {
        (self.arrival_utc - self.departure_utc).num_minutes()
    }

    /// True when the offer is usable at any departure time: static
    /// offers, and model estimates whose timestamps are generation
    /// anchors rather than a schedule. The search binds the effective
    /// departure of such offers to the frontier arrival at the boarding
    /// node.
    pub fn boards_at_frontier(&self) -> bool {
        self.is_static || self.source == OfferSource::EstimatedModel
    }

    /// Cash price, treating an absent price as zero.
    pub fn price_or_zero(&self) -> f64 {
        self.price_total.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 15, h, m, 0).unwrap()
    }

    #[test]
    fn source_tags_round_trip() {
        for src in [
            OfferSource::ApiLive,
            OfferSource::Cached,
            OfferSource::ManualStatic,
            OfferSource::EstimatedModel,
        ] {
            assert_eq!(OfferSource::parse(src.as_str()).unwrap(), src);
        }
        assert!(OfferSource::parse("scraped").is_err());
    }

    #[test]
    fn arrival_must_follow_departure() {
        let err = Offer::new(
            1,
            1,
            t(9, 0),
            t(8, 0),
            Some(10.0),
            "USD",
            OfferSource::ApiLive,
        );
        assert!(matches!(err, Err(DomainError::NonPositiveOfferDuration(1))));

        let err = Offer::new(
            2,
            1,
            t(9, 0),
            t(9, 0),
            Some(10.0),
            "USD",
            OfferSource::ApiLive,
        );
        assert!(matches!(err, Err(DomainError::NonPositiveOfferDuration(2))));
    }

    #[test]
    fn negative_price_rejected() {
        let err = Offer::new(
            3,
            1,
            t(8, 0),
            t(9, 15),
            Some(-1.0),
            "USD",
            OfferSource::ApiLive,
        );
        assert!(matches!(err, Err(DomainError::NegativePrice(3))));
    }

    #[test]
    fn frontier_boarding_rule() {
        let mut offer =
            Offer::new(6, 1, t(8, 0), t(8, 12), Some(0.0), "USD", OfferSource::ManualStatic)
                .unwrap();
        assert!(!offer.boards_at_frontier());
        offer.is_static = true;
        assert!(offer.boards_at_frontier());

        let estimate =
            Offer::new(7, 1, t(8, 0), t(8, 10), Some(5.5), "USD", OfferSource::EstimatedModel)
                .unwrap();
        assert!(estimate.boards_at_frontier());

        let scheduled =
            Offer::new(8, 1, t(8, 0), t(9, 15), Some(118.0), "USD", OfferSource::ApiLive).unwrap();
        assert!(!scheduled.boards_at_frontier());
    }

    #[test]
    fn duration_and_price_helpers() {
        let offer = Offer::new(4, 1, t(8, 0), t(9, 15), None, "USD", OfferSource::ApiLive).unwrap();
        assert_eq!(offer.duration_min(), 75);
        assert_eq!(offer.price_or_zero(), 0.0);

        let offer =
            Offer::new(5, 1, t(8, 0), t(9, 15), Some(118.0), "USD", OfferSource::ApiLive).unwrap();
        assert_eq!(offer.price_or_zero(), 118.0);
    }
}
