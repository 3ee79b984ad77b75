//! Synthetic first/last-mile transfer legs.
//!
//! Nearby nodes that no carrier connects are joined by synthesized walk,
//! rideshare, and shuttle legs from deterministic cost/time models. The
//! resulting `{edge, offer}` pairs live only inside the graph snapshot of
//! a single search and are never persisted.
//!
//! Synthesis is infallible from the caller's point of view: any pair the
//! models cannot price (self-loops, degenerate distances) simply yields no
//! transfer.

use chrono::{DateTime, Utc};

use crate::domain::{EdgeLeg, EdgeStructure, LocationNode, Offer, OfferSource, TravelMode};

/// Walking speed assumed by the walk model, km/h.
const WALK_SPEED_KMH: f64 = 5.0;

/// Floor on walk duration, minutes.
const WALK_MIN_DURATION_MIN: u32 = 3;

/// Floor on rideshare duration, minutes.
const RIDESHARE_MIN_DURATION_MIN: u32 = 5;

/// Shuttle cruising speed, km/h.
const SHUTTLE_SPEED_KMH: f64 = 25.0;

/// Distance under which two nodes count as the same place, km.
const CO_LOCATED_KM: f64 = 0.3;

/// Validity window stamped on walk offers; effectively forever.
const WALK_VALIDITY_SENTINEL_HRS: f64 = 87_600.0;

/// Validity window stamped on shuttle offers, hours.
const SHUTTLE_VALIDITY_HRS: f64 = 24.0;

/// TTL stamped on rideshare estimates, hours.
const RIDESHARE_TTL_HRS: f64 = 1.0;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Deterministic rideshare pricing model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RideshareModel {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_min: f64,
    pub avg_speed_kmh: f64,
    pub surge_coeff: f64,
}

impl Default for RideshareModel {
    fn default() -> Self {
        Self {
            base_fare: 3.00,
            per_km: 1.25,
            per_min: 0.25,
            avg_speed_kmh: 35.0,
            surge_coeff: 1.0,
        }
    }
}

impl RideshareModel {
    /// Trip duration for a given distance, minutes.
    pub fn duration_min(&self, distance_km: f64) -> u32 {
        let raw = (distance_km / self.avg_speed_kmh * 60.0).round() as u32;
        raw.max(RIDESHARE_MIN_DURATION_MIN)
    }

    /// Trip price for a given distance and duration, rounded to cents.
    pub fn price(&self, distance_km: f64, duration_min: u32) -> f64 {
        let fare =
            self.base_fare + self.per_km * distance_km + self.per_min * f64::from(duration_min);
        round2(fare * self.surge_coeff)
    }
}

/// Walk duration for a given distance, minutes.
pub fn walk_duration_min(distance_km: f64) -> u32 {
    let raw = (distance_km / WALK_SPEED_KMH * 60.0).round() as u32;
    raw.max(WALK_MIN_DURATION_MIN)
}

/// Shuttle duration for a given distance, minutes. No floor: a shuttle
/// over a co-located pair rounds to zero and the offer is rejected.
pub fn shuttle_duration_min(distance_km: f64) -> u32 {
    (distance_km / SHUTTLE_SPEED_KMH * 60.0).round() as u32
}

/// Produces synthetic transfer `{edge, offer}` pairs between node pairs.
#[derive(Debug, Clone)]
pub struct TransferSynthesizer {
    rideshare: RideshareModel,
    shuttle_price: f64,
}

impl Default for TransferSynthesizer {
    fn default() -> Self {
        Self {
            rideshare: RideshareModel::default(),
            shuttle_price: 12.0,
        }
    }
}

impl TransferSynthesizer {
    /// Create a synthesizer with the given rideshare model and shuttle
    /// flat price.
    pub fn new(rideshare: RideshareModel, shuttle_price: f64) -> Self {
        Self {
            rideshare,
            shuttle_price,
        }
    }

    /// Walk transfer. Free, always boardable, flagged co-located under
    /// 300 m.
    pub fn walk(
        &self,
        a: &LocationNode,
        b: &LocationNode,
        edge_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Option<(EdgeLeg, Offer)> {
        let distance = finite_distance(a, b)?;
        let duration = walk_duration_min(distance);

        let mut edge = EdgeLeg::new(edge_id, a.id, b.id, TravelMode::Walk, duration).ok()?;
        edge.is_transfer = true;
        edge.distance_km = Some(distance);
        edge.co_located = distance < CO_LOCATED_KM;

        let mut offer = Offer::new(
            offer_id,
            edge_id,
            now,
            now + chrono::Duration::minutes(i64::from(duration)),
            Some(0.0),
            "USD",
            OfferSource::ManualStatic,
        )
        .ok()?;
        offer.is_static = true;
        offer.retrieved_at_utc = now;
        offer.validity_window_hrs = Some(WALK_VALIDITY_SENTINEL_HRS);

        Some((edge, offer))
    }

    /// Rideshare transfer priced by the configured model. Short-TTL
    /// estimate rather than a static offer.
    pub fn rideshare(
        &self,
        a: &LocationNode,
        b: &LocationNode,
        edge_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Option<(EdgeLeg, Offer)> {
        let distance = finite_distance(a, b)?;
        let duration = self.rideshare.duration_min(distance);
        let price = self.rideshare.price(distance, duration);

        let mut edge = EdgeLeg::new(edge_id, a.id, b.id, TravelMode::Rideshare, duration).ok()?;
        edge.is_transfer = true;
        edge.distance_km = Some(distance);
        edge.structure = EdgeStructure::DynamicTemplate;

        let mut offer = Offer::new(
            offer_id,
            edge_id,
            now,
            now + chrono::Duration::minutes(i64::from(duration)),
            Some(price),
            "USD",
            OfferSource::EstimatedModel,
        )
        .ok()?;
        offer.retrieved_at_utc = now;
        offer.ttl_hrs = Some(RIDESHARE_TTL_HRS);

        Some((edge, offer))
    }

    /// Flat-price shuttle transfer.
    pub fn shuttle(
        &self,
        a: &LocationNode,
        b: &LocationNode,
        edge_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Option<(EdgeLeg, Offer)> {
        let distance = finite_distance(a, b)?;
        let duration = shuttle_duration_min(distance);

        let mut edge = EdgeLeg::new(edge_id, a.id, b.id, TravelMode::Shuttle, duration).ok()?;
        edge.is_transfer = true;
        edge.distance_km = Some(distance);

        let mut offer = Offer::new(
            offer_id,
            edge_id,
            now,
            now + chrono::Duration::minutes(i64::from(duration)),
            Some(self.shuttle_price),
            "USD",
            OfferSource::ManualStatic,
        )
        .ok()?;
        offer.is_static = true;
        offer.retrieved_at_utc = now;
        offer.validity_window_hrs = Some(SHUTTLE_VALIDITY_HRS);

        Some((edge, offer))
    }
}

fn finite_distance(a: &LocationNode, b: &LocationNode) -> Option<f64> {
    let d = a.coord.haversine_km(&b.coord);
    d.is_finite().then_some(d)
}
