//! Persistence adapter for reference data, offers, and search artifacts.
//!
//! The graph assembler consumes exactly four reads per build: the three
//! full-table snapshots plus area lookups from the normalizer. Connections
//! are opened per operation and dropped afterwards; no pooling is assumed,
//! and concurrent searches each pay for their own handle.

mod error;

pub use error::PersistenceError;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::domain::time::{format_utc, parse_utc};
use crate::domain::{
    Area, EdgeLeg, EdgeStructure, GeoPoint, ItineraryBundle, LocationNode, NodeId, NodeKind,
    Offer, OfferSource, TravelMode,
};

/// Maximum number of candidates a fuzzy area lookup returns.
const AREA_LOOKUP_LIMIT: usize = 5;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS area (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    country     TEXT,
    center_lat  REAL NOT NULL,
    center_lon  REAL NOT NULL,
    radius_km   REAL NOT NULL,
    parent_id   INTEGER REFERENCES area(id)
);

CREATE TABLE IF NOT EXISTS location_node (
    id                    INTEGER PRIMARY KEY,
    external_ref          TEXT,
    name                  TEXT NOT NULL,
    kind                  TEXT NOT NULL,
    area_id               INTEGER REFERENCES area(id),
    lat                   REAL NOT NULL,
    lon                   REAL NOT NULL,
    is_hub                INTEGER NOT NULL DEFAULT 0,
    mct_air_to_ground_min INTEGER NOT NULL DEFAULT 0,
    mct_ground_to_air_min INTEGER NOT NULL DEFAULT 0,
    mct_any_min           INTEGER NOT NULL DEFAULT 0,
    country               TEXT,
    timezone              TEXT
);

CREATE TABLE IF NOT EXISTS edge_leg (
    id               INTEGER PRIMARY KEY,
    from_node_id     INTEGER NOT NULL REFERENCES location_node(id),
    to_node_id       INTEGER NOT NULL REFERENCES location_node(id),
    mode             TEXT NOT NULL,
    is_transfer      INTEGER NOT NULL DEFAULT 0,
    carrier          TEXT,
    service_code     TEXT,
    distance_km      REAL,
    duration_min     INTEGER NOT NULL,
    mct_override_min INTEGER,
    co_located       INTEGER NOT NULL DEFAULT 0,
    structure_type   TEXT NOT NULL DEFAULT 'static'
);

CREATE TABLE IF NOT EXISTS offer (
    id                  INTEGER PRIMARY KEY,
    edge_id             INTEGER NOT NULL REFERENCES edge_leg(id) ON DELETE CASCADE,
    departure_time_utc  TEXT NOT NULL,
    arrival_time_utc    TEXT NOT NULL,
    price_total         REAL,
    currency            TEXT NOT NULL DEFAULT 'USD',
    source_type         TEXT NOT NULL,
    provider            TEXT,
    provider_ref        TEXT,
    cache_ref           TEXT,
    is_static           INTEGER NOT NULL DEFAULT 0,
    retrieved_at_utc    TEXT NOT NULL,
    validity_window_hrs REAL,
    effective_from_utc  TEXT,
    last_verified_utc   TEXT,
    ttl_hrs             REAL,
    active              INTEGER NOT NULL DEFAULT 1,
    reliability         REAL,
    meta_json           TEXT
);

CREATE TABLE IF NOT EXISTS api_cache (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    provider              TEXT NOT NULL,
    endpoint              TEXT NOT NULL,
    canonical_params_hash TEXT NOT NULL,
    params_json           TEXT NOT NULL,
    response_body         TEXT NOT NULL,
    created_at_utc        TEXT NOT NULL,
    expires_at_utc        TEXT NOT NULL,
    last_used_at_utc      TEXT,
    hit_count             INTEGER NOT NULL DEFAULT 0,
    UNIQUE (provider, endpoint, canonical_params_hash)
);

CREATE TABLE IF NOT EXISTS itinerary_bundle (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    origin_node_id      INTEGER,
    dest_node_id        INTEGER,
    origin_spec_raw     TEXT NOT NULL,
    dest_spec_raw       TEXT NOT NULL,
    legs_json           TEXT NOT NULL,
    price_total         REAL NOT NULL,
    duration_min        INTEGER NOT NULL,
    num_transfers       INTEGER NOT NULL,
    main_mode           TEXT,
    time_value_per_hour REAL NOT NULL,
    transfer_penalty    REAL NOT NULL,
    risk_penalty        REAL NOT NULL,
    gen_cost            REAL,
    search_status       TEXT NOT NULL,
    search_params_json  TEXT NOT NULL,
    started_at_utc      TEXT NOT NULL,
    finished_at_utc     TEXT NOT NULL
);
"#;

/// A persisted api-cache row, as read back by the cache layer.
#[derive(Debug, Clone)]
pub struct ApiCacheRow {
    pub params_json: String,
    pub response_body: String,
    pub expires_at_utc: DateTime<Utc>,
    pub hit_count: i64,
}

/// SQLite-backed store. Cheap to clone a handle to; each operation opens
/// its own connection.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Create a store handle for the given database path. The file is not
    /// touched until the first operation.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn conn(&self) -> Result<Connection, PersistenceError> {
        Connection::open(&self.path)
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))
    }

    /// Create the persisted tables if they do not exist.
    ///
    /// Schema *evolution* is out of scope; this exists so tests and the
    /// demo binary can bootstrap an empty database.
    pub fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ---- snapshot reads -------------------------------------------------

    /// Full-table snapshot of location nodes, in id order.
    pub fn load_nodes(&self) -> Result<Vec<LocationNode>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, external_ref, name, kind, area_id, lat, lon, is_hub,
                    mct_air_to_ground_min, mct_ground_to_air_min, mct_any_min,
                    country, timezone
             FROM location_node ORDER BY id",
        )?;
        let rows = stmt.query_map([], node_from_row)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row??);
        }
        debug!(count = nodes.len(), "loaded location nodes");
        Ok(nodes)
    }

    /// Full-table snapshot of structural edges, in id order.
    pub fn load_edges(&self) -> Result<Vec<EdgeLeg>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, from_node_id, to_node_id, mode, is_transfer, carrier,
                    service_code, distance_km, duration_min, mct_override_min,
                    co_located, structure_type
             FROM edge_leg ORDER BY id",
        )?;
        let rows = stmt.query_map([], edge_from_row)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row??);
        }
        debug!(count = edges.len(), "loaded structural edges");
        Ok(edges)
    }

    /// Full-table snapshot of offers, in id order.
    pub fn load_offers(&self) -> Result<Vec<Offer>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, edge_id, departure_time_utc, arrival_time_utc, price_total,
                    currency, source_type, provider, provider_ref, cache_ref,
                    is_static, retrieved_at_utc, validity_window_hrs,
                    effective_from_utc, last_verified_utc, ttl_hrs, active,
                    reliability, meta_json
             FROM offer ORDER BY id",
        )?;
        let rows = stmt.query_map([], offer_from_row)?;
        let mut offers = Vec::new();
        for row in rows {
            offers.push(row??);
        }
        debug!(count = offers.len(), "loaded offers");
        Ok(offers)
    }

    // ---- keyed lookups --------------------------------------------------

    /// Fuzzy area lookup: case-insensitive substring match on the name,
    /// at most five candidates, in stable id order.
    pub fn find_areas_by_name(&self, query: &str) -> Result<Vec<Area>, PersistenceError> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", query.trim());
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, country, center_lat, center_lon, radius_km, parent_id
             FROM area WHERE name LIKE ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, AREA_LOOKUP_LIMIT as i64], area_from_row)?;
        let mut areas = Vec::new();
        for row in rows {
            areas.push(row??);
        }
        Ok(areas)
    }

    /// All nodes owned by an area, in id order.
    pub fn nodes_in_area(&self, area_id: i64) -> Result<Vec<LocationNode>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, external_ref, name, kind, area_id, lat, lon, is_hub,
                    mct_air_to_ground_min, mct_ground_to_air_min, mct_any_min,
                    country, timezone
             FROM location_node WHERE area_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![area_id], node_from_row)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row??);
        }
        Ok(nodes)
    }

    /// Resolve a node by its external reference (e.g. `IATA:BOS`).
    pub fn find_node_by_ref(&self, external_ref: &str) -> Result<LocationNode, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, external_ref, name, kind, area_id, lat, lon, is_hub,
                    mct_air_to_ground_min, mct_ground_to_air_min, mct_any_min,
                    country, timezone
             FROM location_node WHERE external_ref = ?1 ORDER BY id LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![external_ref], node_from_row)
            .optional()?;
        match row {
            Some(node) => Ok(node?),
            None => Err(PersistenceError::NotFound(format!(
                "no node with external ref {external_ref:?}"
            ))),
        }
    }

    // ---- ingestion writes (fixtures and the demo binary) ---------------

    pub fn insert_area(&self, area: &Area) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO area (id, name, kind, country, center_lat, center_lon, radius_km, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                area.id,
                area.name,
                area.kind,
                area.country,
                area.center.lat(),
                area.center.lon(),
                area.radius_km,
                area.parent_id,
            ],
        )?;
        Ok(())
    }

    pub fn insert_node(&self, node: &LocationNode) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO location_node
                 (id, external_ref, name, kind, area_id, lat, lon, is_hub,
                  mct_air_to_ground_min, mct_ground_to_air_min, mct_any_min, country, timezone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                node.id.0,
                node.external_ref,
                node.name,
                node.kind.as_str(),
                node.area_id,
                node.coord.lat(),
                node.coord.lon(),
                node.is_hub,
                node.mct_air_to_ground_min,
                node.mct_ground_to_air_min,
                node.mct_any_min,
                node.country,
                node.timezone,
            ],
        )?;
        Ok(())
    }

    pub fn insert_edge(&self, edge: &EdgeLeg) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO edge_leg
                 (id, from_node_id, to_node_id, mode, is_transfer, carrier,
                  service_code, distance_km, duration_min, mct_override_min,
                  co_located, structure_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                edge.id,
                edge.from.0,
                edge.to.0,
                edge.mode.as_str(),
                edge.is_transfer,
                edge.carrier,
                edge.service_code,
                edge.distance_km,
                edge.duration_min,
                edge.mct_override_min,
                edge.co_located,
                edge.structure.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_offer(&self, offer: &Offer) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO offer
                 (id, edge_id, departure_time_utc, arrival_time_utc, price_total,
                  currency, source_type, provider, provider_ref, cache_ref,
                  is_static, retrieved_at_utc, validity_window_hrs,
                  effective_from_utc, last_verified_utc, ttl_hrs, active,
                  reliability, meta_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19)",
            params![
                offer.id,
                offer.edge_id,
                format_utc(offer.departure_utc),
                format_utc(offer.arrival_utc),
                offer.price_total,
                offer.currency,
                offer.source.as_str(),
                offer.provider,
                offer.provider_ref,
                offer.cache_ref,
                offer.is_static,
                format_utc(offer.retrieved_at_utc),
                offer.validity_window_hrs,
                offer.effective_from_utc.map(format_utc),
                offer.last_verified_utc.map(format_utc),
                offer.ttl_hrs,
                offer.active,
                offer.reliability,
                offer.meta.as_ref().map(|m| m.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Persist a finished bundle. Returns the new row id.
    pub fn save_bundle(&self, bundle: &ItineraryBundle) -> Result<i64, PersistenceError> {
        let legs_json = serde_json::to_string(&bundle.legs)
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO itinerary_bundle
                 (origin_node_id, dest_node_id, origin_spec_raw, dest_spec_raw,
                  legs_json, price_total, duration_min, num_transfers, main_mode,
                  time_value_per_hour, transfer_penalty, risk_penalty, gen_cost,
                  search_status, search_params_json, started_at_utc, finished_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17)",
            params![
                bundle.origin_node_id.map(|n| n.0),
                bundle.dest_node_id.map(|n| n.0),
                bundle.origin_spec_raw,
                bundle.dest_spec_raw,
                legs_json,
                bundle.price_total,
                bundle.duration_min,
                bundle.num_transfers,
                bundle.main_mode.map(|m| m.as_str()),
                bundle.time_value_per_hour,
                bundle.transfer_penalty,
                bundle.risk_penalty,
                bundle.gen_cost,
                bundle.search_status.as_str(),
                bundle.search_params_json,
                format_utc(bundle.started_at_utc),
                format_utc(bundle.finished_at_utc),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ---- api cache rows -------------------------------------------------

    pub(crate) fn cache_lookup(
        &self,
        provider: &str,
        endpoint: &str,
        hash: &str,
    ) -> Result<Option<ApiCacheRow>, PersistenceError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT params_json, response_body, expires_at_utc, hit_count
                 FROM api_cache
                 WHERE provider = ?1 AND endpoint = ?2 AND canonical_params_hash = ?3",
                params![provider, endpoint, hash],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((params_json, response_body, expires, hit_count)) => Ok(Some(ApiCacheRow {
                params_json,
                response_body,
                expires_at_utc: parse_utc(&expires)?,
                hit_count,
            })),
            None => Ok(None),
        }
    }

    pub(crate) fn cache_touch(
        &self,
        provider: &str,
        endpoint: &str,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE api_cache
             SET hit_count = hit_count + 1, last_used_at_utc = ?4
             WHERE provider = ?1 AND endpoint = ?2 AND canonical_params_hash = ?3",
            params![provider, endpoint, hash, format_utc(now)],
        )?;
        Ok(())
    }

    pub(crate) fn cache_upsert(
        &self,
        provider: &str,
        endpoint: &str,
        hash: &str,
        params_json: &str,
        response_body: &str,
        created: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_cache
                 (provider, endpoint, canonical_params_hash, params_json,
                  response_body, created_at_utc, expires_at_utc, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
             ON CONFLICT (provider, endpoint, canonical_params_hash)
             DO UPDATE SET params_json = ?4, response_body = ?5,
                           created_at_utc = ?6, expires_at_utc = ?7",
            params![
                provider,
                endpoint,
                hash,
                params_json,
                response_body,
                format_utc(created),
                format_utc(expires),
            ],
        )?;
        Ok(())
    }
}

// ---- row decoders -------------------------------------------------------

type SqlResult<T> = Result<T, rusqlite::Error>;

fn area_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Result<Area, PersistenceError>> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let country: Option<String> = row.get(3)?;
    let lat: f64 = row.get(4)?;
    let lon: f64 = row.get(5)?;
    let radius_km: f64 = row.get(6)?;
    let parent_id: Option<i64> = row.get(7)?;
    Ok((|| {
        let center = GeoPoint::new(lat, lon)?;
        let mut area = Area::new(id, name, kind, center, radius_km)?;
        area.country = country;
        area.parent_id = parent_id;
        Ok(area)
    })())
}

fn node_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Result<LocationNode, PersistenceError>> {
    let id: i64 = row.get(0)?;
    let external_ref: Option<String> = row.get(1)?;
    let name: String = row.get(2)?;
    let kind: String = row.get(3)?;
    let area_id: Option<i64> = row.get(4)?;
    let lat: f64 = row.get(5)?;
    let lon: f64 = row.get(6)?;
    let is_hub: bool = row.get(7)?;
    let mct_ag: u32 = row.get(8)?;
    let mct_ga: u32 = row.get(9)?;
    let mct_any: u32 = row.get(10)?;
    let country: Option<String> = row.get(11)?;
    let timezone: Option<String> = row.get(12)?;
    Ok((|| {
        let coord = GeoPoint::new(lat, lon)?;
        let mut node = LocationNode::new(NodeId(id), name, NodeKind::parse(&kind)?, coord);
        node.external_ref = external_ref;
        node.area_id = area_id;
        node.is_hub = is_hub;
        node.mct_air_to_ground_min = mct_ag;
        node.mct_ground_to_air_min = mct_ga;
        node.mct_any_min = mct_any;
        node.country = country;
        node.timezone = timezone;
        Ok(node)
    })())
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Result<EdgeLeg, PersistenceError>> {
    let id: i64 = row.get(0)?;
    let from: i64 = row.get(1)?;
    let to: i64 = row.get(2)?;
    let mode: String = row.get(3)?;
    let is_transfer: bool = row.get(4)?;
    let carrier: Option<String> = row.get(5)?;
    let service_code: Option<String> = row.get(6)?;
    let distance_km: Option<f64> = row.get(7)?;
    let duration_min: u32 = row.get(8)?;
    let mct_override_min: Option<u32> = row.get(9)?;
    let co_located: bool = row.get(10)?;
    let structure: String = row.get(11)?;
    Ok((|| {
        let mut edge = EdgeLeg::new(
            id,
            NodeId(from),
            NodeId(to),
            TravelMode::parse(&mode)?,
            duration_min,
        )?;
        edge.is_transfer = is_transfer;
        edge.carrier = carrier;
        edge.service_code = service_code;
        edge.distance_km = distance_km;
        edge.mct_override_min = mct_override_min;
        edge.co_located = co_located;
        edge.structure = EdgeStructure::parse(&structure)?;
        Ok(edge)
    })())
}

fn offer_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Result<Offer, PersistenceError>> {
    let id: i64 = row.get(0)?;
    let edge_id: i64 = row.get(1)?;
    let departure: String = row.get(2)?;
    let arrival: String = row.get(3)?;
    let price_total: Option<f64> = row.get(4)?;
    let currency: String = row.get(5)?;
    let source: String = row.get(6)?;
    let provider: Option<String> = row.get(7)?;
    let provider_ref: Option<String> = row.get(8)?;
    let cache_ref: Option<String> = row.get(9)?;
    let is_static: bool = row.get(10)?;
    let retrieved_at: String = row.get(11)?;
    let validity_window_hrs: Option<f64> = row.get(12)?;
    let effective_from: Option<String> = row.get(13)?;
    let last_verified: Option<String> = row.get(14)?;
    let ttl_hrs: Option<f64> = row.get(15)?;
    let active: bool = row.get(16)?;
    let reliability: Option<f64> = row.get(17)?;
    let meta_json: Option<String> = row.get(18)?;
    Ok((|| {
        let mut offer = Offer::new(
            id,
            edge_id,
            parse_utc(&departure)?,
            parse_utc(&arrival)?,
            price_total,
            currency,
            OfferSource::parse(&source)?,
        )?;
        offer.provider = provider;
        offer.provider_ref = provider_ref;
        offer.cache_ref = cache_ref;
        offer.is_static = is_static;
        offer.retrieved_at_utc = parse_utc(&retrieved_at)?;
        offer.validity_window_hrs = validity_window_hrs;
        offer.effective_from_utc = effective_from.as_deref().map(parse_utc).transpose()?;
        offer.last_verified_utc = last_verified.as_deref().map(parse_utc).transpose()?;
        offer.ttl_hrs = ttl_hrs;
        offer.active = active;
        offer.reliability = reliability;
        offer.meta = match meta_json {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| PersistenceError::Corrupted(e.to_string()))?,
            ),
            None => None,
        };
        Ok(offer)
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("routing.db"));
        store.init_schema().unwrap();
        (dir, store)
    }

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 15, h, m, 0).unwrap()
    }

    #[test]
    fn schema_is_idempotent() {
        let (_dir, store) = temp_store();
        store.init_schema().unwrap();
        assert!(store.load_nodes().unwrap().is_empty());
    }

    #[test]
    fn node_round_trip() {
        let (_dir, store) = temp_store();

        let mut node = LocationNode::new(
            NodeId(1),
            "Logan Airport",
            NodeKind::Airport,
            point(42.3656, -71.0096),
        );
        node.external_ref = Some("IATA:BOS".into());
        node.is_hub = true;
        node.mct_air_to_ground_min = 45;
        node.country = Some("US".into());
        store.insert_node(&node).unwrap();

        let loaded = store.load_nodes().unwrap();
        assert_eq!(loaded.len(), 1);
        let back = &loaded[0];
        assert_eq!(back.id, NodeId(1));
        assert_eq!(back.external_ref.as_deref(), Some("IATA:BOS"));
        assert_eq!(back.kind, NodeKind::Airport);
        assert!(back.is_hub);
        assert_eq!(back.mct_air_to_ground_min, 45);
    }

    #[test]
    fn edge_and_offer_round_trip() {
        let (_dir, store) = temp_store();

        let node_a = LocationNode::new(NodeId(1), "A", NodeKind::Airport, point(0.0, 0.0));
        let node_b = LocationNode::new(NodeId(2), "B", NodeKind::Airport, point(0.0, 1.0));
        store.insert_node(&node_a).unwrap();
        store.insert_node(&node_b).unwrap();

        let mut edge = EdgeLeg::new(10, NodeId(1), NodeId(2), TravelMode::Flight, 75).unwrap();
        edge.carrier = Some("DL".into());
        store.insert_edge(&edge).unwrap();

        let mut offer = Offer::new(
            100,
            10,
            t(8, 0),
            t(9, 15),
            Some(118.0),
            "USD",
            OfferSource::ApiLive,
        )
        .unwrap();
        offer.provider = Some("tequila".into());
        offer.meta = Some(serde_json::json!({"fare_class": "Y"}));
        store.insert_offer(&offer).unwrap();

        let edges = store.load_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].carrier.as_deref(), Some("DL"));

        let offers = store.load_offers().unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].duration_min(), 75);
        assert_eq!(offers[0].price_or_zero(), 118.0);
        assert_eq!(offers[0].meta.as_ref().unwrap()["fare_class"], "Y");
    }

    #[test]
    fn fuzzy_area_lookup_caps_and_orders() {
        let (_dir, store) = temp_store();
        for id in 1..=8 {
            let area = Area::new(
                id,
                format!("Greater Boston {id}"),
                "metro",
                point(42.36, -71.06),
                25.0,
            )
            .unwrap();
            store.insert_area(&area).unwrap();
        }

        let found = store.find_areas_by_name("boston").unwrap();
        assert_eq!(found.len(), 5);
        let ids: Vec<i64> = found.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fuzzy_area_lookup_is_case_insensitive() {
        let (_dir, store) = temp_store();
        let area = Area::new(1, "Boston", "city", point(42.36, -71.06), 15.0).unwrap();
        store.insert_area(&area).unwrap();

        assert_eq!(store.find_areas_by_name("BOSTON").unwrap().len(), 1);
        assert_eq!(store.find_areas_by_name("ost").unwrap().len(), 1);
        assert!(store.find_areas_by_name("cambridge").unwrap().is_empty());
    }

    #[test]
    fn nodes_in_area_filters_by_owner() {
        let (_dir, store) = temp_store();
        let area = Area::new(7, "Boston", "city", point(42.36, -71.06), 15.0).unwrap();
        store.insert_area(&area).unwrap();

        let mut inside = LocationNode::new(
            NodeId(1),
            "South Station",
            NodeKind::Station,
            point(42.3519, -71.0552),
        );
        inside.area_id = Some(7);
        let outside = LocationNode::new(NodeId(2), "Penn", NodeKind::Station, point(40.75, -73.99));
        store.insert_node(&inside).unwrap();
        store.insert_node(&outside).unwrap();

        let nodes = store.nodes_in_area(7).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, NodeId(1));
    }

    #[test]
    fn find_node_by_ref_hits_and_misses() {
        let (_dir, store) = temp_store();
        let mut node = LocationNode::new(
            NodeId(1),
            "Logan Airport",
            NodeKind::Airport,
            point(42.3656, -71.0096),
        );
        node.external_ref = Some("IATA:BOS".into());
        store.insert_node(&node).unwrap();

        assert_eq!(store.find_node_by_ref("IATA:BOS").unwrap().id, NodeId(1));
        assert!(matches!(
            store.find_node_by_ref("IATA:JFK"),
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_mode_tag_surfaces_as_corrupted() {
        let (_dir, store) = temp_store();
        let conn = Connection::open(store.path.clone()).unwrap();
        conn.execute_batch(
            "INSERT INTO location_node (id, name, kind, lat, lon) VALUES (1, 'A', 'airport', 0, 0);
             INSERT INTO location_node (id, name, kind, lat, lon) VALUES (2, 'B', 'airport', 0, 1);
             INSERT INTO edge_leg (id, from_node_id, to_node_id, mode, duration_min)
                 VALUES (1, 1, 2, 'zeppelin', 60);",
        )
        .unwrap();

        assert!(matches!(
            store.load_edges(),
            Err(PersistenceError::Corrupted(_))
        ));
    }

    #[test]
    fn missing_tables_surface_as_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("empty.db"));
        // No init_schema: any read must fail as Unavailable, not panic.
        assert!(matches!(
            store.load_nodes(),
            Err(PersistenceError::Unavailable(_))
        ));
    }

    #[test]
    fn save_bundle_round_trips_row() {
        use crate::domain::{ItineraryBundle, SearchStatus};

        let (_dir, store) = temp_store();
        let bundle = ItineraryBundle {
            origin_node_id: Some(NodeId(1)),
            dest_node_id: Some(NodeId(2)),
            origin_spec_raw: "boston".into(),
            dest_spec_raw: "new york".into(),
            legs: vec![],
            price_total: 0.0,
            duration_min: 0,
            num_transfers: 0,
            main_mode: None,
            time_value_per_hour: 20.0,
            transfer_penalty: 6.0,
            risk_penalty: 0.0,
            gen_cost: Some(0.0),
            search_status: SearchStatus::Ok,
            search_params_json: "{}".into(),
            started_at_utc: t(8, 0),
            finished_at_utc: t(8, 0),
        };
        let id = store.save_bundle(&bundle).unwrap();
        assert!(id > 0);

        let conn = Connection::open(store.path.clone()).unwrap();
        let status: String = conn
            .query_row(
                "SELECT search_status FROM itinerary_bundle WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "OK");
    }
}
