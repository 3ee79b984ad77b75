//! Command-line front end: bootstrap a database and run searches.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intermodal_router::domain::time::parse_utc;
use intermodal_router::domain::{
    Area, EdgeLeg, GeoPoint, LocationNode, NodeId, NodeKind, Offer, OfferSource, TravelMode,
};
use intermodal_router::normalize::HashGeocoder;
use intermodal_router::planner::SearchParams;
use intermodal_router::service::RoutingService;
use intermodal_router::store::Store;

#[derive(Parser)]
#[command(name = "intermodal-router", about = "Door-to-door intermodal routing")]
struct Cli {
    /// Path to the routing database.
    #[arg(long, default_value = "routing.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema, optionally with a small demo dataset.
    Init {
        /// Seed a Boston / New York demo graph.
        #[arg(long)]
        demo: bool,
    },
    /// Plan one itinerary and print it as JSON.
    Search {
        /// Origin spec: area name, `hotel ... near <area>`, `address:...`
        /// or `ref:<external-ref>`.
        origin: String,
        /// Destination spec, same forms as the origin.
        dest: String,
        /// Earliest boarding time, `YYYY-MM-DDTHH:MM:SSZ`. Defaults to now.
        #[arg(long)]
        depart_after: Option<String>,
        /// Value of an hour of travel time, currency units.
        #[arg(long)]
        time_value: Option<f64>,
        /// Flat penalty per transfer leg.
        #[arg(long)]
        transfer_penalty: Option<f64>,
        /// Expansion budget.
        #[arg(long)]
        max_expansions: Option<u64>,
        /// Wall-clock budget, milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Fail on ambiguous area names instead of tie-breaking.
        #[arg(long)]
        strict: bool,
        /// Persist the bundle to the database.
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = Store::new(&cli.db);

    match cli.command {
        Command::Init { demo } => {
            store.init_schema()?;
            if demo {
                seed_demo(&store)?;
                println!("initialized {} with demo data", cli.db);
            } else {
                println!("initialized {}", cli.db);
            }
        }
        Command::Search {
            origin,
            dest,
            depart_after,
            time_value,
            transfer_penalty,
            max_expansions,
            timeout_ms,
            strict,
            save,
        } => {
            let mut params = SearchParams {
                strict_area_match: strict,
                ..Default::default()
            };
            if let Some(ts) = depart_after {
                params.depart_after = Some(parse_utc(&ts)?);
            }
            if let Some(v) = time_value {
                params.time_value_per_hour = v;
            }
            if let Some(v) = transfer_penalty {
                params.transfer_penalty = v;
            }
            if let Some(v) = max_expansions {
                params.max_expansions = v;
            }
            if let Some(v) = timeout_ms {
                params.timeout_ms = v;
            }

            let service = RoutingService::new(store, HashGeocoder);
            let bundle = if save {
                service.plan_and_store(&origin, &dest, &params)?.0
            } else {
                service.plan(&origin, &dest, &params)?
            };
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        }
    }
    Ok(())
}

/// A small two-city graph so `search` has something to chew on.
fn seed_demo(store: &Store) -> Result<(), Box<dyn std::error::Error>> {
    let point = |lat, lon| GeoPoint::new(lat, lon);

    let boston = Area::new(1, "Boston", "city", point(42.36, -71.06)?, 15.0)?;
    let new_york = Area::new(2, "New York", "city", point(40.75, -73.99)?, 20.0)?;
    store.insert_area(&boston)?;
    store.insert_area(&new_york)?;

    let mut logan = LocationNode::new(
        NodeId(1),
        "Logan Airport",
        NodeKind::Airport,
        point(42.3656, -71.0096)?,
    );
    logan.external_ref = Some("IATA:BOS".into());
    logan.area_id = Some(1);
    logan.is_hub = true;

    let mut south_station = LocationNode::new(
        NodeId(2),
        "South Station",
        NodeKind::Station,
        point(42.3519, -71.0552)?,
    );
    south_station.area_id = Some(1);

    let mut jfk = LocationNode::new(
        NodeId(3),
        "JFK Airport",
        NodeKind::Airport,
        point(40.6413, -73.7781)?,
    );
    jfk.external_ref = Some("IATA:JFK".into());
    jfk.area_id = Some(2);
    jfk.is_hub = true;

    let mut moynihan = LocationNode::new(
        NodeId(4),
        "Moynihan Train Hall",
        NodeKind::Station,
        point(40.7520, -73.9961)?,
    );
    moynihan.area_id = Some(2);

    for node in [&logan, &south_station, &jfk, &moynihan] {
        store.insert_node(node)?;
    }

    let mut flight = EdgeLeg::new(10, NodeId(1), NodeId(3), TravelMode::Flight, 75)?;
    flight.carrier = Some("DL".into());
    let train = EdgeLeg::new(11, NodeId(2), NodeId(4), TravelMode::Train, 220)?;
    let bus = EdgeLeg::new(12, NodeId(2), NodeId(4), TravelMode::Bus, 260)?;
    for edge in [&flight, &train, &bus] {
        store.insert_edge(edge)?;
    }

    let offers = [
        (100, 10, "2025-11-15T08:00:00Z", "2025-11-15T09:15:00Z", 118.0),
        (101, 11, "2025-11-15T08:05:00Z", "2025-11-15T11:45:00Z", 79.0),
        (102, 12, "2025-11-15T08:30:00Z", "2025-11-15T12:50:00Z", 25.0),
    ];
    for (id, edge_id, dep, arr, price) in offers {
        let offer = Offer::new(
            id,
            edge_id,
            parse_utc(dep)?,
            parse_utc(arr)?,
            Some(price),
            "USD",
            OfferSource::ManualStatic,
        )?;
        store.insert_offer(&offer)?;
    }
    Ok(())
}
