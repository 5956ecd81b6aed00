// Search CLI: runs one marketplace search and prints both partitions.
use spaceshare::client::models::search_state::SearchSession;
use spaceshare::client::services::listing_filters;
use spaceshare::client::services::search_service::HttpSearchBackend;
use spaceshare::common::models::{ListingRecord, Segment};
use spaceshare::server::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let term = args.next().unwrap_or_default();
    let segment = args.next().as_deref().and_then(Segment::parse).unwrap_or_default();

    let config = ClientConfig::from_env();
    let backend = HttpSearchBackend::from_config(&config);
    let session = SearchSession::new();

    session.perform_search(&backend, &term, Some(segment)).await;
    let state = session.snapshot().await;

    if let Some(error) = state.error_message {
        eprintln!("{}", error);
        std::process::exit(1);
    }

    let travellers = listing_filters::sort_by_date(&state.travel_listings);
    let shipments = listing_filters::sort_by_date(&state.shipment_listings);

    if travellers.is_empty() && shipments.is_empty() {
        if state.applied_query.is_empty() {
            println!("No listings yet");
        } else {
            println!("No results for '{}'", state.applied_query);
        }
        return Ok(());
    }

    if !travellers.is_empty() {
        println!("Travellers ({}):", travellers.len());
        for listing in &travellers {
            print_listing(listing);
        }
    }
    if !shipments.is_empty() {
        println!("Shipments ({}):", shipments.len());
        for listing in &shipments {
            print_listing(listing);
        }
    }

    Ok(())
}

fn print_listing(listing: &ListingRecord) {
    println!(
        "  [{}] {} | {} -> {} | {:.1}kg @ {:.2} {}/kg | {}",
        listing.id,
        listing.title,
        listing.origin.code,
        listing.destination.code,
        listing.max_weight_kg,
        listing.price_per_kg,
        listing.currency,
        listing.date_value().unwrap_or("no date")
    );
}
