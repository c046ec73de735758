//! # NPS Explorer
//!
//! Browse national park sites by state and look up places near a chosen
//! site. Site pages are scraped from the National Park Service website and
//! nearby places come from the MapQuest radius search API.
//!
//! ## Usage
//!
//! ```sh
//! MAPQUEST_API_KEY=YOUR_KEY nps_explorer --cache-file cache.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Cache**: every request is keyed by a fingerprint and stored in one
//!    JSON file that survives restarts
//! 2. **Fetch**: a gateway serves hits from the cache and fetches misses live
//! 3. **Scrape**: index page → state page → site pages, parsed into `Site`s
//! 4. **Nearby**: a radius search around the site's postal code, formatted
//!    one line per place

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cache;
mod cli;
mod error;
mod fetch;
mod models;
mod proximity;
mod scrapers;
mod session;
mod utils;

use cache::PersistentCache;
use cli::Cli;
use fetch::{FetchGateway, HttpTransport, RetryTransport};
use proximity::ProximityConfig;
use session::{Session, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("nps_explorer starting up");

    let args = Cli::parse();
    debug!(cache_file = %args.cache_file.display(), base_url = %args.base_url, retries = args.retries, "Parsed CLI arguments");

    let base_url = Url::parse(&args.base_url)?;
    let index_url = base_url.join(&args.index_path)?.to_string();

    let cache = PersistentCache::load(&args.cache_file).await;
    if cache.is_empty() {
        info!(path = %cache.path().display(), "Starting with an empty cache");
    }
    let transport = RetryTransport::new(HttpTransport::new()?, args.retries, Duration::from_secs(1));
    let config = SessionConfig {
        base_url,
        index_url,
        proximity: ProximityConfig {
            endpoint: args.proximity_url,
            api_key: args.api_key,
        },
    };

    let mut session = Session::new(FetchGateway::new(transport), cache, config);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    session.run(stdin.lock(), stdout.lock()).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        cached_entries = session.cache().len(),
        "Session complete"
    );
    Ok(())
}
