//! Command-line interface definitions for NPS Explorer.
//!
//! Every option can also be supplied through an environment variable.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for NPS Explorer.
///
/// # Examples
///
/// ```sh
/// # Browse with the default cache file
/// MAPQUEST_API_KEY=YOUR_KEY nps_explorer
///
/// # Keep the cache elsewhere and retry flaky requests
/// nps_explorer --cache-file ~/.cache/nps.json --retries 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file holding cached responses
    #[arg(short, long, env = "NPS_CACHE_FILE", default_value = "cache.json")]
    pub cache_file: PathBuf,

    /// MapQuest API key for nearby-place searches
    #[arg(long, env = "MAPQUEST_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Root of the park service website
    #[arg(long, env = "NPS_BASE_URL", default_value = "https://www.nps.gov")]
    pub base_url: String,

    /// Path of the page carrying the state menu, relative to the base URL
    #[arg(long, default_value = "/index.htm")]
    pub index_path: String,

    /// MapQuest radius search endpoint
    #[arg(
        long,
        env = "MAPQUEST_RADIUS_URL",
        default_value = "http://www.mapquestapi.com/search/v2/radius"
    )]
    pub proximity_url: String,

    /// Extra attempts for transient network failures (0 = fail on first error)
    #[arg(short, long, env = "NPS_FETCH_RETRIES", default_value_t = 0)]
    pub retries: usize,
}
