//! Nearby-place lookup through the MapQuest radius search API.

use crate::cache::PersistentCache;
use crate::error::{NpsError, Result};
use crate::fetch::{FetchGateway, QueryParams, Transport};
use crate::models::{NO_ADDRESS, NO_CATEGORY, NO_CITY, SearchResponse, Site};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

/// Search radius around the origin, in miles.
pub const SEARCH_RADIUS: u32 = 10;
pub const MAX_MATCHES: u32 = 10;

/// Where and how to reach the radius search service.
#[derive(Debug, Clone)]
pub struct ProximityConfig {
    pub endpoint: String,
    pub api_key: String,
}

/// Query parameters for a radius search centred on the site's postal code.
///
/// The postal code is sent as-is, sentinel included.
pub fn search_params(api_key: &str, site: &Site) -> QueryParams {
    [
        ("key", api_key.to_string()),
        ("origin", site.postal_code.clone()),
        ("radius", SEARCH_RADIUS.to_string()),
        ("maxMatches", MAX_MATCHES.to_string()),
        ("ambiguities", "ignore".to_string()),
        ("outFormat", "json".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Look up places near `site`. The decoded response is returned unmodified.
#[instrument(level = "info", skip_all, fields(site = %site.name, origin = %site.postal_code))]
pub async fn nearby_places<T: Transport>(
    gateway: &FetchGateway<T>,
    cache: &mut PersistentCache,
    config: &ProximityConfig,
    site: &Site,
) -> Result<Value> {
    let params = search_params(&config.api_key, site);
    gateway
        .fetch_structured(&config.endpoint, cache, &params)
        .await
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

/// Render a radius search result as one line per place, in result order:
///
/// ```text
/// - Cafe X (no category): 1 Main St, Town
/// ```
///
/// Empty category, address or city strings become `"no category"`,
/// `"no address"` and `"no city"`.
///
/// # Errors
///
/// [`NpsError::MalformedResult`] if any entry lacks `name` or one of the three
/// fields. Only empty strings are substituted, never missing keys.
pub fn format_nearby_places(result: &Value) -> Result<Vec<String>> {
    let response = SearchResponse::deserialize(result).map_err(NpsError::MalformedResult)?;

    let lines: Vec<String> = response
        .searchResults
        .iter()
        .map(|place| {
            format!(
                "- {} ({}): {}, {}",
                place.name,
                or_placeholder(&place.fields.group_sic_code_name, NO_CATEGORY),
                or_placeholder(&place.fields.address, NO_ADDRESS),
                or_placeholder(&place.fields.city, NO_CITY),
            )
        })
        .collect();
    info!(count = lines.len(), "Formatted nearby places");
    Ok(lines)
}
