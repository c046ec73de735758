//! National Park Service scraper.
//!
//! # Pages
//!
//! | Page | Selector | Yields |
//! |------|----------|--------|
//! | Index | `ul.dropdown-menu.SearchBar-keywordSearch li a` | state name → state URL |
//! | State | `div.list_left h3 a[href]` | one site URL per block |
//! | Site | `a.Hero-title`, `span[itemprop=…]` | one [`Site`] |
//!
//! Links are resolved against the configured base URL. Site links point at a
//! park directory, so `index.htm` is appended to reach its home page.

use crate::cache::PersistentCache;
use crate::error::{NpsError, Result};
use crate::fetch::{FetchGateway, Transport};
use crate::models::{NO_ADDRESS, NO_PHONE, NO_ZIPCODE, Site};
use crate::utils::element_text;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Lower-cased state name → state page URL.
pub type StateIndex = BTreeMap<String, String>;

static STATE_MENU: Lazy<Selector> =
    Lazy::new(|| selector("ul.dropdown-menu.SearchBar-keywordSearch"));
static MENU_ITEM: Lazy<Selector> = Lazy::new(|| selector("li"));
static ITEM_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

static SITE_BLOCK: Lazy<Selector> =
    Lazy::new(|| selector("div.col-md-9.col-sm-9.col-xs-12.table-cell.list_left"));
static BLOCK_LINK: Lazy<Selector> = Lazy::new(|| selector("h3 a[href]"));

static HERO_TITLE: Lazy<Selector> = Lazy::new(|| selector("a.Hero-title"));
static HERO_DESIGNATION: Lazy<Selector> = Lazy::new(|| selector("span.Hero-designation"));
static LOCALITY: Lazy<Selector> = Lazy::new(|| selector(r#"span[itemprop="addressLocality"]"#));
static REGION: Lazy<Selector> = Lazy::new(|| selector(r#"span[itemprop="addressRegion"]"#));
static POSTAL_CODE: Lazy<Selector> = Lazy::new(|| selector(r#"span[itemprop="postalCode"]"#));
static TELEPHONE: Lazy<Selector> = Lazy::new(|| selector(r#"span[itemprop="telephone"]"#));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

/// An optional field the page does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldAbsent(&'static str);

fn optional_field(
    document: &Html,
    selector: &Selector,
    field: &'static str,
) -> std::result::Result<String, FieldAbsent> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .ok_or(FieldAbsent(field))
}

fn or_sentinel(
    value: std::result::Result<String, FieldAbsent>,
    sentinel: &str,
) -> String {
    value.unwrap_or_else(|FieldAbsent(field)| {
        debug!(field, sentinel, "Field absent; using sentinel");
        sentinel.to_string()
    })
}

/// Parse one site page.
///
/// The name is required. Every other field is extracted independently and
/// replaced by its sentinel when missing; the address needs both locality
/// and region or it falls back to `"no address"` as a whole.
pub fn extract_site(html: &str) -> Result<Site> {
    let document = Html::parse_document(html);

    let name = document
        .select(&HERO_TITLE)
        .next()
        .map(element_text)
        .ok_or_else(|| NpsError::Structure("site page has no a.Hero-title".to_string()))?;

    let address = optional_field(&document, &LOCALITY, "addressLocality").and_then(|city| {
        optional_field(&document, &REGION, "addressRegion").map(|region| format!("{city}, {region}"))
    });

    Ok(Site {
        category: or_sentinel(
            optional_field(&document, &HERO_DESIGNATION, "Hero-designation"),
            "",
        ),
        name,
        address: or_sentinel(address, NO_ADDRESS),
        postal_code: or_sentinel(
            optional_field(&document, &POSTAL_CODE, "postalCode"),
            NO_ZIPCODE,
        ),
        phone: or_sentinel(optional_field(&document, &TELEPHONE, "telephone"), NO_PHONE),
    })
}

/// Parse the home page's state menu into a [`StateIndex`].
///
/// Menu items without a link are skipped.
pub fn parse_state_index(html: &str, base: &Url) -> Result<StateIndex> {
    let document = Html::parse_document(html);
    let menu = document.select(&STATE_MENU).next().ok_or_else(|| {
        NpsError::Structure("index page has no ul.dropdown-menu.SearchBar-keywordSearch".into())
    })?;

    let mut index = StateIndex::new();
    for item in menu.select(&MENU_ITEM) {
        let Some(link) = item.select(&ITEM_LINK).next() else {
            warn!("State menu item without a link; skipping");
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let state = element_text(link).to_lowercase();
        index.insert(state, base.join(href)?.to_string());
    }
    Ok(index)
}

/// Parse a state page into site URLs, in page order.
pub fn parse_site_urls(html: &str, base: &Url) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();
    for block in document.select(&SITE_BLOCK) {
        let href = block
            .select(&BLOCK_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| NpsError::Structure("site block has no h3 link".to_string()))?;
        urls.push(format!("{}index.htm", base.join(href)?));
    }
    Ok(urls)
}

/// Fetch the home page and build the state index.
#[instrument(level = "info", skip(gateway, cache, base))]
pub async fn build_state_index<T: Transport>(
    gateway: &FetchGateway<T>,
    cache: &mut PersistentCache,
    base: &Url,
    index_url: &str,
) -> Result<StateIndex> {
    let html = gateway.fetch_text(index_url, cache).await?;
    let index = parse_state_index(&html, base)?;
    info!(states = index.len(), "Built state index");
    Ok(index)
}

/// Fetch and parse one site page.
#[instrument(level = "info", skip(gateway, cache))]
pub async fn fetch_site<T: Transport>(
    gateway: &FetchGateway<T>,
    cache: &mut PersistentCache,
    site_url: &str,
) -> Result<Site> {
    let html = gateway.fetch_text(site_url, cache).await?;
    extract_site(&html)
}

/// Fetch a state page and every site it lists, in page order.
#[instrument(level = "info", skip(gateway, cache, base))]
pub async fn list_sites<T: Transport>(
    gateway: &FetchGateway<T>,
    cache: &mut PersistentCache,
    base: &Url,
    state_url: &str,
) -> Result<Vec<Site>> {
    let html = gateway.fetch_text(state_url, cache).await?;
    let site_urls = parse_site_urls(&html, base)?;
    debug!(urls = ?site_urls, "Site URLs");

    let mut sites = Vec::with_capacity(site_urls.len());
    for url in &site_urls {
        sites.push(fetch_site(gateway, cache, url).await?);
    }
    info!(count = sites.len(), "Listed sites for state");
    Ok(sites)
}
