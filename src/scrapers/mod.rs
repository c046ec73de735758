//! Scrapers for upstream listing sites.
//!
//! Scraping follows a fixed two-level hierarchy:
//!
//! 1. **Index**: the home page's state menu gives a URL per state
//! 2. **State**: each state page lists its sites; every site page is fetched
//!    and parsed into a [`Site`](crate::models::Site)
//!
//! All page fetches go through [`FetchGateway`](crate::fetch::FetchGateway),
//! so repeated visits are served from the cache. The parsing half of each
//! step is a pure function over the page HTML.

pub mod nps;
