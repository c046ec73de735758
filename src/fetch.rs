//! Cached HTTP fetching.
//!
//! Every outbound request goes through [`FetchGateway`], which looks up the
//! request's fingerprint in a [`PersistentCache`] before touching the network.
//!
//! # Architecture
//!
//! - [`Transport`]: one GET, returning the response body
//! - [`HttpTransport`]: the `reqwest` implementation
//! - [`RetryTransport`]: decorator adding exponential backoff to any transport
//! - [`FetchGateway`]: cache lookup, live fetch on miss, store and persist
//!
//! # Payload Shapes
//!
//! Requests without query parameters cache the raw body as
//! [`CachePayload::Text`]. Requests with parameters decode the body as JSON
//! and cache [`CachePayload::Structured`].

use crate::cache::PersistentCache;
use crate::error::{NpsError, Result};
use crate::models::CachePayload;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Query parameters, kept sorted by key so fingerprints are canonical.
pub type QueryParams = BTreeMap<String, String>;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Cache key for a request.
///
/// Without parameters this is the URL itself. With parameters it is the URL
/// followed by the compact JSON object of the parameters in ascending key
/// order, e.g. `http://host/radius{"origin":"49931","radius":"10"}`.
pub fn fingerprint(url: &str, params: Option<&QueryParams>) -> String {
    match params {
        None => url.to_string(),
        Some(params) => {
            let rendered: serde_json::Map<String, Value> = params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            format!("{url}{}", Value::Object(rendered))
        }
    }
}

/// A single GET request.
pub trait Transport {
    /// Fetch `url`, appending `params` as the query string when present, and
    /// return the response body.
    async fn get(&self, url: &str, params: Option<&QueryParams>) -> Result<String>;
}

/// [`Transport`] over a shared `reqwest` client.
///
/// Non-success status codes are errors. There is no timeout: a request waits
/// until the connection resolves or fails.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .use_rustls_tls()
            .build()
            .map_err(|source| NpsError::Network {
                url: String::from("<client setup>"),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str, params: Option<&QueryParams>) -> Result<String> {
        let t0 = Instant::now();
        let mut request = self.client.get(url);
        if let Some(params) = params {
            request = request.query(params);
        }

        let response = request.send().await.map_err(|source| NpsError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Upstream returned an error status");
            return Err(NpsError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| NpsError::Network {
            url: url.to_string(),
            source,
        })?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(body)
    }
}

/// Wrapper that retries transient failures of any [`Transport`].
///
/// The delay before retry `n` is
/// ```text
/// min(base_delay * 2^(n-1), max_delay) + random_jitter(0..250ms)
/// ```
/// With `max_retries == 0` the inner transport is called exactly once.
pub struct RetryTransport<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str, params: Option<&QueryParams>) -> Result<String> {
        let mut attempt = 0usize;

        loop {
            match self.inner.get(url, params).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !e.is_transient() {
                        return Err(e);
                    }

                    let mut delay = self
                        .base_delay
                        .saturating_mul(1u32 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "GET failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Serves requests from the cache, falling back to the transport on a miss.
///
/// The cache is borrowed mutably for the whole lookup, fetch and store cycle,
/// so two fetches of one fingerprint can never interleave.
#[derive(Debug)]
pub struct FetchGateway<T> {
    transport: T,
}

impl<T: Transport> FetchGateway<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Return the payload for `(url, params)`.
    ///
    /// On a hit the stored payload is returned without a network call. On a
    /// miss the transport is called once, the payload is stored under the
    /// fingerprint and the whole cache is saved before returning.
    #[instrument(level = "info", skip_all, fields(%url, with_params = params.is_some()))]
    pub async fn fetch(
        &self,
        url: &str,
        cache: &mut PersistentCache,
        params: Option<&QueryParams>,
    ) -> Result<CachePayload> {
        let key = fingerprint(url, params);

        if let Some(hit) = cache.get(&key) {
            info!(fingerprint = %truncate_for_log(&key, 120), "Using cache");
            return Ok(hit.clone());
        }

        info!(fingerprint = %truncate_for_log(&key, 120), "Fetching");
        let body = self.transport.get(url, params).await?;
        let payload = match params {
            None => CachePayload::Text(body),
            Some(_) => {
                let value = serde_json::from_str::<Value>(&body).map_err(|source| {
                    NpsError::Decode {
                        url: url.to_string(),
                        source,
                    }
                })?;
                CachePayload::Structured(value)
            }
        };

        cache.insert(key, payload.clone());
        cache.save().await?;
        Ok(payload)
    }

    /// Fetch an unparameterized page as text.
    pub async fn fetch_text(&self, url: &str, cache: &mut PersistentCache) -> Result<String> {
        match self.fetch(url, cache, None).await? {
            CachePayload::Text(body) => Ok(body),
            other => Err(NpsError::PayloadShape {
                fingerprint: fingerprint(url, None),
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    /// Fetch a parameterized API response as decoded JSON.
    pub async fn fetch_structured(
        &self,
        url: &str,
        cache: &mut PersistentCache,
        params: &QueryParams,
    ) -> Result<Value> {
        match self.fetch(url, cache, Some(params)).await? {
            CachePayload::Structured(value) => Ok(value),
            other => Err(NpsError::PayloadShape {
                fingerprint: fingerprint(url, Some(params)),
                expected: "structured",
                found: other.kind(),
            }),
        }
    }
}

/// In-memory [`Transport`] that records every request.
#[cfg(test)]
pub(crate) mod stub {
    use super::{QueryParams, Transport};
    use crate::error::{NpsError, Result};
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct StubTransport {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<(String, Option<QueryParams>)>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<(String, Option<QueryParams>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn get(&self, url: &str, params: Option<&QueryParams>) -> Result<String> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), params.cloned()));
            self.pages.get(url).cloned().ok_or_else(|| NpsError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            })
        }
    }
}
