//! Data models shared across the pipeline.
//!
//! - [`Site`]: one national park site scraped from its page
//! - [`CachePayload`]: the value stored under a fingerprint in the cache
//! - [`SearchResponse`] and friends: the proximity service's JSON result

use serde::{Deserialize, Serialize};

pub const NO_ADDRESS: &str = "no address";
pub const NO_ZIPCODE: &str = "no zipcode";
pub const NO_PHONE: &str = "no phone";
pub const NO_CATEGORY: &str = "no category";
pub const NO_CITY: &str = "no city";

/// A national park site.
///
/// Every field is always a defined string. Fields the page does not provide
/// hold a sentinel (`"no address"`, `"no zipcode"`, `"no phone"`), except
/// `category`, which is left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Designation such as "National Park"; may be empty.
    pub category: String,
    pub name: String,
    /// "City, ST" or [`NO_ADDRESS`].
    pub address: String,
    /// Five digit or ZIP+4 code, or [`NO_ZIPCODE`].
    pub postal_code: String,
    pub phone: String,
}

impl Site {
    /// One-line summary used in the site listing.
    ///
    /// ```ignore
    /// assert_eq!(site.info(), "Isle Royale (National Park): Houghton, MI 49931");
    /// ```
    pub fn info(&self) -> String {
        format!(
            "{} ({}): {} {}",
            self.name, self.category, self.address, self.postal_code
        )
    }
}

/// A cached response.
///
/// Unparameterized requests store the raw body; parameterized requests store
/// the decoded JSON. On disk both are plain JSON values, so a string decodes
/// as [`CachePayload::Text`] and anything else as [`CachePayload::Structured`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachePayload {
    Text(String),
    Structured(serde_json::Value),
}

impl CachePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CachePayload::Text(_) => "text",
            CachePayload::Structured(_) => "structured",
        }
    }
}

/// Top-level body of a radius search. The service omits `searchResults`
/// when nothing matched.
#[allow(non_snake_case)]
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub searchResults: Vec<SearchResult>,
}

/// One nearby place.
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub fields: SearchFields,
}

/// Descriptive fields of a nearby place. All three must be present; an empty
/// string means the service has no value for it.
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchFields {
    pub group_sic_code_name: String,
    pub address: String,
    pub city: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn isle_royale() -> Site {
        Site {
            category: "National Park".to_string(),
            name: "Isle Royale".to_string(),
            address: "Houghton, MI".to_string(),
            postal_code: "49931".to_string(),
            phone: "(906) 482-0984".to_string(),
        }
    }

    #[test]
    fn test_site_info() {
        assert_eq!(
            isle_royale().info(),
            "Isle Royale (National Park): Houghton, MI 49931"
        );
    }

    #[test]
    fn test_site_info_with_empty_category() {
        let site = Site {
            category: String::new(),
            address: NO_ADDRESS.to_string(),
            postal_code: NO_ZIPCODE.to_string(),
            ..isle_royale()
        };
        assert_eq!(site.info(), "Isle Royale (): no address no zipcode");
    }

    #[test]
    fn test_payload_decodes_by_json_shape() {
        let text: CachePayload = serde_json::from_value(json!("<html></html>")).unwrap();
        assert_eq!(text, CachePayload::Text("<html></html>".to_string()));

        let structured: CachePayload =
            serde_json::from_value(json!({"searchResults": []})).unwrap();
        assert_eq!(structured.kind(), "structured");
    }

    #[test]
    fn test_search_response_requires_address() {
        let body = json!({
            "searchResults": [
                {"name": "Cafe X", "fields": {"group_sic_code_name": "", "city": "Town"}}
            ]
        });
        assert!(serde_json::from_value::<SearchResponse>(body).is_err());
    }
}
