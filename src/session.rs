//! Interactive prompt loop.
//!
//! The user picks a state, gets a numbered list of its sites, then picks a
//! number to see places nearby. `back` returns to the state prompt and `exit`
//! (or end of input) ends the session. Bad input re-prompts; fetch and layout
//! errors end the session.

use crate::cache::PersistentCache;
use crate::error::Result;
use crate::fetch::{FetchGateway, Transport};
use crate::models::Site;
use crate::proximity::{ProximityConfig, format_nearby_places, nearby_places};
use crate::scrapers::nps::{build_state_index, list_sites};
use crate::utils::rule_for;
use std::io::{BufRead, Write};
use tracing::{debug, info};
use url::Url;

const STATE_PROMPT: &str = r#"Enter a state name(e.g. Michigan, michigan) or "exit": "#;
const DETAIL_PROMPT: &str = r#"Choose the number for detail search or "exit" or "back": "#;

/// Sites of one state, keyed `"1"..="N"` in listing order.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    entries: Vec<(String, Site)>,
}

impl SiteRegistry {
    pub fn from_sites(sites: Vec<Site>) -> Self {
        let entries = sites
            .into_iter()
            .enumerate()
            .map(|(i, site)| ((i + 1).to_string(), site))
            .collect();
        Self { entries }
    }

    /// Look up a site by its exact key; `"01"` does not match `"1"`.
    pub fn get(&self, key: &str) -> Option<&Site> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, site)| site)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Site)> {
        self.entries.iter().map(|(k, site)| (k.as_str(), site))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Next {
    Back,
    Exit,
}

/// Endpoints the session talks to.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Url,
    pub index_url: String,
    pub proximity: ProximityConfig,
}

/// One interactive run over a shared gateway and cache.
pub struct Session<T> {
    gateway: FetchGateway<T>,
    cache: PersistentCache,
    config: SessionConfig,
}

impl<T: Transport> Session<T> {
    pub fn new(gateway: FetchGateway<T>, cache: PersistentCache, config: SessionConfig) -> Self {
        Self {
            gateway,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &FetchGateway<T> {
        &self.gateway
    }

    /// Run until the user exits or input ends.
    pub async fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        loop {
            let Some(registry) = self.choose_state(&mut input, &mut output).await? else {
                return Ok(());
            };
            match self.browse(&registry, &mut input, &mut output).await? {
                Next::Back => continue,
                Next::Exit => return Ok(()),
            }
        }
    }

    /// Prompt until a known state is entered and list its sites. `None` means
    /// the user asked to exit.
    async fn choose_state<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<SiteRegistry>> {
        loop {
            let Some(answer) = prompt(input, output, STATE_PROMPT)? else {
                return Ok(None);
            };
            let state = answer.to_lowercase();
            if state == "exit" {
                return Ok(None);
            }

            let index = build_state_index(
                &self.gateway,
                &mut self.cache,
                &self.config.base_url,
                &self.config.index_url,
            )
            .await?;

            let Some(state_url) = index.get(&state) else {
                debug!(%state, "Unknown state");
                writeln!(output, "[Error] Enter proper state name")?;
                continue;
            };

            let sites = list_sites(
                &self.gateway,
                &mut self.cache,
                &self.config.base_url,
                state_url,
            )
            .await?;
            let registry = SiteRegistry::from_sites(sites);
            if registry.is_empty() {
                debug!(%state, "State page lists no sites");
            }
            info!(%state, sites = registry.len(), "Listing sites");

            write_header(output, &format!("List of national sites in {state}"))?;
            for (key, site) in registry.iter() {
                writeln!(output, "[{key}] {}", site.info())?;
            }
            return Ok(Some(registry));
        }
    }

    async fn browse<R: BufRead, W: Write>(
        &mut self,
        registry: &SiteRegistry,
        input: &mut R,
        output: &mut W,
    ) -> Result<Next> {
        loop {
            let Some(answer) = prompt(input, output, DETAIL_PROMPT)? else {
                return Ok(Next::Exit);
            };
            let choice = answer.to_lowercase();
            if choice == "back" {
                return Ok(Next::Back);
            }
            if choice == "exit" {
                return Ok(Next::Exit);
            }

            let Some(site) = registry.get(&choice) else {
                writeln!(output, "Invalid input")?;
                continue;
            };

            let result =
                nearby_places(&self.gateway, &mut self.cache, &self.config.proximity, site).await?;
            write_header(output, &format!("Places near {}", site.name))?;
            for line in format_nearby_places(&result)? {
                writeln!(output, "{line}")?;
            }
        }
    }
}

/// Print `text`, then read one trimmed line. `None` at end of input.
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, text: &str) -> Result<Option<String>> {
    write!(output, "{text}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn write_header<W: Write>(output: &mut W, title: &str) -> Result<()> {
    let rule = rule_for(title);
    writeln!(output, "{rule}")?;
    writeln!(output, "{title}")?;
    writeln!(output, "{rule}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubTransport;
    use crate::scrapers::nps::fixtures::*;
    use std::io::Cursor;
    use tempfile::{TempDir, tempdir};

    const RADIUS_URL: &str = "http://radius.example.test/search";

    fn site_named(name: &str) -> Site {
        Site {
            category: String::new(),
            name: name.to_string(),
            address: "Town, ST".to_string(),
            postal_code: "00000".to_string(),
            phone: "555".to_string(),
        }
    }

    fn michigan_session() -> (Session<StubTransport>, TempDir) {
        let dir = tempdir().unwrap();
        let transport = StubTransport::new()
            .with_page(INDEX_URL, INDEX)
            .with_page("https://example.test/state/mi/index.htm", MICHIGAN)
            .with_page("https://example.test/isro/index.htm", ISLE_ROYALE)
            .with_page("https://example.test/mowa/index.htm", MOTOR_CITIES)
            .with_page(
                RADIUS_URL,
                r#"{"searchResults":[{"name":"Cafe X","fields":{"group_sic_code_name":"","address":"1 Main St","city":"Town"}}]}"#,
            );
        let config = SessionConfig {
            base_url: Url::parse(BASE).unwrap(),
            index_url: INDEX_URL.to_string(),
            proximity: ProximityConfig {
                endpoint: RADIUS_URL.to_string(),
                api_key: "secret".to_string(),
            },
        };
        let cache = PersistentCache::empty(dir.path().join("cache.json"));
        (Session::new(FetchGateway::new(transport), cache, config), dir)
    }

    async fn transcript(session: &mut Session<StubTransport>, input: &str) -> String {
        let mut output = Vec::new();
        session
            .run(Cursor::new(input.to_string()), &mut output)
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_registry_keys_follow_order() {
        let registry = SiteRegistry::from_sites(vec![site_named("First"), site_named("Second")]);
        let keys: Vec<&str> = registry.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert_eq!(registry.get("1").unwrap().name, "First");
        assert_eq!(registry.get("2").unwrap().name, "Second");
        assert!(registry.get("3").is_none());
        assert!(registry.get("01").is_none());
    }

    #[tokio::test]
    async fn test_lists_sites_for_state() {
        let (mut session, _dir) = michigan_session();
        let out = transcript(&mut session, "Michigan\nexit\n").await;

        assert!(out.contains("List of national sites in michigan\n"));
        assert!(out.contains("[1] Isle Royale (National Park): Houghton, MI 49931-1896\n"));
        assert!(out.contains("[2] Motor Cities (): no address 48243\n"));
    }

    #[tokio::test]
    async fn test_unknown_state_reprompts() {
        let (mut session, _dir) = michigan_session();
        let out = transcript(&mut session, "Atlantis\nexit\n").await;

        assert!(out.contains("[Error] Enter proper state name\n"));
        assert_eq!(out.matches(STATE_PROMPT).count(), 2);
    }

    #[tokio::test]
    async fn test_detail_search_prints_nearby_places() {
        let (mut session, _dir) = michigan_session();
        let out = transcript(&mut session, "michigan\n1\nexit\n").await;

        assert!(out.contains("-----------------------\nPlaces near Isle Royale\n-----------------------\n"));
        assert!(out.contains("- Cafe X (no category): 1 Main St, Town\n"));
    }

    #[tokio::test]
    async fn test_invalid_choice_and_back() {
        let (mut session, _dir) = michigan_session();
        let out = transcript(&mut session, "michigan\n7\nback\nMICHIGAN\nexit\n").await;

        assert!(out.contains("Invalid input\n"));
        assert_eq!(out.matches("List of national sites in michigan").count(), 2);
        // The index page, state page and two site pages are fetched once.
        assert_eq!(session.gateway().transport().calls(), 4);
        assert_eq!(session.cache().len(), 4);
    }

    #[tokio::test]
    async fn test_end_of_input_ends_session() {
        let (mut session, _dir) = michigan_session();
        let out = transcript(&mut session, "michigan\n").await;
        assert!(out.ends_with(DETAIL_PROMPT));
    }
}
