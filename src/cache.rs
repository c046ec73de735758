//! Durable request cache.
//!
//! The store is a single JSON object mapping fingerprints to payloads. It is
//! loaded once at startup and rewritten in full after every insert. Entries
//! never expire.

use crate::error::{NpsError, Result};
use crate::models::CachePayload;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Fingerprint → payload mapping backed by one file on disk.
#[derive(Debug)]
pub struct PersistentCache {
    path: PathBuf,
    entries: BTreeMap<String, CachePayload>,
}

impl PersistentCache {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the store at `path`.
    ///
    /// A missing, unreadable or malformed store yields an empty cache; this
    /// never fails.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache store yet; starting empty");
                return Self::empty(path);
            }
            Err(e) => {
                warn!(error = %e, "Cache store unreadable; starting empty");
                return Self::empty(path);
            }
        };

        match serde_json::from_str::<BTreeMap<String, CachePayload>>(&raw) {
            Ok(entries) => {
                info!(entries = entries.len(), "Loaded cache store");
                Self {
                    path: path.to_path_buf(),
                    entries,
                }
            }
            Err(e) => {
                warn!(error = %e, "Cache store is corrupt; starting empty");
                Self::empty(path)
            }
        }
    }

    /// Serialize every entry and replace the store.
    ///
    /// The mapping is written to a sibling temp file first and renamed over
    /// the store, so a failed write leaves the previous store intact.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), entries = self.entries.len()))]
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.entries).map_err(NpsError::Serialize)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Saved cache store");
        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Option<&CachePayload> {
        self.entries.get(fingerprint)
    }

    /// Store `payload` under `fingerprint`, replacing any previous entry.
    pub fn insert(&mut self, fingerprint: impl Into<String>, payload: CachePayload) {
        self.entries.insert(fingerprint.into(), payload);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
