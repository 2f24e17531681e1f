use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::utils::error::Result;

/// Remembers when each item was last found available so the same item is
/// not re-checked (and re-notified) inside the suppression window.
///
/// Timestamps are kept at millisecond precision, the precision of the file
/// format, so a saved cache reloads to an equal value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundCache {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl FoundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache file. A missing file yields an empty cache; entries
    /// whose timestamp cannot be parsed are dropped, which makes those items
    /// eligible again.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("{} does not exist; starting with an empty cache", path.display());
            return Ok(Self::new());
        }

        tracing::info!("{} exists; loading", path.display());
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let stored: BTreeMap<String, String> = serde_json::from_str(raw)?;
        let mut cache = Self::new();

        for (name, timestamp) in stored {
            match DateTime::parse_from_rfc3339(&timestamp) {
                Ok(at) => cache.record(&name, at.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!("Dropping cache entry '{}' with bad timestamp '{}': {}", name, timestamp, e);
                }
            }
        }

        Ok(cache)
    }

    /// Serializes as a `name -> ISO-8601` object with four-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let stored: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(name, at)| (name.as_str(), at.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .collect();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        stored.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Writes through a sibling temp file so a crash mid-write never leaves a
    /// truncated cache behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_json()?;
        let tmp_path = path.with_extension("tmp");

        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, path)?;
        tracing::debug!("Saved {} cache entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn record(&mut self, name: &str, at: DateTime<Utc>) {
        self.entries.insert(name.to_string(), at.trunc_subsecs(3));
    }

    pub fn last_found(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries.get(name).copied()
    }

    /// True when the item was found less than `window` before `now`.
    /// An entry exactly `window` old is no longer suppressed.
    pub fn is_suppressed(&self, name: &str, now: DateTime<Utc>, window: Duration) -> bool {
        match self.entries.get(name) {
            Some(found_at) => now.signed_duration_since(*found_at) < window,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
