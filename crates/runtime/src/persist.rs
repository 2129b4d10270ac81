//! Saving and loading the history cache.
//!
//! A saved cache is pretty-printed JSON mapping each identifier to its
//! entries in chronological order:
//!
//! ```json
//! {
//!   "max_pressure": [
//!     {"cycle": 100, "time": 0.5, "value": {"type": "double", "value": 3.25}}
//!   ]
//! }
//! ```
//!
//! Loading a file pre-populates a new session so that history-based
//! expressions continue seamlessly from a previous run.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use cadence_foundation::{Cycle, Identifier, SimTime, WireValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::history::{HistoryCache, HistoryEntry, Timeline};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PersistedEntry {
    cycle: Cycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<SimTime>,
    value: WireValue,
}

/// Serializable image of a [`HistoryCache`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheSnapshot {
    timelines: IndexMap<String, Vec<PersistedEntry>>,
}

impl CacheSnapshot {
    /// Captures `cache`, keeping only `selection` unless it is empty.
    pub fn capture(cache: &HistoryCache, selection: &[String]) -> Self {
        let timelines = cache
            .iter()
            .filter(|(name, _)| selection.is_empty() || selection.iter().any(|s| s == name.as_str()))
            .map(|(name, timeline)| {
                let entries = timeline
                    .entries()
                    .iter()
                    .map(|entry| PersistedEntry {
                        cycle: entry.cycle,
                        time: entry.time,
                        value: WireValue::from(&entry.value).with_name(name.as_str()),
                    })
                    .collect();
                (name.to_string(), entries)
            })
            .collect();
        Self { timelines }
    }

    /// Number of identifiers in the snapshot.
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Rebuilds a cache, decoding every stored value.
    pub fn restore(&self, max_history: Option<usize>) -> Result<HistoryCache> {
        let mut cache = HistoryCache::new();
        cache.set_max_history(max_history);
        for (name, entries) in &self.timelines {
            let mut decoded = Vec::with_capacity(entries.len());
            for entry in entries {
                decoded.push(HistoryEntry {
                    cycle: entry.cycle,
                    time: entry.time,
                    value: entry.value.to_value()?,
                });
            }
            if let Some(cap) = max_history
                && decoded.len() > cap
            {
                decoded.drain(..decoded.len() - cap);
            }
            cache.insert_timeline(Identifier::from(name.as_str()), Timeline::from_entries(decoded));
        }
        Ok(cache)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_from(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Writes the selected part of `cache` to `path`.
pub fn save_cache(cache: &HistoryCache, selection: &[String], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let snapshot = CacheSnapshot::capture(cache, selection);
    let mut writer = BufWriter::new(File::create(path)?);
    snapshot.write_to(&mut writer)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        identifiers = snapshot.len(),
        "history cache saved"
    );
    Ok(())
}

/// Reads a cache previously written by [`save_cache`].
pub fn load_cache(path: &Path, max_history: Option<usize>) -> Result<HistoryCache> {
    let snapshot = CacheSnapshot::read_from(BufReader::new(File::open(path)?))?;
    debug!(
        path = %path.display(),
        identifiers = snapshot.len(),
        "history cache file read"
    );
    let cache = snapshot.restore(max_history)?;
    info!(path = %path.display(), "history cache loaded");
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_foundation::Value;

    fn sample_cache() -> HistoryCache {
        let mut cache = HistoryCache::new();
        for cycle in 0..3u64 {
            cache
                .append("max_p", cycle, Some(cycle as f64), Value::Double(cycle as f64 * 1.5))
                .expect("append");
            cache
                .append("grad", cycle, None, Value::Double(f64::NEG_INFINITY))
                .expect("append");
        }
        cache
    }

    #[test]
    fn snapshot_round_trip() {
        let cache = sample_cache();
        let text = CacheSnapshot::capture(&cache, &[])
            .to_json()
            .expect("serialize");
        let restored = CacheSnapshot::from_json(&text)
            .expect("parse")
            .restore(None)
            .expect("restore");
        assert_eq!(restored, cache);
    }

    #[test]
    fn selection_limits_identifiers() {
        let cache = sample_cache();
        let snapshot = CacheSnapshot::capture(&cache, &["grad".to_string()]);
        assert_eq!(snapshot.len(), 1);
        let restored = snapshot.restore(None).expect("restore");
        assert!(restored.contains("grad"));
        assert!(!restored.contains("max_p"));
    }

    #[test]
    fn restore_applies_cap() {
        let restored = CacheSnapshot::capture(&sample_cache(), &[])
            .restore(Some(2))
            .expect("restore");
        let timeline = restored.timeline("max_p").expect("timeline");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.oldest().map(|e| e.cycle), Some(1));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.json");
        let cache = sample_cache();
        save_cache(&cache, &[], &path).expect("save");
        let loaded = load_cache(&path, None).expect("load");
        assert_eq!(loaded.last_values(), cache.last_values());
    }
}
