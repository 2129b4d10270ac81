//! Per-identifier timelines of evaluated values.
//!
//! The history cache is the time axis of the evaluator: each named expression
//! appends one entry per cycle in which it was evaluated, and later cycles
//! read those entries back through `identifier`, `history` and the range and
//! gradient nodes.
//!
//! # Ordering
//!
//! Entries are kept in chronological order and are only ever appended. An
//! append whose cycle does not advance past the newest entry is rejected with
//! [`Error::HistoryOrder`]; nothing is ever rolled back.
//!
//! # Retention
//!
//! When the cache is built with a `max_history` cap, the oldest entry is
//! dropped from the front once a timeline is full.

use cadence_foundation::{Cycle, Identifier, SimTime, Value};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};

/// One recorded evaluation of an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub cycle: Cycle,
    /// Simulation time of the cycle, when the host published one.
    pub time: Option<SimTime>,
    pub value: Value,
}

/// Chronological entries of a single identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<HistoryEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn oldest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    fn push(&mut self, name: &Identifier, entry: HistoryEntry, cap: Option<usize>) -> Result<()> {
        if let Some(last) = self.entries.last()
            && entry.cycle <= last.cycle
        {
            return Err(Error::HistoryOrder {
                name: name.to_string(),
                last: last.cycle,
                cycle: entry.cycle,
            });
        }
        if let Some(cap) = cap
            && self.entries.len() >= cap
        {
            let excess = self.entries.len() + 1 - cap;
            self.entries.drain(..excess);
        }
        self.entries.push(entry);
        Ok(())
    }
}

/// Newest entry of an identifier, as reported by [`HistoryCache::last_values`].
#[derive(Debug, Clone, PartialEq)]
pub struct LastValue {
    pub cycle: Cycle,
    pub time: Option<SimTime>,
    pub value: Value,
}

/// Session-scoped store of every identifier's timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryCache {
    timelines: IndexMap<Identifier, Timeline>,
    max_history: Option<usize>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that keeps at most `cap` entries per identifier.
    pub fn with_max_history(cap: usize) -> Self {
        Self {
            timelines: IndexMap::new(),
            max_history: Some(cap),
        }
    }

    pub fn set_max_history(&mut self, cap: Option<usize>) {
        self.max_history = cap;
    }

    /// Number of identifiers, including ones with no entries.
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.timelines.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Timeline)> {
        self.timelines.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.timelines.contains_key(name)
    }

    /// Registers an identifier without recording anything yet.
    pub fn declare(&mut self, name: impl Into<Identifier>) {
        self.timelines.entry(name.into()).or_default();
    }

    /// Appends the newest entry for `name`.
    pub fn append(
        &mut self,
        name: impl Into<Identifier>,
        cycle: Cycle,
        time: Option<SimTime>,
        value: Value,
    ) -> Result<()> {
        let name = name.into();
        trace!(identifier = %name, cycle, "history append");
        let cap = self.max_history;
        let timeline = self.timelines.entry(name.clone()).or_default();
        timeline.push(&name, HistoryEntry { cycle, time, value }, cap)
    }

    pub fn timeline(&self, name: &str) -> Option<&Timeline> {
        self.timelines.get(name)
    }

    /// Timeline of a declared identifier, possibly still empty.
    pub fn declared(&self, name: &str) -> Result<&Timeline> {
        self.timelines
            .get(name)
            .ok_or_else(|| Error::UnknownIdentifier {
                name: name.to_string(),
                known: self.timelines.keys().map(ToString::to_string).collect(),
            })
    }

    /// Timeline of `name`, failing when it is unknown or still empty.
    pub fn lookup(&self, name: &str) -> Result<&Timeline> {
        let timeline = self.declared(name)?;
        if timeline.is_empty() {
            return Err(Error::EmptyHistory(name.to_string()));
        }
        Ok(timeline)
    }

    /// Most recent entry of `name`.
    pub fn latest(&self, name: &str) -> Result<&HistoryEntry> {
        let timeline = self.lookup(name)?;
        timeline
            .latest()
            .ok_or_else(|| Error::EmptyHistory(name.to_string()))
    }

    /// Newest entry of every non-empty identifier.
    pub fn last_values(&self) -> IndexMap<Identifier, LastValue> {
        self.timelines
            .iter()
            .filter_map(|(name, timeline)| {
                timeline.latest().map(|entry| {
                    (
                        name.clone(),
                        LastValue {
                            cycle: entry.cycle,
                            time: entry.time,
                            value: entry.value.clone(),
                        },
                    )
                })
            })
            .collect()
    }

    pub(crate) fn insert_timeline(&mut self, name: Identifier, timeline: Timeline) {
        self.timelines.insert(name, timeline);
    }
}

impl Timeline {
    pub(crate) fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|entry| entry.cycle);
        entries.dedup_by_key(|entry| entry.cycle);
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(name: &str, values: &[i64]) -> HistoryCache {
        let mut cache = HistoryCache::new();
        for (cycle, v) in values.iter().enumerate() {
            cache
                .append(name, cycle as u64, Some(cycle as f64 * 0.5), Value::Int(*v))
                .expect("append");
        }
        cache
    }

    #[test]
    fn latest_is_newest_append() {
        let cache = cache_with("max_p", &[10, 20, 30]);
        let latest = cache.latest("max_p").expect("latest");
        assert_eq!(latest.value, Value::Int(30));
        assert_eq!(latest.cycle, 2);
        assert_eq!(latest.time, Some(1.0));
    }

    #[test]
    fn unknown_and_empty_identifiers() {
        let mut cache = cache_with("max_p", &[1]);
        match cache.latest("min_p") {
            Err(Error::UnknownIdentifier { name, known }) => {
                assert_eq!(name, "min_p");
                assert_eq!(known, vec!["max_p".to_string()]);
            }
            other => panic!("expected UnknownIdentifier, got {other:?}"),
        }

        cache.declare("min_p");
        assert!(matches!(
            cache.latest("min_p"),
            Err(Error::EmptyHistory(name)) if name == "min_p"
        ));
        assert!(cache.declared("min_p").expect("declared").is_empty());
        assert!(matches!(
            cache.declared("mean_p"),
            Err(Error::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn append_requires_advancing_cycle() {
        let mut cache = cache_with("e", &[1, 2]);
        let err = cache
            .append("e", 1, None, Value::Int(3))
            .expect_err("stale cycle");
        assert!(matches!(err, Error::HistoryOrder { last: 1, cycle: 1, .. }));
        assert_eq!(cache.timeline("e").map(Timeline::len), Some(2));
    }

    #[test]
    fn cap_drops_oldest_entries() {
        let mut cache = HistoryCache::with_max_history(2);
        for cycle in 0..5 {
            cache
                .append("e", cycle, None, Value::Int(cycle as i64))
                .expect("append");
        }
        let timeline = cache.timeline("e").expect("timeline");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.oldest().map(|e| e.cycle), Some(3));
    }

    #[test]
    fn last_values_skips_empty_timelines() {
        let mut cache = cache_with("a", &[5, 6]);
        cache.declare("b");
        let last = cache.last_values();
        assert_eq!(last.len(), 1);
        assert_eq!(last["a"].value, Value::Int(6));
        assert_eq!(last["a"].cycle, 1);
    }
}
