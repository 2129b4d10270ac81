//! Temporal window resolution over a [`Timeline`].
//!
//! Turns user addressing (by history index, simulation time or simulation
//! cycle) into concrete entry ranges, and computes gradients over them.
//!
//! # Addressing
//!
//! | Selector | Start | End |
//! |----------|-------|-----|
//! | absolute index | `first` | `min(last, n-1)` |
//! | relative index | `max(n-last-1, 0)` | `n-first-1` |
//! | absolute time | first entry with `time >= first` | last entry with `time <= last` |
//! | absolute cycle | first entry with `cycle >= first` | last entry with `cycle <= last` |
//!
//! A window that lies entirely outside the recorded history resolves to
//! `None`, which the nodes surface as the empty value. This includes a time
//! window starting after every recorded time.

use std::ops::RangeInclusive;

use cadence_foundation::{DType, NumericArray, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::history::{HistoryEntry, Timeline};

/// Single-entry addressing used by `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryIndex {
    /// Counted from the oldest entry.
    Absolute(i64),
    /// Counted back from the newest entry.
    Relative(i64),
}

/// Picks one entry out of a non-empty timeline.
pub fn select_entry<'a>(
    node: &str,
    timeline: &'a Timeline,
    index: HistoryIndex,
) -> Result<&'a HistoryEntry> {
    let n = timeline.len();
    let position = match index {
        HistoryIndex::Absolute(i) => {
            if i < 0 || i as usize >= n {
                return Err(Error::IndexOutOfRange {
                    node: node.to_string(),
                    index: i,
                    len: n,
                });
            }
            i as usize
        }
        HistoryIndex::Relative(i) => {
            if i < 0 {
                return Err(Error::invalid_argument(
                    node,
                    format!("relative_index must be non-negative, got {i}"),
                ));
            }
            // Reaching past the oldest entry clamps to it.
            n.saturating_sub(1).saturating_sub(i as usize)
        }
    };
    timeline.get(position).ok_or_else(|| Error::IndexOutOfRange {
        node: node.to_string(),
        index: position as i64,
        len: n,
    })
}

/// Units in which window lengths and deltas are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaUnit {
    Index,
    Time,
    Cycle,
}

impl DeltaUnit {
    pub fn parse(node: &str, s: &str) -> Result<Self> {
        match s {
            "index" => Ok(DeltaUnit::Index),
            "time" => Ok(DeltaUnit::Time),
            "cycle" => Ok(DeltaUnit::Cycle),
            other => Err(Error::validation(
                node,
                format!("unknown unit '{other}'; expected one of index, time, cycle"),
            )),
        }
    }
}

/// One of the four `history_range` addressing families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSelector {
    AbsoluteIndex { first: i64, last: i64 },
    RelativeIndex { first: i64, last: i64 },
    AbsoluteTime { first: f64, last: f64 },
    AbsoluteCycle { first: i64, last: i64 },
}

impl RangeSelector {
    /// Checks ordering and sign constraints that do not depend on history.
    pub fn validate(&self, node: &str) -> Result<()> {
        let (first, last, family) = match *self {
            RangeSelector::AbsoluteIndex { first, last } => (first as f64, last as f64, "absolute index"),
            RangeSelector::RelativeIndex { first, last } => (first as f64, last as f64, "relative index"),
            RangeSelector::AbsoluteCycle { first, last } => (first as f64, last as f64, "absolute cycle"),
            RangeSelector::AbsoluteTime { first, last } => (first.max(0.0), last.max(0.0), "absolute time"),
        };
        if !matches!(self, RangeSelector::AbsoluteTime { .. }) && (first < 0.0 || last < 0.0) {
            return Err(Error::invalid_argument(
                node,
                format!("{family} bounds must be non-negative, got ({first}, {last})"),
            ));
        }
        if !(first <= last) {
            return Err(Error::invalid_argument(
                node,
                format!("first {family} ({first}) must not exceed last ({last})"),
            ));
        }
        Ok(())
    }

    /// Inclusive entry range, or `None` when the window misses the history.
    pub fn resolve(&self, node: &str, timeline: &Timeline) -> Result<Option<RangeInclusive<usize>>> {
        self.validate(node)?;
        let entries = timeline.entries();
        let n = entries.len() as i64;
        if n == 0 {
            return Ok(None);
        }
        let range = match *self {
            RangeSelector::AbsoluteIndex { first, last } => {
                if first >= n {
                    None
                } else {
                    Some(first as usize..=last.min(n - 1) as usize)
                }
            }
            RangeSelector::RelativeIndex { first, last } => {
                let end = n - first - 1;
                if end < 0 {
                    None
                } else {
                    let start = (n - last - 1).max(0);
                    Some(start as usize..=end as usize)
                }
            }
            RangeSelector::AbsoluteTime { first, last } => {
                let (first, last) = (first.max(0.0), last.max(0.0));
                let mut times = Vec::with_capacity(entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    times.push(entry.time.ok_or_else(|| {
                        Error::invalid_argument(
                            node,
                            format!("history entry {i} (cycle {}) has no simulation time", entry.cycle),
                        )
                    })?);
                }
                match times.iter().position(|t| *t >= first) {
                    None => None,
                    Some(start) => {
                        let end = times
                            .iter()
                            .rposition(|t| *t <= last)
                            .map_or(start, |end| end.max(start));
                        Some(start..=end)
                    }
                }
            }
            RangeSelector::AbsoluteCycle { first, last } => {
                let start = entries.iter().position(|e| e.cycle as i64 >= first);
                match start {
                    Some(start) if entries[start].cycle as i64 <= last => {
                        let end = entries
                            .iter()
                            .position(|e| e.cycle as i64 > last)
                            .map_or(entries.len() - 1, |past| past - 1);
                        Some(start..=end)
                    }
                    _ => None,
                }
            }
        };
        if range.is_none() {
            warn!(node, selector = ?self, entries = n, "history window lies outside recorded history");
        }
        Ok(range)
    }

    /// Unit in which deltas of this family are naturally reported.
    pub fn natural_unit(&self) -> DeltaUnit {
        match self {
            RangeSelector::AbsoluteIndex { .. } | RangeSelector::RelativeIndex { .. } => {
                DeltaUnit::Index
            }
            RangeSelector::AbsoluteTime { .. } => DeltaUnit::Time,
            RangeSelector::AbsoluteCycle { .. } => DeltaUnit::Cycle,
        }
    }
}

/// Values of a resolved window.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    pub values: NumericArray,
    /// Differences between successive entries, one fewer than `values`.
    pub deltas: Option<Vec<f64>>,
}

/// Extracts the numeric payload of `entries`.
///
/// The element type follows the first entry: an `int` history yields an
/// int64 array, anything else float64.
pub fn window_values(node: &str, entries: &[HistoryEntry]) -> Result<NumericArray> {
    let dtype = match entries.first().map(|e| &e.value) {
        Some(Value::Int(_)) => DType::Int64,
        _ => DType::Float64,
    };
    let data = entries
        .iter()
        .map(|entry| {
            entry.value.scalar_payload().ok_or_else(|| Error::TypeMismatch {
                node: node.to_string(),
                port: "expr_name".to_string(),
                expected: "history of numeric values".to_string(),
                found: entry.value.kind().to_string(),
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(NumericArray { dtype, data })
}

/// Successive differences of `entries` in `unit`.
pub fn window_deltas(node: &str, entries: &[HistoryEntry], unit: DeltaUnit) -> Result<Vec<f64>> {
    entries
        .windows(2)
        .map(|pair| match unit {
            DeltaUnit::Index => Ok(1.0),
            DeltaUnit::Cycle => Ok(pair[1].cycle as f64 - pair[0].cycle as f64),
            DeltaUnit::Time => match (pair[0].time, pair[1].time) {
                (Some(t0), Some(t1)) => Ok(t1 - t0),
                _ => Err(Error::invalid_argument(
                    node,
                    "time deltas requested but history entries have no simulation time",
                )),
            },
        })
        .collect()
}

/// Resolves `selector` and gathers the window's values, plus deltas in
/// `delta_unit` when requested.
pub fn history_range(
    node: &str,
    timeline: &Timeline,
    selector: &RangeSelector,
    delta_unit: Option<DeltaUnit>,
) -> Result<Option<HistoryWindow>> {
    let Some(range) = selector.resolve(node, timeline)? else {
        return Ok(None);
    };
    let entries = &timeline.entries()[range];
    let values = window_values(node, entries)?;
    let deltas = delta_unit
        .map(|unit| window_deltas(node, entries, unit))
        .transpose()?;
    Ok(Some(HistoryWindow { values, deltas }))
}

/// Trailing-window gradient `(current - first) / window`.
///
/// Returns `-inf` while fewer than two entries exist, or when the realized
/// window collapses to zero width.
pub fn history_gradient(
    node: &str,
    timeline: &Timeline,
    window_length: f64,
    unit: DeltaUnit,
) -> Result<f64> {
    if !(window_length >= 0.0) {
        return Err(Error::invalid_argument(
            node,
            format!("window_length must be non-negative, got {window_length}"),
        ));
    }
    if matches!(unit, DeltaUnit::Index | DeltaUnit::Cycle) && window_length < 1.0 {
        return Err(Error::invalid_argument(
            node,
            format!("window_length must be at least 1 when measured in index or cycle units, got {window_length}"),
        ));
    }

    let entries = timeline.entries();
    if entries.len() < 2 {
        warn!(node, entries = entries.len(), "not enough history for a gradient");
        return Ok(f64::NEG_INFINITY);
    }
    let current_index = entries.len() - 1;
    let current = &entries[current_index];

    let (first_index, realized) = match unit {
        // A fractional index window starts at its whole part but still
        // divides by the requested length.
        DeltaUnit::Index => {
            let window = window_length.floor() as usize;
            if window > current_index {
                (0, current_index as f64)
            } else {
                (current_index - window, window_length)
            }
        }
        DeltaUnit::Time => {
            let current_time = current.time.ok_or_else(|| {
                Error::invalid_argument(node, "time gradient requested but history has no simulation time")
            })?;
            let first_time = current_time - window_length;
            let first_index = entries
                .iter()
                .position(|e| e.time.is_some_and(|t| t >= first_time))
                .unwrap_or(current_index);
            let realized = entries[first_index]
                .time
                .map_or(0.0, |t| current_time - t);
            (first_index, realized)
        }
        DeltaUnit::Cycle => {
            let first_cycle = current.cycle as f64 - window_length;
            let first_index = entries
                .iter()
                .position(|e| e.cycle as f64 >= first_cycle)
                .unwrap_or(current_index);
            (first_index, (current.cycle - entries[first_index].cycle) as f64)
        }
    };

    if realized <= 0.0 {
        warn!(node, "gradient window contains a single sample");
        return Ok(f64::NEG_INFINITY);
    }

    let scalar = |entry: &HistoryEntry| {
        entry.value.scalar_payload().ok_or_else(|| Error::TypeMismatch {
            node: node.to_string(),
            port: "expr_name".to_string(),
            expected: "history of numeric values".to_string(),
            found: entry.value.kind().to_string(),
        })
    };
    Ok((scalar(current)? - scalar(&entries[first_index])?) / realized)
}

/// Pointwise gradient across a resolved window using time deltas.
///
/// With fewer than two samples in range the result is `[-inf]`.
pub fn range_gradient(node: &str, timeline: &Timeline, selector: &RangeSelector) -> Result<Vec<f64>> {
    let window = history_range(node, timeline, selector, Some(DeltaUnit::Time))?;
    let Some(HistoryWindow {
        values,
        deltas: Some(deltas),
    }) = window
    else {
        return Ok(vec![f64::NEG_INFINITY]);
    };
    if values.len() < 2 {
        return Ok(vec![f64::NEG_INFINITY]);
    }
    Ok(values
        .values()
        .windows(2)
        .zip(deltas)
        .map(|(pair, dt)| (pair[1] - pair[0]) / dt)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryCache;

    /// Entries `values` at cycles `cycles`, time = cycle / 10.
    fn timeline(values: &[f64], cycles: &[u64]) -> Timeline {
        let mut cache = HistoryCache::new();
        for (v, c) in values.iter().zip(cycles) {
            cache
                .append("e", *c, Some(*c as f64 / 10.0), Value::Double(*v))
                .expect("append");
        }
        cache.timeline("e").cloned().expect("timeline")
    }

    fn resolve(selector: RangeSelector, t: &Timeline) -> Option<RangeInclusive<usize>> {
        selector.resolve("history_range", t).expect("resolve")
    }

    #[test]
    fn relative_index_clamps_to_oldest() {
        let t = timeline(&[10.0, 20.0, 30.0], &[0, 1, 2]);
        let newest = select_entry("history", &t, HistoryIndex::Relative(0)).expect("newest");
        assert_eq!(newest.value, Value::Double(30.0));
        let oldest = select_entry("history", &t, HistoryIndex::Relative(7)).expect("oldest");
        assert_eq!(oldest.value, Value::Double(10.0));
        assert!(matches!(
            select_entry("history", &t, HistoryIndex::Relative(-1)),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn absolute_index_out_of_range() {
        let t = timeline(&[10.0, 20.0], &[0, 1]);
        assert!(matches!(
            select_entry("history", &t, HistoryIndex::Absolute(2)),
            Err(Error::IndexOutOfRange { index: 2, len: 2, .. })
        ));
        let e = select_entry("history", &t, HistoryIndex::Absolute(1)).expect("entry");
        assert_eq!(e.cycle, 1);
    }

    #[test]
    fn index_ranges() {
        let t = timeline(&[1.0, 2.0, 3.0, 4.0], &[0, 1, 2, 3]);
        assert_eq!(resolve(RangeSelector::AbsoluteIndex { first: 1, last: 2 }, &t), Some(1..=2));
        assert_eq!(resolve(RangeSelector::AbsoluteIndex { first: 2, last: 9 }, &t), Some(2..=3));
        assert_eq!(resolve(RangeSelector::AbsoluteIndex { first: 100, last: 200 }, &t), None);
        assert_eq!(resolve(RangeSelector::RelativeIndex { first: 0, last: 1 }, &t), Some(2..=3));
        assert_eq!(resolve(RangeSelector::RelativeIndex { first: 1, last: 10 }, &t), Some(0..=2));
        assert_eq!(resolve(RangeSelector::RelativeIndex { first: 4, last: 10 }, &t), None);
    }

    #[test]
    fn integer_ranges_reject_bad_bounds() {
        let t = timeline(&[1.0], &[0]);
        for selector in [
            RangeSelector::AbsoluteIndex { first: 2, last: 1 },
            RangeSelector::RelativeIndex { first: -1, last: 1 },
            RangeSelector::AbsoluteCycle { first: -3, last: 2 },
            RangeSelector::AbsoluteCycle { first: 0, last: -1 },
        ] {
            assert!(matches!(
                selector.resolve("history_range", &t),
                Err(Error::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn time_ranges() {
        // times 0.0, 0.2, 0.4, 0.6
        let t = timeline(&[1.0, 2.0, 3.0, 4.0], &[0, 2, 4, 6]);
        assert_eq!(resolve(RangeSelector::AbsoluteTime { first: 0.1, last: 0.45 }, &t), Some(1..=2));
        // End precedes start: clamped up to the start.
        assert_eq!(resolve(RangeSelector::AbsoluteTime { first: 0.3, last: 0.35 }, &t), Some(2..=2));
        // Negative bounds clamp to zero.
        assert_eq!(resolve(RangeSelector::AbsoluteTime { first: -5.0, last: 0.0 }, &t), Some(0..=0));
        // Starting after every recorded time.
        assert_eq!(resolve(RangeSelector::AbsoluteTime { first: 9.0, last: 10.0 }, &t), None);
    }

    #[test]
    fn cycle_ranges() {
        let t = timeline(&[1.0, 2.0, 3.0, 4.0], &[10, 20, 30, 40]);
        assert_eq!(resolve(RangeSelector::AbsoluteCycle { first: 15, last: 30 }, &t), Some(1..=2));
        assert_eq!(resolve(RangeSelector::AbsoluteCycle { first: 0, last: 100 }, &t), Some(0..=3));
        assert_eq!(resolve(RangeSelector::AbsoluteCycle { first: 21, last: 29 }, &t), None);
        assert_eq!(resolve(RangeSelector::AbsoluteCycle { first: 50, last: 60 }, &t), None);
    }

    #[test]
    fn range_values_and_deltas() {
        let t = timeline(&[1.0, 2.0, 4.0], &[0, 2, 3]);
        let window = history_range(
            "history_range",
            &t,
            &RangeSelector::AbsoluteIndex { first: 0, last: 2 },
            Some(DeltaUnit::Cycle),
        )
        .expect("range")
        .expect("non-empty");
        assert_eq!(window.values.values(), &[1.0, 2.0, 4.0]);
        assert_eq!(window.deltas, Some(vec![2.0, 1.0]));
    }

    #[test]
    fn gradient_index_window() {
        let t = timeline(&[10.0, 20.0, 30.0], &[0, 1, 2]);
        assert_eq!(history_gradient("g", &t, 1.0, DeltaUnit::Index).expect("gradient"), 10.0);
        // Window wider than history clamps to the oldest entry.
        assert_eq!(history_gradient("g", &t, 5.0, DeltaUnit::Index).expect("gradient"), 10.0);
        // Starts one entry back, divides by the requested length.
        assert_eq!(history_gradient("g", &t, 1.25, DeltaUnit::Index).expect("gradient"), 8.0);
    }

    #[test]
    fn gradient_time_and_cycle_windows() {
        // times 0.0, 0.5, 1.0
        let t = timeline(&[0.0, 5.0, 20.0], &[0, 5, 10]);
        // First sample with time >= 1.0 - 0.6 is at 0.5: (20 - 5) / 0.5
        assert_eq!(history_gradient("g", &t, 0.6, DeltaUnit::Time).expect("gradient"), 30.0);
        // First sample with cycle >= 10 - 7 is cycle 5: (20 - 5) / 5
        assert_eq!(history_gradient("g", &t, 7.0, DeltaUnit::Cycle).expect("gradient"), 3.0);
    }

    #[test]
    fn gradient_sentinel_and_errors() {
        let short = timeline(&[1.0], &[0]);
        assert_eq!(
            history_gradient("g", &short, 1.0, DeltaUnit::Index).expect("gradient"),
            f64::NEG_INFINITY
        );
        let t = timeline(&[1.0, 2.0], &[0, 1]);
        assert!(history_gradient("g", &t, -1.0, DeltaUnit::Time).is_err());
        assert!(history_gradient("g", &t, 0.5, DeltaUnit::Index).is_err());
    }

    #[test]
    fn range_gradient_uses_time_deltas() {
        // times 0.0, 0.2, 0.4
        let t = timeline(&[0.0, 1.0, 3.0], &[0, 2, 4]);
        let g = range_gradient("g", &t, &RangeSelector::AbsoluteIndex { first: 0, last: 2 })
            .expect("gradient");
        assert_eq!(g.len(), 2);
        assert!((g[0] - 5.0).abs() < 1e-9);
        assert!((g[1] - 10.0).abs() < 1e-9);

        let single = range_gradient("g", &t, &RangeSelector::AbsoluteIndex { first: 2, last: 2 })
            .expect("gradient");
        assert_eq!(single, vec![f64::NEG_INFINITY]);
    }
}
