//! Deterministic reductions over sample sequences.
//!
//! Used by the array reduction nodes, by the in-memory mesh for field
//! statistics, and by the binning engine to aggregate the samples that fall
//! into each bin.
//!
//! # Fixed-Structure Tree Reduction
//!
//! Sums are computed over a fixed binary tree whose pairing is determined by
//! index, so the result is bitwise identical for identical inputs:
//!
//! ```text
//! Samples: [s0, s1, s2, s3, s4]
//!
//! Level 0: s0+s1  s2+s3  s4
//! Level 1: (s0+s1)+(s2+s3)  s4
//! Level 2: ((s0+s1)+(s2+s3))+s4
//! ```
//!
//! # Available Operations
//!
//! | Function | Notes |
//! |----------|-------|
//! | [`sum`] | Fixed-tree reduction |
//! | [`mean`] | `sum / count` |
//! | [`min_indexed`], [`max_indexed`] | Lowest index wins ties |
//! | [`variance`], [`std_dev`] | Population statistics |
//! | [`rms`] | Root mean square |
//! | [`reduce_bin`] | Dispatch on a [`BinReduction`] |

use std::cmp::Ordering;

use cadence_foundation::BinReduction;

/// Result of a min/max reduction that tracks the winning index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedValue<T> {
    pub index: usize,
    pub value: T,
}

impl<T> IndexedValue<T> {
    pub fn new(index: usize, value: T) -> Self {
        Self { index, value }
    }
}

/// Deterministic tree reduction with a binary operation.
///
/// Returns `None` for an empty slice.
///
/// ```
/// use cadence_runtime::reductions::tree_reduce;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(tree_reduce(&values, |a, b| a + b), Some(15.0));
/// ```
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let (&first, rest) = values.split_first()?;
    if rest.is_empty() {
        return Some(first);
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();
        let mut pairs = current.chunks_exact(2);
        for pair in &mut pairs {
            next.push(op(pair[0], pair[1]));
        }
        // Carry forward odd element
        next.extend_from_slice(pairs.remainder());
        std::mem::swap(&mut current, &mut next);
    }

    current.first().copied()
}

/// Deterministic tree reduction that tracks the winning index.
///
/// `cmp(a, b) == Less` means `a` wins; ties go to the lower index.
pub fn tree_reduce_indexed<T, F>(values: &[T], cmp: F) -> Option<IndexedValue<T>>
where
    T: Copy,
    F: Fn(T, T) -> Ordering,
{
    let indexed: Vec<IndexedValue<T>> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| IndexedValue::new(i, v))
        .collect();

    tree_reduce(&indexed, |a, b| match cmp(a.value, b.value) {
        Ordering::Less => a,
        Ordering::Greater => b,
        Ordering::Equal => {
            if a.index <= b.index {
                a
            } else {
                b
            }
        }
    })
}

/// Deterministic sum, `0.0` when empty.
///
/// ```
/// use cadence_runtime::reductions::sum;
///
/// assert_eq!(sum(&[1.0, 2.0, 3.0, 4.0]), 10.0);
/// ```
pub fn sum(values: &[f64]) -> f64 {
    tree_reduce(values, |a, b| a + b).unwrap_or(0.0)
}

/// Arithmetic mean, `0.0` when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum(values) / values.len() as f64
}

pub fn min_indexed(values: &[f64]) -> Option<IndexedValue<f64>> {
    tree_reduce_indexed(values, |a, b| a.partial_cmp(&b).unwrap_or(Ordering::Equal))
}

pub fn max_indexed(values: &[f64]) -> Option<IndexedValue<f64>> {
    tree_reduce_indexed(values, |a, b| b.partial_cmp(&a).unwrap_or(Ordering::Equal))
}

/// Minimum value, `f64::INFINITY` when empty.
pub fn min(values: &[f64]) -> f64 {
    min_indexed(values).map_or(f64::INFINITY, |iv| iv.value)
}

/// Maximum value, `f64::NEG_INFINITY` when empty.
pub fn max(values: &[f64]) -> f64 {
    max_indexed(values).map_or(f64::NEG_INFINITY, |iv| iv.value)
}

/// Population variance, `0.0` when empty.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    let squared: Vec<f64> = values.iter().map(|v| (v - mu) * (v - mu)).collect();
    sum(&squared) / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Root mean square, `0.0` when empty.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let squared: Vec<f64> = values.iter().map(|v| v * v).collect();
    (sum(&squared) / values.len() as f64).sqrt()
}

/// Aggregates the samples of one bin.
///
/// Returns `None` for an empty bin so the caller can substitute its
/// `empty_bin_val`. `Pdf` yields the raw count here; normalization over all
/// bins happens once every bin is filled.
pub fn reduce_bin(op: BinReduction, samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(match op {
        BinReduction::Sum => sum(samples),
        BinReduction::Min => min(samples),
        BinReduction::Max => max(samples),
        BinReduction::Avg => mean(samples),
        BinReduction::Count | BinReduction::Pdf => samples.len() as f64,
        BinReduction::Std => std_dev(samples),
        BinReduction::Var => variance(samples),
        BinReduction::Rms => rms(samples),
    })
}
