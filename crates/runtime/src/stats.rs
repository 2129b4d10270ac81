//! Histogram statistics.
//!
//! Histograms are produced by the mesh collaborator (bucket counting needs
//! the full, globally reduced field). Everything derived from a histogram is
//! computed here: normalization to a PDF or CDF, Shannon entropy, and
//! quantile lookup on a CDF.
//!
//! A CDF value `cdf[b]` is the cumulative probability at the *upper* edge of
//! bin `b`; the cumulative probability at the lower edge of bin 0 is zero.

use cadence_foundation::Histogram;

use crate::error::{Error, Result};
use crate::reductions;

/// Interpolation rule used by [`quantile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Linear between the edges of the bin containing `q`.
    Linear,
    /// Lower edge of that bin.
    Lower,
    /// Upper edge of that bin.
    Higher,
    /// Midpoint of that bin.
    Midpoint,
    /// Whichever edge `q` lies closer to, in probability.
    Nearest,
}

impl Interpolation {
    pub const NAMES: [&'static str; 5] = ["linear", "lower", "higher", "midpoint", "nearest"];

    pub fn parse(node: &str, s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Interpolation::Linear),
            "lower" => Ok(Interpolation::Lower),
            "higher" => Ok(Interpolation::Higher),
            "midpoint" => Ok(Interpolation::Midpoint),
            "nearest" => Ok(Interpolation::Nearest),
            other => Err(Error::validation(
                node,
                format!(
                    "unknown interpolation '{other}'; expected one of {}",
                    Self::NAMES.join(", ")
                ),
            )),
        }
    }
}

/// Counts `samples` into `num_bins` uniform bins over `[min_val, max_val]`.
///
/// Samples outside the bounds go to the edge bins when `clamp` is set and are
/// dropped otherwise. NaN samples are always dropped.
pub fn bucket_counts(samples: &[f64], min_val: f64, max_val: f64, num_bins: usize, clamp: bool) -> Vec<f64> {
    let mut counts = vec![0.0; num_bins];
    if num_bins == 0 || !(min_val < max_val) {
        return counts;
    }
    let last = num_bins - 1;
    let scale = num_bins as f64 / (max_val - min_val);
    for &v in samples {
        if v.is_nan() {
            continue;
        }
        let bin = if v < min_val {
            if !clamp {
                continue;
            }
            0
        } else if v > max_val {
            if !clamp {
                continue;
            }
            last
        } else {
            (((v - min_val) * scale).floor() as usize).min(last)
        };
        counts[bin] += 1.0;
    }
    counts
}

/// Normalizes counts so they sum to one. An all-zero histogram stays zero.
pub fn pdf(histogram: &Histogram) -> Histogram {
    let total = reductions::sum(&histogram.values);
    let values = if total > 0.0 {
        histogram.values.iter().map(|c| c / total).collect()
    } else {
        vec![0.0; histogram.values.len()]
    };
    Histogram {
        values,
        ..histogram.clone()
    }
}

/// Running sum of the normalized counts.
pub fn cdf(histogram: &Histogram) -> Histogram {
    let density = pdf(histogram);
    let mut running = 0.0;
    let values = density
        .values
        .iter()
        .map(|p| {
            running += p;
            running
        })
        .collect();
    Histogram { values, ..density }
}

/// Shannon entropy (natural log) of the normalized bins.
pub fn entropy(histogram: &Histogram) -> f64 {
    let terms: Vec<f64> = pdf(histogram)
        .values
        .into_iter()
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .collect();
    reductions::sum(&terms)
}

/// Maps cumulative probability `q` to a value on the histogram's axis.
///
/// The bin holding `q` is the first bin whose cumulative probability reaches
/// `q`. The result is monotonically non-decreasing in `q` for every rule.
pub fn quantile(node: &str, cdf: &Histogram, q: f64, interpolation: Interpolation) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(Error::invalid_argument(
            node,
            format!("quantile q must lie in [0, 1], got {q}"),
        ));
    }
    let num_bins = cdf.num_bins();
    if num_bins == 0 {
        return Err(Error::invalid_argument(node, "cannot take a quantile of an empty histogram"));
    }
    let bin = cdf
        .values
        .iter()
        .position(|c| *c >= q)
        .unwrap_or(num_bins - 1);
    let width = (cdf.max_val - cdf.min_val) / num_bins as f64;
    let lower = cdf.min_val + bin as f64 * width;
    let upper = lower + width;
    let below = if bin == 0 { 0.0 } else { cdf.values[bin - 1] };
    let span = cdf.values[bin] - below;
    let fraction = if span > 0.0 {
        ((q - below) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(match interpolation {
        Interpolation::Linear => lower + width * fraction,
        Interpolation::Lower => lower,
        Interpolation::Higher => upper,
        Interpolation::Midpoint => lower + width / 2.0,
        Interpolation::Nearest => {
            if fraction < 0.5 {
                lower
            } else {
                upper
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(values: Vec<f64>, min_val: f64, max_val: f64) -> Histogram {
        Histogram {
            values,
            min_val,
            max_val,
            clamp: true,
        }
    }

    #[test]
    fn counts_one_per_bin() {
        let counts = bucket_counts(&[1.0, 3.0, 5.0, 7.0], 0.0, 8.0, 4, true);
        assert_eq!(counts, vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn counts_clamp_or_drop_outliers() {
        let samples = [-1.0, 8.0, 9.0, f64::NAN];
        assert_eq!(bucket_counts(&samples, 0.0, 8.0, 2, true), vec![1.0, 2.0]);
        assert_eq!(bucket_counts(&samples, 0.0, 8.0, 2, false), vec![0.0, 1.0]);
    }

    #[test]
    fn pdf_and_cdf_keep_metadata() {
        let h = histogram(vec![1.0, 3.0], -1.0, 1.0);
        let p = pdf(&h);
        assert_eq!(p.values, vec![0.25, 0.75]);
        assert_eq!((p.min_val, p.max_val), (-1.0, 1.0));
        let c = cdf(&h);
        assert_eq!(c.values, vec![0.25, 1.0]);
        assert_eq!(pdf(&histogram(vec![0.0, 0.0], 0.0, 1.0)).values, vec![0.0, 0.0]);
    }

    #[test]
    fn entropy_of_uniform_and_point_mass() {
        let uniform = histogram(vec![1.0; 4], 0.0, 4.0);
        assert!((entropy(&uniform) - 4.0f64.ln()).abs() < 1e-12);
        let point = histogram(vec![0.0, 5.0, 0.0], 0.0, 3.0);
        assert_eq!(entropy(&point), 0.0);
    }

    #[test]
    fn median_of_even_histogram() {
        let c = cdf(&histogram(vec![1.0, 1.0, 1.0, 1.0], 0.0, 8.0));
        assert_eq!(quantile("quantile", &c, 0.5, Interpolation::Linear).expect("q"), 4.0);
        assert_eq!(quantile("quantile", &c, 0.5, Interpolation::Lower).expect("q"), 2.0);
        assert_eq!(quantile("quantile", &c, 0.5, Interpolation::Higher).expect("q"), 4.0);
        assert_eq!(quantile("quantile", &c, 0.5, Interpolation::Midpoint).expect("q"), 3.0);
        assert_eq!(quantile("quantile", &c, 0.0, Interpolation::Linear).expect("q"), 0.0);
        assert_eq!(quantile("quantile", &c, 1.0, Interpolation::Linear).expect("q"), 8.0);
    }

    #[test]
    fn quantile_monotonic_for_every_rule() {
        let c = cdf(&histogram(vec![3.0, 0.0, 1.0, 7.0, 2.0], -2.0, 3.0));
        for rule in ["linear", "lower", "higher", "midpoint", "nearest"] {
            let rule = Interpolation::parse("quantile", rule).expect("rule");
            let mut previous = f64::NEG_INFINITY;
            for step in 0..=100 {
                let q = step as f64 / 100.0;
                let v = quantile("quantile", &c, q, rule).expect("quantile");
                assert!(v >= previous, "{rule:?} decreased at q={q}: {v} < {previous}");
                previous = v;
            }
        }
    }

    #[test]
    fn quantile_rejects_out_of_range_q() {
        let c = cdf(&histogram(vec![1.0], 0.0, 1.0));
        assert!(matches!(
            quantile("quantile", &c, 1.5, Interpolation::Linear),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(Interpolation::parse("quantile", "cubic").is_err());
    }
}
