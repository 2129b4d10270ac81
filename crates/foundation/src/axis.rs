//! Binning axes.
//!
//! An axis is one dimension of a binning operation. Users describe axes with
//! an [`AxisSpec`], whose uniform bounds may be left open and filled in from
//! the data range at evaluation time. A resolved [`Axis`] always has concrete
//! bin edges.
//!
//! # Layouts
//!
//! - **Uniform**: `num_bins` equal-width bins over `[min_val, max_val]`,
//!   requiring `min_val < max_val`.
//! - **Rectilinear**: explicit edges, at least two, strictly increasing.
//!
//! Values equal to the upper bound fall into the last bin.

use serde::{Deserialize, Serialize};

use crate::error::AxisError;

/// Bin layout of a resolved axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisBins {
    Uniform {
        min_val: f64,
        max_val: f64,
        num_bins: usize,
    },
    Rectilinear(Vec<f64>),
}

/// A fully resolved binning axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub clamp: bool,
    pub bins: AxisBins,
}

impl Axis {
    /// Creates a validated uniform axis.
    pub fn uniform(
        name: impl Into<String>,
        min_val: f64,
        max_val: f64,
        num_bins: usize,
    ) -> Result<Self, AxisError> {
        let axis = Self {
            name: name.into(),
            clamp: false,
            bins: AxisBins::Uniform {
                min_val,
                max_val,
                num_bins,
            },
        };
        axis.validate()?;
        Ok(axis)
    }

    /// Creates a validated rectilinear axis from explicit edges.
    pub fn rectilinear(name: impl Into<String>, edges: Vec<f64>) -> Result<Self, AxisError> {
        let axis = Self {
            name: name.into(),
            clamp: false,
            bins: AxisBins::Rectilinear(edges),
        };
        axis.validate()?;
        Ok(axis)
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Checks the layout invariants.
    pub fn validate(&self) -> Result<(), AxisError> {
        match &self.bins {
            AxisBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => {
                // Negated so NaN bounds are rejected as well.
                if !(min_val < max_val) {
                    return Err(AxisError::InvalidBounds {
                        axis: self.name.clone(),
                        min: *min_val,
                        max: *max_val,
                    });
                }
                if *num_bins == 0 {
                    return Err(AxisError::NoBins {
                        axis: self.name.clone(),
                    });
                }
                Ok(())
            }
            AxisBins::Rectilinear(edges) => validate_edges(&self.name, edges),
        }
    }

    pub fn num_bins(&self) -> usize {
        match &self.bins {
            AxisBins::Uniform { num_bins, .. } => *num_bins,
            AxisBins::Rectilinear(edges) => edges.len().saturating_sub(1),
        }
    }

    pub fn min_val(&self) -> f64 {
        match &self.bins {
            AxisBins::Uniform { min_val, .. } => *min_val,
            AxisBins::Rectilinear(edges) => edges.first().copied().unwrap_or(f64::NAN),
        }
    }

    pub fn max_val(&self) -> f64 {
        match &self.bins {
            AxisBins::Uniform { max_val, .. } => *max_val,
            AxisBins::Rectilinear(edges) => edges.last().copied().unwrap_or(f64::NAN),
        }
    }

    /// Lower and upper edge of bin `index`.
    pub fn bin_bounds(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.num_bins() {
            return None;
        }
        match &self.bins {
            AxisBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => {
                let width = (max_val - min_val) / *num_bins as f64;
                let lo = min_val + index as f64 * width;
                Some((lo, lo + width))
            }
            AxisBins::Rectilinear(edges) => Some((edges[index], edges[index + 1])),
        }
    }

    /// Midpoint of bin `index`.
    pub fn center(&self, index: usize) -> Option<f64> {
        self.bin_bounds(index).map(|(lo, hi)| lo + (hi - lo) / 2.0)
    }

    /// Bin containing `v`, or `None` when `v` lies outside `[min_val, max_val]`.
    pub fn locate(&self, v: f64) -> Option<usize> {
        let (min, max) = (self.min_val(), self.max_val());
        if !(v >= min && v <= max) {
            return None;
        }
        let last = self.num_bins() - 1;
        match &self.bins {
            AxisBins::Uniform { num_bins, .. } => {
                let bin = ((v - min) * *num_bins as f64 / (max - min)).floor() as usize;
                Some(bin.min(last))
            }
            AxisBins::Rectilinear(edges) => {
                // First edge strictly greater than v closes the bin.
                let upper = edges.partition_point(|edge| *edge <= v);
                Some(upper.saturating_sub(1).min(last))
            }
        }
    }

    /// Bin for a sample during binning: out-of-range samples land in the
    /// edge bins when the axis clamps, otherwise they are dropped.
    pub fn locate_sample(&self, v: f64) -> Option<usize> {
        if v.is_nan() {
            return None;
        }
        match self.locate(v) {
            Some(bin) => Some(bin),
            None if self.clamp => {
                if v < self.min_val() {
                    Some(0)
                } else {
                    Some(self.num_bins() - 1)
                }
            }
            None => None,
        }
    }
}

fn validate_edges(axis: &str, edges: &[f64]) -> Result<(), AxisError> {
    if edges.len() < 2 {
        return Err(AxisError::InvalidEdges {
            axis: axis.to_string(),
            reason: format!("rectilinear axis needs at least 2 edges, got {}", edges.len()),
        });
    }
    if let Some(pos) = edges.windows(2).position(|pair| !(pair[0] < pair[1])) {
        return Err(AxisError::InvalidEdges {
            axis: axis.to_string(),
            reason: format!(
                "edges must be strictly increasing (edge {} = {} followed by {})",
                pos,
                edges[pos],
                edges[pos + 1]
            ),
        });
    }
    Ok(())
}

/// Bin layout of an axis as the user wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecBins {
    Uniform {
        min_val: Option<f64>,
        max_val: Option<f64>,
        num_bins: Option<usize>,
    },
    Rectilinear(Vec<f64>),
}

/// An axis whose uniform bounds may still be open.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub name: String,
    pub clamp: bool,
    pub bins: SpecBins,
}

impl AxisSpec {
    /// Uniform axis with every bound left to the data.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clamp: false,
            bins: SpecBins::Uniform {
                min_val: None,
                max_val: None,
                num_bins: None,
            },
        }
    }

    /// Validates whatever is known before the data range is available.
    pub fn validate(&self) -> Result<(), AxisError> {
        match &self.bins {
            SpecBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => {
                if let (Some(min), Some(max)) = (min_val, max_val)
                    && !(min < max)
                {
                    return Err(AxisError::InvalidBounds {
                        axis: self.name.clone(),
                        min: *min,
                        max: *max,
                    });
                }
                if *num_bins == Some(0) {
                    return Err(AxisError::NoBins {
                        axis: self.name.clone(),
                    });
                }
                Ok(())
            }
            SpecBins::Rectilinear(edges) => validate_edges(&self.name, edges),
        }
    }

    /// Whether both uniform bounds still need the data range.
    pub fn needs_data_range(&self) -> bool {
        matches!(
            self.bins,
            SpecBins::Uniform { min_val, max_val, .. } if min_val.is_none() || max_val.is_none()
        )
    }

    /// Number of bins once resolved.
    pub fn num_bins(&self, default_num_bins: usize) -> usize {
        match &self.bins {
            SpecBins::Uniform { num_bins, .. } => num_bins.unwrap_or(default_num_bins),
            SpecBins::Rectilinear(edges) => edges.len().saturating_sub(1),
        }
    }

    /// Fills open bounds from `data_range` and returns the concrete axis.
    pub fn resolve(
        &self,
        default_num_bins: usize,
        data_range: Option<(f64, f64)>,
    ) -> Result<Axis, AxisError> {
        let bins = match &self.bins {
            SpecBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => {
                let min_val = min_val
                    .or(data_range.map(|r| r.0))
                    .ok_or_else(|| AxisError::Unresolved {
                        axis: self.name.clone(),
                        bound: "min_val",
                    })?;
                let max_val = max_val
                    .or(data_range.map(|r| r.1))
                    .ok_or_else(|| AxisError::Unresolved {
                        axis: self.name.clone(),
                        bound: "max_val",
                    })?;
                AxisBins::Uniform {
                    min_val,
                    max_val,
                    num_bins: num_bins.unwrap_or(default_num_bins),
                }
            }
            SpecBins::Rectilinear(edges) => AxisBins::Rectilinear(edges.clone()),
        };
        let axis = Axis {
            name: self.name.clone(),
            clamp: self.clamp,
            bins,
        };
        axis.validate()?;
        Ok(axis)
    }
}

impl From<&Axis> for AxisSpec {
    fn from(axis: &Axis) -> Self {
        let bins = match &axis.bins {
            AxisBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => SpecBins::Uniform {
                min_val: Some(*min_val),
                max_val: Some(*max_val),
                num_bins: Some(*num_bins),
            },
            AxisBins::Rectilinear(edges) => SpecBins::Rectilinear(edges.clone()),
        };
        Self {
            name: axis.name.clone(),
            clamp: axis.clamp,
            bins,
        }
    }
}

/// Serialized axis: `{name, [min_val|bins], [max_val], [num_bins], [clamp]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLiteral {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bins: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<f64>>,
    #[serde(default)]
    pub clamp: bool,
}

impl TryFrom<AxisLiteral> for AxisSpec {
    type Error = AxisError;

    fn try_from(lit: AxisLiteral) -> Result<Self, AxisError> {
        let bins = match lit.bins {
            Some(edges) => {
                if lit.min_val.is_some() || lit.max_val.is_some() || lit.num_bins.is_some() {
                    return Err(AxisError::MixedLayout(lit.name));
                }
                SpecBins::Rectilinear(edges)
            }
            None => SpecBins::Uniform {
                min_val: lit.min_val,
                max_val: lit.max_val,
                num_bins: lit.num_bins,
            },
        };
        let spec = Self {
            name: lit.name,
            clamp: lit.clamp,
            bins,
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl From<&AxisSpec> for AxisLiteral {
    fn from(spec: &AxisSpec) -> Self {
        let mut lit = AxisLiteral {
            name: spec.name.clone(),
            min_val: None,
            max_val: None,
            num_bins: None,
            bins: None,
            clamp: spec.clamp,
        };
        match &spec.bins {
            SpecBins::Uniform {
                min_val,
                max_val,
                num_bins,
            } => {
                lit.min_val = *min_val;
                lit.max_val = *max_val;
                lit.num_bins = *num_bins;
            }
            SpecBins::Rectilinear(edges) => lit.bins = Some(edges.clone()),
        }
        lit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_bounds_and_centers() {
        let axis = Axis::uniform("x", 0.0, 8.0, 4).expect("valid axis");
        assert_eq!(axis.num_bins(), 4);
        assert_eq!(axis.bin_bounds(1), Some((2.0, 4.0)));
        assert_eq!(axis.center(3), Some(7.0));
        assert_eq!(axis.bin_bounds(4), None);
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        assert!(matches!(
            Axis::uniform("x", 1.0, 1.0, 4),
            Err(AxisError::InvalidBounds { .. })
        ));
        assert!(matches!(
            Axis::uniform("x", 0.0, 1.0, 0),
            Err(AxisError::NoBins { .. })
        ));
    }

    #[test]
    fn locate_includes_upper_bound() {
        let axis = Axis::uniform("x", 0.0, 8.0, 4).expect("valid axis");
        assert_eq!(axis.locate(0.0), Some(0));
        assert_eq!(axis.locate(3.9), Some(1));
        assert_eq!(axis.locate(8.0), Some(3));
        assert_eq!(axis.locate(8.1), None);
        assert_eq!(axis.locate(f64::NAN), None);
    }

    #[test]
    fn locate_inverts_center() {
        let axis = Axis::uniform("pressure", -3.0, 17.0, 7).expect("valid axis");
        for i in 0..axis.num_bins() {
            let center = axis.center(i).expect("center");
            assert_eq!(axis.locate(center), Some(i));
        }
    }

    #[test]
    fn rectilinear_edges() {
        let axis = Axis::rectilinear("y", vec![0.0, 1.0, 5.0, 6.0]).expect("valid axis");
        assert_eq!(axis.num_bins(), 3);
        assert_eq!(axis.locate(1.0), Some(1));
        assert_eq!(axis.locate(4.99), Some(1));
        assert_eq!(axis.locate(6.0), Some(2));
        assert_eq!(axis.center(1), Some(3.0));

        assert!(Axis::rectilinear("y", vec![0.0]).is_err());
        assert!(Axis::rectilinear("y", vec![0.0, 2.0, 2.0]).is_err());
    }

    #[test]
    fn clamped_samples_land_in_edge_bins() {
        let axis = Axis::uniform("x", 0.0, 1.0, 2).expect("valid axis");
        assert_eq!(axis.locate_sample(-5.0), None);
        let axis = axis.with_clamp(true);
        assert_eq!(axis.locate_sample(-5.0), Some(0));
        assert_eq!(axis.locate_sample(5.0), Some(1));
    }

    #[test]
    fn spec_resolves_open_bounds_from_data() {
        let spec = AxisSpec::open("temperature");
        assert!(spec.needs_data_range());
        let axis = spec.resolve(16, Some((2.0, 10.0))).expect("resolved");
        assert_eq!(axis.min_val(), 2.0);
        assert_eq!(axis.max_val(), 10.0);
        assert_eq!(axis.num_bins(), 16);

        assert!(matches!(
            spec.resolve(16, None),
            Err(AxisError::Unresolved { bound: "min_val", .. })
        ));
    }

    #[test]
    fn literal_rejects_mixed_layout() {
        let lit = AxisLiteral {
            name: "x".into(),
            min_val: Some(0.0),
            max_val: None,
            num_bins: None,
            bins: Some(vec![0.0, 1.0]),
            clamp: false,
        };
        assert!(matches!(
            AxisSpec::try_from(lit),
            Err(AxisError::MixedLayout(_))
        ));
    }

    #[test]
    fn literal_parses_from_json() {
        let lit: AxisLiteral =
            serde_json::from_str(r#"{"name": "x", "min_val": 0.0, "max_val": 2.0, "num_bins": 2}"#)
                .expect("parse literal");
        let spec = AxisSpec::try_from(lit).expect("valid literal");
        assert_eq!(spec.num_bins(256), 2);
        assert!(!spec.needs_data_range());
    }
}
