//! Foundation error types.

use thiserror::Error;

/// Axis definition failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AxisError {
    /// Uniform bounds are inverted or degenerate.
    #[error("axis '{axis}': min_val ({min}) must be smaller than max_val ({max})")]
    InvalidBounds { axis: String, min: f64, max: f64 },
    /// Rectilinear edges are too few or not strictly increasing.
    #[error("axis '{axis}': {reason}")]
    InvalidEdges { axis: String, reason: String },
    /// Uniform bin count of zero.
    #[error("axis '{axis}': num_bins must be at least 1")]
    NoBins { axis: String },
    /// Both uniform and rectilinear parameters were given.
    #[error("axis '{0}': 'bins' cannot be combined with 'min_val', 'max_val' or 'num_bins'")]
    MixedLayout(String),
    /// Bounds were not supplied and could not be inferred.
    #[error("axis '{axis}': missing {bound} and no data range to infer it from")]
    Unresolved { axis: String, bound: &'static str },
}

/// Malformed wire value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WireError {
    /// The payload does not match the declared kind.
    #[error("invalid payload for '{kind}': {reason}")]
    Payload { kind: &'static str, reason: String },
    /// A required attribute is absent.
    #[error("'{kind}' value is missing attribute '{attr}'")]
    MissingAttr { kind: &'static str, attr: &'static str },
    /// Embedded axis definition is invalid.
    #[error(transparent)]
    Axis(#[from] AxisError),
}

impl WireError {
    pub(crate) fn payload(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Payload {
            kind,
            reason: reason.into(),
        }
    }
}
