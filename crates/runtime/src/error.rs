//! Errors raised while evaluating expression graphs.
//!
//! Every failure aborts the current evaluation pass; nothing is retried or
//! swallowed inside this crate. Errors fall into two tiers, reported by
//! [`Error::tier`]:
//!
//! # Validation tier
//!
//! Raised by `verify_params` or early in `execute`, before any collaborator
//! is queried: [`Error::Validation`], [`Error::MissingInput`],
//! [`Error::TypeMismatch`], [`Error::InvalidArgument`], [`Error::InvalidRange`].
//!
//! # Evaluation tier
//!
//! Raised mid-`execute` once the inputs are known to be well formed:
//! [`Error::UnknownIdentifier`], [`Error::EmptyHistory`],
//! [`Error::IndexOutOfRange`], [`Error::NotImplemented`],
//! [`Error::UnknownField`], [`Error::ComponentMismatch`] and the remaining
//! structural variants.
//!
//! Outcomes that are deliberately *not* errors: an empty history window, the
//! `-inf` gradient sentinel, and a bin search that finds nothing.

use cadence_foundation::{AxisError, WireError};
use thiserror::Error;

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Which tier an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTier {
    Validation,
    Evaluation,
}

/// Errors that can occur while verifying or executing expressions.
#[derive(Debug, Error)]
pub enum Error {
    /// A static or runtime parameter is malformed.
    ///
    /// Covers ambiguous addressing, unknown interpolation modes and unknown
    /// operator strings.
    #[error("{node}: {message}")]
    Validation { node: String, message: String },

    /// A required input port produced the empty value.
    #[error("{node}: missing required input '{port}'")]
    MissingInput { node: String, port: String },

    /// An input has the wrong kind.
    #[error("{node}: input '{port}' must be {expected}, got {found}")]
    TypeMismatch {
        node: String,
        port: String,
        expected: String,
        found: String,
    },

    /// A parameter is well typed but outside its allowed domain.
    #[error("{node}: {message}")]
    InvalidArgument { node: String, message: String },

    /// Histogram or axis bounds are not ordered.
    #[error("{node}: min_val ({min}) must be smaller than max_val ({max})")]
    InvalidRange { node: String, min: f64, max: f64 },

    /// The identifier has never been recorded in the history cache.
    #[error("unknown expression identifier '{name}'; known identifiers: {known:?}")]
    UnknownIdentifier { name: String, known: Vec<String> },

    /// The identifier exists but holds no entries.
    #[error("identifier '{0}' has no history entries")]
    EmptyHistory(String),

    /// An index fell outside the addressable range.
    #[error("{node}: index {index} is out of range for {len} entries")]
    IndexOutOfRange { node: String, index: i64, len: usize },

    /// The request is well formed but not supported.
    #[error("{node}: not implemented: {message}")]
    NotImplemented { node: String, message: String },

    /// Attribute access on a value that does not expose the attribute.
    #[error("value of kind {kind} has no attribute '{attr}'; available: {available:?}")]
    UnknownAttribute {
        kind: String,
        attr: String,
        available: Vec<String>,
    },

    /// The dataset does not publish the named field.
    #[error("{node}: unknown field '{field}'; known fields: {known:?}")]
    UnknownField {
        node: String,
        field: String,
        known: Vec<String>,
    },

    /// Component selection does not fit the field's shape.
    #[error("{node}: {message}")]
    ComponentMismatch { node: String, message: String },

    /// Entries for one identifier must be appended in increasing cycle order.
    #[error("history for '{name}' is at cycle {last}; cannot append cycle {cycle}")]
    HistoryOrder { name: String, last: u64, cycle: u64 },

    /// The expression graph contains a dependency cycle.
    #[error("cycle detected in expression graph: {nodes:?}")]
    CycleDetected { nodes: Vec<String> },

    /// A connection or output refers to a node that does not exist.
    #[error("unknown node '{0}' in expression graph")]
    UnknownNode(String),

    /// No filter is registered under the requested type name.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// The mesh collaborator reported a failure or returned inconsistent data.
    #[error("mesh collaborator: {0}")]
    Collaborator(String),

    /// A persisted value could not be decoded.
    #[error("wire format: {0}")]
    Wire(#[from] WireError),

    /// JSON encoding or decoding failed.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a persisted cache failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Tier classification used by the session when reporting failures.
    pub fn tier(&self) -> ErrorTier {
        match self {
            Error::Validation { .. }
            | Error::MissingInput { .. }
            | Error::TypeMismatch { .. }
            | Error::InvalidArgument { .. }
            | Error::InvalidRange { .. } => ErrorTier::Validation,
            _ => ErrorTier::Evaluation,
        }
    }

    pub fn validation(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn not_implemented(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotImplemented {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Wraps a malformed axis as a validation failure of `node`.
    pub fn axis(node: impl Into<String>, err: AxisError) -> Self {
        match err {
            AxisError::InvalidBounds { min, max, .. } => Self::InvalidRange {
                node: node.into(),
                min,
                max,
            },
            other => Self::validation(node, other.to_string()),
        }
    }
}
