//! Cadence Runtime
//!
//! Evaluates expression graphs once per simulation cycle against a
//! published dataset, keeping every expression's results in a history
//! cache that later cycles can address by index, time or cycle.
//!
//! # Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Node contract | [`filter`], [`nodes`] |
//! | Wiring and scheduling | [`graph`] |
//! | Per-cycle driver | [`session`] |
//! | Temporal addressing | [`history`], [`window`] |
//! | Statistics | [`stats`], [`reductions`], [`binning`] |
//! | Dataset access | [`mesh`] |
//! | Save and restore | [`persist`] |

pub mod binning;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod graph;
pub mod history;
pub mod mesh;
pub mod nodes;
pub mod persist;
pub mod reductions;
pub mod session;
pub mod stats;
pub mod window;

pub use config::SessionConfig;
pub use context::{EvalContext, SymbolTable};
pub use error::{Error, ErrorTier, Result};
pub use filter::{Filter, Inputs, Output, Port};
pub use graph::{ExpressionGraph, GraphSpec, NodeSpec};
pub use history::{HistoryCache, HistoryEntry, LastValue, Timeline};
pub use mesh::{MeshStatistics, PointMesh};
pub use session::{Expressions, Session};
