//! Cadence Foundation
//!
//! Core value types shared across the Cadence crates: the [`Value`] sum type
//! that flows between evaluation nodes, binning [`Axis`] definitions, typed
//! identifiers, and the JSON wire shape used for persistence.

pub mod axis;
pub mod error;
pub mod ids;
pub mod value;
pub mod wire;

pub use axis::{Axis, AxisBins, AxisLiteral, AxisSpec, SpecBins};
pub use error::{AxisError, WireError};
pub use ids::{Identifier, NodeName};
pub use value::{
    Aabb, Association, Bin, BinReduction, Binning, DType, ElementInfo, Histogram, Kind, Lineout,
    NumericArray, Value, ValuePosition,
};
pub use wire::WireValue;

/// Simulation cycle number.
pub type Cycle = u64;

/// Simulation time in the units published by the host code.
pub type SimTime = f64;
