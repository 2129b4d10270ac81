//! History addressing and gradient nodes.
//!
//! The `expr_name` port is normally fed by an `identifier` node; the
//! identifier's origin tag names the timeline to reopen. A plain string is
//! accepted as well.

use cadence_foundation::{NumericArray, Value};

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};
use crate::history::Timeline;
use crate::window::{self, DeltaUnit, HistoryIndex, RangeSelector};

const RANGE_PORTS: [&str; 8] = [
    "first_absolute_index",
    "last_absolute_index",
    "first_relative_index",
    "last_relative_index",
    "first_absolute_time",
    "last_absolute_time",
    "first_absolute_cycle",
    "last_absolute_cycle",
];

fn expr_name<'i>(inputs: &'i Inputs<'_>) -> Result<&'i str> {
    match inputs.origin("expr_name") {
        Some(origin) => Ok(origin.as_str()),
        None => {
            let value = inputs.required("expr_name")?;
            value.as_str().ok_or_else(|| {
                Error::validation(
                    inputs.node(),
                    format!(
                        "expr_name must be an identifier or a string, got {}",
                        value.kind()
                    ),
                )
            })
        }
    }
}

/// Timeline with at least one entry.
fn timeline<'c>(inputs: &Inputs<'_>, ctx: &EvalContext<'c>) -> Result<&'c Timeline> {
    ctx.cache.lookup(expr_name(inputs)?)
}

/// Timeline of a declared identifier, which may not have an entry yet.
fn declared_timeline<'c>(inputs: &Inputs<'_>, ctx: &EvalContext<'c>) -> Result<&'c Timeline> {
    ctx.cache.declared(expr_name(inputs)?)
}

fn range_ports() -> Vec<Port> {
    std::iter::once(Port::required("expr_name"))
        .chain(RANGE_PORTS.into_iter().map(Port::optional))
        .collect()
}

/// Reads exactly one addressing family from the range ports.
fn range_selector(inputs: &Inputs<'_>) -> Result<RangeSelector> {
    let node = inputs.node();
    let pair = |first: &str, last: &str, a: Option<f64>, b: Option<f64>| match (a, b) {
        (None, None) => Ok(None),
        (Some(a), Some(b)) => Ok(Some((a, b))),
        _ => Err(Error::validation(
            node,
            format!("'{first}' and '{last}' must be given together"),
        )),
    };
    let ints = |first: &str, last: &str| -> Result<Option<(f64, f64)>> {
        let a = inputs.int(first)?.map(|v| v as f64);
        let b = inputs.int(last)?.map(|v| v as f64);
        pair(first, last, a, b)
    };

    let mut families = Vec::new();
    if let Some((a, b)) = ints("first_absolute_index", "last_absolute_index")? {
        families.push(RangeSelector::AbsoluteIndex {
            first: a as i64,
            last: b as i64,
        });
    }
    if let Some((a, b)) = ints("first_relative_index", "last_relative_index")? {
        families.push(RangeSelector::RelativeIndex {
            first: a as i64,
            last: b as i64,
        });
    }
    let times = pair(
        "first_absolute_time",
        "last_absolute_time",
        inputs.double("first_absolute_time")?,
        inputs.double("last_absolute_time")?,
    )?;
    if let Some((first, last)) = times {
        families.push(RangeSelector::AbsoluteTime { first, last });
    }
    if let Some((a, b)) = ints("first_absolute_cycle", "last_absolute_cycle")? {
        families.push(RangeSelector::AbsoluteCycle {
            first: a as i64,
            last: b as i64,
        });
    }

    match families.as_slice() {
        [selector] => Ok(*selector),
        [] => Err(Error::validation(
            node,
            "one of absolute index, relative index, absolute time or absolute cycle bounds must be given",
        )),
        _ => Err(Error::validation(
            node,
            format!(
                "only one addressing family may be given, got {}",
                families.len()
            ),
        )),
    }
}

/// A single past value, by absolute or relative index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryNode;

impl Filter for HistoryNode {
    fn type_name(&self) -> &'static str {
        "history"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("expr_name"),
            Port::optional("absolute_index"),
            Port::optional("relative_index"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let index = match (inputs.int("absolute_index")?, inputs.int("relative_index")?) {
            (Some(i), None) => HistoryIndex::Absolute(i),
            (None, Some(i)) => HistoryIndex::Relative(i),
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    inputs.node(),
                    "absolute_index and relative_index are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(Error::validation(
                    inputs.node(),
                    "one of absolute_index or relative_index must be given",
                ));
            }
        };
        let timeline = timeline(inputs, ctx)?;
        let entry = window::select_entry(inputs.node(), timeline, index)?;
        Ok(entry.value.clone().into())
    }
}

/// Values of an inclusive history window, or the empty value when the
/// window misses the recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRangeNode;

impl Filter for HistoryRangeNode {
    fn type_name(&self) -> &'static str {
        "history_range"
    }

    fn ports(&self) -> Vec<Port> {
        range_ports()
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let selector = range_selector(inputs)?;
        selector.validate(inputs.node())?;
        let timeline = declared_timeline(inputs, ctx)?;
        let window = window::history_range(inputs.node(), timeline, &selector, None)?;
        Ok(window
            .map_or(Value::Null, |window| Value::Array(window.values))
            .into())
    }
}

/// Trailing-window gradient of a numeric history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryGradientNode;

impl Filter for HistoryGradientNode {
    fn type_name(&self) -> &'static str {
        "history_gradient"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("expr_name"),
            Port::optional("window_length"),
            Port::optional("window_length_unit"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let window_length = inputs.double("window_length")?.unwrap_or(1.0);
        let unit = match inputs.string("window_length_unit")? {
            Some(unit) => DeltaUnit::parse(inputs.node(), unit)?,
            None => DeltaUnit::Index,
        };
        let timeline = declared_timeline(inputs, ctx)?;
        let gradient = window::history_gradient(inputs.node(), timeline, window_length, unit)?;
        Ok(Value::Double(gradient).into())
    }
}

/// Pointwise gradient across a history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRangeGradientNode;

impl Filter for HistoryRangeGradientNode {
    fn type_name(&self) -> &'static str {
        "history_range_gradient"
    }

    fn ports(&self) -> Vec<Port> {
        range_ports()
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let selector = range_selector(inputs)?;
        selector.validate(inputs.node())?;
        let timeline = declared_timeline(inputs, ctx)?;
        let gradients = window::range_gradient(inputs.node(), timeline, &selector)?;
        Ok(Value::Array(NumericArray::float64(gradients)).into())
    }
}
