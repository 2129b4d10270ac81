//! Binning, axis construction and bin lookup nodes.

use cadence_foundation::{Axis, AxisLiteral, AxisSpec, BinReduction, Value};

use crate::binning::{self, BinningParams};
use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};

fn axis_list<'a>(inputs: &Inputs<'a>, port: &str) -> Result<&'a [AxisSpec]> {
    let value = inputs.required(port)?;
    match value {
        Value::AxisList(axes) => Ok(axes),
        other => Err(inputs.mismatch(port, "axis_list", other)),
    }
}

/// Bin values and axes of a binning, or of a histogram viewed as a
/// single-axis binning.
fn binned<'a>(inputs: &Inputs<'a>, port: &str) -> Result<(&'a [f64], Vec<Axis>)> {
    let value = inputs.required(port)?;
    match value {
        Value::Binning(b) => Ok((&b.values, b.axes.clone())),
        Value::Histogram(h) => Ok((&h.values, vec![h.axis("value")])),
        other => Err(inputs.mismatch(port, "binning or histogram", other)),
    }
}

/// Multi-axis reduction binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinningNode;

impl Filter for BinningNode {
    fn type_name(&self) -> &'static str {
        "binning"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::optional("reduction_var"),
            Port::required("reduction_op"),
            Port::required("bin_axes"),
            Port::optional("empty_bin_val"),
            Port::optional("component"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let node = inputs.node();
        let op_name = inputs.required_string("reduction_op")?;
        let reduction_op = BinReduction::parse(op_name).ok_or_else(|| {
            let known: Vec<&str> = BinReduction::ALL.iter().map(BinReduction::as_str).collect();
            Error::validation(
                node,
                format!(
                    "unknown reduction_op '{op_name}'; expected one of {}",
                    known.join(", ")
                ),
            )
        })?;
        let (reduction_var, field_component) = inputs.field("reduction_var")?.unwrap_or(("", None));
        let component = inputs.string("component")?.filter(|c| !c.is_empty());
        let component = match (field_component, component) {
            (Some(a), Some(b)) if a != b => {
                return Err(Error::validation(
                    node,
                    format!("component given twice: '{a}' on the field and '{b}' as an argument"),
                ));
            }
            (a, b) => a.or(b),
        };
        let axes = axis_list(inputs, "bin_axes")?;

        let params = BinningParams {
            reduction_var: reduction_var.to_string(),
            reduction_op,
            axes: axes.to_vec(),
            empty_bin_val: inputs.double("empty_bin_val")?.unwrap_or(0.0),
            component: component.map(str::to_string),
        };
        let result = binning::binning(node, ctx.mesh, params, ctx.config.default_num_bins)?;
        Ok(Value::Binning(result).into())
    }
}

/// A single binning axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisNode;

impl Filter for AxisNode {
    fn type_name(&self) -> &'static str {
        "axis"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("name"),
            Port::optional("min_val"),
            Port::optional("max_val"),
            Port::optional("num_bins"),
            Port::optional("bins"),
            Port::optional("clamp"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let node = inputs.node();
        let (name, _) = inputs.required_field("name")?;
        let num_bins = match inputs.int("num_bins")? {
            Some(n) if n < 1 => {
                return Err(Error::invalid_argument(
                    node,
                    format!("num_bins must be at least 1, got {n}"),
                ));
            }
            other => other.map(|n| n as usize),
        };
        let bins = match inputs.get("bins") {
            None => None,
            Some(Value::Array(edges)) => Some(edges.values().to_vec()),
            Some(other) => return Err(inputs.mismatch("bins", "array", other)),
        };
        let literal = AxisLiteral {
            name: name.to_string(),
            min_val: inputs.double("min_val")?,
            max_val: inputs.double("max_val")?,
            num_bins,
            bins,
            clamp: inputs.bool("clamp")?.unwrap_or(false),
        };
        let spec = AxisSpec::try_from(literal).map_err(|e| Error::axis(node, e))?;
        binning::validate_axis_name(node, ctx.mesh, &spec.name)?;
        Ok(Value::AxisList(vec![spec]).into())
    }
}

/// Concatenates axis lists `arg0..argN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisListNode {
    arity: usize,
}

impl AxisListNode {
    pub fn new(arity: usize) -> Self {
        Self { arity }
    }
}

impl Filter for AxisListNode {
    fn type_name(&self) -> &'static str {
        "axis_list"
    }

    fn ports(&self) -> Vec<Port> {
        (0..self.arity)
            .map(|i| Port::required(format!("arg{i}")))
            .collect()
    }

    fn verify_params(&self, node: &str) -> Result<()> {
        if self.arity == 0 {
            return Err(Error::validation(node, "axis_list needs at least one argument"));
        }
        Ok(())
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let mut axes = Vec::new();
        for i in 0..self.arity {
            axes.extend_from_slice(axis_list(inputs, &format!("arg{i}"))?);
        }
        Ok(Value::AxisList(axes).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinByIndex;

impl Filter for BinByIndex {
    fn type_name(&self) -> &'static str {
        "bin_by_index"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("binning"), Port::required("index")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let (values, axes) = binned(inputs, "binning")?;
        let index = inputs.required_int("index")?;
        let bin = binning::bin_by_index(inputs.node(), values, &axes, index)?;
        Ok(Value::Bin(bin).into())
    }
}

/// Stored value of the bin containing `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinByValue;

impl Filter for BinByValue {
    fn type_name(&self) -> &'static str {
        "bin_by_value"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("binning"), Port::required("value")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let (values, axes) = binned(inputs, "binning")?;
        let v = inputs.required_double("value")?;
        let bin = binning::bin_by_value(inputs.node(), values, &axes, v)?;
        Ok(Value::Double(bin.value).into())
    }
}

/// Nearest bin above a threshold on one side of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointAndAxis;

impl Filter for PointAndAxis {
    fn type_name(&self) -> &'static str {
        "point_and_axis"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("binning"),
            Port::optional("axis"),
            Port::required("threshold"),
            Port::required("point"),
            Port::optional("miss_value"),
            Port::optional("direction"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let (values, axes) = binned(inputs, "binning")?;
        let bin = binning::point_and_axis(
            inputs.node(),
            values,
            &axes,
            inputs.required_double("threshold")?,
            inputs.required_double("point")?,
            inputs.int("direction")?.unwrap_or(1),
            inputs.double("miss_value")?.unwrap_or(f64::NAN),
        )?;
        Ok(Value::Bin(bin).into())
    }
}

/// Maximum bin, located relative to a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFromPoint;

impl Filter for MaxFromPoint {
    fn type_name(&self) -> &'static str {
        "max_from_point"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("binning"),
            Port::optional("axis"),
            Port::required("point"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let (values, axes) = binned(inputs, "binning")?;
        // Defaults to the binning's own axis name.
        let axis_name = match inputs.string("axis")? {
            Some(name) => name.to_string(),
            None => axes.first().map(|a| a.name.clone()).unwrap_or_default(),
        };
        let found = binning::max_from_point(
            inputs.node(),
            values,
            &axes,
            &axis_name,
            inputs.required_double("point")?,
        )?;
        Ok(Value::ValuePosition(found).into())
    }
}
