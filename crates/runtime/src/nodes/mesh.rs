//! Queries against the published dataset.

use cadence_foundation::{Lineout, Value, ValuePosition};

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};
use crate::mesh::{FieldStat, LineoutRequest, MeshStatistics};

/// Checks that `field` exists and that `component` fits its shape.
pub(crate) fn check_field(
    node: &str,
    mesh: &dyn MeshStatistics,
    field: &str,
    component: Option<&str>,
) -> Result<()> {
    if !mesh.has_field(field) {
        return Err(Error::UnknownField {
            node: node.to_string(),
            field: field.to_string(),
            known: mesh.field_names(),
        });
    }
    if let Some(component) = component
        && !mesh.has_component(field, component)
    {
        return Err(Error::ComponentMismatch {
            node: node.to_string(),
            message: format!(
                "field '{field}' has no component '{component}'; known components: {:?}",
                mesh.possible_components(field)
            ),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleNode;

impl Filter for CycleNode {
    fn type_name(&self) -> &'static str {
        "cycle"
    }

    fn ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn execute(&self, _inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        Ok(Value::Int(ctx.mesh.cycle() as i64).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNode;

impl Filter for TimeNode {
    fn type_name(&self) -> &'static str {
        "time"
    }

    fn ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn execute(&self, _inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let time = ctx
            .mesh
            .time()
            .ok_or_else(|| Error::Collaborator("dataset publishes no simulation time".into()))?;
        Ok(Value::Double(time).into())
    }
}

/// Reference to a published field, optionally narrowed to one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNode;

impl Filter for FieldNode {
    fn type_name(&self) -> &'static str {
        "field"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("field_name"), Port::optional("component")]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let name = inputs.required_string("field_name")?;
        let component = inputs.string("component")?.filter(|c| !c.is_empty());
        check_field(inputs.node(), ctx.mesh, name, component)?;
        Ok(Value::Field {
            name: name.to_string(),
            component: component.map(str::to_string),
        }
        .into())
    }
}

/// Reference to a topology; the name may be omitted when there is only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyNode;

impl Filter for TopologyNode {
    fn type_name(&self) -> &'static str {
        "topology"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::optional("arg1")]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let known = ctx.mesh.topology_names();
        let name = match inputs.string("arg1")? {
            Some(name) if ctx.mesh.has_topology(name) => name.to_string(),
            Some(name) => {
                return Err(Error::validation(
                    inputs.node(),
                    format!("unknown topology '{name}'; known topologies: {known:?}"),
                ));
            }
            None => match known.as_slice() {
                [only] => only.clone(),
                _ => {
                    return Err(Error::validation(
                        inputs.node(),
                        format!(
                            "the dataset has {} topologies, a name must be given: {known:?}",
                            known.len()
                        ),
                    ));
                }
            },
        };
        Ok(Value::Topology(name).into())
    }
}

/// Spatial extent of a topology or of the whole dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds;

impl Filter for Bounds {
    fn type_name(&self) -> &'static str {
        "bounds"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::optional("topology")]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let topology = match inputs.get("topology") {
            None => None,
            Some(Value::Topology(name) | Value::String(name)) => Some(name.as_str()),
            Some(other) => return Err(inputs.mismatch("topology", "topology or string", other)),
        };
        Ok(Value::Aabb(ctx.mesh.bounds(topology)?).into())
    }
}

/// Global field reduction.
///
/// `field_min` and `field_max` report where the value was found; the other
/// reductions produce a plain double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldReductionNode {
    stat: FieldStat,
}

impl FieldReductionNode {
    pub fn new(stat: FieldStat) -> Self {
        Self { stat }
    }
}

impl Filter for FieldReductionNode {
    fn type_name(&self) -> &'static str {
        match self.stat {
            FieldStat::Min => "field_min",
            FieldStat::Max => "field_max",
            FieldStat::Sum => "field_sum",
            FieldStat::Avg => "field_avg",
            FieldStat::NanCount => "field_nan_count",
            FieldStat::InfCount => "field_inf_count",
        }
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("arg1")]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let (field, component) = inputs.required_field("arg1")?;
        check_field(inputs.node(), ctx.mesh, field, component)?;
        let reduction = ctx.mesh.field_reduction(self.stat, field, component)?;
        let value = if self.stat.is_located() {
            Value::ValuePosition(ValuePosition {
                value: reduction.value,
                position: reduction.position.unwrap_or([f64::NAN; 3]),
                element: reduction.element,
            })
        } else {
            Value::Double(reduction.value)
        };
        Ok(value.into())
    }
}

/// Samples fields along a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineoutNode;

impl Filter for LineoutNode {
    fn type_name(&self) -> &'static str {
        "lineout"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("samples"),
            Port::required("start"),
            Port::required("end"),
            Port::optional("fields"),
            Port::optional("empty_val"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let node = inputs.node();
        let samples = inputs.required_int("samples")?;
        if samples < 1 {
            return Err(Error::invalid_argument(
                node,
                format!("samples must be greater than zero, got {samples}"),
            ));
        }
        let point = |port: &str| -> Result<[f64; 3]> {
            let value = inputs.required(port)?;
            value
                .as_vector()
                .ok_or_else(|| inputs.mismatch(port, "vector", value))
        };
        let (start, end) = (point("start")?, point("end")?);

        // Comma-separated names; every scalar field when absent.
        let fields: Vec<String> = match inputs.string("fields")? {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            None => ctx
                .mesh
                .field_names()
                .into_iter()
                .filter(|name| ctx.mesh.is_scalar_field(name))
                .collect(),
        };
        for field in &fields {
            check_field(node, ctx.mesh, field, None)?;
        }

        let request = LineoutRequest {
            start,
            end,
            num_samples: samples as usize,
            fields,
            empty_value: inputs.double("empty_val")?.unwrap_or(f64::NAN),
        };
        let lineout: Lineout = ctx.mesh.lineout(&request)?;
        Ok(Value::Lineout(lineout).into())
    }
}
