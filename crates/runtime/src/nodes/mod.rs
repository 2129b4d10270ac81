//! Evaluation node implementations and the type-name factory.
//!
//! # Node Types
//!
//! | Group | Type names |
//! |-------|------------|
//! | Literals | `bool`, `int`, `double`, `string`, `nan`, `null`, `literal` |
//! | Access | `identifier`, `dot`, `if` |
//! | Operators | `binary_op` |
//! | Scalar math | `min`, `max`, `abs`, `exp`, `log`, `pow` |
//! | Vectors | `vector`, `magnitude` |
//! | Arrays | `array_access`, `array_replace`, `array_min`, `array_max`, `array_avg`, `array_sum` |
//! | History | `history`, `history_range`, `history_gradient`, `history_range_gradient` |
//! | Histograms | `histogram`, `pdf`, `cdf`, `entropy`, `quantile` |
//! | Mesh | `cycle`, `time`, `field`, `topology`, `bounds`, `lineout`, `field_min`, `field_max`, `field_avg`, `field_sum`, `field_nan_count`, `field_inf_count` |
//! | Binning | `binning`, `axis`, `axis_list`, `bin_by_index`, `bin_by_value`, `point_and_axis`, `max_from_point` |
//!
//! Static parameters (a literal's value, an identifier's name, an
//! operator string) are passed to [`build`]; everything else arrives through
//! input ports.

mod access;
mod binary;
mod binning;
mod histogram;
mod history;
mod literal;
mod math;
mod mesh;

pub use access::{DotAccess, IdentifierNode, IfElse};
pub use binary::{BinaryOp, BinaryOperator, apply_binary};
pub use binning::{AxisListNode, AxisNode, BinByIndex, BinByValue, BinningNode, MaxFromPoint, PointAndAxis};
pub use histogram::{HistogramNode, HistogramTransform, QuantileNode, Transform};
pub use history::{HistoryGradientNode, HistoryNode, HistoryRangeGradientNode, HistoryRangeNode};
pub use literal::{Literal, LiteralType};
pub use math::{ArrayAccess, ArrayReduction, ArrayReplace, Magnitude, ScalarFn, ScalarFunction, VectorNode};
pub use mesh::{Bounds, CycleNode, FieldNode, FieldReductionNode, LineoutNode, TimeNode, TopologyNode};

use cadence_foundation::{BinReduction, Value};
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::mesh::FieldStat;

/// Static parameters of a node, keyed by name.
pub type Params = IndexMap<String, Value>;

fn param<'a>(type_name: &str, params: &'a Params, key: &str) -> Result<&'a Value> {
    params
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::validation(type_name, format!("missing required parameter '{key}'")))
}

fn string_param(type_name: &str, params: &Params, key: &str) -> Result<String> {
    let value = param(type_name, params, key)?;
    value.as_str().map(str::to_string).ok_or_else(|| {
        Error::validation(
            type_name,
            format!("parameter '{key}' must be a string, got {}", value.kind()),
        )
    })
}

/// Constructs the filter registered under `type_name`.
pub fn build(type_name: &str, params: &Params) -> Result<Box<dyn Filter>> {
    let filter: Box<dyn Filter> = match type_name {
        "bool" => Box::new(Literal::typed(LiteralType::Bool, param(type_name, params, "value")?.clone())),
        "int" => Box::new(Literal::typed(LiteralType::Int, param(type_name, params, "value")?.clone())),
        "double" => {
            let value = match param(type_name, params, "value")? {
                Value::Int(i) => Value::Double(*i as f64),
                other => other.clone(),
            };
            Box::new(Literal::typed(LiteralType::Double, value))
        }
        "string" => Box::new(Literal::typed(LiteralType::String, param(type_name, params, "value")?.clone())),
        "nan" => Box::new(Literal::typed(LiteralType::Nan, Value::Double(f64::NAN))),
        "null" => Box::new(Literal::typed(LiteralType::Null, Value::Null)),
        "literal" => Box::new(Literal::new(params.get("value").cloned().unwrap_or_default())),

        "identifier" => Box::new(IdentifierNode::new(string_param(type_name, params, "name")?)),
        "dot" => Box::new(DotAccess::new(string_param(type_name, params, "name")?)),
        "if" => Box::new(IfElse),
        "binary_op" => {
            let op = string_param(type_name, params, "op_string")?;
            Box::new(BinaryOperator::new(BinaryOp::parse(type_name, &op)?))
        }

        "min" => Box::new(ScalarFunction::new(ScalarFn::Min)),
        "max" => Box::new(ScalarFunction::new(ScalarFn::Max)),
        "abs" => Box::new(ScalarFunction::new(ScalarFn::Abs)),
        "exp" => Box::new(ScalarFunction::new(ScalarFn::Exp)),
        "log" => Box::new(ScalarFunction::new(ScalarFn::Log)),
        "pow" => Box::new(ScalarFunction::new(ScalarFn::Pow)),
        "vector" => Box::new(VectorNode),
        "magnitude" => Box::new(Magnitude),
        "array_access" => Box::new(ArrayAccess),
        "array_replace" => Box::new(ArrayReplace),
        "array_min" => Box::new(ArrayReduction::new(BinReduction::Min)),
        "array_max" => Box::new(ArrayReduction::new(BinReduction::Max)),
        "array_avg" => Box::new(ArrayReduction::new(BinReduction::Avg)),
        "array_sum" => Box::new(ArrayReduction::new(BinReduction::Sum)),

        "history" => Box::new(HistoryNode),
        "history_range" => Box::new(HistoryRangeNode),
        "history_gradient" => Box::new(HistoryGradientNode),
        "history_range_gradient" => Box::new(HistoryRangeGradientNode),

        "histogram" => Box::new(HistogramNode),
        "pdf" => Box::new(HistogramTransform::new(Transform::Pdf)),
        "cdf" => Box::new(HistogramTransform::new(Transform::Cdf)),
        "entropy" => Box::new(HistogramTransform::new(Transform::Entropy)),
        "quantile" => Box::new(QuantileNode),

        "cycle" => Box::new(CycleNode),
        "time" => Box::new(TimeNode),
        "field" => Box::new(FieldNode),
        "topology" => Box::new(TopologyNode),
        "bounds" => Box::new(Bounds),
        "lineout" => Box::new(LineoutNode),
        "field_min" => Box::new(FieldReductionNode::new(FieldStat::Min)),
        "field_max" => Box::new(FieldReductionNode::new(FieldStat::Max)),
        "field_avg" => Box::new(FieldReductionNode::new(FieldStat::Avg)),
        "field_sum" => Box::new(FieldReductionNode::new(FieldStat::Sum)),
        "field_nan_count" => Box::new(FieldReductionNode::new(FieldStat::NanCount)),
        "field_inf_count" => Box::new(FieldReductionNode::new(FieldStat::InfCount)),

        "binning" => Box::new(BinningNode),
        "axis" => Box::new(AxisNode),
        "axis_list" => {
            let arity = match param(type_name, params, "arity")? {
                Value::Int(n) if *n >= 1 => *n as usize,
                other => {
                    return Err(Error::validation(
                        type_name,
                        format!("parameter 'arity' must be a positive int, got {other}"),
                    ));
                }
            };
            Box::new(AxisListNode::new(arity))
        }
        "bin_by_index" => Box::new(BinByIndex),
        "bin_by_value" => Box::new(BinByValue),
        "point_and_axis" => Box::new(PointAndAxis),
        "max_from_point" => Box::new(MaxFromPoint),

        other => return Err(Error::UnknownNodeType(other.to_string())),
    };
    Ok(filter)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_knows_every_type() {
        let mut params = Params::new();
        params.insert("value".into(), Value::Int(1));
        params.insert("name".into(), Value::from("t"));
        params.insert("op_string".into(), Value::from("+"));
        params.insert("arity".into(), Value::Int(2));
        for type_name in [
            "int", "double", "nan", "null", "literal", "identifier", "dot", "if", "binary_op",
            "min", "max", "abs", "exp", "log", "pow", "vector", "magnitude", "array_access",
            "array_replace", "array_min", "array_max", "array_avg", "array_sum", "history",
            "history_range", "history_gradient", "history_range_gradient", "histogram", "pdf",
            "cdf", "entropy", "quantile", "cycle", "time", "field", "topology", "bounds",
            "lineout", "field_min", "field_max", "field_avg", "field_sum", "field_nan_count",
            "field_inf_count", "binning", "axis", "axis_list", "bin_by_index", "bin_by_value",
            "point_and_axis", "max_from_point",
        ] {
            let filter = build(type_name, &params).expect(type_name);
            assert!(!filter.type_name().is_empty());
        }
    }

    #[test]
    fn factory_rejects_unknown_and_incomplete() {
        assert!(matches!(
            build("teleport", &Params::new()),
            Err(Error::UnknownNodeType(_))
        ));
        assert!(matches!(
            build("identifier", &Params::new()),
            Err(Error::Validation { .. })
        ));
        let mut params = Params::new();
        params.insert("op_string".into(), Value::from("**"));
        assert!(build("binary_op", &params).is_err());
    }
}
