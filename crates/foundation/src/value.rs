//! Typed values flowing between evaluation nodes.
//!
//! Every node produces exactly one [`Value`]. Primitive kinds carry a scalar
//! or array payload; composite kinds carry structured data and expose it as a
//! synthetic attribute table via [`Value::attrs`], which is what attribute
//! access (`x.y`) resolves against.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::axis::{Axis, AxisSpec};

/// Kind tag of a [`Value`], as it appears in the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Bool,
    Int,
    Double,
    String,
    Vector,
    Array,
    Field,
    Topology,
    Histogram,
    Binning,
    Bin,
    AxisList,
    Aabb,
    ValuePosition,
    Lineout,
    Null,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Vector => "vector",
            Kind::Array => "array",
            Kind::Field => "field",
            Kind::Topology => "topology",
            Kind::Histogram => "histogram",
            Kind::Binning => "binning",
            Kind::Bin => "bin",
            Kind::AxisList => "axis_list",
            Kind::Aabb => "aabb",
            Kind::ValuePosition => "value_position",
            Kind::Lineout => "lineout",
            Kind::Null => "null",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element type of a numeric array at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    pub fn is_integer(&self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }
}

/// Homogeneous numeric sequence.
///
/// Payloads are normalized to `f64`; the element type is kept so integer
/// arrays survive persistence and so operations restricted to doubles can
/// reject other arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub dtype: DType,
    pub data: Vec<f64>,
}

impl NumericArray {
    pub fn float64(data: Vec<f64>) -> Self {
        Self {
            dtype: DType::Float64,
            data,
        }
    }

    pub fn int64(data: impl IntoIterator<Item = i64>) -> Self {
        Self {
            dtype: DType::Int64,
            data: data.into_iter().map(|v| v as f64).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Element `index` as a value of the array's own kind.
    pub fn element(&self, index: usize) -> Option<Value> {
        let v = *self.data.get(index)?;
        Some(if self.dtype.is_integer() {
            Value::Int(v as i64)
        } else {
            Value::Double(v)
        })
    }
}

/// Mesh association of binned or reduced data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Association {
    Point,
    Cell,
}

impl Association {
    pub fn as_str(&self) -> &'static str {
        match self {
            Association::Point => "point",
            Association::Cell => "cell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "point" | "vertex" => Some(Association::Point),
            "cell" | "element" => Some(Association::Cell),
            _ => None,
        }
    }
}

/// Aggregation applied to the samples falling in a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinReduction {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    Pdf,
    Std,
    Var,
    Rms,
}

impl BinReduction {
    pub const ALL: [BinReduction; 9] = [
        BinReduction::Sum,
        BinReduction::Min,
        BinReduction::Max,
        BinReduction::Avg,
        BinReduction::Count,
        BinReduction::Pdf,
        BinReduction::Std,
        BinReduction::Var,
        BinReduction::Rms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinReduction::Sum => "sum",
            BinReduction::Min => "min",
            BinReduction::Max => "max",
            BinReduction::Avg => "avg",
            BinReduction::Count => "count",
            BinReduction::Pdf => "pdf",
            BinReduction::Std => "std",
            BinReduction::Var => "var",
            BinReduction::Rms => "rms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Count-like reductions need no reduction variable.
    pub fn is_count_like(&self) -> bool {
        matches!(self, BinReduction::Count | BinReduction::Pdf)
    }
}

/// Uniform histogram of a scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Per-bin counts, or probabilities after `pdf`/`cdf`.
    pub values: Vec<f64>,
    pub min_val: f64,
    pub max_val: f64,
    pub clamp: bool,
}

impl Histogram {
    pub fn num_bins(&self) -> usize {
        self.values.len()
    }

    /// The histogram's bin layout as an axis named `name`.
    pub fn axis(&self, name: &str) -> Axis {
        Axis {
            name: name.to_string(),
            clamp: self.clamp,
            bins: crate::axis::AxisBins::Uniform {
                min_val: self.min_val,
                max_val: self.max_val,
                num_bins: self.values.len(),
            },
        }
    }
}

/// Result of a reduction binning.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    /// Flattened bins, first axis varying fastest.
    pub values: Vec<f64>,
    pub association: Association,
    /// Empty for count-like reductions.
    pub reduction_var: String,
    pub reduction_op: BinReduction,
    pub axes: Vec<Axis>,
}

/// A single bin picked out of a binning or histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Flat index; `None` when a search found no qualifying bin.
    pub index: Option<usize>,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub center: f64,
}

/// Where a field reduction found its value.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub rank: i64,
    pub domain_index: i64,
    pub index: i64,
    pub assoc: Association,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuePosition {
    pub value: f64,
    pub position: [f64; 3],
    pub element: Option<ElementInfo>,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// Fields sampled along a line segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineout {
    pub empty_value: f64,
    pub coordinates: Vec<[f64; 3]>,
    pub vars: IndexMap<String, Vec<f64>>,
}

/// Result container for every evaluation node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Vector([f64; 3]),
    Array(NumericArray),
    Field {
        name: String,
        component: Option<String>,
    },
    Topology(String),
    Histogram(Histogram),
    Binning(Binning),
    Bin(Bin),
    AxisList(Vec<AxisSpec>),
    Aabb(Aabb),
    ValuePosition(ValuePosition),
    Lineout(Lineout),
    /// The empty value: an absent optional input or an empty result.
    #[default]
    Null,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Vector(_) => Kind::Vector,
            Value::Array(_) => Kind::Array,
            Value::Field { .. } => Kind::Field,
            Value::Topology(_) => Kind::Topology,
            Value::Histogram(_) => Kind::Histogram,
            Value::Binning(_) => Kind::Binning,
            Value::Bin(_) => Kind::Bin,
            Value::AxisList(_) => Kind::AxisList,
            Value::Aabb(_) => Kind::Aabb,
            Value::ValuePosition(_) => Kind::ValuePosition,
            Value::Lineout(_) => Kind::Lineout,
            Value::Null => Kind::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Int or double as `f64`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Coercion used by comparisons: bools count as 0 and 1.
    pub fn as_comparable(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_double(),
        }
    }

    /// The scalar a history entry contributes to a numeric window.
    ///
    /// Reductions that carry a location (`value_position`, `bin`) contribute
    /// their `value` attribute.
    pub fn scalar_payload(&self) -> Option<f64> {
        match self {
            Value::ValuePosition(vp) => Some(vp.value),
            Value::Bin(bin) => Some(bin.value),
            other => other.as_double(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NumericArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Synthetic attribute table, `None` for kinds without attributes.
    pub fn attrs(&self) -> Option<IndexMap<String, Value>> {
        let mut attrs = IndexMap::new();
        let mut put = |name: &str, value: Value| {
            attrs.insert(name.to_string(), value);
        };
        match self {
            Value::Vector([x, y, z]) => {
                put("x", Value::Double(*x));
                put("y", Value::Double(*y));
                put("z", Value::Double(*z));
            }
            Value::Field { name, component } => {
                put("name", Value::String(name.clone()));
                if let Some(c) = component {
                    put("component", Value::String(c.clone()));
                }
            }
            Value::Histogram(h) => {
                put("value", Value::Array(NumericArray::float64(h.values.clone())));
                put("min_val", Value::Double(h.min_val));
                put("max_val", Value::Double(h.max_val));
                put("num_bins", Value::Int(h.num_bins() as i64));
                put("clamp", Value::Bool(h.clamp));
            }
            Value::Binning(b) => {
                put("value", Value::Array(NumericArray::float64(b.values.clone())));
                put("association", Value::String(b.association.as_str().into()));
                put("reduction_var", Value::String(b.reduction_var.clone()));
                put("reduction_op", Value::String(b.reduction_op.as_str().into()));
                put(
                    "bin_axes",
                    Value::AxisList(b.axes.iter().map(AxisSpec::from).collect()),
                );
            }
            Value::Bin(bin) => {
                put("value", Value::Double(bin.value));
                put("min", Value::Double(bin.min));
                put("max", Value::Double(bin.max));
                put("center", Value::Double(bin.center));
                if let Some(index) = bin.index {
                    put("index", Value::Int(index as i64));
                }
            }
            Value::Aabb(aabb) => {
                put("min", Value::Vector(aabb.min));
                put("max", Value::Vector(aabb.max));
            }
            Value::ValuePosition(vp) => {
                put("value", Value::Double(vp.value));
                put("position", Value::Vector(vp.position));
                if let Some(el) = &vp.element {
                    put("rank", Value::Int(el.rank));
                    put("domain_index", Value::Int(el.domain_index));
                    put("index", Value::Int(el.index));
                    put("assoc", Value::String(el.assoc.as_str().into()));
                }
            }
            Value::Lineout(l) => {
                put("empty_value", Value::Double(l.empty_value));
                put("samples", Value::Int(l.coordinates.len() as i64));
                for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
                    let coords = l.coordinates.iter().map(|c| c[axis]).collect();
                    put(name, Value::Array(NumericArray::float64(coords)));
                }
                for (var, samples) in &l.vars {
                    if !attrs_contains_fixed_lineout_name(var) {
                        put(var, Value::Array(NumericArray::float64(samples.clone())));
                    }
                }
            }
            _ => return None,
        }
        Some(attrs)
    }

    /// Single attribute lookup.
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.attrs()?.shift_remove(name)
    }
}

fn attrs_contains_fixed_lineout_name(name: &str) -> bool {
    matches!(name, "empty_value" | "samples" | "x" | "y" | "z")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Vector(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Vector([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Value::Array(a) => write!(f, "{:?}", a.data),
            Value::Field { name, component } => match component {
                Some(c) => write!(f, "field({name}, {c})"),
                None => write!(f, "field({name})"),
            },
            Value::Topology(name) => write!(f, "topology({name})"),
            Value::Histogram(h) => write!(
                f,
                "histogram[{} bins over {}..{}]",
                h.num_bins(),
                h.min_val,
                h.max_val
            ),
            Value::Binning(b) => write!(
                f,
                "binning[{}({}) over {} axes]",
                b.reduction_op.as_str(),
                b.reduction_var,
                b.axes.len()
            ),
            Value::Bin(bin) => write!(
                f,
                "bin[{} in {}..{}]",
                bin.value, bin.min, bin.max
            ),
            Value::AxisList(axes) => {
                let names: Vec<&str> = axes.iter().map(|a| a.name.as_str()).collect();
                write!(f, "axes[{}]", names.join(", "))
            }
            Value::Aabb(aabb) => write!(f, "aabb[{:?} .. {:?}]", aabb.min, aabb.max),
            Value::ValuePosition(vp) => write!(f, "{} at {:?}", vp.value, vp.position),
            Value::Lineout(l) => write!(f, "lineout[{} samples]", l.coordinates.len()),
            Value::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_synthesizes_xyz() {
        let v = Value::Vector([1.0, 2.0, 3.0]);
        assert_eq!(v.attr("y"), Some(Value::Double(2.0)));
        assert_eq!(v.attr("w"), None);
    }

    #[test]
    fn scalars_have_no_attrs() {
        assert!(Value::Int(3).attrs().is_none());
        assert!(Value::Null.attrs().is_none());
    }

    #[test]
    fn histogram_attrs() {
        let h = Value::Histogram(Histogram {
            values: vec![1.0, 2.0],
            min_val: 0.0,
            max_val: 4.0,
            clamp: true,
        });
        let attrs = h.attrs().expect("histogram attrs");
        let names: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(names, ["value", "min_val", "max_val", "num_bins", "clamp"]);
        assert_eq!(attrs["num_bins"], Value::Int(2));
    }

    #[test]
    fn int_array_elements_stay_int() {
        let a = NumericArray::int64([4, 5]);
        assert_eq!(a.element(1), Some(Value::Int(5)));
        assert_eq!(a.element(2), None);
        let d = NumericArray::float64(vec![0.5]);
        assert_eq!(d.element(0), Some(Value::Double(0.5)));
    }

    #[test]
    fn reduction_names_round_trip() {
        for op in BinReduction::ALL {
            assert_eq!(BinReduction::parse(op.as_str()), Some(op));
        }
        assert_eq!(BinReduction::parse("median"), None);
        assert!(BinReduction::Pdf.is_count_like());
        assert!(!BinReduction::Rms.is_count_like());
    }

    #[test]
    fn scalar_payload_reads_located_values() {
        let vp = Value::ValuePosition(ValuePosition {
            value: 7.5,
            position: [0.0; 3],
            element: None,
        });
        assert_eq!(vp.scalar_payload(), Some(7.5));
        assert_eq!(Value::Bool(true).scalar_payload(), None);
        assert_eq!(Value::Bool(true).as_comparable(), Some(1.0));
    }
}
