//! JSON wire shape of a [`Value`].
//!
//! ```json
//! {"type": "histogram", "attrs": {"value": {"type": "array", "value": [1.0, 3.0]}, ...}}
//! ```
//!
//! Primitive kinds carry their payload in `value`; composite kinds carry
//! nested wire values in `attrs`. `name` records the identifier a value was
//! read from, when there is one.
//!
//! JSON has no representation for NaN or infinities, yet both occur
//! routinely (miss values, the gradient sentinel). Non-finite doubles are
//! written as the strings `"nan"`, `"inf"` and `"-inf"`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::axis::{Axis, AxisLiteral, AxisSpec};
use crate::error::WireError;
use crate::value::{
    Aabb, Association, Bin, BinReduction, Binning, DType, ElementInfo, Histogram, Kind, Lineout,
    NumericArray, Value, ValuePosition,
};

/// Serialized form of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireValue {
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub value: Json,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, WireValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl WireValue {
    fn primitive(kind: Kind, value: Json) -> Self {
        Self {
            kind,
            value,
            attrs: IndexMap::new(),
            name: None,
        }
    }

    fn composite(kind: Kind, attrs: IndexMap<String, WireValue>) -> Self {
        Self {
            kind,
            value: Json::Null,
            attrs,
            name: None,
        }
    }

    /// Attaches the originating identifier.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Decodes back into a [`Value`].
    pub fn to_value(&self) -> Result<Value, WireError> {
        Value::try_from(self)
    }

    fn attr(&self, kind: &'static str, attr: &'static str) -> Result<&WireValue, WireError> {
        self.attrs
            .get(attr)
            .ok_or(WireError::MissingAttr { kind, attr })
    }

    fn attr_f64(&self, kind: &'static str, attr: &'static str) -> Result<f64, WireError> {
        decode_f64(&self.attr(kind, attr)?.value)
            .ok_or_else(|| WireError::payload(kind, format!("attribute '{attr}' is not a number")))
    }

    fn attr_str(&self, kind: &'static str, attr: &'static str) -> Result<&str, WireError> {
        self.attr(kind, attr)?
            .value
            .as_str()
            .ok_or_else(|| WireError::payload(kind, format!("attribute '{attr}' is not a string")))
    }

    fn attr_array(&self, kind: &'static str, attr: &'static str) -> Result<Vec<f64>, WireError> {
        decode_array(kind, &self.attr(kind, attr)?.value).map(|a| a.data)
    }

    fn attr_vector(&self, kind: &'static str, attr: &'static str) -> Result<[f64; 3], WireError> {
        decode_vector(kind, &self.attr(kind, attr)?.value)
    }
}

/// Encodes a double, mapping non-finite values to strings.
pub fn encode_f64(v: f64) -> Json {
    if v.is_nan() {
        Json::from("nan")
    } else if v.is_infinite() {
        Json::from(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        Json::from(v)
    }
}

/// Decodes a number or one of the non-finite spellings.
pub fn decode_f64(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "nan" => Some(f64::NAN),
            "inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn encode_array(array: &NumericArray) -> Json {
    let items = array
        .data
        .iter()
        .map(|v| {
            if array.dtype.is_integer() {
                Json::from(*v as i64)
            } else {
                encode_f64(*v)
            }
        })
        .collect();
    Json::Array(items)
}

/// Arrays made only of JSON integers decode as int64, anything else as float64.
fn decode_array(kind: &'static str, json: &Json) -> Result<NumericArray, WireError> {
    let items = json
        .as_array()
        .ok_or_else(|| WireError::payload(kind, "expected a JSON array"))?;
    let all_ints = !items.is_empty() && items.iter().all(|item| item.is_i64() || item.is_u64());
    let data = items
        .iter()
        .map(|item| {
            decode_f64(item).ok_or_else(|| WireError::payload(kind, "non-numeric array element"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let dtype = if all_ints {
        DType::Int64
    } else {
        DType::Float64
    };
    Ok(NumericArray { dtype, data })
}

fn encode_vector(v: &[f64; 3]) -> Json {
    Json::Array(v.iter().map(|c| encode_f64(*c)).collect())
}

fn decode_vector(kind: &'static str, json: &Json) -> Result<[f64; 3], WireError> {
    let array = decode_array(kind, json)?;
    match array.data.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        other => Err(WireError::payload(
            kind,
            format!("vector needs 3 components, got {}", other.len()),
        )),
    }
}

fn encode_axes(axes: impl Iterator<Item = AxisSpec>) -> Json {
    let literals: Vec<Json> = axes
        .map(|spec| serde_json::to_value(AxisLiteral::from(&spec)).unwrap_or(Json::Null))
        .collect();
    Json::Array(literals)
}

fn decode_axes(kind: &'static str, json: &Json) -> Result<Vec<AxisSpec>, WireError> {
    let literals: Vec<AxisLiteral> = serde_json::from_value(json.clone())
        .map_err(|e| WireError::payload(kind, format!("bad axis literal: {e}")))?;
    literals
        .into_iter()
        .map(|lit| AxisSpec::try_from(lit).map_err(WireError::from))
        .collect()
}

fn double(v: f64) -> WireValue {
    WireValue::primitive(Kind::Double, encode_f64(v))
}

fn int(v: i64) -> WireValue {
    WireValue::primitive(Kind::Int, Json::from(v))
}

fn string(s: &str) -> WireValue {
    WireValue::primitive(Kind::String, Json::from(s))
}

fn array(values: &[f64]) -> WireValue {
    WireValue::primitive(Kind::Array, encode_array(&NumericArray::float64(values.to_vec())))
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        let mut attrs = IndexMap::new();
        match value {
            Value::Bool(b) => return WireValue::primitive(Kind::Bool, Json::from(*b)),
            Value::Int(i) => return int(*i),
            Value::Double(d) => return double(*d),
            Value::String(s) => return string(s),
            Value::Vector(v) => return WireValue::primitive(Kind::Vector, encode_vector(v)),
            Value::Array(a) => return WireValue::primitive(Kind::Array, encode_array(a)),
            Value::Topology(name) => return WireValue::primitive(Kind::Topology, Json::from(name.as_str())),
            Value::AxisList(axes) => {
                return WireValue::primitive(Kind::AxisList, encode_axes(axes.iter().cloned()));
            }
            Value::Null => return WireValue::primitive(Kind::Null, Json::Null),
            Value::Field { name, component } => {
                if let Some(c) = component {
                    attrs.insert("component".to_string(), string(c));
                }
                let mut wire = WireValue::composite(Kind::Field, attrs);
                wire.value = Json::from(name.as_str());
                return wire;
            }
            Value::Histogram(h) => {
                attrs.insert("value".into(), array(&h.values));
                attrs.insert("min_val".into(), double(h.min_val));
                attrs.insert("max_val".into(), double(h.max_val));
                attrs.insert("num_bins".into(), int(h.num_bins() as i64));
                attrs.insert(
                    "clamp".into(),
                    WireValue::primitive(Kind::Bool, Json::from(h.clamp)),
                );
            }
            Value::Binning(b) => {
                attrs.insert("value".into(), array(&b.values));
                attrs.insert("association".into(), string(b.association.as_str()));
                attrs.insert("reduction_var".into(), string(&b.reduction_var));
                attrs.insert("reduction_op".into(), string(b.reduction_op.as_str()));
                attrs.insert(
                    "bin_axes".into(),
                    WireValue::primitive(
                        Kind::AxisList,
                        encode_axes(b.axes.iter().map(AxisSpec::from)),
                    ),
                );
            }
            Value::Bin(bin) => {
                attrs.insert("value".into(), double(bin.value));
                attrs.insert("min".into(), double(bin.min));
                attrs.insert("max".into(), double(bin.max));
                attrs.insert("center".into(), double(bin.center));
                if let Some(index) = bin.index {
                    attrs.insert("index".into(), int(index as i64));
                }
            }
            Value::Aabb(aabb) => {
                attrs.insert(
                    "min".into(),
                    WireValue::primitive(Kind::Vector, encode_vector(&aabb.min)),
                );
                attrs.insert(
                    "max".into(),
                    WireValue::primitive(Kind::Vector, encode_vector(&aabb.max)),
                );
            }
            Value::ValuePosition(vp) => {
                attrs.insert("value".into(), double(vp.value));
                attrs.insert(
                    "position".into(),
                    WireValue::primitive(Kind::Vector, encode_vector(&vp.position)),
                );
                if let Some(el) = &vp.element {
                    attrs.insert("rank".into(), int(el.rank));
                    attrs.insert("domain_index".into(), int(el.domain_index));
                    attrs.insert("index".into(), int(el.index));
                    attrs.insert("assoc".into(), string(el.assoc.as_str()));
                }
            }
            Value::Lineout(l) => {
                attrs.insert("empty_value".into(), double(l.empty_value));
                attrs.insert("samples".into(), int(l.coordinates.len() as i64));
                for (var, samples) in &l.vars {
                    attrs.insert(var.clone(), array(samples));
                }
                let mut wire = WireValue::composite(Kind::Lineout, attrs);
                wire.value = Json::Array(l.coordinates.iter().map(encode_vector).collect());
                return wire;
            }
        }
        WireValue::composite(value.kind(), attrs)
    }
}

impl TryFrom<&WireValue> for Value {
    type Error = WireError;

    fn try_from(wire: &WireValue) -> Result<Self, WireError> {
        let kind = wire.kind.as_str();
        let bad = |reason: &str| WireError::payload(kind, reason);
        let value = match wire.kind {
            Kind::Bool => Value::Bool(wire.value.as_bool().ok_or_else(|| bad("expected a bool"))?),
            Kind::Int => Value::Int(wire.value.as_i64().ok_or_else(|| bad("expected an integer"))?),
            Kind::Double => {
                Value::Double(decode_f64(&wire.value).ok_or_else(|| bad("expected a number"))?)
            }
            Kind::String => Value::String(
                wire.value
                    .as_str()
                    .ok_or_else(|| bad("expected a string"))?
                    .to_string(),
            ),
            Kind::Vector => Value::Vector(decode_vector(kind, &wire.value)?),
            Kind::Array => Value::Array(decode_array(kind, &wire.value)?),
            Kind::Field => Value::Field {
                name: wire
                    .value
                    .as_str()
                    .ok_or_else(|| bad("expected a field name"))?
                    .to_string(),
                component: match wire.attrs.get("component") {
                    Some(c) => Some(
                        c.value
                            .as_str()
                            .ok_or_else(|| bad("component is not a string"))?
                            .to_string(),
                    ),
                    None => None,
                },
            },
            Kind::Topology => Value::Topology(
                wire.value
                    .as_str()
                    .ok_or_else(|| bad("expected a topology name"))?
                    .to_string(),
            ),
            Kind::Histogram => {
                let values = wire.attr_array(kind, "value")?;
                let clamp = wire
                    .attrs
                    .get("clamp")
                    .and_then(|c| c.value.as_bool())
                    .unwrap_or(true);
                Value::Histogram(Histogram {
                    values,
                    min_val: wire.attr_f64(kind, "min_val")?,
                    max_val: wire.attr_f64(kind, "max_val")?,
                    clamp,
                })
            }
            Kind::Binning => {
                let association = Association::parse(wire.attr_str(kind, "association")?)
                    .ok_or_else(|| bad("unknown association"))?;
                let reduction_op = BinReduction::parse(wire.attr_str(kind, "reduction_op")?)
                    .ok_or_else(|| bad("unknown reduction_op"))?;
                let axes = decode_axes(kind, &wire.attr(kind, "bin_axes")?.value)?
                    .iter()
                    .map(|spec| spec.resolve(0, None))
                    .collect::<Result<Vec<Axis>, _>>()?;
                Value::Binning(Binning {
                    values: wire.attr_array(kind, "value")?,
                    association,
                    reduction_var: wire.attr_str(kind, "reduction_var")?.to_string(),
                    reduction_op,
                    axes,
                })
            }
            Kind::Bin => Value::Bin(Bin {
                index: wire
                    .attrs
                    .get("index")
                    .and_then(|i| i.value.as_u64())
                    .map(|i| i as usize),
                value: wire.attr_f64(kind, "value")?,
                min: wire.attr_f64(kind, "min")?,
                max: wire.attr_f64(kind, "max")?,
                center: wire.attr_f64(kind, "center")?,
            }),
            Kind::AxisList => Value::AxisList(decode_axes(kind, &wire.value)?),
            Kind::Aabb => Value::Aabb(Aabb {
                min: wire.attr_vector(kind, "min")?,
                max: wire.attr_vector(kind, "max")?,
            }),
            Kind::ValuePosition => {
                let element = match (
                    wire.attrs.get("rank").and_then(|v| v.value.as_i64()),
                    wire.attrs.get("domain_index").and_then(|v| v.value.as_i64()),
                    wire.attrs.get("index").and_then(|v| v.value.as_i64()),
                ) {
                    (Some(rank), Some(domain_index), Some(index)) => Some(ElementInfo {
                        rank,
                        domain_index,
                        index,
                        assoc: wire
                            .attr_str(kind, "assoc")
                            .ok()
                            .and_then(Association::parse)
                            .unwrap_or(Association::Point),
                    }),
                    _ => None,
                };
                Value::ValuePosition(ValuePosition {
                    value: wire.attr_f64(kind, "value")?,
                    position: wire.attr_vector(kind, "position")?,
                    element,
                })
            }
            Kind::Lineout => {
                let coordinates = wire
                    .value
                    .as_array()
                    .ok_or_else(|| bad("expected a list of coordinates"))?
                    .iter()
                    .map(|c| decode_vector(kind, c))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut vars = IndexMap::new();
                for (name, attr) in &wire.attrs {
                    if name != "empty_value" && name != "samples" {
                        vars.insert(name.clone(), decode_array(kind, &attr.value)?.data);
                    }
                }
                Value::Lineout(Lineout {
                    empty_value: wire.attr_f64(kind, "empty_value")?,
                    coordinates,
                    vars,
                })
            }
            Kind::Null => Value::Null,
        };
        Ok(value)
    }
}
