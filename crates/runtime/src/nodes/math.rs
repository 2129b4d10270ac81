//! Scalar functions, vectors and array helpers.

use cadence_foundation::{BinReduction, DType, NumericArray, Value};

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};
use crate::reductions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFn {
    Min,
    Max,
    Abs,
    Exp,
    Log,
    Pow,
}

impl ScalarFn {
    fn arity(&self) -> usize {
        match self {
            ScalarFn::Min | ScalarFn::Max | ScalarFn::Pow => 2,
            ScalarFn::Abs | ScalarFn::Exp | ScalarFn::Log => 1,
        }
    }
}

/// `min`, `max` and `abs` keep ints as ints; the rest compute in double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarFunction {
    f: ScalarFn,
}

impl ScalarFunction {
    pub fn new(f: ScalarFn) -> Self {
        Self { f }
    }
}

impl Filter for ScalarFunction {
    fn type_name(&self) -> &'static str {
        match self.f {
            ScalarFn::Min => "min",
            ScalarFn::Max => "max",
            ScalarFn::Abs => "abs",
            ScalarFn::Exp => "exp",
            ScalarFn::Log => "log",
            ScalarFn::Pow => "pow",
        }
    }

    fn ports(&self) -> Vec<Port> {
        ["arg1", "arg2"]
            .into_iter()
            .take(self.f.arity())
            .map(Port::required)
            .collect()
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let arg1 = inputs.required("arg1")?;
        let value = match self.f {
            ScalarFn::Min | ScalarFn::Max => {
                let arg2 = inputs.required("arg2")?;
                match (arg1, arg2) {
                    (Value::Int(a), Value::Int(b)) => {
                        Value::Int(if self.f == ScalarFn::Min { *a.min(b) } else { *a.max(b) })
                    }
                    _ => {
                        let a = inputs.required_double("arg1")?;
                        let b = inputs.required_double("arg2")?;
                        Value::Double(if self.f == ScalarFn::Min { a.min(b) } else { a.max(b) })
                    }
                }
            }
            ScalarFn::Abs => match arg1 {
                Value::Int(i) => Value::Int(i.checked_abs().ok_or_else(|| {
                    Error::invalid_argument(inputs.node(), format!("abs({i}) overflows"))
                })?),
                _ => Value::Double(inputs.required_double("arg1")?.abs()),
            },
            ScalarFn::Exp => Value::Double(inputs.required_double("arg1")?.exp()),
            ScalarFn::Log => Value::Double(inputs.required_double("arg1")?.ln()),
            ScalarFn::Pow => Value::Double(
                inputs
                    .required_double("arg1")?
                    .powf(inputs.required_double("arg2")?),
            ),
        };
        Ok(value.into())
    }
}

/// Builds a vector from three numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorNode;

impl Filter for VectorNode {
    fn type_name(&self) -> &'static str {
        "vector"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("arg1"),
            Port::required("arg2"),
            Port::required("arg3"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        Ok(Value::Vector([
            inputs.required_double("arg1")?,
            inputs.required_double("arg2")?,
            inputs.required_double("arg3")?,
        ])
        .into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Magnitude;

impl Filter for Magnitude {
    fn type_name(&self) -> &'static str {
        "magnitude"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("arg1")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let arg = inputs.required("arg1")?;
        let [x, y, z] = arg
            .as_vector()
            .ok_or_else(|| inputs.mismatch("arg1", "vector", arg))?;
        Ok(Value::Double((x * x + y * y + z * z).sqrt()).into())
    }
}

fn array_input<'a>(inputs: &Inputs<'a>, port: &str) -> Result<&'a NumericArray> {
    let value = inputs.required(port)?;
    value
        .as_array()
        .ok_or_else(|| inputs.mismatch(port, "array", value))
}

/// `array[index]`, keeping the element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayAccess;

impl Filter for ArrayAccess {
    fn type_name(&self) -> &'static str {
        "array_access"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("array"), Port::required("index")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let array = array_input(inputs, "array")?;
        let index = inputs.required_int("index")?;
        let out_of_range = || Error::IndexOutOfRange {
            node: inputs.node().to_string(),
            index,
            len: array.len(),
        };
        if index < 0 {
            return Err(out_of_range());
        }
        array
            .element(index as usize)
            .map(Output::from)
            .ok_or_else(out_of_range)
    }
}

/// Replaces every element equal to `find` with `replace`; a NaN `find`
/// matches NaN elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayReplace;

impl Filter for ArrayReplace {
    fn type_name(&self) -> &'static str {
        "array_replace"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("arg1"),
            Port::required("find"),
            Port::required("replace"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let array = array_input(inputs, "arg1")?;
        if array.dtype != DType::Float64 {
            return Err(Error::not_implemented(
                inputs.node(),
                format!("array_replace supports float64 arrays only, got {:?}", array.dtype),
            ));
        }
        let find = inputs.required_double("find")?;
        let replace = inputs.required_double("replace")?;
        let matches = |v: f64| if find.is_nan() { v.is_nan() } else { v == find };
        let data = array
            .values()
            .iter()
            .map(|&v| if matches(v) { replace } else { v })
            .collect();
        Ok(Value::Array(NumericArray::float64(data)).into())
    }
}

/// `array_min/max/avg/sum`, always returning a double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayReduction {
    op: BinReduction,
}

impl ArrayReduction {
    pub fn new(op: BinReduction) -> Self {
        Self { op }
    }
}

impl Filter for ArrayReduction {
    fn type_name(&self) -> &'static str {
        match self.op {
            BinReduction::Min => "array_min",
            BinReduction::Max => "array_max",
            BinReduction::Avg => "array_avg",
            _ => "array_sum",
        }
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("arg1")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let values = array_input(inputs, "arg1")?.values();
        let result = match self.op {
            BinReduction::Min => reductions::min(values),
            BinReduction::Max => reductions::max(values),
            BinReduction::Avg => reductions::mean(values),
            _ => reductions::sum(values),
        };
        Ok(Value::Double(result).into())
    }
}
