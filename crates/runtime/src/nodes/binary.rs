//! Binary operators.
//!
//! | Family | Operators | Operands | Result |
//! |--------|-----------|----------|--------|
//! | Math | `+ - * / %` | int, double | double if either side is double, else int |
//! | Vector math | `+ -` | two vectors | vector |
//! | Logic | `and or not` | bool | bool (`not` reads only `rhs`) |
//! | Comparison | `< <= > >= == !=` | bool, int, double | bool, compared as doubles |
//!
//! `%` is defined for ints only. Integer overflow and integer division by
//! zero are reported rather than wrapped.

use cadence_foundation::Value;

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 14] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Not,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::Eq,
        BinaryOp::Ne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Not => "not",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }

    pub fn parse(node: &str, s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(BinaryOp::as_str).collect();
                Error::validation(
                    node,
                    format!("unknown operator '{s}'; expected one of {}", known.join(" ")),
                )
            })
    }

    fn is_math(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    fn is_logic(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Not)
    }
}

/// Applies `op` to its operands. `lhs` may be absent only for `not`.
pub fn apply_binary(node: &str, op: BinaryOp, lhs: Option<&Value>, rhs: &Value) -> Result<Value> {
    let missing_lhs = || Error::MissingInput {
        node: node.to_string(),
        port: "lhs".to_string(),
    };
    if op == BinaryOp::Not {
        return rhs
            .as_bool()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| mismatch(node, "rhs", "bool", rhs));
    }
    let lhs = lhs.ok_or_else(missing_lhs)?;
    if op.is_logic() {
        let l = lhs.as_bool().ok_or_else(|| mismatch(node, "lhs", "bool", lhs))?;
        let r = rhs.as_bool().ok_or_else(|| mismatch(node, "rhs", "bool", rhs))?;
        return Ok(Value::Bool(if op == BinaryOp::And { l && r } else { l || r }));
    }
    if op.is_math() {
        return arithmetic(node, op, lhs, rhs);
    }

    let l = lhs
        .as_comparable()
        .ok_or_else(|| mismatch(node, "lhs", "bool, int or double", lhs))?;
    let r = rhs
        .as_comparable()
        .ok_or_else(|| mismatch(node, "rhs", "bool, int or double", rhs))?;
    Ok(Value::Bool(match op {
        BinaryOp::Lt => l < r,
        BinaryOp::Le => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::Ge => l >= r,
        BinaryOp::Eq => l == r,
        _ => l != r,
    }))
}

fn mismatch(node: &str, port: &str, expected: &str, found: &Value) -> Error {
    Error::TypeMismatch {
        node: node.to_string(),
        port: port.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

fn arithmetic(node: &str, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Vector(a), Value::Vector(b)) => {
            let sign = match op {
                BinaryOp::Add => 1.0,
                BinaryOp::Sub => -1.0,
                other => {
                    return Err(Error::validation(
                        node,
                        format!("vector arithmetic supports only + and -, not '{}'", other.as_str()),
                    ));
                }
            };
            Ok(Value::Vector([0, 1, 2].map(|i| a[i] + sign * b[i])))
        }
        (Value::Vector(_), _) | (_, Value::Vector(_)) => Err(Error::validation(
            node,
            format!(
                "cannot apply '{}' to a {} and a {}",
                op.as_str(),
                lhs.kind(),
                rhs.kind()
            ),
        )),
        (Value::Int(a), Value::Int(b)) => integer_math(node, op, *a, *b).map(Value::Int),
        _ => {
            let a = lhs
                .as_double()
                .ok_or_else(|| mismatch(node, "lhs", "int, double or vector", lhs))?;
            let b = rhs
                .as_double()
                .ok_or_else(|| mismatch(node, "rhs", "int, double or vector", rhs))?;
            Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => {
                    return Err(Error::validation(
                        node,
                        "'%' is only defined for int operands",
                    ));
                }
            }))
        }
    }
}

fn integer_math(node: &str, op: BinaryOp, a: i64, b: i64) -> Result<i64> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0 {
        return Err(Error::invalid_argument(node, format!("integer {} by zero", op.as_str())));
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.ok_or_else(|| {
        Error::invalid_argument(node, format!("integer overflow in {a} {} {b}", op.as_str()))
    })
}

/// Node wrapper around [`apply_binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOperator {
    op: BinaryOp,
}

impl BinaryOperator {
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }
}

impl Filter for BinaryOperator {
    fn type_name(&self) -> &'static str {
        "binary_op"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::optional("lhs"), Port::required("rhs")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let rhs = inputs.required("rhs")?;
        apply_binary(inputs.node(), self.op, inputs.get("lhs"), rhs).map(Output::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(op: &str, lhs: Value, rhs: Value) -> Result<Value> {
        let op = BinaryOp::parse("binary_op", op).expect("operator");
        apply_binary("binary_op", op, Some(&lhs), &rhs)
    }

    #[test]
    fn promotion() {
        assert_eq!(eval("+", Value::Int(1), Value::Double(1.0)).expect("add"), Value::Double(2.0));
        assert_eq!(eval("%", Value::Int(1), Value::Int(2)).expect("mod"), Value::Int(1));
        assert_eq!(eval("/", Value::Int(7), Value::Int(2)).expect("div"), Value::Int(3));
        assert!(matches!(
            eval("%", Value::Double(1.0), Value::Int(2)),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn integer_faults_are_reported() {
        assert!(matches!(
            eval("/", Value::Int(1), Value::Int(0)),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(eval("*", Value::Int(i64::MAX), Value::Int(2)).is_err());
        assert_eq!(
            eval("/", Value::Double(1.0), Value::Int(0)).expect("div"),
            Value::Double(f64::INFINITY)
        );
    }

    #[test]
    fn vector_math() {
        let a = Value::Vector([1.0, 2.0, 3.0]);
        let b = Value::Vector([0.5, 0.5, 0.5]);
        assert_eq!(
            eval("-", a.clone(), b.clone()).expect("sub"),
            Value::Vector([0.5, 1.5, 2.5])
        );
        assert!(matches!(eval("*", a.clone(), b), Err(Error::Validation { .. })));
        assert!(matches!(
            eval("+", a, Value::Double(1.0)),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn logic_and_comparison() {
        assert_eq!(eval("and", Value::Bool(true), Value::Bool(false)).expect("and"), Value::Bool(false));
        assert_eq!(eval("or", Value::Bool(true), Value::Bool(false)).expect("or"), Value::Bool(true));
        let not = apply_binary("n", BinaryOp::Not, None, &Value::Bool(true)).expect("not");
        assert_eq!(not, Value::Bool(false));
        assert!(matches!(
            eval("and", Value::Int(1), Value::Bool(true)),
            Err(Error::TypeMismatch { .. })
        ));

        assert_eq!(eval("<", Value::Int(1), Value::Double(1.5)).expect("lt"), Value::Bool(true));
        assert_eq!(eval("==", Value::Int(2), Value::Double(2.0)).expect("eq"), Value::Bool(true));
        assert_eq!(eval("!=", Value::Bool(true), Value::Int(1)).expect("ne"), Value::Bool(false));
        assert!(matches!(
            apply_binary("n", BinaryOp::Lt, None, &Value::Int(1)),
            Err(Error::MissingInput { .. })
        ));
    }

    #[test]
    fn every_operator_round_trips_its_symbol() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::parse("n", op.as_str()).expect("parse"), op);
        }
        assert!(BinaryOp::parse("n", "^").is_err());
    }
}
