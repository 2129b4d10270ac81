use cadence_foundation::{Kind, Value};

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};

/// Declared type of a literal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    Bool,
    Int,
    Double,
    String,
    Nan,
    Null,
    /// Any value, typically decoded from the wire format.
    Any,
}

impl LiteralType {
    fn expected_kind(&self) -> Option<Kind> {
        match self {
            LiteralType::Bool => Some(Kind::Bool),
            LiteralType::Int => Some(Kind::Int),
            LiteralType::Double | LiteralType::Nan => Some(Kind::Double),
            LiteralType::String => Some(Kind::String),
            LiteralType::Null => Some(Kind::Null),
            LiteralType::Any => None,
        }
    }
}

/// Publishes a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    ty: LiteralType,
    value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self::typed(LiteralType::Any, value)
    }

    pub fn typed(ty: LiteralType, value: Value) -> Self {
        Self { ty, value }
    }
}

impl Filter for Literal {
    fn type_name(&self) -> &'static str {
        match self.ty {
            LiteralType::Bool => "bool",
            LiteralType::Int => "int",
            LiteralType::Double => "double",
            LiteralType::String => "string",
            LiteralType::Nan => "nan",
            LiteralType::Null => "null",
            LiteralType::Any => "literal",
        }
    }

    fn ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn verify_params(&self, node: &str) -> Result<()> {
        match self.ty.expected_kind() {
            Some(kind) if kind != self.value.kind() => Err(Error::validation(
                node,
                format!(
                    "{} literal holds a value of kind {}",
                    self.type_name(),
                    self.value.kind()
                ),
            )),
            _ => Ok(()),
        }
    }

    fn execute(&self, _inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        Ok(self.value.clone().into())
    }
}
