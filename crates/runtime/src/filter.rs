//! The evaluation node contract.
//!
//! Every node in an expression graph is a [`Filter`]: it has a type name,
//! an ordered list of named input [`Port`]s, a single [`Output`], and a
//! `verify_params` step for its static configuration. Optional ports that
//! are left unconnected (or fed the empty value) read as absent.

use std::fmt;

use cadence_foundation::{Identifier, Value};
use indexmap::IndexMap;

use crate::context::EvalContext;
use crate::error::{Error, Result};

/// A named input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub required: bool,
}

impl Port {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// The value a node publishes, tagged with the identifier it was read from.
///
/// Only `identifier` nodes set `origin`; history nodes use it to reopen the
/// same timeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    pub value: Value,
    pub origin: Option<Identifier>,
}

impl Output {
    pub fn named(value: Value, origin: impl Into<Identifier>) -> Self {
        Self {
            value,
            origin: Some(origin.into()),
        }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Self {
            value,
            origin: None,
        }
    }
}

/// An evaluation node.
pub trait Filter: fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn ports(&self) -> Vec<Port>;

    /// Validates static configuration, independent of runtime inputs.
    fn verify_params(&self, _node: &str) -> Result<()> {
        Ok(())
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output>;
}

/// The upstream outputs feeding one node, keyed by port name.
#[derive(Debug, Clone)]
pub struct Inputs<'a> {
    node: &'a str,
    values: IndexMap<&'a str, &'a Output>,
}

impl<'a> Inputs<'a> {
    pub fn new(node: &'a str) -> Self {
        Self {
            node,
            values: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, port: &'a str, output: &'a Output) {
        self.values.insert(port, output);
    }

    pub fn with(mut self, port: &'a str, output: &'a Output) -> Self {
        self.insert(port, output);
        self
    }

    /// Name of the node being evaluated.
    pub fn node(&self) -> &'a str {
        self.node
    }

    /// The value on `port`, `None` when unconnected or empty.
    pub fn get(&self, port: &str) -> Option<&'a Value> {
        self.values
            .get(port)
            .map(|output| &output.value)
            .filter(|value| !value.is_null())
    }

    pub fn origin(&self, port: &str) -> Option<&'a Identifier> {
        self.values.get(port).and_then(|output| output.origin.as_ref())
    }

    pub fn required(&self, port: &str) -> Result<&'a Value> {
        self.get(port).ok_or_else(|| Error::MissingInput {
            node: self.node.to_string(),
            port: port.to_string(),
        })
    }

    pub fn mismatch(&self, port: &str, expected: &str, found: &Value) -> Error {
        Error::TypeMismatch {
            node: self.node.to_string(),
            port: port.to_string(),
            expected: expected.to_string(),
            found: found.kind().to_string(),
        }
    }

    fn typed<T>(
        &self,
        port: &str,
        expected: &str,
        extract: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(port) {
            None => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| self.mismatch(port, expected, value)),
        }
    }

    fn require<T>(&self, port: &str, value: Result<Option<T>>) -> Result<T> {
        value?.ok_or_else(|| Error::MissingInput {
            node: self.node.to_string(),
            port: port.to_string(),
        })
    }

    /// An int or double, as `f64`.
    pub fn double(&self, port: &str) -> Result<Option<f64>> {
        self.typed(port, "int or double", Value::as_double)
    }

    pub fn required_double(&self, port: &str) -> Result<f64> {
        self.require(port, self.double(port))
    }

    pub fn int(&self, port: &str) -> Result<Option<i64>> {
        self.typed(port, "int", Value::as_int)
    }

    pub fn required_int(&self, port: &str) -> Result<i64> {
        self.require(port, self.int(port))
    }

    pub fn bool(&self, port: &str) -> Result<Option<bool>> {
        self.typed(port, "bool", Value::as_bool)
    }

    pub fn required_bool(&self, port: &str) -> Result<bool> {
        self.require(port, self.bool(port))
    }

    pub fn string(&self, port: &str) -> Result<Option<&'a str>> {
        self.typed(port, "string", Value::as_str)
    }

    pub fn required_string(&self, port: &str) -> Result<&'a str> {
        self.require(port, self.string(port))
    }

    /// A field name given either as a field reference or a plain string.
    pub fn field(&self, port: &str) -> Result<Option<(&'a str, Option<&'a str>)>> {
        self.typed(port, "field or string", |value| match value {
            Value::Field { name, component } => Some((name.as_str(), component.as_deref())),
            Value::String(name) => Some((name.as_str(), None)),
            _ => None,
        })
    }

    pub fn required_field(&self, port: &str) -> Result<(&'a str, Option<&'a str>)> {
        self.require(port, self.field(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_read_as_absent() {
        let null = Output::default();
        let three = Output::from(Value::Int(3));
        let inputs = Inputs::new("n").with("a", &null).with("b", &three);
        assert!(inputs.get("a").is_none());
        assert!(inputs.get("missing").is_none());
        assert!(matches!(
            inputs.required("a"),
            Err(Error::MissingInput { .. })
        ));
        assert_eq!(inputs.required_int("b").expect("int"), 3);
        assert_eq!(inputs.required_double("b").expect("double"), 3.0);
    }

    #[test]
    fn wrong_kind_is_a_type_mismatch() {
        let text = Output::from(Value::from("hello"));
        let inputs = Inputs::new("n").with("a", &text);
        assert!(matches!(
            inputs.int("a"),
            Err(Error::TypeMismatch { ref port, .. }) if port == "a"
        ));
        assert_eq!(inputs.field("a").expect("field"), Some(("hello", None)));
    }

    #[test]
    fn origin_travels_with_output() {
        let named = Output::named(Value::Double(1.0), "temperature");
        let inputs = Inputs::new("n").with("expr_name", &named);
        assert_eq!(
            inputs.origin("expr_name").map(Identifier::as_str),
            Some("temperature")
        );
    }
}
