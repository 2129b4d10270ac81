//! Identifier lookup, attribute access and the conditional.

use cadence_foundation::Identifier;
use tracing::trace;

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};

/// Newest recorded value of a named expression.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    name: Identifier,
}

impl IdentifierNode {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for IdentifierNode {
    fn type_name(&self) -> &'static str {
        "identifier"
    }

    fn ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn verify_params(&self, node: &str) -> Result<()> {
        if self.name.as_str().is_empty() {
            return Err(Error::validation(node, "identifier name must not be empty"));
        }
        Ok(())
    }

    fn execute(&self, _inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let entry = ctx.cache.latest(self.name.as_str())?;
        trace!(identifier = %self.name, cycle = entry.cycle, "identifier resolved");
        Ok(Output::named(entry.value.clone(), self.name.clone()))
    }
}

/// `obj.name` on any value exposing attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DotAccess {
    name: String,
}

impl DotAccess {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for DotAccess {
    fn type_name(&self) -> &'static str {
        "dot"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("obj")]
    }

    fn verify_params(&self, node: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation(node, "attribute name must not be empty"));
        }
        Ok(())
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let obj = inputs.required("obj")?;
        let attrs = obj.attrs().unwrap_or_default();
        match attrs.get(&self.name) {
            Some(value) => Ok(value.clone().into()),
            None => Err(Error::UnknownAttribute {
                kind: obj.kind().to_string(),
                attr: self.name.clone(),
                available: attrs.keys().cloned().collect(),
            }),
        }
    }
}

/// `if condition then a else b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfElse;

impl Filter for IfElse {
    fn type_name(&self) -> &'static str {
        "if"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("condition"),
            Port::required("if"),
            Port::required("else"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let branch = if inputs.required_bool("condition")? {
            "if"
        } else {
            "else"
        };
        Ok(inputs.required(branch)?.clone().into())
    }
}
