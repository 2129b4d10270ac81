//! Expression graphs
//!
//! An [`ExpressionGraph`] is a set of named nodes wired port-to-port, with
//! one node designated as the output. Verification orders the nodes into
//! topological levels; execution walks those levels, feeding each node the
//! outputs of its upstream connections.
//!
//! Graphs can be described declaratively with [`GraphSpec`]:
//!
//! ```json
//! {
//!   "nodes": {
//!     "p":   {"type": "field", "params": {}, "inputs": {"field_name": "name"}},
//!     "name": {"type": "string", "params": {"value": "pressure"}},
//!     "max": {"type": "field_max", "inputs": {"arg1": "p"}}
//!   },
//!   "output": "max"
//! }
//! ```
//!
//! Parameters are plain JSON scalars, number arrays, or full wire values
//! (`{"type": ..., "value": ...}`).

use cadence_foundation::{Identifier, NodeName, NumericArray, Value, WireValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, instrument, trace};

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output};
use crate::nodes::{self, Params};

/// A node of an expression graph.
#[derive(Debug)]
pub struct GraphNode {
    pub filter: Box<dyn Filter>,
    /// Port name to upstream node
    pub inputs: IndexMap<String, NodeName>,
}

/// Named nodes, their connections and the output node.
#[derive(Debug)]
pub struct ExpressionGraph {
    name: Identifier,
    nodes: IndexMap<NodeName, GraphNode>,
    output: Option<NodeName>,
}

impl ExpressionGraph {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            output: None,
        }
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub fn add_node(&mut self, name: impl Into<NodeName>, filter: Box<dyn Filter>) -> Result<()> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(Error::validation(
                self.qualified(name.as_str()),
                "a node with this name already exists",
            ));
        }
        self.nodes.insert(
            name,
            GraphNode {
                filter,
                inputs: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// Feeds `src`'s output into `port` of `dst`.
    pub fn connect(&mut self, src: &str, dst: &str, port: &str) -> Result<()> {
        if !self.nodes.contains_key(src) {
            return Err(Error::UnknownNode(src.to_string()));
        }
        let qualified = self.qualified(dst);
        let node = self
            .nodes
            .get_mut(dst)
            .ok_or_else(|| Error::UnknownNode(dst.to_string()))?;
        let ports = node.filter.ports();
        if !ports.iter().any(|p| p.name == port) {
            let known: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
            return Err(Error::validation(
                qualified,
                format!(
                    "{} has no input port '{port}'; ports: {known:?}",
                    node.filter.type_name()
                ),
            ));
        }
        if node.inputs.contains_key(port) {
            return Err(Error::validation(
                qualified,
                format!("input port '{port}' is already connected"),
            ));
        }
        node.inputs.insert(port.to_string(), NodeName::from(src));
        Ok(())
    }

    pub fn set_output(&mut self, name: &str) -> Result<()> {
        if !self.nodes.contains_key(name) {
            return Err(Error::UnknownNode(name.to_string()));
        }
        self.output = Some(NodeName::from(name));
        Ok(())
    }

    fn qualified(&self, node: &str) -> String {
        format!("{}.{node}", self.name)
    }

    /// Validates every node and returns the execution levels.
    pub fn verify(&self) -> Result<Vec<Vec<NodeName>>> {
        if self.output.is_none() {
            return Err(Error::validation(
                self.name.as_str(),
                "expression graph has no output node",
            ));
        }
        for (name, node) in &self.nodes {
            let qualified = self.qualified(name.as_str());
            node.filter.verify_params(&qualified)?;
            for port in node.filter.ports() {
                if port.required && !node.inputs.contains_key(&port.name) {
                    return Err(Error::MissingInput {
                        node: qualified,
                        port: port.name,
                    });
                }
            }
        }
        topological_levels(&self.nodes)
    }

    /// Runs every node in dependency order and returns the output node's value.
    #[instrument(skip_all, name = "expression", fields(expression = %self.name))]
    pub fn execute(&self, ctx: &mut EvalContext<'_>) -> Result<Value> {
        let levels = self.verify()?;
        debug!(nodes = self.nodes.len(), levels = levels.len(), "evaluating expression");

        let mut outputs: IndexMap<&NodeName, Output> = IndexMap::new();
        for name in levels.iter().flatten() {
            let Some(node) = self.nodes.get(name) else {
                return Err(Error::UnknownNode(name.to_string()));
            };
            let qualified = self.qualified(name.as_str());
            let output = {
                let mut inputs = Inputs::new(&qualified);
                for (port, src) in &node.inputs {
                    let upstream = outputs
                        .get(src)
                        .ok_or_else(|| Error::UnknownNode(src.to_string()))?;
                    inputs.insert(port, upstream);
                }
                node.filter.execute(&inputs, ctx)?
            };
            trace!(node = %qualified, kind = %output.value.kind(), "node executed");
            if ctx.config.record_symbols {
                ctx.symbols.record(qualified, output.value.clone());
            }
            outputs.insert(name, output);
        }

        let output = self
            .output
            .as_ref()
            .and_then(|name| outputs.swap_remove(name))
            .ok_or_else(|| Error::validation(self.name.as_str(), "output node produced no value"))?;
        Ok(output.value)
    }

    /// Builds a graph from its declarative description.
    pub fn from_spec(name: impl Into<Identifier>, spec: &GraphSpec) -> Result<Self> {
        let mut graph = Self::new(name);
        for (node_name, node) in &spec.nodes {
            let params = node
                .params
                .iter()
                .map(|(key, json)| Ok((key.clone(), param_value(json)?)))
                .collect::<Result<Params>>()?;
            let filter = nodes::build(&node.type_name, &params)?;
            graph.add_node(node_name.as_str(), filter)?;
        }
        for (node_name, node) in &spec.nodes {
            for (port, src) in &node.inputs {
                graph.connect(src, node_name, port)?;
            }
        }
        graph.set_output(&spec.output)?;
        Ok(graph)
    }
}

/// Kahn's algorithm with level tracking.
///
/// Each level holds nodes whose inputs are all produced by earlier levels,
/// sorted by name for determinism.
fn topological_levels(nodes: &IndexMap<NodeName, GraphNode>) -> Result<Vec<Vec<NodeName>>> {
    let mut in_degree: IndexMap<&NodeName, usize> = IndexMap::new();
    let mut dependents: IndexMap<&NodeName, Vec<&NodeName>> = IndexMap::new();

    for name in nodes.keys() {
        in_degree.insert(name, 0);
    }
    for (name, node) in nodes {
        for src in node.inputs.values() {
            if !nodes.contains_key(src) {
                return Err(Error::UnknownNode(src.to_string()));
            }
            if let Some(degree) = in_degree.get_mut(name) {
                *degree += 1;
            }
            dependents.entry(src).or_default().push(name);
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<&NodeName> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut processed = 0;

    while !current.is_empty() {
        current.sort();
        processed += current.len();

        let mut next = Vec::new();
        for name in &current {
            let Some(deps) = dependents.get(name) else {
                continue;
            };
            for dep in deps {
                if let Some(degree) = in_degree.get_mut(dep) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dep);
                    }
                }
            }
        }
        levels.push(current.into_iter().cloned().collect());
        current = next;
    }

    if processed != nodes.len() {
        let mut cycle_nodes: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        cycle_nodes.sort();
        return Err(Error::CycleDetected { nodes: cycle_nodes });
    }
    Ok(levels)
}

/// Declarative description of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, Json>,
    /// Port name to upstream node name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, String>,
}

/// Declarative description of an expression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: IndexMap<String, NodeSpec>,
    pub output: String,
}

/// Converts a JSON parameter into a [`Value`].
fn param_value(json: &Json) -> Result<Value> {
    let value = match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => {
            let numbers: Option<Vec<&serde_json::Number>> = items
                .iter()
                .map(|item| match item {
                    Json::Number(n) => Some(n),
                    _ => None,
                })
                .collect();
            let Some(numbers) = numbers else {
                return Err(Error::validation(
                    "params",
                    "array parameters must contain only numbers",
                ));
            };
            let ints: Option<Vec<i64>> = numbers.iter().map(|n| n.as_i64()).collect();
            match ints {
                Some(ints) => Value::Array(NumericArray::int64(ints)),
                None => Value::Array(NumericArray::float64(
                    numbers
                        .iter()
                        .map(|n| n.as_f64().unwrap_or(f64::NAN))
                        .collect(),
                )),
            }
        }
        Json::Object(_) => {
            let wire: WireValue = serde_json::from_value(json.clone())?;
            wire.to_value()?
        }
    };
    Ok(value)
}
