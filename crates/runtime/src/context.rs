//! Evaluation context threaded through every node.

use cadence_foundation::{NodeName, Value};
use indexmap::IndexMap;

use crate::config::SessionConfig;
use crate::history::HistoryCache;
use crate::mesh::MeshStatistics;

/// Final value of every evaluated node, for introspection only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    symbols: IndexMap<NodeName, Value>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: impl Into<NodeName>, value: Value) {
        self.symbols.insert(node.into(), value);
    }

    pub fn get(&self, node: &str) -> Option<&Value> {
        self.symbols.get(node)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeName, &Value)> {
        self.symbols.iter()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }
}

/// Context available to node execution
pub struct EvalContext<'a> {
    /// History of every identifier, as of the current pass
    pub cache: &'a HistoryCache,
    /// Per-node introspection table
    pub symbols: &'a mut SymbolTable,
    /// The currently published dataset
    pub mesh: &'a dyn MeshStatistics,
    pub config: &'a SessionConfig,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        cache: &'a HistoryCache,
        symbols: &'a mut SymbolTable,
        mesh: &'a dyn MeshStatistics,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            cache,
            symbols,
            mesh,
            config,
        }
    }
}
