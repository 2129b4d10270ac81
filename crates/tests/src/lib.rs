//! Integration test harness for Cadence.
//!
//! Drives a [`Session`] through a sequence of cycles the way a host
//! simulation would: build expressions, publish a dataset per cycle,
//! evaluate, then inspect the history cache.

use cadence_foundation::{Identifier, Value};
use cadence_runtime::{
    Expressions, ExpressionGraph, GraphSpec, PointMesh, Result, Session, SessionConfig,
};
use indexmap::IndexMap;

/// Test harness for running expressions over successive cycles.
pub struct TestHarness {
    session: Session,
    expressions: Expressions,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// # Panics
    ///
    /// Panics if the config is invalid.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            session: Session::new(config).expect("invalid session config"),
            expressions: Expressions::new(),
        }
    }

    /// Registers an expression described as a [`GraphSpec`] JSON document.
    ///
    /// # Panics
    ///
    /// Panics if the description does not parse or build.
    pub fn expression(mut self, name: &str, spec: serde_json::Value) -> Self {
        let spec: GraphSpec = serde_json::from_value(spec).expect("invalid graph spec");
        let graph = ExpressionGraph::from_spec(name, &spec)
            .unwrap_or_else(|e| panic!("expression '{name}' failed to build: {e}"));
        self.expressions.insert(Identifier::from(name), graph);
        self
    }

    /// Evaluates one cycle.
    pub fn try_tick(&mut self, mesh: &PointMesh) -> Result<IndexMap<Identifier, Value>> {
        self.session.execute_cycle(mesh, &self.expressions)
    }

    /// # Panics
    ///
    /// Panics if any expression fails.
    pub fn tick(&mut self, mesh: &PointMesh) -> IndexMap<Identifier, Value> {
        self.try_tick(mesh)
            .unwrap_or_else(|e| panic!("cycle {} failed: {e}", mesh.cycle))
    }

    /// Evaluates the empty dataset at cycles `1..=count`, with time equal to
    /// the cycle number.
    pub fn run_cycles(&mut self, count: u64) {
        for cycle in 1..=count {
            self.tick(&mesh(cycle, cycle as f64));
        }
    }

    /// Newest recorded value of an identifier.
    pub fn latest(&self, name: &str) -> Option<&Value> {
        self.session.cache().latest(name).ok().map(|entry| &entry.value)
    }

    /// Newest value as a double.
    pub fn latest_double(&self, name: &str) -> Option<f64> {
        self.latest(name).and_then(Value::as_double)
    }

    pub fn history_len(&self, name: &str) -> usize {
        self.session
            .cache()
            .timeline(name)
            .map_or(0, |timeline| timeline.len())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-point dataset with no fields.
pub fn mesh(cycle: u64, time: f64) -> PointMesh {
    PointMesh::new(cycle, Some(time), vec![[0.0; 3]])
}
