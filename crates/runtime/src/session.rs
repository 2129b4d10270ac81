//! Evaluation sessions.
//!
//! A [`Session`] owns everything that outlives a single cycle: the history
//! cache, the symbol table and the configuration. Each cycle evaluates the
//! registered expressions in order and appends every result to the cache
//! under the expression's name.

use std::path::Path;

use cadence_foundation::{Identifier, Value};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::context::{EvalContext, SymbolTable};
use crate::error::Result;
use crate::graph::ExpressionGraph;
use crate::history::{HistoryCache, LastValue};
use crate::mesh::MeshStatistics;
use crate::persist;

/// Expressions evaluated each cycle, keyed by the identifier their results
/// are stored under.
pub type Expressions = IndexMap<Identifier, ExpressionGraph>;

#[derive(Debug)]
pub struct Session {
    cache: HistoryCache,
    symbols: SymbolTable,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let mut cache = HistoryCache::new();
        cache.set_max_history(config.max_history);
        Ok(Self {
            cache,
            symbols: SymbolTable::new(),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Evaluates every expression against `mesh` and records the results.
    ///
    /// The first failure aborts the remaining expressions; results already
    /// appended this cycle stay in the cache.
    #[instrument(skip_all, name = "cycle", fields(cycle = mesh.cycle()))]
    pub fn execute_cycle(
        &mut self,
        mesh: &dyn MeshStatistics,
        expressions: &Expressions,
    ) -> Result<IndexMap<Identifier, Value>> {
        let (cycle, time) = (mesh.cycle(), mesh.time());
        if time.is_none() {
            warn!(cycle, "dataset publishes no time; time-based history addressing will skip this cycle");
        }

        // Expressions may reference each other before their first result.
        for name in expressions.keys() {
            self.cache.declare(name.clone());
        }

        let mut results = IndexMap::new();
        for (name, graph) in expressions {
            let value = {
                let mut ctx =
                    EvalContext::new(&self.cache, &mut self.symbols, mesh, &self.config);
                graph.execute(&mut ctx)?
            };
            debug!(expression = %name, kind = %value.kind(), "expression evaluated");
            self.cache.append(name.clone(), cycle, time, value.clone())?;
            results.insert(name.clone(), value);
        }
        info!(cycle, expressions = results.len(), "cycle complete");
        Ok(results)
    }

    /// Newest value of every identifier.
    pub fn last_values(&self) -> IndexMap<Identifier, LastValue> {
        self.cache.last_values()
    }

    pub fn reset_symbols(&mut self) {
        self.symbols.clear();
    }

    /// Writes the configured selection of the cache to `path`.
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        persist::save_cache(&self.cache, &self.config.persist, path)
    }

    /// Replaces the cache with the one stored at `path`.
    pub fn load_cache(&mut self, path: &Path) -> Result<()> {
        self.cache = persist::load_cache(path, self.config.max_history)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mesh::PointMesh;
    use crate::nodes::{self, Params};

    fn identifier_graph(name: &str, target: &str) -> ExpressionGraph {
        let mut params = Params::new();
        params.insert("name".into(), Value::from(target));
        let mut g = ExpressionGraph::new(name);
        g.add_node("id", nodes::build("identifier", &params).expect("identifier"))
            .expect("add");
        g.set_output("id").expect("output");
        g
    }

    fn cycle_graph(name: &str) -> ExpressionGraph {
        let mut g = ExpressionGraph::new(name);
        g.add_node("c", nodes::build("cycle", &Params::new()).expect("cycle"))
            .expect("add");
        g.set_output("c").expect("output");
        g
    }

    fn mesh(cycle: u64) -> PointMesh {
        PointMesh::new(cycle, Some(cycle as f64 * 0.5), vec![[0.0; 3]])
    }

    #[test]
    fn cycles_append_history() {
        let mut session = Session::new(SessionConfig::default()).expect("session");
        let mut expressions = Expressions::new();
        expressions.insert("c".into(), cycle_graph("c"));
        for cycle in 1..=3 {
            let results = session.execute_cycle(&mesh(cycle), &expressions).expect("cycle");
            assert_eq!(results.get("c"), Some(&Value::Int(cycle as i64)));
        }
        let timeline = session.cache().lookup("c").expect("timeline");
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.latest().map(|e| e.time), Some(Some(1.5)));
        assert_eq!(session.symbols().get("c.c"), Some(&Value::Int(3)));
        session.reset_symbols();
        assert!(session.symbols().is_empty());
    }

    #[test]
    fn later_expressions_see_earlier_results() {
        let mut session = Session::new(SessionConfig::default()).expect("session");
        let mut expressions = Expressions::new();
        expressions.insert("c".into(), cycle_graph("c"));
        expressions.insert("copy".into(), identifier_graph("copy", "c"));
        let results = session.execute_cycle(&mesh(4), &expressions).expect("cycle");
        assert_eq!(results.get("copy"), Some(&Value::Int(4)));
    }

    #[test]
    fn failure_keeps_earlier_appends() {
        let mut session = Session::new(SessionConfig::default()).expect("session");
        let mut expressions = Expressions::new();
        expressions.insert("c".into(), cycle_graph("c"));
        // Reads itself before its first entry exists.
        expressions.insert("echo".into(), identifier_graph("echo", "echo"));
        expressions.insert("after".into(), cycle_graph("after"));

        let err = session.execute_cycle(&mesh(1), &expressions).expect_err("echo is empty");
        assert!(matches!(err, Error::EmptyHistory(ref name) if name == "echo"));
        assert_eq!(session.cache().lookup("c").map(|t| t.len()).ok(), Some(1));
        assert!(session.cache().lookup("after").is_err());
        assert_eq!(session.last_values().len(), 1);
    }

    #[test]
    fn history_cap_applies() {
        let config = SessionConfig::default().with_max_history(2);
        let mut session = Session::new(config).expect("session");
        let mut expressions = Expressions::new();
        expressions.insert("c".into(), cycle_graph("c"));
        for cycle in 0..5 {
            session.execute_cycle(&mesh(cycle), &expressions).expect("cycle");
        }
        let timeline = session.cache().lookup("c").expect("timeline");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.oldest().map(|e| e.cycle), Some(3));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        let mut session = Session::new(SessionConfig::default()).expect("session");
        let mut expressions = Expressions::new();
        expressions.insert("c".into(), cycle_graph("c"));
        session.execute_cycle(&mesh(7), &expressions).expect("cycle");
        session.save_cache(&path).expect("save");

        let mut restored = Session::new(SessionConfig::default()).expect("session");
        restored.load_cache(&path).expect("load");
        assert_eq!(restored.cache(), session.cache());
        restored.execute_cycle(&mesh(8), &expressions).expect("continue");
        assert_eq!(restored.cache().lookup("c").map(|t| t.len()).ok(), Some(2));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SessionConfig::default().with_default_num_bins(0);
        assert!(matches!(Session::new(config), Err(Error::Validation { .. })));
    }
}
