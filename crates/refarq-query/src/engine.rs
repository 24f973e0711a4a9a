//! Query engine
//!
//! [`RefEngine`] bundles a dataset with the procedures, service executor
//! and configuration needed to evaluate operator trees against it.

use crate::algebra::Op;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::evaluator::RefEvaluator;
use crate::procedure::ProcedureRegistry;
use crate::service::{NoServices, ServiceExecutor};
use crate::sse;
use refarq_core::{Result, Table};
use refarq_graph::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Evaluation result
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Result rows
    pub table: Table,

    /// Execution statistics
    pub stats: EvalStats,
}

/// Execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    pub operators_evaluated: u64,
    pub service_calls: u64,
    pub rows_returned: u64,
    pub execution_time_ms: u64,
}

/// Reference query engine
#[derive(Clone)]
pub struct RefEngine {
    dataset: Arc<Dataset>,
    procedures: Arc<ProcedureRegistry>,
    services: Arc<dyn ServiceExecutor>,
    config: EngineConfig,
}

impl RefEngine {
    /// Engine over `dataset` with the built-in procedures and no services
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            procedures: Arc::new(ProcedureRegistry::with_builtins()),
            services: Arc::new(NoServices),
            config: EngineConfig::default(),
        }
    }

    /// Builder: replace the procedure registry
    pub fn with_procedures(mut self, procedures: Arc<ProcedureRegistry>) -> Self {
        self.procedures = procedures;
        self
    }

    /// Builder: set the service executor
    pub fn with_services<S: ServiceExecutor + 'static>(mut self, services: S) -> Self {
        self.services = Arc::new(services);
        self
    }

    /// Builder: set the configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate an operator tree
    pub fn execute(&self, op: &Op) -> Result<QueryResult> {
        let start = Instant::now();
        let evaluator = RefEvaluator::new(&self.dataset, &self.procedures);
        let mut dispatcher =
            Dispatcher::new(self.services.as_ref()).with_config(self.config.clone());
        let table = dispatcher.run(op, &evaluator)?;

        let mut stats = dispatcher.into_stats();
        stats.rows_returned = table.len() as u64;
        stats.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(QueryResult { table, stats })
    }

    /// Parse an algebra expression and evaluate it
    pub fn query(&self, text: &str) -> Result<QueryResult> {
        let op = sse::parse_op(text)?;
        self.execute(&op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;
    use crate::service::LocalServiceRegistry;
    use refarq_core::{Error, Term, Triple, Var};

    fn engine() -> RefEngine {
        let mut dataset = Dataset::new();
        for (s, age) in [("alice", 30), ("bob", 25), ("carol", 35)] {
            dataset.insert(
                None,
                Triple::new(
                    Term::iri(format!("http://ex/{}", s)),
                    Term::iri("http://ex/age"),
                    Term::integer(age),
                ),
            );
        }
        RefEngine::new(Arc::new(dataset))
    }

    #[test]
    fn test_execute_with_stats() {
        let result = engine()
            .query("(filter (> ?age 28) (bgp (triple ?p <http://ex/age> ?age)))")
            .unwrap();
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.stats.rows_returned, 2);
        assert_eq!(result.stats.operators_evaluated, 2);
        assert_eq!(result.stats.service_calls, 0);
    }

    #[test]
    fn test_order_and_slice() {
        let result = engine()
            .query("(slice _ 1 (order ((desc ?age)) (bgp (triple ?p <http://ex/age> ?age))))")
            .unwrap();
        assert_eq!(result.table.len(), 1);
        assert_eq!(
            result.table.rows()[0].get(&Var::new("p")),
            Some(&Term::iri("http://ex/carol"))
        );
    }

    #[test]
    fn test_group_count() {
        let result = engine()
            .query("(group () ((?n (count))) (bgp (triple ?p <http://ex/age> ?age)))")
            .unwrap();
        assert_eq!(
            result.table.rows()[0].get(&Var::new("n")),
            Some(&Term::integer(3))
        );
    }

    #[test]
    fn test_local_service() {
        let mut remote = Dataset::new();
        remote.insert(
            None,
            Triple::new(
                Term::iri("http://ex/alice"),
                Term::iri("http://ex/city"),
                Term::string("Paris"),
            ),
        );
        let mut services = LocalServiceRegistry::new();
        services.register(Term::iri("http://ex/remote"), Arc::new(remote));
        let engine = engine().with_services(services);

        let result = engine
            .query(
                "(join (bgp (triple ?p <http://ex/age> ?age)) \
                 (service <http://ex/remote> (bgp (triple ?p <http://ex/city> ?city))))",
            )
            .unwrap();
        assert_eq!(result.table.len(), 1);
        assert_eq!(result.stats.service_calls, 1);
    }

    #[test]
    fn test_config_depth_limit() {
        let engine = engine().with_config(EngineConfig::new().max_depth(2));
        let err = engine.query("(distinct (distinct (null)))").unwrap_err();
        assert!(matches!(err, Error::RecursionLimit(2)));
    }

    fn nested_distinct(levels: usize) -> String {
        format!("{}(null){}", "(distinct ".repeat(levels), ")".repeat(levels))
    }

    #[test]
    fn test_default_depth_on_small_stack() {
        let outcome = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let engine = RefEngine::new(Arc::new(Dataset::new()));
                let at_limit = engine
                    .query(&nested_distinct(DEFAULT_MAX_DEPTH - 1))
                    .map(|r| r.stats.operators_evaluated);
                let chain = (0..DEFAULT_MAX_DEPTH).fold(Op::Null, |op, _| Op::distinct(op));
                let over_limit = engine.execute(&chain).map(|r| r.table.len());
                let runaway = engine.query(&nested_distinct(100_000)).map(|r| r.table.len());
                (at_limit, over_limit, runaway)
            })
            .unwrap()
            .join()
            .unwrap();

        let (at_limit, over_limit, runaway) = outcome;
        assert_eq!(at_limit.unwrap(), DEFAULT_MAX_DEPTH as u64);
        assert!(matches!(over_limit, Err(Error::RecursionLimit(DEFAULT_MAX_DEPTH))));
        assert!(matches!(runaway, Err(Error::QueryParse(_))));
    }

    #[test]
    fn test_extension_inside_empty_graph_scope() {
        let engine = RefEngine::new(Arc::new(Dataset::new()));
        for text in ["(graph ?g (ext custom))", "(graph <http://ex/none> (ext custom))"] {
            let err = engine.query(text).unwrap_err();
            assert!(matches!(err, Error::UnsupportedOperator(_)), "{text}: {err}");
        }
    }
}
