//! Service executors
//!
//! A `service` operator hands its sub-op to a [`ServiceExecutor`], which
//! returns a cursor of bindings. The dispatcher never evaluates the sub-op
//! itself.

use crate::algebra::ServiceOp;
use crate::config::EngineConfig;
use crate::engine::RefEngine;
use crate::procedure::ProcedureRegistry;
use refarq_core::{BindingCursor, Error, Result, Term};
use refarq_graph::Dataset;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Executes service requests
pub trait ServiceExecutor: Send + Sync {
    fn execute(&self, service: &ServiceOp) -> Result<BindingCursor<'_>>;
}

/// Executor with no endpoints; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoServices;

impl ServiceExecutor for NoServices {
    fn execute(&self, service: &ServiceOp) -> Result<BindingCursor<'_>> {
        Err(Error::Service(format!(
            "no service executor for {}",
            service.endpoint
        )))
    }
}

/// Endpoints answered by in-process datasets
#[derive(Debug, Clone)]
pub struct LocalServiceRegistry {
    endpoints: HashMap<Term, Arc<Dataset>>,
    procedures: Arc<ProcedureRegistry>,
    config: EngineConfig,
}

impl Default for LocalServiceRegistry {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            procedures: Arc::new(ProcedureRegistry::with_builtins()),
            config: EngineConfig::default(),
        }
    }
}

impl LocalServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: procedures available to service sub-queries
    pub fn with_procedures(mut self, procedures: Arc<ProcedureRegistry>) -> Self {
        self.procedures = procedures;
        self
    }

    /// Builder: configuration for service sub-queries
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve `dataset` at `endpoint`
    pub fn register(&mut self, endpoint: Term, dataset: Arc<Dataset>) {
        debug!("Registered service endpoint {}", endpoint);
        self.endpoints.insert(endpoint, dataset);
    }

    pub fn contains(&self, endpoint: &Term) -> bool {
        self.endpoints.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl ServiceExecutor for LocalServiceRegistry {
    fn execute(&self, service: &ServiceOp) -> Result<BindingCursor<'_>> {
        let dataset = self
            .endpoints
            .get(&service.endpoint)
            .ok_or_else(|| Error::Service(format!("unknown endpoint {}", service.endpoint)))?;

        // Sub-queries run without services of their own
        let engine = RefEngine::new(Arc::clone(dataset))
            .with_procedures(Arc::clone(&self.procedures))
            .with_config(self.config.clone());
        let result = engine.execute(&service.sub_op)?;
        debug!(
            "Service {} returned {} rows",
            service.endpoint,
            result.table.len()
        );
        Ok(Box::new(result.table.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Op;
    use refarq_core::{Table, Triple, Var};

    fn service(endpoint: &str, sub_op: Op) -> ServiceOp {
        ServiceOp {
            endpoint: Term::iri(endpoint),
            sub_op: Box::new(sub_op),
            silent: false,
        }
    }

    #[test]
    fn test_no_services_fails() {
        let result = NoServices.execute(&service("http://ex/sparql", Op::Null));
        assert!(matches!(result, Err(Error::Service(_))));
    }

    #[test]
    fn test_local_endpoint() {
        let mut dataset = Dataset::new();
        dataset.insert(
            None,
            Triple::new(Term::iri("http://ex/s"), Term::iri("http://ex/p"), Term::integer(3)),
        );
        let mut registry = LocalServiceRegistry::new();
        registry.register(Term::iri("http://ex/sparql"), Arc::new(dataset));
        assert!(registry.contains(&Term::iri("http://ex/sparql")));

        let sub_op = crate::sse::parse_op("(bgp (triple ?s <http://ex/p> ?o))").unwrap();
        let cursor = registry.execute(&service("http://ex/sparql", sub_op)).unwrap();
        let table = Table::from_cursor(cursor).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get(&Var::new("o")), Some(&Term::integer(3)));

        let missing = registry.execute(&service("http://ex/other", Op::Null));
        assert!(matches!(missing, Err(Error::Service(_))));
    }
}
