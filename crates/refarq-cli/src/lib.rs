//! refarq command-line runner
//!
//! Loads a dataset, evaluates one algebra expression against it and renders
//! the result table.

pub mod config;
pub mod output;

pub use config::{CliConfig, OutputFormat};
pub use output::{render, results_json};

use refarq_core::{Result, Term};
use refarq_graph::{Dataset, load_file};
use refarq_query::{LocalServiceRegistry, QueryResult, RefEngine, parse_op};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Build an engine over `dataset` with the services named in `config`
pub fn build_engine(config: &CliConfig, dataset: Dataset) -> Result<RefEngine> {
    let mut services = LocalServiceRegistry::new().with_config(config.engine.clone());
    for (endpoint, path) in &config.services {
        services.register(Term::iri(endpoint.as_str()), Arc::new(load_file(path)?));
    }
    info!("{} service endpoints configured", services.len());

    Ok(RefEngine::new(Arc::new(dataset))
        .with_services(services)
        .with_config(config.engine.clone()))
}

/// Load `data` (if any), evaluate `algebra` and return the result
pub fn run(config: &CliConfig, data: Option<&Path>, algebra: &str) -> Result<QueryResult> {
    let dataset = match data {
        Some(path) => load_file(path)?,
        None => Dataset::new(),
    };
    let engine = build_engine(config, dataset)?;
    let op = parse_op(algebra)?;
    let result = engine.execute(&op)?;
    info!(
        "{} rows, {} operators, {} service calls in {} ms",
        result.stats.rows_returned,
        result.stats.operators_evaluated,
        result.stats.service_calls,
        result.stats.execution_time_ms
    );
    Ok(result)
}
