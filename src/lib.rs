//! refarq - reference evaluator for a graph-query algebra
//!
//! This is the main library crate that re-exports all refarq components.

pub use refarq_core as core;
pub use refarq_graph as graph;
pub use refarq_query as query;

// Re-export commonly used types
pub use refarq_core::{Binding, Error, Result, Table, Term, Var};
pub use refarq_graph::{Dataset, Graph, load_file, parse_nquads};
pub use refarq_query::{EngineConfig, Evaluator, Op, QueryResult, RefEngine, parse_op};
