//! refarq Graph Store
//!
//! Provides the in-memory backing store the reference evaluator matches
//! basic patterns against.
//!
//! # Overview
//!
//! The graph store provides:
//! - Triple graphs with wildcard lookup and basic-pattern matching
//! - Datasets (default graph plus named graphs)
//! - An N-Triples / N-Quads loader

pub mod dataset;
pub mod graph;
pub mod loader;

pub use dataset::Dataset;
pub use graph::Graph;
pub use loader::{load_file, parse_nquads};
