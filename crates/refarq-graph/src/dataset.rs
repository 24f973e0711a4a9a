//! Datasets: a default graph plus named graphs

use crate::graph::Graph;
use refarq_core::{Term, Triple};
use std::collections::BTreeMap;
use tracing::debug;

/// An RDF dataset
///
/// Named graphs are keyed by their name term and enumerated in term order,
/// so evaluation over "all named graphs" is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    default_graph: Graph,
    named: BTreeMap<Term, Graph>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_graph(&self) -> &Graph {
        &self.default_graph
    }

    /// Named graph by name. The reserved default-graph IRI is not a named graph.
    pub fn named_graph(&self, name: &Term) -> Option<&Graph> {
        self.named.get(name)
    }

    /// Resolve a graph name, treating the reserved IRI as the default graph
    pub fn graph(&self, name: &Term) -> Option<&Graph> {
        if name.is_default_graph() {
            Some(&self.default_graph)
        } else {
            self.named.get(name)
        }
    }

    /// Get or create a named graph
    pub fn named_graph_mut(&mut self, name: Term) -> &mut Graph {
        if !self.named.contains_key(&name) {
            debug!("Created named graph {}", name);
        }
        self.named.entry(name).or_default()
    }

    /// Add or replace a named graph
    pub fn add_named_graph(&mut self, name: Term, graph: Graph) -> Option<Graph> {
        self.named.insert(name, graph)
    }

    pub fn contains_graph(&self, name: &Term) -> bool {
        name.is_default_graph() || self.named.contains_key(name)
    }

    /// Names of all named graphs, in order
    pub fn graph_names(&self) -> impl Iterator<Item = &Term> {
        self.named.keys()
    }

    pub fn named_graph_count(&self) -> usize {
        self.named.len()
    }

    /// Insert a quad; `None` targets the default graph
    pub fn insert(&mut self, graph: Option<Term>, triple: Triple) -> bool {
        match graph {
            Some(name) if !name.is_default_graph() => self.named_graph_mut(name).insert(triple),
            _ => self.default_graph.insert(triple),
        }
    }

    /// Total number of quads across all graphs
    pub fn len(&self) -> usize {
        self.default_graph.len() + self.named.values().map(Graph::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
