//! Triples and triple templates

use crate::term::{Term, TermPattern, Var};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete triple stored in a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Triple template; any position may be a variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new<S, P, O>(subject: S, predicate: P, object: O) -> Self
    where
        S: Into<TermPattern>,
        P: Into<TermPattern>,
        O: Into<TermPattern>,
    {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Variables mentioned by this template, in subject/predicate/object order
    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(TermPattern::as_var)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(triple {} {} {})", self.subject, self.predicate, self.object)
    }
}

/// A basic graph pattern: a conjunction of triple templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicPattern {
    triples: Vec<TriplePattern>,
}

impl BasicPattern {
    pub fn new(triples: Vec<TriplePattern>) -> Self {
        Self { triples }
    }

    pub fn triples(&self) -> &[TriplePattern] {
        &self.triples
    }

    pub fn push(&mut self, triple: TriplePattern) {
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

impl FromIterator<TriplePattern> for BasicPattern {
    fn from_iter<I: IntoIterator<Item = TriplePattern>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Triple templates that all live in the same graph
///
/// The graph is a variable, a named-graph IRI, or the reserved
/// default-graph IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuadPattern {
    pub graph: TermPattern,
    pub pattern: BasicPattern,
}

impl QuadPattern {
    pub fn new<G: Into<TermPattern>>(graph: G, pattern: BasicPattern) -> Self {
        Self {
            graph: graph.into(),
            pattern,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}
