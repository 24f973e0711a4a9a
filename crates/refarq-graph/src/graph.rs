//! In-memory triple graph

use refarq_core::{BasicPattern, Binding, Table, Term, TermPattern, Triple, TriplePattern};
use std::collections::BTreeSet;
use tracing::trace;

/// A set of triples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; returns false if it was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples matching the given positions; `None` is a wildcard
    pub fn find<'a>(
        &'a self,
        subject: Option<&'a Term>,
        predicate: Option<&'a Term>,
        object: Option<&'a Term>,
    ) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples.iter().filter(move |t| {
            subject.is_none_or(|s| &t.subject == s)
                && predicate.is_none_or(|p| &t.predicate == p)
                && object.is_none_or(|o| &t.object == o)
        })
    }

    /// Match a basic graph pattern against this graph.
    ///
    /// Templates are matched left to right; a variable bound by an earlier
    /// template constrains later ones. The empty pattern yields one empty row.
    pub fn match_pattern(&self, pattern: &BasicPattern) -> Table {
        let mut solutions = vec![Binding::new()];
        for template in pattern.triples() {
            let mut next = Vec::new();
            for binding in &solutions {
                self.extend_with(template, binding, &mut next);
            }
            solutions = next;
            if solutions.is_empty() {
                break;
            }
        }
        trace!(
            "Matched {} templates: {} solutions",
            pattern.len(),
            solutions.len()
        );
        let vars = pattern.triples().iter().flat_map(TriplePattern::vars).fold(
            Vec::new(),
            |mut acc, v| {
                if !acc.contains(v) {
                    acc.push(v.clone());
                }
                acc
            },
        );
        Table::new(vars, solutions)
    }

    fn extend_with(&self, template: &TriplePattern, binding: &Binding, out: &mut Vec<Binding>) {
        let s = resolve(&template.subject, binding);
        let p = resolve(&template.predicate, binding);
        let o = resolve(&template.object, binding);

        for triple in self.find(s, p, o) {
            let mut row = binding.clone();
            if bind(&mut row, &template.subject, &triple.subject)
                && bind(&mut row, &template.predicate, &triple.predicate)
                && bind(&mut row, &template.object, &triple.object)
            {
                out.push(row);
            }
        }
    }
}

/// Concrete term for a template position under the current binding
fn resolve<'a>(position: &'a TermPattern, binding: &'a Binding) -> Option<&'a Term> {
    match position {
        TermPattern::Term(term) => Some(term),
        TermPattern::Var(var) => binding.get(var),
    }
}

/// Bind a template position to a matched term; false on conflict
fn bind(row: &mut Binding, position: &TermPattern, value: &Term) -> bool {
    match position {
        TermPattern::Term(_) => true,
        TermPattern::Var(var) => match row.get(var) {
            Some(existing) => existing == value,
            None => {
                row.insert(var.clone(), value.clone());
                true
            }
        },
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}
