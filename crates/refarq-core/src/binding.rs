//! Variable bindings
//!
//! A [`Binding`] is one result row: a partial map from variables to terms.

use crate::term::{Term, Var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One solution row
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    values: BTreeMap<Var, Term>,
}

impl Binding {
    /// Create an empty binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding with a single variable
    pub fn single(var: Var, value: Term) -> Self {
        let mut binding = Self::new();
        binding.insert(var, value);
        binding
    }

    pub fn get(&self, var: &Var) -> Option<&Term> {
        self.values.get(var)
    }

    pub fn contains(&self, var: &Var) -> bool {
        self.values.contains_key(var)
    }

    /// Bind a variable, returning the previous value if any
    pub fn insert(&mut self, var: Var, value: Term) -> Option<Term> {
        self.values.insert(var, value)
    }

    pub fn remove(&mut self, var: &Var) -> Option<Term> {
        self.values.remove(var)
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Term)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Two bindings are compatible when every shared variable has the same value
    pub fn is_compatible(&self, other: &Binding) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .all(|(var, value)| large.get(var).is_none_or(|v| v == value))
    }

    /// Merge two bindings, or `None` if they conflict
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (var, value) in other.iter() {
            merged.values.entry(var.clone()).or_insert_with(|| value.clone());
        }
        Some(merged)
    }

    /// Restrict to the given variables
    pub fn project(&self, vars: &[Var]) -> Binding {
        let values = vars
            .iter()
            .filter_map(|v| self.values.get(v).map(|t| (v.clone(), t.clone())))
            .collect();
        Binding { values }
    }
}

impl FromIterator<(Var, Term)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Var, Term)>>(iter: I) -> Self {
        Binding {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (var, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "({} {})", var, value)?;
        }
        write!(f, ")")
    }
}
