//! Tables: the intermediate relations produced by evaluation
//!
//! A [`Table`] is an ordered multiset of [`Binding`]s plus the list of
//! variables that appear in it. Order only matters where an operator
//! promises it (ordering, slicing and friends keep it intact).

use crate::binding::Binding;
use crate::error::Result;
use crate::term::{Term, Var};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forward-only stream of bindings, as produced by services and stores
pub type BindingCursor<'a> = Box<dyn Iterator<Item = Result<Binding>> + 'a>;

/// Materialised relation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    vars: Vec<Var>,
    rows: Vec<Binding>,
}

impl Table {
    /// The empty relation: no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// The join identity: exactly one row with no bindings
    pub fn unit() -> Self {
        Self {
            vars: Vec::new(),
            rows: vec![Binding::new()],
        }
    }

    /// One row binding `var` to `value`
    pub fn single(var: Var, value: Term) -> Self {
        Self {
            vars: vec![var.clone()],
            rows: vec![Binding::single(var, value)],
        }
    }

    /// Build from declared variables and rows.
    ///
    /// Variables used by rows but missing from `vars` are appended.
    pub fn new(vars: Vec<Var>, rows: Vec<Binding>) -> Self {
        let mut table = Self {
            vars,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Build from rows, collecting variables in first-appearance order
    pub fn from_rows<I: IntoIterator<Item = Binding>>(rows: I) -> Self {
        let mut table = Self::empty();
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Snapshot a binding cursor. The first cursor error aborts.
    pub fn from_cursor(cursor: BindingCursor<'_>) -> Result<Self> {
        let mut table = Self::empty();
        for row in cursor {
            table.push(row?);
        }
        Ok(table)
    }

    /// Append a row
    pub fn push(&mut self, row: Binding) {
        for var in row.vars() {
            if !self.vars.contains(var) {
                self.vars.push(var.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn rows(&self) -> &[Binding] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Binding> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True if some row equals `row` exactly
    pub fn contains(&self, row: &Binding) -> bool {
        self.rows.iter().any(|r| r == row)
    }
}

impl IntoIterator for Table {
    type Item = Binding;
    type IntoIter = std::vec::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for Table {
    /// Render as a text grid, one column per variable
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.vars
                    .iter()
                    .map(|v| row.get(v).map(|t| t.to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = self.vars.iter().map(|v| v.to_string().len()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        writeln!(f, "+{}+", rule)?;
        let header: Vec<String> = self
            .vars
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:<w$} ", v.to_string(), w = *w))
            .collect();
        writeln!(f, "|{}|", header.join("|"))?;
        writeln!(f, "+{}+", rule)?;
        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {:<w$} ", c, w = *w))
                .collect();
            writeln!(f, "|{}|", line.join("|"))?;
        }
        write!(f, "+{}+", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_empty_and_unit() {
        assert!(Table::empty().is_empty());
        let unit = Table::unit();
        assert_eq!(unit.len(), 1);
        assert!(unit.rows()[0].is_empty());
        assert!(unit.vars().is_empty());
    }

    #[test]
    fn test_vars_collected_in_order() {
        let table = Table::from_rows(vec![
            Binding::single(Var::new("b"), Term::integer(1)),
            Binding::single(Var::new("a"), Term::integer(2)),
            Binding::single(Var::new("b"), Term::integer(3)),
        ]);
        assert_eq!(table.vars(), &[Var::new("b"), Var::new("a")]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_from_cursor() {
        let rows = vec![
            Ok(Binding::single(Var::new("x"), Term::integer(1))),
            Ok(Binding::single(Var::new("x"), Term::integer(2))),
        ];
        let table = Table::from_cursor(Box::new(rows.into_iter())).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_from_cursor_propagates_error() {
        let rows = vec![
            Ok(Binding::single(Var::new("x"), Term::integer(1))),
            Err(Error::Service("connection reset".to_string())),
        ];
        let err = Table::from_cursor(Box::new(rows.into_iter())).unwrap_err();
        assert!(matches!(err, Error::Service(_)));
    }

    #[test]
    fn test_display_grid() {
        let table = Table::single(Var::new("x"), Term::string("a"));
        let text = table.to_string();
        assert!(text.contains("?x"));
        assert!(text.contains("\"a\""));
    }
}
