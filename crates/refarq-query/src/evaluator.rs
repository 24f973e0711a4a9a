//! Evaluator capability and the reference in-memory evaluator
//!
//! The dispatcher walks the operator tree and hands every relational
//! transform to an [`Evaluator`]. [`RefEvaluator`] implements them over a
//! [`Dataset`] with straightforward nested-loop algorithms.

use crate::aggregate::Aggregator;
use crate::algebra::{ProcedureArgs, SortCondition, SortDirection};
use crate::expr::{Expr, order_terms};
use crate::procedure::ProcedureRegistry;
use refarq_core::{BasicPattern, Binding, Iri, Result, Table, Term, Var};
use refarq_graph::{Dataset, Graph};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Relational transforms used by the dispatcher
pub trait Evaluator {
    /// Match a basic pattern against the active graph
    fn basic_pattern(&self, pattern: &BasicPattern) -> Result<Table>;

    fn join(&self, left: Table, right: Table) -> Result<Table>;

    fn left_join(&self, left: Table, right: Table, exprs: &[Expr]) -> Result<Table>;

    fn diff(&self, left: Table, right: Table) -> Result<Table>;

    fn union(&self, left: Table, right: Table) -> Result<Table>;

    fn filter(&self, exprs: &[Expr], table: Table) -> Result<Table>;

    fn list(&self, table: Table) -> Result<Table>;

    fn order(&self, table: Table, conditions: &[SortCondition]) -> Result<Table>;

    fn project(&self, table: Table, vars: &[Var]) -> Result<Table>;

    fn distinct(&self, table: Table) -> Result<Table>;

    fn reduced(&self, table: Table) -> Result<Table>;

    fn slice(&self, table: Table, start: Option<usize>, length: Option<usize>) -> Result<Table>;

    fn assign(&self, table: Table, assignments: &[(Var, Expr)]) -> Result<Table>;

    fn group_by(
        &self,
        table: Table,
        group_vars: &[(Var, Option<Expr>)],
        aggregators: &[(Var, Aggregator)],
    ) -> Result<Table>;

    fn procedure(&self, table: Table, proc_id: &Iri, args: &ProcedureArgs) -> Result<Table>;

    /// Names of the named graphs, in dataset order
    fn graph_names(&self) -> Vec<Term>;

    /// True if `name` is a named graph or the reserved default-graph IRI
    fn contains_graph(&self, name: &Term) -> bool;

    /// Evaluator whose active graph is `name`; `None` if there is no such graph
    fn for_graph(&self, name: &Term) -> Option<Box<dyn Evaluator + '_>>;
}

/// Reference evaluator over an in-memory dataset
#[derive(Debug, Clone, Copy)]
pub struct RefEvaluator<'a> {
    dataset: &'a Dataset,
    active: &'a Graph,
    procedures: &'a ProcedureRegistry,
}

impl<'a> RefEvaluator<'a> {
    /// Evaluator over the default graph of `dataset`
    pub fn new(dataset: &'a Dataset, procedures: &'a ProcedureRegistry) -> Self {
        Self {
            dataset,
            active: dataset.default_graph(),
            procedures,
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn active_graph(&self) -> &'a Graph {
        self.active
    }
}

fn merged_vars(left: &Table, right: &Table) -> Vec<Var> {
    let mut vars = left.vars().to_vec();
    for var in right.vars() {
        if !vars.contains(var) {
            vars.push(var.clone());
        }
    }
    vars
}

/// Sort keys for one row; failing expressions sort as unbound
fn sort_keys(row: &Binding, conditions: &[SortCondition]) -> Vec<Option<Term>> {
    conditions.iter().map(|c| c.expr.eval(row).ok()).collect()
}

fn compare_keys(a: &[Option<Term>], b: &[Option<Term>], conditions: &[SortCondition]) -> Ordering {
    for ((x, y), condition) in a.iter().zip(b).zip(conditions) {
        let ord = order_terms(x.as_ref(), y.as_ref());
        let ord = match condition.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Evaluator for RefEvaluator<'_> {
    fn basic_pattern(&self, pattern: &BasicPattern) -> Result<Table> {
        Ok(self.active.match_pattern(pattern))
    }

    fn join(&self, left: Table, right: Table) -> Result<Table> {
        let vars = merged_vars(&left, &right);
        let mut rows = Vec::new();
        for l in &left {
            for r in &right {
                if let Some(merged) = l.merge(r) {
                    rows.push(merged);
                }
            }
        }
        trace!("join {} x {} -> {}", left.len(), right.len(), rows.len());
        Ok(Table::new(vars, rows))
    }

    fn left_join(&self, left: Table, right: Table, exprs: &[Expr]) -> Result<Table> {
        let vars = merged_vars(&left, &right);
        let mut rows = Vec::new();
        for l in left {
            let mut matched = false;
            for r in &right {
                if let Some(merged) = l.merge(r) {
                    if exprs.iter().all(|e| e.is_satisfied(&merged)) {
                        rows.push(merged);
                        matched = true;
                    }
                }
            }
            if !matched {
                rows.push(l);
            }
        }
        Ok(Table::new(vars, rows))
    }

    fn diff(&self, left: Table, right: Table) -> Result<Table> {
        let vars = left.vars().to_vec();
        let rows = left
            .into_iter()
            .filter(|row| !right.contains(row))
            .collect();
        Ok(Table::new(vars, rows))
    }

    fn union(&self, left: Table, right: Table) -> Result<Table> {
        let vars = merged_vars(&left, &right);
        let mut rows = left.into_rows();
        rows.extend(right);
        Ok(Table::new(vars, rows))
    }

    fn filter(&self, exprs: &[Expr], table: Table) -> Result<Table> {
        let vars = table.vars().to_vec();
        let rows = table
            .into_iter()
            .filter(|row| exprs.iter().all(|e| e.is_satisfied(row)))
            .collect();
        Ok(Table::new(vars, rows))
    }

    fn list(&self, table: Table) -> Result<Table> {
        Ok(table)
    }

    fn order(&self, table: Table, conditions: &[SortCondition]) -> Result<Table> {
        let vars = table.vars().to_vec();
        let mut keyed: Vec<(Vec<Option<Term>>, Binding)> = table
            .into_iter()
            .map(|row| (sort_keys(&row, conditions), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, conditions));
        Ok(Table::new(vars, keyed.into_iter().map(|(_, row)| row).collect()))
    }

    fn project(&self, table: Table, vars: &[Var]) -> Result<Table> {
        let rows = table.iter().map(|row| row.project(vars)).collect();
        Ok(Table::new(vars.to_vec(), rows))
    }

    fn distinct(&self, table: Table) -> Result<Table> {
        let vars = table.vars().to_vec();
        let mut seen = HashSet::new();
        let rows = table
            .into_iter()
            .filter(|row| seen.insert(row.clone()))
            .collect();
        Ok(Table::new(vars, rows))
    }

    fn reduced(&self, table: Table) -> Result<Table> {
        let vars = table.vars().to_vec();
        let mut rows: Vec<Binding> = Vec::with_capacity(table.len());
        for row in table {
            if rows.last() != Some(&row) {
                rows.push(row);
            }
        }
        Ok(Table::new(vars, rows))
    }

    fn slice(&self, table: Table, start: Option<usize>, length: Option<usize>) -> Result<Table> {
        let vars = table.vars().to_vec();
        let rows = table
            .into_iter()
            .skip(start.unwrap_or(0))
            .take(length.unwrap_or(usize::MAX))
            .collect();
        Ok(Table::new(vars, rows))
    }

    fn assign(&self, table: Table, assignments: &[(Var, Expr)]) -> Result<Table> {
        let mut vars = table.vars().to_vec();
        for (var, _) in assignments {
            if !vars.contains(var) {
                vars.push(var.clone());
            }
        }

        let mut rows = Vec::with_capacity(table.len());
        'rows: for mut row in table {
            for (var, expr) in assignments {
                match expr.eval(&row) {
                    Ok(value) => match row.get(var) {
                        Some(existing) if *existing != value => continue 'rows,
                        Some(_) => {}
                        None => {
                            row.insert(var.clone(), value);
                        }
                    },
                    Err(e) if e.is_expression_error() => {}
                    Err(e) => return Err(e),
                }
            }
            rows.push(row);
        }
        Ok(Table::new(vars, rows))
    }

    fn group_by(
        &self,
        table: Table,
        group_vars: &[(Var, Option<Expr>)],
        aggregators: &[(Var, Aggregator)],
    ) -> Result<Table> {
        let mut groups: Vec<(Vec<Option<Term>>, Vec<&Binding>)> = Vec::new();
        let mut index: HashMap<Vec<Option<Term>>, usize> = HashMap::new();

        for row in &table {
            let key: Vec<Option<Term>> = group_vars
                .iter()
                .map(|(var, expr)| match expr {
                    Some(expr) => expr.eval(row).ok(),
                    None => row.get(var).cloned(),
                })
                .collect();
            match index.get(&key) {
                Some(&i) => groups[i].1.push(row),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }

        // Aggregating with no grouping keys always yields one row
        if groups.is_empty() && group_vars.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        let vars: Vec<Var> = group_vars
            .iter()
            .map(|(v, _)| v.clone())
            .chain(aggregators.iter().map(|(v, _)| v.clone()))
            .collect();

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in &groups {
            let mut out = Binding::new();
            for ((var, _), value) in group_vars.iter().zip(key) {
                if let Some(value) = value {
                    out.insert(var.clone(), value.clone());
                }
            }
            for (var, aggregator) in aggregators {
                if let Some(value) = aggregator.aggregate(members)? {
                    out.insert(var.clone(), value);
                }
            }
            rows.push(out);
        }
        trace!("group: {} rows into {} groups", table.len(), rows.len());
        Ok(Table::new(vars, rows))
    }

    fn procedure(&self, table: Table, proc_id: &Iri, args: &ProcedureArgs) -> Result<Table> {
        self.procedures.call(proc_id, table, args)
    }

    fn graph_names(&self) -> Vec<Term> {
        self.dataset.graph_names().cloned().collect()
    }

    fn contains_graph(&self, name: &Term) -> bool {
        self.dataset.contains_graph(name)
    }

    fn for_graph(&self, name: &Term) -> Option<Box<dyn Evaluator + '_>> {
        let active = self.dataset.graph(name)?;
        Some(Box::new(RefEvaluator {
            dataset: self.dataset,
            active,
            procedures: self.procedures,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithOp, CompareOp};
    use refarq_core::{Error, Triple, TriplePattern};

    fn x(n: i64) -> Binding {
        Binding::single(Var::new("x"), Term::integer(n))
    }

    fn xs(values: &[i64]) -> Table {
        Table::from_rows(values.iter().map(|n| x(*n)))
    }

    fn with_evaluator<F: FnOnce(&RefEvaluator<'_>)>(f: F) {
        let dataset = Dataset::new();
        let procedures = ProcedureRegistry::new();
        f(&RefEvaluator::new(&dataset, &procedures));
    }

    #[test]
    fn test_join_and_union() {
        with_evaluator(|ev| {
            let left = xs(&[1, 2]);
            let right = Table::from_rows(vec![
                Binding::from_iter([(Var::new("x"), Term::integer(2)), (Var::new("y"), Term::integer(9))]),
                Binding::single(Var::new("y"), Term::integer(7)),
            ]);
            let joined = ev.join(left.clone(), right).unwrap();
            assert_eq!(joined.len(), 3);
            assert_eq!(joined.vars(), &[Var::new("x"), Var::new("y")]);

            let unioned = ev.union(Table::empty(), left).unwrap();
            assert_eq!(unioned, xs(&[1, 2]));
        });
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        with_evaluator(|ev| {
            let right = Table::from_rows(vec![Binding::from_iter([
                (Var::new("x"), Term::integer(1)),
                (Var::new("y"), Term::integer(5)),
            ])]);
            let out = ev.left_join(xs(&[1, 2]), right.clone(), &[]).unwrap();
            assert_eq!(out.len(), 2);
            assert!(out.rows()[0].contains(&Var::new("y")));
            assert_eq!(out.rows()[1], x(2));

            let never = Expr::compare(CompareOp::Gt, Expr::var("y"), Expr::constant(Term::integer(10)));
            let out = ev.left_join(xs(&[1]), right, &[never]).unwrap();
            assert_eq!(out.rows(), &[x(1)]);
        });
    }

    #[test]
    fn test_diff_distinct_reduced() {
        with_evaluator(|ev| {
            assert_eq!(ev.diff(xs(&[1, 2]), xs(&[2])).unwrap(), xs(&[1]));
            assert_eq!(ev.distinct(xs(&[1, 2, 1, 2])).unwrap(), xs(&[1, 2]));
            assert_eq!(ev.reduced(xs(&[1, 1, 2, 1])).unwrap(), xs(&[1, 2, 1]));
        });
    }

    #[test]
    fn test_order_slice_project() {
        with_evaluator(|ev| {
            let sorted = ev
                .order(xs(&[3, 1, 2]), &[SortCondition::desc(Expr::var("x"))])
                .unwrap();
            assert_eq!(sorted, xs(&[3, 2, 1]));

            assert_eq!(ev.slice(xs(&[1, 2, 3]), Some(1), Some(1)).unwrap(), xs(&[2]));
            assert!(ev.slice(xs(&[1, 2, 3]), Some(0), Some(0)).unwrap().is_empty());
            assert_eq!(ev.slice(xs(&[1, 2, 3]), Some(5), None).unwrap().len(), 0);

            let projected = ev.project(xs(&[1]), &[Var::new("y")]).unwrap();
            assert_eq!(projected.rows(), &[Binding::new()]);
            assert_eq!(projected.vars(), &[Var::new("y")]);
        });
    }

    #[test]
    fn test_order_unbound_first() {
        with_evaluator(|ev| {
            let table = Table::from_rows(vec![x(2), Binding::new(), x(1)]);
            let sorted = ev
                .order(table, &[SortCondition::asc(Expr::var("x"))])
                .unwrap();
            assert_eq!(sorted.rows(), &[Binding::new(), x(1), x(2)]);
        });
    }

    #[test]
    fn test_filter_drops_errors() {
        with_evaluator(|ev| {
            let table = Table::from_rows(vec![x(1), x(5), Binding::new()]);
            let gt = Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::constant(Term::integer(2)));
            assert_eq!(ev.filter(&[gt], table).unwrap().rows(), &[x(5)]);
        });
    }

    #[test]
    fn test_assign() {
        with_evaluator(|ev| {
            let plus = Expr::arithmetic(
                ArithOp::Add,
                Expr::var("x"),
                Expr::constant(Term::integer(1)),
            );
            let out = ev
                .assign(xs(&[1]), &[(Var::new("y"), plus)])
                .unwrap();
            assert_eq!(out.rows()[0].get(&Var::new("y")), Some(&Term::integer(2)));

            // Conflicting existing binding drops the row
            let out = ev
                .assign(xs(&[1]), &[(Var::new("x"), Expr::constant(Term::integer(7)))])
                .unwrap();
            assert!(out.is_empty());

            // Errors leave the variable unbound
            let out = ev
                .assign(xs(&[1]), &[(Var::new("z"), Expr::var("missing"))])
                .unwrap();
            assert_eq!(out.rows(), &[x(1)]);
        });
    }

    #[test]
    fn test_group_by() {
        with_evaluator(|ev| {
            let table = Table::from_rows(vec![
                Binding::from_iter([(Var::new("g"), Term::string("a")), (Var::new("x"), Term::integer(1))]),
                Binding::from_iter([(Var::new("g"), Term::string("b")), (Var::new("x"), Term::integer(2))]),
                Binding::from_iter([(Var::new("g"), Term::string("a")), (Var::new("x"), Term::integer(3))]),
            ]);
            let out = ev
                .group_by(
                    table,
                    &[(Var::new("g"), None)],
                    &[(
                        Var::new("total"),
                        Aggregator::Sum { expr: Expr::var("x"), distinct: false },
                    )],
                )
                .unwrap();
            assert_eq!(out.len(), 2);
            assert_eq!(out.rows()[0].get(&Var::new("total")), Some(&Term::integer(4)));
            assert_eq!(out.rows()[1].get(&Var::new("total")), Some(&Term::integer(2)));
        });
    }

    #[test]
    fn test_group_by_empty_input() {
        with_evaluator(|ev| {
            let count = [(Var::new("c"), Aggregator::CountAll { distinct: false })];
            let out = ev.group_by(Table::empty(), &[], &count).unwrap();
            assert_eq!(out.rows(), &[Binding::single(Var::new("c"), Term::integer(0))]);

            let out = ev
                .group_by(Table::empty(), &[(Var::new("g"), None)], &count)
                .unwrap();
            assert!(out.is_empty());
        });
    }

    #[test]
    fn test_scoped_graph() {
        let mut dataset = Dataset::new();
        let g = Term::iri("http://ex/g");
        dataset.insert(
            Some(g.clone()),
            Triple::new(Term::iri("http://ex/s"), Term::iri("http://ex/p"), Term::integer(1)),
        );
        let procedures = ProcedureRegistry::new();
        let ev = RefEvaluator::new(&dataset, &procedures);
        let pattern = BasicPattern::new(vec![TriplePattern::new(
            Var::new("s"),
            Term::iri("http://ex/p"),
            Var::new("o"),
        )]);

        assert!(ev.basic_pattern(&pattern).unwrap().is_empty());
        let scoped = ev.for_graph(&g).unwrap();
        assert_eq!(scoped.basic_pattern(&pattern).unwrap().len(), 1);
        assert!(ev.for_graph(&Term::iri("http://ex/missing")).is_none());
        assert_eq!(ev.graph_names(), vec![g]);
    }

    #[test]
    fn test_unknown_procedure() {
        with_evaluator(|ev| {
            let err = ev
                .procedure(
                    Table::unit(),
                    &Iri::new("http://ex/nope"),
                    &ProcedureArgs::Positional(vec![]),
                )
                .unwrap_err();
            assert!(matches!(err, Error::ProcedureNotFound(_)));
        });
    }
}
