//! Aggregators used by grouping

use crate::expr::{ArithOp, Expr, arithmetic, order_terms};
use refarq_core::{Binding, Error, Iri, Numeric, Result, Term};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An aggregate function applied to each group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Aggregator {
    /// `count(*)`: number of rows
    CountAll { distinct: bool },
    /// `count(expr)`: number of rows where `expr` evaluates
    Count { expr: Expr, distinct: bool },
    Sum { expr: Expr, distinct: bool },
    Min { expr: Expr, distinct: bool },
    Max { expr: Expr, distinct: bool },
    Avg { expr: Expr, distinct: bool },
    Sample { expr: Expr, distinct: bool },
    GroupConcat {
        expr: Expr,
        distinct: bool,
        separator: Option<String>,
    },
    /// Aggregate identified by IRI; the reference evaluator knows none
    Custom { iri: Iri, args: Vec<Expr> },
}

impl Aggregator {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregator::CountAll { .. } | Aggregator::Count { .. } => "count",
            Aggregator::Sum { .. } => "sum",
            Aggregator::Min { .. } => "min",
            Aggregator::Max { .. } => "max",
            Aggregator::Avg { .. } => "avg",
            Aggregator::Sample { .. } => "sample",
            Aggregator::GroupConcat { .. } => "group_concat",
            Aggregator::Custom { .. } => "agg",
        }
    }

    fn parts(&self) -> (Option<&Expr>, bool) {
        match self {
            Aggregator::CountAll { distinct } => (None, *distinct),
            Aggregator::Count { expr, distinct }
            | Aggregator::Sum { expr, distinct }
            | Aggregator::Min { expr, distinct }
            | Aggregator::Max { expr, distinct }
            | Aggregator::Avg { expr, distinct }
            | Aggregator::Sample { expr, distinct }
            | Aggregator::GroupConcat { expr, distinct, .. } => (Some(expr), *distinct),
            Aggregator::Custom { .. } => (None, false),
        }
    }

    /// Aggregate over the rows of one group.
    ///
    /// `Ok(None)` means the aggregate has no value for this group and the
    /// output variable stays unbound. Unknown aggregators are an error.
    pub fn aggregate(&self, rows: &[&Binding]) -> Result<Option<Term>> {
        if let Aggregator::Custom { iri, .. } = self {
            return Err(Error::UnsupportedAggregator(iri.to_string()));
        }

        let (expr, distinct) = self.parts();
        let Some(expr) = expr else {
            let count = if distinct {
                let mut seen: Vec<&Binding> = Vec::new();
                for row in rows {
                    if !seen.contains(row) {
                        seen.push(*row);
                    }
                }
                seen.len()
            } else {
                rows.len()
            };
            return Ok(Some(Term::integer(count as i64)));
        };

        // Values from rows where the expression evaluates; errors are skipped
        // for count/min/max/sample and poison sum/avg/group_concat.
        let mut values = Vec::with_capacity(rows.len());
        let mut had_error = false;
        for row in rows {
            match expr.eval(row) {
                Ok(v) => {
                    if !distinct || !values.contains(&v) {
                        values.push(v);
                    }
                }
                Err(e) if e.is_expression_error() => had_error = true,
                Err(e) => return Err(e),
            }
        }

        let result = match self {
            Aggregator::Count { .. } => Some(Term::integer(values.len() as i64)),
            Aggregator::Sum { .. } if had_error => None,
            Aggregator::Sum { .. } => sum(&values),
            Aggregator::Avg { .. } if had_error => None,
            Aggregator::Avg { .. } => {
                if values.is_empty() {
                    Some(Term::integer(0))
                } else {
                    sum(&values)
                        .and_then(|t| t.numeric())
                        .and_then(|total| {
                            arithmetic(ArithOp::Div, total, Numeric::Integer(values.len() as i64))
                                .ok()
                        })
                        .map(Numeric::into_term)
                }
            }
            Aggregator::Min { .. } => values
                .into_iter()
                .min_by(|a, b| order_terms(Some(a), Some(b))),
            Aggregator::Max { .. } => values
                .into_iter()
                .max_by(|a, b| order_terms(Some(a), Some(b))),
            Aggregator::Sample { .. } => values.into_iter().next(),
            Aggregator::GroupConcat { .. } if had_error => None,
            Aggregator::GroupConcat { separator, .. } => {
                let sep = separator.as_deref().unwrap_or(" ");
                let mut parts = Vec::with_capacity(values.len());
                for value in &values {
                    match value.as_literal() {
                        Some(lit) => parts.push(lit.lexical.clone()),
                        None => return Ok(None),
                    }
                }
                Some(Term::string(parts.join(sep)))
            }
            Aggregator::CountAll { .. } | Aggregator::Custom { .. } => None,
        };
        Ok(result)
    }
}

fn sum(values: &[Term]) -> Option<Term> {
    let mut total = Numeric::Integer(0);
    for value in values {
        let n = value.numeric()?;
        total = arithmetic(ArithOp::Add, total, n).ok()?;
    }
    Some(total.into_term())
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Aggregator::Custom { iri, args } = self {
            write!(f, "(agg {}", iri)?;
            for arg in args {
                write!(f, " {}", arg)?;
            }
            return write!(f, ")");
        }
        let (expr, distinct) = self.parts();
        write!(f, "({}", self.name())?;
        if distinct {
            write!(f, " distinct")?;
        }
        if let Some(expr) = expr {
            write!(f, " {}", expr)?;
        }
        if let Aggregator::GroupConcat {
            separator: Some(sep),
            ..
        } = self
        {
            write!(f, " {}", Term::string(sep.clone()))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refarq_core::Var;

    fn rows(values: &[Option<i64>]) -> Vec<Binding> {
        values
            .iter()
            .map(|v| match v {
                Some(n) => Binding::single(Var::new("x"), Term::integer(*n)),
                None => Binding::new(),
            })
            .collect()
    }

    fn run(agg: &Aggregator, data: &[Binding]) -> Option<Term> {
        let refs: Vec<&Binding> = data.iter().collect();
        agg.aggregate(&refs).unwrap()
    }

    #[test]
    fn test_count_variants() {
        let data = rows(&[Some(1), Some(1), None, Some(2)]);
        assert_eq!(
            run(&Aggregator::CountAll { distinct: false }, &data),
            Some(Term::integer(4))
        );
        assert_eq!(
            run(&Aggregator::CountAll { distinct: true }, &data),
            Some(Term::integer(3))
        );
        assert_eq!(
            run(&Aggregator::Count { expr: Expr::var("x"), distinct: false }, &data),
            Some(Term::integer(3))
        );
        assert_eq!(
            run(&Aggregator::Count { expr: Expr::var("x"), distinct: true }, &data),
            Some(Term::integer(2))
        );
    }

    #[test]
    fn test_sum_avg_min_max() {
        let data = rows(&[Some(4), Some(1), Some(7)]);
        let x = || Expr::var("x");
        assert_eq!(
            run(&Aggregator::Sum { expr: x(), distinct: false }, &data),
            Some(Term::integer(12))
        );
        assert_eq!(
            run(&Aggregator::Avg { expr: x(), distinct: false }, &data),
            Some(Term::decimal(4.0))
        );
        assert_eq!(
            run(&Aggregator::Min { expr: x(), distinct: false }, &data),
            Some(Term::integer(1))
        );
        assert_eq!(
            run(&Aggregator::Max { expr: x(), distinct: false }, &data),
            Some(Term::integer(7))
        );
    }

    #[test]
    fn test_empty_group() {
        let data: Vec<Binding> = Vec::new();
        assert_eq!(
            run(&Aggregator::Sum { expr: Expr::var("x"), distinct: false }, &data),
            Some(Term::integer(0))
        );
        assert_eq!(
            run(&Aggregator::Min { expr: Expr::var("x"), distinct: false }, &data),
            None
        );
    }

    #[test]
    fn test_sum_with_unbound_is_unbound() {
        let data = rows(&[Some(1), None]);
        assert_eq!(
            run(&Aggregator::Sum { expr: Expr::var("x"), distinct: false }, &data),
            None
        );
    }

    #[test]
    fn test_group_concat() {
        let data = rows(&[Some(1), Some(2)]);
        let agg = Aggregator::GroupConcat {
            expr: Expr::var("x"),
            distinct: false,
            separator: Some(",".to_string()),
        };
        assert_eq!(run(&agg, &data), Some(Term::string("1,2")));
    }

    #[test]
    fn test_custom_is_unsupported() {
        let agg = Aggregator::Custom {
            iri: Iri::new("http://ex/median"),
            args: vec![],
        };
        let err = agg.aggregate(&[]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAggregator(_)));
    }
}
