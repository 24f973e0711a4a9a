//! Operator-tree dispatcher
//!
//! Walks an [`Op`] tree post-order. Children are evaluated first, left
//! before right, and every node returns its own [`Table`]; the node then
//! routes to exactly one [`Evaluator`] transform. Leaves that carry their
//! own result (tables, `null`, services) make no evaluator call.

use crate::algebra::{Op, ServiceOp};
use crate::config::EngineConfig;
use crate::engine::EvalStats;
use crate::evaluator::Evaluator;
use crate::service::ServiceExecutor;
use refarq_core::{Binding, Error, Result, Table, TermPattern};
use tracing::{debug, trace, warn};

/// Evaluate `op` with default settings
pub fn evaluate(
    op: &Op,
    evaluator: &dyn Evaluator,
    services: &dyn ServiceExecutor,
) -> Result<Table> {
    Dispatcher::new(services).run(op, evaluator)
}

/// Per-evaluation dispatcher state
pub struct Dispatcher<'a> {
    services: &'a dyn ServiceExecutor,
    config: EngineConfig,
    stats: EvalStats,
}

impl<'a> Dispatcher<'a> {
    pub fn new(services: &'a dyn ServiceExecutor) -> Self {
        Self {
            services,
            config: EngineConfig::default(),
            stats: EvalStats::default(),
        }
    }

    /// Builder: set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stats(&self) -> &EvalStats {
        &self.stats
    }

    pub fn into_stats(self) -> EvalStats {
        self.stats
    }

    /// Evaluate a whole tree
    ///
    /// The tree is checked before anything runs: an extension node anywhere
    /// outside a service sub-op, or nesting beyond `max_depth`, fails without
    /// evaluating any operator.
    pub fn run(&mut self, op: &Op, evaluator: &dyn Evaluator) -> Result<Table> {
        self.check(op)?;
        let table = self.eval(op, evaluator)?;
        debug!(
            "Evaluated {} operators: {} rows",
            self.stats.operators_evaluated,
            table.len()
        );
        Ok(table)
    }

    /// Iterative pre-pass over the operands the dispatcher will visit
    fn check(&self, root: &Op) -> Result<()> {
        let mut pending = vec![(root, 1usize)];
        while let Some((op, depth)) = pending.pop() {
            if depth > self.config.max_depth {
                return Err(Error::RecursionLimit(self.config.max_depth));
            }
            if let Op::Extension { name, .. } = op {
                return Err(Error::UnsupportedOperator(format!("{} ({})", op.name(), name)));
            }
            pending.extend(op.operands().map(|child| (child, depth + 1)));
        }
        Ok(())
    }

    fn eval(&mut self, op: &Op, evaluator: &dyn Evaluator) -> Result<Table> {
        self.stats.operators_evaluated += 1;
        let table = self.eval_op(op, evaluator)?;
        trace!(op = op.name(), rows = table.len(), "evaluated");
        Ok(table)
    }

    fn eval_op(&mut self, op: &Op, evaluator: &dyn Evaluator) -> Result<Table> {
        match op {
            Op::Bgp(pattern) => evaluator.basic_pattern(pattern),
            Op::QuadPattern(quad) => {
                if quad.is_empty() {
                    return Ok(Table::unit());
                }
                self.in_graph(&quad.graph, evaluator, |_, scoped| {
                    scoped.basic_pattern(&quad.pattern)
                })
            }
            Op::Join { left, right }
            | Op::Sequence { left, right }
            | Op::LeftJoin { left, right, .. }
            | Op::Diff { left, right }
            | Op::Union { left, right } => {
                let left = self.eval(left, evaluator)?;
                let right = self.eval(right, evaluator)?;
                apply_binary(op, evaluator, left, right)
            }
            Op::Graph { graph, sub_op } => {
                self.in_graph(graph, evaluator, |this, scoped| this.eval(sub_op, scoped))
            }
            Op::Service(service) => self.eval_service(service),
            Op::DatasetNames(graph) => dataset_names(graph, evaluator),
            Op::Table(table) => Ok(table.clone()),
            Op::Extension { name, .. } => Err(Error::UnsupportedOperator(format!(
                "{} ({})",
                op.name(),
                name
            ))),
            Op::Null => Ok(Table::empty()),
            Op::Procedure { sub_op, .. }
            | Op::Filter { sub_op, .. }
            | Op::List(sub_op)
            | Op::Order { sub_op, .. }
            | Op::Project { sub_op, .. }
            | Op::Distinct(sub_op)
            | Op::Reduced(sub_op)
            | Op::Slice { sub_op, .. }
            | Op::Assign { sub_op, .. }
            | Op::GroupAgg { sub_op, .. } => {
                let input = self.eval(sub_op, evaluator)?;
                apply_unary(op, evaluator, input)
            }
        }
    }

    /// Run `body` against the graph(s) named by `graph`.
    ///
    /// A concrete name scopes to that graph (empty if absent). A variable
    /// runs `body` once per named graph, joins each result with the graph
    /// name and unions the steps in dataset order.
    fn in_graph<F>(&mut self, graph: &TermPattern, evaluator: &dyn Evaluator, mut body: F) -> Result<Table>
    where
        F: FnMut(&mut Self, &dyn Evaluator) -> Result<Table>,
    {
        match graph {
            TermPattern::Term(name) => match evaluator.for_graph(name) {
                Some(scoped) => body(self, scoped.as_ref()),
                None => {
                    trace!("No graph {}", name);
                    Ok(Table::empty())
                }
            },
            TermPattern::Var(var) => {
                let mut result = Table::empty();
                for name in evaluator.graph_names() {
                    let Some(scoped) = evaluator.for_graph(&name) else {
                        continue;
                    };
                    let step = body(self, scoped.as_ref())?;
                    let step = evaluator.join(step, Table::single(var.clone(), name))?;
                    result = evaluator.union(result, step)?;
                }
                Ok(result)
            }
        }
    }

    fn eval_service(&mut self, service: &ServiceOp) -> Result<Table> {
        let outcome = if self.config.allow_service {
            self.stats.service_calls += 1;
            self.services
                .execute(service)
                .and_then(Table::from_cursor)
        } else {
            Err(Error::Service(format!(
                "service calls are disabled ({})",
                service.endpoint
            )))
        };

        match outcome {
            Ok(table) => Ok(table),
            Err(e) if service.silent => {
                warn!("Silent service {} failed: {}", service.endpoint, e);
                Ok(Table::unit())
            }
            Err(e) => Err(e),
        }
    }
}

/// Route a two-operand node to its evaluator transform
fn apply_binary(op: &Op, evaluator: &dyn Evaluator, left: Table, right: Table) -> Result<Table> {
    match op {
        Op::Join { .. } | Op::Sequence { .. } => evaluator.join(left, right),
        Op::LeftJoin { exprs, .. } => evaluator.left_join(left, right, exprs),
        Op::Diff { .. } => evaluator.diff(left, right),
        Op::Union { .. } => evaluator.union(left, right),
        other => Err(Error::Internal(format!("{} has no two-operand transform", other.name()))),
    }
}

/// Route a one-operand node to its evaluator transform
fn apply_unary(op: &Op, evaluator: &dyn Evaluator, input: Table) -> Result<Table> {
    match op {
        Op::Procedure { proc_id, args, .. } => evaluator.procedure(input, proc_id, args),
        Op::Filter { exprs, .. } => evaluator.filter(exprs, input),
        Op::List(_) => evaluator.list(input),
        Op::Order { conditions, .. } => evaluator.order(input, conditions),
        Op::Project { vars, .. } => evaluator.project(input, vars),
        Op::Distinct(_) => evaluator.distinct(input),
        Op::Reduced(_) => evaluator.reduced(input),
        Op::Slice { start, length, .. } => evaluator.slice(input, *start, *length),
        Op::Assign { assignments, .. } => evaluator.assign(input, assignments),
        Op::GroupAgg {
            group_vars,
            aggregators,
            ..
        } => evaluator.group_by(input, group_vars, aggregators),
        other => Err(Error::Internal(format!("{} has no one-operand transform", other.name()))),
    }
}

fn dataset_names(graph: &TermPattern, evaluator: &dyn Evaluator) -> Result<Table> {
    match graph {
        TermPattern::Var(var) => {
            let rows = evaluator
                .graph_names()
                .into_iter()
                .map(|name| Binding::single(var.clone(), name))
                .collect();
            Ok(Table::new(vec![var.clone()], rows))
        }
        TermPattern::Term(name) if name.is_iri() => {
            if evaluator.contains_graph(name) {
                Ok(Table::unit())
            } else {
                Ok(Table::empty())
            }
        }
        TermPattern::Term(name) => Err(Error::QueryExecution(format!(
            "datasetnames: graph node must be an IRI or variable, got {}",
            name
        ))),
    }
}
