//! Algebra operator trees
//!
//! [`Op`] is the compiled, already-optimized form of a query. Each variant
//! owns exactly the children its kind declares, so evaluation can never
//! reach for a child slot that does not exist.

use crate::aggregate::Aggregator;
use crate::expr::{Expr, write_term};
use refarq_core::{BasicPattern, Iri, QuadPattern, Table, Term, TermPattern, Var};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction for one ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCondition {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl SortCondition {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Descending,
        }
    }
}

/// Subject or object argument of a property-function style procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropFuncArg {
    Node(TermPattern),
    List(Vec<TermPattern>),
}

/// Argument shapes for procedures; exactly one form is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcedureArgs {
    Positional(Vec<Expr>),
    SubjectObject {
        subject: PropFuncArg,
        object: PropFuncArg,
    },
}

/// Remote execution request; the sub-op belongs to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOp {
    pub endpoint: Term,
    pub sub_op: Box<Op>,
    pub silent: bool,
}

/// Operator tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Bgp(BasicPattern),
    QuadPattern(QuadPattern),
    Procedure {
        sub_op: Box<Op>,
        proc_id: Iri,
        args: ProcedureArgs,
    },
    Join {
        left: Box<Op>,
        right: Box<Op>,
    },
    /// Staged join; the reference semantics is a plain join
    Sequence {
        left: Box<Op>,
        right: Box<Op>,
    },
    LeftJoin {
        left: Box<Op>,
        right: Box<Op>,
        exprs: Vec<Expr>,
    },
    Diff {
        left: Box<Op>,
        right: Box<Op>,
    },
    Union {
        left: Box<Op>,
        right: Box<Op>,
    },
    Filter {
        exprs: Vec<Expr>,
        sub_op: Box<Op>,
    },
    Graph {
        graph: TermPattern,
        sub_op: Box<Op>,
    },
    Service(ServiceOp),
    DatasetNames(TermPattern),
    Table(Table),
    /// Extension point with no semantics in this evaluator
    Extension {
        name: String,
        sub_op: Box<Op>,
    },
    Null,
    List(Box<Op>),
    Order {
        sub_op: Box<Op>,
        conditions: Vec<SortCondition>,
    },
    Project {
        sub_op: Box<Op>,
        vars: Vec<Var>,
    },
    Distinct(Box<Op>),
    Reduced(Box<Op>),
    Slice {
        sub_op: Box<Op>,
        start: Option<usize>,
        length: Option<usize>,
    },
    Assign {
        sub_op: Box<Op>,
        assignments: Vec<(Var, Expr)>,
    },
    GroupAgg {
        sub_op: Box<Op>,
        group_vars: Vec<(Var, Option<Expr>)>,
        aggregators: Vec<(Var, Aggregator)>,
    },
}

impl Op {
    /// Operator name, as written in the algebra syntax
    pub fn name(&self) -> &'static str {
        match self {
            Op::Bgp(_) => "bgp",
            Op::QuadPattern(_) => "quadpattern",
            Op::Procedure { args, .. } => match args {
                ProcedureArgs::Positional(_) => "proc",
                ProcedureArgs::SubjectObject { .. } => "propfunc",
            },
            Op::Join { .. } => "join",
            Op::Sequence { .. } => "sequence",
            Op::LeftJoin { .. } => "leftjoin",
            Op::Diff { .. } => "diff",
            Op::Union { .. } => "union",
            Op::Filter { .. } => "filter",
            Op::Graph { .. } => "graph",
            Op::Service(_) => "service",
            Op::DatasetNames(_) => "datasetnames",
            Op::Table(_) => "table",
            Op::Extension { .. } => "ext",
            Op::Null => "null",
            Op::List(_) => "list",
            Op::Order { .. } => "order",
            Op::Project { .. } => "project",
            Op::Distinct(_) => "distinct",
            Op::Reduced(_) => "reduced",
            Op::Slice { .. } => "slice",
            Op::Assign { .. } => "assign",
            Op::GroupAgg { .. } => "group",
        }
    }

    pub fn bgp(pattern: BasicPattern) -> Self {
        Op::Bgp(pattern)
    }

    pub fn table(table: Table) -> Self {
        Op::Table(table)
    }

    pub fn join(left: Op, right: Op) -> Self {
        Op::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn sequence(left: Op, right: Op) -> Self {
        Op::Sequence {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn left_join(left: Op, right: Op, exprs: Vec<Expr>) -> Self {
        Op::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            exprs,
        }
    }

    pub fn diff(left: Op, right: Op) -> Self {
        Op::Diff {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn union(left: Op, right: Op) -> Self {
        Op::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn filter(exprs: Vec<Expr>, sub_op: Op) -> Self {
        Op::Filter {
            exprs,
            sub_op: Box::new(sub_op),
        }
    }

    pub fn graph<G: Into<TermPattern>>(graph: G, sub_op: Op) -> Self {
        Op::Graph {
            graph: graph.into(),
            sub_op: Box::new(sub_op),
        }
    }

    pub fn service(endpoint: Term, sub_op: Op, silent: bool) -> Self {
        Op::Service(ServiceOp {
            endpoint,
            sub_op: Box::new(sub_op),
            silent,
        })
    }

    pub fn procedure(sub_op: Op, proc_id: Iri, args: ProcedureArgs) -> Self {
        Op::Procedure {
            sub_op: Box::new(sub_op),
            proc_id,
            args,
        }
    }

    pub fn extension<S: Into<String>>(name: S, sub_op: Op) -> Self {
        Op::Extension {
            name: name.into(),
            sub_op: Box::new(sub_op),
        }
    }

    pub fn list(sub_op: Op) -> Self {
        Op::List(Box::new(sub_op))
    }

    pub fn order(sub_op: Op, conditions: Vec<SortCondition>) -> Self {
        Op::Order {
            sub_op: Box::new(sub_op),
            conditions,
        }
    }

    pub fn project(sub_op: Op, vars: Vec<Var>) -> Self {
        Op::Project {
            sub_op: Box::new(sub_op),
            vars,
        }
    }

    pub fn distinct(sub_op: Op) -> Self {
        Op::Distinct(Box::new(sub_op))
    }

    pub fn reduced(sub_op: Op) -> Self {
        Op::Reduced(Box::new(sub_op))
    }

    pub fn slice(sub_op: Op, start: Option<usize>, length: Option<usize>) -> Self {
        Op::Slice {
            sub_op: Box::new(sub_op),
            start,
            length,
        }
    }

    pub fn assign(sub_op: Op, assignments: Vec<(Var, Expr)>) -> Self {
        Op::Assign {
            sub_op: Box::new(sub_op),
            assignments,
        }
    }

    pub fn group(
        sub_op: Op,
        group_vars: Vec<(Var, Option<Expr>)>,
        aggregators: Vec<(Var, Aggregator)>,
    ) -> Self {
        Op::GroupAgg {
            sub_op: Box::new(sub_op),
            group_vars,
            aggregators,
        }
    }

    /// Operands evaluated by the dispatcher, left before right.
    /// A service sub-op belongs to the service executor and is not listed.
    pub fn operands(&self) -> impl Iterator<Item = &Op> {
        let (first, second): (Option<&Op>, Option<&Op>) = match self {
            Op::Join { left, right }
            | Op::Sequence { left, right }
            | Op::LeftJoin { left, right, .. }
            | Op::Diff { left, right }
            | Op::Union { left, right } => (Some(&**left), Some(&**right)),
            Op::Procedure { sub_op, .. }
            | Op::Filter { sub_op, .. }
            | Op::Graph { sub_op, .. }
            | Op::Extension { sub_op, .. }
            | Op::Order { sub_op, .. }
            | Op::Project { sub_op, .. }
            | Op::Slice { sub_op, .. }
            | Op::Assign { sub_op, .. }
            | Op::GroupAgg { sub_op, .. }
            | Op::List(sub_op)
            | Op::Distinct(sub_op)
            | Op::Reduced(sub_op) => (Some(&**sub_op), None),
            Op::Bgp(_)
            | Op::QuadPattern(_)
            | Op::Service(_)
            | Op::DatasetNames(_)
            | Op::Table(_)
            | Op::Null => (None, None),
        };
        first.into_iter().chain(second)
    }
}

fn write_opt(f: &mut fmt::Formatter<'_>, value: Option<usize>) -> fmt::Result {
    match value {
        Some(n) => write!(f, "{}", n),
        None => write!(f, "_"),
    }
}

fn write_pattern(f: &mut fmt::Formatter<'_>, tp: &TermPattern) -> fmt::Result {
    match tp {
        TermPattern::Var(v) => write!(f, "{}", v),
        TermPattern::Term(t) => write_term(f, t),
    }
}

fn write_prop_arg(f: &mut fmt::Formatter<'_>, arg: &PropFuncArg) -> fmt::Result {
    match arg {
        PropFuncArg::Node(node) => write_pattern(f, node),
        PropFuncArg::List(nodes) => {
            write!(f, "(")?;
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write_pattern(f, node)?;
            }
            write!(f, ")")
        }
    }
}

fn write_triples(f: &mut fmt::Formatter<'_>, pattern: &BasicPattern) -> fmt::Result {
    for triple in pattern.triples() {
        write!(f, " (triple ")?;
        write_pattern(f, &triple.subject)?;
        write!(f, " ")?;
        write_pattern(f, &triple.predicate)?;
        write!(f, " ")?;
        write_pattern(f, &triple.object)?;
        write!(f, ")")?;
    }
    Ok(())
}

fn write_table(f: &mut fmt::Formatter<'_>, table: &Table) -> fmt::Result {
    if table.is_empty() && table.vars().is_empty() {
        return write!(f, "(table empty)");
    }
    if *table == Table::unit() {
        return write!(f, "(table unit)");
    }
    write!(f, "(table (vars")?;
    for var in table.vars() {
        write!(f, " {}", var)?;
    }
    write!(f, ")")?;
    for row in table.iter() {
        write!(f, " (row")?;
        for (var, value) in row.iter() {
            write!(f, " [{} ", var)?;
            write_term(f, value)?;
            write!(f, "]")?;
        }
        write!(f, ")")?;
    }
    write!(f, ")")
}

impl fmt::Display for Op {
    /// Render in the algebra syntax accepted by [`crate::sse::parse_op`]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Bgp(pattern) => {
                write!(f, "(bgp")?;
                write_triples(f, pattern)?;
                write!(f, ")")
            }
            Op::QuadPattern(quad) => {
                write!(f, "(quadpattern")?;
                for triple in quad.pattern.triples() {
                    write!(f, " (quad ")?;
                    write_pattern(f, &quad.graph)?;
                    for pos in [&triple.subject, &triple.predicate, &triple.object] {
                        write!(f, " ")?;
                        write_pattern(f, pos)?;
                    }
                    write!(f, ")")?;
                }
                if quad.pattern.is_empty() {
                    write!(f, " ")?;
                    write_pattern(f, &quad.graph)?;
                }
                write!(f, ")")
            }
            Op::Procedure {
                sub_op,
                proc_id,
                args,
            } => match args {
                ProcedureArgs::Positional(exprs) => {
                    write!(f, "(proc {} (", proc_id)?;
                    for (i, e) in exprs.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{}", e)?;
                    }
                    write!(f, ") {})", sub_op)
                }
                ProcedureArgs::SubjectObject { subject, object } => {
                    write!(f, "(propfunc {} ", proc_id)?;
                    write_prop_arg(f, subject)?;
                    write!(f, " ")?;
                    write_prop_arg(f, object)?;
                    write!(f, " {})", sub_op)
                }
            },
            Op::Join { left, right }
            | Op::Sequence { left, right }
            | Op::Diff { left, right }
            | Op::Union { left, right } => write!(f, "({} {} {})", self.name(), left, right),
            Op::LeftJoin { left, right, exprs } => {
                write!(f, "(leftjoin {} {}", left, right)?;
                match exprs.as_slice() {
                    [] => {}
                    [single] => write!(f, " {}", single)?,
                    many => {
                        write!(f, " (exprlist")?;
                        for e in many {
                            write!(f, " {}", e)?;
                        }
                        write!(f, ")")?;
                    }
                }
                write!(f, ")")
            }
            Op::Filter { exprs, sub_op } => {
                write!(f, "(filter ")?;
                match exprs.as_slice() {
                    [single] => write!(f, "{}", single)?,
                    many => {
                        write!(f, "(exprlist")?;
                        for e in many {
                            write!(f, " {}", e)?;
                        }
                        write!(f, ")")?;
                    }
                }
                write!(f, " {})", sub_op)
            }
            Op::Graph { graph, sub_op } => {
                write!(f, "(graph ")?;
                write_pattern(f, graph)?;
                write!(f, " {})", sub_op)
            }
            Op::Service(service) => {
                write!(f, "(service ")?;
                if service.silent {
                    write!(f, "silent ")?;
                }
                write!(f, "{} {})", service.endpoint, service.sub_op)
            }
            Op::DatasetNames(graph) => {
                write!(f, "(datasetnames ")?;
                write_pattern(f, graph)?;
                write!(f, ")")
            }
            Op::Table(table) => write_table(f, table),
            Op::Extension { name, sub_op } => write!(f, "(ext {} {})", name, sub_op),
            Op::Null => write!(f, "(null)"),
            Op::List(sub_op) | Op::Distinct(sub_op) | Op::Reduced(sub_op) => {
                write!(f, "({} {})", self.name(), sub_op)
            }
            Op::Order { sub_op, conditions } => {
                write!(f, "(order (")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match c.direction {
                        SortDirection::Ascending => write!(f, "(asc {})", c.expr)?,
                        SortDirection::Descending => write!(f, "(desc {})", c.expr)?,
                    }
                }
                write!(f, ") {})", sub_op)
            }
            Op::Project { sub_op, vars } => {
                write!(f, "(project (")?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ") {})", sub_op)
            }
            Op::Slice {
                sub_op,
                start,
                length,
            } => {
                write!(f, "(slice ")?;
                write_opt(f, *start)?;
                write!(f, " ")?;
                write_opt(f, *length)?;
                write!(f, " {})", sub_op)
            }
            Op::Assign {
                sub_op,
                assignments,
            } => {
                write!(f, "(assign (")?;
                for (i, (v, e)) in assignments.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({} {})", v, e)?;
                }
                write!(f, ") {})", sub_op)
            }
            Op::GroupAgg {
                sub_op,
                group_vars,
                aggregators,
            } => {
                write!(f, "(group (")?;
                for (i, (v, e)) in group_vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match e {
                        Some(e) => write!(f, "({} {})", v, e)?,
                        None => write!(f, "{}", v)?,
                    }
                }
                write!(f, ") (")?;
                for (i, (v, agg)) in aggregators.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({} {})", v, agg)?;
                }
                write!(f, ") {})", sub_op)
            }
        }
    }
}
