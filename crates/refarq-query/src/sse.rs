//! Algebra syntax parser
//!
//! Operator trees are written as S-expressions, one form per operator:
//!
//! ```text
//! (project (?name)
//!   (filter (> ?age 30)
//!     (bgp (triple ?p <http://ex/name> ?name)
//!          (triple ?p <http://ex/age> ?age))))
//! ```
//!
//! Parsing runs in two passes: tokens are read into a tree of syntax nodes,
//! which is then converted into an [`Op`] or [`Expr`].

use crate::aggregate::Aggregator;
use crate::algebra::{Op, ProcedureArgs, PropFuncArg, SortCondition};
use crate::expr::{ArithOp, CompareOp, Expr, Function};
use crate::lexer::{Token, tokenize};
use refarq_core::{
    BasicPattern, Binding, Error, Iri, QuadPattern, Result, Table, Term, TermPattern,
    TriplePattern, Var, xsd,
};

/// Parse one operator tree
pub fn parse_op(input: &str) -> Result<Op> {
    op(&read_single(input)?)
}

/// Parse one expression
pub fn parse_expr(input: &str) -> Result<Expr> {
    expr(&read_single(input)?)
}

/// Deepest bracket nesting accepted by the reader
pub const MAX_NESTING: usize = 128;

fn parse_error<S: AsRef<str>>(message: S, offset: usize) -> Error {
    Error::QueryParse(format!("{} at offset {}", message.as_ref(), offset))
}

/// Syntax tree node
#[derive(Debug, Clone)]
enum Node {
    Var(Var, usize),
    Term(Term, usize),
    Word(String, usize),
    Symbol(&'static str, usize),
    List(Vec<Node>, usize),
    Bracket(Vec<Node>, usize),
}

impl Node {
    fn offset(&self) -> usize {
        match self {
            Node::Var(_, o)
            | Node::Term(_, o)
            | Node::Word(_, o)
            | Node::Symbol(_, o)
            | Node::List(_, o)
            | Node::Bracket(_, o) => *o,
        }
    }

    fn describe(&self) -> String {
        match self {
            Node::Var(v, _) => v.to_string(),
            Node::Term(t, _) => t.to_string(),
            Node::Word(w, _) => w.clone(),
            Node::Symbol(s, _) => (*s).to_string(),
            Node::List(..) => "list".to_string(),
            Node::Bracket(..) => "[...]".to_string(),
        }
    }

    fn as_word(&self) -> Option<&str> {
        match self {
            Node::Word(w, _) => Some(w),
            _ => None,
        }
    }

    fn is_word(&self, word: &str) -> bool {
        self.as_word().is_some_and(|w| w.eq_ignore_ascii_case(word))
    }

    /// List items, or an error naming what was expected
    fn items(&self, what: &str) -> Result<&[Node]> {
        match self {
            Node::List(items, _) => Ok(items),
            other => Err(parse_error(
                format!("expected {}, found {}", what, other.describe()),
                other.offset(),
            )),
        }
    }
}

fn read_single(input: &str) -> Result<Node> {
    let tokens = tokenize(input).map_err(|offset| parse_error("unrecognized input", offset))?;
    let mut reader = Reader {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = reader
        .node()?
        .ok_or_else(|| parse_error("empty input", input.len()))?;
    if let Some((_, offset)) = reader.tokens.get(reader.pos) {
        return Err(parse_error("unexpected trailing input", *offset));
    }
    Ok(node)
}

struct Reader {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Reader {
    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    /// Read one node; `None` at end of input
    fn node(&mut self) -> Result<Option<Node>> {
        let Some((token, offset)) = self.next() else {
            return Ok(None);
        };
        let node = match token {
            Token::LParen => Node::List(self.nested(Token::RParen, offset)?, offset),
            Token::LBracket => Node::Bracket(self.nested(Token::RBracket, offset)?, offset),
            Token::RParen | Token::RBracket => {
                return Err(parse_error("unbalanced closing delimiter", offset));
            }
            Token::Variable(name) => Node::Var(Var::new(name), offset),
            Token::Iri(iri) => Node::Term(Term::iri(iri), offset),
            Token::BlankNode(label) => Node::Term(Term::blank(label), offset),
            Token::String(lexical) => Node::Term(self.literal(lexical, offset)?, offset),
            Token::Integer(n) => Node::Term(Term::integer(n), offset),
            Token::Decimal(lexical) => Node::Term(Term::typed(lexical, xsd::DECIMAL), offset),
            Token::Double(lexical) => Node::Term(Term::typed(lexical, xsd::DOUBLE), offset),
            Token::Word(word) if word == "true" => Node::Term(Term::boolean(true), offset),
            Token::Word(word) if word == "false" => Node::Term(Term::boolean(false), offset),
            Token::Word(word) => Node::Word(word, offset),
            Token::LangTag(_) | Token::DoubleCaret | Token::Comment => {
                return Err(parse_error("literal suffix without a string", offset));
            }
            other => match other.symbol() {
                Some(symbol) => Node::Symbol(symbol, offset),
                None => return Err(parse_error("unexpected token", offset)),
            },
        };
        Ok(Some(node))
    }

    /// Read a bracketed sequence one level deeper
    fn nested(&mut self, close: Token, open_offset: usize) -> Result<Vec<Node>> {
        if self.depth == MAX_NESTING {
            return Err(parse_error(
                format!("nesting deeper than {} levels", MAX_NESTING),
                open_offset,
            ));
        }
        self.depth += 1;
        let items = self.sequence(close, open_offset)?;
        self.depth -= 1;
        Ok(items)
    }

    fn sequence(&mut self, close: Token, open_offset: usize) -> Result<Vec<Node>> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(items);
            }
            match self.node()? {
                Some(node) => items.push(node),
                None => return Err(parse_error("unclosed delimiter", open_offset)),
            }
        }
    }

    /// A string optionally followed by `@lang` or `^^<datatype>`
    fn literal(&mut self, lexical: String, offset: usize) -> Result<Term> {
        match self.peek() {
            Some(Token::LangTag(_)) => {
                let Some((Token::LangTag(lang), _)) = self.next() else {
                    return Err(parse_error("expected language tag", offset));
                };
                Ok(Term::lang_string(lexical, &lang))
            }
            Some(Token::DoubleCaret) => {
                self.pos += 1;
                match self.next() {
                    Some((Token::Iri(datatype), _)) => Ok(Term::typed(lexical, &datatype)),
                    _ => Err(parse_error("expected datatype IRI after ^^", offset)),
                }
            }
            _ => Ok(Term::string(lexical)),
        }
    }
}

// ========== Operators ==========

fn op(node: &Node) -> Result<Op> {
    let items = node.items("operator")?;
    let (head, args) = items
        .split_first()
        .ok_or_else(|| parse_error("empty operator", node.offset()))?;
    let name = head
        .as_word()
        .ok_or_else(|| parse_error("expected operator name", head.offset()))?;
    let at = node.offset();

    match name {
        "bgp" => basic_pattern(args).map(Op::Bgp),
        "quadpattern" => quad_pattern(args, at).map(Op::QuadPattern),
        "triple" | "quad" => Err(parse_error(format!("{} outside a pattern", name), at)),
        "join" | "sequence" | "union" => nary_op(name, args, at),
        "diff" | "minus" | "leftjoin" => binary_op(name, args, at),
        "filter" => filter_op(args, at),
        "graph" => graph_op(args, at),
        "service" => service_op(args, at),
        "datasetnames" => {
            let [graph] = exactly::<1>(args, name, at)?;
            term_pattern(graph).map(Op::DatasetNames)
        }
        "table" => table(args, at).map(Op::Table),
        "ext" => ext_op(args, at),
        "null" => exactly::<0>(args, name, at).map(|_| Op::Null),
        "list" | "distinct" | "reduced" => unary_op(name, args, at),
        "order" => order_op(args, at),
        "project" => project_op(args, at),
        "slice" => slice_op(args, at),
        "assign" => assign_op(args, at),
        "group" => group_op(args, at),
        "proc" | "propfunc" => procedure_op(name, args, at),
        other => Err(parse_error(format!("unknown operator '{}'", other), head.offset())),
    }
}

/// `join`, `sequence` and `union` fold more than two operands to the left
fn nary_op(name: &str, args: &[Node], at: usize) -> Result<Op> {
    let ops = args.iter().map(op).collect::<Result<Vec<_>>>()?;
    let mut ops = ops.into_iter();
    let (Some(first), Some(second)) = (ops.next(), ops.next()) else {
        return Err(parse_error(format!("{} needs at least two operands", name), at));
    };
    let combine = |l: Op, r: Op| match name {
        "join" => Op::join(l, r),
        "sequence" => Op::sequence(l, r),
        _ => Op::union(l, r),
    };
    Ok(ops.fold(combine(first, second), combine))
}

fn binary_op(name: &str, args: &[Node], at: usize) -> Result<Op> {
    match (name, args) {
        ("leftjoin", [left, right]) => Ok(Op::left_join(op(left)?, op(right)?, Vec::new())),
        ("leftjoin", [left, right, exprs]) => {
            Ok(Op::left_join(op(left)?, op(right)?, expr_list(exprs)?))
        }
        ("leftjoin", _) => Err(parse_error(
            "leftjoin takes two operands and optional expressions",
            at,
        )),
        _ => {
            let [left, right] = exactly::<2>(args, name, at)?;
            Ok(Op::diff(op(left)?, op(right)?))
        }
    }
}

fn unary_op(name: &str, args: &[Node], at: usize) -> Result<Op> {
    let [sub] = exactly::<1>(args, name, at)?;
    let sub = op(sub)?;
    Ok(match name {
        "list" => Op::list(sub),
        "distinct" => Op::distinct(sub),
        _ => Op::reduced(sub),
    })
}

fn filter_op(args: &[Node], at: usize) -> Result<Op> {
    let [exprs, sub] = exactly::<2>(args, "filter", at)?;
    Ok(Op::filter(expr_list(exprs)?, op(sub)?))
}

fn graph_op(args: &[Node], at: usize) -> Result<Op> {
    let [graph, sub] = exactly::<2>(args, "graph", at)?;
    Ok(Op::graph(term_pattern(graph)?, op(sub)?))
}

fn service_op(args: &[Node], at: usize) -> Result<Op> {
    let (silent, rest) = match args.split_first() {
        Some((first, rest)) if first.is_word("silent") => (true, rest),
        _ => (false, args),
    };
    let [endpoint, sub] = exactly::<2>(rest, "service", at)?;
    let endpoint = match term_pattern(endpoint)? {
        TermPattern::Term(t) => t,
        TermPattern::Var(_) => {
            return Err(parse_error("service endpoint must be a term", endpoint.offset()));
        }
    };
    Ok(Op::service(endpoint, op(sub)?, silent))
}

fn ext_op(args: &[Node], at: usize) -> Result<Op> {
    match args {
        [ext_name] => Ok(Op::extension(ext_name.describe(), Op::Null)),
        [ext_name, sub] => Ok(Op::extension(ext_name.describe(), op(sub)?)),
        _ => Err(parse_error("ext takes a name and an optional operand", at)),
    }
}

fn order_op(args: &[Node], at: usize) -> Result<Op> {
    let [conditions, sub] = exactly::<2>(args, "order", at)?;
    let conditions = conditions
        .items("sort conditions")?
        .iter()
        .map(sort_condition)
        .collect::<Result<Vec<_>>>()?;
    Ok(Op::order(op(sub)?, conditions))
}

fn project_op(args: &[Node], at: usize) -> Result<Op> {
    let [vars, sub] = exactly::<2>(args, "project", at)?;
    let vars = vars
        .items("variable list")?
        .iter()
        .map(var)
        .collect::<Result<Vec<_>>>()?;
    Ok(Op::project(op(sub)?, vars))
}

fn slice_op(args: &[Node], at: usize) -> Result<Op> {
    let [start, length, sub] = exactly::<3>(args, "slice", at)?;
    Ok(Op::slice(op(sub)?, slice_bound(start)?, slice_bound(length)?))
}

fn assign_op(args: &[Node], at: usize) -> Result<Op> {
    let [assignments, sub] = exactly::<2>(args, "assign", at)?;
    let assignments = assignments
        .items("assignments")?
        .iter()
        .map(var_expr)
        .collect::<Result<Vec<_>>>()?;
    Ok(Op::assign(op(sub)?, assignments))
}

fn group_op(args: &[Node], at: usize) -> Result<Op> {
    let [group_vars, aggregators, sub] = exactly::<3>(args, "group", at)?;
    let group_vars = group_vars
        .items("group variables")?
        .iter()
        .map(|n| match n {
            Node::Var(v, _) => Ok((v.clone(), None)),
            other => var_expr(other).map(|(v, e)| (v, Some(e))),
        })
        .collect::<Result<Vec<_>>>()?;
    let aggregators = aggregators
        .items("aggregators")?
        .iter()
        .map(|n| {
            let [v, agg] = exactly::<2>(n.items("(?var aggregate)")?, "aggregate binding", n.offset())?;
            Ok((var(v)?, aggregator(agg)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Op::group(op(sub)?, group_vars, aggregators))
}

/// `(proc <iri> (args...) sub)` or `(propfunc <iri> S O sub)`
fn procedure_op(name: &str, args: &[Node], at: usize) -> Result<Op> {
    if name == "proc" {
        let [proc_id, proc_args, sub] = exactly::<3>(args, name, at)?;
        let proc_args = proc_args
            .items("argument list")?
            .iter()
            .map(expr)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Op::procedure(op(sub)?, iri(proc_id)?, ProcedureArgs::Positional(proc_args)));
    }
    let [proc_id, subject, object, sub] = exactly::<4>(args, name, at)?;
    let args = ProcedureArgs::SubjectObject {
        subject: prop_arg(subject)?,
        object: prop_arg(object)?,
    };
    Ok(Op::procedure(op(sub)?, iri(proc_id)?, args))
}

fn exactly<'a, const N: usize>(args: &'a [Node], name: &str, at: usize) -> Result<&'a [Node; N]> {
    args.try_into().map_err(|_| {
        parse_error(
            format!("{} takes {} operand(s), found {}", name, N, args.len()),
            at,
        )
    })
}

fn var(node: &Node) -> Result<Var> {
    match node {
        Node::Var(v, _) => Ok(v.clone()),
        other => Err(parse_error(
            format!("expected variable, found {}", other.describe()),
            other.offset(),
        )),
    }
}

fn term(node: &Node) -> Result<Term> {
    match node {
        Node::Term(t, _) => Ok(t.clone()),
        other => Err(parse_error(
            format!("expected term, found {}", other.describe()),
            other.offset(),
        )),
    }
}

fn iri(node: &Node) -> Result<Iri> {
    match node {
        Node::Term(Term::Iri(iri), _) => Ok(iri.clone()),
        other => Err(parse_error(
            format!("expected IRI, found {}", other.describe()),
            other.offset(),
        )),
    }
}

fn term_pattern(node: &Node) -> Result<TermPattern> {
    match node {
        Node::Var(v, _) => Ok(TermPattern::Var(v.clone())),
        other => term(other).map(TermPattern::Term),
    }
}

fn prop_arg(node: &Node) -> Result<PropFuncArg> {
    match node {
        Node::List(items, _) => Ok(PropFuncArg::List(
            items.iter().map(term_pattern).collect::<Result<Vec<_>>>()?,
        )),
        other => term_pattern(other).map(PropFuncArg::Node),
    }
}

fn basic_pattern(args: &[Node]) -> Result<BasicPattern> {
    args.iter()
        .map(|n| {
            let items = n.items("(triple s p o)")?;
            match items {
                [head, s, p, o] if head.is_word("triple") => Ok(TriplePattern::new(
                    term_pattern(s)?,
                    term_pattern(p)?,
                    term_pattern(o)?,
                )),
                _ => Err(parse_error("expected (triple s p o)", n.offset())),
            }
        })
        .collect()
}

fn quad_pattern(args: &[Node], at: usize) -> Result<QuadPattern> {
    // `(quadpattern g)` is the empty pattern in graph g
    if let [graph] = args {
        if !matches!(graph, Node::List(..)) {
            return Ok(QuadPattern::new(term_pattern(graph)?, BasicPattern::default()));
        }
    }

    let mut graph: Option<TermPattern> = None;
    let mut pattern = BasicPattern::default();
    for n in args {
        let items = n.items("(quad g s p o)")?;
        let [head, g, s, p, o] = items else {
            return Err(parse_error("expected (quad g s p o)", n.offset()));
        };
        if !head.is_word("quad") {
            return Err(parse_error("expected (quad g s p o)", n.offset()));
        }
        let g = term_pattern(g)?;
        match &graph {
            Some(existing) if *existing != g => {
                return Err(parse_error("all quads must share one graph", n.offset()));
            }
            Some(_) => {}
            None => graph = Some(g),
        }
        pattern.push(TriplePattern::new(
            term_pattern(s)?,
            term_pattern(p)?,
            term_pattern(o)?,
        ));
    }
    let graph = graph.ok_or_else(|| parse_error("quadpattern needs a graph", at))?;
    Ok(QuadPattern::new(graph, pattern))
}

fn table(args: &[Node], at: usize) -> Result<Table> {
    match args {
        [word] if word.is_word("unit") => return Ok(Table::unit()),
        [word] if word.is_word("empty") => return Ok(Table::empty()),
        _ => {}
    }

    let mut vars = Vec::new();
    let mut rows = Vec::new();
    for (i, n) in args.iter().enumerate() {
        let items = n.items("(vars ...) or (row ...)")?;
        let Some((head, rest)) = items.split_first() else {
            return Err(parse_error("empty table clause", n.offset()));
        };
        if head.is_word("vars") && i == 0 {
            vars = rest.iter().map(var).collect::<Result<Vec<_>>>()?;
        } else if head.is_word("row") {
            let mut row = Binding::new();
            for cell in rest {
                let Node::Bracket(pair, offset) = cell else {
                    return Err(parse_error("expected [?var term]", cell.offset()));
                };
                let [v, value] = exactly::<2>(pair, "row cell", *offset)?;
                row.insert(var(v)?, term(value)?);
            }
            rows.push(row);
        } else {
            return Err(parse_error("expected (vars ...) or (row ...)", n.offset()));
        }
    }
    if args.is_empty() {
        return Err(parse_error("table needs unit, empty or vars/rows", at));
    }
    Ok(Table::new(vars, rows))
}

fn slice_bound(node: &Node) -> Result<Option<usize>> {
    match node {
        Node::Symbol("_", _) => Ok(None),
        Node::Term(t, offset) => t
            .as_literal()
            .filter(|lit| lit.datatype_str() == xsd::INTEGER)
            .and_then(|lit| lit.lexical.parse::<usize>().ok())
            .map(Some)
            .ok_or_else(|| parse_error("slice bound must be a non-negative integer or _", *offset)),
        other => Err(parse_error(
            format!("expected slice bound, found {}", other.describe()),
            other.offset(),
        )),
    }
}

fn sort_condition(node: &Node) -> Result<SortCondition> {
    if let Node::List(items, _) = node {
        if let [head, e] = items.as_slice() {
            if head.is_word("asc") {
                return Ok(SortCondition::asc(expr(e)?));
            }
            if head.is_word("desc") {
                return Ok(SortCondition::desc(expr(e)?));
            }
        }
    }
    Ok(SortCondition::asc(expr(node)?))
}

fn var_expr(node: &Node) -> Result<(Var, Expr)> {
    let [v, e] = exactly::<2>(node.items("(?var expr)")?, "binding", node.offset())?;
    Ok((var(v)?, expr(e)?))
}

// ========== Expressions ==========

/// A single expression or `(exprlist e...)`
fn expr_list(node: &Node) -> Result<Vec<Expr>> {
    if let Node::List(items, _) = node {
        if let Some((head, rest)) = items.split_first() {
            if head.is_word("exprlist") {
                return rest.iter().map(expr).collect();
            }
        }
    }
    Ok(vec![expr(node)?])
}

fn expr(node: &Node) -> Result<Expr> {
    let items = match node {
        Node::Var(v, _) => return Ok(Expr::Var(v.clone())),
        Node::Term(t, _) => return Ok(Expr::Constant(t.clone())),
        Node::List(items, _) => items,
        other => {
            return Err(parse_error(
                format!("expected expression, found {}", other.describe()),
                other.offset(),
            ));
        }
    };
    let at = node.offset();
    let (head, args) = items
        .split_first()
        .ok_or_else(|| parse_error("empty expression", at))?;

    let name = match head {
        Node::Symbol(s, _) => *s,
        Node::Word(w, _) => w.as_str(),
        other => {
            return Err(parse_error(
                format!("expected operator, found {}", other.describe()),
                other.offset(),
            ));
        }
    };

    let binary = |args: &[Node]| -> Result<(Expr, Expr)> {
        let [l, r] = exactly::<2>(args, name, at)?;
        Ok((expr(l)?, expr(r)?))
    };

    let compare = |op: CompareOp| -> Result<Expr> {
        let (l, r) = binary(args)?;
        Ok(Expr::compare(op, l, r))
    };
    let arith = |op: ArithOp| -> Result<Expr> {
        let (l, r) = binary(args)?;
        Ok(Expr::arithmetic(op, l, r))
    };

    match name {
        "=" => compare(CompareOp::Eq),
        "!=" => compare(CompareOp::Ne),
        "<" => compare(CompareOp::Lt),
        "<=" => compare(CompareOp::Le),
        ">" => compare(CompareOp::Gt),
        ">=" => compare(CompareOp::Ge),
        "+" => arith(ArithOp::Add),
        "*" => arith(ArithOp::Mul),
        "/" => arith(ArithOp::Div),
        "-" => match args {
            [operand] => Ok(Expr::Negate(Box::new(expr(operand)?))),
            _ => arith(ArithOp::Sub),
        },
        "&&" | "and" => {
            let (l, r) = binary(args)?;
            Ok(Expr::And(Box::new(l), Box::new(r)))
        }
        "||" | "or" => {
            let (l, r) = binary(args)?;
            Ok(Expr::Or(Box::new(l), Box::new(r)))
        }
        "!" | "not" => {
            let [operand] = exactly::<1>(args, name, at)?;
            Ok(Expr::Not(Box::new(expr(operand)?)))
        }
        "bound" => {
            let [v] = exactly::<1>(args, name, at)?;
            Ok(Expr::Bound(var(v)?))
        }
        "if" => {
            let [c, t, e] = exactly::<3>(args, name, at)?;
            Ok(Expr::If(
                Box::new(expr(c)?),
                Box::new(expr(t)?),
                Box::new(expr(e)?),
            ))
        }
        other => match Function::from_name(other) {
            Some(function) => Ok(Expr::Call(
                function,
                args.iter().map(expr).collect::<Result<Vec<_>>>()?,
            )),
            None => Err(parse_error(format!("unknown function '{}'", other), head.offset())),
        },
    }
}

fn aggregator(node: &Node) -> Result<Aggregator> {
    let items = node.items("aggregate")?;
    let at = node.offset();
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| parse_error("empty aggregate", at))?;
    let name = head
        .as_word()
        .ok_or_else(|| parse_error("expected aggregate name", head.offset()))?
        .to_ascii_lowercase();

    if name == "agg" {
        let (agg_iri, args) = rest
            .split_first()
            .ok_or_else(|| parse_error("agg needs an IRI", at))?;
        return Ok(Aggregator::Custom {
            iri: iri(agg_iri)?,
            args: args.iter().map(expr).collect::<Result<Vec<_>>>()?,
        });
    }

    let (distinct, rest) = match rest.split_first() {
        Some((first, rest)) if first.is_word("distinct") => (true, rest),
        _ => (false, rest),
    };

    if name == "count" && rest.is_empty() {
        return Ok(Aggregator::CountAll { distinct });
    }

    let (operand, extra) = rest
        .split_first()
        .ok_or_else(|| parse_error(format!("{} needs an expression", name), at))?;
    let e = expr(operand)?;

    if name == "group_concat" {
        let separator = match extra {
            [] => None,
            [sep] => Some(
                term(sep)?
                    .as_literal()
                    .map(|lit| lit.lexical.clone())
                    .ok_or_else(|| parse_error("separator must be a string", sep.offset()))?,
            ),
            _ => return Err(parse_error("group_concat takes an expression and a separator", at)),
        };
        return Ok(Aggregator::GroupConcat {
            expr: e,
            distinct,
            separator,
        });
    }

    if !extra.is_empty() {
        return Err(parse_error(format!("{} takes one expression", name), at));
    }
    let agg = match name.as_str() {
        "count" => Aggregator::Count { expr: e, distinct },
        "sum" => Aggregator::Sum { expr: e, distinct },
        "min" => Aggregator::Min { expr: e, distinct },
        "max" => Aggregator::Max { expr: e, distinct },
        "avg" => Aggregator::Avg { expr: e, distinct },
        "sample" => Aggregator::Sample { expr: e, distinct },
        other => return Err(parse_error(format!("unknown aggregate '{}'", other), head.offset())),
    };
    Ok(agg)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse, print, and parse again
    fn round_trip(text: &str) -> Op {
        let op = parse_op(text).unwrap();
        let reparsed = parse_op(&op.to_string()).unwrap();
        assert_eq!(op, reparsed, "printed as {}", op);
        op
    }

    #[test]
    fn test_every_operator_kind() {
        let forms = [
            "(bgp (triple ?s <http://ex/p> ?o))",
            "(quadpattern (quad <http://ex/g> ?s ?p ?o))",
            "(quadpattern ?g)",
            "(proc <http://ex/proc> (?x 1) (table unit))",
            "(propfunc <http://ex/pf> ?s (\"a b\" \" \") (table unit))",
            "(join (table unit) (null))",
            "(sequence (table unit) (null))",
            "(leftjoin (table unit) (null) (= ?x 1))",
            "(leftjoin (table unit) (null) (exprlist (= ?x 1) (bound ?y)))",
            "(diff (table unit) (null))",
            "(union (table unit) (null))",
            "(filter (> ?x 3) (table unit))",
            "(filter (exprlist (> ?x 3) (< ?x 9)) (table unit))",
            "(graph <http://ex/g> (null))",
            "(graph ?g (null))",
            "(service <http://ex/sparql> (null))",
            "(service silent <http://ex/sparql> (null))",
            "(datasetnames ?g)",
            "(table empty)",
            "(table (vars ?x ?y) (row [?x 1] [?y \"a\"@en]) (row [?x 2.5]))",
            "(ext custom (null))",
            "(null)",
            "(list (null))",
            "(order ((desc ?x) (asc ?y)) (null))",
            "(project (?x ?y) (null))",
            "(distinct (null))",
            "(reduced (null))",
            "(slice 1 _ (null))",
            "(slice _ 10 (null))",
            "(assign ((?z (+ ?x 1))) (null))",
            "(group (?g (?h (str ?x))) ((?c (count)) (?s (sum distinct ?x)) (?l (group_concat ?x \",\"))) (null))",
        ];
        for form in forms {
            round_trip(form);
        }
    }

    #[test]
    fn test_parse_details() {
        let op = parse_op("(slice 1 _ (order (?x) (null)))").unwrap();
        let Op::Slice { start, length, sub_op } = op else {
            panic!("expected slice");
        };
        assert_eq!((start, length), (Some(1), None));
        assert!(matches!(*sub_op, Op::Order { .. }));

        let op = parse_op("(ext custom)").unwrap();
        assert_eq!(op, Op::extension("custom", Op::Null));

        let op = parse_op("(join (null) (null) (null))").unwrap();
        assert_eq!(op, Op::join(Op::join(Op::Null, Op::Null), Op::Null));
    }

    #[test]
    fn test_literals() {
        let op = parse_op(r#"(table (vars ?x) (row [?x "5"^^<http://www.w3.org/2001/XMLSchema#integer>]))"#)
            .unwrap();
        let Op::Table(table) = op else {
            panic!("expected table");
        };
        assert_eq!(table.rows()[0].get(&Var::new("x")), Some(&Term::integer(5)));
    }

    #[test]
    fn test_expressions() {
        let e = parse_expr("(&& (regex ?name \"^a\" \"i\") (! (bound ?age)))").unwrap();
        assert_eq!(e.to_string(), "(&& (regex ?name \"^a\" \"i\") (! (bound ?age)))");

        let neg = parse_expr("(- ?x)").unwrap();
        assert!(matches!(neg, Expr::Negate(_)));
        let sub = parse_expr("(- ?x 1)").unwrap();
        assert!(matches!(sub, Expr::Arithmetic(ArithOp::Sub, _, _)));
        assert!(matches!(parse_expr("true").unwrap(), Expr::Constant(_)));
    }

    #[test]
    fn test_custom_aggregate() {
        let op = round_trip("(group () ((?m (agg <http://ex/median> ?x))) (null))");
        let Op::GroupAgg { aggregators, .. } = op else {
            panic!("expected group");
        };
        assert!(matches!(aggregators[0].1, Aggregator::Custom { .. }));
    }

    fn nested_distinct(levels: usize) -> String {
        format!("{}(null){}", "(distinct ".repeat(levels), ")".repeat(levels))
    }

    #[test]
    fn test_nesting_limit() {
        assert!(parse_op(&nested_distinct(MAX_NESTING - 1)).is_ok());

        let err = parse_op(&nested_distinct(MAX_NESTING)).unwrap_err();
        assert!(matches!(err, Error::QueryParse(_)), "{err}");

        let err = parse_op(&nested_distinct(100_000)).unwrap_err();
        assert!(matches!(err, Error::QueryParse(_)), "{err}");

        let deep_expr = format!("{}?x{}", "(! ".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(parse_expr(&deep_expr), Err(Error::QueryParse(_))));
    }

    #[test]
    fn test_numeric_short_forms_round_trip() {
        for form in [
            r#"(table (vars ?x) (row [?x "05"^^<http://www.w3.org/2001/XMLSchema#integer>]))"#,
            r#"(table (vars ?x) (row [?x "+7"^^<http://www.w3.org/2001/XMLSchema#integer>]))"#,
            r#"(table (vars ?x) (row [?x "1."^^<http://www.w3.org/2001/XMLSchema#decimal>]))"#,
            r#"(table (vars ?x) (row [?x "3"^^<http://www.w3.org/2001/XMLSchema#decimal>]))"#,
            r#"(table (vars ?x) (row [?x "1"^^<http://www.w3.org/2001/XMLSchema#boolean>]))"#,
            r#"(filter (= ?x "05"^^<http://www.w3.org/2001/XMLSchema#integer>) (null))"#,
            "(filter (&& (= ?x -3) (= ?y 2.50)) (null))",
        ] {
            round_trip(form);
        }

        let op = parse_op("(filter (= ?x 12) (null))").unwrap();
        assert_eq!(op.to_string(), "(filter (= ?x 12) (null))");
    }

    #[test]
    fn test_errors() {
        for bad in [
            "",
            "(bgp",
            "(bgp))",
            "(frobnicate (null))",
            "(join (null))",
            "(slice -1 _ (null))",
            "(filter (nosuchfn ?x) (null))",
            "(quadpattern (quad <http://ex/a> ?s ?p ?o) (quad <http://ex/b> ?s ?p ?o))",
            "(table)",
            "(null) (null)",
            "(bgp $)",
        ] {
            let err = parse_op(bad).unwrap_err();
            assert!(matches!(err, Error::QueryParse(_)), "{bad}: {err}");
        }
    }
}
