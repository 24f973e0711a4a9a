//! Filter and assignment expressions
//!
//! Expressions are evaluated against one binding at a time. Any failure
//! (unbound variable, type mismatch, bad regex) is an
//! [`Error::ExpressionEval`]; callers decide whether that drops a row or
//! leaves a variable unbound.

use refarq_core::{Binding, Error, Literal, Numeric, Result, Term, Var, xsd};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    SameTerm,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Str,
    Lang,
    Datatype,
    StrLen,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    Regex,
}

impl Function {
    const ALL: [Function; 15] = [
        Function::SameTerm,
        Function::IsIri,
        Function::IsBlank,
        Function::IsLiteral,
        Function::IsNumeric,
        Function::Str,
        Function::Lang,
        Function::Datatype,
        Function::StrLen,
        Function::UCase,
        Function::LCase,
        Function::Contains,
        Function::StrStarts,
        Function::StrEnds,
        Function::Regex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Function::SameTerm => "sameTerm",
            Function::IsIri => "isIRI",
            Function::IsBlank => "isBlank",
            Function::IsLiteral => "isLiteral",
            Function::IsNumeric => "isNumeric",
            Function::Str => "str",
            Function::Lang => "lang",
            Function::Datatype => "datatype",
            Function::StrLen => "strlen",
            Function::UCase => "ucase",
            Function::LCase => "lcase",
            Function::Contains => "contains",
            Function::StrStarts => "strstarts",
            Function::StrEnds => "strends",
            Function::Regex => "regex",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Function> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Accepted argument counts (inclusive)
    fn arity(&self) -> (usize, usize) {
        match self {
            Function::SameTerm
            | Function::Contains
            | Function::StrStarts
            | Function::StrEnds => (2, 2),
            Function::Regex => (2, 3),
            _ => (1, 1),
        }
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Var(Var),
    Constant(Term),
    Bound(Var),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arithmetic(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(Var::new(name))
    }

    pub fn constant<T: Into<Term>>(term: T) -> Self {
        Expr::Constant(term.into())
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare(op, Box::new(left), Box::new(right))
    }

    pub fn arithmetic(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Arithmetic(op, Box::new(left), Box::new(right))
    }

    /// Evaluate to a term
    pub fn eval(&self, binding: &Binding) -> Result<Term> {
        match self {
            Expr::Var(var) => binding
                .get(var)
                .cloned()
                .ok_or_else(|| Error::expr(format!("unbound variable {}", var))),
            Expr::Constant(term) => Ok(term.clone()),
            Expr::Bound(var) => Ok(Term::boolean(binding.contains(var))),
            Expr::Not(inner) => Ok(Term::boolean(!inner.is_true(binding)?)),
            Expr::And(left, right) => {
                // false wins over an error on the other side
                match (left.is_true(binding), right.is_true(binding)) {
                    (Ok(false), _) | (_, Ok(false)) => Ok(Term::boolean(false)),
                    (Ok(true), Ok(true)) => Ok(Term::boolean(true)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expr::Or(left, right) => match (left.is_true(binding), right.is_true(binding)) {
                (Ok(true), _) | (_, Ok(true)) => Ok(Term::boolean(true)),
                (Ok(false), Ok(false)) => Ok(Term::boolean(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            Expr::Compare(op, left, right) => {
                let l = left.eval(binding)?;
                let r = right.eval(binding)?;
                let result = match op {
                    CompareOp::Eq => terms_equal(&l, &r)?,
                    CompareOp::Ne => !terms_equal(&l, &r)?,
                    CompareOp::Lt => compare_values(&l, &r)? == Ordering::Less,
                    CompareOp::Le => compare_values(&l, &r)? != Ordering::Greater,
                    CompareOp::Gt => compare_values(&l, &r)? == Ordering::Greater,
                    CompareOp::Ge => compare_values(&l, &r)? != Ordering::Less,
                };
                Ok(Term::boolean(result))
            }
            Expr::Arithmetic(op, left, right) => {
                let l = numeric_arg(&left.eval(binding)?)?;
                let r = numeric_arg(&right.eval(binding)?)?;
                arithmetic(*op, l, r).map(Numeric::into_term)
            }
            Expr::Negate(inner) => {
                let value = numeric_arg(&inner.eval(binding)?)?;
                let negated = match value {
                    Numeric::Integer(i) => Numeric::Integer(
                        i.checked_neg()
                            .ok_or_else(|| Error::expr("integer overflow"))?,
                    ),
                    Numeric::Decimal(d) => Numeric::Decimal(-d),
                    Numeric::Double(d) => Numeric::Double(-d),
                };
                Ok(negated.into_term())
            }
            Expr::If(cond, then, otherwise) => {
                if cond.is_true(binding)? {
                    then.eval(binding)
                } else {
                    otherwise.eval(binding)
                }
            }
            Expr::Call(function, args) => call(*function, args, binding),
        }
    }

    /// Evaluate and reduce to an effective boolean value
    pub fn is_true(&self, binding: &Binding) -> Result<bool> {
        effective_boolean_value(&self.eval(binding)?)
    }

    /// Filter semantics: errors count as false
    pub fn is_satisfied(&self, binding: &Binding) -> bool {
        self.is_true(binding).unwrap_or(false)
    }
}

/// Effective boolean value of a term
pub fn effective_boolean_value(term: &Term) -> Result<bool> {
    let lit = term
        .as_literal()
        .ok_or_else(|| Error::expr(format!("no boolean value for {}", term)))?;
    if let Some(b) = lit.boolean() {
        return Ok(b);
    }
    if let Some(n) = lit.numeric() {
        let v = n.as_f64();
        return Ok(v != 0.0 && !v.is_nan());
    }
    if lit.datatype.is_none() {
        return Ok(!lit.lexical.is_empty());
    }
    Err(Error::expr(format!("no boolean value for {}", term)))
}

/// Value equality as used by `=`
pub fn terms_equal(left: &Term, right: &Term) -> Result<bool> {
    if left == right {
        return Ok(true);
    }
    match (left.as_literal(), right.as_literal()) {
        (Some(l), Some(r)) => match compare_literals(l, r) {
            Some(ord) => Ok(ord == Ordering::Equal),
            None if l.datatype == r.datatype && l.language == r.language => Ok(false),
            None => Err(Error::expr(format!("cannot compare {} and {}", left, right))),
        },
        _ => Ok(false),
    }
}

/// Value ordering as used by `<` and friends; incomparable values are errors
pub fn compare_values(left: &Term, right: &Term) -> Result<Ordering> {
    match (left.as_literal(), right.as_literal()) {
        (Some(l), Some(r)) => compare_literals(l, r)
            .ok_or_else(|| Error::expr(format!("cannot compare {} and {}", left, right))),
        _ => Err(Error::expr(format!("cannot compare {} and {}", left, right))),
    }
}

fn compare_literals(l: &Literal, r: &Literal) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (l.numeric(), r.numeric()) {
        return match (a, b) {
            (Numeric::Integer(x), Numeric::Integer(y)) => Some(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        };
    }
    if let (Some(a), Some(b)) = (l.boolean(), r.boolean()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (l.date_time(), r.date_time()) {
        return Some(a.cmp(&b));
    }
    if l.is_string() && r.is_string() {
        return Some(l.lexical.cmp(&r.lexical));
    }
    None
}

/// Total order used by ORDER BY: unbound < blank < IRI < literal
pub fn order_terms(left: Option<&Term>, right: Option<&Term>) -> Ordering {
    fn rank(term: Option<&Term>) -> u8 {
        match term {
            None => 0,
            Some(Term::BlankNode(_)) => 1,
            Some(Term::Iri(_)) => 2,
            Some(Term::Literal(_)) => 3,
        }
    }

    match (left, right) {
        (Some(Term::BlankNode(a)), Some(Term::BlankNode(b))) => a.cmp(b),
        (Some(Term::Iri(a)), Some(Term::Iri(b))) => a.as_str().cmp(b.as_str()),
        (Some(Term::Literal(a)), Some(Term::Literal(b))) => compare_literals(a, b)
            .unwrap_or_else(|| {
                a.lexical
                    .cmp(&b.lexical)
                    .then_with(|| a.language.cmp(&b.language))
                    .then_with(|| a.datatype_str().cmp(b.datatype_str()))
            }),
        _ => rank(left).cmp(&rank(right)),
    }
}

fn numeric_arg(term: &Term) -> Result<Numeric> {
    term.numeric()
        .ok_or_else(|| Error::expr(format!("not a number: {}", term)))
}

pub(crate) fn arithmetic(op: ArithOp, left: Numeric, right: Numeric) -> Result<Numeric> {
    use Numeric::*;

    if let (Integer(a), Integer(b)) = (left, right) {
        let overflow = || Error::expr("integer overflow");
        return match op {
            ArithOp::Add => a.checked_add(b).map(Integer).ok_or_else(overflow),
            ArithOp::Sub => a.checked_sub(b).map(Integer).ok_or_else(overflow),
            ArithOp::Mul => a.checked_mul(b).map(Integer).ok_or_else(overflow),
            ArithOp::Div if b == 0 => Err(Error::expr("division by zero")),
            ArithOp::Div => Ok(Decimal(a as f64 / b as f64)),
        };
    }

    let double = matches!(left, Double(_)) || matches!(right, Double(_));
    let (a, b) = (left.as_f64(), right.as_f64());
    let value = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div if b == 0.0 && !double => return Err(Error::expr("division by zero")),
        ArithOp::Div => a / b,
    };
    Ok(if double { Double(value) } else { Decimal(value) })
}

/// String-valued literal argument (simple or language-tagged)
fn string_arg(term: &Term) -> Result<&Literal> {
    match term.as_literal() {
        Some(lit) if lit.datatype.is_none() => Ok(lit),
        _ => Err(Error::expr(format!("not a string: {}", term))),
    }
}

fn call(function: Function, args: &[Expr], binding: &Binding) -> Result<Term> {
    let (min, max) = function.arity();
    if args.len() < min || args.len() > max {
        return Err(Error::expr(format!(
            "{} expects {} arguments, got {}",
            function.name(),
            if min == max { min.to_string() } else { format!("{}-{}", min, max) },
            args.len()
        )));
    }

    let values = args
        .iter()
        .map(|a| a.eval(binding))
        .collect::<Result<Vec<_>>>()?;
    let first = &values[0];

    let term = match function {
        Function::SameTerm => Term::boolean(values[0] == values[1]),
        Function::IsIri => Term::boolean(first.is_iri()),
        Function::IsBlank => Term::boolean(first.is_blank()),
        Function::IsLiteral => Term::boolean(first.is_literal()),
        Function::IsNumeric => Term::boolean(first.numeric().is_some()),
        Function::Str => match first {
            Term::Iri(iri) => Term::string(iri.as_str()),
            Term::Literal(lit) => Term::string(lit.lexical.clone()),
            Term::BlankNode(_) => return Err(Error::expr("str() of a blank node")),
        },
        Function::Lang => match first.as_literal() {
            Some(lit) => Term::string(lit.language.clone().unwrap_or_default()),
            None => return Err(Error::expr(format!("lang() of non-literal {}", first))),
        },
        Function::Datatype => match first.as_literal() {
            Some(lit) => Term::iri(lit.datatype_str()),
            None => return Err(Error::expr(format!("datatype() of non-literal {}", first))),
        },
        Function::StrLen => Term::integer(string_arg(first)?.lexical.chars().count() as i64),
        Function::UCase | Function::LCase => {
            let lit = string_arg(first)?;
            let lexical = if function == Function::UCase {
                lit.lexical.to_uppercase()
            } else {
                lit.lexical.to_lowercase()
            };
            Term::Literal(Literal {
                lexical,
                language: lit.language.clone(),
                datatype: None,
            })
        }
        Function::Contains | Function::StrStarts | Function::StrEnds => {
            let haystack = &string_arg(first)?.lexical;
            let needle = &string_arg(&values[1])?.lexical;
            Term::boolean(match function {
                Function::Contains => haystack.contains(needle.as_str()),
                Function::StrStarts => haystack.starts_with(needle.as_str()),
                _ => haystack.ends_with(needle.as_str()),
            })
        }
        Function::Regex => {
            let text = &string_arg(first)?.lexical;
            let pattern = &string_arg(&values[1])?.lexical;
            let flags = match values.get(2) {
                Some(f) => string_arg(f)?.lexical.clone(),
                None => String::new(),
            };
            let mut builder = RegexBuilder::new(pattern);
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    's' => builder.dot_matches_new_line(true),
                    'm' => builder.multi_line(true),
                    'x' => builder.ignore_whitespace(true),
                    other => return Err(Error::expr(format!("unknown regex flag '{}'", other))),
                };
            }
            let regex = builder
                .build()
                .map_err(|e| Error::expr(format!("invalid regex: {}", e)))?;
            Term::boolean(regex.is_match(text))
        }
    };
    Ok(term)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Constant(t) => write_term(f, t),
            Expr::Bound(v) => write!(f, "(bound {})", v),
            Expr::Not(e) => write!(f, "(! {})", e),
            Expr::And(l, r) => write!(f, "(&& {} {})", l, r),
            Expr::Or(l, r) => write!(f, "(|| {} {})", l, r),
            Expr::Compare(op, l, r) => write!(f, "({} {} {})", op.symbol(), l, r),
            Expr::Arithmetic(op, l, r) => write!(f, "({} {} {})", op.symbol(), l, r),
            Expr::Negate(e) => write!(f, "(- {})", e),
            Expr::If(c, t, e) => write!(f, "(if {} {} {})", c, t, e),
            Expr::Call(func, args) => {
                write!(f, "({}", func.name())?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Write a term, using the short forms the algebra syntax accepts for numbers
/// and booleans when the short form reads back as the same term
pub(crate) fn write_term(f: &mut fmt::Formatter<'_>, term: &Term) -> fmt::Result {
    if let Some(lit) = term.as_literal() {
        let lexical = lit.lexical.as_str();
        let short = match lit.datatype.as_ref().map(|d| d.as_str()) {
            Some(xsd::INTEGER) => lexical
                .parse::<i64>()
                .is_ok_and(|n| n.to_string() == lexical),
            Some(xsd::DECIMAL) => is_decimal_token(lexical),
            Some(xsd::BOOLEAN) => lexical == "true" || lexical == "false",
            _ => false,
        };
        if short {
            return write!(f, "{}", lexical);
        }
    }
    write!(f, "{}", term)
}

/// Matches `[+-]?[0-9]*\.[0-9]+`, the decimal token of the algebra syntax
fn is_decimal_token(lexical: &str) -> bool {
    let unsigned = lexical.strip_prefix(['+', '-']).unwrap_or(lexical);
    match unsigned.split_once('.') {
        Some((whole, fraction)) => {
            whole.bytes().all(|b| b.is_ascii_digit())
                && !fraction.is_empty()
                && fraction.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Term)]) -> Binding {
        pairs
            .iter()
            .map(|(v, t)| (Var::new(*v), t.clone()))
            .collect()
    }

    #[test]
    fn test_comparison_numeric_promotion() {
        let b = row(&[("x", Term::integer(3))]);
        let e = Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::constant(Term::decimal(2.5)));
        assert!(e.is_true(&b).unwrap());

        let e = Expr::compare(CompareOp::Eq, Expr::var("x"), Expr::constant(Term::double(3.0)));
        assert!(e.is_true(&b).unwrap());
    }

    #[test]
    fn test_constant_display() {
        let shown = |t: Term| Expr::constant(t).to_string();
        assert_eq!(shown(Term::integer(-3)), "-3");
        assert_eq!(shown(Term::typed("2.50", xsd::DECIMAL)), "2.50");
        assert_eq!(shown(Term::boolean(true)), "true");

        assert_eq!(
            shown(Term::typed("05", xsd::INTEGER)),
            format!("\"05\"^^<{}>", xsd::INTEGER)
        );
        assert_eq!(
            shown(Term::typed("1.", xsd::DECIMAL)),
            format!("\"1.\"^^<{}>", xsd::DECIMAL)
        );
        assert_eq!(
            shown(Term::typed("1", xsd::BOOLEAN)),
            format!("\"1\"^^<{}>", xsd::BOOLEAN)
        );
    }

    #[test]
    fn test_unbound_is_error_and_filter_false() {
        let e = Expr::compare(CompareOp::Eq, Expr::var("missing"), Expr::constant(Term::integer(1)));
        assert!(e.eval(&Binding::new()).unwrap_err().is_expression_error());
        assert!(!e.is_satisfied(&Binding::new()));
    }

    #[test]
    fn test_logical_error_tolerance() {
        let err = Expr::var("missing");
        let t = Expr::constant(Term::boolean(true));
        let f = Expr::constant(Term::boolean(false));

        let or = Expr::Or(Box::new(err.clone()), Box::new(t.clone()));
        assert!(or.is_true(&Binding::new()).unwrap());

        let and = Expr::And(Box::new(err.clone()), Box::new(f));
        assert!(!and.is_true(&Binding::new()).unwrap());

        let and = Expr::And(Box::new(err), Box::new(t));
        assert!(and.is_true(&Binding::new()).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let b = Binding::new();
        let sum = Expr::arithmetic(
            ArithOp::Add,
            Expr::constant(Term::integer(2)),
            Expr::constant(Term::integer(3)),
        );
        assert_eq!(sum.eval(&b).unwrap(), Term::integer(5));

        let div = Expr::arithmetic(
            ArithOp::Div,
            Expr::constant(Term::integer(7)),
            Expr::constant(Term::integer(2)),
        );
        assert_eq!(div.eval(&b).unwrap(), Term::decimal(3.5));

        let zero = Expr::arithmetic(
            ArithOp::Div,
            Expr::constant(Term::integer(1)),
            Expr::constant(Term::integer(0)),
        );
        assert!(zero.eval(&b).is_err());
    }

    #[test]
    fn test_string_functions() {
        let b = row(&[("s", Term::lang_string("Hello", "en"))]);
        let len = Expr::Call(Function::StrLen, vec![Expr::var("s")]);
        assert_eq!(len.eval(&b).unwrap(), Term::integer(5));

        let upper = Expr::Call(Function::UCase, vec![Expr::var("s")]);
        assert_eq!(upper.eval(&b).unwrap(), Term::lang_string("HELLO", "en"));

        let lang = Expr::Call(Function::Lang, vec![Expr::var("s")]);
        assert_eq!(lang.eval(&b).unwrap(), Term::string("en"));
    }

    #[test]
    fn test_regex_flags() {
        let b = row(&[("s", Term::string("Alice"))]);
        let re = Expr::Call(
            Function::Regex,
            vec![
                Expr::var("s"),
                Expr::constant(Term::string("^ali")),
                Expr::constant(Term::string("i")),
            ],
        );
        assert!(re.is_true(&b).unwrap());

        let bad = Expr::Call(
            Function::Regex,
            vec![Expr::var("s"), Expr::constant(Term::string("("))],
        );
        assert!(bad.eval(&b).is_err());
    }

    #[test]
    fn test_arity_checked() {
        let e = Expr::Call(Function::Str, vec![]);
        assert!(e.eval(&Binding::new()).is_err());
    }

    #[test]
    fn test_effective_boolean_value() {
        assert!(effective_boolean_value(&Term::string("x")).unwrap());
        assert!(!effective_boolean_value(&Term::string("")).unwrap());
        assert!(!effective_boolean_value(&Term::integer(0)).unwrap());
        assert!(effective_boolean_value(&Term::iri("http://ex/a")).is_err());
    }

    #[test]
    fn test_order_terms() {
        let blank = Term::blank("b");
        let iri = Term::iri("http://ex/a");
        let lit = Term::integer(1);
        assert_eq!(order_terms(None, Some(&blank)), Ordering::Less);
        assert_eq!(order_terms(Some(&blank), Some(&iri)), Ordering::Less);
        assert_eq!(order_terms(Some(&iri), Some(&lit)), Ordering::Less);
        assert_eq!(
            order_terms(Some(&Term::integer(10)), Some(&Term::decimal(9.5))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_function_lookup() {
        assert_eq!(Function::from_name("ISIRI"), Some(Function::IsIri));
        assert_eq!(Function::from_name("nope"), None);
    }
}
