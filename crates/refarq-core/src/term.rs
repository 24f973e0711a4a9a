//! RDF term model
//!
//! Terms are the atomic values bound to variables: IRIs, blank nodes and
//! literals. Patterns mix terms with variables through [`TermPattern`].

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// XML Schema datatype IRIs understood by the evaluator
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

/// Datatype of language-tagged strings
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// Name used in quad patterns to address the default graph
pub const DEFAULT_GRAPH_IRI: &str = "urn:x-arq:DefaultGraph";

/// A query variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var(String);

impl Var {
    /// Create a variable; a leading `?` is stripped
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        match name.strip_prefix('?') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(name),
        }
    }

    /// Variable name without the `?` sigil
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// IRI (Internationalized Resource Identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iri(String);

impl Iri {
    pub fn new<S: Into<String>>(iri: S) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Literal value with optional language tag or datatype
///
/// A literal with neither is a simple literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub language: Option<String>,
    pub datatype: Option<Iri>,
}

/// Numeric value extracted from a typed literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Integer(i) => *i as f64,
            Numeric::Decimal(d) | Numeric::Double(d) => *d,
        }
    }

    /// Convert back into a literal term
    pub fn into_term(self) -> Term {
        match self {
            Numeric::Integer(i) => Term::integer(i),
            Numeric::Decimal(d) => Term::decimal(d),
            Numeric::Double(d) => Term::double(d),
        }
    }
}

impl Literal {
    /// Simple literal (no language, no datatype)
    pub fn simple<S: Into<String>>(lexical: S) -> Self {
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: None,
        }
    }

    /// Language-tagged literal; tags are normalised to lower case
    pub fn lang<S: Into<String>, L: AsRef<str>>(lexical: S, language: L) -> Self {
        Self {
            lexical: lexical.into(),
            language: Some(language.as_ref().to_ascii_lowercase()),
            datatype: None,
        }
    }

    /// Typed literal. `xsd:string` collapses to a simple literal.
    pub fn typed<S: Into<String>>(lexical: S, datatype: Iri) -> Self {
        if datatype.as_str() == xsd::STRING {
            return Self::simple(lexical);
        }
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: Some(datatype),
        }
    }

    /// Datatype IRI as a string, following RDF 1.1 defaults
    pub fn datatype_str(&self) -> &str {
        match (&self.datatype, &self.language) {
            (Some(dt), _) => dt.as_str(),
            (None, Some(_)) => RDF_LANG_STRING,
            (None, None) => xsd::STRING,
        }
    }

    /// True for simple literals and `xsd:string`
    pub fn is_string(&self) -> bool {
        self.language.is_none() && self.datatype.is_none()
    }

    pub fn numeric(&self) -> Option<Numeric> {
        let dt = self.datatype.as_ref()?;
        let text = self.lexical.trim();
        match dt.as_str() {
            xsd::INTEGER | xsd::INT | xsd::LONG => text.parse().ok().map(Numeric::Integer),
            xsd::DECIMAL => text.parse().ok().map(Numeric::Decimal),
            xsd::DOUBLE | xsd::FLOAT => match text {
                "INF" => Some(Numeric::Double(f64::INFINITY)),
                "-INF" => Some(Numeric::Double(f64::NEG_INFINITY)),
                "NaN" => Some(Numeric::Double(f64::NAN)),
                _ => text.parse().ok().map(Numeric::Double),
            },
            _ => None,
        }
    }

    pub fn boolean(&self) -> Option<bool> {
        match self.datatype.as_ref().map(Iri::as_str) {
            Some(xsd::BOOLEAN) => match self.lexical.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn date_time(&self) -> Option<DateTime<FixedOffset>> {
        match self.datatype.as_ref().map(Iri::as_str) {
            Some(xsd::DATE_TIME) => DateTime::parse_from_rfc3339(&self.lexical).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.lexical.chars() {
            match c {
                '"' => write!(f, "\\\"")?,
                '\\' => write!(f, "\\\\")?,
                '\n' => write!(f, "\\n")?,
                '\r' => write!(f, "\\r")?,
                '\t' => write!(f, "\\t")?,
                other => write!(f, "{}", other)?,
            }
        }
        write!(f, "\"")?;
        if let Some(lang) = &self.language {
            write!(f, "@{}", lang)?;
        } else if let Some(dt) = &self.datatype {
            write!(f, "^^{}", dt)?;
        }
        Ok(())
    }
}

/// RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    BlankNode(String),
    Literal(Literal),
}

impl Term {
    pub fn iri<S: Into<String>>(iri: S) -> Self {
        Term::Iri(Iri::new(iri))
    }

    pub fn blank<S: Into<String>>(label: S) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Term::Literal(Literal::simple(value))
    }

    pub fn lang_string<S: Into<String>>(value: S, lang: &str) -> Self {
        Term::Literal(Literal::lang(value, lang))
    }

    pub fn typed<S: Into<String>>(value: S, datatype: &str) -> Self {
        Term::Literal(Literal::typed(value, Iri::new(datatype)))
    }

    pub fn integer(value: i64) -> Self {
        Term::typed(value.to_string(), xsd::INTEGER)
    }

    pub fn decimal(value: f64) -> Self {
        let lexical = if value.fract() == 0.0 && value.is_finite() {
            format!("{:.1}", value)
        } else {
            value.to_string()
        };
        Term::typed(lexical, xsd::DECIMAL)
    }

    pub fn double(value: f64) -> Self {
        let lexical = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "INF".to_string() } else { "-INF".to_string() }
        } else {
            format!("{:e}", value)
        };
        Term::typed(lexical, xsd::DOUBLE)
    }

    pub fn boolean(value: bool) -> Self {
        Term::typed(value.to_string(), xsd::BOOLEAN)
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn numeric(&self) -> Option<Numeric> {
        self.as_literal().and_then(Literal::numeric)
    }

    /// True when this is the reserved default-graph name
    pub fn is_default_graph(&self) -> bool {
        matches!(self, Term::Iri(iri) if iri.as_str() == DEFAULT_GRAPH_IRI)
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Term::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{}", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

/// A term position in a pattern: either a variable or a concrete term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermPattern {
    Var(Var),
    Term(Term),
}

impl TermPattern {
    pub fn var<S: Into<String>>(name: S) -> Self {
        TermPattern::Var(Var::new(name))
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            TermPattern::Var(v) => Some(v),
            TermPattern::Term(_) => None,
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            TermPattern::Term(t) => Some(t),
            TermPattern::Var(_) => None,
        }
    }
}

impl From<Var> for TermPattern {
    fn from(v: Var) -> Self {
        TermPattern::Var(v)
    }
}

impl From<Term> for TermPattern {
    fn from(t: Term) -> Self {
        TermPattern::Term(t)
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermPattern::Var(v) => write!(f, "{}", v),
            TermPattern::Term(t) => write!(f, "{}", t),
        }
    }
}
