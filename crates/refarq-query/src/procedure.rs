//! Relational procedures
//!
//! A procedure takes the table produced by its sub-op plus its arguments
//! and returns a new table. Procedures are looked up by IRI in a
//! [`ProcedureRegistry`].

use crate::algebra::{ProcedureArgs, PropFuncArg};
use refarq_core::{Binding, Error, Iri, Result, Table, Term, TermPattern};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// IRI of the built-in string-splitting property function
pub const STR_SPLIT: &str = "http://jena.apache.org/ARQ/property#strSplit";

/// A relational procedure
pub trait Procedure: Send + Sync {
    fn call(&self, input: Table, args: &ProcedureArgs) -> Result<Table>;
}

impl<F> Procedure for F
where
    F: Fn(Table, &ProcedureArgs) -> Result<Table> + Send + Sync,
{
    fn call(&self, input: Table, args: &ProcedureArgs) -> Result<Table> {
        self(input, args)
    }
}

/// Procedures by IRI
#[derive(Clone, Default)]
pub struct ProcedureRegistry {
    procedures: HashMap<Iri, Arc<dyn Procedure>>,
}

impl ProcedureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in procedures
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Iri::new(STR_SPLIT), StrSplit);
        registry
    }

    /// Register a procedure, replacing any previous one with the same IRI
    pub fn register<P: Procedure + 'static>(&mut self, iri: Iri, procedure: P) {
        debug!("Registered procedure {}", iri);
        self.procedures.insert(iri, Arc::new(procedure));
    }

    pub fn get(&self, iri: &Iri) -> Option<&Arc<dyn Procedure>> {
        self.procedures.get(iri)
    }

    pub fn contains(&self, iri: &Iri) -> bool {
        self.procedures.contains_key(iri)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Call the procedure registered under `iri`
    pub fn call(&self, iri: &Iri, input: Table, args: &ProcedureArgs) -> Result<Table> {
        let procedure = self
            .get(iri)
            .ok_or_else(|| Error::ProcedureNotFound(iri.to_string()))?;
        procedure.call(input, args)
    }
}

impl fmt::Debug for ProcedureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.procedures.keys().map(Iri::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ProcedureRegistry")
            .field("procedures", &names)
            .finish()
    }
}

/// `?part strSplit (text separator)`: one row per piece of `text`
struct StrSplit;

impl Procedure for StrSplit {
    fn call(&self, input: Table, args: &ProcedureArgs) -> Result<Table> {
        let (subject, text, separator) = match args {
            ProcedureArgs::SubjectObject {
                subject: PropFuncArg::Node(TermPattern::Var(var)),
                object: PropFuncArg::List(list),
            } if list.len() == 2 => (var, &list[0], &list[1]),
            _ => {
                return Err(Error::InvalidProcedureArgs(
                    "strSplit expects a variable subject and (text separator) object".to_string(),
                ));
            }
        };

        let mut rows = Vec::new();
        for row in input {
            let text = resolve_string(text, &row)?;
            let separator = resolve_string(separator, &row)?;
            if separator.is_empty() {
                return Err(Error::InvalidProcedureArgs(
                    "strSplit separator must not be empty".to_string(),
                ));
            }
            for piece in text.split(separator.as_str()) {
                let value = Term::string(piece);
                match row.get(subject) {
                    Some(existing) if *existing != value => continue,
                    Some(_) => rows.push(row.clone()),
                    None => {
                        let mut out = row.clone();
                        out.insert(subject.clone(), value);
                        rows.push(out);
                    }
                }
            }
        }
        Ok(Table::from_rows(rows))
    }
}

fn resolve_string(arg: &TermPattern, row: &Binding) -> Result<String> {
    let term = match arg {
        TermPattern::Term(t) => t,
        TermPattern::Var(v) => row.get(v).ok_or_else(|| {
            Error::InvalidProcedureArgs(format!("strSplit argument {} is unbound", v))
        })?,
    };
    match term.as_literal() {
        Some(lit) => Ok(lit.lexical.clone()),
        None => Err(Error::InvalidProcedureArgs(format!(
            "strSplit argument {} is not a literal",
            term
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refarq_core::Var;

    fn split_args(text: &str, sep: &str) -> ProcedureArgs {
        ProcedureArgs::SubjectObject {
            subject: PropFuncArg::Node(TermPattern::var("w")),
            object: PropFuncArg::List(vec![
                TermPattern::Term(Term::string(text)),
                TermPattern::Term(Term::string(sep)),
            ]),
        }
    }

    #[test]
    fn test_str_split() {
        let registry = ProcedureRegistry::with_builtins();
        let table = registry
            .call(&Iri::new(STR_SPLIT), Table::unit(), &split_args("a b c", " "))
            .unwrap();
        let words: Vec<_> = table
            .iter()
            .map(|r| r.get(&Var::new("w")).unwrap().clone())
            .collect();
        assert_eq!(
            words,
            vec![Term::string("a"), Term::string("b"), Term::string("c")]
        );
    }

    #[test]
    fn test_str_split_rejects_positional() {
        let registry = ProcedureRegistry::with_builtins();
        let err = registry
            .call(
                &Iri::new(STR_SPLIT),
                Table::unit(),
                &ProcedureArgs::Positional(vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProcedureArgs(_)));
    }

    #[test]
    fn test_missing_procedure() {
        let registry = ProcedureRegistry::new();
        let err = registry
            .call(
                &Iri::new("http://ex/none"),
                Table::unit(),
                &ProcedureArgs::Positional(vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ProcedureNotFound(_)));
    }

    #[test]
    fn test_register_closure() {
        let mut registry = ProcedureRegistry::new();
        registry.register(
            Iri::new("http://ex/count"),
            |input: Table, _args: &ProcedureArgs| {
                Ok(Table::single(Var::new("n"), Term::integer(input.len() as i64)))
            },
        );
        assert!(registry.contains(&Iri::new("http://ex/count")));
        let out = registry
            .call(
                &Iri::new("http://ex/count"),
                Table::unit(),
                &ProcedureArgs::Positional(vec![]),
            )
            .unwrap();
        assert_eq!(out, Table::single(Var::new("n"), Term::integer(1)));
    }
}
