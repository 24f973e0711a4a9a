//! refarq Core Library
//!
//! This crate provides the data model shared by every refarq component:
//! RDF terms, variable bindings, tables (intermediate relations), triple
//! templates and the error type.
//!
//! # Modules
//!
//! - `term` - IRIs, blank nodes, literals and variables
//! - `binding` - One solution row
//! - `table` - Materialised relations and binding cursors
//! - `pattern` - Triples, triple templates and quad patterns
//! - `error` - Error types and result aliases

pub mod binding;
pub mod error;
pub mod pattern;
pub mod table;
pub mod term;

pub use binding::Binding;
pub use error::{Error, Result};
pub use pattern::{BasicPattern, QuadPattern, Triple, TriplePattern};
pub use table::{BindingCursor, Table};
pub use term::{DEFAULT_GRAPH_IRI, Iri, Literal, Numeric, Term, TermPattern, Var, xsd};
