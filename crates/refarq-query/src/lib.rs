//! refarq query engine
//!
//! Evaluates graph-query algebra trees.
//!
//! # Overview
//!
//! - [`algebra`]: the operator tree ([`Op`])
//! - [`dispatch`]: post-order evaluation that routes each operator to an
//!   [`Evaluator`]
//! - [`evaluator`]: the evaluator capability and the in-memory reference
//!   implementation
//! - [`sse`]: the S-expression algebra syntax
//! - [`engine`]: a dataset plus procedures, services and configuration

pub mod aggregate;
pub mod algebra;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod evaluator;
pub mod expr;
pub mod lexer;
pub mod procedure;
pub mod service;
pub mod sse;

pub use aggregate::Aggregator;
pub use algebra::{Op, ProcedureArgs, PropFuncArg, ServiceOp, SortCondition, SortDirection};
pub use config::{DEFAULT_MAX_DEPTH, EngineConfig};
pub use dispatch::{Dispatcher, evaluate};
pub use engine::{EvalStats, QueryResult, RefEngine};
pub use evaluator::{Evaluator, RefEvaluator};
pub use expr::{ArithOp, CompareOp, Expr, Function};
pub use lexer::{Token, tokenize};
pub use procedure::{Procedure, ProcedureRegistry};
pub use service::{LocalServiceRegistry, NoServices, ServiceExecutor};
pub use sse::{MAX_NESTING, parse_expr, parse_op};
