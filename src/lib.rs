//! # cfa-core - Control-Flow Automata for Software Model Checking
//!
//! Typed expressions, control-flow automata (CFAs) and the glue that hands a
//! program to an external model checker and turns its counterexample back
//! into a trace over the original program.
//!
//! ## Features
//!
//! - **Hash-consed types and expressions** - one canonical instance per shape within a [`Context`]
//! - **Checked construction** - [`ExprBuilder`] rejects ill-typed operands up front
//! - **CFA graph model** - assignment, assume and call transitions, error locations,
//!   disconnect and unreachable-location pruning
//! - **Call inlining** - nested automata flattened into the main automaton with a copy → original record
//! - **Counterexample reconstruction** - the checker's trace text mapped back to original
//!   locations and variables, with the violated check's error code
//!
//! ## Quick Start
//!
//! ```rust
//! use cfa_core::{AutomataSystem, Context, ExprBuilder, VariableAssignment};
//! use std::sync::Arc;
//!
//! # fn main() -> cfa_core::Result<()> {
//! let ctx = Arc::new(Context::new());
//! let b = ExprBuilder::new(ctx.clone());
//!
//! let mut system = AutomataSystem::new(ctx.clone());
//! let main = system.create_cfa("main");
//! system.set_main_automaton(main);
//!
//! let cfa = system.cfa_mut(main);
//! let x = cfa.create_local("x", ctx.int_type());
//! let err = cfa.create_error_location();
//! cfa.add_error_code(err, b.int_lit(2));
//!
//! let (entry, exit) = (cfa.entry(), cfa.exit());
//! let inc = b.add(b.var_ref(&x), b.int_lit(1))?;
//! cfa.create_assign_transition(entry, exit, None, vec![VariableAssignment::new(x.clone(), inc)]);
//! cfa.create_assume_transition(exit, err, b.gt(b.var_ref(&x), b.int_lit(10))?);
//!
//! assert_eq!(system.cfa(main).num_locations(), 3);
//! assert_eq!(system.cfa(main).error_locations(), &[err]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Context → Type/Expr → Cfa/AutomataSystem → inline → CfaWriter → checker
//!                                                        │ NameMapping
//! checker reply → SExprScanner → SExprParser → CexReconstructor → Trace + code
//! ```
//!
//! ### Main Components
//!
//! - [`Context`] - canonical types, variables and the expression table
//! - [`ExprBuilder`] - type-checked expression construction
//! - [`Cfa`] / [`AutomataSystem`] - the automaton graph model
//! - [`ExternalVerifier`] - runs the checker and classifies its reply
//! - [`CexReconstructor`] - rebuilds a [`Trace`] from trace text
//!
//! ## Error Handling
//!
//! Construction of types and expressions returns [`Result`]. Structural
//! contract violations on automata (call arity mismatch, asking a state
//! location for its error code) panic. Lookups return `Option`. The verifier
//! never returns `Err`; every failure is folded into a [`VerificationResult`].

// Allow specific clippy warnings that are intentional
#![allow(clippy::new_without_default)] // Builders take a context
#![allow(clippy::len_without_is_empty)] // Counts on arenas with tombstones

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod automaton;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod verifier;

// Re-export main types
pub use automaton::{
    inline_calls, AutomataSystem, Cfa, CfaId, CfaTraceBuilder, InlineMap, LocId, Location,
    LocationKind, LocationRef, Trace, TraceBuilder, Transition, TransitionId, TransitionKind,
    VariableAssignment,
};
pub use error::{Error, ErrorSeverity, Result};
pub use expr::{BinaryOp, Expr, ExprBuilder, ExprKind, ExprRef, Literal};
pub use lexer::{SExprScanner, Token, TokenKind};
pub use parser::{SExpr, SExprParser};
pub use types::{Context, FloatPrecision, Type, TypeKind, Variable};
pub use verifier::{
    CexError, CexReconstructor, CfaWriter, ExternalVerifier, NameMapping, VerificationResult,
    Verifier, VerifierSettings,
};
