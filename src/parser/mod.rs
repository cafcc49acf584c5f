//! Nested-list parser
//!
//! Parses scanned model checker replies into generic [`SExpr`] trees. Schema
//! checks belong to the consumer.

mod sexpr;
mod sexpr_parser;

pub use sexpr::SExpr;
pub use sexpr_parser::{parse_first, SExprParser, MAX_NESTING_DEPTH};
