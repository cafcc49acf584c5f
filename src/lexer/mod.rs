//! Lexical analysis of model checker replies
//!
//! Converts reply text into a stream of parenthesis and atom tokens.

mod sexpr_scanner;
mod token;

pub use sexpr_scanner::SExprScanner;
pub use token::{Token, TokenKind};
