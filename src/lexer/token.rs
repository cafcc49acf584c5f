use serde::{Deserialize, Serialize};

/// A single token of the model checker's reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// Token types of the nested-list notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// Bare word: names, numbers, keywords alike
    Atom(String),
    /// Double-quoted text, escapes resolved
    Quoted(String),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Text of an atom or quoted token
    pub fn text(&self) -> Option<&str> {
        match self {
            TokenKind::Atom(text) | TokenKind::Quoted(text) => Some(text),
            _ => None,
        }
    }
}
