use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic nested-list tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SExpr {
    /// Bare or quoted word
    Atom(String),
    /// Parenthesized sequence
    List(Vec<SExpr>),
}

impl SExpr {
    /// Text of an atom
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(text) => Some(text),
            SExpr::List(_) => None,
        }
    }

    /// Elements of a list
    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            SExpr::Atom(_) => None,
        }
    }

    /// Leading atom of a list, e.g. `Trace` in `(Trace ...)`
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }

    /// Check if this is a list headed by `name`
    pub fn is_form(&self, name: &str) -> bool {
        self.head() == Some(name)
    }

    /// First sub-expression (depth-first, including `self`) headed by `name`
    pub fn find_form(&self, name: &str) -> Option<&SExpr> {
        if self.is_form(name) {
            return Some(self);
        }
        self.as_list()?
            .iter()
            .find_map(|item| item.find_form(name))
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(text) if text.is_empty() || text.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') => {
                write!(f, "{:?}", text)
            }
            SExpr::Atom(text) => write!(f, "{}", text),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
