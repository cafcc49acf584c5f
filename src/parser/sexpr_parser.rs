use super::sexpr::SExpr;
use crate::error::{Error, Result};
use crate::lexer::{SExprScanner, Token, TokenKind};

/// Deepest list nesting accepted before parsing fails
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Recursive-descent parser for the nested-list notation
pub struct SExprParser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl SExprParser {
    /// Creates a new parser over scanned tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        SExprParser {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Scan `source` and create a parser over it
    pub fn from_source(source: &str) -> Result<Self> {
        let tokens = SExprScanner::new(source).scan_tokens()?;
        Ok(Self::new(tokens))
    }

    /// Parses every top-level expression
    pub fn parse(&mut self) -> Result<Vec<SExpr>> {
        let mut exprs = Vec::new();

        while !self.is_at_end() {
            exprs.push(self.parse_expression()?);
        }

        Ok(exprs)
    }

    /// Parses the next expression, leaving the rest of the input
    pub fn parse_expression(&mut self) -> Result<SExpr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::LeftParen => self.parse_list(),
            TokenKind::Atom(text) | TokenKind::Quoted(text) => {
                self.advance();
                Ok(SExpr::Atom(text))
            }
            TokenKind::RightParen => Err(self.syntax_error("Unexpected ')'")),
            TokenKind::Eof => Err(Error::UnexpectedEof),
        }
    }

    fn parse_list(&mut self) -> Result<SExpr> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.syntax_error(format!(
                "Lists nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let list = self.parse_list_items();
        self.depth -= 1;
        list
    }

    fn parse_list_items(&mut self) -> Result<SExpr> {
        self.consume(TokenKind::LeftParen)?;

        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RightParen => {
                    self.advance();
                    return Ok(SExpr::List(items));
                }
                TokenKind::Eof => return Err(Error::UnexpectedEof),
                _ => items.push(self.parse_expression()?),
            }
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        // The scanner always terminates the stream with Eof
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(Error::UnexpectedEof)
        } else {
            Err(self.syntax_error(format!(
                "Expected {:?}, found '{}'",
                kind,
                self.peek().lexeme
            )))
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> Error {
        let token = self.peek();
        Error::SyntaxError {
            line: token.line,
            col: token.column,
            message: message.into(),
        }
    }
}

/// Parse the first expression of `source`, ignoring anything after it
pub fn parse_first(source: &str) -> Result<SExpr> {
    SExprParser::from_source(source)?.parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(text: &str) -> SExpr {
        SExpr::Atom(text.to_string())
    }

    #[test]
    fn test_nested_lists() {
        let expr = parse_first("(CfaState L1 (ExplState (x 3)))").unwrap();
        assert_eq!(
            expr,
            SExpr::List(vec![
                atom("CfaState"),
                atom("L1"),
                SExpr::List(vec![
                    atom("ExplState"),
                    SExpr::List(vec![atom("x"), atom("3")]),
                ]),
            ])
        );
        assert_eq!(expr.head(), Some("CfaState"));
        assert_eq!(expr.to_string(), "(CfaState L1 (ExplState (x 3)))");
    }

    #[test]
    fn test_parse_all() {
        let exprs = SExprParser::from_source("a (b) ()").unwrap().parse().unwrap();
        assert_eq!(exprs.len(), 3);
        assert_eq!(exprs[2], SExpr::List(vec![]));
    }

    #[test]
    fn test_trailing_input_ignored() {
        let expr = parse_first("(Trace) junk )").unwrap();
        assert!(expr.is_form("Trace"));
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(parse_first("(a (b)"), Err(Error::UnexpectedEof));
        assert_eq!(parse_first(""), Err(Error::UnexpectedEof));
        assert!(matches!(
            parse_first(") a"),
            Err(Error::SyntaxError { line: 1, col: 1, .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!(
            "{}{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert!(parse_first(&ok).is_ok());

        let deep = format!("{}{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            parse_first(&deep),
            Err(Error::SyntaxError { line: 1, col, .. }) if col == MAX_NESTING_DEPTH + 1
        ));
    }

    #[test]
    fn test_find_form() {
        let expr = parse_first("(SafetyResult Unsafe (Trace (InitLoc L0)))").unwrap();
        let trace = expr.find_form("Trace").unwrap();
        assert_eq!(trace.to_string(), "(Trace (InitLoc L0))");
        assert!(expr.find_form("Missing").is_none());
    }
}
