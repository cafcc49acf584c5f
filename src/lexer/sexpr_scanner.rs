use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// Scanner for the parenthesized trace notation
///
/// Anything that is not whitespace, a parenthesis, a quote or a `;` comment
/// belongs to an atom, so names such as `main/x_1`, `loc.3` and numbers such
/// as `-17` come out as single tokens.
pub struct SExprScanner {
    /// Source text as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Column where the current token started
    start_column: usize,
}

impl SExprScanner {
    /// Creates a new scanner over `source`
    pub fn new(source: &str) -> Self {
        SExprScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens and returns them, terminated by `Eof`
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            ';' => self.skip_line_comment(),

            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),

            '"' => self.scan_quoted()?,

            _ => self.scan_atom(),
        }

        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn scan_quoted(&mut self) -> Result<()> {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    _ => {
                        return Err(self.error(format!("Invalid escape sequence \\{}", escaped)));
                    }
                }
            } else {
                if self.peek() == '\n' {
                    self.line += 1;
                    self.column = 0;
                }
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return Err(self.error("Unterminated quoted name".to_string()));
        }

        self.advance(); // Closing "

        self.add_token(TokenKind::Quoted(value));
        Ok(())
    }

    fn scan_atom(&mut self) {
        while !self.is_at_end() && !is_delimiter(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        self.add_token(TokenKind::Atom(text));
    }

    fn error(&self, message: String) -> Error {
        Error::SyntaxError {
            line: self.line,
            col: self.start_column,
            message,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens
            .push(Token::new(kind, lexeme, self.line, self.start_column));
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        SExprScanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_sexpr() {
        assert_eq!(
            kinds("(SafetyResult Safe)"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Atom("SafetyResult".into()),
                TokenKind::Atom("Safe".into()),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_atoms_keep_punctuation() {
        let tokens = kinds("(main_x_1 -17 loc.3 a/b)");
        assert_eq!(tokens[1], TokenKind::Atom("main_x_1".into()));
        assert_eq!(tokens[2], TokenKind::Atom("-17".into()));
        assert_eq!(tokens[3], TokenKind::Atom("loc.3".into()));
        assert_eq!(tokens[4], TokenKind::Atom("a/b".into()));
    }

    #[test]
    fn test_quoted_and_positions() {
        let tokens = SExprScanner::new("(x\n  \"a b\")").scan_tokens().unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Quoted("a b".into()));
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[2].column, 3);
    }

    #[test]
    fn test_comment() {
        let tokens = kinds("; reply\n(Trace)");
        assert_eq!(tokens[0], TokenKind::LeftParen);
        assert_eq!(tokens[1], TokenKind::Atom("Trace".into()));
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            SExprScanner::new("(\"abc").scan_tokens(),
            Err(Error::SyntaxError { line: 1, .. })
        ));
    }
}
