//! Lexer for GROQ.
//!
//! Converts query text into tokens. Comments (`//` to end of line) and
//! whitespace are skipped.

use super::token::{Span, Token, TokenKind};
use crate::error::ParseError;

#[derive(Debug)]
pub struct Lexer<'src> {
    source: &'src str,
    rest: &'src str,
    /// Byte offset in `source`.
    position: usize,
    line: usize,
    column: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole source. The last token is always `Eof`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia();

        let start = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start, line, column)));
        };

        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '@' => self.single(TokenKind::At),
            '^' => self.single(TokenKind::Caret),
            '+' => self.single(TokenKind::Plus),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            ':' => self.one_or_two(':', TokenKind::Colon, TokenKind::ColonColon),
            '*' => self.one_or_two('*', TokenKind::Star, TokenKind::StarStar),
            '|' => self.one_or_two('|', TokenKind::Pipe, TokenKind::OrOr),
            '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::NotEq),
            '<' => self.one_or_two('=', TokenKind::Lt, TokenKind::Le),
            '>' => self.one_or_two('=', TokenKind::Gt, TokenKind::Ge),
            '&' => {
                self.advance();
                if self.peek_char() != Some('&') {
                    return Err(error_at(line, column, "expected `&&`"));
                }
                self.advance();
                TokenKind::AndAnd
            }
            '=' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => self.single(TokenKind::EqEq),
                    Some('>') => self.single(TokenKind::FatArrow),
                    _ => TokenKind::Assign,
                }
            }
            '-' => self.one_or_two('>', TokenKind::Minus, TokenKind::Arrow),
            '.' => {
                self.advance();
                if self.peek_char() == Some('.') {
                    self.advance();
                    if self.peek_char() == Some('.') {
                        self.single(TokenKind::Ellipsis)
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            '"' | '\'' => self.scan_string(c)?,
            '$' => {
                self.advance();
                let name = self.scan_ident_text();
                if name.is_empty() {
                    return Err(error_at(line, column, "expected parameter name after `$`"));
                }
                TokenKind::Param(name)
            }
            c if c.is_ascii_digit() => self.scan_number()?,
            c if is_ident_start(c) => TokenKind::Ident(self.scan_ident_text()),
            c => {
                return Err(error_at(line, column, format!("unexpected character `{c}`")));
            }
        };

        Ok(Token::new(kind, Span::new(start, self.position, line, column)))
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Consume the current character, and `second` too if it follows.
    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> TokenKind {
        self.advance();
        if self.peek_char() == Some(second) {
            self.advance();
            two
        } else {
            one
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '/' && self.peek_char_n(1) == Some('/') {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(TokenKind::String(text));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some(c @ ('\\' | '\'' | '"' | '/')) => c,
                        Some('u') => {
                            self.advance();
                            text.push(self.scan_unicode_escape()?);
                            continue;
                        }
                        Some(c) => {
                            return Err(self.error(format!("invalid escape sequence `\\{c}`")));
                        }
                        None => break,
                    };
                    self.advance();
                    text.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => break,
            }
        }
        Err(error_at(line, column, "unterminated string literal"))
    }

    /// Scan the `XXXX` of `\uXXXX` (or `{X...}`).
    fn scan_unicode_escape(&mut self) -> Result<char, ParseError> {
        let mut digits = String::new();
        if self.peek_char() == Some('{') {
            self.advance();
            while let Some(c) = self.peek_char() {
                self.advance();
                if c == '}' {
                    break;
                }
                digits.push(c);
            }
        } else {
            for _ in 0..4 {
                match self.peek_char() {
                    Some(c) => {
                        self.advance();
                        digits.push(c);
                    }
                    None => break,
                }
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode escape `\\u{digits}`")))
    }

    fn scan_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.position;
        self.eat_digits();

        // `1..2` is a range, not a decimal
        if self.peek_char() == Some('.') && self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.eat_digits();
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char_n(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char_n(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                if signed {
                    self.advance();
                }
                self.eat_digits();
            }
        }

        let text = &self.source[start..self.position];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|e| self.error(format!("invalid number `{text}`: {e}")))
    }

    fn eat_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn scan_ident_text(&mut self) -> String {
        let start = self.position;
        while self.peek_char().is_some_and(is_ident_char) {
            self.advance();
        }
        self.source[start..self.position].to_string()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column, message)
    }
}

fn error_at(line: usize, column: usize, message: impl Into<String>) -> ParseError {
    ParseError::new(line, column, message)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_lex_empty() {
        assert_eq!(lex("  // only a comment"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_lex_filter() {
        assert_eq!(
            lex("*[_type == 'book']"),
            vec![
                TokenKind::Star,
                TokenKind::LBracket,
                TokenKind::Ident("_type".into()),
                TokenKind::EqEq,
                TokenKind::String("book".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            lex("-> => ... .. . ** || && != <= >= :: | ="),
            vec![
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Ellipsis,
                TokenKind::DotDot,
                TokenKind::Dot,
                TokenKind::StarStar,
                TokenKind::OrOr,
                TokenKind::AndAnd,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::ColonColon,
                TokenKind::Pipe,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(
            lex("1 2.5 1e3 4E-2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.04),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            lex("0..10"),
            vec![
                TokenKind::Number(0.0),
                TokenKind::DotDot,
                TokenKind::Number(10.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        assert_eq!(
            lex(r#""a\nb\"c" 'it\'s' "é\u{1F600}""#),
            vec![
                TokenKind::String("a\nb\"c".into()),
                TokenKind::String("it's".into()),
                TokenKind::String("é😀".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_params() {
        assert_eq!(
            lex("$slug"),
            vec![TokenKind::Param("slug".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_positions() {
        let tokens = Lexer::tokenize("*\n  [title]").unwrap();
        assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
        assert_eq!(tokens[2].span.text("*\n  [title]"), "title");
    }

    #[test]
    fn test_lex_errors() {
        let error = Lexer::tokenize("'open").unwrap_err();
        assert_eq!((error.line, error.column), (1, 1));
        assert!(error.message.contains("unterminated"));

        let error = Lexer::tokenize("a # b").unwrap_err();
        assert_eq!(error.column, 3);

        assert!(Lexer::tokenize("a & b").is_err());
    }
}
