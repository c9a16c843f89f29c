//! Recursive-descent parser for GROQ.
//!
//! Precedence, lowest first:
//! - `|` pipe
//! - `=>` pair (right-associative)
//! - `||`, then `&&`
//! - comparison (`==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `match`), not chainable
//! - range (`..`, `...`)
//! - `+ -`, then `* / %`
//! - prefix `-`, then `**` (right-associative), then prefix `!` and `+`
//! - postfix access, filters, projections and dereferences

use super::ast::{
    ArrayElement, BinaryOp, Expr, ExprKind, FunctionDef, Literal, NodeId, ObjectAttribute, Query,
    UnaryOp,
};
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};
use crate::error::ParseError;

/// Parse a query.
pub fn parse(source: &str) -> Result<Query, ParseError> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_query()
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    next_id: u32,
    /// End of the last consumed token.
    last_end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            next_id: 0,
            last_end: 0,
        }
    }

    pub fn parse_query(&mut self) -> Result<Query, ParseError> {
        let mut functions = Vec::new();
        while self.current().is_word("fn") {
            functions.push(self.parse_function_def()?);
        }
        let body = self.parse_expr()?;
        if self.current().kind != TokenKind::Eof {
            return Err(self.unexpected("end of query"));
        }
        Ok(Query { functions, body })
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn peek(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.position + offset).min(last)].kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
            self.last_end = token.span.end;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::new(
            token.span.line,
            token.span.column,
            format!("expected {expected}, found {}", token.kind),
        )
    }

    fn error_at(span: Span, message: impl Into<String>) -> ParseError {
        ParseError::new(span.line, span.column, message)
    }

    fn node(&mut self, kind: ExprKind, start: Span) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let span = Span {
            end: self.last_end.max(start.start),
            ..start
        };
        Expr { id, span, kind }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    fn parse_function_def(&mut self) -> Result<FunctionDef, ParseError> {
        self.advance(); // `fn`
        let namespace = self.expect_ident()?;
        self.expect(&TokenKind::ColonColon)?;
        let name = self.expect_ident()?;

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            match &self.current().kind {
                TokenKind::Param(param) => {
                    params.push(param.clone());
                    self.advance();
                }
                _ => return Err(self.unexpected("parameter")),
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Assign)?;
        let body = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;

        Ok(FunctionDef {
            namespace,
            name,
            params,
            body,
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_pipe()
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut left = self.parse_pair()?;
        while self.eat(&TokenKind::Pipe) {
            let name = self.expect_ident()?;
            self.expect(&TokenKind::LParen)?;
            let args = self.parse_args(name == "order")?;
            left = self.node(
                ExprKind::PipeFuncCall {
                    base: Box::new(left),
                    name,
                    args,
                },
                start,
            );
            left = self.parse_postfix_ops(left, start)?;
        }
        Ok(left)
    }

    fn parse_pair(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let left = self.parse_or()?;
        if self.eat(&TokenKind::FatArrow) {
            let right = self.parse_pair()?;
            return Ok(self.node(
                ExprKind::Pair {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
            ));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right, start);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut left = self.parse_comparison()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_comparison()?;
            left = self.binary(BinaryOp::And, left, right, start);
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        let token = self.current();
        match &token.kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ if token.is_word("in") => Some(BinaryOp::In),
            _ if token.is_word("match") => Some(BinaryOp::Match),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let left = self.parse_range()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_range()?;
        if self.comparison_op().is_some() {
            return Err(Self::error_at(
                self.current().span,
                "comparison operators cannot be chained",
            ));
        }
        Ok(self.binary(op, left, right, start))
    }

    fn parse_range(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let left = self.parse_additive()?;
        let exclusive = match self.current().kind {
            TokenKind::DotDot => false,
            TokenKind::Ellipsis => true,
            _ => return Ok(left),
        };
        self.advance();
        let end = self.parse_additive()?;
        Ok(self.node(
            ExprKind::Range {
                start: Box::new(left),
                end: Box::new(end),
                exclusive,
            },
            start,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right, start);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut left = self.parse_negation()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_negation()?;
            left = self.binary(op, left, right, start);
        }
    }

    fn parse_negation(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_negation()?;
            return Ok(self.node(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                start,
            ));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let base = self.parse_prefix()?;
        if self.eat(&TokenKind::StarStar) {
            // right-associative, and `2 ** -1` is allowed
            let exponent = self.parse_negation()?;
            return Ok(self.binary(BinaryOp::Pow, base, exponent, start));
        }
        Ok(base)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let op = match self.current().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_prefix()?;
        Ok(self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        ))
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr, start: Span) -> Expr {
        self.node(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            start,
        )
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let term = self.parse_term()?;
        self.parse_postfix_ops(term, start)
    }

    fn parse_postfix_ops(&mut self, mut expr: Expr, start: Span) -> Result<Expr, ParseError> {
        loop {
            expr = match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    self.node(
                        ExprKind::AccessAttribute {
                            base: Box::new(expr),
                            name,
                        },
                        start,
                    )
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.parse_bracket(expr, start)?
                }
                TokenKind::Arrow => {
                    self.advance();
                    let attribute = match &self.current().kind {
                        TokenKind::Ident(name) => {
                            let name = name.clone();
                            self.advance();
                            Some(name)
                        }
                        _ => None,
                    };
                    self.node(
                        ExprKind::Deref {
                            base: Box::new(expr),
                            attribute,
                        },
                        start,
                    )
                }
                TokenKind::LBrace => {
                    let object = self.parse_object()?;
                    self.node(
                        ExprKind::Projection {
                            base: Box::new(expr),
                            object: Box::new(object),
                        },
                        start,
                    )
                }
                _ => return Ok(expr),
            };
        }
    }

    /// Everything after `base[`.
    fn parse_bracket(&mut self, base: Expr, start: Span) -> Result<Expr, ParseError> {
        let base = Box::new(base);
        if self.eat(&TokenKind::RBracket) {
            return Ok(self.node(ExprKind::ArrayPostfix(base), start));
        }

        let inner = self.parse_expr()?;
        self.expect(&TokenKind::RBracket)?;

        let kind = match inner.kind {
            ExprKind::Range {
                start: range_start,
                end,
                exclusive,
            } => ExprKind::Slice {
                base,
                start: range_start,
                end,
                exclusive,
            },
            ExprKind::Value(Literal::String(name)) => ExprKind::AccessAttribute { base, name },
            ExprKind::Value(Literal::Number(_)) => ExprKind::AccessElement {
                base,
                index: Box::new(inner),
            },
            ExprKind::Unary {
                op: UnaryOp::Neg,
                ref operand,
            } if matches!(operand.kind, ExprKind::Value(Literal::Number(_))) => {
                ExprKind::AccessElement {
                    base,
                    index: Box::new(inner),
                }
            }
            _ => ExprKind::Filter {
                base,
                condition: Box::new(inner),
            },
        };
        Ok(self.node(kind, start))
    }

    // =========================================================================
    // Terms
    // =========================================================================

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Star => {
                self.advance();
                ExprKind::Everything
            }
            TokenKind::At => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Caret => {
                self.advance();
                let mut levels = 1;
                while self.check(&TokenKind::Dot) && self.peek(1) == &TokenKind::Caret {
                    self.advance();
                    self.advance();
                    levels += 1;
                }
                ExprKind::Parent(levels)
            }
            TokenKind::Param(name) => {
                self.advance();
                ExprKind::Param(name)
            }
            TokenKind::Number(value) => {
                self.advance();
                ExprKind::Value(Literal::Number(value))
            }
            TokenKind::String(value) => {
                self.advance();
                ExprKind::Value(Literal::String(value))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                ExprKind::Group(Box::new(inner))
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.parse_array_elements()?)
            }
            TokenKind::LBrace => return self.parse_object(),
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_ident_term(name)?
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(self.node(kind, start))
    }

    fn parse_ident_term(&mut self, name: String) -> Result<ExprKind, ParseError> {
        if self.eat(&TokenKind::ColonColon) {
            let function = self.expect_ident()?;
            self.expect(&TokenKind::LParen)?;
            let args = self.parse_args(false)?;
            return Ok(ExprKind::FuncCall {
                namespace: name,
                name: function,
                args,
            });
        }
        if self.eat(&TokenKind::LParen) {
            let args = self.parse_args(false)?;
            return Ok(ExprKind::FuncCall {
                namespace: "global".to_string(),
                name,
                args,
            });
        }
        Ok(match name.as_str() {
            "true" => ExprKind::Value(Literal::Boolean(true)),
            "false" => ExprKind::Value(Literal::Boolean(false)),
            "null" => ExprKind::Value(Literal::Null),
            _ => ExprKind::Attribute(name),
        })
    }

    /// Arguments after `(`, through `)`. `asc`/`desc` suffixes are accepted
    /// when `ordering` is set.
    fn parse_args(&mut self, ordering: bool) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let start = self.current().span;
            let mut arg = self.parse_expr()?;
            if ordering {
                let descending = self.current().is_word("desc");
                if descending || self.current().is_word("asc") {
                    self.advance();
                    arg = self.node(
                        ExprKind::Ordering {
                            expr: Box::new(arg),
                            descending,
                        },
                        start,
                    );
                }
            }
            args.push(arg);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    /// Elements after `[`, through `]`.
    fn parse_array_elements(&mut self) -> Result<Vec<ArrayElement>, ParseError> {
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            let splat = self.eat(&TokenKind::Ellipsis);
            let value = self.parse_expr()?;
            elements.push(ArrayElement { value, splat });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(elements)
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        self.expect(&TokenKind::LBrace)?;
        let mut attributes = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            attributes.push(self.parse_object_attribute()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(self.node(ExprKind::Object(attributes), start))
    }

    fn parse_object_attribute(&mut self) -> Result<ObjectAttribute, ParseError> {
        let start = self.current().span;
        if self.eat(&TokenKind::Ellipsis) {
            if matches!(self.current().kind, TokenKind::Comma | TokenKind::RBrace) {
                let this = self.node(ExprKind::This, start);
                return Ok(ObjectAttribute::Splat(this));
            }
            return Ok(ObjectAttribute::Splat(self.parse_expr()?));
        }

        let expr = self.parse_expr()?;
        if self.eat(&TokenKind::Colon) {
            let ExprKind::Value(Literal::String(key)) = expr.kind else {
                return Err(Self::error_at(expr.span, "object keys must be string literals"));
            };
            let value = self.parse_expr()?;
            return Ok(ObjectAttribute::Value { key, value });
        }

        if let ExprKind::Pair { left, right } = expr.kind {
            return Ok(ObjectAttribute::Conditional {
                condition: *left,
                value: *right,
            });
        }

        match expr.derived_key() {
            Some(key) => Ok(ObjectAttribute::Value {
                key: key.to_string(),
                value: expr,
            }),
            None => Err(Self::error_at(
                expr.span,
                "cannot determine the property key for this expression, use `\"key\": expression`",
            )),
        }
    }
}
