//! GROQ abstract syntax tree.

use super::token::Span;

/// Identity of an expression node, unique within one parsed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A parsed query: custom function definitions followed by the body.
#[derive(Debug, Clone)]
pub struct Query {
    pub functions: Vec<FunctionDef>,
    pub body: Expr,
}

/// `fn ns::name($a, $b) = body;`
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub namespace: String,
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `*`
    Everything,
    /// `@`
    This,
    /// `^`, `^.^`, ... with the number of levels.
    Parent(usize),
    /// `$name`
    Param(String),
    /// A bare identifier: attribute of `@`.
    Attribute(String),
    Value(Literal),
    Array(Vec<ArrayElement>),
    Object(Vec<ObjectAttribute>),
    /// `( expr )`
    Group(Box<Expr>),

    /// `base.name` or `base["name"]`
    AccessAttribute { base: Box<Expr>, name: String },
    /// `base[3]`
    AccessElement { base: Box<Expr>, index: Box<Expr> },
    /// `base[1..3]`
    Slice {
        base: Box<Expr>,
        start: Box<Expr>,
        end: Box<Expr>,
        exclusive: bool,
    },
    /// `base[condition]`
    Filter { base: Box<Expr>, condition: Box<Expr> },
    /// `base[]`
    ArrayPostfix(Box<Expr>),
    /// `base{ ... }`
    Projection { base: Box<Expr>, object: Box<Expr> },
    /// `base->` or `base->name`
    Deref {
        base: Box<Expr>,
        attribute: Option<String>,
    },

    /// `ns::name(args)`; the namespace defaults to `global`.
    FuncCall {
        namespace: String,
        name: String,
        args: Vec<Expr>,
    },
    /// `base | name(args)`
    PipeFuncCall {
        base: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `a..b` or `a...b`
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        exclusive: bool,
    },
    /// `condition => value`
    Pair { left: Box<Expr>, right: Box<Expr> },
    /// `expr asc` / `expr desc` inside `order(...)`.
    Ordering { expr: Box<Expr>, descending: bool },
}

#[derive(Debug, Clone)]
pub struct ArrayElement {
    pub value: Expr,
    /// `...value`
    pub splat: bool,
}

#[derive(Debug, Clone)]
pub enum ObjectAttribute {
    /// `"key": value`, or a shorthand with a derived key.
    Value { key: String, value: Expr },
    /// `...value`; a bare `...` spreads `@`.
    Splat(Expr),
    /// `condition => { ... }`
    Conditional { condition: Expr, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Match,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::In
                | BinaryOp::Match
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl Expr {
    /// The key a projection shorthand `{ expr }` produces, if derivable.
    ///
    /// Follows the chain back to its last attribute: `author->name` gives
    /// `name`, `tags[]` gives `tags`, `image.asset->` gives `asset`.
    pub fn derived_key(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Attribute(name)
            | ExprKind::AccessAttribute { name, .. }
            | ExprKind::Deref {
                attribute: Some(name),
                ..
            } => Some(name),
            ExprKind::Deref {
                base,
                attribute: None,
            }
            | ExprKind::Projection { base, .. }
            | ExprKind::Filter { base, .. }
            | ExprKind::AccessElement { base, .. }
            | ExprKind::Slice { base, .. }
            | ExprKind::ArrayPostfix(base) => base.derived_key(),
            _ => None,
        }
    }
}
