//! GROQ front end: lexer, AST and parser.
//!
//! ## Module Structure
//!
//! - `token`: tokens and source spans
//! - `lexer`: query text to tokens
//! - `ast`: expression tree with per-node ids
//! - `parser`: recursive-descent parser producing a [`Query`]

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Expr, ExprKind, NodeId, Query};
pub use parser::parse;
pub use token::Span;
