//! GROQ query result type inference.
//!
//! Turns a content schema plus GROQ queries into TypeScript declarations
//! describing each query's result.
//!
//! ## Module Structure
//!
//! - `schema`: raw schema model and normalization into a canonical tree
//! - `structure`: the structure-node IR shared by every later stage
//! - `transform`: canonical schema to structure nodes, per workspace
//! - `groq`: query lexer and parser
//! - `evaluate`: symbolic query evaluation over structure nodes
//! - `emit`: TypeScript rendering
//! - `pipeline`: one schema plus a batch of queries, end to end
//! - `error`: hard errors and soft diagnostics

pub mod emit;
pub mod error;
pub mod evaluate;
pub mod groq;
pub mod pipeline;
pub mod schema;
pub mod structure;
pub mod transform;

pub use emit::{EmitEntry, TypeEmitter};
pub use error::{Diagnostic, DiagnosticKind, EmitError, ParseError, QueryError, SchemaError};
pub use evaluate::{QueryEvaluation, evaluate_query};
pub use pipeline::{Pipeline, PipelineOutput, QueryReport, QuerySource};
pub use schema::{RawSchema, Schema, normalize_schema};
pub use structure::{Flags, StructureNode};
pub use transform::{WorkspaceStructure, transform_schema, transform_workspace};
