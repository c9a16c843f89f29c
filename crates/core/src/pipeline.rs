//! One typegen invocation: a schema plus a batch of queries to TypeScript.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::emit::{EmitEntry, TypeEmitter};
use crate::error::{Diagnostic, EmitError, QueryError, SchemaError};
use crate::evaluate::evaluate_query;
use crate::groq::{Query, parse};
use crate::schema::{RawSchema, Schema, normalize_schema};
use crate::transform::transform_schema;

/// A named GROQ query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySource {
    pub key: String,
    pub query: String,
}

impl QuerySource {
    pub fn new(key: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            query: query.into(),
        }
    }
}

/// Soft diagnostics of one query in one workspace.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub key: String,
    pub workspace: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Generated TypeScript.
    pub code: String,
    /// Queries that evaluated, per workspace.
    pub reports: Vec<QueryReport>,
    /// Queries that failed to parse; they are missing from `code`.
    pub errors: Vec<QueryError>,
}

/// Schema loaded once, reused for any number of query batches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    schema: Schema,
    schema_types: bool,
    emitter: TypeEmitter,
}

impl Pipeline {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            schema_types: true,
            emitter: TypeEmitter::new(),
        }
    }

    pub fn from_raw(raw: RawSchema) -> Result<Self, SchemaError> {
        Ok(Self::new(normalize_schema(&raw)?))
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Self::from_raw(RawSchema::from_json(json)?)
    }

    /// Whether documents and registered types are emitted next to the
    /// query results.
    pub fn with_schema_types(mut self, enabled: bool) -> Self {
        self.schema_types = enabled;
        self
    }

    pub fn with_emitter(mut self, emitter: TypeEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse and evaluate `queries` against every workspace and emit the
    /// declarations. A query that fails to parse is reported in `errors`
    /// and does not affect the others.
    pub fn run(&self, queries: &[QuerySource]) -> Result<PipelineOutput, EmitError> {
        let parsed: Vec<Result<(&str, Query), QueryError>> = queries
            .par_iter()
            .map(|source| {
                parse(&source.query)
                    .map(|query| (source.key.as_str(), query))
                    .map_err(|error| QueryError {
                        key: source.key.clone(),
                        source: error,
                    })
            })
            .collect();

        let mut valid = Vec::with_capacity(parsed.len());
        let mut errors = Vec::new();
        for result in parsed {
            match result {
                Ok(query) => valid.push(query),
                Err(error) => {
                    warn!(%error, "Skipping query that failed to parse");
                    errors.push(error);
                }
            }
        }

        // structures must outlive emission: dropping one releases its lazies
        let structures = transform_schema(&self.schema);
        let mut entries = Vec::new();
        let mut reports = Vec::new();
        for structure in &structures {
            if self.schema_types {
                entries.extend(EmitEntry::for_workspace(structure));
            }

            let evaluated: Vec<_> = valid
                .par_iter()
                .map(|(key, query)| (*key, evaluate_query(query, structure)))
                .collect();

            for (key, evaluation) in evaluated {
                for diagnostic in &evaluation.diagnostics {
                    warn!(query = key, workspace = structure.name(), %diagnostic, "Typed part of query as unknown");
                }
                reports.push(QueryReport {
                    key: key.to_string(),
                    workspace: structure.name().to_string(),
                    diagnostics: evaluation.diagnostics,
                });
                entries.push(EmitEntry::query(structure.name(), key, evaluation.node));
            }
            debug!(workspace = structure.name(), queries = valid.len(), "Evaluated queries");
        }

        let code = self.emitter.emit(&entries)?;
        info!(
            workspaces = structures.len(),
            queries = valid.len(),
            failed = errors.len(),
            "Generated query types"
        );
        Ok(PipelineOutput {
            code,
            reports,
            errors,
        })
    }
}
