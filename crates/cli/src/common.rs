//! Shared plumbing of the subcommands.

use clap::Args;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use typegen_common::{CONFIG_FILENAME, TypegenConfig};
use typegen_core::{Pipeline, PipelineOutput, QuerySource};
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for query files.
const IGNORED_DIRS: [&str; 6] = [".git", "build", "dist", "node_modules", "out", "target"];

/// Flags shared by `generate` and `check`; each overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Config file (defaults to ./typegen.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Raw schema JSON file
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Generated TypeScript file
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Directory searched for query files
    #[arg(long = "queries", value_name = "DIR")]
    pub queries_root: Option<PathBuf>,

    /// JSON object mapping query keys to query text
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Only emit query result types
    #[arg(long)]
    pub no_schema_types: bool,
}

impl InputArgs {
    /// Config file values with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<TypegenConfig, String> {
        let cwd = std::env::current_dir()
            .map_err(|err| format!("Failed to determine current directory: {err}"))?;
        self.resolve_config_in(&cwd)
    }

    pub fn resolve_config_in(&self, cwd: &Path) -> Result<TypegenConfig, String> {
        let mut config = match &self.config {
            Some(path) => TypegenConfig::load(&cwd.join(path))?,
            None => TypegenConfig::discover(cwd)?,
        };
        if let Some(schema) = &self.schema {
            config.schema = cwd.join(schema);
        }
        if let Some(output) = &self.output {
            config.output = cwd.join(output);
        }
        if let Some(root) = &self.queries_root {
            config.queries.root = cwd.join(root);
        }
        if let Some(manifest) = &self.manifest {
            config.queries.manifest = Some(cwd.join(manifest));
        }
        if self.no_schema_types {
            config.schema_types = false;
        }
        Ok(config)
    }
}

/// Query files under the configured root plus the manifest entries.
///
/// A file's key is its stem. Keys must be unique across both sources.
pub fn collect_queries(config: &TypegenConfig) -> Result<Vec<QuerySource>, String> {
    let mut queries = Vec::new();
    let mut origins: HashMap<String, String> = HashMap::new();

    let root = &config.queries.root;
    if root.is_dir() {
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry))
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !config.is_query_file(path) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "Skipping query file with a non UTF-8 name");
                continue;
            };
            let query = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read query file {}: {err}", path.display()))?;
            add_query(&mut queries, &mut origins, key, query, path.display().to_string())?;
        }
    } else {
        debug!(root = %root.display(), "Query directory does not exist");
    }

    if let Some(manifest) = &config.queries.manifest {
        let contents = fs::read_to_string(manifest)
            .map_err(|err| format!("Failed to read query manifest {}: {err}", manifest.display()))?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&contents).map_err(|err| {
            format!("Failed to parse query manifest {}: {err}", manifest.display())
        })?;
        for (key, query) in entries {
            let origin = manifest.display().to_string();
            add_query(&mut queries, &mut origins, &key, query, origin)?;
        }
    }

    debug!(count = queries.len(), "Collected queries");
    Ok(queries)
}

fn add_query(
    queries: &mut Vec<QuerySource>,
    origins: &mut HashMap<String, String>,
    key: &str,
    query: String,
    origin: String,
) -> Result<(), String> {
    if let Some(first) = origins.get(key) {
        return Err(format!(
            "Duplicate query key `{key}` in {first} and {origin}"
        ));
    }
    origins.insert(key.to_string(), origin);
    queries.push(QuerySource::new(key, query));
    Ok(())
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// Load the schema and run every collected query.
///
/// Queries that fail to parse are printed and counted; the remaining
/// output is still produced.
pub fn generate_code(config: &TypegenConfig) -> Result<Generated, String> {
    let json = fs::read_to_string(&config.schema).map_err(|err| {
        format!(
            "Failed to read schema {}: {err} (set `schema` in {CONFIG_FILENAME} or pass --schema)",
            config.schema.display()
        )
    })?;
    let pipeline = Pipeline::from_json(&json)
        .map_err(|err| format!("Invalid schema {}: {err}", config.schema.display()))?
        .with_schema_types(config.schema_types);

    let queries = collect_queries(config)?;
    let PipelineOutput {
        code,
        reports,
        errors,
    } = pipeline
        .run(&queries)
        .map_err(|err| format!("Failed to emit types: {err}"))?;

    for error in &errors {
        eprintln!("{error}");
    }
    let diagnostics: usize = reports.iter().map(|report| report.diagnostics.len()).sum();
    info!(
        queries = queries.len(),
        failed = errors.len(),
        diagnostics,
        "Generated declarations"
    );

    Ok(Generated {
        code,
        queries: queries.len(),
        failed: errors.len(),
    })
}

/// Result of one generation run.
#[derive(Debug)]
pub struct Generated {
    pub code: String,
    pub queries: usize,
    /// Queries left out because they failed to parse.
    pub failed: usize,
}

impl Generated {
    pub fn failure_message(&self) -> Option<String> {
        (self.failed > 0).then(|| {
            format!(
                "{} of {} queries failed to parse",
                self.failed, self.queries
            )
        })
    }
}
