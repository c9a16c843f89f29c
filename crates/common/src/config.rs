//! Project configuration, read from `typegen.toml`.
//!
//! ```toml
//! schema = "schema.json"
//! output = "query-types.d.ts"
//! schema_types = true
//!
//! [queries]
//! root = "src"
//! extensions = ["groq"]
//! manifest = "queries.json"
//! ```
//!
//! Every field is optional. Relative paths are resolved against the
//! directory holding the config file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config filename looked up in the working directory
pub const CONFIG_FILENAME: &str = "typegen.toml";

const DEFAULT_SCHEMA: &str = "schema.json";
const DEFAULT_OUTPUT: &str = "query-types.d.ts";
const DEFAULT_QUERIES_ROOT: &str = "src";
const DEFAULT_EXTENSION: &str = "groq";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypegenConfig {
    /// Raw schema JSON.
    pub schema: PathBuf,
    /// Generated TypeScript file.
    pub output: PathBuf,
    /// Emit documents and registered types next to query results.
    pub schema_types: bool,
    pub queries: QueriesConfig,
}

/// Where queries come from: files under `root` and an optional manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueriesConfig {
    pub root: PathBuf,
    /// File extensions, without the dot.
    pub extensions: Vec<String>,
    /// JSON object mapping query keys to query text.
    pub manifest: Option<PathBuf>,
}

impl Default for TypegenConfig {
    fn default() -> Self {
        Self {
            schema: PathBuf::from(DEFAULT_SCHEMA),
            output: PathBuf::from(DEFAULT_OUTPUT),
            schema_types: true,
            queries: QueriesConfig::default(),
        }
    }
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_QUERIES_ROOT),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            manifest: None,
        }
    }
}

impl TypegenConfig {
    /// Parse a config from TOML text. Paths are left as written.
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| format!("Failed to parse config: {err}"))
    }

    /// Load a config file and resolve its paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config file {}: {err}", path.display()))?;
        let config = toml::from_str::<Self>(&contents)
            .map_err(|err| format!("Failed to parse config file {}: {err}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        debug!(path = %path.display(), "Loaded config");
        Ok(config.resolve(base))
    }

    /// Load `typegen.toml` from `dir` if present, otherwise the defaults
    /// resolved against `dir`.
    pub fn discover(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILENAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            debug!(dir = %dir.display(), "No config file, using defaults");
            Ok(Self::default().resolve(dir))
        }
    }

    /// Make every relative path absolute under `base`.
    pub fn resolve(mut self, base: &Path) -> Self {
        self.schema = resolve_path(base, &self.schema);
        self.output = resolve_path(base, &self.output);
        self.queries.root = resolve_path(base, &self.queries.root);
        self.queries.manifest = self
            .queries
            .manifest
            .map(|manifest| resolve_path(base, &manifest));
        self
    }

    /// Whether `path` has one of the configured query extensions.
    pub fn is_query_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.queries.extensions.iter().any(|e| e == ext))
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TypegenConfig::from_toml("").unwrap();
        assert_eq!(config, TypegenConfig::default());
        assert_eq!(config.queries.extensions, vec!["groq".to_string()]);
        assert!(config.schema_types);
        assert!(config.queries.manifest.is_none());
    }

    #[test]
    fn test_partial_config() {
        let config = TypegenConfig::from_toml(
            r#"
            output = "types/queries.ts"
            [queries]
            manifest = "queries.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.schema, PathBuf::from("schema.json"));
        assert_eq!(config.output, PathBuf::from("types/queries.ts"));
        assert_eq!(config.queries.root, PathBuf::from("src"));
        assert_eq!(config.queries.manifest, Some(PathBuf::from("queries.json")));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let error = TypegenConfig::from_toml("schemas = \"x.json\"").unwrap_err();
        assert!(error.starts_with("Failed to parse config"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "schema = \"studio/schema.json\"\n[queries]\nroot = \"app\"\nmanifest = \"/abs/queries.json\"\n",
        )
        .unwrap();

        let config = TypegenConfig::load(&path).unwrap();
        assert_eq!(config.schema, temp_dir.path().join("studio/schema.json"));
        assert_eq!(config.output, temp_dir.path().join("query-types.d.ts"));
        assert_eq!(config.queries.root, temp_dir.path().join("app"));
        assert_eq!(config.queries.manifest, Some(PathBuf::from("/abs/queries.json")));
    }

    #[test]
    fn test_discover_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = TypegenConfig::discover(temp_dir.path()).unwrap();
        assert_eq!(config.schema, temp_dir.path().join("schema.json"));
        assert_eq!(config.queries.root, temp_dir.path().join("src"));
    }

    #[test]
    fn test_query_extensions() {
        let mut config = TypegenConfig::default();
        config.queries.extensions.push("gq".to_string());
        assert!(config.is_query_file(Path::new("a/b.groq")));
        assert!(config.is_query_file(Path::new("b.gq")));
        assert!(!config.is_query_file(Path::new("b.ts")));
        assert!(!config.is_query_file(Path::new("groq")));
    }
}
