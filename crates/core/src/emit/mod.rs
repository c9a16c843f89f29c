//! TypeScript declarations from a structure-node forest.
//!
//! Every [`EmitEntry`] becomes one exported type named after its
//! identifier. Shapes are deduplicated by hash: a node equal to an entry
//! renders as a reference to it, and repeated anonymous shapes are hoisted
//! into `Shape_<hash>` aliases. Lazy nodes are always rendered by name, so
//! cyclic schemas produce finite output.
//!
//! ## Module Structure
//!
//! - `types`: TypeScript type IR
//! - `print`: the `Emit` trait rendering IR to text
//! - `render`: structure nodes to IR, naming and hoisting
//! - `utils`: identifier helpers

pub mod print;
mod render;
pub mod types;
pub mod utils;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::EmitError;
use crate::schema::DEFAULT_WORKSPACE;
use crate::structure::StructureNode;
use crate::transform::WorkspaceStructure;
use print::Emit;
use render::Renderer;
use types::TsTypeDef;

/// Header of every generated file.
pub const PREAMBLE: &str = "\
// Generated by typegen. Do not edit.

export interface Reference<T> {
  _ref: string;
  _type: \"reference\";
  _weak?: boolean;
  /** Document type the reference points at. */
  readonly __target?: T;
}
";

/// What an entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// A document or registered type of the schema.
    Schema,
    /// The result of a named query.
    Query,
}

/// One named root of the emitted forest.
#[derive(Debug, Clone)]
pub struct EmitEntry {
    pub source: EntrySource,
    pub workspace: String,
    /// Type name or query key.
    pub identifier: String,
    pub node: StructureNode,
}

impl EmitEntry {
    pub fn schema(workspace: impl Into<String>, identifier: impl Into<String>, node: StructureNode) -> Self {
        Self {
            source: EntrySource::Schema,
            workspace: workspace.into(),
            identifier: identifier.into(),
            node,
        }
    }

    pub fn query(workspace: impl Into<String>, identifier: impl Into<String>, node: StructureNode) -> Self {
        Self {
            source: EntrySource::Query,
            workspace: workspace.into(),
            identifier: identifier.into(),
            node,
        }
    }

    /// Every document and registered type of a workspace, in declaration
    /// order.
    pub fn for_workspace(workspace: &WorkspaceStructure) -> Vec<Self> {
        workspace
            .registered_types_by_name()
            .iter()
            .map(|(name, node)| Self::schema(workspace.name(), name.clone(), node.clone()))
            .collect()
    }

    /// Exported type name: the PascalCase identifier, `Result`-suffixed for
    /// queries and prefixed with the workspace outside the default one.
    pub fn type_name(&self) -> String {
        let mut name = utils::type_name(&self.identifier);
        if self.source == EntrySource::Query {
            name.push_str("Result");
        }
        if self.workspace == DEFAULT_WORKSPACE {
            name
        } else {
            format!("{}{name}", utils::type_name(&self.workspace))
        }
    }
}

impl fmt::Display for EmitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            EntrySource::Schema => "schema type",
            EntrySource::Query => "query",
        };
        write!(f, "{kind} `{}` in workspace `{}`", self.identifier, self.workspace)
    }
}

/// Renders entries to TypeScript.
#[derive(Debug, Clone)]
pub struct TypeEmitter {
    preamble: bool,
}

impl Default for TypeEmitter {
    fn default() -> Self {
        Self { preamble: true }
    }
}

impl TypeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave out the generated-file header and the `Reference<T>` helper.
    pub fn without_preamble(mut self) -> Self {
        self.preamble = false;
        self
    }

    /// Render `entries` in order, followed by hoisted shapes in the order
    /// they were first encountered.
    pub fn emit(&self, entries: &[EmitEntry]) -> Result<String, EmitError> {
        let entries = unique_entries(entries)?;

        let mut renderer = Renderer::default();
        for (name, entry) in &entries {
            renderer.name_entry(&entry.node, name);
        }
        renderer.count_shapes(entries.iter().map(|(_, entry)| &entry.node));

        let mut definitions: Vec<TsTypeDef> = entries
            .iter()
            .map(|(name, entry)| TsTypeDef {
                name: name.clone(),
                ty: renderer.render_entry(&entry.node, name),
            })
            .collect();
        let hoisted = renderer.hoisted_definitions();
        debug!(
            entries = definitions.len(),
            hoisted = hoisted.len(),
            "Rendered type declarations"
        );
        definitions.extend(hoisted);

        let mut output = String::new();
        if self.preamble {
            output.push_str(PREAMBLE);
        }
        for definition in &definitions {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&definition.emit());
        }
        Ok(output)
    }
}

/// Entries paired with their type names; repeats of the same name and shape
/// are dropped, different shapes under one name are an error.
fn unique_entries(entries: &[EmitEntry]) -> Result<Vec<(String, &EmitEntry)>, EmitError> {
    let mut seen: HashMap<String, &EmitEntry> = HashMap::new();
    let mut unique = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.type_name();
        if let Some(first) = seen.get(&name) {
            if first.node.hash() == entry.node.hash() {
                continue;
            }
            return Err(EmitError::NameCollision {
                name,
                first: first.to_string(),
                second: entry.to_string(),
            });
        }
        seen.insert(name.clone(), entry);
        unique.push((name, entry));
    }
    Ok(unique)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::structure::{Flags, Property};

    fn string() -> StructureNode {
        StructureNode::string(None, Flags::REQUIRED)
    }

    #[test]
    fn test_type_names() {
        assert_eq!(EmitEntry::schema("default", "book", string()).type_name(), "Book");
        assert_eq!(EmitEntry::query("default", "allBooks", string()).type_name(), "AllBooksResult");
        assert_eq!(EmitEntry::schema("blog", "post", string()).type_name(), "BlogPost");
        assert_eq!(EmitEntry::query("blog", "posts", string()).type_name(), "BlogPostsResult");
    }

    #[test]
    fn test_name_collision() {
        let entries = [
            EmitEntry::query("default", "all-books", string()),
            EmitEntry::query("default", "allBooks", StructureNode::number(None, Flags::REQUIRED)),
        ];
        let error = TypeEmitter::new().emit(&entries).unwrap_err();
        let EmitError::NameCollision { name, first, second } = error;
        assert_eq!(name, "AllBooksResult");
        assert!(first.contains("all-books"));
        assert!(second.contains("allBooks"));
    }

    #[test]
    fn test_same_name_same_shape_is_emitted_once() {
        let entries = [
            EmitEntry::query("default", "title", string()),
            EmitEntry::query("default", "title", string()),
        ];
        let output = TypeEmitter::new().without_preamble().emit(&entries).unwrap();
        assert_eq!(output, "export type TitleResult = string;\n");
    }

    #[test]
    fn test_entries_reference_each_other() {
        let author = StructureNode::object(
            vec![
                Property::new("_type", StructureNode::string(Some("author".into()), Flags::REQUIRED)),
                Property::new("name", string()),
            ],
            Flags::REQUIRED,
        );
        let entries = [
            EmitEntry::schema("default", "author", author.clone()),
            EmitEntry::query("default", "firstAuthor", author.add_null()),
        ];
        let output = TypeEmitter::new().without_preamble().emit(&entries).unwrap();
        assert_eq!(
            output,
            "export type Author = {\n  _type: \"author\";\n  name: string;\n};\n\n\
             export type FirstAuthorResult = Author | null;\n"
        );
    }

    #[test]
    fn test_preamble_and_never() {
        let entries = [EmitEntry::query("default", "nothing", StructureNode::never())];
        let output = TypeEmitter::new().emit(&entries).unwrap();
        assert!(output.starts_with(PREAMBLE));
        assert!(output.ends_with("\nexport type NothingResult = never;\n"));
    }
}
