//! Schema to structure transform.
//!
//! Every document and registered type of a workspace becomes a lazy node
//! whose thunk converts the def on first use. Aliases resolve through the
//! registry to those lazies, so self-referencing schemas stay finite.
//!
//! ## Module Structure
//!
//! - `convert`: def to structure node conversion rules

mod convert;

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::schema::{Def, Schema, WorkspaceSchema};
use crate::structure::StructureNode;

/// Asset document types referenced by `image` and `file` values.
pub const IMAGE_ASSET_TYPE: &str = "sanity.imageAsset";
pub const FILE_ASSET_TYPE: &str = "sanity.fileAsset";

/// Registered defs and their lazy nodes, shared with the thunks.
#[derive(Debug)]
pub(crate) struct Registry {
    workspace: String,
    defs: IndexMap<String, Def>,
    nodes: IndexMap<String, StructureNode>,
    image_asset: StructureNode,
    file_asset: StructureNode,
}

impl Registry {
    fn build(workspace: &WorkspaceSchema) -> Arc<Self> {
        let defs: IndexMap<String, Def> = workspace
            .document_types
            .iter()
            .chain(&workspace.top_level_types)
            .filter_map(|def| def.name.clone().map(|name| (name, def.clone())))
            .collect();
        let documents: Vec<&str> = workspace
            .document_types
            .iter()
            .filter_map(|def| def.name.as_deref())
            .collect();

        Arc::new_cyclic(|weak: &Weak<Registry>| {
            let nodes = defs
                .keys()
                .map(|name| {
                    let kind = if documents.contains(&name.as_str()) {
                        "document"
                    } else {
                        "type"
                    };
                    let id = format!("{}:{kind}:{name}", workspace.name);
                    let registry = weak.clone();
                    let target = name.clone();
                    let node = StructureNode::lazy(id, move || match registry.upgrade() {
                        Some(registry) => registry.convert_registered(&target),
                        None => StructureNode::Unknown,
                    });
                    (name.clone(), node)
                })
                .collect();

            let image_asset = asset_lazy(&workspace.name, IMAGE_ASSET_TYPE);
            let file_asset = asset_lazy(&workspace.name, FILE_ASSET_TYPE);

            Registry {
                workspace: workspace.name.clone(),
                defs,
                nodes,
                image_asset,
                file_asset,
            }
        })
    }
}

fn asset_lazy(workspace: &str, type_name: &'static str) -> StructureNode {
    StructureNode::lazy(format!("{workspace}:type:{type_name}"), move || {
        convert::asset_document(type_name)
    })
}

/// The structure of one workspace.
///
/// Lazy nodes handed out by this value (and nodes computed from them) are
/// valid while it is alive. Dropping it releases every lazy cell, which
/// breaks reference cycles; released lazies dereference to `Unknown`.
#[derive(Debug)]
pub struct WorkspaceStructure {
    registry: Arc<Registry>,
    documents_node: StructureNode,
    document_names: Vec<String>,
}

impl WorkspaceStructure {
    pub fn name(&self) -> &str {
        &self.registry.workspace
    }

    /// Union of all document lazies, in declaration order.
    pub fn documents_node(&self) -> &StructureNode {
        &self.documents_node
    }

    /// Lazy nodes of every document and registered type, in declaration
    /// order (documents first).
    pub fn registered_types_by_name(&self) -> &IndexMap<String, StructureNode> {
        &self.registry.nodes
    }

    pub fn document_names(&self) -> &[String] {
        &self.document_names
    }

    pub fn registered(&self, name: &str) -> Option<&StructureNode> {
        self.registry.nodes.get(name)
    }

    pub fn is_document(&self, name: &str) -> bool {
        self.document_names.iter().any(|document| document == name)
    }

    /// Asset document nodes referenced by images and files.
    pub fn asset_nodes(&self) -> [&StructureNode; 2] {
        [&self.registry.image_asset, &self.registry.file_asset]
    }
}

impl Drop for WorkspaceStructure {
    fn drop(&mut self) {
        let lazies = self
            .registry
            .nodes
            .values()
            .chain([&self.registry.image_asset, &self.registry.file_asset]);
        for node in lazies {
            if let StructureNode::Lazy(lazy) = node {
                lazy.release();
            }
        }
    }
}

/// Transform one workspace schema.
pub fn transform_workspace(workspace: &WorkspaceSchema) -> WorkspaceStructure {
    let registry = Registry::build(workspace);

    let document_names: Vec<String> = workspace
        .document_types
        .iter()
        .filter_map(|def| def.name.clone())
        .collect();
    let documents_node = StructureNode::or(
        document_names
            .iter()
            .filter_map(|name| registry.nodes.get(name).cloned()),
    );

    debug!(
        workspace = %workspace.name,
        documents = document_names.len(),
        registered = registry.nodes.len(),
        "Transformed workspace schema"
    );

    WorkspaceStructure {
        registry,
        documents_node,
        document_names,
    }
}

/// Transform every workspace of a schema.
pub fn transform_schema(schema: &Schema) -> Vec<WorkspaceStructure> {
    schema.workspaces.iter().map(transform_workspace).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::schema::{RawSchema, normalize_schema};
    use crate::structure::{Flags, StructureNode};

    pub(super) fn workspace(json: &str) -> WorkspaceStructure {
        let schema = normalize_schema(&RawSchema::from_json(json).unwrap()).unwrap();
        transform_workspace(&schema.workspaces[0])
    }

    fn object_of(node: &StructureNode) -> std::sync::Arc<crate::structure::ObjectNode> {
        match node.resolve() {
            StructureNode::Object(object) => object,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_documents_node_in_order() {
        let structure = workspace(
            r#"[{"name": "author", "type": "document"}, {"name": "tag", "type": "object"}, {"name": "book", "type": "document"}]"#,
        );
        let StructureNode::Or(documents) = structure.documents_node() else {
            panic!("expected union");
        };
        let ids: Vec<&str> = documents
            .children()
            .iter()
            .map(|child| match child {
                StructureNode::Lazy(lazy) => lazy.id(),
                other => panic!("expected lazy, got {other:?}"),
            })
            .collect();
        assert_eq!(ids, ["default:document:author", "default:document:book"]);
        assert!(structure.is_document("book"));
        assert!(!structure.is_document("tag"));
        assert_eq!(structure.registered_types_by_name().len(), 3);
    }

    #[test]
    fn test_transform_does_not_force() {
        let structure = workspace(r#"[{"name": "book", "type": "document"}]"#);
        let Some(StructureNode::Lazy(lazy)) = structure.registered("book") else {
            panic!("expected lazy");
        };
        assert!(!lazy.is_evaluated());
    }

    #[test]
    fn test_self_reference_is_finite() {
        let structure = workspace(
            r#"[{"name": "person", "type": "document", "fields": [
                {"name": "friend", "type": "reference", "to": [{"type": "person"}]},
                {"name": "mentor", "type": "person"}
            ]}]"#,
        );
        let person = structure.registered("person").unwrap();
        let first = person.resolve();
        let second = person.resolve();
        assert_eq!(first.hash(), second.hash());

        let object = object_of(person);
        let StructureNode::Reference(friend) = object.get("friend").unwrap() else {
            panic!("expected reference");
        };
        assert_eq!(friend.to().hash(), person.hash());
        assert!(object.get("mentor").unwrap().can_be_optional());
    }

    #[test]
    fn test_release_on_drop() {
        let structure = workspace(r#"[{"name": "book", "type": "document"}]"#);
        let book = structure.registered("book").unwrap().clone();
        drop(structure);
        assert!(book.resolve().is_unknown());
    }

    #[test]
    fn test_unknown_alias_is_unknown() {
        let structure = workspace(
            r#"[{"name": "post", "type": "document", "fields": [{"name": "x", "type": "missing"}]}]"#,
        );
        let object = object_of(structure.registered("post").unwrap());
        assert!(object.get("x").unwrap().is_unknown());
    }

    #[test]
    fn test_weak_reference_is_nullable() {
        let structure = workspace(
            r#"[{"name": "author", "type": "document"},
                {"name": "book", "type": "document", "fields": [
                    {"name": "author", "type": "reference", "weak": true, "to": [{"type": "author"}]}
                ]}]"#,
        );
        let object = object_of(structure.registered("book").unwrap());
        let author = object.get("author").unwrap();
        assert!(matches!(author, StructureNode::Reference(_)));
        assert_eq!(author.flags(), Flags::new(true, true));
    }
}
