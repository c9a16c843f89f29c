//! Canonical schema tree.
//!
//! Produced once per load by [`normalize`](normalize::normalize_schema) and
//! immutable afterwards. Nothing downstream reads raw JSON.

pub mod normalize;
pub mod raw;

pub use normalize::{normalize_schema, normalize_workspace};
pub use raw::RawSchema;

/// Name of the workspace used for a bare list of types.
pub const DEFAULT_WORKSPACE: &str = "default";

/// All workspaces of one schema load, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub workspaces: Vec<WorkspaceSchema>,
}

impl Schema {
    pub fn workspace(&self, name: &str) -> Option<&WorkspaceSchema> {
        self.workspaces.iter().find(|workspace| workspace.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceSchema {
    pub name: String,
    /// Top-level defs of kind `document`.
    pub document_types: Vec<Def>,
    /// Every other registered type.
    pub top_level_types: Vec<Def>,
}

impl WorkspaceSchema {
    /// Look up a registered def (document or type) by name.
    pub fn lookup(&self, name: &str) -> Option<&Def> {
        self.document_types
            .iter()
            .chain(&self.top_level_types)
            .find(|def| def.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionType {
    Primitive,
    /// A named pointer resolved through the workspace registry.
    Alias,
}

/// One type definition.
#[derive(Debug, Clone)]
pub struct Def {
    /// The raw `type` tag (`"string"`, `"object"`, `"author"`, ...).
    pub type_name: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub read_only: bool,
    pub codegen_required: bool,
    pub has_validation: bool,
    pub kind: DefKind,
}

impl Def {
    pub fn definition_type(&self) -> DefinitionType {
        if matches!(self.kind, DefKind::Alias) {
            DefinitionType::Alias
        } else {
            DefinitionType::Primitive
        }
    }

    pub fn is_alias(&self) -> bool {
        self.definition_type() == DefinitionType::Alias
    }
}

/// Structural part of a def, by primitive kind.
#[derive(Debug, Clone)]
pub enum DefKind {
    /// Points at the registered type named by `type_name`.
    Alias,
    Array {
        of: Vec<Def>,
        list: Vec<ListOption>,
    },
    Object {
        fields: Vec<Field>,
    },
    Document {
        fields: Vec<Field>,
    },
    Image {
        fields: Vec<Field>,
    },
    File {
        fields: Vec<Field>,
    },
    Boolean,
    Date,
    Datetime,
    Geopoint,
    Number {
        list: Vec<ListOption>,
    },
    String {
        list: Vec<ListOption>,
    },
    Text,
    Url,
    Slug,
    Reference {
        /// Alias defs only.
        to: Vec<Def>,
        weak: bool,
    },
    Block {
        /// Inline object types allowed between spans.
        of: Vec<Def>,
        annotations: Vec<Def>,
        styles: Vec<ListOption>,
        lists: Vec<ListOption>,
    },
}

impl DefKind {
    /// Whether values of this kind are JSON objects.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            DefKind::Object { .. }
                | DefKind::Document { .. }
                | DefKind::Image { .. }
                | DefKind::File { .. }
                | DefKind::Geopoint
                | DefKind::Slug
                | DefKind::Reference { .. }
                | DefKind::Block { .. }
        )
    }
}

/// A named field of an object-like def.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub def: Def,
}

impl Field {
    pub fn is_required(&self) -> bool {
        self.def.codegen_required
    }
}

/// One entry of `options.list` (or a block's `styles`/`lists`).
#[derive(Debug, Clone, PartialEq)]
pub struct ListOption {
    pub title: Option<String>,
    pub value: ListValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListValue {
    String(String),
    Number(f64),
}
