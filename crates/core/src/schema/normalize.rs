//! Normalization from the raw schema to the canonical tree.
//!
//! This module handles all the schema-shape rules:
//! - Name validation and duplicate detection
//! - Placement rules for `document` and `span`
//! - `codegen.required` consistency
//! - List options, reference targets, block members

use std::collections::HashSet;

use tracing::debug;

use super::raw::{RawListEntry, RawScalar, RawSchema, RawType, RawWorkspace, truthy_flag};
use super::{DEFAULT_WORKSPACE, Def, DefKind, Field, ListOption, ListValue, Schema, WorkspaceSchema};
use crate::error::SchemaError;

/// Where a def appears, for the placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    TopLevel,
    Nested,
    /// Member of a block's `of` list.
    BlockMember,
}

/// Kinds that cannot be reference targets.
const INLINE_TARGET_KINDS: &[&str] = &[
    "object", "array", "reference", "block", "span", "document", "image", "file",
];

/// Normalize a raw schema into the canonical tree.
pub fn normalize_schema(raw: &RawSchema) -> Result<Schema, SchemaError> {
    let workspaces = match raw {
        RawSchema::Types(types) => vec![normalize_workspace(DEFAULT_WORKSPACE, types)?],
        RawSchema::Workspaces { workspaces } => normalize_workspaces(workspaces)?,
    };
    Ok(Schema { workspaces })
}

fn normalize_workspaces(raw: &[RawWorkspace]) -> Result<Vec<WorkspaceSchema>, SchemaError> {
    let mut names = HashSet::new();
    let mut workspaces = Vec::with_capacity(raw.len());
    for workspace in raw {
        if !names.insert(workspace.name.as_str()) {
            return Err(SchemaError::DuplicateWorkspace {
                name: workspace.name.clone(),
            });
        }
        workspaces.push(normalize_workspace(&workspace.name, &workspace.types)?);
    }
    Ok(workspaces)
}

/// Normalize the types of one workspace.
pub fn normalize_workspace(name: &str, types: &[RawType]) -> Result<WorkspaceSchema, SchemaError> {
    let registry = collect_registry(types)?;
    let normalizer = Normalizer { registry };

    let mut document_types = Vec::new();
    let mut top_level_types = Vec::new();
    for raw in types {
        // collect_registry already checked that both are present
        let type_name = raw.name.as_deref().unwrap_or_default();
        let Some(def) = normalizer.normalize_def(raw, type_name, Position::TopLevel)? else {
            continue;
        };
        if matches!(def.kind, DefKind::Document { .. }) {
            document_types.push(def);
        } else {
            top_level_types.push(def);
        }
    }

    debug!(
        workspace = name,
        documents = document_types.len(),
        types = top_level_types.len(),
        "Normalized workspace schema"
    );

    Ok(WorkspaceSchema {
        name: name.to_string(),
        document_types,
        top_level_types,
    })
}

/// Check names and uniqueness of the top-level types and return the set of
/// registered names.
fn collect_registry(types: &[RawType]) -> Result<HashSet<String>, SchemaError> {
    let mut registry = HashSet::new();
    for (index, raw) in types.iter().enumerate() {
        let Some(name) = raw.name.as_deref() else {
            return Err(SchemaError::MissingName {
                path: format!("types[{index}]"),
            });
        };
        validate_name(name, name)?;
        if raw.type_name.is_none() {
            return Err(SchemaError::MissingType {
                path: name.to_string(),
            });
        }
        if !registry.insert(name.to_string()) {
            return Err(SchemaError::DuplicateName {
                path: name.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(registry)
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_name(name: &str, path: &str) -> Result<(), SchemaError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            path: path.to_string(),
            name: name.to_string(),
        })
    }
}

struct Normalizer {
    registry: HashSet<String>,
}

impl Normalizer {
    /// Normalize one def. Returns `None` for spans inside a block.
    fn normalize_def(&self, raw: &RawType, path: &str, position: Position) -> Result<Option<Def>, SchemaError> {
        let Some(type_name) = raw.type_name.as_deref() else {
            return Err(SchemaError::MissingType {
                path: path.to_string(),
            });
        };

        if type_name == "document" && position != Position::TopLevel {
            return Err(SchemaError::NestedDocument {
                path: path.to_string(),
            });
        }
        if type_name == "span" {
            if position == Position::BlockMember {
                return Ok(None);
            }
            return Err(SchemaError::SpanOutsideBlock {
                path: path.to_string(),
            });
        }

        let codegen_required = raw
            .codegen
            .as_ref()
            .and_then(|codegen| codegen.required)
            .unwrap_or(false);
        let has_validation = raw.validation.as_ref().is_some_and(|value| !value.is_null());
        if codegen_required && !has_validation {
            return Err(SchemaError::RequiredWithoutValidation {
                path: path.to_string(),
            });
        }

        let kind = self.normalize_kind(raw, type_name, path)?;

        Ok(Some(Def {
            type_name: type_name.to_string(),
            name: raw.name.clone(),
            title: raw.title.clone(),
            description: raw.description.clone(),
            hidden: truthy_flag(raw.hidden.as_ref()),
            read_only: truthy_flag(raw.read_only.as_ref()),
            codegen_required,
            has_validation,
            kind,
        }))
    }

    fn normalize_kind(&self, raw: &RawType, type_name: &str, path: &str) -> Result<DefKind, SchemaError> {
        let kind = match type_name {
            "array" => DefKind::Array {
                of: self.normalize_members(raw, path, Position::Nested)?,
                list: normalize_list(raw),
            },
            "object" => DefKind::Object {
                fields: self.normalize_fields(raw, path)?,
            },
            "document" => DefKind::Document {
                fields: self.normalize_fields(raw, path)?,
            },
            "image" => DefKind::Image {
                fields: self.normalize_fields(raw, path)?,
            },
            "file" => DefKind::File {
                fields: self.normalize_fields(raw, path)?,
            },
            "boolean" => DefKind::Boolean,
            "date" => DefKind::Date,
            "datetime" => DefKind::Datetime,
            "geopoint" => DefKind::Geopoint,
            "number" => DefKind::Number {
                list: normalize_list(raw),
            },
            "string" => DefKind::String {
                list: normalize_list(raw),
            },
            "text" => DefKind::Text,
            "url" => DefKind::Url,
            "slug" => DefKind::Slug,
            "reference" => self.normalize_reference(raw, path)?,
            "block" => self.normalize_block(raw, path)?,
            _ => {
                if !self.registry.contains(type_name) {
                    debug!(path, type_name, "Unresolved type name, keeping alias placeholder");
                }
                DefKind::Alias
            }
        };
        Ok(kind)
    }

    fn normalize_fields(&self, raw: &RawType, path: &str) -> Result<Vec<Field>, SchemaError> {
        let Some(raw_fields) = &raw.fields else {
            return Ok(Vec::new());
        };

        let mut fields = Vec::with_capacity(raw_fields.len());
        let mut names = HashSet::new();
        for (index, raw_field) in raw_fields.iter().enumerate() {
            let Some(name) = raw_field.name.as_deref() else {
                return Err(SchemaError::MissingName {
                    path: format!("{path}.fields[{index}]"),
                });
            };
            let field_path = format!("{path}.{name}");
            validate_name(name, &field_path)?;
            if !names.insert(name) {
                return Err(SchemaError::DuplicateName {
                    path: field_path,
                    name: name.to_string(),
                });
            }
            if let Some(mut def) = self.normalize_def(raw_field, &field_path, Position::Nested)? {
                // the field name lives on the field
                def.name = None;
                fields.push(Field {
                    name: name.to_string(),
                    def,
                });
            }
        }
        Ok(fields)
    }

    fn normalize_members(&self, raw: &RawType, path: &str, position: Position) -> Result<Vec<Def>, SchemaError> {
        let members = raw.of.as_deref().unwrap_or_default();
        if members.is_empty() && position == Position::Nested {
            return Err(SchemaError::EmptyArray {
                path: path.to_string(),
            });
        }

        let mut defs = Vec::with_capacity(members.len());
        for member in members {
            let member_path = match member.name.as_deref() {
                Some(name) => {
                    let member_path = format!("{path}[{name}]");
                    validate_name(name, &member_path)?;
                    member_path
                }
                None => format!("{path}[]"),
            };
            if let Some(def) = self.normalize_def(member, &member_path, position)? {
                defs.push(def);
            }
        }
        Ok(defs)
    }

    fn normalize_reference(&self, raw: &RawType, path: &str) -> Result<DefKind, SchemaError> {
        let targets = raw.to.as_ref().map(|to| to.targets()).unwrap_or_default();
        if targets.is_empty() {
            return Err(SchemaError::EmptyReference {
                path: path.to_string(),
            });
        }

        let mut to = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(type_name) = target.type_name.as_deref() else {
                return Err(SchemaError::MissingType {
                    path: format!("{path}.to"),
                });
            };
            let inline = target.fields.is_some()
                || target.of.is_some()
                || target.to.is_some()
                || INLINE_TARGET_KINDS.contains(&type_name);
            if inline {
                return Err(SchemaError::InlineReferenceTarget {
                    path: path.to_string(),
                    found: type_name.to_string(),
                });
            }
            to.push(alias(type_name));
        }

        Ok(DefKind::Reference {
            to,
            weak: raw.weak.unwrap_or(false),
        })
    }

    fn normalize_block(&self, raw: &RawType, path: &str) -> Result<DefKind, SchemaError> {
        let of = self.normalize_members(raw, path, Position::BlockMember)?;

        let mut annotations = Vec::new();
        let raw_annotations = raw
            .marks
            .as_ref()
            .and_then(|marks| marks.annotations.as_deref())
            .unwrap_or_default();
        for (index, annotation) in raw_annotations.iter().enumerate() {
            let annotation_path = match annotation.name.as_deref() {
                Some(name) => format!("{path}.marks.{name}"),
                None => format!("{path}.marks[{index}]"),
            };
            if let Some(name) = annotation.name.as_deref() {
                validate_name(name, &annotation_path)?;
            }
            if let Some(def) = self.normalize_def(annotation, &annotation_path, Position::Nested)? {
                annotations.push(def);
            }
        }

        Ok(DefKind::Block {
            of,
            annotations,
            styles: normalize_entries(raw.styles.as_deref()),
            lists: normalize_entries(raw.lists.as_deref()),
        })
    }
}

fn alias(type_name: &str) -> Def {
    Def {
        type_name: type_name.to_string(),
        name: None,
        title: None,
        description: None,
        hidden: false,
        read_only: false,
        codegen_required: false,
        has_validation: false,
        kind: DefKind::Alias,
    }
}

fn normalize_list(raw: &RawType) -> Vec<ListOption> {
    normalize_entries(raw.options.as_ref().and_then(|options| options.list.as_deref()))
}

fn normalize_entries(entries: Option<&[RawListEntry]>) -> Vec<ListOption> {
    entries
        .unwrap_or_default()
        .iter()
        .map(|entry| match entry {
            RawListEntry::Scalar(value) => ListOption {
                title: None,
                value: list_value(value),
            },
            RawListEntry::Titled { title, value } => ListOption {
                title: title.clone(),
                value: list_value(value),
            },
        })
        .collect()
}

fn list_value(value: &RawScalar) -> ListValue {
    match value {
        RawScalar::String(value) => ListValue::String(value.clone()),
        RawScalar::Number(value) => ListValue::Number(*value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn normalize(json: &str) -> Result<Schema, SchemaError> {
        normalize_schema(&RawSchema::from_json(json).unwrap())
    }

    const BOOKS: &str = r#"[
        {"name": "author", "type": "document", "fields": [
            {"name": "name", "type": "string", "validation": {}, "codegen": {"required": true}}
        ]},
        {"name": "book", "type": "document", "fields": [
            {"name": "title", "type": "string"},
            {"name": "author", "type": "reference", "to": [{"type": "author"}]},
            {"name": "genre", "type": "string", "options": {"list": ["fiction", {"title": "Non fiction", "value": "nonfiction"}]}}
        ]},
        {"name": "blurb", "type": "object", "fields": [{"name": "text", "type": "text"}]}
    ]"#;

    #[test]
    fn test_bare_list_is_default_workspace() {
        let schema = normalize(BOOKS).unwrap();
        assert_eq!(schema.workspaces.len(), 1);
        let workspace = &schema.workspaces[0];
        assert_eq!(workspace.name, DEFAULT_WORKSPACE);

        let documents: Vec<_> = workspace
            .document_types
            .iter()
            .map(|def| def.name.as_deref().unwrap())
            .collect();
        assert_eq!(documents, ["author", "book"]);
        assert_eq!(workspace.top_level_types.len(), 1);
    }

    #[test]
    fn test_fields_and_required() {
        let schema = normalize(BOOKS).unwrap();
        let author = schema.workspaces[0].lookup("author").unwrap();
        let DefKind::Document { fields } = &author.kind else {
            panic!("expected document");
        };
        assert_eq!(fields[0].name, "name");
        assert!(fields[0].is_required());
        assert!(fields[0].def.has_validation);
    }

    #[test]
    fn test_list_options() {
        let schema = normalize(BOOKS).unwrap();
        let book = schema.workspaces[0].lookup("book").unwrap();
        let DefKind::Document { fields } = &book.kind else {
            panic!("expected document");
        };
        let DefKind::String { list } = &fields[2].def.kind else {
            panic!("expected string");
        };
        assert_eq!(
            list,
            &[
                ListOption {
                    title: None,
                    value: ListValue::String("fiction".into()),
                },
                ListOption {
                    title: Some("Non fiction".into()),
                    value: ListValue::String("nonfiction".into()),
                },
            ]
        );
    }

    #[test]
    fn test_reference_targets_are_aliases() {
        let schema = normalize(BOOKS).unwrap();
        let book = schema.workspaces[0].lookup("book").unwrap();
        let DefKind::Document { fields } = &book.kind else {
            panic!("expected document");
        };
        let DefKind::Reference { to, weak } = &fields[1].def.kind else {
            panic!("expected reference");
        };
        assert!(!weak);
        assert!(to[0].is_alias());
        assert_eq!(to[0].type_name, "author");
    }

    #[test]
    fn test_unresolved_alias_is_placeholder() {
        let schema = normalize(r#"[{"name": "post", "type": "document", "fields": [{"name": "x", "type": "missing"}]}]"#)
            .unwrap();
        let DefKind::Document { fields } = &schema.workspaces[0].document_types[0].kind else {
            panic!("expected document");
        };
        assert!(fields[0].def.is_alias());
    }

    #[test]
    fn test_invalid_name() {
        let error = normalize(r#"[{"name": "my-type", "type": "object", "fields": []}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::InvalidName { ref name, .. } if name == "my-type"));

        let error = normalize(r#"[{"name": "ok", "type": "object", "fields": [{"name": "1st", "type": "string"}]}]"#)
            .unwrap_err();
        assert_eq!(error.path(), Some("ok.1st"));

        assert!(normalize(r#"[{"name": "_private", "type": "object", "fields": []}]"#).is_ok());
    }

    #[test]
    fn test_nested_document() {
        let error = normalize(
            r#"[{"name": "post", "type": "object", "fields": [{"name": "inner", "type": "document"}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::NestedDocument { ref path } if path == "post.inner"));
    }

    #[test]
    fn test_span_placement() {
        let ok = normalize(
            r#"[{"name": "body", "type": "array", "of": [{"type": "block", "of": [{"type": "span"}, {"type": "object", "name": "cta", "fields": []}]}]}]"#,
        )
        .unwrap();
        let DefKind::Array { of, .. } = &ok.workspaces[0].top_level_types[0].kind else {
            panic!("expected array");
        };
        let DefKind::Block { of: members, .. } = &of[0].kind else {
            panic!("expected block");
        };
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name.as_deref(), Some("cta"));

        let error = normalize(r#"[{"name": "body", "type": "array", "of": [{"type": "span"}]}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::SpanOutsideBlock { .. }));
    }

    #[test]
    fn test_required_without_validation() {
        let error = normalize(
            r#"[{"name": "book", "type": "document", "fields": [{"name": "title", "type": "string", "codegen": {"required": true}}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::RequiredWithoutValidation { ref path } if path == "book.title"));
    }

    #[test]
    fn test_missing_name_and_type() {
        let error = normalize(r#"[{"type": "object"}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::MissingName { .. }));

        let error = normalize(r#"[{"name": "thing"}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::MissingType { ref path } if path == "thing"));
    }

    #[test]
    fn test_duplicates() {
        let error = normalize(r#"[{"name": "a", "type": "object"}, {"name": "a", "type": "document"}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::DuplicateName { .. }));

        let error = normalize(
            r#"{"workspaces": [{"name": "one", "types": []}, {"name": "one", "types": []}]}"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::DuplicateWorkspace { .. }));
    }

    #[test]
    fn test_empty_array() {
        let error = normalize(r#"[{"name": "tags", "type": "array", "of": []}]"#).unwrap_err();
        assert!(matches!(error, SchemaError::EmptyArray { .. }));
    }

    #[test]
    fn test_inline_reference_target() {
        let error = normalize(
            r#"[{"name": "link", "type": "object", "fields": [{"name": "to", "type": "reference", "to": [{"type": "object", "fields": []}]}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::InlineReferenceTarget { ref found, .. } if found == "object"));

        let error = normalize(
            r#"[{"name": "link", "type": "object", "fields": [{"name": "to", "type": "reference"}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::EmptyReference { .. }));
    }

    #[test]
    fn test_conditional_hidden_counts_as_true() {
        let schema = normalize(
            r#"[{"name": "post", "type": "document", "fields": [{"name": "a", "type": "string", "hidden": "conditional", "readOnly": false}]}]"#,
        )
        .unwrap();
        let DefKind::Document { fields } = &schema.workspaces[0].document_types[0].kind else {
            panic!("expected document");
        };
        assert!(fields[0].def.hidden);
        assert!(!fields[0].def.read_only);
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("book"));
        assert!(is_valid_name("_key"));
        assert!(is_valid_name("a1_b2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("sanity.imageAsset"));
    }
}
