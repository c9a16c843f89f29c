//! Conversion of canonical defs into structure nodes.
//!
//! Runs inside lazy thunks: it may clone registry lazies but must never
//! dereference them.

use tracing::debug;

use super::Registry;
use crate::schema::{Def, DefKind, Field, ListOption, ListValue};
use crate::structure::{Flags, Property, StructureNode, merge_properties};

/// Alias chains longer than this are treated as unresolved.
const MAX_ALIAS_DEPTH: usize = 32;

impl Registry {
    /// Thunk body of a registered def.
    pub(super) fn convert_registered(&self, name: &str) -> StructureNode {
        let Some(def) = self.defs.get(name) else {
            return StructureNode::Unknown;
        };
        debug!(workspace = %self.workspace, name, "Converting registered type");
        let converter = Converter { registry: self };
        match &def.kind {
            DefKind::Document { fields } => converter.document(name, fields),
            _ => converter.convert(def, Some(name)),
        }
    }
}

struct Converter<'a> {
    registry: &'a Registry,
}

impl Converter<'_> {
    /// Convert a def. `tag` is the `_type` value of object-like results.
    fn convert(&self, def: &Def, tag: Option<&str>) -> StructureNode {
        match &def.kind {
            DefKind::Alias => self.alias(&def.type_name),
            DefKind::Array { of, list } => {
                StructureNode::array(self.members(of, list), Flags::REQUIRED)
            }
            DefKind::Object { fields } => {
                let mut properties = Vec::with_capacity(fields.len() + 1);
                if let Some(tag) = tag {
                    properties.push(type_property(tag));
                }
                properties.extend(self.fields(fields));
                StructureNode::object(properties, Flags::REQUIRED)
            }
            // documents only appear at the top level
            DefKind::Document { fields } => self.document(tag.unwrap_or(&def.type_name), fields),
            DefKind::Image { fields } => self.image(tag.unwrap_or("image"), fields),
            DefKind::File { fields } => {
                let mut properties = vec![asset_property(&self.registry.file_asset)];
                properties.extend(self.fields(fields));
                properties.push(type_property(tag.unwrap_or("file")));
                StructureNode::object(properties, Flags::REQUIRED)
            }
            DefKind::Geopoint => StructureNode::object(
                vec![
                    type_property(tag.unwrap_or("geopoint")),
                    Property::new("lat", number()),
                    Property::new("lng", number()),
                    Property::new("alt", StructureNode::number(None, Flags::optional())),
                ],
                Flags::REQUIRED,
            ),
            DefKind::Slug => StructureNode::object(
                vec![
                    type_property(tag.unwrap_or("slug")),
                    Property::new("current", string()),
                ],
                Flags::REQUIRED,
            ),
            DefKind::Reference { to, weak } => {
                let targets = StructureNode::or(to.iter().map(|target| self.alias(&target.type_name)));
                let flags = if *weak {
                    Flags::nullable()
                } else {
                    Flags::REQUIRED
                };
                StructureNode::reference(targets, flags)
            }
            DefKind::Block {
                of,
                annotations,
                styles,
                lists,
            } => self.block(tag.unwrap_or("block"), of, annotations, styles, lists),
            DefKind::String { list } | DefKind::Number { list } if !list.is_empty() => literals(list),
            DefKind::Number { .. } => number(),
            DefKind::Boolean => StructureNode::boolean(None, Flags::REQUIRED),
            DefKind::String { .. } | DefKind::Date | DefKind::Datetime | DefKind::Text | DefKind::Url => {
                string()
            }
        }
    }

    fn alias(&self, type_name: &str) -> StructureNode {
        match self.registry.nodes.get(type_name) {
            Some(node) => node.clone(),
            None => {
                debug!(workspace = %self.registry.workspace, type_name, "Unresolved alias");
                StructureNode::Unknown
            }
        }
    }

    /// Kind of a registered type, following alias chains.
    fn registered_kind(&self, type_name: &str) -> Option<&DefKind> {
        let mut current = type_name;
        for _ in 0..MAX_ALIAS_DEPTH {
            let def = self.registry.defs.get(current)?;
            match &def.kind {
                DefKind::Alias => current = &def.type_name,
                kind => return Some(kind),
            }
        }
        None
    }

    fn fields(&self, fields: &[Field]) -> Vec<Property> {
        fields
            .iter()
            .map(|field| {
                let value = self.convert(&field.def, None);
                let value = if field.is_required() {
                    value
                } else {
                    value.with_added_flags(Flags::optional())
                };
                Property::new(&field.name, value)
            })
            .collect()
    }

    fn document(&self, name: &str, fields: &[Field]) -> StructureNode {
        let mut properties = system_properties(name);
        properties.extend(self.fields(fields));
        StructureNode::object(properties, Flags::REQUIRED)
    }

    fn image(&self, tag: &str, fields: &[Field]) -> StructureNode {
        let hotspot = StructureNode::object(
            vec![
                type_property("sanity.imageHotspot"),
                Property::new("x", number()),
                Property::new("y", number()),
                Property::new("height", number()),
                Property::new("width", number()),
            ],
            Flags::optional(),
        );
        let crop = StructureNode::object(
            vec![
                type_property("sanity.imageCrop"),
                Property::new("top", number()),
                Property::new("bottom", number()),
                Property::new("left", number()),
                Property::new("right", number()),
            ],
            Flags::optional(),
        );

        let mut properties = vec![
            asset_property(&self.registry.image_asset),
            Property::new("hotspot", hotspot),
            Property::new("crop", crop),
        ];
        properties.extend(self.fields(fields));
        properties.push(type_property(tag));
        StructureNode::object(properties, Flags::REQUIRED)
    }

    /// Union of the member types of an array (or block). Object-like members
    /// are keyed; scalar members take the array's list when they have none.
    fn members(&self, of: &[Def], list: &[ListOption]) -> StructureNode {
        StructureNode::or(of.iter().map(|member| self.member(member, list)))
    }

    fn member(&self, member: &Def, list: &[ListOption]) -> StructureNode {
        let tag = member.name.as_deref().unwrap_or(&member.type_name);
        match &member.kind {
            DefKind::Alias => {
                let node = self.alias(&member.type_name);
                let keyed = self
                    .registered_kind(&member.type_name)
                    .is_some_and(DefKind::is_object_like);
                if keyed { with_key(node) } else { node }
            }
            DefKind::Reference { .. } => with_key(self.convert(member, None)),
            DefKind::String { list: own } | DefKind::Number { list: own } if own.is_empty() && !list.is_empty() => {
                literals(list)
            }
            kind if kind.is_object_like() => {
                let node = self.convert(member, Some(tag));
                add_properties(node, [type_property(tag), key_property()])
            }
            _ => self.convert(member, None),
        }
    }

    fn block(
        &self,
        tag: &str,
        of: &[Def],
        annotations: &[Def],
        styles: &[ListOption],
        lists: &[ListOption],
    ) -> StructureNode {
        let span = StructureNode::object(
            vec![
                Property::new(
                    "marks",
                    StructureNode::array(string(), Flags::optional()),
                ),
                Property::new("text", StructureNode::string(None, Flags::optional())),
                type_property("span"),
                key_property(),
            ],
            Flags::REQUIRED,
        );
        let children = StructureNode::or(
            std::iter::once(span).chain(of.iter().map(|member| self.member(member, &[]))),
        );
        let mark_defs = self.members(annotations, &[]);

        let options_or_string = |options: &[ListOption]| {
            if options.is_empty() {
                StructureNode::string(None, Flags::optional())
            } else {
                literals(options).with_added_flags(Flags::optional())
            }
        };

        StructureNode::object(
            vec![
                Property::new("children", StructureNode::array(children, Flags::optional())),
                Property::new("style", options_or_string(styles)),
                Property::new("listItem", options_or_string(lists)),
                Property::new("markDefs", StructureNode::array(mark_defs, Flags::optional())),
                Property::new("level", StructureNode::number(None, Flags::optional())),
                type_property(tag),
            ],
            Flags::REQUIRED,
        )
    }
}

/// Shape of the built-in asset documents.
pub(super) fn asset_document(type_name: &str) -> StructureNode {
    let mut properties = system_properties(type_name);
    properties.extend([
        Property::new("originalFilename", StructureNode::string(None, Flags::optional())),
        Property::new("mimeType", StructureNode::string(None, Flags::optional())),
        Property::new("size", StructureNode::number(None, Flags::optional())),
        Property::new("url", StructureNode::string(None, Flags::optional())),
    ]);
    StructureNode::object(properties, Flags::REQUIRED)
}

fn system_properties(type_name: &str) -> Vec<Property> {
    vec![
        Property::new("_id", string()),
        type_property(type_name),
        Property::new("_createdAt", string()),
        Property::new("_updatedAt", string()),
        Property::new("_rev", string()),
    ]
}

fn asset_property(asset: &StructureNode) -> Property {
    Property::new(
        "asset",
        StructureNode::reference(asset.clone(), Flags::optional()),
    )
}

fn type_property(tag: &str) -> Property {
    Property::new("_type", StructureNode::string(Some(tag.to_string()), Flags::REQUIRED))
}

fn key_property() -> Property {
    Property::new("_key", string())
}

/// `node & { _key: string }`, keeping the pointee intact for dereferencing.
fn with_key(node: StructureNode) -> StructureNode {
    if node.is_unknown() {
        return node;
    }
    StructureNode::and([
        node,
        StructureNode::object(vec![key_property()], Flags::REQUIRED),
    ])
}

/// Merge properties into an object node; other nodes get an intersection.
fn add_properties(node: StructureNode, extra: impl IntoIterator<Item = Property>) -> StructureNode {
    match node {
        StructureNode::Object(object) => StructureNode::object(
            merge_properties(object.properties().to_vec(), extra),
            object.flags(),
        ),
        other => StructureNode::and([
            other,
            StructureNode::object(extra.into_iter().collect(), Flags::REQUIRED),
        ]),
    }
}

fn literals(list: &[ListOption]) -> StructureNode {
    StructureNode::or(list.iter().map(|option| match &option.value {
        ListValue::String(value) => StructureNode::string(Some(value.clone()), Flags::REQUIRED),
        ListValue::Number(value) => StructureNode::number(Some(*value), Flags::REQUIRED),
    }))
}

fn string() -> StructureNode {
    StructureNode::string(None, Flags::REQUIRED)
}

fn number() -> StructureNode {
    StructureNode::number(None, Flags::REQUIRED)
}
