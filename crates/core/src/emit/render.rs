//! Structure nodes to TypeScript types, with naming and shape hoisting.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use super::types::{TsLiteral, TsPrimitive, TsProp, TsType, TsTypeDef};
use super::utils::type_name;
use crate::structure::{Flags, LazyNode, StructureNode};

/// Length of the hash prefix in hoisted shape names.
const SHAPE_PREFIX_LEN: usize = 8;

/// Where a rendered value sits. Optional values are nullable everywhere
/// except directly under an object key, where they render as `key?:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Property,
    Value,
}

/// Flag-insensitive identity of a shape: two nodes differing only in their
/// top-level null/optional markers share a key.
pub(crate) fn shape_key(node: &StructureNode) -> String {
    match node {
        StructureNode::Lazy(lazy) => lazy.base_hash().to_string(),
        StructureNode::Or(union) => set_key("or", union.children()),
        StructureNode::And(intersection) => set_key("and", intersection.children()),
        StructureNode::Unknown => node.hash().to_string(),
        _ if node.flags() == Flags::REQUIRED => node.hash().to_string(),
        _ => node.required().hash().to_string(),
    }
}

fn set_key(kind: &str, children: &[StructureNode]) -> String {
    let mut keys: Vec<String> = children.iter().map(shape_key).collect();
    keys.sort();
    keys.dedup();
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for key in &keys {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Scalars and references always render structurally, even when an entry
/// has the same shape.
fn is_nameable(node: &StructureNode) -> bool {
    !matches!(
        node,
        StructureNode::String(_)
            | StructureNode::Number(_)
            | StructureNode::Boolean(_)
            | StructureNode::Reference(_)
            | StructureNode::Unknown
    )
}

/// Shapes worth a named alias when they repeat.
fn is_hoistable(node: &StructureNode) -> bool {
    match node {
        StructureNode::Object(object) => object.properties().len() >= 2,
        StructureNode::Or(union) => union.children().len() >= 2,
        StructureNode::Array(array) => !matches!(
            array.of(),
            StructureNode::String(_)
                | StructureNode::Number(_)
                | StructureNode::Boolean(_)
                | StructureNode::Unknown
        ),
        _ => false,
    }
}

/// Renders one forest of entries.
#[derive(Debug, Default)]
pub(crate) struct Renderer {
    /// Shape key to entry name.
    named: HashMap<String, String>,
    /// Occurrences of hoistable shapes across the forest.
    counts: HashMap<String, usize>,
    /// Shape key to (alias name, body), in first-encountered order.
    hoisted: IndexMap<String, (String, StructureNode)>,
    /// Every name handed out so far.
    used_names: HashSet<String>,
}

impl Renderer {
    /// Register an entry name for `node`. Lazy entries also claim their
    /// resolved shape.
    pub(crate) fn name_entry(&mut self, node: &StructureNode, name: &str) {
        self.used_names.insert(name.to_string());
        if !is_nameable(node) {
            return;
        }
        self.named
            .entry(shape_key(node))
            .or_insert_with(|| name.to_string());
        if let StructureNode::Lazy(lazy) = node {
            let resolved = lazy.get();
            if is_nameable(&resolved) {
                self.named
                    .entry(shape_key(&resolved))
                    .or_insert_with(|| name.to_string());
            }
        }
    }

    /// Count hoistable shape occurrences under every entry.
    pub(crate) fn count_shapes<'n>(&mut self, entries: impl IntoIterator<Item = &'n StructureNode>) {
        let mut visited = HashSet::new();
        for node in entries {
            self.count_body(node, &mut visited);
        }
    }

    fn count_body(&mut self, node: &StructureNode, visited: &mut HashSet<String>) {
        match node {
            StructureNode::Lazy(lazy) => {
                if visited.insert(lazy.base_hash().to_string()) {
                    self.count_body(&lazy.get(), visited);
                }
            }
            _ => self.count_children(node, visited),
        }
    }

    fn count(&mut self, node: &StructureNode, visited: &mut HashSet<String>) {
        if let StructureNode::Lazy(_) = node {
            return self.count_body(node, visited);
        }
        let key = shape_key(node);
        if self.named.contains_key(&key) {
            return;
        }
        if is_hoistable(node) {
            let seen = self.counts.entry(key).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                return;
            }
        }
        self.count_children(node, visited);
    }

    fn count_children(&mut self, node: &StructureNode, visited: &mut HashSet<String>) {
        match node {
            StructureNode::Or(combinator) | StructureNode::And(combinator) => {
                for child in combinator.children() {
                    self.count(child, visited);
                }
            }
            StructureNode::Array(array) => self.count(array.of(), visited),
            StructureNode::Tuple(tuple) => {
                for element in tuple.elements() {
                    self.count(element, visited);
                }
            }
            StructureNode::Object(object) => {
                for property in object.properties() {
                    self.count(&property.value, visited);
                }
            }
            StructureNode::Reference(reference) => self.count(reference.to(), visited),
            _ => {}
        }
    }

    /// Type of the entry called `name`: its own structure, or a reference
    /// when another entry already names the same shape.
    pub(crate) fn render_entry(&mut self, node: &StructureNode, name: &str) -> TsType {
        let body = match self.named.get(&shape_key(node)) {
            Some(other) if other != name => TsType::Ref(other.clone()),
            _ => self.render_structure(node),
        };
        with_null(body, node.flags(), Position::Value)
    }

    /// Definitions of every hoisted shape, including shapes discovered
    /// while rendering earlier ones.
    pub(crate) fn hoisted_definitions(&mut self) -> Vec<TsTypeDef> {
        let mut definitions = Vec::new();
        let mut index = 0;
        while let Some((_, (name, body))) = self.hoisted.get_index(index) {
            let (name, body) = (name.clone(), body.clone());
            let ty = self.render_structure(&body);
            definitions.push(TsTypeDef { name, ty });
            index += 1;
        }
        definitions
    }

    fn render(&mut self, node: &StructureNode, position: Position) -> TsType {
        let ty = self.render_core(node);
        with_null(ty, node.flags(), position)
    }

    /// Named reference if the shape has a name, else the structure.
    /// Top-level null markers are left to the caller.
    fn render_core(&mut self, node: &StructureNode) -> TsType {
        if let StructureNode::Lazy(lazy) = node {
            return TsType::Ref(self.lazy_name(lazy));
        }
        if node.is_unknown() {
            return TsType::Primitive(TsPrimitive::Unknown);
        }
        let key = shape_key(node);
        if let Some(name) = self.named.get(&key) {
            return TsType::Ref(name.clone());
        }
        if is_hoistable(node) && self.counts.get(&key).copied().unwrap_or(0) >= 2 {
            let name = format!("Shape_{}", &key[..SHAPE_PREFIX_LEN.min(key.len())]);
            let name = self.reserve(&key, name, node.clone());
            return TsType::Ref(name);
        }
        self.render_structure(node)
    }

    /// Name of a lazy node: its entry, or a hoisted alias named after its id.
    fn lazy_name(&mut self, lazy: &LazyNode) -> String {
        let key = lazy.base_hash().to_string();
        if let Some(name) = self.named.get(&key) {
            return name.clone();
        }
        if let Some((name, _)) = self.hoisted.get(&key) {
            return name.clone();
        }
        let name = lazy_type_name(lazy.id());
        self.reserve(&key, name, StructureNode::Lazy(lazy.clone()))
    }

    /// Hoist `body` under `name` (made unique if taken) unless `key` is
    /// already hoisted.
    fn reserve(&mut self, key: &str, name: String, body: StructureNode) -> String {
        if let Some((existing, _)) = self.hoisted.get(key) {
            return existing.clone();
        }
        let name = self.unique_name(name, key);
        self.used_names.insert(name.clone());
        self.hoisted.insert(key.to_string(), (name.clone(), body));
        name
    }

    /// `name`, else `name_<prefix>`, else `name_<prefix>_2`, `_3` and so on.
    fn unique_name(&self, name: String, key: &str) -> String {
        if !self.used_names.contains(&name) {
            return name;
        }
        let base = format!("{name}_{}", &key[..SHAPE_PREFIX_LEN.min(key.len())]);
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.used_names.contains(&candidate) {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        candidate
    }

    fn render_structure(&mut self, node: &StructureNode) -> TsType {
        match node {
            StructureNode::Lazy(lazy) => self.render_structure(&lazy.get()),
            StructureNode::Or(union) => {
                let members = union
                    .children()
                    .iter()
                    .map(|child| self.render_core(child))
                    .collect();
                TsType::union(members)
            }
            // union null markers apply at the use site; intersection members keep their own
            StructureNode::And(intersection) => TsType::Intersection(
                intersection
                    .children()
                    .iter()
                    .map(|child| {
                        let ty = self.render_core(child);
                        if child.can_be_null() { ty.or_null() } else { ty }
                    })
                    .collect(),
            ),
            StructureNode::Array(array) => {
                TsType::Array(Box::new(self.render(array.of(), Position::Value)))
            }
            StructureNode::Tuple(tuple) => TsType::Tuple(
                tuple
                    .elements()
                    .iter()
                    .map(|element| self.render(element, Position::Value))
                    .collect(),
            ),
            StructureNode::Object(object) => TsType::Object(
                object
                    .properties()
                    .iter()
                    .map(|property| TsProp {
                        name: property.key.clone(),
                        ty: self.render(&property.value, Position::Property),
                        optional: property.value.can_be_optional(),
                    })
                    .collect(),
            ),
            StructureNode::String(string) => match string.value() {
                Some(value) => TsType::Literal(TsLiteral::String(value.to_string())),
                None => TsType::Primitive(TsPrimitive::String),
            },
            StructureNode::Number(number) => match number.value() {
                Some(value) => TsType::Literal(TsLiteral::Number(value)),
                None => TsType::Primitive(TsPrimitive::Number),
            },
            StructureNode::Boolean(boolean) => match boolean.value() {
                Some(value) => TsType::Literal(TsLiteral::Bool(value)),
                None => TsType::Primitive(TsPrimitive::Boolean),
            },
            StructureNode::Reference(reference) => TsType::Generic {
                name: "Reference".to_string(),
                args: vec![self.render_core(reference.to())],
            },
            StructureNode::Unknown => TsType::Primitive(TsPrimitive::Unknown),
        }
    }
}

fn with_null(ty: TsType, flags: Flags, position: Position) -> TsType {
    let nullable = flags.can_be_null || (flags.can_be_optional && position == Position::Value);
    if nullable { ty.or_null() } else { ty }
}

/// `default:type:sanity.imageAsset` → `SanityImageAsset`; other workspaces
/// are prefixed with their name.
fn lazy_type_name(id: &str) -> String {
    match id.split(':').collect::<Vec<_>>().as_slice() {
        [workspace, .., name] if *workspace != crate::schema::DEFAULT_WORKSPACE => {
            format!("{}{}", type_name(workspace), type_name(name))
        }
        [.., name] => type_name(name),
        [] => type_name(id),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::emit::print::Emit;
    use crate::structure::Property;

    fn string(flags: Flags) -> StructureNode {
        StructureNode::string(None, flags)
    }

    fn pair(first: &str) -> StructureNode {
        StructureNode::object(
            vec![
                Property::new(first, string(Flags::REQUIRED)),
                Property::new("other", string(Flags::optional())),
            ],
            Flags::REQUIRED,
        )
    }

    #[test]
    fn test_shape_key_ignores_top_level_flags() {
        let required = pair("a");
        let nullable = required.add_null();
        assert_ne!(required.hash(), nullable.hash());
        assert_eq!(shape_key(&required), shape_key(&nullable));

        let union = StructureNode::or([pair("a"), pair("b")]);
        let reversed = StructureNode::or([pair("b"), pair("a")]);
        assert_eq!(shape_key(&union), shape_key(&reversed));
    }

    #[test]
    fn test_optional_renders_per_position() {
        let mut renderer = Renderer::default();
        let ty = renderer.render_structure(&pair("a"));
        assert_eq!(ty.emit(), "{ a: string; other?: string }");

        let element = StructureNode::array(string(Flags::optional()), Flags::REQUIRED);
        assert_eq!(renderer.render_structure(&element).emit(), "(string | null)[]");
    }

    #[test]
    fn test_repeated_shapes_are_hoisted() {
        let holder = StructureNode::object(
            vec![
                Property::new("x", pair("a")),
                Property::new("y", pair("a").add_null()),
            ],
            Flags::REQUIRED,
        );
        let mut renderer = Renderer::default();
        renderer.name_entry(&holder, "Holder");
        renderer.count_shapes([&holder]);

        let ty = renderer.render_entry(&holder, "Holder");
        let hoisted = renderer.hoisted_definitions();
        assert_eq!(hoisted.len(), 1);
        let alias = &hoisted[0].name;
        assert!(alias.starts_with("Shape_"));
        assert_eq!(ty.emit(), format!("{{ x: {alias}; y: {alias} | null }}"));
    }

    #[test]
    fn test_single_occurrence_is_inlined() {
        let holder = StructureNode::object(vec![Property::new("x", pair("a"))], Flags::REQUIRED);
        let mut renderer = Renderer::default();
        renderer.name_entry(&holder, "Holder");
        renderer.count_shapes([&holder]);
        let ty = renderer.render_entry(&holder, "Holder");
        assert!(renderer.hoisted_definitions().is_empty());
        assert_eq!(ty.emit(), "{ x: { a: string; other?: string } }");
    }

    #[test]
    fn test_unnamed_lazy_is_hoisted_by_id() {
        let lazy = StructureNode::lazy("default:type:sanity.imageAsset", || pair("url"));
        let holder = StructureNode::object(
            vec![Property::new("asset", lazy.with_added_flags(Flags::optional()))],
            Flags::REQUIRED,
        );
        let mut renderer = Renderer::default();
        renderer.name_entry(&holder, "Holder");
        renderer.count_shapes([&holder]);
        let ty = renderer.render_entry(&holder, "Holder");
        assert_eq!(ty.emit(), "{ asset?: SanityImageAsset }");
        let hoisted = renderer.hoisted_definitions();
        assert_eq!(hoisted[0].name, "SanityImageAsset");
        assert_eq!(hoisted[0].ty.emit(), "{ url: string; other?: string }");
    }

    #[test]
    fn test_scalar_entries_are_not_references() {
        let mut renderer = Renderer::default();
        renderer.name_entry(&string(Flags::REQUIRED), "Count");
        let holder = StructureNode::object(vec![Property::new("s", string(Flags::REQUIRED))], Flags::REQUIRED);
        assert_eq!(renderer.render_structure(&holder).emit(), "{ s: string }");
    }

    #[test]
    fn test_nullable_members_keep_null() {
        let target = StructureNode::lazy("default:document:author", || pair("name"));
        let weak = StructureNode::reference(target, Flags::nullable());
        let keyed = StructureNode::and([
            weak.clone(),
            StructureNode::object(vec![Property::new("_key", string(Flags::REQUIRED))], Flags::REQUIRED),
        ]);
        let members = StructureNode::array(keyed, Flags::REQUIRED);

        let mut renderer = Renderer::default();
        renderer.name_entry(&members, "Authors");
        renderer.count_shapes([&members]);
        assert_eq!(
            renderer.render_entry(&members, "Authors").emit(),
            "((Reference<Author> | null) & { _key: string })[]"
        );

        let either = StructureNode::or([weak, string(Flags::REQUIRED)]);
        assert_eq!(
            renderer.render(&either, Position::Value).emit(),
            "Reference<Author> | string | null"
        );
    }

    #[test]
    fn test_hoisted_names_stay_unique() {
        let mut renderer = Renderer::default();
        let key = "0123456789abcdef";
        renderer.used_names.insert("Author".to_string());
        renderer.used_names.insert("Author_01234567".to_string());
        renderer.used_names.insert("Author_01234567_2".to_string());

        let name = renderer.reserve(key, "Author".to_string(), pair("a"));
        assert_eq!(name, "Author_01234567_3");
        assert_eq!(renderer.reserve(key, "Author".to_string(), pair("a")), name);

        let other = renderer.reserve("01234567ffff", "Author".to_string(), pair("b"));
        assert_eq!(other, "Author_01234567_4");
    }

    #[test]
    fn test_lazy_type_name() {
        assert_eq!(lazy_type_name("default:document:book"), "Book");
        assert_eq!(lazy_type_name("blog:type:sanity.fileAsset"), "BlogSanityFileAsset");
    }
}
