//! Structure IR shared by the schema transform and the query evaluator.
//!
//! A [`StructureNode`] describes the shape of a value: the schema transform
//! produces one per document and registered type, and the query evaluator
//! computes one per query by symbolically evaluating GROQ against them.
//!
//! Nodes are immutable and shared through `Arc`. Every node except
//! `Unknown` carries a content hash computed at construction, so two
//! structurally equal nodes built independently compare equal and can be
//! deduplicated by an [`Interner`] or by the type emitter.
//!
//! ## Module Structure
//!
//! - `hash`: length-prefixed SHA-256 content hashing
//! - `lazy`: deferred, evaluate-once nodes used to break schema cycles
//! - `ops`: flag manipulation, lazy resolution and property helpers
//! - `intern`: per-invocation hash-consing table

mod hash;
mod intern;
mod lazy;
mod ops;

use std::collections::HashSet;
use std::sync::Arc;

use hash::ContentHasher;

pub use intern::Interner;
pub use lazy::LazyNode;
pub use ops::merge_properties;

/// Hash of every `Unknown` node.
pub const UNKNOWN_HASH: &str = "unknown";

/// Null and optional markers carried by value nodes.
///
/// `can_be_null` means the value itself may be `null` (a missing document,
/// an out-of-range index). `can_be_optional` means the key holding the value
/// may be absent from its object. The two are tracked independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    pub can_be_null: bool,
    pub can_be_optional: bool,
}

impl Flags {
    pub const REQUIRED: Flags = Flags {
        can_be_null: false,
        can_be_optional: false,
    };

    pub fn new(can_be_null: bool, can_be_optional: bool) -> Self {
        Self {
            can_be_null,
            can_be_optional,
        }
    }

    pub fn nullable() -> Self {
        Self::new(true, false)
    }

    pub fn optional() -> Self {
        Self::new(false, true)
    }

    /// Logical OR of both markers.
    pub fn union(self, other: Flags) -> Self {
        Self::new(
            self.can_be_null || other.can_be_null,
            self.can_be_optional || other.can_be_optional,
        )
    }

    /// Whether `self` allows everything `other` allows.
    pub fn covers(self, other: Flags) -> bool {
        (self.can_be_null || !other.can_be_null) && (self.can_be_optional || !other.can_be_optional)
    }

    /// Either marker is set.
    pub fn is_nullish(self) -> bool {
        self.can_be_null || self.can_be_optional
    }
}

/// A structure node.
#[derive(Debug, Clone)]
pub enum StructureNode {
    Lazy(LazyNode),
    And(Arc<CombinatorNode>),
    Or(Arc<CombinatorNode>),
    Array(Arc<ArrayNode>),
    Tuple(Arc<TupleNode>),
    Object(Arc<ObjectNode>),
    String(Arc<StringNode>),
    Number(Arc<NumberNode>),
    Boolean(Arc<BooleanNode>),
    Reference(Arc<ReferenceNode>),
    /// Absorbing top type: the shape could not be determined statically.
    Unknown,
}

/// Children of an `And` or `Or` node.
#[derive(Debug)]
pub struct CombinatorNode {
    children: Vec<StructureNode>,
    hash: String,
}

impl CombinatorNode {
    pub fn children(&self) -> &[StructureNode] {
        &self.children
    }
}

#[derive(Debug)]
pub struct ArrayNode {
    of: StructureNode,
    flags: Flags,
    hash: String,
}

impl ArrayNode {
    pub fn of(&self) -> &StructureNode {
        &self.of
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

#[derive(Debug)]
pub struct TupleNode {
    elements: Vec<StructureNode>,
    flags: Flags,
    hash: String,
}

impl TupleNode {
    pub fn elements(&self) -> &[StructureNode] {
        &self.elements
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

/// One `{key, value}` entry of an object node.
///
/// Whether the key may be absent is recorded on the value's
/// `can_be_optional` flag.
#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub value: StructureNode,
}

impl Property {
    pub fn new(key: impl Into<String>, value: StructureNode) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug)]
pub struct ObjectNode {
    properties: Vec<Property>,
    flags: Flags,
    hash: String,
}

impl ObjectNode {
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn get(&self, key: &str) -> Option<&StructureNode> {
        self.properties
            .iter()
            .find(|property| property.key == key)
            .map(|property| &property.value)
    }
}

#[derive(Debug)]
pub struct StringNode {
    value: Option<String>,
    flags: Flags,
    hash: String,
}

impl StringNode {
    /// The literal value, or `None` for the generic string type.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

#[derive(Debug)]
pub struct NumberNode {
    value: Option<f64>,
    flags: Flags,
    hash: String,
}

impl NumberNode {
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

#[derive(Debug)]
pub struct BooleanNode {
    value: Option<bool>,
    flags: Flags,
    hash: String,
}

impl BooleanNode {
    pub fn value(&self) -> Option<bool> {
        self.value
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

/// A reference to one of the documents in `to`.
#[derive(Debug)]
pub struct ReferenceNode {
    to: StructureNode,
    flags: Flags,
    hash: String,
}

impl ReferenceNode {
    pub fn to(&self) -> &StructureNode {
        &self.to
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }
}

// =============================================================================
// Constructors
// =============================================================================

impl StructureNode {
    pub fn unknown() -> Self {
        StructureNode::Unknown
    }

    pub fn lazy(id: impl Into<String>, thunk: impl FnOnce() -> StructureNode + Send + 'static) -> Self {
        StructureNode::Lazy(LazyNode::new(id, thunk))
    }

    pub fn string(value: Option<String>, flags: Flags) -> Self {
        let hash = ContentHasher::new("string")
            .opt_str(value.as_deref())
            .flags(flags)
            .finish();
        StructureNode::String(Arc::new(StringNode { value, flags, hash }))
    }

    pub fn number(value: Option<f64>, flags: Flags) -> Self {
        let encoded = value.map(|number| number.to_bits().to_string());
        let hash = ContentHasher::new("number")
            .opt_str(encoded.as_deref())
            .flags(flags)
            .finish();
        StructureNode::Number(Arc::new(NumberNode { value, flags, hash }))
    }

    pub fn boolean(value: Option<bool>, flags: Flags) -> Self {
        let encoded = value.map(|boolean| if boolean { "true" } else { "false" });
        let hash = ContentHasher::new("boolean")
            .opt_str(encoded)
            .flags(flags)
            .finish();
        StructureNode::Boolean(Arc::new(BooleanNode { value, flags, hash }))
    }

    pub fn array(of: StructureNode, flags: Flags) -> Self {
        let hash = ContentHasher::new("array")
            .str(of.hash())
            .flags(flags)
            .finish();
        StructureNode::Array(Arc::new(ArrayNode { of, flags, hash }))
    }

    pub fn tuple(elements: Vec<StructureNode>, flags: Flags) -> Self {
        let mut hasher = ContentHasher::new("tuple").str(&elements.len().to_string());
        for element in &elements {
            hasher = hasher.str(element.hash());
        }
        let hash = hasher.flags(flags).finish();
        StructureNode::Tuple(Arc::new(TupleNode {
            elements,
            flags,
            hash,
        }))
    }

    pub fn object(properties: Vec<Property>, flags: Flags) -> Self {
        let mut hasher = ContentHasher::new("object").str(&properties.len().to_string());
        for property in &properties {
            hasher = hasher.str(&property.key).str(property.value.hash());
        }
        let hash = hasher.flags(flags).finish();
        StructureNode::Object(Arc::new(ObjectNode {
            properties,
            flags,
            hash,
        }))
    }

    pub fn reference(to: StructureNode, flags: Flags) -> Self {
        let hash = ContentHasher::new("reference")
            .str(to.hash())
            .flags(flags)
            .finish();
        StructureNode::Reference(Arc::new(ReferenceNode { to, flags, hash }))
    }

    /// Build a union.
    ///
    /// Nested unions are flattened, duplicates (by hash) removed, literal
    /// scalars covered by a generic scalar of the same kind dropped, and a
    /// single remaining member returned as is. `Unknown` absorbs the union.
    /// No members at all yields the empty union.
    pub fn or(children: impl IntoIterator<Item = StructureNode>) -> Self {
        let mut flat = Vec::new();
        let mut seen = HashSet::new();
        for child in children {
            match child {
                StructureNode::Unknown => return StructureNode::Unknown,
                StructureNode::Or(node) => {
                    for grandchild in &node.children {
                        push_unique(&mut flat, &mut seen, grandchild.clone());
                    }
                }
                other => push_unique(&mut flat, &mut seen, other),
            }
        }

        let mut flat = drop_covered_literals(flat);
        if flat.len() == 1 {
            if let Some(single) = flat.pop() {
                return single;
            }
        }
        let hash = ContentHasher::new("or")
            .unordered(flat.iter().map(|child| child.hash()))
            .finish();
        StructureNode::Or(Arc::new(CombinatorNode {
            children: flat,
            hash,
        }))
    }

    /// Build an intersection.
    ///
    /// Nested intersections are flattened and duplicates removed. `Unknown`
    /// members are neutral; an intersection of nothing is `Unknown`.
    pub fn and(children: impl IntoIterator<Item = StructureNode>) -> Self {
        let mut flat = Vec::new();
        let mut seen = HashSet::new();
        for child in children {
            match child {
                StructureNode::Unknown => {}
                StructureNode::And(node) => {
                    for grandchild in &node.children {
                        push_unique(&mut flat, &mut seen, grandchild.clone());
                    }
                }
                other => push_unique(&mut flat, &mut seen, other),
            }
        }

        match flat.len() {
            0 => StructureNode::Unknown,
            1 => flat.pop().unwrap_or(StructureNode::Unknown),
            _ => {
                let hash = ContentHasher::new("and")
                    .unordered(flat.iter().map(|child| child.hash()))
                    .finish();
                StructureNode::And(Arc::new(CombinatorNode {
                    children: flat,
                    hash,
                }))
            }
        }
    }

    /// The empty union: no value has this type.
    pub fn never() -> Self {
        Self::or(std::iter::empty())
    }

    /// Content hash of the node.
    pub fn hash(&self) -> &str {
        match self {
            StructureNode::Lazy(node) => node.hash(),
            StructureNode::And(node) | StructureNode::Or(node) => &node.hash,
            StructureNode::Array(node) => &node.hash,
            StructureNode::Tuple(node) => &node.hash,
            StructureNode::Object(node) => &node.hash,
            StructureNode::String(node) => &node.hash,
            StructureNode::Number(node) => &node.hash,
            StructureNode::Boolean(node) => &node.hash,
            StructureNode::Reference(node) => &node.hash,
            StructureNode::Unknown => UNKNOWN_HASH,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, StructureNode::Unknown)
    }

    /// Whether this is the empty union.
    pub fn is_never(&self) -> bool {
        matches!(self, StructureNode::Or(node) if node.children.is_empty())
    }
}

impl PartialEq for StructureNode {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for StructureNode {}

fn push_unique(out: &mut Vec<StructureNode>, seen: &mut HashSet<String>, node: StructureNode) {
    if seen.insert(node.hash().to_string()) {
        out.push(node);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    String,
    Number,
    Boolean,
}

/// `(kind, is_literal, flags)` of a scalar node.
fn scalar_signature(node: &StructureNode) -> Option<(ScalarKind, bool, Flags)> {
    match node {
        StructureNode::String(node) => Some((ScalarKind::String, node.value.is_some(), node.flags)),
        StructureNode::Number(node) => Some((ScalarKind::Number, node.value.is_some(), node.flags)),
        StructureNode::Boolean(node) => {
            Some((ScalarKind::Boolean, node.value.is_some(), node.flags))
        }
        _ => None,
    }
}

fn drop_covered_literals(members: Vec<StructureNode>) -> Vec<StructureNode> {
    let generics: Vec<(ScalarKind, Flags)> = members
        .iter()
        .filter_map(scalar_signature)
        .filter(|(_, is_literal, _)| !is_literal)
        .map(|(kind, _, flags)| (kind, flags))
        .collect();
    if generics.is_empty() {
        return members;
    }
    members
        .into_iter()
        .filter(|member| match scalar_signature(member) {
            Some((kind, true, flags)) => !generics
                .iter()
                .any(|(generic_kind, generic_flags)| *generic_kind == kind && generic_flags.covers(flags)),
            _ => true,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn string() -> StructureNode {
        StructureNode::string(None, Flags::REQUIRED)
    }

    fn literal(value: &str) -> StructureNode {
        StructureNode::string(Some(value.to_string()), Flags::REQUIRED)
    }

    fn book(title_flags: Flags) -> StructureNode {
        StructureNode::object(
            vec![
                Property::new("_type", literal("book")),
                Property::new("title", StructureNode::string(None, title_flags)),
            ],
            Flags::REQUIRED,
        )
    }

    #[test]
    fn test_equal_structures_hash_equal() {
        assert_eq!(book(Flags::optional()).hash(), book(Flags::optional()).hash());
    }

    #[test]
    fn test_flags_change_hash() {
        assert_ne!(book(Flags::optional()).hash(), book(Flags::REQUIRED).hash());
        assert_ne!(
            StructureNode::string(None, Flags::nullable()).hash(),
            StructureNode::string(None, Flags::optional()).hash()
        );
    }

    #[test]
    fn test_keys_and_literals_change_hash() {
        let renamed = StructureNode::object(
            vec![
                Property::new("_type", literal("book")),
                Property::new("name", StructureNode::string(None, Flags::optional())),
            ],
            Flags::REQUIRED,
        );
        assert_ne!(renamed.hash(), book(Flags::optional()).hash());
        assert_ne!(literal("a").hash(), literal("b").hash());
        assert_ne!(literal("a").hash(), string().hash());
    }

    #[test]
    fn test_or_flattens_and_dedupes() {
        let inner = StructureNode::or([literal("a"), literal("b")]);
        let outer = StructureNode::or([inner, literal("b"), literal("c")]);
        let StructureNode::Or(node) = &outer else {
            panic!("expected union, got {outer:?}");
        };
        assert_eq!(node.children().len(), 3);
        assert!(node.children().iter().all(|child| !matches!(child, StructureNode::Or(_))));
    }

    #[test]
    fn test_or_single_member_collapses() {
        let node = StructureNode::or([literal("a"), literal("a")]);
        assert!(matches!(node, StructureNode::String(_)));
    }

    #[test]
    fn test_or_unknown_absorbs() {
        let node = StructureNode::or([literal("a"), StructureNode::Unknown]);
        assert!(node.is_unknown());
    }

    #[test]
    fn test_or_generic_covers_literals() {
        let node = StructureNode::or([literal("a"), string(), literal("b")]);
        assert_eq!(node.hash(), string().hash());

        // A required generic does not cover a nullable literal.
        let nullable_literal = StructureNode::string(Some("a".into()), Flags::nullable());
        let node = StructureNode::or([nullable_literal, string()]);
        assert!(matches!(node, StructureNode::Or(_)));
    }

    #[test]
    fn test_or_hash_ignores_order() {
        let a = StructureNode::or([literal("a"), literal("b")]);
        let b = StructureNode::or([literal("b"), literal("a")]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_and_flattens_and_drops_unknown() {
        let inner = StructureNode::and([book(Flags::REQUIRED), StructureNode::Unknown]);
        assert!(matches!(inner, StructureNode::Object(_)));

        let key = StructureNode::object(vec![Property::new("_key", string())], Flags::REQUIRED);
        let nested = StructureNode::and([
            StructureNode::and([book(Flags::REQUIRED), key.clone()]),
            key,
        ]);
        let StructureNode::And(node) = &nested else {
            panic!("expected intersection, got {nested:?}");
        };
        assert_eq!(node.children().len(), 2);
        assert!(StructureNode::and([]).is_unknown());
    }

    #[test]
    fn test_never_is_empty_union() {
        assert!(StructureNode::never().is_never());
        assert!(!string().is_never());
    }
}
