//! Flag manipulation and traversal helpers for structure nodes.

use super::{Flags, Property, StructureNode};

/// Lazy chains longer than this resolve to `Unknown`.
const MAX_LAZY_DEPTH: usize = 64;

impl StructureNode {
    /// Follow lazy nodes until a non-lazy node is reached.
    pub fn resolve(&self) -> StructureNode {
        let mut current = self.clone();
        for _ in 0..MAX_LAZY_DEPTH {
            match current {
                StructureNode::Lazy(lazy) => current = lazy.get(),
                other => return other,
            }
        }
        tracing::debug!(hash = %self.hash(), "lazy chain too deep, resolving to unknown");
        StructureNode::Unknown
    }

    /// Top-level flags of the node.
    ///
    /// A union is nullable (optional) if any member is; an intersection only
    /// if every member is. `Unknown` carries no flags.
    pub fn flags(&self) -> Flags {
        match self {
            StructureNode::Lazy(_) => self.resolve().flags(),
            StructureNode::Or(node) => node
                .children()
                .iter()
                .fold(Flags::REQUIRED, |acc, child| acc.union(child.flags())),
            StructureNode::And(node) => {
                let mut children = node.children().iter();
                let first = children.next().map_or(Flags::REQUIRED, StructureNode::flags);
                children.fold(first, |acc, child| {
                    let flags = child.flags();
                    Flags::new(
                        acc.can_be_null && flags.can_be_null,
                        acc.can_be_optional && flags.can_be_optional,
                    )
                })
            }
            StructureNode::Array(node) => node.flags(),
            StructureNode::Tuple(node) => node.flags(),
            StructureNode::Object(node) => node.flags(),
            StructureNode::String(node) => node.flags(),
            StructureNode::Number(node) => node.flags(),
            StructureNode::Boolean(node) => node.flags(),
            StructureNode::Reference(node) => node.flags(),
            StructureNode::Unknown => Flags::REQUIRED,
        }
    }

    pub fn can_be_null(&self) -> bool {
        self.flags().can_be_null
    }

    pub fn can_be_optional(&self) -> bool {
        self.flags().can_be_optional
    }

    /// Rebuild the node with its top-level flags mapped through `update`.
    ///
    /// Lazy nodes are resolved first. Combinators apply the update to every
    /// member. `Unknown` is returned unchanged.
    pub fn map_flags(&self, update: &impl Fn(Flags) -> Flags) -> StructureNode {
        match self {
            StructureNode::Lazy(_) => self.resolve().map_flags(update),
            StructureNode::Or(node) => {
                StructureNode::or(node.children().iter().map(|child| child.map_flags(update)))
            }
            StructureNode::And(node) => {
                StructureNode::and(node.children().iter().map(|child| child.map_flags(update)))
            }
            StructureNode::Array(node) => StructureNode::array(node.of().clone(), update(node.flags())),
            StructureNode::Tuple(node) => {
                StructureNode::tuple(node.elements().to_vec(), update(node.flags()))
            }
            StructureNode::Object(node) => {
                StructureNode::object(node.properties().to_vec(), update(node.flags()))
            }
            StructureNode::String(node) => {
                StructureNode::string(node.value().map(str::to_string), update(node.flags()))
            }
            StructureNode::Number(node) => StructureNode::number(node.value(), update(node.flags())),
            StructureNode::Boolean(node) => {
                StructureNode::boolean(node.value(), update(node.flags()))
            }
            StructureNode::Reference(node) => {
                StructureNode::reference(node.to().clone(), update(node.flags()))
            }
            StructureNode::Unknown => StructureNode::Unknown,
        }
    }

    /// Same node with exactly `flags` at the top level.
    pub fn with_flags(&self, flags: Flags) -> StructureNode {
        self.map_flags(&|_| flags)
    }

    /// OR `extra` into the top-level flags.
    ///
    /// Lazy nodes are not resolved: the flags go into their overlay.
    pub fn with_added_flags(&self, extra: Flags) -> StructureNode {
        match self {
            _ if extra == Flags::REQUIRED => self.clone(),
            StructureNode::Lazy(lazy) => StructureNode::Lazy(lazy.with_overlay(extra)),
            StructureNode::Or(node) => StructureNode::or(
                node.children()
                    .iter()
                    .map(|child| child.with_added_flags(extra)),
            ),
            StructureNode::And(node) => StructureNode::and(
                node.children()
                    .iter()
                    .map(|child| child.with_added_flags(extra)),
            ),
            _ => self.map_flags(&|flags| flags.union(extra)),
        }
    }

    pub fn add_null(&self) -> StructureNode {
        self.with_added_flags(Flags::nullable())
    }

    /// Clear both markers.
    pub fn required(&self) -> StructureNode {
        self.map_flags(&|_| Flags::REQUIRED)
    }

    /// Turn "may be absent" into "may be null".
    ///
    /// Used where a key is always present in the output, such as projected
    /// attributes: GROQ returns `null` for missing values.
    pub fn optional_to_null(&self) -> StructureNode {
        if !self.flags().can_be_optional {
            return self.clone();
        }
        self.map_flags(&|flags| {
            Flags::new(flags.can_be_null || flags.can_be_optional, false)
        })
    }

    /// Apply `f` to every union member (or to the node itself), resolving
    /// lazies first, and union the results.
    pub fn map_branches(&self, mut f: impl FnMut(&StructureNode) -> StructureNode) -> StructureNode {
        match self.resolve() {
            StructureNode::Or(node) => StructureNode::or(node.children().iter().map(|child| f(&child.resolve()))),
            other => f(&other),
        }
    }
}

/// Merge `extra` into `base`: new keys are appended, existing keys keep
/// their position and take the later value.
pub fn merge_properties(mut base: Vec<Property>, extra: impl IntoIterator<Item = Property>) -> Vec<Property> {
    for property in extra {
        if let Some(existing) = base.iter_mut().find(|existing| existing.key == property.key) {
            existing.value = property.value;
        } else {
            base.push(property);
        }
    }
    base
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn string(flags: Flags) -> StructureNode {
        StructureNode::string(None, flags)
    }

    #[test]
    fn test_resolve_follows_chain() {
        let inner = StructureNode::lazy("test:type:inner", || StructureNode::number(None, Flags::REQUIRED));
        let outer = StructureNode::lazy("test:type:outer", move || inner);
        assert!(matches!(outer.resolve(), StructureNode::Number(_)));
    }

    #[test]
    fn test_add_null_keeps_optional() {
        let node = string(Flags::optional()).add_null();
        assert_eq!(node.flags(), Flags::new(true, true));
    }

    #[test]
    fn test_add_null_does_not_force_lazy() {
        let lazy = StructureNode::lazy("test:type:author", || StructureNode::string(None, Flags::REQUIRED));
        let nullable = lazy.add_null();
        let StructureNode::Lazy(inner) = &nullable else {
            panic!("expected lazy, got {nullable:?}");
        };
        assert!(!inner.is_evaluated());
        assert!(nullable.can_be_null());
    }

    #[test]
    fn test_union_flags() {
        let node = StructureNode::or([
            StructureNode::string(Some("a".into()), Flags::REQUIRED),
            StructureNode::number(None, Flags::nullable()),
        ]);
        assert!(node.can_be_null());
        assert!(!node.can_be_optional());

        let required = node.required();
        assert!(!required.can_be_null());
    }

    #[test]
    fn test_optional_to_null() {
        let node = string(Flags::optional()).optional_to_null();
        assert_eq!(node.flags(), Flags::nullable());

        let untouched = string(Flags::REQUIRED);
        assert_eq!(untouched.optional_to_null(), untouched);
    }

    #[test]
    fn test_unknown_has_no_flags() {
        assert_eq!(StructureNode::Unknown.add_null().flags(), Flags::REQUIRED);
    }

    #[test]
    fn test_merge_properties_keeps_first_position() {
        let merged = merge_properties(
            vec![
                Property::new("a", string(Flags::REQUIRED)),
                Property::new("b", string(Flags::REQUIRED)),
            ],
            vec![
                Property::new("a", StructureNode::number(None, Flags::REQUIRED)),
                Property::new("c", string(Flags::REQUIRED)),
            ],
        );
        let keys: Vec<&str> = merged.iter().map(|property| property.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(matches!(merged[0].value, StructureNode::Number(_)));
    }

    #[test]
    fn test_map_branches_over_union() {
        let node = StructureNode::or([
            StructureNode::string(Some("a".into()), Flags::REQUIRED),
            StructureNode::number(None, Flags::REQUIRED),
        ]);
        let mapped = node.map_branches(|branch| match branch {
            StructureNode::Number(_) => StructureNode::boolean(None, Flags::REQUIRED),
            other => other.clone(),
        });
        let StructureNode::Or(union) = mapped else {
            panic!("expected union");
        };
        assert!(matches!(union.children()[1], StructureNode::Boolean(_)));
    }
}
