//! Attribute, element and dereference access on structure nodes.

use crate::structure::{Flags, StructureNode};

/// `node.name`
///
/// Flags compose along the chain: the result is nullable if the value or
/// the object is, and optional if the value or the object is optional or
/// the object is nullable. Unions are accessed per branch; arrays map over
/// their element (GROQ traversal). Anything else is `Unknown`.
pub fn attribute(node: &StructureNode, name: &str) -> StructureNode {
    match node.resolve() {
        StructureNode::Object(object) => match object.get(name) {
            Some(value) => value.with_added_flags(nullish_as_optional(object.flags())),
            None => StructureNode::Unknown,
        },
        StructureNode::Or(union) => {
            StructureNode::or(union.children().iter().map(|branch| attribute(branch, name)))
        }
        StructureNode::And(intersection) => {
            let found = intersection
                .children()
                .iter()
                .map(StructureNode::resolve)
                .find_map(|child| match child {
                    StructureNode::Object(object) => object.get(name).cloned(),
                    _ => None,
                });
            match found {
                Some(value) => value.with_added_flags(nullish_as_optional(node.flags())),
                None => StructureNode::Unknown,
            }
        }
        StructureNode::Array(array) => StructureNode::array(
            attribute(array.of(), name).optional_to_null(),
            array.flags(),
        ),
        _ => StructureNode::Unknown,
    }
}

/// Flags an access inherits from its container: a null container makes
/// the value missing.
fn nullish_as_optional(flags: Flags) -> Flags {
    Flags::new(flags.can_be_null, flags.can_be_optional || flags.can_be_null)
}

/// `node[index]` with a constant index.
///
/// Array elements become nullable (the index may be out of range) and lose
/// their optional marker. Tuple elements are picked exactly when the index
/// is in range.
pub fn element(node: &StructureNode, index: Option<i64>) -> StructureNode {
    match node.resolve() {
        StructureNode::Array(array) => nullable_element(array.of()),
        StructureNode::Tuple(tuple) => {
            let elements = tuple.elements();
            let picked = index.and_then(|index| {
                let len = elements.len() as i64;
                let position = if index < 0 { len + index } else { index };
                usize::try_from(position).ok().and_then(|position| elements.get(position))
            });
            match picked {
                Some(element) if !tuple.flags().is_nullish() => element.clone(),
                Some(element) => element.add_null(),
                None => nullable_element(&StructureNode::or(elements.iter().cloned())),
            }
        }
        StructureNode::Or(union) => {
            StructureNode::or(union.children().iter().map(|branch| element(branch, index)))
        }
        _ => StructureNode::Unknown,
    }
}

fn nullable_element(element: &StructureNode) -> StructureNode {
    if element.is_never() || element.is_unknown() {
        return element.clone();
    }
    if element.can_be_optional() {
        element.map_flags(&|_| Flags::nullable())
    } else {
        element.add_null()
    }
}

/// `node[a..b]`: arrays keep their type, tuples widen to arrays.
pub fn slice(node: &StructureNode) -> StructureNode {
    match node.resolve() {
        array @ (StructureNode::Array(_) | StructureNode::String(_)) => array,
        StructureNode::Tuple(tuple) => StructureNode::array(
            StructureNode::or(tuple.elements().iter().cloned()),
            tuple.flags(),
        ),
        StructureNode::Or(union) => StructureNode::or(union.children().iter().map(slice)),
        _ => StructureNode::Unknown,
    }
}

/// `node[]`: flatten one level of array nesting.
pub fn flatten(node: &StructureNode) -> StructureNode {
    match node.resolve() {
        StructureNode::Array(array) => {
            let inner = array.of().map_branches(|branch| match branch {
                StructureNode::Array(nested) => nested.of().clone(),
                StructureNode::Tuple(nested) => StructureNode::or(nested.elements().iter().cloned()),
                other => other.clone(),
            });
            StructureNode::array(inner, array.flags())
        }
        StructureNode::Tuple(tuple) => StructureNode::array(
            StructureNode::or(tuple.elements().iter().cloned()),
            tuple.flags(),
        ),
        _ => StructureNode::Unknown,
    }
}

/// `node->`
///
/// A reference yields its target with the reference's own flags; a weak
/// reference is nullable, so its target is too. Arrays of references map
/// over their element. Keyed array members (`Reference & { _key }`) yield
/// the unmodified target.
pub fn deref(node: &StructureNode) -> StructureNode {
    match node.resolve() {
        StructureNode::Reference(reference) => reference.to().with_added_flags(reference.flags()),
        StructureNode::And(intersection) => {
            let outer = node.flags();
            intersection
                .children()
                .iter()
                .map(StructureNode::resolve)
                .find(|child| matches!(child, StructureNode::Reference(_)))
                .map_or(StructureNode::Unknown, |reference| {
                    deref(&reference).with_added_flags(outer)
                })
        }
        StructureNode::Or(union) => StructureNode::or(union.children().iter().map(deref)),
        StructureNode::Array(array) => {
            StructureNode::array(deref(array.of()).optional_to_null(), array.flags())
        }
        _ => StructureNode::Unknown,
    }
}

/// The literal `_type` of an object-like node, if it has one.
pub fn type_literal(node: &StructureNode) -> Option<String> {
    match attribute(node, "_type") {
        StructureNode::String(string) => string.value().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::structure::Property;

    fn string(flags: Flags) -> StructureNode {
        StructureNode::string(None, flags)
    }

    fn object(properties: Vec<(&str, StructureNode)>, flags: Flags) -> StructureNode {
        StructureNode::object(
            properties
                .into_iter()
                .map(|(key, value)| Property::new(key, value))
                .collect(),
            flags,
        )
    }

    #[test]
    fn test_attribute_composes_flags() {
        // a.b.c where b is optional and c is required
        let c = string(Flags::REQUIRED);
        let b = object(vec![("c", c)], Flags::optional());
        let a = object(vec![("b", b)], Flags::REQUIRED);

        let ab = attribute(&a, "b");
        assert_eq!(ab.flags(), Flags::optional());
        let abc = attribute(&ab, "c");
        assert_eq!(abc.flags(), Flags::optional());

        let nullable = object(vec![("c", string(Flags::REQUIRED))], Flags::nullable());
        assert_eq!(attribute(&nullable, "c").flags(), Flags::new(true, true));
    }

    #[test]
    fn test_attribute_missing_is_unknown() {
        let a = object(vec![("b", string(Flags::REQUIRED))], Flags::REQUIRED);
        assert!(attribute(&a, "missing").is_unknown());
        assert!(attribute(&StructureNode::number(None, Flags::REQUIRED), "x").is_unknown());
    }

    #[test]
    fn test_attribute_maps_over_arrays() {
        let element = object(vec![("title", string(Flags::optional()))], Flags::REQUIRED);
        let array = StructureNode::array(element, Flags::REQUIRED);
        let StructureNode::Array(titles) = attribute(&array, "title") else {
            panic!("expected array");
        };
        assert_eq!(titles.of().flags(), Flags::nullable());
    }

    #[test]
    fn test_element_of_array() {
        let array = StructureNode::array(string(Flags::optional()), Flags::REQUIRED);
        assert_eq!(element(&array, Some(0)).flags(), Flags::nullable());
    }

    #[test]
    fn test_element_of_tuple() {
        let tuple = StructureNode::tuple(
            vec![
                StructureNode::number(None, Flags::REQUIRED),
                string(Flags::REQUIRED),
            ],
            Flags::REQUIRED,
        );
        assert!(matches!(element(&tuple, Some(1)), StructureNode::String(_)));
        assert!(matches!(element(&tuple, Some(-2)), StructureNode::Number(_)));
        assert!(element(&tuple, Some(5)).can_be_null());
    }

    #[test]
    fn test_flatten() {
        let nested = StructureNode::array(
            StructureNode::array(string(Flags::REQUIRED), Flags::REQUIRED),
            Flags::REQUIRED,
        );
        let StructureNode::Array(flat) = flatten(&nested) else {
            panic!("expected array");
        };
        assert!(matches!(flat.of(), StructureNode::String(_)));
    }

    #[test]
    fn test_deref_weak_is_nullable() {
        let target = object(vec![("name", string(Flags::REQUIRED))], Flags::REQUIRED);
        let weak = StructureNode::reference(target.clone(), Flags::nullable());
        assert!(deref(&weak).can_be_null());

        let strong = StructureNode::reference(target, Flags::REQUIRED);
        assert_eq!(deref(&strong).flags(), Flags::REQUIRED);
        assert!(deref(&string(Flags::REQUIRED)).is_unknown());
    }

    #[test]
    fn test_deref_keyed_member() {
        let target = object(vec![("name", string(Flags::REQUIRED))], Flags::REQUIRED);
        let keyed = StructureNode::and([
            StructureNode::reference(target.clone(), Flags::REQUIRED),
            object(vec![("_key", string(Flags::REQUIRED))], Flags::REQUIRED),
        ]);
        assert_eq!(deref(&keyed).hash(), target.hash());
        assert!(matches!(attribute(&keyed, "_key"), StructureNode::String(_)));
    }
}
