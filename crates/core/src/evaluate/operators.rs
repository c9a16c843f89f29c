//! Result types of GROQ operators.

use crate::groq::ast::{BinaryOp, UnaryOp};
use crate::structure::{Flags, Property, StructureNode, merge_properties};

/// Operand categories that decide an operator's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Other,
}

fn category(node: &StructureNode) -> Option<Category> {
    let category = match node.resolve() {
        StructureNode::Number(_) => Category::Number,
        StructureNode::String(_) => Category::String,
        StructureNode::Boolean(_) => Category::Boolean,
        StructureNode::Array(_) | StructureNode::Tuple(_) => Category::Array,
        StructureNode::Object(_) => Category::Object,
        StructureNode::Or(union) => {
            let mut categories = union.children().iter().map(category);
            let first = categories.next()??;
            for other in categories {
                if other? != first {
                    return Some(Category::Other);
                }
            }
            first
        }
        StructureNode::Unknown => return None,
        _ => Category::Other,
    };
    Some(category)
}

/// Result of `left op right`.
pub fn binary(op: BinaryOp, left: &StructureNode, right: &StructureNode) -> StructureNode {
    let result = match op {
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::In
        | BinaryOp::Match
        | BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => return StructureNode::boolean(None, Flags::REQUIRED),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
    };
    if left.flags().is_nullish() || right.flags().is_nullish() {
        result.add_null()
    } else {
        result
    }
}

fn add(left: &StructureNode, right: &StructureNode) -> StructureNode {
    match (category(left), category(right)) {
        (Some(Category::Number), Some(Category::Number)) => arithmetic(BinaryOp::Add, left, right),
        (Some(Category::String), Some(Category::String)) => {
            match (string_literal(left), string_literal(right)) {
                (Some(a), Some(b)) => StructureNode::string(Some(a + &b), Flags::REQUIRED),
                _ => StructureNode::string(None, Flags::REQUIRED),
            }
        }
        (Some(Category::Array), Some(Category::Array)) => concat_arrays(left, right),
        (Some(Category::Object), Some(Category::Object)) => merge_objects(left, right),
        _ => StructureNode::Unknown,
    }
}

fn arithmetic(op: BinaryOp, left: &StructureNode, right: &StructureNode) -> StructureNode {
    if category(left) != Some(Category::Number) || category(right) != Some(Category::Number) {
        return StructureNode::Unknown;
    }
    let folded = match (number_literal(left), number_literal(right)) {
        (Some(a), Some(b)) => match op {
            BinaryOp::Add => Some(a + b),
            BinaryOp::Sub => Some(a - b),
            BinaryOp::Mul => Some(a * b),
            BinaryOp::Div if b != 0.0 => Some(a / b),
            BinaryOp::Mod if b != 0.0 => Some(a % b),
            BinaryOp::Pow => Some(a.powf(b)),
            _ => None,
        },
        _ => None,
    };
    StructureNode::number(folded.filter(|value| value.is_finite()), Flags::REQUIRED)
}

fn concat_arrays(left: &StructureNode, right: &StructureNode) -> StructureNode {
    match (left.resolve(), right.resolve()) {
        (StructureNode::Tuple(a), StructureNode::Tuple(b)) => StructureNode::tuple(
            a.elements().iter().chain(b.elements()).cloned().collect(),
            Flags::REQUIRED,
        ),
        (a, b) => StructureNode::array(
            StructureNode::or([elements_of(&a), elements_of(&b)]),
            Flags::REQUIRED,
        ),
    }
}

/// Union of the element types of an array-like node.
pub(crate) fn elements_of(node: &StructureNode) -> StructureNode {
    match node.resolve() {
        StructureNode::Array(array) => array.of().clone(),
        StructureNode::Tuple(tuple) => StructureNode::or(tuple.elements().iter().cloned()),
        StructureNode::Or(union) => StructureNode::or(union.children().iter().map(elements_of)),
        _ => StructureNode::Unknown,
    }
}

fn merge_objects(left: &StructureNode, right: &StructureNode) -> StructureNode {
    match (left.resolve(), right.resolve()) {
        (StructureNode::Object(a), StructureNode::Object(b)) => StructureNode::object(
            merge_properties(a.properties().to_vec(), b.properties().iter().cloned()),
            Flags::REQUIRED,
        ),
        // unions of objects: merge per pair of branches
        (a, b) => {
            let branches = |node: &StructureNode| -> Vec<StructureNode> {
                match node {
                    StructureNode::Or(union) => union.children().iter().map(StructureNode::resolve).collect(),
                    other => vec![other.clone()],
                }
            };
            let rights = branches(&b);
            StructureNode::or(branches(&a).iter().flat_map(|left| {
                rights
                    .iter()
                    .map(|right| merge_objects(left, right))
                    .collect::<Vec<_>>()
            }))
        }
    }
}

/// Result of a prefix operator.
pub fn unary(op: UnaryOp, operand: &StructureNode) -> StructureNode {
    let nullable = operand.flags().is_nullish();
    let result = match op {
        UnaryOp::Not => match operand.resolve() {
            StructureNode::Boolean(boolean) => {
                StructureNode::boolean(boolean.value().map(|value| !value), Flags::REQUIRED)
            }
            _ => StructureNode::boolean(None, Flags::REQUIRED),
        },
        UnaryOp::Neg | UnaryOp::Pos if category(operand) == Some(Category::Number) => {
            let value = number_literal(operand).map(|value| if op == UnaryOp::Neg { -value } else { value });
            StructureNode::number(value, Flags::REQUIRED)
        }
        UnaryOp::Neg | UnaryOp::Pos => return StructureNode::Unknown,
    };
    if nullable { result.add_null() } else { result }
}

fn number_literal(node: &StructureNode) -> Option<f64> {
    match node.resolve() {
        StructureNode::Number(number) => number.value(),
        _ => None,
    }
}

fn string_literal(node: &StructureNode) -> Option<String> {
    match node.resolve() {
        StructureNode::String(string) => string.value().map(str::to_string),
        _ => None,
    }
}

/// Property of a numeric `_score`, added by `score()`.
pub(crate) fn score_property() -> Property {
    Property::new("_score", StructureNode::number(None, Flags::REQUIRED))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn number(value: Option<f64>, flags: Flags) -> StructureNode {
        StructureNode::number(value, flags)
    }

    fn string(value: Option<&str>) -> StructureNode {
        StructureNode::string(value.map(str::to_string), Flags::REQUIRED)
    }

    #[test]
    fn test_arithmetic() {
        let sum = binary(BinaryOp::Add, &number(Some(1.0), Flags::REQUIRED), &number(Some(2.0), Flags::REQUIRED));
        assert_eq!(sum.hash(), number(Some(3.0), Flags::REQUIRED).hash());

        let generic = binary(BinaryOp::Mul, &number(None, Flags::REQUIRED), &number(Some(2.0), Flags::REQUIRED));
        assert_eq!(generic.hash(), number(None, Flags::REQUIRED).hash());

        let nullable = binary(BinaryOp::Sub, &number(None, Flags::nullable()), &number(None, Flags::REQUIRED));
        assert!(nullable.can_be_null());

        assert!(binary(BinaryOp::Sub, &string(None), &number(None, Flags::REQUIRED)).is_unknown());
    }

    #[test]
    fn test_string_concat() {
        let joined = binary(BinaryOp::Add, &string(Some("a")), &string(Some("b")));
        assert_eq!(joined.hash(), string(Some("ab")).hash());
        let generic = binary(BinaryOp::Add, &string(None), &string(Some("b")));
        assert_eq!(generic.hash(), string(None).hash());
    }

    #[test]
    fn test_array_concat() {
        let strings = StructureNode::array(string(None), Flags::REQUIRED);
        let numbers = StructureNode::array(number(None, Flags::REQUIRED), Flags::REQUIRED);
        let StructureNode::Array(both) = binary(BinaryOp::Add, &strings, &numbers) else {
            panic!("expected array");
        };
        assert!(matches!(both.of(), StructureNode::Or(_)));
    }

    #[test]
    fn test_object_merge() {
        let a = StructureNode::object(
            vec![Property::new("x", string(None)), Property::new("y", string(None))],
            Flags::REQUIRED,
        );
        let b = StructureNode::object(
            vec![Property::new("x", number(None, Flags::REQUIRED))],
            Flags::REQUIRED,
        );
        let StructureNode::Object(merged) = binary(BinaryOp::Add, &a, &b) else {
            panic!("expected object");
        };
        assert!(matches!(merged.get("x"), Some(StructureNode::Number(_))));
        assert_eq!(merged.properties().len(), 2);
    }

    #[test]
    fn test_comparisons_and_connectives_are_plain_booleans() {
        let result = binary(BinaryOp::Eq, &StructureNode::Unknown, &string(None));
        assert!(matches!(result, StructureNode::Boolean(_)));

        let generic_node = StructureNode::boolean(None, Flags::REQUIRED);
        let generic = generic_node.hash();
        let maybe = number(None, Flags::nullable());
        let present = number(None, Flags::REQUIRED);
        for op in [BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge, BinaryOp::And, BinaryOp::Or] {
            let result = binary(op, &maybe, &present);
            assert!(!result.can_be_null(), "{op:?}");
            assert_eq!(result.hash(), generic);
        }
    }

    #[test]
    fn test_unary() {
        let negated = unary(UnaryOp::Neg, &number(Some(2.0), Flags::REQUIRED));
        assert_eq!(negated.hash(), number(Some(-2.0), Flags::REQUIRED).hash());
        assert!(unary(UnaryOp::Neg, &string(None)).is_unknown());
        assert!(matches!(unary(UnaryOp::Not, &StructureNode::Unknown), StructureNode::Boolean(_)));
    }
}
