//! Static `_type` tests used to narrow unions in filters and conditionals.

use super::access::type_literal;
use crate::groq::ast::{ArrayElement, BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::structure::StructureNode;

/// Decide `condition` for a value of shape `branch`.
///
/// `Some(true)`/`Some(false)` when the condition is a `_type` test (`==`,
/// `!=`, `in`, combined with `&&`, `||`, `!`) that the branch's literal
/// `_type` decides; `None` when it cannot be decided statically.
pub fn type_test(condition: &Expr, branch: &StructureNode) -> Option<bool> {
    match &condition.kind {
        ExprKind::Group(inner) => type_test(inner, branch),
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => type_test(operand, branch).map(|matched| !matched),
        ExprKind::Binary { op, left, right } => match op {
            BinaryOp::And => match (type_test(left, branch), type_test(right, branch)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            BinaryOp::Or => match (type_test(left, branch), type_test(right, branch)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            BinaryOp::Eq | BinaryOp::NotEq => {
                let expected = type_comparison(left, right).or_else(|| type_comparison(right, left))?;
                let actual = type_literal(branch)?;
                let equal = actual == expected;
                Some(if *op == BinaryOp::Eq { equal } else { !equal })
            }
            BinaryOp::In => {
                if !is_type_attribute(left) {
                    return None;
                }
                let candidates = string_list(right)?;
                let actual = type_literal(branch)?;
                Some(candidates.iter().any(|candidate| *candidate == actual))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Keep the branches of `node` that `condition` does not rule out.
///
/// Undecidable branches are kept. A non-union node is kept or dropped as a
/// whole; dropping everything yields the empty union.
pub fn narrow(node: &StructureNode, condition: &Expr) -> StructureNode {
    match node {
        StructureNode::Or(union) => StructureNode::or(
            union
                .children()
                .iter()
                .filter(|branch| type_test(condition, branch) != Some(false))
                .cloned(),
        ),
        StructureNode::Lazy(_) => match node.resolve() {
            resolved @ StructureNode::Or(_) => narrow(&resolved, condition),
            _ if type_test(condition, node) == Some(false) => StructureNode::never(),
            _ => node.clone(),
        },
        _ if type_test(condition, node) == Some(false) => StructureNode::never(),
        _ => node.clone(),
    }
}

/// `"literal"` when `attribute` is the `_type` of `@`.
fn type_comparison(attribute: &Expr, literal: &Expr) -> Option<String> {
    if !is_type_attribute(attribute) {
        return None;
    }
    match &literal.kind {
        ExprKind::Value(Literal::String(value)) => Some(value.clone()),
        _ => None,
    }
}

fn is_type_attribute(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Attribute(name) => name == "_type",
        ExprKind::AccessAttribute { base, name } => {
            name == "_type" && matches!(base.kind, ExprKind::This)
        }
        ExprKind::Group(inner) => is_type_attribute(inner),
        _ => false,
    }
}

fn string_list(expr: &Expr) -> Option<Vec<String>> {
    let ExprKind::Array(elements) = &expr.kind else {
        return None;
    };
    elements
        .iter()
        .map(|ArrayElement { value, splat }| match &value.kind {
            ExprKind::Value(Literal::String(value)) if !splat => Some(value.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::groq::parse;
    use crate::structure::{Flags, Property};

    fn document(type_name: &str) -> StructureNode {
        StructureNode::object(
            vec![Property::new(
                "_type",
                StructureNode::string(Some(type_name.to_string()), Flags::REQUIRED),
            )],
            Flags::REQUIRED,
        )
    }

    fn condition(source: &str) -> Expr {
        parse(source).unwrap().body
    }

    #[test]
    fn test_type_test() {
        let book = document("book");
        assert_eq!(type_test(&condition("_type == 'book'"), &book), Some(true));
        assert_eq!(type_test(&condition("'author' == _type"), &book), Some(false));
        assert_eq!(type_test(&condition("_type != 'book'"), &book), Some(false));
        assert_eq!(type_test(&condition("@._type in ['a', 'book']"), &book), Some(true));
        assert_eq!(type_test(&condition("!(_type == 'book')"), &book), Some(false));
        assert_eq!(type_test(&condition("_type == 'book' && defined(title)"), &book), None);
        assert_eq!(
            type_test(&condition("_type == 'author' && defined(title)"), &book),
            Some(false)
        );
        assert_eq!(type_test(&condition("_type == 'book' || x > 1"), &book), Some(true));
        assert_eq!(type_test(&condition("title == 'book'"), &book), None);
    }

    #[test]
    fn test_narrow_union() {
        let documents = StructureNode::or([document("book"), document("author"), document("tag")]);
        let narrowed = narrow(&documents, &condition("_type in ['book', 'tag']"));
        let StructureNode::Or(union) = narrowed else {
            panic!("expected union");
        };
        assert_eq!(union.children().len(), 2);

        let none = narrow(&documents, &condition("_type == 'missing'"));
        assert!(none.is_never());

        let single = narrow(&documents, &condition("_type == 'book'"));
        assert_eq!(single.hash(), document("book").hash());
    }

    #[test]
    fn test_undecidable_keeps_everything() {
        let documents = StructureNode::or([document("book"), document("author")]);
        let same = narrow(&documents, &condition("count(tags) > 2"));
        assert_eq!(same.hash(), documents.hash());
    }
}
