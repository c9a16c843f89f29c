//! Object literals and projections.

use tracing::debug;

use super::narrow::type_test;
use super::{Env, Evaluator};
use crate::groq::ast::{Expr, ObjectAttribute};
use crate::structure::{Flags, Property, StructureNode, merge_properties};

/// Objects with more alternative property sets than this become `Unknown`.
const MAX_VARIANTS: usize = 64;

/// The property sets an object literal may produce.
type Variants = Vec<Vec<Property>>;

impl<'a> Evaluator<'a> {
    /// `base{...}`: project every element of an array, or a single object.
    ///
    /// A nullable element projects to a nullable object.
    pub(super) fn project(&mut self, base: &StructureNode, object: &'a Expr, env: &Env) -> StructureNode {
        match base.resolve() {
            StructureNode::Array(array) => {
                let element = self.project_one(array.of(), object, env);
                StructureNode::array(element, array.flags())
            }
            StructureNode::Tuple(tuple) => {
                let elements = tuple
                    .elements()
                    .iter()
                    .map(|element| self.project_one(element, object, env))
                    .collect();
                StructureNode::tuple(elements, tuple.flags())
            }
            StructureNode::Or(union) => StructureNode::or(
                union
                    .children()
                    .iter()
                    .map(|branch| self.project(branch, object, env))
                    .collect::<Vec<_>>(),
            ),
            StructureNode::Unknown => StructureNode::Unknown,
            _ => self.project_one(base, object, env),
        }
    }

    /// Project one value, per union branch so conditionals can narrow.
    fn project_one(&mut self, element: &StructureNode, object: &'a Expr, env: &Env) -> StructureNode {
        if element.is_unknown() {
            return StructureNode::Unknown;
        }
        let nullable = element.flags().is_nullish();
        let projected = element.map_branches(|branch| {
            let this = if branch.flags().is_nullish() {
                branch.required()
            } else {
                branch.clone()
            };
            self.evaluate(object, &env.push(this))
        });
        if nullable {
            projected.add_null()
        } else {
            projected
        }
    }

    /// `{ key: value, ...splat, cond => {...} }`
    ///
    /// Values that may be missing become nullable. Splats merge in order with
    /// later keys overriding; conditional and union splats fork the property
    /// set, and the result is the union of the alternatives.
    pub(super) fn evaluate_object(&mut self, attributes: &'a [ObjectAttribute], env: &Env) -> StructureNode {
        let mut variants: Variants = vec![Vec::new()];
        for attribute in attributes {
            match attribute {
                ObjectAttribute::Value { key, value } => {
                    let node = if super::is_null_literal(value) {
                        StructureNode::Unknown
                    } else {
                        self.evaluate(value, env).optional_to_null()
                    };
                    for properties in &mut variants {
                        let merged = merge_properties(
                            std::mem::take(properties),
                            [Property::new(key.clone(), node.clone())],
                        );
                        *properties = merged;
                    }
                }
                ObjectAttribute::Splat(spread) => {
                    let node = self.evaluate(spread, env);
                    let Some(options) = splat_options(&node) else {
                        return StructureNode::Unknown;
                    };
                    variants = combine(&variants, &options);
                }
                ObjectAttribute::Conditional { condition, value } => {
                    self.evaluate(condition, env);
                    let decided = type_test(condition, env.this());
                    if decided == Some(false) {
                        continue;
                    }
                    let node = self.evaluate(value, env);
                    let Some(mut options) = splat_options(&node) else {
                        return StructureNode::Unknown;
                    };
                    if decided.is_none() {
                        options.push(Vec::new());
                    }
                    variants = combine(&variants, &options);
                }
            }
            if variants.len() > MAX_VARIANTS {
                debug!(variants = variants.len(), "Too many object variants, typing as unknown");
                return StructureNode::Unknown;
            }
        }
        StructureNode::or(
            variants
                .into_iter()
                .map(|properties| StructureNode::object(properties, Flags::REQUIRED)),
        )
    }
}

/// Property sets spread by `...node`; `None` when the node is `Unknown`.
///
/// Spreading a non-object spreads nothing. The properties of a nullable
/// object become optional.
fn splat_options(node: &StructureNode) -> Option<Variants> {
    match node.resolve() {
        StructureNode::Object(object) => {
            let properties = if object.flags().is_nullish() {
                object
                    .properties()
                    .iter()
                    .map(|property| {
                        Property::new(
                            property.key.clone(),
                            property.value.with_added_flags(Flags::optional()),
                        )
                    })
                    .collect()
            } else {
                object.properties().to_vec()
            };
            Some(vec![properties])
        }
        StructureNode::Or(union) => {
            let mut options = Vec::new();
            for branch in union.children() {
                options.extend(splat_options(branch)?);
            }
            Some(options)
        }
        StructureNode::And(intersection) => {
            let mut merged = Vec::new();
            for child in intersection.children() {
                for properties in splat_options(child)? {
                    merged = merge_properties(merged, properties);
                }
            }
            Some(vec![merged])
        }
        StructureNode::Unknown => None,
        _ => Some(vec![Vec::new()]),
    }
}

/// Every current variant merged with every option.
fn combine(variants: &Variants, options: &Variants) -> Variants {
    let mut combined = Vec::with_capacity(variants.len() * options.len());
    for properties in variants {
        for option in options {
            combined.push(merge_properties(properties.clone(), option.iter().cloned()));
        }
    }
    combined
}
