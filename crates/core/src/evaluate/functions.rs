//! Built-in, pipe and custom function calls.

use super::operators::{elements_of, score_property};
use super::{Env, Evaluator, MAX_CALL_DEPTH, is_null_literal, narrow::type_test};
use crate::error::DiagnosticKind;
use crate::groq::ast::{Expr, ExprKind, FunctionDef};
use crate::structure::{Flags, StructureNode, merge_properties};

fn string() -> StructureNode {
    StructureNode::string(None, Flags::REQUIRED)
}

fn number() -> StructureNode {
    StructureNode::number(None, Flags::REQUIRED)
}

fn boolean() -> StructureNode {
    StructureNode::boolean(None, Flags::REQUIRED)
}

/// `node` without its null and optional markers.
fn non_null(node: &StructureNode) -> StructureNode {
    if node.flags().is_nullish() {
        node.required()
    } else {
        node.clone()
    }
}

/// `result`, nullable when `input` may be null or missing.
fn propagate(input: Option<&StructureNode>, result: StructureNode) -> StructureNode {
    if input.is_some_and(|input| input.flags().is_nullish()) {
        result.add_null()
    } else {
        result
    }
}

impl<'a> Evaluator<'a> {
    /// `ns::name(args)`
    pub(super) fn call_function(
        &mut self,
        namespace: &'a str,
        name: &'a str,
        args: &'a [Expr],
        env: &Env,
    ) -> StructureNode {
        if let Some(def) = self.functions.get(&(namespace, name)).copied() {
            return self.call_custom(def, args, env);
        }
        match (namespace, name) {
            ("global", "coalesce") => return self.coalesce(args, env),
            ("global", "select") => return self.select(args, env),
            _ => {}
        }

        let values: Vec<StructureNode> = args.iter().map(|arg| self.evaluate(arg, env)).collect();
        let first = values.first();
        match (namespace, name) {
            ("global", "count") => number(),
            ("global", "defined" | "references" | "boost") | ("string", "startsWith") => boolean(),
            ("global", "string" | "lower" | "upper" | "dateTime") | ("pt", "text") => {
                propagate(first, string())
            }
            ("global", "length" | "round") => propagate(first, number()),
            ("global", "now" | "identity" | "path") | ("sanity", "projectId" | "dataset") => string(),
            ("math", "sum") => propagate(first, number()),
            ("math", "avg" | "min" | "max") | ("geo", "distance") => number().add_null(),
            ("array", "join") => propagate(first, string()),
            ("array", "compact") => match first {
                Some(array) => {
                    StructureNode::array(non_null(&elements_of(array)), Flags::REQUIRED)
                }
                None => StructureNode::Unknown,
            },
            ("array", "unique") => first.map_or(StructureNode::Unknown, |array| {
                StructureNode::array(elements_of(array), Flags::REQUIRED)
            }),
            ("string", "split") => propagate(first, StructureNode::array(string(), Flags::REQUIRED)),
            _ => {
                self.report(DiagnosticKind::UnknownFunction, format!("{namespace}::{name}()"));
                StructureNode::Unknown
            }
        }
    }

    /// First non-null argument. Nullable only if every argument may be null.
    fn coalesce(&mut self, args: &'a [Expr], env: &Env) -> StructureNode {
        let mut branches = Vec::new();
        let mut all_nullable = true;
        for arg in args {
            if is_null_literal(arg) {
                continue;
            }
            let value = self.evaluate(arg, env);
            all_nullable &= value.flags().is_nullish();
            branches.push(non_null(&value));
        }
        if branches.is_empty() {
            return StructureNode::Unknown;
        }
        let result = StructureNode::or(branches);
        if all_nullable { result.add_null() } else { result }
    }

    /// `select(cond => value, ..., fallback)`
    ///
    /// Conditions decided by a `_type` test drop or settle their branch.
    /// Without a reachable fallback the result may be null.
    fn select(&mut self, args: &'a [Expr], env: &Env) -> StructureNode {
        let mut branches = Vec::new();
        let mut nullable = true;
        for arg in args {
            let (decided, value) = match &arg.kind {
                ExprKind::Pair { left, right } => {
                    self.evaluate(left, env);
                    (type_test(left, env.this()), right.as_ref())
                }
                _ => (Some(true), arg),
            };
            if decided == Some(false) {
                continue;
            }
            if !is_null_literal(value) {
                branches.push(self.evaluate(value, env).optional_to_null());
            }
            if decided == Some(true) {
                nullable = is_null_literal(value);
                break;
            }
        }
        if branches.is_empty() {
            return StructureNode::Unknown;
        }
        let result = StructureNode::or(branches);
        if nullable { result.add_null() } else { result }
    }

    /// `fn ns::name($a, ...) = body;` called with `args`.
    fn call_custom(&mut self, def: &'a FunctionDef, args: &'a [Expr], env: &Env) -> StructureNode {
        if self.call_depth >= MAX_CALL_DEPTH {
            self.report(
                DiagnosticKind::UnsupportedConstruct,
                format!("{}::{}() recursion too deep", def.namespace, def.name),
            );
            return StructureNode::Unknown;
        }
        let bindings = def
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| (param.clone(), self.evaluate(arg, env)))
            .collect();
        let scope = env.push_bindings(env.this().clone(), bindings);

        self.call_depth += 1;
        let result = self.evaluate(&def.body, &scope);
        self.call_depth -= 1;
        result
    }

    /// `base | name(args)`
    pub(super) fn call_pipe(
        &mut self,
        base: &StructureNode,
        name: &str,
        args: &'a [Expr],
        env: &Env,
    ) -> StructureNode {
        let element_scope = env.push(elements_of(base));
        for arg in args {
            self.evaluate(arg, &element_scope);
        }
        match name {
            "order" => base.clone(),
            "score" => with_score(base),
            _ => {
                self.report(DiagnosticKind::UnknownPipeFunction, format!("| {name}()"));
                StructureNode::Unknown
            }
        }
    }
}

/// Add `_score` to every object element of an array.
fn with_score(node: &StructureNode) -> StructureNode {
    node.map_branches(|branch| match branch {
        StructureNode::Array(array) => {
            let element = array.of().map_branches(|element| match element {
                StructureNode::Object(object) => StructureNode::object(
                    merge_properties(object.properties().to_vec(), [score_property()]),
                    object.flags(),
                ),
                other => other.clone(),
            });
            StructureNode::array(element, array.flags())
        }
        _ => StructureNode::Unknown,
    })
}
