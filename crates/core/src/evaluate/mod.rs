//! Symbolic GROQ evaluation over structure nodes.
//!
//! The evaluator walks a parsed [`Query`] and computes the shape of its
//! result from the workspace's structure forest. It never fails: anything
//! it cannot type becomes `Unknown`, and constructs it does not recognize
//! are reported as [`Diagnostic`]s next to the result.
//!
//! ## Module Structure
//!
//! - `access`: attribute, element, slice and dereference access
//! - `narrow`: static `_type` tests and union narrowing
//! - `operators`: binary and unary operator result types
//! - `functions`: built-in, pipe and custom function calls
//! - `objects`: object literals and projections with splats

pub mod access;
mod functions;
pub mod narrow;
mod objects;
pub mod operators;

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::groq::ast::{ArrayElement, BinaryOp, Expr, ExprKind, FunctionDef, Literal, NodeId, Query};
use crate::structure::{Flags, Interner, StructureNode};
use crate::transform::WorkspaceStructure;

/// Nested custom function calls deeper than this evaluate to `Unknown`.
const MAX_CALL_DEPTH: usize = 16;

/// Result of evaluating one query.
#[derive(Debug, Clone)]
pub struct QueryEvaluation {
    pub node: StructureNode,
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluate `query` against one workspace. The root `@` is `Unknown`.
pub fn evaluate_query(query: &Query, workspace: &WorkspaceStructure) -> QueryEvaluation {
    let mut evaluator = Evaluator::new(query, workspace);
    let node = evaluator.evaluate(&query.body, &Env::root(StructureNode::Unknown));
    debug!(
        workspace = %workspace.name(),
        memoized = evaluator.memo.len(),
        interned = evaluator.interner.len(),
        diagnostics = evaluator.diagnostics.len(),
        "Evaluated query"
    );
    QueryEvaluation {
        node,
        diagnostics: evaluator.diagnostics,
    }
}

// =============================================================================
// Environment
// =============================================================================

/// One level of the scope stack.
#[derive(Debug, Clone)]
struct Scope {
    this: StructureNode,
    bindings: Vec<(String, StructureNode)>,
}

/// Scope stack, innermost last. Scopes below the innermost one are the
/// parents reached with `^`.
#[derive(Debug, Clone)]
struct Env {
    scopes: Vec<Scope>,
}

impl Env {
    fn root(this: StructureNode) -> Self {
        Self {
            scopes: vec![Scope {
                this,
                bindings: Vec::new(),
            }],
        }
    }

    fn this(&self) -> &StructureNode {
        self.scopes
            .last()
            .map_or(&StructureNode::Unknown, |scope| &scope.this)
    }

    /// A new innermost scope with `this` as `@`.
    fn push(&self, this: StructureNode) -> Self {
        self.push_bindings(this, Vec::new())
    }

    fn push_bindings(&self, this: StructureNode, bindings: Vec<(String, StructureNode)>) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.push(Scope { this, bindings });
        Self { scopes }
    }

    /// `@` of the scope `levels` above the innermost one.
    fn parent(&self, levels: usize) -> StructureNode {
        self.scopes
            .len()
            .checked_sub(levels + 1)
            .and_then(|index| self.scopes.get(index))
            .map_or(StructureNode::Unknown, |scope| scope.this.clone())
    }

    /// `$name`, innermost binding first.
    fn binding(&self, name: &str) -> Option<&StructureNode> {
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .bindings
                .iter()
                .find(|(bound, _)| bound == name)
                .map(|(_, node)| node)
        })
    }

    /// Memo key component: context hashes and bindings of every scope.
    fn fingerprint(&self) -> String {
        let mut fingerprint = String::new();
        for scope in &self.scopes {
            fingerprint.push_str(scope.this.hash());
            for (name, node) in &scope.bindings {
                let _ = write!(fingerprint, ",{name}={}", node.hash());
            }
            fingerprint.push(';');
        }
        fingerprint
    }
}

// =============================================================================
// Evaluator
// =============================================================================

struct Evaluator<'a> {
    workspace: &'a WorkspaceStructure,
    functions: HashMap<(&'a str, &'a str), &'a FunctionDef>,
    memo: HashMap<(NodeId, String), StructureNode>,
    interner: Interner,
    diagnostics: Vec<Diagnostic>,
    call_depth: usize,
}

impl<'a> Evaluator<'a> {
    fn new(query: &'a Query, workspace: &'a WorkspaceStructure) -> Self {
        let functions = query
            .functions
            .iter()
            .map(|def| ((def.namespace.as_str(), def.name.as_str()), def))
            .collect();
        Self {
            workspace,
            functions,
            memo: HashMap::new(),
            interner: Interner::new(),
            diagnostics: Vec::new(),
            call_depth: 0,
        }
    }

    fn evaluate(&mut self, expr: &'a Expr, env: &Env) -> StructureNode {
        let key = (expr.id, env.fingerprint());
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }
        let node = self.evaluate_uncached(expr, env);
        let node = self.interner.intern(node);
        self.memo.insert(key, node.clone());
        node
    }

    fn evaluate_uncached(&mut self, expr: &'a Expr, env: &Env) -> StructureNode {
        match &expr.kind {
            ExprKind::Everything => {
                StructureNode::array(self.workspace.documents_node().clone(), Flags::REQUIRED)
            }
            ExprKind::This => env.this().clone(),
            ExprKind::Parent(levels) => env.parent(*levels),
            // unbound query parameters are supplied at runtime
            ExprKind::Param(name) => env.binding(name).cloned().unwrap_or(StructureNode::Unknown),
            ExprKind::Attribute(name) => access::attribute(env.this(), name),
            ExprKind::Value(literal) => literal_node(literal),
            ExprKind::Array(elements) => self.evaluate_array(elements, env),
            ExprKind::Object(attributes) => self.evaluate_object(attributes, env),
            ExprKind::Group(inner) => self.evaluate(inner, env),

            ExprKind::AccessAttribute { base, name } => {
                let base = self.evaluate(base, env);
                access::attribute(&base, name)
            }
            ExprKind::AccessElement { base, index } => {
                let base = self.evaluate(base, env);
                let index = constant_index(index).or_else(|| {
                    self.evaluate(index, env);
                    None
                });
                access::element(&base, index)
            }
            ExprKind::Slice {
                base, start, end, ..
            } => {
                self.evaluate(start, env);
                self.evaluate(end, env);
                let base = self.evaluate(base, env);
                access::slice(&base)
            }
            ExprKind::Filter { base, condition } => {
                let base = self.evaluate(base, env);
                self.filter(&base, condition, env)
            }
            ExprKind::ArrayPostfix(base) => {
                let base = self.evaluate(base, env);
                access::flatten(&base)
            }
            ExprKind::Projection { base, object } => {
                let base = self.evaluate(base, env);
                self.project(&base, object, env)
            }
            ExprKind::Deref { base, attribute } => {
                let base = self.evaluate(base, env);
                let target = access::deref(&base);
                match attribute {
                    Some(name) => access::attribute(&target, name),
                    None => target,
                }
            }

            ExprKind::FuncCall {
                namespace,
                name,
                args,
            } => self.call_function(namespace, name, args, env),
            ExprKind::PipeFuncCall { base, name, args } => {
                let base = self.evaluate(base, env);
                self.call_pipe(&base, name, args, env)
            }

            ExprKind::Binary {
                op: op @ (BinaryOp::In | BinaryOp::Match),
                left,
                right,
            } => {
                self.evaluate(left, env);
                if let ExprKind::Range { start, end, .. } = &right.kind {
                    self.evaluate(start, env);
                    self.evaluate(end, env);
                } else {
                    self.evaluate(right, env);
                }
                operators::binary(*op, &StructureNode::Unknown, &StructureNode::Unknown)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate(left, env);
                let right = self.evaluate(right, env);
                operators::binary(*op, &left, &right)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate(operand, env);
                operators::unary(*op, &operand)
            }
            ExprKind::Range { .. } => {
                self.report(DiagnosticKind::UnsupportedConstruct, "range outside a slice or `in`");
                StructureNode::Unknown
            }
            ExprKind::Pair { .. } => {
                self.report(DiagnosticKind::UnsupportedConstruct, "`=>` outside select() or an object");
                StructureNode::Unknown
            }
            ExprKind::Ordering { expr, .. } => self.evaluate(expr, env),
        }
    }

    /// Array literal: a tuple, or an array of the union when it has splats.
    fn evaluate_array(&mut self, elements: &'a [ArrayElement], env: &Env) -> StructureNode {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.evaluate(&element.value, env);
            values.push(if element.splat {
                operators::elements_of(&value)
            } else {
                value.optional_to_null()
            });
        }
        if elements.iter().any(|element| element.splat) {
            StructureNode::array(StructureNode::or(values), Flags::REQUIRED)
        } else {
            StructureNode::tuple(values, Flags::REQUIRED)
        }
    }

    /// `base[condition]`: narrow the element type of every array branch.
    fn filter(&mut self, base: &StructureNode, condition: &'a Expr, env: &Env) -> StructureNode {
        base.map_branches(|branch| {
            let (element, flags) = match branch {
                StructureNode::Array(array) => (array.of().clone(), array.flags()),
                StructureNode::Tuple(tuple) => (
                    StructureNode::or(tuple.elements().iter().cloned()),
                    tuple.flags(),
                ),
                _ => return StructureNode::Unknown,
            };
            self.evaluate(condition, &env.push(element.clone()));
            StructureNode::array(narrow::narrow(&element, condition), flags)
        })
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(kind, message);
        debug!(%diagnostic, "Typed sub-expression as unknown");
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }
}

fn literal_node(literal: &Literal) -> StructureNode {
    match literal {
        // null has no shape of its own; callers that care check for the literal
        Literal::Null => StructureNode::Unknown,
        Literal::Boolean(value) => StructureNode::boolean(Some(*value), Flags::REQUIRED),
        Literal::Number(value) => StructureNode::number(Some(*value), Flags::REQUIRED),
        Literal::String(value) => StructureNode::string(Some(value.clone()), Flags::REQUIRED),
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Value(Literal::Null) => true,
        ExprKind::Group(inner) => is_null_literal(inner),
        _ => false,
    }
}

/// Integer index written as a literal, possibly negated.
fn constant_index(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Value(Literal::Number(value)) if value.fract() == 0.0 => Some(*value as i64),
        ExprKind::Unary {
            op: crate::groq::ast::UnaryOp::Neg,
            operand,
        } => constant_index(operand).map(|index| -index),
        ExprKind::Group(inner) => constant_index(inner),
        _ => None,
    }
}
