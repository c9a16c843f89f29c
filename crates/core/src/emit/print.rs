//! TypeScript text from the type IR via the `Emit` trait.

use std::fmt::Write as _;

use super::types::{TsLiteral, TsPrimitive, TsProp, TsType, TsTypeDef};
use super::utils::{escape_js_string, quote_if_needed};

/// Trait for emitting TypeScript code from IR nodes.
pub trait Emit {
    /// Convert the node to its TypeScript string representation.
    fn emit(&self) -> String;
}

// =============================================================================
// Primitive Types
// =============================================================================

impl Emit for TsPrimitive {
    fn emit(&self) -> String {
        match self {
            TsPrimitive::String => "string",
            TsPrimitive::Number => "number",
            TsPrimitive::Boolean => "boolean",
            TsPrimitive::Null => "null",
            TsPrimitive::Unknown => "unknown",
            TsPrimitive::Never => "never",
        }
        .to_string()
    }
}

impl Emit for TsLiteral {
    fn emit(&self) -> String {
        match self {
            TsLiteral::String(s) => format!("\"{}\"", escape_js_string(s)),
            TsLiteral::Number(n) => n.to_string(),
            TsLiteral::Bool(b) => b.to_string(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

impl Emit for TsType {
    fn emit(&self) -> String {
        match self {
            TsType::Primitive(p) => p.emit(),
            TsType::Literal(lit) => lit.emit(),
            TsType::Array(inner) => {
                let inner_str = inner.emit();
                // Wrap complex types in parentheses
                if matches!(**inner, TsType::Union(_) | TsType::Intersection(_)) {
                    format!("({inner_str})[]")
                } else {
                    format!("{inner_str}[]")
                }
            }
            TsType::Tuple(elements) => {
                let parts: Vec<_> = elements.iter().map(Emit::emit).collect();
                format!("[{}]", parts.join(", "))
            }
            TsType::Union(types) => types.iter().map(Emit::emit).collect::<Vec<_>>().join(" | "),
            TsType::Intersection(types) => types
                .iter()
                .map(|t| {
                    let s = t.emit();
                    if matches!(t, TsType::Union(_)) {
                        format!("({s})")
                    } else {
                        s
                    }
                })
                .collect::<Vec<_>>()
                .join(" & "),
            TsType::Object(props) => {
                if props.is_empty() {
                    "{}".to_string()
                } else {
                    let parts: Vec<_> = props.iter().map(Emit::emit).collect();
                    format!("{{ {} }}", parts.join("; "))
                }
            }
            TsType::Ref(name) => name.clone(),
            TsType::Generic { name, args } => {
                let args: Vec<_> = args.iter().map(Emit::emit).collect();
                format!("{name}<{}>", args.join(", "))
            }
        }
    }
}

impl Emit for TsProp {
    fn emit(&self) -> String {
        let key = quote_if_needed(&self.name);
        let opt = if self.optional { "?" } else { "" };
        format!("{}{}: {}", key, opt, self.ty.emit())
    }
}

// =============================================================================
// Type Definitions
// =============================================================================

impl Emit for TsTypeDef {
    fn emit(&self) -> String {
        match &self.ty {
            // top-level objects get one property per line
            TsType::Object(properties) if !properties.is_empty() => {
                let mut output = format!("export type {} = {{\n", self.name);
                for prop in properties {
                    let _ = writeln!(output, "  {};", prop.emit());
                }
                output.push_str("};\n");
                output
            }
            ty => format!("export type {} = {};\n", self.name, ty.emit()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn prop(name: &str, ty: TsType, optional: bool) -> TsProp {
        TsProp {
            name: name.into(),
            ty,
            optional,
        }
    }

    #[test]
    fn test_emit_primitive() {
        assert_eq!(TsPrimitive::String.emit(), "string");
        assert_eq!(TsPrimitive::Unknown.emit(), "unknown");
        assert_eq!(TsPrimitive::Never.emit(), "never");
    }

    #[test]
    fn test_emit_literal() {
        assert_eq!(TsLiteral::String("say \"hi\"".into()).emit(), "\"say \\\"hi\\\"\"");
        assert_eq!(TsLiteral::Number(3.0).emit(), "3");
        assert_eq!(TsLiteral::Number(2.5).emit(), "2.5");
        assert_eq!(TsLiteral::Bool(true).emit(), "true");
    }

    #[test]
    fn test_emit_union_array() {
        let inner = TsType::Primitive(TsPrimitive::String).or_null();
        let ty = TsType::Array(Box::new(inner));
        assert_eq!(ty.emit(), "(string | null)[]");
    }

    #[test]
    fn test_emit_object_and_tuple() {
        let ty = TsType::Object(vec![
            prop("title", TsType::Primitive(TsPrimitive::String), false),
            prop("page-count", TsType::Primitive(TsPrimitive::Number), true),
        ]);
        assert_eq!(ty.emit(), "{ title: string; \"page-count\"?: number }");

        let tuple = TsType::Tuple(vec![
            TsType::Literal(TsLiteral::Number(1.0)),
            TsType::Primitive(TsPrimitive::String),
        ]);
        assert_eq!(tuple.emit(), "[1, string]");
    }

    #[test]
    fn test_emit_generic_and_intersection() {
        let reference = TsType::Generic {
            name: "Reference".into(),
            args: vec![TsType::Ref("Author".into())],
        };
        assert_eq!(reference.emit(), "Reference<Author>");

        let keyed = TsType::Intersection(vec![
            TsType::Union(vec![TsType::Ref("A".into()), TsType::Ref("B".into())]),
            TsType::Object(vec![prop("_key", TsType::Primitive(TsPrimitive::String), false)]),
        ]);
        assert_eq!(keyed.emit(), "(A | B) & { _key: string }");
    }

    #[test]
    fn test_emit_type_def() {
        let def = TsTypeDef {
            name: "Book".into(),
            ty: TsType::Object(vec![
                prop("_id", TsType::Primitive(TsPrimitive::String), false),
                prop("title", TsType::Primitive(TsPrimitive::String), true),
            ]),
        };
        assert_eq!(def.emit(), "export type Book = {\n  _id: string;\n  title?: string;\n};\n");

        let alias = TsTypeDef {
            name: "Titles".into(),
            ty: TsType::Array(Box::new(TsType::Primitive(TsPrimitive::String))),
        };
        assert_eq!(alias.emit(), "export type Titles = string[];\n");
    }
}
