//! TypeScript type IR produced from structure nodes.
//!
//! - `TsType`: type expressions (primitives, arrays, unions, objects, ...)
//! - `TsLiteral`: literal types
//! - `TsTypeDef`: one exported `type` declaration

/// TypeScript type representation
#[derive(Debug, Clone, PartialEq)]
pub enum TsType {
    /// string, number, boolean, null, unknown, never
    Primitive(TsPrimitive),
    /// Literal type: "foo", 42, true
    Literal(TsLiteral),
    /// Array type: T[]
    Array(Box<TsType>),
    /// Tuple type: [A, B]
    Tuple(Vec<TsType>),
    /// Union type: A | B | C
    Union(Vec<TsType>),
    /// Intersection type: A & B
    Intersection(Vec<TsType>),
    /// Object type: { foo: string; bar?: number }
    Object(Vec<TsProp>),
    /// Named type reference
    Ref(String),
    /// Generic instantiation: Reference<Author>
    Generic { name: String, args: Vec<TsType> },
}

impl TsType {
    pub fn null() -> Self {
        TsType::Primitive(TsPrimitive::Null)
    }

    /// `self | null`, flattening an existing union.
    pub fn or_null(self) -> Self {
        match self {
            TsType::Union(mut members) => {
                if !members.contains(&TsType::null()) {
                    members.push(TsType::null());
                }
                TsType::Union(members)
            }
            TsType::Primitive(TsPrimitive::Null | TsPrimitive::Unknown) => self,
            // never | null is null
            TsType::Primitive(TsPrimitive::Never) => TsType::null(),
            other => TsType::Union(vec![other, TsType::null()]),
        }
    }

    /// Union of `members`, flattening nested unions and dropping repeats.
    pub fn union(members: Vec<TsType>) -> Self {
        let mut flat: Vec<TsType> = Vec::with_capacity(members.len());
        for member in members {
            let parts = match member {
                TsType::Union(parts) => parts,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }
        match flat.len() {
            0 => TsType::Primitive(TsPrimitive::Never),
            1 => flat.pop().unwrap_or(TsType::Primitive(TsPrimitive::Never)),
            _ => TsType::Union(flat),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsPrimitive {
    String,
    Number,
    Boolean,
    Null,
    Unknown,
    Never,
}

/// Object property definition
#[derive(Debug, Clone, PartialEq)]
pub struct TsProp {
    pub name: String,
    pub ty: TsType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TsLiteral {
    String(String),
    Number(f64),
    Bool(bool),
}

/// `export type name = ty;`
#[derive(Debug, Clone)]
pub struct TsTypeDef {
    pub name: String,
    pub ty: TsType,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_or_null() {
        let string = TsType::Primitive(TsPrimitive::String);
        assert_eq!(
            string.clone().or_null(),
            TsType::Union(vec![string.clone(), TsType::null()])
        );
        let twice = string.clone().or_null().or_null();
        assert_eq!(twice, TsType::Union(vec![string, TsType::null()]));
        assert_eq!(TsType::Primitive(TsPrimitive::Never).or_null(), TsType::null());
    }

    #[test]
    fn test_union_flattens() {
        let a = TsType::Ref("A".into());
        let b = TsType::Ref("B".into());
        let nested = TsType::union(vec![
            a.clone(),
            TsType::Union(vec![b.clone(), a.clone()]),
        ]);
        assert_eq!(nested, TsType::Union(vec![a.clone(), b]));
        assert_eq!(TsType::union(vec![a.clone()]), a);
        assert_eq!(TsType::union(Vec::new()), TsType::Primitive(TsPrimitive::Never));
    }
}
