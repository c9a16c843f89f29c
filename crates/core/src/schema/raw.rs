//! Raw schema structs for serde deserialization.
//!
//! These mirror the JSON a schema extractor writes: loosely typed, every
//! field optional. The normalizer turns them into the canonical tree.

use serde::Deserialize;

use crate::error::SchemaError;

/// Root of a raw schema file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSchema {
    /// A bare list of types, loaded as the `default` workspace.
    Types(Vec<RawType>),
    Workspaces { workspaces: Vec<RawWorkspace> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkspace {
    pub name: String,
    #[serde(default)]
    pub types: Vec<RawType>,
}

/// A raw type, field or array member.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawType {
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub type_name: Option<String>,

    pub title: Option<String>,
    pub description: Option<String>,

    /// Fields of object-like types.
    pub fields: Option<Vec<RawType>>,

    /// Member types of arrays and blocks.
    pub of: Option<Vec<RawType>>,

    /// Reference targets.
    pub to: Option<RawTo>,

    pub weak: Option<bool>,

    pub options: Option<RawOptions>,

    /// Any non-null value counts as "has validation".
    pub validation: Option<serde_json::Value>,

    pub codegen: Option<RawCodegen>,

    /// A boolean or a conditional (callback) placeholder.
    pub hidden: Option<serde_json::Value>,
    pub read_only: Option<serde_json::Value>,

    /// Block decorators and annotations.
    pub marks: Option<RawMarks>,
    pub styles: Option<Vec<RawListEntry>>,
    pub lists: Option<Vec<RawListEntry>>,
}

/// `to` may be a single target or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTo {
    One(Box<RawType>),
    Many(Vec<RawType>),
}

impl RawTo {
    pub fn targets(&self) -> Vec<&RawType> {
        match self {
            RawTo::One(target) => vec![target.as_ref()],
            RawTo::Many(targets) => targets.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOptions {
    pub list: Option<Vec<RawListEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCodegen {
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMarks {
    pub annotations: Option<Vec<RawType>>,
}

/// A list entry: a bare scalar or `{ title, value }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawListEntry {
    Scalar(RawScalar),
    Titled {
        title: Option<String>,
        value: RawScalar,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    String(String),
    Number(f64),
}

impl RawSchema {
    /// Parse a raw schema from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Interpret a `hidden`/`readOnly` value: booleans as is, any other non-null
/// value (a conditional callback) as `true`.
pub(crate) fn truthy_flag(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}
