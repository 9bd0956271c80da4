//! Parameter kinds and values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a workflow parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A single file reference.
    File,
    /// A directory reference.
    Directory,
    /// Free text.
    String,
    /// An on/off switch.
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// Value bound to a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    /// File reference, as a remote URI or local path.
    File(String),
    /// Directory reference, as a remote URI or local path.
    Directory(String),
    /// Text value.
    String(String),
    /// Switch value.
    Boolean(bool),
    /// No value supplied.
    #[default]
    Absent,
}

impl ParamValue {
    /// Returns true if no value was supplied.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Whether the value fits a declared kind. `Absent` fits every kind.
    #[must_use]
    pub fn matches_kind(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (Self::Absent, _)
                | (Self::File(_), ParamKind::File)
                | (Self::Directory(_), ParamKind::Directory)
                | (Self::String(_), ParamKind::String)
                | (Self::Boolean(_), ParamKind::Boolean)
        )
    }

    /// Coerces a plain JSON value into a value of `kind`.
    ///
    /// `null` is `Absent`; anything else must be a string (file, directory,
    /// string kinds) or a bool (boolean kind).
    #[must_use]
    pub fn from_json(kind: ParamKind, value: &serde_json::Value) -> Option<Self> {
        match (kind, value) {
            (_, serde_json::Value::Null) => Some(Self::Absent),
            (ParamKind::File, serde_json::Value::String(s)) => Some(Self::File(s.clone())),
            (ParamKind::Directory, serde_json::Value::String(s)) => Some(Self::Directory(s.clone())),
            (ParamKind::String, serde_json::Value::String(s)) => Some(Self::String(s.clone())),
            (ParamKind::Boolean, serde_json::Value::Bool(b)) => Some(Self::Boolean(*b)),
            _ => None,
        }
    }
}
