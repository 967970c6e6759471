//! Values exchanged with the storage collaborators.
//!
//! The key-value engine stores untyped text. Reads come back as a
//! [`StoredValue`] whose variant is decided by [`StoredValue::resolve`]:
//!
//! 1. missing key → `Null`
//! 2. exactly `"true"` or `"false"` → `Bool`
//! 3. text that parses in full as a finite `f64` → `Number`
//! 4. anything else → `String`
//!
//! Writes encode with [`StoredValue::encode`], so a `Bool` or `Number`
//! round-trips to the same variant. A `String` that happens to look like a
//! bool or number reads back as that type.

use serde::{Deserialize, Serialize};

/// A typed value read from or written to a store.
///
/// # Examples
///
/// ```
/// use statewire::StoredValue;
///
/// assert_eq!(StoredValue::resolve(Some("true")), StoredValue::Bool(true));
/// assert_eq!(StoredValue::resolve(Some("42.5")), StoredValue::Number(42.5));
/// assert_eq!(StoredValue::resolve(Some("wifi")), StoredValue::String("wifi".into()));
/// assert_eq!(StoredValue::resolve(None), StoredValue::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl StoredValue {
    /// Resolve raw stored text into a typed value.
    #[must_use]
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(text) = raw else {
            return Self::Null;
        };

        match text {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }

        // `f64::from_str` rejects surrounding whitespace, so a match here means
        // the whole string was consumed.
        if let Ok(n) = text.parse::<f64>() {
            if n.is_finite() {
                return Self::Number(n);
            }
        }

        Self::String(text.to_string())
    }

    /// Encode into the raw text form written to the store.
    ///
    /// Returns `None` for `Null`, which stores treat as a removal.
    #[must_use]
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(v) => Some(v.to_string()),
            Self::Number(v) => Some(v.to_string()),
            Self::String(v) => Some(v.clone()),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl std::fmt::Display for StoredValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for StoredValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for StoredValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for StoredValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<String> for StoredValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for StoredValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
