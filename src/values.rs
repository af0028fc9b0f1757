// 🧮 Value Layer - typed payloads held by properties
// A property value always carries its kind; the payload itself may be empty.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{PropertyStoreError, PropertyStoreResult};

// ============================================================================
// VALUE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Short text without line breaks
    SingleLineString,
    /// Free text
    String,
    Boolean,
    Integer,
    Decimal,
    /// Opaque structured blob
    Json,
    /// Ordered list of text items
    List,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::SingleLineString => "single-line string",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Json => "json",
            ValueKind::List => "list",
        }
    }

    /// The empty value a property of this kind starts with
    pub fn empty_value(&self) -> PropertyValue {
        match self {
            ValueKind::SingleLineString => PropertyValue::SingleLineString(None),
            ValueKind::String => PropertyValue::String(None),
            ValueKind::Boolean => PropertyValue::Boolean(None),
            ValueKind::Integer => PropertyValue::Integer(None),
            ValueKind::Decimal => PropertyValue::Decimal(None),
            ValueKind::Json => PropertyValue::Json(None),
            ValueKind::List => PropertyValue::List(None),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROPERTY VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PropertyValue {
    SingleLineString(Option<String>),
    String(Option<String>),
    Boolean(Option<bool>),
    Integer(Option<i64>),
    Decimal(Option<Decimal>),
    Json(Option<serde_json::Value>),
    List(Option<Vec<String>>),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::SingleLineString(_) => ValueKind::SingleLineString,
            PropertyValue::String(_) => ValueKind::String,
            PropertyValue::Boolean(_) => ValueKind::Boolean,
            PropertyValue::Integer(_) => ValueKind::Integer,
            PropertyValue::Decimal(_) => ValueKind::Decimal,
            PropertyValue::Json(_) => ValueKind::Json,
            PropertyValue::List(_) => ValueKind::List,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::SingleLineString(v) | PropertyValue::String(v) => v.is_none(),
            PropertyValue::Boolean(v) => v.is_none(),
            PropertyValue::Integer(v) => v.is_none(),
            PropertyValue::Decimal(v) => v.is_none(),
            PropertyValue::Json(v) => v.is_none(),
            PropertyValue::List(v) => v.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::SingleLineString(v) | PropertyValue::String(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => *v,
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => *v,
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            PropertyValue::Decimal(v) => *v,
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            PropertyValue::Json(v) => v.as_ref(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(v) => v.as_deref(),
            _ => None,
        }
    }

    /// Text rendering of the payload, `None` when empty
    ///
    /// Lists render one item per line; JSON renders compact.
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            PropertyValue::SingleLineString(v) | PropertyValue::String(v) => v.clone(),
            PropertyValue::Boolean(v) => v.map(|b| b.to_string()),
            PropertyValue::Integer(v) => v.map(|i| i.to_string()),
            PropertyValue::Decimal(v) => v.map(|d| d.to_string()),
            PropertyValue::Json(v) => v.as_ref().map(|j| j.to_string()),
            PropertyValue::List(v) => v.as_ref().map(|items| items.join("\n")),
        }
    }

    /// Parse text into a value of the given kind
    ///
    /// `None` yields the empty value. For non-text kinds blank input is empty too.
    pub fn parse(kind: ValueKind, text: Option<&str>) -> PropertyStoreResult<PropertyValue> {
        let text = match text {
            Some(t) => t,
            None => return Ok(kind.empty_value()),
        };

        let invalid = |reason: String| PropertyStoreError::InvalidValue {
            kind,
            value: text.to_string(),
            reason,
        };

        if kind != ValueKind::SingleLineString && kind != ValueKind::String && text.trim().is_empty() {
            return Ok(kind.empty_value());
        }

        let value = match kind {
            ValueKind::SingleLineString => {
                if text.contains('\n') || text.contains('\r') {
                    return Err(invalid("line breaks are not allowed".to_string()));
                }
                PropertyValue::SingleLineString(Some(text.to_string()))
            }
            ValueKind::String => PropertyValue::String(Some(text.to_string())),
            ValueKind::Boolean => {
                let b = match text.trim().to_lowercase().as_str() {
                    "true" | "yes" | "1" => true,
                    "false" | "no" | "0" => false,
                    other => return Err(invalid(format!("'{}' is not a boolean", other))),
                };
                PropertyValue::Boolean(Some(b))
            }
            ValueKind::Integer => {
                let i = text.trim().parse::<i64>().map_err(|e| invalid(e.to_string()))?;
                PropertyValue::Integer(Some(i))
            }
            ValueKind::Decimal => {
                let d = Decimal::from_str(text.trim()).map_err(|e| invalid(e.to_string()))?;
                PropertyValue::Decimal(Some(d))
            }
            ValueKind::Json => {
                let j: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
                PropertyValue::Json(Some(j))
            }
            ValueKind::List => PropertyValue::List(Some(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect(),
            )),
        };

        Ok(value)
    }
}

// ============================================================================
// TESTS
// ============================================================================
