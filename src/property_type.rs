// 🏷️ Property Types - named, typed attribute slots
// A type belongs to exactly one schema and is referenced (never owned) by properties.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::schema::SchemaId;
use crate::values::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTypeId(Uuid);

impl PropertyTypeId {
    pub fn new() -> Self {
        PropertyTypeId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PropertyTypeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PropertyTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One attribute slot defined by a schema
///
/// Identity, name, owning schema and kind are fixed at creation.
/// Only visibility and description change afterwards, through the owning schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    id: PropertyTypeId,
    name: String,
    schema_id: SchemaId,
    value_kind: ValueKind,
    pub(crate) visible: bool,
    pub(crate) description: String,
}

impl PropertyType {
    pub(crate) fn new(schema_id: SchemaId, name: impl Into<String>, value_kind: ValueKind) -> Self {
        PropertyType {
            id: PropertyTypeId::new(),
            name: name.into(),
            schema_id,
            value_kind,
            visible: true,
            description: String::new(),
        }
    }

    pub fn id(&self) -> PropertyTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_type_defaults() {
        let schema_id = SchemaId::new();
        let pt = PropertyType::new(schema_id, "Notes", ValueKind::String);

        assert_eq!(pt.name(), "Notes");
        assert_eq!(pt.schema_id(), schema_id);
        assert_eq!(pt.value_kind(), ValueKind::String);
        assert!(pt.visible());
        assert!(pt.description().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let schema_id = SchemaId::new();
        let a = PropertyType::new(schema_id, "A", ValueKind::Integer);
        let b = PropertyType::new(schema_id, "B", ValueKind::Integer);
        assert_ne!(a.id(), b.id());
    }
}
