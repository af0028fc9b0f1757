// 🗂️ Schema Registry - one schema per (name, namespace) per model
// Schemas are created lazily and live as long as the model does.

use log::info;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::DirtyFlag;
use crate::errors::{PropertyStoreError, PropertyStoreResult};
use crate::property_type::{PropertyType, PropertyTypeId};
use crate::schema::{PropertySchema, SchemaHandle, SchemaId, SchemaOptions};

/// Catalog of the schemas known to a model
///
/// Clones share the same catalog.
#[derive(Clone)]
pub struct SchemaRegistry {
    schemas: Rc<RefCell<Vec<SchemaHandle>>>,
    dirty: DirtyFlag,
}

impl SchemaRegistry {
    pub fn new(dirty: DirtyFlag) -> Self {
        SchemaRegistry {
            schemas: Rc::new(RefCell::new(Vec::new())),
            dirty,
        }
    }

    /// Rebuild a registry from persisted schemas
    pub fn from_records(records: Vec<PropertySchema>, dirty: DirtyFlag) -> PropertyStoreResult<Self> {
        let registry = SchemaRegistry::new(dirty);
        {
            let mut schemas = registry.schemas.borrow_mut();
            for record in records {
                if schemas.iter().any(|s| s.matches_key(&record.name, &record.namespace)) {
                    return Err(PropertyStoreError::DuplicateSchema {
                        name: record.name,
                        namespace: record.namespace,
                    });
                }
                schemas.push(SchemaHandle::from_record(record, registry.dirty.clone()));
            }
        }
        Ok(registry)
    }

    pub fn to_records(&self) -> Vec<PropertySchema> {
        self.schemas.borrow().iter().map(SchemaHandle::to_record).collect()
    }

    /// Return the schema registered under (name, namespace), creating it with
    /// `options` when absent. Options are ignored for an existing schema.
    pub fn get_or_create_schema(&self, name: &str, namespace: &str, options: SchemaOptions) -> SchemaHandle {
        if let Some(existing) = self.get_schema(name, namespace) {
            return existing;
        }
        self.create(name, namespace, options)
    }

    /// Register a new schema; fails when (name, namespace) is taken
    pub fn add_schema(&self, name: &str, namespace: &str, options: SchemaOptions) -> PropertyStoreResult<SchemaHandle> {
        if self.get_schema(name, namespace).is_some() {
            return Err(PropertyStoreError::DuplicateSchema {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Ok(self.create(name, namespace, options))
    }

    fn create(&self, name: &str, namespace: &str, options: SchemaOptions) -> SchemaHandle {
        let schema = SchemaHandle::from_record(
            PropertySchema::new(name, namespace, options),
            self.dirty.clone(),
        );
        self.schemas.borrow_mut().push(schema.clone());
        self.dirty.mark();

        info!("Created schema '{}' in namespace '{}' ({})", name, namespace, schema.id());
        schema
    }

    pub fn get_schema(&self, name: &str, namespace: &str) -> Option<SchemaHandle> {
        self.schemas
            .borrow()
            .iter()
            .find(|s| s.matches_key(name, namespace))
            .cloned()
    }

    pub fn get_schema_by_id(&self, id: SchemaId) -> Option<SchemaHandle> {
        self.schemas.borrow().iter().find(|s| s.id() == id).cloned()
    }

    /// All schemas, highest priority (lowest number) first, then by name
    pub fn schemas(&self) -> Vec<SchemaHandle> {
        let mut all: Vec<SchemaHandle> = self.schemas.borrow().clone();
        all.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(&b.name())));
        all
    }

    /// Search every schema for a property type id
    pub fn find_property_type(&self, id: PropertyTypeId) -> Option<PropertyType> {
        self.schemas
            .borrow()
            .iter()
            .find_map(|s| s.get_property_type_by_id(id))
    }

    pub fn len(&self) -> usize {
        self.schemas.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.borrow().is_empty()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas.borrow().len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scope;
    use crate::values::ValueKind;

    const NS: &str = "https://example.org/threats";

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = SchemaRegistry::new(DirtyFlag::new());

        let first = registry.get_or_create_schema("Risk", NS, SchemaOptions::default().with_priority(5));
        let second = registry.get_or_create_schema("Risk", NS, SchemaOptions::default().with_priority(99));

        assert!(first.ptr_eq(&second));
        assert_eq!(second.priority(), 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_name_different_namespace_is_distinct() {
        let registry = SchemaRegistry::new(DirtyFlag::new());

        let a = registry.get_or_create_schema("Risk", NS, SchemaOptions::default());
        let b = registry.get_or_create_schema("Risk", "other", SchemaOptions::default());

        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.get_schema("Risk", "missing").is_none());
    }

    #[test]
    fn test_add_schema_rejects_duplicate_key() {
        let registry = SchemaRegistry::new(DirtyFlag::new());
        registry.add_schema("Risk", NS, SchemaOptions::default()).unwrap();

        let result = registry.add_schema("Risk", NS, SchemaOptions::default());
        assert!(matches!(result, Err(PropertyStoreError::DuplicateSchema { .. })));
    }

    #[test]
    fn test_lookup_by_id_and_type() {
        let registry = SchemaRegistry::new(DirtyFlag::new());
        let schema = registry.get_or_create_schema("Risk", NS, SchemaOptions::default());
        let pt = schema.add_property_type("Score", ValueKind::Decimal).unwrap();

        assert!(registry.get_schema_by_id(schema.id()).unwrap().ptr_eq(&schema));
        assert_eq!(registry.find_property_type(pt.id()).unwrap().name(), "Score");
        assert!(registry.find_property_type(PropertyTypeId::new()).is_none());
    }

    #[test]
    fn test_schemas_ordered_by_priority() {
        let registry = SchemaRegistry::new(DirtyFlag::new());
        registry.get_or_create_schema("Low", NS, SchemaOptions::default().with_priority(100));
        registry.get_or_create_schema("High", NS, SchemaOptions::default().with_priority(1));
        registry.get_or_create_schema("Alpha", NS, SchemaOptions::default().with_priority(100));

        let names: Vec<String> = registry.schemas().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["High", "Alpha", "Low"]);
    }

    #[test]
    fn test_records_round_trip_preserves_ids() {
        let registry = SchemaRegistry::new(DirtyFlag::new());
        let schema = registry.get_or_create_schema(
            "Risk",
            NS,
            SchemaOptions::default().with_scope(Scope::ThreatModel).with_system(true),
        );
        let pt = schema.add_property_type("Score", ValueKind::Decimal).unwrap();

        let json = serde_json::to_string(&registry.to_records()).unwrap();
        let records: Vec<PropertySchema> = serde_json::from_str(&json).unwrap();
        let restored = SchemaRegistry::from_records(records, DirtyFlag::new()).unwrap();

        let schema = restored.get_schema("Risk", NS).unwrap();
        assert!(schema.system());
        assert_eq!(schema.applies_to(), Scope::ThreatModel);
        assert_eq!(schema.get_property_type("Score").unwrap().id(), pt.id());
    }
}
