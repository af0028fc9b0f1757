// 🗺️ Threat Model - owner of the schema registry, the dirty flag and every container
//
// The model is itself a properties host: model-wide settings (such as the
// residual risk estimator configuration) live in its own container.

pub mod entity;

pub use entity::{Entity, EntityKind, EntitySnapshot};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::container::{PropertiesContainer, PropertiesHost, Property};
use crate::context::{DirtyFlag, ModelContext};
use crate::errors::PropertyStoreResult;
use crate::registry::SchemaRegistry;
use crate::schema::{PropertySchema, SchemaHandle, SchemaId, SchemaOptions, Scope};

/// Serializable state of a whole model
///
/// Schemas come first: containers can only be rehydrated once they exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub schemas: Vec<PropertySchema>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug)]
pub struct Model {
    id: Uuid,
    name: String,
    pub description: String,
    created_at: DateTime<Utc>,
    context: ModelContext,
    properties: PropertiesContainer,
    entities: Vec<Entity>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        let context = ModelContext::new();
        Model {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            created_at: Utc::now(),
            properties: PropertiesContainer::new(context.clone()),
            context,
            entities: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.context.registry()
    }

    // ========================================================================
    // CHANGE TRACKING
    // ========================================================================

    pub fn is_dirty(&self) -> bool {
        self.context.dirty().is_dirty()
    }

    pub fn mark_clean(&self) {
        self.context.dirty().clear();
    }

    // ========================================================================
    // SCHEMAS
    // ========================================================================

    pub fn get_schema(&self, name: &str, namespace: &str) -> Option<SchemaHandle> {
        self.registry().get_schema(name, namespace)
    }

    pub fn get_schema_by_id(&self, id: SchemaId) -> Option<SchemaHandle> {
        self.registry().get_schema_by_id(id)
    }

    pub fn add_schema(&self, name: &str, namespace: &str, options: SchemaOptions) -> PropertyStoreResult<SchemaHandle> {
        self.registry().add_schema(name, namespace, options)
    }

    pub fn get_or_create_schema(&self, name: &str, namespace: &str, options: SchemaOptions) -> SchemaHandle {
        self.registry().get_or_create_schema(name, namespace, options)
    }

    // ========================================================================
    // ENTITIES
    // ========================================================================

    /// Create an entity; auto-apply schemas covering its kind are applied to it
    pub fn add_entity(&mut self, name: impl Into<String>, kind: EntityKind) -> &Entity {
        let entity = Entity::new(self.context.clone(), name, kind);

        for schema in self.registry().schemas() {
            if schema.auto_apply() && schema.applies_to().covers(kind.scope()) {
                entity.properties_container().apply_schema(&schema);
            }
        }

        self.context.dirty().mark();
        let index = self.entities.len();
        self.entities.push(entity);
        &self.entities[index]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn get_entity(&self, id: Uuid) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Remove an entity; its container unsubscribes from its schemas on drop
    pub fn remove_entity(&mut self, id: Uuid) -> bool {
        match self.entities.iter().position(|e| e.id() == id) {
            Some(index) => {
                self.entities.remove(index);
                self.context.dirty().mark();
                true
            }
            None => false,
        }
    }

    /// Apply every auto-apply schema scoped to the threat model itself
    pub fn apply_model_schemas(&self) -> usize {
        self.registry()
            .schemas()
            .iter()
            .filter(|s| s.auto_apply() && s.applies_to().covers(Scope::ThreatModel))
            .map(|s| self.properties.apply_schema(s))
            .sum()
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            schemas: self.registry().to_records(),
            properties: self.properties.properties(),
            entities: self.entities.iter().map(Entity::to_snapshot).collect(),
        }
    }

    /// Rebuild a model: registry first, then containers with their subscriptions
    pub fn from_snapshot(snapshot: ModelSnapshot) -> PropertyStoreResult<Self> {
        let dirty = DirtyFlag::new();
        let registry = SchemaRegistry::from_records(snapshot.schemas, dirty.clone())?;
        let context = ModelContext::from_parts(registry, dirty);

        let properties = PropertiesContainer::restore(context.clone(), snapshot.properties)?;
        let entities = snapshot
            .entities
            .into_iter()
            .map(|e| Entity::restore(context.clone(), e))
            .collect::<PropertyStoreResult<Vec<Entity>>>()?;

        info!(
            "Restored model '{}' with {} schemas and {} entities",
            snapshot.name,
            context.registry().len(),
            entities.len()
        );

        Ok(Model {
            id: snapshot.id,
            name: snapshot.name,
            description: snapshot.description,
            created_at: snapshot.created_at,
            context,
            properties,
            entities,
        })
    }

    pub fn to_json(&self) -> PropertyStoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> PropertyStoreResult<Self> {
        let snapshot: ModelSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}

impl PropertiesHost for Model {
    fn properties_container(&self) -> &PropertiesContainer {
        &self.properties
    }
}

// ============================================================================
// TESTS
// ============================================================================
