// 🧱 Entity - a diagram element carrying its own properties

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::container::{PropertiesContainer, PropertiesHost, Property};
use crate::context::ModelContext;
use crate::errors::PropertyStoreResult;
use crate::schema::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    ExternalInteractor,
    Process,
    DataStore,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ExternalInteractor => "External Interactor",
            EntityKind::Process => "Process",
            EntityKind::DataStore => "Data Store",
        }
    }

    /// Schema scope matching this kind
    pub fn scope(&self) -> Scope {
        match self {
            EntityKind::ExternalInteractor => Scope::ExternalInteractor,
            EntityKind::Process => Scope::Process,
            EntityKind::DataStore => Scope::DataStore,
        }
    }
}

/// Serializable state of an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: Uuid,
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug)]
pub struct Entity {
    id: Uuid,
    name: String,
    kind: EntityKind,
    properties: PropertiesContainer,
}

impl Entity {
    pub(crate) fn new(context: ModelContext, name: impl Into<String>, kind: EntityKind) -> Self {
        Entity {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            properties: PropertiesContainer::new(context),
        }
    }

    pub(crate) fn restore(context: ModelContext, snapshot: EntitySnapshot) -> PropertyStoreResult<Self> {
        Ok(Entity {
            id: snapshot.id,
            name: snapshot.name,
            kind: snapshot.kind,
            properties: PropertiesContainer::restore(context, snapshot.properties)?,
        })
    }

    pub fn to_snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            properties: self.properties.properties(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl PropertiesHost for Entity {
    fn properties_container(&self) -> &PropertiesContainer {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOptions;
    use crate::values::{PropertyValue, ValueKind};

    #[test]
    fn test_kind_scope() {
        assert_eq!(EntityKind::Process.scope(), Scope::Process);
        assert!(Scope::Entity.covers(EntityKind::DataStore.scope()));
    }

    #[test]
    fn test_entity_delegates_to_container() {
        let context = ModelContext::new();
        let schema = context
            .registry()
            .get_or_create_schema("Hosting", "ns", SchemaOptions::default());
        let zone = schema.add_property_type("Zone", ValueKind::SingleLineString).unwrap();

        let entity = Entity::new(context, "Web Server", EntityKind::Process);
        entity
            .add_property(&zone, Some(PropertyValue::SingleLineString(Some("DMZ".to_string()))))
            .unwrap();

        assert!(entity.has_property(&zone));
        assert_eq!(entity.to_snapshot().properties.len(), 1);
        assert!(entity.remove_property(&zone));
        assert!(entity.properties().is_empty());
    }
}
