// 🧰 Properties Container - the property store engine
//
// A container owns an ordered list of properties and keeps it in step with
// every schema it is enrolled in: new types are auto-added with an empty
// value, removed types take their properties with them.
//
// Subscriptions are not persisted. `restore` (or an explicit `rehydrate`)
// re-establishes them from the schema ids referenced by restored properties.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::context::ModelContext;
use crate::errors::{PropertyStoreError, PropertyStoreResult};
use crate::events::{Handler, Multicast, PropertyEvent};
use crate::property_type::{PropertyType, PropertyTypeId};
use crate::schema::{SchemaHandle, SchemaId, SchemaObserver};
use crate::values::PropertyValue;

// ============================================================================
// PROPERTY
// ============================================================================

/// A value bound to one property type
///
/// Persisted as `(property_type_id, value)`; the owning schema id is resolved
/// again when the container is restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    property_type_id: PropertyTypeId,
    value: PropertyValue,
    #[serde(skip)]
    schema_id: Option<SchemaId>,
}

impl Property {
    pub(crate) fn new(property_type: &PropertyType, value: PropertyValue) -> Self {
        Property {
            property_type_id: property_type.id(),
            value,
            schema_id: Some(property_type.schema_id()),
        }
    }

    pub fn property_type_id(&self) -> PropertyTypeId {
        self.property_type_id
    }

    /// Owning schema, `None` when the type could not be resolved after a restore
    pub fn schema_id(&self) -> Option<SchemaId> {
        self.schema_id
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn string_value(&self) -> Option<String> {
        self.value.to_string_value()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

// ============================================================================
// CONTAINER STATE
// ============================================================================

struct ContainerState {
    context: ModelContext,
    properties: RefCell<Vec<Property>>,
    subscriptions: RefCell<Vec<SchemaId>>,
    property_added: Multicast<PropertyEvent>,
    property_removed: Multicast<PropertyEvent>,
    property_value_changed: Multicast<PropertyEvent>,
    self_ref: Weak<ContainerState>,
}

impl ContainerState {
    fn handle(&self) -> Option<PropertiesContainer> {
        self.self_ref.upgrade().map(|inner| PropertiesContainer { inner })
    }
}

impl SchemaObserver for ContainerState {
    fn property_type_added(&self, schema: &SchemaHandle, property_type: &PropertyType) {
        if let Some(container) = self.handle() {
            container.on_property_type_added(schema, property_type);
        }
    }

    fn property_type_removed(&self, _schema: &SchemaHandle, property_type: &PropertyType) {
        if let Some(container) = self.handle() {
            container.remove_property_by_id(property_type.id());
        }
    }
}

impl Drop for ContainerState {
    fn drop(&mut self) {
        let addr = self as *const ContainerState as *const ();
        for schema_id in self.subscriptions.get_mut().drain(..) {
            if let Some(schema) = self.context.registry().get_schema_by_id(schema_id) {
                schema.remove_observer(addr);
            }
        }
    }
}

// ============================================================================
// PROPERTIES CONTAINER
// ============================================================================

/// Shared handle to the properties of one model element
///
/// Clones refer to the same container; the element that embeds it is the owner.
#[derive(Clone)]
pub struct PropertiesContainer {
    inner: Rc<ContainerState>,
}

impl PropertiesContainer {
    pub fn new(context: ModelContext) -> Self {
        Self::with_properties(context, Vec::new())
    }

    fn with_properties(context: ModelContext, properties: Vec<Property>) -> Self {
        PropertiesContainer {
            inner: Rc::new_cyclic(|self_ref| ContainerState {
                context,
                properties: RefCell::new(properties),
                subscriptions: RefCell::new(Vec::new()),
                property_added: Multicast::new(),
                property_removed: Multicast::new(),
                property_value_changed: Multicast::new(),
                self_ref: self_ref.clone(),
            }),
        }
    }

    /// Rebuild a container from persisted properties and rehydrate its subscriptions
    ///
    /// Fails when a stored value disagrees with the kind of its resolved type.
    pub fn restore(context: ModelContext, properties: Vec<Property>) -> PropertyStoreResult<Self> {
        for property in &properties {
            if let Some(pt) = context.registry().find_property_type(property.property_type_id) {
                if property.value.kind() != pt.value_kind() {
                    warn!(
                        "Stored value of '{}' is {}, expected {}",
                        pt.name(),
                        property.value.kind(),
                        pt.value_kind()
                    );
                    return Err(PropertyStoreError::ValueKindMismatch {
                        expected: pt.value_kind(),
                        actual: property.value.kind(),
                    });
                }
            }
        }

        let container = Self::with_properties(context, properties);
        container.rehydrate();
        Ok(container)
    }

    /// Re-resolve schema ids and re-subscribe to every schema the stored
    /// properties reference. Returns the number of schemas now observed.
    ///
    /// Properties whose type or schema no longer exists are kept as they are.
    pub fn rehydrate(&self) -> usize {
        let registry = self.inner.context.registry().clone();

        let mut schema_ids: Vec<SchemaId> = Vec::new();
        {
            let mut properties = self.inner.properties.borrow_mut();
            for property in properties.iter_mut() {
                match registry.find_property_type(property.property_type_id) {
                    Some(pt) => {
                        property.schema_id = Some(pt.schema_id());
                        if !schema_ids.contains(&pt.schema_id()) {
                            schema_ids.push(pt.schema_id());
                        }
                    }
                    None => {
                        property.schema_id = None;
                        warn!("Property type {} not found while rehydrating container", property.property_type_id);
                    }
                }
            }
        }

        for schema_id in &schema_ids {
            match registry.get_schema_by_id(*schema_id) {
                Some(schema) => self.subscribe_to(&schema),
                None => warn!("Schema {} not found while rehydrating container", schema_id),
            }
        }

        self.inner.subscriptions.borrow().len()
    }

    pub fn context(&self) -> &ModelContext {
        &self.inner.context
    }

    pub fn ptr_eq(&self, other: &PropertiesContainer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schemas this container currently listens to
    pub fn subscribed_schemas(&self) -> Vec<SchemaId> {
        self.inner.subscriptions.borrow().clone()
    }

    fn subscribe_to(&self, schema: &SchemaHandle) {
        let observer: Weak<dyn SchemaObserver> = self.inner.self_ref.clone();
        if schema.add_observer(observer) {
            self.inner.subscriptions.borrow_mut().push(schema.id());
            debug!("Container subscribed to schema '{}'", schema.name());
        }
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn properties(&self) -> Vec<Property> {
        self.inner.properties.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.properties.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.properties.borrow().is_empty()
    }

    pub fn has_property(&self, property_type: &PropertyType) -> bool {
        self.has_property_id(property_type.id())
    }

    pub fn has_property_id(&self, id: PropertyTypeId) -> bool {
        self.inner
            .properties
            .borrow()
            .iter()
            .any(|p| p.property_type_id == id)
    }

    pub fn get_property(&self, property_type: &PropertyType) -> Option<Property> {
        self.get_property_by_id(property_type.id())
    }

    pub fn get_property_by_id(&self, id: PropertyTypeId) -> Option<Property> {
        self.inner
            .properties
            .borrow()
            .iter()
            .find(|p| p.property_type_id == id)
            .cloned()
    }

    /// Whether any property comes from the given schema
    pub fn is_enrolled(&self, schema_id: SchemaId) -> bool {
        self.inner
            .properties
            .borrow()
            .iter()
            .any(|p| p.schema_id == Some(schema_id))
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    fn resolve_schema(&self, property_type: &PropertyType) -> PropertyStoreResult<SchemaHandle> {
        self.inner
            .context
            .registry()
            .get_schema_by_id(property_type.schema_id())
            .filter(|schema| schema.contains_type(property_type.id()))
            .ok_or_else(|| {
                PropertyStoreError::UnknownType(format!(
                    "'{}' ({}) is not defined by any schema of this model",
                    property_type.name(),
                    property_type.id()
                ))
            })
    }

    /// Add a property of `property_type`, empty when `value` is `None`
    ///
    /// The first property from a schema enrolls the container in it. A type the
    /// container already holds is not added twice: the existing property is returned.
    pub fn add_property(
        &self,
        property_type: &PropertyType,
        value: Option<PropertyValue>,
    ) -> PropertyStoreResult<Property> {
        let schema = self.resolve_schema(property_type)?;

        let value = match value {
            Some(v) if v.kind() != property_type.value_kind() => {
                return Err(PropertyStoreError::ValueKindMismatch {
                    expected: property_type.value_kind(),
                    actual: v.kind(),
                });
            }
            Some(v) => v,
            None => property_type.value_kind().empty_value(),
        };

        if let Some(existing) = self.get_property(property_type) {
            return Ok(existing);
        }

        // stored, then subscribed, then announced: handlers see an enrolled container
        let property = self.store(property_type, value);
        self.subscribe_to(&schema);
        self.emit(&self.inner.property_added, &property);
        Ok(property)
    }

    /// Add a property whose initial value is parsed from text
    pub fn add_property_from_str(
        &self,
        property_type: &PropertyType,
        text: Option<&str>,
    ) -> PropertyStoreResult<Property> {
        let value = PropertyValue::parse(property_type.value_kind(), text)?;
        self.add_property(property_type, Some(value))
    }

    fn store(&self, property_type: &PropertyType, value: PropertyValue) -> Property {
        let property = Property::new(property_type, value);
        self.inner.properties.borrow_mut().push(property.clone());
        self.inner.context.dirty().mark();
        property
    }

    fn insert(&self, property_type: &PropertyType, value: PropertyValue) -> Property {
        let property = self.store(property_type, value);
        self.emit(&self.inner.property_added, &property);
        property
    }

    /// Remove the first property bound to `property_type`
    pub fn remove_property(&self, property_type: &PropertyType) -> bool {
        let removed = {
            let mut properties = self.inner.properties.borrow_mut();
            match properties.iter().position(|p| p.property_type_id == property_type.id()) {
                Some(index) => properties.remove(index),
                None => return false,
            }
        };
        self.inner.context.dirty().mark();

        self.emit(&self.inner.property_removed, &removed);
        true
    }

    /// Remove every property bound to `id`, raising one event per property
    pub fn remove_property_by_id(&self, id: PropertyTypeId) -> bool {
        let removed: Vec<Property> = {
            let mut properties = self.inner.properties.borrow_mut();
            let (gone, kept): (Vec<Property>, Vec<Property>) =
                properties.drain(..).partition(|p| p.property_type_id == id);
            *properties = kept;
            gone
        };
        if removed.is_empty() {
            return false;
        }
        self.inner.context.dirty().mark();

        for property in &removed {
            self.emit(&self.inner.property_removed, property);
        }
        true
    }

    /// Replace the value of the property bound to `property_type`
    ///
    /// Returns `Ok(false)` when the container holds no such property or the
    /// value is unchanged; only an actual change raises `PropertyValueChanged`.
    pub fn set_value(&self, property_type: &PropertyType, value: PropertyValue) -> PropertyStoreResult<bool> {
        if value.kind() != property_type.value_kind() {
            return Err(PropertyStoreError::ValueKindMismatch {
                expected: property_type.value_kind(),
                actual: value.kind(),
            });
        }

        let changed = {
            let mut properties = self.inner.properties.borrow_mut();
            match properties.iter_mut().find(|p| p.property_type_id == property_type.id()) {
                Some(p) if p.value != value => {
                    p.value = value;
                    Some(p.clone())
                }
                _ => None,
            }
        };

        match changed {
            Some(property) => {
                self.inner.context.dirty().mark();
                self.emit(&self.inner.property_value_changed, &property);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parse `text` for the property's kind and store it
    pub fn set_string_value(&self, property_type: &PropertyType, text: Option<&str>) -> PropertyStoreResult<bool> {
        let value = PropertyValue::parse(property_type.value_kind(), text)?;
        self.set_value(property_type, value)
    }

    /// Add an empty property for every type of `schema` not yet present
    pub fn apply_schema(&self, schema: &SchemaHandle) -> usize {
        self.subscribe_to(schema);

        let mut added = 0;
        for pt in schema.property_types() {
            if !self.has_property(&pt) {
                self.insert(&pt, pt.value_kind().empty_value());
                added += 1;
            }
        }
        added
    }

    fn on_property_type_added(&self, schema: &SchemaHandle, property_type: &PropertyType) {
        // an earlier observer may have removed the type again
        if !schema.contains_type(property_type.id()) {
            return;
        }
        if self.has_property(property_type) || !self.is_enrolled(schema.id()) {
            return;
        }
        debug!(
            "Auto-adding property '{}' from schema '{}'",
            property_type.name(),
            schema.name()
        );
        // Plain insert: never adds schema types, so it cannot cascade.
        self.insert(property_type, property_type.value_kind().empty_value());
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    fn emit(&self, event: &Multicast<PropertyEvent>, property: &Property) {
        event.emit(&PropertyEvent {
            container: self.clone(),
            property: property.clone(),
        });
    }

    pub fn subscribe_property_added(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_added.subscribe(handler)
    }

    pub fn unsubscribe_property_added(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_added.unsubscribe(handler)
    }

    pub fn subscribe_property_removed(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_removed.subscribe(handler)
    }

    pub fn unsubscribe_property_removed(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_removed.unsubscribe(handler)
    }

    pub fn subscribe_property_value_changed(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_value_changed.subscribe(handler)
    }

    pub fn unsubscribe_property_value_changed(&self, handler: &Handler<PropertyEvent>) -> bool {
        self.inner.property_value_changed.unsubscribe(handler)
    }
}

impl fmt::Debug for PropertiesContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesContainer")
            .field("properties", &self.inner.properties.borrow())
            .field("subscriptions", &self.inner.subscriptions.borrow())
            .finish()
    }
}

// ============================================================================
// HOST DELEGATION
// ============================================================================

/// Implemented by model elements that embed a container
pub trait PropertiesHost {
    fn properties_container(&self) -> &PropertiesContainer;

    fn properties(&self) -> Vec<Property> {
        self.properties_container().properties()
    }

    fn has_property(&self, property_type: &PropertyType) -> bool {
        self.properties_container().has_property(property_type)
    }

    fn get_property(&self, property_type: &PropertyType) -> Option<Property> {
        self.properties_container().get_property(property_type)
    }

    fn add_property(&self, property_type: &PropertyType, value: Option<PropertyValue>) -> PropertyStoreResult<Property> {
        self.properties_container().add_property(property_type, value)
    }

    fn remove_property(&self, property_type: &PropertyType) -> bool {
        self.properties_container().remove_property(property_type)
    }

    fn set_property_value(&self, property_type: &PropertyType, value: PropertyValue) -> PropertyStoreResult<bool> {
        self.properties_container().set_value(property_type, value)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handler;
    use crate::schema::SchemaOptions;
    use crate::values::ValueKind;
    use rust_decimal::Decimal;
    use std::cell::Cell;

    const NS: &str = "https://example.org/threats";

    fn counter(container: &PropertiesContainer) -> (Rc<Cell<usize>>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let added = Rc::new(Cell::new(0));
        let removed = Rc::new(Cell::new(0));
        let changed = Rc::new(Cell::new(0));

        let (a, r, c) = (Rc::clone(&added), Rc::clone(&removed), Rc::clone(&changed));
        container.subscribe_property_added(&handler(move |_: &PropertyEvent| a.set(a.get() + 1)));
        container.subscribe_property_removed(&handler(move |_: &PropertyEvent| r.set(r.get() + 1)));
        container.subscribe_property_value_changed(&handler(move |_: &PropertyEvent| c.set(c.get() + 1)));

        (added, removed, changed)
    }

    fn setup() -> (ModelContext, SchemaHandle, PropertyType) {
        let context = ModelContext::new();
        let schema = context
            .registry()
            .get_or_create_schema("Review", NS, SchemaOptions::default());
        let owner = schema.add_property_type("Owner", ValueKind::SingleLineString).unwrap();
        (context, schema, owner)
    }

    #[test]
    fn test_add_get_has() {
        let (context, _schema, owner) = setup();
        let container = PropertiesContainer::new(context.clone());
        context.dirty().clear();

        let value = PropertyValue::SingleLineString(Some("alice".to_string()));
        let property = container.add_property(&owner, Some(value.clone())).unwrap();

        assert_eq!(property.value(), &value);
        assert!(container.has_property(&owner));
        assert_eq!(container.get_property(&owner).unwrap().string_value().as_deref(), Some("alice"));
        assert!(context.dirty().is_dirty());
    }

    #[test]
    fn test_add_rejects_foreign_type() {
        let (context, _schema, _owner) = setup();
        let (_other_context, _other_schema, foreign) = setup();
        let container = PropertiesContainer::new(context);

        let result = container.add_property(&foreign, None);
        assert!(matches!(result, Err(PropertyStoreError::UnknownType(_))));
        assert!(container.is_empty());
    }

    #[test]
    fn test_add_rejects_removed_type() {
        let (context, schema, owner) = setup();
        let container = PropertiesContainer::new(context);
        schema.remove_property_type(&owner);

        assert!(matches!(
            container.add_property(&owner, None),
            Err(PropertyStoreError::UnknownType(_))
        ));
    }

    #[test]
    fn test_value_kind_mismatch() {
        let (context, _schema, owner) = setup();
        let container = PropertiesContainer::new(context);

        let result = container.add_property(&owner, Some(PropertyValue::Decimal(Some(Decimal::ONE))));
        assert!(matches!(
            result,
            Err(PropertyStoreError::ValueKindMismatch {
                expected: ValueKind::SingleLineString,
                actual: ValueKind::Decimal,
            })
        ));

        container.add_property(&owner, None).unwrap();
        assert!(container.set_value(&owner, PropertyValue::Boolean(Some(true))).is_err());
    }

    #[test]
    fn test_second_add_returns_existing() {
        let (context, _schema, owner) = setup();
        let container = PropertiesContainer::new(context);
        let (added, _, _) = counter(&container);

        container.add_property_from_str(&owner, Some("alice")).unwrap();
        let again = container.add_property_from_str(&owner, Some("bob")).unwrap();

        assert_eq!(again.string_value().as_deref(), Some("alice"));
        assert_eq!(container.len(), 1);
        assert_eq!(added.get(), 1);
    }

    #[test]
    fn test_events_fire_once_per_change() {
        let (context, _schema, owner) = setup();
        let container = PropertiesContainer::new(context);
        let (added, removed, changed) = counter(&container);

        container.add_property(&owner, None).unwrap();
        assert!(container.set_string_value(&owner, Some("alice")).unwrap());
        assert!(!container.set_string_value(&owner, Some("alice")).unwrap());
        assert!(container.remove_property(&owner));
        assert!(!container.remove_property(&owner));

        assert_eq!((added.get(), removed.get(), changed.get()), (1, 1, 1));
    }

    #[test]
    fn test_set_value_without_property_is_noop() {
        let (context, _schema, owner) = setup();
        let container = PropertiesContainer::new(context);

        let changed = container
            .set_value(&owner, PropertyValue::SingleLineString(Some("x".to_string())))
            .unwrap();
        assert!(!changed);
        assert!(container.is_empty());
    }

    #[test]
    fn test_first_add_subscribes_once() {
        let (context, schema, owner) = setup();
        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();
        let container = PropertiesContainer::new(context);

        container.add_property(&owner, None).unwrap();
        container.add_property(&notes, None).unwrap();

        assert_eq!(container.subscribed_schemas(), vec![schema.id()]);
        assert_eq!(schema.observer_count(), 1);
    }

    #[test]
    fn test_type_added_syncs_enrolled_containers_only() {
        let (context, schema, owner) = setup();
        let enrolled_a = PropertiesContainer::new(context.clone());
        let enrolled_b = PropertiesContainer::new(context.clone());
        let bystander = PropertiesContainer::new(context.clone());

        enrolled_a.add_property(&owner, None).unwrap();
        enrolled_b.add_property(&owner, None).unwrap();

        let (a_added, _, _) = counter(&enrolled_a);
        let (b_added, _, _) = counter(&enrolled_b);
        let (by_added, _, _) = counter(&bystander);

        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();

        assert!(enrolled_a.get_property(&notes).unwrap().is_empty());
        assert!(enrolled_b.has_property(&notes));
        assert!(!bystander.has_property(&notes));
        assert_eq!((a_added.get(), b_added.get(), by_added.get()), (1, 1, 0));
    }

    #[test]
    fn test_type_removed_cascades_to_holders() {
        let (context, schema, owner) = setup();
        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();

        let holder = PropertiesContainer::new(context.clone());
        holder.add_property(&owner, None).unwrap();
        holder.add_property(&notes, None).unwrap();

        let other = PropertiesContainer::new(context.clone());
        other.add_property(&owner, None).unwrap();

        let (_, holder_removed, _) = counter(&holder);
        let (_, other_removed, _) = counter(&other);

        assert!(schema.remove_property_type(&notes));

        assert!(!holder.has_property(&notes));
        assert!(holder.has_property(&owner));
        assert_eq!(holder_removed.get(), 1);
        assert_eq!(other_removed.get(), 0);
    }

    #[test]
    fn test_unenrolled_after_last_removal_stops_auto_add() {
        let (context, schema, owner) = setup();
        let container = PropertiesContainer::new(context);
        container.add_property(&owner, None).unwrap();
        container.remove_property(&owner);

        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();
        assert!(!container.has_property(&notes));
    }

    #[test]
    fn test_remove_by_id_removes_duplicates() {
        let (context, _schema, owner) = setup();
        let stored = vec![
            Property::new(&owner, PropertyValue::SingleLineString(Some("a".to_string()))),
            Property::new(&owner, PropertyValue::SingleLineString(Some("b".to_string()))),
        ];
        let container = PropertiesContainer::restore(context, stored).unwrap();
        let (_, removed, _) = counter(&container);

        assert!(container.remove_property_by_id(owner.id()));
        assert!(container.is_empty());
        assert_eq!(removed.get(), 2);
        assert!(!container.remove_property_by_id(owner.id()));
    }

    #[test]
    fn test_restore_rehydrates_subscriptions() {
        let (context, schema, owner) = setup();
        let original = PropertiesContainer::new(context.clone());
        original
            .add_property_from_str(&owner, Some("alice"))
            .unwrap();

        let json = serde_json::to_string(&original.properties()).unwrap();
        let stored: Vec<Property> = serde_json::from_str(&json).unwrap();
        assert!(stored[0].schema_id().is_none());

        let restored = PropertiesContainer::restore(context, stored).unwrap();
        assert_eq!(restored.get_property(&owner).unwrap().string_value().as_deref(), Some("alice"));
        assert_eq!(restored.subscribed_schemas(), vec![schema.id()]);

        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();
        assert!(restored.has_property(&notes));
        assert!(original.has_property(&notes));
    }

    #[test]
    fn test_rehydrate_skips_unknown_types() {
        let (context, _schema, _owner) = setup();
        let (_other, _other_schema, foreign) = setup();

        let container = PropertiesContainer::restore(context, vec![Property::new(&foreign, PropertyValue::String(None))])
            .unwrap();

        assert_eq!(container.len(), 1);
        assert!(container.subscribed_schemas().is_empty());
        assert!(container.get_property(&foreign).unwrap().schema_id().is_none());
    }

    #[test]
    fn test_restore_rejects_mismatched_kind() {
        let (context, _schema, owner) = setup();
        let stored = vec![Property::new(&owner, PropertyValue::Boolean(Some(true)))];

        let result = PropertiesContainer::restore(context, stored);
        assert!(matches!(
            result,
            Err(PropertyStoreError::ValueKindMismatch {
                expected: ValueKind::SingleLineString,
                actual: ValueKind::Boolean,
            })
        ));
    }

    #[test]
    fn test_type_removed_during_dispatch_is_not_auto_added() {
        let (context, schema, owner) = setup();
        let first = PropertiesContainer::new(context.clone());
        let second = PropertiesContainer::new(context);
        first.add_property(&owner, None).unwrap();
        second.add_property(&owner, None).unwrap();

        let h = {
            let schema = schema.clone();
            handler(move |e: &PropertyEvent| {
                if let Some(notes) = schema.get_property_type("Notes") {
                    if e.property.property_type_id() == notes.id() {
                        schema.remove_property_type(&notes);
                    }
                }
            })
        };
        first.subscribe_property_added(&h);

        let notes = schema.add_property_type("Notes", ValueKind::String).unwrap();

        assert!(!schema.contains_type(notes.id()));
        assert!(!first.has_property(&notes));
        assert!(!second.has_property(&notes));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_drop_unsubscribes_from_schema() {
        let (context, schema, owner) = setup();
        {
            let container = PropertiesContainer::new(context.clone());
            container.add_property(&owner, None).unwrap();
            assert_eq!(schema.observer_count(), 1);
        }
        assert_eq!(schema.observer_count(), 0);

        // no live container left to notify
        schema.add_property_type("Notes", ValueKind::String).unwrap();
    }

    #[test]
    fn test_handler_may_read_container_during_dispatch() {
        let (context, schema, owner) = setup();
        let container = PropertiesContainer::new(context);
        container.add_property(&owner, None).unwrap();

        let seen = Rc::new(Cell::new(0));
        let h = {
            let seen = Rc::clone(&seen);
            handler(move |e: &PropertyEvent| seen.set(e.container.len()))
        };
        container.subscribe_property_added(&h);

        schema.add_property_type("Notes", ValueKind::String).unwrap();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_handler_may_extend_schema_during_dispatch() {
        let (context, schema, owner) = setup();
        let container = PropertiesContainer::new(context);

        let h = {
            let schema = schema.clone();
            handler(move |e: &PropertyEvent| {
                if e.container.len() == 1 {
                    schema.add_property_type("Follow Up", ValueKind::Boolean).unwrap();
                }
            })
        };
        container.subscribe_property_added(&h);

        container.add_property(&owner, None).unwrap();

        assert_eq!(container.len(), 2);
        assert!(container.has_property(&schema.get_property_type("Follow Up").unwrap()));
    }

    #[test]
    fn test_apply_schema_fills_missing_types() {
        let (context, schema, owner) = setup();
        schema.add_property_type("Notes", ValueKind::String).unwrap();
        let container = PropertiesContainer::new(context);
        container.add_property_from_str(&owner, Some("alice")).unwrap();

        assert_eq!(container.apply_schema(&schema), 1);
        assert_eq!(container.apply_schema(&schema), 0);
        assert_eq!(container.len(), 2);
        assert!(container.is_enrolled(schema.id()));
    }
}
