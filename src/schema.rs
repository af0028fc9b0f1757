// 📐 Schema Layer - mutable, namespaced sets of property types
// Schemas only notify on change; containers decide what to do about it.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

use crate::context::DirtyFlag;
use crate::errors::{PropertyStoreError, PropertyStoreResult};
use crate::events::{Handler, Multicast, SchemaEvent};
use crate::property_type::{PropertyType, PropertyTypeId};
use crate::values::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Uuid);

impl SchemaId {
    pub fn new() -> Self {
        SchemaId(Uuid::new_v4())
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SCOPE
// ============================================================================

/// Which model elements a schema applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    ThreatModel,
    ExternalInteractor,
    Process,
    DataStore,
    /// Any external interactor, process or data store
    Entity,
    DataFlow,
    Any,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::ThreatModel => "Threat Model",
            Scope::ExternalInteractor => "External Interactor",
            Scope::Process => "Process",
            Scope::DataStore => "Data Store",
            Scope::Entity => "Entity",
            Scope::DataFlow => "Data Flow",
            Scope::Any => "Any",
        }
    }

    /// Whether an element of kind `target` falls inside this scope
    pub fn covers(&self, target: Scope) -> bool {
        match self {
            Scope::Any => true,
            Scope::Entity => matches!(
                target,
                Scope::Entity | Scope::ExternalInteractor | Scope::Process | Scope::DataStore
            ),
            other => *other == target,
        }
    }
}

// ============================================================================
// SCHEMA OPTIONS
// ============================================================================

/// Defaults applied when a schema is first created
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    pub applies_to: Scope,
    pub auto_apply: bool,
    pub priority: i32,
    pub visible: bool,
    pub system: bool,
    pub description: String,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions {
            applies_to: Scope::Any,
            auto_apply: false,
            priority: 10,
            visible: true,
            system: false,
            description: String::new(),
        }
    }
}

impl SchemaOptions {
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.applies_to = scope;
        self
    }

    pub fn with_auto_apply(mut self, auto_apply: bool) -> Self {
        self.auto_apply = auto_apply;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

// ============================================================================
// PERSISTED SCHEMA
// ============================================================================

/// Serializable state of a schema, property types included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub id: SchemaId,
    pub name: String,
    pub namespace: String,
    pub applies_to: Scope,
    pub auto_apply: bool,
    pub priority: i32,
    pub visible: bool,
    pub system: bool,
    pub description: String,
    #[serde(default)]
    pub property_types: Vec<PropertyType>,
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, options: SchemaOptions) -> Self {
        PropertySchema {
            id: SchemaId::new(),
            name: name.into(),
            namespace: namespace.into(),
            applies_to: options.applies_to,
            auto_apply: options.auto_apply,
            priority: options.priority,
            visible: options.visible,
            system: options.system,
            description: options.description,
            property_types: Vec::new(),
        }
    }
}

// ============================================================================
// OBSERVERS
// ============================================================================

/// Internal listener for schema changes, held weakly by the schema
pub(crate) trait SchemaObserver {
    fn property_type_added(&self, schema: &SchemaHandle, property_type: &PropertyType);
    fn property_type_removed(&self, schema: &SchemaHandle, property_type: &PropertyType);
}

fn observer_addr(observer: &Weak<dyn SchemaObserver>) -> *const () {
    Weak::as_ptr(observer) as *const ()
}

// ============================================================================
// LIVE SCHEMA
// ============================================================================

struct SchemaState {
    data: RefCell<PropertySchema>,
    observers: RefCell<Vec<Weak<dyn SchemaObserver>>>,
    type_added: Multicast<SchemaEvent>,
    type_removed: Multicast<SchemaEvent>,
    dirty: DirtyFlag,
}

/// Shared handle to a live schema
///
/// Clones refer to the same schema. The registry owns one handle per schema
/// for the lifetime of the model.
#[derive(Clone)]
pub struct SchemaHandle {
    inner: Rc<SchemaState>,
}

impl SchemaHandle {
    pub(crate) fn from_record(record: PropertySchema, dirty: DirtyFlag) -> Self {
        SchemaHandle {
            inner: Rc::new(SchemaState {
                data: RefCell::new(record),
                observers: RefCell::new(Vec::new()),
                type_added: Multicast::new(),
                type_removed: Multicast::new(),
                dirty,
            }),
        }
    }

    pub fn id(&self) -> SchemaId {
        self.inner.data.borrow().id
    }

    pub fn name(&self) -> String {
        self.inner.data.borrow().name.clone()
    }

    pub fn namespace(&self) -> String {
        self.inner.data.borrow().namespace.clone()
    }

    pub fn applies_to(&self) -> Scope {
        self.inner.data.borrow().applies_to
    }

    pub fn auto_apply(&self) -> bool {
        self.inner.data.borrow().auto_apply
    }

    pub fn priority(&self) -> i32 {
        self.inner.data.borrow().priority
    }

    pub fn visible(&self) -> bool {
        self.inner.data.borrow().visible
    }

    pub fn system(&self) -> bool {
        self.inner.data.borrow().system
    }

    pub fn description(&self) -> String {
        self.inner.data.borrow().description.clone()
    }

    pub(crate) fn matches_key(&self, name: &str, namespace: &str) -> bool {
        let data = self.inner.data.borrow();
        data.name == name && data.namespace == namespace
    }

    pub fn ptr_eq(&self, other: &SchemaHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of the persisted state
    pub fn to_record(&self) -> PropertySchema {
        self.inner.data.borrow().clone()
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut PropertySchema),
    {
        f(&mut *self.inner.data.borrow_mut());
        self.inner.dirty.mark();
    }

    pub fn set_applies_to(&self, scope: Scope) {
        self.update(|s| s.applies_to = scope);
    }

    pub fn set_auto_apply(&self, auto_apply: bool) {
        self.update(|s| s.auto_apply = auto_apply);
    }

    pub fn set_priority(&self, priority: i32) {
        self.update(|s| s.priority = priority);
    }

    pub fn set_visible(&self, visible: bool) {
        self.update(|s| s.visible = visible);
    }

    pub fn set_system(&self, system: bool) {
        self.update(|s| s.system = system);
    }

    pub fn set_description(&self, desc: impl Into<String>) {
        let desc = desc.into();
        self.update(|s| s.description = desc);
    }

    // ========================================================================
    // PROPERTY TYPES
    // ========================================================================

    pub fn property_types(&self) -> Vec<PropertyType> {
        self.inner.data.borrow().property_types.clone()
    }

    pub fn get_property_type(&self, name: &str) -> Option<PropertyType> {
        self.inner
            .data
            .borrow()
            .property_types
            .iter()
            .find(|pt| pt.name() == name)
            .cloned()
    }

    pub fn get_property_type_by_id(&self, id: PropertyTypeId) -> Option<PropertyType> {
        self.inner
            .data
            .borrow()
            .property_types
            .iter()
            .find(|pt| pt.id() == id)
            .cloned()
    }

    pub fn contains_type(&self, id: PropertyTypeId) -> bool {
        self.inner
            .data
            .borrow()
            .property_types
            .iter()
            .any(|pt| pt.id() == id)
    }

    /// Define a new property type and notify subscribers
    pub fn add_property_type(&self, name: &str, value_kind: ValueKind) -> PropertyStoreResult<PropertyType> {
        let property_type = {
            let mut data = self.inner.data.borrow_mut();
            if data.property_types.iter().any(|pt| pt.name() == name) {
                return Err(PropertyStoreError::DuplicateName {
                    schema: data.name.clone(),
                    name: name.to_string(),
                });
            }

            let pt = PropertyType::new(data.id, name, value_kind);
            data.property_types.push(pt.clone());
            pt
        };
        self.inner.dirty.mark();

        info!("Schema '{}': added property type '{}' ({})", self.name(), name, value_kind);
        self.notify(&property_type, true);

        Ok(property_type)
    }

    /// Remove a property type and notify subscribers
    ///
    /// No cascade happens here: subscribed containers drop their own properties.
    pub fn remove_property_type(&self, property_type: &PropertyType) -> bool {
        self.remove_property_type_by_id(property_type.id())
    }

    pub fn remove_property_type_by_id(&self, id: PropertyTypeId) -> bool {
        let removed = {
            let mut data = self.inner.data.borrow_mut();
            match data.property_types.iter().position(|pt| pt.id() == id) {
                Some(index) => data.property_types.remove(index),
                None => return false,
            }
        };
        self.inner.dirty.mark();

        info!("Schema '{}': removed property type '{}'", self.name(), removed.name());
        self.notify(&removed, false);

        true
    }

    fn update_property_type<F>(&self, id: PropertyTypeId, f: F) -> bool
    where
        F: FnOnce(&mut PropertyType),
    {
        let found = {
            let mut data = self.inner.data.borrow_mut();
            match data.property_types.iter_mut().find(|pt| pt.id() == id) {
                Some(pt) => {
                    f(pt);
                    true
                }
                None => false,
            }
        };
        if found {
            self.inner.dirty.mark();
        }
        found
    }

    pub fn set_property_type_visible(&self, id: PropertyTypeId, visible: bool) -> bool {
        self.update_property_type(id, |pt| pt.visible = visible)
    }

    pub fn set_property_type_description(&self, id: PropertyTypeId, desc: impl Into<String>) -> bool {
        let desc = desc.into();
        self.update_property_type(id, |pt| pt.description = desc)
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_type_added(&self, handler: &Handler<SchemaEvent>) -> bool {
        self.inner.type_added.subscribe(handler)
    }

    pub fn unsubscribe_type_added(&self, handler: &Handler<SchemaEvent>) -> bool {
        self.inner.type_added.unsubscribe(handler)
    }

    pub fn subscribe_type_removed(&self, handler: &Handler<SchemaEvent>) -> bool {
        self.inner.type_removed.subscribe(handler)
    }

    pub fn unsubscribe_type_removed(&self, handler: &Handler<SchemaEvent>) -> bool {
        self.inner.type_removed.unsubscribe(handler)
    }

    pub(crate) fn add_observer(&self, observer: Weak<dyn SchemaObserver>) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|o| o.strong_count() > 0);

        let addr = observer_addr(&observer);
        if observers.iter().any(|o| observer_addr(o) == addr) {
            return false;
        }
        observers.push(observer);
        debug!("Schema '{}': observer added ({} total)", self.inner.data.borrow().name, observers.len());
        true
    }

    pub(crate) fn remove_observer(&self, addr: *const ()) -> bool {
        // Called from Drop; tolerate an in-flight borrow instead of panicking.
        let mut observers = match self.inner.observers.try_borrow_mut() {
            Ok(o) => o,
            Err(_) => return false,
        };
        let before = observers.len();
        observers.retain(|o| observer_addr(o) != addr && o.strong_count() > 0);
        observers.len() != before
    }

    /// Number of live container subscriptions
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    fn notify(&self, property_type: &PropertyType, added: bool) {
        let observers: Vec<Rc<dyn SchemaObserver>> = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in observers {
            if added {
                observer.property_type_added(self, property_type);
            } else {
                observer.property_type_removed(self, property_type);
            }
        }

        let event = SchemaEvent {
            schema: self.clone(),
            property_type: property_type.clone(),
        };
        if added {
            self.inner.type_added.emit(&event);
        } else {
            self.inner.type_removed.emit(&event);
        }
    }
}

impl fmt::Debug for SchemaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.data.borrow();
        f.debug_struct("SchemaHandle")
            .field("id", &data.id)
            .field("name", &data.name)
            .field("namespace", &data.namespace)
            .field("property_types", &data.property_types.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
