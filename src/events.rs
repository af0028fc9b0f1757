// 📣 Events - synchronous multicast with idempotent subscription
//
// Dispatch iterates over a snapshot of the handler list, so a handler may
// subscribe or unsubscribe (itself or others) while an event is in flight.

use std::cell::RefCell;
use std::rc::Rc;

use crate::container::{PropertiesContainer, Property};
use crate::property_type::PropertyType;
use crate::schema::SchemaHandle;

pub type Handler<E> = Rc<dyn Fn(&E)>;

/// Build a handler from a closure
pub fn handler<E, F>(f: F) -> Handler<E>
where
    F: Fn(&E) + 'static,
{
    Rc::new(f)
}

fn same_handler<E>(a: &Handler<E>, b: &Handler<E>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Ordered list of handlers for one event
pub struct Multicast<E> {
    handlers: RefCell<Vec<Handler<E>>>,
}

impl<E> Multicast<E> {
    pub fn new() -> Self {
        Multicast {
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Returns false when the same handler is already registered
    pub fn subscribe(&self, handler: &Handler<E>) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        if handlers.iter().any(|h| same_handler(h, handler)) {
            return false;
        }
        handlers.push(Rc::clone(handler));
        true
    }

    pub fn unsubscribe(&self, handler: &Handler<E>) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|h| !same_handler(h, handler));
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self.handlers.borrow().clone();
        for h in snapshot {
            h(event);
        }
    }
}

impl<E> Default for Multicast<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

/// A property type was added to or removed from a schema
#[derive(Clone)]
pub struct SchemaEvent {
    pub schema: SchemaHandle,
    pub property_type: PropertyType,
}

/// A property was added, removed or changed inside a container
#[derive(Clone)]
pub struct PropertyEvent {
    pub container: PropertiesContainer,
    pub property: Property,
}
