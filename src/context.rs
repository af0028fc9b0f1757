// Change tracking and the shared model context handed to every container.

use std::cell::Cell;
use std::rc::Rc;

use crate::registry::SchemaRegistry;

/// Document-level "has unsaved changes" flag
///
/// Clones share the same flag. Containers and schemas mark it explicitly on
/// every mutation; the owner clears it after saving.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Rc<Cell<bool>>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.get()
    }

    pub fn clear(&self) {
        self.0.set(false);
    }
}

/// What a container needs from its owning model: schema lookup and change tracking
#[derive(Debug, Clone)]
pub struct ModelContext {
    registry: SchemaRegistry,
    dirty: DirtyFlag,
}

impl ModelContext {
    pub fn new() -> Self {
        let dirty = DirtyFlag::new();
        ModelContext {
            registry: SchemaRegistry::new(dirty.clone()),
            dirty,
        }
    }

    pub(crate) fn from_parts(registry: SchemaRegistry, dirty: DirtyFlag) -> Self {
        ModelContext { registry, dirty }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dirty(&self) -> &DirtyFlag {
        &self.dirty
    }
}

impl Default for ModelContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_flag_is_shared_between_clones() {
        let flag = DirtyFlag::new();
        let other = flag.clone();

        other.mark();
        assert!(flag.is_dirty());

        flag.clear();
        assert!(!other.is_dirty());
    }

    #[test]
    fn test_context_registry_uses_context_flag() {
        let context = ModelContext::new();
        context.registry().get_or_create_schema("S", "ns", Default::default());
        assert!(context.dirty().is_dirty());
    }
}
