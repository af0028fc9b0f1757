// 🔌 Extensions - lookup of loaded extensions by id
//
// Discovery and loading happen in the host. The property store only ever
// stores extension ids; resolving them goes through an `ExtensionRegistry`.

pub mod residual_risk;

pub use residual_risk::{EstimatorParameter, ResidualRiskEstimatorConfig};

use std::collections::HashMap;
use std::rc::Rc;

pub trait Extension {
    /// Stable identifier persisted in property values
    fn extension_id(&self) -> &str;

    fn label(&self) -> &str;
}

/// An extension that estimates residual risk after mitigations
pub trait ResidualRiskEstimator: Extension {
    /// Parameters understood by this estimator, with their default values
    fn default_parameters(&self) -> Vec<EstimatorParameter>;
}

/// Loaded extensions of one kind, keyed by extension id
pub struct ExtensionRegistry<T: ?Sized> {
    extensions: HashMap<String, Rc<T>>,
}

impl<T: ?Sized + Extension> ExtensionRegistry<T> {
    pub fn new() -> Self {
        ExtensionRegistry {
            extensions: HashMap::new(),
        }
    }

    /// Register an extension, returning the one previously registered under the same id
    pub fn register(&mut self, extension: Rc<T>) -> Option<Rc<T>> {
        self.extensions
            .insert(extension.extension_id().to_string(), extension)
    }

    pub fn get(&self, id: &str) -> Option<Rc<T>> {
        self.extensions.get(id).cloned()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.extensions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl<T: ?Sized + Extension> Default for ExtensionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedEstimator {
        pub id: &'static str,
    }

    impl Extension for FixedEstimator {
        fn extension_id(&self) -> &str {
            self.id
        }

        fn label(&self) -> &str {
            "Fixed Estimator"
        }
    }

    impl ResidualRiskEstimator for FixedEstimator {
        fn default_parameters(&self) -> Vec<EstimatorParameter> {
            vec![EstimatorParameter::new("Weight", 1.0)]
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry: ExtensionRegistry<dyn ResidualRiskEstimator> = ExtensionRegistry::new();
        assert!(registry.register(Rc::new(FixedEstimator { id: "EST-2" })).is_none());
        assert!(registry.register(Rc::new(FixedEstimator { id: "EST-1" })).is_none());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["EST-1", "EST-2"]);
        assert_eq!(registry.get("EST-1").unwrap().extension_id(), "EST-1");
        assert!(registry.get("EST-9").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry: ExtensionRegistry<dyn ResidualRiskEstimator> = ExtensionRegistry::new();
        registry.register(Rc::new(FixedEstimator { id: "EST-1" }));
        let previous = registry.register(Rc::new(FixedEstimator { id: "EST-1" }));

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }
}
