// Threat Props - schema-driven dynamic property store
// Exposes the store for the CLI, extensions, and tests

pub mod errors;
pub mod values;
pub mod property_type;
pub mod events;
pub mod schema;
pub mod registry;
pub mod context;
pub mod container;
pub mod model;
pub mod extensions;
pub mod store;

// Re-export commonly used types
pub use errors::{PropertyStoreError, PropertyStoreResult};
pub use values::{PropertyValue, ValueKind};
pub use property_type::{PropertyType, PropertyTypeId};
pub use events::{handler, Handler, Multicast, PropertyEvent, SchemaEvent};
pub use schema::{PropertySchema, SchemaHandle, SchemaId, SchemaOptions, Scope};
pub use registry::SchemaRegistry;
pub use context::{DirtyFlag, ModelContext};
pub use container::{PropertiesContainer, PropertiesHost, Property};
pub use model::{Entity, EntityKind, EntitySnapshot, Model, ModelSnapshot};
pub use extensions::{
    EstimatorParameter, Extension, ExtensionRegistry, ResidualRiskEstimator,
    ResidualRiskEstimatorConfig,
};
pub use store::{
    setup_database, save_model, load_latest_model, list_revisions, list_model_ids,
    Revision, SaveOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Namespace of the schemas this crate provisions itself
pub const DEFAULT_NAMESPACE: &str = "https://threat-props.dev/extensions";
