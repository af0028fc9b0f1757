// 📊 Residual Risk Estimator Configuration
//
// Typed accessors over three hidden property types of one system schema,
// stored on the threat model itself. Schema and types are provisioned on
// first use.

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::container::PropertiesHost;
use crate::errors::{PropertyStoreError, PropertyStoreResult};
use crate::extensions::{Extension, ExtensionRegistry};
use crate::model::Model;
use crate::property_type::PropertyType;
use crate::schema::{SchemaHandle, SchemaOptions, Scope};
use crate::values::{PropertyValue, ValueKind};
use crate::DEFAULT_NAMESPACE;

pub const SCHEMA_NAME: &str = "Residual Risk Estimator Configuration";
pub const SELECTED_ESTIMATOR: &str = "Selected Estimator";
pub const ESTIMATOR_PARAMETERS: &str = "Estimator Parameters";
pub const INFINITE_CAP: &str = "Infinite Cap";

/// Returned by `infinite_cap` when no cap has been stored
pub const UNSET_CAP: Decimal = Decimal::NEGATIVE_ONE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParameter {
    pub name: String,
    pub value: f64,
}

impl EstimatorParameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        EstimatorParameter {
            name: name.into(),
            value,
        }
    }
}

/// Blob stored in the parameters property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EstimatorConfiguration {
    #[serde(default)]
    parameters: Vec<EstimatorParameter>,
}

pub struct ResidualRiskEstimatorConfig<'a> {
    model: &'a Model,
    namespace: String,
}

impl<'a> ResidualRiskEstimatorConfig<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self::with_namespace(model, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(model: &'a Model, namespace: impl Into<String>) -> Self {
        ResidualRiskEstimatorConfig {
            model,
            namespace: namespace.into(),
        }
    }

    pub fn schema(&self) -> SchemaHandle {
        self.model.get_or_create_schema(
            SCHEMA_NAME,
            &self.namespace,
            SchemaOptions::default()
                .with_scope(Scope::ThreatModel)
                .with_auto_apply(false)
                .with_priority(100)
                .with_visible(false)
                .with_system(true)
                .with_description("Configuration of the Residual Risk Estimator selected for the Threat Model"),
        )
    }

    fn property_type(&self, name: &str, kind: ValueKind, description: &str) -> PropertyStoreResult<PropertyType> {
        let schema = self.schema();
        if let Some(existing) = schema.get_property_type(name) {
            return Ok(existing);
        }

        let created = schema.add_property_type(name, kind)?;
        schema.set_property_type_visible(created.id(), false);
        schema.set_property_type_description(created.id(), description);
        Ok(schema.get_property_type_by_id(created.id()).unwrap_or(created))
    }

    pub fn selected_estimator_property_type(&self) -> PropertyStoreResult<PropertyType> {
        self.property_type(
            SELECTED_ESTIMATOR,
            ValueKind::SingleLineString,
            "Extension Id of the Selected Residual Risk Estimator",
        )
    }

    pub fn parameters_property_type(&self) -> PropertyStoreResult<PropertyType> {
        self.property_type(
            ESTIMATOR_PARAMETERS,
            ValueKind::Json,
            "Parameters of the Selected Residual Risk Estimator",
        )
    }

    pub fn infinite_cap_property_type(&self) -> PropertyStoreResult<PropertyType> {
        self.property_type(
            INFINITE_CAP,
            ValueKind::Decimal,
            "Infinite Cap for the selected Residual Risk Estimator",
        )
    }

    // ========================================================================
    // SELECTED ESTIMATOR
    // ========================================================================

    pub fn selected_estimator_id(&self) -> Option<String> {
        let pt = self.selected_estimator_property_type().ok()?;
        self.model
            .get_property(&pt)?
            .value()
            .as_text()
            .map(String::from)
    }

    /// Store the selected extension id; `None` clears the value but keeps the property
    pub fn set_selected_estimator_id(&self, id: Option<&str>) -> PropertyStoreResult<()> {
        let pt = self.selected_estimator_property_type()?;
        let value = PropertyValue::SingleLineString(id.map(String::from));

        if self.model.has_property(&pt) {
            self.model.set_property_value(&pt, value)?;
        } else if id.is_some() {
            self.model.add_property(&pt, Some(value))?;
        }
        Ok(())
    }

    /// Resolve the stored id against the loaded extensions
    pub fn selected_estimator<T>(&self, extensions: &ExtensionRegistry<T>) -> Option<Rc<T>>
    where
        T: ?Sized + Extension,
    {
        extensions.get(&self.selected_estimator_id()?)
    }

    pub fn set_selected_estimator(&self, estimator: Option<&dyn Extension>) -> PropertyStoreResult<()> {
        self.set_selected_estimator_id(estimator.map(|e| e.extension_id()))
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    pub fn parameters(&self) -> Option<Vec<EstimatorParameter>> {
        let pt = self.parameters_property_type().ok()?;
        let property = self.model.get_property(&pt)?;
        let blob = property.value().as_json()?;

        match serde_json::from_value::<EstimatorConfiguration>(blob.clone()) {
            Ok(config) => Some(config.parameters),
            Err(e) => {
                warn!("Unreadable estimator parameters: {}", e);
                None
            }
        }
    }

    /// Store a copy of `parameters`; `None` clears the value but keeps the property
    ///
    /// Non-finite values have no JSON form and are rejected.
    pub fn set_parameters(&self, parameters: Option<&[EstimatorParameter]>) -> PropertyStoreResult<()> {
        if let Some(bad) = parameters.into_iter().flatten().find(|p| !p.value.is_finite()) {
            return Err(PropertyStoreError::InvalidValue {
                kind: ValueKind::Json,
                value: format!("{} = {}", bad.name, bad.value),
                reason: "estimator parameters must be finite numbers".to_string(),
            });
        }

        let pt = self.parameters_property_type()?;

        let blob = match parameters {
            Some(list) => Some(serde_json::to_value(EstimatorConfiguration {
                parameters: list.to_vec(),
            })?),
            None => None,
        };

        if self.model.has_property(&pt) {
            self.model.set_property_value(&pt, PropertyValue::Json(blob))?;
        } else if blob.is_some() {
            self.model.add_property(&pt, Some(PropertyValue::Json(blob)))?;
        }
        Ok(())
    }

    // ========================================================================
    // INFINITE CAP
    // ========================================================================

    /// Stored cap, or `UNSET_CAP` when there is none
    pub fn infinite_cap(&self) -> Decimal {
        self.infinite_cap_property_type()
            .ok()
            .and_then(|pt| self.model.get_property(&pt))
            .and_then(|p| p.value().as_decimal())
            .unwrap_or(UNSET_CAP)
    }

    pub fn set_infinite_cap(&self, cap: Decimal) -> PropertyStoreResult<()> {
        let pt = self.infinite_cap_property_type()?;
        let value = PropertyValue::Decimal(Some(cap));

        if self.model.has_property(&pt) {
            self.model.set_property_value(&pt, value)?;
        } else {
            self.model.add_property(&pt, Some(value))?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
