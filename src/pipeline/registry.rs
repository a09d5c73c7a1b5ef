//! Estimator registry: stable string keys to factories
//!
//! Every component is registered once with its capability type, its
//! factory and a translation table from domain parameter names (what
//! experiment definitions use) to implementation parameter names (what
//! [`Estimator::set_param`] accepts).
//!
//! Lookups that fail are soft: they are logged and yield `None`.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{
    ComponentType, Estimator, MajorityClassifier, MeanRegressor, Pipeline, StandardScaler, Step,
};

/// Factory producing a fresh, unfitted estimator.
pub type Factory = Rc<dyn Fn() -> Box<dyn Estimator>>;

/// Registration of one component.
#[derive(Clone)]
pub struct ComponentSpec {
    key: String,
    component_type: ComponentType,
    parameters: IndexMap<String, String>,
    factory: Factory,
}

impl ComponentSpec {
    /// Register `key` with its type and factory.
    pub fn new(
        key: impl Into<String>,
        component_type: ComponentType,
        factory: impl Fn() -> Box<dyn Estimator> + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            component_type,
            parameters: IndexMap::new(),
            factory: Rc::new(factory),
        }
    }

    /// Declare a parameter and its implementation name.
    #[must_use]
    pub fn param(mut self, domain: impl Into<String>, implementation: impl Into<String>) -> Self {
        self.parameters.insert(domain.into(), implementation.into());
        self
    }

    /// Registry key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Capability type.
    #[must_use]
    pub const fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Implementation name of a domain parameter.
    #[must_use]
    pub fn implementation_name(&self, domain: &str) -> Option<&str> {
        self.parameters.get(domain).map(String::as_str)
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("key", &self.key)
            .field("component_type", &self.component_type)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Instance-owned registry of components.
#[derive(Debug, Clone, Default)]
pub struct EstimatorRegistry {
    components: IndexMap<String, ComponentSpec>,
}

impl EstimatorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the reference estimators.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            ComponentSpec::new("standard_scaler", ComponentType::Transformation, || {
                Box::new(StandardScaler::default())
            })
            .param("center", "with_mean")
            .param("scale", "with_std"),
        );
        registry.register(
            ComponentSpec::new("mean_regressor", ComponentType::Regression, || {
                Box::new(MeanRegressor::default())
            })
            .param("shrinkage", "alpha"),
        );
        registry.register(
            ComponentSpec::new("majority_classifier", ComponentType::Classification, || {
                Box::new(MajorityClassifier::default())
            })
            .param("tie_break", "tie_breaker"),
        );
        registry
    }

    /// Add (or replace) a component.
    pub fn register(&mut self, spec: ComponentSpec) {
        self.components.insert(spec.key.clone(), spec);
    }

    /// Registered keys in registration order.
    pub fn estimators(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Registration of `name`.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }

    /// Domain parameter names accepted by `name`.
    #[must_use]
    pub fn estimator_params(&self, name: &str) -> Option<Vec<&str>> {
        self.components
            .get(name)
            .map(|spec| spec.parameters.keys().map(String::as_str).collect())
    }

    /// Fresh estimator for `name`.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn Estimator>> {
        let Some(spec) = self.components.get(name) else {
            tracing::error!(estimator = name, "estimator not found in registry");
            return None;
        };
        Some((spec.factory)())
    }

    /// Apply domain-named `values` to `estimator`.
    ///
    /// Unknown parameters and rejected values are logged and skipped.
    /// Returns the number of parameters applied.
    pub fn set_parameters(
        &self,
        estimator: &mut dyn Estimator,
        name: &str,
        values: &Map<String, Value>,
    ) -> usize {
        let Some(spec) = self.components.get(name) else {
            tracing::error!(estimator = name, "estimator not found in registry");
            return 0;
        };

        let mut applied = 0;
        for (param, value) in values {
            let Some(implementation) = spec.implementation_name(param) else {
                tracing::warn!(estimator = name, param = param.as_str(), "unknown parameter, skipped");
                continue;
            };
            match estimator.set_param(implementation, value) {
                Ok(()) => applied += 1,
                Err(err) => {
                    tracing::warn!(estimator = name, param = param.as_str(), %err, "parameter rejected");
                }
            }
        }
        applied
    }

    /// Translate `{estimator: {domain_param: value}}` to implementation names.
    ///
    /// Unknown estimators and parameters are dropped. Returns `None` if
    /// nothing survives.
    #[must_use]
    pub fn validate_parameters(&self, parameters: &Map<String, Value>) -> Option<Map<String, Value>> {
        let mut validated = Map::new();

        for (estimator, params) in parameters {
            let Some(spec) = self.components.get(estimator) else {
                tracing::error!(estimator = estimator.as_str(), "estimator not found in registry");
                continue;
            };
            let Value::Object(params) = params else {
                tracing::error!(estimator = estimator.as_str(), "parameters must be a mapping");
                continue;
            };

            let translated: Map<String, Value> = params
                .iter()
                .filter_map(|(param, value)| match spec.implementation_name(param) {
                    Some(implementation) => Some((implementation.to_string(), value.clone())),
                    None => {
                        tracing::error!(
                            estimator = estimator.as_str(),
                            param = param.as_str(),
                            "unknown parameter"
                        );
                        None
                    }
                })
                .collect();

            if !translated.is_empty() {
                validated.insert(estimator.clone(), Value::Object(translated));
            }
        }

        (!validated.is_empty()).then_some(validated)
    }

    /// Build and validate a pipeline whose steps are named after their components.
    ///
    /// `parameters` holds fixed domain-named values per component. Returns
    /// `None` (after logging) for unknown components or an invalid pipeline.
    #[must_use]
    pub fn create_pipeline(
        &self,
        names: &[&str],
        parameters: Option<&Map<String, Value>>,
    ) -> Option<Pipeline> {
        let mut pipeline = Pipeline::new();

        for &name in names {
            let spec = self.components.get(name);
            let (Some(spec), Some(mut estimator)) = (spec, self.create(name)) else {
                return None;
            };
            if let Some(Value::Object(values)) = parameters.and_then(|p| p.get(name)) {
                self.set_parameters(estimator.as_mut(), name, values);
            }
            pipeline = pipeline.with_step(Step::new(name, name, spec.component_type, estimator));
        }

        if let Err(reason) = pipeline.validate() {
            tracing::error!(%reason, "invalid pipeline");
            return None;
        }
        Some(pipeline)
    }
}
