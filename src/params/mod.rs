//! Hyperparameter specifications and grid search
//!
//! ```text
//! ParameterMap ──get_for(component)──> ParameterSource ──resolve──> Map
//!                                                                   │
//!                                                     Grid::expand ─┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use trueno_exp::params::{GridSearch, ParameterMap};
//!
//! let mut map = ParameterMap::new();
//! map.insert("clf", json!({"C": [0.1, 0.2], "kernel": ["rbf", "linear"]}));
//!
//! let search = GridSearch::for_component("clf", &map).unwrap();
//! assert_eq!(search.grid().len(), 4);
//! assert!(search.is_branching());
//! ```

mod grid;

pub use grid::{Combination, Grid, GridIter};

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Parameter spec for one component: either a literal or a deferred producer.
#[derive(Clone)]
pub enum ParameterSource {
    /// Literal specification; must be a JSON object to resolve.
    Literal(Value),
    /// Zero-argument producer evaluated at resolution time.
    Lazy(Rc<dyn Fn() -> Value>),
}

impl ParameterSource {
    /// Wrap a closure as a lazily resolved spec.
    pub fn lazy(producer: impl Fn() -> Value + 'static) -> Self {
        Self::Lazy(Rc::new(producer))
    }

    /// Resolve to a concrete mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the resolved value is not a mapping.
    /// This is a fatal configuration error, not a soft failure.
    pub fn resolve(&self, component: &str) -> Result<Map<String, Value>> {
        let value = match self {
            Self::Literal(value) => value.clone(),
            Self::Lazy(producer) => producer(),
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(Error::Precondition(format!(
                "parameters for component '{component}' must resolve to a mapping, got {}",
                json_type(&other)
            ))),
        }
    }
}

impl fmt::Debug for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(<fn>)"),
        }
    }
}

impl From<Value> for ParameterSource {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<Map<String, Value>> for ParameterSource {
    fn from(map: Map<String, Value>) -> Self {
        Self::Literal(Value::Object(map))
    }
}

/// Hyperparameter specs keyed by component identity (pipeline step name).
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    entries: IndexMap<String, ParameterSource>,
}

impl ParameterMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from a JSON object `{component: {param: [values]}}`.
    ///
    /// Non-object inputs produce an empty map.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let mut map = Self::new();
        if let Value::Object(components) = value {
            for (component, spec) in components {
                map.insert(component.clone(), spec.clone());
            }
        }
        map
    }

    /// Register (or replace) the spec for a component.
    pub fn insert(&mut self, component: impl Into<String>, source: impl Into<ParameterSource>) {
        self.entries.insert(component.into(), source.into());
    }

    /// Spec registered for `component`, or an empty mapping.
    ///
    /// Unknown components are not an error.
    #[must_use]
    pub fn get_for(&self, component: &str) -> ParameterSource {
        self.entries.get(component).cloned().unwrap_or_else(|| {
            tracing::info!(component, "no parameters registered, using defaults");
            ParameterSource::Literal(Value::Object(Map::new()))
        })
    }

    /// True if a spec is registered for `component`.
    #[must_use]
    pub fn contains(&self, component: &str) -> bool {
        self.entries.contains_key(component)
    }

    /// Registered component identities in insertion order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot as `{component: spec}`. Lazy specs are evaluated.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let snapshot = self
            .entries
            .iter()
            .map(|(component, source)| {
                let spec = match source {
                    ParameterSource::Literal(value) => value.clone(),
                    ParameterSource::Lazy(producer) => producer(),
                };
                (component.clone(), spec)
            })
            .collect();
        Value::Object(snapshot)
    }

    /// Merge `other` into `self`; entries of `other` win.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

/// Expanded search space for one component (or a whole pipeline).
#[derive(Debug, Clone, PartialEq)]
pub struct HyperParameterSearch {
    component: String,
    grid: Grid,
    branch: bool,
}

impl HyperParameterSearch {
    /// Component identity the grid belongs to.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The expanded grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Parameter names enumerated by the grid.
    #[must_use]
    pub fn names(&self) -> &[String] {
        self.grid.names()
    }

    /// True when more than one combination exists.
    #[must_use]
    pub const fn is_branching(&self) -> bool {
        self.branch
    }
}

/// Grid search over a [`ParameterMap`].
pub struct GridSearch;

impl GridSearch {
    /// Resolve and expand the parameters of a single component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the spec does not resolve to a mapping.
    pub fn for_component(component: &str, parameters: &ParameterMap) -> Result<HyperParameterSearch> {
        let resolved = parameters.get_for(component).resolve(component)?;
        let grid = Grid::expand(&resolved);
        Ok(HyperParameterSearch {
            component: component.to_string(),
            branch: grid.is_branching(),
            grid,
        })
    }

    /// Resolve every step of a pipeline and expand them into one grid.
    ///
    /// Names are qualified as `step.param`, steps in pipeline order and
    /// parameters in declaration order within each step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if any step's spec does not resolve to a mapping.
    pub fn for_pipeline<'a>(
        steps: impl IntoIterator<Item = &'a str>,
        parameters: &ParameterMap,
    ) -> Result<HyperParameterSearch> {
        let mut merged = Map::new();
        for step in steps {
            if !parameters.contains(step) {
                continue;
            }
            for (name, values) in parameters.get_for(step).resolve(step)? {
                merged.insert(format!("{step}.{name}"), values);
            }
        }

        let grid = Grid::expand(&merged);
        Ok(HyperParameterSearch {
            component: "pipeline".to_string(),
            branch: grid.is_branching(),
            grid,
        })
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_for_unknown_component_is_empty() {
        let map = ParameterMap::new();
        let resolved = map.get_for("missing").resolve("missing").unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_lazy_source_is_resolved() {
        let mut map = ParameterMap::new();
        map.insert("clf", ParameterSource::lazy(|| json!({"C": [1, 2, 3]})));

        let search = GridSearch::for_component("clf", &map).unwrap();
        assert_eq!(search.grid().len(), 3);
        assert!(search.is_branching());
    }

    #[test]
    fn test_non_mapping_is_fatal() {
        let mut map = ParameterMap::new();
        map.insert("clf", ParameterSource::lazy(|| json!([1, 2, 3])));

        let err = GridSearch::for_component("clf", &map).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_no_parameters_is_non_branching() {
        let map = ParameterMap::new();
        let search = GridSearch::for_component("clf", &map).unwrap();
        assert_eq!(search.grid().len(), 1);
        assert!(!search.is_branching());
    }

    #[test]
    fn test_pipeline_grid_qualifies_names() {
        let map = ParameterMap::from_json(&json!({
            "scaler": {"center": [true, false]},
            "clf": {"C": [0.1, 0.2, 0.3]}
        }));

        let search = GridSearch::for_pipeline(["scaler", "clf"], &map).unwrap();
        assert_eq!(search.names(), ["scaler.center", "clf.C"]);
        assert_eq!(search.grid().len(), 6);
    }

    #[test]
    fn test_pipeline_grid_skips_unregistered_steps() {
        let map = ParameterMap::from_json(&json!({"clf": {"C": [1]}}));
        let search = GridSearch::for_pipeline(["scaler", "clf"], &map).unwrap();
        assert_eq!(search.names(), ["clf.C"]);
        assert!(!search.is_branching());
    }
}
