//! Estimator pipelines
//!
//! A [`Pipeline`] is an ordered list of named steps, each backed by an
//! [`Estimator`]. Every step but the last transforms the features it was
//! fitted on; the last step predicts.
//!
//! ```text
//! x ─> scaler.fit/transform ─> ... ─> terminal.fit
//! x_test ─> scaler.transform ─> ... ─> terminal.predict ─> predictions
//! ```
//!
//! Estimators report failures through [`anyhow`]; those become
//! [`Error::Pipeline`](crate::Error::Pipeline), which fails only the split
//! that raised them.

mod estimators;
pub mod registry;
pub mod scoring;

pub use estimators::{MajorityClassifier, MeanRegressor, StandardScaler};
pub use registry::{ComponentSpec, EstimatorRegistry};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::Dataset;
use crate::experiment::StepRecord;
use crate::Result;

/// Capability type of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    /// Predicts discrete classes.
    Classification,
    /// Predicts continuous values.
    Regression,
    /// Transforms features.
    Transformation,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
            Self::Transformation => "transformation",
        })
    }
}

/// Capability predicates checked by [`Pipeline::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Has `fit`.
    pub fit: bool,
    /// Has a fused `fit_transform`.
    pub fit_transform: bool,
    /// Has `transform`.
    pub transform: bool,
    /// Has `predict`.
    pub predict: bool,
}

/// A model component: transformer or predictor.
pub trait Estimator {
    /// What this estimator can do.
    fn capabilities(&self) -> Capabilities;

    /// Set one parameter by its implementation name.
    ///
    /// # Errors
    ///
    /// Unknown parameters or values of the wrong type.
    fn set_param(&mut self, name: &str, value: &Value) -> anyhow::Result<()>;

    /// Current parameters.
    fn params(&self) -> Map<String, Value>;

    /// Fit on features `x` and targets `y`.
    ///
    /// # Errors
    ///
    /// Degenerate input, such as an empty training set.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> anyhow::Result<()>;

    /// Transform features with the fitted state.
    ///
    /// # Errors
    ///
    /// The estimator is not a transformer or is not fitted.
    fn transform(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
        let _ = x;
        anyhow::bail!("estimator does not support transform")
    }

    /// Predict one value per row.
    ///
    /// # Errors
    ///
    /// The estimator is not a predictor or is not fitted.
    fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        let _ = x;
        anyhow::bail!("estimator does not support predict")
    }

    /// Fresh boxed copy, used to run every grid combination on an unfitted pipeline.
    fn box_clone(&self) -> Box<dyn Estimator>;
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// One named pipeline step.
#[derive(Clone)]
pub struct Step {
    name: String,
    component: String,
    component_type: ComponentType,
    estimator: Box<dyn Estimator>,
}

impl Step {
    /// Create a step.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        component: impl Into<String>,
        component_type: ComponentType,
        estimator: Box<dyn Estimator>,
    ) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            component_type,
            estimator,
        }
    }

    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry key of the component.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Component type.
    #[must_use]
    pub const fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The estimator.
    #[must_use]
    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }

    /// Mutable estimator.
    pub fn estimator_mut(&mut self) -> &mut dyn Estimator {
        self.estimator.as_mut()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("component_type", &self.component_type)
            .field("params", &self.estimator.params())
            .finish()
    }
}

/// Ordered, named estimator steps.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps in order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step names in order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(Step::name)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True if any step is a classifier.
    #[must_use]
    pub fn has_classifier(&self) -> bool {
        self.first_of(ComponentType::Classification).is_some()
    }

    /// First step of the given type.
    #[must_use]
    pub fn first_of(&self, component_type: ComponentType) -> Option<&Step> {
        self.steps.iter().find(|s| s.component_type == component_type)
    }

    /// Check step capabilities.
    ///
    /// Non-terminal steps need `fit` (or `fit_transform`) and `transform`;
    /// the terminal step needs `fit`. Returns the first offending step.
    ///
    /// # Errors
    ///
    /// A description of the first step that violates its contract.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some((last, rest)) = self.steps.split_last() else {
            return Err("pipeline has no steps".to_string());
        };

        for step in rest {
            let caps = step.estimator.capabilities();
            if !((caps.fit || caps.fit_transform) && caps.transform) {
                return Err(format!(
                    "intermediate step '{}' must implement fit (or fit_transform) and transform",
                    step.name
                ));
            }
        }

        if !last.estimator.capabilities().fit {
            return Err(format!("last step '{}' must implement fit", last.name));
        }
        Ok(())
    }

    /// Persisted description of the steps.
    #[must_use]
    pub fn describe(&self) -> Vec<StepRecord> {
        self.steps
            .iter()
            .map(|s| StepRecord {
                name: s.name.clone(),
                component: s.component.clone(),
                component_type: s.component_type.to_string(),
            })
            .collect()
    }

    /// Set parameters qualified as `step.param`.
    ///
    /// # Errors
    ///
    /// Names without a step prefix, unknown steps and rejected values.
    pub fn set_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        for (qualified, value) in params {
            let (step_name, param) = qualified
                .split_once('.')
                .ok_or_else(|| anyhow::anyhow!("parameter '{qualified}' is not qualified as step.param"))?;
            let step = self
                .steps
                .iter_mut()
                .find(|s| s.name == step_name)
                .ok_or_else(|| anyhow::anyhow!("step '{step_name}' not present in pipeline"))?;
            step.estimator.set_param(param, value)?;
        }
        Ok(())
    }

    /// Fit a fresh copy with `params` on the training rows and predict the test rows.
    ///
    /// # Errors
    ///
    /// [`Error::Pipeline`](crate::Error::Pipeline) for anything the estimators reject.
    pub fn fit_predict(
        &self,
        params: &Map<String, Value>,
        train: (&[Vec<f64>], &[f64]),
        test: &[Vec<f64>],
    ) -> Result<Vec<f64>> {
        let mut pipeline = self.clone();
        pipeline.set_params(params)?;

        let Some((last, rest)) = pipeline.steps.split_last_mut() else {
            return Err(anyhow::anyhow!("pipeline has no steps").into());
        };

        let (mut x, y) = (train.0.to_vec(), train.1);
        let mut x_test = test.to_vec();
        for step in rest {
            step.estimator.fit(&x, y)?;
            x = step.estimator.transform(&x)?;
            x_test = step.estimator.transform(&x_test)?;
        }

        last.estimator.fit(&x, y)?;
        Ok(last.estimator.predict(&x_test)?)
    }
}

/// Outcome of the dataset/pipeline compatibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The pairing may run.
    Admitted,
    /// A classifier was paired with a continuous target.
    Rejected {
        /// Offending step.
        step: String,
        /// Human readable reason.
        reason: String,
    },
}

impl Admission {
    /// True for [`Admission::Admitted`].
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Refuse classifiers on datasets whose targets are not all integer-valued.
#[must_use]
pub fn admit(dataset: &Dataset, pipeline: &Pipeline) -> Admission {
    if dataset.has_discrete_targets() {
        return Admission::Admitted;
    }
    match pipeline.first_of(ComponentType::Classification) {
        Some(step) => Admission::Rejected {
            step: step.name.clone(),
            reason: format!(
                "classifier '{}' cannot be trained on continuous targets of dataset '{}'",
                step.name,
                dataset.name()
            ),
        },
        None => Admission::Admitted,
    }
}
