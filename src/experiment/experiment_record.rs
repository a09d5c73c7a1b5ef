//! Experiment Record - root entity for experiment tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LifecycleState;

/// One pipeline step as persisted with its experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name inside the pipeline.
    pub name: String,
    /// Registry key of the component implementing the step.
    pub component: String,
    /// Component type (`classification`, `regression`, `transformation`).
    pub component_type: String,
}

/// Experiment Record represents a tracked experiment.
///
/// This is the root entity in the schema. The experiment name is its
/// identity in every repository; executions refer to it by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    description: String,
    dataset_id: Option<String>,
    dataset_name: Option<String>,
    pipeline: Vec<StepRecord>,
    strategy: String,
    parameters: serde_json::Value,
    state: LifecycleState,
    created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Create a new experiment record with a generated id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Create a builder for constructing an experiment record with optional fields.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the dataset ID, if a dataset is attached.
    #[must_use]
    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    /// Get the dataset name, if a dataset is attached.
    #[must_use]
    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    /// Get the pipeline steps.
    #[must_use]
    pub fn pipeline(&self) -> &[StepRecord] {
        &self.pipeline
    }

    /// Get the split strategy name.
    #[must_use]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Get the literal hyperparameter specification.
    #[must_use]
    pub const fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }

    /// Get the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn state_mut(&mut self) -> &mut LifecycleState {
        &mut self.state
    }

    pub(crate) fn set_parameters(&mut self, parameters: serde_json::Value) {
        self.parameters = parameters;
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    experiment_id: String,
    name: String,
    description: String,
    dataset: Option<(String, String)>,
    pipeline: Vec<StepRecord>,
    strategy: String,
    parameters: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            dataset: None,
            pipeline: Vec::new(),
            strategy: "random".to_string(),
            parameters: serde_json::Value::Object(serde_json::Map::new()),
            created_at: Utc::now(),
        }
    }

    /// Set a specific experiment ID.
    #[must_use]
    pub fn experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = experiment_id.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a dataset by id and name.
    #[must_use]
    pub fn dataset(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.dataset = Some((id.into(), name.into()));
        self
    }

    /// Set the pipeline steps.
    #[must_use]
    pub fn pipeline(mut self, steps: Vec<StepRecord>) -> Self {
        self.pipeline = steps;
        self
    }

    /// Set the split strategy name.
    #[must_use]
    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Set the hyperparameter specification.
    #[must_use]
    pub fn parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        let (dataset_id, dataset_name) = self.dataset.unzip();
        ExperimentRecord {
            experiment_id: self.experiment_id,
            name: self.name,
            description: self.description,
            dataset_id,
            dataset_name,
            pipeline: self.pipeline,
            strategy: self.strategy,
            parameters: self.parameters,
            state: LifecycleState::Created,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_record_new() {
        let record = ExperimentRecord::new("iris-svc");
        assert_eq!(record.name(), "iris-svc");
        assert_eq!(record.state(), LifecycleState::Created);
        assert!(record.dataset_id().is_none());
        assert_eq!(record.strategy(), "random");
    }

    #[test]
    fn test_experiment_record_builder() {
        let params = serde_json::json!({"clf": {"C": [1, 2]}});
        let record = ExperimentRecord::builder("iris-svc")
            .description("baseline")
            .dataset("ds-1", "iris")
            .strategy("cv")
            .parameters(params.clone())
            .build();

        assert_eq!(record.description(), "baseline");
        assert_eq!(record.dataset_id(), Some("ds-1"));
        assert_eq!(record.dataset_name(), Some("iris"));
        assert_eq!(record.parameters(), &params);
    }
}
