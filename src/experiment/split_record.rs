//! Split Record - one train/test partition of a run, plus its results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::LifecycleState;

/// Predictions of one pipeline computation on the test partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputationResult {
    /// Computation id (`<split>-<n>` for branching grids, else the split id).
    pub computation_id: String,
    /// Position in the grid, if the grid branches.
    pub combination: Option<usize>,
    /// Qualified parameters the pipeline ran with.
    pub parameters: Map<String, Value>,
    /// Predicted values, aligned with the test indices.
    pub predictions: Vec<f64>,
    /// Ground truth, aligned with the test indices.
    pub truth: Vec<f64>,
}

/// Scores of one pipeline computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputationMetrics {
    /// Computation id.
    pub computation_id: String,
    /// Position in the grid, if the grid branches.
    pub combination: Option<usize>,
    /// Score name to value.
    pub scores: BTreeMap<String, f64>,
}

/// Split Record: the partition indices, the lifecycle state and the
/// per-combination results and metrics.
///
/// The file layout stores `results` and `metrics` next to `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitRecord {
    split_id: String,
    run_id: String,
    experiment_name: String,
    number: usize,
    train_idx: Vec<usize>,
    test_idx: Vec<usize>,
    val_idx: Option<Vec<usize>>,
    state: LifecycleState,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    results: Vec<ComputationResult>,
    #[serde(default)]
    metrics: Vec<ComputationMetrics>,
}

impl SplitRecord {
    /// Create a split with a generated id.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_name: impl Into<String>,
        number: usize,
        train_idx: Vec<usize>,
        test_idx: Vec<usize>,
    ) -> Self {
        Self {
            split_id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            experiment_name: experiment_name.into(),
            number,
            train_idx,
            test_idx,
            val_idx: None,
            state: LifecycleState::Created,
            error: None,
            started_at: None,
            ended_at: None,
            results: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// Attach validation indices.
    #[must_use]
    pub fn with_validation(mut self, val_idx: Vec<usize>) -> Self {
        self.val_idx = Some(val_idx);
        self
    }

    /// Use a specific split id.
    #[must_use]
    pub fn with_id(mut self, split_id: impl Into<String>) -> Self {
        self.split_id = split_id.into();
        self
    }

    /// Get the split ID.
    #[must_use]
    pub fn split_id(&self) -> &str {
        &self.split_id
    }

    /// Get the parent run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Position of this split in its run.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Training indices.
    #[must_use]
    pub fn train_idx(&self) -> &[usize] {
        &self.train_idx
    }

    /// Test indices.
    #[must_use]
    pub fn test_idx(&self) -> &[usize] {
        &self.test_idx
    }

    /// Validation indices, if any.
    #[must_use]
    pub fn val_idx(&self) -> Option<&[usize]> {
        self.val_idx.as_deref()
    }

    /// Get the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Get the failure reason, if the split failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Per-computation results.
    #[must_use]
    pub fn results(&self) -> &[ComputationResult] {
        &self.results
    }

    /// Per-computation metrics.
    #[must_use]
    pub fn metrics(&self) -> &[ComputationMetrics] {
        &self.metrics
    }

    /// Copy without results and metrics (the `metadata.json` view).
    #[must_use]
    pub fn metadata(&self) -> Self {
        Self {
            results: Vec::new(),
            metrics: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn assign_id(&mut self, split_id: String) {
        self.split_id = split_id;
    }

    pub(crate) fn state_mut(&mut self) -> &mut LifecycleState {
        &mut self.state
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_ended(&mut self, error: Option<String>) {
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    pub(crate) fn push_computation(&mut self, result: ComputationResult, metrics: ComputationMetrics) {
        self.results.push(result);
        self.metrics.push(metrics);
    }

    pub(crate) fn set_payload(
        &mut self,
        results: Vec<ComputationResult>,
        metrics: Vec<ComputationMetrics>,
    ) {
        self.results = results;
        self.metrics = metrics;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_new() {
        let split = SplitRecord::new("run-1", "iris", 0, vec![0, 1], vec![2]);
        assert_eq!(split.run_id(), "run-1");
        assert_eq!(split.train_idx(), [0, 1]);
        assert_eq!(split.test_idx(), [2]);
        assert!(split.val_idx().is_none());
        assert_eq!(split.state(), LifecycleState::Created);
    }

    #[test]
    fn test_metadata_view_drops_payload() {
        let mut split = SplitRecord::new("run-1", "iris", 0, vec![0], vec![1]).with_id("s1");
        split.push_computation(
            ComputationResult {
                computation_id: "s1".into(),
                combination: None,
                parameters: Map::new(),
                predictions: vec![1.0],
                truth: vec![1.0],
            },
            ComputationMetrics {
                computation_id: "s1".into(),
                combination: None,
                scores: BTreeMap::from([("accuracy".to_string(), 1.0)]),
            },
        );

        let meta = split.metadata();
        assert!(meta.results().is_empty());
        assert!(meta.metrics().is_empty());
        assert_eq!(meta.split_id(), "s1");
        assert_eq!(split.results().len(), 1);
    }
}
