//! Run Record - one grid-expanded pass of an execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LifecycleState;

/// Outcome of a run over all of its splits.
///
/// A run completes even when some splits fail; the report says how many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of splits produced by the split strategy.
    pub total: usize,
    /// Splits that completed.
    pub completed: usize,
    /// Splits that failed.
    pub failed: usize,
}

impl RunReport {
    /// True if every split completed.
    #[must_use]
    pub const fn is_full_success(&self) -> bool {
        self.failed == 0 && self.completed == self.total
    }
}

/// Run Record represents a single pass of an execution over the dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    execution_id: String,
    experiment_name: String,
    parameter_names: Vec<String>,
    combinations: usize,
    branching: bool,
    state: LifecycleState,
    report: Option<RunReport>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new run record in `created` state.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        Self::builder(execution_id, experiment_name).build()
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(
        execution_id: impl Into<String>,
        experiment_name: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(execution_id, experiment_name)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent execution ID.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Get the experiment name (the run lives in its folder).
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Get the qualified parameter names of the expanded grid.
    #[must_use]
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Get the number of grid combinations.
    #[must_use]
    pub const fn combinations(&self) -> usize {
        self.combinations
    }

    /// True if the grid has more than one combination.
    #[must_use]
    pub const fn is_branching(&self) -> bool {
        self.branching
    }

    /// Get the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Get the split report, once the run has completed.
    #[must_use]
    pub const fn report(&self) -> Option<RunReport> {
        self.report
    }

    /// Get the failure reason, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub(crate) fn state_mut(&mut self) -> &mut LifecycleState {
        &mut self.state
    }

    pub(crate) fn set_grid(&mut self, names: Vec<String>, combinations: usize, branching: bool) {
        self.parameter_names = names;
        self.combinations = combinations;
        self.branching = branching;
    }

    /// Sets the `started_at` timestamp to now.
    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    /// Sets the `ended_at` timestamp to now.
    pub(crate) fn mark_ended(&mut self, report: Option<RunReport>, error: Option<String>) {
        self.report = report;
        self.error = error;
        self.ended_at = Some(Utc::now());
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    run_id: String,
    execution_id: String,
    experiment_name: String,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields and a generated run id.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            experiment_name: experiment_name.into(),
        }
    }

    /// Use a specific run id.
    #[must_use]
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            execution_id: self.execution_id,
            experiment_name: self.experiment_name,
            parameter_names: Vec::new(),
            combinations: 0,
            branching: false,
            state: LifecycleState::Created,
            report: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }
}
