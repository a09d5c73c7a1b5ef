//! Execution Record - one invocation of an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LifecycleState;

/// Execution Record captures the code version and command an experiment
/// was run with. Each execution owns the runs it spawned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionRecord {
    execution_id: String,
    name: String,
    experiment_id: String,
    experiment_name: String,
    code_hash: Option<String>,
    command: Option<String>,
    state: LifecycleState,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Create a new execution of an experiment.
    ///
    /// The name defaults to the generated id.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        let execution_id = Uuid::new_v4().to_string();
        Self {
            name: execution_id.clone(),
            execution_id,
            experiment_id: experiment_id.into(),
            experiment_name: experiment_name.into(),
            code_hash: None,
            command: None,
            state: LifecycleState::Created,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Attach code provenance.
    #[must_use]
    pub fn with_provenance(mut self, code_hash: Option<String>, command: Option<String>) -> Self {
        self.code_hash = code_hash;
        self.command = command;
        self
    }

    /// Override the execution name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the execution ID.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Get the execution name (its folder name on disk).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the parent experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Get the code hash, if known.
    #[must_use]
    pub fn code_hash(&self) -> Option<&str> {
        self.code_hash.as_deref()
    }

    /// Get the command, if known.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Get the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Get the failure reason, if the execution failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
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

    pub(crate) fn state_mut(&mut self) -> &mut LifecycleState {
        &mut self.state
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_ended(&mut self, error: Option<String>) {
        self.ended_at = Some(Utc::now());
        self.error = error;
    }
}
