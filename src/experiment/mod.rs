//! Experiment Tracking Schema
//!
//! Persisted records of every tracked entity. Parents are referenced by id
//! or name only; nothing here holds a pointer back up the tree.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< ExecutionRecord (N) ──< RunRecord (N)
//!        │                        │                    │
//!   DatasetRecord             CodeRecord               └──< SplitRecord (N)
//!                                                              │
//!                                  ComputationResult / ComputationMetrics
//!                                                              │
//!                                                     MetricRecord (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_exp::experiment::{ExperimentRecord, LifecycleState, RunRecord};
//!
//! let experiment = ExperimentRecord::new("iris-svc");
//! let run = RunRecord::new("exec-1", experiment.name());
//! assert_eq!(run.state(), LifecycleState::Created);
//! ```

mod code_record;
mod dataset_record;
mod execution_record;
mod experiment_record;
mod metric_record;
mod run_record;
mod split_record;
mod state;

pub use code_record::{content_hash, CodeKind, CodeRecord};
pub use dataset_record::DatasetRecord;
pub use execution_record::ExecutionRecord;
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder, StepRecord};
pub use metric_record::{MetricRecord, MetricRecordBuilder};
pub use run_record::{RunRecord, RunRecordBuilder, RunReport};
pub use split_record::{ComputationMetrics, ComputationResult, SplitRecord};
pub use state::LifecycleState;
