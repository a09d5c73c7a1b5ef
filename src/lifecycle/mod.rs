//! Experiment lifecycle: Experiment → Execution → Run → Split
//!
//! Each level creates, drives and tears down the next one, strictly one
//! after another on the caller's thread:
//!
//! ```text
//! Experiment::run
//!   └─ execution  put, start_experiment, admission guard
//!        └─ run   grid expansion, one split per partition
//!             └─ split  one computation per grid combination
//!                         fit/predict, scores, metrics, results
//! ```
//!
//! ## Failure model
//!
//! | error                                  | effect                                  |
//! |----------------------------------------|-----------------------------------------|
//! | classifier on continuous targets       | execution `failed`, no splits, `Ok`     |
//! | empty parameter grid                   | run `completed` with an empty report    |
//! | estimator error ([`Error::Pipeline`])  | that split `failed`, siblings continue  |
//! | anything else (conflict, IO, bad spec) | every open level `failed`, `Err`        |

mod execution;
mod experiment;
mod run;
mod split;

pub use experiment::{Experiment, ExperimentBuilder, Provenance};

use crate::dataset::Dataset;
use crate::events::{Event, EventBus};
use crate::experiment::ExperimentRecord;
use crate::params::ParameterMap;
use crate::pipeline::Pipeline;
use crate::repository::{Backend, Entity, PutOptions};
use crate::splitting::SplitStrategy;
#[cfg(doc)]
use crate::Error;

/// Everything a running experiment shares with its children.
pub(crate) struct Context<'a> {
    pub experiment: &'a ExperimentRecord,
    pub dataset: &'a Dataset,
    pub pipeline: &'a Pipeline,
    pub strategy: &'a SplitStrategy,
    pub parameters: &'a ParameterMap,
    pub backend: &'a dyn Backend,
    pub bus: &'a EventBus,
}

impl Context<'_> {
    /// Write the terminal state of an entity while already unwinding from an error.
    ///
    /// A second failure here would hide the first one, so it is only logged.
    fn persist_failure(&self, entity: &Entity) {
        if let Err(err) = self.backend.put(entity, &PutOptions::overwrite()) {
            tracing::error!(kind = %entity.kind(), id = entity.id(), %err, "failed to persist failure state");
            self.bus.enqueue(Event::error(entity.kind().as_str(), err.to_string()));
        }
    }
}
