//! Loggers react to lifecycle events published on the bus.

use serde_json::{Map, Value};

use super::{names, Event};

/// Receiver of lifecycle events. Every method defaults to a no-op so an
/// implementation only overrides what it cares about.
///
/// Entity arguments are the JSON form of the persisted records.
#[allow(unused_variables)]
pub trait Logger {
    /// An execution of `experiment` started.
    fn log_start_experiment(&self, experiment: &Value, append_runs: bool) {}

    /// An execution of `experiment` finished.
    fn log_stop_experiment(&self, experiment: &Value) {}

    /// The configuration of `experiment` is available.
    fn put_experiment_configuration(&self, experiment: &Value) {}

    /// `run` started.
    fn log_start_run(&self, run: &Value) {}

    /// `run` reached a terminal state.
    fn log_stop_run(&self, run: &Value) {}

    /// `split` started.
    fn log_start_split(&self, split: &Value) {}

    /// `split` reached a terminal state.
    fn log_stop_split(&self, split: &Value) {}

    /// A score was computed.
    fn log_score(&self, args: &Map<String, Value>) {}

    /// Computation results are available.
    fn log_results(&self, args: &Map<String, Value>) {}

    /// Free-form event.
    fn log_event(&self, args: &Map<String, Value>) {}

    /// Informational message.
    fn log(&self, source: &str, message: &str) {}

    /// Warning.
    fn warn(&self, source: &str, message: &str) {}

    /// Error.
    fn error(&self, source: &str, message: &str) {}
}

/// Route one event to the matching [`Logger`] method.
///
/// Lifecycle events without their entity argument are ignored.
pub(super) fn dispatch(logger: &dyn Logger, event: &Event) {
    let entity = |key: &str| event.arg(key).filter(|v| !v.is_null());

    match event.name() {
        names::START_EXPERIMENT => {
            if let Some(experiment) = entity("experiment") {
                let append_runs = event
                    .arg("append_runs")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                logger.log_start_experiment(experiment, append_runs);
            }
        }
        names::STOP_EXPERIMENT => {
            if let Some(experiment) = entity("experiment") {
                logger.log_stop_experiment(experiment);
            }
        }
        names::PUT_EXPERIMENT_CONFIGURATION => {
            if let Some(experiment) = entity("experiment") {
                logger.put_experiment_configuration(experiment);
            }
        }
        names::START_RUN => {
            if let Some(run) = entity("run") {
                logger.log_start_run(run);
            }
        }
        names::STOP_RUN => {
            if let Some(run) = entity("run") {
                logger.log_stop_run(run);
            }
        }
        names::START_SPLIT => {
            if let Some(split) = entity("split") {
                logger.log_start_split(split);
            }
        }
        names::STOP_SPLIT => {
            if let Some(split) = entity("split") {
                logger.log_stop_split(split);
            }
        }
        names::LOG_SCORE => logger.log_score(event.args()),
        names::LOG_RESULTS => logger.log_results(event.args()),
        names::LOG_EVENT => logger.log_event(event.args()),
        names::LOG => logger.log(event.str_arg("source"), event.str_arg("message")),
        names::WARN => logger.warn(event.str_arg("source"), event.str_arg("message")),
        names::ERROR => logger.error(event.str_arg("source"), event.str_arg("message")),
        _ => {}
    }
}

/// Logger writing every lifecycle event as a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

fn field<'a>(entity: &'a Value, key: &str) -> &'a str {
    entity.get(key).and_then(Value::as_str).unwrap_or("?")
}

impl Logger for TracingLogger {
    fn log_start_experiment(&self, experiment: &Value, append_runs: bool) {
        tracing::info!(experiment = field(experiment, "name"), append_runs, "experiment started");
    }

    fn log_stop_experiment(&self, experiment: &Value) {
        tracing::info!(experiment = field(experiment, "name"), "experiment stopped");
    }

    fn put_experiment_configuration(&self, experiment: &Value) {
        tracing::debug!(configuration = %experiment, "experiment configuration");
    }

    fn log_start_run(&self, run: &Value) {
        tracing::info!(run = field(run, "run_id"), "run started");
    }

    fn log_stop_run(&self, run: &Value) {
        tracing::info!(run = field(run, "run_id"), state = field(run, "state"), "run stopped");
    }

    fn log_start_split(&self, split: &Value) {
        tracing::debug!(split = field(split, "split_id"), "split started");
    }

    fn log_stop_split(&self, split: &Value) {
        tracing::debug!(split = field(split, "split_id"), state = field(split, "state"), "split stopped");
    }

    fn log_score(&self, args: &Map<String, Value>) {
        let score = Value::Object(args.clone());
        tracing::info!(%score, "score");
    }

    fn log(&self, source: &str, message: &str) {
        tracing::info!(source, "{message}");
    }

    fn warn(&self, source: &str, message: &str) {
        tracing::warn!(source, "{message}");
    }

    fn error(&self, source: &str, message: &str) {
        tracing::error!(source, "{message}");
    }
}
