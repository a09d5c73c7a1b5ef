//! Run driver: grid expansion and one split per partition

use crate::events::{names, Event};
use crate::experiment::{LifecycleState, RunRecord, RunReport, SplitRecord};
use crate::params::{GridSearch, HyperParameterSearch};
use crate::repository::{Entity, PutOptions};
use crate::Result;

use super::{split, Context};

/// Expand the grid and drive every split to a terminal state.
///
/// Failed splits are counted in the report; the run still completes.
pub(super) fn execute(ctx: &Context<'_>, mut record: RunRecord) -> Result<RunRecord> {
    let label = format!("run {}", record.run_id());

    let search = match GridSearch::for_pipeline(ctx.pipeline.step_names(), ctx.parameters) {
        Ok(search) => search,
        Err(err) => {
            tracing::error!(run = record.run_id(), %err, "parameter grid could not be resolved");
            return Err(fail(ctx, record, &label, err));
        }
    };

    record.state_mut().transition(&label, LifecycleState::Configured)?;
    record.set_grid(
        search.names().to_vec(),
        search.grid().len(),
        search.is_branching(),
    );
    record.state_mut().transition(&label, LifecycleState::Running)?;
    record.mark_started();
    ctx.backend.put(&Entity::Run(record.clone()), &PutOptions::new())?;
    ctx.bus.enqueue(Event::new(names::START_RUN).with_record("run", &record));

    tracing::info!(
        run = record.run_id(),
        combinations = search.grid().len(),
        branching = search.is_branching(),
        "run started"
    );

    let report = match run_splits(ctx, &record, &search) {
        Ok(report) => report,
        Err(err) => return Err(fail(ctx, record, &label, err)),
    };

    record.state_mut().transition(&label, LifecycleState::Completed)?;
    record.mark_ended(Some(report), None);
    ctx.backend
        .put(&Entity::Run(record.clone()), &PutOptions::overwrite())?;
    ctx.bus.enqueue(Event::new(names::STOP_RUN).with_record("run", &record));

    if !report.is_full_success() {
        tracing::warn!(run = record.run_id(), failed = report.failed, total = report.total, "run partially failed");
    }
    Ok(record)
}

fn run_splits(ctx: &Context<'_>, run: &RunRecord, search: &HyperParameterSearch) -> Result<RunReport> {
    let mut report = RunReport::default();

    if search.grid().is_empty() {
        tracing::warn!(run = run.run_id(), "parameter grid is empty, nothing to run");
        ctx.bus.enqueue(Event::warn(
            "run",
            format!("run {}: an empty parameter list leaves nothing to run", run.run_id()),
        ));
        return Ok(report);
    }

    let partitions = ctx.strategy.partitions(ctx.dataset.size());
    report.total = partitions.len();

    for (number, partition) in partitions.into_iter().enumerate() {
        let mut split = SplitRecord::new(
            run.run_id(),
            run.experiment_name(),
            number,
            partition.train,
            partition.test,
        );
        if let Some(validation) = partition.validation {
            split = split.with_validation(validation);
        }

        let split = split::execute(ctx, run, search, split)?;
        if split.state() == LifecycleState::Completed {
            report.completed += 1;
        } else {
            report.failed += 1;
        }
    }
    Ok(report)
}

/// Record a fatal error on the run and hand it back for propagation.
fn fail(ctx: &Context<'_>, mut record: RunRecord, label: &str, err: crate::Error) -> crate::Error {
    if let Err(invalid) = record.state_mut().transition(label, LifecycleState::Failed) {
        return invalid;
    }
    record.mark_ended(None, Some(err.to_string()));
    ctx.persist_failure(&Entity::Run(record.clone()));
    ctx.bus.enqueue(Event::new(names::STOP_RUN).with_record("run", &record));
    err
}
