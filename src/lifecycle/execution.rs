//! Execution driver: admission guard, then one run

use crate::events::{names, Event};
use crate::experiment::{ExecutionRecord, LifecycleState, RunRecord};
use crate::pipeline::{admit, Admission};
use crate::repository::{Entity, EntityKind, PutOptions};
use crate::Result;

use super::{run, Context};

pub(super) fn execute(ctx: &Context<'_>, mut record: ExecutionRecord) -> Result<ExecutionRecord> {
    let label = format!("execution {}", record.name());
    let options = PutOptions::for_kind(EntityKind::Execution);

    record.state_mut().transition(&label, LifecycleState::Configured)?;
    ctx.backend.put(&Entity::Execution(record.clone()), &options)?;
    ctx.bus.enqueue_all([
        Event::new(names::START_EXPERIMENT)
            .with_record("experiment", ctx.experiment)
            .with_record("execution", &record)
            .with("append_runs", false),
        Event::new(names::PUT_EXPERIMENT_CONFIGURATION).with_record("experiment", ctx.experiment),
    ]);

    if let Admission::Rejected { step, reason } = admit(ctx.dataset, ctx.pipeline) {
        tracing::warn!(experiment = ctx.experiment.name(), step = step.as_str(), "{reason}");
        ctx.bus.enqueue(Event::warn("execution", reason.clone()));
        record.state_mut().transition(&label, LifecycleState::Failed)?;
        record.mark_ended(Some(reason));
        ctx.backend.put(&Entity::Execution(record.clone()), &options)?;
        stop(ctx, &record);
        return Ok(record);
    }

    record.state_mut().transition(&label, LifecycleState::Running)?;
    record.mark_started();
    ctx.backend.put(&Entity::Execution(record.clone()), &options)?;

    let run = RunRecord::new(record.execution_id(), ctx.experiment.name());
    match run::execute(ctx, run) {
        Ok(run) => {
            tracing::debug!(execution = record.name(), run = run.run_id(), "run finished");
            record.state_mut().transition(&label, LifecycleState::Completed)?;
            record.mark_ended(None);
            ctx.backend.put(&Entity::Execution(record.clone()), &options)?;
            stop(ctx, &record);
            Ok(record)
        }
        Err(err) => {
            record.state_mut().transition(&label, LifecycleState::Failed)?;
            record.mark_ended(Some(err.to_string()));
            ctx.persist_failure(&Entity::Execution(record.clone()));
            stop(ctx, &record);
            Err(err)
        }
    }
}

fn stop(ctx: &Context<'_>, record: &ExecutionRecord) {
    ctx.bus.enqueue(
        Event::new(names::STOP_EXPERIMENT)
            .with_record("experiment", ctx.experiment)
            .with_record("execution", record),
    );
}
