//! Split driver: every grid combination on one partition

use crate::events::{names, Event};
use crate::experiment::{
    ComputationMetrics, ComputationResult, LifecycleState, MetricRecord, RunRecord, SplitRecord,
};
use crate::params::HyperParameterSearch;
use crate::pipeline::{scoring, ComponentType};
use crate::repository::{Entity, Progress, PutOptions};
use crate::Result;

use super::Context;

/// Drive `record` from `created` to a terminal state.
///
/// Estimator errors fail only this split and return `Ok` with a `failed`
/// record. Fatal errors are persisted and propagated.
pub(super) fn execute(
    ctx: &Context<'_>,
    run: &RunRecord,
    search: &HyperParameterSearch,
    mut record: SplitRecord,
) -> Result<SplitRecord> {
    let label = format!("split {}", record.split_id());
    record.state_mut().transition(&label, LifecycleState::Running)?;
    record.mark_started();
    ctx.backend.put(&Entity::Split(record.clone()), &PutOptions::new())?;
    ctx.bus
        .enqueue(Event::new(names::START_SPLIT).with_record("split", &record.metadata()));

    match compute(ctx, run, search, &mut record) {
        Ok(()) => {
            record.state_mut().transition(&label, LifecycleState::Completed)?;
            record.mark_ended(None);
        }
        Err(err) if !err.is_fatal() => {
            tracing::warn!(split = record.split_id(), %err, "split failed");
            ctx.bus.enqueue(Event::warn("split", format!("{label} failed: {err}")));
            record.state_mut().transition(&label, LifecycleState::Failed)?;
            record.mark_ended(Some(err.to_string()));
        }
        Err(err) => {
            record.state_mut().transition(&label, LifecycleState::Failed)?;
            record.mark_ended(Some(err.to_string()));
            ctx.persist_failure(&Entity::Split(record.clone()));
            ctx.bus
                .enqueue(Event::new(names::STOP_SPLIT).with_record("split", &record.metadata()));
            return Err(err);
        }
    }

    ctx.backend
        .put(&Entity::Split(record.clone()), &PutOptions::overwrite())?;
    ctx.bus
        .enqueue(Event::new(names::STOP_SPLIT).with_record("split", &record.metadata()));
    Ok(record)
}

/// Run every combination, stopping at the first error.
fn compute(
    ctx: &Context<'_>,
    run: &RunRecord,
    search: &HyperParameterSearch,
    record: &mut SplitRecord,
) -> Result<()> {
    let (x_train, y_train) = ctx.dataset.select(record.train_idx());
    let (x_test, y_test) = ctx.dataset.select(record.test_idx());
    let classification = ctx
        .pipeline
        .steps()
        .last()
        .is_some_and(|step| step.component_type() == ComponentType::Classification);

    let grid = search.grid();
    let limit = grid.len();

    for (idx, combination) in grid.iter().enumerate() {
        ctx.backend.put_progress(
            record,
            &Progress {
                curr_value: idx + 1,
                limit,
                phase: "fit".to_string(),
            },
        );

        let parameters = grid.to_params(&combination);
        let (computation_id, position) = if search.is_branching() {
            (format!("{}-{idx}", record.split_id()), Some(idx))
        } else {
            (record.split_id().to_string(), None)
        };

        let predictions = ctx
            .pipeline
            .fit_predict(&parameters, (x_train.as_slice(), y_train.as_slice()), &x_test)?;
        let scores = scoring::score(classification, &y_test, &predictions);

        ctx.bus.enqueue_all([
            Event::new(names::LOG_SCORE)
                .with("run_id", run.run_id())
                .with("split_id", record.split_id())
                .with("computation_id", computation_id.as_str())
                .with("combination", position)
                .with_record("scores", &scores),
            Event::new(names::LOG_RESULTS)
                .with("run_id", run.run_id())
                .with("split_id", record.split_id())
                .with("computation_id", computation_id.as_str())
                .with("parameters", parameters.clone()),
        ]);

        let step = u64::try_from(idx).unwrap_or(u64::MAX);
        for (key, value) in &scores {
            let metric = MetricRecord::builder(run.run_id(), key.as_str(), step, *value)
                .computation(record.split_id(), computation_id.as_str())
                .values(predictions.clone())
                .build();
            ctx.backend.put(&Entity::Metric(metric), &PutOptions::new())?;
        }

        record.push_computation(
            ComputationResult {
                computation_id: computation_id.clone(),
                combination: position,
                parameters,
                predictions,
                truth: y_test.clone(),
            },
            ComputationMetrics {
                computation_id,
                combination: position,
                scores,
            },
        );
    }
    Ok(())
}
