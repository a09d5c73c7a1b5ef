//! Experiment: definition plus the entry point that spawns executions

use std::fmt;
use std::rc::Rc;

use crate::dataset::Dataset;
use crate::events::{Event, EventBus};
use crate::experiment::{CodeRecord, ExecutionRecord, ExperimentRecord, LifecycleState};
use crate::params::ParameterMap;
use crate::pipeline::Pipeline;
use crate::repository::{check_identity, Backend, Entity, EntityKind, PutOptions};
use crate::splitting::SplitStrategy;
use crate::{Error, Result};

use super::{execution, Context};

/// Where an execution came from.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    name: Option<String>,
    code: Option<CodeRecord>,
    command: Option<String>,
}

impl Provenance {
    /// No provenance information.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the execution instead of using its generated id.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Code that produced the execution. Stored once per code name.
    #[must_use]
    pub fn code(mut self, code: CodeRecord) -> Self {
        self.code = Some(code);
        self
    }

    /// Command line the execution was started with.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// A named experiment: dataset, pipeline, split strategy and parameter grid.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use trueno_exp::dataset::Dataset;
/// use trueno_exp::lifecycle::{Experiment, Provenance};
/// use trueno_exp::pipeline::registry::EstimatorRegistry;
/// use trueno_exp::repository::MemoryBackend;
///
/// let dataset = Dataset::new(
///     "toy",
///     vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
///     vec![0.5, 1.5, 2.5, 3.5],
/// )?;
/// let pipeline = EstimatorRegistry::with_defaults()
///     .create_pipeline(&["mean_regressor"], None)
///     .expect("registered");
///
/// let mut experiment = Experiment::builder("toy-mean")
///     .description("mean baseline")
///     .dataset(Rc::new(dataset))
///     .pipeline(pipeline)
///     .backend(Rc::new(MemoryBackend::new()))
///     .build();
///
/// let execution = experiment.run(Provenance::new())?;
/// assert!(execution.state().is_terminal());
/// # Ok::<(), trueno_exp::Error>(())
/// ```
pub struct Experiment {
    record: ExperimentRecord,
    dataset: Option<Rc<Dataset>>,
    pipeline: Option<Pipeline>,
    strategy: SplitStrategy,
    parameters: ParameterMap,
    backend: Option<Rc<dyn Backend>>,
    bus: Rc<EventBus>,
    executions: Vec<ExecutionRecord>,
}

impl Experiment {
    /// Start building an experiment called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(name)
    }

    /// Experiment name (its identity in every repository).
    #[must_use]
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// Persisted description.
    #[must_use]
    pub const fn record(&self) -> &ExperimentRecord {
        &self.record
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.record.state()
    }

    /// Dataset, if attached.
    #[must_use]
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    /// Pipeline, if attached.
    #[must_use]
    pub const fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Split strategy.
    #[must_use]
    pub const fn strategy(&self) -> &SplitStrategy {
        &self.strategy
    }

    /// Hyperparameter specs.
    #[must_use]
    pub const fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    /// Event bus lifecycle events are published on.
    #[must_use]
    pub const fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Executions started by [`Experiment::run`], oldest first.
    #[must_use]
    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    /// Add parameter overrides; entries replace specs of the same component.
    ///
    /// Takes effect with the next execution.
    pub fn add_parameters(&mut self, overrides: ParameterMap) {
        self.parameters.extend(overrides);
        self.record.set_parameters(self.parameters.to_json());
    }

    /// Check that dataset, pipeline and backend are present, then persist the definition.
    ///
    /// Names are unique per repository: a stored experiment with the same
    /// name but a different id is never replaced.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming every missing part, the invalid pipeline
    /// step, an unusable name or a name taken by another experiment;
    /// storage failures.
    pub fn configure(&mut self) -> Result<()> {
        let label = format!("experiment {}", self.name());

        if let Err(err) = check_identity(EntityKind::Experiment, self.name()) {
            self.bus.enqueue(Event::error("experiment", err.to_string()));
            return Err(err);
        }

        let missing: Vec<&str> = [
            ("dataset", self.dataset.is_none()),
            ("pipeline", self.pipeline.is_none()),
            ("backend", self.backend.is_none()),
        ]
        .into_iter()
        .filter_map(|(part, absent)| absent.then_some(part))
        .collect();

        let (Some(dataset), Some(pipeline), Some(backend)) =
            (&self.dataset, &self.pipeline, &self.backend)
        else {
            let message = format!("{label} is missing: {}", missing.join(", "));
            self.bus.enqueue(Event::error("experiment", message.as_str()));
            return Err(Error::Config(message));
        };

        if let Err(reason) = pipeline.validate() {
            self.bus.enqueue(Event::error("experiment", reason.as_str()));
            return Err(Error::Config(format!("{label}: {reason}")));
        }

        let mut record = ExperimentRecord::builder(self.record.name())
            .experiment_id(self.record.experiment_id())
            .description(self.record.description())
            .dataset(dataset.id(), dataset.name())
            .pipeline(pipeline.describe())
            .strategy(self.strategy.name())
            .parameters(self.parameters.to_json())
            .created_at(self.record.created_at())
            .build();
        record.state_mut().transition(&label, LifecycleState::Configured)?;

        let entity = Entity::Experiment(record.clone());
        let message = format!("Configured {label}");
        match backend.put(&entity, &PutOptions::new().with_message(message.as_str())) {
            Err(err) if err.is_conflict() => {
                let same_experiment = matches!(
                    backend.get(EntityKind::Experiment, record.name())?,
                    Some(Entity::Experiment(stored)) if stored.experiment_id() == record.experiment_id()
                );
                if !same_experiment {
                    let reason = format!(
                        "{label} already exists in the {} repository. Experiment name should be unique",
                        backend.name()
                    );
                    self.bus.enqueue(Event::error("experiment", reason.as_str()));
                    return Err(Error::Config(reason));
                }
                backend.put(&entity, &PutOptions::overwrite().with_message(message))?;
            }
            result => result?,
        }
        tracing::info!(experiment = record.name(), dataset = dataset.name(), "experiment configured");

        self.record = record;
        Ok(())
    }

    /// Run the experiment once: one execution, one run, one split per partition.
    ///
    /// Configures the experiment first if needed. The admission guard and
    /// estimator errors are reported through the returned record; only fatal
    /// errors come back as `Err`.
    ///
    /// # Errors
    ///
    /// Configuration problems, storage conflicts, IO and unresolvable
    /// parameter specs.
    pub fn run(&mut self, provenance: Provenance) -> Result<ExecutionRecord> {
        if self.state() == LifecycleState::Created {
            self.configure()?;
        }

        let (Some(dataset), Some(pipeline), Some(backend)) =
            (&self.dataset, &self.pipeline, &self.backend)
        else {
            return Err(Error::Config(format!("experiment {} is not configured", self.name())));
        };

        let code_hash = match &provenance.code {
            Some(code) => {
                store_code(backend.as_ref(), code)?;
                Some(code.cas_hash().to_string())
            }
            None => None,
        };

        let mut record = ExecutionRecord::new(self.record.experiment_id(), self.record.name())
            .with_provenance(code_hash, provenance.command);
        if let Some(name) = provenance.name {
            record = record.with_name(name);
        }

        let ctx = Context {
            experiment: &self.record,
            dataset,
            pipeline,
            strategy: &self.strategy,
            parameters: &self.parameters,
            backend: backend.as_ref(),
            bus: &self.bus,
        };
        let record = execution::execute(&ctx, record)?;

        tracing::info!(
            experiment = self.record.name(),
            execution = record.name(),
            state = %record.state(),
            "execution finished"
        );
        self.executions.push(record.clone());
        Ok(record)
    }
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.record.name())
            .field("state", &self.record.state())
            .field("dataset", &self.dataset.as_ref().map(|d| d.name()))
            .field("pipeline", &self.pipeline.as_ref().map(Pipeline::len))
            .field("strategy", &self.strategy)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("executions", &self.executions.len())
            .finish_non_exhaustive()
    }
}

/// Keep the first stored version of a code record; same name means same code.
fn store_code(backend: &dyn Backend, code: &CodeRecord) -> Result<()> {
    match backend.get(EntityKind::Code, code.name())? {
        Some(Entity::Code(existing)) if existing.cas_hash() != code.cas_hash() => {
            tracing::warn!(
                code = code.name(),
                stored = existing.cas_hash(),
                current = code.cas_hash(),
                "code changed since it was first stored"
            );
            Ok(())
        }
        Some(_) => Ok(()),
        None => backend.put(&Entity::Code(code.clone()), &PutOptions::new()),
    }
}

/// Builder for [`Experiment`].
pub struct ExperimentBuilder {
    name: String,
    experiment_id: Option<String>,
    description: String,
    dataset: Option<Rc<Dataset>>,
    pipeline: Option<Pipeline>,
    strategy: SplitStrategy,
    parameters: ParameterMap,
    backend: Option<Rc<dyn Backend>>,
    bus: Option<Rc<EventBus>>,
}

impl ExperimentBuilder {
    /// Builder for an experiment called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experiment_id: None,
            description: String::new(),
            dataset: None,
            pipeline: None,
            strategy: SplitStrategy::default(),
            parameters: ParameterMap::new(),
            backend: None,
            bus: None,
        }
    }

    /// Reuse the id of an experiment already stored under this name.
    #[must_use]
    pub fn experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach the dataset.
    #[must_use]
    pub fn dataset(mut self, dataset: Rc<Dataset>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Attach the pipeline.
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set the split strategy (default: seeded random 75/25).
    #[must_use]
    pub fn strategy(mut self, strategy: SplitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the hyperparameter specs.
    #[must_use]
    pub fn parameters(mut self, parameters: ParameterMap) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach the repository.
    #[must_use]
    pub fn backend(mut self, backend: Rc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Publish lifecycle events on `bus` instead of a private one.
    #[must_use]
    pub fn bus(mut self, bus: Rc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the experiment in `created` state.
    #[must_use]
    pub fn build(self) -> Experiment {
        let mut record = ExperimentRecord::builder(self.name);
        if let Some(experiment_id) = self.experiment_id {
            record = record.experiment_id(experiment_id);
        }
        let record = record
            .description(self.description)
            .strategy(self.strategy.name())
            .parameters(self.parameters.to_json())
            .build();
        Experiment {
            record,
            dataset: self.dataset,
            pipeline: self.pipeline,
            strategy: self.strategy,
            parameters: self.parameters,
            backend: self.backend,
            bus: self.bus.unwrap_or_default(),
            executions: Vec::new(),
        }
    }
}
