//! Experiment creator: named experiments and datasets, run in bulk
//!
//! Everything on the creation path soft-fails: problems are published as
//! `warn`/`error` events and the call returns `None` or `false`. Only
//! running experiments can produce an `Err`.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::dataset::Dataset;
use crate::events::{Event, EventBus};
use crate::experiment::ExecutionRecord;
use crate::lifecycle::{Experiment, Provenance};
use crate::params::ParameterMap;
use crate::pipeline::registry::EstimatorRegistry;
use crate::pipeline::{admit, Admission, Pipeline};
use crate::repository::{Backend, EntityKind};
use crate::splitting::SplitStrategy;
use crate::Result;

const SOURCE: &str = "creator";

/// Dataset given directly or by registered name.
#[derive(Debug, Clone)]
pub enum DatasetRef {
    /// A dataset object.
    Data(Rc<Dataset>),
    /// Name of a dataset registered with the creator.
    Named(String),
}

/// Request for [`ExperimentCreator::create_experiment`].
pub struct NewExperiment {
    name: String,
    description: Option<String>,
    dataset: Option<DatasetRef>,
    workflow: Option<Pipeline>,
    backend: Option<Rc<dyn Backend>>,
    params: Option<Map<String, Value>>,
    strategy: SplitStrategy,
}

impl NewExperiment {
    /// Request an experiment called `name`. An empty name gets a generated one.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            dataset: None,
            workflow: None,
            backend: None,
            params: None,
            strategy: SplitStrategy::default(),
        }
    }

    /// Set the description (required).
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Use a dataset object.
    #[must_use]
    pub fn dataset(mut self, dataset: Rc<Dataset>) -> Self {
        self.dataset = Some(DatasetRef::Data(dataset));
        self
    }

    /// Use a dataset registered under `name`.
    #[must_use]
    pub fn dataset_named(mut self, name: impl Into<String>) -> Self {
        self.dataset = Some(DatasetRef::Named(name.into()));
        self
    }

    /// Set the pipeline (required).
    #[must_use]
    pub fn workflow(mut self, workflow: Pipeline) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Set the repository (required).
    #[must_use]
    pub fn backend(mut self, backend: Rc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the parameter grid `{step: {param: [values]}}`.
    #[must_use]
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Set the split strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: SplitStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

struct Entry {
    experiment_id: String,
    description: String,
    dataset: Option<Rc<Dataset>>,
    workflow: Pipeline,
    backend: Rc<dyn Backend>,
    strategy: SplitStrategy,
}

/// Registry of experiments and local datasets.
pub struct ExperimentCreator {
    registry: EstimatorRegistry,
    datasets: IndexMap<String, Rc<Dataset>>,
    experiments: IndexMap<String, Entry>,
    param_values: IndexMap<String, ParameterMap>,
    bus: Rc<EventBus>,
}

impl ExperimentCreator {
    /// Creator using the default estimator registry.
    #[must_use]
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self::with_registry(EstimatorRegistry::with_defaults(), bus)
    }

    /// Creator using `registry`.
    #[must_use]
    pub fn with_registry(registry: EstimatorRegistry, bus: Rc<EventBus>) -> Self {
        Self {
            registry,
            datasets: IndexMap::new(),
            experiments: IndexMap::new(),
            param_values: IndexMap::new(),
            bus,
        }
    }

    /// Estimator registry.
    #[must_use]
    pub const fn registry(&self) -> &EstimatorRegistry {
        &self.registry
    }

    /// Event bus used for soft failures and lifecycle events.
    #[must_use]
    pub const fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(source = SOURCE, "{message}");
        self.bus.enqueue(Event::warn(SOURCE, message));
    }

    fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(source = SOURCE, "{message}");
        self.bus.enqueue(Event::error(SOURCE, message));
    }

    /// Make a dataset available by its name, replacing one of the same name.
    pub fn register_dataset(&mut self, dataset: Dataset) -> Rc<Dataset> {
        let dataset = Rc::new(dataset);
        self.datasets
            .insert(dataset.name().to_string(), Rc::clone(&dataset));
        dataset
    }

    /// Registered dataset called `name`.
    #[must_use]
    pub fn get_local_dataset(&self, name: &str) -> Option<Rc<Dataset>> {
        if name.is_empty() {
            self.error("Dataset name is empty");
            return None;
        }
        let dataset = self.datasets.get(name).cloned();
        if dataset.is_none() {
            self.error(format!("{name} Local Dataset not found"));
        }
        dataset
    }

    /// Names of registered datasets, in registration order.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Names of created experiments, in creation order.
    pub fn experiment_names(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    /// Parameter grid stored for `experiment`.
    #[must_use]
    pub fn param_values(&self, experiment: &str) -> Option<&ParameterMap> {
        self.param_values.get(experiment)
    }

    /// Register an experiment. Returns its name, or `None` if it was refused.
    ///
    /// Refused when description, workflow or backend are missing, when the
    /// name is taken, when a named dataset is unknown, or when a classifier
    /// meets a dataset with continuous targets.
    pub fn create_experiment(&mut self, request: NewExperiment) -> Option<String> {
        let NewExperiment {
            mut name,
            description,
            dataset,
            workflow,
            backend,
            params,
            strategy,
        } = request;

        if name.is_empty() {
            name = format!("experiment-{}", uuid::Uuid::new_v4());
            self.warn(format!(
                "Experiment name is missing, a name will be generated by the system: {name}"
            ));
        }

        if description.is_none() {
            self.error(format!("Description is missing for experiment: {name}"));
        }
        if workflow.is_none() {
            self.error(format!("Workflow is missing for experiment: {name}"));
        }
        if backend.is_none() {
            self.error(format!("Backend is missing for experiment: {name}"));
        }
        let (Some(description), Some(workflow), Some(backend)) = (description, workflow, backend)
        else {
            return None;
        };

        let dataset = match dataset {
            Some(DatasetRef::Data(dataset)) => Some(dataset),
            Some(DatasetRef::Named(dataset)) => Some(self.get_local_dataset(&dataset)?),
            None => None,
        };

        if let Some(dataset) = &dataset {
            if let Admission::Rejected { reason, .. } = admit(dataset, &workflow) {
                self.warn(format!("{reason}. Experiment will be discarded"));
                return None;
            }
        }

        if self.experiments.contains_key(&name) || is_stored(backend.as_ref(), &name) {
            self.error(format!(
                "Experiment name: {name} already present. Experiment name should be unique"
            ));
            return None;
        }

        if let Some(params) = params {
            self.param_values
                .insert(name.clone(), ParameterMap::from_json(&Value::Object(params)));
        }
        self.experiments.insert(
            name.clone(),
            Entry {
                experiment_id: uuid::Uuid::new_v4().to_string(),
                description,
                dataset,
                workflow,
                backend,
                strategy,
            },
        );

        tracing::info!(experiment = name.as_str(), "experiment created");
        self.bus
            .enqueue(Event::log(SOURCE, format!("{name} created successfully!")));
        Some(name)
    }

    /// Replace the parameter grid of `experiment` with domain-named `params`.
    ///
    /// Names are translated through the estimator registry; unknown
    /// estimators and parameters are dropped. Returns false if nothing was stored.
    pub fn set_param_values(&mut self, experiment: &str, params: &Map<String, Value>) -> bool {
        if experiment.is_empty() {
            self.warn("Missing experiment name when setting param values");
            return false;
        }
        if !self.experiments.contains_key(experiment) {
            self.warn(format!("Experiment {experiment} does not exist"));
            return false;
        }
        let Some(validated) = self.registry.validate_parameters(params) else {
            self.warn(format!("No valid parameters for experiment {experiment}"));
            return false;
        };

        self.param_values
            .insert(experiment.to_string(), ParameterMap::from_json(&Value::Object(validated)));
        true
    }

    fn build(
        &self,
        name: String,
        experiment_id: String,
        description: String,
        dataset: Rc<Dataset>,
        entry: &Entry,
        parameters: ParameterMap,
    ) -> Experiment {
        Experiment::builder(name)
            .experiment_id(experiment_id)
            .description(description)
            .dataset(dataset)
            .pipeline(entry.workflow.clone())
            .strategy(entry.strategy.clone())
            .parameters(parameters)
            .backend(Rc::clone(&entry.backend))
            .bus(Rc::clone(&self.bus))
            .build()
    }

    /// Run every created experiment that has a dataset, in creation order.
    ///
    /// # Errors
    ///
    /// The first fatal error of any experiment.
    pub fn execute_experiments(&self) -> Result<Vec<ExecutionRecord>> {
        let mut executions = Vec::new();
        for (name, entry) in &self.experiments {
            let Some(dataset) = &entry.dataset else {
                self.warn(format!(
                    "Dataset is not present for experiment {name}. Experiment is ignored"
                ));
                continue;
            };

            let parameters = self.param_values.get(name).cloned().unwrap_or_default();
            let mut experiment = self.build(
                name.clone(),
                entry.experiment_id.clone(),
                entry.description.clone(),
                Rc::clone(dataset),
                entry,
                parameters,
            );
            executions.push(experiment.run(Provenance::new())?);
        }
        Ok(executions)
    }

    /// Run experiments over several registered datasets.
    ///
    /// Each (experiment, dataset) pair runs as its own experiment named
    /// `<experiment>(<dataset>)`. Unknown experiments and datasets are
    /// skipped, and so are pairs the admission guard rejects.
    ///
    /// # Errors
    ///
    /// The first fatal error of any run.
    pub fn do_experiments(&self, plan: &IndexMap<String, Vec<String>>) -> Result<Vec<ExecutionRecord>> {
        let mut executions = Vec::new();
        for (name, datasets) in plan {
            let Some(entry) = self.experiments.get(name) else {
                self.warn(format!("Experiment {name} does not exist"));
                continue;
            };

            for dataset_name in datasets {
                let Some(dataset) = self.get_local_dataset(dataset_name) else {
                    continue;
                };
                if let Admission::Rejected { reason, .. } = admit(&dataset, &entry.workflow) {
                    self.warn(format!("{reason}. This dataset will be disregarded"));
                    continue;
                }

                let parameters = self.param_values.get(name).cloned().unwrap_or_default();
                let mut experiment = self.build(
                    format!("{name}({dataset_name})"),
                    format!("{}-{dataset_name}", entry.experiment_id),
                    format!("{} with dataset {dataset_name}", entry.description),
                    dataset,
                    entry,
                    parameters,
                );
                executions.push(experiment.run(Provenance::new())?);
            }
        }
        Ok(executions)
    }
}

/// True if `backend` already holds an experiment called `name`.
fn is_stored(backend: &dyn Backend, name: &str) -> bool {
    match backend.get(EntityKind::Experiment, name) {
        Ok(found) => found.is_some(),
        Err(err) => {
            tracing::warn!(experiment = name, backend = backend.name(), %err, "cannot check stored experiments");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::events::names;
    use crate::experiment::LifecycleState;
    use crate::repository::{Entity, MemoryBackend, Search};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn recorded(bus: &EventBus, name: &'static str) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.register(name, move |_, event| {
            sink.borrow_mut().push(event.str_arg("message").to_string());
        });
        seen
    }

    fn classes() -> Dataset {
        Dataset::new(
            "classes",
            (0..8).map(|i| vec![f64::from(i)]).collect(),
            (0..8).map(|i| f64::from(i % 2)).collect(),
        )
        .unwrap()
    }

    fn continuous() -> Dataset {
        Dataset::new(
            "continuous",
            (0..8).map(|i| vec![f64::from(i)]).collect(),
            (0..8).map(|i| f64::from(i) * 0.5 + 0.25).collect(),
        )
        .unwrap()
    }

    fn setup() -> (ExperimentCreator, Rc<MemoryBackend>) {
        let mut creator = ExperimentCreator::new(Rc::new(EventBus::new()));
        creator.register_dataset(classes());
        creator.register_dataset(continuous());
        (creator, Rc::new(MemoryBackend::new()))
    }

    fn pipeline(creator: &ExperimentCreator, names: &[&str]) -> Pipeline {
        creator.registry().create_pipeline(names, None).unwrap()
    }

    #[test]
    fn test_missing_parts_are_soft_failures() {
        let (mut creator, _) = setup();
        let errors = recorded(creator.bus(), names::ERROR);

        let created = creator.create_experiment(NewExperiment::new("incomplete"));

        assert!(created.is_none());
        assert_eq!(errors.borrow().len(), 3);
        assert!(errors.borrow()[0].contains("Description is missing"));
        assert_eq!(creator.experiment_names().count(), 0);
    }

    #[test]
    fn test_names_are_unique() {
        let (mut creator, backend) = setup();
        let errors = recorded(creator.bus(), names::ERROR);
        let workflow = pipeline(&creator, &["majority_classifier"]);
        let request = || {
            NewExperiment::new("baseline")
                .description("majority vote")
                .workflow(workflow.clone())
                .backend(backend.clone())
        };

        let first = request().dataset_named("classes");
        assert_eq!(creator.create_experiment(first).as_deref(), Some("baseline"));
        creator.execute_experiments().unwrap();

        let second = request().description("replacement");
        assert!(creator.create_experiment(second).is_none());
        assert!(errors.borrow().last().unwrap().contains("should be unique"));

        let Some(Entity::Experiment(stored)) = backend.get(EntityKind::Experiment, "baseline").unwrap()
        else {
            panic!("experiment not stored");
        };
        assert_eq!(stored.description(), "majority vote");
    }

    #[test]
    fn test_name_stored_by_another_creator_is_refused() {
        let (mut first, backend) = setup();
        let request = |creator: &ExperimentCreator, description: &str| {
            NewExperiment::new("shared")
                .description(description)
                .dataset_named("classes")
                .workflow(pipeline(creator, &["majority_classifier"]))
                .backend(backend.clone())
        };
        first.create_experiment(request(&first, "original")).unwrap();
        first.execute_experiments().unwrap();

        let (mut second, _) = setup();
        let errors = recorded(second.bus(), names::ERROR);
        assert!(second.create_experiment(request(&second, "impostor")).is_none());
        assert!(errors.borrow()[0].contains("should be unique"));
    }

    #[test]
    fn test_executing_twice_reuses_the_experiment() {
        let (mut creator, backend) = setup();
        creator
            .create_experiment(
                NewExperiment::new("again")
                    .description("majority")
                    .dataset_named("classes")
                    .workflow(pipeline(&creator, &["majority_classifier"]))
                    .backend(backend.clone()),
            )
            .unwrap();

        creator.execute_experiments().unwrap();
        creator.execute_experiments().unwrap();

        let runs = backend
            .list(EntityKind::Run, &Search::all().in_experiment("again"))
            .unwrap();
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_classifier_on_continuous_targets_is_refused() {
        let (mut creator, backend) = setup();
        let warnings = recorded(creator.bus(), names::WARN);

        let request = NewExperiment::new("bad")
            .description("classifier on regression data")
            .dataset_named("continuous")
            .workflow(pipeline(&creator, &["majority_classifier"]))
            .backend(backend);

        assert!(creator.create_experiment(request).is_none());
        assert!(warnings.borrow()[0].contains("will be discarded"));
    }

    #[test]
    fn test_unknown_dataset_name_is_refused() {
        let (mut creator, backend) = setup();
        let request = NewExperiment::new("lost")
            .description("no such dataset")
            .dataset_named("mnist")
            .workflow(pipeline(&creator, &["mean_regressor"]))
            .backend(backend);
        assert!(creator.create_experiment(request).is_none());
    }

    #[test]
    fn test_empty_name_is_generated() {
        let (mut creator, backend) = setup();
        let request = NewExperiment::new("")
            .description("anonymous")
            .workflow(pipeline(&creator, &["mean_regressor"]))
            .backend(backend);
        let name = creator.create_experiment(request).unwrap();
        assert!(name.starts_with("experiment-"));
    }

    #[test]
    fn test_set_param_values_translates_names() {
        let (mut creator, backend) = setup();
        let request = NewExperiment::new("shrink")
            .description("shrinkage sweep")
            .workflow(pipeline(&creator, &["mean_regressor"]))
            .backend(backend);
        creator.create_experiment(request).unwrap();

        let params = object(json!({
            "mean_regressor": {"shrinkage": [0.0, 0.5], "bogus": [1]},
            "unknown_estimator": {"x": [1]}
        }));
        assert!(creator.set_param_values("shrink", &params));
        assert_eq!(
            creator.param_values("shrink").unwrap().to_json(),
            json!({"mean_regressor": {"alpha": [0.0, 0.5]}})
        );

        assert!(!creator.set_param_values("missing", &params));
        assert!(!creator.set_param_values("shrink", &object(json!({"nope": {}}))));
    }

    #[test]
    fn test_execute_skips_experiments_without_dataset() {
        let (mut creator, backend) = setup();
        creator
            .create_experiment(
                NewExperiment::new("with-data")
                    .description("runs")
                    .dataset_named("classes")
                    .workflow(pipeline(&creator, &["majority_classifier"]))
                    .backend(backend.clone()),
            )
            .unwrap();
        creator
            .create_experiment(
                NewExperiment::new("without-data")
                    .description("skipped")
                    .workflow(pipeline(&creator, &["mean_regressor"]))
                    .backend(backend.clone()),
            )
            .unwrap();

        let executions = creator.execute_experiments().unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].experiment_name(), "with-data");
        assert_eq!(executions[0].state(), LifecycleState::Completed);
    }

    #[test]
    fn test_do_experiments_derives_names_and_guards() {
        let (mut creator, backend) = setup();
        creator
            .create_experiment(
                NewExperiment::new("vote")
                    .description("majority")
                    .workflow(pipeline(&creator, &["majority_classifier"]))
                    .backend(backend.clone()),
            )
            .unwrap();

        let plan = IndexMap::from([(
            "vote".to_string(),
            vec!["classes".to_string(), "continuous".to_string(), "mnist".to_string()],
        )]);
        let executions = creator.do_experiments(&plan).unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].experiment_name(), "vote(classes)");
        let stored = backend
            .list(EntityKind::Experiment, &Search::all())
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), "vote(classes)");
    }
}
