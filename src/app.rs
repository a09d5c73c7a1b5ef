//! Application facade: configuration, repositories, event bus and creator

use std::path::Path;
use std::rc::Rc;

use crate::config::TrackerConfig;
use crate::creator::ExperimentCreator;
use crate::events::{EventBus, Logger, TracingLogger};
use crate::experiment::{ExperimentRecord, RunRecord};
use crate::lifecycle::{Experiment, ExperimentBuilder};
use crate::repository::{
    Backend, DualBackend, Entity, EntityKind, FileBackend, HttpBackend, PutOptions, Search,
};
use crate::{Error, Result};

/// Entry point binding configuration, repositories and the creator together.
///
/// Writes go through a [`DualBackend`]: the local repository always, the
/// remote one unless the configuration says `offline`.
pub struct TrackerApp {
    config: TrackerConfig,
    backend: Rc<DualBackend>,
    bus: Rc<EventBus>,
    creator: ExperimentCreator,
}

impl TrackerApp {
    /// Build repositories from `config`.
    ///
    /// # Errors
    ///
    /// The local git repository or the HTTP client cannot be created.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let root = &config.local.root_dir;
        let local: Rc<dyn Backend> = if config.local.versioned {
            Rc::new(FileBackend::git(root)?)
        } else {
            Rc::new(FileBackend::new(root))
        };
        let remote: Rc<dyn Backend> =
            Rc::new(HttpBackend::new(&config.http.base_url, config.http.token.clone())?);

        tracing::info!(
            root = %root.display(),
            remote = config.http.base_url.as_str(),
            offline = config.general.offline,
            "tracker initialized"
        );
        let offline = config.general.offline;
        Ok(Self::with_backends(config, local, Some(remote), offline))
    }

    /// Load the configuration (see [`TrackerConfig::load`]) and build the app.
    ///
    /// # Errors
    ///
    /// Configuration or repository errors.
    pub fn from_config_file(file: Option<&Path>) -> Result<Self> {
        Self::new(TrackerConfig::load(file, None)?)
    }

    /// App over explicit repositories.
    #[must_use]
    pub fn with_backends(
        config: TrackerConfig,
        local: Rc<dyn Backend>,
        remote: Option<Rc<dyn Backend>>,
        offline: bool,
    ) -> Self {
        let bus = Rc::new(EventBus::with_loggers([
            Rc::new(TracingLogger) as Rc<dyn Logger>
        ]));
        let backend = Rc::new(DualBackend::new(local, remote).offline(offline));
        let creator = ExperimentCreator::new(Rc::clone(&bus));
        Self {
            config,
            backend,
            bus,
            creator,
        }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Local-plus-remote repository.
    #[must_use]
    pub fn backend(&self) -> Rc<dyn Backend> {
        Rc::clone(&self.backend) as Rc<dyn Backend>
    }

    /// Event bus shared by every experiment the app creates.
    #[must_use]
    pub const fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Experiment creator.
    #[must_use]
    pub const fn creator(&self) -> &ExperimentCreator {
        &self.creator
    }

    /// Experiment creator, mutably.
    pub fn creator_mut(&mut self) -> &mut ExperimentCreator {
        &mut self.creator
    }

    /// Experiment builder wired to the app's repository and bus.
    #[must_use]
    pub fn experiment(&self, name: impl Into<String>) -> ExperimentBuilder {
        Experiment::builder(name)
            .backend(self.backend())
            .bus(Rc::clone(&self.bus))
    }

    /// Experiments whose name matches the `search` regex, paged by `start`/`count`.
    ///
    /// # Errors
    ///
    /// Invalid pattern or storage failures.
    pub fn list_experiments(
        &self,
        search: Option<&str>,
        start: usize,
        count: Option<usize>,
    ) -> Result<Vec<ExperimentRecord>> {
        let search = search.map_or_else(|| Ok(Search::all()), Search::folder)?;
        let experiments = self
            .backend
            .list(EntityKind::Experiment, &search)?
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::Experiment(record) => Some(record),
                _ => None,
            })
            .skip(start)
            .take(count.unwrap_or(usize::MAX))
            .collect();
        Ok(experiments)
    }

    /// Runs of `experiment`.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let runs = self
            .backend
            .list(EntityKind::Run, &Search::all().in_experiment(experiment))?
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::Run(record) => Some(record),
                _ => None,
            })
            .collect();
        Ok(runs)
    }

    /// Delete every experiment matching the `search` regex, with its
    /// executions, runs, splits and metrics.
    ///
    /// Returns the number of experiments deleted.
    ///
    /// # Errors
    ///
    /// Invalid pattern or storage failures.
    pub fn delete_experiments(&self, search: &str) -> Result<usize> {
        let matching = self
            .backend
            .list(EntityKind::Experiment, &Search::folder(search)?)?;
        let mut deleted = 0;
        for experiment in &matching {
            if self.backend.delete(EntityKind::Experiment, experiment.id())? {
                deleted += 1;
            }
        }
        tracing::info!(search, deleted, "experiments deleted");
        Ok(deleted)
    }

    fn remote(&self) -> Result<&Rc<dyn Backend>> {
        if self.backend.is_offline() {
            return Err(Error::Config("remote repository unavailable in offline mode".into()));
        }
        self.backend
            .remote()
            .ok_or_else(|| Error::Config("no remote repository configured".into()))
    }

    /// Copy experiment `name` and everything below it to the remote repository.
    ///
    /// Returns the number of entities copied.
    ///
    /// # Errors
    ///
    /// Offline mode, a missing experiment, storage or transport failures.
    pub fn upload_local_experiment(&self, name: &str) -> Result<usize> {
        let remote = self.remote()?;
        copy_experiment(self.backend.local().as_ref(), remote.as_ref(), name)
    }

    /// Copy experiment `name` and everything below it from the remote repository.
    ///
    /// Returns the number of entities copied.
    ///
    /// # Errors
    ///
    /// Offline mode, a missing experiment, storage or transport failures.
    pub fn download_remote_experiment(&self, name: &str) -> Result<usize> {
        let remote = self.remote()?;
        copy_experiment(remote.as_ref(), self.backend.local().as_ref(), name)
    }
}

/// Experiment, its executions and code, runs, splits and metrics, parents first.
fn experiment_tree(from: &dyn Backend, name: &str) -> Result<Vec<Entity>> {
    let experiment = from
        .get(EntityKind::Experiment, name)?
        .ok_or_else(|| Error::not_found(EntityKind::Experiment, name))?;
    let scope = Search::all().in_experiment(name);

    let executions = from.list(EntityKind::Execution, &scope)?;
    let hashes: Vec<&str> = executions
        .iter()
        .filter_map(|entity| match entity {
            Entity::Execution(record) => record.code_hash(),
            _ => None,
        })
        .collect();
    let code: Vec<Entity> = from
        .list(EntityKind::Code, &Search::all())?
        .into_iter()
        .filter(|entity| matches!(entity, Entity::Code(record) if hashes.contains(&record.cas_hash())))
        .collect();

    let runs = from.list(EntityKind::Run, &scope)?;
    let mut tree = vec![experiment];
    tree.extend(code);
    tree.extend(executions);
    let mut metrics = Vec::new();
    for run in &runs {
        metrics.extend(from.list(EntityKind::Metric, &Search::all().in_run(run.id()))?);
    }
    tree.extend(runs);
    tree.extend(from.list(EntityKind::Split, &scope)?);
    tree.extend(metrics);
    Ok(tree)
}

fn copy_experiment(from: &dyn Backend, to: &dyn Backend, name: &str) -> Result<usize> {
    let tree = experiment_tree(from, name)?;
    let options = PutOptions::overwrite().with_message(format!("Copied experiment {name}"));
    for entity in &tree {
        to.put(entity, &options)?;
    }
    tracing::info!(experiment = name, from = from.name(), to = to.name(), entities = tree.len(), "experiment copied");
    Ok(tree.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::experiment::CodeRecord;
    use crate::lifecycle::Provenance;
    use crate::repository::MemoryBackend;

    struct Fixture {
        app: TrackerApp,
        local: Rc<MemoryBackend>,
        remote: Rc<MemoryBackend>,
    }

    fn fixture(offline: bool) -> Fixture {
        let local = Rc::new(MemoryBackend::new());
        let remote = Rc::new(MemoryBackend::new());
        let app = TrackerApp::with_backends(
            TrackerConfig::default(),
            local.clone(),
            Some(remote.clone() as Rc<dyn Backend>),
            offline,
        );
        Fixture { app, local, remote }
    }

    fn run_experiment(app: &TrackerApp, name: &str) {
        let dataset = Dataset::new(
            "line",
            (0..8).map(|i| vec![f64::from(i)]).collect(),
            (0..8).map(|i| f64::from(i) + 0.5).collect(),
        )
        .unwrap();
        let pipeline = app
            .creator()
            .registry()
            .create_pipeline(&["mean_regressor"], None)
            .unwrap();
        let mut experiment = app
            .experiment(name)
            .description("mean baseline")
            .dataset(Rc::new(dataset))
            .pipeline(pipeline)
            .build();
        experiment
            .run(Provenance::new().code(CodeRecord::function("train", "fn train() {}")))
            .unwrap();
    }

    #[test]
    fn test_list_experiments_pages() {
        let Fixture { app, .. } = fixture(true);
        for name in ["a-exp", "b-exp", "c-exp", "other"] {
            run_experiment(&app, name);
        }

        let all = app.list_experiments(None, 0, None).unwrap();
        assert_eq!(all.len(), 4);

        let page: Vec<_> = app
            .list_experiments(Some("-exp$"), 1, Some(1))
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(page, ["b-exp"]);
    }

    #[test]
    fn test_list_runs_and_delete() {
        let Fixture { app, local, .. } = fixture(true);
        run_experiment(&app, "iris");
        run_experiment(&app, "wine");

        let iris_run = app.list_runs("iris").unwrap()[0].run_id().to_string();
        let wine_run = app.list_runs("wine").unwrap()[0].run_id().to_string();
        assert_eq!(app.delete_experiments("^iris$").unwrap(), 1);
        assert!(app.list_runs("iris").unwrap().is_empty());
        for kind in [EntityKind::Split, EntityKind::Execution] {
            assert!(local.list(kind, &Search::all().in_experiment("iris")).unwrap().is_empty());
            assert!(!local.list(kind, &Search::all().in_experiment("wine")).unwrap().is_empty());
        }
        assert!(local
            .list(EntityKind::Metric, &Search::all().in_run(iris_run))
            .unwrap()
            .is_empty());
        assert!(!local
            .list(EntityKind::Metric, &Search::all().in_run(wine_run))
            .unwrap()
            .is_empty());
        assert_eq!(app.list_experiments(None, 0, None).unwrap().len(), 1);
    }

    #[test]
    fn test_offline_refuses_transfer() {
        let Fixture { app, remote, .. } = fixture(true);
        run_experiment(&app, "iris");

        assert!(remote.is_empty());
        assert!(matches!(app.upload_local_experiment("iris"), Err(Error::Config(_))));
    }

    #[test]
    fn test_upload_then_download() {
        let Fixture { app, local, remote } = fixture(true);
        run_experiment(&app, "iris");
        let stored = local.len();

        let online = TrackerApp::with_backends(
            TrackerConfig::default(),
            local.clone(),
            Some(remote.clone() as Rc<dyn Backend>),
            false,
        );
        let copied = online.upload_local_experiment("iris").unwrap();
        assert_eq!(copied, stored);
        assert_eq!(remote.len(), stored);

        local.clear();
        assert_eq!(online.download_remote_experiment("iris").unwrap(), stored);
        assert_eq!(local.len(), stored);
        assert!(online.download_remote_experiment("missing").is_err());
    }
}
