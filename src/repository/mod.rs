//! Repositories for tracked entities
//!
//! Every backend implements the narrow [`Backend`] contract. Versioning
//! (git) and remote transport (HTTP) are separate strategies composed
//! around it instead of being layered by inheritance:
//!
//! ```text
//!                  ┌──────────── DualBackend ────────────┐
//!                  │                                     │
//!        FileBackend<V: Versioning>               HttpBackend
//!          │                 │
//!      Unversioned      GitVersioning (write → stage → commit)
//! ```
//!
//! [`MemoryBackend`] keeps everything in a concurrent map and behaves like
//! the file backend without touching disk.
//!
//! ## Usage
//!
//! ```rust
//! use trueno_exp::experiment::ExperimentRecord;
//! use trueno_exp::repository::{Backend, Entity, EntityKind, MemoryBackend, PutOptions};
//!
//! let backend = MemoryBackend::new();
//! let entity = Entity::Experiment(ExperimentRecord::new("iris"));
//!
//! backend.put(&entity, &PutOptions::new())?;
//! assert!(backend.put(&entity, &PutOptions::new()).is_err());
//! backend.put(&entity, &PutOptions::overwrite())?;
//!
//! assert!(backend.get(EntityKind::Experiment, "iris")?.is_some());
//! # Ok::<(), trueno_exp::Error>(())
//! ```

mod dual;
mod file;
mod git;
mod http;
pub mod layout;
mod memory;

pub use dual::DualBackend;
pub use file::{FileBackend, Unversioned, Versioning};
pub use git::{GitBackend, GitVersioning, DEFAULT_COMMIT_MESSAGE};
pub use http::HttpBackend;
pub use memory::MemoryBackend;

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::experiment::{
    CodeRecord, DatasetRecord, ExecutionRecord, ExperimentRecord, MetricRecord, RunRecord,
    SplitRecord,
};
use crate::{Error, Result};

/// Reject identities that cannot be used as a single directory name.
///
/// Identities double as folder names in the file layout and as URL path
/// segments, so they must be non-empty, must not be `.` or `..`, and must
/// not contain path separators or NUL.
///
/// # Errors
///
/// [`Error::Config`] describing the offending identity.
pub fn check_identity(kind: EntityKind, id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        "is empty"
    } else if id == "." || id == ".." {
        "is a relative path component"
    } else if id.contains(['/', '\\', '\0']) {
        "contains a path separator or NUL"
    } else {
        return Ok(());
    };
    Err(Error::Config(format!("invalid {kind} identity {id:?}: {reason}")))
}

/// Kinds of persisted entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// [`DatasetRecord`]
    Dataset,
    /// [`ExperimentRecord`]
    Experiment,
    /// [`ExecutionRecord`]
    Execution,
    /// [`RunRecord`]
    Run,
    /// [`SplitRecord`]
    Split,
    /// [`CodeRecord`]
    Code,
    /// [`MetricRecord`]
    Metric,
}

impl EntityKind {
    /// Every kind, parents before children.
    pub const ALL: [Self; 7] = [
        Self::Dataset,
        Self::Experiment,
        Self::Execution,
        Self::Run,
        Self::Split,
        Self::Code,
        Self::Metric,
    ];

    /// Singular lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Experiment => "experiment",
            Self::Execution => "execution",
            Self::Run => "run",
            Self::Split => "split",
            Self::Code => "code",
            Self::Metric => "metric",
        }
    }

    /// Overwrite policy applied when the caller does not choose one.
    ///
    /// Executions are re-put as they progress; everything else is
    /// write-once unless overwriting is requested.
    #[must_use]
    pub const fn allows_overwrite_by_default(self) -> bool {
        matches!(self, Self::Execution)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Entity {
    /// Dataset metadata plus data.
    Dataset(DatasetRecord),
    /// Experiment definition.
    Experiment(ExperimentRecord),
    /// Execution of an experiment.
    Execution(ExecutionRecord),
    /// Run of an execution.
    Run(RunRecord),
    /// Split of a run, with results and metrics.
    Split(SplitRecord),
    /// Code provenance.
    Code(CodeRecord),
    /// Single score of a computation.
    Metric(MetricRecord),
}

impl Entity {
    /// Kind of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Dataset(_) => EntityKind::Dataset,
            Self::Experiment(_) => EntityKind::Experiment,
            Self::Execution(_) => EntityKind::Execution,
            Self::Run(_) => EntityKind::Run,
            Self::Split(_) => EntityKind::Split,
            Self::Code(_) => EntityKind::Code,
            Self::Metric(_) => EntityKind::Metric,
        }
    }

    /// Lookup identity: the name for experiments, executions and code, the id otherwise.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Dataset(r) => r.dataset_id(),
            Self::Experiment(r) => r.name(),
            Self::Execution(r) => r.name(),
            Self::Run(r) => r.run_id(),
            Self::Split(r) => r.split_id(),
            Self::Code(r) => r.name(),
            Self::Metric(r) => r.metric_id(),
        }
    }

    /// Name of the experiment this entity belongs to, if any.
    #[must_use]
    pub fn experiment_name(&self) -> Option<&str> {
        match self {
            Self::Experiment(r) => Some(r.name()),
            Self::Execution(r) => Some(r.experiment_name()),
            Self::Run(r) => Some(r.experiment_name()),
            Self::Split(r) => Some(r.experiment_name()),
            Self::Dataset(_) | Self::Code(_) | Self::Metric(_) => None,
        }
    }

    /// Id of the run this entity belongs to, if any.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Run(r) => Some(r.run_id()),
            Self::Split(r) => Some(r.run_id()),
            Self::Metric(r) => Some(r.run_id()),
            _ => None,
        }
    }

    /// Check the identity and the parent identities of this entity.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for identities rejected by [`check_identity`].
    pub fn check_identities(&self) -> Result<()> {
        check_identity(self.kind(), self.id())?;
        if let Some(experiment) = self.experiment_name() {
            check_identity(EntityKind::Experiment, experiment)?;
        }
        if let Some(run) = self.run_id() {
            check_identity(EntityKind::Run, run)?;
        }
        Ok(())
    }

    /// Give a split without an id a random one. Returns true if an id was assigned.
    pub(crate) fn assign_missing_id(&mut self) -> bool {
        match self {
            Self::Split(split) if split.split_id().is_empty() => {
                split.assign_id(uuid::Uuid::new_v4().to_string());
                true
            }
            _ => false,
        }
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Serialization failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Filter applied by [`Backend::list`].
#[derive(Debug, Clone, Default)]
pub struct Search {
    folder: Option<Regex>,
    experiment: Option<String>,
    run: Option<String>,
}

impl Search {
    /// Match everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match identities against a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`](crate::Error::Pattern) for invalid patterns.
    pub fn folder(pattern: &str) -> Result<Self> {
        Ok(Self {
            folder: Some(Regex::new(pattern)?),
            ..Self::default()
        })
    }

    /// Match one identity exactly.
    #[must_use]
    pub fn exact(identity: &str) -> Self {
        Self {
            folder: Regex::new(&format!("^{}$", regex::escape(identity))).ok(),
            ..Self::default()
        }
    }

    /// Restrict to entities of one experiment.
    #[must_use]
    pub fn in_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment = Some(name.into());
        self
    }

    /// Restrict to entities of one run.
    #[must_use]
    pub fn in_run(mut self, run_id: impl Into<String>) -> Self {
        self.run = Some(run_id.into());
        self
    }

    /// Identity pattern, if any.
    #[must_use]
    pub fn folder_pattern(&self) -> Option<&str> {
        self.folder.as_ref().map(Regex::as_str)
    }

    /// Experiment filter, if any.
    #[must_use]
    pub fn experiment(&self) -> Option<&str> {
        self.experiment.as_deref()
    }

    /// Run filter, if any.
    #[must_use]
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    /// True if `entity` passes every filter.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.folder.as_ref().map_or(true, |re| re.is_match(entity.id()))
            && self
                .experiment
                .as_deref()
                .map_or(true, |name| entity.experiment_name() == Some(name))
            && self
                .run
                .as_deref()
                .map_or(true, |run| entity.run_id() == Some(run))
    }
}

/// Options for [`Backend::put`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Replace an existing entry instead of failing with a conflict.
    pub allow_overwrite: bool,
    /// Commit message for versioned backends.
    pub message: Option<String>,
}

impl PutOptions {
    /// Refuse to overwrite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow overwriting.
    #[must_use]
    pub fn overwrite() -> Self {
        Self {
            allow_overwrite: true,
            message: None,
        }
    }

    /// Default policy of `kind`.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            allow_overwrite: kind.allows_overwrite_by_default(),
            message: None,
        }
    }

    /// Set the commit message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Progress of a split, reported while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Current step, 1-based.
    pub curr_value: usize,
    /// Total number of steps.
    pub limit: usize,
    /// Phase label.
    pub phase: String,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}. phase={}", self.curr_value, self.limit, self.phase)
    }
}

/// Storage contract shared by every backend.
///
/// All calls are synchronous and block the caller.
pub trait Backend {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Entities of `kind` passing `search`, ordered by identity.
    ///
    /// # Errors
    ///
    /// Storage or transport failures.
    fn list(&self, kind: EntityKind, search: &Search) -> Result<Vec<Entity>>;

    /// Entity of `kind` with identity `id`.
    ///
    /// # Errors
    ///
    /// Storage or transport failures. A missing entry is `Ok(None)`.
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>>;

    /// Store `entity`.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`](crate::Error::Conflict) if the entry exists and
    /// `options.allow_overwrite` is false; storage or transport failures.
    fn put(&self, entity: &Entity, options: &PutOptions) -> Result<()>;

    /// Remove an entry and everything below it. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Storage or transport failures.
    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool>;

    /// Report split progress. Informational only.
    fn put_progress(&self, split: &SplitRecord, progress: &Progress) {
        tracing::debug!(backend = self.name(), split = split.split_id(), "RUN COMPUTATION: {progress}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_identity() {
        let run = RunRecord::builder("exec-1", "iris").run_id("r1").build();
        let entity = Entity::Run(run);
        assert_eq!(entity.kind(), EntityKind::Run);
        assert_eq!(entity.id(), "r1");
        assert_eq!(entity.experiment_name(), Some("iris"));
        assert_eq!(entity.run_id(), Some("r1"));
    }

    #[test]
    fn test_entity_json_is_tagged() {
        let entity = Entity::Experiment(ExperimentRecord::new("iris"));
        let json: serde_json::Value = serde_json::from_str(&entity.to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "experiment");
        assert_eq!(json["record"]["name"], "iris");
    }

    #[test]
    fn test_search_filters() {
        let split = Entity::Split(SplitRecord::new("r1", "iris", 0, vec![0], vec![1]).with_id("s1"));

        assert!(Search::all().matches(&split));
        assert!(Search::exact("s1").matches(&split));
        assert!(!Search::exact("s").matches(&split));
        assert!(Search::folder("^s").unwrap().in_run("r1").matches(&split));
        assert!(!Search::all().in_experiment("other").matches(&split));
        assert!(Search::folder("(").is_err());
    }

    #[test]
    fn test_exact_escapes_regex() {
        let search = Search::exact("iris(cv)");
        let entity = Entity::Experiment(ExperimentRecord::new("iris(cv)"));
        assert!(search.matches(&entity));
        assert_eq!(search.folder_pattern(), Some(r"^iris\(cv\)$"));
    }

    #[test]
    fn test_assign_missing_split_id() {
        let mut entity = Entity::Split(SplitRecord::new("r1", "iris", 0, vec![], vec![]).with_id(""));
        assert!(entity.assign_missing_id());
        assert!(!entity.id().is_empty());
        assert!(!entity.assign_missing_id());
    }

    #[test]
    fn test_identities_must_be_single_segments() {
        for bad in ["", ".", "..", "../../escaped", "a/b", "a\\b", "nul\0"] {
            let err = check_identity(EntityKind::Experiment, bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad:?} accepted");
        }
        for good in ["iris", "iris(cv)", "v1.2", "..hidden", "a b"] {
            assert!(check_identity(EntityKind::Experiment, good).is_ok(), "{good:?} rejected");
        }
    }

    #[test]
    fn test_parent_identities_are_checked() {
        let split = Entity::Split(SplitRecord::new("../r1", "iris", 0, vec![], vec![]).with_id("s1"));
        assert!(split.check_identities().is_err());

        let run = Entity::Run(RunRecord::builder("exec-1", "a/b").run_id("r1").build());
        assert!(run.check_identities().is_err());

        let ok = Entity::Split(SplitRecord::new("r1", "iris", 0, vec![], vec![]).with_id("s1"));
        assert!(ok.check_identities().is_ok());
    }

    #[test]
    fn test_progress_format() {
        let progress = Progress {
            curr_value: 2,
            limit: 6,
            phase: "fit".into(),
        };
        assert_eq!(progress.to_string(), "2/6. phase=fit");
    }

    #[test]
    fn test_default_overwrite_policy() {
        assert!(PutOptions::for_kind(EntityKind::Execution).allow_overwrite);
        assert!(!PutOptions::for_kind(EntityKind::Split).allow_overwrite);
    }
}
