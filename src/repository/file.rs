//! Local file backend

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::layout::{self, METADATA_FILE};
use super::{Backend, Entity, EntityKind, PutOptions, Search};
use crate::experiment::{
    CodeRecord, ComputationMetrics, ComputationResult, DatasetRecord, ExecutionRecord,
    ExperimentRecord, MetricRecord, RunRecord, SplitRecord,
};
use crate::{Error, Result};

/// Versioning strategy run after every successful write or delete.
pub trait Versioning {
    /// Record the current state of the tree under `root`.
    ///
    /// # Errors
    ///
    /// Failures of the versioning system.
    fn commit(&self, root: &Path, message: &str) -> Result<()>;
}

/// No versioning.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unversioned;

impl Versioning for Unversioned {
    fn commit(&self, _root: &Path, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Entities as JSON metadata plus binary payloads below a root directory.
///
/// See [`layout`] for the directory structure. Directories are created
/// lazily on first write.
#[derive(Debug)]
pub struct FileBackend<V = Unversioned> {
    root: PathBuf,
    versioning: V,
}

impl FileBackend {
    /// Unversioned backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_versioning(root, Unversioned)
    }
}

impl<V: Versioning> FileBackend<V> {
    /// Backend rooted at `root` using `versioning` after every change.
    pub fn with_versioning(root: impl Into<PathBuf>, versioning: V) -> Self {
        Self {
            root: root.into(),
            versioning,
        }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Versioning strategy.
    #[must_use]
    pub const fn versioning(&self) -> &V {
        &self.versioning
    }

    /// Read the entity of `kind` stored in `dir`.
    ///
    /// # Errors
    ///
    /// Missing or malformed files.
    pub fn get_by_dir(&self, kind: EntityKind, dir: &Path) -> Result<Entity> {
        let entity = match kind {
            EntityKind::Dataset => {
                let mut record: DatasetRecord = read_json(dir, METADATA_FILE)?;
                record.set_payload(read_bin(dir, layout::DATA_FILE)?);
                Entity::Dataset(record)
            }
            EntityKind::Experiment => Entity::Experiment(read_json::<ExperimentRecord>(dir, METADATA_FILE)?),
            EntityKind::Execution => Entity::Execution(read_json::<ExecutionRecord>(dir, METADATA_FILE)?),
            EntityKind::Run => Entity::Run(read_json::<RunRecord>(dir, METADATA_FILE)?),
            EntityKind::Split => {
                let mut record: SplitRecord = read_json(dir, METADATA_FILE)?;
                let results: Vec<ComputationResult> = read_json_or_default(dir, layout::RESULTS_FILE)?;
                let metrics: Vec<ComputationMetrics> = read_json_or_default(dir, layout::METRICS_FILE)?;
                record.set_payload(results, metrics);
                Entity::Split(record)
            }
            EntityKind::Code => {
                let mut record: CodeRecord = read_json(dir, METADATA_FILE)?;
                let code = dir.join(layout::CODE_FILE);
                record.set_payload(if code.is_file() { Some(fs::read(code)?) } else { None });
                Entity::Code(record)
            }
            EntityKind::Metric => {
                let mut record: MetricRecord = read_json(dir, METADATA_FILE)?;
                let values: Option<Vec<f64>> = read_bin(dir, layout::METRIC_VALUES_FILE)?;
                record.set_values(values.unwrap_or_default());
                Entity::Metric(record)
            }
        };
        Ok(entity)
    }

    fn entity_dirs(&self, kind: EntityKind) -> Vec<PathBuf> {
        let section = self.root.join(layout::section(kind));
        if !section.is_dir() {
            return Vec::new();
        }
        let depth = layout::depth(kind);
        let suffix = layout::suffix(kind);

        WalkDir::new(section)
            .min_depth(depth)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
            .filter(|e| e.path().join(METADATA_FILE).is_file())
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    fn dirs_matching(&self, kind: EntityKind, search: &Search) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for dir in self.entity_dirs(kind) {
            if search.matches(&self.get_by_dir(kind, &dir)?) {
                dirs.push(dir);
            }
        }
        Ok(dirs)
    }

    fn locate(&self, kind: EntityKind, id: &str) -> Option<PathBuf> {
        if super::check_identity(kind, id).is_err() {
            return None;
        }
        let folder = layout::folder_name(kind, id);
        if layout::depth(kind) == 1 {
            let dir = self.root.join(layout::section(kind)).join(folder);
            return dir.join(METADATA_FILE).is_file().then_some(dir);
        }
        self.entity_dirs(kind)
            .into_iter()
            .find(|dir| dir.file_name().is_some_and(|name| name == folder.as_str()))
    }

    fn write_entity(&self, dir: &Path, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Dataset(record) => {
                write_json(dir, METADATA_FILE, &record.metadata())?;
                if let Some(data) = record.payload() {
                    write_bin(dir, layout::DATA_FILE, data)?;
                }
            }
            Entity::Experiment(record) => write_json(dir, METADATA_FILE, record)?,
            Entity::Execution(record) => write_json(dir, METADATA_FILE, record)?,
            Entity::Run(record) => write_json(dir, METADATA_FILE, record)?,
            Entity::Split(record) => {
                write_json(dir, METADATA_FILE, &record.metadata())?;
                write_json(dir, layout::RESULTS_FILE, record.results())?;
                write_json(dir, layout::METRICS_FILE, record.metrics())?;
            }
            Entity::Code(record) => {
                write_json(dir, METADATA_FILE, &record.metadata())?;
                if let Some(code) = record.payload() {
                    write_atomic(&dir.join(layout::CODE_FILE), code)?;
                }
            }
            Entity::Metric(record) => {
                write_json(dir, METADATA_FILE, &record.metadata())?;
                write_bin(dir, layout::METRIC_VALUES_FILE, record.values())?;
            }
        }
        Ok(())
    }
}

impl<V: Versioning> Backend for FileBackend<V> {
    fn name(&self) -> &str {
        "file"
    }

    fn list(&self, kind: EntityKind, search: &Search) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        for dir in self.entity_dirs(kind) {
            let entity = self.get_by_dir(kind, &dir)?;
            if search.matches(&entity) {
                entities.push(entity);
            }
        }
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        self.locate(kind, id)
            .map(|dir| self.get_by_dir(kind, &dir))
            .transpose()
    }

    fn put(&self, entity: &Entity, options: &PutOptions) -> Result<()> {
        let mut owned;
        let entity = if entity.id().is_empty() {
            owned = entity.clone();
            owned.assign_missing_id();
            &owned
        } else {
            entity
        };

        let dir = self.root.join(layout::directory(entity)?);
        if dir.join(METADATA_FILE).exists() {
            if !options.allow_overwrite {
                return Err(Error::conflict(entity.kind(), entity.id()));
            }
            clear_files(&dir)?;
        }

        fs::create_dir_all(&dir)?;
        self.write_entity(&dir, entity)?;

        let message = options.message.as_deref().unwrap_or(super::DEFAULT_COMMIT_MESSAGE);
        self.versioning.commit(&self.root, message)?;

        tracing::debug!(kind = %entity.kind(), id = entity.id(), dir = %dir.display(), "entity written");
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let Some(dir) = self.locate(kind, id) else {
            return Ok(false);
        };

        // Executions and metrics live outside the nested experiment tree.
        let mut detached = Vec::new();
        let runs: Vec<String> = match kind {
            EntityKind::Experiment => {
                detached.extend(self.dirs_matching(EntityKind::Execution, &Search::all().in_experiment(id))?);
                self.list(EntityKind::Run, &Search::all().in_experiment(id))?
                    .iter()
                    .map(|run| run.id().to_string())
                    .collect()
            }
            EntityKind::Run => vec![id.to_string()],
            _ => Vec::new(),
        };
        for run in &runs {
            detached.extend(self.dirs_matching(EntityKind::Metric, &Search::all().in_run(run.as_str()))?);
        }

        fs::remove_dir_all(&dir)?;
        for dir in &detached {
            fs::remove_dir_all(dir)?;
        }
        self.versioning.commit(&self.root, &format!("Removed {kind} {id}"))?;

        tracing::debug!(%kind, id, detached = detached.len(), "entity removed");
        Ok(true)
    }
}

/// Remove the files of an entity directory, keeping child entity directories.
fn clear_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Write via a uniquely named sibling temp file and rename, so readers never see partial files.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> Result<()> {
    write_atomic(&dir.join(file), &serde_json::to_vec_pretty(value)?)
}

fn write_bin<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> Result<()> {
    write_atomic(&dir.join(file), &bincode::serialize(value)?)
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let bytes = fs::read(&path)
        .map_err(|e| Error::StorageError(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_json_or_default<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> Result<T> {
    if dir.join(file).is_file() {
        read_json(dir, file)
    } else {
        Ok(T::default())
    }
}

fn read_bin<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Option<T>> {
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(bincode::deserialize(&fs::read(path)?)?))
}
