//! In-memory backend using `DashMap`.
//!
//! Nothing survives the process. Useful for tests and dry runs.

use dashmap::DashMap;

use super::{Backend, Entity, EntityKind, PutOptions, Search};
use crate::{Error, Result};

type Key = (EntityKind, String);

/// In-memory backend with the same put/delete semantics as [`FileBackend`](super::FileBackend).
///
/// Deleting an experiment also removes its executions, runs, splits and the
/// metrics of its runs; deleting a run removes its splits and metrics.
///
/// # Example
///
/// ```rust
/// use trueno_exp::experiment::RunRecord;
/// use trueno_exp::repository::{Backend, Entity, EntityKind, MemoryBackend, PutOptions, Search};
///
/// let backend = MemoryBackend::new();
/// let run = RunRecord::builder("exec-1", "iris").run_id("r1").build();
/// backend.put(&Entity::Run(run), &PutOptions::new())?;
///
/// let runs = backend.list(EntityKind::Run, &Search::all().in_experiment("iris"))?;
/// assert_eq!(runs.len(), 1);
/// # Ok::<(), trueno_exp::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    store: DashMap<Key, Entity>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Number of stored entities, all kinds together.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn list(&self, kind: EntityKind, search: &Search) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .store
            .iter()
            .filter(|entry| entry.key().0 == kind && search.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        Ok(self
            .store
            .get(&(kind, id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    fn put(&self, entity: &Entity, options: &PutOptions) -> Result<()> {
        let mut entity = entity.clone();
        entity.assign_missing_id();
        entity.check_identities()?;

        let key = (entity.kind(), entity.id().to_string());
        if !options.allow_overwrite && self.store.contains_key(&key) {
            return Err(Error::conflict(key.0, &key.1));
        }
        self.store.insert(key, entity);
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let removed = self.store.remove(&(kind, id.to_string())).is_some();
        if removed {
            match kind {
                EntityKind::Experiment => {
                    let runs: Vec<String> = self
                        .store
                        .iter()
                        .filter(|entry| {
                            entry.key().0 == EntityKind::Run && entry.value().experiment_name() == Some(id)
                        })
                        .map(|entry| entry.key().1.clone())
                        .collect();
                    self.store.retain(|(k, _), entity| match k {
                        EntityKind::Execution | EntityKind::Run | EntityKind::Split => {
                            entity.experiment_name() != Some(id)
                        }
                        EntityKind::Metric => {
                            !entity.run_id().is_some_and(|run| runs.iter().any(|r| r == run))
                        }
                        _ => true,
                    });
                }
                EntityKind::Run => self.store.retain(|(k, _), entity| {
                    !(matches!(k, EntityKind::Split | EntityKind::Metric) && entity.run_id() == Some(id))
                }),
                _ => {}
            }
        }
        Ok(removed)
    }
}
