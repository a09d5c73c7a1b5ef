//! Local plus remote repository behind one [`Backend`]

use std::collections::BTreeMap;
use std::rc::Rc;

use super::{Backend, Entity, EntityKind, Progress, PutOptions, Search};
use crate::experiment::SplitRecord;
use crate::Result;

/// Fans writes out to a local and an optional remote backend.
///
/// - `put`/`delete` hit the local backend first. Local failures propagate;
///   remote failures are logged and swallowed.
/// - Offline mode skips the remote backend entirely.
/// - `get` prefers the local entry and falls back to the remote one.
/// - `list` merges both result sets, local entries winning on identity.
pub struct DualBackend {
    local: Rc<dyn Backend>,
    remote: Option<Rc<dyn Backend>>,
    offline: bool,
}

impl DualBackend {
    /// Dispatcher over `local` and `remote`.
    pub fn new(local: Rc<dyn Backend>, remote: Option<Rc<dyn Backend>>) -> Self {
        Self {
            local,
            remote,
            offline: false,
        }
    }

    /// Skip the remote backend for every call.
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// True if remote calls are skipped.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        self.offline
    }

    /// Local backend.
    #[must_use]
    pub fn local(&self) -> &Rc<dyn Backend> {
        &self.local
    }

    /// Remote backend, if one is configured.
    #[must_use]
    pub fn remote(&self) -> Option<&Rc<dyn Backend>> {
        self.remote.as_ref()
    }

    fn online_remote(&self) -> Option<&dyn Backend> {
        if self.offline {
            return None;
        }
        self.remote.as_deref()
    }

    fn remote_read<T>(&self, op: &str, call: impl FnOnce(&dyn Backend) -> Result<T>) -> Option<T> {
        let remote = self.online_remote()?;
        match call(remote) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(backend = remote.name(), op, %err, "remote read failed");
                None
            }
        }
    }
}

impl Backend for DualBackend {
    fn name(&self) -> &str {
        "dual"
    }

    fn list(&self, kind: EntityKind, search: &Search) -> Result<Vec<Entity>> {
        let mut merged = BTreeMap::new();
        if let Some(remote) = self.remote_read("list", |b| b.list(kind, search)) {
            for entity in remote {
                merged.insert(entity.id().to_string(), entity);
            }
        }
        for entity in self.local.list(kind, search)? {
            merged.insert(entity.id().to_string(), entity);
        }
        Ok(merged.into_values().collect())
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        if let Some(entity) = self.local.get(kind, id)? {
            return Ok(Some(entity));
        }
        Ok(self.remote_read("get", |b| b.get(kind, id)).flatten())
    }

    fn put(&self, entity: &Entity, options: &PutOptions) -> Result<()> {
        // Both sides must agree on a generated split id.
        let mut owned = entity.clone();
        owned.assign_missing_id();

        self.local.put(&owned, options)?;
        if let Some(remote) = self.online_remote() {
            if let Err(err) = remote.put(&owned, options) {
                tracing::warn!(
                    backend = remote.name(),
                    kind = %owned.kind(),
                    id = owned.id(),
                    %err,
                    "remote write failed"
                );
            }
        }
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let mut removed = self.local.delete(kind, id)?;
        if let Some(remote) = self.online_remote() {
            match remote.delete(kind, id) {
                Ok(gone) => removed |= gone,
                Err(err) => tracing::warn!(backend = remote.name(), %kind, id, %err, "remote delete failed"),
            }
        }
        Ok(removed)
    }

    fn put_progress(&self, split: &SplitRecord, progress: &Progress) {
        self.local.put_progress(split, progress);
        if let Some(remote) = self.online_remote() {
            remote.put_progress(split, progress);
        }
    }
}
