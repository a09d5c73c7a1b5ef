//! Git versioning: every write is staged and committed

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Repository, Signature};

use super::file::{FileBackend, Versioning};
use crate::Result;

/// Commit message used when the caller supplies none.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Added file to git";

/// File backend whose root is a git working tree.
pub type GitBackend = FileBackend<GitVersioning>;

/// Commits the whole tree after each change.
pub struct GitVersioning {
    repo: Repository,
}

impl GitVersioning {
    /// Open the repository at `root`, initializing it if needed.
    ///
    /// # Errors
    ///
    /// The directory cannot be created or libgit2 fails.
    pub fn open_or_init(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let repo = match Repository::open(root) {
            Ok(repo) => repo,
            Err(_) => {
                tracing::info!(root = %root.display(), "initializing git repository");
                Repository::init(root)?
            }
        };
        Ok(Self { repo })
    }

    /// Underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repo
    }

    fn signature(&self) -> Result<Signature<'static>> {
        // Fall back when no user.name / user.email is configured.
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("trueno-exp", "trueno-exp@localhost")?),
        }
    }
}

impl fmt::Debug for GitVersioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitVersioning")
            .field("workdir", &self.repo.workdir())
            .finish()
    }
}

impl Versioning for GitVersioning {
    fn commit(&self, _root: &Path, message: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_oid = index.write_tree()?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_oid) {
            return Ok(());
        }

        let tree = self.repo.find_tree(tree_oid)?;
        let sig = self.signature()?;
        let parents: Vec<_> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        tracing::debug!(commit = %oid, message, "committed");
        Ok(())
    }
}

impl FileBackend<GitVersioning> {
    /// File backend rooted at a (possibly new) git repository.
    ///
    /// # Errors
    ///
    /// The repository cannot be opened or created.
    pub fn git(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let versioning = GitVersioning::open_or_init(&root)?;
        Ok(Self::with_versioning(root, versioning))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::experiment::ExperimentRecord;
    use crate::repository::{Backend, Entity, EntityKind, PutOptions};

    fn messages(repo: &Repository) -> Vec<String> {
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.map(|oid| {
            let commit = repo.find_commit(oid.unwrap()).unwrap();
            commit.message().unwrap_or_default().to_string()
        })
        .collect()
    }

    #[test]
    fn test_every_write_is_committed() {
        let tmp = TempDir::new().unwrap();
        let backend = GitBackend::git(tmp.path()).unwrap();

        backend
            .put(&Entity::Experiment(ExperimentRecord::new("iris")), &PutOptions::new())
            .unwrap();
        backend
            .put(
                &Entity::Experiment(ExperimentRecord::new("wine")),
                &PutOptions::new().with_message("wine baseline"),
            )
            .unwrap();

        let log = messages(backend.versioning().repository());
        assert_eq!(log, ["wine baseline", DEFAULT_COMMIT_MESSAGE]);
    }

    #[test]
    fn test_delete_is_committed() {
        let tmp = TempDir::new().unwrap();
        let backend = GitBackend::git(tmp.path()).unwrap();
        backend
            .put(&Entity::Experiment(ExperimentRecord::new("iris")), &PutOptions::new())
            .unwrap();

        assert!(backend.delete(EntityKind::Experiment, "iris").unwrap());

        let log = messages(backend.versioning().repository());
        assert_eq!(log[0], "Removed experiment iris");
        let head = backend.versioning().repository().head().unwrap().peel_to_tree().unwrap();
        assert!(head.is_empty());
    }

    #[test]
    fn test_reopen_existing_repository() {
        let tmp = TempDir::new().unwrap();
        GitBackend::git(tmp.path()).unwrap();
        assert!(GitBackend::git(tmp.path()).is_ok());
    }
}
