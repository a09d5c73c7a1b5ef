//! On-disk layout of the file backend
//!
//! ```text
//! <root>/datasets/<dataset-id>/metadata.json data.bin
//! <root>/experiments/<experiment-name>.ex/metadata.json
//!   <run-id>.run/metadata.json
//!     <split-id>.split/metadata.json results.json metrics.json
//! <root>/executions/<execution-name>/metadata.json
//! <root>/code/<code-name>/metadata.json [code.bin]
//! <root>/metrics/<metric-id>/metadata.json results.bin
//! ```

use std::path::PathBuf;

use super::{Entity, EntityKind};
use crate::Result;

/// Metadata of every entity.
pub const METADATA_FILE: &str = "metadata.json";
/// Computation results of a split.
pub const RESULTS_FILE: &str = "results.json";
/// Computation metrics of a split.
pub const METRICS_FILE: &str = "metrics.json";
/// Dataset payload.
pub const DATA_FILE: &str = "data.bin";
/// Code payload.
pub const CODE_FILE: &str = "code.bin";
/// Raw values of a metric.
pub const METRIC_VALUES_FILE: &str = "results.bin";

/// Top-level directory of `kind`.
#[must_use]
pub const fn section(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Dataset => "datasets",
        EntityKind::Experiment | EntityKind::Run | EntityKind::Split => "experiments",
        EntityKind::Execution => "executions",
        EntityKind::Code => "code",
        EntityKind::Metric => "metrics",
    }
}

/// Folder suffix of `kind`.
#[must_use]
pub const fn suffix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Experiment => ".ex",
        EntityKind::Run => ".run",
        EntityKind::Split => ".split",
        _ => "",
    }
}

/// Depth of entity folders below their section.
#[must_use]
pub const fn depth(kind: EntityKind) -> usize {
    match kind {
        EntityKind::Run => 2,
        EntityKind::Split => 3,
        _ => 1,
    }
}

/// Folder name of an entity with identity `id`.
#[must_use]
pub fn folder_name(kind: EntityKind, id: &str) -> String {
    format!("{id}{}", suffix(kind))
}

/// Folder name of `entity`.
#[must_use]
pub fn to_folder_name(entity: &Entity) -> String {
    folder_name(entity.kind(), entity.id())
}

/// Directory of `entity`, relative to the repository root.
///
/// # Errors
///
/// [`Error::Config`](crate::Error::Config) if an identity on the path is
/// not a single plain directory name.
pub fn directory(entity: &Entity) -> Result<PathBuf> {
    entity.check_identities()?;
    let mut path = PathBuf::from(section(entity.kind()));
    match entity {
        Entity::Run(run) => {
            path.push(folder_name(EntityKind::Experiment, run.experiment_name()));
        }
        Entity::Split(split) => {
            path.push(folder_name(EntityKind::Experiment, split.experiment_name()));
            path.push(folder_name(EntityKind::Run, split.run_id()));
        }
        _ => {}
    }
    path.push(to_folder_name(entity));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExecutionRecord, ExperimentRecord, SplitRecord};

    #[test]
    fn test_split_directory() {
        let split = Entity::Split(SplitRecord::new("r1", "iris", 0, vec![], vec![]).with_id("s1"));
        assert_eq!(
            directory(&split).unwrap(),
            PathBuf::from("experiments/iris.ex/r1.run/s1.split")
        );
        assert_eq!(to_folder_name(&split), "s1.split");
    }

    #[test]
    fn test_execution_directory_uses_name() {
        let execution = Entity::Execution(ExecutionRecord::new("exp-1", "iris").with_name("nightly"));
        assert_eq!(directory(&execution).unwrap(), PathBuf::from("executions/nightly"));
    }

    #[test]
    fn test_experiment_directory() {
        let experiment = Entity::Experiment(ExperimentRecord::new("iris"));
        assert_eq!(directory(&experiment).unwrap(), PathBuf::from("experiments/iris.ex"));
    }

    #[test]
    fn test_directory_rejects_traversal() {
        let experiment = Entity::Experiment(ExperimentRecord::new("../../escaped"));
        assert!(matches!(directory(&experiment), Err(crate::Error::Config(_))));

        let split = Entity::Split(SplitRecord::new("r1", "a/b", 0, vec![], vec![]).with_id("s1"));
        assert!(directory(&split).is_err());
    }
}
