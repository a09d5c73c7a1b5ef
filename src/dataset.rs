//! In-memory dataset handed to experiments

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Tabular dataset: one feature row per instance plus one target per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    id: String,
    name: String,
    kind: String,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl Dataset {
    /// Create a dataset with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the number of feature rows and
    /// targets differ, or if rows have different widths.
    pub fn new(name: impl Into<String>, features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if features.len() != targets.len() {
            return Err(Error::Precondition(format!(
                "dataset '{name}' has {} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(width) = features.first().map(Vec::len) {
            if features.iter().any(|row| row.len() != width) {
                return Err(Error::Precondition(format!(
                    "dataset '{name}' has rows of different widths"
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            kind: "multivariate".to_string(),
            features,
            targets,
        })
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the dataset kind label.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Dataset id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind label (e.g. `multivariate`).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Feature rows.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Target column.
    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Number of instances.
    #[must_use]
    pub fn size(&self) -> usize {
        self.targets.len()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// True if every target value is integer-valued (a discrete target).
    #[must_use]
    pub fn has_discrete_targets(&self) -> bool {
        self.targets.iter().all(|t| t.is_finite() && t.fract() == 0.0)
    }

    /// Rows and targets selected by `indices`.
    ///
    /// Out-of-range indices are skipped.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        indices
            .iter()
            .filter_map(|&i| Some((self.features.get(i)?.clone(), *self.targets.get(i)?)))
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            "toy",
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec![0.0, 1.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Dataset::new("bad", vec![vec![1.0]], vec![]).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Dataset::new("bad", vec![vec![1.0], vec![1.0, 2.0]], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_discrete_targets() {
        assert!(sample().has_discrete_targets());

        let continuous = Dataset::new("reg", vec![vec![1.0], vec![2.0]], vec![0.5, 1.0]).unwrap();
        assert!(!continuous.has_discrete_targets());
    }

    #[test]
    fn test_select() {
        let (x, y) = sample().select(&[2, 0, 9]);
        assert_eq!(x, vec![vec![5.0, 6.0], vec![1.0, 2.0]]);
        assert_eq!(y, vec![1.0, 0.0]);
    }

    #[test]
    fn test_shape() {
        let ds = sample();
        assert_eq!(ds.size(), 3);
        assert_eq!(ds.width(), 2);
        assert_eq!(ds.kind(), "multivariate");
    }
}
