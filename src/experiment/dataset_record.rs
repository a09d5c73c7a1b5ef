//! Dataset Record - registered dataset metadata plus its data payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Dataset Record describes a dataset in a repository.
///
/// The data itself travels as `payload` and is stored as `data.bin`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetRecord {
    dataset_id: String,
    name: String,
    kind: String,
    size: usize,
    width: usize,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Dataset>,
}

impl DatasetRecord {
    /// Get the dataset ID.
    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Get the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the kind label.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get the number of instances.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Get the number of feature columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the data, if loaded.
    #[must_use]
    pub const fn payload(&self) -> Option<&Dataset> {
        self.payload.as_ref()
    }

    /// Take the data out of the record.
    #[must_use]
    pub fn into_dataset(self) -> Option<Dataset> {
        self.payload
    }

    /// Copy without the payload (the `metadata.json` view).
    #[must_use]
    pub fn metadata(&self) -> Self {
        Self {
            payload: None,
            ..self.clone()
        }
    }

    pub(crate) fn set_payload(&mut self, payload: Option<Dataset>) {
        self.payload = payload;
    }
}

impl From<&Dataset> for DatasetRecord {
    fn from(dataset: &Dataset) -> Self {
        Self {
            dataset_id: dataset.id().to_string(),
            name: dataset.name().to_string(),
            kind: dataset.kind().to_string(),
            size: dataset.size(),
            width: dataset.width(),
            created_at: Utc::now(),
            payload: Some(dataset.clone()),
        }
    }
}
