//! Metric Record - scores of a single computation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metric Record represents one score of one computation.
///
/// Metrics are stored with:
/// - `run_id` + `key` as the partition key for efficient filtering
/// - `step` (the grid combination index) as the sort key
/// - `values` as the raw per-instance payload (`results.bin` on disk)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    metric_id: String,
    run_id: String,
    split_id: String,
    computation_id: String,
    key: String,
    step: u64,
    value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<f64>,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record with a generated id.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Metric name (e.g., "accuracy", "mse")
    /// * `step` - Grid combination index
    /// * `value` - Metric value
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self::builder(run_id, key, step, value).build()
    }

    /// Create a builder for constructing a metric record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> MetricRecordBuilder {
        MetricRecordBuilder::new(run_id, key, step, value)
    }

    /// Get the metric ID.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the split ID.
    #[must_use]
    pub fn split_id(&self) -> &str {
        &self.split_id
    }

    /// Get the computation ID.
    #[must_use]
    pub fn computation_id(&self) -> &str {
        &self.computation_id
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the step (grid combination index).
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the per-instance values the metric was computed from.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Copy without the per-instance values (the `metadata.json` view).
    #[must_use]
    pub fn metadata(&self) -> Self {
        Self {
            values: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn set_values(&mut self, values: Vec<f64>) {
        self.values = values;
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    metric_id: String,
    run_id: String,
    split_id: String,
    computation_id: String,
    key: String,
    step: u64,
    value: f64,
    values: Vec<f64>,
    timestamp: DateTime<Utc>,
}

impl MetricRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            metric_id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            split_id: String::new(),
            computation_id: String::new(),
            key: key.into(),
            step,
            value,
            values: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the split and computation the metric belongs to.
    #[must_use]
    pub fn computation(mut self, split_id: impl Into<String>, computation_id: impl Into<String>) -> Self {
        self.split_id = split_id.into();
        self.computation_id = computation_id.into();
        self
    }

    /// Attach per-instance values.
    #[must_use]
    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        MetricRecord {
            metric_id: self.metric_id,
            run_id: self.run_id,
            split_id: self.split_id,
            computation_id: self.computation_id,
            key: self.key,
            step: self.step,
            value: self.value,
            values: self.values,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_new() {
        let metric = MetricRecord::new("run-1", "accuracy", 0, 0.5);
        assert_eq!(metric.run_id(), "run-1");
        assert_eq!(metric.key(), "accuracy");
        assert_eq!(metric.step(), 0);
        assert!((metric.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metric_record_ordering() {
        let m1 = MetricRecord::new("run-1", "mse", 0, 1.0);
        let m2 = MetricRecord::new("run-1", "mse", 1, 0.9);
        assert!(m1.step() < m2.step());
        assert_ne!(m1.metric_id(), m2.metric_id());
    }

    #[test]
    fn test_metadata_view() {
        let metric = MetricRecord::builder("run-1", "mae", 2, 0.1)
            .computation("s1", "s1-2")
            .values(vec![0.1, 0.1])
            .build();
        assert_eq!(metric.computation_id(), "s1-2");
        assert!(metric.metadata().values().is_empty());
        assert_eq!(metric.values().len(), 2);
    }
}
