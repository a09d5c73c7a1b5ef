//! # Trueno-Exp: Experiment Tracking and Grid Orchestration
//!
//! **Version**: 0.1.0
//!
//! Trueno-Exp defines datasets, pipelines and hyperparameter grids, runs
//! them as a strict Experiment → Execution → Run → Split hierarchy, and
//! persists metadata, results and metrics through pluggable repositories
//! (memory, file, git, HTTP, or a local/remote pair).
//!
//! ## Design Principles
//!
//! - **Deterministic expansion**: grids enumerate in declaration order,
//!   last axis fastest; an empty axis means nothing to run
//! - **Ordered events**: one FIFO bus, drained iteratively on the caller's thread
//! - **Write-once history**: conflicts instead of silent overwrites
//! - **Partial success**: a failing split never takes its siblings down
//!
//! ## Example Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use serde_json::json;
//! use trueno_exp::dataset::Dataset;
//! use trueno_exp::lifecycle::{Experiment, Provenance};
//! use trueno_exp::params::ParameterMap;
//! use trueno_exp::pipeline::registry::EstimatorRegistry;
//! use trueno_exp::repository::{Backend, EntityKind, MemoryBackend, Search};
//! use trueno_exp::splitting::SplitStrategy;
//!
//! let dataset = Dataset::new(
//!     "steps",
//!     (0..12).map(|i| vec![f64::from(i)]).collect(),
//!     (0..12).map(|i| f64::from(i) * 0.5).collect(),
//! )?;
//! let pipeline = EstimatorRegistry::with_defaults()
//!     .create_pipeline(&["standard_scaler", "mean_regressor"], None)
//!     .expect("registered components");
//!
//! let backend = Rc::new(MemoryBackend::new());
//! let mut experiment = Experiment::builder("shrinkage")
//!     .description("mean regressor with shrinkage sweep")
//!     .dataset(Rc::new(dataset))
//!     .pipeline(pipeline)
//!     .strategy(SplitStrategy::CrossValidation { folds: 3, seed: 7 })
//!     .parameters(ParameterMap::from_json(&json!({
//!         "mean_regressor": {"alpha": [0.0, 0.25, 0.5]}
//!     })))
//!     .backend(backend.clone())
//!     .build();
//!
//! experiment.run(Provenance::new().command("cargo run"))?;
//!
//! let splits = backend.list(EntityKind::Split, &Search::all().in_experiment("shrinkage"))?;
//! assert_eq!(splits.len(), 3);
//! # Ok::<(), trueno_exp::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod app;
pub mod config;
pub mod creator;
pub mod dataset;
pub mod error;
pub mod events;
pub mod experiment;
pub mod lifecycle;
pub mod logging;
pub mod params;
pub mod pipeline;
pub mod repository;
pub mod splitting;

pub use error::{Error, Result};
