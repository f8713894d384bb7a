//! # prefpath-core
//!
//! Core data model for preferred-path policy training over structural
//! connectomes.
//!
//! This crate holds the leaf dependencies of the training pipeline:
//!
//! - [`errors`]: unified error taxonomy (configuration and shape problems are
//!   fatal before training starts)
//! - [`connectome`]: immutable per-subject `Connectome` records and the
//!   `BrainDataset` they live in, validated at construction
//! - [`dataset`]: on-disk loading of NPY matrix stacks and index tables,
//!   keyed by resolution
//! - [`split`]: train/cv/test subject partitioning, fixed at run creation
//! - [`context`]: explicit run context carrying the seeded RNG
//!
//! The learning pipeline (policy network, path scorer, REINFORCE trainer)
//! lives in `prefpath-learning`; this crate knows nothing about it.

pub mod connectome;
pub mod context;
pub mod dataset;
pub mod errors;
pub mod split;

pub use connectome::{BrainDataset, Connectome, ScoreFn};
pub use context::RunContext;
pub use dataset::{load_brain_dataset, DatasetPaths};
pub use errors::{PrefPathError, Result};
pub use split::train_cv_test_split;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
