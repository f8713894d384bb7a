//! # prefpath-learning
//!
//! Policy-gradient training of preferred-path policies.
//!
//! - [`policy`]: two-layer MLP predicting per-function Gaussian parameters,
//!   with a hand-rolled backward pass
//! - [`optimizer`]: Adam with serialisable moments for exact resume
//! - [`scorer`]: deterministic path-preference engine scoring sampled
//!   coefficients against functional connectivity
//! - [`trainer`]: the REINFORCE loop tying the above together
//! - [`checkpoint`]: versioned resumable state and its `bincode` persistence
//!
//! Data types and loading live in `prefpath-core`.

pub mod checkpoint;
pub mod optimizer;
pub mod policy;
pub mod scorer;
pub mod trainer;

pub use checkpoint::{Checkpoint, RunMode, CHECKPOINT_VERSION};
pub use optimizer::{Adam, AdamState};
pub use policy::{ModelState, PolicyConfig, PolicyEstimator};
pub use scorer::{PathMethod, PathScore, PreferredPath};
pub use trainer::{EpochSummary, ReinforceTrainer, TrainConfig};
