//! Checkpoint schema and persistence.
//!
//! A checkpoint is the full resumable training state: metric histories, model
//! parameters, optimizer moments, the variance-reduction baseline and the
//! subject partition. Files are `bincode`-encoded with a version tag up front.
//!
//! Resume protocol: the caller reads a checkpoint wholesale, validates it
//! (including the function-set identity check), and constructs fresh live
//! state from it. A loaded checkpoint is never mutated in place.

use crate::optimizer::AdamState;
use crate::policy::ModelState;
use prefpath_core::{PrefPathError, Result, ScoreFn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Bumped whenever the serialised layout changes.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Full resumable training state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Completed epochs, monotone across resumes
    pub epochs: u64,
    /// Wall-clock seconds per completed epoch
    pub epoch_seconds: Vec<f64>,
    /// Mean reward per epoch
    pub rewards: Vec<f64>,
    /// Feasibility success rate per epoch
    pub success: Vec<f64>,
    /// Per-function mean mu per epoch, outer index = function
    pub mu: Vec<Vec<f64>>,
    /// Per-function mean sigma per epoch, outer index = function
    pub sig: Vec<Vec<f64>>,
    /// Ordered scoring-function names (resume identity key)
    pub fns: Vec<String>,
    pub model_state: ModelState,
    pub optimizer_state: AdamState,
    /// Moving-average reward baseline
    pub baseline: f64,
    /// Subject partition, fixed at first creation
    pub train_idx: Vec<usize>,
    pub cv_idx: Vec<usize>,
    pub test_idx: Vec<usize>,
}

impl Checkpoint {
    /// Internal-consistency checks run on every load.
    pub fn validate(&self) -> Result<()> {
        if self.version != CHECKPOINT_VERSION {
            return Err(PrefPathError::Decode(format!(
                "unsupported checkpoint version {} (current {})",
                self.version, CHECKPOINT_VERSION
            )));
        }
        if self.fns.is_empty() {
            return Err(PrefPathError::config("checkpoint has no scoring functions"));
        }
        let n = self.epochs as usize;
        for (name, len) in [
            ("epoch_seconds", self.epoch_seconds.len()),
            ("rewards", self.rewards.len()),
            ("success", self.success.len()),
        ] {
            if len != n {
                return Err(PrefPathError::shape(
                    format!("checkpoint history '{name}'"),
                    n.to_string(),
                    len.to_string(),
                ));
            }
        }
        for (name, series) in [("mu", &self.mu), ("sig", &self.sig)] {
            if series.len() != self.fns.len() {
                return Err(PrefPathError::shape(
                    format!("checkpoint '{name}' function count"),
                    self.fns.len().to_string(),
                    series.len().to_string(),
                ));
            }
            for (f, s) in series.iter().enumerate() {
                if s.len() != n {
                    return Err(PrefPathError::shape(
                        format!("checkpoint '{name}[{f}]' history"),
                        n.to_string(),
                        s.len().to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resume identity check: the configured function set must match the
    /// stored one exactly, order included. Runs before any training step.
    pub fn check_fns(&self, configured: &[ScoreFn]) -> Result<()> {
        let configured: Vec<String> = configured.iter().map(|f| f.name().to_string()).collect();
        if self.fns != configured {
            return Err(PrefPathError::fn_mismatch(&self.fns, &configured));
        }
        Ok(())
    }

    /// Writes the checkpoint atomically enough for our purposes: encode to a
    /// sibling temp file, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            bincode::serialize_into(BufWriter::new(file), self)
                .map_err(|e| PrefPathError::Decode(e.to_string()))?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads and validates a checkpoint file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let ckpt: Checkpoint = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PrefPathError::Decode(e.to_string()))?;
        ckpt.validate()?;
        Ok(ckpt)
    }
}

/// How a training run starts: from scratch or from a validated checkpoint.
/// Decided by the caller, outside the trainer.
pub enum RunMode {
    Fresh,
    Resumed(Checkpoint),
}
