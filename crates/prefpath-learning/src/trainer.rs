//! REINFORCE training loop.
//!
//! One epoch walks the training subjects in batches. Per subject the policy
//! predicts per-function Gaussians, `samples` coefficient vectors are drawn,
//! each is scored by the path engine (in parallel, the scorer is pure), and
//! the score-function gradient `∇(-log N(a; mu, sigma)) · (reward − baseline)`
//! is accumulated. Gradients are averaged across samples and across the batch
//! before each Adam step.
//!
//! The baseline is an exponential moving average of epoch mean rewards; it
//! only shifts gradient variance, never the expected direction.

use crate::checkpoint::{Checkpoint, RunMode, CHECKPOINT_VERSION};
use crate::optimizer::Adam;
use crate::policy::{PolicyConfig, PolicyEstimator, PolicyGradients};
use crate::scorer::{PathMethod, PathScore, PreferredPath};
use log::{debug, info};
use prefpath_core::{
    train_cv_test_split, BrainDataset, PrefPathError, Result, RunContext,
};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// Reward-baseline smoothing factor.
const BASELINE_DECAY: f64 = 0.9;

const TRAIN_PCT: f64 = 0.6;
const CV_PCT: f64 = 0.2;

/// Hyperparameters and run options for one training invocation.
///
/// `epochs` counts the epochs to run *now*; on resume the completed count
/// from the checkpoint keeps accumulating on top.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: u64,
    /// Subjects folded into one optimizer step
    pub batch: usize,
    /// Monte-Carlo coefficient draws per subject
    pub samples: usize,
    pub lr: f64,
    pub hidden_units: usize,
    pub init_weight: Option<f64>,
    pub const_sig: Option<f64>,
    /// Clamp sampled coefficients to >= 0 before scoring
    pub pos_only: bool,
    pub path_method: PathMethod,
    /// Checkpoint target; no saves when absent
    pub save_path: Option<PathBuf>,
    /// Save every this many epochs (and once at loop exit)
    pub save_freq: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch: 1,
            samples: 100,
            lr: 1e-3,
            hidden_units: 10,
            init_weight: None,
            const_sig: None,
            pos_only: false,
            path_method: PathMethod::Shortest,
            save_path: None,
            save_freq: 1,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(PrefPathError::config("epochs must be at least 1"));
        }
        if self.batch == 0 || self.samples == 0 {
            return Err(PrefPathError::config(
                "batch and samples must be at least 1",
            ));
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(PrefPathError::numerical(format!(
                "learning rate must be strictly positive, got {}",
                self.lr
            )));
        }
        if self.save_freq == 0 {
            return Err(PrefPathError::config("save_freq must be at least 1"));
        }
        Ok(())
    }
}

/// Per-epoch aggregate, appended to the histories.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: u64,
    pub mean_reward: f64,
    pub success_rate: f64,
    pub seconds: f64,
}

/// REINFORCE trainer over one loaded dataset.
#[derive(Debug)]
pub struct ReinforceTrainer<'a> {
    data: &'a BrainDataset,
    cfg: TrainConfig,
    scorer: PreferredPath,
    policy: PolicyEstimator,
    optimizer: Adam,
    baseline: f64,
    epochs_done: u64,
    epoch_seconds: Vec<f64>,
    rewards: Vec<f64>,
    success: Vec<f64>,
    mu_hist: Vec<Vec<f64>>,
    sig_hist: Vec<Vec<f64>>,
    train_idx: Vec<usize>,
    cv_idx: Vec<usize>,
    test_idx: Vec<usize>,
}

impl<'a> ReinforceTrainer<'a> {
    /// Builds the trainer either from scratch or from a validated checkpoint.
    ///
    /// Resume order matters: the function-set identity check runs before any
    /// state is restored, so a mismatched run fails without touching anything.
    pub fn new(
        data: &'a BrainDataset,
        cfg: TrainConfig,
        mode: RunMode,
        ctx: &mut RunContext,
    ) -> Result<Self> {
        cfg.validate()?;
        let fn_len = data.fns().len();
        let policy_cfg = PolicyConfig {
            res: data.res(),
            fn_len,
            hidden_units: cfg.hidden_units,
            init_weight: cfg.init_weight,
            const_sig: cfg.const_sig,
        };

        match mode {
            RunMode::Fresh => {
                let policy = PolicyEstimator::new(policy_cfg, ctx.rng_mut())?;
                let optimizer = Adam::new(cfg.lr)?;
                let (train_idx, cv_idx, test_idx) =
                    train_cv_test_split(data.len(), TRAIN_PCT, CV_PCT, ctx.rng_mut())?;
                info!(
                    "🧠 fresh run: {} subjects ({} train / {} cv / {} test), fns [{}]",
                    data.len(),
                    train_idx.len(),
                    cv_idx.len(),
                    test_idx.len(),
                    data.fns().iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
                );
                Ok(Self {
                    data,
                    scorer: PreferredPath::new(cfg.path_method),
                    policy,
                    optimizer,
                    baseline: 0.0,
                    epochs_done: 0,
                    epoch_seconds: Vec::new(),
                    rewards: Vec::new(),
                    success: Vec::new(),
                    mu_hist: vec![Vec::new(); fn_len],
                    sig_hist: vec![Vec::new(); fn_len],
                    train_idx,
                    cv_idx,
                    test_idx,
                    cfg,
                })
            }
            RunMode::Resumed(ckpt) => {
                ckpt.check_fns(data.fns())?;
                if let Some(&bad) = ckpt.train_idx.iter().find(|&&i| i >= data.len()) {
                    return Err(PrefPathError::config(format!(
                        "checkpoint train index {bad} outside dataset of {} subjects",
                        data.len()
                    )));
                }
                let mut policy = PolicyEstimator::new(policy_cfg, ctx.rng_mut())?;
                policy.load_state(ckpt.model_state)?;
                let mut optimizer = Adam::new(cfg.lr)?;
                optimizer.load_state(ckpt.optimizer_state);
                info!(
                    "🧠 resumed at epoch {} ({} train subjects)",
                    ckpt.epochs,
                    ckpt.train_idx.len()
                );
                Ok(Self {
                    data,
                    scorer: PreferredPath::new(cfg.path_method),
                    policy,
                    optimizer,
                    baseline: ckpt.baseline,
                    epochs_done: ckpt.epochs,
                    epoch_seconds: ckpt.epoch_seconds,
                    rewards: ckpt.rewards,
                    success: ckpt.success,
                    mu_hist: ckpt.mu,
                    sig_hist: ckpt.sig,
                    train_idx: ckpt.train_idx,
                    cv_idx: ckpt.cv_idx,
                    test_idx: ckpt.test_idx,
                    cfg,
                })
            }
        }
    }

    /// Runs the configured number of epochs, checkpointing along the way.
    pub fn run(&mut self, ctx: &mut RunContext) -> Result<()> {
        let target = self.epochs_done + self.cfg.epochs;
        for _ in 0..self.cfg.epochs {
            let summary = self.train_epoch(ctx.rng_mut())?;
            info!(
                "epoch {}/{}: reward {:.4}, success {:.2}, {:.2}s",
                summary.epoch, target, summary.mean_reward, summary.success_rate, summary.seconds
            );
            if self.cfg.save_path.is_some() && self.epochs_done % self.cfg.save_freq == 0 {
                self.save()?;
            }
        }
        // Loop-exit save regardless of frequency alignment.
        if self.cfg.save_path.is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// One pass over the training subjects.
    fn train_epoch<R: Rng>(&mut self, rng: &mut R) -> Result<EpochSummary> {
        let start = Instant::now();
        let fn_len = self.data.fns().len();
        let mut all_rewards = Vec::new();
        let mut n_success = 0usize;
        let mut mu_acc = vec![0.0; fn_len];
        let mut sig_acc = vec![0.0; fn_len];
        let mut n_forward = 0usize;

        // Borrow the chunk list up front so the mutable epoch state below
        // does not alias the trainer.
        let batches: Vec<Vec<usize>> = self
            .train_idx
            .chunks(self.cfg.batch)
            .map(|c| c.to_vec())
            .collect();

        for batch in batches {
            let mut grad_acc = PolicyGradients::zeros_like(&self.policy);
            let mut n_terms = 0usize;

            for &subj in &batch {
                let input = self.data.subject(subj).strength();
                let fwd = self.policy.forward(&input)?;
                for f in 0..fn_len {
                    mu_acc[f] += fwd.mu[f];
                    sig_acc[f] += fwd.sig[f];
                }
                n_forward += 1;

                // Draw all samples on the control thread, then score in
                // parallel; the scorer is pure so order is immaterial.
                let mut actions = Vec::with_capacity(self.cfg.samples);
                for _ in 0..self.cfg.samples {
                    let mut a = Vec::with_capacity(fn_len);
                    for f in 0..fn_len {
                        let dist = Normal::new(fwd.mu[f], fwd.sig[f])
                            .map_err(|e| PrefPathError::numerical(e.to_string()))?;
                        a.push(dist.sample(rng));
                    }
                    actions.push(a);
                }

                let pos_only = self.cfg.pos_only;
                let scores: Vec<PathScore> = actions
                    .par_iter()
                    .map(|a| {
                        let scored = if pos_only {
                            clamp_non_negative(a)
                        } else {
                            a.clone()
                        };
                        self.scorer.score(self.data, subj, &scored)
                    })
                    .collect::<Result<_>>()?;

                for (action, score) in actions.iter().zip(&scores) {
                    let adv = score.reward - self.baseline;
                    // d(-log N)/dmu and d(-log N)/dsigma at the raw sample,
                    // even when pos_only clamped what the scorer saw.
                    let mut d_mu = vec![0.0; fn_len];
                    let mut d_sig = vec![0.0; fn_len];
                    for f in 0..fn_len {
                        let z = action[f] - fwd.mu[f];
                        let s = fwd.sig[f];
                        d_mu[f] = -adv * z / (s * s);
                        d_sig[f] = -adv * (z * z / (s * s * s) - 1.0 / s);
                    }
                    grad_acc.add(&self.policy.backward(&fwd.cache, &d_mu, &d_sig));
                    n_terms += 1;

                    all_rewards.push(score.reward);
                    if score.success {
                        n_success += 1;
                    }
                }
            }

            if n_terms > 0 {
                grad_acc.scale(1.0 / n_terms as f64);
                let [gw1, gb1, gw2, gb2] = grad_acc.as_slices();
                let (w1, b1, w2, b2) = self.policy.params_mut();
                self.optimizer.step(&mut [w1, b1, w2, b2], &[gw1, gb1, gw2, gb2])?;
            }
        }

        let n = all_rewards.len().max(1) as f64;
        let mean_reward = all_rewards.iter().sum::<f64>() / n;
        let success_rate = n_success as f64 / n;
        self.baseline = BASELINE_DECAY * self.baseline + (1.0 - BASELINE_DECAY) * mean_reward;
        debug!("baseline now {:.4}", self.baseline);

        let nf = n_forward.max(1) as f64;
        for f in 0..fn_len {
            self.mu_hist[f].push(mu_acc[f] / nf);
            self.sig_hist[f].push(sig_acc[f] / nf);
        }
        let seconds = start.elapsed().as_secs_f64();
        self.epoch_seconds.push(seconds);
        self.rewards.push(mean_reward);
        self.success.push(success_rate);
        self.epochs_done += 1;

        Ok(EpochSummary {
            epoch: self.epochs_done,
            mean_reward,
            success_rate,
            seconds,
        })
    }

    /// Snapshot of the full resumable state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            epochs: self.epochs_done,
            epoch_seconds: self.epoch_seconds.clone(),
            rewards: self.rewards.clone(),
            success: self.success.clone(),
            mu: self.mu_hist.clone(),
            sig: self.sig_hist.clone(),
            fns: self.data.fns().iter().map(|f| f.name().to_string()).collect(),
            model_state: self.policy.state(),
            optimizer_state: self.optimizer.state(),
            baseline: self.baseline,
            train_idx: self.train_idx.clone(),
            cv_idx: self.cv_idx.clone(),
            test_idx: self.test_idx.clone(),
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(path) = &self.cfg.save_path {
            self.checkpoint().save(path)?;
            debug!("💾 checkpoint written to {}", path.display());
        }
        Ok(())
    }

    pub fn epochs_done(&self) -> u64 {
        self.epochs_done
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    pub fn success(&self) -> &[f64] {
        &self.success
    }

    pub fn train_idx(&self) -> &[usize] {
        &self.train_idx
    }

    pub fn cv_idx(&self) -> &[usize] {
        &self.cv_idx
    }

    pub fn test_idx(&self) -> &[usize] {
        &self.test_idx
    }
}

/// The `pos_only` transform: coefficients handed to the scorer are clamped to
/// zero from below. Log-probabilities stay at the raw sample.
fn clamp_non_negative(action: &[f64]) -> Vec<f64> {
    action.iter().map(|&c| c.max(0.0)).collect()
}
