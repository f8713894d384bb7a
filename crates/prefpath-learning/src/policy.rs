//! Policy network: per-function Gaussian parameters from a subject encoding.
//!
//! A two-layer tanh MLP maps the per-region structural strength vector
//! (length N) to one `(mu, sigma)` pair per scoring function. Sigma goes
//! through softplus plus a small epsilon, so it is strictly positive for any
//! raw network output. With `const_sig` the sigma head is removed from the
//! trainable surface entirely and the configured scalar is used instead.
//!
//! Gradients are computed by a hand-rolled backward pass; the trainer feeds
//! per-function `(dL/dmu, dL/dsigma)` and receives parameter gradients.

use prefpath_core::{PrefPathError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Keeps sampled distributions well-defined even when softplus underflows.
const SIG_EPS: f64 = 1e-4;

/// Policy network configuration.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Input dimension (network resolution N)
    pub res: usize,
    /// Number of scoring functions (one Gaussian per function)
    pub fn_len: usize,
    /// Hidden-layer width
    pub hidden_units: usize,
    /// Constant initial value for all weights (reproducible init override)
    pub init_weight: Option<f64>,
    /// Fixed network-wide sigma; removes sigma from the learned parameters
    pub const_sig: Option<f64>,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.res == 0 || self.fn_len == 0 || self.hidden_units == 0 {
            return Err(PrefPathError::config(
                "policy dimensions (res, fn_len, hidden_units) must be positive",
            ));
        }
        if let Some(s) = self.const_sig {
            if !s.is_finite() || s <= 0.0 {
                return Err(PrefPathError::numerical(format!(
                    "const_sig must be strictly positive, got {s}"
                )));
            }
        }
        Ok(())
    }

    /// Output width: means only under `const_sig`, otherwise means + sigmas.
    fn out_dim(&self) -> usize {
        if self.const_sig.is_some() {
            self.fn_len
        } else {
            2 * self.fn_len
        }
    }
}

/// Serialisable snapshot of every trainable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub w1: Vec<f64>,
    pub b1: Vec<f64>,
    pub w2: Vec<f64>,
    pub b2: Vec<f64>,
}

/// Activations kept from a forward pass for the backward pass.
#[derive(Debug, Clone)]
pub struct ForwardCache {
    input: Vec<f64>,
    hidden: Vec<f64>,
    sig_raw: Vec<f64>,
}

/// Forward-pass result: one Gaussian per scoring function.
#[derive(Debug, Clone)]
pub struct PolicyForward {
    pub mu: Vec<f64>,
    pub sig: Vec<f64>,
    pub cache: ForwardCache,
}

/// Parameter gradients, same shapes as [`ModelState`].
#[derive(Debug, Clone)]
pub struct PolicyGradients {
    pub dw1: Vec<f64>,
    pub db1: Vec<f64>,
    pub dw2: Vec<f64>,
    pub db2: Vec<f64>,
}

impl PolicyGradients {
    pub fn zeros_like(pe: &PolicyEstimator) -> Self {
        Self {
            dw1: vec![0.0; pe.w1.len()],
            db1: vec![0.0; pe.b1.len()],
            dw2: vec![0.0; pe.w2.len()],
            db2: vec![0.0; pe.b2.len()],
        }
    }

    pub fn add(&mut self, other: &PolicyGradients) {
        for (a, b) in self.dw1.iter_mut().zip(&other.dw1) {
            *a += b;
        }
        for (a, b) in self.db1.iter_mut().zip(&other.db1) {
            *a += b;
        }
        for (a, b) in self.dw2.iter_mut().zip(&other.dw2) {
            *a += b;
        }
        for (a, b) in self.db2.iter_mut().zip(&other.db2) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for g in self
            .dw1
            .iter_mut()
            .chain(&mut self.db1)
            .chain(&mut self.dw2)
            .chain(&mut self.db2)
        {
            *g *= factor;
        }
    }

    pub fn as_slices(&self) -> [&[f64]; 4] {
        [&self.dw1, &self.db1, &self.dw2, &self.db2]
    }
}

/// Trainable policy: subject strength encoding -> per-function Gaussians.
#[derive(Debug)]
pub struct PolicyEstimator {
    cfg: PolicyConfig,
    /// Hidden weights, row-major [hidden_units x res]
    w1: Vec<f64>,
    b1: Vec<f64>,
    /// Output weights, row-major [out_dim x hidden_units]
    w2: Vec<f64>,
    b2: Vec<f64>,
}

impl PolicyEstimator {
    /// Builds the network; initial weights come from the run RNG unless the
    /// constant override is set.
    pub fn new<R: Rng>(cfg: PolicyConfig, rng: &mut R) -> Result<Self> {
        cfg.validate()?;
        let out = cfg.out_dim();
        let (w1, w2) = match cfg.init_weight {
            Some(w) => (
                vec![w; cfg.hidden_units * cfg.res],
                vec![w; out * cfg.hidden_units],
            ),
            None => {
                let s1 = 1.0 / (cfg.res as f64).sqrt();
                let s2 = 1.0 / (cfg.hidden_units as f64).sqrt();
                (
                    (0..cfg.hidden_units * cfg.res)
                        .map(|_| rng.gen_range(-s1..s1))
                        .collect(),
                    (0..out * cfg.hidden_units)
                        .map(|_| rng.gen_range(-s2..s2))
                        .collect(),
                )
            }
        };
        Ok(Self {
            b1: vec![0.0; cfg.hidden_units],
            b2: vec![0.0; out],
            cfg,
            w1,
            w2,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    /// Forward pass for one subject encoding.
    pub fn forward(&self, input: &[f64]) -> Result<PolicyForward> {
        if input.len() != self.cfg.res {
            return Err(PrefPathError::shape(
                "policy input",
                self.cfg.res.to_string(),
                input.len().to_string(),
            ));
        }

        let nh = self.cfg.hidden_units;
        let mut hidden = vec![0.0; nh];
        for h in 0..nh {
            let mut z = self.b1[h];
            let row = &self.w1[h * self.cfg.res..(h + 1) * self.cfg.res];
            for (w, x) in row.iter().zip(input) {
                z += w * x;
            }
            hidden[h] = z.tanh();
        }

        let out = self.cfg.out_dim();
        let mut z2 = vec![0.0; out];
        for o in 0..out {
            let mut z = self.b2[o];
            let row = &self.w2[o * nh..(o + 1) * nh];
            for (w, a) in row.iter().zip(&hidden) {
                z += w * a;
            }
            z2[o] = z;
        }

        let f = self.cfg.fn_len;
        let mu = z2[..f].to_vec();
        let (sig, sig_raw) = match self.cfg.const_sig {
            Some(s) => (vec![s; f], Vec::new()),
            None => {
                let raw = z2[f..].to_vec();
                let sig = raw.iter().map(|&z| softplus(z) + SIG_EPS).collect();
                (sig, raw)
            }
        };

        Ok(PolicyForward {
            mu,
            sig,
            cache: ForwardCache {
                input: input.to_vec(),
                hidden,
                sig_raw,
            },
        })
    }

    /// Backward pass: per-function loss gradients -> parameter gradients.
    ///
    /// `d_sig` is ignored under `const_sig` (the sigma head does not exist).
    pub fn backward(
        &self,
        cache: &ForwardCache,
        d_mu: &[f64],
        d_sig: &[f64],
    ) -> PolicyGradients {
        let nh = self.cfg.hidden_units;
        let f = self.cfg.fn_len;
        let out = self.cfg.out_dim();

        let mut dz2 = vec![0.0; out];
        dz2[..f].copy_from_slice(d_mu);
        if self.cfg.const_sig.is_none() {
            for i in 0..f {
                // chain through softplus: d sigma / d raw = sigmoid(raw)
                dz2[f + i] = d_sig[i] * sigmoid(cache.sig_raw[i]);
            }
        }

        let mut grads = PolicyGradients::zeros_like(self);
        let mut d_hidden = vec![0.0; nh];
        for o in 0..out {
            grads.db2[o] = dz2[o];
            for h in 0..nh {
                grads.dw2[o * nh + h] = dz2[o] * cache.hidden[h];
                d_hidden[h] += self.w2[o * nh + h] * dz2[o];
            }
        }

        for h in 0..nh {
            let dz1 = d_hidden[h] * (1.0 - cache.hidden[h] * cache.hidden[h]);
            grads.db1[h] = dz1;
            for (i, x) in cache.input.iter().enumerate() {
                grads.dw1[h * self.cfg.res + i] = dz1 * x;
            }
        }

        grads
    }

    /// Snapshot of all trainable parameters (checkpoint payload).
    pub fn state(&self) -> ModelState {
        ModelState {
            w1: self.w1.clone(),
            b1: self.b1.clone(),
            w2: self.w2.clone(),
            b2: self.b2.clone(),
        }
    }

    /// Restores parameters from a checkpoint, validating shapes.
    pub fn load_state(&mut self, state: ModelState) -> Result<()> {
        let expect = [
            ("w1", self.w1.len(), state.w1.len()),
            ("b1", self.b1.len(), state.b1.len()),
            ("w2", self.w2.len(), state.w2.len()),
            ("b2", self.b2.len(), state.b2.len()),
        ];
        for (name, want, got) in expect {
            if want != got {
                return Err(PrefPathError::shape(
                    format!("model state field '{name}'"),
                    want.to_string(),
                    got.to_string(),
                ));
            }
        }
        self.w1 = state.w1;
        self.b1 = state.b1;
        self.w2 = state.w2;
        self.b2 = state.b2;
        Ok(())
    }

    /// Mutable views over every parameter tensor, in gradient order.
    pub fn params_mut(&mut self) -> (&mut [f64], &mut [f64], &mut [f64], &mut [f64]) {
        (&mut self.w1, &mut self.b1, &mut self.w2, &mut self.b2)
    }
}

fn softplus(z: f64) -> f64 {
    // numerically stable: ln(1 + e^z) = max(z, 0) + ln(1 + e^-|z|)
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
