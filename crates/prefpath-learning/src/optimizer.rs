//! Adam optimizer with serialisable state.
//!
//! Moment estimates and the step counter are part of the checkpoint payload,
//! so a resumed run continues exactly where the saved one stopped.

use prefpath_core::{PrefPathError, Result};
use serde::{Deserialize, Serialize};

/// Serialisable optimizer state (checkpoint payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub step: u64,
    pub m: Vec<Vec<f64>>,
    pub v: Vec<Vec<f64>>,
}

/// Adam with the conventional defaults (beta1 0.9, beta2 0.999, eps 1e-8).
#[derive(Debug)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    step: u64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(lr: f64) -> Result<Self> {
        if !lr.is_finite() || lr <= 0.0 {
            return Err(PrefPathError::numerical(format!(
                "learning rate must be strictly positive, got {lr}"
            )));
        }
        Ok(Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
            m: Vec::new(),
            v: Vec::new(),
        })
    }

    /// Applies one update across the parameter tensors.
    ///
    /// Moments are allocated lazily on the first call; tensor count and
    /// shapes must stay identical across calls.
    pub fn step(&mut self, params: &mut [&mut [f64]], grads: &[&[f64]]) -> Result<()> {
        if params.len() != grads.len() {
            return Err(PrefPathError::shape(
                "optimizer step",
                format!("{} tensors", params.len()),
                format!("{} gradients", grads.len()),
            ));
        }
        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.len()]).collect();
            self.v = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }

        self.step += 1;
        let bc1 = 1.0 - self.beta1.powi(self.step as i32);
        let bc2 = 1.0 - self.beta2.powi(self.step as i32);

        for (t, (param, grad)) in params.iter_mut().zip(grads).enumerate() {
            if param.len() != self.m[t].len() || param.len() != grad.len() {
                return Err(PrefPathError::shape(
                    format!("optimizer tensor {t}"),
                    self.m[t].len().to_string(),
                    format!("{} params / {} grads", param.len(), grad.len()),
                ));
            }
            let (m, v) = (&mut self.m[t], &mut self.v[t]);
            for i in 0..param.len() {
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * grad[i];
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * grad[i] * grad[i];
                let m_hat = m[i] / bc1;
                let v_hat = v[i] / bc2;
                param[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
        Ok(())
    }

    /// Snapshot of the optimizer state (checkpoint payload).
    pub fn state(&self) -> AdamState {
        AdamState {
            step: self.step,
            m: self.m.clone(),
            v: self.v.clone(),
        }
    }

    /// Restores moments and step counter from a checkpoint.
    pub fn load_state(&mut self, state: AdamState) {
        self.step = state.step;
        self.m = state.m;
        self.v = state.v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_lr() {
        assert!(Adam::new(0.0).is_err());
        assert!(Adam::new(-1e-3).is_err());
        assert!(Adam::new(f64::NAN).is_err());
    }

    #[test]
    fn test_minimizes_quadratic() {
        // f(x) = (x - 3)^2, gradient 2(x - 3)
        let mut opt = Adam::new(0.1).unwrap();
        let mut x = vec![0.0f64];
        for _ in 0..500 {
            let g = vec![2.0 * (x[0] - 3.0)];
            opt.step(&mut [&mut x], &[&g]).unwrap();
        }
        assert!((x[0] - 3.0).abs() < 1e-2, "x = {}", x[0]);
    }

    #[test]
    fn test_state_roundtrip_resumes_identically() {
        let grad = vec![0.5, -0.25];
        let mut a = Adam::new(0.01).unwrap();
        let mut pa = vec![1.0, 2.0];
        a.step(&mut [&mut pa], &[&grad]).unwrap();

        let mut b = Adam::new(0.01).unwrap();
        let mut pb = pa.clone();
        b.load_state(a.state());

        a.step(&mut [&mut pa], &[&grad]).unwrap();
        b.step(&mut [&mut pb], &[&grad]).unwrap();
        assert_eq!(pa, pb);
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut opt = Adam::new(0.01).unwrap();
        let mut p = vec![0.0, 0.0];
        opt.step(&mut [&mut p], &[&vec![1.0, 1.0][..]]).unwrap();
        let bad = vec![1.0];
        assert!(opt.step(&mut [&mut p], &[&bad]).is_err());
    }
}
