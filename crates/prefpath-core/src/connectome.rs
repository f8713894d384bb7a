//! Immutable per-subject connectome records and the scoring-function set.
//!
//! A `BrainDataset` is created once at data-load time and never mutated.
//! All shape checks against the configured resolution happen here, at
//! construction, so the trainer can assume well-formed matrices.

use crate::errors::{PrefPathError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named scoring criterion contributing one weighting coefficient.
///
/// The configured order is preserved everywhere: policy outputs, metric
/// histories, and the checkpoint identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreFn {
    /// Euclidean distance penalty between consecutive path regions
    Distance,
    /// Bonus for stepping onto topologically central (hub) regions
    Hub,
}

impl ScoreFn {
    /// Canonical lower-case name, used for CLI parsing and checkpoint identity.
    pub fn name(&self) -> &'static str {
        match self {
            ScoreFn::Distance => "distance",
            ScoreFn::Hub => "hub",
        }
    }

    /// Parses an ordered list of criterion names, preserving order.
    pub fn parse_list(names: &[String]) -> Result<Vec<ScoreFn>> {
        if names.is_empty() {
            return Err(PrefPathError::config(
                "at least one scoring function is required (--fns)",
            ));
        }
        names.iter().map(|n| n.parse()).collect()
    }

    /// Renders a function set back to its name list (checkpoint identity key).
    pub fn names(fns: &[ScoreFn]) -> Vec<String> {
        fns.iter().map(|f| f.name().to_string()).collect()
    }
}

impl FromStr for ScoreFn {
    type Err = PrefPathError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "distance" => Ok(ScoreFn::Distance),
            "hub" => Ok(ScoreFn::Hub),
            other => Err(PrefPathError::config(format!(
                "unknown scoring function '{other}' (expected 'distance' or 'hub')"
            ))),
        }
    }
}

impl fmt::Display for ScoreFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One subject's structural and functional connectivity, both N x N.
#[derive(Debug, Clone)]
pub struct Connectome {
    sc: Array2<f64>,
    fc: Array2<f64>,
}

impl Connectome {
    /// Builds a connectome, validating both matrices against the resolution.
    pub fn new(sc: Array2<f64>, fc: Array2<f64>, res: usize) -> Result<Self> {
        validate_square("structural matrix", &sc, res)?;
        validate_square("functional matrix", &fc, res)?;
        Ok(Self { sc, fc })
    }

    /// Structural connectivity (anatomical edge weights).
    pub fn sc(&self) -> &Array2<f64> {
        &self.sc
    }

    /// Functional connectivity (the calibration target).
    pub fn fc(&self) -> &Array2<f64> {
        &self.fc
    }

    /// Per-region structural strength (row sums), the policy input encoding.
    pub fn strength(&self) -> Vec<f64> {
        self.sc.rows().into_iter().map(|row| row.sum()).collect()
    }
}

/// Immutable per-run dataset: subject connectomes plus the shared tables.
#[derive(Debug, Clone)]
pub struct BrainDataset {
    res: usize,
    connectomes: Vec<Connectome>,
    euc_dist: Array2<f64>,
    hubs: Vec<usize>,
    regions: Vec<usize>,
    func_regions: Vec<usize>,
    fns: Vec<ScoreFn>,
}

impl BrainDataset {
    /// Assembles a dataset, validating every table against the resolution.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        res: usize,
        connectomes: Vec<Connectome>,
        euc_dist: Array2<f64>,
        hubs: Vec<usize>,
        regions: Vec<usize>,
        func_regions: Vec<usize>,
        fns: Vec<ScoreFn>,
    ) -> Result<Self> {
        if res == 0 {
            return Err(PrefPathError::config("resolution must be positive"));
        }
        if connectomes.is_empty() {
            return Err(PrefPathError::config("dataset contains no subjects"));
        }
        if fns.is_empty() {
            return Err(PrefPathError::config("dataset requires a scoring function set"));
        }
        validate_square("distance matrix", &euc_dist, res)?;
        validate_indices("hub table", &hubs, res)?;
        validate_indices("region table", &regions, res)?;
        validate_indices("functional-region table", &func_regions, res)?;
        if func_regions.len() < 2 {
            return Err(PrefPathError::config(
                "functional-region table needs at least two regions to form pairs",
            ));
        }
        Ok(Self {
            res,
            connectomes,
            euc_dist,
            hubs,
            regions,
            func_regions,
            fns,
        })
    }

    /// Network resolution N.
    pub fn res(&self) -> usize {
        self.res
    }

    /// Number of subjects held.
    pub fn len(&self) -> usize {
        self.connectomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectomes.is_empty()
    }

    /// Subject connectome by dataset-local index.
    pub fn subject(&self, idx: usize) -> &Connectome {
        &self.connectomes[idx]
    }

    pub fn euc_dist(&self) -> &Array2<f64> {
        &self.euc_dist
    }

    pub fn hubs(&self) -> &[usize] {
        &self.hubs
    }

    pub fn regions(&self) -> &[usize] {
        &self.regions
    }

    pub fn func_regions(&self) -> &[usize] {
        &self.func_regions
    }

    /// Active scoring functions, in configured order.
    pub fn fns(&self) -> &[ScoreFn] {
        &self.fns
    }
}

fn validate_square(context: &str, m: &Array2<f64>, res: usize) -> Result<()> {
    if m.nrows() != res || m.ncols() != res {
        return Err(PrefPathError::shape(
            context,
            format!("{res}x{res}"),
            format!("{}x{}", m.nrows(), m.ncols()),
        ));
    }
    Ok(())
}

fn validate_indices(context: &str, indices: &[usize], res: usize) -> Result<()> {
    if let Some(&bad) = indices.iter().find(|&&i| i >= res) {
        return Err(PrefPathError::shape(
            context,
            format!("indices < {res}"),
            format!("index {bad}"),
        ));
    }
    Ok(())
}
