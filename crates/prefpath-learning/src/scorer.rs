//! Preferred-path scoring engine.
//!
//! Given a subject's structural matrix and one sampled coefficient per
//! scoring function, builds a weighted edge-cost function, computes paths
//! between every functional-region pair under the configured method, and
//! scores path efficiency against the subject's functional connectivity.
//!
//! The engine is a pure function of its inputs: identical (matrix,
//! coefficients, method) always yields identical (reward, success). This is
//! what makes it safe to multiply into the policy-gradient estimator and to
//! evaluate in parallel across Monte-Carlo samples.
//!
//! ## Edge cost
//!
//! `cost(i,j) = max(floor, -ln(sc_ij / max(sc)) + sum_f coef_f * phi_f(i,j))`
//!
//! where `phi_distance(i,j)` is the Euclidean distance normalised by its
//! matrix maximum and `phi_hub(i,j)` is -1 when region `j` is a hub. Regions
//! without structural connection have no edge. The floor keeps every cost
//! strictly positive, which Dijkstra requires and which bounds efficiency.

use prefpath_core::{BrainDataset, PrefPathError, Result, ScoreFn};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// Lower bound on any edge cost; also bounds per-pair efficiency.
const COST_FLOOR: f64 = 1e-6;

/// Edge-weighting/search strategy. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMethod {
    /// Deterministic Dijkstra over the weighted costs (default)
    #[default]
    Shortest,
    /// Greedy forward routing toward the target; may dead-end
    Navigation,
}

impl PathMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PathMethod::Shortest => "shortest",
            PathMethod::Navigation => "navigation",
        }
    }
}

impl FromStr for PathMethod {
    type Err = PrefPathError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shortest" => Ok(PathMethod::Shortest),
            "navigation" => Ok(PathMethod::Navigation),
            other => Err(PrefPathError::config(format!(
                "unknown path method '{other}' (expected 'shortest' or 'navigation')"
            ))),
        }
    }
}

impl fmt::Display for PathMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scorer output for one sampled action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathScore {
    /// Alignment between path efficiencies and functional connectivity
    pub reward: f64,
    /// True when every required region pair had a path
    pub success: bool,
}

/// Path-preference scorer; immutable beyond the method selector.
#[derive(Debug, Clone, Copy)]
pub struct PreferredPath {
    method: PathMethod,
}

impl PreferredPath {
    pub fn new(method: PathMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> PathMethod {
        self.method
    }

    /// Scores one sampled coefficient set against one subject.
    ///
    /// Unreachable pairs contribute zero efficiency and clear the success
    /// flag; they never abort the computation.
    pub fn score(&self, data: &BrainDataset, subject: usize, coefs: &[f64]) -> Result<PathScore> {
        if coefs.len() != data.fns().len() {
            return Err(PrefPathError::shape(
                "sampled coefficients",
                data.fns().len().to_string(),
                coefs.len().to_string(),
            ));
        }

        let n = data.res();
        let cost = match build_cost_matrix(data, subject, coefs) {
            Some(c) => c,
            // Structural matrix carries no edges at all; nothing is reachable.
            None => return Ok(PathScore { reward: 0.0, success: false }),
        };

        let fr = data.func_regions();
        let fc = data.subject(subject).fc();
        let dist_norm = normalised_distance(data);

        let mut efficiencies = Vec::new();
        let mut fc_values = Vec::new();
        let mut success = true;

        match self.method {
            PathMethod::Shortest => {
                // One Dijkstra sweep per unique source covers all its pairs.
                for (a, &u) in fr.iter().enumerate() {
                    let dist = dijkstra(&cost, n, u);
                    for &v in &fr[a + 1..] {
                        if u == v {
                            continue;
                        }
                        let eff = if dist[v].is_finite() {
                            1.0 / dist[v].max(COST_FLOOR)
                        } else {
                            success = false;
                            0.0
                        };
                        efficiencies.push(eff);
                        fc_values.push(fc[[u, v]]);
                    }
                }
            }
            PathMethod::Navigation => {
                for (a, &u) in fr.iter().enumerate() {
                    for &v in &fr[a + 1..] {
                        if u == v {
                            continue;
                        }
                        let eff = match navigate(&cost, &dist_norm, n, u, v) {
                            Some(total) => 1.0 / total.max(COST_FLOOR),
                            None => {
                                success = false;
                                0.0
                            }
                        };
                        efficiencies.push(eff);
                        fc_values.push(fc[[u, v]]);
                    }
                }
            }
        }

        Ok(PathScore {
            reward: pearson(&efficiencies, &fc_values),
            success,
        })
    }
}

/// Builds the dense edge-cost matrix, or `None` when there are no edges.
fn build_cost_matrix(data: &BrainDataset, subject: usize, coefs: &[f64]) -> Option<Vec<f64>> {
    let n = data.res();
    let sc = data.subject(subject).sc();
    let max_sc = sc.iter().cloned().fold(0.0f64, f64::max);
    if max_sc <= 0.0 {
        return None;
    }

    let dist_norm = normalised_distance(data);
    let mut hub = vec![false; n];
    for &h in data.hubs() {
        hub[h] = true;
    }

    let mut cost = vec![f64::INFINITY; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let w = sc[[i, j]];
            if w <= 0.0 {
                continue;
            }
            let mut c = -(w / max_sc).ln();
            for (f, &coef) in data.fns().iter().zip(coefs) {
                c += coef
                    * match f {
                        ScoreFn::Distance => dist_norm[i * n + j],
                        ScoreFn::Hub => {
                            if hub[j] {
                                -1.0
                            } else {
                                0.0
                            }
                        }
                    };
            }
            cost[i * n + j] = c.max(COST_FLOOR);
        }
    }
    Some(cost)
}

fn normalised_distance(data: &BrainDataset) -> Vec<f64> {
    let n = data.res();
    let euc = data.euc_dist();
    let max_d = euc.iter().cloned().fold(0.0f64, f64::max);
    let scale = if max_d > 0.0 { 1.0 / max_d } else { 0.0 };
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            out[i * n + j] = euc[[i, j]] * scale;
        }
    }
    out
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: usize,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap with index tie-breaking for deterministic pop order.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source shortest paths over the dense cost matrix.
fn dijkstra(cost: &[f64], n: usize, source: usize) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; n];
    dist[source] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(HeapEntry { cost: 0.0, node: source });

    while let Some(HeapEntry { cost: d, node: u }) = heap.pop() {
        if d > dist[u] {
            continue;
        }
        for v in 0..n {
            let edge = cost[u * n + v];
            if !edge.is_finite() {
                continue;
            }
            let next = d + edge;
            if next < dist[v] {
                dist[v] = next;
                heap.push(HeapEntry { cost: next, node: v });
            }
        }
    }
    dist
}

/// Greedy forward routing: step to the neighbour minimising edge cost plus
/// normalised remaining distance to the target. Returns the accumulated path
/// cost, or `None` on a dead end or revisit.
fn navigate(cost: &[f64], dist_norm: &[f64], n: usize, source: usize, target: usize) -> Option<f64> {
    let mut visited = vec![false; n];
    let mut u = source;
    let mut total = 0.0;
    visited[u] = true;

    while u != target {
        let mut best: Option<(f64, usize)> = None;
        for v in 0..n {
            let edge = cost[u * n + v];
            if !edge.is_finite() || visited[v] {
                continue;
            }
            let key = edge + dist_norm[v * n + target];
            if best.map_or(true, |(bk, _)| key < bk) {
                best = Some((key, v));
            }
        }
        let (_, v) = best?;
        total += cost[u * n + v];
        visited[v] = true;
        u = v;
    }
    Some(total)
}

/// Pearson correlation; zero when degenerate (short or constant series).
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mx = x.iter().sum::<f64>() / nf;
    let my = y.iter().sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx) * (a - mx);
        vy += (b - my) * (b - my);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use prefpath_core::Connectome;

    /// Five regions on a line with one shortcut, hubs at 2, functional
    /// regions at the extremes and middle.
    fn fixture(connected: bool) -> BrainDataset {
        let n = 5;
        let mut sc = Array2::<f64>::zeros((n, n));
        let link = |i: usize, j: usize, w: f64, sc: &mut Array2<f64>| {
            sc[[i, j]] = w;
            sc[[j, i]] = w;
        };
        link(0, 1, 2.0, &mut sc);
        link(1, 2, 3.0, &mut sc);
        link(2, 3, 3.0, &mut sc);
        if connected {
            link(3, 4, 2.0, &mut sc);
            link(0, 4, 0.5, &mut sc);
        }

        let fc = Array2::<f64>::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                1.0
            } else {
                0.9 - 0.15 * (i as f64 - j as f64).abs()
            }
        });
        let euc = Array2::<f64>::from_shape_fn((n, n), |(i, j)| (i as f64 - j as f64).abs());

        BrainDataset::new(
            n,
            vec![Connectome::new(sc, fc, n).unwrap()],
            euc,
            vec![2],
            (0..n).collect(),
            vec![0, 2, 4],
            vec![ScoreFn::Distance, ScoreFn::Hub],
        )
        .unwrap()
    }

    #[test]
    fn test_score_is_deterministic() {
        let data = fixture(true);
        let scorer = PreferredPath::new(PathMethod::Shortest);
        let coefs = [0.7, -0.4];
        let a = scorer.score(&data, 0, &coefs).unwrap();
        let b = scorer.score(&data, 0, &coefs).unwrap();
        assert_eq!(a, b);

        let nav = PreferredPath::new(PathMethod::Navigation);
        let c = nav.score(&data, 0, &coefs).unwrap();
        let d = nav.score(&data, 0, &coefs).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn test_coefficient_arity_checked() {
        let data = fixture(true);
        let scorer = PreferredPath::new(PathMethod::Shortest);
        assert!(scorer.score(&data, 0, &[0.1]).is_err());
    }

    #[test]
    fn test_connected_graph_succeeds() {
        let data = fixture(true);
        let score = PreferredPath::new(PathMethod::Shortest)
            .score(&data, 0, &[0.0, 0.0])
            .unwrap();
        assert!(score.success);
        assert!(score.reward.is_finite());
        assert!((-1.0..=1.0).contains(&score.reward));
    }

    #[test]
    fn test_unreachable_pair_clears_success() {
        // Region 4 is isolated: pairs (0,4) and (2,4) have no path.
        let data = fixture(false);
        let score = PreferredPath::new(PathMethod::Shortest)
            .score(&data, 0, &[0.0, 0.0])
            .unwrap();
        assert!(!score.success);
        assert!(score.reward.is_finite());
    }

    #[test]
    fn test_hub_coefficient_discounts_hub_edges() {
        let data = fixture(true);
        let base = build_cost_matrix(&data, 0, &[0.0, 0.0]).unwrap();
        let biased = build_cost_matrix(&data, 0, &[0.0, 2.0]).unwrap();
        let n = data.res();
        // Edge into the hub (region 2) gets cheaper under a positive hub coef.
        assert!(biased[n + 2] < base[n + 2]);
        // Edge into a non-hub is untouched.
        assert_eq!(biased[1], base[1]);
    }

    #[test]
    fn test_distance_coefficient_penalises_long_edges() {
        let data = fixture(true);
        let base = build_cost_matrix(&data, 0, &[0.0, 0.0]).unwrap();
        let biased = build_cost_matrix(&data, 0, &[3.0, 0.0]).unwrap();
        let n = data.res();
        // The 0-4 shortcut spans distance 4 and gets the largest penalty.
        let penalty_long = biased[4] - base[4];
        let penalty_short = biased[n + 2] - base[n + 2];
        assert!(penalty_long > penalty_short);
    }

    #[test]
    fn test_navigation_dead_end_is_feasibility_failure() {
        let data = fixture(false);
        let score = PreferredPath::new(PathMethod::Navigation)
            .score(&data, 0, &[0.0, 0.0])
            .unwrap();
        assert!(!score.success);
    }

    #[test]
    fn test_pearson_degenerate_is_zero() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[0.1, 0.2, 0.3]), 0.0);
        assert_eq!(pearson(&[1.0], &[0.5]), 0.0);
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }
}
