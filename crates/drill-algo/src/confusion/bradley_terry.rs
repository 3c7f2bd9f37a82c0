//! Bradley-Terry (pairwise) confusion model variant.
//!
//! Storage and update rule are the shared `counts[correct][selected] += 1`
//! used by every variant; prediction runs Hunter's MM iteration on `counts`
//! treated as a win matrix with Laplace smoothing. Grounded on
//! `examples/original_source/backend/app/ml/bradley_terry.py`
//! (`compute_bt_strengths`, `compute_bt_strengths_logspace`).

use serde::{Deserialize, Serialize};

use crate::beta::BetaParams;
use crate::error::{DrillError, Result};

use super::state::ConfusionState;

/// Configuration for the MM fixed-point iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BtConfig {
    pub max_iter: usize,
    pub tol: f64,
    pub log_tol: f64,
}

impl Default for BtConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-6,
            log_tol: 1e-8,
        }
    }
}

/// Linear-space MM iteration (Hunter 2004). `prior` is added to every cell
/// as Laplace smoothing — independent of whatever seed policy produced
/// `counts`, per spec §4.2.3's explicit `C[i][j] + prior` win-matrix
/// construction.
///
/// Never fails: if MM does not reach `tol` within `max_iter`, the last
/// iterate is returned and a warning is logged (spec §7, "Nonconvergent
/// BT" is clamped, not raised, from this call site).
pub fn compute_strengths(counts: &[f64], n: usize, prior: f64, cfg: BtConfig) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let regularized: Vec<f64> = counts.iter().map(|&c| c + prior).collect();
    let at = |i: usize, j: usize| regularized[i * n + j];
    let n_games = |i: usize, j: usize| at(i, j) + at(j, i);

    let mut theta = vec![1.0_f64; n];
    let mut converged = false;
    for _ in 0..cfg.max_iter {
        let theta_old = theta.clone();
        for i in 0..n {
            let w_i: f64 = (0..n).map(|j| at(i, j)).sum();
            let mut denom = 0.0;
            for j in 0..n {
                if i != j {
                    let ng = n_games(i, j);
                    if ng > 0.0 {
                        denom += ng / (theta_old[i] + theta_old[j]);
                    }
                }
            }
            theta[i] = if denom > 0.0 { w_i / denom } else { 1.0 };
        }
        let total: f64 = theta.iter().sum();
        if total > 0.0 {
            for t in theta.iter_mut() {
                *t *= n as f64 / total;
            }
        }
        let max_change = theta
            .iter()
            .zip(theta_old.iter())
            .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
        if max_change < cfg.tol {
            converged = true;
            break;
        }
    }
    if !converged {
        tracing::warn!(
            max_iter = cfg.max_iter,
            n_classes = n,
            "Bradley-Terry MM iteration did not converge"
        );
    }
    theta
}

fn log_sum_exp_pair(a: f64, b: f64) -> f64 {
    if a > b {
        a + (b - a).exp().ln_1p()
    } else {
        b + (a - b).exp().ln_1p()
    }
}

/// Log-space MM iteration for numerically extreme strength spreads (spec
/// §4.2.3: "required when the spread between strengths exceeds what double
/// precision can represent directly").
pub fn compute_strengths_logspace(counts: &[f64], n: usize, prior: f64, cfg: BtConfig) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let regularized: Vec<f64> = counts.iter().map(|&c| c + prior).collect();
    let at = |i: usize, j: usize| regularized[i * n + j];
    let n_games = |i: usize, j: usize| at(i, j) + at(j, i);

    let mut log_theta = vec![0.0_f64; n];
    let mut converged = false;
    for _ in 0..cfg.max_iter {
        let log_theta_old = log_theta.clone();
        for i in 0..n {
            let w_i: f64 = (0..n).map(|j| at(i, j)).sum();
            if w_i == 0.0 {
                continue;
            }
            let mut terms = Vec::with_capacity(n);
            for j in 0..n {
                if i != j {
                    let ng = n_games(i, j);
                    if ng > 0.0 {
                        let log_sum_ij = log_sum_exp_pair(log_theta_old[i], log_theta_old[j]);
                        terms.push(ng.ln() - log_sum_ij);
                    }
                }
            }
            if let Some((&first, rest)) = terms.split_first() {
                let log_denom = rest.iter().fold(first, |acc, &t| log_sum_exp_pair(acc, t));
                log_theta[i] = w_i.ln() - log_denom;
            }
        }
        let mean_log: f64 = log_theta.iter().sum::<f64>() / n as f64;
        for lt in log_theta.iter_mut() {
            *lt -= mean_log;
        }
        let max_change = log_theta
            .iter()
            .zip(log_theta_old.iter())
            .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
        if max_change < cfg.log_tol {
            converged = true;
            break;
        }
    }
    if !converged {
        tracing::warn!(
            max_iter = cfg.max_iter,
            n_classes = n,
            "Bradley-Terry MM log-space iteration did not converge"
        );
    }

    let mut theta: Vec<f64> = log_theta.iter().map(|&lt| lt.exp()).collect();
    let total: f64 = theta.iter().sum();
    if total > 0.0 {
        for t in theta.iter_mut() {
            *t *= n as f64 / total;
        }
    }
    theta
}

/// Picks linear- or log-space MM based on the spread of raw counts, per
/// spec §4.2.3. A spread of four orders of magnitude between the max and
/// min nonzero cell is treated as "exceeds what double precision can
/// represent directly" for this purpose.
pub fn strengths_auto(counts: &[f64], n: usize, prior: f64, cfg: BtConfig) -> Vec<f64> {
    let mut max_c = 0.0_f64;
    let mut min_nonzero = f64::INFINITY;
    for &c in counts {
        if c > max_c {
            max_c = c;
        }
        if c > 0.0 && c < min_nonzero {
            min_nonzero = c;
        }
    }
    if min_nonzero.is_finite() && max_c / min_nonzero > 1e4 {
        compute_strengths_logspace(counts, n, prior, cfg)
    } else {
        compute_strengths(counts, n, prior, cfg)
    }
}

pub fn pairwise_probability(theta: &[f64], i: usize, j: usize) -> f64 {
    let sum = theta[i] + theta[j];
    if sum == 0.0 {
        0.5
    } else {
        theta[i] / sum
    }
}

pub fn p_correct(theta: &[f64], target: usize, alternatives: &[usize]) -> f64 {
    let total: f64 = alternatives.iter().map(|&k| theta[k]).sum();
    if total == 0.0 {
        return 1.0 / alternatives.len() as f64;
    }
    theta[target] / total
}

/// Computes and caches the strength vector on `state` if it isn't already
/// cached, then returns a copy. Takes `&mut ConfusionState` so the cache
/// actually persists on the caller's state rather than being recomputed on
/// every query — [`ConfusionModel::success_distribution`] threads the
/// updated state back the same way [`ConfusionModel::update`] already does.
pub fn strengths_for(state: &mut ConfusionState, cfg: BtConfig) -> Vec<f64> {
    if let Some(cached) = state.cached_bt_strengths() {
        return cached.to_vec();
    }
    let theta = strengths_auto(state.counts(), state.n_classes, state.prior, cfg);
    state.set_cached_bt_strengths(theta.clone());
    theta
}

pub fn success_distribution(
    theta: &[f64],
    row_sum: f64,
    correct: usize,
    alternatives: &[usize],
) -> BetaParams {
    let p = p_correct(theta, correct, alternatives);
    BetaParams::new(p * row_sum, (1.0 - p) * row_sum)
}

/// Raised by callers that want to surface nonconvergence explicitly (e.g.
/// diagnostics); the sampler itself never calls this — it always uses the
/// infallible [`strengths_for`].
pub fn check_converged(theta_before: &[f64], theta_after: &[f64], cfg: BtConfig) -> Result<()> {
    let max_change = theta_before
        .iter()
        .zip(theta_after.iter())
        .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
    if max_change >= cfg.tol {
        return Err(DrillError::NonconvergentBt {
            max_iter: cfg.max_iter,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_known_ratio() {
        // wins[0][1] = 80, wins[1][0] = 20, prior = 0.
        let counts = vec![0.0, 80.0, 20.0, 0.0];
        let theta = compute_strengths(&counts, 2, 0.0, BtConfig::default());
        let p = pairwise_probability(&theta, 0, 1);
        assert!((p - 0.80).abs() < 0.01, "p = {p}");
    }

    #[test]
    fn logspace_matches_linear_on_same_input() {
        let counts = vec![0.0, 80.0, 20.0, 0.0];
        let linear = compute_strengths(&counts, 2, 0.0, BtConfig::default());
        let log = compute_strengths_logspace(&counts, 2, 0.0, BtConfig::default());
        let p_lin = pairwise_probability(&linear, 0, 1);
        let p_log = pairwise_probability(&log, 0, 1);
        assert!((p_lin - p_log).abs() < 0.02);
    }

    #[test]
    fn choice_probability_excludes_nothing_when_uniform() {
        let theta = vec![1.0; 4];
        let p = p_correct(&theta, 0, &[0, 1, 2, 3]);
        assert!((p - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_matrix_returns_empty_strengths() {
        assert!(compute_strengths(&[], 0, 1.0, BtConfig::default()).is_empty());
    }
}
