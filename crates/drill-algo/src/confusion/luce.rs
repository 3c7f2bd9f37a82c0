//! Luce-with-pseudocounts variant — the reference ("production") model.
//!
//! Grounded directly on spec §4.2.1. This is a count-based update rule and
//! is distinct from `examples/original_source/backend/app/ml/luce_service.py`'s
//! gradient-descent `LuceMLService`; where the two disagree, spec §4.2.1 is
//! authoritative.

use crate::beta::BetaParams;

use super::state::ConfusionState;

/// Interpret `counts[correct][j]` as the Luce strength for class `j` when
/// the correct class is `correct`. `counts` already carries whatever prior
/// mass `initial_state` seeded (see [`ConfusionState`]), so the predicted
/// success probability is the direct ratio over the presented alternatives,
/// with no second addition of `prior`.
pub fn p_correct(state: &ConfusionState, correct: usize, alternatives: &[usize]) -> f64 {
    let numerator = state.get(correct, correct);
    let denominator: f64 = alternatives.iter().map(|&k| state.get(correct, k)).sum();
    if denominator <= 0.0 {
        return 0.5;
    }
    numerator / denominator
}

/// `n_eff` is the full row total (`Σ_j counts[correct][j]`); it is already
/// prior-inclusive, so no extra `|A| * prior` term is added (see the doc
/// comment on [`p_correct`]).
pub fn success_distribution(
    state: &ConfusionState,
    correct: usize,
    alternatives: &[usize],
) -> BetaParams {
    let p = p_correct(state, correct, alternatives);
    let n_eff = state.row_sum(correct);
    BetaParams::new(p * n_eff, (1.0 - p) * n_eff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confusion::state::SeedPolicy;

    #[test]
    fn matches_diagonal_biased_reference_scenario() {
        // initial_state("tone_1") with diagonal bias, prior = 0.25, correct=0
        // (1-indexed 1), alts = [0, 1] (1-indexed [1, 2]).
        let prior = 0.25;
        let s = ConfusionState::seed(6, prior, SeedPolicy::DiagonalBiased);
        let dist = success_distribution(&s, 0, &[0, 1]);
        assert!((dist.mean() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn repeated_observation_increases_confidence() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::Uniform);
        let before = success_distribution(&s, 0, &[0, 1]);
        let s2 = s.incremented(0, 0, 1, 0);
        let after = success_distribution(&s2, 0, &[0, 1]);
        assert!(after.mean() > before.mean());
        assert!(after.total_observations() > before.total_observations());
    }
}
