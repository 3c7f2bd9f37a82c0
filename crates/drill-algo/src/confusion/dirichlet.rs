//! Dirichlet-Categorical confusion model variant.
//!
//! Storage and update rule are shared with [`super::luce`]; only prediction
//! differs. Grounded on
//! `examples/original_source/backend/app/ml/model.py`
//! (`get_confusion_prob`, `get_error_probability`).

use crate::beta::BetaParams;

use super::state::ConfusionState;

/// `P(success | correct = i, alternatives = A)` under the Dirichlet
/// posterior mean, restricted to and renormalized over `A`. The dominant
/// formulation (no restriction) is the unrestricted categorical row; here
/// we always restrict, since every caller supplies a concrete alternative
/// set (spec §4.2.2).
pub fn p_correct(state: &ConfusionState, correct: usize, alternatives: &[usize]) -> f64 {
    let numerator = state.get(correct, correct);
    let denominator: f64 = alternatives.iter().map(|&k| state.get(correct, k)).sum();
    if denominator <= 0.0 {
        return 0.5;
    }
    numerator / denominator
}

/// Beta summarizing success on this problem. `n_eff` is the full row sum
/// (already prior-inclusive, see [`ConfusionState`]'s doc comment), matched
/// to the same convention used by [`super::luce::success_distribution`] so
/// the two variants combine uniformly in `all_pair_stats`.
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
    fn uniform_prior_two_choice_mean_is_half() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::Uniform);
        let p = p_correct(&s, 0, &[0, 1]);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn diagonal_bias_favors_correct_class() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::DiagonalBiased);
        let p = p_correct(&s, 0, &[0, 1]);
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_observation_matches_reference_scenario() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::Uniform);
        let s = s.incremented(0, 0, 1, 0);
        let p = p_correct(&s, 0, &[0, 1]);
        assert!((p - 2.0 / 3.0).abs() < 1e-9);
    }
}
