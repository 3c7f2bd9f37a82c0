//! Tagged-variant confusion model dispatching to one of three update/predict
//! rules over a shared [`ConfusionState`]. Dispatch is by match, not by
//! virtual call (spec §9 Design Note).
//!
//! Grounded on `examples/original_source/backend/app/ml/{model,bradley_terry}.py`
//! and `luce_service.py::get_all_pair_stats` for the `all_pair_stats` query
//! shape (the combination rule itself is spec §4.2.4's moment-matched Beta
//! mixture, independent of the per-variant prediction rule).

use serde::{Deserialize, Serialize};

use crate::beta::BetaParams;
use crate::error::{DrillError, Result};

use super::bradley_terry::{self, BtConfig};
use super::dirichlet;
use super::luce;
use super::state::{ConfusionState, SeedPolicy};

/// Which prediction/update rule a [`ConfusionModel`] uses. Storage and the
/// raw increment-on-update rule are identical across all three; only
/// `success_distribution` differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Dirichlet,
    LucePseudocount,
    BradleyTerryMM,
}

/// A single tracker delta, emitted by `update` for observability (spec
/// §4.2: "a list of tracker-id/old/new triples").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub tracker_id: String,
    pub old_value: f64,
    pub new_value: f64,
}

/// A Beta summary for an unordered pair or a four-class subset, as
/// returned over the wire (spec §6: `pair_stats` / `four_choice_stats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStat {
    pub pair: (usize, usize),
    pub alpha: f64,
    pub beta: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetStat {
    pub set: Vec<usize>,
    pub alpha: f64,
    pub beta: f64,
    pub mean: f64,
}

/// A confusion model: a variant tag plus the posterior it operates over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionModel {
    pub kind: ModelKind,
    pub state: ConfusionState,
    pub bt_config: BtConfig,
}

impl ConfusionModel {
    pub fn initial_state(
        kind: ModelKind,
        n_classes: usize,
        prior: f64,
        policy: SeedPolicy,
    ) -> Self {
        Self {
            kind,
            state: ConfusionState::seed(n_classes, prior, policy),
            bt_config: BtConfig::default(),
        }
    }

    pub fn from_state(kind: ModelKind, state: ConfusionState) -> Self {
        Self {
            kind,
            state,
            bt_config: BtConfig::default(),
        }
    }

    /// Predicted success Beta for a problem whose correct class is
    /// `correct` and whose presented classes are `alternatives` (which must
    /// include `correct`). Takes `&mut self` because the `BradleyTerryMM`
    /// variant populates `self.state`'s strength cache on first use (see
    /// [`bradley_terry::strengths_for`]); callers must persist the returned
    /// model the same way they already persist `update`'s output so the
    /// cache survives to the next query instead of being recomputed from
    /// scratch (spec §4.2.3's latency requirement at `n_classes = 12`).
    pub fn success_distribution(&mut self, correct: usize, alternatives: &[usize]) -> BetaParams {
        match self.kind {
            ModelKind::Dirichlet => dirichlet::success_distribution(&self.state, correct, alternatives),
            ModelKind::LucePseudocount => luce::success_distribution(&self.state, correct, alternatives),
            ModelKind::BradleyTerryMM => {
                let theta = bradley_terry::strengths_for(&mut self.state, self.bt_config);
                let row_sum = self.state.row_sum(correct);
                bradley_terry::success_distribution(&theta, row_sum, correct, alternatives)
            }
        }
    }

    /// Copy-on-update: increments `counts[correct][selected]` (and the
    /// matching per-context cell), touching only `sequence[0]` even for
    /// multi-syllable problems.
    ///
    /// Extension point (spec §9, "Open question — multi-syllable update"):
    /// the source never observed later syllables either; callers that need
    /// per-position tracking should read `ConfusionState::context_counts`
    /// keyed by `(syllable_count, position)`, which this method populates
    /// for position 0 even though the aggregate matrix does not extend
    /// past it.
    pub fn update(
        &self,
        correct_sequence: &[usize],
        selected_sequence: &[usize],
        syllable_count: u32,
    ) -> Result<(Self, Vec<StateUpdate>)> {
        let (Some(&correct), Some(&selected)) =
            (correct_sequence.first(), selected_sequence.first())
        else {
            return Err(DrillError::InvalidAnswer);
        };
        if correct >= self.state.n_classes || selected >= self.state.n_classes {
            return Err(DrillError::InvalidAnswer);
        }

        let old_value = self.state.get(correct, selected);
        let new_state = self.state.incremented(correct, selected, syllable_count, 0);
        let new_value = new_state.get(correct, selected);

        let update = StateUpdate {
            tracker_id: format!("{correct}-{selected}"),
            old_value,
            new_value,
        };

        Ok((
            Self {
                kind: self.kind,
                state: new_state,
                bt_config: self.bt_config,
            },
            vec![update],
        ))
    }

    fn synthetic_pair_beta(&mut self, correct: usize, other: usize) -> BetaParams {
        self.success_distribution(correct, &[correct, other])
    }

    /// One Beta per unordered pair `(a, b)`, `a < b`, combining the two
    /// synthetic two-choice problems (`a` correct vs `b`, and vice versa)
    /// via the moment-matched mixture (spec §4.2.4). For `BradleyTerryMM`
    /// the strength vector is computed once (via the first
    /// `success_distribution` call) and reused for every remaining pair in
    /// this same call, rather than re-running MM iteration per pair.
    pub fn all_pair_stats(&mut self) -> Vec<PairStat> {
        let n = self.state.n_classes;
        let mut out = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
        for a in 0..n {
            for b in (a + 1)..n {
                let beta_a = self.synthetic_pair_beta(a, b);
                let beta_b = self.synthetic_pair_beta(b, a);
                let mix = BetaParams::mixture(beta_a, beta_b);
                out.push(PairStat {
                    pair: (a, b),
                    alpha: mix.alpha,
                    beta: mix.beta,
                    mean: mix.mean(),
                });
            }
        }
        out
    }

    /// One Beta per canonical four-class subset, combining the |set|
    /// synthetic problems (each class as correct, alternatives = the whole
    /// set) via the equal-weight moment-matched mixture generalization
    /// (see `BetaParams::mixture_n`).
    pub fn set_stat(&mut self, set: &[usize]) -> SetStat {
        let components: Vec<BetaParams> = set
            .iter()
            .map(|&correct| self.success_distribution(correct, set))
            .collect();
        let mix = BetaParams::mixture_n(&components);
        SetStat {
            set: set.to_vec(),
            alpha: mix.alpha,
            beta: mix.beta,
            mean: mix.mean(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_increments_exactly_one_cell() {
        let model = ConfusionModel::initial_state(
            ModelKind::LucePseudocount,
            6,
            1.0,
            SeedPolicy::Uniform,
        );
        let before = model.state.get(0, 0);
        let (updated, updates) = model.update(&[0], &[0], 1).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updated.state.get(0, 0), before + 1.0);
        for i in 0..6 {
            for j in 0..6 {
                if (i, j) != (0, 0) {
                    assert_eq!(updated.state.get(i, j), model.state.get(i, j));
                }
            }
        }
    }

    #[test]
    fn invalid_answer_out_of_range_is_rejected() {
        let model = ConfusionModel::initial_state(
            ModelKind::LucePseudocount,
            6,
            1.0,
            SeedPolicy::Uniform,
        );
        assert!(matches!(
            model.update(&[0], &[9], 1),
            Err(DrillError::InvalidAnswer)
        ));
    }

    #[test]
    fn all_pair_stats_covers_every_unordered_pair() {
        let mut model = ConfusionModel::initial_state(
            ModelKind::LucePseudocount,
            6,
            1.0,
            SeedPolicy::Uniform,
        );
        let stats = model.all_pair_stats();
        assert_eq!(stats.len(), 15);
        for s in &stats {
            assert!(s.pair.0 < s.pair.1);
            assert!(s.alpha >= 0.1 && s.beta >= 0.1);
        }
    }

    #[test]
    fn probability_axiom_mean_in_unit_interval() {
        for kind in [
            ModelKind::Dirichlet,
            ModelKind::LucePseudocount,
            ModelKind::BradleyTerryMM,
        ] {
            let mut model = ConfusionModel::initial_state(kind, 6, 1.0, SeedPolicy::DiagonalBiased);
            for correct in 0..6 {
                let dist = model.success_distribution(correct, &(0..6).collect::<Vec<_>>());
                assert!(dist.mean() >= 0.0 && dist.mean() <= 1.0);
            }
        }
    }

    #[test]
    fn bradley_terry_strength_cache_persists_across_calls() {
        let mut model = ConfusionModel::initial_state(
            ModelKind::BradleyTerryMM,
            6,
            1.0,
            SeedPolicy::DiagonalBiased,
        );
        assert!(model.state.cached_bt_strengths().is_none());
        let _ = model.success_distribution(0, &[0, 1]);
        assert!(
            model.state.cached_bt_strengths().is_some(),
            "first query should populate the strength cache"
        );
        let cached_before = model.state.cached_bt_strengths().unwrap().to_vec();
        let _ = model.all_pair_stats();
        assert_eq!(
            model.state.cached_bt_strengths().unwrap(),
            cached_before.as_slice(),
            "subsequent queries should reuse the cache, not recompute it"
        );
    }

    #[test]
    fn monotone_confidence_on_repeated_observation() {
        let mut model =
            ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let mut last_mean = model.success_distribution(0, &[0, 1]).mean();
        let mut last_total = model.success_distribution(0, &[0, 1]).total_observations();
        for _ in 0..5 {
            let (next, _) = model.update(&[0], &[0], 1).unwrap();
            model = next;
            let dist = model.success_distribution(0, &[0, 1]);
            assert!(dist.mean() > last_mean);
            assert!(dist.total_observations() > last_total);
            last_mean = dist.mean();
            last_total = dist.total_observations();
        }
    }
}
