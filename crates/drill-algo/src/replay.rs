//! Deterministic posterior replay: reconstructs a confusion model from an
//! ordered event log, and verifies a stored model against that
//! reconstruction.
//!
//! Grounded on spec §4.6 ("Replay"); there is no single original-source
//! file for this (the source computes posteriors online only), so the
//! shape follows `ConfusionModel::update`'s copy-on-update style.

use serde::{Deserialize, Serialize};

use crate::confusion::model::{ConfusionModel, ModelKind};
use crate::confusion::state::SeedPolicy;
use crate::error::Result;

/// One recorded answer event, replayable in order to reproduce a
/// posterior from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub correct_sequence: Vec<usize>,
    pub selected_sequence: Vec<usize>,
    pub syllable_count: u32,
}

/// Replays `events` in order from a freshly seeded model, returning the
/// final posterior. A malformed event (out-of-range class) aborts the
/// replay with the same error `update` would raise at that point.
pub fn replay(
    kind: ModelKind,
    n_classes: usize,
    prior: f64,
    seed_policy: SeedPolicy,
    events: &[AnswerEvent],
) -> Result<ConfusionModel> {
    let mut model = ConfusionModel::initial_state(kind, n_classes, prior, seed_policy);
    for event in events {
        let (next, _) = model.update(&event.correct_sequence, &event.selected_sequence, event.syllable_count)?;
        model = next;
    }
    Ok(model)
}

/// Sum of absolute differences between two models' raw count matrices.
/// Zero means the two states are bit-for-bit reconstructable from each
/// other's event history.
pub fn total_absolute_difference(a: &ConfusionModel, b: &ConfusionModel) -> f64 {
    a.state
        .counts()
        .iter()
        .zip(b.state.counts().iter())
        .map(|(x, y)| (x - y).abs())
        .sum()
}

/// Verifies that replaying `events` reproduces `expected`'s state exactly
/// (within floating point noise). Returns the discrepancy so callers can
/// log it rather than only get a boolean.
pub fn verify(
    kind: ModelKind,
    n_classes: usize,
    prior: f64,
    seed_policy: SeedPolicy,
    events: &[AnswerEvent],
    expected: &ConfusionModel,
) -> Result<f64> {
    let reconstructed = replay(kind, n_classes, prior, seed_policy, events)?;
    Ok(total_absolute_difference(&reconstructed, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reproduces_incremental_updates() {
        let mut live = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let events = vec![
            AnswerEvent { correct_sequence: vec![0], selected_sequence: vec![0], syllable_count: 1 },
            AnswerEvent { correct_sequence: vec![1], selected_sequence: vec![2], syllable_count: 1 },
            AnswerEvent { correct_sequence: vec![0], selected_sequence: vec![1], syllable_count: 2 },
        ];
        for event in &events {
            let (next, _) = live.update(&event.correct_sequence, &event.selected_sequence, event.syllable_count).unwrap();
            live = next;
        }

        let reconstructed = replay(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform, &events).unwrap();
        assert_eq!(total_absolute_difference(&live, &reconstructed), 0.0);
    }

    #[test]
    fn verify_reports_nonzero_on_mismatched_history() {
        let truth = ConfusionModel::initial_state(ModelKind::Dirichlet, 6, 1.0, SeedPolicy::DiagonalBiased);
        let (truth, _) = truth.update(&[0], &[0], 1).unwrap();

        let events = vec![AnswerEvent { correct_sequence: vec![0], selected_sequence: vec![1], syllable_count: 1 }];
        let discrepancy = verify(ModelKind::Dirichlet, 6, 1.0, SeedPolicy::DiagonalBiased, &events, &truth).unwrap();
        assert!(discrepancy > 0.0);
    }

    #[test]
    fn replay_propagates_invalid_event_error() {
        let events = vec![AnswerEvent { correct_sequence: vec![99], selected_sequence: vec![0], syllable_count: 1 }];
        let result = replay(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform, &events);
        assert!(result.is_err());
    }
}
