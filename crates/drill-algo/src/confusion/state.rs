//! Contiguous confusion-matrix storage shared by all model variants.
//!
//! Grounded on the Design Note in spec §9 ("prefer a contiguous
//! `[n_classes x n_classes]` backing array with precomputed row sums cached
//! alongside") and the row-major `&[f64]` convention in
//! `packages/native/src/matrix/mod.rs`. Per-context tracking is a
//! supplemented feature grounded on `tone_drill.py`'s `ConfusionState`
//! (`counts_by_context`, `get_context_key`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DrillError, Result};

/// How `initial_state` seeds a fresh matrix. A configuration switch, not an
/// inferred default — see spec §9, "Open question — diagonal-biased prior
/// scope". Replay determinism depends on matching whichever policy was in
/// force when the events being replayed were recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Every cell seeded to `prior`.
    Uniform,
    /// Off-diagonal cells seeded to `prior`, diagonal cells to `3 * prior`.
    DiagonalBiased,
}

/// Posterior state for one `(user, problem_type)`. Counts already include
/// whatever seed mass `initial_state` assigned — query-time formulas read
/// `counts` directly rather than re-adding the prior, since it is already
/// baked in (matches `model.py::make_initial_state` / `get_confusion_prob`,
/// where the stored matrix *is* the Dirichlet posterior's alpha vector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionState {
    pub n_classes: usize,
    pub prior: f64,
    counts: Vec<f64>,
    row_sums: Vec<f64>,
    #[serde(skip)]
    bt_strengths: Option<Vec<f64>>,
    contexts: HashMap<String, Vec<f64>>,
}

/// Caps applied to context keys, matching `ConfusionState.get_context_key`
/// in `tone_drill.py`.
const MAX_CONTEXT_SYLLABLES: u32 = 3;
const MAX_CONTEXT_POSITION: u32 = 2;

pub fn context_key(syllable_count: u32, position: u32) -> String {
    let syl = syllable_count.min(MAX_CONTEXT_SYLLABLES);
    let pos = position.min(MAX_CONTEXT_POSITION);
    format!("{syl}-{pos}")
}

impl ConfusionState {
    pub fn seed(n_classes: usize, prior: f64, policy: SeedPolicy) -> Self {
        let mut counts = vec![prior; n_classes * n_classes];
        if policy == SeedPolicy::DiagonalBiased {
            for i in 0..n_classes {
                counts[i * n_classes + i] = 3.0 * prior;
            }
        }
        let row_sums = Self::compute_row_sums(&counts, n_classes);
        Self {
            n_classes,
            prior,
            counts,
            row_sums,
            bt_strengths: None,
            contexts: HashMap::new(),
        }
    }

    fn compute_row_sums(counts: &[f64], n_classes: usize) -> Vec<f64> {
        (0..n_classes)
            .map(|i| counts[i * n_classes..(i + 1) * n_classes].iter().sum())
            .collect()
    }

    /// Validates that a loaded matrix matches the problem type's declared
    /// size. Corrupt posteriors are the caller's responsibility to
    /// re-initialize (spec §7, `ShapeMismatch`); this constructor only
    /// reports the mismatch.
    pub fn from_counts(n_classes: usize, prior: f64, counts: Vec<f64>) -> Result<Self> {
        if counts.len() != n_classes * n_classes {
            let err = DrillError::ShapeMismatch {
                expected: n_classes,
                actual: (counts.len() as f64).sqrt() as usize,
            };
            tracing::warn!(error = %err, "posterior shape mismatch on load; caller must re-init");
            return Err(err);
        }
        let row_sums = Self::compute_row_sums(&counts, n_classes);
        Ok(Self {
            n_classes,
            prior,
            counts,
            row_sums,
            bt_strengths: None,
            contexts: HashMap::new(),
        })
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.counts[i * self.n_classes + j]
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.row_sums[i]
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn context_counts(&self, key: &str) -> Option<&[f64]> {
        self.contexts.get(key).map(|v| v.as_slice())
    }

    /// Lazily-computed, update-invalidated Bradley-Terry strength cache.
    pub fn cached_bt_strengths(&self) -> Option<&[f64]> {
        self.bt_strengths.as_deref()
    }

    pub fn set_cached_bt_strengths(&mut self, strengths: Vec<f64>) {
        self.bt_strengths = Some(strengths);
    }

    /// Copy-on-update increment of `counts[correct][selected]`, plus the
    /// matching per-context cell keyed by `(syllable_count, position)`.
    /// Returns a fresh state; row sums are recomputed for the touched row
    /// and the BT cache is dropped.
    pub fn incremented(
        &self,
        correct: usize,
        selected: usize,
        syllable_count: u32,
        position: u32,
    ) -> Self {
        let mut counts = self.counts.clone();
        counts[correct * self.n_classes + selected] += 1.0;
        let mut row_sums = self.row_sums.clone();
        row_sums[correct] += 1.0;

        let mut contexts = self.contexts.clone();
        let key = context_key(syllable_count, position);
        let entry = contexts
            .entry(key)
            .or_insert_with(|| vec![0.0; self.n_classes * self.n_classes]);
        entry[correct * self.n_classes + selected] += 1.0;

        Self {
            n_classes: self.n_classes,
            prior: self.prior,
            counts,
            row_sums,
            bt_strengths: None,
            contexts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_seed_has_flat_rows() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::Uniform);
        for i in 0..6 {
            assert_eq!(s.row_sum(i), 6.0);
            for j in 0..6 {
                assert_eq!(s.get(i, j), 1.0);
            }
        }
    }

    #[test]
    fn diagonal_biased_seed_triples_diagonal() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::DiagonalBiased);
        assert_eq!(s.get(0, 0), 3.0);
        assert_eq!(s.get(0, 1), 1.0);
        assert_eq!(s.row_sum(0), 3.0 + 5.0);
    }

    #[test]
    fn increment_updates_cell_row_sum_and_context() {
        let s = ConfusionState::seed(6, 1.0, SeedPolicy::Uniform);
        let s2 = s.incremented(0, 0, 1, 0);
        assert_eq!(s2.get(0, 0), 2.0);
        assert_eq!(s2.row_sum(0), 7.0);
        assert_eq!(s.row_sum(0), 6.0, "original state is untouched");

        let ctx = s2.context_counts(&context_key(1, 0)).unwrap();
        assert_eq!(ctx[0], 1.0);
    }

    #[test]
    fn context_key_caps_syllables_and_position() {
        assert_eq!(context_key(1, 0), "1-0");
        assert_eq!(context_key(9, 9), "3-2");
    }

    #[test]
    fn shape_mismatch_detected() {
        let err = ConfusionState::from_counts(6, 1.0, vec![0.0; 25]).unwrap_err();
        assert!(matches!(err, DrillError::ShapeMismatch { expected: 6, .. }));
    }
}
