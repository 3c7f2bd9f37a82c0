//! Tunable constants for the confusion model, sampler and lesson
//! controller (spec §6, "Configuration").

use serde::{Deserialize, Serialize};

use crate::confusion::bradley_terry::BtConfig;
use crate::confusion::state::SeedPolicy;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub pair_mastery: f64,
    pub four_choice_mastery: f64,
    pub preview_probability: f64,
    pub sampling_aggressiveness: f64,
    pub seed_policy: SeedPolicy,
    pub bt: BtConfig,
    pub drills_per_lesson: u32,
    /// `(two_choice_1syl, four_choice_1syl, two_choice_2syl)` plan mix.
    pub lesson_plan_mix: (u32, u32, u32),
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            pair_mastery: 0.80,
            four_choice_mastery: 0.90,
            preview_probability: 0.20,
            sampling_aggressiveness: 3.0,
            seed_policy: SeedPolicy::Uniform,
            bt: BtConfig::default(),
            drills_per_lesson: 10,
            lesson_plan_mix: (6, 2, 2),
        }
    }
}

impl SamplerConfig {
    /// Overrides defaults from environment variables, matching the names
    /// in spec §6. Unset or malformed variables keep the default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_f64("PAIR_MASTERY") {
            cfg.pair_mastery = v;
        }
        if let Some(v) = env_f64("FOUR_CHOICE_MASTERY") {
            cfg.four_choice_mastery = v;
        }
        if let Some(v) = env_f64("PREVIEW_PROBABILITY") {
            cfg.preview_probability = v;
        }
        if let Some(v) = env_f64("SAMPLING_AGGRESSIVENESS") {
            cfg.sampling_aggressiveness = v;
        }
        if let Some(v) = env_usize("BT_MAX_ITER") {
            cfg.bt.max_iter = v;
        }
        if let Some(v) = env_f64("BT_TOL") {
            cfg.bt.tol = v;
        }
        if let Some(v) = env_usize("DRILLS_PER_LESSON") {
            cfg.drills_per_lesson = v as u32;
        }
        if std::env::var("DIAGONAL_BIASED_PRIOR").as_deref() == Ok("1") {
            cfg.seed_policy = SeedPolicy::DiagonalBiased;
        }
        cfg
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

// Per-family prior strength (spec §6, `PRIOR_STRENGTH`: "default 1.0 for
// tones, higher for vowels") lives on `Taxonomy`'s registered `ProblemType`
// descriptors (`taxonomy::DrillFamily::default_pseudocount`), not here, so
// there is exactly one place that owns it.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SamplerConfig::default();
        assert_eq!(cfg.pair_mastery, 0.80);
        assert_eq!(cfg.four_choice_mastery, 0.90);
        assert_eq!(cfg.preview_probability, 0.20);
        assert_eq!(cfg.sampling_aggressiveness, 3.0);
        assert_eq!(cfg.drills_per_lesson, 10);
        assert_eq!(cfg.lesson_plan_mix, (6, 2, 2));
    }
}
