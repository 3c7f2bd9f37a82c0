//! Problem-type registry: maps a stable string id to the descriptor the
//! confusion model and word index need (class count, prior strength).
//!
//! Grounded on `examples/original_source/backend/app/ml/registry.py`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DrillError, Result};

/// Drill family. Determines the class taxonomy (`word_index`) and the
/// family defaults used when a problem-type id is auto-synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillFamily {
    Tone,
    Vowel,
}

impl DrillFamily {
    fn as_str(self) -> &'static str {
        match self {
            DrillFamily::Tone => "tone",
            DrillFamily::Vowel => "vowel",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "tone" => Some(DrillFamily::Tone),
            "vowel" => Some(DrillFamily::Vowel),
            _ => None,
        }
    }

    fn default_n_classes(self) -> usize {
        match self {
            DrillFamily::Tone => 6,
            DrillFamily::Vowel => 12,
        }
    }

    fn default_pseudocount(self) -> f64 {
        match self {
            DrillFamily::Tone => 2.0,
            DrillFamily::Vowel => 5.0,
        }
    }
}

/// Immutable problem-type descriptor. Defined at startup, possibly extended
/// by the caller, never mutated once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemType {
    pub problem_type_id: String,
    pub family: DrillFamily,
    pub syllable_count: u32,
    pub n_classes: usize,
    pub prior_strength: f64,
}

impl ProblemType {
    pub fn matrix_size(&self) -> usize {
        self.n_classes
    }
}

fn make_problem_type_id(family: DrillFamily, syllable_count: u32) -> String {
    format!("{}_{}", family.as_str(), syllable_count)
}

/// Total lookup over registered and auto-synthesizable problem types.
///
/// Construction is explicit and threaded by the caller — no process-wide
/// singleton (spec Design Note on avoiding module-level mutable registries).
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    types: HashMap<String, ProblemType>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registers the four problem types the source ships with:
    /// `tone_1`, `tone_2`, `vowel_1`, `vowel_2`.
    pub fn with_defaults() -> Self {
        let mut t = Self::new();
        for family in [DrillFamily::Tone, DrillFamily::Vowel] {
            for syllable_count in [1u32, 2] {
                t.register(ProblemType {
                    problem_type_id: make_problem_type_id(family, syllable_count),
                    family,
                    syllable_count,
                    n_classes: family.default_n_classes(),
                    prior_strength: family.default_pseudocount(),
                });
            }
        }
        t
    }

    /// Registers a caller-supplied descriptor. Overwrites any existing
    /// entry with the same id.
    pub fn register(&mut self, config: ProblemType) {
        self.types.insert(config.problem_type_id.clone(), config);
    }

    /// Looks up a problem type by id. If the id is not registered but
    /// parses as `<family>_<positive integer>`, synthesizes and caches a
    /// descriptor from family defaults. Otherwise returns
    /// [`DrillError::UnknownProblemType`].
    pub fn get(&mut self, problem_type_id: &str) -> Result<ProblemType> {
        if let Some(cfg) = self.types.get(problem_type_id) {
            return Ok(cfg.clone());
        }

        if let Some((family_str, syllable_str)) = problem_type_id.split_once('_') {
            if let (Some(family), Ok(syllable_count)) =
                (DrillFamily::from_str(family_str), syllable_str.parse::<u32>())
            {
                if syllable_count > 0 {
                    let cfg = ProblemType {
                        problem_type_id: problem_type_id.to_string(),
                        family,
                        syllable_count,
                        n_classes: family.default_n_classes(),
                        prior_strength: family.default_pseudocount(),
                    };
                    self.register(cfg.clone());
                    return Ok(cfg);
                }
            }
        }

        Err(DrillError::UnknownProblemType(problem_type_id.to_string()))
    }

    /// Returns all registered types for a family, sorted by syllable count.
    pub fn for_family(&self, family: DrillFamily) -> Vec<ProblemType> {
        let mut v: Vec<ProblemType> = self
            .types
            .values()
            .filter(|cfg| cfg.family == family)
            .cloned()
            .collect();
        v.sort_by_key(|cfg| cfg.syllable_count);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_known_ids() {
        let mut tax = Taxonomy::with_defaults();
        let tone1 = tax.get("tone_1").unwrap();
        assert_eq!(tone1.n_classes, 6);
        assert_eq!(tone1.prior_strength, 2.0);

        let vowel2 = tax.get("vowel_2").unwrap();
        assert_eq!(vowel2.n_classes, 12);
        assert_eq!(vowel2.prior_strength, 5.0);
    }

    #[test]
    fn auto_synthesizes_unregistered_family_syllable_pair() {
        let mut tax = Taxonomy::new();
        let tone3 = tax.get("tone_3").unwrap();
        assert_eq!(tone3.syllable_count, 3);
        assert_eq!(tone3.n_classes, 6);

        // second lookup hits the now-cached entry
        let tone3_again = tax.get("tone_3").unwrap();
        assert_eq!(tone3, tone3_again);
    }

    #[test]
    fn malformed_id_is_unknown() {
        let mut tax = Taxonomy::new();
        assert!(matches!(
            tax.get("not-a-valid-id"),
            Err(DrillError::UnknownProblemType(_))
        ));
        assert!(matches!(
            tax.get("tone_abc"),
            Err(DrillError::UnknownProblemType(_))
        ));
        assert!(matches!(
            tax.get("klingon_1"),
            Err(DrillError::UnknownProblemType(_))
        ));
    }

    #[test]
    fn for_family_sorted_by_syllable_count() {
        let tax = Taxonomy::with_defaults();
        let tones = tax.for_family(DrillFamily::Tone);
        assert_eq!(
            tones.iter().map(|t| t.syllable_count).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
