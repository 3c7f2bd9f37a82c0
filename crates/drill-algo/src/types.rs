//! Wire-shaped types exchanged between the sampler/lesson controller and
//! their caller (spec §6, "External interfaces"). Grounded on
//! `examples/original_source/backend/app/ml/types.py` (`Problem`, `Answer`).

use serde::{Deserialize, Serialize};

use crate::confusion::model::{PairStat, SetStat, StateUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DifficultyLevel {
    TwoChoice,
    Mixed,
    FourChoiceMulti,
}

/// A drill problem presented to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub problem_type_id: String,
    pub word_id: u64,
    pub surface_form: String,
    pub gloss: String,
    pub correct_sequence: Vec<usize>,
    pub alternatives: Vec<Vec<usize>>,
    pub audio_voice: Option<String>,
    pub audio_speed: Option<f64>,
}

/// The previous answer, submitted alongside a request for the next drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousAnswer {
    pub problem_type_id: String,
    pub word_id: u64,
    pub correct_sequence: Vec<usize>,
    pub selected_sequence: Vec<usize>,
    pub alternatives: Vec<Vec<usize>>,
    pub response_time_ms: Option<u64>,
    pub audio_voice: Option<String>,
    pub audio_speed: Option<f64>,
}

impl PreviousAnswer {
    pub fn is_correct(&self) -> bool {
        self.selected_sequence == self.correct_sequence
    }
}

/// Output of the next-drill operation (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextDrillOutcome {
    pub drill: Problem,
    pub difficulty_level: DifficultyLevel,
    pub state_updates: Vec<StateUpdate>,
    pub pair_stats: Vec<PairStat>,
    pub four_choice_stats: Vec<SetStat>,
}
