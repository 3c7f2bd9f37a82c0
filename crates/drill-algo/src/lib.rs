#![deny(clippy::all)]

pub mod beta;
pub mod config;
pub mod confusion;
pub mod error;
pub mod lesson;
pub mod replay;
pub mod sampler;
pub mod taxonomy;
pub mod types;
pub mod word_index;

pub use beta::BetaParams;
pub use config::SamplerConfig;
pub use confusion::{ConfusionModel, ConfusionState, ModelKind, PairStat, SeedPolicy, SetStat, StateUpdate};
pub use error::{DrillError, Result};
pub use lesson::{
    DrillMode, LessonPhase, LessonProgress, LessonState, LessonSummary, MistakeRecord,
};
pub use replay::AnswerEvent;
pub use taxonomy::{DrillFamily, ProblemType, Taxonomy};
pub use types::{DifficultyLevel, NextDrillOutcome, PreviousAnswer, Problem};
pub use word_index::{Word, WordIndex};
