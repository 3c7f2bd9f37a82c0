//! The confusion-model family: shared posterior storage plus three
//! prediction/update variants dispatched by a tagged enum.

pub mod bradley_terry;
pub mod dirichlet;
pub mod luce;
pub mod model;
pub mod state;

pub use model::{ConfusionModel, ModelKind, PairStat, SetStat, StateUpdate};
pub use state::{ConfusionState, SeedPolicy};
