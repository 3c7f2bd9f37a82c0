//! `/drill/next` and `/drill/stats` — thin handlers over `drill-algo`'s
//! sampler. Request/response shapes grounded on
//! `examples/original_source/backend/app/routers/drill.py`
//! (`NextDrillRequest`/`NextDrillResponse`/`PairStats`/`FourChoiceStats`),
//! minus auth (spec's Non-goals put HTTP auth out of scope — `user_id` is
//! an explicit request field instead of a dependency-injected session).

use axum::extract::{Query, State};
use axum::Json;
use drill_algo::{AnswerEvent, ConfusionModel, ModelKind, NextDrillOutcome, PreviousAnswer};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NextDrillRequest {
    pub user_id: String,
    pub problem_type_id: String,
    #[serde(default)]
    pub previous_answer: Option<PreviousAnswer>,
}

pub async fn next_drill(
    State(state): State<AppState>,
    Json(request): Json<NextDrillRequest>,
) -> Result<Json<NextDrillOutcome>, AppError> {
    let problem_type = state.taxonomy().lock().get(&request.problem_type_id)?;

    let posteriors = state.posteriors();
    let sampler_config = state.sampler_config();
    let raw_state = posteriors.load_or_seed(
        &request.user_id,
        &problem_type.problem_type_id,
        problem_type.n_classes,
        problem_type.prior_strength,
        sampler_config.seed_policy,
    );
    let model = ConfusionModel::from_state(ModelKind::LucePseudocount, raw_state);

    let mut rng = rand::thread_rng();
    let (updated_model, outcome) = drill_algo::sampler::next_drill(
        &problem_type,
        &model,
        &state.word_index(),
        &sampler_config,
        request.previous_answer.as_ref(),
        &mut rng,
    )?;

    let event = request.previous_answer.as_ref().map(|pa| AnswerEvent {
        correct_sequence: pa.correct_sequence.clone(),
        selected_sequence: pa.selected_sequence.clone(),
        syllable_count: pa.correct_sequence.len() as u32,
    });
    posteriors.save(
        &request.user_id,
        &problem_type.problem_type_id,
        updated_model.state,
        event,
    );

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct DrillStatsQuery {
    pub user_id: String,
    pub problem_type_id: String,
}

#[derive(Debug, Serialize)]
pub struct DrillStatsResponse {
    pub pair_stats: Vec<drill_algo::PairStat>,
    pub four_choice_stats: Vec<drill_algo::SetStat>,
}

pub async fn drill_stats(
    State(state): State<AppState>,
    Query(query): Query<DrillStatsQuery>,
) -> Result<Json<DrillStatsResponse>, AppError> {
    let problem_type = state.taxonomy().lock().get(&query.problem_type_id)?;
    let sampler_config = state.sampler_config();
    let raw_state = state.posteriors().load_or_seed(
        &query.user_id,
        &problem_type.problem_type_id,
        problem_type.n_classes,
        problem_type.prior_strength,
        sampler_config.seed_policy,
    );
    let mut model = ConfusionModel::from_state(ModelKind::LucePseudocount, raw_state);

    let mut rng = rand::thread_rng();
    let (_, pair_stats, four_choice_stats) =
        drill_algo::sampler::tier(&mut model, &sampler_config, problem_type.n_classes, &mut rng);

    // `tier` may have populated the Bradley-Terry strength cache on `model.state`;
    // persist it so the next query reuses it instead of recomputing from scratch.
    state.posteriors().save(
        &query.user_id,
        &problem_type.problem_type_id,
        model.state,
        None,
    );

    Ok(Json(DrillStatsResponse {
        pair_stats,
        four_choice_stats,
    }))
}
