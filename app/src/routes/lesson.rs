//! `/lesson/start`, `/lesson/next`, `/lesson/themes` — thin handlers over
//! `drill-algo`'s lesson controller. Request/response shapes grounded on
//! `examples/original_source/backend/app/routers/lesson.py`.

use axum::extract::State;
use axum::Json;
use drill_algo::{
    ConfusionModel, DrillMode, LessonProgress, LessonSummary, ModelKind, Problem,
};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartLessonRequest {
    pub user_id: String,
    #[serde(default)]
    pub theme_id: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StartLessonResponse {
    pub session_id: String,
    pub lesson_id: u64,
    pub theme_id: Option<usize>,
    pub theme_pairs: Vec<(usize, usize)>,
    pub total_drills: usize,
}

const LESSON_PROBLEM_TYPE_ID: &str = "tone_1";

pub async fn start_lesson(
    State(state): State<AppState>,
    Json(request): Json<StartLessonRequest>,
) -> Result<Json<StartLessonResponse>, AppError> {
    let problem_type = state.taxonomy().lock().get(LESSON_PROBLEM_TYPE_ID)?;
    let sampler_config = state.sampler_config();

    let raw_state = state.posteriors().load_or_seed(
        &request.user_id,
        &problem_type.problem_type_id,
        problem_type.n_classes,
        problem_type.prior_strength,
        sampler_config.seed_policy,
    );
    let mut model = ConfusionModel::from_state(ModelKind::LucePseudocount, raw_state);
    let pair_stats = model.all_pair_stats();

    // `all_pair_stats` may have populated the Bradley-Terry strength cache;
    // persist it so the next query against this posterior reuses it.
    state.posteriors().save(
        &request.user_id,
        &problem_type.problem_type_id,
        model.state,
        None,
    );

    let lesson_id = state.allocate_lesson_id();
    let mut rng = rand::thread_rng();
    let lesson_state = drill_algo::lesson::start_lesson(
        lesson_id,
        request.theme_id,
        &pair_stats,
        &sampler_config,
        &mut rng,
    );

    let response = StartLessonResponse {
        session_id: format!("{}_{:x}", request.user_id, lesson_id),
        lesson_id: lesson_state.lesson_id,
        theme_id: lesson_state.theme_id,
        theme_pairs: lesson_state.theme_pairs.clone(),
        total_drills: lesson_state.drill_sequence.len(),
    };

    state
        .lessons()
        .lock()
        .insert(response.session_id.clone(), lesson_state);

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct LessonDrillResponse {
    #[serde(flatten)]
    pub problem: Problem,
    pub mode: DrillMode,
    pub progress: LessonProgress,
}

#[derive(Debug, Serialize)]
pub struct LessonNextResponse {
    pub drill: Option<LessonDrillResponse>,
    pub is_complete: bool,
    pub summary: Option<LessonSummary>,
}

pub async fn first_drill(
    State(state): State<AppState>,
    axum::extract::Path(session_id): axum::extract::Path<String>,
) -> Result<Json<LessonNextResponse>, AppError> {
    let mut lessons = state.lessons().lock();
    let lesson_state = lessons
        .get_mut(&session_id)
        .ok_or_else(|| AppError::not_found(format!("no lesson session {session_id}")))?;

    let problem_type = state.taxonomy().lock().get(LESSON_PROBLEM_TYPE_ID)?;
    let mut rng = rand::thread_rng();
    let result = drill_algo::lesson::next_drill(
        lesson_state,
        &problem_type,
        &state.word_index(),
        &state.sampler_config(),
        &mut rng,
    );

    Ok(Json(match result {
        None => LessonNextResponse {
            drill: None,
            is_complete: true,
            summary: None,
        },
        Some((problem, mode, progress)) => LessonNextResponse {
            drill: Some(LessonDrillResponse {
                problem,
                mode,
                progress,
            }),
            is_complete: false,
            summary: None,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitLessonAnswerRequest {
    pub user_id: String,
    pub session_id: String,
    pub problem: Problem,
    pub mode: DrillMode,
    pub selected_sequence: Vec<usize>,
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<SubmitLessonAnswerRequest>,
) -> Result<Json<LessonNextResponse>, AppError> {
    let is_correct = request.selected_sequence == request.problem.correct_sequence;

    let problem_type = state.taxonomy().lock().get(&request.problem.problem_type_id)?;
    let sampler_config = state.sampler_config();
    let raw_state = state.posteriors().load_or_seed(
        &request.user_id,
        &problem_type.problem_type_id,
        problem_type.n_classes,
        problem_type.prior_strength,
        sampler_config.seed_policy,
    );
    let model = ConfusionModel::from_state(ModelKind::LucePseudocount, raw_state);
    let (updated_model, _) = drill_algo::lesson::apply_lesson_answer(
        &model,
        &request.problem.correct_sequence,
        &request.selected_sequence,
    )?;
    state.posteriors().save(
        &request.user_id,
        &problem_type.problem_type_id,
        updated_model.state,
        Some(drill_algo::AnswerEvent {
            correct_sequence: request.problem.correct_sequence.clone(),
            selected_sequence: request.selected_sequence.clone(),
            syllable_count: request.problem.correct_sequence.len() as u32,
        }),
    );

    let mut lessons = state.lessons().lock();
    let lesson_state = lessons
        .get_mut(&request.session_id)
        .ok_or_else(|| AppError::not_found(format!("no lesson session {}", request.session_id)))?;

    drill_algo::lesson::record_answer(
        lesson_state,
        request.problem,
        request.mode,
        request.selected_sequence,
        is_correct,
    );

    let learning_problem_type = state.taxonomy().lock().get(LESSON_PROBLEM_TYPE_ID)?;
    let mut rng = rand::thread_rng();
    let result = drill_algo::lesson::next_drill(
        lesson_state,
        &learning_problem_type,
        &state.word_index(),
        &sampler_config,
        &mut rng,
    );

    if result.is_none() {
        let summary = drill_algo::lesson::lesson_summary(lesson_state);
        lessons.remove(&request.session_id);
        return Ok(Json(LessonNextResponse {
            drill: None,
            is_complete: true,
            summary,
        }));
    }

    let (problem, mode, progress) = result.unwrap();
    Ok(Json(LessonNextResponse {
        drill: Some(LessonDrillResponse {
            problem,
            mode,
            progress,
        }),
        is_complete: false,
        summary: None,
    }))
}

#[derive(Debug, Serialize)]
pub struct ThemeInfo {
    pub id: usize,
    pub pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Serialize)]
pub struct ThemesResponse {
    pub themes: Vec<ThemeInfo>,
}

pub async fn themes() -> Json<ThemesResponse> {
    let themes = drill_algo::lesson::LESSON_THEMES
        .iter()
        .enumerate()
        .map(|(id, pairs)| ThemeInfo {
            id,
            pairs: pairs.to_vec(),
        })
        .collect();
    Json(ThemesResponse { themes })
}
