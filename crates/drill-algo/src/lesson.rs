//! Lesson controller: themed multi-drill sessions with a single mistake
//! review pass.
//!
//! Grounded on
//! `examples/original_source/backend/app/services/lesson.py`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::confusion::model::{ConfusionModel, PairStat};
use crate::config::SamplerConfig;
use crate::sampler::generate_distractors;
use crate::taxonomy::{DrillFamily, ProblemType};
use crate::types::Problem;
use crate::word_index::WordIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonPhase {
    Learning,
    Review,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrillMode {
    TwoChoice1Syl,
    FourChoice1Syl,
    TwoChoice2Syl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub problem: Problem,
    pub mode: DrillMode,
    pub user_selected: Vec<usize>,
}

/// Eight fixed tone-pair themes (0-indexed; spec's tone pairs are
/// 1-indexed). Each theme names two focus pairs drawn from the 6 tone
/// classes.
pub const LESSON_THEMES: &[[(usize, usize); 2]] = &[
    [(0, 1), (0, 2)],
    [(1, 2), (1, 3)],
    [(2, 3), (3, 4)],
    [(4, 5), (2, 5)],
    [(0, 3), (0, 4)],
    [(1, 4), (1, 5)],
    [(2, 4), (3, 5)],
    [(0, 5), (1, 2)],
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonState {
    pub lesson_id: u64,
    /// `None` means the theme was chosen adaptively rather than picked by id.
    pub theme_id: Option<usize>,
    pub theme_pairs: Vec<(usize, usize)>,
    pub drill_sequence: Vec<DrillMode>,
    pub current_index: usize,
    pub phase: LessonPhase,
    pub mistakes: Vec<MistakeRecord>,
    pub review_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum LessonProgress {
    Learning { current: usize, total: usize },
    Review { current: usize, total: usize },
    Complete { total_drills: usize, mistakes_reviewed: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSummary {
    pub lesson_id: u64,
    pub theme_id: Option<usize>,
    pub theme_pairs: Vec<(usize, usize)>,
    pub total_drills: usize,
    pub mistakes_count: usize,
    pub accuracy_percent: f64,
}

impl LessonState {
    pub fn is_complete(&self) -> bool {
        self.phase == LessonPhase::Complete
    }

    pub fn progress(&self) -> LessonProgress {
        match self.phase {
            LessonPhase::Learning => LessonProgress::Learning {
                current: self.current_index,
                total: self.drill_sequence.len(),
            },
            LessonPhase::Review => LessonProgress::Review {
                current: self.review_index,
                total: self.mistakes.len(),
            },
            LessonPhase::Complete => LessonProgress::Complete {
                total_drills: self.drill_sequence.len(),
                mistakes_reviewed: self.mistakes.len(),
            },
        }
    }
}

/// Picks the two weakest tone pairs from `pair_stats` (lowest mean =
/// highest error), falling back to the first fixed theme when fewer than
/// two pairs are available.
pub fn select_adaptive_theme(pair_stats: &[PairStat]) -> [(usize, usize); 2] {
    if pair_stats.len() < 2 {
        return LESSON_THEMES[0];
    }
    let mut sorted: Vec<&PairStat> = pair_stats.iter().collect();
    sorted.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap());
    [sorted[0].pair, sorted[1].pair]
}

/// Shuffles the fixed 6/2/2 drill-mode multiset (spec §4.5.2).
pub fn generate_drill_sequence<R: Rng + ?Sized>(
    config: &SamplerConfig,
    rng: &mut R,
) -> Vec<DrillMode> {
    let (two_choice_1syl, four_choice_1syl, two_choice_2syl) = config.lesson_plan_mix;
    let mut sequence = Vec::with_capacity(
        (two_choice_1syl + four_choice_1syl + two_choice_2syl) as usize,
    );
    sequence.extend(std::iter::repeat(DrillMode::TwoChoice1Syl).take(two_choice_1syl as usize));
    sequence.extend(std::iter::repeat(DrillMode::FourChoice1Syl).take(four_choice_1syl as usize));
    sequence.extend(std::iter::repeat(DrillMode::TwoChoice2Syl).take(two_choice_2syl as usize));
    sequence.shuffle(rng);
    sequence
}

/// Starts a new lesson. `theme_id` selects one of the 8 fixed themes
/// (wrapping modulo 8); `None` selects adaptively from `pair_stats`.
pub fn start_lesson<R: Rng + ?Sized>(
    lesson_id: u64,
    theme_id: Option<usize>,
    pair_stats: &[PairStat],
    config: &SamplerConfig,
    rng: &mut R,
) -> LessonState {
    let (actual_theme_id, theme_pairs) = match theme_id {
        Some(id) => {
            let idx = id % LESSON_THEMES.len();
            (Some(idx), LESSON_THEMES[idx].to_vec())
        }
        None => (None, select_adaptive_theme(pair_stats).to_vec()),
    };

    LessonState {
        lesson_id,
        theme_id: actual_theme_id,
        theme_pairs,
        drill_sequence: generate_drill_sequence(config, rng),
        current_index: 0,
        phase: LessonPhase::Learning,
        mistakes: Vec::new(),
        review_index: 0,
    }
}

fn sample_two_choice_themed<R: Rng + ?Sized>(
    theme_pairs: &[(usize, usize)],
    index: &WordIndex,
    rng: &mut R,
) -> Option<Problem> {
    let &(a, b) = theme_pairs.get(rng.gen_range(0..theme_pairs.len()))?;
    for selected in [if rng.gen_bool(0.5) { a } else { b }, a, b] {
        let key = crate::word_index::sequence_key(&[selected]);
        let words = index.words_for_key(&key);
        if !words.is_empty() {
            let word = &words[rng.gen_range(0..words.len())];
            return Some(Problem {
                problem_type_id: "tone_1".to_string(),
                word_id: word.id,
                surface_form: word.surface_form.clone(),
                gloss: word.gloss.clone(),
                correct_sequence: vec![selected],
                alternatives: vec![vec![a], vec![b]],
                audio_voice: None,
                audio_speed: None,
            });
        }
    }
    None
}

fn sample_four_choice_themed<R: Rng + ?Sized>(
    theme_pairs: &[(usize, usize)],
    n_classes: usize,
    index: &WordIndex,
    rng: &mut R,
) -> Option<Problem> {
    let &(a, b) = theme_pairs.get(rng.gen_range(0..theme_pairs.len()))?;
    let mut remaining: Vec<usize> = (0..n_classes).filter(|&c| c != a && c != b).collect();
    remaining.shuffle(rng);
    let mut four_set = vec![a, b];
    four_set.extend(remaining.into_iter().take(2));
    four_set.shuffle(rng);

    let mut order = four_set.clone();
    order.shuffle(rng);
    for selected in order {
        let key = crate::word_index::sequence_key(&[selected]);
        let words = index.words_for_key(&key);
        if !words.is_empty() {
            let word = &words[rng.gen_range(0..words.len())];
            return Some(Problem {
                problem_type_id: "tone_1".to_string(),
                word_id: word.id,
                surface_form: word.surface_form.clone(),
                gloss: word.gloss.clone(),
                correct_sequence: vec![selected],
                alternatives: four_set.iter().map(|&c| vec![c]).collect(),
                audio_voice: None,
                audio_speed: None,
            });
        }
    }
    None
}

fn sample_two_syllable_themed<R: Rng + ?Sized>(
    theme_pairs: &[(usize, usize)],
    n_classes: usize,
    index: &WordIndex,
    rng: &mut R,
) -> Option<Problem> {
    let mut theme_tones = std::collections::HashSet::new();
    for &(a, b) in theme_pairs {
        theme_tones.insert(a);
        theme_tones.insert(b);
    }

    let mut candidate_keys: Vec<String> = index
        .keys_of_length(2)
        .into_iter()
        .filter(|k| {
            k.split('-')
                .filter_map(|s| s.parse::<usize>().ok())
                .any(|t| theme_tones.contains(&t))
        })
        .map(String::from)
        .collect();

    if candidate_keys.is_empty() {
        candidate_keys = index.keys_of_length(2).into_iter().map(String::from).collect();
    }
    if candidate_keys.is_empty() {
        return None;
    }
    let key = &candidate_keys[rng.gen_range(0..candidate_keys.len())];
    let candidates = index.words_for_key(key);
    if candidates.is_empty() {
        return None;
    }
    let word = candidates[rng.gen_range(0..candidates.len())].clone();
    let correct: Vec<usize> = key.split('-').map(|s| s.parse().unwrap()).collect();

    let distractor = generate_distractors(&correct, n_classes, 1, rng);
    let mut alternatives = distractor;
    alternatives.push(correct.clone());
    alternatives.shuffle(rng);

    Some(Problem {
        problem_type_id: "tone_2".to_string(),
        word_id: word.id,
        surface_form: word.surface_form.clone(),
        gloss: word.gloss.clone(),
        correct_sequence: correct,
        alternatives,
        audio_voice: None,
        audio_speed: None,
    })
}

fn sample_drill_for_mode<R: Rng + ?Sized>(
    mode: DrillMode,
    theme_pairs: &[(usize, usize)],
    n_classes: usize,
    index: &WordIndex,
    rng: &mut R,
) -> Option<Problem> {
    match mode {
        DrillMode::TwoChoice1Syl => sample_two_choice_themed(theme_pairs, index, rng),
        DrillMode::FourChoice1Syl => sample_four_choice_themed(theme_pairs, n_classes, index, rng),
        DrillMode::TwoChoice2Syl => sample_two_syllable_themed(theme_pairs, n_classes, index, rng),
    }
}

/// Fetches the next drill for a lesson session, advancing the phase when
/// the current stage runs out. Returns `None` once the lesson is
/// complete (spec §4.5.3).
pub fn next_drill<R: Rng + ?Sized>(
    state: &mut LessonState,
    problem_type: &ProblemType,
    index: &WordIndex,
    config: &SamplerConfig,
    rng: &mut R,
) -> Option<(Problem, DrillMode, LessonProgress)> {
    match state.phase {
        LessonPhase::Learning => {
            if state.current_index >= state.drill_sequence.len() {
                if state.mistakes.is_empty() {
                    state.phase = LessonPhase::Complete;
                    return None;
                }
                state.phase = LessonPhase::Review;
                return next_drill(state, problem_type, index, config, rng);
            }
            let mode = state.drill_sequence[state.current_index];
            let problem = sample_drill_for_mode(
                mode,
                &state.theme_pairs,
                problem_type.n_classes,
                index,
                rng,
            )?;
            Some((problem, mode, state.progress()))
        }
        LessonPhase::Review => {
            if state.review_index >= state.mistakes.len() {
                state.phase = LessonPhase::Complete;
                return None;
            }
            let mistake = &state.mistakes[state.review_index];
            Some((mistake.problem.clone(), mistake.mode, state.progress()))
        }
        LessonPhase::Complete => None,
    }
}

/// Records the outcome of a presented drill. In the review phase this is
/// a single pass: mistakes are never re-queued (spec §4.5.4).
pub fn record_answer(
    state: &mut LessonState,
    problem: Problem,
    mode: DrillMode,
    selected_sequence: Vec<usize>,
    is_correct: bool,
) {
    match state.phase {
        LessonPhase::Learning => {
            if !is_correct {
                state.mistakes.push(MistakeRecord {
                    problem,
                    mode,
                    user_selected: selected_sequence,
                });
            }
            state.current_index += 1;
        }
        LessonPhase::Review => {
            state.review_index += 1;
        }
        LessonPhase::Complete => {}
    }
}

pub fn lesson_summary(state: &LessonState) -> Option<LessonSummary> {
    if state.phase != LessonPhase::Complete {
        return None;
    }
    let total = state.drill_sequence.len();
    let accuracy_percent = if total == 0 {
        100.0
    } else {
        (total - state.mistakes.len()) as f64 / total as f64 * 100.0
    };
    Some(LessonSummary {
        lesson_id: state.lesson_id,
        theme_id: state.theme_id,
        theme_pairs: state.theme_pairs.clone(),
        total_drills: total,
        mistakes_count: state.mistakes.len(),
        accuracy_percent,
    })
}

/// Updates the confusion model for an answer given during a lesson, the
/// same way a standalone drill answer would be (spec §4.4.1). Lessons do
/// not use their own posterior; they read and write the family's shared
/// model.
pub fn apply_lesson_answer(
    model: &ConfusionModel,
    correct_sequence: &[usize],
    selected_sequence: &[usize],
) -> crate::error::Result<(ConfusionModel, Vec<crate::confusion::model::StateUpdate>)> {
    model.update(correct_sequence, selected_sequence, correct_sequence.len() as u32)
}

pub fn family_problem_type(family: DrillFamily, syllable_count: u32) -> String {
    format!("{}_{}", match family { DrillFamily::Tone => "tone", DrillFamily::Vowel => "vowel" }, syllable_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confusion::model::ModelKind;
    use crate::confusion::state::SeedPolicy;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog() -> WordIndex {
        use crate::word_index::Word;
        let words = vec![
            Word { id: 1, surface_form: "ma".into(), gloss: "ghost".into(), image_url: None },
            Word { id: 2, surface_form: "má".into(), gloss: "mother".into(), image_url: None },
            Word { id: 3, surface_form: "mả".into(), gloss: "tomb".into(), image_url: None },
            Word { id: 4, surface_form: "mã".into(), gloss: "code".into(), image_url: None },
            Word { id: 5, surface_form: "mạ".into(), gloss: "rice seedling".into(), image_url: None },
            Word { id: 6, surface_form: "mà".into(), gloss: "that".into(), image_url: None },
            Word { id: 7, surface_form: "ma mà".into(), gloss: "two syllable".into(), image_url: None },
        ];
        WordIndex::build(DrillFamily::Tone, words)
    }

    #[test]
    fn drill_sequence_has_fixed_length_and_mix() {
        let config = SamplerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let seq = generate_drill_sequence(&config, &mut rng);
        assert_eq!(seq.len(), 10);
        assert_eq!(seq.iter().filter(|&&m| m == DrillMode::TwoChoice1Syl).count(), 6);
        assert_eq!(seq.iter().filter(|&&m| m == DrillMode::FourChoice1Syl).count(), 2);
        assert_eq!(seq.iter().filter(|&&m| m == DrillMode::TwoChoice2Syl).count(), 2);
    }

    #[test]
    fn theme_id_wraps_modulo_eight() {
        let config = SamplerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let state = start_lesson(1, Some(9), &[], &config, &mut rng);
        assert_eq!(state.theme_id, Some(1));
        assert_eq!(state.theme_pairs, LESSON_THEMES[1].to_vec());
    }

    #[test]
    fn lesson_transitions_learning_review_complete() {
        let config = SamplerConfig::default();
        let index = catalog();
        let problem_type = ProblemType {
            problem_type_id: "tone_1".into(),
            family: DrillFamily::Tone,
            syllable_count: 1,
            n_classes: 6,
            prior_strength: 1.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut state = start_lesson(1, Some(0), &[], &config, &mut rng);
        state.drill_sequence = vec![DrillMode::TwoChoice1Syl];

        let (problem, mode, _) = next_drill(&mut state, &problem_type, &index, &config, &mut rng).unwrap();
        record_answer(&mut state, problem.clone(), mode, vec![999], false);
        assert_eq!(state.phase, LessonPhase::Learning);
        assert_eq!(state.mistakes.len(), 1);

        let next = next_drill(&mut state, &problem_type, &index, &config, &mut rng);
        assert!(next.is_some());
        assert_eq!(state.phase, LessonPhase::Review);

        let (_, mode, _) = next.unwrap();
        record_answer(&mut state, problem, mode, vec![1], true);
        assert_eq!(state.review_index, 1);

        let done = next_drill(&mut state, &problem_type, &index, &config, &mut rng);
        assert!(done.is_none());
        assert_eq!(state.phase, LessonPhase::Complete);

        let summary = lesson_summary(&state).unwrap();
        assert_eq!(summary.mistakes_count, 1);
        assert_eq!(summary.total_drills, 1);
    }

    #[test]
    fn adaptive_theme_picks_two_weakest_pairs() {
        let mut model = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let stats = model.all_pair_stats();
        let theme = select_adaptive_theme(&stats);
        assert_ne!(theme[0], theme[1]);
    }
}
