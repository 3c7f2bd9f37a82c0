//! Drill sampler: update stage, difficulty tiering, problem selection,
//! distractor generation, fallback chain.
//!
//! Grounded on
//! `examples/original_source/backend/app/services/tone_drill.py`
//! (`sample_next_drill`, `_sample_2_choice`, `_sample_4_choice`,
//! `_sample_multi_syllable`, `_generate_distractors`) and
//! `vowel_drill.py::sample_four_choice_set` for the large-`n_classes`
//! heuristic four-class subset.

use rand::Rng;

use crate::confusion::model::{ConfusionModel, SetStat};
use crate::config::SamplerConfig;
use crate::taxonomy::{DrillFamily, ProblemType};
use crate::types::{DifficultyLevel, NextDrillOutcome, PreviousAnswer, Problem};
use crate::word_index::{self, Word, WordIndex};

/// The fixed canonical fallback problem (spec §4.4.3). Spec's figures are
/// 1-indexed on the wire; this crate uses 0-indexed classes throughout
/// (glossary allows either), so `correct=[1]` becomes `[0]` here.
fn canonical_fallback() -> Problem {
    Problem {
        problem_type_id: "tone_1".to_string(),
        word_id: 0,
        surface_form: "xin chào".to_string(),
        gloss: "hello".to_string(),
        correct_sequence: vec![0],
        alternatives: vec![vec![0], vec![1]],
        audio_voice: None,
        audio_speed: None,
    }
}

fn all_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            out.push((a, b));
        }
    }
    out
}

fn all_four_subsets(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            for c in (b + 1)..n {
                for d in (c + 1)..n {
                    out.push(vec![a, b, c, d]);
                }
            }
        }
    }
    out
}

/// Above this class count, enumerating all `C(n,4)` subsets is not
/// tractable (spec §4.4.2); switch to the phonetic-confusion-group
/// heuristic instead.
const CANONICAL_SUBSET_LIMIT: usize = 6;

fn weighted_sample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut r = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        r -= w;
        if r <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

/// Heuristic four-class subset for large `n_classes`: sample the
/// highest-error pair, then fill 2 more classes from the pair members'
/// phonetic confusion groups (falling back to random fill). Grounded on
/// `vowel_drill.py::sample_four_choice_set`.
fn heuristic_four_subset<R: Rng + ?Sized>(
    model: &mut ConfusionModel,
    n_classes: usize,
    rng: &mut R,
) -> Vec<usize> {
    let pairs = all_pairs(n_classes);
    let all_stats = model.all_pair_stats();
    let error_weights: Vec<f64> = pairs
        .iter()
        .map(|&(a, b)| {
            all_stats
                .iter()
                .find(|s| s.pair == (a, b))
                .map(|s| 1.0 - s.mean)
                .unwrap_or(0.5)
        })
        .collect();
    let idx = weighted_sample(&error_weights, rng);
    let (a, b) = pairs[idx];

    let mut candidates: Vec<usize> = word_index::confusion_group(a)
        .into_iter()
        .chain(word_index::confusion_group(b))
        .filter(|&c| c != a && c != b)
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    let mut extra = Vec::with_capacity(2);
    while extra.len() < 2 && !candidates.is_empty() {
        let pick = rng.gen_range(0..candidates.len());
        extra.push(candidates.remove(pick));
    }
    while extra.len() < 2 {
        let c = rng.gen_range(0..n_classes);
        if c != a && c != b && !extra.contains(&c) {
            extra.push(c);
        }
    }

    let mut set = vec![a, b, extra[0], extra[1]];
    set.sort_unstable();
    set
}

fn four_choice_subsets_for_tiering<R: Rng + ?Sized>(
    model: &mut ConfusionModel,
    n_classes: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    if n_classes <= CANONICAL_SUBSET_LIMIT {
        all_four_subsets(n_classes)
    } else {
        vec![heuristic_four_subset(model, n_classes, rng)]
    }
}

/// Determines the difficulty tier from the single-syllable posterior
/// (spec §4.4.2). The canonical-subset check is used over a minimum-
/// attempts gate (see the Open Question resolution in `confusion::model`'s
/// module docs and `DESIGN.md`).
pub fn tier<R: Rng + ?Sized>(
    model: &mut ConfusionModel,
    config: &SamplerConfig,
    n_classes: usize,
    rng: &mut R,
) -> (DifficultyLevel, Vec<crate::confusion::model::PairStat>, Vec<SetStat>) {
    let pair_stats = model.all_pair_stats();
    if pair_stats.iter().any(|p| p.mean < config.pair_mastery) {
        return (DifficultyLevel::TwoChoice, pair_stats, Vec::new());
    }

    let subsets = four_choice_subsets_for_tiering(model, n_classes, rng);
    let set_stats: Vec<SetStat> = subsets.iter().map(|s| model.set_stat(s)).collect();
    if set_stats.iter().any(|s| s.mean < config.four_choice_mastery) {
        (DifficultyLevel::Mixed, pair_stats, set_stats)
    } else {
        (DifficultyLevel::FourChoiceMulti, pair_stats, set_stats)
    }
}

fn bump_tier(level: DifficultyLevel) -> DifficultyLevel {
    match level {
        DifficultyLevel::TwoChoice => DifficultyLevel::Mixed,
        DifficultyLevel::Mixed => DifficultyLevel::FourChoiceMulti,
        DifficultyLevel::FourChoiceMulti => DifficultyLevel::FourChoiceMulti,
    }
}

fn to_problem(problem_type_id: &str, word: &Word, correct_sequence: Vec<usize>, alternatives: Vec<Vec<usize>>) -> Problem {
    Problem {
        problem_type_id: problem_type_id.to_string(),
        word_id: word.id,
        surface_form: word.surface_form.clone(),
        gloss: word.gloss.clone(),
        correct_sequence,
        alternatives,
        audio_voice: None,
        audio_speed: None,
    }
}

fn sample_two_choice<R: Rng + ?Sized>(
    problem_type_id: &str,
    index: &WordIndex,
    pair_stats: &[crate::confusion::model::PairStat],
    config: &SamplerConfig,
    rng: &mut R,
) -> Option<Problem> {
    let weights: Vec<f64> = pair_stats
        .iter()
        .map(|s| (1.0 - s.mean).max(0.0).powf(config.sampling_aggressiveness))
        .collect();
    if weights.is_empty() {
        return None;
    }
    let idx = weighted_sample(&weights, rng);
    let (a, b) = pair_stats[idx].pair;

    let first_is_a = rng.gen_bool(0.5);
    let (primary, sibling) = if first_is_a { (a, b) } else { (b, a) };

    for class in [primary, sibling] {
        let key = word_index::sequence_key(&[class]);
        let words = index.words_for_key(&key);
        if !words.is_empty() {
            let word = &words[rng.gen_range(0..words.len())];
            return Some(to_problem(
                problem_type_id,
                word,
                vec![class],
                vec![vec![a], vec![b]],
            ));
        }
    }
    None
}

fn sample_four_choice_single_syllable<R: Rng + ?Sized>(
    problem_type_id: &str,
    index: &WordIndex,
    set_stats: &[SetStat],
    rng: &mut R,
) -> Option<Problem> {
    if set_stats.is_empty() {
        return None;
    }
    let weights: Vec<f64> = set_stats.iter().map(|s| 1.0 - s.mean).collect();
    let idx = weighted_sample(&weights, rng);
    let set = &set_stats[idx].set;

    let mut order = set.clone();
    shuffle(&mut order, rng);
    for &class in &order {
        let key = word_index::sequence_key(&[class]);
        let words = index.words_for_key(&key);
        if !words.is_empty() {
            let word = &words[rng.gen_range(0..words.len())];
            let alternatives = set.iter().map(|&c| vec![c]).collect();
            return Some(to_problem(problem_type_id, word, vec![class], alternatives));
        }
    }
    None
}

/// Replaces positions with probability 0.7 each by a uniformly different
/// class, up to 50 attempts, deduping against the correct sequence and
/// prior distractors; falls back to a deterministic `(c+1) % n_classes`
/// perturbation if unable to fill the quota. Grounded on
/// `tone_drill.py::_generate_distractors`.
pub fn generate_distractors<R: Rng + ?Sized>(
    correct: &[usize],
    n_classes: usize,
    count: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut distractors: Vec<Vec<usize>> = Vec::with_capacity(count);
    let max_attempts = 50;
    let mut attempts = 0;
    while distractors.len() < count && attempts < max_attempts {
        attempts += 1;
        let candidate: Vec<usize> = correct
            .iter()
            .map(|&c| {
                if rng.gen_bool(0.7) {
                    loop {
                        let other = rng.gen_range(0..n_classes);
                        if other != c {
                            break other;
                        }
                    }
                } else {
                    c
                }
            })
            .collect();
        if candidate != correct && !distractors.contains(&candidate) {
            distractors.push(candidate);
        }
    }
    while distractors.len() < count {
        let fallback: Vec<usize> = correct.iter().map(|&c| (c + 1) % n_classes).collect();
        if !distractors.contains(&fallback) && fallback != correct {
            distractors.push(fallback);
        } else {
            distractors.push(
                correct
                    .iter()
                    .enumerate()
                    .map(|(i, _)| i % n_classes)
                    .collect(),
            );
        }
    }
    distractors
}

fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

fn sample_two_syllable_with_one_distractor<R: Rng + ?Sized>(
    problem_type_id: &str,
    index: &WordIndex,
    n_classes: usize,
    rng: &mut R,
) -> Option<Problem> {
    let keys: Vec<String> = index.keys_of_length(2).into_iter().map(String::from).collect();
    if keys.is_empty() {
        return None;
    }
    let key = &keys[rng.gen_range(0..keys.len())];
    let words = index.words_for_key(key);
    if words.is_empty() {
        return None;
    }
    let word = &words[rng.gen_range(0..words.len())];
    let correct: Vec<usize> = key.split('-').map(|s| s.parse().unwrap()).collect();
    let mut alternatives = generate_distractors(&correct, n_classes, 1, rng);
    alternatives.push(correct.clone());
    shuffle(&mut alternatives, rng);
    Some(to_problem(problem_type_id, word, correct, alternatives))
}

fn sample_two_syllable_with_three_distractors<R: Rng + ?Sized>(
    problem_type_id: &str,
    index: &WordIndex,
    n_classes: usize,
    rng: &mut R,
) -> Option<Problem> {
    let keys: Vec<String> = index.keys_of_length(2).into_iter().map(String::from).collect();
    if keys.is_empty() {
        return None;
    }
    let key = &keys[rng.gen_range(0..keys.len())];
    let words = index.words_for_key(key);
    if words.is_empty() {
        return None;
    }
    let word = &words[rng.gen_range(0..words.len())];
    let correct: Vec<usize> = key.split('-').map(|s| s.parse().unwrap()).collect();
    let mut alternatives = generate_distractors(&correct, n_classes, 3, rng);
    alternatives.push(correct.clone());
    shuffle(&mut alternatives, rng);
    Some(to_problem(problem_type_id, word, correct, alternatives))
}

fn syllable_penalty(syllable_count: usize) -> f64 {
    match syllable_count {
        1 => 1.0,
        2 => 0.5,
        3 => 0.25,
        _ => 0.1,
    }
}

/// Average over each class in `sequence` of `1 + (1 - correct_prob)`,
/// where `correct_prob` is the raw diagonal-over-row-sum ratio (>= 1.0,
/// higher means more confusable). Grounded on
/// `tone_drill.py::_get_confusion_factor`.
fn confusion_factor(model: &ConfusionModel, sequence: &[usize]) -> f64 {
    if sequence.is_empty() {
        return 1.0;
    }
    let total: f64 = sequence
        .iter()
        .map(|&class| {
            if class >= model.state.n_classes {
                return 1.0;
            }
            let row_sum = model.state.row_sum(class);
            if row_sum > 0.0 {
                let correct_prob = model.state.get(class, class) / row_sum;
                1.0 + (1.0 - correct_prob)
            } else {
                1.0
            }
        })
        .sum();
    total / sequence.len() as f64
}

/// Grounded on `tone_drill.py::_calculate_priority_score`.
fn priority_score(model: &ConfusionModel, sequence: &[usize]) -> f64 {
    let penalty = syllable_penalty(sequence.len());
    let factor = confusion_factor(model, sequence);
    let confusion_priority = 0.5 + (factor - 1.0);
    penalty * confusion_priority
}

/// Priority-scored fallback across every sequence key in the catalog,
/// sampled from the top 3 scored keys (supplemented feature; grounded on
/// `tone_drill.py::_sample_multi_syllable`). Used when a tier's primary
/// strategy finds no candidate word.
fn priority_scored_fallback<R: Rng + ?Sized>(
    problem_type_id: &str,
    model: &ConfusionModel,
    index: &WordIndex,
    n_classes: usize,
    rng: &mut R,
) -> Option<Problem> {
    let mut scored: Vec<(String, f64)> = index
        .all_keys()
        .into_iter()
        .map(|key| {
            let sequence: Vec<usize> = key.split('-').filter_map(|s| s.parse().ok()).collect();
            (key.to_string(), priority_score(model, &sequence))
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    if scored.is_empty() {
        let word = index.any_word()?;
        let key = index
            .all_keys()
            .into_iter()
            .find(|k| index.words_for_key(k).iter().any(|w| w.id == word.id))?
            .to_string();
        let correct: Vec<usize> = key.split('-').map(|s| s.parse().unwrap()).collect();
        let mut alternatives = generate_distractors(&correct, n_classes, 3, rng);
        alternatives.push(correct.clone());
        shuffle(&mut alternatives, rng);
        return Some(to_problem(problem_type_id, word, correct, alternatives));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let top_n = scored.len().min(3);
    let weights: Vec<f64> = scored[..top_n].iter().map(|(_, s)| *s).collect();
    let picked = weighted_sample(&weights, rng);
    let (key, _) = &scored[picked];

    let candidates = index.words_for_key(key);
    if candidates.is_empty() {
        return None;
    }
    let word = candidates[rng.gen_range(0..candidates.len())].clone();
    let correct: Vec<usize> = key.split('-').map(|s| s.parse().unwrap()).collect();
    let mut alternatives = generate_distractors(&correct, n_classes, 3, rng);
    alternatives.push(correct.clone());
    shuffle(&mut alternatives, rng);
    Some(to_problem(problem_type_id, &word, correct, alternatives))
}

/// Samples the next drill. Never fails (spec §8, "Fallback guarantee").
pub fn sample_next_drill<R: Rng + ?Sized>(
    problem_type: &ProblemType,
    model: &mut ConfusionModel,
    index: &WordIndex,
    config: &SamplerConfig,
    rng: &mut R,
) -> (DifficultyLevel, Vec<crate::confusion::model::PairStat>, Vec<SetStat>, Problem) {
    if index.is_empty() {
        let (level, pairs, sets) = tier(model, config, problem_type.n_classes, rng);
        return (level, pairs, sets, canonical_fallback());
    }

    let (mut level, pair_stats, set_stats) = tier(model, config, problem_type.n_classes, rng);
    if rng.gen::<f64>() < config.preview_probability {
        level = bump_tier(level);
    }

    let drill = match level {
        DifficultyLevel::TwoChoice => sample_two_choice(
            &problem_type.problem_type_id,
            index,
            &pair_stats,
            config,
            rng,
        ),
        DifficultyLevel::Mixed => {
            if rng.gen_bool(0.5) {
                sample_four_choice_single_syllable(&problem_type.problem_type_id, index, &set_stats, rng)
            } else {
                sample_two_syllable_with_one_distractor(
                    &problem_type.problem_type_id,
                    index,
                    problem_type.n_classes,
                    rng,
                )
            }
        }
        DifficultyLevel::FourChoiceMulti => sample_two_syllable_with_three_distractors(
            &problem_type.problem_type_id,
            index,
            problem_type.n_classes,
            rng,
        ),
    };

    let drill = drill
        .or_else(|| {
            priority_scored_fallback(
                &problem_type.problem_type_id,
                model,
                index,
                problem_type.n_classes,
                rng,
            )
        })
        .unwrap_or_else(canonical_fallback);

    (level, pair_stats, set_stats, drill)
}

/// Applies the update stage (spec §4.4.1): if a previous answer is given,
/// updates the model for its problem type; otherwise returns the model
/// unchanged. The caller must have already matched `previous`'s
/// `problem_type_id` to `model`.
pub fn apply_previous_answer(
    model: &ConfusionModel,
    previous: Option<&PreviousAnswer>,
) -> crate::error::Result<(ConfusionModel, Vec<crate::confusion::model::StateUpdate>)> {
    match previous {
        None => Ok((model.clone(), Vec::new())),
        Some(answer) => {
            if answer.selected_sequence.len() != answer.correct_sequence.len() {
                return Err(crate::error::DrillError::InvalidAnswer);
            }
            let presented_correct = std::iter::once(answer.correct_sequence.clone())
                .chain(answer.alternatives.iter().cloned());
            if !presented_correct
                .clone()
                .any(|seq| seq == answer.selected_sequence)
            {
                return Err(crate::error::DrillError::InvalidAnswer);
            }
            model.update(
                &answer.correct_sequence,
                &answer.selected_sequence,
                answer.correct_sequence.len() as u32,
            )
        }
    }
}

/// Full next-drill request/response cycle: update stage, tiering, problem
/// selection. Bundles the updated model alongside the outcome so the
/// caller can persist it.
pub fn next_drill<R: Rng + ?Sized>(
    problem_type: &ProblemType,
    model: &ConfusionModel,
    index: &WordIndex,
    config: &SamplerConfig,
    previous: Option<&PreviousAnswer>,
    rng: &mut R,
) -> crate::error::Result<(ConfusionModel, NextDrillOutcome)> {
    let (mut updated_model, state_updates) = apply_previous_answer(model, previous)?;
    let (difficulty_level, pair_stats, four_choice_stats, drill) =
        sample_next_drill(problem_type, &mut updated_model, index, config, rng);
    Ok((
        updated_model,
        NextDrillOutcome {
            drill,
            difficulty_level,
            state_updates,
            pair_stats,
            four_choice_stats,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confusion::model::ModelKind;
    use crate::confusion::state::SeedPolicy;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_catalog() -> WordIndex {
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
    fn fallback_guarantee_on_empty_catalog() {
        let problem_type = ProblemType {
            problem_type_id: "tone_1".into(),
            family: DrillFamily::Tone,
            syllable_count: 1,
            n_classes: 6,
            prior_strength: 1.0,
        };
        let mut model = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let index = WordIndex::default();
        let config = SamplerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (_, _, _, drill) = sample_next_drill(&problem_type, &mut model, &index, &config, &mut rng);
        assert_eq!(drill.word_id, 0);
        assert!(drill.alternatives.len() >= 2);
        assert!(drill.alternatives.contains(&drill.correct_sequence));
    }

    #[test]
    fn next_drill_always_has_at_least_two_alternatives_with_correct_present() {
        let problem_type = ProblemType {
            problem_type_id: "tone_1".into(),
            family: DrillFamily::Tone,
            syllable_count: 1,
            n_classes: 6,
            prior_strength: 1.0,
        };
        let mut model = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let index = sample_catalog();
        let config = SamplerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let (_, _, _, drill) = sample_next_drill(&problem_type, &mut model, &index, &config, &mut rng);
            assert!(drill.alternatives.len() >= 2);
            assert!(drill.alternatives.contains(&drill.correct_sequence));
        }
    }

    #[test]
    fn distractors_exclude_correct_and_are_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let distractors = generate_distractors(&[0, 1], 6, 3, &mut rng);
        assert_eq!(distractors.len(), 3);
        for d in &distractors {
            assert_ne!(d, &vec![0, 1]);
        }
        let mut sorted = distractors.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), distractors.len());
    }

    #[test]
    fn update_rejects_selection_outside_presented_choices() {
        let model = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let answer = PreviousAnswer {
            problem_type_id: "tone_1".into(),
            word_id: 1,
            correct_sequence: vec![0],
            selected_sequence: vec![5],
            alternatives: vec![vec![1]],
            response_time_ms: Some(800),
            audio_voice: None,
            audio_speed: None,
        };
        let result = apply_previous_answer(&model, Some(&answer));
        assert!(result.is_err());
    }

    #[test]
    fn tier_is_two_choice_from_flat_prior() {
        let mut model = ConfusionModel::initial_state(ModelKind::LucePseudocount, 6, 1.0, SeedPolicy::Uniform);
        let config = SamplerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (level, _, _) = tier(&mut model, &config, 6, &mut rng);
        assert_eq!(level, DifficultyLevel::TwoChoice);
    }
}
