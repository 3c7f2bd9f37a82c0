//! Class taxonomy derivation and word catalog indexing.
//!
//! Grounded on `examples/original_source/backend/app/services/tone_drill.py`
//! (`TONE_MARKS`, `detect_tone`, `get_tone_sequence_key`) and
//! `vowel_drill.py` (`VOWEL_CHAR_MAP`, `extract_vowel_nucleus`,
//! `VOWEL_CONFUSION_GROUPS`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::taxonomy::DrillFamily;

/// Diacritic -> tone class (1-indexed internally stored 0-indexed: class -
/// 1). Absence of any diacritic means class 0 (level tone).
fn tone_class_for_char(c: char) -> Option<usize> {
    let class_1indexed = match c {
        'à' | 'è' | 'ì' | 'ò' | 'ù' | 'ỳ' | 'ằ' | 'ầ' | 'ề' | 'ồ' | 'ờ' | 'ừ' => 2,
        'á' | 'é' | 'í' | 'ó' | 'ú' | 'ý' | 'ắ' | 'ấ' | 'ế' | 'ố' | 'ớ' | 'ứ' => 3,
        'ả' | 'ẻ' | 'ỉ' | 'ỏ' | 'ủ' | 'ỷ' | 'ẳ' | 'ẩ' | 'ể' | 'ổ' | 'ở' | 'ử' => 4,
        'ã' | 'ẽ' | 'ĩ' | 'õ' | 'ũ' | 'ỹ' | 'ẵ' | 'ẫ' | 'ễ' | 'ỗ' | 'ỡ' | 'ữ' => 5,
        'ạ' | 'ẹ' | 'ị' | 'ọ' | 'ụ' | 'ỵ' | 'ặ' | 'ậ' | 'ệ' | 'ộ' | 'ợ' | 'ự' => 6,
        _ => return None,
    };
    Some(class_1indexed - 1)
}

/// Detects the tone class of a single syllable: the first matching
/// diacritic character, or class 0 (level) if none found.
pub fn detect_tone_class(syllable: &str) -> usize {
    syllable
        .to_lowercase()
        .chars()
        .find_map(tone_class_for_char)
        .unwrap_or(0)
}

/// Vowel character -> base vowel class, 0-indexed. Every tone-marked
/// variant of a base vowel maps to the same class.
fn vowel_class_for_char(c: char) -> Option<usize> {
    let class_1indexed = match c {
        'a' | 'à' | 'á' | 'ả' | 'ã' | 'ạ' => 1,
        'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' => 2,
        'â' | 'ầ' | 'ấ' | 'ẩ' | 'ẫ' | 'ậ' => 3,
        'e' | 'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' => 4,
        'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 5,
        'i' | 'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 6,
        'o' | 'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' => 7,
        'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' => 8,
        'ơ' | 'ờ' | 'ớ' | 'ở' | 'ỡ' | 'ợ' => 9,
        'u' | 'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' => 10,
        'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 11,
        'y' | 'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 12,
        _ => return None,
    };
    Some(class_1indexed - 1)
}

/// Base (no tone mark) vowel characters, used to recognize which vowel in
/// a cluster carries the tone mark.
const BASE_VOWELS: &[char] = &['a', 'ă', 'â', 'e', 'ê', 'i', 'o', 'ô', 'ơ', 'u', 'ư', 'y'];

/// Openness ranking fallback (most open first) when no vowel in a cluster
/// carries a tone mark. Lower rank wins.
fn openness_rank(vowel_class: usize) -> u8 {
    match vowel_class {
        0 => 1, // a
        1 => 2, // ă
        2 => 3, // â
        3 => 4, // e
        4 => 5, // ê
        6 => 6, // o
        7 => 7, // ô
        8 => 8, // ơ
        9 => 9, // u
        10 => 10, // ư
        5 => 11,  // i
        11 => 11, // y
        _ => 12,
    }
}

/// Extracts the primary vowel nucleus (0-indexed class) from a syllable:
/// the sole vowel if there is one, else the tone-marked vowel, else the
/// most open vowel by [`openness_rank`].
pub fn extract_vowel_nucleus(syllable: &str) -> Option<usize> {
    let normalized = syllable.to_lowercase();
    let positions: Vec<(char, usize)> = normalized
        .chars()
        .filter_map(|c| vowel_class_for_char(c).map(|v| (c, v)))
        .collect();

    match positions.len() {
        0 => None,
        1 => Some(positions[0].1),
        _ => {
            if let Some((_, v)) = positions.iter().find(|(c, _)| !BASE_VOWELS.contains(c)) {
                return Some(*v);
            }
            positions
                .iter()
                .min_by_key(|(_, v)| openness_rank(*v))
                .map(|(_, v)| *v)
        }
    }
}

/// Derives the class sequence for a word's surface form under a family.
pub fn class_sequence(family: DrillFamily, surface_form: &str) -> Vec<usize> {
    surface_form
        .split_whitespace()
        .filter_map(|syllable| match family {
            DrillFamily::Tone => Some(detect_tone_class(syllable)),
            DrillFamily::Vowel => extract_vowel_nucleus(syllable),
        })
        .collect()
}

pub fn sequence_key(sequence: &[usize]) -> String {
    sequence
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Phonetic confusion groups for the vowel family (0-indexed classes),
/// used by the heuristic four-class subset sampler for large `n_classes`.
/// Grounded on `vowel_drill.py::VOWEL_CONFUSION_GROUPS`.
pub const VOWEL_CONFUSION_GROUPS: &[&[usize]] =
    &[&[5, 11], &[3, 4], &[0, 1, 2], &[6, 7, 8], &[9, 10]];

pub fn confusion_group(vowel_class: usize) -> Vec<usize> {
    VOWEL_CONFUSION_GROUPS
        .iter()
        .find(|g| g.contains(&vowel_class))
        .map(|g| g.to_vec())
        .unwrap_or_else(|| vec![vowel_class])
}

/// A word record: stable id, surface form, gloss and derived class
/// sequence. Grounded on `tone_drill.py`/`vowel_drill.py`'s `Word` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: u64,
    pub surface_form: String,
    pub gloss: String,
    pub image_url: Option<String>,
}

/// Catalog of words for one drill family, indexed by sequence key.
#[derive(Debug, Clone, Default)]
pub struct WordIndex {
    words: Vec<Word>,
    by_sequence: HashMap<String, Vec<usize>>,
}

impl WordIndex {
    pub fn build(family: DrillFamily, words: Vec<Word>) -> Self {
        let mut by_sequence: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, word) in words.iter().enumerate() {
            let seq = class_sequence(family, &word.surface_form);
            if seq.is_empty() {
                continue;
            }
            by_sequence.entry(sequence_key(&seq)).or_default().push(idx);
        }
        Self { words, by_sequence }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words_for_key(&self, key: &str) -> Vec<&Word> {
        self.by_sequence
            .get(key)
            .map(|idxs| idxs.iter().map(|&i| &self.words[i]).collect())
            .unwrap_or_default()
    }

    pub fn all_keys(&self) -> Vec<&str> {
        self.by_sequence.keys().map(|k| k.as_str()).collect()
    }

    pub fn keys_of_length(&self, len: usize) -> Vec<&str> {
        self.by_sequence
            .keys()
            .filter(|k| k.split('-').count() == len)
            .map(|k| k.as_str())
            .collect()
    }

    pub fn any_word(&self) -> Option<&Word> {
        self.words.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_level_tone_without_diacritic() {
        assert_eq!(detect_tone_class("ma"), 0);
    }

    #[test]
    fn detects_each_tone_diacritic() {
        assert_eq!(detect_tone_class("mà"), 1);
        assert_eq!(detect_tone_class("má"), 2);
        assert_eq!(detect_tone_class("mả"), 3);
        assert_eq!(detect_tone_class("mã"), 4);
        assert_eq!(detect_tone_class("mạ"), 5);
    }

    #[test]
    fn vowel_nucleus_single_vowel() {
        assert_eq!(extract_vowel_nucleus("má"), Some(0));
    }

    #[test]
    fn vowel_nucleus_prefers_tone_marked_vowel_in_cluster() {
        // "ngoài" cluster: o, à, i -> à carries the tone mark -> class for 'a'.
        assert_eq!(extract_vowel_nucleus("ngoài"), Some(0));
    }

    #[test]
    fn vowel_nucleus_falls_back_to_openness_without_tone_mark() {
        // "oi" cluster, no tone mark: o (rank 6) beats i (rank 11).
        assert_eq!(extract_vowel_nucleus("oi"), Some(6));
    }

    #[test]
    fn sequence_key_joins_with_dash() {
        assert_eq!(sequence_key(&[2, 0, 4]), "2-0-4");
    }

    #[test]
    fn word_index_groups_by_sequence_key() {
        let words = vec![
            Word {
                id: 1,
                surface_form: "ma".to_string(),
                gloss: "ghost".to_string(),
                image_url: None,
            },
            Word {
                id: 2,
                surface_form: "má".to_string(),
                gloss: "mother".to_string(),
                image_url: None,
            },
        ];
        let idx = WordIndex::build(DrillFamily::Tone, words);
        assert_eq!(idx.words_for_key("0").len(), 1);
        assert_eq!(idx.words_for_key("2").len(), 1);
        assert!(idx.words_for_key("5").is_empty());
    }

    #[test]
    fn confusion_group_falls_back_to_singleton() {
        assert_eq!(confusion_group(6), vec![6, 7, 8]);
        assert_eq!(confusion_group(99), vec![99]);
    }
}
