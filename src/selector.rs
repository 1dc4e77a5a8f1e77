//! Passage selection and difficulty shaping.
//!
//! Passages are bucketed by a fixed heuristic: average word length times the
//! number of `,` `;` `:` characters, mapped as `floor(complexity / 5) + 1`
//! and clamped to the difficulty range. Keep the arithmetic as is; stored
//! sessions and tests depend on the exact bucketing.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::corpus::Corpus;
use crate::session::{Difficulty, TextType};

const CLAUSE_PUNCTUATION: [char; 3] = [',', ';', ':'];
/// Words shorter than this may be swapped for a complex word at high difficulty.
const SHORT_WORD_LEN: usize = 5;
/// Chance that an eligible short word is replaced.
pub const REPLACE_PROBABILITY: f64 = 0.3;
const AUGMENT_FROM: u8 = 4;

pub const COMPLEX_WORDS: [&str; 20] = [
    "asynchronous",
    "borrowing",
    "concurrency",
    "deserialize",
    "ergonomics",
    "heuristic",
    "idempotent",
    "juxtaposition",
    "kaleidoscope",
    "lexicographic",
    "monomorphize",
    "nondeterministic",
    "orthogonal",
    "parallelism",
    "quintessential",
    "rhythmically",
    "synchronization",
    "throughput",
    "unambiguous",
    "vulnerability",
];

pub fn average_word_len(text: &str) -> f64 {
    let (count, total) = text
        .split_whitespace()
        .fold((0usize, 0usize), |(n, len), w| (n + 1, len + w.chars().count()));
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

pub fn complexity(text: &str) -> f64 {
    let punctuation = text
        .chars()
        .filter(|c| CLAUSE_PUNCTUATION.contains(c))
        .count();
    average_word_len(text) * punctuation as f64
}

pub fn difficulty_bucket(text: &str) -> Difficulty {
    let bucket = (complexity(text) / 5.0).floor() + 1.0;
    Difficulty::new(bucket.clamp(1.0, 5.0) as u8)
}

/// Uniform choice among passages in the target bucket, or over the whole
/// pool when none match. `None` only for an empty pool.
pub fn select_from<'a, R: Rng + ?Sized>(
    pool: &'a [String],
    target: Difficulty,
    rng: &mut R,
) -> Option<&'a String> {
    let eligible: Vec<&String> = pool
        .iter()
        .filter(|p| difficulty_bucket(p) == target)
        .collect();
    match eligible.choose(rng) {
        Some(p) => Some(*p),
        None => pool.choose(rng),
    }
}

/// Independently replace each word shorter than five characters with a
/// complex word, with probability [`REPLACE_PROBABILITY`].
pub fn replace_short_words<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    text.split_whitespace()
        .map(|word| {
            if word.chars().count() < SHORT_WORD_LEN && rng.gen_bool(REPLACE_PROBABILITY) {
                COMPLEX_WORDS.choose(rng).copied().unwrap_or(word)
            } else {
                word
            }
        })
        .join(" ")
}

/// Fuse the sentences of a passage that has no clause punctuation into one
/// run-on sentence: `A. B. C` becomes `A, B; C`.
pub fn run_on_sentences(text: &str) -> String {
    if text.contains(&CLAUSE_PUNCTUATION[..]) {
        return text.to_string();
    }
    let parts: Vec<&str> = text.split(". ").collect();
    match parts.split_last() {
        Some((last, head)) if !head.is_empty() => format!("{}; {}", head.iter().join(", "), last),
        _ => text.to_string(),
    }
}

/// Make a passage harder for difficulty 4 and above.
pub fn augment<R: Rng + ?Sized>(text: &str, difficulty: Difficulty, rng: &mut R) -> String {
    if difficulty.level() < AUGMENT_FROM {
        return text.to_string();
    }
    let replaced = replace_short_words(text, rng);
    if difficulty.is_max() {
        run_on_sentences(&replaced)
    } else {
        replaced
    }
}

/// Chooses the next passage for a text type and difficulty.
#[derive(Debug)]
pub struct TextSelector {
    corpus: Corpus,
    augment: bool,
    rng: StdRng,
}

impl TextSelector {
    pub fn new(corpus: Corpus, augment: bool) -> Self {
        Self {
            corpus,
            augment,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(corpus: Corpus, augment: bool, seed: u64) -> Self {
        Self {
            corpus,
            augment,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn select(&mut self, text_type: TextType, target: Difficulty) -> String {
        let pool = match self.corpus.pool(text_type) {
            [] => Corpus::embedded().pool(text_type).to_vec(),
            pool => pool.to_vec(),
        };
        let passage = select_from(&pool, target, &mut self.rng)
            .cloned()
            .unwrap_or_default();
        if self.augment {
            augment(&passage, target, &mut self.rng)
        } else {
            passage
        }
    }
}
