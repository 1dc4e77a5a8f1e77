use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

use crate::util::{mean, std_dev};

/// Number of inter-key intervals kept for the running reaction average.
pub const REACTION_WINDOW: usize = 10;

/// Passage length category. Each category has its own pool in the corpus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextType {
    Short,
    #[default]
    Medium,
    Long,
}

/// Difficulty level, always within `Difficulty::MIN..=Difficulty::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: Difficulty = Difficulty(1);
    pub const MAX: Difficulty = Difficulty(5);

    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Round a raw model estimate to the nearest level and clamp it.
    pub fn from_estimate(raw: f64) -> Self {
        let rounded = raw.round().clamp(Self::MIN.0 as f64, Self::MAX.0 as f64);
        Self(rounded as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn harder(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    pub fn easier(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(2)
    }
}

impl From<u8> for Difficulty {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

/// Bounded window of inter-key intervals in seconds; the oldest is evicted first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionWindow {
    samples: VecDeque<f64>,
}

impl ReactionWindow {
    pub fn push(&mut self, secs: f64) {
        if self.samples.len() == REACTION_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(secs);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn average(&self) -> Option<f64> {
        mean(&self.samples())
    }

    pub fn std_dev(&self) -> Option<f64> {
        std_dev(&self.samples())
    }
}

/// Everything the controller tracks for the session in progress.
#[derive(Debug, Clone)]
pub struct LiveSessionState {
    pub status: SessionStatus,
    pub sample_text: String,
    pub typed: String,
    pub correct_char_count: usize,
    pub total_char_count: usize,
    pub start_time: Option<Instant>,
    pub last_key_time: Option<Instant>,
    pub reactions: ReactionWindow,
    pub current_difficulty: Difficulty,
}

impl LiveSessionState {
    pub fn new(sample_text: String, current_difficulty: Difficulty) -> Self {
        Self {
            status: SessionStatus::Idle,
            sample_text,
            typed: String::new(),
            correct_char_count: 0,
            total_char_count: 0,
            start_time: None,
            last_key_time: None,
            reactions: ReactionWindow::default(),
            current_difficulty,
        }
    }

    /// Back to Idle defaults with a fresh passage; the difficulty is kept.
    pub fn reset(&mut self, sample_text: String) {
        *self = Self::new(sample_text, self.current_difficulty);
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        self.start_time
            .map(|start| now.saturating_duration_since(start).as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn typed_words(&self) -> usize {
        self.typed.split_whitespace().count()
    }
}
