use crate::feedback::{Feedback, LiveMetrics};
use crate::scorer::ScoreSnapshot;
use crate::session::Difficulty;
use crate::stats::SessionRecord;

/// Result of a finished session as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub record: SessionRecord,
    pub next_difficulty: Difficulty,
    /// Spread of the last inter-key intervals, seconds.
    pub reaction_std_dev: Option<f64>,
    pub advice: Option<Feedback>,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Speed:      {:.1} WPM", self.record.wpm)?;
        writeln!(f, "Accuracy:   {:.1}%", self.record.accuracy)?;
        writeln!(f, "Difficulty: {}", self.record.difficulty)?;
        write!(
            f,
            "Next passage will be at difficulty level {}",
            self.next_difficulty.level()
        )
    }
}

/// Everything the engine tells the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Score(ScoreSnapshot),
    Live(LiveMetrics),
    DifficultyChanged(Difficulty),
    Feedback(Feedback),
    SessionCompleted(Box<SessionSummary>),
    /// A passage is ready to type (after startup, reset or a new session request).
    PassageReady(String),
    /// Non-fatal problem, e.g. a failed write to the ledger.
    Notice(String),
}
