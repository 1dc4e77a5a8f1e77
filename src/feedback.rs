use std::time::{Duration, Instant};

use serde::Serialize;

/// Advisory messages shown while typing and after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Feedback {
    ManyErrors,
    ReduceErrors,
    SteadyPace,
    IrregularRhythm,
    KeepItUp,
    AccuracyFirst,
    ReadyForMore,
    FocusOnAccuracy,
    SlowReaction,
}

impl Feedback {
    pub fn message(self) -> &'static str {
        match self {
            Feedback::ManyErrors => "Lots of mistakes so far. Slow down and aim for clean keystrokes.",
            Feedback::ReduceErrors => "Decent effort. Type a little more carefully to cut the errors.",
            Feedback::SteadyPace => "Speed is building. Keep a steady, even pace.",
            Feedback::IrregularRhythm => {
                "Your rhythm is uneven. Try to keep the gap between keys consistent."
            }
            Feedback::KeepItUp => "Looking good. Keep it up!",
            Feedback::AccuracyFirst => "Work on accuracy first; speed follows with practice.",
            Feedback::ReadyForMore => "Great run. You are ready for tougher passages.",
            Feedback::FocusOnAccuracy => "Concentrate on typing accurately and cutting errors.",
            Feedback::SlowReaction => "Reactions are a bit slow. Aim for a steady rhythm.",
        }
    }

    /// Pick the live message for the current metrics; first matching rule wins.
    pub fn live(metrics: &LiveMetrics) -> Self {
        if metrics.accuracy < 70.0 {
            Feedback::ManyErrors
        } else if metrics.accuracy < 85.0 {
            Feedback::ReduceErrors
        } else if metrics.wpm < 30.0 {
            Feedback::SteadyPace
        } else if metrics.avg_reaction_time > 0.5 {
            Feedback::IrregularRhythm
        } else {
            Feedback::KeepItUp
        }
    }

    /// Advice attached to a finished session, if any applies.
    pub fn after_session(wpm: f64, accuracy: f64, avg_reaction_time: f64) -> Option<Self> {
        if wpm < 30.0 && accuracy < 90.0 {
            Some(Feedback::AccuracyFirst)
        } else if wpm > 60.0 && accuracy > 95.0 {
            Some(Feedback::ReadyForMore)
        } else if accuracy < 85.0 {
            Some(Feedback::FocusOnAccuracy)
        } else if avg_reaction_time > 0.5 {
            Some(Feedback::SlowReaction)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Snapshot of running performance, used both for feedback and for display.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LiveMetrics {
    pub elapsed_secs: f64,
    pub wpm: f64,
    pub accuracy: f64,
    pub avg_reaction_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackSettings {
    pub interval: Duration,
    pub warmup: Duration,
    pub cooldown: Duration,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            warmup: Duration::from_secs(5),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Cooperative feedback timer owned by the control thread.
///
/// Nothing runs in the background: the owner polls `is_due` at its own
/// scheduling points and calls `fire`, which always re-arms the timer
/// even when the warm-up or cooldown gate suppresses the message.
#[derive(Debug, Clone)]
pub struct FeedbackScheduler {
    settings: FeedbackSettings,
    next_due: Option<Instant>,
    last_feedback: Option<Instant>,
}

impl FeedbackScheduler {
    pub fn new(settings: FeedbackSettings) -> Self {
        Self {
            settings,
            next_due: None,
            last_feedback: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.settings.interval);
        self.last_feedback = None;
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Timer callback. Returns `None` once cancelled, and never re-arms a cancelled timer.
    pub fn fire(
        &mut self,
        now: Instant,
        started_at: Instant,
        metrics: &LiveMetrics,
    ) -> Option<Feedback> {
        self.next_due?;
        self.next_due = Some(now + self.settings.interval);
        self.request(now, started_at, metrics)
    }

    /// Apply the warm-up and cooldown gates and produce a message if both pass.
    pub fn request(
        &mut self,
        now: Instant,
        started_at: Instant,
        metrics: &LiveMetrics,
    ) -> Option<Feedback> {
        if now.saturating_duration_since(started_at) < self.settings.warmup {
            return None;
        }
        if let Some(last) = self.last_feedback {
            if now.saturating_duration_since(last) < self.settings.cooldown {
                return None;
            }
        }
        self.last_feedback = Some(now);
        Some(Feedback::live(metrics))
    }
}

impl Default for FeedbackScheduler {
    fn default() -> Self {
        Self::new(FeedbackSettings::default())
    }
}
