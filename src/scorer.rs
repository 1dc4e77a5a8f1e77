//! Live scoring of the typed prefix against the sample passage.
//!
//! Everything here works on chars rather than bytes so multi-byte input
//! scores the same as ASCII.

use std::time::Instant;

use serde::Serialize;

use crate::runtime::KeyInput;
use crate::session::LiveSessionState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSnapshot {
    /// Matching positions over typed length, `[0, 100]`.
    pub accuracy: f64,
    /// Typed length over sample length, capped at 100.
    pub progress_percent: f64,
    /// Whether the typed text is still a prefix of the sample.
    pub prefix_matches: bool,
    /// Exact, case- and punctuation-sensitive equality with the sample.
    pub completed: bool,
    /// Running average over the reaction window, seconds.
    pub avg_reaction_time: Option<f64>,
}

/// Accuracy of `typed` against `sample`: positions where both agree, over
/// the typed length. An empty input scores 0.
pub fn accuracy(sample: &str, typed: &str) -> f64 {
    let typed_len = typed.chars().count();
    if typed_len == 0 {
        return 0.0;
    }
    let matching = sample
        .chars()
        .zip(typed.chars())
        .filter(|(s, t)| s == t)
        .count();
    crate::util::percent(matching, typed_len)
}

pub fn progress_percent(sample: &str, typed: &str) -> f64 {
    let sample_len = sample.chars().count();
    if sample_len == 0 {
        return 100.0;
    }
    (typed.chars().count() as f64 / sample_len as f64 * 100.0).min(100.0)
}

pub fn score(sample: &str, typed: &str) -> ScoreSnapshot {
    ScoreSnapshot {
        accuracy: accuracy(sample, typed),
        progress_percent: progress_percent(sample, typed),
        prefix_matches: sample.starts_with(typed),
        completed: typed == sample,
        avg_reaction_time: None,
    }
}

/// Apply one non-modifier keystroke to the live state and score the result.
///
/// Records the interval since the previous non-modifier keystroke, edits
/// the typed prefix, and keeps the per-keystroke correct/total counters used
/// for the final session accuracy. Modifier input never reaches this point.
pub fn on_keystroke(state: &mut LiveSessionState, input: KeyInput, now: Instant) -> ScoreSnapshot {
    if let Some(last) = state.last_key_time {
        state
            .reactions
            .push(now.saturating_duration_since(last).as_secs_f64());
    }
    state.last_key_time = Some(now);

    match input {
        KeyInput::Text(c) => {
            let position = state.typed.chars().count();
            state.total_char_count += 1;
            if state.sample_text.chars().nth(position) == Some(c) {
                state.correct_char_count += 1;
            }
            state.typed.push(c);
        }
        KeyInput::Backspace => {
            state.typed.pop();
        }
        KeyInput::Other | KeyInput::Modifier => {}
    }

    ScoreSnapshot {
        avg_reaction_time: state.reactions.average(),
        ..score(&state.sample_text, &state.typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Difficulty;
    use std::time::Duration;

    fn state(sample: &str) -> LiveSessionState {
        LiveSessionState::new(sample.to_string(), Difficulty::default())
    }

    #[test]
    fn exact_match_completes() {
        let snap = score("cat", "cat");
        assert!(snap.completed);
        assert_eq!(snap.accuracy, 100.0);
        assert_eq!(snap.progress_percent, 100.0);
    }

    #[test]
    fn single_typo_scores_partially() {
        let snap = score("hello world", "hellp");
        assert_eq!(snap.accuracy, 80.0);
        assert!((snap.progress_percent - 45.4545).abs() < 0.01);
        assert!(!snap.prefix_matches);
        assert!(!snap.completed);
    }

    #[test]
    fn every_prefix_is_perfect() {
        let sample = "The fox, quick; and: brown.";
        for end in 1..=sample.len() {
            let snap = score(sample, &sample[..end]);
            assert_eq!(snap.accuracy, 100.0);
            assert!(snap.prefix_matches);
        }
    }

    #[test]
    fn empty_input_scores_zero() {
        let snap = score("abc", "");
        assert_eq!(snap.accuracy, 0.0);
        assert_eq!(snap.progress_percent, 0.0);
        assert!(snap.prefix_matches);
    }

    #[test]
    fn overlong_input_stays_in_bounds() {
        let snap = score("ab", "abcdef");
        assert!((0.0..=100.0).contains(&snap.accuracy));
        assert_eq!(snap.progress_percent, 100.0);
        assert!(!snap.completed);
    }

    #[test]
    fn completion_is_case_sensitive() {
        assert!(!score("Cat.", "cat.").completed);
        assert!(!score("Cat.", "Cat").completed);
        assert!(score("Cat.", "Cat.").completed);
    }

    #[test]
    fn multibyte_text_scores_by_char() {
        let snap = score("héllo", "hé");
        assert_eq!(snap.accuracy, 100.0);
        assert_eq!(snap.progress_percent, 40.0);
    }

    #[test]
    fn keystrokes_track_reactions_and_counters() {
        let mut st = state("ab");
        let t0 = Instant::now();

        let first = on_keystroke(&mut st, KeyInput::Text('a'), t0);
        assert_eq!(first.avg_reaction_time, None);

        let second = on_keystroke(
            &mut st,
            KeyInput::Text('x'),
            t0 + Duration::from_millis(200),
        );
        assert_eq!(st.total_char_count, 2);
        assert_eq!(st.correct_char_count, 1);
        assert!((second.avg_reaction_time.unwrap() - 0.2).abs() < 1e-9);
        assert!(!second.prefix_matches);

        on_keystroke(&mut st, KeyInput::Backspace, t0 + Duration::from_millis(500));
        let done = on_keystroke(&mut st, KeyInput::Text('b'), t0 + Duration::from_millis(600));
        assert!(done.completed);
        assert_eq!(st.typed, "ab");
        assert_eq!(st.total_char_count, 3);
        assert_eq!(st.correct_char_count, 2);
        assert_eq!(st.reactions.len(), 3);
    }

    #[test]
    fn reaction_window_stays_bounded() {
        let mut st = state("abcdefghijklmnopqrstuvwxyz");
        let t0 = Instant::now();
        for (i, c) in "abcdefghijklmnop".chars().enumerate() {
            on_keystroke(&mut st, KeyInput::Text(c), t0 + Duration::from_millis(i as u64 * 100));
        }
        assert_eq!(st.reactions.len(), crate::session::REACTION_WINDOW);
    }
}
