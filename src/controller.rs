use chrono::Local;
use crossterm::event::KeyEvent;
use log::{debug, info, warn};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::events::{SessionEvent, SessionSummary};
use crate::feedback::{Feedback, FeedbackScheduler, LiveMetrics};
use crate::predictor::{DifficultyModel, DifficultyPredictor, Features, MlpModel};
use crate::runtime::{InputEvent, KeyInput, SessionCommand};
use crate::scorer;
use crate::selector::TextSelector;
use crate::session::{Difficulty, LiveSessionState, SessionStatus, TextType};
use crate::stats::{SessionRecord, StatsStore};
use crate::ticker::{LiveCounters, MetricsTicker};
use crate::util::{percent, words_per_minute};

/// Drives one practice session at a time from Idle through Completed and back.
///
/// All mutation happens on the thread that owns the controller. The only
/// other thread is the metrics ticker, which lives exactly as long as the
/// Running state and only reads [`LiveCounters`].
#[derive(Debug)]
pub struct SessionController<M: DifficultyModel = MlpModel> {
    state: LiveSessionState,
    text_type: TextType,
    scheduler: FeedbackScheduler,
    selector: TextSelector,
    predictor: DifficultyPredictor<M>,
    store: StatsStore,
    counters: Arc<LiveCounters>,
    ticker: Option<MetricsTicker>,
    tick_interval: Duration,
    events: Sender<SessionEvent>,
}

impl<M: DifficultyModel> SessionController<M> {
    pub fn new(
        config: &Config,
        store: StatsStore,
        predictor: DifficultyPredictor<M>,
        mut selector: TextSelector,
        events: Sender<SessionEvent>,
    ) -> Self {
        let difficulty = if store.sessions().is_empty() {
            config.starting_difficulty
        } else {
            Difficulty::new(store.ledger().user_level)
        };
        let text_type = config.text_type;
        let sample = selector.select(text_type, difficulty);
        info!("starting at difficulty {} with {} text", difficulty, text_type);

        let controller = Self {
            state: LiveSessionState::new(sample.clone(), difficulty),
            text_type,
            scheduler: FeedbackScheduler::new(config.feedback()),
            selector,
            predictor,
            store,
            counters: Arc::new(LiveCounters::default()),
            ticker: None,
            tick_interval: config.tick_interval(),
            events,
        };
        controller.emit(SessionEvent::PassageReady(sample));
        controller
    }

    pub fn state(&self) -> &LiveSessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn difficulty(&self) -> Difficulty {
        self.state.current_difficulty
    }

    pub fn text_type(&self) -> TextType {
        self.text_type
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    pub fn predictor(&self) -> &DifficultyPredictor<M> {
        &self.predictor
    }

    pub fn ticker_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(MetricsTicker::is_running)
    }

    /// Route one event from the runner.
    pub fn dispatch(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::Key(key) => self.on_key_event(key, now),
            InputEvent::Command(cmd) => self.handle(cmd),
            InputEvent::Tick => self.on_tick(now),
        }
    }

    pub fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::NewSession(text_type) => {
                self.text_type = text_type;
                self.reset();
            }
            SessionCommand::Reset => self.reset(),
        }
    }

    pub fn on_key_event(&mut self, key: KeyEvent, now: Instant) {
        self.on_input(KeyInput::from(&key), now);
    }

    pub fn on_input(&mut self, input: KeyInput, now: Instant) {
        match self.state.status {
            SessionStatus::Completed => return,
            SessionStatus::Idle => {
                if input == KeyInput::Modifier {
                    return;
                }
                self.begin(now);
            }
            SessionStatus::Running => {
                if input == KeyInput::Modifier {
                    return;
                }
            }
        }

        let snapshot = scorer::on_keystroke(&mut self.state, input, now);
        self.counters.set_words(self.state.typed_words());
        let completed = snapshot.completed;
        self.emit(SessionEvent::Score(snapshot));
        if completed {
            self.complete(now);
        }
    }

    /// Cooperative scheduling point for the feedback timer.
    pub fn on_tick(&mut self, now: Instant) {
        if !self.state.is_running() || !self.scheduler.is_due(now) {
            return;
        }
        let Some(started_at) = self.state.start_time else {
            return;
        };
        let metrics = self.live_metrics(now);
        if let Some(feedback) = self.scheduler.fire(now, started_at, &metrics) {
            debug!("live feedback: {:?}", feedback);
            self.emit(SessionEvent::Feedback(feedback));
        }
    }

    /// Back to Idle with a fresh passage at the current difficulty. Legal from any state.
    pub fn reset(&mut self) {
        self.stop_timers();
        let sample = self
            .selector
            .select(self.text_type, self.state.current_difficulty);
        self.state.reset(sample.clone());
        self.counters.set_words(0);
        self.emit(SessionEvent::PassageReady(sample));
    }

    fn begin(&mut self, now: Instant) {
        self.state.status = SessionStatus::Running;
        self.state.start_time = Some(now);
        self.counters.set_words(0);
        self.ticker = Some(MetricsTicker::spawn(
            now,
            self.tick_interval,
            Arc::clone(&self.counters),
            self.events.clone(),
        ));
        self.scheduler.start(now);
    }

    fn stop_timers(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.scheduler.cancel();
    }

    fn live_metrics(&self, now: Instant) -> LiveMetrics {
        let elapsed_secs = self.state.elapsed_secs(now);
        LiveMetrics {
            elapsed_secs,
            wpm: words_per_minute(self.state.typed_words(), elapsed_secs),
            accuracy: scorer::accuracy(&self.state.sample_text, &self.state.typed),
            avg_reaction_time: self.state.reactions.average().unwrap_or(0.0),
        }
    }

    fn complete(&mut self, now: Instant) {
        self.stop_timers();
        self.state.status = SessionStatus::Completed;

        let elapsed_time = self.state.elapsed_secs(now);
        let wpm = words_per_minute(self.state.typed_words(), elapsed_time);
        let accuracy = percent(self.state.correct_char_count, self.state.total_char_count);
        let avg_reaction_time = self.state.reactions.average().unwrap_or(0.0);
        let played = self.state.current_difficulty;

        let record = SessionRecord {
            timestamp: Local::now(),
            wpm,
            accuracy,
            difficulty: played,
            text_type: self.text_type,
            elapsed_time,
            avg_reaction_time,
        };
        info!(
            "session completed: {:.1} wpm, {:.1}% accuracy at difficulty {}",
            wpm, accuracy, played
        );
        if let Err(e) = self.store.append(record.clone()) {
            self.notice(format!("Could not save session: {e}"));
        }

        let features = Features::new(wpm, accuracy, avg_reaction_time);
        self.predictor.update(&features, played);
        if let Err(e) = self.predictor.save() {
            self.notice(format!("Could not save difficulty model: {e}"));
        }

        let recommendation = self
            .predictor
            .recommend(&features, played, self.store.sessions());
        let next = recommendation.difficulty;
        debug!("next difficulty {} from {:?}", next, recommendation.source);
        if let Err(e) = self.store.set_user_level(next) {
            self.notice(format!("Could not save level: {e}"));
        }
        if next != played {
            self.state.current_difficulty = next;
            self.emit(SessionEvent::DifficultyChanged(next));
        }

        let advice = Feedback::after_session(wpm, accuracy, avg_reaction_time);
        let summary = SessionSummary {
            record,
            next_difficulty: next,
            reaction_std_dev: self.state.reactions.std_dev(),
            advice,
        };
        self.emit(SessionEvent::SessionCompleted(Box::new(summary)));
        if let Some(advice) = advice {
            self.emit(SessionEvent::Feedback(advice));
        }
    }

    fn notice(&self, message: String) {
        warn!("{}", message);
        self.emit(SessionEvent::Notice(message));
    }

    fn emit(&self, event: SessionEvent) {
        // presentation side may already be gone on shutdown
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::error::PredictionError;
    use assert_matches::assert_matches;
    use serde::{Deserialize, Serialize};
    use std::sync::mpsc::{self, Receiver};

    #[derive(Debug, Serialize, Deserialize)]
    struct Unavailable;

    impl DifficultyModel for Unavailable {
        fn fresh() -> Self {
            Unavailable
        }
        fn estimate(&self, _: &Features) -> Result<f64, PredictionError> {
            Err(PredictionError::Unavailable("no model".into()))
        }
        fn train(&mut self, _: &Features, _: f64) -> Result<(), PredictionError> {
            Err(PredictionError::Unavailable("no model".into()))
        }
    }

    fn config(start: u8) -> Config {
        Config {
            starting_difficulty: Difficulty::new(start),
            tick_interval_ms: 10,
            ..Config::default()
        }
    }

    fn controller_with<M: DifficultyModel>(
        passage: &str,
        start: u8,
    ) -> (SessionController<M>, Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        let selector = TextSelector::with_seed(Corpus::single(passage), false, 1);
        let controller = SessionController::new(
            &config(start),
            StatsStore::in_memory(),
            DifficultyPredictor::<M>::in_memory(),
            selector,
            tx,
        );
        (controller, rx)
    }

    fn controller(passage: &str) -> (SessionController, Receiver<SessionEvent>) {
        controller_with::<MlpModel>(passage, 2)
    }

    fn type_str<M: DifficultyModel>(
        c: &mut SessionController<M>,
        text: &str,
        start: Instant,
        step: Duration,
    ) -> Instant {
        let mut now = start;
        for ch in text.chars() {
            c.on_input(KeyInput::Text(ch), now);
            now += step;
        }
        now
    }

    fn drain(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter()
            .filter(|e| !matches!(e, SessionEvent::Live(_)))
            .collect()
    }

    #[test]
    fn starts_idle_with_a_passage() {
        let (c, rx) = controller("cat");
        assert_eq!(c.status(), SessionStatus::Idle);
        assert_eq!(c.state().sample_text, "cat");
        assert_eq!(drain(&rx), vec![SessionEvent::PassageReady("cat".into())]);
    }

    #[test]
    fn modifier_does_not_start_a_session() {
        let (mut c, _rx) = controller("cat");
        c.on_input(KeyInput::Modifier, Instant::now());
        assert_eq!(c.status(), SessionStatus::Idle);
        assert!(c.state().start_time.is_none());
        assert!(!c.ticker_running());
    }

    #[test]
    fn first_key_starts_running() {
        let (mut c, _rx) = controller("cats");
        let now = Instant::now();
        c.on_input(KeyInput::Other, now);
        assert_eq!(c.status(), SessionStatus::Running);
        assert_eq!(c.state().start_time, Some(now));
        assert!(c.ticker_running());
        assert!(c.state().typed.is_empty());
    }

    #[test]
    fn typing_the_sample_completes() {
        let (mut c, rx) = controller("cat");
        let start = Instant::now();
        type_str(&mut c, "cat", start, Duration::from_millis(200));

        assert_eq!(c.status(), SessionStatus::Completed);
        assert!(!c.ticker_running());
        assert_eq!(c.store().sessions().len(), 1);
        let record = &c.store().sessions()[0];
        assert_eq!(record.accuracy, 100.0);
        assert_eq!(record.difficulty, Difficulty::new(2));
        // one word in 0.4s
        assert!((record.wpm - 150.0).abs() < 1e-9);

        let events = drain(&rx);
        let last_score = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Score(s) => Some(s),
                _ => None,
            })
            .last()
            .unwrap();
        assert!(last_score.completed);
        assert_eq!(last_score.progress_percent, 100.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::SessionCompleted(_))));
    }

    #[test]
    fn input_after_completion_is_ignored() {
        let (mut c, rx) = controller("hi");
        let now = type_str(&mut c, "hi", Instant::now(), Duration::from_millis(100));
        drain(&rx);
        c.on_input(KeyInput::Text('x'), now);
        assert_eq!(c.state().typed, "hi");
        assert!(drain(&rx).is_empty());
        assert_eq!(c.store().sessions().len(), 1);
    }

    #[test]
    fn final_accuracy_counts_every_keystroke() {
        let (mut c, _rx) = controller("cat");
        let mut now = Instant::now();
        c.on_input(KeyInput::Text('x'), now);
        now += Duration::from_millis(100);
        c.on_input(KeyInput::Backspace, now);
        type_str(&mut c, "cat", now, Duration::from_millis(100));

        let record = &c.store().sessions()[0];
        assert_eq!(record.accuracy, 75.0);
        assert_eq!(c.state().total_char_count, 4);
        assert_eq!(c.state().correct_char_count, 3);
    }

    #[test]
    fn reset_from_any_state_returns_to_idle() {
        let (mut c, rx) = controller("hello world");
        // idle
        c.reset();
        assert_eq!(c.status(), SessionStatus::Idle);

        // running
        let now = type_str(&mut c, "hel", Instant::now(), Duration::from_millis(50));
        assert!(c.ticker_running());
        c.reset();
        assert_eq!(c.status(), SessionStatus::Idle);
        assert!(!c.ticker_running());
        assert!(c.state().typed.is_empty());
        assert_eq!(c.state().total_char_count, 0);
        assert!(c.state().reactions.is_empty());
        assert!(c.state().start_time.is_none());
        // no feedback after reset
        c.on_tick(now + Duration::from_secs(60));

        // completed
        type_str(&mut c, "hello world", now, Duration::from_millis(50));
        assert_eq!(c.status(), SessionStatus::Completed);
        drain(&rx);
        c.reset();
        assert_eq!(c.status(), SessionStatus::Idle);
        assert_eq!(
            drain(&rx),
            vec![SessionEvent::PassageReady("hello world".into())]
        );
    }

    #[test]
    fn no_live_events_after_reset() {
        let (mut c, rx) = controller("hello world");
        type_str(&mut c, "he", Instant::now(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(40));
        c.reset();
        rx.try_iter().for_each(drop);
        std::thread::sleep(Duration::from_millis(40));
        assert!(rx.try_iter().all(|e| !matches!(e, SessionEvent::Live(_))));
    }

    #[test]
    fn feedback_fires_on_tick_after_interval() {
        let (mut c, rx) = controller("the quick brown fox jumps over the lazy dog");
        let start = Instant::now();
        c.on_input(KeyInput::Text('t'), start);
        drain(&rx);

        c.on_tick(start + Duration::from_secs(10));
        assert!(drain(&rx).is_empty());

        c.on_tick(start + Duration::from_secs(16));
        assert_eq!(
            drain(&rx),
            vec![SessionEvent::Feedback(Feedback::SteadyPace)]
        );
    }

    #[test]
    fn new_session_command_switches_text_type() {
        let (mut c, rx) = controller("cat");
        drain(&rx);
        c.handle(SessionCommand::NewSession(TextType::Long));
        assert_eq!(c.text_type(), TextType::Long);
        assert_matches!(drain(&rx).as_slice(), [SessionEvent::PassageReady(_)]);
    }

    #[test]
    fn poor_sessions_trend_toward_easiest() {
        let (mut c, rx) = controller_with::<Unavailable>("cat", 5);
        let mut levels = Vec::new();
        let mut now = Instant::now();
        for _ in 0..10 {
            // a miss, a correction, then slow typing: 75% accuracy, low wpm
            c.on_input(KeyInput::Text('x'), now);
            now += Duration::from_secs(2);
            c.on_input(KeyInput::Backspace, now);
            now = type_str(&mut c, "cat", now + Duration::from_secs(2), Duration::from_secs(2));
            assert_eq!(c.status(), SessionStatus::Completed);
            levels.push(c.difficulty().level());
            c.reset();
        }
        // the fourth recommendation is held within one step of the third session
        assert_eq!(levels, vec![4, 3, 2, 2, 1, 1, 1, 1, 1, 1]);
        assert_eq!(c.store().ledger().user_level, 1);
        let changes = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::DifficultyChanged(_)))
            .count();
        assert_eq!(changes, 4);
    }

    #[test]
    fn resumes_at_persisted_level() {
        let (tx, _rx) = mpsc::channel();
        let mut store = StatsStore::in_memory();
        store
            .append(SessionRecord {
                timestamp: Local::now(),
                wpm: 40.0,
                accuracy: 90.0,
                difficulty: Difficulty::new(3),
                text_type: TextType::Medium,
                elapsed_time: 30.0,
                avg_reaction_time: 0.2,
            })
            .unwrap();
        store.set_user_level(Difficulty::new(4)).unwrap();
        let c: SessionController = SessionController::new(
            &config(2),
            store,
            DifficultyPredictor::in_memory(),
            TextSelector::with_seed(Corpus::single("cat"), false, 1),
            tx,
        );
        assert_eq!(c.difficulty(), Difficulty::new(4));
    }

    #[test]
    fn learned_prediction_stays_in_range() {
        let (mut c, _rx) = controller("go");
        let mut now = Instant::now();
        for _ in 0..8 {
            now = type_str(&mut c, "go", now, Duration::from_millis(150));
            let level = c.difficulty().level();
            assert!((1..=5).contains(&level));
            c.reset();
        }
        let sessions = c.store().sessions();
        // a level chosen after session i stays within one of session i - 1
        for w in sessions.windows(3).skip(2) {
            let diff = w[2].difficulty.level().abs_diff(w[0].difficulty.level());
            assert!(diff <= 1);
        }
    }
}
