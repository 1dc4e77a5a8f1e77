use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::session::TextType;

/// Commands the presentation layer can issue to the controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionCommand {
    NewSession(TextType),
    Reset,
}

/// Unified event type consumed by the control loop
#[derive(Clone, Debug)]
pub enum InputEvent {
    Key(KeyEvent),
    Command(SessionCommand),
    Tick,
}

/// How a raw key event participates in a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyInput {
    /// A printable character appended to the typed text.
    Text(char),
    Backspace,
    /// Any other non-modifier key; counts for timing only.
    Other,
    /// A pure modifier key (or a key release); ignored entirely.
    Modifier,
}

impl From<&KeyEvent> for KeyInput {
    fn from(key: &KeyEvent) -> Self {
        if key.kind == KeyEventKind::Release {
            return KeyInput::Modifier;
        }
        match key.code {
            KeyCode::Modifier(_) => KeyInput::Modifier,
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                KeyInput::Text(c)
            }
            KeyCode::Backspace => KeyInput::Backspace,
            _ => KeyInput::Other,
        }
    }
}

/// Source of input events (keyboard, commands)
pub trait InputEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<InputEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(InputEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit and integration tests
pub struct TestEventSource {
    rx: Receiver<InputEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

impl InputEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the control loop one event/tick at a time
pub struct Runner<E: InputEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: InputEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> InputEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => InputEvent::Tick,
        }
    }
}
