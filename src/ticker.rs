use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::events::SessionEvent;
use crate::feedback::LiveMetrics;
use crate::util::words_per_minute;

/// Counters the controller publishes for the metrics ticker. Only the
/// controller writes them; the ticker only reads.
#[derive(Debug, Default)]
pub struct LiveCounters {
    words: AtomicUsize,
}

impl LiveCounters {
    pub fn set_words(&self, words: usize) {
        self.words.store(words, Ordering::Relaxed);
    }

    pub fn words(&self) -> usize {
        self.words.load(Ordering::Relaxed)
    }
}

/// Background task that posts elapsed time and live WPM while a session runs.
///
/// `cancel` (also run on drop) wakes the thread and joins it, so once it
/// returns no further `Live` event can be sent.
#[derive(Debug)]
pub struct MetricsTicker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MetricsTicker {
    pub fn spawn(
        started_at: Instant,
        interval: Duration,
        counters: Arc<LiveCounters>,
        events: Sender<SessionEvent>,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let elapsed_secs = started_at.elapsed().as_secs_f64();
                    let live = LiveMetrics {
                        elapsed_secs,
                        wpm: words_per_minute(counters.words(), elapsed_secs),
                        ..LiveMetrics::default()
                    };
                    if events.send(SessionEvent::Live(live)).is_err() {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MetricsTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}
