use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::session::{Difficulty, TextType};
use crate::util::mean;

/// One completed practice session. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Local>,
    pub wpm: f64,
    pub accuracy: f64,
    pub difficulty: Difficulty,
    pub text_type: TextType,
    pub elapsed_time: f64,
    pub avg_reaction_time: f64,
}

/// Reduced view of a session kept for learning and trend display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub wpm: f64,
    pub accuracy: f64,
    pub reaction_time: f64,
    pub difficulty: Difficulty,
}

impl From<&SessionRecord> for PerformanceEntry {
    fn from(record: &SessionRecord) -> Self {
        Self {
            wpm: record.wpm,
            accuracy: record.accuracy,
            reaction_time: record.avg_reaction_time,
            difficulty: record.difficulty,
        }
    }
}

fn default_user_level() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsLedger {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub performance_history: Vec<PerformanceEntry>,
    #[serde(default = "default_user_level")]
    pub user_level: u8,
}

impl Default for StatsLedger {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            performance_history: Vec::new(),
            user_level: default_user_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Aggregate {
    pub count: usize,
    pub avg_wpm: f64,
    pub avg_accuracy: f64,
    pub avg_reaction_time: f64,
}

impl Aggregate {
    /// Averages over `sessions`; all zero when there are none.
    pub fn from_sessions(sessions: &[SessionRecord]) -> Self {
        let avg = |f: fn(&SessionRecord) -> f64| {
            mean(&sessions.iter().map(f).collect::<Vec<_>>()).unwrap_or(0.0)
        };
        Self {
            count: sessions.len(),
            avg_wpm: avg(|s| s.wpm),
            avg_accuracy: avg(|s| s.accuracy),
            avg_reaction_time: avg(|s| s.avg_reaction_time),
        }
    }
}

/// Replace `path` with `bytes` without ever leaving a partially written file behind.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Durable, append-only session log backed by a JSON file.
#[derive(Debug)]
pub struct StatsStore {
    path: Option<PathBuf>,
    ledger: StatsLedger,
}

impl StatsStore {
    /// Read the ledger at `path`. A missing or unreadable file yields an empty ledger.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let ledger = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<StatsLedger>(&bytes) {
                Ok(ledger) => {
                    debug!(
                        "loaded {} sessions from {}",
                        ledger.sessions.len(),
                        path.display()
                    );
                    ledger
                }
                Err(e) => {
                    warn!("ledger {} is corrupt, starting empty: {}", path.display(), e);
                    StatsLedger::default()
                }
            },
            Err(_) => StatsLedger::default(),
        };
        Self {
            path: Some(path),
            ledger,
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ledger: StatsLedger::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.ledger.sessions
    }

    /// Append a record and persist. The in-memory ledger keeps the record even if the write fails.
    pub fn append(&mut self, record: SessionRecord) -> Result<(), StoreError> {
        self.ledger
            .performance_history
            .push(PerformanceEntry::from(&record));
        self.ledger.sessions.push(record);
        self.persist()
    }

    pub fn set_user_level(&mut self, level: Difficulty) -> Result<(), StoreError> {
        self.ledger.user_level = level.level();
        self.persist()
    }

    /// Replace the ledger with empty defaults and persist.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.ledger = StatsLedger::default();
        info!("session ledger reset");
        self.persist()
    }

    pub fn aggregate(&self) -> Aggregate {
        Aggregate::from_sessions(&self.ledger.sessions)
    }

    pub fn report(&self) -> StatsReport {
        StatsReport::from_ledger(&self.ledger)
    }

    /// Write every session as one CSV row.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let mut writer = csv::Writer::from_path(path)?;
        for session in &self.ledger.sessions {
            writer.serialize(CsvRow::from(session))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let data = serde_json::to_vec_pretty(&self.ledger)?;
        write_atomic(path, &data)
    }
}

#[derive(Debug, Serialize)]
struct CsvRow {
    date: String,
    wpm: String,
    accuracy: String,
    difficulty: u8,
    text_type: TextType,
    elapsed_secs: String,
    avg_reaction_secs: String,
}

impl From<&SessionRecord> for CsvRow {
    fn from(s: &SessionRecord) -> Self {
        Self {
            date: s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            wpm: format!("{:.2}", s.wpm),
            accuracy: format!("{:.2}", s.accuracy),
            difficulty: s.difficulty.level(),
            text_type: s.text_type,
            elapsed_secs: format!("{:.2}", s.elapsed_time),
            avg_reaction_secs: format!("{:.3}", s.avg_reaction_time),
        }
    }
}

const RECENT_SESSIONS: usize = 5;

/// Human-facing summary of the whole ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub aggregate: Aggregate,
    pub suggestions: Vec<&'static str>,
    pub recent: Vec<SessionRecord>,
    pub user_level: u8,
}

impl StatsReport {
    pub fn from_ledger(ledger: &StatsLedger) -> Self {
        let aggregate = Aggregate::from_sessions(&ledger.sessions);
        let skip = ledger.sessions.len().saturating_sub(RECENT_SESSIONS);
        Self {
            aggregate,
            suggestions: suggestions(&aggregate),
            recent: ledger.sessions[skip..].to_vec(),
            user_level: ledger.user_level,
        }
    }
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let agg = &self.aggregate;
        if agg.count == 0 {
            return writeln!(f, "No sessions recorded yet. Finish a practice run first!");
        }
        writeln!(f, "Total sessions:        {}", agg.count)?;
        writeln!(f, "Average WPM:           {:.2}", agg.avg_wpm)?;
        writeln!(f, "Average accuracy:      {:.2}%", agg.avg_accuracy)?;
        writeln!(f, "Average reaction time: {:.2}s", agg.avg_reaction_time)?;
        writeln!(f, "Current level:         {}", Difficulty::new(self.user_level))?;
        writeln!(f)?;
        for suggestion in &self.suggestions {
            writeln!(f, "Suggestion: {suggestion}")?;
        }
        writeln!(f)?;
        writeln!(f, "Recent sessions:")?;
        for s in &self.recent {
            writeln!(
                f,
                "{}: {:.1} WPM, {:.1}% accuracy, level {}, {}",
                s.timestamp.format("%Y-%m-%d %H:%M:%S"),
                s.wpm,
                s.accuracy,
                s.difficulty.level(),
                s.text_type
            )?;
        }
        Ok(())
    }
}

pub fn suggestions(aggregate: &Aggregate) -> Vec<&'static str> {
    if aggregate.count == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    out.push(if aggregate.avg_wpm < 30.0 {
        "Get accurate first, then build up speed gradually."
    } else if aggregate.avg_wpm < 50.0 {
        "Medium-length passages will help you build consistency."
    } else {
        "Try long passages with complex vocabulary."
    });
    if aggregate.avg_accuracy < 90.0 {
        out.push("Slow down to raise accuracy; speed comes on its own.");
    }
    out
}
