use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use crate::feedback::FeedbackSettings;
use crate::session::{Difficulty, TextType};
use crate::stats::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub text_type: TextType,
    pub starting_difficulty: Difficulty,
    pub augment: bool,
    pub feedback_interval_secs: u64,
    pub feedback_warmup_secs: u64,
    pub feedback_cooldown_secs: u64,
    pub tick_interval_ms: u64,
    pub ledger_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub corpus_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text_type: TextType::Medium,
            starting_difficulty: Difficulty::default(),
            augment: true,
            feedback_interval_secs: 15,
            feedback_warmup_secs: 5,
            feedback_cooldown_secs: 10,
            tick_interval_ms: 100,
            ledger_path: None,
            model_path: None,
            corpus_path: None,
        }
    }
}

impl Config {
    pub fn feedback(&self) -> FeedbackSettings {
        FeedbackSettings {
            interval: Duration::from_secs(self.feedback_interval_secs),
            warmup: Duration::from_secs(self.feedback_warmup_secs),
            cooldown: Duration::from_secs(self.feedback_cooldown_secs),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path.clone().unwrap_or_else(AppDirs::ledger_path)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_path.clone().unwrap_or_else(AppDirs::model_path)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
            warn!("ignoring unreadable config {}: {}", self.path.display(), e);
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(cfg)?;
        write_atomic(&self.path, &data)
    }
}
