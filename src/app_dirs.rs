use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "typewise";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/typewise`, or the platform data dir when HOME is unset.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn ledger_path() -> PathBuf {
        Self::state_dir()
            .map(|dir| dir.join("stats.json"))
            .unwrap_or_else(|| PathBuf::from("typewise_stats.json"))
    }

    pub fn model_path() -> PathBuf {
        Self::state_dir()
            .map(|dir| dir.join("model.json"))
            .unwrap_or_else(|| PathBuf::from("typewise_model.json"))
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("typewise_config.json"))
    }
}
