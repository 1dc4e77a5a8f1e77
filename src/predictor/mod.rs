pub mod network;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PredictionError, StoreError};
use crate::session::Difficulty;
use crate::stats::{write_atomic, SessionRecord};

pub use network::MlpModel;

/// Sessions that must be on record before predictions are damped.
const SMOOTHING_MIN_SESSIONS: usize = 3;

/// Input contract of every difficulty model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub wpm: f64,
    pub accuracy: f64,
    pub reaction_time: f64,
}

impl Features {
    pub const LEN: usize = 3;

    pub fn new(wpm: f64, accuracy: f64, reaction_time: f64) -> Self {
        Self {
            wpm,
            accuracy,
            reaction_time,
        }
    }

    /// Features scaled to roughly unit range for the network.
    pub fn normalized(&self) -> [f64; Self::LEN] {
        [self.wpm / 100.0, self.accuracy / 100.0, self.reaction_time]
    }
}

/// A regression technique that maps recent performance to a raw difficulty estimate.
///
/// Implementations are persisted as an opaque serde blob.
pub trait DifficultyModel: Serialize + DeserializeOwned {
    /// An untrained model.
    fn fresh() -> Self;

    fn estimate(&self, features: &Features) -> Result<f64, PredictionError>;

    /// One incremental training step toward `target`.
    fn train(&mut self, features: &Features, target: f64) -> Result<(), PredictionError>;

    /// Reject a loaded blob that cannot be used.
    fn validate(&self) -> Result<(), PredictionError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recommendation {
    pub difficulty: Difficulty,
    pub source: RecommendationSource,
}

/// Learned difficulty predictor with a deterministic fallback.
#[derive(Debug)]
pub struct DifficultyPredictor<M: DifficultyModel = MlpModel> {
    model: M,
    path: Option<PathBuf>,
}

impl<M: DifficultyModel> DifficultyPredictor<M> {
    /// Load the model stored at `path`, or start fresh when it is missing or unusable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let model = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<M>(&bytes) {
                Ok(model) => match model.validate() {
                    Ok(()) => {
                        info!("loaded difficulty model from {}", path.display());
                        model
                    }
                    Err(e) => {
                        warn!("difficulty model {} rejected: {}", path.display(), e);
                        M::fresh()
                    }
                },
                Err(e) => {
                    warn!("difficulty model {} is corrupt: {}", path.display(), e);
                    M::fresh()
                }
            },
            Err(_) => {
                info!("created new difficulty model");
                M::fresh()
            }
        };
        Self {
            model,
            path: Some(path),
        }
    }

    /// A fresh predictor whose `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::with_model(M::fresh(), None)
    }

    pub fn with_model(model: M, path: Option<PathBuf>) -> Self {
        Self { model, path }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw model output.
    pub fn estimate(&self, features: &Features) -> Result<f64, PredictionError> {
        self.model.estimate(features)
    }

    /// Model output rounded to the nearest level and clamped to `[1, 5]`.
    pub fn predict(&self, features: &Features) -> Result<Difficulty, PredictionError> {
        self.estimate(features).map(Difficulty::from_estimate)
    }

    /// One training step. Failures are logged and the model is left as it was.
    pub fn update(&mut self, features: &Features, observed: Difficulty) {
        match self.model.train(features, observed.level() as f64) {
            Ok(()) => debug!("difficulty model updated toward level {}", observed.level()),
            Err(e) => warn!("difficulty model update failed: {}", e),
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let data = serde_json::to_vec(&self.model)?;
        write_atomic(path, &data)
    }

    /// Next difficulty after a session played at `current`.
    ///
    /// `sessions` is the ledger including the session just finished. The
    /// model answer is damped by [`smooth`]; if the model fails the
    /// deterministic [`fallback_difficulty`] rule is used instead.
    pub fn recommend(
        &self,
        features: &Features,
        current: Difficulty,
        sessions: &[SessionRecord],
    ) -> Recommendation {
        let (raw, source) = match self.predict(features) {
            Ok(d) => (d, RecommendationSource::Model),
            Err(e) => {
                warn!("difficulty prediction failed, using fallback rule: {}", e);
                (
                    fallback_difficulty(current, features.wpm, features.accuracy),
                    RecommendationSource::Fallback,
                )
            }
        };
        Recommendation {
            difficulty: smooth(raw, sessions),
            source,
        }
    }
}

/// Heuristic used when no model answer is available.
pub fn fallback_difficulty(current: Difficulty, wpm: f64, accuracy: f64) -> Difficulty {
    if accuracy > 95.0 && wpm > 50.0 {
        current.harder()
    } else if accuracy < 85.0 || wpm < 30.0 {
        current.easier()
    } else {
        current
    }
}

/// Limit the change to one step from the session before the one just
/// finished, once more than three sessions are on record.
///
/// `sessions` must already contain the session just finished as its last entry.
pub fn smooth(predicted: Difficulty, sessions: &[SessionRecord]) -> Difficulty {
    if sessions.len() <= SMOOTHING_MIN_SESSIONS {
        return predicted;
    }
    let Some(previous) = sessions.iter().rev().nth(1).map(|s| s.difficulty) else {
        return predicted;
    };
    if predicted.level().abs_diff(previous.level()) > 1 {
        if predicted > previous {
            previous.harder()
        } else {
            previous.easier()
        }
    } else {
        predicted
    }
}
