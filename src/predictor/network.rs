//! Small fully connected regression network (3 → 16 → 8 → 1, ReLU hidden
//! layers, linear output) trained one sample at a time with plain SGD.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{DifficultyModel, Features};
use crate::error::PredictionError;

const LAYER_SIZES: [usize; 4] = [Features::LEN, 16, 8, 1];
const INIT_SEED: u64 = 0x7e57_ab1e;
const DEFAULT_LEARNING_RATE: f64 = 0.01;
const GRADIENT_CLIP: f64 = 10.0;
/// Output bias of a fresh network, so an untrained model leans toward normal difficulty.
const OUTPUT_BIAS: f64 = 2.0;

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    /// `weights[out][in]`
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    relu: bool,
}

impl Layer {
    fn random(inputs: usize, outputs: usize, relu: bool, rng: &mut StdRng) -> Self {
        let limit = (6.0 / inputs as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            biases: vec![0.0; outputs],
            relu,
        }
    }

    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let z = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias;
                if self.relu {
                    z.max(0.0)
                } else {
                    z
                }
            })
            .collect()
    }

    fn is_finite(&self) -> bool {
        self.biases.iter().all(|b| b.is_finite())
            && self.weights.iter().flatten().all(|w| w.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    layers: Vec<Layer>,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
}

impl MlpModel {
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Activations of every layer, input first.
    fn activations(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(input.to_vec());
        for layer in &self.layers {
            let next = layer.forward(acts.last().map(Vec::as_slice).unwrap_or(&[]));
            acts.push(next);
        }
        acts
    }

    fn output(acts: &[Vec<f64>]) -> Result<f64, PredictionError> {
        let out = acts
            .last()
            .and_then(|a| a.first())
            .copied()
            .ok_or(PredictionError::ShapeMismatch {
                expected: 1,
                found: 0,
            })?;
        if out.is_finite() {
            Ok(out)
        } else {
            Err(PredictionError::NonFinite)
        }
    }
}

impl DifficultyModel for MlpModel {
    fn fresh() -> Self {
        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let last = LAYER_SIZES.len() - 2;
        let mut layers: Vec<Layer> = LAYER_SIZES
            .windows(2)
            .enumerate()
            .map(|(i, w)| Layer::random(w[0], w[1], i < last, &mut rng))
            .collect();
        if let Some(out) = layers.last_mut() {
            out.biases.iter_mut().for_each(|b| *b = OUTPUT_BIAS);
        }
        Self {
            layers,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    fn estimate(&self, features: &Features) -> Result<f64, PredictionError> {
        self.validate()?;
        Self::output(&self.activations(&features.normalized()))
    }

    fn train(&mut self, features: &Features, target: f64) -> Result<(), PredictionError> {
        self.validate()?;
        let acts = self.activations(&features.normalized());
        let output = Self::output(&acts)?;

        // Work on a copy so a diverging step leaves the model untouched.
        let mut next = self.clone();
        let mut delta = vec![(2.0 * (output - target)).clamp(-GRADIENT_CLIP, GRADIENT_CLIP)];

        for (idx, layer) in next.layers.iter_mut().enumerate().rev() {
            let input = &acts[idx];
            let prev_delta: Vec<f64> = (0..layer.inputs())
                .map(|i| {
                    let back: f64 = layer
                        .weights
                        .iter()
                        .zip(&delta)
                        .map(|(row, d)| row[i] * d)
                        .sum();
                    // inputs to every layer but the first are ReLU outputs
                    if idx > 0 && input[i] <= 0.0 {
                        0.0
                    } else {
                        back.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
                    }
                })
                .collect();

            for (j, d) in delta.iter().enumerate() {
                for (w, x) in layer.weights[j].iter_mut().zip(input) {
                    *w -= self.learning_rate * d * x;
                }
                layer.biases[j] -= self.learning_rate * d;
            }
            delta = prev_delta;
        }

        if !next.layers.iter().all(Layer::is_finite) {
            return Err(PredictionError::NonFinite);
        }
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<(), PredictionError> {
        let mut expected = Features::LEN;
        for layer in &self.layers {
            if layer.weights.len() != layer.biases.len()
                || layer.weights.iter().any(|row| row.len() != expected)
            {
                return Err(PredictionError::ShapeMismatch {
                    expected,
                    found: layer.inputs(),
                });
            }
            if !layer.is_finite() {
                return Err(PredictionError::NonFinite);
            }
            expected = layer.biases.len();
        }
        if self.layers.is_empty() || expected != 1 {
            return Err(PredictionError::ShapeMismatch {
                expected: 1,
                found: expected,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Features {
        Features::new(55.0, 96.0, 0.21)
    }

    #[test]
    fn fresh_model_is_valid_and_deterministic() {
        let a = MlpModel::fresh();
        let b = MlpModel::fresh();
        assert!(a.validate().is_ok());
        assert_eq!(a, b);
        assert!(a.estimate(&features()).unwrap().is_finite());
    }

    #[test]
    fn training_moves_estimate_toward_target() {
        let mut model = MlpModel::fresh();
        let f = features();
        let target = 4.0;
        let before = (model.estimate(&f).unwrap() - target).abs();
        for _ in 0..50 {
            model.train(&f, target).unwrap();
        }
        let after = (model.estimate(&f).unwrap() - target).abs();
        assert!(after < before, "error went from {before} to {after}");
    }

    #[test]
    fn rejects_wrong_shape() {
        let mut model = MlpModel::fresh();
        model.layers[0].weights[0].push(1.0);
        assert!(matches!(
            model.estimate(&features()),
            Err(PredictionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_parameters() {
        let mut model = MlpModel::fresh();
        model.layers[1].biases[0] = f64::NAN;
        assert_eq!(model.estimate(&features()), Err(PredictionError::NonFinite));
    }

    #[test]
    fn diverging_step_leaves_model_untouched() {
        let mut model = MlpModel::fresh().with_learning_rate(f64::MAX);
        let before = model.clone();
        assert_eq!(
            model.train(&features(), 5.0),
            Err(PredictionError::NonFinite)
        );
        assert_eq!(model, before);
    }

    #[test]
    fn serde_roundtrip_preserves_estimates() {
        let model = MlpModel::fresh();
        let json = serde_json::to_string(&model).unwrap();
        let back: MlpModel = serde_json::from_str(&json).unwrap();
        assert_eq!(
            model.estimate(&features()).unwrap(),
            back.estimate(&features()).unwrap()
        );
    }
}
