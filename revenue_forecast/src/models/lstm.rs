//! Single-layer LSTM regressor trained with backpropagation through time
//!
//! The network reads a scaled lookback window one value per step and predicts
//! the next scaled value from the final hidden state through a linear head.
//! Training uses mini-batch Adam with early stopping and a plateau learning
//! rate schedule.

use crate::error::{ForecastError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info};

/// Offsets of each weight block inside the flat parameter vector.
///
/// Gate rows are ordered input, forget, candidate, output; each block of
/// recurrent weights is row-major with `hidden` columns.
#[derive(Debug, Clone, Copy)]
struct Layout {
    hidden: usize,
}

impl Layout {
    fn gates(&self) -> usize {
        4 * self.hidden
    }

    fn w_input(&self) -> Range<usize> {
        0..self.gates()
    }

    fn w_recurrent(&self) -> Range<usize> {
        let start = self.gates();
        start..start + self.gates() * self.hidden
    }

    fn bias(&self) -> Range<usize> {
        let start = self.w_recurrent().end;
        start..start + self.gates()
    }

    fn w_output(&self) -> Range<usize> {
        let start = self.bias().end;
        start..start + self.hidden
    }

    fn b_output(&self) -> usize {
        self.w_output().end
    }

    fn len(&self) -> usize {
        self.b_output() + 1
    }
}

/// LSTM cell with a dense output head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmNetwork {
    hidden: usize,
    params: Vec<f64>,
}

/// Activations recorded at one time step for the backward pass
struct StepCache {
    x: f64,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    gates: Vec<f64>,
    tanh_c: Vec<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LstmNetwork {
    /// Glorot-uniform initialization with the forget-gate bias set to one
    pub fn new<R: Rng + ?Sized>(hidden: usize, rng: &mut R) -> Result<Self> {
        if hidden == 0 {
            return Err(ForecastError::InvalidParameter(
                "LSTM needs at least one hidden unit".to_string(),
            ));
        }
        let layout = Layout { hidden };
        let mut params = vec![0.0; layout.len()];

        let glorot = |fan_in: usize, fan_out: usize| (6.0 / (fan_in + fan_out) as f64).sqrt();
        let input_limit = glorot(1, layout.gates());
        let recurrent_limit = glorot(hidden, layout.gates());
        let output_limit = glorot(hidden, 1);

        for p in &mut params[layout.w_input()] {
            *p = rng.gen_range(-input_limit..input_limit);
        }
        for p in &mut params[layout.w_recurrent()] {
            *p = rng.gen_range(-recurrent_limit..recurrent_limit);
        }
        let bias = layout.bias();
        for p in &mut params[bias.start + hidden..bias.start + 2 * hidden] {
            *p = 1.0;
        }
        for p in &mut params[layout.w_output()] {
            *p = rng.gen_range(-output_limit..output_limit);
        }

        Ok(Self { hidden, params })
    }

    /// Number of hidden units
    pub fn hidden_units(&self) -> usize {
        self.hidden
    }

    /// Number of trainable parameters
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Check structural consistency after deserialization
    pub fn validate(&self) -> Result<()> {
        let expected = Layout { hidden: self.hidden }.len();
        if self.hidden == 0 || self.params.len() != expected {
            return Err(ForecastError::SerializationError(format!(
                "LSTM with {} hidden units needs {} parameters, found {}",
                self.hidden,
                expected,
                self.params.len()
            )));
        }
        if self.params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::SerializationError(
                "LSTM parameters contain non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Predict the next scaled value after `window`
    pub fn predict(&self, window: &[f64]) -> f64 {
        self.forward(window, None)
    }

    fn layout(&self) -> Layout {
        Layout { hidden: self.hidden }
    }

    /// Run the cell over `window`, optionally recording activations
    fn forward(&self, window: &[f64], mut caches: Option<&mut Vec<StepCache>>) -> f64 {
        let layout = self.layout();
        let hidden = self.hidden;
        let w_input = &self.params[layout.w_input()];
        let w_recurrent = &self.params[layout.w_recurrent()];
        let bias = &self.params[layout.bias()];

        let mut h = vec![0.0; hidden];
        let mut c = vec![0.0; hidden];

        for &x in window {
            let mut gates = vec![0.0; layout.gates()];
            for (r, z) in gates.iter_mut().enumerate() {
                let row = &w_recurrent[r * hidden..(r + 1) * hidden];
                *z = w_input[r] * x + bias[r] + row.iter().zip(&h).map(|(w, h)| w * h).sum::<f64>();
            }
            for k in 0..hidden {
                gates[k] = sigmoid(gates[k]);
                gates[hidden + k] = sigmoid(gates[hidden + k]);
                gates[2 * hidden + k] = gates[2 * hidden + k].tanh();
                gates[3 * hidden + k] = sigmoid(gates[3 * hidden + k]);
            }

            let mut c_next = vec![0.0; hidden];
            let mut tanh_c = vec![0.0; hidden];
            let mut h_next = vec![0.0; hidden];
            for k in 0..hidden {
                c_next[k] = gates[hidden + k] * c[k] + gates[k] * gates[2 * hidden + k];
                tanh_c[k] = c_next[k].tanh();
                h_next[k] = gates[3 * hidden + k] * tanh_c[k];
            }

            if let Some(caches) = caches.as_deref_mut() {
                caches.push(StepCache {
                    x,
                    h_prev: std::mem::take(&mut h),
                    c_prev: std::mem::take(&mut c),
                    gates,
                    tanh_c,
                });
            }
            h = h_next;
            c = c_next;
        }

        let w_output = &self.params[layout.w_output()];
        self.params[layout.b_output()] + w_output.iter().zip(&h).map(|(w, h)| w * h).sum::<f64>()
    }

    /// Accumulate into `grads` the gradient of the loss given `d_output = dL/dy`
    fn backward(&self, caches: &[StepCache], final_h: &[f64], d_output: f64, grads: &mut [f64]) {
        let layout = self.layout();
        let hidden = self.hidden;
        let w_recurrent = &self.params[layout.w_recurrent()];
        let w_output = &self.params[layout.w_output()];

        let out_range = layout.w_output();
        for (g, h) in grads[out_range].iter_mut().zip(final_h) {
            *g += d_output * h;
        }
        grads[layout.b_output()] += d_output;

        let mut dh: Vec<f64> = w_output.iter().map(|w| w * d_output).collect();
        let mut dc = vec![0.0; hidden];
        let mut dz = vec![0.0; layout.gates()];

        for step in caches.iter().rev() {
            let gates = &step.gates;
            for k in 0..hidden {
                let i = gates[k];
                let f = gates[hidden + k];
                let g = gates[2 * hidden + k];
                let o = gates[3 * hidden + k];
                let tc = step.tanh_c[k];

                dc[k] += dh[k] * o * (1.0 - tc * tc);
                dz[k] = dc[k] * g * i * (1.0 - i);
                dz[hidden + k] = dc[k] * step.c_prev[k] * f * (1.0 - f);
                dz[2 * hidden + k] = dc[k] * i * (1.0 - g * g);
                dz[3 * hidden + k] = dh[k] * tc * o * (1.0 - o);
                dc[k] *= f;
            }

            let w_in_start = layout.w_input().start;
            let rec_start = layout.w_recurrent().start;
            let bias_start = layout.bias().start;
            let mut dh_prev = vec![0.0; hidden];
            for (r, &d) in dz.iter().enumerate() {
                if d == 0.0 {
                    continue;
                }
                grads[w_in_start + r] += d * step.x;
                grads[bias_start + r] += d;
                let row = r * hidden;
                for j in 0..hidden {
                    grads[rec_start + row + j] += d * step.h_prev[j];
                    dh_prev[j] += w_recurrent[row + j] * d;
                }
            }
            dh = dh_prev;
        }
    }

    /// Final hidden state recovered from the last cached step
    fn final_hidden(&self, caches: &[StepCache]) -> Vec<f64> {
        let hidden = self.hidden;
        match caches.last() {
            Some(step) => (0..hidden)
                .map(|k| step.gates[3 * hidden + k] * step.tanh_c[k])
                .collect(),
            None => vec![0.0; hidden],
        }
    }

    /// Mean squared error over `samples`
    pub fn loss(&self, samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples
            .iter()
            .map(|s| (self.predict(&s.window) - s.target).powi(2))
            .sum::<f64>()
            / samples.len() as f64
    }

    /// Gradient of the batch MSE with respect to every parameter
    fn batch_gradient(&self, batch: &[&Sample]) -> Vec<f64> {
        let mut grads = vec![0.0; self.params.len()];
        let scale = 2.0 / batch.len() as f64;
        let mut caches = Vec::new();
        for sample in batch {
            caches.clear();
            let y = self.forward(&sample.window, Some(&mut caches));
            let final_h = self.final_hidden(&caches);
            self.backward(&caches, &final_h, scale * (y - sample.target), &mut grads);
        }
        grads
    }
}

/// One supervised example: a scaled window and the value that followed it
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Scaled lookback window
    pub window: Vec<f64>,
    /// Scaled next value
    pub target: f64,
}

/// Build sliding-window samples: input `scaled[i-w..i]`, target `scaled[i]`
pub fn sliding_windows(scaled: &[f64], width: usize) -> Vec<Sample> {
    (width..scaled.len())
        .map(|i| Sample {
            window: scaled[i - width..i].to_vec(),
            target: scaled[i],
        })
        .collect()
}

/// Optimizer and regularization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    /// Maximum passes over the training windows
    pub epochs: usize,
    /// Windows per gradient step
    pub batch_size: usize,
    /// Trailing fraction of windows held out for early stopping
    pub validation_split: f64,
    /// Initial Adam step size
    pub learning_rate: f64,
    /// Epochs without improvement before training stops
    pub patience: usize,
    /// Epochs without improvement before the learning rate decays
    pub lr_patience: usize,
    /// Learning rate multiplier on plateau
    pub lr_factor: f64,
    /// Learning rate floor
    pub min_learning_rate: f64,
    /// Global gradient-norm clip
    pub clip_norm: f64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 0.005,
            patience: 10,
            lr_patience: 5,
            lr_factor: 0.2,
            min_learning_rate: 1e-4,
            clip_norm: 1.0,
        }
    }
}

impl TrainingOptions {
    /// Reject settings that cannot train
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ForecastError::InvalidParameter(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.min_learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rates must be positive".to_string(),
            ));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "lr_factor must be in (0, 1), got {}",
                self.lr_factor
            )));
        }
        if !(self.clip_norm > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "clip_norm must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-epoch record of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Mean squared error on the training windows
    pub train_loss: Vec<f64>,
    /// Mean squared error on the monitored windows
    pub val_loss: Vec<f64>,
    /// Learning rate used during each epoch
    pub learning_rate: Vec<f64>,
    /// Epoch (0-based) whose weights were kept
    pub best_epoch: usize,
    /// Whether early stopping ended training
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Number of completed epochs
    pub fn epochs_run(&self) -> usize {
        self.train_loss.len()
    }

    /// Monitored loss of the kept weights
    pub fn best_loss(&self) -> Option<f64> {
        self.val_loss.get(self.best_epoch).copied()
    }
}

/// Adam optimizer state
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-7;

    fn new(size: usize) -> Self {
        Self {
            m: vec![0.0; size],
            v: vec![0.0; size],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64], learning_rate: f64) {
        self.t += 1;
        let correction1 = 1.0 - Self::BETA1.powi(self.t);
        let correction2 = 1.0 - Self::BETA2.powi(self.t);
        for (k, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            self.m[k] = Self::BETA1 * self.m[k] + (1.0 - Self::BETA1) * g;
            self.v[k] = Self::BETA2 * self.v[k] + (1.0 - Self::BETA2) * g * g;
            let m_hat = self.m[k] / correction1;
            let v_hat = self.v[k] / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + Self::EPSILON);
        }
    }
}

fn clip_gradient(grads: &mut [f64], max_norm: f64) {
    let norm = grads.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        grads.iter_mut().for_each(|g| *g *= scale);
    }
}

/// Number of trailing windows held out for validation.
///
/// Keeps at least one training window.
pub fn validation_size(samples: usize, validation_split: f64) -> usize {
    if samples < 2 {
        return 0;
    }
    let train = ((samples as f64 * (1.0 - validation_split)).floor() as usize).max(1);
    samples - train.min(samples)
}

/// Train `network` on `samples`, returning the best weights seen.
pub fn train<R: Rng + ?Sized>(
    mut network: LstmNetwork,
    samples: &[Sample],
    options: &TrainingOptions,
    rng: &mut R,
) -> Result<(LstmNetwork, TrainingHistory)> {
    options.validate()?;
    if samples.is_empty() {
        return Err(ForecastError::InsufficientDataError(
            "No training windows available".to_string(),
        ));
    }

    let n_val = validation_size(samples.len(), options.validation_split);
    let (train_set, val_set) = samples.split_at(samples.len() - n_val);
    let monitored = if val_set.is_empty() { train_set } else { val_set };

    let mut adam = Adam::new(network.params.len());
    let mut learning_rate = options.learning_rate;
    let mut history = TrainingHistory::default();
    let mut best = (f64::INFINITY, network.params.clone());
    let mut stale_epochs = 0;
    let mut plateau_epochs = 0;
    let mut order: Vec<usize> = (0..train_set.len()).collect();

    for epoch in 0..options.epochs {
        order.shuffle(rng);
        for chunk in order.chunks(options.batch_size) {
            let batch: Vec<&Sample> = chunk.iter().map(|&i| &train_set[i]).collect();
            let mut grads = network.batch_gradient(&batch);
            if grads.iter().any(|g| !g.is_finite()) {
                return Err(ForecastError::TrainingError(format!(
                    "Non-finite gradient at epoch {}",
                    epoch + 1
                )));
            }
            clip_gradient(&mut grads, options.clip_norm);
            adam.step(&mut network.params, &grads, learning_rate);
        }

        let train_loss = network.loss(train_set);
        let val_loss = network.loss(monitored);
        if !train_loss.is_finite() || !val_loss.is_finite() {
            return Err(ForecastError::TrainingError(format!(
                "Loss became non-finite at epoch {}",
                epoch + 1
            )));
        }

        history.train_loss.push(train_loss);
        history.val_loss.push(val_loss);
        history.learning_rate.push(learning_rate);
        debug!(epoch = epoch + 1, train_loss, val_loss, learning_rate, "lstm epoch");

        if val_loss < best.0 {
            best = (val_loss, network.params.clone());
            history.best_epoch = epoch;
            stale_epochs = 0;
            plateau_epochs = 0;
            continue;
        }

        stale_epochs += 1;
        plateau_epochs += 1;
        if plateau_epochs >= options.lr_patience && learning_rate > options.min_learning_rate {
            learning_rate = (learning_rate * options.lr_factor).max(options.min_learning_rate);
            plateau_epochs = 0;
            debug!(epoch = epoch + 1, learning_rate, "reduced learning rate on plateau");
        }
        if stale_epochs >= options.patience {
            history.stopped_early = true;
            break;
        }
    }

    network.params = best.1;
    if network.params.iter().any(|p| !p.is_finite()) {
        return Err(ForecastError::TrainingError(
            "Training produced non-finite weights".to_string(),
        ));
    }

    info!(
        epochs = history.epochs_run(),
        best_epoch = history.best_epoch + 1,
        best_loss = best.0,
        stopped_early = history.stopped_early,
        train_windows = train_set.len(),
        validation_windows = val_set.len(),
        "lstm training finished"
    );

    Ok((network, history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(hidden: usize) -> LstmNetwork {
        LstmNetwork::new(hidden, &mut StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn test_layout_size() {
        let net = network(3);
        // 4H input weights + 4H*H recurrent + 4H bias + H output + 1 output bias
        assert_eq!(net.parameter_count(), 12 + 36 + 12 + 3 + 1);
        assert!(net.validate().is_ok());
    }

    #[test]
    fn test_zero_window_predicts_output_bias() {
        let net = network(4);
        assert_eq!(net.predict(&[0.0; 12]), 0.0);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut net = network(3);
        let sample = Sample {
            window: vec![0.1, 0.5, 0.3, 0.9],
            target: 0.7,
        };
        let analytic = net.batch_gradient(&[&sample]);

        let h = 1e-6;
        for k in (0..net.parameter_count()).step_by(5) {
            let original = net.params[k];
            net.params[k] = original + h;
            let plus = net.loss(std::slice::from_ref(&sample));
            net.params[k] = original - h;
            let minus = net.loss(std::slice::from_ref(&sample));
            net.params[k] = original;

            let numeric = (plus - minus) / (2.0 * h);
            assert_abs_diff_eq!(analytic[k], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sliding_windows() {
        let samples = sliding_windows(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].window, vec![1.0, 2.0, 3.0]);
        assert_eq!(samples[0].target, 4.0);
        assert_eq!(samples[1].target, 5.0);
    }

    #[test]
    fn test_validation_size() {
        assert_eq!(validation_size(12, 0.2), 3);
        assert_eq!(validation_size(1, 0.2), 0);
        assert_eq!(validation_size(2, 0.9), 1);
        assert_eq!(validation_size(10, 0.0), 0);
    }

    #[test]
    fn test_training_reduces_loss() {
        let series: Vec<f64> = (0..48)
            .map(|i| 0.5 + 0.4 * (i as f64 * std::f64::consts::PI / 6.0).sin())
            .collect();
        let samples = sliding_windows(&series, 6);
        let mut rng = StdRng::seed_from_u64(11);
        let net = LstmNetwork::new(8, &mut rng).unwrap();
        let initial = net.loss(&samples);

        let options = TrainingOptions {
            epochs: 60,
            batch_size: 8,
            learning_rate: 0.01,
            ..TrainingOptions::default()
        };
        let (trained, history) = train(net, &samples, &options, &mut rng).unwrap();

        assert!(history.epochs_run() > 0);
        assert!(trained.loss(&samples) < initial);
    }

    #[test]
    fn test_rejects_invalid_options() {
        let options = TrainingOptions {
            validation_split: 1.0,
            ..TrainingOptions::default()
        };
        let samples = sliding_windows(&[0.0, 0.5, 1.0, 0.5], 2);
        let result = train(network(2), &samples, &options, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}
