//! Simulated-annealing (Metropolis) trainer.
//!
//! Explores hidden-state space with Metropolis-Hastings proposals under a
//! geometrically cooling temperature, and contrasts the annealed state
//! against fresh data samples for occasional small, clamped weight updates.
//! Far more expensive per update than CD, so the dataset is subsampled and
//! the epoch count capped.

use log::{debug, info, warn};
use ndarray::{Array1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;

use super::{FitReport, TrainSession};
use crate::error::Result;
use crate::model::RbmModel;

/// Number of hidden units flipped per proposal (capped by the layer size).
const FLIPS_PER_PROPOSAL: usize = 3;

/// Configuration for the annealing schedule and its stability clamps.
///
/// The temperature constants are empirically chosen for stability, not
/// derived; override them freely. The clamps are not tuning knobs: they are
/// the mechanism that keeps a noisy Metropolis estimate from diverging.
#[derive(Debug, Clone)]
pub struct AnnealingConfig {
    /// Starting temperature
    pub initial_temperature: f64,
    /// The run stops once temperature falls to this value
    pub final_temperature: f64,
    /// Multiplicative cooling applied after each proposal batch
    pub cooling_rate: f64,
    /// Proposals per temperature step
    pub steps_per_temperature: usize,
    /// Apply a weight update every this many accepted moves
    pub update_interval: u64,
    /// Effective learning rate, much smaller than the CD rate
    pub learning_rate: f64,
    /// Per-element update magnitude bound
    pub update_clamp: f64,
    /// Weight magnitude bound
    pub weight_bound: f64,
    /// Bias magnitude bound
    pub bias_bound: f64,
    /// At most this many samples are drawn from the dataset
    pub max_samples: usize,
    /// Epoch cap for this method
    pub max_epochs: usize,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 10.0,
            final_temperature: 0.1,
            cooling_rate: 0.99,
            steps_per_temperature: 100,
            update_interval: 10,
            learning_rate: 0.005,
            update_clamp: 0.01,
            weight_bound: 2.0,
            bias_bound: 1.0,
            max_samples: 50,
            max_epochs: 2,
        }
    }
}

impl AnnealingConfig {
    /// Set the temperature range.
    pub fn temperatures(mut self, initial: f64, final_: f64) -> Self {
        self.initial_temperature = initial;
        self.final_temperature = final_;
        self
    }

    /// Set the cooling rate.
    pub fn cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    /// Set the number of proposals per temperature step.
    pub fn steps_per_temperature(mut self, steps: usize) -> Self {
        self.steps_per_temperature = steps;
        self
    }

    /// Set the dataset subsample cap.
    pub fn max_samples(mut self, max: usize) -> Self {
        self.max_samples = max;
        self
    }

    /// Set the epoch cap.
    pub fn max_epochs(mut self, max: usize) -> Self {
        self.max_epochs = max;
        self
    }
}

/// Acceptance diagnostics for one annealing run. Tracked for inspection
/// only; termination is governed by the temperature schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnealingStats {
    /// Total proposals considered
    pub iterations: u64,
    /// Accepted moves
    pub accepted: u64,
    /// Accepted moves that strictly lowered the energy
    pub energy_decreases: u64,
    /// Steps skipped because an energy came out non-finite
    pub nonfinite_skipped: u64,
}

impl AnnealingStats {
    /// Fraction of proposals accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted as f64 / self.iterations as f64
        }
    }
}

/// Metropolis criterion: always accept a non-increasing energy move,
/// otherwise accept with probability `exp(-delta / temperature)`.
fn accept<R: Rng>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp()
}

pub(super) fn train(
    model: &mut RbmModel,
    samples: ArrayView2<'_, f64>,
    epochs: usize,
    session: &mut TrainSession,
) -> Result<FitReport> {
    let config = session.annealing.clone();
    let total_epochs = epochs.min(config.max_epochs.max(1));
    let update_interval = config.update_interval.max(1);

    // Reduced-dataset policy: a shuffled subset, not the full collection.
    let mut subset: Vec<usize> = (0..samples.nrows()).collect();
    subset.shuffle(&mut session.rng);
    subset.truncate(config.max_samples.max(1));

    info!(
        "annealing: {} epochs over {} samples, T {} -> {} (cooling {})",
        total_epochs,
        subset.len(),
        config.initial_temperature,
        config.final_temperature,
        config.cooling_rate
    );

    let flips = FLIPS_PER_PROPOSAL.min(model.hidden_size);
    let mut stats = AnnealingStats::default();
    let mut report = FitReport {
        method: model.method,
        epochs_completed: 0,
        total_epochs,
        cancelled: false,
        annealing: None,
    };

    'epochs: for epoch in 1..=total_epochs {
        if session.is_cancelled() {
            report.cancelled = true;
            break;
        }

        // Anneal state: a random data sample with its binary hidden sample.
        let start = subset[session.rng.gen_range(0..subset.len())];
        let mut current_visible = samples.row(start).to_owned();
        let mut current_hidden = model.binary_hidden(&current_visible, &mut session.rng);
        let mut current_energy = model.energy(&current_visible, &current_hidden);

        let mut temperature = config.initial_temperature;
        while temperature > config.final_temperature {
            for _ in 0..config.steps_per_temperature {
                stats.iterations += 1;

                // Propose: flip a few hidden units on a copy, then resample
                // the visible layer from the proposal. The current state is
                // never aliased.
                let mut proposed_hidden = current_hidden.clone();
                for idx in rand::seq::index::sample(&mut session.rng, model.hidden_size, flips) {
                    proposed_hidden[idx] = 1.0 - proposed_hidden[idx];
                }
                let proposed_visible = model.binary_visible(&proposed_hidden, &mut session.rng);
                let proposed_energy = model.energy(&proposed_visible, &proposed_hidden);

                if !current_energy.is_finite() || !proposed_energy.is_finite() {
                    // Divergence guard: never fold a non-finite state into
                    // the parameters.
                    stats.nonfinite_skipped += 1;
                    if stats.nonfinite_skipped == 1 {
                        warn!("non-finite energy during annealing, skipping step");
                    }
                    continue;
                }

                let delta = proposed_energy - current_energy;
                if accept(delta, temperature, &mut session.rng) {
                    if delta < 0.0 {
                        stats.energy_decreases += 1;
                    }
                    current_visible = proposed_visible;
                    current_hidden = proposed_hidden;
                    current_energy = proposed_energy;
                    stats.accepted += 1;

                    if stats.accepted % update_interval == 0 {
                        let data_idx = subset[session.rng.gen_range(0..subset.len())];
                        apply_update(
                            model,
                            &samples.row(data_idx).to_owned(),
                            &current_visible,
                            &current_hidden,
                            &config,
                        );
                        current_energy = model.energy(&current_visible, &current_hidden);
                    }
                }
            }

            temperature *= config.cooling_rate;
            if session.is_cancelled() {
                report.cancelled = true;
                break 'epochs;
            }
        }

        report.epochs_completed = epoch;
        debug!(
            "annealing epoch {}/{}: acceptance {:.3}, {} energy decreases",
            epoch,
            total_epochs,
            stats.acceptance_rate(),
            stats.energy_decreases
        );
        session.report_epoch(epoch, total_epochs);
    }

    report.annealing = Some(stats);
    Ok(report)
}

/// Small clamped gradient step: a fresh data sample's mean-field hidden
/// activation against the current annealed state. Every per-element update
/// and every resulting weight/bias is bounded.
fn apply_update(
    model: &mut RbmModel,
    data: &Array1<f64>,
    current_visible: &Array1<f64>,
    current_hidden: &Array1<f64>,
    config: &AnnealingConfig,
) {
    let pos_hidden = model.mean_field_hidden(data);
    let lr = config.learning_rate;
    let clamp = config.update_clamp;

    for j in 0..model.hidden_size {
        for i in 0..model.visible_size {
            let dw = (lr * (pos_hidden[j] * data[i] - current_hidden[j] * current_visible[i]))
                .clamp(-clamp, clamp);
            let w = (model.weights[[j, i]] + dw).clamp(-config.weight_bound, config.weight_bound);
            model.weights[[j, i]] = w;
        }
        let db = (lr * (pos_hidden[j] - current_hidden[j])).clamp(-clamp, clamp);
        model.hidden_bias[j] =
            (model.hidden_bias[j] + db).clamp(-config.bias_bound, config.bias_bound);
    }
    for i in 0..model.visible_size {
        let db = (lr * (data[i] - current_visible[i])).clamp(-clamp, clamp);
        model.visible_bias[i] =
            (model.visible_bias[i] + db).clamp(-config.bias_bound, config.bias_bound);
    }
}
