//! Equilibrium-sampling trainer.
//!
//! Implements the classical two-phase learning rule by driving a real Gibbs
//! chain toward the model's stationary distribution instead of taking the
//! one-step CD shortcut. The positive phase is the exact data statistic; the
//! negative phase averages binary chain states collected after a long
//! burn-in. Cost per batch is O(chain length x hidden x visible), so the
//! dataset is subsampled and the epoch count capped.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};
use rand::seq::SliceRandom;

use super::{add_outer, FitReport, TrainSession};
use crate::error::Result;
use crate::model::RbmModel;

/// Configuration for the equilibrium trainer.
///
/// Burn-in depth and step counts are empirical stability defaults; the
/// learning rate is fixed independently of the model's CD rate because the
/// long chain yields a lower-variance but burn-in-biased estimate.
#[derive(Debug, Clone)]
pub struct EquilibriumConfig {
    /// Gibbs steps discarded before statistics are collected
    pub burn_in: usize,
    /// Gibbs steps over which negative-phase statistics are averaged
    pub sample_steps: usize,
    /// Effective learning rate (independent of the model's learning rate)
    pub learning_rate: f64,
    /// Multiplicative weight decay applied after each update
    pub weight_decay: f64,
    /// Log the chain energy every this many burn-in steps
    pub log_interval: usize,
    /// At most this many samples are drawn from the dataset
    pub max_samples: usize,
    /// Epoch cap for this method
    pub max_epochs: usize,
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            burn_in: 2000,
            sample_steps: 300,
            learning_rate: 0.001,
            weight_decay: 0.99,
            log_interval: 500,
            max_samples: 50,
            max_epochs: 2,
        }
    }
}

impl EquilibriumConfig {
    /// Set the burn-in depth.
    pub fn burn_in(mut self, steps: usize) -> Self {
        self.burn_in = steps;
        self
    }

    /// Set the number of statistic-collection steps.
    pub fn sample_steps(mut self, steps: usize) -> Self {
        self.sample_steps = steps;
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

/// Batch statistics for one phase: outer product, hidden and visible means.
struct PhaseStats {
    weights: Array2<f64>,
    hidden: Array1<f64>,
    visible: Array1<f64>,
}

impl PhaseStats {
    fn zeros(hidden: usize, visible: usize) -> Self {
        Self {
            weights: Array2::zeros((hidden, visible)),
            hidden: Array1::zeros(hidden),
            visible: Array1::zeros(visible),
        }
    }

    fn accumulate(&mut self, hidden: &Array1<f64>, visible: &Array1<f64>) {
        add_outer(&mut self.weights, 1.0, hidden, visible);
        self.hidden += hidden;
        self.visible += visible;
    }

    fn scale(&mut self, factor: f64) {
        self.weights *= factor;
        self.hidden *= factor;
        self.visible *= factor;
    }
}

pub(super) fn train(
    model: &mut RbmModel,
    samples: ArrayView2<'_, f64>,
    epochs: usize,
    session: &mut TrainSession,
) -> Result<FitReport> {
    let config = session.equilibrium.clone();
    let total_epochs = epochs.min(config.max_epochs.max(1));

    let mut subset: Vec<usize> = (0..samples.nrows()).collect();
    subset.shuffle(&mut session.rng);
    subset.truncate(config.max_samples.max(1));

    let batch_size = model.batch_size.min(subset.len());
    let n_batches = (subset.len() / batch_size).max(1);

    info!(
        "equilibrium: {} epochs over {} samples, burn-in {}, {} collection steps",
        total_epochs,
        subset.len(),
        config.burn_in,
        config.sample_steps
    );

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

        subset.shuffle(&mut session.rng);
        for batch in subset.chunks(batch_size).take(n_batches) {
            update_batch(model, samples, batch, &config, session);
            if session.is_cancelled() {
                report.cancelled = true;
                break 'epochs;
            }
        }

        report.epochs_completed = epoch;
        session.report_epoch(epoch, total_epochs);
    }

    Ok(report)
}

fn update_batch(
    model: &mut RbmModel,
    samples: ArrayView2<'_, f64>,
    batch: &[usize],
    config: &EquilibriumConfig,
    session: &mut TrainSession,
) {
    // Positive phase: exact mean-field statistics over the data batch, no
    // sampling noise.
    let mut positive = PhaseStats::zeros(model.hidden_size, model.visible_size);
    for &idx in batch {
        let v = samples.row(idx).to_owned();
        let hidden_probs = model.mean_field_hidden(&v);
        positive.accumulate(&hidden_probs, &v);
    }
    positive.scale(1.0 / batch.len() as f64);

    // Negative phase: one chain from a batch sample, burned in, then
    // averaged over further binary Gibbs steps. Energy is logged while the
    // burn-in runs so a diverging chain shows up live, not after the fact.
    let mut visible = samples.row(batch[0]).to_owned();
    let mut hidden = model.binary_hidden(&visible, &mut session.rng);
    for step in 0..config.burn_in {
        visible = model.binary_visible(&hidden, &mut session.rng);
        hidden = model.binary_hidden(&visible, &mut session.rng);
        if config.log_interval > 0 && step % config.log_interval == 0 {
            debug!(
                "burn-in step {}: energy {:.4}",
                step,
                model.energy(&visible, &hidden)
            );
        }
    }

    let mut negative = PhaseStats::zeros(model.hidden_size, model.visible_size);
    let steps = config.sample_steps.max(1);
    for _ in 0..steps {
        visible = model.binary_visible(&hidden, &mut session.rng);
        hidden = model.binary_hidden(&visible, &mut session.rng);
        negative.accumulate(&hidden, &visible);
    }
    negative.scale(1.0 / steps as f64);

    // Two-phase update with multiplicative decay on the weights only.
    let lr = config.learning_rate;
    model.weights.scaled_add(lr, &positive.weights);
    model.weights.scaled_add(-lr, &negative.weights);
    model.weights *= config.weight_decay;

    model.hidden_bias.scaled_add(lr, &positive.hidden);
    model.hidden_bias.scaled_add(-lr, &negative.hidden);
    model.visible_bias.scaled_add(lr, &positive.visible);
    model.visible_bias.scaled_add(-lr, &negative.visible);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RbmConfig, TrainMethod};
    use ndarray::Array2;

    fn eq_model(seed: u64) -> RbmModel {
        RbmModel::new(
            RbmConfig::new(6, 4)
                .method(TrainMethod::Equilibrium)
                .batch_size(4)
                .seed(seed),
        )
        .unwrap()
    }

    fn short_config() -> EquilibriumConfig {
        EquilibriumConfig::default()
            .burn_in(30)
            .sample_steps(20)
            .max_samples(8)
            .max_epochs(2)
    }

    fn stripe_samples() -> Array2<f64> {
        Array2::from_shape_fn((12, 6), |(i, j)| {
            let on = if i % 2 == 0 { j < 3 } else { j >= 3 };
            if on {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_negative_phase_averages_are_frequencies() {
        let model = eq_model(4);
        let mut session = TrainSession::new().with_seed(6);
        let config = short_config();

        // Drive one batch update by hand to inspect the statistics.
        let samples = stripe_samples();
        let start = samples.row(0).to_owned();
        let trace = model.gibbs_chain(&start, 0, &mut session.rng);

        let mut negative = PhaseStats::zeros(model.hidden_size(), model.visible_size());
        let mut visible = trace.visible;
        let mut hidden = trace.hidden;
        for _ in 0..config.sample_steps {
            visible = model.binary_visible(&hidden, &mut session.rng);
            hidden = model.binary_hidden(&visible, &mut session.rng);
            negative.accumulate(&hidden, &visible);
        }
        negative.scale(1.0 / config.sample_steps as f64);

        // Averages of binary states are empirical frequencies, valid even
        // with zero burn-in.
        assert!(negative.hidden.iter().all(|&x| (0.0..=1.0).contains(&x)));
        assert!(negative.visible.iter().all(|&x| (0.0..=1.0).contains(&x)));
        assert!(negative.weights.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_training_keeps_parameters_finite_and_shrunk() {
        let mut model = eq_model(9);
        let samples = stripe_samples();
        let mut session = TrainSession::new()
            .with_seed(11)
            .with_equilibrium(short_config());

        let report = model.fit(samples.view(), 5, &mut session).unwrap();
        assert_eq!(report.total_epochs, 2);
        assert!(model.weights().iter().all(|w| w.is_finite()));
        assert!(model.hidden_bias().iter().all(|b| b.is_finite()));
        assert!(model.visible_bias().iter().all(|b| b.is_finite()));
    }

    #[test]
    fn test_weight_decay_scales_weights_per_batch() {
        let mut model = eq_model(2);
        let before = model.clone();

        // With a zero learning rate the update degenerates to the decay
        // alone: each batch multiplies the weights by weight_decay and
        // leaves both bias vectors untouched.
        let mut config = short_config();
        config.learning_rate = 0.0;
        let decay = config.weight_decay;

        // 12 samples capped to 8, batch size 4: exactly two batches.
        let samples = stripe_samples();
        let mut session = TrainSession::new().with_seed(3).with_equilibrium(config);
        model.fit(samples.view(), 1, &mut session).unwrap();

        let expected = (before.weights() * decay) * decay;
        assert_eq!(model.weights(), &expected);
        assert_eq!(model.hidden_bias(), before.hidden_bias());
        assert_eq!(model.visible_bias(), before.visible_bias());
    }

    #[test]
    fn test_burn_in_logging_does_not_perturb_chain() {
        // The log interval only controls diagnostics; identically seeded
        // runs must produce identical parameters regardless of its value.
        let samples = stripe_samples();
        let mut quiet = eq_model(7);
        let mut chatty = eq_model(7);

        let mut config = short_config();
        config.log_interval = 0;
        let mut session = TrainSession::new().with_seed(5).with_equilibrium(config);
        quiet.fit(samples.view(), 1, &mut session).unwrap();

        let mut config = short_config();
        config.log_interval = 7;
        let mut session = TrainSession::new().with_seed(5).with_equilibrium(config);
        chatty.fit(samples.view(), 1, &mut session).unwrap();

        assert_eq!(quiet.weights(), chatty.weights());
        assert_eq!(quiet.hidden_bias(), chatty.hidden_bias());
        assert_eq!(quiet.visible_bias(), chatty.visible_bias());
    }
}
