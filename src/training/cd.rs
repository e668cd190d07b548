//! Contrastive divergence (CD-1) trainer.
//!
//! One probability-only Gibbs step per sample: hidden probabilities from the
//! data (positive phase), a mean-field visible reconstruction, then hidden
//! probabilities from the reconstruction (negative phase). Using
//! probabilities instead of binary samples keeps the gradient estimate low
//! variance. Gradients are averaged per batch and applied with the model's
//! learning rate.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};
use rand::seq::SliceRandom;

use super::{add_outer, FitReport, TrainSession};
use crate::error::Result;
use crate::model::RbmModel;

/// Check the cancel flag every this many batches.
const CANCEL_CHECK_BATCHES: usize = 4;

pub(super) fn train(
    model: &mut RbmModel,
    samples: ArrayView2<'_, f64>,
    epochs: usize,
    session: &mut TrainSession,
) -> Result<FitReport> {
    let n = samples.nrows();
    // floor(N / batch_size) batches; a dataset smaller than one batch is
    // treated as a single batch.
    let batch_size = model.batch_size.min(n);
    let n_batches = (n / batch_size).max(1);

    info!(
        "CD-1: {} epochs, {} samples, {} batches of {}",
        epochs, n, n_batches, batch_size
    );

    let mut indices: Vec<usize> = (0..n).collect();
    let mut report = FitReport {
        method: model.method,
        epochs_completed: 0,
        total_epochs: epochs,
        cancelled: false,
        annealing: None,
    };

    'epochs: for epoch in 1..=epochs {
        if session.is_cancelled() {
            report.cancelled = true;
            break;
        }

        indices.shuffle(&mut session.rng);
        let mut epoch_error = 0.0;
        let mut epoch_samples = 0;

        for (batch_idx, batch) in indices.chunks(batch_size).take(n_batches).enumerate() {
            if batch_idx % CANCEL_CHECK_BATCHES == 0 && session.is_cancelled() {
                report.cancelled = true;
                break 'epochs;
            }
            let (batch_error, batch_samples) = update_batch(model, samples, batch);
            epoch_error += batch_error;
            epoch_samples += batch_samples;
        }

        report.epochs_completed = epoch;
        debug!(
            "epoch {}/{}: reconstruction_error = {:.6}",
            epoch,
            epochs,
            epoch_error / epoch_samples.max(1) as f64
        );
        session.report_epoch(epoch, epochs);
    }

    Ok(report)
}

/// One CD-1 gradient update from a batch of sample indices. Returns the
/// summed squared reconstruction error and the number of samples that
/// contributed to it.
fn update_batch(
    model: &mut RbmModel,
    samples: ArrayView2<'_, f64>,
    batch: &[usize],
) -> (f64, usize) {
    let mut weight_grad = Array2::<f64>::zeros((model.hidden_size, model.visible_size));
    let mut hidden_grad = Array1::<f64>::zeros(model.hidden_size);
    let mut visible_grad = Array1::<f64>::zeros(model.visible_size);
    let mut error = 0.0;
    let mut used = 0;

    for &idx in batch {
        let v0 = samples.row(idx).to_owned();

        // An all-zero sample carries no learning signal; contributing its
        // negative phase alone would just bleed the model toward noise.
        if v0.iter().all(|&x| x == 0.0) {
            continue;
        }
        used += 1;

        // Positive phase, single mean-field Gibbs step, negative phase.
        let pos_hidden = model.mean_field_hidden(&v0);
        let neg_visible = model.mean_field_visible(&pos_hidden);
        let neg_hidden = model.mean_field_hidden(&neg_visible);

        add_outer(&mut weight_grad, 1.0, &pos_hidden, &v0);
        add_outer(&mut weight_grad, -1.0, &neg_hidden, &neg_visible);
        hidden_grad += &pos_hidden;
        hidden_grad -= &neg_hidden;
        visible_grad += &v0;
        visible_grad -= &neg_visible;

        error += (&v0 - &neg_visible).mapv(|x| x * x).sum();
    }

    let step = model.learning_rate / batch.len() as f64;
    model.weights.scaled_add(step, &weight_grad);
    model.hidden_bias.scaled_add(step, &hidden_grad);
    model.visible_bias.scaled_add(step, &visible_grad);

    (error, used)
}
