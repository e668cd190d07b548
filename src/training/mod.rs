//! Training entry point and the cooperative session around it.
//!
//! One `fit` invocation owns the model's parameters exclusively. The loop is
//! single-threaded and sequential; cooperation with the host happens at
//! explicit yield points between batches and between epochs, where the
//! trainer checks the session's [`CancelToken`] and (at epoch boundaries)
//! invokes the progress callback. Cancellation leaves the parameters in
//! whatever state the last completed update produced; there is no rollback.

mod annealing;
mod cd;
mod equilibrium;

pub use annealing::{AnnealingConfig, AnnealingStats};
pub use equilibrium::EquilibriumConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{RbmError, Result};
use crate::model::{RbmModel, TrainMethod};

/// Cooperative cancellation flag, checked at batch and epoch boundaries.
///
/// Clone the token and hand one copy to the thread running `fit`; calling
/// [`CancelToken::cancel`] from anywhere makes the trainer return after the
/// current batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next yield point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-`fit` state: the random source, the cancellation token, an optional
/// epoch progress callback and per-method configuration overrides.
pub struct TrainSession {
    pub(crate) rng: StdRng,
    cancel: CancelToken,
    progress: Option<Box<dyn FnMut(usize, usize) + Send>>,
    pub(crate) annealing: AnnealingConfig,
    pub(crate) equilibrium: EquilibriumConfig,
}

impl Default for TrainSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainSession {
    /// Session with an entropy-seeded RNG and default trainer configs.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            cancel: CancelToken::new(),
            progress: None,
            annealing: AnnealingConfig::default(),
            equilibrium: EquilibriumConfig::default(),
        }
    }

    /// Seed the session RNG for reproducible shuffling and sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Attach an externally held cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a progress callback, invoked with `(epoch, total_epochs)`
    /// after each completed epoch, `epoch` in `[1, total_epochs]`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Override the simulated-annealing configuration.
    pub fn with_annealing(mut self, config: AnnealingConfig) -> Self {
        self.annealing = config;
        self
    }

    /// Override the equilibrium-sampling configuration.
    pub fn with_equilibrium(mut self, config: EquilibriumConfig) -> Self {
        self.equilibrium = config;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn report_epoch(&mut self, epoch: usize, total: usize) {
        if let Some(callback) = self.progress.as_mut() {
            callback(epoch, total);
        }
    }
}

/// Outcome of a `fit` run.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Method that ran
    pub method: TrainMethod,
    /// Epochs fully completed (equals `total_epochs` unless cancelled)
    pub epochs_completed: usize,
    /// Epochs the run was going to perform after method-specific capping
    pub total_epochs: usize,
    /// Whether the run stopped early at a yield point
    pub cancelled: bool,
    /// Acceptance diagnostics, simulated annealing only
    pub annealing: Option<AnnealingStats>,
}

impl RbmModel {
    /// Train the model in place on a set of visible samples.
    ///
    /// `samples` is one sample per row, values in `[0, 1]`, row length equal
    /// to the visible layer size; the engine copies rows before mutating
    /// anything. The trainer is selected by the model's fixed
    /// [`TrainMethod`]. The annealing and equilibrium methods cap the epoch
    /// count and subsample the dataset per their configs, since both are far
    /// more expensive per update than CD; the capped count is what the
    /// progress callback reports as the total.
    ///
    /// # Errors
    /// `RbmError::SampleShape` on a column-count mismatch and
    /// `RbmError::EmptyDataset` when `samples` has no rows.
    pub fn fit(
        &mut self,
        samples: ArrayView2<'_, f64>,
        epochs: usize,
        session: &mut TrainSession,
    ) -> Result<FitReport> {
        if samples.nrows() == 0 {
            return Err(RbmError::EmptyDataset);
        }
        self.check_sample(samples.ncols())?;

        match self.method {
            TrainMethod::ContrastiveDivergence => cd::train(self, samples, epochs, session),
            TrainMethod::SimulatedAnnealing => annealing::train(self, samples, epochs, session),
            TrainMethod::Equilibrium => equilibrium::train(self, samples, epochs, session),
        }
    }
}

/// Accumulate `scale * (hidden ⊗ visible)` into a `hidden x visible` matrix.
pub(crate) fn add_outer(
    acc: &mut ndarray::Array2<f64>,
    scale: f64,
    hidden: &ndarray::Array1<f64>,
    visible: &ndarray::Array1<f64>,
) {
    for (j, &h) in hidden.iter().enumerate() {
        let mut row = acc.row_mut(j);
        for (i, &v) in visible.iter().enumerate() {
            row[i] += scale * h * v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RbmConfig;
    use ndarray::Array2;

    #[test]
    fn test_fit_rejects_empty_dataset() {
        let mut model = RbmModel::new(RbmConfig::new(4, 3).seed(1)).unwrap();
        let samples = Array2::<f64>::zeros((0, 4));
        let err = model.fit(samples.view(), 1, &mut TrainSession::new());
        assert!(matches!(err, Err(RbmError::EmptyDataset)));
    }

    #[test]
    fn test_fit_rejects_wrong_sample_width() {
        let mut model = RbmModel::new(RbmConfig::new(4, 3).seed(1)).unwrap();
        let samples = Array2::<f64>::zeros((5, 6));
        let err = model.fit(samples.view(), 1, &mut TrainSession::new());
        assert!(matches!(err, Err(RbmError::SampleShape { got: 6, expected: 4 })));
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
