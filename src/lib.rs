//! Bernoulli Restricted Boltzmann Machine training engine
//!
//! This library trains an RBM - an undirected, bipartite energy-based model
//! with a visible and a hidden Bernoulli layer - and supports three training
//! algorithms over the same parameter set:
//!
//! - `contrastive-divergence`: CD-1 with probability-only Gibbs steps
//! - `simulated-annealing`: Metropolis exploration under a cooling schedule
//! - `equilibrium`: two-phase learning from long-run Gibbs chains
//!
//! # Modules
//!
//! - `model`: parameters, energy function, snapshot serialization
//! - `sampling`: mean-field activations, binary and Gibbs sampling
//! - `training`: the `fit` entry point, session, cancellation, trainers
//! - `inspect`: reconstruction and filter readout
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use rust_rbm::{RbmConfig, RbmModel, TrainMethod, TrainSession};
//!
//! let mut model = RbmModel::new(
//!     RbmConfig::new(64, 16)
//!         .method(TrainMethod::ContrastiveDivergence)
//!         .learning_rate(0.1)
//!         .batch_size(10),
//! )
//! .unwrap();
//!
//! let samples = Array2::<f64>::zeros((100, 64)); // supplied by the caller
//! let mut session = TrainSession::new()
//!     .with_progress(|epoch, total| println!("epoch {epoch}/{total}"));
//! model.fit(samples.view(), 20, &mut session).unwrap();
//!
//! let json = model.snapshot().to_json().unwrap();
//! ```

pub mod error;
pub mod inspect;
pub mod model;
pub mod sampling;
pub mod training;

pub use error::{RbmError, Result};
pub use inspect::Reconstruction;
pub use model::{sigmoid, ModelSnapshot, RbmConfig, RbmModel, TrainMethod};
pub use sampling::{binary_sample, GibbsTrace};
pub use training::{
    AnnealingConfig, AnnealingStats, CancelToken, EquilibriumConfig, FitReport, TrainSession,
};
