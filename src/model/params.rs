//! Model parameters, energy function and activation primitives.
//!
//! The RBM is a bipartite energy-based model: a visible layer of `visible_size`
//! Bernoulli units and a hidden layer of `hidden_size` units, fully connected
//! across layers with no intra-layer connections. The energy of a joint
//! configuration is
//!
//! ```text
//! E(v, h) = -Σ_i a_i v_i - Σ_j b_j h_j - Σ_ij W_ji v_i h_j
//! ```
//!
//! Lower energy means higher probability under the model.

use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{RbmError, Result};

/// Largest sigmoid argument magnitude before clamping.
///
/// Annealing can drive activations far outside the range where `exp` is
/// well-behaved; clamping keeps the output in (0, 1) without overflow.
const SIGMOID_CLAMP: f64 = 20.0;

/// Logistic sigmoid with a clamped argument.
pub fn sigmoid(x: f64) -> f64 {
    let x = x.clamp(-SIGMOID_CLAMP, SIGMOID_CLAMP);
    1.0 / (1.0 + (-x).exp())
}

/// Training algorithm used to fit the model.
///
/// The method is fixed per model instance: it selects which trainer mutates
/// the parameters and the initial weight scale (equilibrium sampling needs a
/// smaller initialization variance to keep its long Gibbs chains stable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainMethod {
    /// CD-1: single probability-only Gibbs step per sample
    ContrastiveDivergence,
    /// Metropolis exploration of hidden-state space with a cooling schedule
    SimulatedAnnealing,
    /// Two-phase learning from long-run Gibbs chains
    Equilibrium,
}

impl TrainMethod {
    /// Stable string tag used by the snapshot format.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainMethod::ContrastiveDivergence => "contrastive-divergence",
            TrainMethod::SimulatedAnnealing => "simulated-annealing",
            TrainMethod::Equilibrium => "equilibrium",
        }
    }

    /// Parse a snapshot tag back into a method.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "contrastive-divergence" => Ok(TrainMethod::ContrastiveDivergence),
            "simulated-annealing" => Ok(TrainMethod::SimulatedAnnealing),
            "equilibrium" => Ok(TrainMethod::Equilibrium),
            other => Err(RbmError::UnknownMethod(other.to_string())),
        }
    }

    /// Initial weight scale: weights start uniform in `[-scale, scale]`.
    pub(crate) fn init_scale(&self) -> f64 {
        match self {
            TrainMethod::Equilibrium => 0.01,
            _ => 0.1,
        }
    }
}

impl std::fmt::Display for TrainMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for building an [`RbmModel`].
#[derive(Debug, Clone)]
pub struct RbmConfig {
    /// Number of visible units
    pub visible_size: usize,
    /// Number of hidden units
    pub hidden_size: usize,
    /// Gradient step size for contrastive divergence
    pub learning_rate: f64,
    /// Batch granularity for the batched trainers
    pub batch_size: usize,
    /// Training algorithm, fixed for the model's lifetime
    pub method: TrainMethod,
    /// Random seed for weight initialization (None = from entropy)
    pub seed: Option<u64>,
}

impl Default for RbmConfig {
    fn default() -> Self {
        Self {
            visible_size: 64,
            hidden_size: 32,
            learning_rate: 0.1,
            batch_size: 10,
            method: TrainMethod::ContrastiveDivergence,
            seed: None,
        }
    }
}

impl RbmConfig {
    /// Create a configuration for the given layer sizes.
    pub fn new(visible_size: usize, hidden_size: usize) -> Self {
        Self {
            visible_size,
            hidden_size,
            ..Default::default()
        }
    }

    /// Set the learning rate.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the training method.
    pub fn method(mut self, method: TrainMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the initialization seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.visible_size == 0 {
            return Err(RbmError::Config("visible_size must be positive".into()));
        }
        if self.hidden_size == 0 {
            return Err(RbmError::Config("hidden_size must be positive".into()));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(RbmError::Config(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(RbmError::Config("batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Bernoulli Restricted Boltzmann Machine.
///
/// Weights are stored as a dense `hidden_size x visible_size` matrix: row `j`
/// holds the connections of hidden unit `j` to every visible unit. Dimensions
/// are fixed at construction; only the trainer selected by the model's
/// [`TrainMethod`] mutates the parameters.
#[derive(Debug, Clone)]
pub struct RbmModel {
    pub(crate) visible_size: usize,
    pub(crate) hidden_size: usize,
    pub(crate) weights: Array2<f64>,
    pub(crate) hidden_bias: Array1<f64>,
    pub(crate) visible_bias: Array1<f64>,
    pub(crate) learning_rate: f64,
    pub(crate) batch_size: usize,
    pub(crate) method: TrainMethod,
}

impl RbmModel {
    /// Build a model from a validated configuration.
    ///
    /// Weights start uniform in `[-scale, scale]` with a method-dependent
    /// scale; both bias vectors start at zero.
    ///
    /// # Errors
    /// Returns `RbmError::Config` for non-positive sizes, batch size or
    /// learning rate.
    pub fn new(config: RbmConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let scale = config.method.init_scale();
        let weights = Array2::random_using(
            (config.hidden_size, config.visible_size),
            Uniform::new(-scale, scale),
            &mut rng,
        );

        Ok(Self {
            visible_size: config.visible_size,
            hidden_size: config.hidden_size,
            weights,
            hidden_bias: Array1::zeros(config.hidden_size),
            visible_bias: Array1::zeros(config.visible_size),
            learning_rate: config.learning_rate,
            batch_size: config.batch_size,
            method: config.method,
        })
    }

    /// Number of visible units.
    pub fn visible_size(&self) -> usize {
        self.visible_size
    }

    /// Number of hidden units.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// The training method fixed at construction.
    pub fn method(&self) -> TrainMethod {
        self.method
    }

    /// Learning rate used by the contrastive divergence trainer.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Batch size used by the batched trainers.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read-only view of the weight matrix (`hidden_size x visible_size`).
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Read-only view of the hidden bias vector.
    pub fn hidden_bias(&self) -> &Array1<f64> {
        &self.hidden_bias
    }

    /// Read-only view of the visible bias vector.
    pub fn visible_bias(&self) -> &Array1<f64> {
        &self.visible_bias
    }

    /// Joint energy of a (visible, hidden) configuration.
    ///
    /// `E(v, h) = -a.v - b.h - h.(W v)`; finite whenever all parameters and
    /// both state vectors are finite.
    pub fn energy(&self, visible: &Array1<f64>, hidden: &Array1<f64>) -> f64 {
        let wv = self.weights.dot(visible);
        -self.visible_bias.dot(visible) - self.hidden_bias.dot(hidden) - hidden.dot(&wv)
    }

    /// Verify a sample's length against the visible layer.
    pub(crate) fn check_sample(&self, len: usize) -> Result<()> {
        if len != self.visible_size {
            return Err(RbmError::SampleShape {
                got: len,
                expected: self.visible_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid_range() {
        for &x in &[-1e9, -50.0, -1.0, 0.0, 1.0, 50.0, 1e9] {
            let s = sigmoid(x);
            assert!(s > 0.0 && s < 1.0, "sigmoid({}) = {}", x, s);
        }
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_extreme_arguments_finite() {
        assert!(sigmoid(f64::MAX).is_finite());
        assert!(sigmoid(-f64::MAX).is_finite());
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        assert!(RbmModel::new(RbmConfig::new(0, 3)).is_err());
        assert!(RbmModel::new(RbmConfig::new(4, 0)).is_err());
        assert!(RbmModel::new(RbmConfig::new(4, 3).batch_size(0)).is_err());
        assert!(RbmModel::new(RbmConfig::new(4, 3).learning_rate(0.0)).is_err());
    }

    #[test]
    fn test_creation_dimensions() {
        let model = RbmModel::new(RbmConfig::new(10, 5).seed(7)).unwrap();
        assert_eq!(model.visible_size(), 10);
        assert_eq!(model.hidden_size(), 5);
        assert_eq!(model.weights().shape(), &[5, 10]);
        assert_eq!(model.hidden_bias().len(), 5);
        assert_eq!(model.visible_bias().len(), 10);
    }

    #[test]
    fn test_init_scale_by_method() {
        let cd = RbmModel::new(RbmConfig::new(20, 20).seed(1)).unwrap();
        let eq = RbmModel::new(
            RbmConfig::new(20, 20).method(TrainMethod::Equilibrium).seed(1),
        )
        .unwrap();
        assert!(cd.weights().iter().all(|w| w.abs() <= 0.1));
        assert!(eq.weights().iter().all(|w| w.abs() <= 0.01));
    }

    #[test]
    fn test_energy_known_value() {
        let mut model = RbmModel::new(RbmConfig::new(4, 3).seed(0)).unwrap();
        model.weights = array![
            [0.5, -0.3, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0]
        ];
        model.hidden_bias = array![0.2, 0.0, 0.0];
        model.visible_bias = array![-0.1, 0.4, 0.0, 0.0];

        let visible = array![1.0, 0.0, 1.0, 0.0];
        let hidden = array![1.0, 0.0, 1.0];
        let e = model.energy(&visible, &hidden);
        assert!((e - (-0.6)).abs() < 1e-12, "energy = {}", e);
    }

    #[test]
    fn test_energy_finite_for_binary_states() {
        let model = RbmModel::new(RbmConfig::new(8, 6).seed(3)).unwrap();
        for pattern in 0..16u32 {
            let visible =
                Array1::from_shape_fn(8, |i| f64::from(pattern >> (i % 4) & 1));
            let hidden = Array1::from_shape_fn(6, |j| f64::from(pattern >> (j % 4) & 1));
            assert!(model.energy(&visible, &hidden).is_finite());
        }
    }

    #[test]
    fn test_method_tags_round_trip() {
        for method in [
            TrainMethod::ContrastiveDivergence,
            TrainMethod::SimulatedAnnealing,
            TrainMethod::Equilibrium,
        ] {
            assert_eq!(TrainMethod::parse(method.as_str()).unwrap(), method);
        }
        assert!(TrainMethod::parse("gradient-descent").is_err());
    }
}
