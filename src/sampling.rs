//! Stochastic sampling primitives.
//!
//! Mean-field activations are deterministic sigmoid probabilities; binary
//! sampling turns a probability vector into a {0, 1} state with one
//! independent uniform draw per component. Gibbs sampling alternates binary
//! hidden and visible draws to approach the model's stationary distribution.
//!
//! Every stochastic operation takes the random source as an argument so
//! callers can seed a [`rand::rngs::StdRng`] for deterministic tests.

use ndarray::Array1;
use rand::Rng;

use crate::model::{sigmoid, RbmModel};

/// Draw a binary vector: component `i` is 1 with probability `probs[i]`.
pub fn binary_sample<R: Rng>(probs: &Array1<f64>, rng: &mut R) -> Array1<f64> {
    probs.mapv(|p| if rng.gen::<f64>() < p { 1.0 } else { 0.0 })
}

/// Result of a multi-step Gibbs chain.
#[derive(Debug, Clone)]
pub struct GibbsTrace {
    /// Visible state after the last step
    pub visible: Array1<f64>,
    /// Hidden state after the last step
    pub hidden: Array1<f64>,
    /// Joint energy recorded after every step, for convergence diagnostics
    pub energies: Vec<f64>,
}

impl RbmModel {
    /// Mean-field hidden activation: `P(h_j = 1 | v)` for every hidden unit.
    pub fn mean_field_hidden(&self, visible: &Array1<f64>) -> Array1<f64> {
        (self.weights.dot(visible) + &self.hidden_bias).mapv(sigmoid)
    }

    /// Mean-field visible activation: `P(v_i = 1 | h)` for every visible unit.
    ///
    /// Uses the transposed weight view; no transpose is materialized.
    pub fn mean_field_visible(&self, hidden: &Array1<f64>) -> Array1<f64> {
        (self.weights.t().dot(hidden) + &self.visible_bias).mapv(sigmoid)
    }

    /// Binary hidden sample given a visible state.
    pub fn binary_hidden<R: Rng>(&self, visible: &Array1<f64>, rng: &mut R) -> Array1<f64> {
        binary_sample(&self.mean_field_hidden(visible), rng)
    }

    /// Binary visible sample given a hidden state.
    pub fn binary_visible<R: Rng>(&self, hidden: &Array1<f64>, rng: &mut R) -> Array1<f64> {
        binary_sample(&self.mean_field_visible(hidden), rng)
    }

    /// Run `steps` steps of alternating binary Gibbs sampling from a visible
    /// start state, recording the joint energy after each step.
    ///
    /// The chain first draws a hidden state from `start`, then each step
    /// resamples visible-given-hidden and hidden-given-visible. With
    /// `steps == 0` the trace holds the start state and its hidden sample.
    pub fn gibbs_chain<R: Rng>(
        &self,
        start: &Array1<f64>,
        steps: usize,
        rng: &mut R,
    ) -> GibbsTrace {
        let mut visible = start.clone();
        let mut hidden = self.binary_hidden(&visible, rng);
        let mut energies = Vec::with_capacity(steps);

        for _ in 0..steps {
            visible = self.binary_visible(&hidden, rng);
            hidden = self.binary_hidden(&visible, rng);
            energies.push(self.energy(&visible, &hidden));
        }

        GibbsTrace {
            visible,
            hidden,
            energies,
        }
    }
}
