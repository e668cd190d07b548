//! Read-only reconstruction and filter inspection.
//!
//! Everything here is a pure function of the current parameters and its
//! input; nothing mutates the model. Callers must not run these concurrently
//! with a `fit` on the same model — serialize externally.

use ndarray::{Array1, ArrayView1};

use crate::error::{RbmError, Result};
use crate::model::RbmModel;

/// Output of a mean-field reconstruction pass.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Mean-field hidden activations computed from the input
    pub hidden: Array1<f64>,
    /// Mean-field visible reconstruction computed from those activations
    pub visible: Array1<f64>,
}

impl RbmModel {
    /// One mean-field hidden pass followed by one mean-field visible pass.
    pub fn reconstruct(&self, sample: &Array1<f64>) -> Result<Reconstruction> {
        self.check_sample(sample.len())?;
        let hidden = self.mean_field_hidden(sample);
        let visible = self.mean_field_visible(&hidden);
        Ok(Reconstruction { hidden, visible })
    }

    /// Raw weight row of one hidden unit, for filter visualization.
    pub fn filter(&self, unit: usize) -> Result<ArrayView1<'_, f64>> {
        self.check_unit(unit)?;
        Ok(self.weights.row(unit))
    }

    /// Per-visible-unit contribution of one hidden unit to reconstructing
    /// `sample`: `|w[unit][i] * h_unit|`, normalized by its own maximum.
    /// A unit with no contribution anywhere yields the zero vector.
    pub fn filter_contribution(&self, sample: &Array1<f64>, unit: usize) -> Result<Array1<f64>> {
        self.check_sample(sample.len())?;
        self.check_unit(unit)?;

        let activation = self.mean_field_hidden(sample)[unit];
        let mut contribution = self.weights.row(unit).mapv(|w| (w * activation).abs());

        let max = contribution.iter().cloned().fold(0.0_f64, f64::max);
        if max > 0.0 {
            contribution /= max;
        }
        Ok(contribution)
    }

    fn check_unit(&self, unit: usize) -> Result<()> {
        if unit >= self.hidden_size {
            return Err(RbmError::UnitOutOfRange {
                index: unit,
                size: self.hidden_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RbmConfig;
    use ndarray::{array, Array1, Array2};

    fn zero_model() -> RbmModel {
        let mut model = RbmModel::new(RbmConfig::new(4, 3).seed(0)).unwrap();
        model.weights = Array2::zeros((3, 4));
        model
    }

    #[test]
    fn test_zero_model_reconstructs_to_half() {
        let model = zero_model();
        let r = model.reconstruct(&array![1.0, 0.0, 0.3, 0.9]).unwrap();
        assert!(r.hidden.iter().all(|&h| (h - 0.5).abs() < 1e-12));
        assert!(r.visible.iter().all(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_reconstruct_rejects_wrong_length() {
        let model = zero_model();
        assert!(model.reconstruct(&Array1::zeros(5)).is_err());
    }

    #[test]
    fn test_filter_returns_weight_row() {
        let model = RbmModel::new(RbmConfig::new(4, 3).seed(12)).unwrap();
        let row = model.filter(1).unwrap();
        assert_eq!(row, model.weights().row(1));
        assert!(model.filter(3).is_err());
    }

    #[test]
    fn test_filter_contribution_normalized() {
        let mut model = zero_model();
        model.weights = array![
            [0.4, -0.8, 0.2, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0]
        ];

        let sample = array![1.0, 1.0, 0.0, 0.0];
        let c = model.filter_contribution(&sample, 0).unwrap();
        // Largest-magnitude weight dominates; signs are dropped.
        assert!((c[1] - 1.0).abs() < 1e-12);
        assert!((c[0] - 0.5).abs() < 1e-12);
        assert!((c[3] - 0.0).abs() < 1e-12);
        assert!(c.iter().all(|&x| (0.0..=1.0).contains(&x)));

        // A dead filter contributes nothing.
        let dead = model.filter_contribution(&sample, 1).unwrap();
        assert!(dead.iter().all(|&x| x == 0.0));
    }
}
