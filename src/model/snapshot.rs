//! Parameter snapshot: the crate's only persisted state.
//!
//! A snapshot is a flat record of the model's dimensions, weights, biases,
//! training-method tag and a creation timestamp. Encoding to JSON and back
//! is a lossless round trip of every numeric field; the storage medium
//! (key-value store, file) is the caller's concern.

use chrono::Utc;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{RbmError, Result};
use crate::model::{RbmConfig, RbmModel, TrainMethod};

/// Serializable snapshot of a trained model's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Number of visible units
    pub visible_size: usize,
    /// Number of hidden units
    pub hidden_size: usize,
    /// Weight matrix rows, one per hidden unit (`hidden_size x visible_size`)
    pub weights: Vec<Vec<f64>>,
    /// Hidden bias vector
    pub hidden_bias: Vec<f64>,
    /// Visible bias vector
    pub visible_bias: Vec<f64>,
    /// Training method tag (see [`TrainMethod::as_str`])
    pub training_method: String,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
}

impl ModelSnapshot {
    /// Encode the snapshot as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a snapshot from a JSON string.
    ///
    /// This only checks well-formedness of the JSON; dimensional consistency
    /// is verified when the snapshot is turned back into a model.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<()> {
        if self.visible_size == 0 || self.hidden_size == 0 {
            return Err(RbmError::Snapshot("layer sizes must be positive".into()));
        }
        if self.weights.len() != self.hidden_size {
            return Err(RbmError::Snapshot(format!(
                "expected {} weight rows, found {}",
                self.hidden_size,
                self.weights.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|r| r.len() != self.visible_size) {
            return Err(RbmError::Snapshot(format!(
                "expected weight rows of length {}, found {}",
                self.visible_size,
                row.len()
            )));
        }
        if self.hidden_bias.len() != self.hidden_size {
            return Err(RbmError::Snapshot(format!(
                "hidden bias has {} entries for {} hidden units",
                self.hidden_bias.len(),
                self.hidden_size
            )));
        }
        if self.visible_bias.len() != self.visible_size {
            return Err(RbmError::Snapshot(format!(
                "visible bias has {} entries for {} visible units",
                self.visible_bias.len(),
                self.visible_size
            )));
        }
        Ok(())
    }
}

impl RbmModel {
    /// Export the current parameters as a snapshot, stamped with the current
    /// time in epoch milliseconds.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            visible_size: self.visible_size,
            hidden_size: self.hidden_size,
            weights: self
                .weights
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            hidden_bias: self.hidden_bias.to_vec(),
            visible_bias: self.visible_bias.to_vec(),
            training_method: self.method.as_str().to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Rebuild a model from a snapshot.
    ///
    /// Learning rate and batch size are not part of the persisted state and
    /// come back as the [`RbmConfig`] defaults.
    ///
    /// # Errors
    /// Returns `RbmError::Snapshot` when the record is dimensionally
    /// inconsistent, or `RbmError::UnknownMethod` for an unrecognized tag.
    /// No partially initialized model is ever produced.
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self> {
        snapshot.validate()?;
        let method = TrainMethod::parse(&snapshot.training_method)?;

        let flat: Vec<f64> = snapshot.weights.iter().flatten().copied().collect();
        let weights =
            Array2::from_shape_vec((snapshot.hidden_size, snapshot.visible_size), flat)
                .map_err(|e| RbmError::Snapshot(e.to_string()))?;

        let defaults = RbmConfig::default();
        Ok(Self {
            visible_size: snapshot.visible_size,
            hidden_size: snapshot.hidden_size,
            weights,
            hidden_bias: Array1::from_vec(snapshot.hidden_bias.clone()),
            visible_bias: Array1::from_vec(snapshot.visible_bias.clone()),
            learning_rate: defaults.learning_rate,
            batch_size: defaults.batch_size,
            method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> RbmModel {
        RbmModel::new(
            RbmConfig::new(6, 4)
                .method(TrainMethod::SimulatedAnnealing)
                .seed(11),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_identity() {
        let model = sample_model();
        let json = model.snapshot().to_json().unwrap();
        let restored = RbmModel::from_snapshot(&ModelSnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.visible_size(), model.visible_size());
        assert_eq!(restored.hidden_size(), model.hidden_size());
        assert_eq!(restored.method(), model.method());
        assert_eq!(restored.weights(), model.weights());
        assert_eq!(restored.hidden_bias(), model.hidden_bias());
        assert_eq!(restored.visible_bias(), model.visible_bias());
    }

    #[test]
    fn test_snapshot_has_epoch_millis_timestamp() {
        let snapshot = sample_model().snapshot();
        // Sanity band: after 2020-01-01, before 2100-01-01.
        assert!(snapshot.timestamp > 1_577_836_800_000);
        assert!(snapshot.timestamp < 4_102_444_800_000);
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(ModelSnapshot::from_json("{not json").is_err());
        assert!(ModelSnapshot::from_json(r#"{"visible_size": 3}"#).is_err());
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let mut snapshot = sample_model().snapshot();
        snapshot.weights.pop();
        assert!(RbmModel::from_snapshot(&snapshot).is_err());

        let mut snapshot = sample_model().snapshot();
        snapshot.hidden_bias.push(0.0);
        assert!(RbmModel::from_snapshot(&snapshot).is_err());

        let mut snapshot = sample_model().snapshot();
        snapshot.weights[0].pop();
        assert!(RbmModel::from_snapshot(&snapshot).is_err());
    }

    #[test]
    fn test_unknown_method_tag_fails() {
        let mut snapshot = sample_model().snapshot();
        snapshot.training_method = "backprop".into();
        assert!(matches!(
            RbmModel::from_snapshot(&snapshot),
            Err(RbmError::UnknownMethod(_))
        ));
    }
}
