//! Model parameters, energy function and the persisted snapshot format.

mod params;
mod snapshot;

pub use params::{sigmoid, RbmConfig, RbmModel, TrainMethod};
pub use snapshot::ModelSnapshot;
