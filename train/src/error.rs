use pilot_config::ConfigError;
use pilot_dataset::DatasetError;
use pilot_model_burn::{FrozenGraphError, ModelError};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Data(#[from] DatasetError),
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error(transparent)]
  Graph(#[from] FrozenGraphError),
  #[error("failed to prepare {path}: {source}")]
  Io { path: PathBuf, source: io::Error },
  #[error("failed to serialize the configuration: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("training set is empty")]
  NoTrainingData,
  /// Optimization became numerically unstable. Kept apart from the other
  /// variants, which mean bad input rather than a bad run.
  #[error("training diverged at epoch {epoch}, step {step}: loss {loss}, gradient norm {grad_norm}")]
  Diverged {
    epoch: usize,
    step: usize,
    loss: f32,
    grad_norm: f32,
  },
}

impl TrainError {
  pub fn is_divergence(&self) -> bool {
    matches!(self, TrainError::Diverged { .. })
  }
}
