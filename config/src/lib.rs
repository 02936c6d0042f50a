pub mod cli;

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use strum::{Display, EnumString, VariantNames};
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, VariantNames, Display, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum ModelKind {
  #[strum(serialize = "CNNResidualNetwork")]
  #[serde(rename = "CNNResidualNetwork")]
  Residual,
  #[strum(serialize = "CNN160Model")]
  #[serde(rename = "CNN160Model")]
  Cnn160,
  #[strum(serialize = "CNN96Model")]
  #[serde(rename = "CNN96Model")]
  Cnn96,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("unknown model {0:?}, expected one of {1:?}")]
  UnknownModel(String, &'static [&'static str]),
  #[error("{name} must be {requirement}, got {value}")]
  Invalid {
    name: &'static str,
    requirement: &'static str,
    value: String,
  },
  #[error("input offset schedule must not be empty")]
  NoOffsets,
  #[error("input offset {0} refers to a future frame")]
  FutureOffset(i32),
  #[error("{height}x{width} input is too small for {model}")]
  InputTooSmall { model: ModelKind, height: usize, width: usize },
  #[error("run name {0:?} must be a single plain path component")]
  RunName(String),
}

impl ModelKind {
  pub fn parse(name: &str) -> Result<Self, ConfigError> {
    name
      .parse()
      .map_err(|_| ConfigError::UnknownModel(name.to_string(), Self::VARIANTS))
  }

  /// Smallest `(height, width)` every layer of the architecture still has a
  /// non-empty output for.
  pub fn min_input(self) -> (usize, usize) {
    match self {
      // valid 5x5/2 conv, 3x3/2 pool, valid 3x3/2 conv
      ModelKind::Residual => (17, 17),
      // four 2x2 pools
      ModelKind::Cnn160 => (16, 16),
      // two 2x2 pools
      ModelKind::Cnn96 => (4, 4),
    }
  }

  pub fn check_input(self, height: usize, width: usize) -> Result<(), ConfigError> {
    let (min_height, min_width) = self.min_input();
    if height < min_height || width < min_width {
      Err(ConfigError::InputTooSmall {
        model: self,
        height,
        width,
      })
    } else {
      Ok(())
    }
  }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Config {
  pub batch_size: usize,
  pub epochs: usize,
  pub learning_rate: f64,
  pub regularization_coefficient: f64,
  pub image_height: usize,
  pub image_width: usize,
  pub model: ModelKind,
  pub seed: u64,
  /// Frame offsets stacked into one model input. `0` is the newest frame,
  /// `-1` the one before it. The order here is the channel order.
  pub input_offsets: Vec<i32>,
  pub train_fraction: f64,
  pub max_samples: usize,
  pub clip_norm: f64,
  pub adam_epsilon: f32,
  /// Dropout probability inside the residual block, `0` disables it.
  pub dropout: f64,
  pub checkpoint_every: usize,
  pub data_dir: PathBuf,
  pub real_dataset: String,
  pub sim_dataset: String,
  pub models_root: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      batch_size: 64,
      epochs: 1000,
      learning_rate: 1e-4,
      regularization_coefficient: 1e-2,
      image_height: 48,
      image_width: 96,
      model: ModelKind::Cnn96,
      seed: 2019,
      input_offsets: vec![0],
      train_fraction: 0.7,
      max_samples: 100_000,
      clip_norm: 5.0,
      adam_epsilon: 1e-4,
      dropout: 0.0,
      checkpoint_every: 100,
      data_dir: PathBuf::from("data"),
      real_dataset: "LF_dataset_real.bin".to_string(),
      sim_dataset: "LF_dataset_sim.bin".to_string(),
      models_root: PathBuf::from("learned_models"),
    }
  }
}

fn invalid<T: ToString>(name: &'static str, requirement: &'static str, value: T) -> ConfigError {
  ConfigError::Invalid {
    name,
    requirement,
    value: value.to_string(),
  }
}

impl Config {
  /// Number of frames the inference side has to remember so that every
  /// configured offset can be served.
  pub fn memory_size(&self) -> usize {
    memory_size(&self.input_offsets)
  }

  /// Number of stacked frames per model input.
  #[inline]
  pub fn channels(&self) -> usize {
    self.input_offsets.len()
  }

  pub fn real_dataset_path(&self) -> PathBuf {
    self.data_dir.join(&self.real_dataset)
  }

  pub fn sim_dataset_path(&self) -> PathBuf {
    self.data_dir.join(&self.sim_dataset)
  }

  /// `<models_root>/<model_name>`. The name must be one normal path
  /// component, so the directory never escapes the models root.
  pub fn run_dir(&self, model_name: &str) -> Result<PathBuf, ConfigError> {
    let mut components = Path::new(model_name).components();
    match (components.next(), components.next()) {
      (Some(Component::Normal(_)), None) => Ok(self.models_root.join(model_name)),
      _ => Err(ConfigError::RunName(model_name.to_string())),
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.batch_size == 0 {
      return Err(invalid("batch_size", "positive", self.batch_size));
    }
    if self.epochs == 0 {
      return Err(invalid("epochs", "positive", self.epochs));
    }
    if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
      return Err(invalid("learning_rate", "positive", self.learning_rate));
    }
    if !(self.regularization_coefficient.is_finite() && self.regularization_coefficient >= 0.0) {
      return Err(invalid(
        "regularization_coefficient",
        "non-negative",
        self.regularization_coefficient,
      ));
    }
    if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
      return Err(invalid("train_fraction", "in (0, 1)", self.train_fraction));
    }
    if self.max_samples == 0 {
      return Err(invalid("max_samples", "positive", self.max_samples));
    }
    if !(self.clip_norm.is_finite() && self.clip_norm > 0.0) {
      return Err(invalid("clip_norm", "positive", self.clip_norm));
    }
    if !(self.adam_epsilon.is_finite() && self.adam_epsilon > 0.0) {
      return Err(invalid("adam_epsilon", "positive", self.adam_epsilon));
    }
    if !(0.0..1.0).contains(&self.dropout) {
      return Err(invalid("dropout", "in [0, 1)", self.dropout));
    }
    if self.checkpoint_every == 0 {
      return Err(invalid("checkpoint_every", "positive", self.checkpoint_every));
    }
    if self.input_offsets.is_empty() {
      return Err(ConfigError::NoOffsets);
    }
    if let Some(&offset) = self.input_offsets.iter().find(|&&offset| offset > 0) {
      return Err(ConfigError::FutureOffset(offset));
    }
    self.model.check_input(self.image_height, self.image_width)
  }
}

/// Depth of the frame history needed to serve `offsets`: the largest
/// distance `|offset - 1|` from the slot after the newest frame.
pub fn memory_size(offsets: &[i32]) -> usize {
  offsets
    .iter()
    .map(|&offset| (offset - 1).unsigned_abs() as usize)
    .max()
    .unwrap_or(0)
}
