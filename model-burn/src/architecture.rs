use burn::{
  module::Module,
  tensor::{Tensor, backend::Backend},
};
use pilot_config::{Config, ConfigError, ModelKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::layers::Mode;

/// Shape of one network input: stacked grayscale frames.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct InputShape {
  pub channels: usize,
  pub height: usize,
  pub width: usize,
}

impl InputShape {
  pub fn from_config(config: &Config) -> Self {
    Self {
      channels: config.channels(),
      height: config.image_height,
      width: config.image_width,
    }
  }

  /// Length of the flattened `[C * H * W]` input row.
  pub fn flat_len(&self) -> usize {
    self.channels * self.height * self.width
  }

  pub fn dims(&self) -> (usize, usize, usize) {
    (self.channels, self.height, self.width)
  }

  pub fn check(&self, kind: ModelKind) -> Result<(), ConfigError> {
    if self.channels == 0 {
      return Err(ConfigError::NoOffsets);
    }
    kind.check_input(self.height, self.width)
  }
}

/// A network of the pilot family: maps `[N, C, H, W]` frames in `[0, 1]` to
/// `[N, 2]` wheel velocities.
pub trait Architecture<B: Backend>: Module<B> {
  const KIND: ModelKind;

  /// Builds the network with seeded He/Glorot initialization. The input
  /// shape must pass [`InputShape::check`] for [`Self::KIND`].
  fn init<R: Rng>(shape: InputShape, rng: &mut R, device: &B::Device) -> Self;

  /// `mode` only gates dropout. Batch norm follows the backend: running
  /// statistics are updated on an autodiff backend and used as is on the
  /// inner one, see `AutodiffModule::valid`.
  fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2>;

  /// Sum of squared weights of the regularized kernels.
  fn l2(&self) -> Tensor<B, 1>;

  /// Forward pass over flattened `[N, C * H * W]` rows.
  fn forward_flat(&self, inputs: Tensor<B, 2>, shape: InputShape, mode: Mode) -> Tensor<B, 2> {
    let [batch, _] = inputs.dims();
    self.forward(inputs.reshape([batch, shape.channels, shape.height, shape.width]), mode)
  }
}
