use burn::{
  module::Module,
  nn::{
    BatchNorm, BatchNormConfig, Linear, PaddingConfig2d,
    conv::Conv2d,
    pool::{MaxPool2d, MaxPool2dConfig},
  },
  tensor::{Tensor, activation::relu, backend::Backend},
};
use pilot_config::ModelKind;
use pilot_model::model::OUTPUTS;
use rand::Rng;

use crate::{
  architecture::{Architecture, InputShape},
  layers::{Mode, conv, conv_out, dense, dropout, pool_out, squared_sum},
};

const FILTERS: usize = 32;
const HIDDEN: [usize; 2] = [64, 32];

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
  bn1: BatchNorm<B>,
  conv1: Conv2d<B>,
  bn2: BatchNorm<B>,
  conv2: Conv2d<B>,
  shortcut: Conv2d<B>,
}

impl<B: Backend> ResidualBlock<B> {
  pub fn new<R: Rng>(channels: usize, rng: &mut R, device: &B::Device) -> Self {
    Self {
      bn1: BatchNormConfig::new(channels).init(device),
      conv1: conv([channels, channels], 3, 2, PaddingConfig2d::Valid, rng, device),
      bn2: BatchNormConfig::new(channels).init(device),
      conv2: conv([channels, channels], 3, 1, PaddingConfig2d::Same, rng, device),
      shortcut: conv([channels, channels], 3, 2, PaddingConfig2d::Valid, rng, device),
    }
  }

  pub fn forward(&self, inputs: Tensor<B, 4>, mode: Mode) -> Tensor<B, 4> {
    let x = relu(self.bn1.forward(inputs.clone()));
    let x = dropout(self.conv1.forward(x), mode);
    let x = relu(self.bn2.forward(x));
    let x = dropout(self.conv2.forward(x), mode);
    x + self.shortcut.forward(inputs)
  }

  fn l2(&self) -> Tensor<B, 1> {
    squared_sum(&self.conv1.weight) + squared_sum(&self.conv2.weight) + squared_sum(&self.shortcut.weight)
  }
}

/// Strided convolution and max-pool stem, one residual block, two hidden
/// dense layers and a linear output.
#[derive(Module, Debug)]
pub struct ResidualNetwork<B: Backend> {
  stem: Conv2d<B>,
  pool: MaxPool2d,
  block: ResidualBlock<B>,
  fc1: Linear<B>,
  fc2: Linear<B>,
  output: Linear<B>,
}

fn flat_features(shape: InputShape) -> usize {
  let side = |size| conv_out(pool_out(conv_out(size, 5, 2), 3, 2), 3, 2);
  FILTERS * side(shape.height) * side(shape.width)
}

impl<B: Backend> Architecture<B> for ResidualNetwork<B> {
  const KIND: ModelKind = ModelKind::Residual;

  fn init<R: Rng>(shape: InputShape, rng: &mut R, device: &B::Device) -> Self {
    Self {
      stem: conv([shape.channels, FILTERS], 5, 2, PaddingConfig2d::Valid, rng, device),
      pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
      block: ResidualBlock::new(FILTERS, rng, device),
      fc1: dense(flat_features(shape), HIDDEN[0], rng, device),
      fc2: dense(HIDDEN[0], HIDDEN[1], rng, device),
      output: dense(HIDDEN[1], OUTPUTS, rng, device),
    }
  }

  fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
    let x = self.stem.forward(images);
    let x = self.pool.forward(x);
    let x = self.block.forward(x, mode);
    let x = x.flatten::<2>(1, 3);
    let x = relu(self.fc1.forward(x));
    let x = relu(self.fc2.forward(x));
    self.output.forward(x)
  }

  fn l2(&self) -> Tensor<B, 1> {
    squared_sum(&self.stem.weight) + self.block.l2()
  }
}
