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
  layers::{Mode, conv, dense, pool_out, squared_sum},
};

const FILTERS: [usize; 4] = [4, 4, 8, 16];
const HIDDEN: usize = 64;

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
  bn: BatchNorm<B>,
  conv: Conv2d<B>,
  pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
  fn new<R: Rng>(channels: [usize; 2], rng: &mut R, device: &B::Device) -> Self {
    Self {
      bn: BatchNormConfig::new(channels[0]).init(device),
      conv: conv(channels, 3, 1, PaddingConfig2d::Same, rng, device),
      pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
    }
  }

  fn forward(&self, inputs: Tensor<B, 4>) -> Tensor<B, 4> {
    let x = self.bn.forward(inputs);
    let x = relu(self.conv.forward(x));
    self.pool.forward(x)
  }
}

/// Four normalized convolution blocks and a tanh-bounded head, for the
/// larger camera resolutions.
#[derive(Module, Debug)]
pub struct Cnn160<B: Backend> {
  blocks: Vec<ConvBlock<B>>,
  fc: Linear<B>,
  fc_bn: BatchNorm<B>,
  output: Linear<B>,
}

impl<B: Backend> Architecture<B> for Cnn160<B> {
  const KIND: ModelKind = ModelKind::Cnn160;

  fn init<R: Rng>(shape: InputShape, rng: &mut R, device: &B::Device) -> Self {
    let mut blocks = Vec::with_capacity(FILTERS.len());
    let mut channels = shape.channels;
    let (mut height, mut width) = (shape.height, shape.width);
    for filters in FILTERS {
      blocks.push(ConvBlock::new([channels, filters], rng, device));
      channels = filters;
      height = pool_out(height, 2, 2);
      width = pool_out(width, 2, 2);
    }
    Self {
      blocks,
      fc: dense(channels * height * width, HIDDEN, rng, device),
      fc_bn: BatchNormConfig::new(HIDDEN).init(device),
      output: dense(HIDDEN, OUTPUTS, rng, device),
    }
  }

  fn forward(&self, images: Tensor<B, 4>, _mode: Mode) -> Tensor<B, 2> {
    let mut x = images;
    for block in &self.blocks {
      x = block.forward(x);
    }
    let x = self.fc.forward(x.flatten::<2>(1, 3));
    let [batch, features] = x.dims();
    let x = self.fc_bn.forward(x.reshape([batch, features, 1])).reshape([batch, features]);
    self.output.forward(x.tanh()).tanh()
  }

  fn l2(&self) -> Tensor<B, 1> {
    self
      .blocks
      .iter()
      .fold(squared_sum(&self.fc.weight) + squared_sum(&self.output.weight), |acc, block| {
        acc + squared_sum(&block.conv.weight)
      })
  }
}

#[cfg(test)]
impl<B: Backend> Cnn160<B> {
  /// Running mean and variance of every batch norm layer, concatenated.
  pub(crate) fn running_statistics(&self) -> Vec<f32> {
    self
      .blocks
      .iter()
      .map(|block| &block.bn)
      .chain([&self.fc_bn])
      .flat_map(|bn| [bn.running_mean.value(), bn.running_var.value()])
      .flat_map(|tensor| tensor.into_data().convert::<f32>().into_vec::<f32>().unwrap())
      .collect()
  }
}
