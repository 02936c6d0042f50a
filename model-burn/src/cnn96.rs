use burn::{
  module::Module,
  nn::{
    Linear, PaddingConfig2d,
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

const FILTERS: [usize; 2] = [2, 8];
const KERNEL: usize = 5;
const HIDDEN: usize = 64;

/// Two convolution and max-pool stages with a single hidden dense layer, for
/// small inputs.
#[derive(Module, Debug)]
pub struct Cnn96<B: Backend> {
  conv1: Conv2d<B>,
  conv2: Conv2d<B>,
  pool: MaxPool2d,
  fc: Linear<B>,
  output: Linear<B>,
}

impl<B: Backend> Architecture<B> for Cnn96<B> {
  const KIND: ModelKind = ModelKind::Cnn96;

  fn init<R: Rng>(shape: InputShape, rng: &mut R, device: &B::Device) -> Self {
    let side = |size| pool_out(pool_out(size, 2, 2), 2, 2);
    let flat = FILTERS[1] * side(shape.height) * side(shape.width);
    Self {
      conv1: conv([shape.channels, FILTERS[0]], KERNEL, 1, PaddingConfig2d::Same, rng, device),
      conv2: conv([FILTERS[0], FILTERS[1]], KERNEL, 1, PaddingConfig2d::Same, rng, device),
      pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
      fc: dense(flat, HIDDEN, rng, device),
      output: dense(HIDDEN, OUTPUTS, rng, device),
    }
  }

  fn forward(&self, images: Tensor<B, 4>, _mode: Mode) -> Tensor<B, 2> {
    let x = self.pool.forward(relu(self.conv1.forward(images)));
    let x = self.pool.forward(relu(self.conv2.forward(x)));
    let x = relu(self.fc.forward(x.flatten::<2>(1, 3)));
    self.output.forward(x)
  }

  fn l2(&self) -> Tensor<B, 1> {
    squared_sum(&self.conv1.weight) + squared_sum(&self.conv2.weight)
  }
}
