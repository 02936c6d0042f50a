use burn::{
  module::Param,
  nn::{
    DropoutConfig, Initializer, Linear, LinearConfig, PaddingConfig2d,
    conv::{Conv2d, Conv2dConfig},
  },
  tensor::{Tensor, TensorData, backend::Backend},
};
use rand::Rng;
use rand_distr::StandardNormal;

/// Whether a forward pass is a training step or an evaluation.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Mode {
  Train { drop_prob: f64 },
  Inference,
}

impl Mode {
  pub fn drop_prob(self) -> f64 {
    match self {
      Mode::Train { drop_prob } => drop_prob,
      Mode::Inference => 0.0,
    }
  }
}

/// Spatial size after a convolution without padding.
pub fn conv_out(size: usize, kernel: usize, stride: usize) -> usize {
  (size - kernel) / stride + 1
}

/// Spatial size after a pooling window without padding.
pub fn pool_out(size: usize, kernel: usize, stride: usize) -> usize {
  conv_out(size, kernel, stride)
}

fn normal<B: Backend, R: Rng, const D: usize>(
  rng: &mut R,
  std: f64,
  shape: [usize; D],
  device: &B::Device,
) -> Param<Tensor<B, D>> {
  let count = shape.iter().product();
  let values = (0..count)
    .map(|_| (rng.sample::<f64, _>(StandardNormal) * std) as f32)
    .collect::<Vec<_>>();
  Param::from_tensor(Tensor::from_data(TensorData::new(values, shape), device))
}

/// Convolution with He-normal kernel and zero bias.
pub fn conv<B: Backend, R: Rng>(
  channels: [usize; 2],
  kernel: usize,
  stride: usize,
  padding: PaddingConfig2d,
  rng: &mut R,
  device: &B::Device,
) -> Conv2d<B> {
  let mut conv = Conv2dConfig::new(channels, [kernel, kernel])
    .with_stride([stride, stride])
    .with_padding(padding)
    .with_initializer(Initializer::Zeros)
    .init(device);
  let fan_in = channels[0] * kernel * kernel;
  conv.weight = normal(
    rng,
    (2.0 / fan_in as f64).sqrt(),
    [channels[1], channels[0], kernel, kernel],
    device,
  );
  conv
}

/// Fully connected layer with Glorot-normal kernel and zero bias.
pub fn dense<B: Backend, R: Rng>(d_input: usize, d_output: usize, rng: &mut R, device: &B::Device) -> Linear<B> {
  let mut linear = LinearConfig::new(d_input, d_output)
    .with_initializer(Initializer::Zeros)
    .init(device);
  linear.weight = normal(
    rng,
    (2.0 / (d_input + d_output) as f64).sqrt(),
    [d_input, d_output],
    device,
  );
  linear
}

/// burn's inverted dropout at the probability of `mode`. Identity outside of
/// training, and on backends without autodiff.
pub fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, mode: Mode) -> Tensor<B, D> {
  let drop_prob = mode.drop_prob();
  if drop_prob <= 0.0 {
    return x;
  }
  DropoutConfig::new(drop_prob).init().forward(x)
}

pub fn squared_sum<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> Tensor<B, 1> {
  param.val().powi_scalar(2).sum()
}

#[cfg(test)]
mod tests {
  use super::{Mode, conv, conv_out, dense, dropout, pool_out};
  use burn::{
    backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
    nn::PaddingConfig2d,
    tensor::Tensor,
  };
  use rand::SeedableRng;
  use rand_xoshiro::Xoshiro256PlusPlus;

  const SEED: u64 = 7;

  #[test]
  fn output_sizes() {
    assert_eq!(conv_out(48, 5, 2), 22);
    assert_eq!(conv_out(96, 5, 2), 46);
    assert_eq!(pool_out(22, 3, 2), 10);
    assert_eq!(pool_out(7, 2, 2), 3);
  }

  #[test]
  fn seeded_layers_are_reproducible() {
    let device = NdArrayDevice::Cpu;
    let first = conv::<NdArray, _>(
      [2, 4],
      3,
      1,
      PaddingConfig2d::Same,
      &mut Xoshiro256PlusPlus::seed_from_u64(SEED),
      &device,
    );
    let second = conv::<NdArray, _>(
      [2, 4],
      3,
      1,
      PaddingConfig2d::Same,
      &mut Xoshiro256PlusPlus::seed_from_u64(SEED),
      &device,
    );
    assert_eq!(first.weight.val().dims(), [4, 2, 3, 3]);
    assert_eq!(
      first.weight.val().into_data().to_vec::<f32>().unwrap(),
      second.weight.val().into_data().to_vec::<f32>().unwrap()
    );
    let bias = first.bias.unwrap().val().into_data().to_vec::<f32>().unwrap();
    assert!(bias.iter().all(|&b| b == 0.0));

    let linear = dense::<NdArray, _>(6, 3, &mut Xoshiro256PlusPlus::seed_from_u64(SEED), &device);
    assert_eq!(linear.weight.val().dims(), [6, 3]);
  }

  #[test]
  fn dropout_is_identity_in_inference() {
    let x = Tensor::<Autodiff<NdArray>, 2>::ones([4, 8], &NdArrayDevice::Cpu);
    let y = dropout(x.clone(), Mode::Inference);
    assert_eq!(
      x.into_data().to_vec::<f32>().unwrap(),
      y.into_data().to_vec::<f32>().unwrap()
    );
  }

  #[test]
  fn dropout_rescales_survivors() {
    let x = Tensor::<Autodiff<NdArray>, 2>::ones([16, 16], &NdArrayDevice::Cpu);
    let y = dropout(x, Mode::Train { drop_prob: 0.5 });
    let values = y.into_data().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    assert!(values.contains(&0.0));
  }

  #[test]
  fn dropout_needs_autodiff() {
    let x = Tensor::<NdArray, 2>::ones([16, 16], &NdArrayDevice::Cpu);
    let y = dropout(x, Mode::Train { drop_prob: 0.5 });
    assert!(y.into_data().to_vec::<f32>().unwrap().iter().all(|&v| v == 1.0));
  }
}
