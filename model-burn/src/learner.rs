use burn::{
  module::AutodiffModule,
  nn::loss::{MseLoss, Reduction},
  optim::{AdamConfig, GradientsParams, Optimizer},
  tensor::{
    DataError, ElementConversion, Tensor, TensorData,
    backend::{AutodiffBackend, Backend},
  },
};
use derive_more::From;
use ndarray::{Array, Array2, Array4, Dimension, ShapeError};
use pilot_config::Config;
use pilot_model::model::{Model, OUTPUTS, StepStats, TrainableModel};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use crate::{
  architecture::{Architecture, InputShape},
  clip::clip_by_global_norm,
  layers::Mode,
};

pub struct Predictor<B: Backend, A> {
  pub model: A,
  pub shape: InputShape,
  pub device: B::Device,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Hyperparameters {
  pub learning_rate: f64,
  pub regularization: f64,
  pub clip_norm: f64,
  pub dropout: f64,
}

impl Hyperparameters {
  pub fn from_config(config: &Config) -> Self {
    Self {
      learning_rate: config.learning_rate,
      regularization: config.regularization_coefficient,
      clip_norm: config.clip_norm,
      dropout: config.dropout,
    }
  }
}

pub struct Learner<B: AutodiffBackend, A, O> {
  pub predictor: Predictor<B, A>,
  pub optimizer: O,
  pub hyperparameters: Hyperparameters,
}

#[derive(Error, Debug, From)]
pub enum ModelError {
  #[error("shape error")]
  ShapeError(ShapeError),
  #[error("data error")]
  DataError(DataError),
  #[error("input of shape {actual:?} does not match the network input {expected:?}")]
  Input {
    expected: (usize, usize, usize),
    actual: (usize, usize, usize),
  },
}

#[derive(Error, Debug)]
pub enum StepError {
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error("non-finite loss {} or gradient norm {}", .0.loss, .0.grad_norm)]
  Diverged(StepStats),
}

pub fn into_data_vec<A: Clone, D: Dimension>(array: Array<A, D>) -> Vec<A> {
  let (mut vec, offset) = if array.is_standard_layout() {
    array.into_raw_vec_and_offset()
  } else {
    array.as_standard_layout().to_owned().into_raw_vec_and_offset()
  };
  if let Some(offset) = offset {
    vec.drain(0..offset);
  }
  vec
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
  tensor.into_scalar().elem::<f32>()
}

impl<B: Backend, A: Architecture<B>> Predictor<B, A> {
  fn images(&self, inputs: Array4<f32>) -> Result<Tensor<B, 4>, ModelError> {
    let (batch, channels, height, width) = inputs.dim();
    if (channels, height, width) != self.shape.dims() {
      return Err(ModelError::Input {
        expected: self.shape.dims(),
        actual: (channels, height, width),
      });
    }
    Ok(Tensor::from_data(
      TensorData::new(into_data_vec(inputs), [batch, channels, height, width]),
      &self.device,
    ))
  }
}

impl<B: Backend, A: Architecture<B>> Model for Predictor<B, A> {
  type E = ModelError;

  fn predict(&self, inputs: Array4<f32>) -> Result<Array2<f32>, Self::E> {
    let batch = inputs.dim().0;
    let outputs = self.model.forward(self.images(inputs)?, Mode::Inference);
    let outputs = outputs.into_data().convert::<f32>().into_vec::<f32>()?;
    Ok(Array2::from_shape_vec((batch, OUTPUTS), outputs)?)
  }
}

/// Builds a freshly initialized network and an Adam optimizer from `config`.
pub fn learner<B, A>(config: &Config, device: &B::Device) -> Learner<B, A, impl Optimizer<A, B> + use<B, A>>
where
  B: AutodiffBackend,
  A: Architecture<B> + AutodiffModule<B>,
{
  let shape = InputShape::from_config(config);
  let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
  let model = A::init(shape, &mut rng, device);
  let optimizer = AdamConfig::new().with_epsilon(config.adam_epsilon).init::<B, A>();
  Learner {
    predictor: Predictor {
      model,
      shape,
      device: device.clone(),
    },
    optimizer,
    hyperparameters: Hyperparameters::from_config(config),
  }
}

impl<B, A, O> Learner<B, A, O>
where
  B: AutodiffBackend,
  A: Architecture<B> + AutodiffModule<B>,
  A::InnerModule: Architecture<B::InnerBackend>,
{
  /// Inference view of the network: running batch-norm statistics, no
  /// dropout, no gradient tracking.
  pub fn valid(&self) -> Predictor<B::InnerBackend, A::InnerModule> {
    Predictor {
      model: self.predictor.model.valid(),
      shape: self.predictor.shape,
      device: self.predictor.device.clone(),
    }
  }
}

impl<B, A, O> Model for Learner<B, A, O>
where
  B: AutodiffBackend,
  A: Architecture<B> + AutodiffModule<B>,
  A::InnerModule: Architecture<B::InnerBackend>,
{
  type E = ModelError;

  fn predict(&self, inputs: Array4<f32>) -> Result<Array2<f32>, Self::E> {
    self.valid().predict(inputs)
  }
}

impl<B, A, O> TrainableModel for Learner<B, A, O>
where
  B: AutodiffBackend,
  A: Architecture<B> + AutodiffModule<B>,
  A::InnerModule: Architecture<B::InnerBackend>,
  O: Optimizer<A, B>,
{
  type TE = StepError;
  type Inference = Predictor<B::InnerBackend, A::InnerModule>;

  fn inference(&self) -> Self::Inference {
    self.valid()
  }

  fn train(mut self, inputs: Array4<f32>, targets: Array2<f32>) -> Result<(Self, StepStats), Self::TE> {
    let batch = targets.nrows();
    let inputs = self.predictor.images(inputs)?;
    let targets = Tensor::from_data(
      TensorData::new(into_data_vec(targets), [batch, OUTPUTS]),
      &self.predictor.device,
    );

    let mode = Mode::Train {
      drop_prob: self.hyperparameters.dropout,
    };
    let outputs = self.predictor.model.forward(inputs, mode);
    let task_loss = MseLoss::new().forward(outputs, targets, Reduction::Mean);
    let regularization_loss = self
      .predictor
      .model
      .l2()
      .mul_scalar(self.hyperparameters.regularization);
    let loss = task_loss.clone() + regularization_loss.clone();

    let mut stats = StepStats {
      loss: scalar(loss.clone()),
      task_loss: scalar(task_loss),
      regularization_loss: scalar(regularization_loss),
      grad_norm: 0.0,
    };

    let mut grads = GradientsParams::from_grads(loss.backward(), &self.predictor.model);
    let grad_norm = clip_by_global_norm(&self.predictor.model, &mut grads, self.hyperparameters.clip_norm);
    stats.grad_norm = grad_norm as f32;
    if !stats.loss.is_finite() || !grad_norm.is_finite() {
      return Err(StepError::Diverged(stats));
    }

    self.predictor.model = self
      .optimizer
      .step(self.hyperparameters.learning_rate, self.predictor.model, grads);

    Ok((self, stats))
  }
}
