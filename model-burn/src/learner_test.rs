use burn::backend::{Autodiff, NdArray, ndarray::NdArrayDevice};
use ndarray::{Array2, Array4};
use pilot_config::{Config, ModelKind};
use pilot_model::model::{Model, TrainableModel};

use crate::{
  cnn96::Cnn96,
  cnn160::Cnn160,
  learner::{ModelError, StepError, learner},
  residual::ResidualNetwork,
};

type B = Autodiff<NdArray>;

fn config(model: ModelKind, height: usize, width: usize) -> Config {
  Config {
    model,
    image_height: height,
    image_width: width,
    learning_rate: 1e-3,
    ..Config::default()
  }
}

macro_rules! train_test {
  ($name:ident, $arch:ident, $kind:expr, $height:expr, $width:expr, $dropout:expr) => {
    #[test]
    fn $name() {
      let config = Config {
        dropout: $dropout,
        ..config($kind, $height, $width)
      };
      let learner = learner::<B, $arch<B>>(&config, &NdArrayDevice::Cpu);

      let inputs = Array4::from_elem((4, 1, $height, $width), 0.5);
      let targets = Array2::from_elem((4, 2), 0.5);

      let outputs_1 = learner.predict(inputs.clone()).unwrap();
      let (learner, stats) = learner.train(inputs.clone(), targets).unwrap();
      let outputs_2 = learner.predict(inputs).unwrap();

      assert_eq!(outputs_1.dim(), (4, 2));
      assert!(stats.loss.is_finite());
      assert!(stats.grad_norm > 0.0);
      assert!((stats.loss - stats.task_loss - stats.regularization_loss).abs() < 1e-3 * stats.loss.max(1.0));
      assert!((outputs_1 - outputs_2).iter().any(|v| v.abs() > 0.0));
    }
  };
}

train_test!(train_residual, ResidualNetwork, ModelKind::Residual, 17, 24, 0.0);
train_test!(train_residual_with_dropout, ResidualNetwork, ModelKind::Residual, 17, 24, 0.5);
train_test!(train_cnn160, Cnn160, ModelKind::Cnn160, 16, 32, 0.0);
train_test!(train_cnn96, Cnn96, ModelKind::Cnn96, 8, 16, 0.0);

#[test]
fn loss_decreases_on_constant_target() {
  let config = Config {
    regularization_coefficient: 0.0,
    ..config(ModelKind::Cnn96, 8, 8)
  };
  let mut learner = learner::<B, Cnn96<B>>(&config, &NdArrayDevice::Cpu);
  let inputs = Array4::from_elem((8, 1, 8, 8), 1.0);
  let targets = Array2::from_elem((8, 2), 0.5);

  let initial = learner.evaluate(inputs.clone(), &targets).unwrap();
  for _ in 0..50 {
    learner = learner.train(inputs.clone(), targets.clone()).unwrap().0;
  }
  let trained = learner.evaluate(inputs, &targets).unwrap();
  assert!(trained < initial, "{trained} >= {initial}");
}

#[test]
fn non_finite_loss_is_divergence() {
  let learner = learner::<B, Cnn96<B>>(&config(ModelKind::Cnn96, 8, 8), &NdArrayDevice::Cpu);
  let inputs = Array4::zeros((2, 1, 8, 8));
  let targets = Array2::from_elem((2, 2), f32::NAN);
  match learner.train(inputs, targets) {
    Err(StepError::Diverged(stats)) => assert!(!stats.loss.is_finite()),
    Err(e) => panic!("unexpected error {e}"),
    Ok(_) => panic!("NaN loss was accepted"),
  }
}

#[test]
fn mismatched_input_is_rejected() {
  let learner = learner::<B, Cnn96<B>>(&config(ModelKind::Cnn96, 8, 8), &NdArrayDevice::Cpu);
  let result = learner.predict(Array4::zeros((1, 2, 8, 8)));
  assert!(matches!(
    result,
    Err(ModelError::Input {
      expected: (1, 8, 8),
      actual: (2, 8, 8),
    })
  ));
}

#[test]
fn batch_norm_statistics_follow_training_steps() {
  let config = config(ModelKind::Cnn160, 16, 32);
  let learner = learner::<B, Cnn160<B>>(&config, &NdArrayDevice::Cpu);
  let inputs = Array4::from_shape_fn((4, 1, 16, 32), |(n, _, h, w)| (n * 7 + h + w) as f32 / 64.0);
  let targets = Array2::from_elem((4, 2), 0.5);

  let initial = learner.predictor.model.running_statistics();
  let outputs_1 = learner.predict(inputs.clone()).unwrap();
  let outputs_2 = learner.predict(inputs.clone()).unwrap();
  assert_eq!(outputs_1, outputs_2);
  assert_eq!(learner.predictor.model.running_statistics(), initial);

  let (learner, _) = learner.train(inputs.clone(), targets).unwrap();
  let trained = learner.predictor.model.running_statistics();
  assert_ne!(trained, initial);

  // inference normalizes with the accumulated statistics, so a sample does
  // not depend on the rest of its batch
  let valid = learner.valid();
  assert_eq!(valid.model.running_statistics(), trained);
  let batch = valid.predict(inputs.clone()).unwrap();
  let single = valid.predict(inputs.slice(ndarray::s![1..2, .., .., ..]).to_owned()).unwrap();
  assert!((batch.row(1).to_owned() - single.row(0)).iter().all(|v| v.abs() < 1e-5));
  assert_eq!(learner.predictor.model.running_statistics(), trained);
}

#[test]
fn learner_outlives_its_config() {
  let learner = {
    let config = config(ModelKind::Cnn96, 8, 8);
    learner::<B, Cnn96<B>>(&config, &NdArrayDevice::Cpu)
  };
  let outputs = learner.predict(Array4::zeros((1, 1, 8, 8))).unwrap();
  assert_eq!(outputs.dim(), (1, 2));
}
