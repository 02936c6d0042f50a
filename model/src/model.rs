use ndarray::{Array2, Array4, Zip};

/// Number of predicted velocities: left and right wheel.
pub const OUTPUTS: usize = 2;

/// Maps a batch of stacked grayscale frames `(batch, channels, height, width)`
/// to a batch of `(batch, 2)` wheel commands. Always runs in inference mode.
pub trait Model {
  type E;

  fn predict(&self, inputs: Array4<f32>) -> Result<Array2<f32>, Self::E>;

  /// Mean squared error between predictions and `targets`.
  fn evaluate(&self, inputs: Array4<f32>, targets: &Array2<f32>) -> Result<f32, Self::E> {
    let outputs = self.predict(inputs)?;
    Ok(mse(&outputs, targets))
  }
}

/// Diagnostics of a single optimization step.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct StepStats {
  pub loss: f32,
  pub task_loss: f32,
  pub regularization_loss: f32,
  /// Global gradient norm before clipping.
  pub grad_norm: f32,
}

pub trait TrainableModel: Model + Sized {
  type TE: From<Self::E>;
  /// Detached view used for evaluation.
  type Inference: Model<E = Self::E>;

  /// Snapshot of the current weights, built once and reused for every
  /// evaluation batch.
  fn inference(&self) -> Self::Inference;

  fn train(self, inputs: Array4<f32>, targets: Array2<f32>) -> Result<(Self, StepStats), Self::TE>;
}

pub fn mse(outputs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
  if outputs.is_empty() {
    return 0.0;
  }
  let sum = Zip::from(outputs)
    .and(targets)
    .fold(0.0, |acc, &o, &t| acc + (o - t) * (o - t));
  sum / outputs.len() as f32
}
