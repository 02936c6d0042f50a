pub mod architecture;
pub mod clip;
pub mod cnn160;
pub mod cnn96;
pub mod frozen;
pub mod layers;
pub mod learner;
pub mod residual;

#[cfg(test)]
mod learner_test;

pub use architecture::{Architecture, InputShape};
pub use cnn96::Cnn96;
pub use cnn160::Cnn160;
pub use frozen::{FrozenGraph, FrozenGraphError, Manifest};
pub use layers::Mode;
pub use learner::{Hyperparameters, Learner, ModelError, Predictor, StepError, learner};
pub use residual::ResidualNetwork;

/// Backend used for inference and checkpoint loading.
pub type InferenceBackend = burn::backend::NdArray;
/// Backend used for training.
pub type TrainBackend = burn::backend::Autodiff<InferenceBackend>;
