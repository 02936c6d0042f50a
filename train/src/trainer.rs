use crate::error::TrainError;
use pilot_config::Config;
use pilot_dataset::Examples;
use pilot_model::model::{Model, TrainableModel, mse};
use pilot_model_burn::{ModelError, StepError};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct EpochStats {
  pub epoch: usize,
  /// Mean total loss of the epoch's optimization steps.
  pub train_loss: f32,
  /// Mean squared error on the test set, `None` if it is empty.
  pub test_loss: Option<f32>,
  /// Mean pre-clip gradient norm of the epoch's steps.
  pub grad_norm: f32,
}

/// Sample-weighted mean squared error of `model` over `examples`.
pub fn evaluate<M>(model: &M, examples: &Examples, batch_size: usize) -> Result<Option<f32>, ModelError>
where
  M: Model<E = ModelError>,
{
  if examples.is_empty() {
    return Ok(None);
  }
  let mut sum = 0.0;
  for (inputs, targets) in examples.batches(batch_size) {
    let outputs = model.predict(inputs)?;
    sum += mse(&outputs, &targets) * targets.nrows() as f32;
  }
  Ok(Some(sum / examples.len() as f32))
}

/// Runs `config.epochs` epochs of mini-batch optimization on `train`.
///
/// Every epoch reshuffles the training set with an rng seeded once from
/// `config.seed`, so runs are reproducible. `checkpoint` is called after every
/// `config.checkpoint_every` epochs. A non-finite loss or gradient aborts the
/// run with [`TrainError::Diverged`] before the offending step is applied.
pub fn fit<M, C>(
  mut model: M,
  train: &Examples,
  test: &Examples,
  config: &Config,
  mut checkpoint: C,
) -> Result<(M, Vec<EpochStats>), TrainError>
where
  M: TrainableModel<E = ModelError, TE = StepError>,
  C: FnMut(&M, usize) -> Result<(), TrainError>,
{
  if train.is_empty() {
    return Err(TrainError::NoTrainingData);
  }
  let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
  let mut history = Vec::with_capacity(config.epochs);

  for epoch in 1..=config.epochs {
    let mut shuffled = train.clone();
    shuffled.shuffle(&mut rng);

    let mut loss_sum = 0.0;
    let mut norm_sum = 0.0;
    let mut steps = 0;
    for (step, (inputs, targets)) in shuffled.batches(config.batch_size).enumerate() {
      model = match model.train(inputs, targets) {
        Ok((model, stats)) => {
          log::debug!(
            "Epoch {epoch}, step {step}: loss {}, task loss {}, regularization loss {}, gradient norm {}",
            stats.loss,
            stats.task_loss,
            stats.regularization_loss,
            stats.grad_norm
          );
          loss_sum += stats.loss;
          norm_sum += stats.grad_norm;
          steps += 1;
          model
        }
        Err(StepError::Diverged(stats)) => {
          log::error!(
            "Non-finite values at epoch {epoch}, step {step}: loss {}, gradient norm {}",
            stats.loss,
            stats.grad_norm
          );
          return Err(TrainError::Diverged {
            epoch,
            step,
            loss: stats.loss,
            grad_norm: stats.grad_norm,
          });
        }
        Err(StepError::Model(e)) => return Err(e.into()),
      };
    }

    let stats = EpochStats {
      epoch,
      train_loss: loss_sum / steps as f32,
      test_loss: evaluate(&model.inference(), test, config.batch_size)?,
      grad_norm: norm_sum / steps as f32,
    };
    match stats.test_loss {
      Some(test_loss) => log::info!(
        "Epoch {epoch}: train loss {:.6}, test loss {test_loss:.6}, gradient norm {:.4}",
        stats.train_loss,
        stats.grad_norm
      ),
      None => log::info!(
        "Epoch {epoch}: train loss {:.6}, gradient norm {:.4}",
        stats.train_loss,
        stats.grad_norm
      ),
    }
    history.push(stats);

    if epoch % config.checkpoint_every == 0 {
      checkpoint(&model, epoch)?;
    }
  }

  Ok((model, history))
}
