use crate::{
  error::TrainError,
  trainer::{EpochStats, fit},
};
use burn::module::AutodiffModule;
use pilot_config::{Config, ModelKind};
use pilot_dataset::Examples;
use pilot_model_burn::{
  Architecture, Cnn96, Cnn160, InferenceBackend, ResidualNetwork, TrainBackend,
  frozen::{freeze, save_weights},
  learner,
};
use std::{
  fs,
  path::{Path, PathBuf},
};

pub const LOG_FILE: &str = "log.txt";
pub const CONFIG_FILE: &str = "config.json";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TrainError + '_ {
  move |source| TrainError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Creates an empty `<models_root>/<name>` directory, removing any previous
/// run with the same name.
pub fn prepare_run_dir(config: &Config, name: &str) -> Result<PathBuf, TrainError> {
  let dir = config.run_dir(name)?;
  if dir.exists() {
    log::warn!("Removing the previous run {}", dir.display());
    fs::remove_dir_all(&dir).map_err(io_error(&dir))?;
  }
  fs::create_dir_all(&dir).map_err(io_error(&dir))?;
  Ok(dir)
}

/// Records the hyperparameters in effect next to the run's artifacts.
pub fn write_config(dir: &Path, config: &Config) -> Result<(), TrainError> {
  let path = dir.join(CONFIG_FILE);
  let json = serde_json::to_string_pretty(config)?;
  fs::write(&path, json).map_err(io_error(&path))
}

pub fn checkpoint_path(dir: &Path, epoch: usize) -> PathBuf {
  dir.join(format!("checkpoint-{epoch}.bin"))
}

fn train_architecture<A>(
  config: &Config,
  dir: &Path,
  train: &Examples,
  test: &Examples,
) -> Result<Vec<EpochStats>, TrainError>
where
  A: Architecture<TrainBackend> + AutodiffModule<TrainBackend>,
  A::InnerModule: Architecture<InferenceBackend>,
{
  let device = Default::default();
  let learner = learner::<TrainBackend, A>(config, &device);
  let (learner, history) = fit(learner, train, test, config, |learner, epoch| {
    let path = checkpoint_path(dir, epoch);
    save_weights(&learner.predictor.model, &path)?;
    log::info!("Saved checkpoint {}", path.display());
    Ok(())
  })?;
  freeze(dir, &learner.valid(), &config.input_offsets)?;
  Ok(history)
}

/// Trains the configured architecture and leaves its frozen graph in `dir`.
pub fn train_model(
  config: &Config,
  dir: &Path,
  train: &Examples,
  test: &Examples,
) -> Result<Vec<EpochStats>, TrainError> {
  log::info!(
    "Training {} on {} samples, validating on {}",
    config.model,
    train.len(),
    test.len()
  );
  match config.model {
    ModelKind::Residual => train_architecture::<ResidualNetwork<TrainBackend>>(config, dir, train, test),
    ModelKind::Cnn160 => train_architecture::<Cnn160<TrainBackend>>(config, dir, train, test),
    ModelKind::Cnn96 => train_architecture::<Cnn96<TrainBackend>>(config, dir, train, test),
  }
}
