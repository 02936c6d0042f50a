use crate::{Config, ConfigError, ModelKind};
use clap::{Arg, ArgGroup, ArgMatches, value_parser};
use std::path::PathBuf;

pub fn groups() -> [ArgGroup; 2] {
  [
    ArgGroup::new("Optimization")
      .args([
        "batch-size",
        "epochs",
        "learning-rate",
        "regularization",
        "clip-norm",
        "adam-epsilon",
        "dropout",
        "checkpoint-every",
      ])
      .multiple(true),
    ArgGroup::new("Data")
      .args([
        "data-dir",
        "real-dataset",
        "sim-dataset",
        "max-samples",
        "train-fraction",
      ])
      .multiple(true),
  ]
}

pub fn args() -> [Arg; 18] {
  let defaults = Config::default();
  [
    Arg::new("architecture")
      .short('a')
      .long("architecture")
      .help("Network architecture: CNNResidualNetwork, CNN160Model or CNN96Model")
      .num_args(1)
      .default_value(defaults.model.to_string()),
    Arg::new("batch-size")
      .short('b')
      .long("batch-size")
      .help("Number of samples per optimization step")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.batch_size.to_string()),
    Arg::new("epochs")
      .short('e')
      .long("epochs")
      .help("Number of passes over the training set")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.epochs.to_string()),
    Arg::new("learning-rate")
      .long("learning-rate")
      .help("Adam learning rate")
      .num_args(1)
      .value_parser(value_parser!(f64))
      .default_value(defaults.learning_rate.to_string()),
    Arg::new("regularization")
      .long("regularization")
      .help("Coefficient of the L2 penalty on the regularized kernels")
      .num_args(1)
      .value_parser(value_parser!(f64))
      .default_value(defaults.regularization_coefficient.to_string()),
    Arg::new("clip-norm")
      .long("clip-norm")
      .help("Ceiling of the global gradient norm")
      .num_args(1)
      .value_parser(value_parser!(f64))
      .default_value(defaults.clip_norm.to_string()),
    Arg::new("adam-epsilon")
      .long("adam-epsilon")
      .help("Epsilon of the Adam optimizer")
      .num_args(1)
      .value_parser(value_parser!(f32))
      .default_value(defaults.adam_epsilon.to_string()),
    Arg::new("dropout")
      .long("dropout")
      .help("Dropout probability inside the residual block. Zero disables dropout")
      .num_args(1)
      .value_parser(value_parser!(f64))
      .default_value(defaults.dropout.to_string()),
    Arg::new("checkpoint-every")
      .long("checkpoint-every")
      .help("Save a checkpoint after every this many epochs")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.checkpoint_every.to_string()),
    Arg::new("image-height")
      .long("image-height")
      .help("Height of the grayscale model input")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.image_height.to_string()),
    Arg::new("image-width")
      .long("image-width")
      .help("Width of the grayscale model input")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.image_width.to_string()),
    Arg::new("input-offsets")
      .long("input-offsets")
      .help(
        "Frame offsets stacked into a single model input, 0 being the newest frame \
         and -1 the previous one. Listed in channel order",
      )
      .num_args(1..)
      .allow_negative_numbers(true)
      .value_parser(value_parser!(i32))
      .default_values(defaults.input_offsets.iter().map(|offset| offset.to_string())),
    Arg::new("seed")
      .long("seed")
      .help("Seed of the data split, shuffling and weight initialization")
      .num_args(1)
      .value_parser(value_parser!(u64))
      .default_value(defaults.seed.to_string()),
    Arg::new("data-dir")
      .long("data-dir")
      .help("Directory with the dataset files")
      .num_args(1)
      .value_parser(value_parser!(PathBuf))
      .default_value(defaults.data_dir.display().to_string()),
    Arg::new("real-dataset")
      .long("real-dataset")
      .help("File name of the real-world dataset inside the data directory")
      .num_args(1)
      .default_value(defaults.real_dataset),
    Arg::new("sim-dataset")
      .long("sim-dataset")
      .help("File name of the simulated dataset inside the data directory")
      .num_args(1)
      .default_value(defaults.sim_dataset),
    Arg::new("max-samples")
      .long("max-samples")
      .help("Each dataset is truncated to this number of samples")
      .num_args(1)
      .value_parser(value_parser!(usize))
      .default_value(defaults.max_samples.to_string()),
    Arg::new("train-fraction")
      .long("train-fraction")
      .help("Fraction of every dataset used for training, the rest is used for validation")
      .num_args(1)
      .value_parser(value_parser!(f64))
      .default_value(defaults.train_fraction.to_string()),
  ]
}

/// Builds a validated configuration from matches of [`args`].
pub fn parse_config(matches: &ArgMatches) -> Result<Config, ConfigError> {
  let defaults = Config::default();
  let model = ModelKind::parse(matches.get_one::<String>("architecture").unwrap())?;
  let config = Config {
    batch_size: matches.get_one("batch-size").copied().unwrap(),
    epochs: matches.get_one("epochs").copied().unwrap(),
    learning_rate: matches.get_one("learning-rate").copied().unwrap(),
    regularization_coefficient: matches.get_one("regularization").copied().unwrap(),
    image_height: matches.get_one("image-height").copied().unwrap(),
    image_width: matches.get_one("image-width").copied().unwrap(),
    model,
    seed: matches.get_one("seed").copied().unwrap(),
    input_offsets: matches.get_many("input-offsets").unwrap().copied().collect(),
    train_fraction: matches.get_one("train-fraction").copied().unwrap(),
    max_samples: matches.get_one("max-samples").copied().unwrap(),
    clip_norm: matches.get_one("clip-norm").copied().unwrap(),
    adam_epsilon: matches.get_one("adam-epsilon").copied().unwrap(),
    dropout: matches.get_one("dropout").copied().unwrap(),
    checkpoint_every: matches.get_one("checkpoint-every").copied().unwrap(),
    data_dir: matches.get_one::<PathBuf>("data-dir").cloned().unwrap(),
    real_dataset: matches.get_one::<String>("real-dataset").cloned().unwrap(),
    sim_dataset: matches.get_one::<String>("sim-dataset").cloned().unwrap(),
    models_root: defaults.models_root,
  };
  config.validate()?;
  Ok(config)
}
