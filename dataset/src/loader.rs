use crate::{error::DatasetError, examples::Examples, file::DatasetFile};
use ndarray::{Array2, Array3, s};
use pilot_config::Config;
use std::{fmt, path::Path};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
  Real,
  Sim,
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Source::Real => write!(f, "real"),
      Source::Sim => write!(f, "sim"),
    }
  }
}

/// Frames of a single source, in recording order.
#[derive(Clone, Debug)]
pub struct SourceData {
  pub source: Source,
  pub images: Array3<f32>,
  pub targets: Array2<f32>,
}

impl SourceData {
  #[inline]
  pub fn len(&self) -> usize {
    self.targets.nrows()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn load_source(source: Source, path: &Path, config: &Config) -> Result<SourceData, DatasetError> {
  let file = DatasetFile::read(path)?;
  if file.is_empty() {
    return Err(DatasetError::Empty(path.to_path_buf()));
  }
  let (images, targets) = file.into_arrays(path)?;

  let (samples, height, width) = images.dim();
  let expected = (config.image_height, config.image_width);
  if (height, width) != expected {
    return Err(DatasetError::Dimensions {
      path: path.to_path_buf(),
      actual: (height, width),
      expected,
    });
  }

  let len = samples.min(config.max_samples);
  if len < samples {
    log::info!("Truncating the {} dataset from {} to {} samples", source, samples, len);
  }
  Ok(SourceData {
    source,
    images: images.slice(s![..len, .., ..]).to_owned(),
    targets: targets.slice(s![..len, ..]).to_owned(),
  })
}

pub fn load_real<P: AsRef<Path>>(path: P, config: &Config) -> Result<SourceData, DatasetError> {
  load_source(Source::Real, path.as_ref(), config)
}

pub fn load_sim<P: AsRef<Path>>(path: P, config: &Config) -> Result<SourceData, DatasetError> {
  load_source(Source::Sim, path.as_ref(), config)
}

fn split_source(data: SourceData, config: &Config) -> Result<(Examples, Examples), DatasetError> {
  let source = data.source;
  let examples = Examples::from_frames(data.images, data.targets, &config.input_offsets)?;
  let (train, test) = examples.split(config.train_fraction, config.seed);
  log::info!(
    "The {} dataset split is {} in train, {} in test",
    source,
    train.len(),
    test.len()
  );
  Ok((train, test))
}

/// Loads both sources, splits each of them separately and concatenates the
/// parts, real samples first. Returns `(train, test)`.
pub fn read_data(config: &Config) -> Result<(Examples, Examples), DatasetError> {
  log::info!("Reading the real dataset");
  let real = load_real(config.real_dataset_path(), config)?;
  log::info!("Reading the sim dataset");
  let sim = load_sim(config.sim_dataset_path(), config)?;

  let (real_train, real_test) = split_source(real, config)?;
  let (sim_train, sim_test) = split_source(sim, config)?;

  let train = Examples::concat(&[&real_train, &sim_train])?;
  let test = Examples::concat(&[&real_test, &sim_test])?;
  log::info!("Overall split is {} in train, {} in test", train.len(), test.len());

  Ok((train, test))
}
