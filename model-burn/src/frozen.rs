use std::{
  collections::BTreeMap,
  fs, io,
  path::{Path, PathBuf},
};

use burn::{
  module::Module,
  record::{BinFileRecorder, FullPrecisionSettings},
  tensor::backend::Backend,
};
use ndarray::{Array2, Array4};
use pilot_config::{ConfigError, ModelKind};
use pilot_model::model::{Model, OUTPUTS};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  architecture::{Architecture, InputShape},
  cnn96::Cnn96,
  cnn160::Cnn160,
  learner::{ModelError, Predictor},
  residual::ResidualNetwork,
};

pub const MANIFEST_FILE: &str = "frozen_graph.json";
pub const WEIGHTS_FILE: &str = "frozen_graph.bin";

/// Flattened image batch, `[-1, C * H * W]`.
pub const INPUT: &str = "x";
/// Scalar batch size.
pub const BATCH_SIZE: &str = "batch_size";
/// Scalar dropout probability, ignored at inference.
pub const DROP_PROB: &str = "drop_prob";
/// Wheel commands, `[-1, 2]`.
pub const OUTPUT: &str = "output";

#[derive(Error, Debug)]
pub enum FrozenGraphError {
  #[error("failed to access {path}: {source}")]
  Io { path: PathBuf, source: io::Error },
  #[error("malformed manifest {path}: {source}")]
  Manifest { path: PathBuf, source: serde_json::Error },
  #[error("frozen graph has no {0:?} tensor")]
  MissingTensor(String),
  #[error("tensor {name:?} has shape {actual:?}, expected {expected:?}")]
  TensorShape {
    name: String,
    actual: Vec<i64>,
    expected: Vec<i64>,
  },
  #[error("{channels} input channels but {offsets} input offsets")]
  Offsets { channels: usize, offsets: usize },
  #[error("fed {name:?} with shape {actual:?}, expected {expected:?}")]
  Feed {
    name: &'static str,
    actual: Vec<usize>,
    expected: Vec<usize>,
  },
  #[error("failed to read or write weights {path}: {message}")]
  Record { path: PathBuf, message: String },
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Model(#[from] ModelError),
}

/// Describes the named entry points of a frozen graph and how to rebuild it.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Manifest {
  pub architecture: ModelKind,
  pub input: InputShape,
  pub input_offsets: Vec<i32>,
  /// Tensor name to shape, `-1` marks the batch dimension.
  pub tensors: BTreeMap<String, Vec<i64>>,
}

fn expected_tensors(input: InputShape) -> [(&'static str, Vec<i64>); 4] {
  [
    (INPUT, vec![-1, input.flat_len() as i64]),
    (BATCH_SIZE, Vec::new()),
    (DROP_PROB, Vec::new()),
    (OUTPUT, vec![-1, OUTPUTS as i64]),
  ]
}

impl Manifest {
  pub fn new(architecture: ModelKind, input: InputShape, input_offsets: Vec<i32>) -> Self {
    let tensors = expected_tensors(input)
      .into_iter()
      .map(|(name, shape)| (name.to_string(), shape))
      .collect();
    Self {
      architecture,
      input,
      input_offsets,
      tensors,
    }
  }

  pub fn validate(&self) -> Result<(), FrozenGraphError> {
    for (name, expected) in expected_tensors(self.input) {
      let actual = self
        .tensors
        .get(name)
        .ok_or_else(|| FrozenGraphError::MissingTensor(name.to_string()))?;
      if *actual != expected {
        return Err(FrozenGraphError::TensorShape {
          name: name.to_string(),
          actual: actual.clone(),
          expected,
        });
      }
    }
    if self.input_offsets.len() != self.input.channels {
      return Err(FrozenGraphError::Offsets {
        channels: self.input.channels,
        offsets: self.input_offsets.len(),
      });
    }
    if let Some(&offset) = self.input_offsets.iter().find(|&&offset| offset > 0) {
      return Err(ConfigError::FutureOffset(offset).into());
    }
    self.input.check(self.architecture)?;
    Ok(())
  }

  pub fn memory_size(&self) -> usize {
    pilot_config::memory_size(&self.input_offsets)
  }

  pub fn read(dir: &Path) -> Result<Self, FrozenGraphError> {
    let path = dir.join(MANIFEST_FILE);
    let file = fs::File::open(&path).map_err(|source| FrozenGraphError::Io {
      path: path.clone(),
      source,
    })?;
    serde_json::from_reader(io::BufReader::new(file)).map_err(|source| FrozenGraphError::Manifest { path, source })
  }

  pub fn write(&self, dir: &Path) -> Result<(), FrozenGraphError> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(self).map_err(|source| FrozenGraphError::Manifest {
      path: path.clone(),
      source,
    })?;
    fs::write(&path, json).map_err(|source| FrozenGraphError::Io { path, source })
  }
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
  BinFileRecorder::<FullPrecisionSettings>::new()
}

/// Writes the parameters of `module` to `path` with full precision.
pub fn save_weights<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<(), FrozenGraphError> {
  module
    .clone()
    .save_file(path, &recorder())
    .map_err(|e| FrozenGraphError::Record {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
}

fn restore<B: Backend, A: Architecture<B>>(
  path: &Path,
  shape: InputShape,
  device: &B::Device,
) -> Result<Predictor<B, A>, FrozenGraphError> {
  // Parameters are overwritten by the record, the seed only fixes the shapes.
  let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
  let model = A::init(shape, &mut rng, device)
    .load_file(path, &recorder(), device)
    .map_err(|e| FrozenGraphError::Record {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
  Ok(Predictor {
    model,
    shape,
    device: device.clone(),
  })
}

/// Persists a trained network as a frozen graph under `dir`.
pub fn freeze<B: Backend, A: Architecture<B>>(
  dir: &Path,
  predictor: &Predictor<B, A>,
  input_offsets: &[i32],
) -> Result<Manifest, FrozenGraphError> {
  let manifest = Manifest::new(A::KIND, predictor.shape, input_offsets.to_vec());
  manifest.validate()?;
  fs::create_dir_all(dir).map_err(|source| FrozenGraphError::Io {
    path: dir.to_path_buf(),
    source,
  })?;
  manifest.write(dir)?;
  save_weights(&predictor.model, &dir.join(WEIGHTS_FILE))?;
  log::info!("Froze {} graph to {}", A::KIND, dir.display());
  Ok(manifest)
}

enum Network<B: Backend> {
  Residual(Predictor<B, ResidualNetwork<B>>),
  Cnn160(Predictor<B, Cnn160<B>>),
  Cnn96(Predictor<B, Cnn96<B>>),
}

/// A read-only network restored from disk, driven through its named tensors.
pub struct FrozenGraph<B: Backend> {
  manifest: Manifest,
  network: Network<B>,
}

impl<B: Backend> FrozenGraph<B> {
  pub fn load(dir: &Path, device: &B::Device) -> Result<Self, FrozenGraphError> {
    let manifest = Manifest::read(dir)?;
    manifest.validate()?;
    let weights = dir.join(WEIGHTS_FILE);
    let network = match manifest.architecture {
      ModelKind::Residual => Network::Residual(restore(&weights, manifest.input, device)?),
      ModelKind::Cnn160 => Network::Cnn160(restore(&weights, manifest.input, device)?),
      ModelKind::Cnn96 => Network::Cnn96(restore(&weights, manifest.input, device)?),
    };
    log::info!("Loaded {} graph from {}", manifest.architecture, dir.display());
    Ok(Self { manifest, network })
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  /// Feeds `x`, `batch_size` and `drop_prob` and fetches `output`. The
  /// dropout probability is accepted for interface compatibility and has no
  /// effect.
  pub fn run(&self, x: Array2<f32>, batch_size: usize, _drop_prob: f32) -> Result<Array2<f32>, FrozenGraphError> {
    let input = self.manifest.input;
    if x.dim() != (batch_size, input.flat_len()) {
      return Err(FrozenGraphError::Feed {
        name: INPUT,
        actual: x.shape().to_vec(),
        expected: vec![batch_size, input.flat_len()],
      });
    }
    let images = x
      .as_standard_layout()
      .into_owned()
      .into_shape_with_order((batch_size, input.channels, input.height, input.width))
      .map_err(ModelError::from)?;
    let outputs = match &self.network {
      Network::Residual(predictor) => predictor.predict(images),
      Network::Cnn160(predictor) => predictor.predict(images),
      Network::Cnn96(predictor) => predictor.predict(images),
    }?;
    Ok(outputs)
  }
}

/// Flattens the stacked frames into `x` and runs the graph with no dropout.
impl<B: Backend> Model for FrozenGraph<B> {
  type E = FrozenGraphError;

  fn predict(&self, inputs: Array4<f32>) -> Result<Array2<f32>, Self::E> {
    let (batch, channels, height, width) = inputs.dim();
    let expected = self.manifest.input.dims();
    if (channels, height, width) != expected {
      return Err(
        ModelError::Input {
          expected,
          actual: (channels, height, width),
        }
        .into(),
      );
    }
    let x = inputs
      .as_standard_layout()
      .into_owned()
      .into_shape_with_order((batch, channels * height * width))
      .map_err(ModelError::from)?;
    self.run(x, batch, 0.0)
  }
}
