use ndarray::ShapeError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("failed to access {path}: {source}")]
  Io { path: PathBuf, source: io::Error },
  #[error("malformed dataset {path}: {source}")]
  Decode { path: PathBuf, source: postcard::Error },
  #[error("failed to encode dataset: {0}")]
  Encode(#[from] postcard::Error),
  #[error("images of {path} are {actual:?}, expected {expected:?} (height, width)")]
  Dimensions {
    path: PathBuf,
    actual: (usize, usize),
    expected: (usize, usize),
  },
  #[error("{path} holds {pixels} pixels for {samples} samples of {height}x{width}")]
  PixelCount {
    path: PathBuf,
    pixels: usize,
    samples: usize,
    height: usize,
    width: usize,
  },
  #[error("{images} images do not match {targets} targets")]
  Length { images: usize, targets: usize },
  #[error("dataset {0} is empty")]
  Empty(PathBuf),
  #[error("shape error: {0}")]
  Shape(#[from] ShapeError),
}
