use crate::error::DatasetError;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Axis order of the stored images.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Layout {
  /// Row-major `(height, width)`.
  HeightWidth,
  /// Transposed `(width, height)`, as some simulators dump their frames.
  WidthHeight,
}

/// A driving log: grayscale frames with the wheel velocities recorded for them.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DatasetFile {
  pub layout: Layout,
  pub height: u32,
  pub width: u32,
  /// `targets.len()` frames of `height * width` pixels each, stored in `layout` order.
  pub images: Vec<u8>,
  pub targets: Vec<[f32; 2]>,
}

impl DatasetFile {
  pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| DatasetError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    postcard::from_bytes(&bytes).map_err(|source| DatasetError::Decode {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
    let path = path.as_ref();
    let bytes = postcard::to_stdvec(self)?;
    fs::write(path, bytes).map_err(|source| DatasetError::Io {
      path: path.to_path_buf(),
      source,
    })
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.targets.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Converts the log into `(samples, height, width)` frames scaled to
  /// `[0, 1]` and `(samples, 2)` targets, whatever the stored layout was.
  pub fn into_arrays(self, path: &Path) -> Result<(Array3<f32>, Array2<f32>), DatasetError> {
    let samples = self.len();
    let (height, width) = (self.height as usize, self.width as usize);
    let expected = samples.checked_mul(height).and_then(|n| n.checked_mul(width));
    if expected != Some(self.images.len()) {
      return Err(DatasetError::PixelCount {
        path: path.to_path_buf(),
        pixels: self.images.len(),
        samples,
        height,
        width,
      });
    }

    let images = match self.layout {
      Layout::HeightWidth => Array3::from_shape_vec((samples, height, width), self.images)?,
      Layout::WidthHeight => Array3::from_shape_vec((samples, width, height), self.images)?.permuted_axes([0, 2, 1]),
    };
    let images = images.as_standard_layout().mapv(|pixel| f32::from(pixel) / 255.0);
    let targets = Array2::from_shape_vec((samples, 2), self.targets.into_iter().flatten().collect())?;

    Ok((images, targets))
  }
}
