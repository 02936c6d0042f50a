use crate::error::DatasetError;
use ndarray::{Array2, Array3, Array4, Axis, s};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Training samples: stacked frames `(samples, channels, height, width)`
/// with their `(samples, 2)` target velocities.
#[derive(Clone, PartialEq, Debug)]
pub struct Examples {
  pub images: Array4<f32>,
  pub targets: Array2<f32>,
}

impl Examples {
  pub fn new(images: Array4<f32>, targets: Array2<f32>) -> Result<Self, DatasetError> {
    if images.len_of(Axis(0)) != targets.nrows() {
      return Err(DatasetError::Length {
        images: images.len_of(Axis(0)),
        targets: targets.nrows(),
      });
    }
    Ok(Self { images, targets })
  }

  /// Stacks every frame with its predecessors at `offsets`, in the order of
  /// `offsets`. History before the first frame repeats the first frame.
  pub fn from_frames(frames: Array3<f32>, targets: Array2<f32>, offsets: &[i32]) -> Result<Self, DatasetError> {
    let (samples, height, width) = frames.dim();
    if *offsets == [0] {
      return Self::new(frames.insert_axis(Axis(1)), targets);
    }

    let mut images = Array4::zeros((samples, offsets.len(), height, width));
    for i in 0..samples {
      for (channel, &offset) in offsets.iter().enumerate() {
        let j = (i as isize + offset as isize).max(0) as usize;
        images.slice_mut(s![i, channel, .., ..]).assign(&frames.slice(s![j, .., ..]));
      }
    }
    Self::new(images, targets)
  }

  /// Concatenates `parts` in order.
  pub fn concat(parts: &[&Examples]) -> Result<Self, DatasetError> {
    let images = ndarray::concatenate(
      Axis(0),
      parts.iter().map(|part| part.images.view()).collect::<Vec<_>>().as_slice(),
    )?;
    let targets = ndarray::concatenate(
      Axis(0),
      parts.iter().map(|part| part.targets.view()).collect::<Vec<_>>().as_slice(),
    )?;
    Self::new(images, targets)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.targets.nrows()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `(channels, height, width)` of a single sample.
  #[inline]
  pub fn sample_dim(&self) -> (usize, usize, usize) {
    let (_, channels, height, width) = self.images.dim();
    (channels, height, width)
  }

  pub fn select(&self, indices: &[usize]) -> Self {
    Self {
      images: self.images.select(Axis(0), indices),
      targets: self.targets.select(Axis(0), indices),
    }
  }

  /// Splits into disjoint `(train, test)` parts. The train part gets
  /// `floor(fraction * len)` samples drawn by a permutation seeded with `seed`.
  pub fn split(&self, fraction: f64, seed: u64) -> (Self, Self) {
    let train_len = ((self.len() as f64 * fraction).floor() as usize).min(self.len());
    let mut indices = (0..self.len()).collect::<Vec<_>>();
    indices.shuffle(&mut Xoshiro256PlusPlus::seed_from_u64(seed));
    let (train, test) = indices.split_at(train_len);
    (self.select(train), self.select(test))
  }

  pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
    let mut indices = (0..self.len()).collect::<Vec<_>>();
    indices.shuffle(rng);
    *self = self.select(&indices);
  }

  /// Consecutive batches of `size` samples. The last one may be smaller.
  pub fn batches(&self, size: usize) -> impl Iterator<Item = (Array4<f32>, Array2<f32>)> + '_ {
    let size = size.max(1);
    (0..self.len()).step_by(size).map(move |start| {
      let end = (start + size).min(self.len());
      (
        self.images.slice(s![start..end, .., .., ..]).to_owned(),
        self.targets.slice(s![start..end, ..]).to_owned(),
      )
    })
  }
}
