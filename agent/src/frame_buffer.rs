use ndarray::{Array2, Array3, Axis, stack};
use std::collections::VecDeque;

/// Most recent preprocessed frames, oldest first.
#[derive(Clone, PartialEq, Debug)]
pub struct FrameBuffer {
  frames: VecDeque<Array2<f32>>,
  capacity: usize,
}

impl FrameBuffer {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      frames: VecDeque::with_capacity(capacity + 1),
      capacity,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  /// Appends `frame`, evicting the oldest ones beyond capacity. Missing
  /// history is filled with copies of `frame`, so the buffer is always full
  /// afterwards.
  pub fn push(&mut self, frame: Array2<f32>) {
    while self.frames.len() + 1 < self.capacity {
      self.frames.push_back(frame.clone());
    }
    self.frames.push_back(frame);
    while self.frames.len() > self.capacity {
      self.frames.pop_front();
    }
  }

  /// Frame `offset` steps before the newest one, `0` being the newest.
  pub fn get(&self, offset: i32) -> Option<&Array2<f32>> {
    let index = self.frames.len() as i64 - 1 + offset as i64;
    usize::try_from(index).ok().and_then(|index| self.frames.get(index))
  }

  /// Frames at `offsets` stacked along a leading channel axis in the order
  /// of `offsets`. `None` if some offset reaches past the stored history.
  pub fn gather(&self, offsets: &[i32]) -> Option<Array3<f32>> {
    let views = offsets
      .iter()
      .map(|&offset| self.get(offset).map(|frame| frame.view()))
      .collect::<Option<Vec<_>>>()?;
    stack(Axis(0), &views).ok()
  }
}

#[cfg(test)]
mod tests {
  use super::FrameBuffer;
  use ndarray::Array2;

  fn frame(value: f32) -> Array2<f32> {
    Array2::from_elem((2, 3), value)
  }

  #[test]
  fn first_frame_fills_history() {
    let mut buffer = FrameBuffer::new(3);
    assert!(buffer.is_empty());
    buffer.push(frame(1.0));
    assert_eq!(buffer.len(), 3);
    for offset in [0, -1, -2] {
      assert_eq!(buffer.get(offset), Some(&frame(1.0)));
    }
    assert_eq!(buffer.get(-3), None);
  }

  #[test]
  fn oldest_frames_are_evicted() {
    let mut buffer = FrameBuffer::new(3);
    for value in 1..=5 {
      buffer.push(frame(value as f32));
    }
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.get(0), Some(&frame(5.0)));
    assert_eq!(buffer.get(-1), Some(&frame(4.0)));
    assert_eq!(buffer.get(-2), Some(&frame(3.0)));
  }

  #[test]
  fn gather_stacks_in_offset_order() {
    let mut buffer = FrameBuffer::new(3);
    buffer.push(frame(1.0));
    buffer.push(frame(2.0));
    let stacked = buffer.gather(&[-2, 0]).unwrap();
    assert_eq!(stacked.dim(), (2, 2, 3));
    assert!(stacked.index_axis(ndarray::Axis(0), 0).iter().all(|&v| v == 1.0));
    assert!(stacked.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 2.0));
    assert_eq!(buffer.gather(&[-3]), None);
  }

  #[test]
  fn capacity_is_at_least_one() {
    let mut buffer = FrameBuffer::new(0);
    buffer.push(frame(1.0));
    buffer.push(frame(2.0));
    assert_eq!(buffer.capacity(), 1);
    assert_eq!(buffer.get(0), Some(&frame(2.0)));
  }
}
