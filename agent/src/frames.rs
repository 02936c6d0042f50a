use image::{DynamicImage, ImageError, ImageFormat, RgbImage, imageops::FilterType};
use ndarray::{Array2, Array3};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("failed to decode the camera frame: {0}")]
  Decode(#[from] ImageError),
  #[error("frame has shape {0:?}, expected (height, width, 3)")]
  Format(Vec<usize>),
}

/// Decodes a JPEG payload into a `(height, width, 3)` array of 8-bit RGB.
pub fn decode_jpeg(bytes: &[u8]) -> Result<Array3<u8>, FrameError> {
  let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
  let rgb = image.to_rgb8();
  let (width, height) = (rgb.width() as usize, rgb.height() as usize);
  let raw = rgb.into_raw();
  let len = raw.len();
  Array3::from_shape_vec((height, width, 3), raw).map_err(|_| FrameError::Format(vec![height, width, len]))
}

/// Converts an RGB frame to the network input: grayscale, resized to
/// `height` x `width`, with values in `[0, 1]`.
pub fn preprocess(frame: &Array3<u8>, height: usize, width: usize) -> Result<Array2<f32>, FrameError> {
  let format_error = || FrameError::Format(frame.shape().to_vec());
  let (rows, columns, channels) = frame.dim();
  if channels != 3 {
    return Err(format_error());
  }
  let raw = frame.as_standard_layout().iter().copied().collect();
  let rgb = RgbImage::from_raw(columns as u32, rows as u32, raw).ok_or_else(format_error)?;
  let gray = DynamicImage::ImageRgb8(rgb)
    .resize_exact(width as u32, height as u32, FilterType::Triangle)
    .to_luma8();
  let pixels = gray.into_raw().into_iter().map(|p| p as f32 / 255.0).collect();
  Array2::from_shape_vec((height, width), pixels).map_err(|_| format_error())
}
