use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

/// Compressed camera frame.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JpgImage {
  #[serde_as(as = "Base64")]
  pub jpg_data: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Request {
  Seed { seed: u64 },
  EpisodeStart { episode_name: String },
  Observation { camera: JpgImage },
  GetCommands,
  Finish,
}

/// Normalized motor duty cycles in `[-1, 1]`.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct PwmCommands {
  pub motor_left: f32,
  pub motor_right: f32,
}

/// Light color, every channel in `[0, 1]`.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Rgb {
  pub r: f32,
  pub g: f32,
  pub b: f32,
}

impl Rgb {
  pub const OFF: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct LedsCommands {
  pub center: Rgb,
  pub front_left: Rgb,
  pub front_right: Rgb,
  pub back_left: Rgb,
  pub back_right: Rgb,
}

impl LedsCommands {
  pub fn uniform(color: Rgb) -> Self {
    Self {
      center: color,
      front_left: color,
      front_right: color,
      back_left: color,
      back_right: color,
    }
  }

  pub fn colors(&self) -> [Rgb; 5] {
    [
      self.center,
      self.front_left,
      self.front_right,
      self.back_left,
      self.back_right,
    ]
  }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Response {
  Commands { wheels: PwmCommands, led: LedsCommands },
}
