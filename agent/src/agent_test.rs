use crate::{
  agent::{AgentError, AgentSettings, ImitationAgent, State},
  frames::FrameError,
};
use image::{DynamicImage, ImageFormat, Rgb as Pixel, RgbImage};
use ndarray::{Array2, Array4, Axis};
use pilot_model::model::Model;
use pilot_protocol::{Response, Rgb};
use rand::RngCore;
use std::{cell::Cell, convert::Infallible, io::Cursor, rc::Rc};
use thiserror::Error;

const HEIGHT: usize = 12;
const WIDTH: usize = 16;

/// Outputs `scale * mean(input) + bias` for both wheels and remembers the
/// shape it was fed.
struct Linear {
  scale: f32,
  bias: f32,
  shape: Rc<Cell<(usize, usize, usize, usize)>>,
}

impl Model for Linear {
  type E = Infallible;

  fn predict(&self, inputs: Array4<f32>) -> Result<Array2<f32>, Self::E> {
    self.shape.set(inputs.dim());
    let batch = inputs.len_of(Axis(0));
    let mean = inputs.mean().unwrap_or_default();
    Ok(Array2::from_elem((batch, 2), self.scale * mean + self.bias))
  }
}

fn settings(input_offsets: Vec<i32>) -> AgentSettings {
  AgentSettings {
    height: HEIGHT,
    width: WIDTH,
    input_offsets,
  }
}

fn jpeg(value: u8) -> Vec<u8> {
  let image = RgbImage::from_pixel(64, 48, Pixel([value, value, value]));
  let mut bytes = Cursor::new(Vec::new());
  DynamicImage::ImageRgb8(image).write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
  bytes.into_inner()
}

fn agent(
  offsets: Vec<i32>,
  scale: f32,
  bias: f32,
) -> (
  ImitationAgent<Linear, impl FnMut() -> Result<Linear, Infallible>>,
  Rc<Cell<usize>>,
  Rc<Cell<(usize, usize, usize, usize)>>,
) {
  let loads = Rc::new(Cell::new(0));
  let shape = Rc::new(Cell::new((0, 0, 0, 0)));
  let (counter, seen) = (loads.clone(), shape.clone());
  let agent = ImitationAgent::new(settings(offsets), move || {
    counter.set(counter.get() + 1);
    Ok(Linear {
      scale,
      bias,
      shape: seen.clone(),
    })
  });
  (agent, loads, shape)
}

fn motors(response: &Response) -> (f32, f32) {
  let Response::Commands { wheels, .. } = response;
  (wheels.motor_left, wheels.motor_right)
}

#[test]
fn episode_with_deep_history() {
  let (mut agent, loads, shape) = agent(vec![-2, -1, 0], 40.0, -3.0);
  agent.init().unwrap();
  assert_eq!(agent.frames().capacity(), 3);
  agent.on_seed(7);
  agent.on_episode_start("lane").unwrap();

  for value in [0, 64, 128, 192, 255] {
    agent.on_observation(&jpeg(value)).unwrap();
    assert_eq!(agent.state(), State::Observing);
  }
  for _ in 0..5 {
    let response = agent.on_get_commands().unwrap();
    assert_eq!(agent.state(), State::Commanding);
    let (left, right) = motors(&response);
    assert!((-1.0..=1.0).contains(&left));
    assert!((-1.0..=1.0).contains(&right));
    let Response::Commands { led, .. } = response;
    assert!(led.colors().iter().all(|&color| color == Rgb::OFF));
    assert!(led.colors().iter().all(|color| color.r == 0.0 && color.g == 0.0 && color.b == 0.0));
  }

  assert_eq!(loads.get(), 1);
  assert_eq!(shape.get(), (1, 3, HEIGHT, WIDTH));
  agent.finish().unwrap();
  assert_eq!(agent.state(), State::Finished);
}

#[test]
fn first_tick_repeats_the_only_frame() {
  let (mut agent, _, _) = agent(vec![-2, 0], 1.0, 0.0);
  agent.init().unwrap();
  agent.on_observation(&jpeg(255)).unwrap();
  agent.on_get_commands().unwrap();

  let frames = agent.frames();
  assert_eq!(frames.len(), 3);
  let newest = frames.get(0).unwrap();
  assert!(newest.iter().all(|&v| v > 0.9));
  for offset in [-1, -2] {
    assert_eq!(frames.get(offset), Some(newest));
  }
}

#[test]
fn outputs_are_clipped() {
  for bias in [-3.0, -1.0, -0.5, 0.0, 0.7, 1.0, 2.5] {
    let (mut agent, _, _) = agent(vec![0], 0.0, bias);
    agent.init().unwrap();
    agent.on_observation(&jpeg(100)).unwrap();
    let (left, right) = motors(&agent.on_get_commands().unwrap());
    let expected = f32::max(-1.0, f32::min(1.0, bias));
    assert_eq!((left, right), (expected, expected));
  }
}

#[test]
fn missing_observation_uses_black_frame() {
  let (mut agent, _, _) = agent(vec![0], 1.0, 0.25);
  agent.init().unwrap();
  let (left, _) = motors(&agent.on_get_commands().unwrap());
  assert_eq!(left, 0.25);
  assert!(agent.frames().get(0).unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn undecodable_payload_is_fatal() {
  let (mut agent, _, _) = agent(vec![0], 1.0, 0.0);
  agent.init().unwrap();
  let result = agent.on_observation(b"\xff\xd8 truncated");
  assert!(matches!(result, Err(AgentError::Frame(FrameError::Decode(_)))));
}

#[test]
fn events_require_a_running_agent() {
  let (mut agent, _, _) = agent(vec![0], 1.0, 0.0);
  assert!(matches!(
    agent.on_observation(&jpeg(0)),
    Err(AgentError::State {
      state: State::Uninitialized,
      ..
    })
  ));
  assert!(agent.on_get_commands().is_err());
  agent.init().unwrap();
  assert!(matches!(agent.init(), Err(AgentError::State { event: "init", .. })));
  agent.finish().unwrap();
  assert!(matches!(
    agent.on_get_commands(),
    Err(AgentError::State {
      state: State::Finished,
      ..
    })
  ));
}

#[test]
fn seed_restarts_the_generator() {
  let (mut first, _, _) = agent(vec![0], 1.0, 0.0);
  let (mut second, _, _) = agent(vec![0], 1.0, 0.0);
  first.on_seed(11);
  second.on_seed(11);
  let draws = (0..4).map(|_| first.rng().next_u64()).collect::<Vec<_>>();
  assert_eq!(draws, (0..4).map(|_| second.rng().next_u64()).collect::<Vec<_>>());

  first.on_seed(12);
  assert_ne!(first.rng().next_u64(), draws[0]);
  first.on_seed(11);
  assert_eq!(first.rng().next_u64(), draws[0]);
}

#[derive(Error, Debug)]
#[error("no frozen graph")]
struct Missing;

struct Unreachable;

impl Model for Unreachable {
  type E = Missing;

  fn predict(&self, _inputs: Array4<f32>) -> Result<Array2<f32>, Self::E> {
    Err(Missing)
  }
}

#[test]
fn load_failure_is_reported_at_first_use() {
  let mut agent = ImitationAgent::new(settings(vec![0]), || Err::<Unreachable, _>(Missing));
  agent.init().unwrap();
  agent.on_observation(&jpeg(0)).unwrap();
  assert!(matches!(agent.on_get_commands(), Err(AgentError::Model(Missing))));
}
