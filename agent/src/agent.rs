use crate::{
  frame_buffer::FrameBuffer,
  frames::{FrameError, decode_jpeg, preprocess},
};
use ndarray::{Array2, Array3, Axis};
use pilot_model::model::Model;
use pilot_protocol::{LedsCommands, PwmCommands, Response, Rgb};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
  Uninitialized,
  Ready,
  Observing,
  Predicting,
  Commanding,
  Finished,
}

#[derive(Error, Debug)]
pub enum AgentError<E> {
  #[error("{event} is not allowed in the {state:?} state")]
  State { event: &'static str, state: State },
  #[error(transparent)]
  Frame(#[from] FrameError),
  #[error("input offsets {0:?} reach past the frame history")]
  History(Vec<i32>),
  #[error("model failure: {0}")]
  Model(#[source] E),
}

/// What the network expects: the frame size and which past frames to stack.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AgentSettings {
  pub height: usize,
  pub width: usize,
  pub input_offsets: Vec<i32>,
}

impl AgentSettings {
  pub fn memory_size(&self) -> usize {
    pilot_config::memory_size(&self.input_offsets)
  }
}

/// Drives the robot from camera frames with a frozen network.
///
/// `load` is invoked on the first `on_get_commands` and its model is reused
/// for the rest of the agent's life.
pub struct ImitationAgent<M, F> {
  settings: AgentSettings,
  load: F,
  model: Option<M>,
  frames: FrameBuffer,
  current: Option<Array3<u8>>,
  rng: Xoshiro256PlusPlus,
  state: State,
}

impl<M, F> ImitationAgent<M, F>
where
  M: Model,
  F: FnMut() -> Result<M, M::E>,
{
  pub fn new(settings: AgentSettings, load: F) -> Self {
    let frames = FrameBuffer::new(settings.memory_size());
    Self {
      settings,
      load,
      model: None,
      frames,
      current: None,
      rng: Xoshiro256PlusPlus::seed_from_u64(0),
      state: State::Uninitialized,
    }
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn frames(&self) -> &FrameBuffer {
    &self.frames
  }

  /// Generator reseeded by [`Self::on_seed`].
  pub fn rng(&mut self) -> &mut Xoshiro256PlusPlus {
    &mut self.rng
  }

  fn expect_running(&self, event: &'static str) -> Result<(), AgentError<M::E>> {
    match self.state {
      State::Uninitialized | State::Finished => Err(AgentError::State {
        event,
        state: self.state,
      }),
      _ => Ok(()),
    }
  }

  pub fn init(&mut self) -> Result<(), AgentError<M::E>> {
    if self.state != State::Uninitialized {
      return Err(AgentError::State {
        event: "init",
        state: self.state,
      });
    }
    self.frames = FrameBuffer::new(self.settings.memory_size());
    self.state = State::Ready;
    log::info!("init(): memory size {}", self.frames.capacity());
    Ok(())
  }

  pub fn on_seed(&mut self, seed: u64) {
    self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
  }

  pub fn on_episode_start(&mut self, episode_name: &str) -> Result<(), AgentError<M::E>> {
    self.expect_running("episode start")?;
    log::info!("Starting episode {episode_name:?}");
    Ok(())
  }

  pub fn on_observation(&mut self, jpg_data: &[u8]) -> Result<(), AgentError<M::E>> {
    self.expect_running("observation")?;
    self.state = State::Observing;
    self.current = Some(decode_jpeg(jpg_data)?);
    Ok(())
  }

  fn current_frame(&self) -> Result<Array2<f32>, FrameError> {
    match &self.current {
      Some(frame) => preprocess(frame, self.settings.height, self.settings.width),
      None => {
        log::warn!("No observation received yet, using a black frame");
        Ok(Array2::zeros((self.settings.height, self.settings.width)))
      }
    }
  }

  fn model(&mut self) -> Result<&M, AgentError<M::E>> {
    let model = match self.model.take() {
      Some(model) => model,
      None => (self.load)().map_err(AgentError::Model)?,
    };
    Ok(self.model.insert(model))
  }

  /// Predicts the wheel commands for the latest observation. Both motor
  /// values are clipped to `[-1, 1]`, the lights are off.
  ///
  /// The model sees a single `(1, channels, height, width)` stack. A
  /// `FrozenGraph` flattens it into its `x` input and runs with batch size 1
  /// and no dropout.
  pub fn on_get_commands(&mut self) -> Result<Response, AgentError<M::E>> {
    self.expect_running("get commands")?;
    self.state = State::Predicting;

    let frame = self.current_frame()?;
    self.frames.push(frame);
    let inputs = self
      .frames
      .gather(&self.settings.input_offsets)
      .ok_or_else(|| AgentError::History(self.settings.input_offsets.clone()))?
      .insert_axis(Axis(0));
    let outputs = self.model()?.predict(inputs).map_err(AgentError::Model)?;

    self.state = State::Commanding;
    Ok(Response::Commands {
      wheels: PwmCommands {
        motor_left: clip(outputs[[0, 0]]),
        motor_right: clip(outputs[[0, 1]]),
      },
      led: LedsCommands::uniform(Rgb::OFF),
    })
  }

  pub fn finish(&mut self) -> Result<(), AgentError<M::E>> {
    self.expect_running("finish")?;
    log::info!("finish()");
    self.state = State::Finished;
    Ok(())
  }
}

/// `max(-1, min(1, value))`.
pub fn clip(value: f32) -> f32 {
  value.clamp(-1.0, 1.0)
}
