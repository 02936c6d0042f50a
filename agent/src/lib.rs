pub mod agent;
pub mod frame_buffer;
pub mod frames;

#[cfg(test)]
mod agent_test;

pub use agent::{AgentError, AgentSettings, ImitationAgent, State, clip};
pub use frame_buffer::FrameBuffer;
pub use frames::FrameError;
