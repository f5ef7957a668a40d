//! Replay buffers and the imitation training loop.

mod agent;
mod buffer;
mod config;
mod selector;

pub use agent::{AlphaMode, ImitationAgent};
pub use buffer::{ReplayBuffer, TransitionBatch};
pub use config::AgentConfig;
