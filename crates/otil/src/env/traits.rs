//! Core environment trait definition.

use ndarray::ArrayD;

/// Result from a single environment step
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Observation after the step
    pub observation: ArrayD<f32>,
    /// Reward received
    pub reward: f32,
    /// Whether the episode terminated (goal reached, failure, etc.)
    pub terminated: bool,
    /// Whether the episode truncated (time limit)
    pub truncated: bool,
}

impl StepResult {
    /// Check if the episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Source of online rollouts and evaluation oracle.
///
/// The training core never looks inside the dynamics; it only resets,
/// steps, and asks for the benchmark-normalized score of a return.
pub trait Env: Send {
    /// Observation dimensionality
    fn observation_dim(&self) -> usize;

    /// Action dimensionality
    fn action_dim(&self) -> usize;

    /// Per-dimension action bounds `(low, high)`
    fn action_bounds(&self) -> (Vec<f32>, Vec<f32>);

    /// Reset to an initial state
    fn reset(&mut self, seed: Option<u64>) -> ArrayD<f32>;

    /// Execute one action
    fn step(&mut self, action: &ArrayD<f32>) -> StepResult;

    /// Map an episode return onto the benchmark's normalized scale.
    fn normalized_score(&self, episode_return: f32) -> f32 {
        episode_return
    }
}
