//! Environment wrappers for common functionality.

use ndarray::ArrayD;

use super::{Env, StepResult};

/// Wrapper that normalizes observations with fixed statistics, matching
/// the normalization applied to the offline datasets.
pub struct NormalizeObservation<E: Env> {
    env: E,
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl<E: Env> NormalizeObservation<E> {
    pub fn new(env: E, mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self { env, mean, std }
    }

    /// Get a reference to the inner environment
    pub fn inner(&self) -> &E {
        &self.env
    }

    fn normalize(&self, mut obs: ArrayD<f32>) -> ArrayD<f32> {
        for ((o, &m), &s) in obs
            .iter_mut()
            .zip(self.mean.iter())
            .zip(self.std.iter())
        {
            *o = (*o - m) / s;
        }
        obs
    }
}

impl<E: Env> Env for NormalizeObservation<E> {
    fn observation_dim(&self) -> usize {
        self.env.observation_dim()
    }

    fn action_dim(&self) -> usize {
        self.env.action_dim()
    }

    fn action_bounds(&self) -> (Vec<f32>, Vec<f32>) {
        self.env.action_bounds()
    }

    fn reset(&mut self, seed: Option<u64>) -> ArrayD<f32> {
        let obs = self.env.reset(seed);
        self.normalize(obs)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        result.observation = self.normalize(result.observation);
        result
    }

    fn normalized_score(&self, episode_return: f32) -> f32 {
        self.env.normalized_score(episode_return)
    }
}
