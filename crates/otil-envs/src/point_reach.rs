//! Point-mass reach task with continuous actions.

use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use otil::env::{Env, StepResult};

const DT: f32 = 0.1;
const GOAL_RADIUS: f32 = 0.05;
const MAX_STEPS: u32 = 200;

/// A 2-D point mass that must reach the origin. Observation is
/// `[pos_x, pos_y, vel_x, vel_y]`, action is a bounded acceleration in
/// `[-1, 1]^2`, reward is the negative distance to the goal.
pub struct PointReach {
    pos: [f32; 2],
    vel: [f32; 2],
    steps: u32,
    rng: StdRng,
}

impl PointReach {
    pub fn new() -> Self {
        Self {
            pos: [0.0; 2],
            vel: [0.0; 2],
            steps: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    fn observation(&self) -> ArrayD<f32> {
        ArrayD::from_shape_vec(
            IxDyn(&[4]),
            vec![self.pos[0], self.pos[1], self.vel[0], self.vel[1]],
        )
        .unwrap()
    }

    fn distance(&self) -> f32 {
        (self.pos[0] * self.pos[0] + self.pos[1] * self.pos[1]).sqrt()
    }
}

impl Default for PointReach {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for PointReach {
    fn observation_dim(&self) -> usize {
        4
    }

    fn action_dim(&self) -> usize {
        2
    }

    fn action_bounds(&self) -> (Vec<f32>, Vec<f32>) {
        (vec![-1.0, -1.0], vec![1.0, 1.0])
    }

    fn reset(&mut self, seed: Option<u64>) -> ArrayD<f32> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.pos = [
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(-1.0..1.0),
        ];
        self.vel = [0.0; 2];
        self.steps = 0;
        self.observation()
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let a = action.as_slice().expect("contiguous action");
        for i in 0..2 {
            let acc = a[i].clamp(-1.0, 1.0);
            self.vel[i] = (self.vel[i] + DT * acc).clamp(-1.0, 1.0);
            self.pos[i] = (self.pos[i] + DT * self.vel[i]).clamp(-2.0, 2.0);
        }
        self.steps += 1;

        let distance = self.distance();
        StepResult {
            observation: self.observation(),
            reward: -distance,
            terminated: distance < GOAL_RADIUS,
            truncated: self.steps >= MAX_STEPS,
        }
    }

    /// Map returns onto [0, 1]: a policy pinned at the worst corner scores
    /// 0, instant goal-reaching scores 1.
    fn normalized_score(&self, episode_return: f32) -> f32 {
        let worst = -(MAX_STEPS as f32) * 2.0f32.sqrt() * 2.0;
        ((episode_return - worst) / -worst).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_seeded() {
        let mut env = PointReach::new();
        let a = env.reset(Some(3));
        let b = env.reset(Some(3));
        assert_eq!(a.as_slice().unwrap(), b.as_slice().unwrap());
    }

    #[test]
    fn test_episode_truncates() {
        let mut env = PointReach::new();
        env.reset(Some(5));
        let action = ArrayD::from_elem(IxDyn(&[2]), 1.0f32);
        let mut steps = 0;
        loop {
            let result = env.step(&action);
            steps += 1;
            if result.done() {
                break;
            }
            assert!(steps <= MAX_STEPS, "episode never ended");
        }
        assert!(steps <= MAX_STEPS);
    }

    #[test]
    fn test_normalized_score_range() {
        let env = PointReach::new();
        assert!(env.normalized_score(-1000.0) >= 0.0);
        assert!(env.normalized_score(0.0) <= 1.0);
    }
}
