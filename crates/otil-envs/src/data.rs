//! Scripted dataset generators over any [`Env`].

use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use otil::dataset::RawDataset;
use otil::env::Env;

/// Roll `episodes` episodes of `policy` through `env` and collect the flat
/// transition table, with terminal/timeout boundary flags.
pub fn collect_dataset<P>(
    env: &mut dyn Env,
    mut policy: P,
    episodes: usize,
    seed: u64,
) -> RawDataset
where
    P: FnMut(&ArrayD<f32>) -> Vec<f32>,
{
    let mut dataset = RawDataset::default();
    for ep in 0..episodes {
        let mut obs = env.reset(Some(seed + ep as u64));
        loop {
            let action = policy(&obs);
            let action_arr =
                ArrayD::from_shape_vec(ndarray::IxDyn(&[action.len()]), action.clone()).unwrap();
            let result = env.step(&action_arr);

            dataset.observations.push(obs.iter().copied().collect());
            dataset.actions.push(action);
            dataset.rewards.push(result.reward);
            dataset.terminals.push(result.terminated);
            dataset.timeouts.push(result.truncated);

            let done = result.done();
            obs = result.observation;
            if done {
                break;
            }
        }
    }
    dataset
}

/// Proportional-derivative controller steering [`crate::PointReach`] to the
/// goal; a stand-in for expert demonstrations.
pub fn expert_policy(obs: &ArrayD<f32>) -> Vec<f32> {
    let o = obs.as_slice().expect("contiguous observation");
    vec![
        (-3.0 * o[0] - 2.0 * o[2]).clamp(-1.0, 1.0),
        (-3.0 * o[1] - 2.0 * o[3]).clamp(-1.0, 1.0),
    ]
}

/// Uniform random actions; a stand-in for low-quality demonstrations.
pub fn random_policy(action_dim: usize, seed: u64) -> impl FnMut(&ArrayD<f32>) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    move |_obs| (0..action_dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointReach;

    #[test]
    fn test_collect_dataset_boundaries() {
        let mut env = PointReach::new();
        let dataset = collect_dataset(&mut env, random_policy(2, 11), 2, 11);
        assert!(!dataset.is_empty());
        dataset.validate().unwrap();

        // Exactly two episode boundaries, the last on the final row.
        let boundaries = dataset
            .terminals
            .iter()
            .zip(dataset.timeouts.iter())
            .filter(|(&t, &o)| t || o)
            .count();
        assert_eq!(boundaries, 2);
        let last = dataset.len() - 1;
        assert!(dataset.terminals[last] || dataset.timeouts[last]);
    }

    #[test]
    fn test_expert_reaches_goal() {
        let mut env = PointReach::new();
        let mut obs = env.reset(Some(2));
        let mut last_reward = f32::MIN;
        for _ in 0..200 {
            let result = env.step(&ArrayD::from_shape_vec(
                ndarray::IxDyn(&[2]),
                expert_policy(&obs),
            )
            .unwrap());
            last_reward = result.reward;
            obs = result.observation;
            if result.terminated {
                break;
            }
        }
        // The controller ends near the goal.
        assert!(last_reward > -0.2, "expert stalled at reward {last_reward}");
    }
}
