//! Reward relabeling over the fitted discriminator.

use tch::{no_grad, Device, Tensor};

use crate::dataset::RawDataset;
use crate::policy::Discriminator;

/// Pluggable reward-relabeling policy for a single transition.
pub trait RewardRelabel {
    fn relabel(&self, state: &[f32], action: &[f32]) -> f32;
}

/// Discriminator log-odds: `ln(d / (1 - d))`. Used to rewrite offline
/// dataset rewards before reward normalization.
pub struct LogOdds<'a> {
    pub discriminator: &'a Discriminator,
}

impl RewardRelabel for LogOdds<'_> {
    fn relabel(&self, state: &[f32], action: &[f32]) -> f32 {
        let d = score_pair(self.discriminator, state, action);
        (d / (1.0 - d)).ln() as f32
    }
}

/// Scaled-odds reward `1 / (1 + d/(1-d) / y / alpha)` for online rollouts.
///
/// The auxiliary quantity `y` is supplied by the caller as a state-action
/// callable; its training procedure lives outside this crate.
pub struct ScaledOdds<'a> {
    discriminator: &'a Discriminator,
    alpha: f64,
    y: Box<dyn Fn(&[f32], &[f32]) -> f64 + Send + 'a>,
}

impl<'a> ScaledOdds<'a> {
    pub fn new(
        discriminator: &'a Discriminator,
        alpha: f64,
        y: Box<dyn Fn(&[f32], &[f32]) -> f64 + Send + 'a>,
    ) -> Self {
        Self {
            discriminator,
            alpha,
            y,
        }
    }

    /// Scaled odds with the auxiliary quantity held at 1.
    pub fn with_unit_y(discriminator: &'a Discriminator, alpha: f64) -> Self {
        Self::new(discriminator, alpha, Box::new(|_, _| 1.0))
    }
}

impl RewardRelabel for ScaledOdds<'_> {
    fn relabel(&self, state: &[f32], action: &[f32]) -> f32 {
        let d = score_pair(self.discriminator, state, action);
        let y = (self.y)(state, action);
        (1.0 / (1.0 + d / (1.0 - d) / y / self.alpha)) as f32
    }
}

fn score_pair(discriminator: &Discriminator, state: &[f32], action: &[f32]) -> f64 {
    no_grad(|| {
        let device = discriminator.device();
        let s = Tensor::from_slice(state).reshape([1, -1]).to_device(device);
        let a = Tensor::from_slice(action)
            .reshape([1, -1])
            .to_device(device);
        discriminator
            .score(&s, &a)
            .to_device(Device::Cpu)
            .double_value(&[0, 0])
    })
}

/// Rewrite a dataset's rewards with `relabel` (when given) and min-max
/// normalize them into `[0, 1]`.
///
/// Returns the reward scale `alpha = 1 / (r_max - r_min)`, or 1 when
/// scaling is disabled or the reward range is degenerate.
pub fn relabel_dataset(
    dataset: &mut RawDataset,
    relabel: Option<&dyn RewardRelabel>,
    use_reward_scaling: bool,
) -> f64 {
    if let Some(relabel) = relabel {
        for i in 0..dataset.len() {
            dataset.rewards[i] =
                relabel.relabel(&dataset.observations[i], &dataset.actions[i]);
        }
    }

    let r_max = dataset.rewards.iter().cloned().fold(f32::MIN, f32::max);
    let r_min = dataset.rewards.iter().cloned().fold(f32::MAX, f32::min);
    let span = r_max - r_min;
    if !span.is_finite() || span <= f32::EPSILON {
        return 1.0;
    }

    for r in &mut dataset.rewards {
        *r = (*r - r_min) / span;
    }

    if use_reward_scaling {
        1.0 / span as f64
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_log_odds_sign_tracks_score() {
        let disc = Discriminator::new(2, 1, Device::Cpu);
        let relabel = LogOdds {
            discriminator: &disc,
        };
        let r = relabel.relabel(&[0.1, -0.2], &[0.3]);
        // Scores live in [0.1, 0.9], so the log-odds are bounded.
        assert!(r >= (0.1f32 / 0.9).ln() - 1e-5);
        assert!(r <= (0.9f32 / 0.1).ln() + 1e-5);
    }

    #[test]
    fn test_scaled_odds_bounded() {
        let disc = Discriminator::new(2, 1, Device::Cpu);
        let relabel = ScaledOdds::with_unit_y(&disc, 1.0);
        let r = relabel.relabel(&[0.5, 0.5], &[-0.1]);
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn test_relabel_dataset_normalizes_rewards() {
        let mut dataset = RawDataset {
            observations: vec![vec![0.0]; 3],
            actions: vec![vec![0.0]; 3],
            rewards: vec![-2.0, 0.0, 2.0],
            terminals: vec![false, false, true],
            timeouts: vec![false; 3],
        };
        let alpha = relabel_dataset(&mut dataset, None, true);
        assert_eq!(dataset.rewards, vec![0.0, 0.5, 1.0]);
        assert!((alpha - 0.25).abs() < 1e-9);

        // Degenerate range: rewards untouched, scale 1.
        let mut flat = dataset.clone();
        flat.rewards = vec![1.0; 3];
        assert_eq!(relabel_dataset(&mut flat, None, true), 1.0);
        assert_eq!(flat.rewards, vec![1.0; 3]);
    }
}
