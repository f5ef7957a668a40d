//! Tanh-squashed Gaussian policy network.

use tch::{nn, nn::Module, Device, Kind, Tensor};

// Clipping ranges for the distribution parameters.
const MEAN_MIN: f64 = -9.0;
const MEAN_MAX: f64 = 9.0;
const LOG_STD_MIN: f64 = -5.0;
const LOG_STD_MAX: f64 = 2.0;

// Keeps atanh finite when inverting boundary actions.
const ACTION_EPS: f64 = 1e-7;

/// Stochastic policy producing a tanh-squashed Gaussian over bounded
/// continuous actions.
///
/// Two instances exist per run: the student trained on weighted mixed data
/// and, when adaptive alpha tuning is enabled, an expert-reference copy
/// trained only on D_e.
pub struct TanhGaussianActor {
    vs: nn::VarStore,
    fc1: nn::Linear,
    fc2: nn::Linear,
    mu_head: nn::Linear,
    sigma_head: nn::Linear,
    device: Device,
}

impl TanhGaussianActor {
    pub fn new(state_dim: i64, action_dim: i64, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let fc1 = nn::linear(&root / "fc1", state_dim, 256, Default::default());
        let fc2 = nn::linear(&root / "fc2", 256, 256, Default::default());
        let mu_head = nn::linear(&root / "mu_head", 256, action_dim, Default::default());
        let sigma_head = nn::linear(&root / "sigma_head", 256, action_dim, Default::default());

        Self {
            vs,
            fc1,
            fc2,
            mu_head,
            sigma_head,
            device,
        }
    }

    /// Clamped mean and standard deviation of the pre-squash Gaussian.
    fn dist_params(&self, state: &Tensor) -> (Tensor, Tensor) {
        let h = self.fc2.forward(&self.fc1.forward(state).relu()).relu();
        let mu = self.mu_head.forward(&h).clamp(MEAN_MIN, MEAN_MAX);
        let sigma = self
            .sigma_head
            .forward(&h)
            .clamp(LOG_STD_MIN, LOG_STD_MAX)
            .exp();
        (mu, sigma)
    }

    /// Reparameterized sample through the squash.
    ///
    /// Returns `(action, log_pi, tanh_mean)`:
    /// - `action`: `[B, d_a]` in (-1, 1)
    /// - `log_pi`: `[B]` log density of the sample, summed over action dims
    /// - `tanh_mean`: `[B, d_a]` deterministic mode, for evaluation
    pub fn sample(&self, state: &Tensor) -> (Tensor, Tensor, Tensor) {
        let (mu, sigma) = self.dist_params(state);
        let pre = &mu + &sigma * Tensor::randn_like(&mu);
        let action = pre.tanh();
        // log(1 - tanh(u)^2) = 2 (ln 2 - u - softplus(-2u))
        let log_det = ((2.0f64).ln() - &pre - (&pre * -2.0).softplus()) * 2.0;
        let log_pi = (gaussian_log_prob(&pre, &mu, &sigma) - log_det).sum_dim_intlist(
            [-1i64].as_slice(),
            false,
            Kind::Float,
        );
        (action, log_pi, mu.tanh())
    }

    /// Per-dimension log density `[B, d_a]` of `action` under the squashed
    /// Gaussian; the caller sums across action dimensions. Actions are
    /// clamped away from the boundary before inversion.
    pub fn log_density(&self, state: &Tensor, action: &Tensor) -> Tensor {
        let (mu, sigma) = self.dist_params(state);
        let clipped = action.clamp(-1.0 + ACTION_EPS, 1.0 - ACTION_EPS);
        let pre = clipped.atanh();
        gaussian_log_prob(&pre, &mu, &sigma) - (1.0f64 - clipped.pow_tensor_scalar(2.0)).log()
    }

    /// Deterministic evaluation action: tanh of the Gaussian mean.
    pub fn act(&self, state: &Tensor) -> Tensor {
        let (mu, _) = self.dist_params(state);
        mu.tanh()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

fn gaussian_log_prob(x: &Tensor, mu: &Tensor, sigma: &Tensor) -> Tensor {
    let var = sigma.pow_tensor_scalar(2.0);
    let log_2pi = (2.0 * std::f64::consts::PI).ln();
    ((x - mu).pow_tensor_scalar(2.0) / (var + 1e-8) + sigma.log() * 2.0 + log_2pi) * -0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shapes_and_bounds() {
        let actor = TanhGaussianActor::new(4, 2, Device::Cpu);
        let state = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));
        let (action, log_pi, mode) = actor.sample(&state);
        assert_eq!(action.size(), [8, 2]);
        assert_eq!(log_pi.size(), [8]);
        assert_eq!(mode.size(), [8, 2]);

        let max = action.abs().max().double_value(&[]);
        assert!(max <= 1.0);
    }

    #[test]
    fn test_log_density_finite_at_boundary() {
        let actor = TanhGaussianActor::new(3, 2, Device::Cpu);
        let state = Tensor::randn([4, 3], (Kind::Float, Device::Cpu));
        let action = Tensor::from_slice(&[1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0])
            .reshape([4, 2]);
        let log_pi = actor.log_density(&state, &action);
        assert_eq!(log_pi.size(), [4, 2]);
        let finite = log_pi.isfinite().all().int64_value(&[]);
        assert_eq!(finite, 1);
    }

    #[test]
    fn test_act_is_deterministic() {
        let actor = TanhGaussianActor::new(4, 2, Device::Cpu);
        let state = Tensor::randn([2, 4], (Kind::Float, Device::Cpu));
        let a = actor.act(&state);
        let b = actor.act(&state);
        assert!(a.allclose(&b, 1e-8, 1e-8, false));
    }
}
