//! Agent hyperparameters.

use serde::{Deserialize, Serialize};
use tch::Device;

/// Configuration for [`super::ImitationAgent`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Minibatch size for every sampling trainer
    pub batch_size: i64,

    // Discriminator
    /// Gradient steps for the discriminator fit
    pub d_steps: i64,
    /// Discriminator learning rate
    pub discriminator_lr: f64,
    /// Class prior: assumed fraction of expert-quality data within D_s
    pub eta: f64,
    /// Use plain binary cross-entropy instead of the PU risk estimator
    pub no_pu: bool,

    // Data selection
    /// Score threshold for retaining a transition
    pub bar: f64,
    /// Timesteps looked backward from a verified expert-like outcome
    pub rollback: i64,
    /// Per-step weight decay factor in (0, 1]
    pub decay: f64,
    /// Weight assigned at the verified outcome itself
    pub weight_init: f64,

    // Policy
    /// Learning rate for both policies and the adaptive coefficient
    pub policy_lr: f64,
    /// Adam weight decay for the policies
    pub regularization: f64,
    /// Initial (or fixed) imitation-anchor coefficient
    pub alpha: f64,
    /// Drive alpha by dual ascent against the expert-reference policy
    pub auto_alpha: bool,
    /// Target margin for the dual-ascent update
    pub epsilon: f64,

    /// Device to train on
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

fn default_device() -> Device {
    Device::Cpu
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,

            d_steps: 100_000,
            discriminator_lr: 1e-5,
            eta: 0.5,
            no_pu: false,

            bar: 0.5,
            rollback: 1,
            decay: 0.5,
            weight_init: 1.0,

            policy_lr: 1e-5,
            regularization: 0.005,
            alpha: 1.0,
            auto_alpha: true,
            epsilon: 0.01,

            device: Device::Cpu,
        }
    }
}

impl AgentConfig {
    /// Set the training device
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set the discriminator step budget
    pub fn with_d_steps(mut self, d_steps: i64) -> Self {
        self.d_steps = d_steps;
        self
    }

    /// Set the minibatch size
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Fix alpha instead of tuning it
    pub fn with_fixed_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self.auto_alpha = false;
        self
    }
}
