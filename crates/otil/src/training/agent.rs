//! The imitation agent: PU discriminator fitting, data selection, and the
//! dual-policy training loop.

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, nn::OptimizerConfig, no_grad, Device, Kind, Tensor};

use super::buffer::ReplayBuffer;
use super::config::AgentConfig;
use super::selector::rollback_select;
use crate::policy::{Discriminator, TanhGaussianActor};
use crate::Result;

/// Dual-ascent state for the adaptive coefficient: the expert-reference
/// policy, its optimizer, and the log-space coefficient with its own
/// optimizer.
pub struct AdaptiveAlpha {
    reference: TanhGaussianActor,
    reference_opt: nn::Optimizer,
    _alpha_vs: nn::VarStore,
    log_alpha: Tensor,
    alpha_opt: nn::Optimizer,
    epsilon: f64,
}

/// Whether the imitation-anchor coefficient is held fixed or tuned.
pub enum AlphaMode {
    Fixed,
    Adaptive(AdaptiveAlpha),
}

/// Owns the student policy, the discriminator, and their optimizers, and
/// runs every training stage of the pipeline.
pub struct ImitationAgent {
    pub actor: TanhGaussianActor,
    actor_opt: nn::Optimizer,
    pub discriminator: Discriminator,
    discriminator_opt: nn::Optimizer,
    alpha: f64,
    mode: AlphaMode,
    config: AgentConfig,
    total_it: u64,
    total_it_bc: u64,
}

impl ImitationAgent {
    pub fn new(state_dim: i64, action_dim: i64, config: AgentConfig) -> Result<Self> {
        let device = config.device;

        let actor = TanhGaussianActor::new(state_dim, action_dim, device);
        let actor_opt = nn::Adam {
            wd: config.regularization,
            ..Default::default()
        }
        .build(actor.var_store(), config.policy_lr)?;

        let discriminator = Discriminator::new(state_dim, action_dim, device);
        let discriminator_opt = nn::Adam {
            wd: 0.005,
            ..Default::default()
        }
        .build(discriminator.var_store(), config.discriminator_lr)?;

        let mode = if config.auto_alpha {
            let reference = TanhGaussianActor::new(state_dim, action_dim, device);
            let reference_opt = nn::Adam {
                wd: config.regularization,
                ..Default::default()
            }
            .build(reference.var_store(), config.policy_lr)?;

            let alpha_vs = nn::VarStore::new(device);
            let log_alpha = alpha_vs.root().zeros("log_alpha", &[1]);
            let alpha_opt = nn::Adam::default().build(&alpha_vs, config.policy_lr)?;

            AlphaMode::Adaptive(AdaptiveAlpha {
                reference,
                reference_opt,
                _alpha_vs: alpha_vs,
                log_alpha,
                alpha_opt,
                epsilon: config.epsilon,
            })
        } else {
            AlphaMode::Fixed
        };

        Ok(Self {
            actor,
            actor_opt,
            discriminator,
            discriminator_opt,
            alpha: config.alpha,
            mode,
            config,
            total_it: 0,
            total_it_bc: 0,
        })
    }

    /// Current value of the imitation-anchor coefficient.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn mode(&self) -> &AlphaMode {
        &self.mode
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self.mode, AlphaMode::Adaptive(_))
    }

    /// Deterministic action for a single state. With `reference` set, the
    /// expert-reference policy acts instead of the student.
    pub fn act(&self, state: &[f32], reference: bool) -> Vec<f32> {
        let state = Tensor::from_slice(state)
            .reshape([1, -1])
            .to_device(self.config.device);
        let action = no_grad(|| match (&self.mode, reference) {
            (AlphaMode::Adaptive(tuning), true) => tuning.reference.act(&state),
            _ => self.actor.act(&state),
        });
        Vec::try_from(action.to_device(Device::Cpu).flatten(0, -1)).unwrap()
    }

    /// Stochastic student action for a single state (online collection).
    pub fn sample_action(&self, state: &[f32]) -> Vec<f32> {
        let state = Tensor::from_slice(state)
            .reshape([1, -1])
            .to_device(self.config.device);
        let action = no_grad(|| self.actor.sample(&state).0);
        Vec::try_from(action.to_device(Device::Cpu).flatten(0, -1)).unwrap()
    }

    /// Fit the discriminator on D_e against D_s for `d_steps` gradient
    /// steps. Each step is an independent minibatch cycle; afterwards the
    /// discriminator is treated as frozen by the data selector.
    pub fn train_discriminator(
        &mut self,
        replay_e: &ReplayBuffer,
        replay_s: &ReplayBuffer,
    ) -> f64 {
        let pb = ProgressBar::new(self.config.d_steps as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut last_loss = 0.0;
        for t in 0..self.config.d_steps {
            let batch_e = replay_e.sample(self.config.batch_size);
            let batch_s = replay_s.sample(self.config.batch_size);

            let d_e = self.discriminator.score(&batch_e.state, &batch_e.action);
            let d_s = self.discriminator.score(&batch_s.state, &batch_s.action);

            let loss = if self.config.no_pu {
                // Plain binary cross-entropy: D_e positive, D_s negative.
                (-d_e.log() - (1.0f64 - d_s).log()).mean(Kind::Float)
            } else {
                // PU risk estimator: the unlabeled-negative term is scaled
                // by the class prior eta and corrected by the
                // recovered-positive term on D_e.
                (-d_e.log() - (1.0f64 - d_s).log() / self.config.eta + (1.0f64 - &d_e).log())
                    .mean(Kind::Float)
            };

            self.discriminator_opt.zero_grad();
            loss.backward();
            self.discriminator_opt.step();

            last_loss = loss.double_value(&[]);
            pb.inc(1);
            if (t + 1) % 5000 == 0 {
                pb.set_message(format!("loss: {last_loss:.3}"));
                tracing::info!(
                    step = t + 1,
                    total = self.config.d_steps,
                    loss = last_loss,
                    "discriminator"
                );
            }
        }
        pb.finish_with_message("discriminator fit");
        last_loss
    }

    /// Reclassify D_s against the fitted discriminator: keep transitions
    /// whose outcome scores at least `bar` within `rollback` steps, with
    /// exponentially decaying confidence weights, and compact the buffer
    /// down to the retained rows. Returns the retained row count.
    ///
    /// Mutates the buffer's weight and size state; callers must not run
    /// two selection passes concurrently over one buffer (the `&mut`
    /// receiver enforces this).
    pub fn select_data(&self, replay_s: &mut ReplayBuffer) -> i64 {
        let n = replay_s.len();
        if n == 0 {
            return 0;
        }

        no_grad(|| {
            // Guarantee a trailing trajectory boundary.
            let _ = replay_s.not_done.narrow(0, n - 1, 1).fill_(0.0);
            let done = replay_s
                .not_done
                .eq(0.0)
                .logical_or(&replay_s.timeout.eq(1.0))
                .squeeze_dim(1);
            let boundaries: Vec<i64> = Vec::<i64>::try_from(done.nonzero().squeeze_dim(1))
                .unwrap()
                .iter()
                .map(|i| i + 1)
                .collect();

            // Outcome mask: the next state, paired with the action that
            // produced it, already looks expert-like.
            let base = self
                .discriminator
                .score(&replay_s.next_state, &replay_s.action)
                .squeeze_dim(1)
                .ge(self.config.bar);
            let current = self
                .discriminator
                .score(&replay_s.state, &replay_s.action)
                .squeeze_dim(1)
                .ge(self.config.bar);

            // Reset weights to the zero baseline before raising them.
            replay_s.weight = &replay_s.weight - 1.0;

            let mask = rollback_select(
                &base,
                &current,
                &boundaries,
                self.config.rollback,
                self.config.decay,
                self.config.weight_init,
                &mut replay_s.weight,
            );
            let kept = replay_s.retain(&mask);
            tracing::info!(kept, total = n, "data selection");
            kept
        })
    }

    /// One step of the weighted imitation update, including the dual-ascent
    /// alpha update when adaptive tuning is enabled. Returns the policy
    /// loss.
    pub fn train_policy(&mut self, replay_s: &ReplayBuffer, replay_e: &ReplayBuffer) -> f64 {
        self.total_it += 1;

        let batch_s = replay_s.sample(self.config.batch_size);
        let batch_e = replay_e.sample(self.config.batch_size);

        let log_pi_s = self.actor.log_density(&batch_s.state, &batch_s.action);
        let log_pi_e = self.actor.log_density(&batch_e.state, &batch_e.action);

        if let AlphaMode::Adaptive(tuning) = &mut self.mode {
            let log_pi_ref = tuning
                .reference
                .log_density(&batch_e.state, &batch_e.action);
            let gap = (sum_dims(&log_pi_e).mean(Kind::Float) + tuning.epsilon
                - sum_dims(&log_pi_ref).mean(Kind::Float))
            .detach();
            let alpha_loss = tuning.log_alpha.exp() * gap;

            tuning.alpha_opt.zero_grad();
            alpha_loss.backward();
            tuning.alpha_opt.step();

            self.alpha = no_grad(|| tuning.log_alpha.exp()).double_value(&[0]);
        }

        // Weighted negative log-likelihood on the filtered D_s, anchored by
        // an alpha-scaled negative log-likelihood on D_e.
        let weight_s = batch_s.weight.squeeze_dim(1);
        let loss = (-sum_dims(&log_pi_s) * weight_s).mean(Kind::Float)
            + self.alpha * (-sum_dims(&log_pi_e)).mean(Kind::Float);

        self.actor_opt.zero_grad();
        loss.backward();
        self.actor_opt.step();

        loss.double_value(&[])
    }

    /// One behavioral-cloning step of the expert-reference policy on D_e.
    /// Independent of the student and the coefficient; returns `None` when
    /// adaptive tuning is disabled.
    pub fn train_reference(&mut self, replay_e: &ReplayBuffer) -> Option<f64> {
        match &mut self.mode {
            AlphaMode::Adaptive(tuning) => {
                self.total_it_bc += 1;
                let batch_e = replay_e.sample(self.config.batch_size);
                let log_pi = tuning
                    .reference
                    .log_density(&batch_e.state, &batch_e.action);
                let loss = (-sum_dims(&log_pi)).mean(Kind::Float);

                tuning.reference_opt.zero_grad();
                loss.backward();
                tuning.reference_opt.step();

                Some(loss.double_value(&[]))
            }
            AlphaMode::Fixed => None,
        }
    }

    /// Persist discriminator and policy parameters as per-component blobs.
    pub fn save(&self, prefix: &str) -> Result<()> {
        self.discriminator
            .var_store()
            .save(format!("{prefix}_discriminator.pt"))?;
        self.actor.var_store().save(format!("{prefix}_policy.pt"))?;
        Ok(())
    }

    /// Reload parameters saved by [`ImitationAgent::save`]. Optimizers keep
    /// running with fresh moment state.
    pub fn load(&mut self, prefix: &str) -> Result<()> {
        self.discriminator
            .var_store_mut()
            .load(format!("{prefix}_discriminator.pt"))?;
        self.actor
            .var_store_mut()
            .load(format!("{prefix}_policy.pt"))?;
        Ok(())
    }
}

fn sum_dims(log_pi: &Tensor) -> Tensor {
    log_pi.sum_dim_intlist([-1i64].as_slice(), false, Kind::Float)
}
