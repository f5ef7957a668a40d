//! Offline training orchestration: reference cloning, policy imitation,
//! periodic evaluation.

use indicatif::{ProgressBar, ProgressStyle};

use crate::env::Env;
use crate::eval::{evaluate, ScoreFile};
use crate::log::MetricLogger;
use crate::training::{ImitationAgent, ReplayBuffer};
use crate::Result;

/// Configuration for the offline training phase.
#[derive(Clone, Debug)]
pub struct OfflineConfig {
    /// Behavioral-cloning steps for the expert-reference policy
    pub bc_steps: u64,
    /// Policy-imitation steps
    pub max_timesteps: u64,
    /// Evaluate every this many steps
    pub eval_freq: u64,
    /// Episodes per evaluation pass
    pub eval_episodes: usize,
    /// Base seed for evaluation episodes
    pub seed: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            bc_steps: 100_000,
            max_timesteps: 2_000_000,
            eval_freq: 20_000,
            eval_episodes: 10,
            seed: 0,
        }
    }
}

fn progress(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Run the offline phase against already-built (and selected) buffers:
/// fit the expert-reference policy by behavioral cloning, then run the
/// weighted imitation loop with periodic evaluation.
///
/// Evaluation needs an environment; with `env` absent the loop still
/// trains but skips scoring. Returns the collected normalized scores.
pub fn train_offline(
    agent: &mut ImitationAgent,
    replay_e: &ReplayBuffer,
    replay_s: &ReplayBuffer,
    mut env: Option<&mut dyn Env>,
    config: &OfflineConfig,
    mut scores: Option<&mut ScoreFile>,
    logger: Option<&dyn MetricLogger>,
) -> Result<Vec<f32>> {
    if agent.is_adaptive() && config.bc_steps > 0 {
        let pb = progress(config.bc_steps);
        for _ in 0..config.bc_steps {
            agent.train_reference(replay_e);
            pb.inc(1);
        }
        pb.finish_with_message("reference policy cloned");
    }

    let mut evaluations = Vec::new();
    let pb = progress(config.max_timesteps);
    for it in 0..config.max_timesteps {
        let loss = agent.train_policy(replay_s, replay_e);

        if it % config.eval_freq == 0 {
            if let Some(env) = env.as_mut() {
                let score = evaluate(&mut **env, agent, false, config.eval_episodes, config.seed);
                evaluations.push(score.normalized);
                if let Some(scores) = scores.as_mut() {
                    scores.append(score.normalized)?;
                }
                if let Some(logger) = logger {
                    logger.log_scalar("normalized_score", score.normalized as f64, it);
                }
                pb.set_message(format!(
                    "loss: {loss:.3} score: {:.1} alpha: {:.3}",
                    score.normalized,
                    agent.alpha()
                ));
            }
            if let Some(logger) = logger {
                logger.log_scalar("policy_loss", loss, it);
                logger.log_scalar("alpha", agent.alpha(), it);
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("policy training complete");

    Ok(evaluations)
}
