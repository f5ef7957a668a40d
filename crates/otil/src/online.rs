//! Online fine-tuning: collect fresh rollouts, relabel their rewards, and
//! keep training against the extended imperfect buffer.

use ndarray::{ArrayD, IxDyn};

use crate::dataset::TransitionSet;
use crate::env::Env;
use crate::eval::{evaluate, ScoreFile};
use crate::relabel::RewardRelabel;
use crate::training::{ImitationAgent, ReplayBuffer};
use crate::Result;

/// Configuration for the online phase.
#[derive(Clone, Debug)]
pub struct OnlineConfig {
    /// Collect-and-update iterations
    pub max_steps: u64,
    /// Evaluate every this many iterations
    pub eval_freq: u64,
    /// Episodes per evaluation pass
    pub eval_episodes: usize,
    /// Base seed for evaluation episodes
    pub seed: u64,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            eval_freq: 20_000,
            eval_episodes: 10,
            seed: 0,
        }
    }
}

/// Roll out one episode with the stochastic student policy, relabeling
/// every reward through `relabel`. The collected transitions carry
/// imperfect-origin flags.
pub fn collect_episode(
    env: &mut dyn Env,
    agent: &ImitationAgent,
    relabel: &dyn RewardRelabel,
    seed: Option<u64>,
) -> TransitionSet {
    let mut set = TransitionSet::default();
    let mut obs = env.reset(seed);
    loop {
        let state: Vec<f32> = obs.iter().copied().collect();
        let action = agent.sample_action(&state);
        let action_arr = ArrayD::from_shape_vec(IxDyn(&[action.len()]), action.clone()).unwrap();
        let result = env.step(&action_arr);

        set.rewards.push(relabel.relabel(&state, &action));
        set.observations.push(state);
        set.actions.push(action);
        set.next_observations
            .push(result.observation.iter().copied().collect());
        set.terminals.push(result.terminated);
        set.timeouts.push(result.truncated);
        set.flag.push(0.0);

        let done = result.done();
        obs = result.observation;
        if done {
            break;
        }
    }
    set
}

/// Online fine-tuning loop: each iteration collects one episode relabeled
/// through the fitted discriminator's scaled odds, appends it to the
/// imperfect buffer, and performs a policy update. Evaluation scores are
/// appended to `scores` every `eval_freq` iterations.
///
/// `reward_scale` is the reward scale recovered by
/// [`crate::relabel::relabel_dataset`]. For a custom relabeling policy,
/// drive [`collect_episode`] directly.
pub fn fine_tune(
    env: &mut dyn Env,
    agent: &mut ImitationAgent,
    replay_s: &mut ReplayBuffer,
    replay_e: &ReplayBuffer,
    reward_scale: f64,
    config: &OnlineConfig,
    scores: &mut ScoreFile,
) -> Result<()> {
    for it in 0..config.max_steps {
        // The relabeler borrows the frozen discriminator only while
        // collecting; the policy update below needs the agent mutably.
        let episode = {
            let relabel = crate::relabel::ScaledOdds::with_unit_y(
                &agent.discriminator,
                reward_scale,
            );
            collect_episode(env, agent, &relabel, None)
        };
        if !episode.is_empty() {
            let fresh = ReplayBuffer::from_set(&episode, replay_s.device())?;
            replay_s.extend(&fresh);
        }

        let loss = agent.train_policy(replay_s, replay_e);

        if it % config.eval_freq == 0 {
            let score = evaluate(env, agent, false, config.eval_episodes, config.seed);
            scores.append(score.normalized)?;
            tracing::info!(
                it,
                loss,
                score = score.normalized,
                buffer = replay_s.len(),
                "online fine-tuning"
            );
        }
    }
    Ok(())
}
