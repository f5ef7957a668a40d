//! Training-loop integration tests on synthetic data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::{Device, Tensor};

use otil::dataset::TransitionSet;
use otil::training::{AgentConfig, ImitationAgent, ReplayBuffer};
use otil::utils::set_seed;

/// A blob of transitions around `center` in both state coordinates.
fn cluster(center: f32, n: usize, flag: f32, rng: &mut StdRng) -> TransitionSet {
    let mut set = TransitionSet::default();
    for i in 0..n {
        let state = vec![
            center + rng.gen_range(-0.2..0.2),
            center + rng.gen_range(-0.2..0.2),
        ];
        let action = vec![rng.gen_range(-0.1..0.1)];
        set.observations.push(state.clone());
        set.actions.push(action);
        set.next_observations.push(state);
        set.rewards.push(0.0);
        set.terminals.push(i == n - 1);
        set.timeouts.push(false);
        set.flag.push(flag);
    }
    set
}

fn cluster_buffers() -> (ReplayBuffer, ReplayBuffer) {
    let mut rng = StdRng::seed_from_u64(0);
    let d_e = cluster(1.0, 256, 1.0, &mut rng);
    let d_s = cluster(-1.0, 256, 0.0, &mut rng);
    (
        ReplayBuffer::from_set(&d_e, Device::Cpu).unwrap(),
        ReplayBuffer::from_set(&d_s, Device::Cpu).unwrap(),
    )
}

fn center_score(agent: &ImitationAgent, center: f32) -> f64 {
    let state = Tensor::from_slice(&[center, center]).reshape([1, 2]);
    let action = Tensor::from_slice(&[0.0f32]).reshape([1, 1]);
    agent
        .discriminator
        .score(&state, &action)
        .double_value(&[0, 0])
}

#[test]
fn discriminator_separates_clusters_without_pu() {
    set_seed(0);
    let (replay_e, replay_s) = cluster_buffers();

    let config = AgentConfig {
        no_pu: true,
        d_steps: 1500,
        discriminator_lr: 1e-3,
        batch_size: 64,
        auto_alpha: false,
        ..AgentConfig::default()
    };
    let mut agent = ImitationAgent::new(2, 1, config).unwrap();
    agent.train_discriminator(&replay_e, &replay_s);

    let expert_like = center_score(&agent, 1.0);
    let imperfect_like = center_score(&agent, -1.0);
    assert!(
        expert_like > 0.5,
        "expert cluster scored {expert_like}, expected > 0.5"
    );
    assert!(
        imperfect_like < 0.5,
        "imperfect cluster scored {imperfect_like}, expected < 0.5"
    );
}

#[test]
fn discriminator_separates_clusters_with_pu() {
    set_seed(1);
    let (replay_e, replay_s) = cluster_buffers();

    let config = AgentConfig {
        d_steps: 1500,
        discriminator_lr: 1e-3,
        eta: 0.5,
        batch_size: 64,
        auto_alpha: false,
        ..AgentConfig::default()
    };
    let mut agent = ImitationAgent::new(2, 1, config).unwrap();
    agent.train_discriminator(&replay_e, &replay_s);

    assert!(center_score(&agent, 1.0) > 0.5);
    assert!(center_score(&agent, -1.0) < 0.5);
}

/// Behavioral cloning on a constant-action dataset must raise the policy's
/// log density of that action.
#[test]
fn policy_imitation_increases_log_density() {
    set_seed(2);
    let mut rng = StdRng::seed_from_u64(2);

    let mut set = TransitionSet::default();
    for i in 0..128 {
        let state = vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
        set.observations.push(state.clone());
        set.actions.push(vec![0.5]);
        set.next_observations.push(state);
        set.rewards.push(0.0);
        set.terminals.push(i == 127);
        set.timeouts.push(false);
        set.flag.push(1.0);
    }
    let replay = ReplayBuffer::from_set(&set, Device::Cpu).unwrap();

    let config = AgentConfig {
        policy_lr: 1e-3,
        batch_size: 64,
        auto_alpha: false,
        alpha: 1.0,
        ..AgentConfig::default()
    };
    let mut agent = ImitationAgent::new(2, 1, config).unwrap();

    let probe_state = Tensor::from_slice(&[0.2f32, -0.3]).reshape([1, 2]);
    let probe_action = Tensor::from_slice(&[0.5f32]).reshape([1, 1]);
    let before = tch::no_grad(|| {
        agent
            .actor
            .log_density(&probe_state, &probe_action)
            .double_value(&[0, 0])
    });

    for _ in 0..300 {
        let loss = agent.train_policy(&replay, &replay);
        assert!(loss.is_finite());
    }

    let after = tch::no_grad(|| {
        agent
            .actor
            .log_density(&probe_state, &probe_action)
            .double_value(&[0, 0])
    });
    assert!(
        after > before,
        "log density did not improve: before={before}, after={after}"
    );
}

/// The dual-ascent coefficient stays positive and finite while both
/// policies train.
#[test]
fn adaptive_alpha_stays_positive() {
    set_seed(3);
    let (replay_e, replay_s) = cluster_buffers();

    let config = AgentConfig {
        policy_lr: 1e-4,
        batch_size: 64,
        ..AgentConfig::default()
    };
    let mut agent = ImitationAgent::new(2, 1, config).unwrap();

    for _ in 0..50 {
        agent.train_reference(&replay_e).unwrap();
    }
    for _ in 0..50 {
        agent.train_policy(&replay_s, &replay_e);
        assert!(agent.alpha() > 0.0);
        assert!(agent.alpha().is_finite());
    }
}
