//! otil CLI
//!
//! Command-line interface for offline-to-online imitation learning runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use otil::dataset::{build_datasets, load_cached, store_cached};
use otil::eval::ScoreFile;
use otil::log::ConsoleLogger;
use otil::online::{fine_tune, OnlineConfig};
use otil::pipeline::{train_offline, OfflineConfig};
use otil::training::{AgentConfig, ImitationAgent, ReplayBuffer};
use otil::utils;
use otil_envs::{collect_dataset, expert_policy, random_policy, PointReach};

#[derive(Parser)]
#[command(name = "otil")]
#[command(version, about = "Offline-to-online imitation learning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train offline from cached benchmark datasets
    Train {
        /// Expert dataset name (cache key)
        #[arg(long)]
        env_e: String,

        /// Imperfect dataset name (cache key)
        #[arg(long)]
        env_s: String,

        /// Dataset cache directory
        #[arg(long, default_value = "datasets")]
        cache_dir: PathBuf,

        /// Output root directory
        #[arg(long, default_value = "results")]
        root_dir: PathBuf,

        /// Expert trajectories in D_e
        #[arg(long, default_value_t = 1)]
        num_e: usize,

        /// Decoy expert trajectories diverted into D_s
        #[arg(long, default_value_t = 1)]
        num_s_e: usize,

        /// Low-quality trajectories seeding D_s
        #[arg(long, default_value_t = 1000)]
        num_s_s: usize,

        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Evaluation interval (steps)
        #[arg(long, default_value_t = 20_000)]
        eval_freq: u64,

        /// Policy training steps
        #[arg(long, default_value_t = 2_000_000)]
        max_timesteps: u64,

        /// Reference behavioral-cloning steps
        #[arg(long, default_value_t = 100_000)]
        bc_steps: u64,

        /// Discriminator training steps
        #[arg(long, default_value_t = 100_000)]
        d_steps: i64,

        /// PU class prior
        #[arg(long, default_value_t = 0.5)]
        eta: f64,

        /// Plain BCE instead of the PU risk estimator
        #[arg(long)]
        no_pu: bool,

        /// Data-selection score threshold
        #[arg(long, default_value_t = 0.5)]
        bar: f64,

        /// Data-selection rollback horizon
        #[arg(long, default_value_t = 1)]
        rollback: i64,

        /// Data-selection weight decay factor
        #[arg(long, default_value_t = 0.5)]
        decay: f64,

        /// Policy learning rate
        #[arg(long, default_value_t = 1e-5)]
        policy_lr: f64,

        /// Adam weight decay
        #[arg(long, default_value_t = 0.005)]
        regularization: f64,

        /// Minibatch size
        #[arg(long, default_value_t = 256)]
        batch_size: i64,

        /// Initial (or fixed) anchor coefficient
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,

        /// Dual-ascent target margin
        #[arg(long, default_value_t = 0.01)]
        epsilon: f64,

        /// Hold alpha fixed instead of tuning it
        #[arg(long)]
        no_auto_alpha: bool,

        /// Skip state normalization
        #[arg(long)]
        no_normalize: bool,
    },

    /// End-to-end demo on the synthetic point-reach task
    Demo {
        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Discriminator training steps
        #[arg(long, default_value_t = 2_000)]
        d_steps: i64,

        /// Reference behavioral-cloning steps
        #[arg(long, default_value_t = 5_000)]
        bc_steps: u64,

        /// Policy training steps
        #[arg(long, default_value_t = 20_000)]
        max_timesteps: u64,

        /// Evaluation interval (steps)
        #[arg(long, default_value_t = 2_000)]
        eval_freq: u64,

        /// Online fine-tuning iterations
        #[arg(long, default_value_t = 200)]
        online_steps: u64,

        /// Output root directory
        #[arg(long, default_value = "results")]
        root_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train {
            env_e,
            env_s,
            cache_dir,
            root_dir,
            num_e,
            num_s_e,
            num_s_s,
            seed,
            eval_freq,
            max_timesteps,
            bc_steps,
            d_steps,
            eta,
            no_pu,
            bar,
            rollback,
            decay,
            policy_lr,
            regularization,
            batch_size,
            alpha,
            epsilon,
            no_auto_alpha,
            no_normalize,
        } => {
            let config = AgentConfig {
                batch_size,
                d_steps,
                eta,
                no_pu,
                bar,
                rollback,
                decay,
                policy_lr,
                regularization,
                alpha,
                auto_alpha: !no_auto_alpha,
                epsilon,
                ..AgentConfig::default()
            };
            let offline = OfflineConfig {
                bc_steps,
                max_timesteps,
                eval_freq,
                seed,
                ..OfflineConfig::default()
            };
            train(
                &env_e, &env_s, &cache_dir, &root_dir, num_e, num_s_e, num_s_s, seed,
                no_normalize, config, offline,
            )
        }
        Commands::Demo {
            seed,
            d_steps,
            bc_steps,
            max_timesteps,
            eval_freq,
            online_steps,
            root_dir,
        } => demo(
            seed,
            d_steps,
            bc_steps,
            max_timesteps,
            eval_freq,
            online_steps,
            &root_dir,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn train(
    env_e: &str,
    env_s: &str,
    cache_dir: &Path,
    root_dir: &Path,
    num_e: usize,
    num_s_e: usize,
    num_s_s: usize,
    seed: u64,
    no_normalize: bool,
    mut config: AgentConfig,
    offline: OfflineConfig,
) -> Result<()> {
    let device = utils::select_device();
    utils::set_seed(seed);
    config.device = device;

    let run_dir = root_dir
        .join(format!(
            "env_e-{env_e}_env_s-{env_s}_num_e-{num_e}_num_s_e-{num_s_e}_num_s_s-{num_s_s}"
        ))
        .join("otil")
        .join(format!("seed-{seed}"));
    tracing::info!(?run_dir, "starting offline run");

    let raw_e = load_cached(cache_dir, env_e)
        .with_context(|| format!("no cached dataset for {env_e} under {}", cache_dir.display()))?;
    let raw_s = load_cached(cache_dir, env_s)
        .with_context(|| format!("no cached dataset for {env_s} under {}", cache_dir.display()))?;

    let (d_e, d_s) = build_datasets(&raw_e, &raw_s, num_e, num_s_e, num_s_s)?;
    tracing::info!(expert = d_e.len(), imperfect = d_s.len(), "demonstrations");

    let mut replay_e = ReplayBuffer::from_set(&d_e, device)?;
    let mut replay_s = ReplayBuffer::from_set(&d_s, device)?;

    if !no_normalize {
        let (mean, std) = utils::compute_mean_std(
            [d_e.observations.as_slice(), d_s.observations.as_slice()],
            1e-3,
        );
        replay_e.normalize_states(&mean, &std);
        replay_s.normalize_states(&mean, &std);
    }

    let state_dim = replay_e.state_dim();
    let action_dim = replay_e.action_dim();
    let mut agent = ImitationAgent::new(state_dim, action_dim, config)?;

    agent.train_discriminator(&replay_e, &replay_s);
    agent.select_data(&mut replay_s);

    let logger = ConsoleLogger::new();
    let mut scores = ScoreFile::create(&run_dir, "offline_eval.txt")?;
    train_offline(
        &mut agent,
        &replay_e,
        &replay_s,
        None,
        &offline,
        Some(&mut scores),
        Some(&logger),
    )?;

    let prefix = run_dir.join("model");
    agent.save(&prefix.to_string_lossy())?;
    tracing::info!(?prefix, "saved model checkpoints");
    Ok(())
}

fn demo(
    seed: u64,
    d_steps: i64,
    bc_steps: u64,
    max_timesteps: u64,
    eval_freq: u64,
    online_steps: u64,
    root_dir: &Path,
) -> Result<()> {
    let device = utils::select_device();
    utils::set_seed(seed);

    let run_dir = root_dir.join("point-reach").join(format!("seed-{seed}"));
    let cache_dir = run_dir.join("datasets");

    let mut env = PointReach::new();
    let raw_e = collect_dataset(&mut env, expert_policy, 10, seed);
    let raw_s = collect_dataset(&mut env, random_policy(2, seed + 1), 40, seed + 1);
    store_cached(&cache_dir, "point-reach-expert", &raw_e)?;
    store_cached(&cache_dir, "point-reach-random", &raw_s)?;

    let (d_e, d_s) = build_datasets(&raw_e, &raw_s, 8, 2, 40)?;
    let replay_e = ReplayBuffer::from_set(&d_e, device)?;
    let mut replay_s = ReplayBuffer::from_set(&d_s, device)?;

    let config = AgentConfig {
        d_steps,
        discriminator_lr: 1e-4,
        policy_lr: 1e-4,
        rollback: 3,
        device,
        ..AgentConfig::default()
    };
    let mut agent = ImitationAgent::new(replay_e.state_dim(), replay_e.action_dim(), config)?;

    agent.train_discriminator(&replay_e, &replay_s);
    agent.select_data(&mut replay_s);
    if replay_s.is_empty() {
        anyhow::bail!("data selection rejected every imperfect transition; lower --bar");
    }

    let logger = ConsoleLogger::new();
    let offline = OfflineConfig {
        bc_steps,
        max_timesteps,
        eval_freq,
        eval_episodes: 5,
        seed,
    };
    let mut scores = ScoreFile::create(&run_dir, "offline_eval.txt")?;
    train_offline(
        &mut agent,
        &replay_e,
        &replay_s,
        Some(&mut env),
        &offline,
        Some(&mut scores),
        Some(&logger),
    )?;

    if online_steps > 0 {
        let online = OnlineConfig {
            max_steps: online_steps,
            eval_freq: (online_steps / 4).max(1),
            eval_episodes: 5,
            seed,
        };
        let mut online_scores = ScoreFile::create(&run_dir, "online_eval.txt")?;
        fine_tune(
            &mut env,
            &mut agent,
            &mut replay_s,
            &replay_e,
            1.0,
            &online,
            &mut online_scores,
        )?;
    }

    let prefix = run_dir.join("model");
    agent.save(&prefix.to_string_lossy())?;
    tracing::info!(?prefix, "demo complete");
    Ok(())
}
