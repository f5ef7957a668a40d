//! # otil
//!
//! Offline-to-online imitation learning in Rust.
//!
//! ## Overview
//!
//! otil learns a control policy from a small set of expert demonstrations
//! plus a larger set of imperfect trajectories:
//!
//! - A positive-unlabeled (PU) discriminator is fitted on the expert set
//!   D_e against the imperfect set D_s, accounting for the unlabeled
//!   expert-like transitions hiding inside D_s.
//! - A rollback data-selection pass keeps the transitions of D_s that lead
//!   into expert-like territory, with exponentially decaying confidence
//!   weights, and discards the rest.
//! - A weighted imitation loop trains the student policy on the filtered
//!   D_s, anchored to D_e through an adaptively tuned coefficient.
//! - An optional online phase collects fresh rollouts, relabels their
//!   rewards with the fitted discriminator, and continues training.
//!
//! Neural networks and optimization run on `tch` (libtorch bindings).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use otil::prelude::*;
//!
//! let (d_e, d_s) = build_datasets(&raw_e, &raw_s, 1, 0, 1000)?;
//! let mut replay_e = ReplayBuffer::from_set(&d_e, device)?;
//! let mut replay_s = ReplayBuffer::from_set(&d_s, device)?;
//!
//! let mut agent = ImitationAgent::new(state_dim, action_dim, AgentConfig::default())?;
//! agent.train_discriminator(&replay_e, &replay_s);
//! agent.select_data(&mut replay_s);
//! ```

pub mod dataset;
pub mod env;
pub mod eval;
pub mod log;
pub mod online;
pub mod pipeline;
pub mod policy;
pub mod relabel;
pub mod training;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dataset::{build_datasets, RawDataset, TransitionSet};
    pub use crate::env::{Env, NormalizeObservation, StepResult};
    pub use crate::eval::{evaluate, EvalScore, ScoreFile};
    pub use crate::log::{ConsoleLogger, MetricLogger, NoOpLogger};
    pub use crate::online::{collect_episode, fine_tune, OnlineConfig};
    pub use crate::pipeline::{train_offline, OfflineConfig};
    pub use crate::policy::{Discriminator, TanhGaussianActor};
    pub use crate::relabel::{relabel_dataset, LogOdds, RewardRelabel, ScaledOdds};
    pub use crate::training::{AgentConfig, ImitationAgent, ReplayBuffer, TransitionBatch};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum OtilError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("requested {requested} trajectories but the dataset contains {available}")]
    TrajectoryCount { requested: usize, available: usize },

    #[error("training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tensor error: {0}")]
    Tensor(#[from] tch::TchError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OtilError>;
