//! Policy evaluation and the run-scoped score log.

use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};

use crate::env::Env;
use crate::training::ImitationAgent;
use crate::Result;

// Evaluation episodes reuse the training seed at a fixed offset.
const SEED_OFFSET: u64 = 100;

/// Outcome of an evaluation pass.
#[derive(Clone, Copy, Debug)]
pub struct EvalScore {
    /// Mean undiscounted episode return
    pub mean_return: f32,
    /// Benchmark-normalized score (percent)
    pub normalized: f32,
}

/// Run the policy for `episodes` fixed-seed episodes with deterministic
/// actions and return the mean and normalized scores. With `reference`
/// set, the expert-reference policy is evaluated instead of the student.
pub fn evaluate(
    env: &mut dyn Env,
    agent: &ImitationAgent,
    reference: bool,
    episodes: usize,
    seed: u64,
) -> EvalScore {
    let mut total = 0.0f32;
    for ep in 0..episodes {
        let mut obs = env.reset(Some(seed + SEED_OFFSET + ep as u64));
        loop {
            let state: Vec<f32> = obs.iter().copied().collect();
            let action = agent.act(&state, reference);
            let action = ArrayD::from_shape_vec(IxDyn(&[action.len()]), action).unwrap();
            let result = env.step(&action);
            total += result.reward;
            let done = result.done();
            obs = result.observation;
            if done {
                break;
            }
        }
    }

    let mean_return = total / episodes as f32;
    let normalized = env.normalized_score(mean_return) * 100.0;
    tracing::info!(episodes, mean_return, normalized, "evaluation");
    EvalScore {
        mean_return,
        normalized,
    }
}

/// Append-only, run-scoped evaluation log: one score per line.
pub struct ScoreFile {
    path: PathBuf,
    file: std::fs::File,
}

impl ScoreFile {
    /// Create (truncating) the score file under `dir`.
    pub fn create(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(name);
        let file = std::fs::File::create(&path)?;
        Ok(Self { path, file })
    }

    /// Append one evaluation score as a single-column row.
    pub fn append(&mut self, score: f32) -> Result<()> {
        writeln!(self.file, "{score}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
