//! Flat transition tables and the on-disk dataset cache.

mod split;

pub use split::{build_datasets, segment, split_expert, take_trajectories, Trajectory};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{OtilError, Result};

/// A raw benchmark-style transition table, as downloaded or cached:
/// one row per environment step, episode boundaries marked by the
/// `terminals` and `timeouts` columns.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawDataset {
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub terminals: Vec<bool>,
    pub timeouts: Vec<bool>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Check that every column has the same number of rows.
    pub fn validate(&self) -> Result<()> {
        let n = self.observations.len();
        if self.actions.len() != n
            || self.rewards.len() != n
            || self.terminals.len() != n
            || self.timeouts.len() != n
        {
            return Err(OtilError::Dataset(format!(
                "column length mismatch: observations={}, actions={}, rewards={}, terminals={}, timeouts={}",
                n,
                self.actions.len(),
                self.rewards.len(),
                self.terminals.len(),
                self.timeouts.len()
            )));
        }
        Ok(())
    }
}

/// A post-split transition table: `next_observations` has been derived and
/// every row carries a `flag` (1 for expert-origin, 0 for imperfect-origin).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionSet {
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub next_observations: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub terminals: Vec<bool>,
    pub timeouts: Vec<bool>,
    pub flag: Vec<f32>,
}

impl TransitionSet {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Overwrite the origin flag on every row.
    pub fn set_flag(&mut self, value: f32) {
        self.flag = vec![value; self.len()];
    }

    /// Append all rows of `other`, preserving order.
    pub fn extend(&mut self, other: TransitionSet) {
        self.observations.extend(other.observations);
        self.actions.extend(other.actions);
        self.next_observations.extend(other.next_observations);
        self.rewards.extend(other.rewards);
        self.terminals.extend(other.terminals);
        self.timeouts.extend(other.timeouts);
        self.flag.extend(other.flag);
    }

    /// Check that every column has the same number of rows and the set is
    /// not empty.
    pub fn validate(&self) -> Result<()> {
        let n = self.observations.len();
        if n == 0 {
            return Err(OtilError::Dataset("empty transition set".to_string()));
        }
        if self.actions.len() != n
            || self.next_observations.len() != n
            || self.rewards.len() != n
            || self.terminals.len() != n
            || self.timeouts.len() != n
            || self.flag.len() != n
        {
            return Err(OtilError::Dataset(
                "transition set column length mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cache file location for a dataset, keyed by environment name.
pub fn cache_path(cache_dir: &Path, env_name: &str) -> PathBuf {
    cache_dir.join(format!("{env_name}.json"))
}

/// Load a cached dataset for `env_name`.
pub fn load_cached(cache_dir: &Path, env_name: &str) -> Result<RawDataset> {
    let file = std::fs::File::open(cache_path(cache_dir, env_name))?;
    let dataset: RawDataset = serde_json::from_reader(std::io::BufReader::new(file))?;
    dataset.validate()?;
    Ok(dataset)
}

/// Write a dataset to the cache under `env_name`.
pub fn store_cached(cache_dir: &Path, env_name: &str, dataset: &RawDataset) -> Result<()> {
    std::fs::create_dir_all(cache_dir)?;
    let file = std::fs::File::create(cache_path(cache_dir, env_name))?;
    serde_json::to_writer(std::io::BufWriter::new(file), dataset)?;
    Ok(())
}

/// Load `env_name` from the cache, calling `fetch` and populating the cache
/// on a miss.
pub fn load_or_fetch<F>(cache_dir: &Path, env_name: &str, fetch: F) -> Result<RawDataset>
where
    F: FnOnce() -> Result<RawDataset>,
{
    if cache_path(cache_dir, env_name).exists() {
        return load_cached(cache_dir, env_name);
    }
    tracing::info!(env_name, "dataset cache miss, fetching");
    let dataset = fetch()?;
    store_cached(cache_dir, env_name, &dataset)?;
    Ok(dataset)
}
