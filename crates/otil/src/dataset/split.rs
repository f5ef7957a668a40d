//! Trajectory segmentation and expert/imperfect dataset selection.

use super::{RawDataset, TransitionSet};
use crate::{OtilError, Result};

/// One episode's worth of contiguous transitions.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub next_observations: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub terminals: Vec<bool>,
    pub timeouts: Vec<bool>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Partition a flat dataset into trajectories.
///
/// A trajectory accumulates rows until a terminal or timeout flag is
/// observed; the boundary row is included. Every input row lands in exactly
/// one trajectory. `next_observations[i]` is the following row's
/// observation; the final row of the table reuses its own observation
/// (it is always a boundary row in practice).
pub fn segment(raw: &RawDataset) -> Vec<Trajectory> {
    let n = raw.len();
    let mut trajectories = Vec::new();
    let mut current = Trajectory::default();

    for i in 0..n {
        current.observations.push(raw.observations[i].clone());
        current.actions.push(raw.actions[i].clone());
        let next = if i + 1 < n {
            raw.observations[i + 1].clone()
        } else {
            raw.observations[i].clone()
        };
        current.next_observations.push(next);
        current.rewards.push(raw.rewards[i]);
        current.terminals.push(raw.terminals[i]);
        current.timeouts.push(raw.timeouts[i]);

        if raw.terminals[i] || raw.timeouts[i] {
            trajectories.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        trajectories.push(current);
    }
    trajectories
}

fn concat(trajectories: &[Trajectory], flag: f32) -> TransitionSet {
    let mut set = TransitionSet::default();
    for traj in trajectories {
        set.observations.extend(traj.observations.iter().cloned());
        set.actions.extend(traj.actions.iter().cloned());
        set.next_observations
            .extend(traj.next_observations.iter().cloned());
        set.rewards.extend(traj.rewards.iter().copied());
        set.terminals.extend(traj.terminals.iter().copied());
        set.timeouts.extend(traj.timeouts.iter().copied());
    }
    set.flag = vec![flag; set.observations.len()];
    set
}

/// Select expert trajectories for D_e, diverting the last `split_x` of the
/// first `exp_num` trajectories into a decoy extension destined for D_s.
///
/// Returns `(d_e, decoy)`; `decoy` is `None` when `split_x` is zero.
pub fn split_expert(
    raw: &RawDataset,
    split_x: usize,
    exp_num: usize,
) -> Result<(TransitionSet, Option<TransitionSet>)> {
    let trajectories = segment(raw);
    if exp_num > trajectories.len() {
        return Err(OtilError::TrajectoryCount {
            requested: exp_num,
            available: trajectories.len(),
        });
    }
    if split_x >= exp_num {
        return Err(OtilError::Dataset(format!(
            "decoy split {split_x} leaves no expert trajectories out of {exp_num}"
        )));
    }

    let successful = &trajectories[..exp_num];
    let expert = &successful[..exp_num - split_x];
    let decoy = &successful[exp_num - split_x..];

    tracing::info!(count = expert.len(), "expert trajectories in D_e");
    tracing::info!(count = decoy.len(), "expert trajectories diverted to D_s");

    let d_e = concat(expert, 1.0);
    let extra = if decoy.is_empty() {
        None
    } else {
        Some(concat(decoy, 1.0))
    };
    Ok((d_e, extra))
}

/// Take the first `m` trajectories of a dataset, independent of quality.
pub fn take_trajectories(raw: &RawDataset, m: usize) -> Result<TransitionSet> {
    let trajectories = segment(raw);
    if m > trajectories.len() {
        return Err(OtilError::TrajectoryCount {
            requested: m,
            available: trajectories.len(),
        });
    }
    tracing::info!(count = m, "low-quality trajectories in D_s");
    Ok(concat(&trajectories[..m], 0.0))
}

/// Build the expert set D_e and the imperfect set D_s.
///
/// D_s seeds from the first `num_s_s` trajectories of `raw_s` (flag 0) and
/// gains `num_s_e` decoy expert trajectories from `raw_e` (flag 1); D_e is
/// the remaining `num_e` expert trajectories, all flagged 1.
pub fn build_datasets(
    raw_e: &RawDataset,
    raw_s: &RawDataset,
    num_e: usize,
    num_s_e: usize,
    num_s_s: usize,
) -> Result<(TransitionSet, TransitionSet)> {
    let mut d_s = take_trajectories(raw_s, num_s_s)?;
    let (d_e, extra) = split_expert(raw_e, num_s_e, num_e + num_s_e)?;
    if let Some(extra) = extra {
        d_s.extend(extra);
    }
    Ok((d_e, d_s))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two trajectories of three transitions each, terminal on the last
    /// row of each.
    fn two_trajectory_dataset() -> RawDataset {
        let mut raw = RawDataset::default();
        for i in 0..6u32 {
            raw.observations.push(vec![i as f32, 0.0]);
            raw.actions.push(vec![0.1 * i as f32]);
            raw.rewards.push(1.0);
            raw.terminals.push(i == 2 || i == 5);
            raw.timeouts.push(false);
        }
        raw
    }

    #[test]
    fn test_segment_partitions_every_row() {
        let raw = two_trajectory_dataset();
        let trajectories = segment(&raw);
        assert_eq!(trajectories.len(), 2);
        assert_eq!(trajectories[0].len(), 3);
        assert_eq!(trajectories[1].len(), 3);

        // Concatenating the segments reproduces the input partition.
        let all: Vec<Vec<f32>> = trajectories
            .iter()
            .flat_map(|t| t.observations.iter().cloned())
            .collect();
        assert_eq!(all, raw.observations);
    }

    #[test]
    fn test_segment_timeout_boundary() {
        let mut raw = two_trajectory_dataset();
        raw.terminals[2] = false;
        raw.timeouts[2] = true;
        let trajectories = segment(&raw);
        assert_eq!(trajectories.len(), 2);
        assert_eq!(trajectories[0].len(), 3);
    }

    #[test]
    fn test_segment_next_observations() {
        let raw = two_trajectory_dataset();
        let trajectories = segment(&raw);
        // Within a trajectory the next observation is the following row.
        assert_eq!(trajectories[0].next_observations[0], vec![1.0, 0.0]);
        // The boundary row sees the next episode's first observation.
        assert_eq!(trajectories[0].next_observations[2], vec![3.0, 0.0]);
        // The final table row reuses its own observation.
        assert_eq!(trajectories[1].next_observations[2], vec![5.0, 0.0]);
    }

    #[test]
    fn test_split_expert_rejects_overlong_request() {
        let raw = two_trajectory_dataset();
        let err = split_expert(&raw, 0, 3).unwrap_err();
        match err {
            crate::OtilError::TrajectoryCount {
                requested,
                available,
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(take_trajectories(&raw, 5).is_err());
    }

    #[test]
    fn test_split_expert_decoy_diversion() {
        let raw = two_trajectory_dataset();
        let (d_e, extra) = split_expert(&raw, 1, 2).unwrap();
        assert_eq!(d_e.len(), 3);
        let extra = extra.unwrap();
        assert_eq!(extra.len(), 3);
        // Decoy carries the second trajectory's observations.
        assert_eq!(extra.observations[0], vec![3.0, 0.0]);
    }

    #[test]
    fn test_split_expert_no_decoy() {
        let raw = two_trajectory_dataset();
        let (d_e, extra) = split_expert(&raw, 0, 1).unwrap();
        assert_eq!(d_e.len(), 3);
        assert!(extra.is_none());
    }

    #[test]
    fn test_build_datasets_flags() {
        // Expert table holds trajectory 0, imperfect table trajectory 1.
        let raw = two_trajectory_dataset();
        let trajectories = segment(&raw);
        let raw_e = RawDataset {
            observations: trajectories[0].observations.clone(),
            actions: trajectories[0].actions.clone(),
            rewards: trajectories[0].rewards.clone(),
            terminals: trajectories[0].terminals.clone(),
            timeouts: trajectories[0].timeouts.clone(),
        };
        let raw_s = RawDataset {
            observations: trajectories[1].observations.clone(),
            actions: trajectories[1].actions.clone(),
            rewards: trajectories[1].rewards.clone(),
            terminals: trajectories[1].terminals.clone(),
            timeouts: trajectories[1].timeouts.clone(),
        };

        let (d_e, d_s) = build_datasets(&raw_e, &raw_s, 1, 0, 1).unwrap();
        assert_eq!(d_e.len(), 3);
        assert!(d_e.flag.iter().all(|&f| f == 1.0));
        assert_eq!(d_e.observations[0], vec![0.0, 0.0]);

        assert_eq!(d_s.len(), 3);
        assert!(d_s.flag.iter().all(|&f| f == 0.0));
        assert_eq!(d_s.observations[0], vec![3.0, 0.0]);
    }

    #[test]
    fn test_build_datasets_with_decoy() {
        let raw = two_trajectory_dataset();
        let (d_e, d_s) = build_datasets(&raw, &raw, 1, 1, 1).unwrap();
        assert_eq!(d_e.len(), 3);
        // D_s = 1 low-quality trajectory + 1 decoy expert trajectory.
        assert_eq!(d_s.len(), 6);
        assert_eq!(d_s.flag[..3], [0.0, 0.0, 0.0]);
        assert_eq!(d_s.flag[3..], [1.0, 1.0, 1.0]);
    }
}
