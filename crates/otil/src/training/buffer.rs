//! Columnar replay buffer over transition tuples.

use tch::{Device, Kind, Tensor};

use crate::dataset::TransitionSet;
use crate::Result;

/// A sampled minibatch of transitions.
pub struct TransitionBatch {
    pub state: Tensor,
    pub action: Tensor,
    pub next_state: Tensor,
    pub reward: Tensor,
    pub not_done: Tensor,
    pub flag: Tensor,
    pub weight: Tensor,
    pub timeout: Tensor,
}

/// Columnar store of transitions with uniform-with-replacement sampling.
///
/// Every column shares the same row count `size`. Filtering goes through
/// [`ReplayBuffer::retain`], which compacts all columns against a boolean
/// mask instead of deleting rows in place, so the shared-length invariant
/// holds by construction.
pub struct ReplayBuffer {
    pub state: Tensor,
    pub action: Tensor,
    pub next_state: Tensor,
    pub reward: Tensor,
    pub not_done: Tensor,
    pub flag: Tensor,
    pub weight: Tensor,
    pub timeout: Tensor,
    size: i64,
    device: Device,
}

impl ReplayBuffer {
    /// Create an empty buffer with pre-allocated columns.
    pub fn new(state_dim: i64, action_dim: i64, capacity: i64, device: Device) -> Self {
        Self {
            state: Tensor::zeros([capacity, state_dim], (Kind::Float, device)),
            action: Tensor::zeros([capacity, action_dim], (Kind::Float, device)),
            next_state: Tensor::zeros([capacity, state_dim], (Kind::Float, device)),
            reward: Tensor::zeros([capacity, 1], (Kind::Float, device)),
            not_done: Tensor::zeros([capacity, 1], (Kind::Float, device)),
            flag: Tensor::zeros([capacity, 1], (Kind::Float, device)),
            weight: Tensor::ones([capacity, 1], (Kind::Float, device)),
            timeout: Tensor::zeros([capacity, 1], (Kind::Float, device)),
            size: 0,
            device,
        }
    }

    /// Build a buffer directly from a split transition table.
    pub fn from_set(data: &TransitionSet, device: Device) -> Result<Self> {
        let mut buffer = Self::new(1, 1, 0, device);
        buffer.load(data)?;
        Ok(buffer)
    }

    /// Logical number of valid rows.
    pub fn len(&self) -> i64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn state_dim(&self) -> i64 {
        self.state.size()[1]
    }

    pub fn action_dim(&self) -> i64 {
        self.action.size()[1]
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Replace the buffer contents with a split transition table. Weights
    /// reset to 1.
    pub fn load(&mut self, data: &TransitionSet) -> Result<()> {
        data.validate()?;
        let n = data.len() as i64;
        self.state = to_matrix(&data.observations, self.device);
        self.action = to_matrix(&data.actions, self.device);
        self.next_state = to_matrix(&data.next_observations, self.device);
        self.reward = to_column(&data.rewards, self.device);
        let not_done: Vec<f32> = data
            .terminals
            .iter()
            .map(|&t| if t { 0.0 } else { 1.0 })
            .collect();
        self.not_done = to_column(&not_done, self.device);
        self.flag = to_column(&data.flag, self.device);
        let timeouts: Vec<f32> = data
            .timeouts
            .iter()
            .map(|&t| if t { 1.0 } else { 0.0 })
            .collect();
        self.timeout = to_column(&timeouts, self.device);
        self.weight = Tensor::ones([n, 1], (Kind::Float, self.device));
        self.size = n;
        Ok(())
    }

    /// Sample `batch_size` rows uniformly with replacement.
    pub fn sample(&self, batch_size: i64) -> TransitionBatch {
        let ind = Tensor::randint(self.size, [batch_size], (Kind::Int64, self.device));
        TransitionBatch {
            state: self.state.index_select(0, &ind),
            action: self.action.index_select(0, &ind),
            next_state: self.next_state.index_select(0, &ind),
            reward: self.reward.index_select(0, &ind),
            not_done: self.not_done.index_select(0, &ind),
            flag: self.flag.index_select(0, &ind),
            weight: self.weight.index_select(0, &ind),
            timeout: self.timeout.index_select(0, &ind),
        }
    }

    /// Normalize state and next-state columns with shared statistics.
    pub fn normalize_states(&mut self, mean: &[f32], std: &[f32]) {
        let mean = Tensor::from_slice(mean)
            .reshape([1, -1])
            .to_device(self.device);
        let std = Tensor::from_slice(std)
            .reshape([1, -1])
            .to_device(self.device);
        self.state = (&self.state - &mean) / &std;
        self.next_state = (&self.next_state - &mean) / &std;
    }

    /// Bulk-append all rows of another buffer.
    pub fn extend(&mut self, other: &ReplayBuffer) {
        self.state = cat_rows(&self.state, self.size, &other.state, other.size);
        self.action = cat_rows(&self.action, self.size, &other.action, other.size);
        self.next_state = cat_rows(&self.next_state, self.size, &other.next_state, other.size);
        self.reward = cat_rows(&self.reward, self.size, &other.reward, other.size);
        self.not_done = cat_rows(&self.not_done, self.size, &other.not_done, other.size);
        self.flag = cat_rows(&self.flag, self.size, &other.flag, other.size);
        self.weight = cat_rows(&self.weight, self.size, &other.weight, other.size);
        self.timeout = cat_rows(&self.timeout, self.size, &other.timeout, other.size);
        self.size += other.size;
    }

    /// Compact every column down to the rows where `mask` (shape `[size]`,
    /// Bool) is set. Returns the retained row count.
    pub fn retain(&mut self, mask: &Tensor) -> i64 {
        let idx = mask.nonzero().squeeze_dim(1);
        self.state = self.state.index_select(0, &idx);
        self.action = self.action.index_select(0, &idx);
        self.next_state = self.next_state.index_select(0, &idx);
        self.reward = self.reward.index_select(0, &idx);
        self.not_done = self.not_done.index_select(0, &idx);
        self.flag = self.flag.index_select(0, &idx);
        self.weight = self.weight.index_select(0, &idx);
        self.timeout = self.timeout.index_select(0, &idx);
        self.size = idx.size()[0];
        self.size
    }
}

fn to_matrix(rows: &[Vec<f32>], device: Device) -> Tensor {
    let n = rows.len() as i64;
    let dim = rows[0].len() as i64;
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_slice(&flat).reshape([n, dim]).to_device(device)
}

fn to_column(values: &[f32], device: Device) -> Tensor {
    Tensor::from_slice(values).reshape([-1, 1]).to_device(device)
}

fn cat_rows(a: &Tensor, a_len: i64, b: &Tensor, b_len: i64) -> Tensor {
    Tensor::cat(&[a.narrow(0, 0, a_len), b.narrow(0, 0, b_len)], 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TransitionSet;

    fn toy_set(n: usize, flag: f32) -> TransitionSet {
        let mut set = TransitionSet::default();
        for i in 0..n {
            set.observations.push(vec![i as f32, 0.0]);
            set.actions.push(vec![0.5]);
            set.next_observations.push(vec![i as f32 + 1.0, 0.0]);
            set.rewards.push(1.0);
            set.terminals.push(i == n - 1);
            set.timeouts.push(false);
            set.flag.push(flag);
        }
        set
    }

    #[test]
    fn test_load_sets_size() {
        let buffer = ReplayBuffer::from_set(&toy_set(7, 1.0), Device::Cpu).unwrap();
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.state_dim(), 2);
        assert_eq!(buffer.action_dim(), 1);
        // Terminal row maps to not_done = 0.
        assert_eq!(buffer.not_done.double_value(&[6, 0]), 0.0);
        assert_eq!(buffer.not_done.double_value(&[0, 0]), 1.0);
        // Weights default to 1.
        assert_eq!(buffer.weight.sum(Kind::Float).double_value(&[]), 7.0);
    }

    #[test]
    fn test_load_rejects_empty() {
        let set = TransitionSet::default();
        assert!(ReplayBuffer::from_set(&set, Device::Cpu).is_err());
    }

    #[test]
    fn test_sample_batch_shape() {
        let buffer = ReplayBuffer::from_set(&toy_set(5, 0.0), Device::Cpu).unwrap();
        let batch = buffer.sample(16);
        assert_eq!(batch.state.size(), [16, 2]);
        assert_eq!(batch.action.size(), [16, 1]);
        assert_eq!(batch.weight.size(), [16, 1]);
        // Sampled states must come from the stored rows (first coordinate
        // in 0..5).
        let max = batch.state.narrow(1, 0, 1).max().double_value(&[]);
        assert!(max < 5.0);
    }

    #[test]
    fn test_retain_compacts_columns() {
        let mut buffer = ReplayBuffer::from_set(&toy_set(4, 0.0), Device::Cpu).unwrap();
        let mask = Tensor::from_slice(&[true, false, true, false]);
        let kept = buffer.retain(&mask);
        assert_eq!(kept, 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.state.size(), [2, 2]);
        assert_eq!(buffer.state.double_value(&[1, 0]), 2.0);
    }

    #[test]
    fn test_extend_appends_rows() {
        let mut a = ReplayBuffer::from_set(&toy_set(3, 0.0), Device::Cpu).unwrap();
        let b = ReplayBuffer::from_set(&toy_set(2, 1.0), Device::Cpu).unwrap();
        a.extend(&b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.flag.double_value(&[4, 0]), 1.0);
        assert_eq!(a.flag.double_value(&[0, 0]), 0.0);
    }

    #[test]
    fn test_normalize_states() {
        let mut buffer = ReplayBuffer::from_set(&toy_set(3, 0.0), Device::Cpu).unwrap();
        buffer.normalize_states(&[1.0, 0.0], &[2.0, 1.0]);
        assert_eq!(buffer.state.double_value(&[0, 0]), -0.5);
        assert_eq!(buffer.next_state.double_value(&[0, 0]), 0.0);
    }
}
