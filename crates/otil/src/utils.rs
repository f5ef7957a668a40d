//! Seeding, device selection, and observation statistics.

use tch::Device;

/// Set the global random seed for tensor operations.
pub fn set_seed(seed: u64) {
    tch::manual_seed(seed as i64);
}

/// Pick the training device, falling back to CPU when no accelerator is
/// eligible.
pub fn select_device() -> Device {
    let device = Device::cuda_if_available();
    match device {
        Device::Cuda(index) => tracing::info!(index, "selected CUDA device"),
        _ => tracing::info!("no CUDA device available, using CPU"),
    }
    device
}

/// Per-dimension mean and standard deviation over one or more groups of
/// observation rows. `eps` pads the deviation so downstream division is
/// always defined.
pub fn compute_mean_std<'a>(
    groups: impl IntoIterator<Item = &'a [Vec<f32>]> + Clone,
    eps: f32,
) -> (Vec<f32>, Vec<f32>) {
    let mut count = 0usize;
    let mut dim = 0usize;
    for group in groups.clone() {
        for row in group {
            dim = row.len();
            count += 1;
        }
    }
    if count == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut mean = vec![0.0f64; dim];
    for group in groups.clone() {
        for row in group {
            for (m, &x) in mean.iter_mut().zip(row.iter()) {
                *m += x as f64;
            }
        }
    }
    for m in &mut mean {
        *m /= count as f64;
    }

    let mut var = vec![0.0f64; dim];
    for group in groups {
        for row in group {
            for ((v, &m), &x) in var.iter_mut().zip(mean.iter()).zip(row.iter()) {
                let d = x as f64 - m;
                *v += d * d;
            }
        }
    }

    let mean = mean.iter().map(|&m| m as f32).collect();
    let std = var
        .iter()
        .map(|&v| ((v / count as f64).sqrt() as f32) + eps)
        .collect();
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_std_joint_groups() {
        let a = vec![vec![0.0f32, 2.0], vec![2.0, 2.0]];
        let b = vec![vec![4.0f32, 2.0]];
        let (mean, std) = compute_mean_std([a.as_slice(), b.as_slice()], 1e-3);
        assert_eq!(mean, vec![2.0, 2.0]);
        assert!((std[0] - ((8.0f32 / 3.0).sqrt() + 1e-3)).abs() < 1e-5);
        assert!((std[1] - 1e-3).abs() < 1e-5);
    }

    #[test]
    fn test_mean_std_empty() {
        let empty: Vec<Vec<f32>> = Vec::new();
        let (mean, std) = compute_mean_std([empty.as_slice()], 1e-3);
        assert!(mean.is_empty());
        assert!(std.is_empty());
    }
}
