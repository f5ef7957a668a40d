//! Rollback retention and weight decay over a trajectory-segmented buffer.

use tch::Tensor;

/// Propagate retention backward along each trajectory and raise weights.
///
/// - `base`: Bool `[n]`, transitions whose outcome already scores as
///   expert-like.
/// - `current`: Bool `[n]`, transitions whose own (state, action) pair
///   scores as expert-like.
/// - `boundaries`: ascending indices of the first transition after each
///   trajectory; the last entry equals `n`.
/// - `weight`: `[n, 1]` float, already reset to the zero baseline; raised
///   in place, never lowered.
///
/// At rollback step `k` a transition is additionally retained if its
/// outcome `k + 1` steps ahead is expert-like; lookups that would cross a
/// trajectory boundary contribute nothing. Newly or already retained
/// transitions are raised to `weight_init * decay^k` when below it.
///
/// Returns the final retain mask, Bool `[n]`.
pub(crate) fn rollback_select(
    base: &Tensor,
    current: &Tensor,
    boundaries: &[i64],
    rollback: i64,
    decay: f64,
    weight_init: f64,
    weight: &mut Tensor,
) -> Tensor {
    let n = base.size()[0];
    let mask = base.copy();
    let mut weight_decay = weight_init;

    for k in 0..rollback {
        let index = current.copy();
        // The first k+1 entries of each trajectory would be looked up from
        // the previous trajectory's tail; blank them out.
        let mut start = 0i64;
        for &end in boundaries {
            let stop = end.min(start + k + 1);
            if stop > start {
                let _ = index.narrow(0, start, stop - start).fill_(0);
            }
            start = end;
        }

        let shift = k + 1;
        if n > shift {
            let _ = mask
                .narrow(0, 0, n - shift)
                .logical_or_(&index.narrow(0, shift, n - shift));
        }

        let below = weight.squeeze_dim(1).lt(weight_decay);
        let raise = mask.logical_and(&below).unsqueeze(1);
        let _ = weight.masked_fill_(&raise, weight_decay);
        weight_decay *= decay;
    }

    mask
}
