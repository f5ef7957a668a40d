//! Expert-likeness discriminator over (state, action) pairs.

use tch::{nn, nn::Module, Device, Tensor};

/// Lower clamp on discriminator scores. The clamp prevents log(0)/log(1)
/// singularities in the positive-unlabeled loss and is an invariant, not a
/// tunable.
pub const SCORE_MIN: f64 = 0.1;
/// Upper clamp on discriminator scores.
pub const SCORE_MAX: f64 = 0.9;

/// Binary classifier estimating how expert-like a transition is.
pub struct Discriminator {
    vs: nn::VarStore,
    fc1: nn::Linear,
    fc2: nn::Linear,
    fc3: nn::Linear,
    device: Device,
}

impl Discriminator {
    pub fn new(state_dim: i64, action_dim: i64, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let fc1 = nn::linear(
            &root / "fc1",
            state_dim + action_dim,
            256,
            Default::default(),
        );
        let fc2 = nn::linear(&root / "fc2", 256, 256, Default::default());
        let fc3 = nn::linear(&root / "fc3", 256, 1, Default::default());

        Self {
            vs,
            fc1,
            fc2,
            fc3,
            device,
        }
    }

    /// Probability in `[SCORE_MIN, SCORE_MAX]` that `(state, action)` is
    /// expert-origin. Shape `[B, 1]`.
    pub fn score(&self, state: &Tensor, action: &Tensor) -> Tensor {
        let x = Tensor::cat(&[state, action], 1);
        let h = self.fc2.forward(&self.fc1.forward(&x).relu()).relu();
        self.fc3
            .forward(&h)
            .sigmoid()
            .clamp(SCORE_MIN, SCORE_MAX)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}
