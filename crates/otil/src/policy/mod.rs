//! Policy and discriminator networks.

mod actor;
mod discriminator;

pub use actor::TanhGaussianActor;
pub use discriminator::{Discriminator, SCORE_MAX, SCORE_MIN};
