//! Environment collaborator boundary.

mod traits;
mod wrappers;

pub use traits::{Env, StepResult};
pub use wrappers::NormalizeObservation;
