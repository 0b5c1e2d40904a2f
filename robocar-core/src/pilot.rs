//! Inference engine seam
//!
//! The model runtime and its artifacts live outside this crate; the
//! autonomous control source only consumes this trait.

use crate::error::InferenceFault;
use crate::features::{FeatureWindow, ImageTensor};

/// Input handed to the model for one prediction.
pub enum ModelInput<'a> {
    /// Stateless models: the latest observation
    Single {
        image: &'a ImageTensor,
        sensors: &'a [f64],
    },
    /// Sequence models: the full fixed-length observation window,
    /// chronological order
    Sequence(&'a FeatureWindow),
}

/// Model output, by head count. Modeled as a sum type so every arity is
/// handled explicitly instead of branching on output length at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prediction {
    Steering(f64),
    SteeringThrottle(f64, f64),
    SteeringThrottleBrake(f64, f64, f64),
}

/// A loaded driving policy.
pub trait InferencePilot {
    fn predict(&mut self, input: ModelInput<'_>) -> Result<Prediction, InferenceFault>;
}
