use serde::{Deserialize, Serialize};

/// The closed catalog of activation functions a layer can carry.
///
/// Variant data holds the only per-function parameter (the step
/// threshold), so differentiation and serialization are exhaustive
/// matches rather than function-identity checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Logistic sigmoid, range (0, 1).
    Logistic,
    /// Hyperbolic-tangent sigmoid, range (-1, 1).
    Tanh,
    /// Heaviside step: 0 below the threshold, 1 at or above it.
    Step { threshold: f32 },
    /// Identity.
    Linear,
    /// Rectified linear: max(0, x).
    PosLinear,
}

impl Activation {
    /// Step with the conventional 0.5 threshold.
    pub fn step() -> Self {
        Activation::Step { threshold: 0.5 }
    }

    /// Map a membrane potential to an activation level.
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Step { threshold } => {
                if x < threshold {
                    0.0
                } else {
                    1.0
                }
            }
            Activation::Linear => x,
            Activation::PosLinear => x.max(0.0),
        }
    }

    /// Local derivative evaluated at an activation level `a`.
    ///
    /// The step function is non-differentiable, so no gradient flows
    /// through it; both linear variants pass gradients unchanged.
    pub fn derivative(self, a: f32) -> f32 {
        match self {
            Activation::Logistic => a * (1.0 - a),
            Activation::Tanh => 1.0 - a.tanh() * a.tanh(),
            Activation::Step { .. } => 0.0,
            Activation::Linear | Activation::PosLinear => 1.0,
        }
    }
}
