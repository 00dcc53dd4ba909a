//! Animation error types

use thiserror::Error;

/// Errors reported when building curves and tweens
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Bezier control points that do not describe a function of time
    #[error("Invalid cubic bezier ({x1}, {y1}, {x2}, {y2}): x coordinates must be finite and within [0, 1]")]
    InvalidBezier { x1: f32, y1: f32, x2: f32, y2: f32 },

    /// A tween duration that is negative or not a number
    #[error("Invalid tween duration {0}")]
    InvalidDuration(f32),
}

/// Result type for animation construction
pub type Result<T> = std::result::Result<T, AnimationError>;
