//! Oscillation waves
//!
//! A wave maps progress in [0, 1] to an oscillation in [-1, 1]. Composed
//! onto a tween it turns a start-to-end interpolation into a shake or
//! pulse around the start value; the `*Fade` kinds decay linearly to zero
//! by the end, so the target settles back where it began.

use std::f32::consts::TAU;

/// Oscillation shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaveKind {
    #[default]
    Sine,
    Cosine,
    Triangle,
    Square,
    SineFade,
    CosineFade,
    TriangleFade,
    SquareFade,
}

impl WaveKind {
    /// Whether the amplitude decays to zero at t = 1
    pub fn fades(self) -> bool {
        matches!(
            self,
            WaveKind::SineFade | WaveKind::CosineFade | WaveKind::TriangleFade | WaveKind::SquareFade
        )
    }
}

/// A wave shape with a frequency in cycles per unit of progress
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wave {
    pub kind: WaveKind,
    pub frequency: f32,
}

impl Wave {
    pub fn new(kind: WaveKind, frequency: f32) -> Self {
        Self { kind, frequency }
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        wave(self.kind, t, self.frequency)
    }
}

impl Default for Wave {
    fn default() -> Self {
        Self::new(WaveKind::Sine, 1.0)
    }
}

/// Oscillation of `kind` at progress `t` (clamped to [0, 1])
pub fn wave(kind: WaveKind, t: f32, frequency: f32) -> f32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let cycles = t * frequency;

    let raw = match kind {
        WaveKind::Sine | WaveKind::SineFade => (cycles * TAU).sin(),
        WaveKind::Cosine | WaveKind::CosineFade => (cycles * TAU).cos(),
        WaveKind::Triangle | WaveKind::TriangleFade => {
            // Starts at 0, peaks at a quarter cycle
            let phase = (cycles + 0.25).rem_euclid(1.0);
            1.0 - 4.0 * (phase - 0.5).abs()
        }
        WaveKind::Square | WaveKind::SquareFade => {
            if cycles.rem_euclid(1.0) < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    };

    if kind.fades() {
        raw * (1.0 - t)
    } else {
        raw
    }
}
