//! Easing curves
//!
//! Maps linear progress in [0, 1] to eased progress. Every curve is exact
//! at its endpoints (`0 -> 0`, `1 -> 1`) and clamps its input, so tweens
//! always land on their start and end values. Back and Elastic curves may
//! leave [0, 1] in between.

use std::f32::consts::PI;

use crate::error::{AnimationError, Result};

/// Easing curve selector
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Curve {
    #[default]
    Linear,
    /// Smoothstep (`3t² - 2t³`)
    Smooth,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    QuintInOut,
    SineIn,
    SineOut,
    SineInOut,
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    CircIn,
    CircOut,
    CircInOut,
    BackIn,
    BackOut,
    BackInOut,
    ElasticIn,
    ElasticOut,
    ElasticInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
    /// CSS-style cubic bezier through (0,0), (x1,y1), (x2,y2), (1,1)
    CubicBezier(f32, f32, f32, f32),
}

/// Shape of the "in" half every In/Out/InOut family is built from
#[derive(Clone, Copy, Debug)]
enum Shape {
    Quad,
    Cubic,
    Quart,
    Quint,
    Sine,
    Expo,
    Circ,
    Back,
    Elastic,
    Bounce,
}

#[derive(Clone, Copy, Debug)]
enum Mode {
    In,
    Out,
    InOut,
}

impl Curve {
    /// Every curve without parameters
    pub const NAMED: [Curve; 32] = [
        Curve::Linear,
        Curve::Smooth,
        Curve::QuadIn,
        Curve::QuadOut,
        Curve::QuadInOut,
        Curve::CubicIn,
        Curve::CubicOut,
        Curve::CubicInOut,
        Curve::QuartIn,
        Curve::QuartOut,
        Curve::QuartInOut,
        Curve::QuintIn,
        Curve::QuintOut,
        Curve::QuintInOut,
        Curve::SineIn,
        Curve::SineOut,
        Curve::SineInOut,
        Curve::ExpoIn,
        Curve::ExpoOut,
        Curve::ExpoInOut,
        Curve::CircIn,
        Curve::CircOut,
        Curve::CircInOut,
        Curve::BackIn,
        Curve::BackOut,
        Curve::BackInOut,
        Curve::ElasticIn,
        Curve::ElasticOut,
        Curve::ElasticInOut,
        Curve::BounceIn,
        Curve::BounceOut,
        Curve::BounceInOut,
    ];

    /// Validated cubic bezier
    ///
    /// Both x control coordinates must lie in [0, 1] so the curve stays a
    /// function of time.
    pub fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
        if !finite || !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(AnimationError::InvalidBezier { x1, y1, x2, y2 });
        }
        Ok(Curve::CubicBezier(x1, y1, x2, y2))
    }

    /// Eased progress for linear progress `t`
    pub fn evaluate(self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        let (shape, mode) = match self {
            Curve::Linear => return t,
            Curve::Smooth => return t * t * (3.0 - 2.0 * t),
            Curve::CubicBezier(x1, y1, x2, y2) => return cubic_bezier_ease(t, x1, y1, x2, y2),
            Curve::QuadIn => (Shape::Quad, Mode::In),
            Curve::QuadOut => (Shape::Quad, Mode::Out),
            Curve::QuadInOut => (Shape::Quad, Mode::InOut),
            Curve::CubicIn => (Shape::Cubic, Mode::In),
            Curve::CubicOut => (Shape::Cubic, Mode::Out),
            Curve::CubicInOut => (Shape::Cubic, Mode::InOut),
            Curve::QuartIn => (Shape::Quart, Mode::In),
            Curve::QuartOut => (Shape::Quart, Mode::Out),
            Curve::QuartInOut => (Shape::Quart, Mode::InOut),
            Curve::QuintIn => (Shape::Quint, Mode::In),
            Curve::QuintOut => (Shape::Quint, Mode::Out),
            Curve::QuintInOut => (Shape::Quint, Mode::InOut),
            Curve::SineIn => (Shape::Sine, Mode::In),
            Curve::SineOut => (Shape::Sine, Mode::Out),
            Curve::SineInOut => (Shape::Sine, Mode::InOut),
            Curve::ExpoIn => (Shape::Expo, Mode::In),
            Curve::ExpoOut => (Shape::Expo, Mode::Out),
            Curve::ExpoInOut => (Shape::Expo, Mode::InOut),
            Curve::CircIn => (Shape::Circ, Mode::In),
            Curve::CircOut => (Shape::Circ, Mode::Out),
            Curve::CircInOut => (Shape::Circ, Mode::InOut),
            Curve::BackIn => (Shape::Back, Mode::In),
            Curve::BackOut => (Shape::Back, Mode::Out),
            Curve::BackInOut => (Shape::Back, Mode::InOut),
            Curve::ElasticIn => (Shape::Elastic, Mode::In),
            Curve::ElasticOut => (Shape::Elastic, Mode::Out),
            Curve::ElasticInOut => (Shape::Elastic, Mode::InOut),
            Curve::BounceIn => (Shape::Bounce, Mode::In),
            Curve::BounceOut => (Shape::Bounce, Mode::Out),
            Curve::BounceInOut => (Shape::Bounce, Mode::InOut),
        };

        match mode {
            Mode::In => ease_in(shape, t),
            Mode::Out => 1.0 - ease_in(shape, 1.0 - t),
            Mode::InOut => {
                if t < 0.5 {
                    ease_in(shape, 2.0 * t) / 2.0
                } else {
                    1.0 - ease_in(shape, 2.0 - 2.0 * t) / 2.0
                }
            }
        }
    }

    /// The curve played backwards and flipped: `1 - evaluate(1 - t)`
    pub fn inverted(self, t: f32) -> f32 {
        1.0 - self.evaluate(1.0 - t)
    }
}

/// Eased progress of `curve` at `t`
#[inline]
pub fn ease(curve: Curve, t: f32) -> f32 {
    curve.evaluate(t)
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    t.mul_add(b - a, a)
}

fn ease_in(shape: Shape, t: f32) -> f32 {
    const BACK: f32 = 1.70158;

    match shape {
        Shape::Quad => t * t,
        Shape::Cubic => t * t * t,
        Shape::Quart => t.powi(4),
        Shape::Quint => t.powi(5),
        Shape::Sine => 1.0 - (t * PI / 2.0).cos(),
        Shape::Expo => {
            if t <= 0.0 {
                0.0
            } else {
                2f32.powf(10.0 * t - 10.0)
            }
        }
        Shape::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        Shape::Back => (BACK + 1.0) * t * t * t - BACK * t * t,
        Shape::Elastic => {
            if t <= 0.0 || t >= 1.0 {
                t.clamp(0.0, 1.0)
            } else {
                let period = 2.0 * PI / 3.0;
                -(2f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * period).sin()
            }
        }
        Shape::Bounce => 1.0 - bounce_out(1.0 - t),
    }
}

fn bounce_out(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;

    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    }
}

/// Cubic bezier easing, CSS semantics
///
/// Solves for the curve parameter with Newton-Raphson and falls back to
/// bisection when the slope flattens. Runs in f64 to avoid jitter.
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let x = t as f64;
    let (x1, y1, x2, y2) = (x1 as f64, y1 as f64, x2 as f64, y2 as f64);

    let mut p = x;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - x;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2) as f32;
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    p = x;
    for _ in 0..24 {
        let value = bezier_sample(p, x1, x2);
        if (value - x).abs() < 1e-7 {
            break;
        }
        if value < x {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2) as f32
}

/// One coordinate of the bezier at parameter `t`, Horner form
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_exact() {
        for curve in Curve::NAMED
            .into_iter()
            .chain([Curve::CubicBezier(0.25, 0.1, 0.25, 1.0)])
        {
            assert_eq!(curve.evaluate(0.0), 0.0, "{curve:?} at 0");
            assert_eq!(curve.evaluate(1.0), 1.0, "{curve:?} at 1");
        }
    }

    #[test]
    fn test_input_is_clamped() {
        for curve in Curve::NAMED {
            assert_eq!(curve.evaluate(-0.5), 0.0);
            assert_eq!(curve.evaluate(1.5), 1.0);
            assert_eq!(curve.evaluate(f32::NAN), 0.0);
        }
    }

    #[test]
    fn test_in_out_pairs_are_symmetric() {
        let pairs = [
            (Curve::QuadIn, Curve::QuadOut),
            (Curve::CubicIn, Curve::CubicOut),
            (Curve::SineIn, Curve::SineOut),
            (Curve::BounceIn, Curve::BounceOut),
        ];
        for (ease_in, ease_out) in pairs {
            for i in 1..10 {
                let t = i as f32 / 10.0;
                let mirrored = 1.0 - ease_in.evaluate(1.0 - t);
                assert!((ease_out.evaluate(t) - mirrored).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_in_out_passes_through_midpoint() {
        for curve in [
            Curve::QuadInOut,
            Curve::CubicInOut,
            Curve::SineInOut,
            Curve::ExpoInOut,
            Curve::CircInOut,
        ] {
            assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-5, "{curve:?}");
        }
    }

    #[test]
    fn test_back_overshoots() {
        assert!(Curve::BackIn.evaluate(0.2) < 0.0);
        assert!(Curve::BackOut.evaluate(0.8) > 1.0);
    }

    #[test]
    fn test_monotonic_curves() {
        for curve in [Curve::Linear, Curve::Smooth, Curve::QuadOut, Curve::ExpoIn] {
            let mut previous = 0.0;
            for i in 1..=100 {
                let value = curve.evaluate(i as f32 / 100.0);
                assert!(value >= previous, "{curve:?} decreased at {i}");
                previous = value;
            }
        }
    }

    #[test]
    fn test_cubic_bezier_linear_diagonal() {
        let curve = Curve::CubicBezier(0.25, 0.25, 0.75, 0.75);
        for i in 1..10 {
            let t = i as f32 / 10.0;
            assert!((curve.evaluate(t) - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cubic_bezier_validation() {
        assert!(Curve::cubic_bezier(0.42, 0.0, 0.58, 1.0).is_ok());
        assert!(Curve::cubic_bezier(1.5, 0.0, 0.58, 1.0).is_err());
        assert!(Curve::cubic_bezier(0.42, f32::NAN, 0.58, 1.0).is_err());
    }

    #[test]
    fn test_inverted_curve() {
        let curve = Curve::QuadIn;
        assert!((curve.inverted(0.3) - Curve::QuadOut.evaluate(0.3)).abs() < 1e-6);
        assert_eq!(curve.inverted(0.0), 0.0);
        assert_eq!(curve.inverted(1.0), 1.0);
    }

    #[test]
    fn test_lerp() {
        assert!((lerp(10.0, 20.0, 0.25) - 12.5).abs() < 1e-6);
        assert_eq!(lerp(-1.0, 1.0, 0.0), -1.0);
    }
}
