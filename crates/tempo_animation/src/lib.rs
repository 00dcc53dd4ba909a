//! Tempo Animation
//!
//! Value tweens for the Tempo fiber scheduler.
//!
//! # Features
//!
//! - **Curves**: Quad through Bounce in In/Out/InOut forms, smoothstep and
//!   CSS-style cubic bezier, all exact at their endpoints
//! - **Waves**: sine, cosine, triangle and square oscillations, with fading
//!   variants, composed onto the eased value
//! - **Tweens**: single, looping and yoyo playback with cancel policies,
//!   runnable standalone or as a fiber routine
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tempo_animation::{Curve, LoopMode, Tween};
//! use tempo_core::{Phase, Scheduler, SchedulerConfig};
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default());
//! let opacity = Rc::new(Cell::new(0.0f32));
//! let sink = opacity.clone();
//!
//! let fade = Tween::between(0.0f32, 1.0, 0.5, move |v| sink.set(v))
//!     .with_curve(Curve::CubicOut)
//!     .with_loop_mode(LoopMode::Single);
//! let handle = scheduler.start(fade);
//!
//! scheduler.update_with_delta(Phase::Update, 0.6).unwrap();
//! assert!(!scheduler.is_running(handle));
//! assert_eq!(opacity.get(), 1.0);
//! ```

pub mod curve;
pub mod error;
pub mod target;
pub mod tween;
pub mod wave;

pub use curve::{ease, lerp, Curve};
pub use error::{AnimationError, Result};
pub use target::{fn_target, FnTarget, Lerp, TweenTarget, ValueTarget};
pub use tween::{CancelPolicy, LoopMode, Tween, TweenState, YoyoMode};
pub use wave::{wave, Wave, WaveKind};
