//! Tweens
//!
//! A tween drives a [`TweenTarget`] from its start value to its end value
//! over a duration, through an easing [`Curve`] and an optional [`Wave`].
//!
//! Progress is kept as a within-cycle percent folded into [0, 1). Each time
//! it crosses 1 the loop bookkeeping runs first (remaining crossings,
//! direction flip for yoyo modes) and only then is the eased value
//! computed, so a single large delta can cross several cycles at once.
//!
//! State machine: `Begin -> Run -> End`, terminal at `End`.
//!
//! A tween is a [`Routine`], so it can be started on a scheduler directly
//! or called from inside another routine.

use tempo_core::{Callback, Routine, RoutineContext, Yield};

use crate::curve::Curve;
use crate::error::{AnimationError, Result};
use crate::target::{fn_target, Lerp, TweenTarget, ValueTarget};
use crate::wave::Wave;

/// How a tween repeats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopMode {
    /// Play once
    #[default]
    Single,
    /// Play start to end this many times (0 = endless)
    Loop(u32),
    /// Play start to end and back once
    Yoyo,
    /// Play start to end and back this many times (0 = endless)
    YoyoLoop(u32),
}

impl LoopMode {
    pub fn is_yoyo(self) -> bool {
        matches!(self, LoopMode::Yoyo | LoopMode::YoyoLoop(_))
    }

    /// Boundary crossings before the tween ends; `None` never ends
    fn crossings(self) -> Option<u32> {
        match self {
            LoopMode::Single => Some(1),
            LoopMode::Loop(0) | LoopMode::YoyoLoop(0) => None,
            LoopMode::Loop(count) => Some(count),
            LoopMode::Yoyo => Some(2),
            LoopMode::YoyoLoop(count) => Some(count.saturating_mul(2)),
        }
    }

    /// Cycles that make up one `duration`
    fn legs(self) -> f32 {
        if self.is_yoyo() {
            2.0
        } else {
            1.0
        }
    }
}

/// How the return leg of a yoyo is shaped
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum YoyoMode {
    /// Retrace the curve backwards
    #[default]
    Mirror,
    /// Play the curve forwards, flipped
    Invert,
}

/// What a tween leaves behind when it is cancelled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CancelPolicy {
    /// Leave the last applied value
    #[default]
    Keep,
    /// Snap back to the start value
    Revert,
    /// Snap to the final value, ignoring the wave
    ForceEnd,
    /// Snap to the final value with the wave applied
    ForceEndWithWave,
}

/// Lifecycle of a tween
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TweenState {
    #[default]
    Begin,
    Run,
    End,
}

/// A value tween
pub struct Tween {
    target: Box<dyn TweenTarget>,
    duration: f32,
    curve: Curve,
    wave: Option<Wave>,
    loop_mode: LoopMode,
    yoyo_mode: YoyoMode,
    cancel_policy: CancelPolicy,
    delay: f32,
    name: Option<String>,
    on_complete: Option<Callback>,

    state: TweenState,
    /// Percent per second
    increment: f32,
    percent: f32,
    reversed: bool,
    loops_remaining: Option<u32>,
    delay_remaining: f32,
}

impl Tween {
    /// Create a tween over `duration` seconds
    ///
    /// A negative or NaN duration is treated as zero; use [`Tween::try_new`]
    /// to reject it instead.
    pub fn new(duration: f32, target: impl TweenTarget + 'static) -> Self {
        let duration = if duration >= 0.0 {
            duration
        } else {
            tracing::warn!("Invalid tween duration {}, completing immediately", duration);
            0.0
        };
        Self {
            target: Box::new(target),
            duration,
            curve: Curve::Linear,
            wave: None,
            loop_mode: LoopMode::Single,
            yoyo_mode: YoyoMode::Mirror,
            cancel_policy: CancelPolicy::Keep,
            delay: 0.0,
            name: None,
            on_complete: None,
            state: TweenState::Begin,
            increment: 0.0,
            percent: 0.0,
            reversed: false,
            loops_remaining: LoopMode::Single.crossings(),
            delay_remaining: 0.0,
        }
    }

    /// Create a tween, rejecting negative or NaN durations
    pub fn try_new(duration: f32, target: impl TweenTarget + 'static) -> Result<Self> {
        if duration.is_nan() || duration < 0.0 {
            return Err(AnimationError::InvalidDuration(duration));
        }
        Ok(Self::new(duration, target))
    }

    /// Tween whose target is a closure receiving the eased factor
    pub fn from_fn(duration: f32, f: impl FnMut(f32) + 'static) -> Self {
        Self::new(duration, fn_target(f))
    }

    /// Tween between two values, handing each interpolated value to `setter`
    pub fn between<T>(from: T, to: T, duration: f32, setter: impl FnMut(T) + 'static) -> Self
    where
        T: Lerp + 'static,
    {
        Self::new(duration, ValueTarget::new(from, to, setter))
    }

    /// Builder: set the easing curve
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Builder: compose an oscillation onto the eased value
    pub fn with_wave(mut self, wave: Wave) -> Self {
        self.wave = Some(wave);
        self
    }

    /// Builder: set how the tween repeats
    pub fn with_loop_mode(mut self, mode: LoopMode) -> Self {
        self.loop_mode = mode;
        self.loops_remaining = mode.crossings();
        self
    }

    /// Builder: set the shape of yoyo return legs
    pub fn with_yoyo_mode(mut self, mode: YoyoMode) -> Self {
        self.yoyo_mode = mode;
        self
    }

    /// Builder: set what cancellation leaves behind
    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    /// Builder: wait this many seconds before starting
    pub fn with_delay(mut self, seconds: f32) -> Self {
        self.delay = seconds.max(0.0);
        self.delay_remaining = self.delay;
        self
    }

    /// Builder: name the tween for diagnostics
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: run a callback when the tween completes naturally
    pub fn on_complete(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> TweenState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == TweenState::End
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Within-cycle progress in [0, 1)
    pub fn percent(&self) -> f32 {
        self.percent
    }

    /// Whether the current cycle runs from end to start
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Boundary crossings left before the tween ends (`None` = endless)
    ///
    /// Yoyo modes count each leg separately.
    pub fn loops_remaining(&self) -> Option<u32> {
        self.loops_remaining
    }

    /// Linear position between start (0) and end (1)
    pub fn position(&self) -> f32 {
        if self.reversed {
            1.0 - self.percent
        } else {
            self.percent
        }
    }

    /// Factor that would be applied to the target right now
    pub fn value(&self) -> f32 {
        if self.state == TweenState::End {
            return self.final_value(true);
        }
        self.shape(self.eased())
    }

    /// Advance by `dt` seconds and apply the new value
    pub fn advance(&mut self, dt: f32) -> TweenState {
        if self.state == TweenState::End {
            return TweenState::End;
        }
        let mut dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        if self.state == TweenState::Begin {
            if self.delay_remaining > 0.0 {
                self.delay_remaining -= dt;
                if self.delay_remaining > 0.0 {
                    return TweenState::Begin;
                }
                dt = -self.delay_remaining;
                self.delay_remaining = 0.0;
            }
            self.begin();
            if dt == 0.0 && self.increment.is_finite() {
                return TweenState::Run;
            }
        }

        if !self.increment.is_finite() {
            self.finish();
            return TweenState::End;
        }

        self.percent += dt * self.increment;
        if self.percent >= 1.0 {
            let whole = self.percent.floor();
            self.percent -= whole;
            // `as` saturates, so absurd deltas on endless tweens stay defined
            let crossings = whole as u32;

            let counted = match self.loops_remaining {
                Some(remaining) => {
                    let counted = crossings.min(remaining);
                    self.loops_remaining = Some(remaining - counted);
                    counted
                }
                None => crossings,
            };
            if self.loop_mode.is_yoyo() && counted % 2 == 1 {
                self.reversed = !self.reversed;
            }
            if self.loops_remaining == Some(0) {
                self.finish();
                return TweenState::End;
            }
        }

        let value = self.value();
        self.target.apply(value);
        TweenState::Run
    }

    /// Stop the tween, applying its cancel policy
    ///
    /// The target's `on_end` runs once; cancelling again, or cancelling a
    /// finished tween, does nothing. A tween cancelled before it started
    /// never touches its target.
    pub fn cancel(&mut self) {
        let started = match self.state {
            TweenState::End => return,
            TweenState::Begin => false,
            TweenState::Run => true,
        };
        self.state = TweenState::End;
        if !started {
            return;
        }

        tracing::trace!("Cancelling tween {:?} with {:?}", self.name, self.cancel_policy);
        match self.cancel_policy {
            CancelPolicy::Keep => {}
            CancelPolicy::Revert => self.target.apply(0.0),
            CancelPolicy::ForceEnd => {
                let value = self.final_value(false);
                self.target.apply(value);
            }
            CancelPolicy::ForceEndWithWave => {
                let value = self.final_value(true);
                self.target.apply(value);
            }
        }
        self.target.on_end();
    }

    /// Rewind to `Begin` so the tween can be played again
    ///
    /// A completion callback that already fired is not restored.
    pub fn reset(&mut self) {
        self.state = TweenState::Begin;
        self.percent = 0.0;
        self.reversed = false;
        self.loops_remaining = self.loop_mode.crossings();
        self.delay_remaining = self.delay;
    }

    fn begin(&mut self) {
        self.increment = if self.duration > 0.0 && self.duration.is_finite() {
            self.loop_mode.legs() / self.duration
        } else {
            f32::INFINITY
        };
        self.percent = 0.0;
        self.reversed = false;
        self.loops_remaining = self.loop_mode.crossings();
        self.state = TweenState::Run;
        self.target.on_start();
        let value = self.value();
        self.target.apply(value);
    }

    fn finish(&mut self) {
        self.state = TweenState::End;
        let value = self.final_value(true);
        self.target.apply(value);
        self.target.on_end();
        tracing::trace!("Tween {:?} completed", self.name);
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }

    fn eased(&self) -> f32 {
        match (self.reversed, self.yoyo_mode) {
            (true, YoyoMode::Invert) => self.curve.inverted(self.position()),
            _ => self.curve.evaluate(self.position()),
        }
    }

    fn shape(&self, eased: f32) -> f32 {
        match self.wave {
            Some(wave) => wave.evaluate(eased),
            None => eased,
        }
    }

    /// Factor at the natural end: back at the start for yoyo modes
    fn final_value(&self, with_wave: bool) -> f32 {
        let position = if self.loop_mode.is_yoyo() { 0.0 } else { 1.0 };
        let eased = self.curve.evaluate(position);
        if with_wave {
            self.shape(eased)
        } else {
            eased
        }
    }
}

impl Routine for Tween {
    fn resume(&mut self, cx: &mut RoutineContext<'_>) -> Yield {
        match self.advance(cx.delta_time()) {
            TweenState::End => Yield::Done,
            _ => Yield::Next,
        }
    }

    fn on_cancel(&mut self, _cx: &mut RoutineContext<'_>) {
        self.cancel();
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave::WaveKind;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Records every call made on it
    #[derive(Clone, Default)]
    struct Probe {
        starts: Rc<Cell<u32>>,
        ends: Rc<Cell<u32>>,
        applied: Rc<RefCell<Vec<f32>>>,
    }

    impl Probe {
        fn last(&self) -> Option<f32> {
            self.applied.borrow().last().copied()
        }
    }

    impl TweenTarget for Probe {
        fn on_start(&mut self) {
            self.starts.set(self.starts.get() + 1);
        }

        fn apply(&mut self, factor: f32) {
            self.applied.borrow_mut().push(factor);
        }

        fn on_end(&mut self) {
            self.ends.set(self.ends.get() + 1);
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_single_completes_once() {
        let probe = Probe::default();
        let completed = Rc::new(Cell::new(0));
        let counter = completed.clone();
        let mut tween =
            Tween::new(1.0, probe.clone()).on_complete(move || counter.set(counter.get() + 1));

        assert_eq!(tween.advance(0.0), TweenState::Run);
        assert_eq!(probe.starts.get(), 1);
        assert_eq!(tween.advance(0.5), TweenState::Run);
        assert!(approx(probe.last().unwrap(), 0.5));
        assert_eq!(tween.advance(0.6), TweenState::End);
        assert_eq!(tween.advance(1.0), TweenState::End);

        assert_eq!(completed.get(), 1);
        assert_eq!(probe.ends.get(), 1);
        assert_eq!(probe.last(), Some(1.0));
    }

    #[test]
    fn test_start_value_applied_before_first_delta() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone());
        assert_eq!(tween.advance(0.25), TweenState::Run);
        assert_eq!(*probe.applied.borrow(), vec![0.0, 0.25]);

        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone()).with_curve(Curve::QuadOut);
        tween.advance(0.0);
        assert_eq!(*probe.applied.borrow(), vec![0.0]);
    }

    #[test]
    fn test_large_delta_crosses_several_loops() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone()).with_loop_mode(LoopMode::Loop(3));
        assert_eq!(tween.loops_remaining(), Some(3));

        assert_eq!(tween.advance(3.5), TweenState::End);
        assert_eq!(tween.loops_remaining(), Some(0));
        assert!(approx(tween.percent(), 0.5));
        // The fourth cycle is never applied
        assert_eq!(probe.last(), Some(1.0));
        assert_eq!(probe.ends.get(), 1);
    }

    #[test]
    fn test_loop_counts_down_across_updates() {
        let mut tween = Tween::from_fn(1.0, |_| {}).with_loop_mode(LoopMode::Loop(3));
        assert_eq!(tween.advance(2.5), TweenState::Run);
        assert_eq!(tween.loops_remaining(), Some(1));
        assert!(approx(tween.percent(), 0.5));
        assert!(!tween.is_reversed());

        assert_eq!(tween.advance(0.5), TweenState::End);
        assert_eq!(tween.loops_remaining(), Some(0));
    }

    #[test]
    fn test_endless_loop_never_ends() {
        let mut tween = Tween::from_fn(1.0, |_| {}).with_loop_mode(LoopMode::Loop(0));
        assert_eq!(tween.advance(1000.5), TweenState::Run);
        assert_eq!(tween.loops_remaining(), None);
        assert!(approx(tween.percent(), 0.5));
    }

    #[test]
    fn test_zero_duration_completes_on_first_advance() {
        let probe = Probe::default();
        let completed = Rc::new(Cell::new(false));
        let flag = completed.clone();
        let mut tween = Tween::new(0.0, probe.clone()).on_complete(move || flag.set(true));

        assert_eq!(tween.advance(0.0), TweenState::End);
        assert!(completed.get());
        assert_eq!(probe.starts.get(), 1);
        assert_eq!(probe.ends.get(), 1);
        assert_eq!(probe.last(), Some(1.0));
    }

    #[test]
    fn test_invalid_duration() {
        assert_eq!(
            Tween::try_new(-1.0, fn_target(|_| {})).err(),
            Some(AnimationError::InvalidDuration(-1.0))
        );
        assert!(Tween::try_new(f32::NAN, fn_target(|_| {})).is_err());

        let mut tween = Tween::from_fn(-1.0, |_| {});
        assert_eq!(tween.duration(), 0.0);
        assert_eq!(tween.advance(0.0), TweenState::End);
    }

    #[test]
    fn test_yoyo_round_trip() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone()).with_loop_mode(LoopMode::Yoyo);

        tween.advance(0.0);
        let at_start = probe.last().unwrap();
        tween.advance(0.25);
        let rising = probe.last().unwrap();
        tween.advance(0.25);
        let peak = probe.last().unwrap();
        assert!(tween.is_reversed());
        tween.advance(0.25);
        let falling = probe.last().unwrap();
        assert_eq!(tween.advance(0.25), TweenState::End);
        let at_end = probe.last().unwrap();

        assert!(approx(at_start, 0.0));
        assert!(approx(rising, 0.5));
        assert!(approx(peak, 1.0));
        assert!(approx(falling, 0.5));
        assert!(approx(at_end, at_start));
    }

    #[test]
    fn test_yoyo_return_leg_shapes() {
        let mirror = Tween::from_fn(1.0, |_| {})
            .with_loop_mode(LoopMode::YoyoLoop(0))
            .with_curve(Curve::QuadIn);
        let invert = Tween::from_fn(1.0, |_| {})
            .with_loop_mode(LoopMode::YoyoLoop(0))
            .with_curve(Curve::QuadIn)
            .with_yoyo_mode(YoyoMode::Invert);

        for (mut tween, expected) in [(mirror, 0.5625), (invert, 0.9375)] {
            // Half a leg into the return
            tween.advance(0.625);
            assert!(tween.is_reversed());
            assert!(approx(tween.position(), 0.75));
            assert!(approx(tween.value(), expected));
        }
    }

    #[test]
    fn test_yoyo_loop_flips_each_leg() {
        let mut tween = Tween::from_fn(2.0, |_| {}).with_loop_mode(LoopMode::YoyoLoop(2));
        assert_eq!(tween.loops_remaining(), Some(4));

        tween.advance(1.0);
        assert!(tween.is_reversed());
        tween.advance(2.0);
        assert!(tween.is_reversed());
        assert_eq!(tween.loops_remaining(), Some(1));
        assert_eq!(tween.advance(1.0), TweenState::End);
    }

    #[test]
    fn test_wave_composes_onto_eased_value() {
        let probe = Probe::default();
        let mut tween =
            Tween::new(1.0, probe.clone()).with_wave(Wave::new(WaveKind::Sine, 1.0));

        tween.advance(0.25);
        assert!(approx(probe.last().unwrap(), 1.0));
        tween.advance(0.5);
        assert!(approx(probe.last().unwrap(), -1.0));
    }

    #[test]
    fn test_cancel_policies() {
        let cases = [
            (CancelPolicy::Keep, 0.4),
            (CancelPolicy::Revert, 0.0),
            (CancelPolicy::ForceEnd, 1.0),
            (CancelPolicy::ForceEndWithWave, 0.0),
        ];
        for (policy, expected) in cases {
            let probe = Probe::default();
            let completed = Rc::new(Cell::new(false));
            let flag = completed.clone();
            let mut tween = Tween::new(1.0, probe.clone())
                .with_wave(Wave::new(WaveKind::SineFade, 2.0))
                .with_cancel_policy(policy)
                .on_complete(move || flag.set(true));

            tween.advance(0.1);
            let before = probe.last().unwrap();
            tween.cancel();
            tween.cancel();

            let last = probe.last().unwrap();
            if policy == CancelPolicy::Keep {
                assert_eq!(last, before);
            } else {
                assert!(approx(last, expected), "{policy:?}: {last}");
            }
            assert_eq!(probe.ends.get(), 1, "{policy:?}");
            assert!(!completed.get());
            assert!(tween.is_finished());
        }
    }

    #[test]
    fn test_cancel_before_start_leaves_target_untouched() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone())
            .with_delay(1.0)
            .with_cancel_policy(CancelPolicy::ForceEnd);
        tween.advance(0.5);
        tween.cancel();

        assert_eq!(probe.starts.get(), 0);
        assert_eq!(probe.ends.get(), 0);
        assert!(probe.applied.borrow().is_empty());
    }

    #[test]
    fn test_delay_carries_leftover_time() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone()).with_delay(0.5);

        assert_eq!(tween.advance(0.3), TweenState::Begin);
        assert_eq!(probe.starts.get(), 0);
        assert_eq!(tween.advance(0.4), TweenState::Run);
        assert_eq!(probe.starts.get(), 1);
        assert!(approx(tween.percent(), 0.2));
    }

    #[test]
    fn test_reset_plays_again() {
        let probe = Probe::default();
        let mut tween = Tween::new(1.0, probe.clone());
        tween.advance(2.0);
        assert!(tween.is_finished());

        tween.reset();
        assert_eq!(tween.state(), TweenState::Begin);
        tween.advance(0.5);
        assert_eq!(probe.starts.get(), 2);
        assert!(approx(tween.value(), 0.5));
    }

    #[test]
    fn test_between_interpolates_values() {
        let out = Rc::new(Cell::new(0.0f64));
        let sink = out.clone();
        let mut tween =
            Tween::between(10.0f64, 20.0, 2.0, move |v| sink.set(v)).with_curve(Curve::Smooth);

        tween.advance(1.0);
        assert!((out.get() - 15.0).abs() < 1e-6);
        tween.advance(1.0);
        assert!((out.get() - 20.0).abs() < 1e-9);
    }
}
