//! Tween targets
//!
//! A target is the strategy that knows how to apply a tween's progress to
//! something concrete: set a field, move a transform, fade a color. The
//! tween only ever hands it an eased factor.

/// Value-application strategy driven by a tween
pub trait TweenTarget {
    /// Called once before the first value is applied
    fn on_start(&mut self) {}

    /// Apply the eased factor (0 = start, 1 = end; may overshoot)
    fn apply(&mut self, factor: f32);

    /// Called once when the tween ends, whether it completed or was cancelled
    fn on_end(&mut self) {}
}

impl<T: TweenTarget + ?Sized> TweenTarget for Box<T> {
    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn apply(&mut self, factor: f32) {
        (**self).apply(factor)
    }

    fn on_end(&mut self) {
        (**self).on_end()
    }
}

/// Linear interpolation between two values
pub trait Lerp {
    fn lerp(&self, to: &Self, factor: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(&self, to: &Self, factor: f32) -> Self {
        factor.mul_add(to - self, *self)
    }
}

impl Lerp for f64 {
    fn lerp(&self, to: &Self, factor: f32) -> Self {
        (factor as f64).mul_add(to - self, *self)
    }
}

macro_rules! impl_lerp_for_integer {
    ($($ty:ident),*) => {
        $(
            impl Lerp for $ty {
                fn lerp(&self, to: &Self, factor: f32) -> Self {
                    (*self as f32).lerp(&(*to as f32), factor).round() as $ty
                }
            }
        )*
    };
}

impl_lerp_for_integer!(i32, i64, u8, u32);

impl<const N: usize> Lerp for [f32; N] {
    fn lerp(&self, to: &Self, factor: f32) -> Self {
        std::array::from_fn(|i| self[i].lerp(&to[i], factor))
    }
}

/// A closure receiving the eased factor
pub struct FnTarget<F> {
    f: F,
}

impl<F: FnMut(f32)> TweenTarget for FnTarget<F> {
    fn apply(&mut self, factor: f32) {
        (self.f)(factor)
    }
}

/// Wrap a closure as a target
pub fn fn_target<F: FnMut(f32)>(f: F) -> FnTarget<F> {
    FnTarget { f }
}

/// Interpolates between two values and hands the result to a setter
pub struct ValueTarget<T, F> {
    from: T,
    to: T,
    setter: F,
}

impl<T, F> ValueTarget<T, F>
where
    T: Lerp,
    F: FnMut(T),
{
    pub fn new(from: T, to: T, setter: F) -> Self {
        Self { from, to, setter }
    }

    pub fn start_value(&self) -> &T {
        &self.from
    }

    pub fn end_value(&self) -> &T {
        &self.to
    }
}

impl<T, F> TweenTarget for ValueTarget<T, F>
where
    T: Lerp,
    F: FnMut(T),
{
    fn apply(&mut self, factor: f32) {
        let value = self.from.lerp(&self.to, factor);
        (self.setter)(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_lerp_scalars() {
        assert!((2.0f32.lerp(&4.0, 0.5) - 3.0).abs() < 1e-6);
        assert!((0.0f64.lerp(&10.0, 0.25) - 2.5).abs() < 1e-9);
        assert_eq!(0u8.lerp(&255, 1.0), 255);
        assert_eq!(10i32.lerp(&20, 0.46), 15);
    }

    #[test]
    fn test_lerp_arrays() {
        let a = [0.0f32, 10.0, -4.0];
        let b = [1.0f32, 20.0, 4.0];
        let mid = a.lerp(&b, 0.5);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert!((mid[1] - 15.0).abs() < 1e-6);
        assert!(mid[2].abs() < 1e-6);
    }

    #[test]
    fn test_value_target_applies_interpolated_value() {
        let out = Rc::new(Cell::new([0.0f32; 2]));
        let sink = out.clone();
        let mut target = ValueTarget::new([0.0, 0.0], [100.0, 50.0], move |v| sink.set(v));

        target.apply(0.5);
        assert_eq!(out.get(), [50.0, 25.0]);
        target.apply(1.0);
        assert_eq!(out.get(), [100.0, 50.0]);
    }

    #[test]
    fn test_fn_target_forwards_factor() {
        let out = Rc::new(Cell::new(0.0));
        let sink = out.clone();
        let mut target: Box<dyn TweenTarget> = Box::new(fn_target(move |f| sink.set(f)));
        target.on_start();
        target.apply(0.75);
        target.on_end();
        assert_eq!(out.get(), 0.75);
    }
}
