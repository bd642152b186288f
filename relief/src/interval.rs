//! Closed-interval arithmetic over `f32`.
//!
//! Every operation is inclusion-monotonic and sound: the result interval is
//! never narrower than the true range of the operation over its inputs. The
//! min/max operations additionally report a [`Choice`] code, which is what
//! tape specialization replays to prune branches.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Outcome of a min/max over two intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Neither side dominates; both operands stay live.
    Both = 0,
    /// The left operand is unambiguously chosen.
    Left = 1,
    /// The right operand is unambiguously chosen.
    Right = 2,
}

impl Choice {
    /// Decode a 2-bit choice code.
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Left,
            2 => Self::Right,
            0 => Self::Both,
            _ => panic!("invalid choice code {bits}"),
        }
    }

    /// The 2-bit code of this choice.
    pub(crate) fn bits(self) -> u8 {
        self as u8
    }
}

/// A closed floating-point interval `[lower, upper]`.
///
/// Degenerate (single-point) intervals are allowed. An interval with NaN
/// bounds is the result of evaluating outside an operator's domain; all
/// classifications treat it as ambiguous, which is sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lower: f32,
    upper: f32,
}

impl From<f32> for Interval {
    fn from(v: f32) -> Self {
        Self { lower: v, upper: v }
    }
}

impl Interval {
    /// Build an interval from ordered bounds.
    pub fn new(lower: f32, upper: f32) -> Self {
        debug_assert!(!(lower > upper), "inverted interval [{lower}, {upper}]");
        Self { lower, upper }
    }

    fn nan() -> Self {
        Self {
            lower: f32::NAN,
            upper: f32::NAN,
        }
    }

    /// Lower bound.
    pub fn lower(self) -> f32 {
        self.lower
    }

    /// Upper bound.
    pub fn upper(self) -> f32 {
        self.upper
    }

    /// Width of the interval.
    pub fn width(self) -> f32 {
        self.upper - self.lower
    }

    /// Whether `v` lies within the interval.
    pub fn contains(self, v: f32) -> bool {
        self.lower <= v && v <= self.upper
    }

    pub(crate) fn add(self, rhs: Self) -> Self {
        Self::new(self.lower + rhs.lower, self.upper + rhs.upper)
    }

    pub(crate) fn sub(self, rhs: Self) -> Self {
        Self::new(self.lower - rhs.upper, self.upper - rhs.lower)
    }

    pub(crate) fn neg(self) -> Self {
        Self::new(-self.upper, -self.lower)
    }

    pub(crate) fn mul(self, rhs: Self) -> Self {
        let products = [
            self.lower * rhs.lower,
            self.lower * rhs.upper,
            self.upper * rhs.lower,
            self.upper * rhs.upper,
        ];

        // f32::min/max skip NaN operands, which only arise from 0 * inf at
        // unattained endpoints; skipping them keeps the bounds sound.
        let lower = products.iter().copied().fold(f32::NAN, f32::min);
        let upper = products.iter().copied().fold(f32::NAN, f32::max);

        Self { lower, upper }
    }

    pub(crate) fn div(self, rhs: Self) -> Self {
        if rhs.lower <= 0.0 && rhs.upper >= 0.0 {
            return Self::new(f32::NEG_INFINITY, f32::INFINITY);
        }

        let quotients = [
            self.lower / rhs.lower,
            self.lower / rhs.upper,
            self.upper / rhs.lower,
            self.upper / rhs.upper,
        ];

        let lower = quotients.iter().copied().fold(f32::NAN, f32::min);
        let upper = quotients.iter().copied().fold(f32::NAN, f32::max);

        Self { lower, upper }
    }

    /// Minimum with a choice code: `Left` when the whole left interval lies
    /// below the right one, `Right` for the mirror case, `Both` otherwise.
    pub(crate) fn min_choice(self, rhs: Self) -> (Self, Choice) {
        if self.upper < rhs.lower {
            (self, Choice::Left)
        } else if rhs.upper < self.lower {
            (rhs, Choice::Right)
        } else {
            (
                Self {
                    lower: self.lower.min(rhs.lower),
                    upper: self.upper.min(rhs.upper),
                },
                Choice::Both,
            )
        }
    }

    /// Maximum with a choice code; see [`Interval::min_choice`].
    pub(crate) fn max_choice(self, rhs: Self) -> (Self, Choice) {
        if self.lower > rhs.upper {
            (self, Choice::Left)
        } else if rhs.lower > self.upper {
            (rhs, Choice::Right)
        } else {
            (
                Self {
                    lower: self.lower.max(rhs.lower),
                    upper: self.upper.max(rhs.upper),
                },
                Choice::Both,
            )
        }
    }

    pub(crate) fn abs(self) -> Self {
        if self.lower >= 0.0 {
            self
        } else if self.upper <= 0.0 {
            self.neg()
        } else {
            Self::new(0.0, self.upper.max(-self.lower))
        }
    }

    pub(crate) fn square(self) -> Self {
        if self.lower >= 0.0 {
            Self::new(self.lower * self.lower, self.upper * self.upper)
        } else if self.upper <= 0.0 {
            Self::new(self.upper * self.upper, self.lower * self.lower)
        } else {
            let bound = (self.lower * self.lower).max(self.upper * self.upper);
            Self::new(0.0, bound)
        }
    }

    pub(crate) fn sqrt(self) -> Self {
        if self.upper < 0.0 {
            Self::nan()
        } else if self.lower < 0.0 {
            Self::new(0.0, self.upper.sqrt())
        } else {
            Self::new(self.lower.sqrt(), self.upper.sqrt())
        }
    }

    pub(crate) fn sin(self) -> Self {
        if !(self.width() < TAU) {
            return Self::new(-1.0, 1.0);
        }

        let mut lower = self.lower.sin().min(self.upper.sin());
        let mut upper = self.lower.sin().max(self.upper.sin());

        // Extrema of sin sit at pi/2 + k*pi: +1 for even k, -1 for odd k.
        let k0 = ((self.lower - FRAC_PI_2) / PI).ceil() as i64;
        let k1 = ((self.upper - FRAC_PI_2) / PI).floor() as i64;
        for k in k0..=k1 {
            if k.rem_euclid(2) == 0 {
                upper = 1.0;
            } else {
                lower = -1.0;
            }
        }

        Self { lower, upper }
    }

    pub(crate) fn cos(self) -> Self {
        if !(self.width() < TAU) {
            return Self::new(-1.0, 1.0);
        }

        let mut lower = self.lower.cos().min(self.upper.cos());
        let mut upper = self.lower.cos().max(self.upper.cos());

        // Extrema of cos sit at k*pi: +1 for even k, -1 for odd k.
        let k0 = (self.lower / PI).ceil() as i64;
        let k1 = (self.upper / PI).floor() as i64;
        for k in k0..=k1 {
            if k.rem_euclid(2) == 0 {
                upper = 1.0;
            } else {
                lower = -1.0;
            }
        }

        Self { lower, upper }
    }

    pub(crate) fn asin(self) -> Self {
        let lower = self.lower.max(-1.0);
        let upper = self.upper.min(1.0);
        if lower > upper {
            Self::nan()
        } else {
            Self::new(lower.asin(), upper.asin())
        }
    }

    pub(crate) fn acos(self) -> Self {
        let lower = self.lower.max(-1.0);
        let upper = self.upper.min(1.0);
        if lower > upper {
            Self::nan()
        } else {
            // acos is decreasing, so the bounds swap.
            Self::new(upper.acos(), lower.acos())
        }
    }

    pub(crate) fn atan(self) -> Self {
        Self::new(self.lower.atan(), self.upper.atan())
    }

    pub(crate) fn exp(self) -> Self {
        Self::new(self.lower.exp(), self.upper.exp())
    }

    pub(crate) fn log(self) -> Self {
        if self.upper <= 0.0 {
            Self::nan()
        } else if self.lower <= 0.0 {
            Self::new(f32::NEG_INFINITY, self.upper.ln())
        } else {
            Self::new(self.lower.ln(), self.upper.ln())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn iv(l: f32, u: f32) -> Interval {
        Interval::new(l, u)
    }

    #[test]
    fn division_straddling_zero_is_widest() {
        let r = iv(1.0, 2.0).div(iv(-1.0, 1.0));
        assert_eq!(r.lower(), f32::NEG_INFINITY);
        assert_eq!(r.upper(), f32::INFINITY);

        // Touching zero at an endpoint counts as straddling.
        let r = iv(1.0, 2.0).div(iv(0.0, 4.0));
        assert_eq!(r.upper(), f32::INFINITY);
    }

    #[test]
    fn min_choice_codes() {
        let (r, c) = iv(-2.0, -1.0).min_choice(iv(0.0, 1.0));
        assert_eq!(c, Choice::Left);
        assert_eq!(r, iv(-2.0, -1.0));

        let (r, c) = iv(0.0, 1.0).min_choice(iv(-2.0, -1.0));
        assert_eq!(c, Choice::Right);
        assert_eq!(r, iv(-2.0, -1.0));

        let (r, c) = iv(-1.0, 1.0).min_choice(iv(0.0, 2.0));
        assert_eq!(c, Choice::Both);
        assert_eq!(r, iv(-1.0, 1.0));
    }

    #[test]
    fn max_choice_codes() {
        let (_, c) = iv(2.0, 3.0).max_choice(iv(0.0, 1.0));
        assert_eq!(c, Choice::Left);

        let (_, c) = iv(0.0, 1.0).max_choice(iv(2.0, 3.0));
        assert_eq!(c, Choice::Right);

        let (r, c) = iv(0.0, 2.0).max_choice(iv(1.0, 3.0));
        assert_eq!(c, Choice::Both);
        assert_eq!(r, iv(1.0, 3.0));
    }

    #[test]
    fn touching_bounds_are_ambiguous() {
        // Equal bounds must not resolve to one side; the tie lives at the
        // shared endpoint.
        let (_, c) = iv(0.0, 1.0).min_choice(iv(1.0, 2.0));
        assert_eq!(c, Choice::Both);
    }

    #[test]
    fn square_straddling_zero() {
        let r = iv(-2.0, 1.0).square();
        assert_eq!(r, iv(0.0, 4.0));
    }

    #[test]
    fn sqrt_partial_domain() {
        let r = iv(-4.0, 9.0).sqrt();
        assert_eq!(r, iv(0.0, 3.0));

        assert!(iv(-4.0, -1.0).sqrt().lower().is_nan());
    }

    #[test]
    fn sin_window() {
        // [0, pi] covers the maximum at pi/2 but not the minimum.
        let r = iv(0.0, PI).sin();
        assert_eq!(r.upper(), 1.0);
        assert!(r.lower() >= -1e-6);

        // A window longer than a full period saturates.
        assert_eq!(iv(0.0, 10.0).sin(), iv(-1.0, 1.0));
    }

    #[test]
    fn cos_window() {
        let r = iv(-0.5, 0.5).cos();
        assert_eq!(r.upper(), 1.0);
        assert!(r.lower() > 0.8);

        let r = iv(2.0, 4.0).cos();
        assert_eq!(r.lower(), -1.0);
    }

    #[test]
    fn log_domains() {
        assert!(iv(-2.0, -1.0).log().lower().is_nan());
        assert_eq!(iv(-1.0, 1.0).log().lower(), f32::NEG_INFINITY);
        let r = iv(1.0, std::f32::consts::E).log();
        assert_eq!(r.lower(), 0.0);
        assert!((r.upper() - 1.0).abs() < 1e-6);
    }

    fn any_interval() -> impl Strategy<Value = Interval> {
        (-16.0f32..16.0, -16.0f32..16.0).prop_map(|(a, b)| Interval::new(a.min(b), a.max(b)))
    }

    fn assert_sound(result: Interval, sample: f32) {
        if sample.is_nan() {
            return;
        }
        let eps = 1e-4 + sample.abs() * 1e-5;
        assert!(
            result.lower() - eps <= sample && sample <= result.upper() + eps,
            "{sample} escapes [{}, {}]",
            result.lower(),
            result.upper(),
        );
    }

    proptest! {
        // P1: sampling any point inside the inputs yields a value inside the
        // interval result.
        #[test]
        fn unary_soundness(i in any_interval(), t in 0.0f32..=1.0) {
            let v = i.lower() + t * i.width();

            assert_sound(i.neg(), -v);
            assert_sound(i.abs(), v.abs());
            assert_sound(i.square(), v * v);
            assert_sound(i.sqrt(), v.sqrt());
            assert_sound(i.sin(), v.sin());
            assert_sound(i.cos(), v.cos());
            assert_sound(i.asin(), v.asin());
            assert_sound(i.acos(), v.acos());
            assert_sound(i.atan(), v.atan());
            assert_sound(i.exp(), v.exp());
            assert_sound(i.log(), v.ln());
        }

        #[test]
        fn binary_soundness(
            a in any_interval(),
            b in any_interval(),
            s in 0.0f32..=1.0,
            t in 0.0f32..=1.0,
        ) {
            let x = a.lower() + s * a.width();
            let y = b.lower() + t * b.width();

            assert_sound(a.add(b), x + y);
            assert_sound(a.sub(b), x - y);
            assert_sound(a.mul(b), x * y);
            assert_sound(a.div(b), x / y);
            assert_sound(a.min_choice(b).0, x.min(y));
            assert_sound(a.max_choice(b).0, x.max(y));
        }
    }
}
