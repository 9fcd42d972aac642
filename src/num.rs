//! Numeric kinds the control routines are generic over.
//!
//! Every routine is written once against [`Number`] and instantiated for
//! IEEE-754 `f32` and for [`Q16`], a signed 16.16 fixed-point value with
//! saturating arithmetic.

use core::{
    f32::consts,
    fmt::Debug,
    ops::{Add, Div, Mul, Neg, Sub},
};

use fixed::types::I16F16;
use num_traits::{One, Zero};

use crate::f;

/// Signed fixed-point value, 16 integer bits and 16 fractional bits
pub type Q16 = I16F16;

const Q31_SCALE: f32 = 2_147_483_648.0;

pub trait Number:
    Copy
    + Debug
    + PartialOrd
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const PI: Self;
    const TAU: Self;
    const FRAC_PI_3: Self;
    /// Smallest step the representation resolves around 1.0
    const RESOLUTION: Self;

    fn from_f32(x: f32) -> Self;
    fn to_f32(self) -> f32;
    fn from_int(x: i32) -> Self;

    fn abs(self) -> Self;

    fn sat_add(self, rhs: Self) -> Self;
    fn sat_sub(self, rhs: Self) -> Self;
    fn sat_mul(self, rhs: Self) -> Self;
    /// Division saturating to the representable range, a zero divisor
    /// saturates by the sign of the dividend
    fn sat_div(self, rhs: Self) -> Self;

    /// `(sin, cos)` of an angle in radians
    fn sin_cos(self) -> (Self, Self);
    fn sqrt(self) -> Self;

    /// Convert a value in `[-1, 1)` to a q1.31 word, saturating outside
    fn to_q31(self) -> i32;
    fn from_q31(q: i32) -> Self;

    /// Remainder of `self / span` in `[0, span)`, `span` must be positive.
    /// Non-finite floats give NaN.
    fn modulo(self, span: Self) -> Self;

    /// Running sum wide enough for any number of `u32`-counted samples
    type Acc: Copy + Debug + Default;

    fn acc_add(acc: Self::Acc, x: Self) -> Self::Acc;
    /// `acc / n`, zero when nothing was summed
    fn acc_mean(acc: Self::Acc, n: u32) -> Self;

    fn min(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }

    fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }

    fn two() -> Self {
        Self::one() + Self::one()
    }
}

impl Number for f32 {
    const PI: Self = consts::PI;
    const TAU: Self = consts::TAU;
    const FRAC_PI_3: Self = consts::FRAC_PI_3;
    const RESOLUTION: Self = f32::EPSILON;

    fn from_f32(x: f32) -> Self {
        x
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_int(x: i32) -> Self {
        x as f32
    }

    fn abs(self) -> Self {
        libm::fabsf(self)
    }

    fn sat_add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sat_sub(self, rhs: Self) -> Self {
        self - rhs
    }

    fn sat_mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn sat_div(self, rhs: Self) -> Self {
        self / rhs
    }

    fn sin_cos(self) -> (Self, Self) {
        libm::sincosf(self)
    }

    fn sqrt(self) -> Self {
        libm::sqrtf(self)
    }

    fn to_q31(self) -> i32 {
        // `as` saturates, NaN maps to zero
        (self * Q31_SCALE) as i32
    }

    fn from_q31(q: i32) -> Self {
        q as f32 / Q31_SCALE
    }

    fn modulo(self, span: Self) -> Self {
        let r = libm::fmodf(self, span);
        if r < 0.0 {
            r + span
        } else {
            r
        }
    }

    type Acc = f64;

    fn acc_add(acc: f64, x: Self) -> f64 {
        acc + f64::from(x)
    }

    fn acc_mean(acc: f64, n: u32) -> Self {
        if n == 0 {
            return 0.0;
        }
        (acc / f64::from(n)) as f32
    }
}

impl Number for Q16 {
    const PI: Self = f!("3.14159265358979");
    const TAU: Self = f!("6.28318530717958");
    const FRAC_PI_3: Self = f!("1.04719755119660");
    const RESOLUTION: Self = I16F16::DELTA;

    fn from_f32(x: f32) -> Self {
        I16F16::saturating_from_num(x)
    }

    fn to_f32(self) -> f32 {
        self.to_num()
    }

    fn from_int(x: i32) -> Self {
        I16F16::saturating_from_num(x)
    }

    fn abs(self) -> Self {
        self.saturating_abs()
    }

    fn sat_add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn sat_sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn sat_mul(self, rhs: Self) -> Self {
        self.saturating_mul(rhs)
    }

    fn sat_div(self, rhs: Self) -> Self {
        if rhs == I16F16::ZERO {
            return if self < I16F16::ZERO {
                I16F16::MIN
            } else {
                I16F16::MAX
            };
        }
        self.saturating_div(rhs)
    }

    fn sin_cos(self) -> (Self, Self) {
        ::cordic::sin_cos(self)
    }

    fn sqrt(self) -> Self {
        if self <= I16F16::ZERO {
            return I16F16::ZERO;
        }
        ::cordic::sqrt(self)
    }

    fn to_q31(self) -> i32 {
        let wide = i64::from(self.to_bits()) << 15;
        wide.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    fn from_q31(q: i32) -> Self {
        I16F16::from_bits(q >> 15)
    }

    fn modulo(self, span: Self) -> Self {
        match self.checked_rem(span) {
            Some(r) if r < I16F16::ZERO => r + span,
            Some(r) => r,
            None => I16F16::ZERO,
        }
    }

    /// Sum of the raw 16.16 words
    type Acc = i64;

    fn acc_add(acc: i64, x: Self) -> i64 {
        acc.saturating_add(i64::from(x.to_bits()))
    }

    fn acc_mean(acc: i64, n: u32) -> Self {
        if n == 0 {
            return I16F16::ZERO;
        }
        let bits = (acc / i64::from(n)).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
        I16F16::from_bits(bits as i32)
    }
}
