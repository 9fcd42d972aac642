//! Angle and vector operations behind a swappable backend.
//!
//! Control code asks a [`Cordic`] backend for the sine and cosine of an
//! angle or for the saturation of a dq vector, without knowing whether a
//! coprocessor or the CPU does the work.

use crate::{
    num::Number,
    util::{DqFrame, PhaseAngle},
    Result,
};

mod hw;

pub use hw::{CordicDevice, CordicFunc, CordicRequest, CordicResponse, HwCordic};

pub trait Cordic<N> {
    /// Set `out` to `angle` together with its sine and cosine, both scaled
    /// by `mag`. Hardware backends take `mag` in `[0, 1]` and saturate above.
    fn angle(&mut self, out: &mut PhaseAngle<N>, angle: N, mag: N) -> Result<()>;

    /// Scale `dq` down to magnitude `max` when it is longer, keeping its
    /// direction
    fn dqsat(&mut self, dq: &mut DqFrame<N>, max: N) -> Result<()>;
}

/// Backend running on the CPU, never fails
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftCordic;

impl<N: Number> Cordic<N> for SoftCordic {
    fn angle(&mut self, out: &mut PhaseAngle<N>, angle: N, mag: N) -> Result<()> {
        let (sin, cos) = angle.sin_cos();
        *out = PhaseAngle {
            angle,
            sin: sin.sat_mul(mag),
            cos: cos.sat_mul(mag),
        };
        Ok(())
    }

    fn dqsat(&mut self, dq: &mut DqFrame<N>, max: N) -> Result<()> {
        dq.saturate(max);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Q16;

    #[test]
    fn soft_angle() {
        let mut cordic = SoftCordic;
        let mut out = PhaseAngle::default();
        Cordic::<f32>::angle(&mut cordic, &mut out, core::f32::consts::FRAC_PI_2, 1.0).unwrap();
        assert!((out.sin - 1.0).abs() < 1e-6);
        assert!(out.cos.abs() < 1e-6);

        let mut out = PhaseAngle::<Q16>::default();
        let backend: &mut dyn Cordic<Q16> = &mut cordic;
        backend.angle(&mut out, Q16::PI, Q16::ONE).unwrap();
        assert_eq!(out.angle, Q16::PI);
        assert!((out.cos.to_f32() + 1.0).abs() < 1e-3);

        backend.angle(&mut out, Q16::ZERO, Q16::from_f32(0.5)).unwrap();
        assert!((out.cos.to_f32() - 0.5).abs() < 1e-3);
        assert!(out.sin.to_f32().abs() < 1e-3);
    }

    #[test]
    fn soft_dqsat() {
        let backend: &mut dyn Cordic<f32> = &mut SoftCordic;
        let mut dq = DqFrame::new(6.0, -8.0);
        backend.dqsat(&mut dq, 5.0).unwrap();
        assert!((dq.d - 3.0).abs() < 1e-5);
        assert!((dq.q + 4.0).abs() < 1e-5);
    }
}
