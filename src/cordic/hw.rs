use log::error;

use super::Cordic;
use crate::{
    num::Number,
    util::{wrap_pi, DqFrame, PhaseAngle},
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CordicFunc {
    /// `arg1` angle scaled by π, `arg2` magnitude; `res1` cosine, `res2` sine
    Cosine,
    /// `arg1`, `arg2` vector components; `res1` modulus
    Modulus,
}

/// Coprocessor request, all operands q1.31
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CordicRequest {
    pub func: CordicFunc,
    pub arg1: i32,
    pub arg2: i32,
    /// Whether the secondary result is wanted
    pub res2_incl: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CordicResponse {
    pub res1: i32,
    pub res2: i32,
}

/// Transport to a CORDIC coprocessor.
///
/// `calculate` may block for the duration of the hardware transaction.
/// Failures are reported as the driver's negative error code.
pub trait CordicDevice {
    fn calculate(&mut self, req: &CordicRequest, resp: &mut CordicResponse)
        -> Result<(), i32>;
}

/// Backend delegating to a coprocessor
#[derive(Debug)]
pub struct HwCordic<D> {
    dev: D,
}

impl<D: CordicDevice> HwCordic<D> {
    pub fn new(dev: D) -> Self {
        Self { dev }
    }

    pub fn into_inner(self) -> D {
        self.dev
    }

    fn calculate(&mut self, func: CordicFunc, arg1: i32, arg2: i32) -> Result<CordicResponse> {
        let req = CordicRequest {
            func,
            arg1,
            arg2,
            res2_incl: func == CordicFunc::Cosine,
        };
        let mut resp = CordicResponse::default();

        self.dev.calculate(&req, &mut resp).map_err(|code| {
            error!("cordic {func:?} failed {code}");
            Error::Io(code)
        })?;

        Ok(resp)
    }
}

impl<N: Number, D: CordicDevice> Cordic<N> for HwCordic<D> {
    fn angle(&mut self, out: &mut PhaseAngle<N>, angle: N, mag: N) -> Result<()> {
        let scaled = wrap_pi(angle).sat_div(N::PI);
        let resp = self.calculate(CordicFunc::Cosine, scaled.to_q31(), mag.to_q31())?;

        *out = PhaseAngle {
            angle,
            sin: N::from_q31(resp.res2),
            cos: N::from_q31(resp.res1),
        };

        Ok(())
    }

    fn dqsat(&mut self, dq: &mut DqFrame<N>, max: N) -> Result<()> {
        // Bring both components into q1.31 range, the modulus stays <= 1
        let k = dq.d.abs().sat_add(dq.q.abs());
        if k == N::zero() {
            return Ok(());
        }

        let d = dq.d.sat_div(k).to_q31();
        let q = dq.q.sat_div(k).to_q31();
        let resp = self.calculate(CordicFunc::Modulus, d, q)?;

        let mag = N::from_q31(resp.res1).sat_mul(k);
        if mag > max {
            let scale = max.sat_div(mag);
            dq.d = dq.d.sat_mul(scale);
            dq.q = dq.q.sat_mul(scale);
        }

        Ok(())
    }
}
