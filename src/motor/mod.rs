use crate::{num::Number, Error, Result};

pub mod feedforward;
pub mod ramp;

pub use feedforward::{feedforward, feedforward_into};
pub use ramp::{Ramp, RampMode};

pub type RampF32 = Ramp<f32>;
pub type RampQ16 = Ramp<crate::Q16>;

/// What the current loop should do with a routine's command this period
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FocMode {
    /// Outputs disabled, motor de-energised
    #[default]
    Idle,
    /// `dq_ref` is a voltage command
    Voltage,
    /// `dq_ref` is a current command
    Current,
}

/// Motor physical parameters.
///
/// Built once at configuration time and only read afterwards, so it can be
/// shared by reference between the control routines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorPhy<N> {
    pole_pairs: u8,
    res: N,
    ind: N,
    flux_link: N,
    one_by_ind: N,
    one_by_p: N,
}

impl<N: Number> MotorPhy<N> {
    /// # Arguments
    /// * `pole_pairs` - pole pairs, at least 1
    /// * `res` - phase resistance [Ohm]
    /// * `ind` - phase inductance [H], must be positive
    /// * `flux_link` - flux linkage [Wb]
    pub fn new(pole_pairs: u8, res: N, ind: N, flux_link: N) -> Result<Self> {
        if pole_pairs == 0 {
            return Err(Error::InvalidConfiguration("pole pairs must be at least 1"));
        }
        if res < N::zero() {
            return Err(Error::InvalidConfiguration("resistance must not be negative"));
        }
        if ind <= N::zero() {
            return Err(Error::InvalidConfiguration("inductance must be positive"));
        }
        if flux_link < N::zero() {
            return Err(Error::InvalidConfiguration("flux linkage must not be negative"));
        }

        Ok(Self {
            pole_pairs,
            res,
            ind,
            flux_link,
            one_by_ind: N::one().sat_div(ind),
            one_by_p: N::one().sat_div(N::from_int(i32::from(pole_pairs))),
        })
    }

    pub fn pole_pairs(&self) -> u8 {
        self.pole_pairs
    }

    pub fn res(&self) -> N {
        self.res
    }

    pub fn ind(&self) -> N {
        self.ind
    }

    pub fn flux_link(&self) -> N {
        self.flux_link
    }

    pub fn one_by_ind(&self) -> N {
        self.one_by_ind
    }

    pub fn one_by_p(&self) -> N {
        self.one_by_p
    }

    /// Electrical from mechanical angle or velocity
    pub fn to_electrical(&self, mechanical: N) -> N {
        mechanical.sat_mul(N::from_int(i32::from(self.pole_pairs)))
    }
}
