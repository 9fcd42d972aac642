//! Setpoint rate limiter.
//!
//! Moves a setpoint (velocity or current reference) toward the desired value
//! by at most one acceleration or deceleration step per control period, and
//! snaps to the target once it is within the threshold so the output does
//! not chatter around it.
//!
//! A single period therefore moves the setpoint by at most
//! `max(acc * per, dec * per, thr)`. The snap is the only step that may
//! exceed the rate limit.

use log::debug;

use crate::{num::Number, Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RampMode {
    /// Last run snapped to the desired value
    #[default]
    Constant,
    /// Last run was rate limited
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RampCfg<N> {
    per: N,
    thr: N,
    acc: N,
    dec: N,
    /// Precomputed on init, not every period
    acc_per: N,
    dec_per: N,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp<N> {
    cfg: Option<RampCfg<N>>,
    mode: RampMode,
    diff: N,
}

impl<N: Number> Ramp<N> {
    pub fn new() -> Self {
        Self {
            cfg: None,
            mode: RampMode::Constant,
            diff: N::zero(),
        }
    }

    /// Configure the ramp.
    ///
    /// # Arguments
    /// * `per` - control period [s], must be positive
    /// * `thr` - distance to the target below which the output snaps to it
    /// * `acc` - acceleration limit [unit/s], used when the setpoint rises
    /// * `dec` - deceleration limit [unit/s], used when the setpoint falls
    pub fn init(&mut self, per: N, thr: N, acc: N, dec: N) -> Result<()> {
        if per <= N::zero() {
            return Err(Error::InvalidConfiguration("ramp period must be positive"));
        }
        if thr < N::zero() {
            return Err(Error::InvalidConfiguration("ramp threshold must not be negative"));
        }
        if acc < N::zero() || dec < N::zero() {
            return Err(Error::InvalidConfiguration("ramp limits must not be negative"));
        }

        let cfg = RampCfg {
            per,
            thr,
            acc,
            dec,
            acc_per: acc.sat_mul(per),
            dec_per: dec.sat_mul(per),
        };
        debug!(
            "ramp: acc/per={:?} dec/per={:?} thr={:?}",
            cfg.acc_per, cfg.dec_per, cfg.thr
        );

        self.cfg = Some(cfg);
        self.reset();

        Ok(())
    }

    /// Forget the last run, keeping the configuration
    pub fn reset(&mut self) {
        self.mode = RampMode::Constant;
        self.diff = N::zero();
    }

    /// Drop the configuration; the ramp must be initialized again
    pub fn deinit(&mut self) {
        self.cfg = None;
        self.reset();
    }

    /// Next setpoint on the way from `now` to `des`
    pub fn run(&mut self, des: N, now: N) -> Result<N> {
        let cfg = self.cfg.as_ref().ok_or(Error::NotConfigured)?;

        let diff = des.sat_sub(now);
        let set = if diff.abs() <= cfg.thr {
            self.mode = RampMode::Constant;
            des
        } else if diff > N::zero() {
            self.mode = RampMode::Linear;
            now.sat_add(diff.min(cfg.acc_per))
        } else {
            self.mode = RampMode::Linear;
            now.sat_add(diff.max(-cfg.dec_per))
        };
        self.diff = diff;

        Ok(set)
    }

    /// [`run`](Self::run) writing into an existing setpoint
    pub fn run_into(&mut self, des: N, now: N, set: &mut N) -> Result<()> {
        *set = self.run(des, now)?;
        Ok(())
    }

    pub fn mode(&self) -> RampMode {
        self.mode
    }

    /// `des - now` of the last run
    pub fn diff(&self) -> N {
        self.diff
    }

    pub fn acc_per(&self) -> Option<N> {
        self.cfg.map(|c| c.acc_per)
    }

    pub fn dec_per(&self) -> Option<N> {
        self.cfg.map(|c| c.dec_per)
    }

    pub fn period(&self) -> Option<N> {
        self.cfg.map(|c| c.per)
    }

    /// Configured `(acc, dec)` limits
    pub fn limits(&self) -> Option<(N, N)> {
        self.cfg.map(|c| (c.acc, c.dec))
    }

    pub fn is_configured(&self) -> bool {
        self.cfg.is_some()
    }
}

impl<N: Number> Default for Ramp<N> {
    fn default() -> Self {
        Self::new()
    }
}
