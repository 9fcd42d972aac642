//! Motor resistance and inductance identification.
//!
//! Resistance comes from the d-axis voltage needed to hold a constant
//! current with the rotor locked at angle zero. Inductance comes from the
//! current ripple of a square-wave d-axis voltage toggled every period.

use log::{debug, error, info};

use super::{
    wrong_kind, AlignHooks, FocRoutine, RoutineCfg, RoutineFinal, RoutineIn, RoutineOut,
    RoutineState, RunStatus,
};
use crate::{
    num::Number,
    util::{trace, DqFrame},
    Error, FaultReason, PiController, Result,
};

pub const DEFAULT_PER: f32 = 0.0001;
pub const DEFAULT_RES_CURRENT: f32 = 0.2;
pub const DEFAULT_IND_VOLT: f32 = 0.5;
pub const DEFAULT_RES_STEPS: u32 = 1000;
pub const DEFAULT_IND_STEPS: u32 = 1000;
pub const DEFAULT_IDLE_STEPS: u32 = 1000;

/// Integral gain of the resistance current regulator
const RES_KI: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdentCfg<N> {
    /// Control period [s]
    pub per: N,
    /// Current held during the resistance measurement [A]
    pub res_current: N,
    /// Square-wave amplitude for the inductance measurement [V]
    pub ind_volt: N,
    pub res_steps: u32,
    pub ind_steps: u32,
    /// De-energised periods before and after each measurement
    pub idle_steps: u32,
}

impl<N: Number> Default for IdentCfg<N> {
    fn default() -> Self {
        Self {
            per: N::from_f32(DEFAULT_PER),
            res_current: N::from_f32(DEFAULT_RES_CURRENT),
            ind_volt: N::from_f32(DEFAULT_IND_VOLT),
            res_steps: DEFAULT_RES_STEPS,
            ind_steps: DEFAULT_IND_STEPS,
            idle_steps: DEFAULT_IDLE_STEPS,
        }
    }
}

/// Identified parameters. `res` and `ind` are meaningful once `ready`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdentFinal<N> {
    pub ready: bool,
    /// Phase resistance [Ohm]
    pub res: N,
    /// Phase inductance [H]
    pub ind: N,
}

impl<N: Number> Default for IdentFinal<N> {
    fn default() -> Self {
        Self {
            ready: false,
            res: N::zero(),
            ind: N::zero(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentStage {
    Init,
    Idle1,
    Res,
    Idle2,
    Ind,
    Idle3,
    Done,
    Fault(FaultReason),
}

/// Sample sum in the wide accumulator of `N`, divided once when read
#[derive(Clone, Copy, Debug)]
struct Mean<N: Number> {
    acc: N::Acc,
    n: u32,
}

impl<N: Number> Mean<N> {
    fn new() -> Self {
        Self {
            acc: N::Acc::default(),
            n: 0,
        }
    }

    fn push(&mut self, x: N) {
        self.acc = N::acc_add(self.acc, x);
        self.n = self.n.saturating_add(1);
    }

    fn mean(&self) -> N {
        N::acc_mean(self.acc, self.n)
    }
}

#[derive(Clone, Debug)]
pub struct Ident<N: Number> {
    cfg: Option<IdentCfg<N>>,
    stage: IdentStage,
    started: bool,
    cntr: u32,

    pi: PiController<N>,
    res_volt: Mean<N>,

    ind_sign: N,
    ind_top: Mean<N>,
    ind_bottom: Mean<N>,

    res: N,
    ind: N,
    final_data: IdentFinal<N>,
}

impl<N: Number> Ident<N> {
    pub fn new() -> Self {
        Self {
            cfg: None,
            stage: IdentStage::Init,
            started: false,
            cntr: 0,
            pi: PiController::new()
                .kp(N::zero())
                .ki(N::from_f32(RES_KI))
                .limit(N::zero(), N::zero()),
            res_volt: Mean::new(),
            ind_sign: N::one(),
            ind_top: Mean::new(),
            ind_bottom: Mean::new(),
            res: N::zero(),
            ind: N::zero(),
            final_data: IdentFinal::default(),
        }
    }

    pub fn set_config(&mut self, cfg: IdentCfg<N>) -> Result<()> {
        let zero = N::zero();
        if cfg.per <= zero {
            return Err(Error::InvalidConfiguration("ident period must be positive"));
        }
        if cfg.res_current <= zero {
            return Err(Error::InvalidConfiguration("ident current must be positive"));
        }
        if cfg.ind_volt <= zero {
            return Err(Error::InvalidConfiguration("ident voltage must be positive"));
        }
        if cfg.res_steps == 0 || cfg.ind_steps == 0 || cfg.idle_steps == 0 {
            return Err(Error::InvalidConfiguration("ident step counts must be positive"));
        }

        *self = Self::new();
        self.cfg = Some(cfg);
        debug!(
            "ident: per={:?} res_current={:?} ind_volt={:?} steps={}/{}/{}",
            cfg.per, cfg.res_current, cfg.ind_volt, cfg.res_steps, cfg.ind_steps, cfg.idle_steps
        );

        Ok(())
    }

    pub fn stage(&self) -> IdentStage {
        self.stage
    }

    /// Published all at once in the step that enters [`IdentStage::Done`]
    pub fn result(&self) -> IdentFinal<N> {
        self.final_data
    }

    fn fault(&mut self, reason: FaultReason, out: &mut RoutineOut<N>) -> Result<RunStatus> {
        error!("ident failed: {reason}");
        self.stage = IdentStage::Fault(reason);
        *out = RoutineOut::idle();
        Err(Error::RoutineFault(reason))
    }

    fn idle_run(&mut self, cfg: &IdentCfg<N>) -> bool {
        self.cntr = self.cntr.saturating_add(1);
        if self.cntr > cfg.idle_steps {
            self.cntr = 0;
            return true;
        }
        false
    }

    fn res_run(
        &mut self,
        cfg: &IdentCfg<N>,
        input: &RoutineIn<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<bool, FaultReason> {
        if self.cntr > cfg.res_steps {
            let res = self.res_volt.mean().sat_div(cfg.res_current);
            self.res = res;
            self.pi.reset();
            self.cntr = 0;
            info!("IDENT RES done! res={res:?}");
            return Ok(true);
        }

        if input.vbus <= N::zero() {
            error!("ident: no bus voltage {:?}", input.vbus);
            return Err(FaultReason::Input);
        }

        self.pi.set_limit(N::zero(), input.vbus);
        let err = cfg.res_current.sat_sub(input.idq.d);
        let vref = self.pi.update(err);

        // First half of the window lets the current settle
        if self.cntr > cfg.res_steps / 2 {
            self.res_volt.push(vref);
        }

        *out = RoutineOut::voltage(DqFrame::new(vref, N::zero()), N::zero());
        self.cntr = self.cntr.saturating_add(1);

        Ok(false)
    }

    fn ind_run(
        &mut self,
        cfg: &IdentCfg<N>,
        input: &RoutineIn<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<bool, FaultReason> {
        if self.cntr > cfg.ind_steps {
            let (top, bottom) = (self.ind_top.mean(), self.ind_bottom.mean());
            let delta = top.sat_sub(bottom);
            if delta <= N::zero() {
                error!("ident: no current change, top={top:?} bottom={bottom:?}");
                return Err(FaultReason::CurrentDelta);
            }

            let ind = cfg.ind_volt.sat_div(delta).sat_mul(cfg.per);
            self.ind = ind;
            self.cntr = 0;
            info!("IDENT IND done! ind={ind:?}");
            return Ok(true);
        }

        // Sample belongs to the half period that just ended
        if self.ind_sign > N::zero() {
            self.ind_top.push(input.idq.d);
        } else {
            self.ind_bottom.push(input.idq.d);
        }

        self.ind_sign = -self.ind_sign;
        let vref = self.ind_sign.sat_mul(cfg.ind_volt);

        *out = RoutineOut::voltage(DqFrame::new(vref, N::zero()), N::zero());
        self.cntr = self.cntr.saturating_add(1);

        Ok(false)
    }
}

impl<N: Number> Default for Ident<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Number> FocRoutine<N> for Ident<N> {
    fn init(&mut self) -> Result<()> {
        *self = Self::new();
        Ok(())
    }

    fn deinit(&mut self) {
        if matches!(FocRoutine::state(self), RoutineState::Running) {
            debug!("ident: stopped in {:?}", self.stage);
        }
        *self = Self::new();
    }

    fn configure(&mut self, cfg: RoutineCfg<N>) -> Result<()> {
        match cfg {
            RoutineCfg::Ident(cfg) => self.set_config(cfg),
            _ => Err(wrong_kind("ident")),
        }
    }

    fn run(
        &mut self,
        input: &RoutineIn<N>,
        _hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<RunStatus> {
        *out = RoutineOut::idle();

        let cfg = self.cfg.ok_or(Error::NotConfigured)?;
        self.started = true;

        let status = match self.stage {
            IdentStage::Init => {
                self.stage = IdentStage::Idle1;
                RunStatus::NotDone
            }
            IdentStage::Idle1 => {
                if self.idle_run(&cfg) {
                    self.stage = IdentStage::Res;
                }
                RunStatus::NotDone
            }
            IdentStage::Res => match self.res_run(&cfg, input, out) {
                Ok(true) => {
                    self.stage = IdentStage::Idle2;
                    RunStatus::NotDone
                }
                Ok(false) => RunStatus::NotDone,
                Err(reason) => return self.fault(reason, out),
            },
            IdentStage::Idle2 => {
                if self.idle_run(&cfg) {
                    self.stage = IdentStage::Ind;
                }
                RunStatus::NotDone
            }
            IdentStage::Ind => match self.ind_run(&cfg, input, out) {
                Ok(true) => {
                    self.stage = IdentStage::Idle3;
                    RunStatus::NotDone
                }
                Ok(false) => RunStatus::NotDone,
                Err(reason) => return self.fault(reason, out),
            },
            IdentStage::Idle3 => {
                if self.idle_run(&cfg) {
                    self.final_data = IdentFinal {
                        ready: true,
                        res: self.res,
                        ind: self.ind,
                    };
                    self.stage = IdentStage::Done;
                    info!("IDENT done! res={:?} ind={:?}", self.res, self.ind);
                    RunStatus::Done
                } else {
                    RunStatus::NotDone
                }
            }
            IdentStage::Done => RunStatus::Done,
            IdentStage::Fault(reason) => return Err(Error::RoutineFault(reason)),
        };

        let (stage, cntr, vd) = (self.stage, self.cntr, out.dq_ref.d);
        trace::sample(|f| write!(f, "ident {stage:?} cntr={cntr} vd={vd:?}"));

        Ok(status)
    }

    fn final_data(&self) -> RoutineFinal<N> {
        RoutineFinal::Ident(self.final_data)
    }

    fn state(&self) -> RoutineState {
        match (self.cfg, self.stage) {
            (None, _) => RoutineState::Uninit,
            (_, IdentStage::Done) => RoutineState::Done,
            (_, IdentStage::Fault(_)) => RoutineState::Fault,
            _ if !self.started => RoutineState::Ready,
            _ => RoutineState::Running,
        }
    }
}
