//! Angle sensor alignment.
//!
//! Locks the rotor at electrical zero to find the sensor's zero offset,
//! then walks the field clockwise and back while watching the sensor to
//! find the direction it counts in. Optionally starts by homing an encoder
//! onto its index pulse.

use log::{debug, error, info};

use super::{
    wrong_kind, AlignHooks, FocRoutine, HookError, RoutineCfg, RoutineFinal, RoutineIn,
    RoutineOut, RoutineState, RunStatus,
};
use crate::{
    num::Number,
    util::{normalize_angle, trace, wrap_pi, Direction, DqFrame},
    Error, FaultReason, Result,
};

pub const DEFAULT_VOLT: f32 = 0.1;
pub const DEFAULT_OFFSET_STEPS: u32 = 1000;

/// Periods the field is held at each direction search waypoint
const DIR_HOLD_STEPS: u32 = 10;
/// De-energised periods after the direction search
const IDLE_STEPS: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignCfg<N> {
    /// q-axis voltage used to pull the rotor [V]
    pub volt: N,
    /// Periods the rotor is given to settle before the offset is read
    pub offset_steps: u32,
    /// Home the encoder onto its index before measuring the offset
    pub index: bool,
}

impl<N: Number> Default for AlignCfg<N> {
    fn default() -> Self {
        Self {
            volt: N::from_f32(DEFAULT_VOLT),
            offset_steps: DEFAULT_OFFSET_STEPS,
            index: false,
        }
    }
}

/// Alignment result, available once the routine is done
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignFinal<N> {
    pub dir: Direction,
    pub offset: N,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignStage {
    Init,
    Index,
    Offset,
    Direction,
    Idle,
    Done,
    Fault(FaultReason),
}

#[derive(Clone, Copy, Debug)]
enum DirStep {
    /// Hold the field; accumulate the sensor delta under the given direction
    Hold(Option<Direction>),
    /// Turn the field toward the waypoint with the given index
    Move(Direction, usize),
}

const DIR_SEQUENCE: [DirStep; 17] = [
    DirStep::Hold(None),
    DirStep::Move(Direction::Cw, 1),
    DirStep::Hold(Some(Direction::Cw)),
    DirStep::Move(Direction::Cw, 2),
    DirStep::Hold(Some(Direction::Cw)),
    DirStep::Move(Direction::Cw, 3),
    DirStep::Hold(Some(Direction::Cw)),
    DirStep::Move(Direction::Cw, 4),
    DirStep::Hold(Some(Direction::Cw)),
    DirStep::Move(Direction::Ccw, 3),
    DirStep::Hold(Some(Direction::Ccw)),
    DirStep::Move(Direction::Ccw, 2),
    DirStep::Hold(Some(Direction::Ccw)),
    DirStep::Move(Direction::Ccw, 1),
    DirStep::Hold(Some(Direction::Ccw)),
    DirStep::Move(Direction::Ccw, 0),
    DirStep::Hold(Some(Direction::Ccw)),
];

/// Angles converted once per instance instead of every period
#[derive(Clone, Copy, Debug)]
struct Consts<N> {
    /// q voltage at -90 deg puts the stator field at electrical zero
    align_angle: N,
    dir_step: N,
    waypoints: [N; 5],
    index_step: N,
    index_nozero: N,
    index_sign: N,
}

impl<N: Number> Consts<N> {
    fn new() -> Self {
        let third = N::FRAC_PI_3;
        Self {
            align_angle: N::from_f32(3.0 * core::f32::consts::FRAC_PI_2),
            dir_step: N::from_f32(0.001),
            waypoints: [
                N::zero(),
                third,
                third.sat_mul(N::two()),
                N::PI,
                third.sat_mul(N::from_int(4)),
            ],
            index_step: N::from_f32(0.001),
            index_nozero: N::from_f32(0.1),
            index_sign: -N::TAU,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Align<N> {
    cfg: Option<AlignCfg<N>>,
    k: Consts<N>,
    stage: AlignStage,
    started: bool,
    cntr: u32,

    dir_step: usize,
    dir_angle: N,
    angle_last: N,
    angle_now: N,
    diff_cw: N,
    diff_ccw: N,

    index_step: u8,
    index_angle: N,
    index_dir: Direction,

    offset: N,
    dir: Direction,
    final_data: Option<AlignFinal<N>>,
}

impl<N: Number> Align<N> {
    pub fn new() -> Self {
        Self {
            cfg: None,
            k: Consts::new(),
            stage: AlignStage::Init,
            started: false,
            cntr: 0,
            dir_step: 0,
            dir_angle: N::zero(),
            angle_last: N::zero(),
            angle_now: N::zero(),
            diff_cw: N::zero(),
            diff_ccw: N::zero(),
            index_step: 0,
            index_angle: N::zero(),
            index_dir: Direction::Cw,
            offset: N::zero(),
            dir: Direction::None,
            final_data: None,
        }
    }

    /// Validate and store the configuration, restarting the sequence
    pub fn set_config(&mut self, cfg: AlignCfg<N>) -> Result<()> {
        if cfg.volt <= N::zero() {
            return Err(Error::InvalidConfiguration("align voltage must be positive"));
        }
        if cfg.offset_steps == 0 {
            return Err(Error::InvalidConfiguration("align offset steps must be positive"));
        }

        *self = Self::new();
        self.cfg = Some(cfg);
        debug!(
            "align: volt={:?} offset_steps={} index={}",
            cfg.volt, cfg.offset_steps, cfg.index
        );

        Ok(())
    }

    pub fn stage(&self) -> AlignStage {
        self.stage
    }

    /// Direction and offset, once the alignment has completed
    pub fn result(&self) -> Option<AlignFinal<N>> {
        self.final_data
    }

    fn fault(&mut self, reason: FaultReason, out: &mut RoutineOut<N>) -> Result<RunStatus> {
        error!("align failed: {reason}");
        self.stage = AlignStage::Fault(reason);
        *out = RoutineOut::idle();
        Err(Error::RoutineFault(reason))
    }

    fn index_run(&mut self, cfg: &AlignCfg<N>, input: &RoutineIn<N>, out: &mut RoutineOut<N>) -> bool {
        // Index resets the encoder to zero, so look for the wrap at +-pi
        self.angle_last = self.angle_now;
        self.angle_now = normalize_angle(input.angle_m.sat_sub(N::PI), -N::PI, N::PI);

        let sign = self.angle_now.sat_mul(self.angle_last);
        let near_zero = self.angle_now.abs() < self.k.index_nozero;
        let crossed = sign < self.k.index_sign;

        let step = self.index_dir.sign::<N>().sat_mul(self.k.index_step);
        match self.index_step {
            // Away from the index
            0 | 2 => {
                self.index_angle = self.index_angle.sat_add(step);
                if near_zero {
                    self.index_step += 1;
                }
            }
            // Onto the index
            1 | 3 => {
                self.index_angle = self.index_angle.sat_add(step);
                if crossed {
                    self.index_dir = self.index_dir.reversed();
                    self.index_step += 1;
                }
            }
            _ => {
                self.angle_last = N::zero();
                self.angle_now = N::zero();
                self.cntr = 0;
                return true;
            }
        }

        *out = RoutineOut::voltage(DqFrame::new(N::zero(), cfg.volt), self.index_angle);
        self.cntr = self.cntr.saturating_add(1);

        false
    }

    fn offset_run(
        &mut self,
        cfg: &AlignCfg<N>,
        input: &RoutineIn<N>,
        hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<bool, FaultReason> {
        if self.cntr <= cfg.offset_steps {
            *out = RoutineOut::voltage(DqFrame::new(N::zero(), cfg.volt), self.k.align_angle);
            self.cntr = self.cntr.saturating_add(1);
            return Ok(false);
        }

        hooks.zero(input.angle).map_err(|HookError(code)| {
            error!("align offset callback failed {code}");
            FaultReason::ZeroHook
        })?;

        self.offset = input.angle;
        self.cntr = 0;

        Ok(true)
    }

    fn dir_move(&mut self, dir: Direction, dest: N) {
        self.dir_angle = self
            .dir_angle
            .sat_add(dir.sign::<N>().sat_mul(self.k.dir_step));

        let arrived = match dir {
            Direction::Cw => self.dir_angle >= dest,
            Direction::Ccw => self.dir_angle <= dest,
            Direction::None => true,
        };
        if arrived {
            self.dir_step += 1;
        }
    }

    fn dir_hold(&mut self, diff: Option<Direction>) {
        self.cntr = self.cntr.saturating_add(1);
        if self.cntr <= DIR_HOLD_STEPS {
            return;
        }

        let delta = wrap_pi(self.angle_now.sat_sub(self.angle_last));
        match diff {
            Some(Direction::Cw) => self.diff_cw = self.diff_cw.sat_add(delta),
            Some(Direction::Ccw) => self.diff_ccw = self.diff_ccw.sat_add(delta),
            _ => {}
        }

        self.angle_last = self.angle_now;
        self.dir_step += 1;
        self.cntr = 0;
    }

    fn dir_run(
        &mut self,
        cfg: &AlignCfg<N>,
        input: &RoutineIn<N>,
        hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<bool, FaultReason> {
        self.angle_now = input.angle;

        if let Some(step) = DIR_SEQUENCE.get(self.dir_step).copied() {
            match step {
                DirStep::Hold(diff) => self.dir_hold(diff),
                DirStep::Move(dir, dest) => self.dir_move(dir, self.k.waypoints[dest]),
            }
            *out = RoutineOut::voltage(DqFrame::new(N::zero(), cfg.volt), self.dir_angle);
            return Ok(false);
        }

        let zero = N::zero();
        let dir = if self.diff_cw > zero && self.diff_ccw < zero {
            Direction::Cw
        } else if self.diff_cw < zero && self.diff_ccw > zero {
            Direction::Ccw
        } else {
            error!(
                "direction align failed, cw={:?} ccw={:?}",
                self.diff_cw, self.diff_ccw
            );
            return Err(FaultReason::Direction);
        };

        hooks.dir(dir).map_err(|HookError(code)| {
            error!("align dir callback failed {code}");
            FaultReason::DirHook
        })?;

        self.dir = dir;

        Ok(true)
    }

    fn idle_run(&mut self) -> bool {
        self.cntr = self.cntr.saturating_add(1);
        if self.cntr > IDLE_STEPS {
            self.cntr = 0;
            return true;
        }
        false
    }
}

impl<N: Number> Default for Align<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Number> FocRoutine<N> for Align<N> {
    fn init(&mut self) -> Result<()> {
        *self = Self::new();
        Ok(())
    }

    fn deinit(&mut self) {
        if matches!(FocRoutine::state(self), RoutineState::Running) {
            debug!("align: stopped in {:?}", self.stage);
        }
        *self = Self::new();
    }

    fn configure(&mut self, cfg: RoutineCfg<N>) -> Result<()> {
        match cfg {
            RoutineCfg::Align(cfg) => self.set_config(cfg),
            _ => Err(wrong_kind("align")),
        }
    }

    fn run(
        &mut self,
        input: &RoutineIn<N>,
        hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<RunStatus> {
        *out = RoutineOut::idle();

        let cfg = self.cfg.ok_or(Error::NotConfigured)?;
        self.started = true;

        let status = match self.stage {
            AlignStage::Init => {
                self.stage = if cfg.index {
                    AlignStage::Index
                } else {
                    AlignStage::Offset
                };
                RunStatus::NotDone
            }
            AlignStage::Index => {
                if self.index_run(&cfg, input, out) {
                    info!("ALIGN INDEX done!");
                    self.stage = AlignStage::Offset;
                }
                RunStatus::NotDone
            }
            AlignStage::Offset => match self.offset_run(&cfg, input, hooks, out) {
                Ok(true) => {
                    info!("ALIGN OFFSET done! offset={:?}", self.offset);
                    self.stage = AlignStage::Direction;
                    RunStatus::NotDone
                }
                Ok(false) => RunStatus::NotDone,
                Err(reason) => return self.fault(reason, out),
            },
            AlignStage::Direction => match self.dir_run(&cfg, input, hooks, out) {
                Ok(true) => {
                    info!("ALIGN DIR done! dir={:?}", self.dir);
                    self.stage = AlignStage::Idle;
                    RunStatus::NotDone
                }
                Ok(false) => RunStatus::NotDone,
                Err(reason) => return self.fault(reason, out),
            },
            AlignStage::Idle => {
                if self.idle_run() {
                    info!("ALIGN IDLE done!");
                    self.final_data = Some(AlignFinal {
                        dir: self.dir,
                        offset: self.offset,
                    });
                    self.stage = AlignStage::Done;
                    RunStatus::Done
                } else {
                    RunStatus::NotDone
                }
            }
            AlignStage::Done => RunStatus::Done,
            AlignStage::Fault(reason) => return Err(Error::RoutineFault(reason)),
        };

        let (stage, cntr, angle) = (self.stage, self.cntr, out.angle);
        trace::sample(|f| write!(f, "align {stage:?} cntr={cntr} angle={angle:?}"));

        Ok(status)
    }

    fn final_data(&self) -> RoutineFinal<N> {
        RoutineFinal::Align(self.final_data)
    }

    fn state(&self) -> RoutineState {
        match (self.cfg, self.stage) {
            (None, _) => RoutineState::Uninit,
            (_, AlignStage::Done) => RoutineState::Done,
            (_, AlignStage::Fault(_)) => RoutineState::Fault,
            _ if !self.started => RoutineState::Ready,
            _ => RoutineState::Running,
        }
    }
}
