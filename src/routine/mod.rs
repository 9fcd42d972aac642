//! Motor startup routines.
//!
//! A routine is a state machine stepped once per control period by the
//! motor control loop until it reports [`RunStatus::Done`] or fails. The
//! loop holds a [`Routine`] (or a `&mut dyn FocRoutine`) picked at
//! configuration time through one of the static [`RoutineOps`]
//! descriptors, without knowing which concrete routine it drives.

use crate::{
    motor::FocMode,
    num::{Number, Q16},
    util::{Direction, DqFrame},
    Error, Result,
};

pub mod align;
pub mod ident;

pub use align::{Align, AlignCfg, AlignFinal, AlignStage};
pub use ident::{Ident, IdentCfg, IdentFinal, IdentStage};

pub type AlignF32 = Align<f32>;
pub type AlignQ16 = Align<Q16>;
pub type IdentF32 = Ident<f32>;
pub type IdentQ16 = Ident<Q16>;
pub type RoutineF32 = Routine<f32>;
pub type RoutineQ16 = Routine<Q16>;

/// Measurements handed to a routine every period
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoutineIn<N> {
    /// Measured dq current
    pub idq: DqFrame<N>,
    /// Measured dq voltage
    pub vdq: DqFrame<N>,
    /// Electrical angle from the angle sensor
    pub angle: N,
    /// Mechanical angle from the angle sensor
    pub angle_m: N,
    /// Electrical velocity
    pub vel: N,
    /// DC bus voltage
    pub vbus: N,
}

impl<N: Number> Default for RoutineIn<N> {
    fn default() -> Self {
        Self {
            idq: DqFrame::zero(),
            vdq: DqFrame::zero(),
            angle: N::zero(),
            angle_m: N::zero(),
            vel: N::zero(),
            vbus: N::zero(),
        }
    }
}

/// Command for the current loop produced by a routine every period
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoutineOut<N> {
    pub dq_ref: DqFrame<N>,
    pub vdq_comp: DqFrame<N>,
    pub angle: N,
    pub mode: FocMode,
}

impl<N: Number> RoutineOut<N> {
    /// Motor de-energised
    pub fn idle() -> Self {
        Self {
            dq_ref: DqFrame::zero(),
            vdq_comp: DqFrame::zero(),
            angle: N::zero(),
            mode: FocMode::Idle,
        }
    }

    /// Voltage vector `vdq` at electrical angle `angle`
    pub fn voltage(vdq: DqFrame<N>, angle: N) -> Self {
        Self {
            dq_ref: vdq,
            vdq_comp: DqFrame::zero(),
            angle,
            mode: FocMode::Voltage,
        }
    }
}

impl<N: Number> Default for RoutineOut<N> {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    NotDone,
    Done,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoutineState {
    /// Not configured
    #[default]
    Uninit,
    /// Configured, not stepped yet
    Ready,
    Running,
    Done,
    Fault,
}

/// Failure code returned by an alignment hook
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookError(pub i32);

impl HookError {
    pub const EIO: Self = HookError(-5);
    pub const EINVAL: Self = HookError(-22);
}

impl From<Error> for HookError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(code) => HookError(code),
            Error::InvalidReading => HookError::EIO,
            _ => HookError::EINVAL,
        }
    }
}

/// Callbacks into the owner of the angle sensor, used by the alignment
/// routine to hand over what it measured.
///
/// Invoked synchronously from within [`FocRoutine::run`], at most once
/// each per alignment.
pub trait AlignHooks<N> {
    /// The rotor sits at electrical zero, `angle` is what the sensor reads
    fn zero(&mut self, angle: N) -> Result<(), HookError>;

    /// The sensor counts in `dir` when the field turns clockwise
    fn dir(&mut self, dir: Direction) -> Result<(), HookError>;
}

/// Hooks for routines that do not call back, or when the results are only
/// read from the final data
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl<N> AlignHooks<N> for NoHooks {
    fn zero(&mut self, _angle: N) -> Result<(), HookError> {
        Ok(())
    }

    fn dir(&mut self, _dir: Direction) -> Result<(), HookError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoutineCfg<N> {
    Align(AlignCfg<N>),
    Ident(IdentCfg<N>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoutineFinal<N> {
    /// `None` until the alignment completed
    Align(Option<AlignFinal<N>>),
    Ident(IdentFinal<N>),
}

/// Operations every startup routine provides
pub trait FocRoutine<N: Number> {
    /// Prepare a fresh instance; clears any previous configuration
    fn init(&mut self) -> Result<()>;

    /// Release the routine. Safe in any state, including mid-sequence
    fn deinit(&mut self);

    fn configure(&mut self, cfg: RoutineCfg<N>) -> Result<()>;

    /// Advance one control period.
    ///
    /// `out` is always written, with an IDLE command when the routine has
    /// nothing to drive. Errors other than [`Error::NotConfigured`] leave the
    /// routine in its fault state.
    fn run(
        &mut self,
        input: &RoutineIn<N>,
        hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<RunStatus>;

    fn final_data(&self) -> RoutineFinal<N>;

    fn state(&self) -> RoutineState;
}

/// One of the startup routines
#[derive(Clone, Debug)]
pub enum Routine<N: Number> {
    Align(Align<N>),
    Ident(Ident<N>),
}

impl<N: Number> Routine<N> {
    pub fn align() -> Self {
        Routine::Align(Align::new())
    }

    pub fn ident() -> Self {
        Routine::Ident(Ident::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Routine::Align(_) => "align",
            Routine::Ident(_) => "ident",
        }
    }

    fn inner(&mut self) -> &mut dyn FocRoutine<N> {
        match self {
            Routine::Align(a) => a,
            Routine::Ident(i) => i,
        }
    }
}

impl<N: Number> FocRoutine<N> for Routine<N> {
    fn init(&mut self) -> Result<()> {
        self.inner().init()
    }

    fn deinit(&mut self) {
        self.inner().deinit()
    }

    fn configure(&mut self, cfg: RoutineCfg<N>) -> Result<()> {
        self.inner().configure(cfg)
    }

    fn run(
        &mut self,
        input: &RoutineIn<N>,
        hooks: &mut dyn AlignHooks<N>,
        out: &mut RoutineOut<N>,
    ) -> Result<RunStatus> {
        self.inner().run(input, hooks, out)
    }

    fn final_data(&self) -> RoutineFinal<N> {
        match self {
            Routine::Align(a) => a.final_data(),
            Routine::Ident(i) => i.final_data(),
        }
    }

    fn state(&self) -> RoutineState {
        match self {
            Routine::Align(a) => FocRoutine::state(a),
            Routine::Ident(i) => FocRoutine::state(i),
        }
    }
}

/// Static descriptor of a routine kind for one numeric representation
pub struct RoutineOps<N: Number> {
    pub name: &'static str,
    pub create: fn() -> Routine<N>,
}

impl<N: Number> RoutineOps<N> {
    /// A new, uninitialized routine of this kind
    pub fn instance(&self) -> Routine<N> {
        (self.create)()
    }
}

pub static ROUTINE_ALIGN_F32: RoutineOps<f32> = RoutineOps {
    name: "align",
    create: Routine::<f32>::align,
};

pub static ROUTINE_ALIGN_Q16: RoutineOps<Q16> = RoutineOps {
    name: "align",
    create: Routine::<Q16>::align,
};

pub static ROUTINE_IDENT_F32: RoutineOps<f32> = RoutineOps {
    name: "ident",
    create: Routine::<f32>::ident,
};

pub static ROUTINE_IDENT_Q16: RoutineOps<Q16> = RoutineOps {
    name: "ident",
    create: Routine::<Q16>::ident,
};

/// Reject a configuration meant for the other routine kind
fn wrong_kind(expected: &'static str) -> Error {
    log::error!("{expected}: configuration for another routine");
    Error::InvalidConfiguration("configuration for another routine kind")
}
