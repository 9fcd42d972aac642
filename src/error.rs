use core::fmt::{self, Display, Formatter};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A configuration value is out of its valid range
    InvalidConfiguration(&'static str),
    /// The routine or ramp was run before it was configured
    NotConfigured,
    /// A startup routine failed and is now in its terminal fault state
    RoutineFault(FaultReason),
    /// The coprocessor or sensor transport reported a failure code
    Io(i32),
    /// A sensor produced a value that cannot be decoded
    InvalidReading,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultReason {
    /// The `zero` hook rejected the measured offset
    ZeroHook,
    /// The `dir` hook rejected the measured direction
    DirHook,
    /// The direction search did not move the sensor consistently
    Direction,
    /// Inductance measurement saw no current change
    CurrentDelta,
    /// An input consumed by the routine failed
    Input,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(what) => write!(f, "invalid configuration: {what}"),
            Error::NotConfigured => f.write_str("not configured"),
            Error::RoutineFault(reason) => write!(f, "routine fault: {reason}"),
            Error::Io(code) => write!(f, "transport failed with code {code}"),
            Error::InvalidReading => f.write_str("invalid sensor reading"),
        }
    }
}

impl Display for FaultReason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            FaultReason::ZeroHook => "zero offset callback failed",
            FaultReason::DirHook => "direction callback failed",
            FaultReason::Direction => "direction search inconsistent",
            FaultReason::CurrentDelta => "no current change during inductance measurement",
            FaultReason::Input => "routine input failed",
        })
    }
}

impl core::error::Error for Error {}
