#![cfg_attr(not(test), no_std)]

pub mod cordic;
mod error;
pub mod motor;
pub mod num;
mod pid;
pub mod routine;
pub mod sensor;
pub mod util;

use core::cell::Cell;

use critical_section::Mutex;

pub use error::{Error, FaultReason, Result};
pub use num::{Number, Q16};
pub use pid::PiController;

static TRACE: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Whether per-period traces are emitted by the routines
pub fn trace_enabled() -> bool {
    critical_section::with(|cs| TRACE.borrow(cs).get())
}

pub fn set_trace(trace: bool) {
    critical_section::with(|cs| TRACE.borrow(cs).set(trace));
}

macro_rules! f {
    ($x:literal) => {
        ::fixed::types::I16F16::lit($x)
    };
    ($x:expr) => {
        ::fixed::types::I16F16::from_num($x)
    };
}

pub(crate) use f;
