pub mod angle;
pub mod dq;
pub mod trace;

pub use angle::{normalize_angle, wrap_pi, Direction, PhaseAngle};
pub use dq::DqFrame;
