//! Rotor angle sensors.

use crate::{
    routine::{AlignHooks, HookError},
    util::Direction,
    Result,
};

pub mod hall;

pub use hall::{GpioHall, Hall, HallCfg, HallDevice, HallPlacement};

/// Source of the electrical rotor angle
pub trait AngleSensor<N> {
    /// Take the current rotor position as electrical zero
    fn zero(&mut self) -> Result<()>;

    /// Direction the sensor counts in when the field turns clockwise
    fn set_dir(&mut self, dir: Direction);

    /// Read the sensor, returning the electrical angle in `[0, 2π)`
    fn run(&mut self) -> Result<N>;
}

/// Lets the alignment routine zero and orient a sensor directly.
///
/// ```ignore
/// let angle = hall.run()?;
/// align.run(&input, &mut SensorHooks::new(&mut hall), &mut out)?;
/// ```
pub struct SensorHooks<'a, S> {
    sensor: &'a mut S,
}

impl<'a, S> SensorHooks<'a, S> {
    pub fn new(sensor: &'a mut S) -> Self {
        Self { sensor }
    }
}

impl<N, S: AngleSensor<N>> AlignHooks<N> for SensorHooks<'_, S> {
    fn zero(&mut self, _angle: N) -> Result<(), HookError> {
        self.sensor.zero().map_err(HookError::from)
    }

    fn dir(&mut self, dir: Direction) -> Result<(), HookError> {
        self.sensor.set_dir(dir);
        Ok(())
    }
}
