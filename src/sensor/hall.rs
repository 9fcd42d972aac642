//! Three-phase Hall sensor angle handler.
//!
//! The sensor only resolves the electrical angle to one of six sectors.
//! With estimation enabled the angle is interpolated inside a sector from
//! the time the previous sector took.

use embedded_hal::digital::InputPin;
use log::{error, info, warn};

use super::AngleSensor;
use crate::{
    num::Number,
    util::{normalize_angle, Direction},
    Error, Result,
};

const SECTORS: u8 = 6;

pub const DEFAULT_PER: f32 = 0.0001;

/// Errno reported when a Hall input pin cannot be read
const EIO: i32 = -5;

/// Electrical spacing of the three sensors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HallPlacement {
    #[default]
    Deg120,
    Deg60,
}

impl HallPlacement {
    /// Sector of a 3-bit Hall code, `None` for codes the placement never
    /// produces
    pub fn decode(self, code: u8) -> Option<u8> {
        let sector = match (self, code) {
            (HallPlacement::Deg120, 0b001) => 0,
            (HallPlacement::Deg120, 0b011) => 1,
            (HallPlacement::Deg120, 0b010) => 2,
            (HallPlacement::Deg120, 0b110) => 3,
            (HallPlacement::Deg120, 0b100) => 4,
            (HallPlacement::Deg120, 0b101) => 5,
            (HallPlacement::Deg60, 0b000) => 0,
            (HallPlacement::Deg60, 0b001) => 1,
            (HallPlacement::Deg60, 0b011) => 2,
            (HallPlacement::Deg60, 0b111) => 3,
            (HallPlacement::Deg60, 0b110) => 4,
            (HallPlacement::Deg60, 0b100) => 5,
            _ => return None,
        };
        Some(sector)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HallCfg<N> {
    /// Period between `run` calls [s]
    pub per: N,
    pub placement: HallPlacement,
    /// Interpolate the angle between sector edges
    pub estimate: bool,
}

impl<N: Number> Default for HallCfg<N> {
    fn default() -> Self {
        Self {
            per: N::from_f32(DEFAULT_PER),
            placement: HallPlacement::default(),
            estimate: false,
        }
    }
}

/// Raw access to the three Hall inputs
pub trait HallDevice {
    /// Current 3-bit Hall code, or the driver's negative error code
    fn position(&mut self) -> Result<u8, i32>;
}

/// Hall inputs wired to GPIOs: `a` is bit 0, `b` bit 1, `c` bit 2
#[derive(Debug)]
pub struct GpioHall<A, B, C> {
    a: A,
    b: B,
    c: C,
}

impl<A: InputPin, B: InputPin, C: InputPin> GpioHall<A, B, C> {
    pub fn new(a: A, b: B, c: C) -> Self {
        Self { a, b, c }
    }

    pub fn into_inner(self) -> (A, B, C) {
        (self.a, self.b, self.c)
    }
}

impl<A: InputPin, B: InputPin, C: InputPin> HallDevice for GpioHall<A, B, C> {
    fn position(&mut self) -> Result<u8, i32> {
        let a = self.a.is_high().map_err(|_| EIO)?;
        let b = self.b.is_high().map_err(|_| EIO)?;
        let c = self.c.is_high().map_err(|_| EIO)?;

        Ok(u8::from(a) | u8::from(b) << 1 | u8::from(c) << 2)
    }
}

/// Velocity based interpolation between sector edges
#[derive(Clone, Copy, Debug)]
struct Estimator<N> {
    sector_diff_last: i8,
    per_acc: N,
    vel_est: N,
    angle_diff: N,
}

impl<N: Number> Estimator<N> {
    fn new() -> Self {
        Self {
            sector_diff_last: 0,
            per_acc: N::zero(),
            vel_est: N::zero(),
            angle_diff: N::zero(),
        }
    }

    /// Angle travelled since the last sector edge
    fn update(&mut self, sector: u8, sector_last: u8, per: N, step: N) -> N {
        let diff = sector as i8 - sector_last as i8;

        if diff == 0 {
            self.per_acc = self.per_acc.sat_add(per);
            self.angle_diff = self
                .angle_diff
                .sat_add(self.vel_est.sat_mul(per))
                .clamp(-step, step);
            return self.angle_diff;
        }

        if self.per_acc > N::zero() {
            // Sector 0 edges wrap the diff, keep the previous estimate there
            if sector != 0 && sector_last != 0 {
                self.vel_est = if diff * self.sector_diff_last > 0 {
                    N::from_int(i32::from(diff))
                        .sat_mul(step)
                        .sat_div(self.per_acc)
                } else {
                    N::zero()
                };
            }

            self.per_acc = N::zero();
            self.angle_diff = N::zero();
        }
        self.sector_diff_last = diff;

        self.angle_diff
    }
}

#[derive(Debug)]
pub struct Hall<N, D> {
    inner: D,
    cfg: HallCfg<N>,
    step: N,
    offset: u8,
    sector: u8,
    dir: Direction,
    angle: N,
    est: Estimator<N>,
}

impl<N: Number, D: HallDevice> Hall<N, D> {
    pub fn new(dev: D, cfg: HallCfg<N>) -> Result<Self> {
        if cfg.per <= N::zero() {
            return Err(Error::InvalidConfiguration("hall period must be positive"));
        }

        Ok(Self {
            inner: dev,
            cfg,
            step: N::FRAC_PI_3,
            offset: 0,
            sector: 0,
            dir: Direction::Cw,
            angle: N::zero(),
            est: Estimator::new(),
        })
    }

    /// Last computed electrical angle
    pub fn angle(&self) -> N {
        self.angle
    }

    /// Last sector, relative to the zero offset
    pub fn sector(&self) -> u8 {
        self.sector
    }

    pub fn dir(&self) -> Direction {
        self.dir
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn read_sector(&mut self) -> Result<u8> {
        let code = self.inner.position().map_err(|code| {
            error!("hall: position failed {code}");
            Error::Io(code)
        })?;

        self.cfg.placement.decode(code).ok_or_else(|| {
            error!("hall: invalid code {code:#05b}");
            Error::InvalidReading
        })
    }
}

impl<N: Number, D: HallDevice> AngleSensor<N> for Hall<N, D> {
    fn zero(&mut self) -> Result<()> {
        self.offset = self.read_sector()?;
        self.sector = 0;
        self.angle = N::zero();
        self.est = Estimator::new();
        info!("hall: zero at sector {}", self.offset);
        Ok(())
    }

    fn set_dir(&mut self, dir: Direction) {
        if dir == Direction::None {
            warn!("hall: ignoring unknown direction");
            return;
        }
        self.dir = dir;
    }

    fn run(&mut self) -> Result<N> {
        let raw = self.read_sector()?;
        let sector = (raw + SECTORS - self.offset) % SECTORS;
        let sector_last = core::mem::replace(&mut self.sector, sector);

        let base = N::from_int(i32::from(sector)).sat_mul(self.step);
        let angle = if self.cfg.estimate {
            base.sat_add(self.est.update(sector, sector_last, self.cfg.per, self.step))
        } else {
            base
        };

        self.angle = normalize_angle(self.dir.sign::<N>().sat_mul(angle), N::zero(), N::TAU);
        Ok(self.angle)
    }
}

#[cfg(test)]
mod tests {
    use core::{cell::Cell, convert::Infallible, f32::consts::FRAC_PI_3};

    use embedded_hal::digital::ErrorType;

    use super::*;
    use crate::num::Q16;

    /// Hall device reading a shared code
    impl HallDevice for &Cell<Result<u8, i32>> {
        fn position(&mut self) -> Result<u8, i32> {
            self.get()
        }
    }

    struct Pin<'a>(&'a Cell<bool>);

    impl ErrorType for Pin<'_> {
        type Error = Infallible;
    }

    impl InputPin for Pin<'_> {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    const SEQ_120: [u8; 6] = [0b001, 0b011, 0b010, 0b110, 0b100, 0b101];

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn decode_tables() {
        for (sector, code) in SEQ_120.iter().enumerate() {
            assert_eq!(HallPlacement::Deg120.decode(*code), Some(sector as u8));
        }
        assert_eq!(HallPlacement::Deg120.decode(0b000), None);
        assert_eq!(HallPlacement::Deg120.decode(0b111), None);
        assert_eq!(HallPlacement::Deg60.decode(0b111), Some(3));
        assert_eq!(HallPlacement::Deg60.decode(0b010), None);
    }

    #[test]
    fn sector_angles_after_zero() {
        let code = Cell::new(Ok(SEQ_120[2]));
        let mut hall = Hall::<f32, _>::new(&code, HallCfg::default()).unwrap();
        hall.zero().unwrap();

        for (i, c) in SEQ_120.iter().cycle().skip(2).take(6).enumerate() {
            code.set(Ok(*c));
            let angle = hall.run().unwrap();
            assert!(approx(angle, i as f32 * FRAC_PI_3), "sector {i}: {angle}");
        }

        hall.set_dir(Direction::Ccw);
        code.set(Ok(SEQ_120[3]));
        assert!(approx(hall.run().unwrap(), 2.0 * core::f32::consts::PI - FRAC_PI_3));
    }

    #[test]
    fn read_failures() {
        let code = Cell::new(Ok(0b111));
        let mut hall = Hall::<Q16, _>::new(&code, HallCfg::default()).unwrap();
        assert_eq!(hall.run(), Err(Error::InvalidReading));
        assert_eq!(hall.zero(), Err(Error::InvalidReading));

        code.set(Err(-19));
        assert_eq!(hall.run(), Err(Error::Io(-19)));
    }

    #[test]
    fn estimate_interpolates_within_sector() {
        let per = 0.001;
        let cfg = HallCfg {
            per,
            placement: HallPlacement::Deg120,
            estimate: true,
        };
        let code = Cell::new(Ok(SEQ_120[0]));
        let mut hall = Hall::<f32, _>::new(&code, cfg).unwrap();
        hall.zero().unwrap();

        // 10 periods per sector
        for c in SEQ_120.iter().take(4) {
            code.set(Ok(*c));
            for _ in 0..10 {
                hall.run().unwrap();
            }
        }

        // Sectors took 9 accumulated periods, so the estimate reaches the next edge
        let angle = hall.angle();
        assert!(angle > 3.0 * FRAC_PI_3 + 0.5 * FRAC_PI_3, "{angle}");
        assert!(angle <= 4.0 * FRAC_PI_3 + 1e-4, "{angle}");

        // Stalled rotor never runs past the next edge
        for _ in 0..100 {
            hall.run().unwrap();
        }
        assert!(approx(hall.angle(), 4.0 * FRAC_PI_3));

        // Reversal drops the estimate
        code.set(Ok(SEQ_120[2]));
        hall.run().unwrap();
        code.set(Ok(SEQ_120[1]));
        hall.run().unwrap();
        hall.run().unwrap();
        assert!(approx(hall.angle(), FRAC_PI_3));
    }

    #[test]
    fn gpio_code() {
        let (a, b, c) = (Cell::new(true), Cell::new(true), Cell::new(false));
        let mut dev = GpioHall::new(Pin(&a), Pin(&b), Pin(&c));
        assert_eq!(dev.position(), Ok(0b011));

        c.set(true);
        a.set(false);
        assert_eq!(dev.position(), Ok(0b110));

        let mut hall = Hall::<f32, _>::new(dev, HallCfg::default()).unwrap();
        assert!(approx(hall.run().unwrap(), 3.0 * FRAC_PI_3));
    }

    #[test]
    fn rejects_bad_period() {
        let code = Cell::new(Ok(SEQ_120[0]));
        let cfg = HallCfg {
            per: 0.0,
            ..HallCfg::default()
        };
        assert!(matches!(
            Hall::<f32, _>::new(&code, cfg),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
