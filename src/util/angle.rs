use crate::num::Number;

/// Rotation direction, also used as the angle sensor's sign
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    Cw,
    Ccw,
    #[default]
    None,
}

impl Direction {
    /// `1`, `-1` or `0`
    pub fn sign<N: Number>(self) -> N {
        match self {
            Direction::Cw => N::one(),
            Direction::Ccw => -N::one(),
            Direction::None => N::zero(),
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Cw => Direction::Ccw,
            Direction::Ccw => Direction::Cw,
            Direction::None => Direction::None,
        }
    }
}

/// An angle together with its sine and cosine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseAngle<N> {
    pub angle: N,
    pub sin: N,
    pub cos: N,
}

impl<N: Number> PhaseAngle<N> {
    pub fn new(angle: N) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { angle, sin, cos }
    }
}

impl<N: Number> Default for PhaseAngle<N> {
    fn default() -> Self {
        Self {
            angle: N::zero(),
            sin: N::zero(),
            cos: N::one(),
        }
    }
}

/// Wrap `angle` into `[min, max)`
pub fn normalize_angle<N: Number>(angle: N, min: N, max: N) -> N {
    debug_assert!(max > min);

    // Reduce both ends first so Q16 cannot saturate on `angle - min`
    let span = max - min;
    let a = min + (angle.modulo(span) - min.modulo(span)).modulo(span);
    if a >= max {
        min
    } else {
        a
    }
}

/// Wrap `angle` into `[-π, π)`
pub fn wrap_pi<N: Number>(angle: N) -> N {
    normalize_angle(angle, -N::PI, N::PI)
}
