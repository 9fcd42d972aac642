use core::ops::{Add, Neg, Sub};

use crate::num::Number;

/// Direct/quadrature pair in the rotor reference frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DqFrame<N> {
    pub d: N,
    pub q: N,
}

impl<N: Number> DqFrame<N> {
    pub fn new(d: N, q: N) -> Self {
        Self { d, q }
    }

    pub fn zero() -> Self {
        Self::new(N::zero(), N::zero())
    }

    pub fn magnitude(&self) -> N {
        self.d
            .sat_mul(self.d)
            .sat_add(self.q.sat_mul(self.q))
            .sqrt()
    }

    /// Scale the vector down so its magnitude does not exceed `max`,
    /// keeping its direction.
    pub fn saturate(&mut self, max: N) {
        let mag = self.magnitude();
        if mag > max && mag > N::zero() {
            let scale = max.sat_div(mag);
            self.d = self.d.sat_mul(scale);
            self.q = self.q.sat_mul(scale);
        }
    }
}

impl<N: Number> Add for DqFrame<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.d.sat_add(rhs.d), self.q.sat_add(rhs.q))
    }
}

impl<N: Number> Sub for DqFrame<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.d.sat_sub(rhs.d), self.q.sat_sub(rhs.q))
    }
}

impl<N: Number> Neg for DqFrame<N> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.d, -self.q)
    }
}
