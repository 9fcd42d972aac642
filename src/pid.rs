use tap::Pipe;

use crate::num::Number;

/// PI controller with integral clamping.
///
/// Runs once per control period with a fixed step, so the period is folded
/// into `ki`.
#[derive(Clone, Copy, Debug)]
pub struct PiController<N> {
    kp: N,
    ki: N,

    /// Output and integral saturation
    min: N,
    max: N,

    /// State
    state: PiState<N>,
}

#[derive(Clone, Copy, Debug)]
struct PiState<N> {
    /// Integral
    integral: N,

    /// Previous output
    output: N,
}

impl<N: Number> PiController<N> {
    pub fn new() -> Self {
        Self {
            kp: N::zero(),
            ki: N::zero(),
            min: -N::one(),
            max: N::one(),
            state: PiState {
                integral: N::zero(),
                output: N::zero(),
            },
        }
    }

    pub fn kp(mut self, kp: N) -> Self {
        self.kp = kp;
        self
    }

    pub fn ki(mut self, ki: N) -> Self {
        self.ki = ki;
        self
    }

    pub fn limit(mut self, min: N, max: N) -> Self {
        self.set_limit(min, max);
        self
    }

    /// Change the saturation without touching the state
    pub fn set_limit(&mut self, min: N, max: N) {
        debug_assert!(min <= max);
        self.min = min;
        self.max = max;
    }

    pub fn update(&mut self, err: N) -> N {
        let p = self.kp.sat_mul(err);
        let i = self
            .state
            .integral
            .sat_add(self.ki.sat_mul(err))
            .clamp(self.min, self.max);

        let output = p.sat_add(i).pipe(|out| out.clamp(self.min, self.max));

        self.state.integral = i;
        self.state.output = output;

        output
    }

    pub fn reset(&mut self) {
        self.state.integral = N::zero();
        self.state.output = N::zero();
    }

    pub fn integral(&self) -> N {
        self.state.integral
    }

    pub fn output(&self) -> N {
        self.state.output
    }
}

impl<N: Number> Default for PiController<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{f, num::Q16};

    #[test]
    fn proportional_only() {
        let mut pi = PiController::new().kp(1.0f32).limit(-10.0, 10.0);
        assert_eq!(pi.update(5.0), 5.0);
        assert_eq!(pi.update(20.0), 10.0);
    }

    #[test]
    fn integral_accumulates_and_clamps() {
        let mut pi = PiController::new().ki(f!("0.5")).limit(Q16::ZERO, f!("2"));
        assert_eq!(pi.update(Q16::ONE), f!("0.5"));
        assert_eq!(pi.update(Q16::ONE), Q16::ONE);
        for _ in 0..10 {
            pi.update(Q16::ONE);
        }
        assert_eq!(pi.integral(), f!("2"));

        // no windup: one negative step comes straight off the limit
        assert_eq!(pi.update(-Q16::ONE), f!("1.5"));

        pi.reset();
        assert_eq!(pi.output(), Q16::ZERO);
    }
}
