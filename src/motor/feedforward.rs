//! Voltage feed-forward for the current loop.
//!
//! Decouples the d/q axes and cancels back-EMF from the motor model. The
//! caller subtracts the result from its voltage reference, which is why the
//! q term carries the negative sign.

use crate::{motor::MotorPhy, num::Number, util::DqFrame};

/// Compensation voltage for the present current `idq` and electrical
/// velocity `vel_now` [rad/s]:
///
/// ```text
/// q = -(vel_now * (flux_link + ind * idq.d))
/// d =   vel_now * ind * idq.q
/// ```
pub fn feedforward<N: Number>(phy: &MotorPhy<N>, idq: &DqFrame<N>, vel_now: N) -> DqFrame<N> {
    debug_assert!(phy.ind() > N::zero());

    let q = -vel_now.sat_mul(phy.flux_link().sat_add(phy.ind().sat_mul(idq.d)));
    let d = vel_now.sat_mul(phy.ind()).sat_mul(idq.q);

    DqFrame { d, q }
}

/// [`feedforward`] writing into the caller's frame
pub fn feedforward_into<N: Number>(
    phy: &MotorPhy<N>,
    idq: &DqFrame<N>,
    vel_now: N,
    vdq_comp: &mut DqFrame<N>,
) {
    *vdq_comp = feedforward(phy, idq, vel_now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Q16;

    fn phy_f32() -> MotorPhy<f32> {
        MotorPhy::new(7, 0.5, 0.002, 0.1).unwrap()
    }

    fn phy_q16() -> MotorPhy<Q16> {
        MotorPhy::new(
            7,
            Q16::from_f32(0.5),
            Q16::from_f32(0.002),
            Q16::from_f32(0.1),
        )
        .unwrap()
    }

    #[test]
    fn worked_example() {
        let idq = DqFrame::new(1.0, 0.5);
        let mut out = DqFrame::zero();
        feedforward_into(&phy_f32(), &idq, 100.0, &mut out);

        assert!((out.q - -10.2).abs() < 1e-4);
        assert!((out.d - 0.1).abs() < 1e-6);
    }

    #[test]
    fn worked_example_fixed() {
        let idq = DqFrame::new(Q16::ONE, Q16::from_f32(0.5));
        let out = feedforward(&phy_q16(), &idq, Q16::from_int(100));

        // 0.002 is only representable to ~1.5e-5, 100x that shows up here
        assert!((out.q.to_f32() - -10.2).abs() < 5e-3);
        assert!((out.d.to_f32() - 0.1).abs() < 5e-3);
    }

    #[test]
    fn zero_velocity_gives_zero() {
        let out = feedforward(&phy_f32(), &DqFrame::new(3.0, -2.0), 0.0);
        assert_eq!(out.d, 0.0);
        assert_eq!(out.q.abs(), 0.0);
    }

    #[test]
    fn antisymmetric_in_velocity() {
        let phy = phy_f32();
        for (d, q, v) in [(1.0f32, 0.5, 100.0), (-2.0, 3.0, 12.5), (0.0, -1.0, 731.0)] {
            let idq = DqFrame::new(d, q);
            let a = feedforward(&phy, &idq, v);
            let b = feedforward(&phy, &idq, -v);
            assert_eq!(b, -a);
        }

        let phy = phy_q16();
        let ulp = Q16::RESOLUTION.to_f32();
        for (d, q, v) in [(1.0f32, 0.5, 100.0), (-2.0, 3.0, 12.5)] {
            let idq = DqFrame::new(Q16::from_f32(d), Q16::from_f32(q));
            let a = feedforward(&phy, &idq, Q16::from_f32(v));
            let b = feedforward(&phy, &idq, Q16::from_f32(-v));
            // the rounding of `vel * ind` is scaled by `q` in the d term
            assert!((a.d.to_f32() + b.d.to_f32()).abs() <= (2.0 + q.abs()) * ulp);
            assert!((a.q.to_f32() + b.q.to_f32()).abs() <= 2.0 * ulp);
        }
    }

    #[test]
    fn fixed_matches_float_for_representable_inputs() {
        // binary fractions are exact in both kinds
        let pf = MotorPhy::new(4, 0.25f32, 0.0078125, 0.0625).unwrap();
        let pq = MotorPhy::new(
            4,
            Q16::from_f32(0.25),
            Q16::from_f32(0.0078125),
            Q16::from_f32(0.0625),
        )
        .unwrap();

        let idq = DqFrame::new(1.5f32, -0.75);
        let idq_q = DqFrame::new(Q16::from_f32(1.5), Q16::from_f32(-0.75));
        let of = feedforward(&pf, &idq, 64.0);
        let oq = feedforward(&pq, &idq_q, Q16::from_int(64));

        // three multiplies and one add in the chain
        let bound = 4.0 * Q16::RESOLUTION.to_f32();
        assert!((oq.d.to_f32() - of.d).abs() <= bound);
        assert!((oq.q.to_f32() - of.q).abs() <= bound);
    }

    #[test]
    fn saturates_in_fixed_point() {
        let phy = phy_q16();
        let out = feedforward(&phy, &DqFrame::new(Q16::ZERO, Q16::MAX), Q16::MAX);
        assert_eq!(out.d, Q16::MAX);
    }
}
