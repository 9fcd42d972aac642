//! Motor start against a simulated motor: align the Hall sensor, identify
//! the phase parameters, then ramp up with feed-forward compensation.

use std::cell::Cell;

use core::f32::consts::{FRAC_PI_2, FRAC_PI_3, PI, TAU};

use foc_routines::{
    cordic::{Cordic, SoftCordic},
    motor::{feedforward, FocMode, MotorPhy, Ramp},
    routine::{
        AlignCfg, FocRoutine, IdentCfg, NoHooks, RoutineCfg, RoutineFinal, RoutineIn,
        RoutineOps, RoutineOut, RoutineState, RunStatus, ROUTINE_ALIGN_F32, ROUTINE_ALIGN_Q16,
        ROUTINE_IDENT_F32, ROUTINE_IDENT_Q16,
    },
    sensor::{AngleSensor, Hall, HallCfg, HallDevice, SensorHooks},
    util::{Direction, DqFrame},
    Number, Q16,
};

const RES: f32 = 0.5;
const IND: f32 = 0.002;
const PER: f32 = 1.0 / 8192.0;
const VBUS: f32 = 24.0;
/// Hall sensors sit this far ahead of electrical zero
const MOUNT: f32 = 0.3;

const SEQ_120: [u8; 6] = [0b001, 0b011, 0b010, 0b110, 0b100, 0b101];

/// Rotor snapping to the stator field plus a locked-rotor d-axis RL load
#[derive(Default)]
struct Motor {
    theta: f32,
    id: f32,
    locked: bool,
}

impl Motor {
    fn hall_code(&self) -> u8 {
        let a = (self.theta + MOUNT).rem_euclid(TAU);
        SEQ_120[((a / FRAC_PI_3) as usize).min(5)]
    }

    fn apply<N: Number>(&mut self, out: &RoutineOut<N>) {
        let (vd, vq) = match out.mode {
            FocMode::Voltage => (out.dq_ref.d.to_f32(), out.dq_ref.q.to_f32()),
            _ => (0.0, 0.0),
        };

        if !self.locked && (vd != 0.0 || vq != 0.0) {
            self.theta = out.angle.to_f32() + vq.atan2(vd);
        }
        self.id += (vd - RES * self.id) * PER / IND;
    }
}

struct Wires<'a>(&'a Cell<u8>);

impl HallDevice for Wires<'_> {
    fn position(&mut self) -> Result<u8, i32> {
        Ok(self.0.get())
    }
}

fn startup<N: Number>(align_ops: &RoutineOps<N>, ident_ops: &RoutineOps<N>) {
    let wires = Cell::new(0);
    let mut motor = Motor::default();
    wires.set(motor.hall_code());

    let hall_cfg = HallCfg {
        per: N::from_f32(PER),
        ..HallCfg::default()
    };
    let mut hall = Hall::new(Wires(&wires), hall_cfg).unwrap();
    let cordic: &mut dyn Cordic<N> = &mut SoftCordic;
    let vmax = N::from_f32(VBUS / 3f32.sqrt());
    let vbus = N::from_f32(VBUS);
    let mut out = RoutineOut::idle();

    // Align the Hall sensor
    let mut align = align_ops.instance();
    align.init().unwrap();
    align
        .configure(RoutineCfg::Align(AlignCfg {
            volt: N::from_f32(1.0),
            offset_steps: 200,
            index: false,
        }))
        .unwrap();

    let mut done = false;
    for _ in 0..50_000 {
        let angle = hall.run().unwrap();
        let input = RoutineIn {
            angle,
            vbus,
            ..RoutineIn::default()
        };
        let status = align
            .run(&input, &mut SensorHooks::new(&mut hall), &mut out)
            .unwrap();
        cordic.dqsat(&mut out.dq_ref, vmax).unwrap();
        motor.apply(&out);
        wires.set(motor.hall_code());

        if status == RunStatus::Done {
            done = true;
            break;
        }
    }
    assert!(done, "align did not finish");

    let RoutineFinal::Align(Some(aligned)) = align.final_data() else {
        panic!("no alignment result");
    };
    assert_eq!(aligned.dir, Direction::Cw);
    assert_eq!(hall.dir(), Direction::Cw);

    let angle = hall.run().unwrap().to_f32();
    let err = (angle - motor.theta + PI).rem_euclid(TAU) - PI;
    assert!(err.abs() < FRAC_PI_3, "hall {angle} rotor {}", motor.theta);
    align.deinit();

    // Identify resistance and inductance with the rotor held
    motor.locked = true;
    let mut ident = ident_ops.instance();
    ident.init().unwrap();
    ident
        .configure(RoutineCfg::Ident(IdentCfg {
            per: N::from_f32(PER),
            res_current: N::from_f32(2.0),
            ind_volt: N::from_f32(2.0),
            res_steps: 2000,
            ind_steps: 2000,
            idle_steps: 100,
        }))
        .unwrap();
    assert_eq!(ident.state(), RoutineState::Ready);

    for step in 0.. {
        if ident.state() == RoutineState::Done {
            break;
        }
        assert!(step < 10_000, "ident did not finish");

        let input = RoutineIn {
            idq: DqFrame::new(N::from_f32(motor.id), N::zero()),
            vbus,
            ..RoutineIn::default()
        };
        ident.run(&input, &mut NoHooks, &mut out).unwrap();
        cordic.dqsat(&mut out.dq_ref, vmax).unwrap();
        motor.apply(&out);
    }

    let RoutineFinal::Ident(params) = ident.final_data() else {
        panic!("no identification result");
    };
    assert!(params.ready);
    assert!((params.res.to_f32() - RES).abs() / RES < 0.05);
    assert!((params.ind.to_f32() - IND).abs() / IND < 0.05);
    ident.deinit();

    // Ramp the velocity reference with feed-forward on top
    let flux = N::from_f32(0.01);
    let phy = MotorPhy::new(7, params.res, params.ind, flux).unwrap();
    let mut ramp = Ramp::new();
    ramp.init(
        N::from_f32(PER),
        N::from_f32(0.1),
        N::from_int(200),
        N::from_int(400),
    )
    .unwrap();

    let mut phase = Default::default();
    cordic.angle(&mut phase, N::from_f32(FRAC_PI_2), N::one()).unwrap();
    assert!((phase.sin.to_f32() - 1.0).abs() < 1e-3);

    // Rate limited steps, plus one final snap of at most the threshold
    let max_step = (200.0 * PER).max(0.1);
    let idq = DqFrame::new(N::zero(), N::from_f32(1.5));
    let target = N::from_int(50);
    let mut vel = N::zero();
    let mut steps = 0;
    while vel != target {
        let next = ramp.run(target, vel).unwrap();
        assert!((next.to_f32() - vel.to_f32()).abs() <= max_step + 1e-3);
        vel = next;
        steps += 1;
        assert!(steps < 5_000, "ramp stalled at {vel:?}");

        let vdq = feedforward(&phy, &idq, vel);
        assert!(vdq.q <= N::zero());
        assert!(vdq.d >= N::zero());
    }

    let vdq = feedforward(&phy, &idq, target);
    let want_q = -(50.0 * 0.01);
    let want_d = 50.0 * params.ind.to_f32() * 1.5;
    assert!((vdq.q.to_f32() - want_q).abs() < 5e-3);
    assert!((vdq.d.to_f32() - want_d).abs() < 5e-3);
}

#[test]
fn startup_float() {
    startup::<f32>(&ROUTINE_ALIGN_F32, &ROUTINE_IDENT_F32);
}

#[test]
fn startup_fixed() {
    startup::<Q16>(&ROUTINE_ALIGN_Q16, &ROUTINE_IDENT_Q16);
}
