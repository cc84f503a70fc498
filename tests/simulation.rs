use std::cell::Cell;
use std::rc::Rc;

use apogee_control::aero::DragGrid;
use apogee_control::config::FlightConfig;
use apogee_control::controller::{AirbrakeCommand, BrakeState};
use apogee_control::predictor::{FitObserver, FitReport};
use apogee_control::sim::{
    FlightOutcome, Phase, RateLimitedActuator, SimulationError, ThrustCurve, drag_model, simulate,
};

fn fly(target: f64) -> FlightOutcome {
    let mut config = FlightConfig::default();
    config.controller.target_apogee_m = target;
    let drag = drag_model(&config.vehicle).expect("drag model");
    simulate(&config, &drag, None).expect("flight")
}

#[test]
fn controller_lands_between_clean_and_fully_braked_flights() {
    let clean = fly(1.0e6);
    let braked = fly(0.0);
    assert!(clean.commands.iter().all(|c| c.command == AirbrakeCommand::Retract));
    assert_eq!(braked.final_state, BrakeState::Extended);
    assert!(
        braked.apogee_m + 50.0 < clean.apogee_m,
        "airbrakes should cost altitude: braked {} clean {}",
        braked.apogee_m,
        clean.apogee_m
    );

    let target = 0.5 * (clean.apogee_m + braked.apogee_m);
    let controlled = fly(target);
    assert!(controlled.reached_apogee);
    assert!(
        controlled.apogee_m > braked.apogee_m && controlled.apogee_m < clean.apogee_m,
        "controlled {} should sit between {} and {}",
        controlled.apogee_m,
        braked.apogee_m,
        clean.apogee_m
    );
    let error = controlled.apogee_error_m().abs();
    assert!(error < target - braked.apogee_m, "controlled error {error}");
    assert!(error < clean.apogee_m - target, "controlled error {error}");
    assert!(controlled.commands.len() >= 2, "expected an extend and a retract");
}

#[test]
fn flight_records_follow_phase_order() {
    let outcome = fly(1400.0);
    let burnout = outcome.burnout_time_s.expect("motor burns out");
    assert!(burnout >= 3.1 - 1e-9);
    assert!(outcome.apogee_time_s > burnout);

    let first_coast = outcome
        .records
        .iter()
        .position(|r| r.phase == Phase::Coast)
        .expect("coast records");
    assert!(outcome.records[..first_coast].iter().all(|r| r.phase == Phase::Powered));
    assert!(outcome.records[first_coast..].iter().all(|r| r.phase == Phase::Coast));
    assert!(
        outcome.records[..first_coast]
            .iter()
            .all(|r| r.best_effort_m.is_none() && r.deployment == 0.0),
        "no estimates or braking while powered"
    );
    assert!(outcome.records[first_coast..].iter().all(|r| r.accel_m_s2 <= 0.0));
    assert!(outcome.records.iter().all(|r| (0.0..=1.0).contains(&r.deployment)));
    assert!(outcome.final_fit.is_some());
    assert!(outcome.last_strict_estimate().is_some());
}

#[test]
fn commands_are_recorded_with_times_after_burnout() {
    let outcome = fly(1400.0);
    let burnout = outcome.burnout_time_s.expect("burnout");
    assert!(!outcome.commands.is_empty());
    assert!(outcome.commands.iter().all(|c| c.time_s >= burnout));
    assert!(outcome.commands.windows(2).all(|w| w[0].command != w[1].command));
}

#[test]
fn fit_observer_sees_every_successful_fit() {
    let config = FlightConfig::default();
    let drag = drag_model(&config.vehicle).expect("drag model");
    let fits = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&fits);
    let observer: Box<dyn FitObserver> =
        Box::new(move |_: &FitReport| counter.set(counter.get() + 1));
    let outcome = simulate(&config, &drag, Some(observer)).expect("flight");

    let coast_steps = outcome
        .records
        .iter()
        .filter(|r| r.phase == Phase::Coast)
        .count();
    assert!(fits.get() > 0);
    assert!(fits.get() <= coast_steps.saturating_sub(19));
}

#[test]
fn time_limit_stops_before_apogee() {
    let mut config = FlightConfig::default();
    config.simulation.max_time_s = 5.0;
    let drag = DragGrid::uniform(0.45, 0.8);
    let outcome = simulate(&config, &drag, None).expect("flight");
    assert!(!outcome.reached_apogee);
    assert_eq!(outcome.records.len(), 500);
}

#[test]
fn underpowered_vehicle_never_leaves_the_pad() {
    let mut config = FlightConfig::default();
    config.vehicle.thrust_curve = vec![(0.0, 100.0), (2.0, 100.0)];
    let drag = DragGrid::uniform(0.45, 0.8);
    assert!(matches!(
        simulate(&config, &drag, None),
        Err(SimulationError::NeverLeftPad)
    ));
}

#[test]
fn invalid_parameters_are_rejected() {
    let drag = DragGrid::uniform(0.45, 0.8);

    let mut config = FlightConfig::default();
    config.simulation.dt_s = 0.0;
    assert!(matches!(
        simulate(&config, &drag, None),
        Err(SimulationError::InvalidTimeStep(_))
    ));

    let mut config = FlightConfig::default();
    config.vehicle.reference_area_m2 = -1.0;
    assert!(matches!(
        simulate(&config, &drag, None),
        Err(SimulationError::InvalidReferenceArea(_))
    ));

    let mut config = FlightConfig::default();
    config.vehicle.thrust_curve = vec![(1.0, 500.0), (0.5, 500.0)];
    assert!(matches!(
        simulate(&config, &drag, None),
        Err(SimulationError::InvalidThrustCurve(_))
    ));
}

#[test]
fn thrust_curve_interpolates_and_ends_at_zero() {
    let curve = ThrustCurve::new(vec![(0.0, 1000.0), (2.0, 500.0), (2.5, 0.0)]).expect("curve");
    assert_eq!(curve.thrust_at(0.0), 1000.0);
    assert!((curve.thrust_at(1.0) - 750.0).abs() < 1e-12);
    assert!((curve.thrust_at(2.25) - 250.0).abs() < 1e-12);
    assert_eq!(curve.thrust_at(3.0), 0.0);
    assert_eq!(curve.burn_time_s(), 2.5);
}

#[test]
fn actuator_slews_at_its_rate() {
    let mut actuator = RateLimitedActuator::new(2.0);
    for _ in 0..10 {
        actuator.step(1.0, 0.01);
    }
    assert!((actuator.position() - 0.2).abs() < 1e-12);
    for _ in 0..100 {
        actuator.step(1.0, 0.01);
    }
    assert_eq!(actuator.position(), 1.0);
    actuator.step(0.0, 0.1);
    assert!((actuator.position() - 0.8).abs() < 1e-12);
    actuator.step(f64::NAN, 0.1);
    assert!((actuator.position() - 0.8).abs() < 1e-12, "NaN setpoint holds position");
}
