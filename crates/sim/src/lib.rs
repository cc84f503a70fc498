//! Vertical flight model that hosts the apogee predictor and airbrake controller.
//!
//! The loop integrates a single-axis rocket with a semi-implicit Euler step. Once the
//! motor has burnt out, every step feeds the predictor, lets the controller pick a
//! setpoint and slews the airbrake actuator before the forces of the next step are
//! evaluated.

pub mod actuator;
pub mod vehicle;

use apogee_aero::{DragCoefficientSource, DragGrid, GridError, drag_force, isa};
use apogee_config::{FlightConfig, VehicleConfig};
use apogee_controller::{BangBangController, BrakeState, CommandEvent, CommandLog};
use apogee_core::StepInput;
use apogee_core::gravity::local_gravity;
use apogee_predictor::{ApogeePredictor, CurveFit, FitObserver};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use actuator::RateLimitedActuator;
pub use vehicle::{ThrustCurve, Vehicle};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("max_time_s must be positive and finite, got {0}")]
    InvalidDuration(f64),
    #[error("vehicle mass must be finite and positive, got {0}")]
    InvalidMass(f64),
    #[error("reference area must be positive, got {0}")]
    InvalidReferenceArea(f64),
    #[error("actuator rate must be positive, got {0}")]
    InvalidActuatorRate(f64),
    #[error("invalid thrust curve: {0}")]
    InvalidThrustCurve(&'static str),
    #[error("no drag coefficient for mach {mach:.3}, deployment {deployment:.3}")]
    DragUnavailable { mach: f64, deployment: f64 },
    #[error("vehicle never left the pad (thrust below weight)")]
    NeverLeftPad,
    #[error("failed to load drag table: {0}")]
    DragTable(#[from] GridError),
}

/// Flight phase of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Powered,
    Coast,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Powered => "powered",
            Self::Coast => "coast",
        }
    }
}

/// State and estimates at one physics step, before integration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub time_s: f64,
    pub phase: Phase,
    pub altitude_m: f64,
    pub velocity_m_s: f64,
    pub accel_m_s2: f64,
    pub mass_kg: f64,
    pub mach: f64,
    pub drag_coefficient: f64,
    /// Actuator deployment used for this step's forces.
    pub deployment: f64,
    pub setpoint: f64,
    pub brake_state: BrakeState,
    pub best_effort_m: Option<f64>,
    pub strict_m: Option<f64>,
    pub ballistic_m: Option<f64>,
}

/// Result of a complete simulated flight.
#[derive(Debug, Clone)]
pub struct FlightOutcome {
    pub vehicle: String,
    pub target_apogee_m: f64,
    pub records: Vec<StepRecord>,
    pub apogee_m: f64,
    pub apogee_time_s: f64,
    /// `false` when `max_time_s` elapsed before the vehicle started descending.
    pub reached_apogee: bool,
    pub burnout_time_s: Option<f64>,
    pub commands: Vec<CommandEvent>,
    pub final_fit: Option<CurveFit>,
    pub final_state: BrakeState,
}

impl FlightOutcome {
    /// `apogee - target`.
    pub fn apogee_error_m(&self) -> f64 {
        self.apogee_m - self.target_apogee_m
    }

    /// Last strict estimate issued during the flight.
    pub fn last_strict_estimate(&self) -> Option<f64> {
        self.records.iter().rev().find_map(|r| r.strict_m)
    }
}

/// Drag model for a vehicle: its CSV table when one is configured, otherwise a uniform
/// table from the base and airbrake coefficients.
pub fn drag_model(vehicle: &VehicleConfig) -> Result<DragGrid, SimulationError> {
    match &vehicle.drag_table {
        Some(path) => Ok(DragGrid::from_csv(path, Default::default())?),
        None => Ok(DragGrid::uniform(
            vehicle.base_drag_coefficient,
            vehicle.airbrake_drag_coefficient,
        )),
    }
}

/// Fly `config` from the pad to apogee (or `max_time_s`).
pub fn simulate(
    config: &FlightConfig,
    drag: &dyn DragCoefficientSource,
    observer: Option<Box<dyn FitObserver>>,
) -> Result<FlightOutcome, SimulationError> {
    let sim = &config.simulation;
    if !(sim.dt_s.is_finite() && sim.dt_s > 0.0) {
        return Err(SimulationError::InvalidTimeStep(sim.dt_s));
    }
    if !(sim.max_time_s.is_finite() && sim.max_time_s > 0.0) {
        return Err(SimulationError::InvalidDuration(sim.max_time_s));
    }
    let vehicle = Vehicle::from_config(&config.vehicle)?;
    let dt = sim.dt_s;
    let pad = sim.launch_altitude_m;
    let burn_end = vehicle.thrust.burn_time_s();

    let mut predictor = ApogeePredictor::new(config.predictor.clone());
    predictor.set_observer(observer);
    let mut controller =
        BangBangController::with_commands(config.controller.clone(), CommandLog::new());
    let mut actuator = RateLimitedActuator::new(vehicle.actuator_rate_per_s);

    info!(
        vehicle = %vehicle.name,
        target = controller.config().target_apogee_m,
        dt,
        burn_time = burn_end,
        "flight started"
    );

    let max_steps = (sim.max_time_s / dt).ceil() as usize;
    let mut records = Vec::with_capacity(max_steps.min(100_000));
    let mut commands = Vec::new();
    let mut altitude = pad;
    let mut velocity = 0.0_f64;
    let mut apogee = pad;
    let mut apogee_time = 0.0;
    let mut burnout_time: Option<f64> = None;
    let mut reached_apogee = false;

    for step in 0..max_steps {
        let time = step as f64 * dt;
        let mass = vehicle.mass_at(time);
        let thrust = vehicle.thrust.thrust_at(time);
        let deployment = actuator.position();

        let atmosphere = isa(altitude);
        let mach = velocity.abs() / atmosphere.speed_of_sound_m_s;
        let cd = drag
            .value(mach, deployment)
            .ok_or(SimulationError::DragUnavailable { mach, deployment })?;
        let drag_n = drag_force(
            atmosphere.density_kg_m3,
            velocity,
            cd,
            vehicle.reference_area_m2,
        );
        let mut accel = (thrust - drag_n * velocity.signum()) / mass - local_gravity(altitude);

        let phase = if burnout_time.is_some() || (time >= burn_end && accel <= 0.0) {
            Phase::Coast
        } else {
            Phase::Powered
        };

        if phase == Phase::Powered && altitude <= pad && velocity <= 0.0 && accel < 0.0 {
            // Resting on the pad.
            accel = 0.0;
        }

        let mut best_effort = None;
        let mut strict = None;
        let mut ballistic = None;
        if phase == Phase::Coast {
            if burnout_time.is_none() {
                if altitude <= pad {
                    return Err(SimulationError::NeverLeftPad);
                }
                info!(time, altitude, velocity, "burnout; coast phase started");
                burnout_time = Some(time);
            }
            predictor.update(&StepInput::new(time, dt, accel, altitude, velocity));
            if controller.update_and_gate_flexible(&predictor, time) {
                if let Some(event) = controller.last_command() {
                    commands.push(*event);
                }
            }
            best_effort = predictor.apogee_best_effort();
            strict = predictor.prediction_if_ready();
            ballistic = predictor.ballistic_apogee();
        }

        let setpoint = controller.current_setpoint();
        records.push(StepRecord {
            time_s: time,
            phase,
            altitude_m: altitude,
            velocity_m_s: velocity,
            accel_m_s2: accel,
            mass_kg: mass,
            mach,
            drag_coefficient: cd,
            deployment,
            setpoint,
            brake_state: controller.state(),
            best_effort_m: best_effort,
            strict_m: strict,
            ballistic_m: ballistic,
        });
        actuator.step(setpoint, dt);

        velocity += accel * dt;
        altitude += velocity * dt;
        if altitude > apogee {
            apogee = altitude;
            apogee_time = time + dt;
        }

        if phase == Phase::Coast && velocity <= 0.0 {
            reached_apogee = true;
            break;
        }
    }

    if reached_apogee {
        info!(
            apogee,
            time = apogee_time,
            commands = commands.len(),
            "apogee reached"
        );
    } else {
        warn!(
            altitude,
            velocity,
            max_time = sim.max_time_s,
            "simulation ended before apogee"
        );
    }
    debug!(
        samples = predictor.sample_count(),
        converged = predictor.is_converged(),
        "predictor state at end of flight"
    );

    Ok(FlightOutcome {
        vehicle: vehicle.name,
        target_apogee_m: controller.config().target_apogee_m,
        records,
        apogee_m: apogee,
        apogee_time_s: apogee_time,
        reached_apogee,
        burnout_time_s: burnout_time,
        commands,
        final_fit: predictor.fit().copied(),
        final_state: controller.state(),
    })
}
