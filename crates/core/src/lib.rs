//! Core constants, kinematic inputs, and shared primitives for the apogee control workspace.

/// Physical constants expressed in SI units.
pub mod constants {
    /// Standard gravity at Earth's surface (m/s²).
    pub const G0: f64 = 9.80665;
    /// Mean Earth radius used for the inverse-square gravity model (m).
    pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
}

/// Altitude-dependent gravity.
pub mod gravity {
    use super::constants::{EARTH_RADIUS_M, G0};

    /// Local gravitational acceleration magnitude at `altitude_m` above the reference radius.
    #[inline]
    pub fn local_gravity(altitude_m: f64) -> f64 {
        let r = EARTH_RADIUS_M + altitude_m.max(-EARTH_RADIUS_M * 0.5);
        let ratio = EARTH_RADIUS_M / r;
        G0 * ratio * ratio
    }
}

/// Closed-form apex estimates.
pub mod ballistic {
    use super::gravity::local_gravity;

    /// Drag-free apex reached from `altitude_m` while climbing at `velocity_m_s`.
    ///
    /// Gravity is evaluated at the current altitude, so the result is an upper bound on
    /// the apex of any trajectory that also loses energy to drag. A non-positive velocity
    /// means the apex has already been reached.
    pub fn ballistic_apogee(altitude_m: f64, velocity_m_s: f64) -> f64 {
        if velocity_m_s <= 0.0 {
            return altitude_m;
        }
        altitude_m + velocity_m_s * velocity_m_s / (2.0 * local_gravity(altitude_m))
    }
}

/// Kinematic state handed to the predictor and controller once per physics step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    /// Simulation time at the end of this step (s).
    pub time_s: f64,
    /// Step length (s).
    pub dt_s: f64,
    /// Vertical acceleration including gravity, positive up (m/s²).
    pub accel_m_s2: f64,
    /// Altitude (m).
    pub altitude_m: f64,
    /// Vertical velocity, positive up (m/s).
    pub velocity_m_s: f64,
}

impl StepInput {
    pub fn new(time_s: f64, dt_s: f64, accel_m_s2: f64, altitude_m: f64, velocity_m_s: f64) -> Self {
        Self {
            time_s,
            dt_s,
            accel_m_s2,
            altitude_m,
            velocity_m_s,
        }
    }
}
