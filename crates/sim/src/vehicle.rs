//! Mass and thrust properties of the simulated vehicle.

use apogee_config::VehicleConfig;

use crate::SimulationError;

/// Piecewise-linear thrust curve; zero outside its time span.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrustCurve {
    points: Vec<(f64, f64)>,
}

impl ThrustCurve {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, SimulationError> {
        if points
            .iter()
            .any(|&(t, f)| !(t.is_finite() && f.is_finite()) || t < 0.0 || f < 0.0)
        {
            return Err(SimulationError::InvalidThrustCurve(
                "points must be finite with non-negative time and thrust",
            ));
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(SimulationError::InvalidThrustCurve(
                "times must be strictly ascending",
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Time of the last curve point; zero for an empty curve.
    pub fn burn_time_s(&self) -> f64 {
        self.points.last().map(|&(t, _)| t).unwrap_or(0.0)
    }

    pub fn thrust_at(&self, time_s: f64) -> f64 {
        let Some(&(first_t, first_f)) = self.points.first() else {
            return 0.0;
        };
        if time_s < first_t || time_s > self.burn_time_s() {
            return 0.0;
        }
        if self.points.len() == 1 {
            return first_f;
        }
        let upper = self
            .points
            .partition_point(|&(t, _)| t <= time_s)
            .clamp(1, self.points.len() - 1);
        let (t0, f0) = self.points[upper - 1];
        let (t1, f1) = self.points[upper];
        let frac = ((time_s - t0) / (t1 - t0)).clamp(0.0, 1.0);
        f0 + frac * (f1 - f0)
    }
}

/// Validated vehicle model used by the flight loop.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub name: String,
    pub dry_mass_kg: f64,
    pub propellant_mass_kg: f64,
    pub reference_area_m2: f64,
    pub actuator_rate_per_s: f64,
    pub thrust: ThrustCurve,
}

impl Vehicle {
    pub fn from_config(config: &VehicleConfig) -> Result<Self, SimulationError> {
        if !(config.dry_mass_kg.is_finite() && config.dry_mass_kg > 0.0) {
            return Err(SimulationError::InvalidMass(config.dry_mass_kg));
        }
        if !(config.propellant_mass_kg.is_finite() && config.propellant_mass_kg >= 0.0) {
            return Err(SimulationError::InvalidMass(config.propellant_mass_kg));
        }
        if !(config.reference_area_m2.is_finite() && config.reference_area_m2 > 0.0) {
            return Err(SimulationError::InvalidReferenceArea(
                config.reference_area_m2,
            ));
        }
        if !(config.actuator_rate_per_s.is_finite() && config.actuator_rate_per_s > 0.0) {
            return Err(SimulationError::InvalidActuatorRate(
                config.actuator_rate_per_s,
            ));
        }
        Ok(Self {
            name: config.name.clone(),
            dry_mass_kg: config.dry_mass_kg,
            propellant_mass_kg: config.propellant_mass_kg,
            reference_area_m2: config.reference_area_m2,
            actuator_rate_per_s: config.actuator_rate_per_s,
            thrust: ThrustCurve::new(config.thrust_curve.clone())?,
        })
    }

    pub fn initial_mass_kg(&self) -> f64 {
        self.dry_mass_kg + self.propellant_mass_kg
    }

    /// Mass with propellant depleted linearly over the burn.
    pub fn mass_at(&self, time_s: f64) -> f64 {
        let burn = self.thrust.burn_time_s();
        if burn <= 0.0 {
            return self.dry_mass_kg;
        }
        let remaining = (1.0 - time_s / burn).clamp(0.0, 1.0);
        self.dry_mass_kg + self.propellant_mass_kg * remaining
    }
}
