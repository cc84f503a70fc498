//! First-order airbrake actuator model.

/// Airbrake deployment that slews toward its setpoint at a bounded rate.
///
/// Deployment is a fraction in `[0, 1]`; a rate of `r` covers full travel in `1 / r` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitedActuator {
    position: f64,
    rate_per_s: f64,
}

impl RateLimitedActuator {
    pub fn new(rate_per_s: f64) -> Self {
        Self {
            position: 0.0,
            rate_per_s: rate_per_s.max(0.0),
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn rate_per_s(&self) -> f64 {
        self.rate_per_s
    }

    /// Move toward `setpoint` for `dt_s` seconds and return the new deployment.
    pub fn step(&mut self, setpoint: f64, dt_s: f64) -> f64 {
        let target = if setpoint.is_finite() {
            setpoint.clamp(0.0, 1.0)
        } else {
            self.position
        };
        let max_travel = self.rate_per_s * dt_s.max(0.0);
        let delta = (target - self.position).clamp(-max_travel, max_travel);
        self.position = (self.position + delta).clamp(0.0, 1.0);
        self.position
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
    }
}
