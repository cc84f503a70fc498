//! Two-position airbrake state machine with asymmetric hysteresis and time-gated estimate
//! selection.

use apogee_config::ControllerConfig;
use apogee_predictor::ApogeeSource;
use tracing::{debug, info};

use crate::commands::{AirbrakeCommand, AirbrakeCommands, CommandEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeState {
    /// No decision has been made since construction or reset.
    Unknown,
    Retracted,
    Extended,
}

impl BrakeState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Retracted => "Retracted",
            Self::Extended => "Extended",
        }
    }

    /// Actuator setpoint held for this state.
    pub fn setpoint(self) -> f64 {
        match self {
            Self::Extended => 1.0,
            Self::Unknown | Self::Retracted => 0.0,
        }
    }
}

/// Which predictor output drove a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateMode {
    /// Converged estimate with bounded parameter uncertainty.
    Strict,
    /// Early estimate, only trusted inside the coast window.
    BestEffort,
}

impl EstimateMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::BestEffort => "best_effort",
        }
    }
}

/// Inputs and outcome of the most recent step that had a usable estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub time_s: f64,
    pub mode: EstimateMode,
    pub estimate_m: f64,
    /// `estimate - target`.
    pub error_m: f64,
    /// State the hysteresis rule asked for (may differ from the applied state under dwell).
    pub desired: BrakeState,
}

pub struct BangBangController<C = ()> {
    config: ControllerConfig,
    state: BrakeState,
    coast_anchor_s: Option<f64>,
    last_flip_s: Option<f64>,
    last_decision: Option<Decision>,
    last_command: Option<CommandEvent>,
    commands: C,
}

impl BangBangController<()> {
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_commands(config, ())
    }
}

impl<C: AirbrakeCommands> BangBangController<C> {
    /// Build a controller forwarding its edges to `commands`. Invalid windows are clamped.
    pub fn with_commands(config: ControllerConfig, commands: C) -> Self {
        Self {
            config: config.sanitized(),
            state: BrakeState::Unknown,
            coast_anchor_s: None,
            last_flip_s: None,
            last_decision: None,
            last_command: None,
            commands,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> BrakeState {
        self.state
    }

    /// Setpoint of the last decision, held across steps without a usable estimate.
    pub fn current_setpoint(&self) -> f64 {
        self.state.setpoint()
    }

    pub fn coast_anchor_time(&self) -> Option<f64> {
        self.coast_anchor_s
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    pub fn last_command(&self) -> Option<&CommandEvent> {
        self.last_command.as_ref()
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    pub fn into_commands(self) -> C {
        self.commands
    }

    /// Latch the coast anchor explicitly; later calls are ignored until `reset`.
    pub fn notify_coast_latched(&mut self, time_s: f64) {
        if self.coast_anchor_s.is_none() {
            self.coast_anchor_s = Some(time_s);
            debug!(time = time_s, "coast anchor latched by host");
        }
    }

    pub fn reset(&mut self) {
        self.state = BrakeState::Unknown;
        self.coast_anchor_s = None;
        self.last_flip_s = None;
        self.last_decision = None;
        self.last_command = None;
    }

    /// Run one control step. Returns `true` only when a new command fired.
    pub fn update_and_gate_flexible<S>(&mut self, source: &S, current_time_s: f64) -> bool
    where
        S: ApogeeSource + ?Sized,
    {
        if self.coast_anchor_s.is_none() && source.sample_count() > 0 {
            self.coast_anchor_s = Some(current_time_s);
            debug!(time = current_time_s, "coast anchor latched");
        }
        let Some(anchor) = self.coast_anchor_s else {
            return false;
        };

        let Some((mode, estimate)) = self.select_estimate(source, current_time_s - anchor) else {
            return false;
        };
        if !estimate.is_finite() {
            return false;
        }

        let error = estimate - self.config.target_apogee_m;
        let desired = self.decide(error);
        self.last_decision = Some(Decision {
            time_s: current_time_s,
            mode,
            estimate_m: estimate,
            error_m: error,
            desired,
        });

        if desired == self.state {
            return false;
        }

        if self.state != BrakeState::Unknown {
            if let (Some(dwell), Some(last_flip)) = (self.config.min_dwell_s, self.last_flip_s) {
                if current_time_s - last_flip < dwell {
                    debug!(
                        time = current_time_s,
                        since_flip = current_time_s - last_flip,
                        "flip suppressed by dwell"
                    );
                    return false;
                }
            }
        }

        let command = match desired {
            BrakeState::Extended => {
                self.commands.extend_airbrakes();
                AirbrakeCommand::Extend
            }
            _ => {
                self.commands.retract_airbrakes();
                AirbrakeCommand::Retract
            }
        };
        info!(
            time = current_time_s,
            from = self.state.label(),
            to = desired.label(),
            mode = mode.label(),
            estimate = estimate,
            error = error,
            "airbrake command"
        );
        self.state = desired;
        self.last_flip_s = Some(current_time_s);
        self.last_command = Some(CommandEvent {
            time_s: current_time_s,
            command,
        });
        true
    }

    fn select_estimate<S>(&self, source: &S, elapsed_s: f64) -> Option<(EstimateMode, f64)>
    where
        S: ApogeeSource + ?Sized,
    {
        if let Some(strict) = source.prediction_if_ready() {
            return Some((EstimateMode::Strict, strict));
        }
        if elapsed_s >= self.config.min_coast_s && elapsed_s <= self.config.max_coast_s {
            return source
                .apogee_best_effort()
                .map(|estimate| (EstimateMode::BestEffort, estimate));
        }
        None
    }

    fn decide(&self, error: f64) -> BrakeState {
        let deadband = self.config.deadband_m;
        match self.state {
            BrakeState::Unknown => {
                if error > deadband {
                    BrakeState::Extended
                } else {
                    BrakeState::Retracted
                }
            }
            // Sticky: stay extended until clearly below the band.
            BrakeState::Extended => {
                if error < -deadband {
                    BrakeState::Retracted
                } else {
                    BrakeState::Extended
                }
            }
            // Re-engage as soon as the estimate reaches the target.
            BrakeState::Retracted => {
                if error >= 0.0 {
                    BrakeState::Extended
                } else {
                    BrakeState::Retracted
                }
            }
        }
    }
}
