//! Step-driven apogee predictor combining the sample buffer, curve fit and lookup table.

use apogee_config::PredictorConfig;
use apogee_core::StepInput;
use apogee_core::ballistic::ballistic_apogee;
use tracing::{debug, warn};

use crate::buffer::{Sample, SampleBuffer};
use crate::fit::{CurveFit, FitOptions, fit_decay_model};
use crate::trajectory::{IntegrationSettings, LookupTable, build_lookup_table};

/// Read-only view of apogee estimates consumed by controllers.
pub trait ApogeeSource {
    /// Number of retained coast samples.
    fn sample_count(&self) -> usize;
    /// Estimate available as soon as a lookup table exists.
    fn apogee_best_effort(&self) -> Option<f64>;
    /// Same value as the best-effort estimate, gated on fit uncertainty.
    fn prediction_if_ready(&self) -> Option<f64>;
}

/// Snapshot handed to a [`FitObserver`] after each successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub fit: CurveFit,
    /// Coast clock at the time of the fit (s).
    pub coast_time_s: f64,
    pub altitude_m: f64,
    pub velocity_m_s: f64,
    pub lut_points: usize,
    pub best_effort_m: Option<f64>,
    pub strict_m: Option<f64>,
}

/// Receives fit updates; any `FnMut(&FitReport)` closure qualifies.
pub trait FitObserver {
    fn on_fit_update(&mut self, report: &FitReport);
}

impl<F> FitObserver for F
where
    F: FnMut(&FitReport),
{
    fn on_fit_update(&mut self, report: &FitReport) {
        self(report)
    }
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    altitude_m: f64,
    velocity_m_s: f64,
}

/// Online apogee predictor for the coast phase.
///
/// Call [`update`](Self::update) once per physics step. Positive accelerations are
/// treated as powered flight and ignored, but the live altitude/velocity snapshot is
/// always refreshed so the estimates track the current state.
pub struct ApogeePredictor {
    config: PredictorConfig,
    buffer: SampleBuffer,
    coast_started: bool,
    coast_clock_s: f64,
    snapshot: Option<Snapshot>,
    fit: Option<CurveFit>,
    lut: Option<LookupTable>,
    last_attempt_generation: u64,
    observer: Option<Box<dyn FitObserver>>,
}

impl Default for ApogeePredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl ApogeePredictor {
    pub fn new(config: PredictorConfig) -> Self {
        let config = config.sanitized();
        Self {
            buffer: SampleBuffer::with_capacity(config.max_samples),
            config,
            coast_started: false,
            coast_clock_s: 0.0,
            snapshot: None,
            fit: None,
            lut: None,
            last_attempt_generation: 0,
            observer: None,
        }
    }

    /// Attach an observer notified after every successful fit.
    pub fn with_observer(mut self, observer: impl FitObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_observer(&mut self, observer: Option<Box<dyn FitObserver>>) {
        self.observer = observer;
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Ingest one physics step.
    pub fn update(&mut self, input: &StepInput) {
        self.snapshot = Some(Snapshot {
            altitude_m: input.altitude_m,
            velocity_m_s: input.velocity_m_s,
        });

        if self.coast_started && input.dt_s.is_finite() && input.dt_s > 0.0 {
            self.coast_clock_s += input.dt_s;
        }

        if !input.accel_m_s2.is_finite() || input.accel_m_s2 > 0.0 {
            debug!(
                accel = input.accel_m_s2,
                time = input.time_s,
                "rejected non-coast sample"
            );
            return;
        }

        self.coast_started = true;
        self.buffer.push(Sample {
            t_s: self.coast_clock_s,
            accel_m_s2: input.accel_m_s2,
        });

        if self.refit_due() {
            self.refit();
        }
    }

    /// Clear all samples, the coast clock, the fit and the lookup table.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.coast_started = false;
        self.coast_clock_s = 0.0;
        self.snapshot = None;
        self.fit = None;
        self.lut = None;
        self.last_attempt_generation = 0;
    }

    pub fn sample_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.buffer.iter()
    }

    /// Coast time elapsed since the first accepted sample.
    pub fn coast_time_s(&self) -> f64 {
        self.coast_clock_s
    }

    pub fn fit(&self) -> Option<&CurveFit> {
        self.fit.as_ref()
    }

    pub fn lookup_table(&self) -> Option<&LookupTable> {
        self.lut.as_ref()
    }

    pub fn relative_uncertainty(&self) -> Option<f64> {
        self.fit.as_ref().map(CurveFit::relative_uncertainty)
    }

    /// Coast time covered by the retained samples.
    pub fn sample_span_s(&self) -> f64 {
        self.buffer.span_s()
    }

    /// Fit uncertainty is under the threshold and the samples cover `min_fit_span_s`.
    pub fn is_converged(&self) -> bool {
        self.sample_span_s() >= self.config.min_fit_span_s
            && self
                .relative_uncertainty()
                .map(|rel| rel <= self.config.uncertainty_threshold)
                .unwrap_or(false)
    }

    pub fn apogee_best_effort(&self) -> Option<f64> {
        let lut = self.lut.as_ref()?;
        let snapshot = self.snapshot?;
        Some(lut.apex_from(snapshot.altitude_m, snapshot.velocity_m_s))
    }

    pub fn prediction_if_ready(&self) -> Option<f64> {
        if self.is_converged() {
            self.apogee_best_effort()
        } else {
            None
        }
    }

    /// Drag-free apex from the latest snapshot; an upper bound available before any fit.
    pub fn ballistic_apogee(&self) -> Option<f64> {
        self.snapshot
            .map(|s| ballistic_apogee(s.altitude_m, s.velocity_m_s))
    }

    fn refit_due(&self) -> bool {
        let generation = self.buffer.accepted_total();
        self.buffer.len() >= self.config.min_packets_for_fit
            && generation != self.last_attempt_generation
            && generation - self.last_attempt_generation >= self.config.refit_interval as u64
    }

    fn refit(&mut self) {
        self.last_attempt_generation = self.buffer.accepted_total();
        let initial = self
            .fit
            .map(|f| (f.amplitude, f.decay))
            .unwrap_or((
                self.config.initial_amplitude_m_s2,
                self.config.initial_decay_per_s,
            ));
        let options = FitOptions {
            max_iterations: self.config.max_iterations,
            param_tolerance: self.config.param_tolerance,
        };

        let fit = match fit_decay_model(self.buffer.contiguous(), initial, &options) {
            Ok(fit) => fit,
            Err(err) => {
                warn!(
                    %err,
                    samples = self.buffer.len(),
                    "curve fit failed; keeping previous fit"
                );
                return;
            }
        };
        self.fit = Some(fit);

        let Some(snapshot) = self.snapshot else {
            return;
        };
        let settings = IntegrationSettings {
            step_s: self.config.integration_step_s,
            horizon_s: self.config.integration_horizon_s,
        };
        self.lut = build_lookup_table(&fit, self.coast_clock_s, snapshot.velocity_m_s, &settings);
        if self.lut.is_none() {
            debug!(
                amplitude = fit.amplitude,
                decay = fit.decay,
                velocity = snapshot.velocity_m_s,
                "trajectory integration produced no usable lookup table"
            );
        }

        if self.observer.is_some() {
            let report = FitReport {
                fit,
                coast_time_s: self.coast_clock_s,
                altitude_m: snapshot.altitude_m,
                velocity_m_s: snapshot.velocity_m_s,
                lut_points: self.lut.as_ref().map(LookupTable::len).unwrap_or(0),
                best_effort_m: self.apogee_best_effort(),
                strict_m: self.prediction_if_ready(),
            };
            if let Some(observer) = self.observer.as_mut() {
                observer.on_fit_update(&report);
            }
        }
    }
}

impl ApogeeSource for ApogeePredictor {
    fn sample_count(&self) -> usize {
        ApogeePredictor::sample_count(self)
    }

    fn apogee_best_effort(&self) -> Option<f64> {
        ApogeePredictor::apogee_best_effort(self)
    }

    fn prediction_if_ready(&self) -> Option<f64> {
        ApogeePredictor::prediction_if_ready(self)
    }
}
