//! Configuration models and loaders for the apogee control workspace.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Complete description of a simulated flight: vehicle, stepping, predictor and controller tuning.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FlightConfig {
    pub vehicle: VehicleConfig,
    pub simulation: SimulationConfig,
    pub predictor: PredictorConfig,
    pub controller: ControllerConfig,
}

/// Vehicle description parsed from flight files or vehicle catalogs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VehicleConfig {
    pub name: String,
    pub dry_mass_kg: f64,
    pub propellant_mass_kg: f64,
    pub reference_area_m2: f64,
    /// `(time_s, thrust_newtons)` points, linearly interpolated; thrust is zero past the last point.
    pub thrust_curve: Vec<(f64, f64)>,
    /// Full-travel slew rate of the airbrake actuator (deployment fraction per second).
    pub actuator_rate_per_s: f64,
    /// Axial drag coefficient with the airbrakes stowed, used when no drag table is given.
    pub base_drag_coefficient: f64,
    /// Drag coefficient added at full deployment, used when no drag table is given.
    pub airbrake_drag_coefficient: f64,
    /// Optional CSV table of `mach,deployment,cd` rows.
    pub drag_table: Option<PathBuf>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            name: "Default Sounding Rocket".to_string(),
            dry_mass_kg: 20.0,
            propellant_mass_kg: 5.0,
            reference_area_m2: 0.0081,
            thrust_curve: vec![(0.0, 1500.0), (3.0, 1500.0), (3.1, 0.0)],
            actuator_rate_per_s: 2.0,
            base_drag_coefficient: 0.45,
            airbrake_drag_coefficient: 0.8,
            drag_table: None,
        }
    }
}

/// Physics loop stepping parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub max_time_s: f64,
    pub launch_altitude_m: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_s: 0.01,
            max_time_s: 120.0,
            launch_altitude_m: 0.0,
        }
    }
}

/// Tuning for the online curve fit and the lookup-table integrator.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PredictorConfig {
    /// Minimum retained coast samples before a fit is attempted.
    pub min_packets_for_fit: usize,
    /// Sample buffer capacity; oldest samples are evicted first.
    pub max_samples: usize,
    /// Number of newly accepted samples between refits.
    pub refit_interval: usize,
    pub integration_horizon_s: f64,
    pub integration_step_s: f64,
    /// Largest relative parameter uncertainty accepted for the strict estimate.
    pub uncertainty_threshold: f64,
    /// Coast time the retained samples must cover before the strict estimate is
    /// issued. Noise-free data passes the uncertainty gate on the first fit, long
    /// before the fitted model extrapolates well; `0` disables the check.
    pub min_fit_span_s: f64,
    /// Initial guess for the amplitude `A` (m/s², non-positive).
    pub initial_amplitude_m_s2: f64,
    /// Initial guess for the decay rate `B` (1/s, non-negative).
    pub initial_decay_per_s: f64,
    pub max_iterations: usize,
    pub param_tolerance: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_packets_for_fit: 20,
            max_samples: 1000,
            refit_interval: 1,
            integration_horizon_s: 120.0,
            integration_step_s: 0.01,
            uncertainty_threshold: 0.05,
            min_fit_span_s: 0.0,
            initial_amplitude_m_s2: -10.0,
            initial_decay_per_s: 0.01,
            max_iterations: 60,
            param_tolerance: 1.0e-10,
        }
    }
}

impl PredictorConfig {
    /// Clamp every field into its valid range, logging each adjustment.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.min_packets_for_fit < 3 {
            warn!(value = self.min_packets_for_fit, "min_packets_for_fit raised to 3");
            self.min_packets_for_fit = 3;
        }
        if self.max_samples < self.min_packets_for_fit {
            warn!(
                value = self.max_samples,
                "max_samples raised to min_packets_for_fit"
            );
            self.max_samples = self.min_packets_for_fit;
        }
        if self.refit_interval == 0 {
            warn!("refit_interval raised to 1");
            self.refit_interval = 1;
        }
        if !(self.integration_step_s.is_finite() && self.integration_step_s > 0.0) {
            warn!(value = self.integration_step_s, "integration_step_s reset to default");
            self.integration_step_s = defaults.integration_step_s;
        }
        if !(self.integration_horizon_s.is_finite()
            && self.integration_horizon_s >= self.integration_step_s)
        {
            warn!(
                value = self.integration_horizon_s,
                "integration_horizon_s reset to default"
            );
            self.integration_horizon_s = defaults.integration_horizon_s.max(self.integration_step_s);
        }
        if !(self.uncertainty_threshold.is_finite() && self.uncertainty_threshold > 0.0) {
            warn!(
                value = self.uncertainty_threshold,
                "uncertainty_threshold reset to default"
            );
            self.uncertainty_threshold = defaults.uncertainty_threshold;
        }
        if !(self.min_fit_span_s.is_finite() && self.min_fit_span_s >= 0.0) {
            warn!(value = self.min_fit_span_s, "min_fit_span_s clamped to 0");
            self.min_fit_span_s = 0.0;
        }
        if !self.initial_amplitude_m_s2.is_finite() {
            self.initial_amplitude_m_s2 = defaults.initial_amplitude_m_s2;
        } else if self.initial_amplitude_m_s2 > 0.0 {
            warn!(
                value = self.initial_amplitude_m_s2,
                "initial_amplitude_m_s2 must be non-positive; negated"
            );
            self.initial_amplitude_m_s2 = -self.initial_amplitude_m_s2;
        }
        if !(self.initial_decay_per_s.is_finite() && self.initial_decay_per_s >= 0.0) {
            warn!(value = self.initial_decay_per_s, "initial_decay_per_s clamped to 0");
            self.initial_decay_per_s = 0.0;
        }
        if self.max_iterations == 0 {
            warn!("max_iterations raised to 1");
            self.max_iterations = 1;
        }
        if !(self.param_tolerance.is_finite() && self.param_tolerance > 0.0) {
            self.param_tolerance = defaults.param_tolerance;
        }
        self
    }
}

/// Bang-bang controller tuning.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub target_apogee_m: f64,
    /// Half-width of the hysteresis band around the target (m).
    pub deadband_m: f64,
    /// Coast time before the best-effort estimate may drive the actuator.
    pub min_coast_s: f64,
    /// Coast time after which the best-effort estimate is no longer trusted.
    pub max_coast_s: f64,
    /// Minimum time between two consecutive flips; `None` disables the dwell.
    pub min_dwell_s: Option<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_apogee_m: 1000.0,
            deadband_m: 10.0,
            min_coast_s: 1.0,
            max_coast_s: 30.0,
            min_dwell_s: None,
        }
    }
}

impl ControllerConfig {
    /// Clamp negative or inconsistent windows into range, logging each adjustment.
    pub fn sanitized(mut self) -> Self {
        if self.deadband_m.is_nan() || self.deadband_m < 0.0 {
            warn!(value = self.deadband_m, "deadband_m clamped to 0");
            self.deadband_m = 0.0;
        }
        if self.min_coast_s.is_nan() || self.min_coast_s < 0.0 {
            warn!(value = self.min_coast_s, "min_coast_s clamped to 0");
            self.min_coast_s = 0.0;
        }
        if self.max_coast_s.is_nan() || self.max_coast_s < self.min_coast_s {
            warn!(value = self.max_coast_s, "max_coast_s raised to min_coast_s");
            self.max_coast_s = self.min_coast_s;
        }
        if let Some(dwell) = self.min_dwell_s {
            if !(dwell.is_finite() && dwell > 0.0) {
                warn!(value = dwell, "min_dwell_s disabled");
                self.min_dwell_s = None;
            }
        }
        self
    }
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("vehicle catalog is empty")]
    EmptyCatalog,
    #[error("vehicle '{0}' not found in catalog")]
    VehicleNotFound(String),
}

/// Load a flight configuration from a TOML or YAML file.
pub fn load_flight_config<P: AsRef<Path>>(path: P) -> Result<FlightConfig, ConfigError> {
    load_record(path.as_ref())
}

/// Load vehicle configurations from a directory of TOML files or a YAML list.
pub fn load_vehicle_configs<P: AsRef<Path>>(path: P) -> Result<Vec<VehicleConfig>, ConfigError> {
    load_records(path)
}

/// Pick a vehicle by case-insensitive name, or the first catalog entry when none is requested.
pub fn select_vehicle<'a>(
    configs: &'a [VehicleConfig],
    requested: Option<&str>,
) -> Result<&'a VehicleConfig, ConfigError> {
    let first = configs.first().ok_or(ConfigError::EmptyCatalog)?;
    match requested {
        Some(name) => {
            let upper = name.to_uppercase();
            configs
                .iter()
                .find(|cfg| cfg.name.to_uppercase() == upper)
                .ok_or_else(|| ConfigError::VehicleNotFound(name.to_string()))
        }
        None => Ok(first),
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

fn load_record<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    if is_toml(path) {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn load_records<T, P>(path: P) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.is_dir() {
        read_dir_records(path)
    } else if is_toml(path) {
        Ok(vec![load_record(path)?])
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn read_dir_records<T>(dir: &Path) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut records = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_toml(path))
        .collect();
    entries.sort();
    for path in entries {
        records.push(load_record(&path)?);
    }
    Ok(records)
}
