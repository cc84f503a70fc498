//! Export helpers for flight telemetry CSV and JSON summaries.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read telemetry: {0}")]
    Csv(#[from] csv::Error),
}

/// Create a writer for the target path, handling stdout (`-`) by convention.
pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

pub mod telemetry {
    use std::io::{self, Write};
    use std::path::Path;

    use serde::Deserialize;

    use crate::ExportError;

    const HEADER: &str = "time_s,phase,altitude_m,velocity_m_s,accel_m_s2,mass_kg,mach,cd,deployment,setpoint,brake_state,best_effort_m,strict_m,ballistic_m";

    /// Write the telemetry CSV header.
    pub fn write_header(writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{}", HEADER)
    }

    /// CSV row emitted once per physics step.
    #[derive(Debug, Clone)]
    pub struct Record<'a> {
        pub time_s: f64,
        pub phase: &'a str,
        pub altitude_m: f64,
        pub velocity_m_s: f64,
        pub accel_m_s2: f64,
        pub mass_kg: f64,
        pub mach: f64,
        pub cd: f64,
        pub deployment: f64,
        pub setpoint: f64,
        pub brake_state: &'a str,
        pub best_effort_m: Option<f64>,
        pub strict_m: Option<f64>,
        pub ballistic_m: Option<f64>,
    }

    impl Record<'_> {
        /// Serialize the record to CSV, matching the header ordering. Missing
        /// estimates are written as empty fields.
        pub fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
            writeln!(
                writer,
                "{:.4},{},{:.3},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.1},{},{},{},{}",
                self.time_s,
                self.phase,
                self.altitude_m,
                self.velocity_m_s,
                self.accel_m_s2,
                self.mass_kg,
                self.mach,
                self.cd,
                self.deployment,
                self.setpoint,
                self.brake_state,
                optional(self.best_effort_m),
                optional(self.strict_m),
                optional(self.ballistic_m),
            )
        }
    }

    fn optional(value: Option<f64>) -> String {
        value.map(|v| format!("{v:.3}")).unwrap_or_default()
    }

    /// Telemetry row read back from a CSV written by [`Record::write_to`].
    #[derive(Debug, Clone, Deserialize)]
    pub struct Row {
        pub time_s: f64,
        pub phase: String,
        pub altitude_m: f64,
        pub velocity_m_s: f64,
        pub deployment: f64,
        pub brake_state: String,
        pub best_effort_m: Option<f64>,
        pub strict_m: Option<f64>,
    }

    /// Load every row of a telemetry CSV.
    pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Row>, ExportError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            rows.push(record?);
        }
        Ok(rows)
    }
}

pub mod summary {
    use std::io::Write;
    use std::path::Path;

    use chrono::Utc;
    use serde::Serialize;
    use serde_json::to_writer_pretty;

    use crate::{ExportError, writer_for_path};

    /// Airbrake command issued during the flight.
    #[derive(Debug, Clone, Serialize)]
    pub struct CommandEntry {
        pub time_s: f64,
        pub command: String,
    }

    /// Last curve fit of the flight.
    #[derive(Debug, Clone, Serialize)]
    pub struct FitEntry {
        pub amplitude_m_s2: f64,
        pub decay_per_s: f64,
        pub sigma_amplitude: f64,
        pub sigma_decay: f64,
        pub relative_uncertainty: f64,
        pub sample_count: usize,
        pub iterations: usize,
    }

    /// JSON summary of one simulated flight.
    #[derive(Debug, Clone, Serialize)]
    pub struct FlightSummary {
        pub generated_utc: String,
        pub vehicle: String,
        pub target_apogee_m: f64,
        pub apogee_m: f64,
        pub apogee_error_m: f64,
        pub apogee_time_s: f64,
        pub reached_apogee: bool,
        pub burnout_time_s: Option<f64>,
        pub final_state: String,
        pub last_strict_estimate_m: Option<f64>,
        pub commands: Vec<CommandEntry>,
        pub final_fit: Option<FitEntry>,
    }

    /// Current UTC time in RFC 3339 form with second precision.
    pub fn timestamp_utc() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Write the summary as pretty-printed JSON; `-` writes to stdout.
    pub fn write_summary(path: &Path, summary: &FlightSummary) -> Result<(), ExportError> {
        let mut writer = writer_for_path(path)?;
        to_writer_pretty(&mut writer, summary)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
