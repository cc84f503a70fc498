use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use apogee_control::config::{load_flight_config, load_vehicle_configs, select_vehicle};
use apogee_control::export::summary::{self, CommandEntry, FitEntry, FlightSummary};
use apogee_control::export::{telemetry, writer_for_path};
use apogee_control::sim::{FlightOutcome, drag_model, simulate};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fly a vehicle to apogee with the predictor and airbrake controller in the loop.
#[derive(Parser, Debug)]
#[command(author, version, about = "Airbrake apogee control flight simulator")]
struct Cli {
    /// Flight configuration (TOML or YAML)
    #[arg(long, default_value = "configs/flight.toml")]
    config: PathBuf,

    /// Vehicle name from the catalog, replacing the configured vehicle
    #[arg(long)]
    vehicle: Option<String>,

    /// Vehicle catalog: directory of TOML files or a YAML list
    #[arg(long)]
    vehicles: Option<PathBuf>,

    /// Target apogee in metres (overrides the configuration)
    #[arg(long)]
    target: Option<f64>,

    /// Drag coefficient CSV (`mach,deployment,cd`), overrides the vehicle's table
    #[arg(long)]
    drag_table: Option<PathBuf>,

    /// Per-step telemetry CSV (use '-' for stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON flight summary (use '-' for stdout)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log predictor and controller detail
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(level)
        .init();

    let mut config = load_flight_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.vehicle.is_some() || cli.vehicles.is_some() {
        let catalog_path = cli
            .vehicles
            .clone()
            .unwrap_or_else(|| PathBuf::from("configs/vehicles"));
        let catalog = load_vehicle_configs(&catalog_path)
            .with_context(|| format!("loading {}", catalog_path.display()))?;
        config.vehicle = select_vehicle(&catalog, cli.vehicle.as_deref())?.clone();
    }
    if let Some(target) = cli.target {
        anyhow::ensure!(target.is_finite(), "target apogee must be finite");
        config.controller.target_apogee_m = target;
    }
    if let Some(table) = &cli.drag_table {
        config.vehicle.drag_table = Some(table.clone());
    }

    info!(
        config = %cli.config.display(),
        vehicle = %config.vehicle.name,
        target = config.controller.target_apogee_m,
        "configuration loaded"
    );
    let drag = drag_model(&config.vehicle)?;
    let outcome = simulate(&config, &drag, None)?;

    if let Some(path) = &cli.output {
        write_telemetry(path, &outcome)?;
    }
    if let Some(path) = &cli.summary {
        summary::write_summary(path, &build_summary(&outcome))?;
    }
    if cli.output.as_deref() != Some(std::path::Path::new("-"))
        && cli.summary.as_deref() != Some(std::path::Path::new("-"))
    {
        print_report(&outcome);
    }

    Ok(())
}

fn write_telemetry(path: &std::path::Path, outcome: &FlightOutcome) -> anyhow::Result<()> {
    let mut writer = writer_for_path(path)?;
    telemetry::write_header(writer.as_mut())?;
    for record in &outcome.records {
        telemetry::Record {
            time_s: record.time_s,
            phase: record.phase.label(),
            altitude_m: record.altitude_m,
            velocity_m_s: record.velocity_m_s,
            accel_m_s2: record.accel_m_s2,
            mass_kg: record.mass_kg,
            mach: record.mach,
            cd: record.drag_coefficient,
            deployment: record.deployment,
            setpoint: record.setpoint,
            brake_state: record.brake_state.label(),
            best_effort_m: record.best_effort_m,
            strict_m: record.strict_m,
            ballistic_m: record.ballistic_m,
        }
        .write_to(writer.as_mut())?;
    }
    writer.flush()?;
    Ok(())
}

fn build_summary(outcome: &FlightOutcome) -> FlightSummary {
    FlightSummary {
        generated_utc: summary::timestamp_utc(),
        vehicle: outcome.vehicle.clone(),
        target_apogee_m: outcome.target_apogee_m,
        apogee_m: outcome.apogee_m,
        apogee_error_m: outcome.apogee_error_m(),
        apogee_time_s: outcome.apogee_time_s,
        reached_apogee: outcome.reached_apogee,
        burnout_time_s: outcome.burnout_time_s,
        final_state: outcome.final_state.label().to_string(),
        last_strict_estimate_m: outcome.last_strict_estimate(),
        commands: outcome
            .commands
            .iter()
            .map(|event| CommandEntry {
                time_s: event.time_s,
                command: event.command.label().to_string(),
            })
            .collect(),
        final_fit: outcome.final_fit.map(|fit| FitEntry {
            amplitude_m_s2: fit.amplitude,
            decay_per_s: fit.decay,
            sigma_amplitude: fit.sigma_amplitude,
            sigma_decay: fit.sigma_decay,
            relative_uncertainty: fit.relative_uncertainty(),
            sample_count: fit.sample_count,
            iterations: fit.iterations,
        }),
    }
}

fn print_report(outcome: &FlightOutcome) {
    println!("=== Flight Report ===");
    println!("Vehicle        : {}", outcome.vehicle);
    println!("Target apogee  : {:.1} m", outcome.target_apogee_m);
    println!(
        "Apogee         : {:.1} m at {:.2} s (error {:+.1} m)",
        outcome.apogee_m,
        outcome.apogee_time_s,
        outcome.apogee_error_m()
    );
    if !outcome.reached_apogee {
        println!("                 (time limit reached before apogee)");
    }
    match outcome.burnout_time_s {
        Some(t) => println!("Burnout        : {:.2} s", t),
        None => println!("Burnout        : not reached"),
    }
    println!("Commands       : {}", outcome.commands.len());
    for event in &outcome.commands {
        println!("  {:>8.2} s  {}", event.time_s, event.command.label());
    }
    println!("Final state    : {}", outcome.final_state.label());
    if let Some(fit) = &outcome.final_fit {
        println!(
            "Final fit      : A = {:.4} m/s², B = {:.5} 1/s, rel. uncertainty {:.4} ({} samples)",
            fit.amplitude,
            fit.decay,
            fit.relative_uncertainty(),
            fit.sample_count
        );
    }
}
