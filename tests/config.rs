use std::fs;

use apogee_control::config::{
    ConfigError, ControllerConfig, PredictorConfig, load_flight_config, load_vehicle_configs,
    select_vehicle,
};

#[test]
fn bundled_flight_config_loads() {
    let config = load_flight_config("configs/flight.toml").expect("flight config");
    assert_eq!(config.vehicle.name, "Default Sounding Rocket");
    assert_eq!(config.vehicle.thrust_curve.len(), 3);
    assert_eq!(config.controller.target_apogee_m, 1400.0);
    assert_eq!(config.predictor.min_packets_for_fit, 20);
    assert_eq!(config.simulation.dt_s, 0.01);
}

#[test]
fn yaml_config_fills_missing_sections_with_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("flight.yaml");
    fs::write(
        &path,
        "controller:\n  target_apogee_m: 750.0\n  min_dwell_s: 0.25\npredictor:\n  uncertainty_threshold: 0.1\n",
    )
    .expect("write");

    let config = load_flight_config(&path).expect("yaml config");
    assert_eq!(config.controller.target_apogee_m, 750.0);
    assert_eq!(config.controller.min_dwell_s, Some(0.25));
    assert_eq!(config.controller.deadband_m, 10.0);
    assert_eq!(config.predictor.uncertainty_threshold, 0.1);
    assert_eq!(config.predictor.max_samples, 1000);
    assert_eq!(config.vehicle.dry_mass_kg, 20.0);
}

#[test]
fn vehicle_catalog_directory_is_sorted_and_selectable() {
    let vehicles = load_vehicle_configs("configs/vehicles").expect("catalog");
    let names: Vec<&str> = vehicles.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Hawk", "Kestrel"]);

    let kestrel = select_vehicle(&vehicles, Some("kestrel")).expect("case-insensitive");
    assert_eq!(kestrel.name, "Kestrel");
    assert!(kestrel.drag_table.is_some());
    assert_eq!(select_vehicle(&vehicles, None).expect("first").name, "Hawk");
    assert!(matches!(
        select_vehicle(&vehicles, Some("Osprey")),
        Err(ConfigError::VehicleNotFound(name)) if name == "Osprey"
    ));
    assert!(matches!(select_vehicle(&[], None), Err(ConfigError::EmptyCatalog)));
}

#[test]
fn yaml_vehicle_list_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vehicles.yaml");
    fs::write(
        &path,
        "- name: Alpha\n  dry_mass_kg: 10.0\n- name: Beta\n  thrust_curve: [[0.0, 800.0], [2.0, 0.0]]\n",
    )
    .expect("write");

    let vehicles = load_vehicle_configs(&path).expect("yaml list");
    assert_eq!(vehicles.len(), 2);
    assert_eq!(vehicles[0].dry_mass_kg, 10.0);
    assert_eq!(vehicles[1].thrust_curve, vec![(0.0, 800.0), (2.0, 0.0)]);
}

#[test]
fn malformed_files_report_parse_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml_path = dir.path().join("bad.toml");
    fs::write(&toml_path, "[controller\ntarget = ").expect("write");
    assert!(matches!(load_flight_config(&toml_path), Err(ConfigError::Toml(_))));

    let yaml_path = dir.path().join("bad.yaml");
    fs::write(&yaml_path, "controller: [1, 2").expect("write");
    assert!(matches!(load_flight_config(&yaml_path), Err(ConfigError::Parse(_))));

    assert!(matches!(
        load_flight_config(dir.path().join("missing.toml")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn predictor_config_is_sanitized() {
    let config = PredictorConfig {
        min_packets_for_fit: 1,
        max_samples: 2,
        refit_interval: 0,
        integration_step_s: -1.0,
        integration_horizon_s: f64::NAN,
        uncertainty_threshold: 0.0,
        min_fit_span_s: -2.0,
        initial_amplitude_m_s2: 12.0,
        initial_decay_per_s: -0.5,
        max_iterations: 0,
        param_tolerance: f64::INFINITY,
    }
    .sanitized();

    assert_eq!(config.min_packets_for_fit, 3);
    assert_eq!(config.max_samples, 3);
    assert_eq!(config.refit_interval, 1);
    assert_eq!(config.integration_step_s, 0.01);
    assert_eq!(config.integration_horizon_s, 120.0);
    assert_eq!(config.uncertainty_threshold, 0.05);
    assert_eq!(config.min_fit_span_s, 0.0);
    assert_eq!(config.initial_amplitude_m_s2, -12.0);
    assert_eq!(config.initial_decay_per_s, 0.0);
    assert_eq!(config.max_iterations, 1);
    assert_eq!(config.param_tolerance, 1e-10);

    let valid = PredictorConfig::default();
    assert_eq!(valid.clone().sanitized(), valid);
}

#[test]
fn controller_config_is_sanitized() {
    let config = ControllerConfig {
        target_apogee_m: 500.0,
        deadband_m: f64::NAN,
        min_coast_s: 3.0,
        max_coast_s: 1.0,
        min_dwell_s: Some(-1.0),
    }
    .sanitized();
    assert_eq!(config.deadband_m, 0.0);
    assert_eq!(config.max_coast_s, 3.0);
    assert_eq!(config.min_dwell_s, None);
    assert_eq!(config.target_apogee_m, 500.0);
}
