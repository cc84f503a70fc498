//! In-flight apogee prediction and airbrake control.
//!
//! The workspace crates are re-exported here so binaries and integration tests share one
//! entry point: the predictor fits the coast deceleration and maps it to an apex, the
//! controller turns the estimate into extend/retract commands, and the simulator flies a
//! vehicle with both in the loop.

pub use apogee_aero as aero;
pub use apogee_config as config;
pub use apogee_controller as controller;
pub use apogee_core as physics;
pub use apogee_export as export;
pub use apogee_predictor as predictor;
pub use apogee_sim as sim;

/// Returns the version of the library for smoke tests.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
