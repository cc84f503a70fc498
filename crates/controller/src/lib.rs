//! Hysteresis bang-bang airbrake controller driven by apogee predictions.

pub mod bang_bang;
pub mod commands;

pub use bang_bang::{BangBangController, BrakeState, Decision, EstimateMode};
pub use commands::{AirbrakeCommand, AirbrakeCommands, CommandEvent, CommandLog};
