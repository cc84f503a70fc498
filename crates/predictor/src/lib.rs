//! In-flight apogee prediction: coast sample buffering, drag-decay curve fitting and
//! apex lookup tables.

pub mod buffer;
pub mod fit;
pub mod predictor;
pub mod trajectory;

pub use buffer::{Sample, SampleBuffer};
pub use fit::{CurveFit, FitError, FitOptions, fit_decay_model};
pub use predictor::{ApogeePredictor, ApogeeSource, FitObserver, FitReport};
pub use trajectory::{IntegrationSettings, LookupTable, build_lookup_table};
