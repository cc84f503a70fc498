//! Rectangular Mach × deployment drag-coefficient grid with bilinear interpolation.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Behaviour for queries outside the tabulated domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryPolicy {
    /// Hold the nearest edge value.
    #[default]
    Clamp,
    /// Report a zero coefficient.
    Zero,
    /// Continue the edge cell's linear trend.
    Extrapolate,
}

/// Drag coefficient lookup consumed by the flight model.
///
/// Implementations return `None` when no value can be produced (for example a
/// non-finite input) and never panic on out-of-range arguments.
pub trait DragCoefficientSource {
    fn value(&self, mach: f64, deployment: f64) -> Option<f64>;
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("{axis} axis is empty")]
    EmptyAxis { axis: &'static str },
    #[error("{axis} axis must be strictly ascending")]
    NotAscending { axis: &'static str },
    #[error("expected {expected} grid values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("grid contains a non-finite value")]
    NonFinite,
    #[error("grid has no entry for mach {mach}, deployment {deployment}")]
    MissingPoint { mach: f64, deployment: f64 },
    #[error("grid has duplicate entries for mach {mach}, deployment {deployment}")]
    DuplicatePoint { mach: f64, deployment: f64 },
    #[error("failed to read drag table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct Row {
    mach: f64,
    deployment: f64,
    cd: f64,
}

/// Drag coefficients tabulated on a Mach-major grid: `values[i * deployment.len() + j]`
/// holds the coefficient at `(mach[i], deployment[j])`.
#[derive(Debug, Clone, PartialEq)]
pub struct DragGrid {
    mach: Vec<f64>,
    deployment: Vec<f64>,
    values: Vec<f64>,
    policy: BoundaryPolicy,
}

impl DragGrid {
    pub fn new(
        mach: Vec<f64>,
        deployment: Vec<f64>,
        values: Vec<f64>,
        policy: BoundaryPolicy,
    ) -> Result<Self, GridError> {
        validate_axis(&mach, "mach")?;
        validate_axis(&deployment, "deployment")?;
        let expected = mach.len() * deployment.len();
        if values.len() != expected {
            return Err(GridError::ShapeMismatch {
                expected,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFinite);
        }
        Ok(Self {
            mach,
            deployment,
            values,
            policy,
        })
    }

    /// Mach-independent table: `base_cd` stowed, `base_cd + airbrake_cd` fully deployed.
    pub fn uniform(base_cd: f64, airbrake_cd: f64) -> Self {
        Self {
            mach: vec![0.0, 1.0],
            deployment: vec![0.0, 1.0],
            values: vec![base_cd, base_cd + airbrake_cd, base_cd, base_cd + airbrake_cd],
            policy: BoundaryPolicy::Clamp,
        }
    }

    /// Load `mach,deployment,cd` rows from a CSV file with a header line.
    pub fn from_csv<P: AsRef<Path>>(path: P, policy: BoundaryPolicy) -> Result<Self, GridError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::from_csv_reader(reader, policy)
    }

    /// Same as [`from_csv`](Self::from_csv) for any reader.
    pub fn from_reader<R: Read>(reader: R, policy: BoundaryPolicy) -> Result<Self, GridError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv_reader(reader, policy)
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        policy: BoundaryPolicy,
    ) -> Result<Self, GridError> {
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: Row = record?;
            if !(row.mach.is_finite() && row.deployment.is_finite() && row.cd.is_finite()) {
                return Err(GridError::NonFinite);
            }
            rows.push(row);
        }

        let mach = unique_sorted(rows.iter().map(|r| r.mach));
        let deployment = unique_sorted(rows.iter().map(|r| r.deployment));
        if mach.is_empty() {
            return Err(GridError::EmptyAxis { axis: "mach" });
        }

        let mut values = vec![f64::NAN; mach.len() * deployment.len()];
        for row in &rows {
            let i = mach.partition_point(|&m| m < row.mach);
            let j = deployment.partition_point(|&d| d < row.deployment);
            let slot = &mut values[i * deployment.len() + j];
            if !slot.is_nan() {
                return Err(GridError::DuplicatePoint {
                    mach: row.mach,
                    deployment: row.deployment,
                });
            }
            *slot = row.cd;
        }
        if let Some(idx) = values.iter().position(|v| v.is_nan()) {
            return Err(GridError::MissingPoint {
                mach: mach[idx / deployment.len()],
                deployment: deployment[idx % deployment.len()],
            });
        }

        Self::new(mach, deployment, values, policy)
    }

    pub fn with_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    pub fn mach_axis(&self) -> &[f64] {
        &self.mach
    }

    pub fn deployment_axis(&self) -> &[f64] {
        &self.deployment
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.deployment.len() + j]
    }

    fn contains(&self, mach: f64, deployment: f64) -> bool {
        let inside = |axis: &[f64], x: f64| x >= axis[0] && x <= axis[axis.len() - 1];
        inside(&self.mach, mach) && inside(&self.deployment, deployment)
    }
}

impl DragCoefficientSource for DragGrid {
    fn value(&self, mach: f64, deployment: f64) -> Option<f64> {
        if !(mach.is_finite() && deployment.is_finite()) {
            return None;
        }
        if self.policy == BoundaryPolicy::Zero && !self.contains(mach, deployment) {
            return Some(0.0);
        }
        let extrapolate = self.policy == BoundaryPolicy::Extrapolate;
        let (i0, i1, fm) = bracket(&self.mach, mach, extrapolate);
        let (j0, j1, fd) = bracket(&self.deployment, deployment, extrapolate);

        let low = self.at(i0, j0) + fd * (self.at(i0, j1) - self.at(i0, j0));
        let high = self.at(i1, j0) + fd * (self.at(i1, j1) - self.at(i1, j0));
        let value = low + fm * (high - low);
        value.is_finite().then_some(value)
    }
}

fn validate_axis(axis: &[f64], name: &'static str) -> Result<(), GridError> {
    if axis.is_empty() {
        return Err(GridError::EmptyAxis { axis: name });
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(GridError::NonFinite);
    }
    if axis.windows(2).any(|w| w[1] <= w[0]) {
        return Err(GridError::NotAscending { axis: name });
    }
    Ok(())
}

fn unique_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out.dedup();
    out
}

/// Surrounding indices and fractional position of `x` along `axis`.
fn bracket(axis: &[f64], x: f64, extrapolate: bool) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 1 {
        return (0, 0, 0.0);
    }
    let upper = axis.partition_point(|&a| a <= x).clamp(1, n - 1);
    let lower = upper - 1;
    let frac = (x - axis[lower]) / (axis[upper] - axis[lower]);
    if extrapolate {
        (lower, upper, frac)
    } else {
        (lower, upper, frac.clamp(0.0, 1.0))
    }
}
