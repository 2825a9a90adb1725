//! Available-bandwidth estimation with the probe-gap model.
//!
//! For every link observation the samples' gap features are fitted with a
//! line `gout/gin = b0 + b1 * (len/gin)`; the x-intercept at `y = 1`,
//! `(1 - b0) / b1`, is the available bandwidth estimate. Link observations
//! are independent and are fitted in parallel.

pub mod estimator;
pub mod grouper;
pub mod pipeline;
pub mod regression;
pub mod report;
pub mod sanitizer;
pub mod types;

pub use estimator::Estimator;
pub use grouper::group_by_link;
pub use pipeline::{estimate_all, estimate_experiment};
pub use regression::FitError;
pub use report::{generate_json_report, generate_text_report};
pub use sanitizer::sanitize;
pub use types::*;

use crate::store::StoreError;

/// Failures of the estimation pipeline.
///
/// `NotFound` and `Store` abort a run. The other variants only ever describe
/// a single link observation and end up as a missing estimate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimationError {
    #[error("experiment '{0}' not found")]
    NotFound(String),
    #[error("measurement store error: {0}")]
    Store(StoreError),
    #[error("fit failed: {0}")]
    FitFailure(#[from] FitError),
    #[error("degenerate slope {slope}")]
    DegenerateSlope { slope: f64 },
    #[error("estimate {estimate} outside (0, {capacity})")]
    OutOfBounds { estimate: f64, capacity: f64 },
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl EstimationError {
    /// Terminal link status for per-link failures
    pub fn status(&self) -> Option<FitStatus> {
        match self {
            EstimationError::FitFailure(_) => Some(FitStatus::FitFailure),
            EstimationError::DegenerateSlope { .. } => Some(FitStatus::DegenerateSlope),
            EstimationError::OutOfBounds { .. } => Some(FitStatus::OutOfBounds),
            _ => None,
        }
    }
}

impl From<StoreError> for EstimationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => EstimationError::NotFound(name),
            other => EstimationError::Store(other),
        }
    }
}
