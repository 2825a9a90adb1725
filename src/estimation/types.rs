//! Core data types for probe-gap-model bandwidth estimation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a link observation (one time-windowed measurement unit)
pub type LinkStateId = u64;

/// Identifier of an experiment run
pub type ExperimentId = u64;

/// One probe-pair measurement as delivered by the measurement store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSample {
    pub link_state_id: LinkStateId,
    pub experiment_id: ExperimentId,
    /// Ingress gap between the two probe packets (s)
    pub gin: f64,
    /// Egress gap between the two probe packets (s)
    pub gout: f64,
    /// Payload length of the probing packet pair (bytes)
    pub len: f64,
    #[serde(default)]
    pub used_in_regression: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProbeSample {
    pub fn new(
        link_state_id: LinkStateId,
        experiment_id: ExperimentId,
        gin: f64,
        gout: f64,
        len: f64,
    ) -> Self {
        Self {
            link_state_id,
            experiment_id,
            gin,
            gout,
            len,
            used_in_regression: true,
            timestamp: None,
        }
    }

    /// Derived regression features, or `None` when `gin` is zero or not finite.
    pub fn features(&self) -> Option<Features> {
        if !self.gin.is_finite() || self.gin.abs() < f64::EPSILON {
            return None;
        }
        let features = Features {
            x: self.len / self.gin,
            y: self.gout / self.gin,
        };
        if features.x.is_finite() && features.y.is_finite() {
            Some(features)
        } else {
            None
        }
    }
}

/// Regression features of a single sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    /// `len / gin`, offered-load proxy (bytes/s)
    pub x: f64,
    /// `gout / gin`, gap-dilation ratio
    pub y: f64,
}

/// Coefficients of a fitted line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
    pub iterations: usize,
}

impl LineFit {
    /// x where the fitted line crosses `y = 1`.
    pub fn unit_crossing(&self) -> f64 {
        (1.0 - self.intercept) / self.slope
    }
}

/// Regression method used for the per-link fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitMethod {
    /// Huber M-estimation via iteratively reweighted least squares
    #[default]
    Robust,
    /// Ordinary least squares
    Ols,
}

impl std::fmt::Display for FitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitMethod::Robust => write!(f, "robust"),
            FitMethod::Ols => write!(f, "ols"),
        }
    }
}

/// Terminal state of a link observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    /// Estimate passed the fit and the bounds check
    Valid,
    /// Fit failed numerically
    FitFailure,
    /// Slope non-positive or too close to zero
    DegenerateSlope,
    /// Estimate outside `(0, phy_cap)`
    OutOfBounds,
}

impl FitStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, FitStatus::Valid)
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStatus::Valid => write!(f, "valid"),
            FitStatus::FitFailure => write!(f, "fit failure"),
            FitStatus::DegenerateSlope => write!(f, "degenerate slope"),
            FitStatus::OutOfBounds => write!(f, "out of bounds"),
        }
    }
}

/// Estimate for one link observation.
///
/// One record is emitted per attempted `link_state_id`; a missing estimate
/// keeps `estimated_abw` as `None` and names the reason in `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkObservationFit {
    pub link_state_id: LinkStateId,
    pub experiment_id: ExperimentId,
    pub samples: usize,
    pub intercept_b0: Option<f64>,
    pub slope_b1: Option<f64>,
    /// Available bandwidth in bytes/s
    pub estimated_abw: Option<f64>,
    pub status: FitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LinkObservationFit {
    /// Estimate in bit/s, the unit the capacity table uses
    pub fn estimated_abw_bits(&self) -> Option<f64> {
        self.estimated_abw.map(|abw| abw * 8.0)
    }
}

/// Estimates for all link observations of one experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentEstimates {
    pub experiment_name: String,
    pub experiment_id: ExperimentId,
    pub method: FitMethod,
    /// Physical capacity bound in bytes/s
    pub phy_cap: f64,
    pub total_samples: usize,
    pub used_samples: usize,
    pub links: Vec<LinkObservationFit>,
}

impl ExperimentEstimates {
    pub fn valid_count(&self) -> usize {
        self.links.iter().filter(|l| l.status.is_valid()).count()
    }

    pub fn missing_count(&self) -> usize {
        self.links.len() - self.valid_count()
    }

    pub fn count_status(&self, status: FitStatus) -> usize {
        self.links.iter().filter(|l| l.status == status).count()
    }

    /// Share of attempted link observations without an estimate (0..=1)
    pub fn missing_ratio(&self) -> f64 {
        if self.links.is_empty() {
            0.0
        } else {
            self.missing_count() as f64 / self.links.len() as f64
        }
    }

    /// Share of fetched samples flagged for regression (0..=1)
    pub fn used_ratio(&self) -> f64 {
        if self.total_samples == 0 {
            0.0
        } else {
            self.used_samples as f64 / self.total_samples as f64
        }
    }

    pub fn get(&self, link_state_id: LinkStateId) -> Option<&LinkObservationFit> {
        self.links
            .binary_search_by_key(&link_state_id, |l| l.link_state_id)
            .ok()
            .map(|i| &self.links[i])
    }
}

/// Metadata for an estimation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub store_path: String,
    pub method: FitMethod,
    pub workers: usize,
}

/// Complete estimation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationReport {
    pub metadata: ReportMetadata,
    pub experiments: Vec<ExperimentEstimates>,
}
