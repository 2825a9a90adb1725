use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::estimation::regression::IrlsOptions;
use crate::estimation::FitMethod;

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Capacity table keyed by experiment name
    pub experiments: BTreeMap<String, ExperimentProfile>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.experiments.is_empty() {
            return Err(ValidationError::InvalidExperiment(
                "at least one experiment must be configured".to_string(),
            ));
        }
        for (name, profile) in &self.experiments {
            profile.validate(name)?;
        }
        self.estimator.validate()?;
        self.selection.validate()?;
        Ok(())
    }

    /// Capacity profile for an experiment
    pub fn profile(&self, experiment: &str) -> Option<&ExperimentProfile> {
        self.experiments.get(experiment)
    }
}

/// Link capacities of one experiment, in bit/s
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentProfile {
    /// Configured bottleneck capacity
    pub capacity: f64,
    /// Maximum theoretical throughput of the physical channel
    pub max_capacity: f64,
}

impl ExperimentProfile {
    pub fn new(capacity: f64, max_capacity: f64) -> Self {
        Self { capacity, max_capacity }
    }

    /// Physical capacity bound in bytes/s, the unit of `len/gin`
    pub fn phy_cap_bytes(&self) -> f64 {
        self.max_capacity / 8.0
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        for (field, value) in [("capacity", self.capacity), ("max_capacity", self.max_capacity)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidExperiment(format!(
                    "{name}: {field} must be a positive number, got {value}"
                )));
            }
        }
        if self.capacity > self.max_capacity {
            return Err(ValidationError::InvalidExperiment(format!(
                "{name}: capacity {} exceeds max_capacity {}",
                self.capacity, self.max_capacity
            )));
        }
        Ok(())
    }
}

/// Settings of the per-link regression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub method: FitMethod,
    /// Worker threads for the per-link fan-out (0 = all cores)
    pub workers: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub huber_t: f64,
    /// Slopes with a smaller magnitude are rejected
    pub slope_epsilon: f64,
}

impl EstimatorConfig {
    pub fn irls_options(&self) -> IrlsOptions {
        IrlsOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            huber_t: self.huber_t,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 {
            return Err(ValidationError::InvalidEstimator(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(ValidationError::InvalidEstimator(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.huber_t > 0.0) {
            return Err(ValidationError::InvalidEstimator(format!(
                "huber_t must be positive, got {}",
                self.huber_t
            )));
        }
        if !(self.slope_epsilon >= 0.0) {
            return Err(ValidationError::InvalidEstimator(format!(
                "slope_epsilon must not be negative, got {}",
                self.slope_epsilon
            )));
        }
        Ok(())
    }
}

/// Parameters handed to the measurement store when selecting candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum probe payload (bytes)
    pub probe_packet_size: f64,
    /// Fraction of smallest-gin samples forming the dispersion baseline
    pub min_confidence: f64,
    /// Ignore stored `used_in_regression` flags and mark candidates locally
    pub recompute_candidates: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
}

impl SelectionConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.probe_packet_size > 0.0) {
            return Err(ValidationError::InvalidSelection(format!(
                "probe_packet_size must be positive, got {}",
                self.probe_packet_size
            )));
        }
        if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
            return Err(ValidationError::InvalidSelection(format!(
                "min_confidence must be in (0, 1], got {}",
                self.min_confidence
            )));
        }
        if let Some(window) = &self.window {
            if window.start >= window.end {
                return Err(ValidationError::InvalidSelection(format!(
                    "window start {} is not before end {}",
                    window.start, window.end
                )));
            }
        }
        Ok(())
    }
}

/// Half-open time range `[start, end)` restricting the selected samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid experiment configuration: {0}")]
    InvalidExperiment(String),
    #[error("Invalid estimator configuration: {0}")]
    InvalidEstimator(String),
    #[error("Invalid selection configuration: {0}")]
    InvalidSelection(String),
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let irls = IrlsOptions::default();
        Self {
            method: FitMethod::Robust,
            workers: 0,
            max_iterations: irls.max_iterations,
            tolerance: irls.tolerance,
            huber_t: irls.huber_t,
            slope_epsilon: 1e-9,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            probe_packet_size: 1362.0,
            min_confidence: 0.1,
            recompute_candidates: false,
            window: None,
        }
    }
}

/// Default implementation for Config: the experiment table of the testbed
impl Default for Config {
    fn default() -> Self {
        let experiments = [
            ("exp1", 5_000_000.0, 10_000_000.0),
            ("exp1_fluid", 5_000_000.0, 10_000_000.0),
            ("exp1_jitter", 5_000_000.0, 10_000_000.0),
            ("exp2", 3_000_000.0, 5_000_000.0),
            ("exp2_fluid", 3_000_000.0, 5_000_000.0),
            ("exp3", 5_000_000.0, 10_000_000.0),
            ("exp4", 1_000_000.0, 4_000_000.0),
            ("exp5", 1_000_000.0, 4_000_000.0),
            ("exp6", 5_000_000.0, 10_000_000.0),
            ("exp7", 5_000_000.0, 10_000_000.0),
            ("exp8", 7_000_000.0, 10_000_000.0),
        ]
        .into_iter()
        .map(|(name, capacity, max_capacity)| {
            (name.to_string(), ExperimentProfile::new(capacity, max_capacity))
        })
        .collect();

        Self {
            estimator: EstimatorConfig::default(),
            selection: SelectionConfig::default(),
            experiments,
        }
    }
}
