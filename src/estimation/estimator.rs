//! Per-link estimation and the parallel fan-out over link observations.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::regression::{huber_irls_fit, ols_fit, IrlsOptions};
use super::sanitizer::sanitize;
use super::types::*;
use super::EstimationError;
use crate::config::EstimatorConfig;

/// Fits one line per link observation and derives the bandwidth estimate
#[derive(Debug, Clone)]
pub struct Estimator {
    pub method: FitMethod,
    pub irls: IrlsOptions,
    pub slope_epsilon: f64,
    /// Worker threads (0 = all cores)
    pub workers: usize,
}

impl Default for Estimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

impl Estimator {
    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self {
            method: config.method,
            irls: config.irls_options(),
            slope_epsilon: config.slope_epsilon,
            workers: config.workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_method(mut self, method: FitMethod) -> Self {
        self.method = method;
        self
    }

    /// Fit the group and solve for `y = 1`, without the bounds check.
    ///
    /// Rejects numerical failures and slopes that are non-positive or within
    /// `slope_epsilon` of zero.
    pub fn estimate_group(&self, points: &[Features]) -> Result<(LineFit, f64), EstimationError> {
        let fit = match self.method {
            FitMethod::Robust => huber_irls_fit(points, &self.irls)?,
            FitMethod::Ols => ols_fit(points)?,
        };

        if fit.slope.abs() < self.slope_epsilon || fit.slope <= 0.0 {
            return Err(EstimationError::DegenerateSlope { slope: fit.slope });
        }

        Ok((fit, fit.unit_crossing()))
    }

    /// Run the full per-link state machine: fit, reject, sanitise.
    pub fn estimate_link(
        &self,
        link_state_id: LinkStateId,
        experiment_id: ExperimentId,
        samples: &[&ProbeSample],
        phy_cap: f64,
    ) -> LinkObservationFit {
        let points: Vec<Features> = samples.iter().filter_map(|s| s.features()).collect();

        let mut record = LinkObservationFit {
            link_state_id,
            experiment_id,
            samples: samples.len(),
            intercept_b0: None,
            slope_b1: None,
            estimated_abw: None,
            status: FitStatus::Valid,
            reason: None,
        };

        let outcome = self.estimate_group(&points).and_then(|(fit, abw)| {
            record.intercept_b0 = Some(fit.intercept);
            record.slope_b1 = Some(fit.slope);
            sanitize(abw, phy_cap)
        });

        match outcome {
            Ok(abw) => record.estimated_abw = Some(abw),
            Err(err) => {
                log::debug!("Link {} has no estimate: {}", link_state_id, err);
                record.status = err.status().unwrap_or(FitStatus::FitFailure);
                record.reason = Some(err.to_string());
            }
        }
        record
    }

    /// Estimate every group on a dedicated worker pool.
    ///
    /// Results come back ordered by `link_state_id`, independent of the
    /// worker count and of completion order.
    pub fn run(
        &self,
        groups: &BTreeMap<LinkStateId, Vec<&ProbeSample>>,
        experiment_id: ExperimentId,
        phy_cap: f64,
    ) -> Result<Vec<LinkObservationFit>, EstimationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| EstimationError::WorkerPool(e.to_string()))?;

        log::debug!(
            "Fitting {} link observations on {} workers",
            groups.len(),
            pool.current_num_threads()
        );

        let work: Vec<(&LinkStateId, &Vec<&ProbeSample>)> = groups.iter().collect();
        let results: Vec<LinkObservationFit> = pool.install(|| {
            work.par_iter()
                .map(|(id, samples)| self.estimate_link(**id, experiment_id, samples, phy_cap))
                .collect()
        });
        Ok(results)
    }
}
