//! Select → group → fit → sanitise, per experiment.

use super::estimator::Estimator;
use super::grouper::group_by_link;
use super::types::ExperimentEstimates;
use super::EstimationError;
use crate::config::Config;
use crate::store::{CandidateQuery, MeasurementStore};

/// Estimate the available bandwidth of every link observation of one
/// experiment.
///
/// Fails with `NotFound` when the experiment has no capacity profile or is
/// unknown to the store. An experiment without flagged samples yields an
/// empty result.
pub fn estimate_experiment(
    store: &dyn MeasurementStore,
    config: &Config,
    estimator: &Estimator,
    experiment: &str,
) -> Result<ExperimentEstimates, EstimationError> {
    let profile = config
        .profile(experiment)
        .ok_or_else(|| EstimationError::NotFound(experiment.to_string()))?;
    let experiment_id = store.resolve_experiment(experiment)?;
    let phy_cap = profile.phy_cap_bytes();

    let query = CandidateQuery {
        experiment_id,
        max_capacity: phy_cap,
        probe_packet_size: config.selection.probe_packet_size,
        min_confidence: config.selection.min_confidence,
        window: config.selection.window,
    };
    let samples = store.regression_candidates(&query)?;

    let groups = group_by_link(&samples);
    let used_samples: usize = groups.values().map(Vec::len).sum();
    if groups.is_empty() {
        log::warn!(
            "{}: no samples marked for regression ({} fetched)",
            experiment,
            samples.len()
        );
    }

    let links = estimator.run(&groups, experiment_id, phy_cap)?;

    let estimates = ExperimentEstimates {
        experiment_name: experiment.to_string(),
        experiment_id,
        method: estimator.method,
        phy_cap,
        total_samples: samples.len(),
        used_samples,
        links,
    };

    log::info!(
        "{}: {} of {} link observations estimated ({:.1}% missing)",
        experiment,
        estimates.valid_count(),
        estimates.links.len(),
        estimates.missing_ratio() * 100.0
    );

    Ok(estimates)
}

/// Estimate every configured experiment, in name order.
///
/// The first experiment that cannot be resolved aborts the run.
pub fn estimate_all(
    store: &dyn MeasurementStore,
    config: &Config,
    estimator: &Estimator,
) -> Result<Vec<ExperimentEstimates>, EstimationError> {
    config
        .experiments
        .keys()
        .map(|name| estimate_experiment(store, config, estimator, name))
        .collect()
}
