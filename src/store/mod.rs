//! Measurement store access.
//!
//! The estimator only sees the store through [`MeasurementStore`]: resolve an
//! experiment name, then fetch the regression candidates of that experiment
//! in one bulk read. Eligibility is the store's business; the estimator
//! trusts the `used_in_regression` flag on every returned row.
//!
//! [`InMemoryStore`] backs the JSON dumps ([`file`]) and the compressed
//! snapshots ([`snapshot`]).

pub mod candidates;
pub mod file;
pub mod snapshot;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::TimeWindow;
use crate::estimation::{ExperimentId, ProbeSample};

pub use file::{load_json_dump, write_json_dump};
pub use snapshot::{load_snapshot, write_snapshot};

/// Store lookup failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("experiment '{0}' not found in the measurement store")]
    NotFound(String),
    #[error("experiment id {0} not found in the measurement store")]
    UnknownId(ExperimentId),
}

/// Parameters of a regression-candidate query
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub experiment_id: ExperimentId,
    /// Physical capacity ceiling in bytes/s
    pub max_capacity: f64,
    pub probe_packet_size: f64,
    pub min_confidence: f64,
    pub window: Option<TimeWindow>,
}

/// Queryable source of probe-pair measurements
pub trait MeasurementStore: Sync {
    /// Map an experiment name to its identifier.
    fn resolve_experiment(&self, name: &str) -> Result<ExperimentId, StoreError>;

    /// All candidate rows of an experiment, flagged or not.
    fn regression_candidates(&self, query: &CandidateQuery) -> Result<Vec<ProbeSample>, StoreError>;
}

/// Experiment row of a measurement dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub id: ExperimentId,
    pub name: String,
}

/// Serialisable content of a measurement store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementDump {
    pub experiments: Vec<ExperimentInfo>,
    pub samples: Vec<ProbeSample>,
}

/// Measurement store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    experiments: BTreeMap<String, ExperimentId>,
    samples: BTreeMap<ExperimentId, Vec<ProbeSample>>,
    recompute_candidates: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dump(dump: MeasurementDump) -> Self {
        let mut store = Self::new();
        for experiment in dump.experiments {
            store.add_experiment(experiment.id, &experiment.name);
        }
        for sample in dump.samples {
            store.add_sample(sample);
        }
        store
    }

    /// Ignore stored flags and mark candidates on every query.
    pub fn with_recomputed_candidates(mut self, recompute: bool) -> Self {
        self.recompute_candidates = recompute;
        self
    }

    pub fn add_experiment(&mut self, id: ExperimentId, name: &str) {
        self.experiments.insert(name.to_string(), id);
        self.samples.entry(id).or_default();
    }

    pub fn add_sample(&mut self, sample: ProbeSample) {
        self.samples.entry(sample.experiment_id).or_default().push(sample);
    }

    pub fn experiments(&self) -> impl Iterator<Item = (&str, ExperimentId)> {
        self.experiments.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn samples(&self, experiment_id: ExperimentId) -> &[ProbeSample] {
        self.samples
            .get(&experiment_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn to_dump(&self) -> MeasurementDump {
        MeasurementDump {
            experiments: self
                .experiments
                .iter()
                .map(|(name, id)| ExperimentInfo { id: *id, name: name.clone() })
                .collect(),
            samples: self.samples.values().flatten().cloned().collect(),
        }
    }
}

impl MeasurementStore for InMemoryStore {
    fn resolve_experiment(&self, name: &str) -> Result<ExperimentId, StoreError> {
        self.experiments
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn regression_candidates(&self, query: &CandidateQuery) -> Result<Vec<ProbeSample>, StoreError> {
        let rows = self
            .samples
            .get(&query.experiment_id)
            .ok_or(StoreError::UnknownId(query.experiment_id))?;

        let mut selected: Vec<ProbeSample> = rows
            .iter()
            .filter(|s| match (&query.window, s.timestamp) {
                (Some(window), Some(ts)) => window.contains(ts),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();

        if self.recompute_candidates {
            candidates::mark_candidates(&mut selected, query);
        }
        Ok(selected)
    }
}

/// Open a measurement store file, choosing the format by extension:
/// `.zst` for compressed snapshots, anything else as a JSON dump.
pub fn open_store(path: &Path) -> color_eyre::Result<InMemoryStore> {
    let is_snapshot = path.extension().map_or(false, |ext| ext == "zst");
    let dump = if is_snapshot {
        load_snapshot(path)?
    } else {
        load_json_dump(path)?
    };
    log::info!(
        "Loaded {} experiments, {} samples from {}",
        dump.experiments.len(),
        dump.samples.len(),
        path.display()
    );
    Ok(InMemoryStore::from_dump(dump))
}
