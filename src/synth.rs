//! Synthetic probe-gap measurements.
//!
//! Samples follow the probe-gap model `gout/gin = max(1, x/C + 1 - A/C)` for
//! a bottleneck of capacity `C` carrying cross traffic that leaves `A`
//! available, with multiplicative jitter and occasional cross-traffic bursts
//! that inflate the egress gap. Candidates are marked exactly as a store
//! would mark them, so the generated dumps feed straight into the estimator.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;

use crate::config::{ExperimentProfile, SelectionConfig};
use crate::estimation::{ExperimentId, LinkStateId, ProbeSample};
use crate::store::candidates::mark_candidates;
use crate::store::{CandidateQuery, ExperimentInfo, MeasurementDump};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    #[error("available bandwidth {abw} must lie in (0, {capacity}) bytes/s")]
    InvalidAbw { abw: f64, capacity: f64 },
    #[error("burst probability {0} outside [0, 1]")]
    InvalidBurstProbability(f64),
    #[error("at least one link and one sample per link are required")]
    Empty,
}

/// Shape of a synthetic experiment
#[derive(Debug, Clone)]
pub struct SynthSpec {
    pub experiment_id: ExperimentId,
    pub links: usize,
    pub samples_per_link: usize,
    /// Available bandwidth every link observation is generated with (bytes/s)
    pub abw: f64,
    /// Relative amplitude of the uniform jitter on `gout/gin`
    pub jitter: f64,
    pub burst_probability: f64,
    pub selection: SelectionConfig,
    /// Timestamp of the first link observation; observations are 1 s apart
    pub start: DateTime<Utc>,
}

impl SynthSpec {
    pub fn new(experiment_id: ExperimentId, links: usize, samples_per_link: usize, abw: f64) -> Self {
        Self {
            experiment_id,
            links,
            samples_per_link,
            abw,
            jitter: 0.02,
            burst_probability: 0.05,
            selection: SelectionConfig::default(),
            start: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
        }
    }
}

/// Generate the samples of `spec.links` link observations, numbered from 1.
pub fn generate<R: Rng>(
    profile: &ExperimentProfile,
    spec: &SynthSpec,
    rng: &mut R,
) -> Result<Vec<ProbeSample>, SynthError> {
    // Bottleneck capacity in bytes/s
    let capacity = profile.capacity / 8.0;
    if !(spec.abw > 0.0 && spec.abw < capacity) {
        return Err(SynthError::InvalidAbw { abw: spec.abw, capacity });
    }
    if !(0.0..=1.0).contains(&spec.burst_probability) {
        return Err(SynthError::InvalidBurstProbability(spec.burst_probability));
    }
    if spec.links == 0 || spec.samples_per_link == 0 {
        return Err(SynthError::Empty);
    }

    let len = spec.selection.probe_packet_size;
    let query = CandidateQuery {
        experiment_id: spec.experiment_id,
        max_capacity: profile.phy_cap_bytes(),
        probe_packet_size: len,
        min_confidence: spec.selection.min_confidence,
        window: None,
    };

    let mut samples = Vec::with_capacity(spec.links * spec.samples_per_link);
    for link in 0..spec.links {
        let link_state_id = link as LinkStateId + 1;
        let slot = spec.start + Duration::seconds(link as i64);

        let mut observation: Vec<ProbeSample> = (0..spec.samples_per_link)
            .map(|i| {
                let x = rng.gen_range(0.2 * capacity..0.98 * capacity);
                let mut y = (x / capacity + 1.0 - spec.abw / capacity).max(1.0);
                if spec.jitter > 0.0 {
                    y *= 1.0 + rng.gen_range(-spec.jitter..spec.jitter);
                }
                if rng.gen_bool(spec.burst_probability) {
                    y *= 1.0 + rng.gen_range(0.5..2.0);
                }

                let gin = len / x;
                let mut sample = ProbeSample::new(link_state_id, spec.experiment_id, gin, y * gin, len);
                sample.used_in_regression = false;
                sample.timestamp = Some(slot + Duration::milliseconds(i as i64));
                sample
            })
            .collect();

        mark_candidates(&mut observation, &query);
        samples.extend(observation);
    }

    log::debug!(
        "Generated {} samples, {} flagged for regression",
        samples.len(),
        samples.iter().filter(|s| s.used_in_regression).count()
    );
    Ok(samples)
}

/// Generate a complete single-experiment measurement dump.
pub fn generate_dump<R: Rng>(
    name: &str,
    profile: &ExperimentProfile,
    spec: &SynthSpec,
    rng: &mut R,
) -> Result<MeasurementDump, SynthError> {
    let samples = generate(profile, spec, rng)?;
    Ok(MeasurementDump {
        experiments: vec![ExperimentInfo {
            id: spec.experiment_id,
            name: name.to_string(),
        }],
        samples,
    })
}
