//! Regression-candidate marking for stores that carry no eligibility flags.
//!
//! Per link observation:
//! 1. Discard samples with `gin <= 0`, a payload below the probe packet size,
//!    or `len/gin` / `len/gout` at or above the physical capacity.
//! 2. Sort the rest by `gin`.
//! 3. Average the `gout` of the `ceil(n * min_confidence)` smallest-`gin`
//!    samples into the dispersion baseline `g_max_in`.
//! 4. Flag the samples with `gin < g_max_in`.

use std::collections::BTreeMap;

use super::CandidateQuery;
use crate::estimation::{LinkStateId, ProbeSample};

/// Recompute `used_in_regression` for every sample in place.
pub fn mark_candidates(samples: &mut [ProbeSample], query: &CandidateQuery) {
    let mut by_link: BTreeMap<LinkStateId, Vec<usize>> = BTreeMap::new();
    for (i, sample) in samples.iter_mut().enumerate() {
        sample.used_in_regression = false;
        by_link.entry(sample.link_state_id).or_default().push(i);
    }

    for indices in by_link.values() {
        let mut eligible: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| passes_physical_filter(&samples[i], query))
            .collect();
        if eligible.is_empty() {
            continue;
        }
        eligible.sort_by(|&a, &b| samples[a].gin.total_cmp(&samples[b].gin));

        let n = ((eligible.len() as f64 * query.min_confidence).ceil() as usize)
            .clamp(1, eligible.len());
        let g_max_in = eligible[..n].iter().map(|&i| samples[i].gout).sum::<f64>() / n as f64;

        for &i in &eligible {
            if samples[i].gin < g_max_in {
                samples[i].used_in_regression = true;
            }
        }
    }

    let flagged = samples.iter().filter(|s| s.used_in_regression).count();
    log::debug!(
        "Marked {} of {} samples as regression candidates across {} link observations",
        flagged,
        samples.len(),
        by_link.len()
    );
}

fn passes_physical_filter(sample: &ProbeSample, query: &CandidateQuery) -> bool {
    sample.gin > 0.0
        && sample.len >= query.probe_packet_size
        && sample.len / sample.gin < query.max_capacity
        && sample.len / sample.gout < query.max_capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> CandidateQuery {
        CandidateQuery {
            experiment_id: 1,
            max_capacity: 1_250_000.0,
            probe_packet_size: 1362.0,
            min_confidence: 0.1,
            window: None,
        }
    }

    #[test]
    fn test_marks_below_baseline() {
        let mut samples: Vec<ProbeSample> = (1..=10)
            .map(|i| ProbeSample {
                used_in_regression: false,
                ..ProbeSample::new(1, 1, 0.002 * i as f64, 0.005, 1362.0)
            })
            .collect();

        mark_candidates(&mut samples, &query());

        let flagged: Vec<f64> = samples
            .iter()
            .filter(|s| s.used_in_regression)
            .map(|s| s.gin)
            .collect();
        assert_eq!(flagged, vec![0.002, 0.004]);
    }

    #[test]
    fn test_physical_filter() {
        let mut samples = vec![
            // payload too small
            ProbeSample::new(1, 1, 0.002, 0.005, 100.0),
            // len/gin above capacity
            ProbeSample::new(1, 1, 0.0005, 0.005, 1362.0),
            // zero output gap
            ProbeSample::new(1, 1, 0.002, 0.0, 1362.0),
            // zero input gap
            ProbeSample::new(1, 1, 0.0, 0.005, 1362.0),
        ];

        mark_candidates(&mut samples, &query());
        assert!(samples.iter().all(|s| !s.used_in_regression));
    }

    #[test]
    fn test_links_use_own_baseline() {
        let mut samples = vec![
            ProbeSample::new(1, 1, 0.002, 0.003, 1362.0),
            ProbeSample::new(1, 1, 0.004, 0.003, 1362.0),
            ProbeSample::new(2, 1, 0.004, 0.010, 1362.0),
            ProbeSample::new(2, 1, 0.008, 0.010, 1362.0),
        ];

        mark_candidates(&mut samples, &query());

        let flags: Vec<bool> = samples.iter().map(|s| s.used_in_regression).collect();
        assert_eq!(flags, vec![true, false, true, true]);
    }
}
