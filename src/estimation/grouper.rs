//! Partitioning of probe samples into link observations.

use std::collections::BTreeMap;

use super::types::{LinkStateId, ProbeSample};

/// Group regression candidates by `link_state_id`.
///
/// Samples not flagged `used_in_regression` are dropped, so a link
/// observation without any flagged sample produces no group. Input order is
/// preserved inside each group.
pub fn group_by_link(samples: &[ProbeSample]) -> BTreeMap<LinkStateId, Vec<&ProbeSample>> {
    let mut groups: BTreeMap<LinkStateId, Vec<&ProbeSample>> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.used_in_regression) {
        groups.entry(sample.link_state_id).or_default().push(sample);
    }
    groups
}
