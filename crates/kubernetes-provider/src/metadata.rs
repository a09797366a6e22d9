//! Labels and annotations attached to every object created for a job

use cronpilot_core::labels::job_labels;
use cronpilot_core::Job;
use std::collections::BTreeMap;

/// Returns `(labels, annotations)` for a job.
///
/// Custom labels never overwrite platform labels. Annotations are only
/// bookkeeping, so custom ones are copied as they come.
pub fn build_metadata(job: &Job) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut labels = job_labels(job);
    for label in &job.metadata.labels {
        if labels.contains_key(&label.name) {
            continue;
        }
        labels.insert(label.name.clone(), label.value.clone());
    }

    let annotations = job
        .metadata
        .annotations
        .iter()
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect();

    (labels, annotations)
}
