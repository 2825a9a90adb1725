//! JSON measurement dumps.
//!
//! Format: `{"experiments": [{"id", "name"}], "samples": [ProbeSample]}`.
//! Sample rows that fail to parse are skipped with a warning instead of
//! failing the whole load.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::{ExperimentInfo, MeasurementDump};
use crate::estimation::ProbeSample;

/// Load a JSON dump from disk
pub fn load_json_dump(path: &Path) -> Result<MeasurementDump> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read measurement dump from {}", path.display()))?;
    parse_json_dump(&content)
        .with_context(|| format!("Failed to parse measurement dump {}", path.display()))
}

/// Parse the text of a JSON dump
pub fn parse_json_dump(content: &str) -> Result<MeasurementDump> {
    // Parse as generic JSON first to tolerate malformed sample rows
    let json: serde_json::Value =
        serde_json::from_str(content).context("Measurement dump is not valid JSON")?;

    let experiments: Vec<ExperimentInfo> = match json.get("experiments") {
        Some(value) => serde_json::from_value(value.clone())
            .context("Failed to parse experiments table")?,
        None => Vec::new(),
    };

    let mut samples = Vec::new();
    let mut skipped = 0;

    if let Some(rows) = json.get("samples").and_then(|v| v.as_array()) {
        for row in rows {
            match serde_json::from_value::<ProbeSample>(row.clone()) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    log::debug!("Skipping sample row: {}", e);
                    skipped += 1;
                }
            }
        }
    } else {
        log::warn!("Measurement dump has no samples array");
    }

    if skipped > 0 {
        log::warn!("Skipped {} malformed sample rows", skipped);
    }

    Ok(MeasurementDump { experiments, samples })
}

/// Write a JSON dump to disk
pub fn write_json_dump(dump: &MeasurementDump, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(dump).context("Failed to serialize measurement dump")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write measurement dump to {}", path.display()))?;
    log::info!("Measurement dump written to {}", path.display());
    Ok(())
}
