//! Compressed binary snapshots of a measurement store.
//!
//! A snapshot is the [`MeasurementDump`] serialised with bincode and wrapped
//! in a zstd frame. Loading one is much faster than re-parsing a large JSON
//! dump.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::MeasurementDump;

const ZSTD_LEVEL: i32 = 3;

/// Write a snapshot to disk
pub fn write_snapshot(dump: &MeasurementDump, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create snapshot {}", path.display()))?;
    let mut encoder = zstd::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)
        .context("Failed to start zstd encoder")?;
    bincode::serialize_into(&mut encoder, dump).context("Failed to serialize snapshot")?;
    encoder.finish().context("Failed to finish zstd frame")?;

    log::info!(
        "Snapshot with {} samples written to {}",
        dump.samples.len(),
        path.display()
    );
    Ok(())
}

/// Load a snapshot from disk
pub fn load_snapshot(path: &Path) -> Result<MeasurementDump> {
    let file =
        File::open(path).with_context(|| format!("Failed to open snapshot {}", path.display()))?;
    let decoder = zstd::Decoder::new(BufReader::new(file)).context("Failed to start zstd decoder")?;
    let dump: MeasurementDump = bincode::deserialize_from(decoder)
        .with_context(|| format!("Failed to decode snapshot {}", path.display()))?;
    Ok(dump)
}
