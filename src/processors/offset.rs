//! File-level offset and jitter of placement records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::core::loaders::load_placements;
use crate::core::transforms::{apply_offsets, seeded_rng, FieldOffsets};
use crate::core::writers::{sibling_output, write_placements};

/// Suffix of the default output file, next to the input.
pub const OUTPUT_SUFFIX: &str = "_OUT";

/// Counts of one offset run.
#[derive(Debug, Clone)]
pub struct OffsetSummary {
    pub records: usize,
    pub output: PathBuf,
}

/// Applies `offsets` to every record of `input` and writes the result.
///
/// # Arguments
///
/// * `input` - Placement file to read
/// * `output` - Destination, `<stem>_OUT.txt` next to `input` if `None`
/// * `offsets` - Offsets and random ranges per field
/// * `seed` - Fixes the random draws when set
pub fn offset_file(
    input: &Path,
    output: Option<&Path>,
    offsets: &FieldOffsets,
    seed: Option<u64>,
) -> Result<OffsetSummary> {
    let mut records = load_placements(input)
        .with_context(|| format!("Failed to load placement file: {}", input.display()))?;

    if offsets.is_noop() {
        warn!("No offset or random range given, records are copied unchanged");
    }

    let mut rng = seeded_rng(seed);
    apply_offsets(&mut records, offsets, &mut rng);
    info!("Adjusted {} records", records.len());

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_output(input, OUTPUT_SUFFIX));
    write_placements(&output, &records)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    Ok(OffsetSummary {
        records: records.len(),
        output,
    })
}
