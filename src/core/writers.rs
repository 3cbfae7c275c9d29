//! Data writers for placement files and plain text reports.
//!
//! Placement records are written one per line in the Terrain Builder import
//! format, with every number printed to 6 decimals:
//!
//! ```text
//! "bw_SetBig_Brains_F";200003.000000;6.000000;0.000000;0.000000;0.000000;1.000000;0.000000;
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::loaders::PlacementRecord;

/// Failures while producing an output file.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot create output folder {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open {} for writing: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing {} failed: {source}", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates the missing folders above `path`.
fn create_output_folder(path: &Path) -> Result<()> {
    match path.parent() {
        Some(folder) if !folder.as_os_str().is_empty() => {
            fs::create_dir_all(folder).map_err(|source| WriteError::CreateDirectory {
                path: folder.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Opens `path` for buffered writing, creating its folder first.
fn open_output(path: &Path) -> Result<BufWriter<File>> {
    create_output_folder(path)?;
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| WriteError::CreateFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes every item on its own line.
fn write_lines_with<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    let mut out = open_output(path)?;
    let failed = |source| WriteError::WriteFile {
        path: path.to_path_buf(),
        source,
    };

    lines
        .into_iter()
        .try_for_each(|line| writeln!(out, "{}", line))
        .and_then(|_| out.flush())
        .map_err(failed)
}

/// Write placement records to a Terrain Builder text file.
///
/// `path`'s folder is created when missing. Records are written in order,
/// so positional identity survives a load/write cycle.
///
/// # Errors
///
/// [`WriteError`] naming the path that could not be created or written.
///
/// # Example
///
/// ```no_run
/// use terrain_tools::core::loaders::PlacementRecord;
/// use terrain_tools::core::writers::write_placements;
/// use std::path::Path;
///
/// let records = vec![PlacementRecord::at("t_Inocarpus_F", 100.0, 200.0)];
/// write_placements(Path::new("objects.txt"), &records).unwrap();
/// ```
pub fn write_placements(path: &Path, records: &[PlacementRecord]) -> Result<()> {
    write_lines_with(path, records)
}

/// Write one string per line, e.g. the renamed duplicate templates.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    write_lines_with(path, lines)
}

/// Write a whole text document.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    create_output_folder(path)?;
    fs::write(path, content).map_err(|source| WriteError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds `<stem><suffix>.txt` next to `input`, e.g. `objects_OUT.txt`.
pub fn sibling_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.txt", stem, suffix))
}
