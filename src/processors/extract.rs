//! PBO archive extraction through an external unpacking tool.
//!
//! For every selected `<source>/<stem>.pbo` the tool is run as
//! `<tool> -S -P <archive>`, which unpacks into `<source>/<stem>/`. Each
//! folder inside is then copied to `<target>/<folder>` and removed from the
//! source. One archive failing never stops the others.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::ExtractConfig;

/// Archive file extension.
pub const ARCHIVE_EXTENSION: &str = "pbo";

/// Errors that can occur during extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{role} directory '{path}' is not a directory")]
    NotADirectory { role: &'static str, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' exited with {status} for {archive}")]
    ToolFailed {
        tool: String,
        archive: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("No unpacked folder at {0}")]
    NothingUnpacked(PathBuf),
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Switches of one extraction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Copy only files with a model extension.
    pub models_only: bool,
    /// Remove `<target>/<stem>` before unpacking.
    pub purge: bool,
    /// Skip everything in the full ignore list rather than just the always-ignored names.
    pub terrain: bool,
    /// Unpack only archives matching the whitelist.
    pub whitelist: bool,
}

/// Lists the archives directly inside `source`, sorted by name.
pub fn find_archives(source: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        let is_archive = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
            .unwrap_or(false);
        if is_archive && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn contains_any(stem: &str, patterns: &[String]) -> bool {
    let stem = stem.to_lowercase();
    patterns.iter().any(|p| stem.contains(&p.to_lowercase()))
}

/// Splits archives into `(selected, skipped)` by the ignore list and whitelist.
pub fn select_archives(
    archives: Vec<PathBuf>,
    config: &ExtractConfig,
    options: &ExtractOptions,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let ignore = if options.terrain {
        &config.ignore
    } else {
        &config.ignore_always
    };

    archives.into_iter().partition(|archive| {
        let stem = stem_of(archive);
        if options.whitelist && !contains_any(&stem, &config.whitelist) {
            return false;
        }
        !contains_any(&stem, ignore)
    })
}

/// Copies the file tree under `from` into `to`.
///
/// When `extensions` is not empty only files with one of them
/// (case-insensitive) are copied.
///
/// # Returns
///
/// The number of files copied.
pub fn copy_tree(from: &Path, to: &Path, extensions: &[String]) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(from) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", from.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !extensions.is_empty() {
            let keep = path
                .extension()
                .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e.as_str())))
                .unwrap_or(false);
            if !keep {
                continue;
            }
        }

        let Ok(relative) = path.strip_prefix(from) else {
            continue;
        };
        let destination = to.join(relative);
        let copy_error = |source| ExtractError::Copy {
            from: path.to_path_buf(),
            to: destination.clone(),
            source,
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(copy_error)?;
        }
        fs::copy(path, &destination).map_err(copy_error)?;
        copied += 1;
    }

    Ok(copied)
}

/// Runs the unpacking tool on one archive and moves its folders into `target`.
///
/// # Returns
///
/// The number of files copied into `target`.
pub fn unpack_archive(
    archive: &Path,
    target: &Path,
    config: &ExtractConfig,
    models_only: bool,
) -> Result<usize> {
    let status = Command::new(&config.tool)
        .arg("-S")
        .arg("-P")
        .arg(archive)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| ExtractError::Spawn {
            tool: config.tool.clone(),
            source,
        })?;

    if !status.success() {
        return Err(ExtractError::ToolFailed {
            tool: config.tool.clone(),
            archive: archive.to_path_buf(),
            status,
        });
    }

    let unpacked = archive.with_extension("");
    if !unpacked.is_dir() {
        return Err(ExtractError::NothingUnpacked(unpacked));
    }

    let extensions: &[String] = if models_only {
        &config.model_extensions
    } else {
        &[]
    };

    let mut folders = Vec::new();
    for entry in fs::read_dir(&unpacked)? {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        }
    }
    folders.sort();

    let mut copied = 0;
    for folder in folders {
        let Some(name) = folder.file_name() else {
            continue;
        };
        let destination = target.join(name);
        debug!("Copying {} to {}", folder.display(), destination.display());
        copied += copy_tree(&folder, &destination, extensions)?;
        fs::remove_dir_all(&folder)?;
    }

    Ok(copied)
}

/// Counts of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    pub found: usize,
    pub skipped: usize,
    pub purged: usize,
    pub extracted: usize,
    pub failed: usize,
    pub files_copied: usize,
}

/// Unpacks every selected archive of `source` into `target`.
///
/// # Errors
///
/// Returns [`ExtractError::NotADirectory`] before doing anything if either
/// folder is missing. Failures of single archives are logged and counted.
pub fn extract_archives(
    source: &Path,
    target: &Path,
    config: &ExtractConfig,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    if !target.is_dir() {
        return Err(ExtractError::NotADirectory {
            role: "Target",
            path: target.to_path_buf(),
        });
    }
    if !source.is_dir() {
        return Err(ExtractError::NotADirectory {
            role: "Source",
            path: source.to_path_buf(),
        });
    }

    let archives = find_archives(source)?;
    let found = archives.len();
    let (selected, skipped) = select_archives(archives, config, options);
    for archive in &skipped {
        info!("Skipping {}", stem_of(archive));
    }

    let mut summary = ExtractSummary {
        found,
        skipped: skipped.len(),
        ..ExtractSummary::default()
    };

    let mut purge_failed = Vec::new();
    if options.purge {
        for archive in &selected {
            let existing = target.join(stem_of(archive));
            if !existing.exists() {
                continue;
            }
            info!("Purging {}", existing.display());
            match fs::remove_dir_all(&existing) {
                Ok(()) => summary.purged += 1,
                Err(e) => {
                    warn!("Failed to purge {}, skipping its archive: {}", existing.display(), e);
                    summary.failed += 1;
                    purge_failed.push(archive);
                }
            }
        }
    }

    for archive in &selected {
        if purge_failed.contains(&archive) {
            continue;
        }
        info!("Unpacking {}", stem_of(archive));
        match unpack_archive(archive, target, config, options.models_only) {
            Ok(copied) => {
                summary.extracted += 1;
                summary.files_copied += copied;
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", archive.display(), e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
