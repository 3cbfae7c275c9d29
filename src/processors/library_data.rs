//! Copies template data from one complete library into split libraries.
//!
//! The editor fills in template hashes only for libraries it has loaded; a
//! single library holding every template can donate them to the per-category
//! files generated by the categorizer.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::core::library::{Library, LibraryCollection};

/// Counts of one add-data run.
#[derive(Debug, Clone, Default)]
pub struct AddDataSummary {
    pub libraries: usize,
    pub updated: usize,
    /// Templates with no counterpart in the source library.
    pub missing: Vec<String>,
}

/// Copies the `Hash` of every template found (case-insensitive) in `source`.
///
/// # Returns
///
/// `(updated, missing)`: the number of templates that received a hash and the
/// names of those absent from `source`.
pub fn copy_template_hashes(libraries: &mut LibraryCollection, source: &Library) -> (usize, Vec<String>) {
    let mut updated = 0;
    let mut missing = Vec::new();

    for (_, library) in libraries.libraries_mut() {
        info!("{}", library.name);
        for template in library.templates.iter_mut() {
            match source.template(&template.name) {
                Some(found) => {
                    template.hash = found.hash.clone();
                    updated += 1;
                }
                None => {
                    warn!("Missing template: '{}'", template.name);
                    missing.push(template.name.clone());
                }
            }
        }
    }

    (updated, missing)
}

/// Adds the source library's data to every library in `library_folder` and
/// saves them in place.
pub fn add_library_data(library_folder: &Path, source_file: &Path) -> Result<AddDataSummary> {
    let mut libraries = LibraryCollection::load(library_folder)
        .with_context(|| format!("Failed to load libraries from: {}", library_folder.display()))?;
    let source = Library::from_file(source_file)
        .with_context(|| format!("Failed to load source library: {}", source_file.display()))?;

    let (updated, missing) = copy_template_hashes(&mut libraries, &source);
    libraries.save().context("Failed to save updated libraries")?;

    if !missing.is_empty() {
        warn!("Missing templates: {}", missing.len());
    }

    Ok(AddDataSummary {
        libraries: libraries.len(),
        updated,
        missing,
    })
}
