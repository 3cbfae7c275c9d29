//! Library generation from categorized model entries.
//!
//! Call order for a full run:
//! 1. [`FolderWalker::walk`](super::categorize::FolderWalker::walk) for each target folder
//! 2. [`group_entries`] into categories
//! 3. [`make_unique`] once over all categories
//! 4. [`write_libraries`] and the duplicates report

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};

use super::categorize::FolderWalker;
use crate::core::library::{Library, LibraryEntry, LIBRARY_EXTENSION};
use crate::core::writers::write_lines;

/// Report of renamed templates, written next to the libraries.
pub const DUPLICATES_FILE: &str = "# duplicates.txt";

/// Entries per category, ordered by category name.
pub type Categories = BTreeMap<String, Vec<LibraryEntry>>;

/// Groups `(category, entry)` pairs, keeping entry order within a category.
pub fn group_entries<I>(entries: I) -> Categories
where
    I: IntoIterator<Item = (String, LibraryEntry)>,
{
    let mut categories = Categories::new();
    for (category, entry) in entries {
        categories.entry(category).or_default().push(entry);
    }
    categories
}

/// Renames entries so no two share a case-insensitive name across all categories.
///
/// Categories are visited in name order, entries in insertion order. The first
/// holder of a name keeps it; later ones get the first free `_1`, `_2`, ...
/// suffix.
///
/// # Returns
///
/// The new names of every renamed entry, in rename order.
pub fn make_unique(categories: &mut Categories) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut renamed = Vec::new();

    for entry in categories.values_mut().flat_map(|entries| entries.iter_mut()) {
        if taken.insert(entry.name.to_lowercase()) {
            continue;
        }

        let mut index = 1;
        let unique = loop {
            let candidate = format!("{}_{}", entry.name, index);
            if taken.insert(candidate.to_lowercase()) {
                break candidate;
            }
            index += 1;
        };

        entry.name = unique;
        renamed.push(entry.name.clone());
    }

    renamed
}

/// Builds one library per category, every template stamped with `date`.
pub fn build_libraries(categories: &Categories, date: &str) -> Vec<Library> {
    categories
        .iter()
        .map(|(category, entries)| {
            let mut library = Library::new(category.clone());
            library.templates = entries.iter().map(|e| e.to_template(date)).collect();
            library
        })
        .collect()
}

/// Writes `<category>.tml` for every library into `output`.
///
/// # Returns
///
/// Paths of the written files, in category order.
pub fn write_libraries(output: &Path, libraries: &[Library]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(libraries.len());
    for library in libraries {
        info!("Creating new library {}", library.name);
        let path = output.join(format!("{}.{}", library.name, LIBRARY_EXTENSION));
        library
            .save(&path)
            .with_context(|| format!("Failed to write library: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Writes the renamed template names, one per line.
pub fn write_duplicates(output: &Path, duplicates: &[String]) -> Result<PathBuf> {
    let path = output.join(DUPLICATES_FILE);
    warn!(
        "Found {} duplicate model names, they are autorenamed",
        duplicates.len()
    );
    write_lines(&path, duplicates)
        .with_context(|| format!("Failed to write duplicates: {}", path.display()))?;
    warn!("Wrote duplicate names to {}", path.display());
    Ok(path)
}

/// Outcome of a categorize run.
#[derive(Debug, Clone, Default)]
pub struct CategorizeSummary {
    pub models: usize,
    pub skipped: usize,
    pub libraries: Vec<PathBuf>,
    pub duplicates: Vec<String>,
    pub duplicates_file: Option<PathBuf>,
    pub interrupted: bool,
}

/// Walks every target folder and writes one library file per category.
///
/// An interrupt stops walking, but the entries found so far are still
/// written and reported.
///
/// # Arguments
///
/// * `root` - Work drive root that model paths are stored relative to
/// * `targets` - Folders below `root` to walk
/// * `blacklist` - Case-insensitive path substrings to skip
/// * `output` - Folder receiving the `.tml` files
/// * `interrupt` - Optional flag set by a Ctrl-C handler
pub fn categorize_to_libraries(
    root: &Path,
    targets: &[PathBuf],
    blacklist: &[String],
    output: &Path,
    interrupt: Option<&AtomicBool>,
) -> Result<CategorizeSummary> {
    let mut summary = CategorizeSummary::default();
    let mut found = Vec::new();

    for target in targets {
        let mut walker = FolderWalker::new(root, target, blacklist);
        let outcome = walker.walk(interrupt);
        summary.skipped += outcome.skipped;
        found.extend(outcome.entries);

        if outcome.interrupted {
            warn!("The process was interrupted by the keyboard");
            summary.interrupted = true;
            break;
        }
    }

    summary.models = found.len();
    let mut categories = group_entries(found);
    summary.duplicates = make_unique(&mut categories);

    let date = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
    let libraries = build_libraries(&categories, &date);
    summary.libraries = write_libraries(output, &libraries)?;

    if !summary.duplicates.is_empty() {
        summary.duplicates_file = Some(write_duplicates(output, &summary.duplicates)?);
    }

    info!("Completed with {} models processed", summary.models);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(name: &str) -> LibraryEntry {
        LibraryEntry::new(name, format!("a3\\{}.p3d", name), -1, -1)
    }

    fn names(categories: &Categories) -> Vec<(String, String)> {
        categories
            .iter()
            .flat_map(|(c, entries)| entries.iter().map(move |e| (c.clone(), e.name.clone())))
            .collect()
    }

    #[test]
    fn test_group_entries_keeps_order() {
        let categories = group_entries(vec![
            ("roads".to_string(), entry("sign01")),
            ("a3_rocks".to_string(), entry("rock1")),
            ("roads".to_string(), entry("sign02")),
        ]);

        assert_eq!(categories.len(), 2);
        assert_eq!(categories["roads"][1].name, "sign02");
        assert_eq!(categories.keys().next().unwrap(), "a3_rocks");
    }

    #[test]
    fn test_make_unique_same_category() {
        let mut categories = group_entries(vec![
            ("road".to_string(), entry("sign01")),
            ("road".to_string(), entry("sign01")),
        ]);

        let renamed = make_unique(&mut categories);

        assert_eq!(renamed, vec!["sign01_1"]);
        assert_eq!(
            names(&categories),
            vec![
                ("road".to_string(), "sign01".to_string()),
                ("road".to_string(), "sign01_1".to_string()),
            ]
        );
    }

    #[test]
    fn test_make_unique_across_categories_case_insensitive() {
        let mut categories = group_entries(vec![
            ("b".to_string(), entry("Rock")),
            ("a".to_string(), entry("rock")),
            ("c".to_string(), entry("ROCK")),
            ("c".to_string(), entry("rock_1")),
        ]);

        let renamed = make_unique(&mut categories);

        assert_eq!(renamed, vec!["Rock_1", "ROCK_2", "rock_1_1"]);
        let all: Vec<String> = names(&categories).into_iter().map(|(_, n)| n.to_lowercase()).collect();
        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(all.len(), 4);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_build_libraries() {
        let categories = group_entries(vec![("walls".to_string(), entry("wall1"))]);
        let libraries = build_libraries(&categories, "2024-01-01 00:00:00");

        assert_eq!(libraries.len(), 1);
        assert_eq!(libraries[0].name, "walls");
        assert_eq!(libraries[0].templates[0].date, "2024-01-01 00:00:00");
        assert_eq!(libraries[0].templates[0].file, "a3\\wall1.p3d");
    }

    #[test]
    fn test_categorize_to_libraries() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for relative in ["a3/roads_f/sign01.p3d", "a3/roads_f/old/sign01.p3d", "a3/rocks_f/r1.p3d"] {
            let path = work.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
        }

        let summary = categorize_to_libraries(
            work.path(),
            &[work.path().join("a3")],
            &[],
            out.path(),
            None,
        )
        .unwrap();

        assert_eq!(summary.models, 3);
        assert_eq!(summary.libraries.len(), 3);
        assert_eq!(summary.duplicates, vec!["sign01_1"]);
        assert!(!summary.interrupted);

        let duplicates = fs::read_to_string(out.path().join(DUPLICATES_FILE)).unwrap();
        assert_eq!(duplicates, "sign01_1\n");

        let roads = Library::from_file(out.path().join("a3_roads.tml")).unwrap();
        assert_eq!(roads.templates[0].name, "sign01");
        let old = Library::from_file(out.path().join("a3_roads_old.tml")).unwrap();
        assert_eq!(old.templates[0].name, "sign01_1");
    }

    #[test]
    fn test_interrupted_run_still_writes() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = work.path().join("a3").join("rocks_f").join("r1.p3d");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();

        let flag = AtomicBool::new(true);
        let summary = categorize_to_libraries(
            work.path(),
            &[work.path().join("a3")],
            &[],
            out.path(),
            Some(&flag),
        )
        .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.models, 0);
        assert!(summary.duplicates_file.is_none());
    }
}
