//! Nearby filter: drops target records lying close to any reference record.
//!
//! Uses `kiddo` KD-tree radius queries over the reference `(x, y)`
//! positions, so a run costs O((n + m) log n) rather than a pairwise scan.
//! Exact duplicate positions are indexed once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use log::{debug, info};
use thiserror::Error;

use crate::core::loaders::{load_placements, PlacementRecord};
use crate::core::writers::{sibling_output, write_placements};

/// Suffix of the default output file, next to the target file.
pub const OUTPUT_SUFFIX: &str = "_OUT";

/// Added to the KD-tree query radius; hits are re-checked exactly.
const QUERY_PADDING: f64 = 1e-6;

/// Errors that can occur during filtering operations.
#[derive(Debug, Error)]
pub enum FilteringError {
    #[error("Radius must be a finite value >= 0, got {0}")]
    InvalidRadius(f64),
}

/// Spatial index over reference positions answering "is anything within r?".
pub struct NearbyFilter {
    radius_sq: f64,
    query_sq: f64,
    points: Vec<[f64; 2]>,
    tree: Option<ImmutableKdTree<f64, 2>>,
}

impl NearbyFilter {
    /// Builds the index over the `(x, y)` of `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`FilteringError::InvalidRadius`] for a negative or non-finite radius.
    pub fn new(reference: &[PlacementRecord], radius: f64) -> std::result::Result<Self, FilteringError> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(FilteringError::InvalidRadius(radius));
        }

        let points = unique_positions(reference);
        // An empty slice can't build a tree; nothing is ever near
        let tree = if points.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(&points))
        };

        Ok(Self {
            radius_sq: radius * radius,
            query_sq: (radius + QUERY_PADDING).powi(2),
            points,
            tree,
        })
    }

    /// Returns true if some reference position lies within the radius,
    /// boundary included.
    pub fn is_near(&self, position: [f64; 2]) -> bool {
        let Some(tree) = &self.tree else {
            return false;
        };

        tree.within::<SquaredEuclidean>(&position, self.query_sq)
            .iter()
            .any(|nn| {
                let [rx, ry] = self.points[nn.item as usize];
                let (dx, dy) = (position[0] - rx, position[1] - ry);
                dx * dx + dy * dy <= self.radius_sq
            })
    }

    /// Keeps the targets that are not near any reference, in input order.
    pub fn retain_far(&self, targets: Vec<PlacementRecord>) -> Vec<PlacementRecord> {
        targets
            .into_iter()
            .filter(|record| !self.is_near(record.position()))
            .collect()
    }
}

/// Distinct `(x, y)` positions of `records`, sorted.
fn unique_positions(records: &[PlacementRecord]) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = records.iter().map(PlacementRecord::position).collect();
    points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    points.dedup();
    points
}

/// Removes every target within `radius` of any reference record.
///
/// # Arguments
///
/// * `reference` - Records that stay where they are
/// * `targets` - Records to filter
/// * `radius` - Removal distance in meters, inclusive
///
/// # Returns
///
/// The remaining targets in their original order. An empty reference set
/// returns `targets` unchanged.
pub fn filter_nearby(
    reference: &[PlacementRecord],
    targets: Vec<PlacementRecord>,
    radius: f64,
) -> std::result::Result<Vec<PlacementRecord>, FilteringError> {
    let filter = NearbyFilter::new(reference, radius)?;
    Ok(filter.retain_far(targets))
}

/// Counts of one file-level nearby filter run.
#[derive(Debug, Clone)]
pub struct NearbySummary {
    pub reference: usize,
    pub targets: usize,
    pub removed: usize,
    pub output: PathBuf,
}

/// Filters a target placement file against a reference placement file.
///
/// Both files are loaded before anything is written. The output defaults
/// to `<target stem>_OUT.txt` next to the target.
pub fn filter_nearby_files(
    reference_path: &Path,
    target_path: &Path,
    output: Option<&Path>,
    radius: f64,
) -> Result<NearbySummary> {
    let reference = load_placements(reference_path)
        .with_context(|| format!("Failed to load reference file: {}", reference_path.display()))?;
    let targets = load_placements(target_path)
        .with_context(|| format!("Failed to load target file: {}", target_path.display()))?;
    info!(
        "Filtering {} targets against {} reference objects (radius {})",
        targets.len(),
        reference.len(),
        radius
    );

    let target_count = targets.len();
    let kept = filter_nearby(&reference, targets, radius)?;
    let removed = target_count - kept.len();
    debug!("Removed {} of {} targets", removed, target_count);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_output(target_path, OUTPUT_SUFFIX));
    write_placements(&output, &kept)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    Ok(NearbySummary {
        reference: reference.len(),
        targets: target_count,
        removed,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(x: f64, y: f64) -> PlacementRecord {
        PlacementRecord::at("obj", x, y)
    }

    fn positions(records: &[PlacementRecord]) -> Vec<[f64; 2]> {
        records.iter().map(PlacementRecord::position).collect()
    }

    #[test]
    fn test_filter_basic_example() {
        let kept = filter_nearby(&[record(0.0, 0.0)], vec![record(0.0, 3.0), record(0.0, 5.0)], 4.0).unwrap();
        assert_eq!(positions(&kept), vec![[0.0, 5.0]]);
    }

    #[test]
    fn test_boundary_is_removed() {
        let reference = vec![record(10.0, 10.0)];
        let targets = vec![record(10.0, 14.0), record(13.0, 14.0), record(13.0, 14.000001)];

        let kept = filter_nearby(&reference, targets.clone(), 4.0).unwrap();
        assert_eq!(positions(&kept), vec![[13.0, 14.0], [13.0, 14.000001]]);

        let kept = filter_nearby(&reference, targets, 5.0).unwrap();
        assert_eq!(positions(&kept), vec![[13.0, 14.000001]]);
    }

    #[test]
    fn test_empty_reference_keeps_everything() {
        let targets = vec![record(1.0, 1.0), record(1.0, 1.0), record(-5.0, 2.0)];
        for radius in [0.0, 4.0, 1000.0] {
            let kept = filter_nearby(&[], targets.clone(), radius).unwrap();
            assert_eq!(kept, targets);
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let reference = vec![record(0.0, 0.0), record(100.0, 100.0)];
        let targets = vec![
            record(50.0, 50.0),
            record(101.0, 100.0),
            record(-20.0, 0.0),
            record(0.5, 0.5),
            record(30.0, -30.0),
        ];

        let kept = filter_nearby(&reference, targets, 2.0).unwrap();
        assert_eq!(positions(&kept), vec![[50.0, 50.0], [-20.0, 0.0], [30.0, -30.0]]);
    }

    #[test]
    fn test_zero_radius_removes_exact_matches() {
        let kept = filter_nearby(&[record(3.0, 4.0)], vec![record(3.0, 4.0), record(3.0, 4.1)], 0.0).unwrap();
        assert_eq!(positions(&kept), vec![[3.0, 4.1]]);
    }

    #[test]
    fn test_many_references() {
        let reference: Vec<PlacementRecord> = (0..1000)
            .map(|i| record((i % 40) as f64 * 10.0, (i / 40) as f64 * 10.0))
            .collect();
        let targets = vec![record(5.0, 5.0), record(201.0, 99.0), record(1000.0, 1000.0)];

        let kept = filter_nearby(&reference, targets, 1.5).unwrap();
        assert_eq!(positions(&kept), vec![[5.0, 5.0], [1000.0, 1000.0]]);
    }

    #[test]
    fn test_identical_references() {
        let reference = vec![record(1.0, 1.0); 100];
        let targets = vec![record(1.0, 1.0), record(1.0, 4.0), record(1.0, 6.0)];

        let kept = filter_nearby(&reference, targets, 4.0).unwrap();
        assert_eq!(positions(&kept), vec![[1.0, 6.0]]);
        assert_eq!(unique_positions(&reference).len(), 1);
    }

    #[test]
    fn test_references_sharing_one_axis() {
        let column: Vec<PlacementRecord> = (0..100)
            .map(|i| record(200025.0, 50.0 + 25.0 * i as f64))
            .collect();
        let row: Vec<PlacementRecord> = (0..100)
            .map(|i| record(25.0 * i as f64, -7.0))
            .collect();
        let targets = vec![
            record(200025.0, 50.0),
            record(200027.0, 1000.0),
            record(200030.0, 1012.5),
            record(200025.0, 2600.0),
            record(1000.0, -8.0),
            record(1012.5, 0.0),
        ];

        let kept = filter_nearby(&column, targets.clone(), 4.0).unwrap();
        assert_eq!(kept.len(), targets.len() - 2);
        let kept = filter_nearby(&row, kept, 4.0).unwrap();
        assert_eq!(
            positions(&kept),
            vec![[200030.0, 1012.5], [200025.0, 2600.0], [1012.5, 0.0]]
        );
    }

    #[test]
    fn test_grid_placements_against_themselves() {
        use crate::config::ObjectsConfig;
        use crate::core::library::{Library, LibraryEntry};
        use crate::processors::placement::grid_placements;

        let libraries: Vec<Library> = (0..3)
            .map(|l| {
                let mut library = Library::new(format!("lib{}", l));
                for t in 0..80 {
                    let name = format!("obj{}_{}", l, t);
                    let entry = LibraryEntry::new(name.clone(), format!("{}.p3d", name), -1, -1);
                    library.templates.push(entry.to_template(""));
                }
                library
            })
            .collect();
        let records = grid_placements(&libraries, &ObjectsConfig::default());
        assert_eq!(records.len(), 240);

        assert!(filter_nearby(&records, records.clone(), 4.0).unwrap().is_empty());

        let shifted: Vec<PlacementRecord> = records
            .iter()
            .map(|r| record(r.x + 12.5, r.y))
            .collect();
        assert_eq!(filter_nearby(&records, shifted.clone(), 4.0).unwrap(), shifted);
    }

    #[test]
    fn test_invalid_radius() {
        assert!(matches!(
            NearbyFilter::new(&[], -1.0),
            Err(FilteringError::InvalidRadius(_))
        ));
        assert!(NearbyFilter::new(&[], f64::NAN).is_err());
    }

    #[test]
    fn test_filter_nearby_files() {
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("existing.txt");
        let target = dir.path().join("new.txt");
        fs::write(&reference, "\"house\";0.0;0.0;0.0;0.0;0.0;1.0;0.0;\n").unwrap();
        fs::write(
            &target,
            "\"tree\";0.0;3.0;0.0;0.0;0.0;1.0;0.0;\n\"tree\";0.0;5.0;0.0;0.0;0.0;1.0;0.0;\n",
        )
        .unwrap();

        let summary = filter_nearby_files(&reference, &target, None, 4.0).unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.output, dir.path().join("new_OUT.txt"));
        let content = fs::read_to_string(&summary.output).unwrap();
        assert_eq!(
            content,
            "\"tree\";0.000000;5.000000;0.000000;0.000000;0.000000;1.000000;0.000000;\n"
        );
    }

    #[test]
    fn test_filter_nearby_files_missing_reference() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("new.txt");
        fs::write(&target, "").unwrap();

        let result = filter_nearby_files(&dir.path().join("nope.txt"), &target, None, 4.0);
        assert!(result.is_err());
        assert!(!dir.path().join("new_OUT.txt").exists());
    }
}
