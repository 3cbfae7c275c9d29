//! Generation of new placement records.
//!
//! - [`grid_placements`]: one object per library template, laid out on a grid
//!   far from the playable area so the editor can fill in template details.
//! - [`scatter_extra_objects`]: extra objects around every record of a model,
//!   e.g. bushes next to trees.

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::info;
use rand::Rng;

use crate::config::{ExtraObjectsConfig, ObjectsConfig};
use crate::core::library::{Library, LibraryCollection};
use crate::core::loaders::{load_placements, PlacementRecord};
use crate::core::transforms::{round3, seeded_rng};
use crate::core::writers::{sibling_output, write_placements};

/// Default output of [`create_library_objects`].
pub const DEFAULT_OBJECTS_FILE: &str = "tb_all_objects.txt";

/// Suffix of the default output of [`add_extra_objects`].
pub const EXTRA_OUTPUT_SUFFIX: &str = "_out";

/// Lays out one record per template.
///
/// Every library starts a new column `spacing` further along x; within a
/// column each template is `spacing` further along y, starting at
/// `origin.y + 2 * spacing`.
pub fn grid_placements<'a, I>(libraries: I, config: &ObjectsConfig) -> Vec<PlacementRecord>
where
    I: IntoIterator<Item = &'a Library>,
{
    let [mut x, origin_y] = config.origin;
    let spacing = config.spacing;
    let mut records = Vec::new();

    for library in libraries {
        x += spacing;
        let mut y = origin_y + spacing;
        for template in &library.templates {
            y += spacing;
            records.push(PlacementRecord::at(template.name.clone(), x, y));
        }
    }

    records
}

/// Counts of one placement run.
#[derive(Debug, Clone)]
pub struct PlacementSummary {
    pub inputs: usize,
    pub created: usize,
    pub output: PathBuf,
}

/// Writes one placement record per template of every library in `library_folder`.
pub fn create_library_objects(
    library_folder: &Path,
    output: &Path,
    config: &ObjectsConfig,
) -> Result<PlacementSummary> {
    ensure!(config.spacing > 0.0, "Spacing must be positive, got {}", config.spacing);

    let collection = LibraryCollection::load(library_folder)
        .with_context(|| format!("Failed to load libraries from: {}", library_folder.display()))?;

    let records = grid_placements(collection.libraries(), config);
    write_placements(output, &records)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;
    info!("Created {} objects in {}", records.len(), output.display());

    Ok(PlacementSummary {
        inputs: collection.len(),
        created: records.len(),
        output: output.to_path_buf(),
    })
}

/// What to scatter and where.
#[derive(Debug, Clone)]
pub struct ExtraObjects {
    /// Model whose records receive extra objects, case-insensitive.
    pub target: String,
    /// Model of the added objects.
    pub model: String,
    pub amount: usize,
    /// Maximum distance from the target record.
    pub radius: f64,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl ExtraObjects {
    pub fn new(target: impl Into<String>, model: impl Into<String>, config: &ExtraObjectsConfig) -> Self {
        Self {
            target: target.into(),
            model: model.into(),
            amount: config.amount,
            radius: config.radius,
            scale_min: config.scale_min,
            scale_max: config.scale_max,
        }
    }

    fn scale_range(&self) -> (f64, f64) {
        if self.scale_min <= self.scale_max {
            (self.scale_min, self.scale_max)
        } else {
            (self.scale_max, self.scale_min)
        }
    }

    /// One new object near `anchor`.
    fn place<R: Rng + ?Sized>(&self, anchor: &PlacementRecord, rng: &mut R) -> PlacementRecord {
        let angle = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(0.0..=self.radius.max(0.0));
        let (lo, hi) = self.scale_range();

        PlacementRecord {
            dir: round3(rng.gen_range(0.0..360.0)),
            scale: round3(rng.gen_range(lo..=hi)),
            ..PlacementRecord::at(
                self.model.clone(),
                anchor.x + distance * angle.cos(),
                anchor.y + distance * angle.sin(),
            )
        }
    }
}

/// Creates `amount` new objects around every record whose model is the target.
///
/// Only the new objects are returned; the input records are left alone.
pub fn scatter_extra_objects<R: Rng + ?Sized>(
    records: &[PlacementRecord],
    extra: &ExtraObjects,
    rng: &mut R,
) -> Vec<PlacementRecord> {
    let mut created = Vec::new();
    for anchor in records
        .iter()
        .filter(|r| r.model.eq_ignore_ascii_case(&extra.target))
    {
        for _ in 0..extra.amount {
            created.push(extra.place(anchor, rng));
        }
    }
    created
}

/// Reads `input`, scatters extra objects and writes only the new ones.
///
/// The output defaults to `<stem>_out.txt` next to `input`.
pub fn add_extra_objects(
    input: &Path,
    output: Option<&Path>,
    extra: &ExtraObjects,
    seed: Option<u64>,
) -> Result<PlacementSummary> {
    ensure!(
        extra.radius.is_finite() && extra.radius >= 0.0,
        "Radius must be a finite value >= 0, got {}",
        extra.radius
    );

    let records = load_placements(input)
        .with_context(|| format!("Failed to load placement file: {}", input.display()))?;

    let mut rng = seeded_rng(seed);
    let created = scatter_extra_objects(&records, extra, &mut rng);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_output(input, EXTRA_OUTPUT_SUFFIX));
    write_placements(&output, &created)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;
    info!("Added {} '{}' objects near '{}'", created.len(), extra.model, extra.target);

    Ok(PlacementSummary {
        inputs: records.len(),
        created: created.len(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::LibraryEntry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::TempDir;

    fn library(name: &str, templates: &[&str]) -> Library {
        let mut library = Library::new(name);
        library.templates = templates
            .iter()
            .map(|t| LibraryEntry::new(*t, format!("{}.p3d", t), -1, -1).to_template(""))
            .collect();
        library
    }

    fn extra(radius: f64) -> ExtraObjects {
        ExtraObjects {
            target: "t_Inocarpus_F".to_string(),
            model: "b_Leucaena_F".to_string(),
            amount: 3,
            radius,
            scale_min: 0.5,
            scale_max: 2.0,
        }
    }

    #[test]
    fn test_grid_placements() {
        let libraries = vec![library("a", &["a1", "a2"]), library("b", &["b1"])];
        let records = grid_placements(&libraries, &ObjectsConfig::default());

        let layout: Vec<(&str, f64, f64)> = records
            .iter()
            .map(|r| (r.model.as_str(), r.x, r.y))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("a1", 200025.0, 50.0),
                ("a2", 200025.0, 75.0),
                ("b1", 200050.0, 50.0),
            ]
        );
    }

    #[test]
    fn test_create_library_objects() {
        let dir = TempDir::new().unwrap();
        library("roads", &["sign01", "sign02"])
            .save(dir.path().join("roads.tml"))
            .unwrap();
        let output = dir.path().join(DEFAULT_OBJECTS_FILE);

        let summary = create_library_objects(dir.path(), &output, &ObjectsConfig::default()).unwrap();

        assert_eq!(summary.inputs, 1);
        assert_eq!(summary.created, 2);
        let records = load_placements(&output).unwrap();
        assert_eq!(records[1].model, "sign02");
        assert_eq!(records[1].position(), [200025.0, 75.0]);
    }

    #[test]
    fn test_scatter_only_matching_records() {
        let records = vec![
            PlacementRecord::at("T_INOCARPUS_F", 100.0, 100.0),
            PlacementRecord::at("rock", 0.0, 0.0),
            PlacementRecord::at("t_Inocarpus_F", 500.0, 500.0),
        ];
        let mut rng = StdRng::seed_from_u64(5);

        let created = scatter_extra_objects(&records, &extra(2.0), &mut rng);

        assert_eq!(created.len(), 6);
        for (i, object) in created.iter().enumerate() {
            let anchor = if i < 3 { [100.0, 100.0] } else { [500.0, 500.0] };
            let distance = ((object.x - anchor[0]).powi(2) + (object.y - anchor[1]).powi(2)).sqrt();
            assert_eq!(object.model, "b_Leucaena_F");
            assert!(distance <= 2.0 + 1e-9);
            assert!((0.0..=360.0).contains(&object.dir));
            assert!((0.5..=2.0).contains(&object.scale));
            assert_eq!((object.pitch, object.bank, object.z), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn test_scatter_zero_radius_stays_on_anchor() {
        let records = vec![PlacementRecord::at("t_Inocarpus_F", 10.0, 20.0)];
        let created = scatter_extra_objects(&records, &extra(0.0), &mut StdRng::seed_from_u64(1));

        assert!(created.iter().all(|o| o.position() == [10.0, 20.0]));
    }

    #[test]
    fn test_add_extra_objects_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("trees.txt");
        fs::write(&input, "\"t_Inocarpus_F\";1.0;1.0;0.0;0.0;0.0;1.0;0.0;\n").unwrap();

        let summary = add_extra_objects(&input, None, &extra(2.0), Some(3)).unwrap();

        assert_eq!(summary.inputs, 1);
        assert_eq!(summary.created, 3);
        assert_eq!(summary.output, dir.path().join("trees_out.txt"));
        assert_eq!(load_placements(&summary.output).unwrap().len(), 3);
    }

    #[test]
    fn test_add_extra_objects_rejects_negative_radius() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("trees.txt");
        fs::write(&input, "").unwrap();

        assert!(add_extra_objects(&input, None, &extra(-1.0), None).is_err());
    }
}
