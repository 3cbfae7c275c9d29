//! Command-line interface for the terrain tools.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ExtraObjectsConfig;
use crate::core::transforms::{Adjustment, FieldOffsets};
use crate::processors::extract::ExtractOptions;
use crate::processors::placement::{ExtraObjects, DEFAULT_OBJECTS_FILE};
use crate::ToolsConfig;

#[derive(Parser)]
#[command(name = "terrain-tools")]
#[command(about = "Terrain Builder library and placement tools", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate library files by walking model folders
    Categorize {
        /// Folders to walk (must be inside the root)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Work drive root, a parent of every path
        #[arg(long)]
        root: Option<PathBuf>,
        /// Skip model paths containing any of these
        #[arg(long, num_args = 1..)]
        blacklist: Option<Vec<String>>,
        /// Folder to create the libraries in
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create one object for every template in a library folder
    CreateObjects {
        /// Folder with .tml files
        library: PathBuf,
        /// Output placement file
        #[arg(short, long, default_value = DEFAULT_OBJECTS_FILE)]
        output: PathBuf,
        /// Distance between objects
        #[arg(short, long)]
        spacing: Option<f64>,
    },

    /// Copy template hashes from one library file into a library folder
    AddData {
        /// Folder with .tml files to update
        library: PathBuf,
        /// Library file holding every template
        source: PathBuf,
    },

    /// Remove objects close to already placed objects
    FilterNearby {
        /// Placement file with the existing objects
        reference: PathBuf,
        /// Placement file to filter
        target: PathBuf,
        /// Output file (defaults to <target>_OUT.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Removal radius in meters
        #[arg(short, long)]
        radius: Option<f64>,
    },

    /// Offset and randomize placed objects
    Offset {
        /// Placement file to process
        input: PathBuf,
        /// Output file (defaults to <input>_OUT.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'x', long = "x", default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,
        #[arg(short = 'y', long = "y", default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,
        #[arg(short = 'z', long = "z", default_value_t = 0.0, allow_negative_numbers = true)]
        z: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dir: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pitch: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        scale: f64,
        /// Random x range (+/-)
        #[arg(long, default_value_t = 0.0)]
        x_random: f64,
        /// Random y range (+/-)
        #[arg(long, default_value_t = 0.0)]
        y_random: f64,
        /// Random z range (+/-)
        #[arg(long, default_value_t = 0.0)]
        z_random: f64,
        /// Random direction range in degrees (+/-)
        #[arg(long, default_value_t = 0.0)]
        dir_random: f64,
        /// Random pitch range in degrees (+/-)
        #[arg(long, default_value_t = 0.0)]
        pitch_random: f64,
        /// Random scale range (+/-)
        #[arg(long, default_value_t = 0.0)]
        scale_random: f64,
        /// Seed for reproducible random values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Add extra objects near every object of a model
    AddObjects {
        /// Placement file to process
        input: PathBuf,
        /// Model to add objects near
        #[arg(long, default_value = "t_Inocarpus_F")]
        target: String,
        /// Model to place
        #[arg(long, default_value = "b_Leucaena_F")]
        model: String,
        /// Objects per matching entry
        #[arg(long)]
        amount: Option<usize>,
        /// Maximum distance from the matching entry
        #[arg(long)]
        radius: Option<f64>,
        /// Output file (defaults to <input>_out.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for reproducible random values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Unpack PBO archives into a work drive
    ExtractPbos {
        /// Folder with PBOs to unpack
        source: PathBuf,
        /// Where to unpack
        target: PathBuf,
        /// Copy only models and configs
        #[arg(short, long)]
        models: bool,
        /// Remove current files in the target folder of each PBO
        #[arg(long)]
        purge: bool,
        /// Also unpack missions, UI, language and animation PBOs
        #[arg(long)]
        all: bool,
        /// Unpack only PBOs matching the whitelist
        #[arg(long)]
        whitelist: bool,
    },

    /// Plot a placement file as a 2D scatter plot (PNG)
    Visualize {
        /// Placement file
        input: PathBuf,
        /// Output PNG file path (defaults to the input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Library folder used to color objects by template fill
        #[arg(short, long)]
        library: Option<PathBuf>,
        /// Maximum number of points to plot (subsamples if exceeded)
        #[arg(long, default_value_t = 1_000_000)]
        max_points: usize,
        /// Alpha/transparency value for points (0.0 to 1.0)
        #[arg(long, default_value_t = 0.8)]
        alpha: f32,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Log the error and exit with status 1.
fn fail(spinner: &ProgressBar, what: &str, e: impl std::fmt::Display) -> ! {
    spinner.finish_and_clear();
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match ToolsConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                ToolsConfig::default()
            }
        },
        None => ToolsConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Categorize { paths, root, blacklist, output } => {
            cmd_categorize(&paths, root, blacklist, output, &config);
        }
        Commands::CreateObjects { library, output, spacing } => {
            cmd_create_objects(&library, &output, spacing, &config);
        }
        Commands::AddData { library, source } => {
            cmd_add_data(&library, &source);
        }
        Commands::FilterNearby { reference, target, output, radius } => {
            cmd_filter_nearby(&reference, &target, output, radius, &config);
        }
        Commands::Offset {
            input,
            output,
            x,
            y,
            z,
            dir,
            pitch,
            scale,
            x_random,
            y_random,
            z_random,
            dir_random,
            pitch_random,
            scale_random,
            seed,
        } => {
            let offsets = FieldOffsets {
                x: Adjustment::new(x, x_random),
                y: Adjustment::new(y, y_random),
                z: Adjustment::new(z, z_random),
                dir: Adjustment::new(dir, dir_random),
                pitch: Adjustment::new(pitch, pitch_random),
                scale: Adjustment::new(scale, scale_random),
            };
            cmd_offset(&input, output, &offsets, seed);
        }
        Commands::AddObjects { input, target, model, amount, radius, output, seed } => {
            let extra_config = ExtraObjectsConfig {
                amount: amount.unwrap_or(config.extra_objects.amount),
                radius: radius.unwrap_or(config.extra_objects.radius),
                ..config.extra_objects.clone()
            };
            let extra = ExtraObjects::new(target, model, &extra_config);
            cmd_add_objects(&input, output, &extra, seed);
        }
        Commands::ExtractPbos { source, target, models, purge, all, whitelist } => {
            let options = ExtractOptions {
                models_only: models,
                purge,
                terrain: !all,
                whitelist,
            };
            cmd_extract(&source, &target, &options, &config);
        }
        Commands::Visualize { input, output, library, max_points, alpha } => {
            cmd_visualize(&input, output, library, max_points, alpha);
        }
    }
}

fn cmd_categorize(
    paths: &[PathBuf],
    root: Option<PathBuf>,
    blacklist: Option<Vec<String>>,
    output: Option<PathBuf>,
    config: &ToolsConfig,
) {
    use crate::processors::libraries;

    let start = Instant::now();

    let root = root.unwrap_or_else(|| config.categorize.root.clone());
    let blacklist = blacklist.unwrap_or_else(|| config.categorize.blacklist.clone());
    let output = output.unwrap_or_else(|| config.categorize.output.clone());

    // Ctrl-C stops the walk; what was found is still written
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install the interrupt handler: {}", e);
    }

    println!("Walking {} folder(s) below {}", paths.len(), root.display());

    let spinner = create_spinner("Searching for p3d files...");

    match libraries::categorize_to_libraries(&root, paths, &blacklist, &output, Some(interrupted.as_ref())) {
        Ok(summary) => {
            spinner.finish_and_clear();

            if !summary.duplicates.is_empty() {
                println!(
                    "Duplicate names can cause model switching in Terrain Builder and object placement mods"
                );
            }

            print_summary(
                "Library Generation Complete",
                &[
                    ("Root", root.display().to_string()),
                    ("Output directory", output.display().to_string()),
                    ("Models processed", summary.models.to_string()),
                    ("Models skipped", summary.skipped.to_string()),
                    ("Libraries written", summary.libraries.len().to_string()),
                    ("Duplicates renamed", summary.duplicates.len().to_string()),
                    ("Interrupted", summary.interrupted.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Library generation", e),
    }
}

fn cmd_create_objects(library: &Path, output: &Path, spacing: Option<f64>, config: &ToolsConfig) {
    use crate::processors::placement;

    let start = Instant::now();

    let mut objects = config.objects.clone();
    if let Some(spacing) = spacing {
        objects.spacing = spacing;
    }

    let spinner = create_spinner("Creating library objects...");

    match placement::create_library_objects(library, output, &objects) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Library Objects Created",
                &[
                    ("Library directory", library.display().to_string()),
                    ("Libraries", summary.inputs.to_string()),
                    ("Objects created", summary.created.to_string()),
                    ("Spacing", objects.spacing.to_string()),
                    ("Output file", summary.output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Creating objects", e),
    }
}

fn cmd_add_data(library: &Path, source: &Path) {
    use crate::processors::library_data;

    let start = Instant::now();
    let spinner = create_spinner("Copying library data...");

    match library_data::add_library_data(library, source) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Library Data Added",
                &[
                    ("Library directory", library.display().to_string()),
                    ("Source library", source.display().to_string()),
                    ("Libraries updated", summary.libraries.to_string()),
                    ("Templates updated", summary.updated.to_string()),
                    ("Missing templates", summary.missing.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Adding library data", e),
    }
}

fn cmd_filter_nearby(
    reference: &Path,
    target: &Path,
    output: Option<PathBuf>,
    radius: Option<f64>,
    config: &ToolsConfig,
) {
    use crate::processors::filtering;

    let start = Instant::now();
    let radius = radius.unwrap_or(config.nearby.radius);

    println!("Filtering {} against {}", target.display(), reference.display());
    println!("Radius: {}", radius);

    let spinner = create_spinner("Filtering nearby objects...");

    match filtering::filter_nearby_files(reference, target, output.as_deref(), radius) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Nearby Filter Complete",
                &[
                    ("Reference objects", summary.reference.to_string()),
                    ("Target objects", summary.targets.to_string()),
                    ("Removed", summary.removed.to_string()),
                    ("Kept", (summary.targets - summary.removed).to_string()),
                    ("Output file", summary.output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Nearby filter", e),
    }
}

fn cmd_offset(input: &Path, output: Option<PathBuf>, offsets: &FieldOffsets, seed: Option<u64>) {
    use crate::processors::offset;

    let start = Instant::now();
    let spinner = create_spinner("Applying offsets...");

    match offset::offset_file(input, output.as_deref(), offsets, seed) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Offset Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Records", summary.records.to_string()),
                    ("Output file", summary.output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Offset", e),
    }
}

fn cmd_add_objects(input: &Path, output: Option<PathBuf>, extra: &ExtraObjects, seed: Option<u64>) {
    use crate::processors::placement;

    let start = Instant::now();
    let spinner = create_spinner("Adding extra objects...");

    match placement::add_extra_objects(input, output.as_deref(), extra, seed) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Extra Objects Added",
                &[
                    ("Input file", input.display().to_string()),
                    ("Near model", extra.target.clone()),
                    ("Placed model", extra.model.clone()),
                    ("Objects created", summary.created.to_string()),
                    ("Output file", summary.output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Adding objects", e),
    }
}

fn cmd_extract(source: &Path, target: &Path, options: &ExtractOptions, config: &ToolsConfig) {
    use crate::processors::extract;

    let start = Instant::now();

    println!("Unpacking PBOs from {}", source.display());
    println!("Target: {}", target.display());

    let spinner = create_spinner("Unpacking PBOs...");

    match extract::extract_archives(source, target, &config.extract, options) {
        Ok(summary) => {
            spinner.finish_and_clear();

            if summary.failed > 0 {
                warn!("{} PBO(s) could not be extracted", summary.failed);
            }

            print_summary(
                "Extraction Complete",
                &[
                    ("PBOs found", summary.found.to_string()),
                    ("Skipped", summary.skipped.to_string()),
                    ("Purged", summary.purged.to_string()),
                    ("Extracted", summary.extracted.to_string()),
                    ("Failed", summary.failed.to_string()),
                    ("Files copied", summary.files_copied.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Extraction", e),
    }
}

fn cmd_visualize(
    input: &Path,
    output: Option<PathBuf>,
    library: Option<PathBuf>,
    max_points: usize,
    alpha: f32,
) {
    use crate::core::library::LibraryCollection;
    use crate::core::loaders;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| input.with_extension("png"));

    println!("Visualizing placements...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading placement file...");

    let records = match loaders::load_placements(input) {
        Ok(records) => records,
        Err(e) => fail(&spinner, "Loading placement file", e),
    };

    let libraries = match library {
        Some(folder) => {
            spinner.set_message("Loading libraries...");
            match LibraryCollection::load(&folder) {
                Ok(libraries) => Some(libraries),
                Err(e) => {
                    warn!("Failed to load libraries from {}: {}, using default colors", folder.display(), e);
                    None
                }
            }
        }
        None => None,
    };

    spinner.set_message("Generating plot...");

    match visualization::plot_placements(&output_path, &records, libraries.as_ref(), max_points, alpha) {
        Ok(drawn) => {
            spinner.finish_and_clear();

            print_summary(
                "Visualization Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Records", records.len().to_string()),
                    ("Records plotted", drawn.to_string()),
                    ("Alpha", alpha.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Visualization", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_offset_negative_values() {
        let cli = Cli::try_parse_from([
            "terrain-tools", "offset", "objects.txt", "-x", "-200000", "--dir-random", "10", "--seed", "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Offset { x, dir_random, seed, y, .. } => {
                assert_eq!(x, -200000.0);
                assert_eq!(dir_random, 10.0);
                assert_eq!(y, 0.0);
                assert_eq!(seed, Some(4));
            }
            _ => panic!("Expected offset command"),
        }
    }

    #[test]
    fn test_parse_categorize_with_globals() {
        let cli = Cli::try_parse_from([
            "terrain-tools", "-vv", "categorize", "P:/a3", "P:/ca", "--root", "P:/", "-o", "Library",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Categorize { paths, root, blacklist, .. } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(root, Some(PathBuf::from("P:/")));
                assert!(blacklist.is_none());
            }
            _ => panic!("Expected categorize command"),
        }
    }
}
