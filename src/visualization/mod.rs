//! Visualization of placement files.
//!
//! Renders a top-down 2D scatter plot (x vs y) of placed objects as PNG,
//! each object drawn in the fill color of its library template.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::library::{tb_color_to_rgba, LibraryCollection};
use crate::core::loaders::PlacementRecord;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No placement records to plot")]
    EmptyPlacements,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color for models without a known template.
const DEFAULT_COLOR: (u8, u8, u8) = (100, 149, 237);

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Plot placement records as a scatter plot and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `records` - Records to draw
/// * `libraries` - Templates whose fill color is used per model, if any
/// * `max_points` - Maximum number of records to plot (subsamples if exceeded)
/// * `alpha` - Alpha/transparency value for points (0.0 to 1.0)
///
/// # Returns
///
/// The number of records drawn.
pub fn plot_placements(
    output_path: &Path,
    records: &[PlacementRecord],
    libraries: Option<&LibraryCollection>,
    max_points: usize,
    alpha: f32,
) -> Result<usize> {
    if records.is_empty() {
        return Err(VisualizationError::EmptyPlacements);
    }

    let n = records.len();
    let max_points = max_points.max(1);
    let step = if n > max_points { n.div_ceil(max_points) } else { 1 };
    let alpha = alpha.clamp(0.0, 1.0) as f64;

    let points: Vec<(f64, f64, RGBAColor)> = records
        .iter()
        .step_by(step)
        .map(|record| {
            let color = libraries
                .and_then(|libs| libs.template(&record.model))
                .map(|template| {
                    let [r, g, b, _] = tb_color_to_rgba(template.fill, 255);
                    RGBAColor(r, g, b, alpha)
                })
                .unwrap_or(RGBAColor(DEFAULT_COLOR.0, DEFAULT_COLOR.1, DEFAULT_COLOR.2, alpha));
            (record.x, record.y, color)
        })
        .collect();

    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    // No mesh or labels: text rendering needs system fonts
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plotting_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y, color)| Circle::new((*x, *y), 2, color.filled())),
        )
        .map_err(plotting_error)?;

    root.present().map_err(plotting_error)?;

    Ok(points.len())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64, RGBAColor)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y, _) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::{Library, LibraryEntry};
    use tempfile::TempDir;

    #[test]
    fn test_plot_placements() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("objects.png");
        let records: Vec<PlacementRecord> = (0..50)
            .map(|i| PlacementRecord::at(if i % 2 == 0 { "tree" } else { "rock" }, i as f64, (i * 2) as f64))
            .collect();

        let mut library = Library::new("veg");
        library
            .templates
            .push(LibraryEntry::new("tree", "tree.p3d", -16_760_832, -1).to_template(""));
        let mut libraries = LibraryCollection::default();
        libraries.push(dir.path().join("veg.tml"), library);

        let drawn = plot_placements(&output, &records, Some(&libraries), 20, 0.8).unwrap();

        assert!(drawn <= 20);
        assert!(output.exists());
    }

    #[test]
    fn test_plot_empty() {
        let dir = TempDir::new().unwrap();
        let result = plot_placements(&dir.path().join("x.png"), &[], None, 10, 1.0);
        assert!(matches!(result, Err(VisualizationError::EmptyPlacements)));
    }

    #[test]
    fn test_bounds_single_point() {
        let points = vec![(5.0, 5.0, RGBAColor(0, 0, 0, 1.0))];
        assert_eq!(compute_bounds(&points), (4.0, 6.0, 4.0, 6.0));
    }
}
