//! Terrain Builder authoring tools.
//!
//! This crate provides tools for:
//! - Splitting a work drive into categorized library (`.tml`) files
//! - Reading and writing Terrain Builder placement files
//! - Removing placed objects too close to existing ones (KD-tree radius filter)
//! - Offsetting and randomizing placed objects
//! - Generating placeholder and extra objects
//! - Unpacking PBO archives onto the work drive
//!
//! # Example
//!
//! ```no_run
//! use terrain_tools::{core::loaders::load_placements, processors::filtering::filter_nearby};
//!
//! let existing = load_placements("existing.txt").unwrap();
//! let new = load_placements("new.txt").unwrap();
//! let kept = filter_nearby(&existing, new, 4.0).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    CategorizeConfig, ExtraObjectsConfig, ExtractConfig, NearbyConfig, ObjectsConfig, ToolsConfig,
};
pub use core::library::{Library, LibraryEntry};
pub use core::loaders::PlacementRecord;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
