//! Core data types and I/O operations.

pub mod library;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use library::{Library, LibraryCollection, LibraryEntry, LibraryError, Template};
pub use loaders::{load_placements, LoaderError, PlacementRecord};
pub use transforms::{Adjustment, FieldOffsets};
pub use writers::{write_placements, WriteError};
