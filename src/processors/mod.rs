//! Data processing modules.

pub mod categorize;
pub mod extract;
pub mod filtering;
pub mod libraries;
pub mod library_data;
pub mod offset;
pub mod placement;

// Re-export key types for convenience
pub use categorize::{classify, clean_name, Category, FolderWalker, KeyedCache};
pub use extract::{extract_archives, ExtractError, ExtractOptions, ExtractSummary};
pub use filtering::{filter_nearby, filter_nearby_files, FilteringError, NearbyFilter};
pub use libraries::{categorize_to_libraries, make_unique, CategorizeSummary};
pub use library_data::{add_library_data, AddDataSummary};
pub use offset::{offset_file, OffsetSummary};
pub use placement::{add_extra_objects, create_library_objects, ExtraObjects, PlacementSummary};
