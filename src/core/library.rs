//! Terrain Builder library (`.tml`) files.
//!
//! A library is an XML document naming a group of placeable templates:
//!
//! ```xml
//! <Library name="a3_plants" shape="rectangle" default_fill="-65536" default_outline="-16777216" tex="0">
//!     <Template>
//!         <Name>b_ficusc1s_f</Name>
//!         <File>a3\plants_f\Bush\b_FicusC1s_F.p3d</File>
//!         <Fill>-16727808</Fill>
//!         <Outline>-1</Outline>
//!         <Placement>slopelandcontact</Placement>
//!         <BoundingMin X="-2.5" Y="-1.5" Z="-2.0"/>
//!         <BoundingMax X="2.5" Y="1.5" Z="2.0"/>
//!         ...
//!     </Template>
//! </Library>
//! ```
//!
//! Fill and outline colors are signed 32-bit ARGB codes; see
//! [`tb_color_to_rgba`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::writers::{self, WriteError};

/// Placement value marking templates that must keep their own orientation.
pub const SLOPE_CONTACT: &str = "slopelandcontact";

/// Library file extension.
pub const LIBRARY_EXTENSION: &str = "tml";

/// Errors that can occur while reading or writing library files.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library file not found: {0}")]
    NotFound(PathBuf),

    #[error("Library folder not found: {0}")]
    FolderNotFound(PathBuf),

    #[error("Failed to serialize library '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: quick_xml::SeError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Converts a library color code to `#RRGGBB`.
///
/// Terrain Builder documents its codes as "inverted hex": subtract the code
/// from `0xFFFFFF` and complement every hex digit of the six low digits.
/// Both steps cancel out for codes with a full alpha byte, leaving the low
/// 24 bits of the two's complement value, so `-16760832` (`0xFF003F00`) is
/// `#003F00`.
pub fn tb_color_to_hex(code: i32) -> String {
    let [r, g, b, _] = tb_color_to_rgba(code, 255);
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

/// Converts a library color code to `[r, g, b, alpha]`.
pub fn tb_color_to_rgba(code: i32, alpha: u8) -> [u8; 4] {
    let argb = code as u32;
    [(argb >> 16) as u8, (argb >> 8) as u8, argb as u8, alpha]
}

/// Converts an RGB color to an opaque library color code.
pub fn rgb_to_tb_color(rgb: [u8; 3]) -> i32 {
    let argb = 0xFF00_0000u32 | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
    argb as i32
}

/// Corner of a template bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoint {
    #[serde(rename = "@X", default)]
    pub x: f64,
    #[serde(rename = "@Y", default)]
    pub y: f64,
    #[serde(rename = "@Z", default)]
    pub z: f64,
}

/// One `<Template>` element, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub archive: String,
    #[serde(default = "default_fill")]
    pub fill: i32,
    #[serde(default = "default_outline")]
    pub outline: i32,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub scale_rand_min: f64,
    #[serde(default)]
    pub scale_rand_max: f64,
    #[serde(default)]
    pub yaw_rand_min: f64,
    #[serde(default)]
    pub yaw_rand_max: f64,
    #[serde(default)]
    pub roll_rand_min: f64,
    #[serde(default)]
    pub roll_rand_max: f64,
    #[serde(default)]
    pub pitch_rand_min: f64,
    #[serde(default)]
    pub pitch_rand_max: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub placement: String,
    #[serde(default)]
    pub bounding_min: BoundingPoint,
    #[serde(default)]
    pub bounding_max: BoundingPoint,
    #[serde(rename = "BSphere", default)]
    pub b_sphere: f64,
    #[serde(rename = "BBRadius", default)]
    pub bb_radius: f64,
    #[serde(default)]
    pub autocenter: i32,
    #[serde(default)]
    pub x_shift: f64,
    #[serde(default)]
    pub y_shift: f64,
    #[serde(default)]
    pub z_shift: f64,
}

fn default_fill() -> i32 {
    -16_777_216
}

fn default_outline() -> i32 {
    -1
}

fn one() -> f64 {
    1.0
}

fn default_shape() -> String {
    "rectangle".to_string()
}

fn default_library_fill() -> i32 {
    -65_536
}

impl Default for Template {
    fn default() -> Self {
        Self {
            name: String::new(),
            file: String::new(),
            date: String::new(),
            archive: String::new(),
            fill: default_fill(),
            outline: default_outline(),
            scale: 1.0,
            hash: String::new(),
            scale_rand_min: 0.0,
            scale_rand_max: 0.0,
            yaw_rand_min: 0.0,
            yaw_rand_max: 0.0,
            roll_rand_min: 0.0,
            roll_rand_max: 0.0,
            pitch_rand_min: 0.0,
            pitch_rand_max: 0.0,
            height: 0.0,
            placement: String::new(),
            bounding_min: BoundingPoint::default(),
            bounding_max: BoundingPoint::default(),
            b_sphere: 0.0,
            bb_radius: 0.0,
            autocenter: 0,
            x_shift: 0.0,
            y_shift: 0.0,
            z_shift: 0.0,
        }
    }
}

/// A library entry: the parts of a template the tools work with.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    /// Template name, unique (case-insensitive) across a generated library set.
    pub name: String,
    /// Model path relative to the work drive.
    pub file: String,
    pub fill: i32,
    pub outline: i32,
    /// Orientation must not follow the terrain slope.
    pub slope_contact: bool,
    /// Bounding box size `[x, y, z]`.
    pub size: [f64; 3],
}

impl LibraryEntry {
    /// Creates an entry with a unit bounding box.
    pub fn new(name: impl Into<String>, file: impl Into<String>, fill: i32, outline: i32) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            fill,
            outline,
            slope_contact: false,
            size: [1.0, 1.0, 1.0],
        }
    }

    /// Reads an entry out of a stored template.
    pub fn from_template(template: &Template) -> Self {
        let (min, max) = (template.bounding_min, template.bounding_max);
        Self {
            name: template.name.clone(),
            file: template.file.clone(),
            fill: template.fill,
            outline: template.outline,
            slope_contact: template.placement.eq_ignore_ascii_case(SLOPE_CONTACT),
            size: [max.x - min.x, max.y - min.y, max.z - min.z],
        }
    }

    /// Builds a fresh template for this entry, stamped with `date`.
    pub fn to_template(&self, date: &str) -> Template {
        let half = self.size.map(|s| s / 2.0);
        Template {
            name: self.name.clone(),
            file: self.file.clone(),
            date: date.to_string(),
            fill: self.fill,
            outline: self.outline,
            placement: if self.slope_contact {
                SLOPE_CONTACT.to_string()
            } else {
                String::new()
            },
            bounding_min: BoundingPoint {
                x: -half[0],
                y: -half[1],
                z: -half[2],
            },
            bounding_max: BoundingPoint {
                x: half[0],
                y: half[1],
                z: half[2],
            },
            ..Template::default()
        }
    }

    /// Returns `(name, fill rgba, outline rgba, size)` for drawing the template.
    pub fn as_shape(&self) -> (&str, [u8; 4], [u8; 4], [f64; 3]) {
        (
            &self.name,
            tb_color_to_rgba(self.fill, 255),
            tb_color_to_rgba(self.outline, 255),
            self.size,
        )
    }
}

/// One `.tml` library file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@shape", default = "default_shape")]
    pub shape: String,
    #[serde(rename = "@default_fill", default = "default_library_fill")]
    pub default_fill: i32,
    #[serde(rename = "@default_outline", default = "default_fill")]
    pub default_outline: i32,
    #[serde(rename = "@tex", default)]
    pub tex: i32,
    #[serde(rename = "Template", default)]
    pub templates: Vec<Template>,
}

impl Library {
    /// Creates an empty library.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: default_shape(),
            default_fill: default_library_fill(),
            default_outline: default_fill(),
            tex: 0,
            templates: Vec::new(),
        }
    }

    /// Parses a library document.
    pub fn from_xml(xml: &str) -> std::result::Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// Reads a library file.
    ///
    /// A document that does not parse is logged and treated as a library
    /// without templates, named after the file.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::NotFound`] if the file does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LibraryError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let file_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut library = match Self::from_xml(&content) {
            Ok(library) => library,
            Err(e) => {
                warn!("{}: malformed library ({}), using no templates", path.display(), e);
                Self::new(file_stem.clone())
            }
        };

        if library.name.is_empty() {
            library.name = file_stem;
        }
        Ok(library)
    }

    /// Serializes the library as an indented XML document.
    pub fn to_xml(&self) -> Result<String> {
        let mut body = String::new();
        let serialize_error = |source| LibraryError::Serialize {
            name: self.name.clone(),
            source,
        };

        let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some("Library"))
            .map_err(serialize_error)?;
        serializer.indent(' ', 4);
        self.serialize(serializer).map_err(serialize_error)?;

        Ok(format!("<?xml version=\"1.0\" ?>\n{}\n", body))
    }

    /// Writes the library to `path`, creating parent folders.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let xml = self.to_xml()?;
        writers::write_text(path.as_ref(), &xml)?;
        Ok(())
    }

    /// Returns every template as a [`LibraryEntry`].
    pub fn entries(&self) -> Vec<LibraryEntry> {
        self.templates.iter().map(LibraryEntry::from_template).collect()
    }

    /// Finds a template by case-insensitive name.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Number of templates.
    #[inline]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if the library has no templates.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Lists the library files directly inside `folder`, sorted by name.
pub fn find_library_files(folder: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Can't read library folder {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
                None
            }
        })
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(LIBRARY_EXTENSION))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

/// All libraries of one folder, indexed by template name.
#[derive(Debug, Clone, Default)]
pub struct LibraryCollection {
    libraries: Vec<(PathBuf, Library)>,
    /// Lowercase template name -> (library index, template index).
    index: HashMap<String, (usize, usize)>,
}

impl LibraryCollection {
    /// Loads every `.tml` file in `folder`.
    ///
    /// When a template name appears in several libraries, the last one loaded
    /// wins the lookup.
    pub fn load<P: AsRef<Path>>(folder: P) -> Result<Self> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(LibraryError::FolderNotFound(folder.to_path_buf()));
        }

        let mut collection = Self::default();
        for path in find_library_files(folder) {
            let library = Library::from_file(&path)?;
            debug!("Loaded library {} ({} templates)", library.name, library.len());
            collection.push(path, library);
        }
        Ok(collection)
    }

    /// Adds a library, indexing its templates.
    pub fn push(&mut self, path: PathBuf, library: Library) {
        let lib_idx = self.libraries.len();
        for (tpl_idx, template) in library.templates.iter().enumerate() {
            self.index
                .insert(template.name.to_lowercase(), (lib_idx, tpl_idx));
        }
        self.libraries.push((path, library));
    }

    /// Iterates over the libraries in load order.
    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter().map(|(_, library)| library)
    }

    /// Iterates mutably over `(path, library)` pairs.
    ///
    /// Template names must not be changed through this, the index is not
    /// rebuilt.
    pub fn libraries_mut(&mut self) -> impl Iterator<Item = (&Path, &mut Library)> {
        self.libraries
            .iter_mut()
            .map(|(path, library)| (path.as_path(), library))
    }

    /// Looks up a template by case-insensitive name.
    pub fn template(&self, name: &str) -> Option<&Template> {
        let &(lib_idx, tpl_idx) = self.index.get(&name.to_lowercase())?;
        Some(&self.libraries[lib_idx].1.templates[tpl_idx])
    }

    /// Looks up an entry by case-insensitive name.
    pub fn entry(&self, name: &str) -> Option<LibraryEntry> {
        self.template(name).map(LibraryEntry::from_template)
    }

    /// Returns the name of the library holding the template.
    pub fn category_of(&self, name: &str) -> Option<&str> {
        let &(lib_idx, _) = self.index.get(&name.to_lowercase())?;
        Some(self.libraries[lib_idx].1.name.as_str())
    }

    /// Writes every library back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        for (path, library) in &self.libraries {
            library.save(path)?;
        }
        Ok(())
    }

    /// Number of libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Returns true if no libraries were loaded.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PLANTS_XML: &str = r#"<?xml version="1.0" ?>
<Library name="a3_plants_plant" shape="rectangle" default_fill="-65536" default_outline="-16777216" tex="0">
    <Template>
        <Name>bw_SetBig_Brains_F</Name>
        <File>a3\plants_f\Plant\bw_SetBig_Brains_F.p3d</File>
        <Date>11/02/19 13:19:42</Date>
        <Archive></Archive>
        <Fill>-16727808</Fill>
        <Outline>-1</Outline>
        <Scale>1.000000</Scale>
        <Hash>5D3F2A0C</Hash>
        <Placement></Placement>
        <BoundingMin X="-1.5" Y="-0.5" Z="-2.0"/>
        <BoundingMax X="1.5" Y="0.5" Z="2.0"/>
    </Template>
    <Template>
        <Name>P_Reeds_F</Name>
        <File>a3\plants_f\Plant\p_Reeds_F.p3d</File>
        <Fill>-16727808</Fill>
        <Outline>-1</Outline>
        <Placement>slopelandcontact</Placement>
        <BoundingMin X="-1" Y="-1" Z="0"/>
        <BoundingMax X="1" Y="1" Z="3"/>
    </Template>
</Library>
"#;

    #[test]
    fn test_color_worked_examples() {
        assert_eq!(tb_color_to_hex(-16_760_832), "#003F00");
        assert_eq!(tb_color_to_hex(-1), "#FFFFFF");
        assert_eq!(tb_color_to_hex(-16_777_216), "#000000");
        assert_eq!(tb_color_to_hex(-79_905), "#FEC7DF");
        assert_eq!(tb_color_to_hex(-12_566_464), "#404040");
    }

    #[test]
    fn test_color_rgba_and_inverse() {
        assert_eq!(tb_color_to_rgba(-16_727_808, 255), [0, 191, 0, 255]);
        assert_eq!(tb_color_to_rgba(-35_827, 128), [255, 116, 13, 128]);
        assert_eq!(rgb_to_tb_color([0, 63, 0]), -16_760_832);
        assert_eq!(rgb_to_tb_color([255, 255, 255]), -1);
    }

    #[test]
    fn test_entry_as_shape() {
        let mut entry = LibraryEntry::new("wall", "a3\\wall.p3d", -35_827, -16_777_216);
        entry.size = [4.0, 0.5, 2.0];

        let (name, fill, outline, size) = entry.as_shape();
        assert_eq!(name, "wall");
        assert_eq!(fill, [255, 116, 13, 255]);
        assert_eq!(outline, [0, 0, 0, 255]);
        assert_eq!(size, [4.0, 0.5, 2.0]);
    }

    #[test]
    fn test_parse_library() {
        let library = Library::from_xml(PLANTS_XML).unwrap();
        assert_eq!(library.name, "a3_plants_plant");
        assert_eq!(library.shape, "rectangle");
        assert_eq!(library.len(), 2);

        let entries = library.entries();
        assert_eq!(entries[0].name, "bw_SetBig_Brains_F");
        assert!(!entries[0].slope_contact);
        assert_eq!(entries[0].size, [3.0, 1.0, 4.0]);
        assert!(entries[1].slope_contact);
        assert_eq!(library.templates[0].hash, "5D3F2A0C");
    }

    #[test]
    fn test_single_template_library() {
        let xml = r#"<Library name="one" shape="ellipse"><Template><Name>rock</Name><Fill>-1</Fill></Template></Library>"#;
        let library = Library::from_xml(xml).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.templates[0].outline, -1);
        assert_eq!(library.templates[0].scale, 1.0);
    }

    #[test]
    fn test_library_without_templates() {
        let xml = r#"<Library name="empty" shape="rectangle"></Library>"#;
        let library = Library::from_xml(xml).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_malformed_library_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.tml");
        fs::write(&path, "<Library name=\"x\"><Template><Name>").unwrap();

        let library = Library::from_file(&path).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.name, "broken");
    }

    #[test]
    fn test_missing_library_file() {
        let result = Library::from_file("/no/such/library.tml");
        assert!(matches!(result, Err(LibraryError::NotFound(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roads.tml");

        let mut library = Library::new("roads");
        let entry = LibraryEntry::new("sign01", "a3\\roads_f\\sign01.p3d", -15_653_149, -16_777_216);
        library.templates.push(entry.to_template("2024-01-01"));
        library.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<?xml"));
        assert!(content.contains("<Name>sign01</Name>"));

        let reloaded = Library::from_file(&path).unwrap();
        assert_eq!(reloaded.name, "roads");
        assert_eq!(reloaded.entries(), vec![entry]);
    }

    #[test]
    fn test_collection_lookup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a3_plants_plant.tml"), PLANTS_XML).unwrap();
        Library::new("empty").save(dir.path().join("empty.tml")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let collection = LibraryCollection::load(dir.path()).unwrap();
        assert_eq!(collection.len(), 2);

        let entry = collection.entry("BW_SETBIG_BRAINS_F").unwrap();
        assert_eq!(entry.name, "bw_SetBig_Brains_F");
        assert_eq!(collection.category_of("p_reeds_f"), Some("a3_plants_plant"));
        assert!(collection.entry("unknown").is_none());
    }

    #[test]
    fn test_collection_missing_folder() {
        let result = LibraryCollection::load("/no/such/folder");
        assert!(matches!(result, Err(LibraryError::FolderNotFound(_))));
    }
}
