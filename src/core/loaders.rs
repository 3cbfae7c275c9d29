//! Loaders for Terrain Builder placement files.
//!
//! A placement file holds one object per line:
//!
//! ```text
//! "model";x;y;direction;pitch;bank;scale;z;
//! ```
//!
//! Fields are `;`-separated, the model name is double-quoted and every line
//! ends with a `;`.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

/// Number of fields a placement line must carry (model plus seven numbers).
pub const RECORD_FIELDS: usize = 8;

const NUMERIC_FIELDS: [&str; 7] = ["x", "y", "dir", "pitch", "bank", "scale", "z"];

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One placed object: model name plus its transform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRecord {
    /// Template (model) name, without quotes.
    pub model: String,
    pub x: f64,
    pub y: f64,
    /// Yaw in degrees.
    pub dir: f64,
    pub pitch: f64,
    pub bank: f64,
    pub scale: f64,
    /// Height above terrain.
    pub z: f64,
}

impl PlacementRecord {
    /// Creates a record at the origin with unit scale.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            x: 0.0,
            y: 0.0,
            dir: 0.0,
            pitch: 0.0,
            bank: 0.0,
            scale: 1.0,
            z: 0.0,
        }
    }

    /// Creates a record at the given map position.
    pub fn at(model: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::new(model)
        }
    }

    /// Returns the 2D map position `[x, y]`.
    #[inline]
    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Builds a record from already split fields.
    ///
    /// Surrounding quotes on the model are removed. Fields past the eighth
    /// (the empty one left by the trailing `;`) are ignored.
    pub fn from_fields<'a, I>(fields: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = fields.into_iter();

        let model = fields
            .next()
            .map(|m| m.trim().trim_matches('"'))
            .filter(|m| !m.is_empty())
            .ok_or_else(|| "missing model name".to_string())?;

        let mut values = [0.0f64; 7];
        for (slot, name) in values.iter_mut().zip(NUMERIC_FIELDS) {
            let raw = fields
                .next()
                .ok_or_else(|| format!("expected {} fields, '{}' is missing", RECORD_FIELDS, name))?;
            *slot = raw
                .trim()
                .parse()
                .map_err(|_| format!("invalid {} value: '{}'", name, raw.trim()))?;
        }

        let [x, y, dir, pitch, bank, scale, z] = values;
        Ok(Self {
            model: model.to_string(),
            x,
            y,
            dir,
            pitch,
            bank,
            scale,
            z,
        })
    }

    fn from_csv_record(record: &StringRecord) -> Result<Self> {
        let line = record.position().map_or(0, |p| p.line());
        Self::from_fields(record.iter())
            .map_err(|reason| LoaderError::MalformedRecord { line, reason })
    }
}

impl FromStr for PlacementRecord {
    type Err = LoaderError;

    fn from_str(line: &str) -> Result<Self> {
        Self::from_fields(line.trim_end_matches(['\r', '\n']).split(';'))
            .map_err(|reason| LoaderError::MalformedRecord { line: 1, reason })
    }
}

impl fmt::Display for PlacementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\";{:.6};{:.6};{:.6};{:.6};{:.6};{:.6};{:.6};",
            self.model, self.x, self.y, self.dir, self.pitch, self.bank, self.scale, self.z
        )
    }
}

/// Load every placement record from a Terrain Builder text file.
///
/// Blank lines are skipped. Any other line that does not parse aborts the
/// load with [`LoaderError::MalformedRecord`] naming the line.
///
/// # Errors
///
/// Returns [`LoaderError::NotFound`] before reading anything if `path` is not
/// a file.
pub fn load_placements<P: AsRef<Path>>(path: P) -> Result<Vec<PlacementRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::with_capacity(1024);
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        records.push(PlacementRecord::from_csv_record(&record)?);
    }

    Ok(records)
}
