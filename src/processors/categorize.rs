//! Folder categorization of model files into library categories.
//!
//! Walks a work-drive subtree for `.p3d` models and derives, for each model:
//! - a library category from its first three parent folders, cleaned up by
//!   an ordered list of rewrite rules ([`clean_name`]);
//! - fill/outline colors from the first matching keyword rule
//!   ([`classify`]).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::library::LibraryEntry;

/// Extension of the model files turned into templates.
pub const MODEL_EXTENSION: &str = "p3d";

/// Model stems that are never placeable (sky and horizon meshes).
pub const SKIPPED_MODELS: &[&str] = &["horizont", "obloha"];

/// Category for models lying directly in the root folder.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Only this many parent folders take part in the category name.
const MAX_FOLDER_DEPTH: usize = 3;

/// Folder name token dropped from every segment (`plants_f` -> `plants`).
const FOLDER_SUFFIX_TOKEN: &str = "f";

const BLACK: i32 = -16_777_216;
const WHITE: i32 = -1;

/// Display category and colors assigned to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub fill: i32,
    pub outline: i32,
}

/// First-match rule: any keyword found in the lowercase path selects the category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub keywords: &'static [&'static str],
    pub category: Category,
}

const fn rule(keywords: &'static [&'static str], name: &'static str, fill: i32, outline: i32) -> CategoryRule {
    CategoryRule {
        keywords,
        category: Category {
            name,
            fill,
            outline,
        },
    }
}

/// Ordered color rules, consulted top to bottom.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    rule(&["tree", "treeparts"], "tree", -16_760_832, WHITE),
    rule(&["vegetation", "bush", "plant", "clutter", "misc"], "bush", -16_727_808, WHITE),
    rule(&["decal"], "roads", -79_905, BLACK),
    rule(&["signs"], "roads", -15_653_149, BLACK),
    rule(&["road", "bridges"], "roads", -12_566_464, WHITE),
    rule(&["rock"], "rocks", -8_553_091, WHITE),
    rule(&["rail"], "rail", -16_711_694, WHITE),
    rule(&["castle"], "castle", -10_912_896, WHITE),
    rule(&["wall", "fence"], "walls", -35_827, BLACK),
    rule(&["wreck"], "wreck", -8_039_340, WHITE),
    rule(&["\\ind"], "industry", -8_892_372, WHITE),
    rule(&["\\mil"], "industry", -7_960_491, WHITE),
    rule(&["structures", "buildings"], "structures", -9_673_539, BLACK),
];

/// Category for paths no rule matches.
pub const DEFAULT_CATEGORY: Category = Category {
    name: "",
    fill: BLACK,
    outline: WHITE,
};

/// Classifies a relative model path (backslash separated) by the first
/// matching rule.
pub fn classify(relative_path: &str) -> Category {
    let path = relative_path.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| path.contains(k)))
        .map(|rule| rule.category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// One rewrite step of [`clean_name`].
#[derive(Debug, Clone, Copy)]
enum NameRule {
    /// DLC suffix moved to a prefix: `a3_structures_exp` -> `apex_structures`.
    Rebrand {
        suffix: &'static str,
        prefix: &'static str,
    },
    /// Substring removed everywhere.
    Strip(&'static str),
    /// Any name containing `needle` becomes `into`.
    Collapse {
        needle: &'static str,
        into: &'static str,
    },
    /// Plain substring replacement.
    Replace {
        from: &'static str,
        to: &'static str,
    },
    /// Whole `_` token removed; if it was present, `from` is renamed to `to`.
    Region {
        token: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Names containing any needle keep only their first `keep` tokens.
    Truncate {
        needles: &'static [&'static str],
        keep: usize,
    },
}

impl NameRule {
    fn apply(&self, name: String) -> String {
        match *self {
            NameRule::Rebrand { suffix, prefix } => {
                if !name.contains(suffix) {
                    return name;
                }
                let name = name.replace(suffix, "");
                if name.starts_with("a3") {
                    name.replace("a3", prefix)
                } else {
                    format!("{}_{}", prefix, name)
                }
            }
            NameRule::Strip(part) => name.replace(part, ""),
            NameRule::Collapse { needle, into } => {
                if name.contains(needle) {
                    into.to_string()
                } else {
                    name
                }
            }
            NameRule::Replace { from, to } => name.replace(from, to),
            NameRule::Region { token, from, to } => {
                let tokens: Vec<&str> = name.split('_').collect();
                if !tokens.contains(&token) {
                    return name;
                }
                tokens
                    .into_iter()
                    .filter(|t| *t != token)
                    .collect::<Vec<_>>()
                    .join("_")
                    .replace(from, to)
            }
            NameRule::Truncate { needles, keep } => {
                if needles.iter().any(|n| name.contains(n)) {
                    name.split('_').take(keep).collect::<Vec<_>>().join("_")
                } else {
                    name
                }
            }
        }
    }
}

const NAME_RULES: &[NameRule] = &[
    NameRule::Rebrand { suffix: "_exp", prefix: "apex" },
    NameRule::Rebrand { suffix: "_argo", prefix: "malden" },
    NameRule::Rebrand { suffix: "_enoch", prefix: "enoch" },
    NameRule::Strip("_epa"),
    NameRule::Strip("_epb"),
    NameRule::Strip("_epc"),
    NameRule::Strip("_beta"),
    NameRule::Strip("_gamma"),
    NameRule::Strip("_mark"),
    NameRule::Strip("_bootcamp"),
    NameRule::Strip("_heli"),
    NameRule::Strip("_pmc"),
    NameRule::Strip("_orange"),
    NameRule::Strip("_jets"),
    NameRule::Collapse { needle: "ca_misc", into: "ca_misc" },
    NameRule::Replace { from: "cup_terrains_cup_terrains", to: "cup" },
    NameRule::Region { token: "e", from: "ca_", to: "taki_" },
    NameRule::Region { token: "e2", from: "ca_", to: "summer_" },
    NameRule::Truncate { needles: &["buildings2", "_cti"], keep: 3 },
    NameRule::Replace { from: "vegetation", to: "veg" },
    NameRule::Replace { from: "structures", to: "struc" },
    NameRule::Replace { from: "civilian", to: "civ" },
    NameRule::Replace { from: "infrastructure", to: "infra" },
];

/// Simplifies a raw folder key into a library category name.
///
/// Pure and order sensitive: the same key always gives the same name.
pub fn clean_name(key: &str) -> String {
    NAME_RULES
        .iter()
        .fold(key.to_string(), |name, rule| rule.apply(name))
}

/// Map whose missing values are computed from the key on first access.
pub struct KeyedCache<V, F> {
    values: HashMap<String, V>,
    compute: F,
}

impl<V, F> KeyedCache<V, F>
where
    F: Fn(&str) -> V,
{
    pub fn new(compute: F) -> Self {
        Self {
            values: HashMap::new(),
            compute,
        }
    }

    /// Returns the cached value for `key`, computing it if absent.
    pub fn get(&mut self, key: &str) -> &V {
        if !self.values.contains_key(key) {
            let value = (self.compute)(key);
            self.values.insert(key.to_string(), value);
        }
        &self.values[key]
    }

    /// Number of computed keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Drops every `_f` token from a folder segment (`structures_f_exp` -> `structures_exp`).
pub fn strip_folder_suffix(segment: &str) -> String {
    segment
        .split('_')
        .filter(|token| *token != FOLDER_SUFFIX_TOKEN)
        .collect::<Vec<_>>()
        .join("_")
}

/// Joins path components with backslashes, the separator library files use.
pub fn to_library_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// Cleaned parent folders of a model and the raw category key built from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderKey {
    /// First three parent folders, lowercased with `_f` tokens removed.
    pub parents: Vec<String>,
    /// Unique parents joined with `_`.
    pub key: String,
}

/// Builds the [`FolderKey`] of a model path relative to the root.
pub fn folder_key(relative_model: &Path) -> FolderKey {
    let parents: Vec<String> = relative_model
        .parent()
        .map(to_library_path)
        .unwrap_or_default()
        .split('\\')
        .filter(|s| !s.is_empty())
        .take(MAX_FOLDER_DEPTH)
        .map(|s| strip_folder_suffix(&s.to_lowercase()))
        .collect();

    let mut unique: Vec<&str> = Vec::with_capacity(parents.len());
    for parent in &parents {
        if !unique.contains(&parent.as_str()) {
            unique.push(parent);
        }
    }
    let key = unique.join("_");

    FolderKey { parents, key }
}

/// Result of one folder walk.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// `(category, entry)` pairs in walk order.
    pub entries: Vec<(String, LibraryEntry)>,
    /// Models rejected by the blacklist, underscore folders or skip list.
    pub skipped: usize,
    /// The walk stopped early on an interrupt.
    pub interrupted: bool,
}

/// Walks a target folder below a work-drive root, producing library entries.
pub struct FolderWalker {
    root: PathBuf,
    target: PathBuf,
    blacklist: Vec<String>,
    names: KeyedCache<String, fn(&str) -> String>,
}

impl FolderWalker {
    pub fn new(root: impl Into<PathBuf>, target: impl Into<PathBuf>, blacklist: &[String]) -> Self {
        Self {
            root: root.into(),
            target: target.into(),
            blacklist: blacklist.iter().map(|b| b.to_lowercase()).collect(),
            names: KeyedCache::new(clean_name as fn(&str) -> String),
        }
    }

    /// Returns false for blacklisted paths and folders starting with `_`.
    ///
    /// `path_lower` is the lowercased library path, file name included.
    pub fn is_allowed(&self, path_lower: &str, parents: &[String]) -> bool {
        if self.blacklist.iter().any(|b| path_lower.contains(b.as_str())) {
            return false;
        }
        !parents.iter().any(|p| p.starts_with('_'))
    }

    /// Builds the category and entry for one model path, or `None` if it is skipped.
    pub fn model_entry(&mut self, model: &Path) -> Option<(String, LibraryEntry)> {
        let relative = model.strip_prefix(&self.root).ok()?;
        let folder_key = folder_key(relative);

        let file = to_library_path(relative);
        if !self.is_allowed(&file.to_lowercase(), &folder_key.parents) {
            return None;
        }

        let name = model.file_stem()?.to_string_lossy().to_string();
        if SKIPPED_MODELS.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
            return None;
        }

        let category = match self.names.get(&folder_key.key).as_str() {
            "" => UNCATEGORIZED.to_string(),
            cleaned => cleaned.to_string(),
        };

        let colors = classify(&file);
        Some((category, LibraryEntry::new(name, file, colors.fill, colors.outline)))
    }

    /// Walks the target folder.
    ///
    /// A missing root or target, or a target outside the root, is logged and
    /// yields no entries. When `interrupt` becomes set the walk stops and
    /// returns what it found so far.
    pub fn walk(&mut self, interrupt: Option<&AtomicBool>) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        if !self.root.exists() {
            warn!("The given root '{}' doesn't exist", self.root.display());
            return outcome;
        }
        if !self.target.exists() {
            warn!("The given base path '{}' does not exist", self.target.display());
            return outcome;
        }
        if !self.target.starts_with(&self.root) {
            warn!(
                "'{}' is not inside the root '{}'",
                self.target.display(),
                self.root.display()
            );
            return outcome;
        }

        info!("Starting p3d search within path {}", self.target.display());
        let models = WalkDir::new(&self.target)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION))
                    .unwrap_or(false)
            });

        for model in models {
            if interrupt.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!("The walk was interrupted, keeping {} entries", outcome.entries.len());
                outcome.interrupted = true;
                break;
            }

            match self.model_entry(&model) {
                Some(found) => outcome.entries.push(found),
                None => {
                    debug!("Skipping {}", model.display());
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            "Found {} models in {} categories",
            outcome.entries.len(),
            self.names.len()
        );
        outcome
    }
}
