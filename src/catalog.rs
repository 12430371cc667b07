//! Destination resource catalog
//!
//! The catalog records every converted resource by kind and canonical id. Extraction
//! consults it to skip resources that already exist, and conversion jobs append to it
//! concurrently, so implementations take `&self` and serialize writers internally.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::RwLock,
};

use serde::{Deserialize, Serialize};

/// Kind of a converted resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Sprite,
    Sound,
    Music,
    Video,
    Other,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Sprite,
        ResourceKind::Sound,
        ResourceKind::Music,
        ResourceKind::Video,
        ResourceKind::Other,
    ];

    /// Destination subfolder used when the registry has no entry for a resource.
    pub fn default_subfolder(self) -> &'static str {
        match self {
            ResourceKind::Sprite => "pcx",
            ResourceKind::Sound => "effects",
            ResourceKind::Music => "music",
            ResourceKind::Video => "video",
            ResourceKind::Other => "json",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown resource kind '{}'", s))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Sprite => write!(f, "sprite"),
            ResourceKind::Sound => write!(f, "sound"),
            ResourceKind::Music => write!(f, "music"),
            ResourceKind::Video => write!(f, "video"),
            ResourceKind::Other => write!(f, "other"),
        }
    }
}

/// One registered resource, relative to the destination root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMedia {
    pub kind: ResourceKind,
    pub id: String,
    /// Subfolder with a trailing slash, or empty.
    pub subdir: String,
    pub main_filename: String,
}

impl ResourceMedia {
    pub fn new(kind: ResourceKind, id: &str, subdir: &str, main_filename: &str) -> Self {
        ResourceMedia {
            kind,
            id: id.to_string(),
            subdir: normalize_subdir(subdir),
            main_filename: main_filename.to_string(),
        }
    }

    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.subdir).join(&self.main_filename)
    }
}

/// Strips repeated trailing slashes and appends exactly one (empty stays empty).
pub fn normalize_subdir(subdir: &str) -> String {
    let trimmed = subdir.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

pub trait ResourceCatalog: Send + Sync {
    fn file_exists(&self, kind: ResourceKind, id: &str) -> bool;
    fn get(&self, kind: ResourceKind, id: &str) -> Option<ResourceMedia>;
    /// Upserts `media`; registering the same resource twice is harmless.
    fn register_resource(&self, media: ResourceMedia);
}

#[derive(Serialize, Deserialize, Default)]
struct CatalogIndex {
    resources: Vec<ResourceMedia>,
}

/// Catalog kept in memory, optionally persisted as a JSON index.
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<BTreeMap<(ResourceKind, String), ResourceMedia>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let catalog = MemoryCatalog::new();
        if !path.exists() {
            return Ok(catalog);
        }
        let data = fs::read_to_string(path)?;
        let index: CatalogIndex = serde_json::from_str(&data)?;
        for media in index.resources {
            catalog.register_resource(media);
        }
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let index = CatalogIndex {
            resources: self.snapshot(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &index)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ResourceMedia> {
        match self.entries.read() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceCatalog for MemoryCatalog {
    fn file_exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    fn get(&self, kind: ResourceKind, id: &str) -> Option<ResourceMedia> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(&(kind, id.to_string())).cloned()
    }

    fn register_resource(&self, media: ResourceMedia) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        log::debug!(
            "Registering {} '{}' at {}{}",
            media.kind,
            media.id,
            media.subdir,
            media.main_filename
        );
        entries.insert((media.kind, media.id.clone()), media);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
