//! Known resource registry
//!
//! Maps legacy resource ids to their canonical identity, destination subfolder and the
//! postprocess directives declared for them. The registry file is a JSON object:
//!
//! ```json
//! { "AVWATTAK": ["adv_hero_attack", "sprites/adventure/", "", { "make_transparent": {} }] }
//! ```
//!
//! Keys are matched case-insensitively. The registry is read-only once loaded.

use std::{collections::BTreeMap, fmt, fs, io, path::Path, str::FromStr};

use serde_json::Value;
use thiserror::Error;

/// Directive name mapped to its raw parameters.
pub type Directives = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("registry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("registry root must be an object")]
    NotAnObject,
    #[error("entry '{0}' must be an array of at least two strings")]
    BadEntry(String),
    #[error("duplicate registry id '{0}'")]
    Duplicate(String),
}

/// Game edition used to pick `_hota` / `_sod` directive variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edition {
    #[default]
    Sod,
    Hota,
}

impl Edition {
    fn suffix(self) -> &'static str {
        match self {
            Edition::Sod => "_sod",
            Edition::Hota => "_hota",
        }
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sod" => Ok(Edition::Sod),
            "hota" => Ok(Edition::Hota),
            other => Err(format!("unknown edition '{}', expected 'sod' or 'hota'", other)),
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Sod => write!(f, "sod"),
            Edition::Hota => write!(f, "hota"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnownResource {
    pub legacy_id: String,
    pub canonical_id: String,
    pub destination_subfolder: String,
    pub filename_replace: String,
    pub directives: Directives,
}

impl KnownResource {
    /// File stem used for the destination path.
    pub fn file_stem(&self) -> &str {
        if self.filename_replace.is_empty() {
            &self.canonical_id
        } else {
            &self.filename_replace
        }
    }

    /// Directives with edition variants collapsed onto their base name.
    ///
    /// A variant matching `edition` overrides the plain directive of the same name;
    /// variants for the other edition are dropped.
    pub fn directives_for(&self, edition: Edition) -> Directives {
        let mut result = Directives::new();
        let mut variants = Vec::new();
        for (name, params) in &self.directives {
            if let Some(base) = name.strip_suffix(edition.suffix()) {
                variants.push((base.to_string(), params.clone()));
            } else if name.ends_with("_hota") || name.ends_with("_sod") {
                continue;
            } else {
                result.insert(name.clone(), params.clone());
            }
        }
        result.extend(variants);
        result
    }
}

#[derive(Debug, Default, Clone)]
pub struct KnownResources {
    entries: BTreeMap<String, KnownResource>,
}

impl KnownResources {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let data = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json_str(&data)?;
        log::info!(
            "Loaded {} known resources from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_json_str(data: &str) -> Result<Self, RegistryError> {
        let root: Value = serde_json::from_str(data)?;
        let object = root.as_object().ok_or(RegistryError::NotAnObject)?;

        let mut entries = BTreeMap::new();
        for (key, row) in object {
            let legacy_id = key.to_lowercase();
            let resource = parse_row(&legacy_id, row)?;
            if entries.insert(legacy_id.clone(), resource).is_some() {
                return Err(RegistryError::Duplicate(legacy_id));
            }
        }
        Ok(KnownResources { entries })
    }

    pub fn find(&self, legacy_id: &str) -> Option<&KnownResource> {
        self.entries.get(&legacy_id.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_row(legacy_id: &str, row: &Value) -> Result<KnownResource, RegistryError> {
    let bad = || RegistryError::BadEntry(legacy_id.to_string());
    let items = row.as_array().ok_or_else(bad)?;
    if items.len() < 2 {
        return Err(bad());
    }
    let text = |index: usize| -> Result<String, RegistryError> {
        match items.get(index) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(bad()),
        }
    };

    let directives = match items.get(3) {
        None | Some(Value::Null) => Directives::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, params)| (name.clone(), params.clone()))
            .collect(),
        Some(_) => return Err(bad()),
    };

    Ok(KnownResource {
        legacy_id: legacy_id.to_string(),
        canonical_id: text(0)?,
        destination_subfolder: text(1)?,
        filename_replace: text(2)?,
        directives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "AVWATTAK": ["adv_hero_attack", "sprites/adventure/", "", {
            "make_transparent": {"flood": [0]},
            "battle_unit_hota": {"wide": true},
            "battle_unit_sod": {"wide": false},
            "transpose": {},
            "transpose_sod": null
        }],
        "cmbtmus": ["combat_music", "music/"]
    }"#;

    #[test]
    fn keys_are_case_insensitive() {
        let registry = KnownResources::from_json_str(SAMPLE).unwrap();
        assert_eq!(registry.len(), 2);
        let entry = registry.find("AvWattak").unwrap();
        assert_eq!(entry.legacy_id, "avwattak");
        assert_eq!(entry.canonical_id, "adv_hero_attack");
        assert_eq!(entry.file_stem(), "adv_hero_attack");
        assert!(registry.find("CMBTMUS").unwrap().directives.is_empty());
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn edition_variants_collapse_to_base_name() {
        let registry = KnownResources::from_json_str(SAMPLE).unwrap();
        let entry = registry.find("avwattak").unwrap();

        let hota = entry.directives_for(Edition::Hota);
        assert_eq!(hota.get("battle_unit"), Some(&json!({"wide": true})));
        assert_eq!(hota.get("transpose"), Some(&json!({})));
        assert!(!hota.contains_key("battle_unit_sod"));

        let sod = entry.directives_for(Edition::Sod);
        assert_eq!(sod.get("battle_unit"), Some(&json!({"wide": false})));
        assert_eq!(sod.get("transpose"), Some(&Value::Null));
        assert_eq!(sod.len(), 3);
    }

    #[test]
    fn filename_replace_wins_for_stem() {
        let registry =
            KnownResources::from_json_str(r#"{"a": ["canon", "x/", "other_name"]}"#).unwrap();
        assert_eq!(registry.find("a").unwrap().file_stem(), "other_name");
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(matches!(
            KnownResources::from_json_str("[]"),
            Err(RegistryError::NotAnObject)
        ));
        assert!(matches!(
            KnownResources::from_json_str(r#"{"a": ["only"]}"#),
            Err(RegistryError::BadEntry(_))
        ));
        assert!(matches!(
            KnownResources::from_json_str(r#"{"a": ["x", "y"], "A": ["z", "w"]}"#),
            Err(RegistryError::Duplicate(_))
        ));
        assert!(KnownResources::from_json_str("{").is_err());
    }
}
