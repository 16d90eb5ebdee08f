//! # Gacha Catalogs
//!
//! A catalog is the weighted set of characters a gacha can produce. Catalogs
//! are data, not code: they are loaded once from a TOML file and stay
//! immutable for the life of the process.
//!
//! ## File Format
//!
//! ```toml
//! [[rarity]]
//! name = "SSR"
//! weight = 5
//!
//! [[gacha]]
//! id = 1
//!
//! [[gacha.entries]]
//! id = "c115174c-05ad-11ec-8679-a0c58933fdce"
//! name = "Sun"
//! rarity = "SSR"
//!
//! [[gacha.entries]]
//! id = "7b6a8a4e-0ed8-11ec-93f3-a0c58933fdce"
//! name = "Pluto"
//! weight = 70
//! ```
//!
//! Each entry carries either an explicit `weight` or a `rarity` whose tier
//! weight it inherits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::CatalogError;

/// Gacha identifier.
pub type GachaId = i64;

/// Catalog entry identifier (the character id handed back to clients).
pub type EntryId = String;

/// A drawable character and its relative weight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque entry identifier.
    pub entry_id: EntryId,
    /// Display name.
    pub name: String,
    /// Relative selection weight. Zero means never drawn.
    pub weight: u32,
}

impl CatalogEntry {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(entry_id: impl Into<EntryId>, name: impl Into<String>, weight: u32) -> Self {
        Self {
            entry_id: entry_id.into(),
            name: name.into(),
            weight,
        }
    }
}

/// Read access to gacha catalogs.
pub trait CatalogProvider: Send + Sync {
    /// Whether `gacha_id` names an existing catalog.
    fn exists(&self, gacha_id: GachaId) -> Result<bool, CatalogError>;

    /// Entries of `gacha_id`, in catalog order. Empty for unknown ids.
    fn list_entries(&self, gacha_id: GachaId) -> Result<Arc<[CatalogEntry]>, CatalogError>;

    /// Looks up an entry by id across all catalogs.
    fn lookup(&self, entry_id: &str) -> Result<Option<CatalogEntry>, CatalogError>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    rarity: Vec<RarityDef>,
    #[serde(default)]
    gacha: Vec<GachaDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RarityDef {
    name: String,
    weight: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GachaDef {
    id: GachaId,
    #[serde(default)]
    entries: Vec<EntryDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDef {
    id: EntryId,
    name: String,
    weight: Option<u32>,
    rarity: Option<String>,
}

/// In-memory catalog set, immutable once built.
///
/// Every registered gacha has a positive total weight, so `exists` implies
/// the gacha is drawable.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    gachas: HashMap<GachaId, Arc<[CatalogEntry]>>,
    entries: HashMap<EntryId, CatalogEntry>,
}

impl StaticCatalog {
    /// Creates an empty catalog set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads catalogs from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the file cannot be read and
    /// [`CatalogError::InvalidConfig`] if its contents are rejected.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses catalogs from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidConfig`] on syntax errors, duplicate
    /// gacha ids, unknown rarities, entries with both or neither of
    /// `weight`/`rarity`, or gachas whose total weight is zero.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| CatalogError::InvalidConfig(e.to_string()))?;

        let mut rarities = HashMap::with_capacity(file.rarity.len());
        for tier in file.rarity {
            if rarities.insert(tier.name.clone(), tier.weight).is_some() {
                return Err(CatalogError::InvalidConfig(format!(
                    "duplicate rarity {}",
                    tier.name
                )));
            }
        }

        let mut catalog = Self::new();
        for gacha in file.gacha {
            let mut entries = Vec::with_capacity(gacha.entries.len());
            for def in gacha.entries {
                let weight = match (def.weight, def.rarity.as_deref()) {
                    (Some(weight), None) => weight,
                    (None, Some(rarity)) => *rarities.get(rarity).ok_or_else(|| {
                        CatalogError::InvalidConfig(format!(
                            "entry {} references unknown rarity {rarity}",
                            def.id
                        ))
                    })?,
                    _ => {
                        return Err(CatalogError::InvalidConfig(format!(
                            "entry {} must set exactly one of weight or rarity",
                            def.id
                        )))
                    }
                };
                entries.push(CatalogEntry::new(def.id, def.name, weight));
            }
            catalog.insert(gacha.id, entries)?;
        }

        tracing::info!(
            "Loaded {} gacha catalogs ({} distinct entries)",
            catalog.gachas.len(),
            catalog.entries.len()
        );
        Ok(catalog)
    }

    /// Registers a gacha.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidConfig`] if the id is already taken, the
    /// total weight is zero, or an entry id is reused with a different name.
    pub fn insert(
        &mut self,
        gacha_id: GachaId,
        entries: Vec<CatalogEntry>,
    ) -> Result<(), CatalogError> {
        if self.gachas.contains_key(&gacha_id) {
            return Err(CatalogError::InvalidConfig(format!(
                "duplicate gacha id {gacha_id}"
            )));
        }

        let total: u64 = entries.iter().map(|e| u64::from(e.weight)).sum();
        if total == 0 {
            return Err(CatalogError::InvalidConfig(format!(
                "gacha {gacha_id} has no drawable entries"
            )));
        }

        for entry in &entries {
            if let Some(known) = self.entries.get(&entry.entry_id) {
                if known.name != entry.name {
                    return Err(CatalogError::InvalidConfig(format!(
                        "entry {} is named both {:?} and {:?}",
                        entry.entry_id, known.name, entry.name
                    )));
                }
            }
        }
        for entry in &entries {
            self.entries
                .entry(entry.entry_id.clone())
                .or_insert_with(|| entry.clone());
        }

        self.gachas.insert(gacha_id, entries.into());
        Ok(())
    }

    /// Number of registered gachas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gachas.len()
    }

    /// Whether no gacha is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gachas.is_empty()
    }
}

impl CatalogProvider for StaticCatalog {
    fn exists(&self, gacha_id: GachaId) -> Result<bool, CatalogError> {
        Ok(self.gachas.contains_key(&gacha_id))
    }

    fn list_entries(&self, gacha_id: GachaId) -> Result<Arc<[CatalogEntry]>, CatalogError> {
        Ok(self
            .gachas
            .get(&gacha_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new())))
    }

    fn lookup(&self, entry_id: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.entries.get(entry_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[rarity]]
        name = "N"
        weight = 70

        [[rarity]]
        name = "SSR"
        weight = 5

        [[gacha]]
        id = 1

        [[gacha.entries]]
        id = "sun"
        name = "Sun"
        rarity = "SSR"

        [[gacha.entries]]
        id = "pluto"
        name = "Pluto"
        rarity = "N"

        [[gacha]]
        id = 2

        [[gacha.entries]]
        id = "venus"
        name = "Venus"
        weight = 3
    "#;

    #[test]
    fn test_load_resolves_rarity_weights() {
        let catalog = StaticCatalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let entries = catalog.list_entries(1).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], CatalogEntry::new("sun", "Sun", 5));
        assert_eq!(entries[1], CatalogEntry::new("pluto", "Pluto", 70));

        assert!(catalog.exists(2).unwrap());
        assert!(!catalog.exists(3).unwrap());
        assert!(catalog.list_entries(3).unwrap().is_empty());
    }

    #[test]
    fn test_lookup_across_gachas() {
        let catalog = StaticCatalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.lookup("venus").unwrap().unwrap().name, "Venus");
        assert!(catalog.lookup("mars").unwrap().is_none());
    }

    #[test]
    fn test_rejects_unknown_rarity() {
        let text = r#"
            [[gacha]]
            id = 1
            [[gacha.entries]]
            id = "a"
            name = "A"
            rarity = "UR"
        "#;
        let err = StaticCatalog::from_toml_str(text).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(msg) if msg.contains("unknown rarity")));
    }

    #[test]
    fn test_rejects_weight_and_rarity_together() {
        let text = r#"
            [[rarity]]
            name = "N"
            weight = 1
            [[gacha]]
            id = 1
            [[gacha.entries]]
            id = "a"
            name = "A"
            weight = 2
            rarity = "N"
        "#;
        assert!(StaticCatalog::from_toml_str(text).is_err());
    }

    #[test]
    fn test_rejects_all_zero_gacha() {
        let mut catalog = StaticCatalog::new();
        let err = catalog
            .insert(1, vec![CatalogEntry::new("a", "A", 0)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_gacha() {
        let mut catalog = StaticCatalog::new();
        catalog.insert(1, vec![CatalogEntry::new("a", "A", 1)]).unwrap();
        assert!(catalog.insert(1, vec![CatalogEntry::new("b", "B", 1)]).is_err());
    }

    #[test]
    fn test_rejects_conflicting_entry_names() {
        let mut catalog = StaticCatalog::new();
        catalog.insert(1, vec![CatalogEntry::new("a", "A", 1)]).unwrap();
        assert!(catalog.insert(2, vec![CatalogEntry::new("a", "Other", 1)]).is_err());
        // Same id and name in another gacha is fine.
        catalog.insert(3, vec![CatalogEntry::new("a", "A", 4)]).unwrap();
    }
}
