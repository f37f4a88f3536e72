//! Container catalog
//!
//! The catalog is the declarative list of works to ingest. Each
//! `[[container]]` entry names the work, its author and the locator of its
//! backing data. The engine itself knows nothing about particular books.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Kind of work held by a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Hadith,
    Fatwa,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::Hadith => write!(f, "hadith"),
            ContainerKind::Fatwa => write!(f, "fatwa"),
        }
    }
}

impl FromStr for ContainerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hadith" => Ok(ContainerKind::Hadith),
            "fatwa" => Ok(ContainerKind::Fatwa),
            _ => Err(Error::Catalog(format!("Unknown container kind: {}", s))),
        }
    }
}

/// Author (scholar or compiler) of a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSpec {
    pub name_ar: String,
    #[serde(default)]
    pub name_fr: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    /// Hijri death year
    #[serde(default)]
    pub death_year: Option<i32>,
}

/// Where a container's rows come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceLocator {
    /// Shamela archive `{archive}.mdb`, tables `b{book_id}` / `t{book_id}`
    Archive { archive: u32, book_id: u32 },
    /// JSON editions `{edition}.json`
    Editions {
        arabic: String,
        #[serde(default)]
        english: Option<String>,
        #[serde(default)]
        french: Option<String>,
        /// sunnah.com collection slug, for chapter listings
        #[serde(default)]
        sunnah: Option<String>,
    },
}

/// One logical work to ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Stable external identifier; also the record reference prefix
    pub key: String,
    pub kind: ContainerKind,
    pub name_ar: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub name_fr: Option<String>,
    /// Classification tag of the work (e.g. a jurisprudential school)
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default = "default_volumes")]
    pub volumes: u32,
    pub author: AuthorSpec,
    pub source: SourceLocator,
}

fn default_volumes() -> u32 {
    1
}

impl ContainerSpec {
    /// Deterministic reference for a raw row of this container
    pub fn reference(&self, row_id: i64) -> String {
        format!("{}-{}", self.key, row_id)
    }

    /// Human-readable citation, e.g. "Sahih al-Bukhari 1"
    pub fn citation(&self, row_id: i64) -> String {
        let name = self.name_en.as_deref().unwrap_or(&self.name_ar);
        format!("{} {}", name, row_id)
    }

    /// School tag used for author identity; empty when unset
    pub fn school_tag(&self) -> &str {
        self.school.as_deref().unwrap_or("")
    }

    /// Display label for reports
    pub fn label(&self) -> &str {
        self.name_fr
            .as_deref()
            .or(self.name_en.as_deref())
            .unwrap_or(&self.name_ar)
    }

    /// Classical-era authors are recorded as deceased
    pub fn author_is_deceased(&self) -> bool {
        self.author.death_year.is_some()
            || matches!(self.era.as_deref(), Some("classical") | Some("classique"))
    }
}

/// The full catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "container")]
    pub containers: Vec<ContainerSpec>,
}

/// Catalog filter used by commands
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub keys: Option<Vec<String>>,
    pub kind: Option<ContainerKind>,
}

impl Catalog {
    /// Parse a catalog from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog from {:?}", path);
        if !path.exists() {
            return Err(Error::Catalog(format!(
                "Catalog file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Check keys and volume counts
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for container in &self.containers {
            let key = container.key.as_str();
            if key.is_empty() || key.chars().any(char::is_whitespace) {
                return Err(Error::Catalog(format!(
                    "Invalid container key '{}': must be non-empty without whitespace",
                    key
                )));
            }
            // References are `{key}-{row id}`; a trailing '-' makes them ambiguous
            if key.ends_with('-') {
                return Err(Error::Catalog(format!(
                    "Invalid container key '{}': must not end with '-'",
                    key
                )));
            }
            if !seen.insert(key) {
                return Err(Error::Catalog(format!("Duplicate container key '{}'", key)));
            }
            if container.volumes == 0 {
                return Err(Error::Catalog(format!(
                    "Container '{}' must have at least one volume",
                    key
                )));
            }
            if container.name_ar.trim().is_empty() || container.author.name_ar.trim().is_empty() {
                return Err(Error::Catalog(format!(
                    "Container '{}' needs Arabic names for the work and its author",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Find a container by key
    pub fn get(&self, key: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.key == key)
    }

    /// Select containers in catalog order; unknown keys are an error
    pub fn select(&self, filter: &CatalogFilter) -> Result<Vec<ContainerSpec>> {
        if let Some(keys) = &filter.keys {
            if let Some(missing) = keys.iter().find(|k| self.get(k).is_none()) {
                return Err(Error::ContainerNotFound(missing.clone()));
            }
        }

        Ok(self
            .containers
            .iter()
            .filter(|c| {
                filter
                    .keys
                    .as_ref()
                    .map_or(true, |keys| keys.iter().any(|k| k == &c.key))
            })
            .filter(|c| filter.kind.map_or(true, |kind| c.kind == kind))
            .cloned()
            .collect())
    }
}

/// Starter catalog written by `turath init`
pub const CATALOG_TEMPLATE: &str = r#"# turath catalog: one [[container]] per work, processed in file order.

[[container]]
key = "bukhari"
kind = "hadith"
name_ar = "صحيح البخاري"
name_en = "Sahih al-Bukhari"
name_fr = "Sahih Al-Bukhari"
school = "sunni"
era = "classical"
[container.author]
name_ar = "محمد بن إسماعيل البخاري"
name_en = "Al-Bukhari"
death_year = 256
[container.source]
type = "editions"
arabic = "ara-bukhari"
english = "eng-bukhari"
french = "fra-bukhari"
sunnah = "bukhari"

[[container]]
key = "sham-21537"
kind = "fatwa"
name_ar = "مجموع فتاوى ابن باز"
name_fr = "Majmu' Fatawa Ibn Baz"
school = "salafi"
era = "contemporary"
volumes = 30
[container.author]
name_ar = "عبد العزيز بن عبد الله بن باز"
name_fr = "Ibn Baz"
[container.source]
type = "archive"
archive = 4
book_id = 21537
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let catalog = Catalog::parse(CATALOG_TEMPLATE).unwrap();
        assert_eq!(catalog.containers.len(), 2);

        let bukhari = catalog.get("bukhari").unwrap();
        assert_eq!(bukhari.kind, ContainerKind::Hadith);
        assert_eq!(bukhari.reference(7), "bukhari-7");
        assert_eq!(bukhari.citation(7), "Sahih al-Bukhari 7");
        assert!(matches!(
            bukhari.source,
            SourceLocator::Editions { ref sunnah, .. } if sunnah.as_deref() == Some("bukhari")
        ));

        let baz = catalog.get("sham-21537").unwrap();
        assert_eq!(baz.volumes, 30);
        assert_eq!(
            baz.source,
            SourceLocator::Archive {
                archive: 4,
                book_id: 21537
            }
        );
        assert!(!baz.author_is_deceased());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let doubled = format!("{}\n{}", CATALOG_TEMPLATE, CATALOG_TEMPLATE);
        assert!(matches!(
            Catalog::parse(&doubled),
            Err(Error::Catalog(msg)) if msg.contains("Duplicate")
        ));
    }

    #[test]
    fn test_key_with_whitespace_rejected() {
        let bad = CATALOG_TEMPLATE.replace("key = \"bukhari\"", "key = \"sahih bukhari\"");
        assert!(Catalog::parse(&bad).is_err());
    }

    #[test]
    fn test_key_with_trailing_dash_rejected() {
        // "sham-" row 1 and "sham" row -1 would both be "sham--1"
        let bad = CATALOG_TEMPLATE.replace("key = \"sham-21537\"", "key = \"sham-\"");
        assert!(matches!(
            Catalog::parse(&bad),
            Err(Error::Catalog(msg)) if msg.contains("must not end with")
        ));
    }

    #[test]
    fn test_select_filters_in_catalog_order() {
        let catalog = Catalog::parse(CATALOG_TEMPLATE).unwrap();

        let all = catalog.select(&CatalogFilter::default()).unwrap();
        assert_eq!(all[0].key, "bukhari");
        assert_eq!(all[1].key, "sham-21537");

        let fatwas = catalog
            .select(&CatalogFilter {
                keys: None,
                kind: Some(ContainerKind::Fatwa),
            })
            .unwrap();
        assert_eq!(fatwas.len(), 1);

        let missing = catalog.select(&CatalogFilter {
            keys: Some(vec!["nope".to_string()]),
            kind: None,
        });
        assert!(matches!(missing, Err(Error::ContainerNotFound(k)) if k == "nope"));
    }
}
