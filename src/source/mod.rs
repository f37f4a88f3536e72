//! Record sources
//!
//! A source turns one catalog container into an ordered stream of typed
//! rows. Two concrete sources exist: legacy Shamela archives read through
//! the `mdbtools` executables, and the bundled JSON hadith editions.
//! [`CatalogSource`] dispatches between them from the container's locator.

mod archive;
mod editions;

pub use archive::ArchiveSource;
pub use editions::{load_edition, Edition, EditionSource};

use crate::catalog::{ContainerSpec, SourceLocator};
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

/// A structural unit (book / section) reported by a source
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub local_number: i64,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
}

impl Section {
    /// Title used as classification context
    pub fn title(&self) -> Option<&str> {
        self.name_ar.as_deref().or(self.name_en.as_deref())
    }
}

/// One typed row of a container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    pub id: i64,
    /// Primary-language text, exactly as the source holds it
    pub text: String,
    pub volume: Option<i32>,
    pub page: Option<i32>,
    /// Local number of the owning structural unit
    pub unit: Option<i64>,
    pub text_en: Option<String>,
    pub text_fr: Option<String>,
    pub grade: Option<String>,
    pub grade_source: Option<String>,
}

/// Item of a row stream
#[derive(Debug, Clone, PartialEq)]
pub enum ScannedRow {
    Row(SourceRow),
    /// A row the source could not type (bad id, non-numeric part/page)
    Malformed { raw_id: String, reason: String },
}

/// Chapter titles keyed by the row id where they start
#[derive(Debug, Clone, Default)]
pub struct ChapterIndex {
    titles: BTreeMap<i64, String>,
}

impl ChapterIndex {
    pub fn insert(&mut self, id: i64, title: String) {
        self.titles.insert(id, title);
    }

    /// Title of the nearest chapter starting at or before `id`
    pub fn nearest(&self, id: i64) -> Option<&str> {
        self.titles
            .range(..=id)
            .next_back()
            .map(|(_, title)| title.as_str())
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl FromIterator<(i64, String)> for ChapterIndex {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self {
            titles: iter.into_iter().collect(),
        }
    }
}

/// An opened container
pub struct ContainerRows {
    pub sections: Vec<Section>,
    pub chapters: ChapterIndex,
    /// Number of rows, when the source knows it up front
    pub len_hint: Option<u64>,
    /// Rows in ascending id order
    pub rows: BoxStream<'static, Result<ScannedRow>>,
}

/// Anything able to open a catalog container
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Open a container; `Ok(None)` when its backing data is absent
    async fn open(&self, spec: &ContainerSpec) -> Result<Option<ContainerRows>>;
}

/// Source dispatching on each container's locator
pub struct CatalogSource {
    archive: ArchiveSource,
    editions: EditionSource,
}

impl CatalogSource {
    pub fn new(config: &Config) -> Self {
        Self {
            archive: ArchiveSource::new(
                config.paths.archive_dir.clone(),
                config.archive.mdb_tables_bin.clone(),
                config.archive.mdb_export_bin.clone(),
            ),
            editions: EditionSource::new(config.paths.editions_dir.clone()),
        }
    }
}

#[async_trait]
impl RecordSource for CatalogSource {
    async fn open(&self, spec: &ContainerSpec) -> Result<Option<ContainerRows>> {
        match &spec.source {
            SourceLocator::Archive { .. } => self.archive.open(spec).await,
            SourceLocator::Editions { .. } => self.editions.open(spec).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_index_nearest_preceding() {
        let index: ChapterIndex = vec![(1, "الطهارة".to_string()), (40, "الصلاة".to_string())]
            .into_iter()
            .collect();

        assert_eq!(index.nearest(0), None);
        assert_eq!(index.nearest(1), Some("الطهارة"));
        assert_eq!(index.nearest(39), Some("الطهارة"));
        assert_eq!(index.nearest(40), Some("الصلاة"));
        assert_eq!(index.nearest(10_000), Some("الصلاة"));
    }
}
