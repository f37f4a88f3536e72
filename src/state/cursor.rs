//! Per-container resume cursor

use super::{read_json, write_json_atomic};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stored value meaning "container fully imported"
pub const COMPLETE_SENTINEL: i64 = 999_999_999;

/// Progress of one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Every row with an id up to and including this one is committed
    InProgress(i64),
    /// The whole container is committed
    Done,
}

impl Watermark {
    fn from_stored(value: i64) -> Self {
        if value >= COMPLETE_SENTINEL {
            Watermark::Done
        } else {
            Watermark::InProgress(value)
        }
    }

    fn to_stored(self) -> i64 {
        match self {
            Watermark::InProgress(id) => id,
            Watermark::Done => COMPLETE_SENTINEL,
        }
    }

    /// True when a row with this id is already committed
    pub fn covers(self, row_id: i64) -> bool {
        match self {
            Watermark::InProgress(id) => row_id <= id,
            Watermark::Done => true,
        }
    }

    pub fn is_done(self) -> bool {
        self == Watermark::Done
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watermark::InProgress(id) => write!(f, "{}", id),
            Watermark::Done => write!(f, "done"),
        }
    }
}

/// Resume cursor: container key to watermark, persisted as `{"key": id}`
#[derive(Debug)]
pub struct ResumeCursor {
    path: PathBuf,
    entries: BTreeMap<String, i64>,
}

impl ResumeCursor {
    /// Load the cursor file; a missing file is an empty cursor
    pub fn load(path: &Path) -> Result<Self> {
        let entries: BTreeMap<String, i64> = read_json(path)?;
        debug!("Loaded resume cursor with {} entries", entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<Watermark> {
        self.entries.get(key).copied().map(Watermark::from_stored)
    }

    /// Move a container's watermark forward; never backward
    pub fn advance(&mut self, key: &str, row_id: i64) -> Result<()> {
        if row_id >= COMPLETE_SENTINEL {
            return Err(Error::Other(format!(
                "Row id {} of '{}' collides with the completion sentinel",
                row_id, key
            )));
        }
        if let Some(current) = self.get(key) {
            let regressed = match current {
                Watermark::Done => true,
                Watermark::InProgress(id) => row_id < id,
            };
            if regressed {
                return Err(Error::CursorRegression {
                    container: key.to_string(),
                    current: current.to_string(),
                    attempted: row_id,
                });
            }
        }
        self.entries.insert(key.to_string(), row_id);
        Ok(())
    }

    /// Mark a container as fully imported
    pub fn complete(&mut self, key: &str) {
        self.entries
            .insert(key.to_string(), Watermark::Done.to_stored());
    }

    /// Persist the whole cursor atomically
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries)
    }

    /// All entries, in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Watermark)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), Watermark::from_stored(*v)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cursor(tmp: &TempDir) -> ResumeCursor {
        ResumeCursor::load(&tmp.path().join("checkpoint.json")).unwrap()
    }

    #[test]
    fn test_lifecycle_absent_watermark_done() {
        let tmp = TempDir::new().unwrap();
        let mut cursor = cursor(&tmp);

        assert_eq!(cursor.get("bukhari"), None);
        cursor.advance("bukhari", 500).unwrap();
        assert_eq!(cursor.get("bukhari"), Some(Watermark::InProgress(500)));
        cursor.advance("bukhari", 500).unwrap();
        cursor.advance("bukhari", 1000).unwrap();
        cursor.complete("bukhari");
        assert_eq!(cursor.get("bukhari"), Some(Watermark::Done));
    }

    #[test]
    fn test_advance_rejects_regression() {
        let tmp = TempDir::new().unwrap();
        let mut cursor = cursor(&tmp);

        cursor.advance("muslim", 42).unwrap();
        let err = cursor.advance("muslim", 41).unwrap_err();
        assert!(matches!(err, Error::CursorRegression { attempted: 41, .. }));
        assert_eq!(cursor.get("muslim"), Some(Watermark::InProgress(42)));

        cursor.complete("muslim");
        assert!(cursor.advance("muslim", 100).is_err());
        assert_eq!(cursor.get("muslim"), Some(Watermark::Done));
    }

    #[test]
    fn test_sentinel_round_trips_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoint.json");
        {
            let mut cursor = ResumeCursor::load(&path).unwrap();
            cursor.advance("sham-1", 77).unwrap();
            cursor.complete("sham-2");
            cursor.save().unwrap();
        }

        let raw: BTreeMap<String, i64> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["sham-1"], 77);
        assert_eq!(raw["sham-2"], COMPLETE_SENTINEL);

        let reloaded = ResumeCursor::load(&path).unwrap();
        assert_eq!(reloaded.get("sham-1"), Some(Watermark::InProgress(77)));
        assert_eq!(reloaded.get("sham-2"), Some(Watermark::Done));
    }

    #[test]
    fn test_covers() {
        assert!(Watermark::InProgress(10).covers(10));
        assert!(!Watermark::InProgress(10).covers(11));
        assert!(Watermark::Done.covers(i64::MAX));
    }
}
