//! Change ledger: reference to content hash at last commit

use super::{read_json, write_json_atomic};
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// BLAKE3 hex digest of a record's primary text
pub fn compute_content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug)]
pub struct ChangeLedger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ChangeLedger {
    pub fn load(path: &Path) -> Result<Self> {
        let entries: BTreeMap<String, String> = read_json(path)?;
        debug!("Loaded change ledger with {} entries", entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn lookup(&self, reference: &str) -> Option<&str> {
        self.entries.get(reference).map(String::as_str)
    }

    /// True when the ledger already holds exactly this hash
    pub fn is_unchanged(&self, reference: &str, hash: &str) -> bool {
        self.lookup(reference) == Some(hash)
    }

    pub fn record(&mut self, reference: String, hash: String) {
        self.entries.insert(reference, hash);
    }

    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries referencing rows of the container `key`
    ///
    /// Only `{key}-{row id}` references count, so a key that extends
    /// another (`sham-1`, `sham-1-2`) is not mixed in.
    pub fn count_for_container(&self, key: &str) -> usize {
        let prefix = format!("{}-", key);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k[prefix.len()..].parse::<i64>().is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_stable_and_text_sensitive() {
        let a = compute_content_hash("إنما الأعمال بالنيات");
        assert_eq!(a, compute_content_hash("إنما الأعمال بالنيات"));
        assert_ne!(a, compute_content_hash("إنما الأعمال بالنية"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_record_lookup_and_persist() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hashes.json");

        let mut ledger = ChangeLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.record("bukhari-1".to_string(), "h1".to_string());
        ledger.record("bukhari-2".to_string(), "h2".to_string());
        ledger.record("muslim-1".to_string(), "h3".to_string());
        assert!(ledger.is_unchanged("bukhari-1", "h1"));
        assert!(!ledger.is_unchanged("bukhari-1", "other"));
        ledger.save().unwrap();

        let reloaded = ChangeLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.lookup("bukhari-2"), Some("h2"));
        assert_eq!(reloaded.count_for_container("bukhari"), 2);
    }

    #[test]
    fn test_count_ignores_keys_extending_another() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = ChangeLedger::load(&tmp.path().join("hashes.json")).unwrap();
        ledger.record("sham-1-10".to_string(), "a".to_string());
        ledger.record("sham-1-11".to_string(), "b".to_string());
        ledger.record("sham-1-2-10".to_string(), "c".to_string());

        assert_eq!(ledger.count_for_container("sham-1"), 2);
        assert_eq!(ledger.count_for_container("sham-1-2"), 1);
        assert_eq!(ledger.count_for_container("sham"), 0);
    }
}
