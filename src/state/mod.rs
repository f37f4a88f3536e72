//! Durable side-state kept next to the database
//!
//! Both documents are small JSON objects rewritten in full after every
//! committed batch. A write goes to a sibling temp file which is then
//! renamed over the target, so a crash leaves either the old or the new
//! document, never a torn one.

mod cursor;
mod ledger;

pub use cursor::*;
pub use ledger::*;

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Read a JSON document, returning the default when the file is missing
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        debug!("No state file at {:?}, starting empty", path);
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Atomically replace a JSON document
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
