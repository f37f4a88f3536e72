//! Download of JSON hadith editions from mirrors

use super::HttpFetcher;
use crate::error::{Error, Result};
use crate::source::Edition;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of fetching one edition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Already present on disk
    Cached,
    /// Downloaded from the given mirror URL
    Downloaded(String),
    /// No mirror has it
    Missing,
}

pub struct EditionDownloader<'a> {
    fetcher: &'a HttpFetcher,
    mirrors: &'a [String],
    dir: PathBuf,
}

impl<'a> EditionDownloader<'a> {
    pub fn new(fetcher: &'a HttpFetcher, mirrors: &'a [String], dir: &Path) -> Self {
        Self {
            fetcher,
            mirrors,
            dir: dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, edition: &str) -> PathBuf {
        self.dir.join(format!("{}.json", edition))
    }

    /// Fetch an edition unless it is cached; mirrors are tried in order
    pub async fn download(&self, edition: &str, force: bool) -> Result<DownloadOutcome> {
        let target = self.path_for(edition);
        if target.exists() && !force {
            debug!("{} cached at {:?}", edition, target);
            return Ok(DownloadOutcome::Cached);
        }

        let mut last_error = None;
        for mirror in self.mirrors {
            let url = mirror.replace("{edition}", edition);
            match self.fetcher.get_text(&url, &[]).await {
                Ok(Some(body)) => {
                    // Reject anything that is not an edition document
                    if let Err(e) = Edition::parse(&body) {
                        warn!("{} is not a valid edition: {}", url, e);
                        last_error = Some(e);
                        continue;
                    }
                    write_file(&target, &body)?;
                    info!("Downloaded {} from {}", edition, url);
                    return Ok(DownloadOutcome::Downloaded(url));
                }
                Ok(None) => debug!("{} not found at {}", edition, url),
                Err(e) => {
                    warn!("Mirror {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(DownloadOutcome::Missing),
        }
    }
}

fn write_file(target: &Path, body: &str) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::Other(format!("No parent directory for {}", target.display())))?;
    std::fs::create_dir_all(parent)?;
    let tmp = target.with_extension("json.part");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, target)?;
    Ok(())
}
