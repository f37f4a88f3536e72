//! Fetch commands: JSON editions and sunnah.com chapter listings

use crate::catalog::{Catalog, CatalogFilter, ContainerKind, ContainerSpec, SourceLocator};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{DownloadOutcome, EditionDownloader, HttpFetcher, SunnahClient};
use crate::source::Section;
use crate::store::{ChapterUpsert, Store};
use serde::Serialize;
use tracing::{info, warn};

/// One edition download
#[derive(Debug, Clone, Serialize)]
pub struct EditionFetch {
    pub container: String,
    pub edition: String,
    pub status: String,
}

/// Statistics from a chapter fetch
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChapterFetchStats {
    pub containers: usize,
    pub units_added: usize,
    pub chapters: usize,
    pub requests: u64,
    pub errors: Vec<String>,
}

fn selected_hadith(config: &Config, keys: Option<Vec<String>>) -> Result<Vec<ContainerSpec>> {
    let catalog = Catalog::load(&config.paths.catalog_file)?;
    catalog.select(&CatalogFilter {
        keys,
        kind: Some(ContainerKind::Hadith),
    })
}

/// Download every edition named by the selected containers
pub async fn cmd_fetch_editions(
    config: &Config,
    keys: Option<Vec<String>>,
    force: bool,
) -> Result<Vec<EditionFetch>> {
    let specs = selected_hadith(config, keys)?;
    let fetcher = HttpFetcher::from_config(&config.api)?;
    let downloader =
        EditionDownloader::new(&fetcher, &config.editions.mirrors, &config.paths.editions_dir);

    let mut fetched = Vec::new();
    for spec in &specs {
        let SourceLocator::Editions {
            arabic,
            english,
            french,
            ..
        } = &spec.source
        else {
            continue;
        };

        let names = std::iter::once(arabic).chain(english).chain(french);
        for edition in names {
            let status = match downloader.download(edition, force).await {
                Ok(DownloadOutcome::Cached) => "cached".to_string(),
                Ok(DownloadOutcome::Downloaded(_)) => "downloaded".to_string(),
                Ok(DownloadOutcome::Missing) => {
                    warn!("Edition {} not found on any mirror", edition);
                    "missing".to_string()
                }
                Err(e) => {
                    warn!("Edition {} failed: {}", edition, e);
                    format!("failed: {}", e)
                }
            };
            fetched.push(EditionFetch {
                container: spec.key.clone(),
                edition: edition.clone(),
                status,
            });
        }
    }

    info!("{} edition(s) processed", fetched.len());
    Ok(fetched)
}

/// Fetch chapter listings for ingested hadith containers
pub async fn cmd_fetch_chapters(
    config: &Config,
    store: &Store,
    keys: Option<Vec<String>>,
) -> Result<ChapterFetchStats> {
    let specs = selected_hadith(config, keys)?;
    let client = SunnahClient::from_config(&config.api)?;
    fetch_chapters(&client, store, &specs).await
}

/// Create missing units from the book listing, then upsert each book's chapters
pub async fn fetch_chapters(
    client: &SunnahClient,
    store: &Store,
    specs: &[ContainerSpec],
) -> Result<ChapterFetchStats> {
    let mut stats = ChapterFetchStats::default();

    for spec in specs {
        let SourceLocator::Editions {
            sunnah: Some(collection),
            ..
        } = &spec.source
        else {
            continue;
        };

        let container = store
            .get_container_by_key(&spec.key)
            .await?
            .ok_or_else(|| Error::ContainerNotIngested(spec.key.clone()))?;
        stats.containers += 1;

        let books = client.books(collection).await?;
        let sections: Vec<Section> = books
            .iter()
            .filter_map(|book| {
                let local_number = book.number()?.parse::<i64>().ok()?;
                Some(Section {
                    local_number,
                    name_ar: book.name("ar"),
                    name_en: book.name("en"),
                })
            })
            .collect();

        let before = store.unit_map(container.id).await?.len();
        let units = store.ensure_units(container.id, &sections).await?;
        stats.units_added += units.len().saturating_sub(before);

        for book in &books {
            let Some(number) = book.number() else {
                continue;
            };
            let chapters = match client.chapters(collection, &number).await {
                Ok(chapters) => chapters,
                Err(e) => {
                    warn!("{} book {}: {}", spec.key, number, e);
                    stats.errors.push(format!("{} book {}: {}", spec.key, number, e));
                    continue;
                }
            };

            let unit_id = number.parse::<i64>().ok().and_then(|n| units.get(&n).copied());
            let rows: Vec<ChapterUpsert> = chapters
                .iter()
                .filter_map(|chapter| {
                    let chapter_number = chapter.id()?;
                    let ar = chapter.localized("ar");
                    let en = chapter.localized("en");
                    Some(ChapterUpsert {
                        unit_id,
                        chapter_number,
                        name_ar: ar.and_then(|c| c.title.clone()),
                        name_en: en.and_then(|c| c.title.clone()),
                        intro: en.or(ar).and_then(|c| c.intro.clone()),
                        ending: en.or(ar).and_then(|c| c.ending.clone()),
                    })
                })
                .collect();
            stats.chapters += store.upsert_chapters(container.id, &rows).await?;
        }
        info!("{}: {} book(s) listed", spec.key, books.len());
    }

    stats.requests = client.request_count();
    Ok(stats)
}

pub fn print_edition_fetches(fetched: &[EditionFetch]) {
    println!("\n📦 Editions\n");
    if fetched.is_empty() {
        println!("No editions referenced by the selected containers.");
        return;
    }
    for f in fetched {
        println!("  {:<20} {:<24} {}", f.container, f.edition, f.status);
    }
}

pub fn print_chapter_stats(stats: &ChapterFetchStats) {
    println!("\n📖 Chapters Fetched\n");
    println!("Containers: {}", stats.containers);
    println!("Units added: {}", stats.units_added);
    println!("Chapters upserted: {}", stats.chapters);
    println!("API requests: {}", stats.requests);
    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("- {}", error);
        }
    }
}
