//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::state::{ChangeLedger, ResumeCursor};
use crate::store::{ContainerStats, GlobalStats, Store};
use serde::Serialize;

/// Status of one stored container
#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatusInfo {
    #[serde(flatten)]
    pub stats: ContainerStats,
    /// Cursor position: a row id, "done", or none
    pub cursor: Option<String>,
    pub ledger_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub records: i64,
}

/// System status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub catalog_path: String,
    pub cursor_path: String,
    pub ledger_path: String,
    pub stats: GlobalStats,
    pub containers: Vec<ContainerStatusInfo>,
    pub domains: Vec<DomainCount>,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &Store) -> Result<StatusInfo> {
    let cursor = ResumeCursor::load(&config.paths.cursor_file)?;
    let ledger = ChangeLedger::load(&config.paths.ledger_file)?;

    let containers = store
        .container_stats()
        .await?
        .into_iter()
        .map(|stats| ContainerStatusInfo {
            cursor: cursor.get(&stats.external_id).map(|w| w.to_string()),
            ledger_entries: ledger.count_for_container(&stats.external_id),
            stats,
        })
        .collect();

    let domains = store
        .domain_counts()
        .await?
        .into_iter()
        .map(|(domain, records)| DomainCount { domain, records })
        .collect();

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        catalog_path: config.paths.catalog_file.display().to_string(),
        cursor_path: config.paths.cursor_file.display().to_string(),
        ledger_path: config.paths.ledger_file.display().to_string(),
        stats: store.get_global_stats().await?,
        containers,
        domains,
    })
}

/// Print status to stdout
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 turath Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Catalog: {}", status.catalog_path);
    println!("Cursor: {}", status.cursor_path);
    println!("Ledger: {}", status.ledger_path);

    println!("\nDatabase Stats:");
    println!("  Authors: {}", status.stats.author_count);
    println!("  Containers: {}", status.stats.container_count);
    println!("  Units: {}", status.stats.unit_count);
    println!("  Chapters: {}", status.stats.chapter_count);
    println!("  Records: {}", status.stats.record_count);

    if status.containers.is_empty() {
        println!("\nNo containers ingested. Use 'turath ingest' to start.");
        return;
    }

    println!("\nContainers:");
    for c in &status.containers {
        println!("  {} [{}] {}", c.stats.external_id, c.stats.kind, c.stats.name_ar);
        println!(
            "    Records: {}  Units: {}  Chapters: {}",
            c.stats.records, c.stats.units, c.stats.chapters
        );
        println!(
            "    Cursor: {}  Ledger: {}  Last run: {}",
            c.cursor.as_deref().unwrap_or("not started"),
            c.ledger_entries,
            c.stats.last_status.as_deref().unwrap_or("-")
        );
    }

    if !status.domains.is_empty() {
        println!("\nDomains:");
        for d in &status.domains {
            println!("  {:<20} {}", d.domain, d.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CATALOG_TEMPLATE};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_cursor_and_ledger() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        let store = Store::connect(&config).await.unwrap();

        let catalog = Catalog::parse(CATALOG_TEMPLATE).unwrap();
        let spec = catalog.get("sham-21537").unwrap();
        let author_id = store
            .upsert_author(&spec.author, spec.school_tag(), spec.era.as_deref(), false)
            .await
            .unwrap();
        store.upsert_container(spec, author_id).await.unwrap();

        let mut cursor = ResumeCursor::load(&config.paths.cursor_file).unwrap();
        cursor.advance("sham-21537", 42).unwrap();
        cursor.save().unwrap();
        let mut ledger = ChangeLedger::load(&config.paths.ledger_file).unwrap();
        ledger.record("sham-21537-1".to_string(), "h1".to_string());
        ledger.record("bukhari-1".to_string(), "h2".to_string());
        ledger.record("sham-21537-2-7".to_string(), "h3".to_string());
        ledger.save().unwrap();

        let status = cmd_status(&config, &store).await.unwrap();
        assert_eq!(status.stats.container_count, 1);
        assert_eq!(status.containers.len(), 1);
        assert_eq!(status.containers[0].cursor.as_deref(), Some("42"));
        assert_eq!(status.containers[0].ledger_entries, 1);
        assert_eq!(status.containers[0].stats.records, 0);
        assert!(status.domains.is_empty());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["containers"][0]["external_id"], "sham-21537");
    }
}
