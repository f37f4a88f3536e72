//! Ingest command implementation

use crate::catalog::{Catalog, CatalogFilter, ContainerKind};
use crate::config::Config;
use crate::engine::{ensure_selection, IngestEngine, RunReport};
use crate::error::Result;
use crate::source::CatalogSource;
use crate::store::Store;
use tracing::info;

/// Options for an ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Only these container keys
    pub keys: Option<Vec<String>>,
    /// Only containers of this kind
    pub kind: Option<ContainerKind>,
    /// Draw progress bars
    pub progress: bool,
}

/// Ingest the selected catalog containers
pub async fn cmd_ingest(
    config: &Config,
    store: Store,
    options: IngestOptions,
) -> Result<RunReport> {
    let catalog = Catalog::load(&config.paths.catalog_file)?;
    let specs = catalog.select(&CatalogFilter {
        keys: options.keys,
        kind: options.kind,
    })?;
    ensure_selection(&specs)?;

    info!("Ingesting {} container(s)", specs.len());
    let source = CatalogSource::new(config);
    let mut engine =
        IngestEngine::from_config(config, store, source)?.with_progress(options.progress);
    Ok(engine.run(&specs).await)
}

/// Print the final aggregate table
pub fn print_run_report(report: &RunReport) {
    println!("\n📥 Ingestion Complete\n");
    println!(
        "{:<24} {:<18} {:>9} {:>9} {:>9}",
        "Container", "Status", "Imported", "Refreshed", "Skipped"
    );
    for c in &report.containers {
        let status = if c.is_failed() {
            "failed".to_string()
        } else {
            c.status.to_string()
        };
        println!(
            "{:<24} {:<18} {:>9} {:>9} {:>9}",
            c.key, status, c.imported, c.refreshed, c.skipped
        );
    }
    println!(
        "{:<24} {:<18} {:>9} {:>9} {:>9}",
        "TOTAL",
        "",
        report.total_imported(),
        report.total_refreshed(),
        report.total_skipped()
    );

    if report.has_failures() {
        println!("\nFailed containers:");
        for c in report.failed() {
            println!("- {} ({}): {}", c.key, c.label, c.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ContainerStatus;
    use crate::error::Error;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
[[container]]
key = "test-sahih"
kind = "hadith"
name_ar = "صحيح تجريبي"
name_en = "Test Sahih"
[container.author]
name_ar = "مؤلف"
[container.source]
type = "editions"
arabic = "ara-test"

[[container]]
key = "sham-1"
kind = "fatwa"
name_ar = "فتاوى"
[container.author]
name_ar = "مفت"
[container.source]
type = "archive"
archive = 9
book_id = 1
"#;

    const EDITION: &str = r#"{
        "metadata": {"name": "test", "sections": {"0": "", "1": "كتاب الصيام"}},
        "hadiths": [
            {"hadithnumber": 1, "text": "حديث طويل بما يكفي عن صيام شهر رمضان", "reference": {"book": 1}},
            {"hadithnumber": 2, "text": "قصير"}
        ]
    }"#;

    fn setup() -> (Config, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        std::fs::write(&config.paths.catalog_file, CATALOG).unwrap();
        std::fs::create_dir_all(&config.paths.editions_dir).unwrap();
        std::fs::write(config.paths.editions_dir.join("ara-test.json"), EDITION).unwrap();
        (config, tmp)
    }

    #[tokio::test]
    async fn test_ingest_then_rerun() {
        let (config, _tmp) = setup();
        let store = Store::connect(&config).await.unwrap();

        let options = IngestOptions {
            kind: Some(ContainerKind::Hadith),
            ..Default::default()
        };
        let report = cmd_ingest(&config, store.clone(), options.clone()).await.unwrap();
        assert_eq!(report.containers.len(), 1);
        assert_eq!(report.containers[0].status, ContainerStatus::Imported);
        assert_eq!(report.total_imported(), 1);
        assert_eq!(report.total_skipped(), 1);

        let record = store.get_record("test-sahih-1").await.unwrap().unwrap();
        assert_eq!(record.domain, "fasting");
        assert_eq!(record.citation, "Test Sahih 1");

        let again = cmd_ingest(&config, store, options).await.unwrap();
        assert_eq!(again.containers[0].status, ContainerStatus::AlreadyImported);
        assert_eq!(again.total_imported(), 0);
    }

    #[tokio::test]
    async fn test_missing_archive_is_reported_not_fatal() {
        let (config, _tmp) = setup();
        let store = Store::connect(&config).await.unwrap();

        let report = cmd_ingest(
            &config,
            store,
            IngestOptions {
                keys: Some(vec!["sham-1".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(report.containers[0].status, ContainerStatus::SourceAbsent);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_unknown_key_and_empty_selection() {
        let (config, _tmp) = setup();
        let store = Store::connect(&config).await.unwrap();

        let unknown = cmd_ingest(
            &config,
            store.clone(),
            IngestOptions {
                keys: Some(vec!["nope".to_string()]),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(unknown, Err(Error::ContainerNotFound(_))));

        let empty = cmd_ingest(
            &config,
            store,
            IngestOptions {
                keys: Some(vec!["sham-1".to_string()]),
                kind: Some(ContainerKind::Hadith),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(empty, Err(Error::Catalog(_))));
    }
}
