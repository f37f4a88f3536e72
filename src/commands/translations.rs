//! Translation fill command

use crate::catalog::{Catalog, SourceLocator};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::load_edition;
use crate::store::{Language, Store};
use serde::Serialize;
use tracing::info;

/// Statistics from a translation fill
#[derive(Debug, Clone, Serialize)]
pub struct TranslationStats {
    pub container: String,
    pub language: Language,
    pub edition: String,
    /// Numbered, non-empty texts in the edition
    pub candidates: usize,
    /// Records whose empty column was filled
    pub filled: u64,
}

/// Fill missing secondary texts of an ingested container from its edition
pub async fn cmd_fill_translations(
    config: &Config,
    store: &Store,
    key: &str,
    language: Language,
) -> Result<TranslationStats> {
    let catalog = Catalog::load(&config.paths.catalog_file)?;
    let spec = catalog
        .get(key)
        .ok_or_else(|| Error::ContainerNotFound(key.to_string()))?;

    let edition_name = match (&spec.source, language) {
        (SourceLocator::Editions { english, .. }, Language::English) => english.clone(),
        (SourceLocator::Editions { french, .. }, Language::French) => french.clone(),
        (SourceLocator::Archive { .. }, _) => None,
    }
    .ok_or_else(|| Error::Catalog(format!("Container '{}' has no {} edition", key, language)))?;

    let container = store
        .get_container_by_key(key)
        .await?
        .ok_or_else(|| Error::ContainerNotIngested(key.to_string()))?;

    let edition = load_edition(&config.paths.editions_dir, &edition_name)?.ok_or_else(|| {
        Error::Source(format!(
            "Edition {} not downloaded (run 'turath fetch editions')",
            edition_name
        ))
    })?;

    let texts: Vec<(i64, String)> = edition
        .by_number()
        .into_iter()
        .filter_map(|(number, hadith)| {
            let text = hadith.text.as_deref()?.trim();
            (!text.is_empty()).then(|| (number, text.to_string()))
        })
        .collect();

    let filled = store.fill_translation(container.id, language, &texts).await?;
    info!(
        "{}: filled {} {} text(s) from {}",
        key, filled, language, edition_name
    );

    Ok(TranslationStats {
        container: key.to_string(),
        language,
        edition: edition_name,
        candidates: texts.len(),
        filled,
    })
}

pub fn print_translation_stats(stats: &TranslationStats) {
    println!("\n🌐 Translations Filled\n");
    println!("Container: {}", stats.container);
    println!("Edition: {} ({})", stats.edition, stats.language);
    println!("Candidates: {}", stats.candidates);
    println!("Filled: {}", stats.filled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG_TEMPLATE;
    use crate::state::compute_content_hash;
    use crate::store::{ContainerIds, PreparedRecord};
    use tempfile::TempDir;

    fn prepared(row_id: i64, text_fr: Option<&str>) -> PreparedRecord {
        let text = format!("نص الحديث رقم {}", row_id);
        PreparedRecord {
            reference: format!("bukhari-{}", row_id),
            unit_id: None,
            row_id,
            volume: None,
            page: None,
            content_hash: compute_content_hash(&text),
            primary_text: text,
            text_en: None,
            text_fr: text_fr.map(str::to_string),
            domain: "uncategorized".to_string(),
            chapter_hint: None,
            grade: None,
            grade_source: None,
            citation: format!("Sahih al-Bukhari {}", row_id),
        }
    }

    #[tokio::test]
    async fn test_fill_only_empty_french_texts() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        std::fs::write(&config.paths.catalog_file, CATALOG_TEMPLATE).unwrap();
        std::fs::create_dir_all(&config.paths.editions_dir).unwrap();
        std::fs::write(
            config.paths.editions_dir.join("fra-bukhari.json"),
            r#"{"metadata": {"name": "fr"}, "hadiths": [
                {"hadithnumber": 1, "text": "Les actes ne valent que par les intentions"},
                {"hadithnumber": 2, "text": "Nouvelle traduction"},
                {"hadithnumber": 3, "text": "  "}
            ]}"#,
        )
        .unwrap();

        let store = Store::connect(&config).await.unwrap();
        let missing = cmd_fill_translations(&config, &store, "bukhari", Language::French).await;
        assert!(matches!(missing, Err(Error::ContainerNotIngested(_))));

        let catalog = Catalog::load(&config.paths.catalog_file).unwrap();
        let spec = catalog.get("bukhari").unwrap();
        let author_id = store
            .upsert_author(&spec.author, spec.school_tag(), spec.era.as_deref(), true)
            .await
            .unwrap();
        let container_id = store.upsert_container(spec, author_id).await.unwrap();
        store
            .write_batch(
                ContainerIds {
                    container_id,
                    author_id,
                },
                &[prepared(1, None), prepared(2, Some("Existante"))],
            )
            .await
            .unwrap();

        let stats = cmd_fill_translations(&config, &store, "bukhari", Language::French)
            .await
            .unwrap();
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.filled, 1);

        let first = store.get_record("bukhari-1").await.unwrap().unwrap();
        assert_eq!(
            first.text_fr.as_deref(),
            Some("Les actes ne valent que par les intentions")
        );
        assert_eq!(first.primary_text, "نص الحديث رقم 1");
        let second = store.get_record("bukhari-2").await.unwrap().unwrap();
        assert_eq!(second.text_fr.as_deref(), Some("Existante"));
    }

    #[tokio::test]
    async fn test_archive_container_has_no_edition() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        std::fs::write(&config.paths.catalog_file, CATALOG_TEMPLATE).unwrap();
        let store = Store::connect(&config).await.unwrap();

        let result =
            cmd_fill_translations(&config, &store, "sham-21537", Language::English).await;
        assert!(matches!(result, Err(Error::Catalog(_))));
    }
}
