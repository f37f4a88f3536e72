//! Corpus storage using SQLite
//!
//! This module owns the relational store:
//! - Authors (scholars and compilers)
//! - Containers (collections and fatwa books)
//! - Units and chapters (structural subdivisions)
//! - Records (hadiths and fatwa pages, primary text write-once)
//! - Ingestion runs (history and counts)

mod schema;

pub use schema::*;

use crate::catalog::{AuthorSpec, ContainerSpec};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::Section;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Ingestion run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Other(format!("Unknown run status: {}", s))),
        }
    }
}

/// Secondary language of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    French,
}

impl Language {
    fn column(self) -> &'static str {
        match self {
            Language::English => "text_en",
            Language::French => "text_fr",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::English => write!(f, "en"),
            Language::French => write!(f, "fr"),
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(Language::English),
            "fr" | "fra" | "french" => Ok(Language::French),
            _ => Err(Error::Other(format!("Unknown language: {}", s))),
        }
    }
}

/// A stored container
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub external_id: String,
    pub kind: String,
    pub name_ar: String,
    pub name_en: Option<String>,
    pub name_fr: Option<String>,
    pub author_id: i64,
    pub school: Option<String>,
    pub era: Option<String>,
    pub volume_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub reference: String,
    pub container_id: i64,
    pub unit_id: Option<i64>,
    pub author_id: i64,
    pub row_id: i64,
    pub volume: Option<i64>,
    pub page: Option<i64>,
    pub primary_text: String,
    pub content_hash: String,
    pub text_en: Option<String>,
    pub text_fr: Option<String>,
    pub is_auto_translated: bool,
    pub domain: String,
    pub chapter_hint: Option<String>,
    pub grade: Option<String>,
    pub grade_source: Option<String>,
    pub citation: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A record ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub reference: String,
    pub unit_id: Option<i64>,
    pub row_id: i64,
    pub volume: Option<i32>,
    pub page: Option<i32>,
    pub primary_text: String,
    pub content_hash: String,
    pub text_en: Option<String>,
    pub text_fr: Option<String>,
    pub domain: String,
    pub chapter_hint: Option<String>,
    pub grade: Option<String>,
    pub grade_source: Option<String>,
    pub citation: String,
}

/// Owning rows of a container's records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerIds {
    pub container_id: i64,
    pub author_id: i64,
}

/// Outcome of one committed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// New references inserted
    pub imported: u64,
    /// Existing references whose secondary columns were refreshed
    pub refreshed: u64,
}

/// A chapter listed by the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterUpsert {
    pub unit_id: Option<i64>,
    pub chapter_number: String,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub intro: Option<String>,
    pub ending: Option<String>,
}

/// An ingestion run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: String,
    pub container_id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub imported: i64,
    pub refreshed: i64,
    pub skipped: i64,
    pub error: Option<String>,
}

impl IngestionRun {
    pub fn new(container_id: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            container_id,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            imported: 0,
            refreshed: 0,
            skipped: 0,
            error: None,
        }
    }
}

/// Per-container statistics
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContainerStats {
    pub external_id: String,
    pub kind: String,
    pub name_ar: String,
    pub records: i64,
    pub units: i64,
    pub chapters: i64,
    pub last_status: Option<String>,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub author_count: usize,
    pub container_count: usize,
    pub unit_count: usize,
    pub chapter_count: usize,
    pub record_count: usize,
}

/// Corpus database handle
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        if !store.is_initialized().await? {
            store.init_schema().await?;
        }
        Ok(store)
    }

    /// Apply the schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master \
             WHERE type='trigger' AND name='records_primary_text_immutable'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Entity Operations =====

    /// Insert or update an author; returns its id
    pub async fn upsert_author(
        &self,
        author: &AuthorSpec,
        school: &str,
        era: Option<&str>,
        deceased: bool,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO authors (name_ar, name_fr, name_en, school, era, death_year, is_deceased, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name_ar, school) DO UPDATE SET
                name_fr = excluded.name_fr,
                name_en = excluded.name_en,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&author.name_ar)
        .bind(&author.name_fr)
        .bind(&author.name_en)
        .bind(school)
        .bind(era)
        .bind(author.death_year)
        .bind(deceased)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert or update a container's display metadata; returns its id
    pub async fn upsert_container(&self, spec: &ContainerSpec, author_id: i64) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO containers (external_id, kind, name_ar, name_en, name_fr, author_id, school, era, volume_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                kind = excluded.kind,
                name_ar = excluded.name_ar,
                name_en = excluded.name_en,
                name_fr = excluded.name_fr,
                author_id = excluded.author_id,
                school = excluded.school,
                era = excluded.era,
                volume_count = excluded.volume_count,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&spec.key)
        .bind(spec.kind.to_string())
        .bind(&spec.name_ar)
        .bind(&spec.name_en)
        .bind(&spec.name_fr)
        .bind(author_id)
        .bind(&spec.school)
        .bind(&spec.era)
        .bind(spec.volumes as i64)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_container_by_key(&self, key: &str) -> Result<Option<Container>> {
        let container =
            sqlx::query_as::<_, Container>("SELECT * FROM containers WHERE external_id = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(container)
    }

    /// Insert missing units; returns local number to unit id for the container
    pub async fn ensure_units(
        &self,
        container_id: i64,
        sections: &[Section],
    ) -> Result<HashMap<i64, i64>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for section in sections {
            sqlx::query(
                r#"
                INSERT INTO units (container_id, local_number, name_ar, name_en, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(container_id, local_number) DO NOTHING
                "#,
            )
            .bind(container_id)
            .bind(section.local_number)
            .bind(&section.name_ar)
            .bind(&section.name_en)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.unit_map(container_id).await
    }

    /// Local number to unit id for a container
    pub async fn unit_map(&self, container_id: i64) -> Result<HashMap<i64, i64>> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT local_number, id FROM units WHERE container_id = ?")
                .bind(container_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Insert or update chapters in one transaction
    pub async fn upsert_chapters(
        &self,
        container_id: i64,
        chapters: &[ChapterUpsert],
    ) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for chapter in chapters {
            sqlx::query(
                r#"
                INSERT INTO chapters (container_id, unit_id, chapter_number, name_ar, name_en, intro, ending, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(container_id, chapter_number) DO UPDATE SET
                    unit_id = COALESCE(excluded.unit_id, chapters.unit_id),
                    name_ar = excluded.name_ar,
                    name_en = excluded.name_en,
                    intro = excluded.intro,
                    ending = excluded.ending,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(container_id)
            .bind(chapter.unit_id)
            .bind(&chapter.chapter_number)
            .bind(&chapter.name_ar)
            .bind(&chapter.name_en)
            .bind(&chapter.intro)
            .bind(&chapter.ending)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(chapters.len())
    }

    // ===== Record Operations =====

    /// Write a batch in one transaction
    ///
    /// New references are inserted. An existing reference keeps its primary
    /// text, hash and domain; only non-null secondary columns are refreshed,
    /// and only rows whose secondary values actually change are counted.
    /// Any error rolls the whole batch back.
    pub async fn write_batch(
        &self,
        ids: ContainerIds,
        records: &[PreparedRecord],
    ) -> Result<BatchOutcome> {
        let now = Utc::now().to_rfc3339();
        let mut outcome = BatchOutcome::default();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO records (reference, container_id, unit_id, author_id, row_id, volume, page,
                                     primary_text, content_hash, text_en, text_fr, is_auto_translated,
                                     domain, chapter_hint, grade, grade_source, citation, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(reference) DO NOTHING
                "#,
            )
            .bind(&record.reference)
            .bind(ids.container_id)
            .bind(record.unit_id)
            .bind(ids.author_id)
            .bind(record.row_id)
            .bind(record.volume)
            .bind(record.page)
            .bind(&record.primary_text)
            .bind(&record.content_hash)
            .bind(&record.text_en)
            .bind(&record.text_fr)
            .bind(&record.domain)
            .bind(&record.chapter_hint)
            .bind(&record.grade)
            .bind(&record.grade_source)
            .bind(&record.citation)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 1 {
                outcome.imported += 1;
                continue;
            }

            // Untouched unless a non-null secondary value differs
            outcome.refreshed += sqlx::query(
                r#"
                UPDATE records SET
                    text_en = COALESCE(?1, text_en),
                    text_fr = COALESCE(?2, text_fr),
                    grade = COALESCE(?3, grade),
                    grade_source = COALESCE(?4, grade_source),
                    updated_at = ?5
                WHERE reference = ?6
                  AND (text_en IS NOT COALESCE(?1, text_en)
                    OR text_fr IS NOT COALESCE(?2, text_fr)
                    OR grade IS NOT COALESCE(?3, grade)
                    OR grade_source IS NOT COALESCE(?4, grade_source))
                "#,
            )
            .bind(&record.text_en)
            .bind(&record.text_fr)
            .bind(&record.grade)
            .bind(&record.grade_source)
            .bind(&now)
            .bind(&record.reference)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn get_record(&self, reference: &str) -> Result<Option<Record>> {
        let record = sqlx::query_as::<_, Record>("SELECT * FROM records WHERE reference = ?")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Records of a container in row order
    pub async fn list_records(&self, container_id: i64) -> Result<Vec<Record>> {
        let records = sqlx::query_as::<_, Record>(
            "SELECT * FROM records WHERE container_id = ? ORDER BY row_id",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Set a secondary text only where it is currently missing
    ///
    /// Returns the number of records filled.
    pub async fn fill_translation(
        &self,
        container_id: i64,
        language: Language,
        texts: &[(i64, String)],
    ) -> Result<u64> {
        let column = language.column();
        let sql = format!(
            "UPDATE records SET {col} = ?, is_auto_translated = 0, updated_at = ? \
             WHERE container_id = ? AND row_id = ? AND ({col} IS NULL OR {col} = '')",
            col = column
        );

        let now = Utc::now().to_rfc3339();
        let mut filled = 0;
        let mut tx = self.pool.begin().await?;
        for (row_id, text) in texts {
            filled += sqlx::query(&sql)
                .bind(text)
                .bind(&now)
                .bind(container_id)
                .bind(*row_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(filled)
    }

    // ===== Ingestion Run Operations =====

    pub async fn start_ingestion_run(&self, container_id: i64) -> Result<IngestionRun> {
        let run = IngestionRun::new(container_id);
        sqlx::query(
            r#"
            INSERT INTO ingestion_runs (id, container_id, started_at, status, imported, refreshed, skipped)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(run.container_id)
        .bind(&run.started_at)
        .bind(&run.status)
        .bind(run.imported)
        .bind(run.refreshed)
        .bind(run.skipped)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    pub async fn complete_ingestion_run(
        &self,
        id: &str,
        status: RunStatus,
        imported: u64,
        refreshed: u64,
        skipped: u64,
        error: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_runs SET
                completed_at = ?,
                status = ?,
                imported = ?,
                refreshed = ?,
                skipped = ?,
                error = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(imported as i64)
        .bind(refreshed as i64)
        .bind(skipped as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_latest_run(&self, container_id: i64) -> Result<Option<IngestionRun>> {
        let run = sqlx::query_as::<_, IngestionRun>(
            "SELECT * FROM ingestion_runs WHERE container_id = ? ORDER BY started_at DESC LIMIT 1",
        )
        .bind(container_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    pub async fn container_stats(&self) -> Result<Vec<ContainerStats>> {
        let stats = sqlx::query_as::<_, ContainerStats>(
            r#"
            SELECT c.external_id, c.kind, c.name_ar,
                (SELECT COUNT(*) FROM records r WHERE r.container_id = c.id) AS records,
                (SELECT COUNT(*) FROM units u WHERE u.container_id = c.id) AS units,
                (SELECT COUNT(*) FROM chapters ch WHERE ch.container_id = c.id) AS chapters,
                (SELECT status FROM ingestion_runs ir WHERE ir.container_id = c.id
                    ORDER BY ir.started_at DESC LIMIT 1) AS last_status
            FROM containers c
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Record count per domain tag, most frequent first
    pub async fn domain_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT domain, COUNT(*) AS n FROM records GROUP BY domain ORDER BY n DESC, domain",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        Ok(GlobalStats {
            author_count: self.count_rows("authors").await?,
            container_count: self.count_rows("containers").await?,
            unit_count: self.count_rows("units").await?,
            chapter_count: self.count_rows("chapters").await?,
            record_count: self.count_rows("records").await?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}
