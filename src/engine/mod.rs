//! Incremental ingestion engine
//!
//! Drives containers one at a time through
//! `NOT_STARTED -> IN_PROGRESS(watermark) -> DONE`. For each container the
//! author and container rows are upserted, the source is streamed, rows are
//! filtered through the resume cursor and the change ledger, survivors are
//! classified and written in fixed-size batches. Cursor and ledger are
//! persisted after every committed batch, so an interruption loses at most
//! the batch in flight.

use crate::catalog::ContainerSpec;
use crate::classify::Classifier;
use crate::config::{Config, EngineConfig};
use crate::error::{Error, Result};
use crate::progress::{finish_progress, start_progress};
use crate::source::{ChapterIndex, RecordSource, ScannedRow, SourceRow};
use crate::state::{
    compute_content_hash, ChangeLedger, ResumeCursor, Watermark, COMPLETE_SENTINEL,
};
use crate::store::{ContainerIds, PreparedRecord, RunStatus, Store};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ContainerStatus {
    Imported,
    AlreadyImported,
    SourceAbsent,
    Failed(String),
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Imported => write!(f, "imported"),
            ContainerStatus::AlreadyImported => write!(f, "already imported"),
            ContainerStatus::SourceAbsent => write!(f, "source absent"),
            ContainerStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Per-container counts
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub key: String,
    pub label: String,
    pub status: ContainerStatus,
    pub imported: u64,
    pub refreshed: u64,
    pub skipped: u64,
    /// Last numeric watermark committed for this container
    pub watermark: Option<i64>,
}

impl ContainerReport {
    fn new(spec: &ContainerSpec) -> Self {
        Self {
            key: spec.key.clone(),
            label: spec.label().to_string(),
            status: ContainerStatus::Imported,
            imported: 0,
            refreshed: 0,
            skipped: 0,
            watermark: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ContainerStatus::Failed(_))
    }
}

/// Report of a whole run, in catalog order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub containers: Vec<ContainerReport>,
}

impl RunReport {
    pub fn total_imported(&self) -> u64 {
        self.containers.iter().map(|c| c.imported).sum()
    }

    pub fn total_refreshed(&self) -> u64 {
        self.containers.iter().map(|c| c.refreshed).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.containers.iter().map(|c| c.skipped).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ContainerReport> {
        self.containers.iter().filter(|c| c.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

pub struct IngestEngine<S: RecordSource> {
    store: Store,
    source: S,
    classifier: Classifier,
    config: EngineConfig,
    cursor: ResumeCursor,
    ledger: ChangeLedger,
    show_progress: bool,
}

impl<S: RecordSource> IngestEngine<S> {
    pub fn new(
        store: Store,
        source: S,
        classifier: Classifier,
        config: EngineConfig,
        cursor: ResumeCursor,
        ledger: ChangeLedger,
    ) -> Self {
        Self {
            store,
            source,
            classifier,
            config,
            cursor,
            ledger,
            show_progress: false,
        }
    }

    /// Build an engine from configuration, loading cursor and ledger once
    pub fn from_config(config: &Config, store: Store, source: S) -> Result<Self> {
        Ok(Self::new(
            store,
            source,
            Classifier::from_config(&config.classifier)?,
            config.engine.clone(),
            ResumeCursor::load(&config.paths.cursor_file)?,
            ChangeLedger::load(&config.paths.ledger_file)?,
        ))
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn cursor(&self) -> &ResumeCursor {
        &self.cursor
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Ingest containers in order; a failing container never stops the run
    pub async fn run(&mut self, specs: &[ContainerSpec]) -> RunReport {
        let mut report = RunReport::default();
        for spec in specs {
            let container = self.ingest_container(spec).await;
            if let ContainerStatus::Failed(e) = &container.status {
                warn!("{} ({}) failed: {}", container.label, container.key, e);
            }
            report.containers.push(container);
        }
        report
    }

    /// Ingest one container end to end
    pub async fn ingest_container(&mut self, spec: &ContainerSpec) -> ContainerReport {
        let mut report = ContainerReport::new(spec);
        info!("Ingesting {} ({})", report.label, spec.key);

        let ids = match self.resolve_entities(spec).await {
            Ok(ids) => ids,
            Err(e) => {
                report.status = ContainerStatus::Failed(e.to_string());
                return report;
            }
        };

        if let Some(Watermark::Done) = self.cursor.get(&spec.key) {
            info!("{} already imported", spec.key);
            report.status = ContainerStatus::AlreadyImported;
            return report;
        }

        let run = match self.store.start_ingestion_run(ids.container_id).await {
            Ok(run) => run,
            Err(e) => {
                report.status = ContainerStatus::Failed(e.to_string());
                return report;
            }
        };

        let (run_status, run_error) = match self.scan(spec, ids, &mut report).await {
            Ok(status) => {
                report.status = status;
                let note = (report.status == ContainerStatus::SourceAbsent)
                    .then(|| "source absent".to_string());
                (RunStatus::Completed, note)
            }
            Err(e) => {
                report.status = ContainerStatus::Failed(e.to_string());
                (RunStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = self
            .store
            .complete_ingestion_run(
                &run.id,
                run_status,
                report.imported,
                report.refreshed,
                report.skipped,
                run_error,
            )
            .await
        {
            warn!("Failed to record ingestion run for {}: {}", spec.key, e);
        }

        info!(
            "{}: {} imported, {} refreshed, {} skipped",
            spec.key, report.imported, report.refreshed, report.skipped
        );
        report
    }

    async fn resolve_entities(&self, spec: &ContainerSpec) -> Result<ContainerIds> {
        let author_id = self
            .store
            .upsert_author(
                &spec.author,
                spec.school_tag(),
                spec.era.as_deref(),
                spec.author_is_deceased(),
            )
            .await?;
        let container_id = self.store.upsert_container(spec, author_id).await?;
        Ok(ContainerIds {
            container_id,
            author_id,
        })
    }

    async fn scan(
        &mut self,
        spec: &ContainerSpec,
        ids: ContainerIds,
        report: &mut ContainerReport,
    ) -> Result<ContainerStatus> {
        let Some(opened) = self.source.open(spec).await? else {
            warn!("No source data for {}, nothing to import", spec.key);
            return Ok(ContainerStatus::SourceAbsent);
        };

        let units = self
            .store
            .ensure_units(ids.container_id, &opened.sections)
            .await?;
        let unit_titles: HashMap<i64, String> = opened
            .sections
            .iter()
            .filter_map(|s| s.title().map(|t| (s.local_number, t.to_string())))
            .collect();

        let start = self.cursor.get(&spec.key);
        if let Some(Watermark::InProgress(id)) = start {
            info!("Resuming {} after row {}", spec.key, id);
            report.watermark = Some(id);
        }

        let pb = self
            .show_progress
            .then(|| start_progress(opened.len_hint, &spec.key));

        let mut batch: Vec<PreparedRecord> = Vec::with_capacity(self.config.batch_size);
        let mut highest: Option<i64> = None;
        let mut rows = opened.rows;

        while let Some(item) = rows.next().await {
            if let Some(pb) = &pb {
                pb.inc(1);
            }

            let row = match item? {
                ScannedRow::Row(row) => row,
                ScannedRow::Malformed { raw_id, reason } => {
                    debug!("Malformed row {} in {}: {}", raw_id, spec.key, reason);
                    report.skipped += 1;
                    continue;
                }
            };

            if self.is_blank(&row.text) {
                report.skipped += 1;
                continue;
            }

            // Ids at or past the sentinel cannot be checkpointed
            if row.id >= COMPLETE_SENTINEL {
                warn!("Row {} of {} is out of range, skipping", row.id, spec.key);
                report.skipped += 1;
                continue;
            }

            if start.is_some_and(|w| w.covers(row.id)) {
                report.skipped += 1;
                continue;
            }
            highest = Some(highest.map_or(row.id, |h| h.max(row.id)));

            let reference = spec.reference(row.id);
            let hash = compute_content_hash(&row.text);
            if self.ledger.is_unchanged(&reference, &hash) {
                debug!("{} unchanged", reference);
                report.skipped += 1;
                continue;
            }

            let record = self.prepare(
                spec,
                &opened.chapters,
                &unit_titles,
                &units,
                row,
                reference,
                hash,
            );
            batch.push(record);

            if batch.len() >= self.config.batch_size {
                self.flush(spec, ids, &mut batch, highest, report).await?;
            }
        }

        self.flush(spec, ids, &mut batch, highest, report).await?;
        self.cursor.complete(&spec.key);
        self.cursor.save()?;

        if let Some(pb) = pb {
            finish_progress(pb, &format!("{} done", spec.key));
        }
        Ok(ContainerStatus::Imported)
    }

    fn is_blank(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() < self.config.min_text_chars.max(1)
            || self.config.blank_markers.iter().any(|m| m.trim() == trimmed)
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare(
        &self,
        spec: &ContainerSpec,
        chapters: &ChapterIndex,
        unit_titles: &HashMap<i64, String>,
        units: &HashMap<i64, i64>,
        row: SourceRow,
        reference: String,
        content_hash: String,
    ) -> PreparedRecord {
        let context = chapters
            .nearest(row.id)
            .or_else(|| row.unit.and_then(|u| unit_titles.get(&u)).map(String::as_str))
            .unwrap_or("");
        let domain = self
            .classifier
            .classify_record(context, &row.text, self.config.classify_prefix_chars)
            .to_string();
        let chapter_hint = (!context.is_empty())
            .then(|| context.chars().take(self.config.chapter_hint_chars).collect());

        PreparedRecord {
            reference,
            unit_id: row.unit.and_then(|u| units.get(&u).copied()),
            row_id: row.id,
            volume: row.volume,
            page: row.page,
            citation: spec.citation(row.id),
            primary_text: row.text,
            content_hash,
            text_en: row.text_en,
            text_fr: row.text_fr,
            domain,
            chapter_hint,
            grade: row.grade,
            grade_source: row.grade_source,
        }
    }

    /// Commit the batch, then persist ledger and cursor
    async fn flush(
        &mut self,
        spec: &ContainerSpec,
        ids: ContainerIds,
        batch: &mut Vec<PreparedRecord>,
        highest: Option<i64>,
        report: &mut ContainerReport,
    ) -> Result<()> {
        if !batch.is_empty() {
            let outcome = self.store.write_batch(ids, batch).await?;
            report.imported += outcome.imported;
            report.refreshed += outcome.refreshed;
            debug!(
                "Committed {} rows of {} ({} new)",
                batch.len(),
                spec.key,
                outcome.imported
            );

            for record in batch.drain(..) {
                self.ledger.record(record.reference, record.content_hash);
            }
            self.ledger.save()?;
        }

        if let Some(highest) = highest {
            if report.watermark != Some(highest) {
                self.cursor.advance(&spec.key, highest)?;
                self.cursor.save()?;
                report.watermark = Some(highest);
            }
        }
        Ok(())
    }
}

impl<S: RecordSource> std::fmt::Debug for IngestEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestEngine")
            .field("batch_size", &self.config.batch_size)
            .field("ledger_entries", &self.ledger.len())
            .finish()
    }
}

/// Fail fast when the engine is handed nothing to do
pub fn ensure_selection(specs: &[ContainerSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(Error::Catalog(
            "No containers match the selection".to_string(),
        ));
    }
    Ok(())
}
