//! Shamela `.mdb` archives, read through `mdb-tables` and `mdb-export`

use super::{ChapterIndex, ContainerRows, ScannedRow, Section, SourceRow};
use crate::catalog::{ContainerSpec, SourceLocator};
use crate::error::{Error, Result};
use futures::stream;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One row of a `t{book}` title table
#[derive(Debug, Clone, PartialEq)]
struct TitleRow {
    id: i64,
    title: String,
    level: Option<i64>,
}

pub struct ArchiveSource {
    dir: PathBuf,
    tables_bin: String,
    export_bin: String,
}

impl ArchiveSource {
    pub fn new(dir: PathBuf, tables_bin: String, export_bin: String) -> Self {
        Self {
            dir,
            tables_bin,
            export_bin,
        }
    }

    pub async fn open(&self, spec: &ContainerSpec) -> Result<Option<ContainerRows>> {
        let SourceLocator::Archive { archive, book_id } = spec.source else {
            return Err(Error::Source(format!(
                "Container '{}' is not backed by an archive",
                spec.key
            )));
        };

        let mdb_path = self.dir.join(format!("{}.mdb", archive));
        if !mdb_path.exists() {
            warn!("Archive {:?} not found", mdb_path);
            return Ok(None);
        }

        let content_table = format!("b{}", book_id);
        let title_table = format!("t{}", book_id);

        let tables = self.list_tables(&mdb_path).await?;
        if !tables.iter().any(|t| t == &content_table) {
            warn!("Table {} missing from {:?}", content_table, mdb_path);
            return Ok(None);
        }

        let titles = if tables.iter().any(|t| t == &title_table) {
            parse_titles_csv(&self.export(&mdb_path, &title_table).await?)?
        } else {
            Vec::new()
        };
        info!("Loaded {} chapter titles", titles.len());

        let mut rows = parse_content_csv(&self.export(&mdb_path, &content_table).await?)?;
        let sections = sections_from_titles(&titles);
        assign_units(&mut rows, &sections);
        let chapters: ChapterIndex = titles.into_iter().map(|t| (t.id, t.title)).collect();

        debug!("{} rows in {}", rows.len(), content_table);
        Ok(Some(ContainerRows {
            sections,
            chapters,
            len_hint: Some(rows.len() as u64),
            rows: Box::pin(stream::iter(rows.into_iter().map(Ok))),
        }))
    }

    async fn list_tables(&self, mdb_path: &std::path::Path) -> Result<Vec<String>> {
        let output = Command::new(&self.tables_bin)
            .arg(mdb_path)
            .output()
            .await
            .map_err(|e| Error::Source(format!("spawn {}: {}", self.tables_bin, e)))?;
        if !output.status.success() {
            return Err(Error::Source(format!(
                "{} failed on {}: {}",
                self.tables_bin,
                mdb_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    async fn export(&self, mdb_path: &std::path::Path, table: &str) -> Result<String> {
        let output = Command::new(&self.export_bin)
            .arg(mdb_path)
            .arg(table)
            .output()
            .await
            .map_err(|e| Error::Source(format!("spawn {}: {}", self.export_bin, e)))?;
        if !output.status.success() {
            return Err(Error::Source(format!(
                "{} failed on table {}: {}",
                self.export_bin,
                table,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        // Archives occasionally carry invalid sequences; replace them
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn optional_int(value: Option<&str>) -> std::result::Result<Option<i32>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<i32>()
            .map(Some)
            .map_err(|_| format!("non-numeric value '{}'", v)),
    }
}

/// Parse a `b{book}` export into rows sorted by id
///
/// Malformed rows come first, then typed rows in ascending id order.
fn parse_content_csv(data: &str) -> Result<Vec<ScannedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();

    let id_col = column(&headers, "id")
        .ok_or_else(|| Error::Source("content table has no 'id' column".to_string()))?;
    let text_col = column(&headers, "nass")
        .ok_or_else(|| Error::Source("content table has no 'nass' column".to_string()))?;
    let part_col = column(&headers, "part");
    let page_col = column(&headers, "page");

    let mut malformed = Vec::new();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let raw_id = record.get(id_col).unwrap_or("").trim().to_string();

        let id = match raw_id.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                malformed.push(ScannedRow::Malformed {
                    raw_id,
                    reason: "non-numeric id".to_string(),
                });
                continue;
            }
        };

        let volume = optional_int(part_col.and_then(|c| record.get(c)));
        let page = optional_int(page_col.and_then(|c| record.get(c)));
        let (volume, page) = match (volume, page) {
            (Ok(v), Ok(p)) => (v, p),
            (Err(reason), _) | (_, Err(reason)) => {
                malformed.push(ScannedRow::Malformed { raw_id, reason });
                continue;
            }
        };

        rows.push(SourceRow {
            id,
            text: record.get(text_col).unwrap_or("").to_string(),
            volume,
            page,
            ..Default::default()
        });
    }

    rows.sort_by_key(|r| r.id);
    malformed.extend(rows.into_iter().map(ScannedRow::Row));
    Ok(malformed)
}

/// Parse a `t{book}` export; unparsable ids are dropped
fn parse_titles_csv(data: &str) -> Result<Vec<TitleRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();

    let (Some(id_col), Some(title_col)) = (column(&headers, "id"), column(&headers, "tit")) else {
        return Ok(Vec::new());
    };
    let level_col = column(&headers, "lvl");

    let mut titles = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Ok(id) = record.get(id_col).unwrap_or("").trim().parse::<i64>() else {
            continue;
        };
        let title = record.get(title_col).unwrap_or("").trim().to_string();
        if title.is_empty() {
            continue;
        }
        let level = level_col
            .and_then(|c| record.get(c))
            .and_then(|v| v.trim().parse::<i64>().ok());
        titles.push(TitleRow { id, title, level });
    }
    titles.sort_by_key(|t| t.id);
    Ok(titles)
}

/// Top-level titles become structural units
fn sections_from_titles(titles: &[TitleRow]) -> Vec<Section> {
    let has_levels = titles.iter().any(|t| t.level.is_some());
    let mut sections: Vec<Section> = Vec::new();
    for title in titles {
        if has_levels && title.level != Some(1) {
            continue;
        }
        if sections.last().map(|s| s.local_number) == Some(title.id) {
            continue;
        }
        sections.push(Section {
            local_number: title.id,
            name_ar: Some(title.title.clone()),
            name_en: None,
        });
    }
    sections
}

/// Attach each row to the nearest preceding unit
fn assign_units(rows: &mut [ScannedRow], sections: &[Section]) {
    for item in rows.iter_mut() {
        if let ScannedRow::Row(row) = item {
            let idx = sections.partition_point(|s| s.local_number <= row.id);
            row.unit = idx.checked_sub(1).map(|i| sections[i].local_number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AuthorSpec, ContainerKind};
    use futures::StreamExt;
    use tempfile::TempDir;

    const CONTENT: &str = "id,nass,part,page\n\
        3,\"نص الفتوى الثالثة وهو نص طويل بما يكفي\",1,12\n\
        1,\"سئل الشيخ عن الطهارة، فقال: الماء طهور\",1,10\n\
        x,\"bad id\",1,1\n\
        2,\"صفحة فارغة\",,\n\
        4,\"نص\",ii,5\n";

    const TITLES: &str = "id,tit,lvl\n1,كتاب الطهارة,1\n2,باب المياه,2\n3,كتاب الصلاة,1\n";

    fn archive_spec() -> ContainerSpec {
        ContainerSpec {
            key: "sham-99".to_string(),
            kind: ContainerKind::Fatwa,
            name_ar: "فتاوى".to_string(),
            name_en: None,
            name_fr: None,
            school: Some("hanbali".to_string()),
            era: None,
            volumes: 1,
            author: AuthorSpec {
                name_ar: "عالم".to_string(),
                name_fr: None,
                name_en: None,
                death_year: None,
            },
            source: SourceLocator::Archive {
                archive: 7,
                book_id: 99,
            },
        }
    }

    #[test]
    fn test_content_rows_sorted_and_typed() {
        let rows = parse_content_csv(CONTENT).unwrap();
        assert_eq!(rows.len(), 5);

        let malformed: Vec<_> = rows
            .iter()
            .filter_map(|r| match r {
                ScannedRow::Malformed { raw_id, .. } => Some(raw_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(malformed, vec!["x", "4"]);

        let ids: Vec<i64> = rows
            .iter()
            .filter_map(|r| match r {
                ScannedRow::Row(row) => Some(row.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ScannedRow::Row(first) = &rows[2] else {
            panic!("expected a typed row");
        };
        assert_eq!(first.volume, Some(1));
        assert_eq!(first.page, Some(10));
        assert!(first.text.starts_with("سئل"));

        let ScannedRow::Row(blank) = &rows[3] else {
            panic!("expected a typed row");
        };
        assert_eq!(blank.volume, None);
        assert_eq!(blank.page, None);
    }

    #[test]
    fn test_missing_text_column_is_an_error() {
        assert!(parse_content_csv("id,part\n1,1\n").is_err());
    }

    #[test]
    fn test_titles_and_units() {
        let titles = parse_titles_csv(TITLES).unwrap();
        assert_eq!(titles.len(), 3);

        let sections = sections_from_titles(&titles);
        let numbers: Vec<i64> = sections.iter().map(|s| s.local_number).collect();
        assert_eq!(numbers, vec![1, 3]);

        let mut rows = parse_content_csv(CONTENT).unwrap();
        assign_units(&mut rows, &sections);
        let units: Vec<(i64, Option<i64>)> = rows
            .iter()
            .filter_map(|r| match r {
                ScannedRow::Row(row) => Some((row.id, row.unit)),
                _ => None,
            })
            .collect();
        assert_eq!(units, vec![(1, Some(1)), (2, Some(1)), (3, Some(3))]);
    }

    #[test]
    fn test_titles_without_levels_are_all_units() {
        let titles = parse_titles_csv("id,tit\n5,أ\n9,ب\n").unwrap();
        assert_eq!(sections_from_titles(&titles).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_archive_is_absent() {
        let tmp = TempDir::new().unwrap();
        let source = ArchiveSource::new(
            tmp.path().to_path_buf(),
            "mdb-tables".to_string(),
            "mdb-export".to_string(),
        );
        assert!(source.open(&archive_spec()).await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_through_export_tools() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("7.mdb"), b"").unwrap();

        let content = tmp.path().join("b99.csv");
        let titles = tmp.path().join("t99.csv");
        std::fs::write(&content, CONTENT).unwrap();
        std::fs::write(&titles, TITLES).unwrap();

        // Stand-ins for mdbtools: list both tables, export from the csv files
        let tables_bin = tmp.path().join("fake-mdb-tables");
        std::fs::write(&tables_bin, "#!/bin/sh\necho b99 t99\n").unwrap();
        let export_bin = tmp.path().join("fake-mdb-export");
        std::fs::write(
            &export_bin,
            format!("#!/bin/sh\ncat \"{}/$2.csv\"\n", tmp.path().display()),
        )
        .unwrap();
        for bin in [&tables_bin, &export_bin] {
            std::fs::set_permissions(bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let source = ArchiveSource::new(
            tmp.path().to_path_buf(),
            tables_bin.display().to_string(),
            export_bin.display().to_string(),
        );
        let opened = source.open(&archive_spec()).await.unwrap().unwrap();
        assert_eq!(opened.sections.len(), 2);
        assert_eq!(opened.chapters.nearest(2), Some("باب المياه"));
        assert_eq!(opened.len_hint, Some(5));

        let items: Vec<_> = opened.rows.collect().await;
        assert_eq!(items.len(), 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_content_table_is_absent() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("7.mdb"), b"").unwrap();
        let tables_bin = tmp.path().join("fake-mdb-tables");
        std::fs::write(&tables_bin, "#!/bin/sh\necho b1 t1\n").unwrap();
        std::fs::set_permissions(&tables_bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = ArchiveSource::new(
            tmp.path().to_path_buf(),
            tables_bin.display().to_string(),
            "mdb-export".to_string(),
        );
        assert!(source.open(&archive_spec()).await.unwrap().is_none());
    }
}
