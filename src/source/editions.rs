//! Bundled JSON hadith editions (`{edition}.json`)

use super::{ChapterIndex, ContainerRows, ScannedRow, Section, SourceRow};
use crate::catalog::{ContainerSpec, SourceLocator};
use crate::error::{Error, Result};
use futures::stream;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One language edition of a collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Edition {
    #[serde(default)]
    pub metadata: EditionMetadata,
    #[serde(default)]
    pub hadiths: Vec<EditionHadith>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditionMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditionHadith {
    #[serde(default)]
    pub hadithnumber: Value,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub grades: Vec<EditionGrade>,
    #[serde(default)]
    pub reference: Option<EditionReference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditionGrade {
    #[serde(default, alias = "gradedBy")]
    pub name: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditionReference {
    #[serde(default)]
    pub book: Value,
}

/// Integral number from a JSON number or numeric string
fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl EditionHadith {
    pub fn number(&self) -> Option<i64> {
        integral(&self.hadithnumber)
    }

    fn book(&self) -> Option<i64> {
        self.reference.as_ref().and_then(|r| integral(&r.book))
    }

    fn first_grade(&self) -> Option<&EditionGrade> {
        self.grades.first()
    }

    fn non_empty_text(&self) -> Option<String> {
        self.text.clone().filter(|t| !t.trim().is_empty())
    }
}

impl Edition {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Hadiths keyed by number; non-integral and repeated numbers are ignored
    pub fn by_number(&self) -> HashMap<i64, &EditionHadith> {
        let mut map = HashMap::new();
        for hadith in &self.hadiths {
            if let Some(n) = hadith.number() {
                map.entry(n).or_insert(hadith);
            }
        }
        map
    }
}

/// Load `{dir}/{name}.json`; `None` when the file is absent
pub fn load_edition(dir: &Path, name: &str) -> Result<Option<Edition>> {
    let path = dir.join(format!("{}.json", name));
    if !path.exists() {
        return Ok(None);
    }
    debug!("Loading edition {:?}", path);
    let content = std::fs::read_to_string(&path)?;
    Edition::parse(&content).map(Some).map_err(|e| {
        Error::Source(format!("Invalid edition {}: {}", path.display(), e))
    })
}

pub struct EditionSource {
    dir: PathBuf,
}

impl EditionSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn open(&self, spec: &ContainerSpec) -> Result<Option<ContainerRows>> {
        let SourceLocator::Editions {
            arabic,
            english,
            french,
            ..
        } = &spec.source
        else {
            return Err(Error::Source(format!(
                "Container '{}' is not backed by JSON editions",
                spec.key
            )));
        };

        let Some(arabic) = load_edition(&self.dir, arabic)? else {
            warn!("Arabic edition '{}' not found in {:?}", arabic, self.dir);
            return Ok(None);
        };
        let english = self.optional(english.as_deref())?;
        let french = self.optional(french.as_deref())?;

        let (sections, rows) = build_rows(&arabic, english.as_ref(), french.as_ref());
        Ok(Some(ContainerRows {
            sections,
            chapters: ChapterIndex::default(),
            len_hint: Some(rows.len() as u64),
            rows: Box::pin(stream::iter(rows.into_iter().map(Ok))),
        }))
    }

    fn optional(&self, name: Option<&str>) -> Result<Option<Edition>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let edition = load_edition(&self.dir, name)?;
        if edition.is_none() {
            warn!("Edition '{}' not found, continuing without it", name);
        }
        Ok(edition)
    }
}

fn section_name(edition: Option<&Edition>, key: &str) -> Option<String> {
    edition
        .and_then(|e| e.metadata.sections.get(key))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Units from edition metadata; key "0" and unnamed sections are skipped
fn build_sections(arabic: &Edition, english: Option<&Edition>) -> Vec<Section> {
    let mut keys: Vec<&String> = arabic.metadata.sections.keys().collect();
    if let Some(english) = english {
        keys.extend(english.metadata.sections.keys());
    }

    let mut seen = HashSet::new();
    let mut sections: Vec<Section> = keys
        .into_iter()
        .filter(|k| k.as_str() != "0")
        .filter_map(|k| {
            let number = k.trim().parse::<i64>().ok()?;
            if !seen.insert(number) {
                return None;
            }
            let name_ar = section_name(Some(arabic), k.as_str());
            let name_en = section_name(english, k.as_str());
            if name_ar.is_none() && name_en.is_none() {
                return None;
            }
            Some(Section {
                local_number: number,
                name_ar,
                name_en,
            })
        })
        .collect();
    sections.sort_by_key(|s| s.local_number);
    sections
}

/// Join editions on hadith number; rows come out in ascending order
fn build_rows(
    arabic: &Edition,
    english: Option<&Edition>,
    french: Option<&Edition>,
) -> (Vec<Section>, Vec<ScannedRow>) {
    let sections = build_sections(arabic, english);
    let english_by_number = english.map(Edition::by_number).unwrap_or_default();
    let french_by_number = french.map(Edition::by_number).unwrap_or_default();

    let mut malformed = Vec::new();
    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for hadith in &arabic.hadiths {
        let Some(id) = hadith.number() else {
            malformed.push(ScannedRow::Malformed {
                raw_id: hadith.hadithnumber.to_string(),
                reason: "non-integral hadith number".to_string(),
            });
            continue;
        };
        if !seen.insert(id) {
            malformed.push(ScannedRow::Malformed {
                raw_id: id.to_string(),
                reason: "repeated hadith number".to_string(),
            });
            continue;
        }

        let en = english_by_number.get(&id).copied();
        let fr = french_by_number.get(&id).copied();
        let grade = en
            .and_then(EditionHadith::first_grade)
            .or_else(|| hadith.first_grade());

        rows.push(SourceRow {
            id,
            text: hadith.text.clone().unwrap_or_default(),
            volume: None,
            page: None,
            unit: en.and_then(EditionHadith::book).or_else(|| hadith.book()),
            text_en: en.and_then(EditionHadith::non_empty_text),
            text_fr: fr.and_then(EditionHadith::non_empty_text),
            grade: grade.and_then(|g| g.grade.clone()),
            grade_source: grade.and_then(|g| g.name.clone()),
        });
    }

    rows.sort_by_key(|r| r.id);
    malformed.extend(rows.into_iter().map(ScannedRow::Row));
    (sections, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AuthorSpec, ContainerKind};
    use futures::StreamExt;
    use tempfile::TempDir;

    const ARABIC: &str = r#"{
        "metadata": {"name": "صحيح البخاري", "sections": {"0": "", "1": "بدء الوحي", "2": "الإيمان"}},
        "hadiths": [
            {"hadithnumber": 2, "text": "حدثنا عبد الله بن يوسف قال أخبرنا مالك", "reference": {"book": 1, "hadith": 2}},
            {"hadithnumber": 1, "text": "إنما الأعمال بالنيات وإنما لكل امرئ ما نوى", "reference": {"book": 1, "hadith": 1}},
            {"hadithnumber": 8.5, "text": "نص"},
            {"hadithnumber": 9, "text": "حدثنا عبيد الله بن موسى قال بني الإسلام على خمس"}
        ]
    }"#;

    const ENGLISH: &str = r#"{
        "metadata": {"name": "Sahih al-Bukhari", "sections": {"0": "", "1": "Revelation", "2": "Belief", "3": ""}},
        "hadiths": [
            {"hadithnumber": 1, "text": "Actions are judged by intentions", "grades": [{"name": "Al-Albani", "grade": "Sahih"}], "reference": {"book": 1, "hadith": 1}},
            {"hadithnumber": 9, "text": "Islam is built on five", "grades": [], "reference": {"book": 2, "hadith": 1}}
        ]
    }"#;

    const FRENCH: &str = r#"{"hadiths": [{"hadithnumber": 1, "text": "Les actes ne valent que par les intentions"}, {"hadithnumber": 2, "text": ""}]}"#;

    fn editions_spec() -> ContainerSpec {
        ContainerSpec {
            key: "bukhari".to_string(),
            kind: ContainerKind::Hadith,
            name_ar: "صحيح البخاري".to_string(),
            name_en: Some("Sahih al-Bukhari".to_string()),
            name_fr: None,
            school: None,
            era: None,
            volumes: 1,
            author: AuthorSpec {
                name_ar: "البخاري".to_string(),
                name_fr: None,
                name_en: None,
                death_year: Some(256),
            },
            source: SourceLocator::Editions {
                arabic: "ara-bukhari".to_string(),
                english: Some("eng-bukhari".to_string()),
                french: Some("fra-bukhari".to_string()),
                sunnah: None,
            },
        }
    }

    fn typed(rows: &[ScannedRow]) -> Vec<&SourceRow> {
        rows.iter()
            .filter_map(|r| match r {
                ScannedRow::Row(row) => Some(row),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_editions_are_joined_on_number() {
        let arabic = Edition::parse(ARABIC).unwrap();
        let english = Edition::parse(ENGLISH).unwrap();
        let french = Edition::parse(FRENCH).unwrap();

        let (sections, rows) = build_rows(&arabic, Some(&english), Some(&french));
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name_ar.as_deref(), Some("بدء الوحي"));
        assert_eq!(sections[0].name_en.as_deref(), Some("Revelation"));

        assert!(matches!(&rows[0], ScannedRow::Malformed { raw_id, .. } if raw_id == "8.5"));

        let rows = typed(&rows);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 9]);

        assert_eq!(rows[0].grade.as_deref(), Some("Sahih"));
        assert_eq!(rows[0].grade_source.as_deref(), Some("Al-Albani"));
        assert!(rows[0].text_fr.is_some());
        assert_eq!(rows[1].text_fr, None);
        assert_eq!(rows[1].unit, Some(1));
        assert_eq!(rows[2].unit, Some(2));
        assert_eq!(rows[2].text_en.as_deref(), Some("Islam is built on five"));
    }

    #[test]
    fn test_integral_accepts_numeric_strings_and_whole_floats() {
        assert_eq!(integral(&serde_json::json!(3)), Some(3));
        assert_eq!(integral(&serde_json::json!(3.0)), Some(3));
        assert_eq!(integral(&serde_json::json!("12")), Some(12));
        assert_eq!(integral(&serde_json::json!(3.25)), None);
        assert_eq!(integral(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_grade_accepts_graded_by_alias() {
        let edition = Edition::parse(
            r#"{"hadiths": [{"hadithnumber": 1, "text": "t", "grades": [{"gradedBy": "Darussalam", "grade": "Hasan"}]}]}"#,
        )
        .unwrap();
        let grade = edition.hadiths[0].first_grade().unwrap();
        assert_eq!(grade.name.as_deref(), Some("Darussalam"));
    }

    #[tokio::test]
    async fn test_open_without_arabic_edition_is_absent() {
        let tmp = TempDir::new().unwrap();
        let source = EditionSource::new(tmp.path().to_path_buf());
        assert!(source.open(&editions_spec()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_with_only_arabic_edition() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("ara-bukhari.json"), ARABIC).unwrap();

        let source = EditionSource::new(tmp.path().to_path_buf());
        let opened = source.open(&editions_spec()).await.unwrap().unwrap();
        assert_eq!(opened.len_hint, Some(4));

        let items: Vec<ScannedRow> = opened
            .rows
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        let rows = typed(&items);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.text_en.is_none()));
    }
}
