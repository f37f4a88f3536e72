//! SQLite schema definition

/// SQL schema for the corpus database
pub const SCHEMA_SQL: &str = r#"
-- Authors: scholars and compilers
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name_ar TEXT NOT NULL,
    name_fr TEXT,
    name_en TEXT,
    school TEXT NOT NULL DEFAULT '',
    era TEXT,
    death_year INTEGER,
    is_deceased INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(name_ar, school)
);

-- Containers: hadith collections and fatwa books
CREATE TABLE IF NOT EXISTS containers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    name_ar TEXT NOT NULL,
    name_en TEXT,
    name_fr TEXT,
    author_id INTEGER NOT NULL REFERENCES authors(id),
    school TEXT,
    era TEXT,
    volume_count INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Units: books or top-level sections within a container
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    container_id INTEGER NOT NULL REFERENCES containers(id),
    local_number INTEGER NOT NULL,
    name_ar TEXT,
    name_en TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(container_id, local_number)
);

-- Chapters: finer subdivisions listed by the remote API
CREATE TABLE IF NOT EXISTS chapters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    container_id INTEGER NOT NULL REFERENCES containers(id),
    unit_id INTEGER REFERENCES units(id),
    chapter_number TEXT NOT NULL,
    name_ar TEXT,
    name_en TEXT,
    intro TEXT,
    ending TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE(container_id, chapter_number)
);

-- Records: one hadith or fatwa page
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference TEXT NOT NULL UNIQUE,
    container_id INTEGER NOT NULL REFERENCES containers(id),
    unit_id INTEGER REFERENCES units(id),
    author_id INTEGER NOT NULL REFERENCES authors(id),
    row_id INTEGER NOT NULL,
    volume INTEGER,
    page INTEGER,
    primary_text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    text_en TEXT,
    text_fr TEXT,
    is_auto_translated INTEGER NOT NULL DEFAULT 0,
    domain TEXT NOT NULL,
    chapter_hint TEXT,
    grade TEXT,
    grade_source TEXT,
    citation TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Primary text is write-once
CREATE TRIGGER IF NOT EXISTS records_primary_text_immutable
BEFORE UPDATE OF primary_text, content_hash ON records
BEGIN
    SELECT RAISE(ABORT, 'primary_text is write-once');
END;

-- Ingestion runs: one row per container attempt
CREATE TABLE IF NOT EXISTS ingestion_runs (
    id TEXT PRIMARY KEY,
    container_id INTEGER NOT NULL REFERENCES containers(id),
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    imported INTEGER DEFAULT 0,
    refreshed INTEGER DEFAULT 0,
    skipped INTEGER DEFAULT 0,
    error TEXT
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_records_container ON records(container_id);
CREATE INDEX IF NOT EXISTS idx_records_unit ON records(unit_id);
CREATE INDEX IF NOT EXISTS idx_records_domain ON records(domain);
CREATE INDEX IF NOT EXISTS idx_units_container ON units(container_id);
CREATE INDEX IF NOT EXISTS idx_runs_container ON ingestion_runs(container_id);
"#;
