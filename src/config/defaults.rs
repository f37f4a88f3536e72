//! Default values for configuration

use std::path::PathBuf;

/// Default SQLite database file (relative to the base directory)
pub fn default_database_file() -> PathBuf {
    PathBuf::from("turath.db")
}

/// Default resume cursor file
pub fn default_cursor_file() -> PathBuf {
    PathBuf::from("checkpoint.json")
}

/// Default change ledger file
pub fn default_ledger_file() -> PathBuf {
    PathBuf::from("hashes.json")
}

/// Default catalog file
pub fn default_catalog_file() -> PathBuf {
    PathBuf::from("catalog.toml")
}

/// Default number of records per committed batch
pub fn default_batch_size() -> usize {
    500
}

/// Default minimum primary-text length, in characters
pub fn default_min_text_chars() -> usize {
    20
}

/// Default blank-page markers emitted by Shamela archives
pub fn default_blank_markers() -> Vec<String> {
    vec!["صفحة فارغة".to_string()]
}

/// Default number of body characters fed to the classifier
pub fn default_classify_prefix_chars() -> usize {
    300
}

/// Default maximum length of the stored chapter hint
pub fn default_chapter_hint_chars() -> usize {
    200
}

/// Default classifier fallback tag
pub fn default_fallback_tag() -> String {
    "uncategorized".to_string()
}

/// Default directory holding extracted Shamela `.mdb` archives
pub fn default_archive_dir() -> PathBuf {
    std::env::var("TURATH_ARCHIVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("archives"))
}

/// Default `mdb-tables` executable
pub fn default_mdb_tables_bin() -> String {
    "mdb-tables".to_string()
}

/// Default `mdb-export` executable
pub fn default_mdb_export_bin() -> String {
    "mdb-export".to_string()
}

/// Default directory for downloaded JSON editions
pub fn default_editions_dir() -> PathBuf {
    PathBuf::from("hadith-data")
}

/// Default edition mirrors, tried in order. `{edition}` is substituted.
pub fn default_edition_mirrors() -> Vec<String> {
    vec![
        "https://cdn.jsdelivr.net/gh/fawazahmed0/hadith-api@1/editions/{edition}.min.json"
            .to_string(),
        "https://raw.githubusercontent.com/fawazahmed0/hadith-api/1/editions/{edition}.min.json"
            .to_string(),
    ]
}

/// Default sunnah.com API base URL
pub fn default_api_base_url() -> String {
    std::env::var("SUNNAH_API_URL").unwrap_or_else(|_| "https://api.sunnah.com/v1".to_string())
}

/// Default environment variable holding the sunnah.com API key
pub fn default_api_key_env() -> String {
    "SUNNAH_API_KEY".to_string()
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("turath/{} (Corpus Importer)", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_api_timeout() -> u64 {
    30
}

/// Default minimum delay between API requests (400ms)
pub fn default_api_min_delay_ms() -> u64 {
    400
}

/// Default page size for listing endpoints
pub fn default_api_page_limit() -> u32 {
    200
}

/// Default maximum attempts per request
pub fn default_retry_max_attempts() -> u32 {
    5
}

/// Default first backoff delay (1 second)
pub fn default_retry_initial_backoff_ms() -> u64 {
    1000
}

/// Default backoff growth factor
pub fn default_retry_multiplier() -> f64 {
    2.0
}

/// Default backoff ceiling (30 seconds)
pub fn default_retry_max_backoff_ms() -> u64 {
    30_000
}
