//! Custom error types for turath

use thiserror::Error;

/// Main error type for turath operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Gave up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Cursor for '{container}' cannot move from {current} to {attempted}")]
    CursorRegression {
        container: String,
        current: String,
        attempted: i64,
    },

    #[error("Container not found in catalog: {0}")]
    ContainerNotFound(String),

    #[error("Container not found in database: {0} (run 'turath ingest' first)")]
    ContainerNotIngested(String),

    #[error("Not initialized: run 'turath init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for turath
pub type Result<T> = std::result::Result<T, Error>;
