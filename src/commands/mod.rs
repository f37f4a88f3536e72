//! CLI commands implementation

pub mod fetch;
pub mod ingest;
pub mod init;
pub mod status;
pub mod translations;

pub use fetch::*;
pub use ingest::*;
pub use init::*;
pub use status::*;
pub use translations::*;
