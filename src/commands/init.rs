//! Init command implementation

use crate::catalog::CATALOG_TEMPLATE;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use std::path::PathBuf;
use tracing::info;

/// Initialize turath configuration, catalog and database
///
/// An existing catalog is never overwritten, even with `force`.
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let config = Config::load_from(base_dir)?;

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    if config.paths.catalog_file.exists() {
        info!("Keeping existing catalog {:?}", config.paths.catalog_file);
    } else {
        std::fs::write(&config.paths.catalog_file, CATALOG_TEMPLATE)?;
        info!("Wrote starter catalog to {:?}", config.paths.catalog_file);
    }

    std::fs::create_dir_all(&config.paths.editions_dir)?;

    let store = Store::connect(&config).await?;
    store.init_schema().await?;
    info!("Database ready at {:?}", config.paths.db_file);

    Ok(config)
}
