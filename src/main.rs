//! turath CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use turath::{
    catalog::ContainerKind,
    commands::{
        cmd_fetch_chapters, cmd_fetch_editions, cmd_fill_translations, cmd_ingest, cmd_init,
        cmd_status, print_chapter_stats, print_edition_fetches, print_run_report, print_status,
        print_translation_stats, IngestOptions,
    },
    config::Config,
    error::{Error, Result},
    progress::LogWriterFactory,
    store::{Language, Store},
};

#[derive(Parser)]
#[command(name = "turath")]
#[command(version, about = "Incremental ingestion of hadith and fatwa corpora", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, starter catalog and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest catalog containers into the database
    Ingest {
        /// Only these container keys (repeatable)
        #[arg(long = "container")]
        containers: Option<Vec<String>>,

        /// Only containers of this kind (hadith or fatwa)
        #[arg(long)]
        kind: Option<ContainerKind>,
    },

    /// Download remote data
    Fetch {
        #[command(subcommand)]
        target: FetchTarget,
    },

    /// Fill missing translations of an ingested container
    Translations {
        /// Container key
        container: String,

        /// Language to fill (en or fr)
        #[arg(short, long, default_value = "fr")]
        language: Language,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum FetchTarget {
    /// Download JSON editions named in the catalog
    Editions {
        /// Only these container keys (repeatable)
        #[arg(long = "container")]
        containers: Option<Vec<String>>,

        /// Download again even when cached
        #[arg(long)]
        force: bool,
    },

    /// Fetch book and chapter listings from sunnah.com
    Chapters {
        /// Only these container keys (repeatable)
        #[arg(long = "container")]
        containers: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Init and completions don't need an existing config
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "turath", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { containers, kind } => {
            let store = Store::connect(&config).await?;
            let options = IngestOptions {
                keys: containers,
                kind,
                progress: !cli.json,
            };
            let report = cmd_ingest(&config, store, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_run_report(&report);
            }
            if report.has_failures() {
                return Err(Error::Other(format!(
                    "{} container(s) failed",
                    report.failed().count()
                )));
            }
        }

        Commands::Fetch { target } => match target {
            FetchTarget::Editions { containers, force } => {
                let fetched = cmd_fetch_editions(&config, containers, force).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&fetched)?);
                } else {
                    print_edition_fetches(&fetched);
                }
            }
            FetchTarget::Chapters { containers } => {
                let store = Store::connect(&config).await?;
                let stats = cmd_fetch_chapters(&config, &store, containers).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_chapter_stats(&stats);
                }
            }
        },

        Commands::Translations {
            container,
            language,
        } => {
            let store = Store::connect(&config).await?;
            let stats = cmd_fill_translations(&config, &store, &container, language).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_translation_stats(&stats);
            }
        }

        Commands::Status => {
            let store = Store::connect(&config).await?;
            let status = cmd_status(&config, &store).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn handle_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    // A .toml path means its directory; anything else is the base directory
    let base_dir = match config {
        Some(path) if path.extension().map_or(false, |e| e == "toml") => {
            path.parent().map(PathBuf::from)
        }
        Some(path) => Some(path),
        None => None,
    };

    let config = cmd_init(base_dir, force).await?;

    println!("✓ turath initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Catalog: {}", config.paths.catalog_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the catalog to list the works to ingest");
    println!("  2. Download editions: turath fetch editions");
    println!(
        "  3. Place Shamela archives in {}",
        config.paths.archive_dir.display()
    );
    println!("  4. Ingest: turath ingest");

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
