use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use d0010_loader::{
    config::AppConfig,
    observability,
    sinks::{MemoryReadingStore, PgReadingStore, ReadingStore},
    FileLoader, LoadSummary,
};
use sqlx::postgres::PgPoolOptions;

/// Load D0010 meter reading flows (.uff) from a file or directory.
#[derive(Debug, Parser)]
#[command(name = "d0010-loader", version)]
struct Cli {
    /// A D0010 file, or a directory whose matching files are all loaded.
    path: PathBuf,

    /// Config file (defaults to $D0010_CONFIG or ./d0010-config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse and validate without touching the database.
    #[arg(long)]
    dry_run: bool,
}

async fn run<S: ReadingStore>(store: S, cfg: &AppConfig, path: &Path) -> Result<LoadSummary> {
    let loader = FileLoader::new(store, cfg.loader.clone());
    Ok(loader.load_path(path).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref())?;

    let summary = if cli.dry_run {
        tracing::info!("dry run: nothing will be written to the database");
        run(MemoryReadingStore::new(), &cfg, &cli.path).await?
    } else {
        let Some(db) = &cfg.database else {
            anyhow::bail!("no database configured: set [database] uri or D0010_DATABASE_URL");
        };
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .connect(&db.uri)
            .await?;
        run(PgReadingStore::new(pool, cfg.loader.batch_size), &cfg, &cli.path).await?
    };

    tracing::info!(
        files_loaded = summary.files_loaded(),
        files_skipped = summary.files_skipped(),
        files_failed = summary.files_failed(),
        readings = summary.readings_loaded(),
        rejected_lines = summary.rejected_lines(),
        "load complete"
    );

    Ok(())
}
