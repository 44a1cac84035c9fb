use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use sparkify_etl::config::{Settings, SettingsArgs};
use sparkify_etl::driver;
use sparkify_etl::logging::init_logging;
use sparkify_etl::queries::QueryRegistry;
use sparkify_etl::store::Warehouse;

#[derive(Parser)]
#[command(name = "sparkify-etl")]
#[command(about = "Load song metadata and event logs into the Sparkify star schema")]
struct Args {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Hide progress bars and log each committed file instead
    #[arg(long)]
    log_only: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let settings = Settings::resolve(&args.settings).context("Failed to resolve settings")?;

    info!("Opening database: {:?}", settings.database);
    let mut warehouse = Warehouse::open(
        &settings.database,
        settings.busy_timeout,
        QueryRegistry::new(settings.songplay_conflict),
    )
    .context("Failed to connect to the database (run create-tables first)")?;
    warehouse
        .verify_tables()
        .context("Database schema is incomplete")?;

    let summary = driver::run(
        &mut warehouse,
        &settings.song_data,
        &settings.log_data,
        args.log_only,
    )?;

    summary.log_summary();

    if let Some(path) = args.stats_json {
        summary
            .write_to_file(&path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        info!("Stats written to {:?}", path);
    }

    Ok(())
}
