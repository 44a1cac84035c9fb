//! Drop and recreate the Sparkify database and its star schema.
//! Usage: create-tables [--database <file>]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sparkify_etl::config::{Settings, SettingsArgs};
use sparkify_etl::logging::init_logging;
use sparkify_etl::queries::QueryRegistry;
use sparkify_etl::safety::{remove_database, validate_database_path};
use sparkify_etl::store::Warehouse;

#[derive(Parser)]
#[command(name = "create-tables")]
#[command(about = "Drop and recreate the Sparkify database and its star schema")]
struct Args {
    #[command(flatten)]
    settings: SettingsArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let settings = Settings::resolve(&args.settings).context("Failed to resolve settings")?;
    validate_database_path(
        &settings.database,
        &[&settings.song_data, &settings.log_data],
    )?;

    if settings.database.exists() {
        info!("Dropping existing database: {:?}", settings.database);
        remove_database(&settings.database)?;
    }

    info!("Creating database: {:?}", settings.database);
    let warehouse = Warehouse::create(
        &settings.database,
        settings.busy_timeout,
        QueryRegistry::new(settings.songplay_conflict),
    )
    .context("Failed to create database")?;

    warehouse.drop_tables().context("Failed to drop tables")?;
    warehouse.create_tables().context("Failed to create tables")?;

    let tables: Vec<&str> = warehouse.queries().table_names().collect();
    info!("Created tables: {}", tables.join(", "));
    Ok(())
}
