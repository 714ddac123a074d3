use std::time::Duration;

use clap::{Parser, Subcommand};
use storage::{
    Database,
    repository::{AttendanceRepository, RegistrationRepository},
    services::{chunking::ChunkCoordinator, contingent_sync, sync_status},
};
use syncer::{ChunkDriver, DriverOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "attendance-sync")]
#[command(about = "Builds and refreshes event attendance rosters from registrations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report how many teams and chunks a sync of the event covers
    Count {
        #[arg(long)]
        event_id: i32,

        #[arg(long, default_value_t = 50)]
        chunk_size: i64,
    },
    /// Sync the whole event chunk by chunk
    Chunked {
        #[arg(long)]
        event_id: i32,

        #[arg(long, default_value_t = 50)]
        chunk_size: i64,

        /// Resume from this offset
        #[arg(long, default_value_t = 0)]
        offset: i64,

        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        #[arg(long, default_value_t = 500)]
        retry_delay_ms: u64,

        #[arg(long, default_value_t = 100)]
        chunk_delay_ms: u64,

        #[arg(long)]
        fail_fast: bool,
    },
    /// Sync a single contingent immediately
    Contingent {
        #[arg(long)]
        event_id: i32,

        #[arg(long)]
        contingent_id: i32,
    },
    /// Compare the expected roster with the stored attendance rows
    Status {
        #[arg(long)]
        event_id: i32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "attendance_sync={},syncer={},storage={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Connecting to database...");
    let db = Database::with_max_connections(&cli.database_url, cli.max_connections).await?;
    let source = RegistrationRepository::new(db.pool());
    let store = AttendanceRepository::new(db.pool());

    match cli.command {
        Commands::Count {
            event_id,
            chunk_size,
        } => {
            let plan = ChunkCoordinator::new(&source, &store)
                .count(event_id, chunk_size)
                .await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Chunked {
            event_id,
            chunk_size,
            offset,
            max_retries,
            retry_delay_ms,
            chunk_delay_ms,
            fail_fast,
        } => {
            let options = DriverOptions {
                chunk_size,
                start_offset: offset,
                max_retries,
                retry_delay: Duration::from_millis(retry_delay_ms),
                chunk_delay: Duration::from_millis(chunk_delay_ms),
                fail_fast,
            };

            let report = ChunkDriver::new(&source, &store, options).run(event_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            match report.failed_offsets.first() {
                None => tracing::info!(
                    "✓ Sync completed: {} records created, {} refreshed, {} errors",
                    report.results.created(),
                    report.results.refreshed(),
                    report.results.error_count
                ),
                Some(first) => tracing::warn!(
                    "Sync finished with {} failed chunks; rerun with --offset {} to resume",
                    report.failed_offsets.len(),
                    first
                ),
            }
        }
        Commands::Contingent {
            event_id,
            contingent_id,
        } => {
            let result =
                contingent_sync::sync_contingent(&source, &store, event_id, contingent_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Status { event_id } => {
            let status = sync_status::sync_status(&source, &store, event_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
