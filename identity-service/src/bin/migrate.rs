//! Database migration tool.
//!
//! Usage:
//!   cargo run -p identity-service --bin migrate -- up
//!   cargo run -p identity-service --bin migrate -- down --target 0
//!   cargo run -p identity-service --bin migrate -- status

use clap::{Parser, Subcommand};
use identity_service::{config::IdentityConfig, db};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::collections::HashSet;

#[derive(Parser, Debug)]
#[command(name = "migrate", about = "Apply or revert identity-service database migrations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every pending migration
    Up,
    /// Revert applied migrations newer than the target version
    Down {
        /// Version to keep; 0 reverts everything
        #[arg(short, long, default_value_t = 0)]
        target: i64,
    },
    /// List migrations and whether each is applied
    Status,
}

fn db_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> AppError {
    AppError::DatabaseError(anyhow::Error::new(e))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let pool = db::create_pool(&config.database).await.map_err(db_error)?;

    match args.command {
        Command::Up => {
            db::run_migrations(&pool).await.map_err(db_error)?;
        }
        Command::Down { target } => {
            tracing::info!(target_version = target, "Reverting migrations");
            db::MIGRATOR.undo(&pool, target).await.map_err(db_error)?;
            tracing::info!("Revert completed");
        }
        Command::Status => {
            let applied: HashSet<i64> = match sqlx::query_scalar::<_, i64>(
                "SELECT version FROM _sqlx_migrations WHERE success",
            )
            .fetch_all(&pool)
            .await
            {
                Ok(versions) => versions.into_iter().collect(),
                // Table is absent before the first run.
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read applied migrations");
                    HashSet::new()
                }
            };

            for migration in db::MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()) {
                println!(
                    "{:>16}  {:<8}  {}",
                    migration.version,
                    if applied.contains(&migration.version) {
                        "applied"
                    } else {
                        "pending"
                    },
                    migration.description
                );
            }
        }
    }

    pool.close().await;
    Ok(())
}
