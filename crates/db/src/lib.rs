//! Database initialization and migration logic for the shipping backend.
//!
//! Provides `init_db_pool` for creating a connection pool and
//! auto-applying SQL migrations from the migrations directory.

use anyhow::{Context, Result};
use app_config::AppConfig;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::fs;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::info;

/// Initializes the database connection pool and runs migrations.
///
/// # Arguments
/// * `cfg` - The loaded application configuration.
///
/// # Returns
/// * `Pool` - A pool of PostgreSQL connections, ready for async use.
///
/// # Errors
/// Returns an error if the pool cannot be created or migrations fail.
pub async fn init_db_pool(cfg: &AppConfig) -> Result<Pool> {
    let pg_config: PgConfig = cfg
        .db_dsn()
        .parse()
        .context("Failed to parse Postgres DSN")?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(mgr)
        .max_size(16)
        .runtime(Runtime::Tokio1)
        .build()
        .context("Failed to create database pool")?;

    // Apply migrations
    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for migrations")?;
    run_migrations(&client, "migrations").await?;

    Ok(pool)
}

/// Applies all SQL migrations from the given directory, in file-name order,
/// to the provided database client.
///
/// # Arguments
/// * `client` - An active Postgres client.
/// * `migrations_dir` - Path to the folder containing .sql migration files.
///
/// # Errors
/// Returns an error if migration files cannot be read or applied.
pub async fn run_migrations(client: &Client, migrations_dir: &str) -> Result<()> {
    let mut entries = fs::read_dir(migrations_dir)
        .await
        .context("Failed to read migrations directory")?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            paths.push(path);
        }
    }
    // Migrations are written to be re-runnable; order still matters for the
    // first run against an empty database.
    paths.sort();

    for path in paths {
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        info!("Applying migration: {}", file_name);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read migration file {}", file_name))?;

        client
            .batch_execute(&content)
            .await
            .with_context(|| format!("Failed to execute migration {}", file_name))?;
    }
    Ok(())
}
