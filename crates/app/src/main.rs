/// Shipping Backend Application
///
/// This is the main entry point for the shipping-order backend service.
/// The application provides REST API endpoints for organization accounts
/// and shipment order management, including bulk spreadsheet imports.
///
/// # Features
///
/// - Organization sign-up, login and logout with cookie sessions
/// - Single order creation and atomic bulk import from .xls/.xlsx uploads
/// - Order listing, update and deletion scoped to the owning organization
/// - Prometheus metrics for monitoring
///
/// # Architecture
///
/// The application follows a modular architecture with:
/// - Repository layer for data access
/// - Service layer for business logic and transactions
/// - API layer for HTTP endpoints with an access-control gate
///
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use app_config::AppConfig;
use auth::AuthKeys;
use ingest::SpreadsheetIngestor;
use repository::{PgOrdersRepository, PgOrganizationsRepository};
use server::Server;
use service::{OrderServiceImpl, OrganizationServiceImpl};
use tokio_postgres::{Client, NoTls};

/// Initialize the tracing subscriber for logging
fn init_logger() -> Result<()> {
    tracing_subscriber::fmt::init();
    Ok(())
}

/// Opens a dedicated database connection and drives it on a background
/// task. Repositories each own a client because `tokio_postgres::Client`
/// does not implement `Clone`.
async fn connect_client(dsn: &str, purpose: &str) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(dsn, NoTls)
        .await
        .with_context(|| format!("Failed to connect to database for {purpose}"))?;
    info!("Connected to database for {purpose}");

    let purpose = purpose.to_string();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("{purpose} connection error: {e}");
        }
    });
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = init_logger() {
        eprintln!("Failed to initialize logger: {}", err);
        return Err(anyhow::anyhow!("Failed to initialize logger"));
    }

    info!("Shipping backend starting...");

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize database pool and apply migrations
    let db_pool = match db::init_db_pool(&config).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            error!("Database connection is required for the application to function");
            return Err(anyhow::anyhow!("Failed to initialize database"));
        }
    };

    let dsn = config.db_dsn();

    // The account service and the order service each resolve organizations,
    // so two organization repositories are created over separate clients.
    let account_orgs_client = connect_client(&dsn, "organizations repository").await?;
    let order_orgs_client = connect_client(&dsn, "order-side organizations repository").await?;
    let orders_client = connect_client(&dsn, "orders repository").await?;

    let organization_service = Arc::new(OrganizationServiceImpl::new(
        PgOrganizationsRepository::new(account_orgs_client),
    ));

    let order_service = Arc::new(OrderServiceImpl::new(
        db_pool.clone(),
        PgOrganizationsRepository::new(order_orgs_client),
        PgOrdersRepository::new(orders_client),
        SpreadsheetIngestor::new(config.max_upload_bytes),
    ));

    let auth_keys = Arc::new(AuthKeys::new(
        &config.jwt_secret,
        config.auth_token_ttl,
        config.secure_cookies,
    ));

    let server = Server::new(
        config.http_port.to_string(),
        organization_service,
        order_service,
        auth_keys,
        config.max_upload_bytes,
    );

    if let Err(err) = server.start().await {
        error!("HTTP server error: {}", err);
        return Err(err);
    }

    info!("Application stopped");
    Ok(())
}
