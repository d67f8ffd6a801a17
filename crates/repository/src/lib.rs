//! # Data Repository Layer
//!
//! This module provides repository traits and PostgreSQL implementations
//! for the two entities of the system: organizations and orders.
//! Each repository supports both regular and transactional operations
//! for integration with service/business logic. Ownership of orders is
//! enforced here by always filtering on the organization identity.

use async_trait::async_trait;
use model::{Order, OrderStatus, OrderUpdate, Organization};
use thiserror::Error;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Transaction};
use uuid::Uuid;

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// No result found.
    #[error("Not found")]
    NotFound,
}

/// # OrganizationsRepository
///
/// Repository interface for the tenant accounts that own orders.
///
/// Lookups by email back the sign-up duplicate check and login; lookups by
/// id resolve the authenticated caller. Organizations are never deleted.
#[async_trait]
pub trait OrganizationsRepository: Send + Sync {
    /// Persist a new organization.
    async fn insert(&self, organization: &Organization) -> Result<(), RepositoryError>;

    /// Look up an organization by its unique email.
    async fn get_by_email(&self, email: &str) -> Result<Organization, RepositoryError>;

    /// Look up an organization by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Organization, RepositoryError>;
}

/// PostgreSQL implementation of the OrganizationsRepository trait.
pub struct PgOrganizationsRepository {
    /// PostgreSQL client for database operations
    db: Client,
}

impl PgOrganizationsRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

fn organization_from_row(row: &Row) -> Organization {
    Organization {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl OrganizationsRepository for PgOrganizationsRepository {
    async fn insert(&self, organization: &Organization) -> Result<(), RepositoryError> {
        let query = r#"
            INSERT INTO organizations (id, name, email, phone, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;
        self.db
            .execute(
                query,
                &[
                    &organization.id,
                    &organization.name,
                    &organization.email,
                    &organization.phone,
                    &organization.password_hash,
                    &organization.created_at,
                    &organization.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Organization, RepositoryError> {
        let query = r#"
            SELECT id, name, email, phone, password_hash, created_at, updated_at
            FROM organizations WHERE email = $1
        "#;
        let row = self.db.query_opt(query, &[&email]).await?;
        match row {
            Some(row) => Ok(organization_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Organization, RepositoryError> {
        let query = r#"
            SELECT id, name, email, phone, password_hash, created_at, updated_at
            FROM organizations WHERE id = $1
        "#;
        let row = self.db.query_opt(query, &[&id]).await?;
        match row {
            Some(row) => Ok(organization_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }
}

/// # OrdersRepository
///
/// Repository interface for shipment orders.
///
/// All reads and mutations are scoped to the owning organization. The `_tx`
/// variants run inside a caller-provided transaction so that the bulk
/// import and the single-order mutations share the same all-or-nothing
/// discipline.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert a single order in a transaction.
    async fn insert_tx(&self, tx: &Transaction<'_>, order: &Order) -> Result<(), RepositoryError>;

    /// Insert a whole batch in a transaction; the caller commits only when
    /// every row made it in.
    async fn insert_batch_tx(
        &self,
        tx: &Transaction<'_>,
        orders: &[Order],
    ) -> Result<(), RepositoryError>;

    /// Load an order by id, but only if it belongs to the organization.
    async fn get_for_org_tx(
        &self,
        tx: &Transaction<'_>,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Order, RepositoryError>;

    /// List the organization's orders, optionally filtered by status,
    /// oldest first.
    async fn list_for_org(
        &self,
        organization_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Apply a partial field set to an order in a transaction.
    async fn update_fields_tx(
        &self,
        tx: &Transaction<'_>,
        id: Uuid,
        updates: &OrderUpdate,
    ) -> Result<(), RepositoryError>;

    /// Delete an order in a transaction.
    async fn delete_tx(&self, tx: &Transaction<'_>, id: Uuid) -> Result<(), RepositoryError>;
}

/// PostgreSQL implementation of the OrdersRepository trait.
pub struct PgOrdersRepository {
    /// PostgreSQL client for database operations
    db: Client,
}

impl PgOrdersRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

const ORDER_COLUMNS: &str = r#"
    id, order_id, tracking_number, status, payment_method, quantity,
    total_amount, product_description, recipient_name, recipient_email,
    recipient_phone, recipient_address, organization_name, organization_id,
    created_at, updated_at
"#;

const INSERT_ORDER: &str = r#"
    INSERT INTO orders (
        id, order_id, tracking_number, status, payment_method, quantity,
        total_amount, product_description, recipient_name, recipient_email,
        recipient_phone, recipient_address, organization_name, organization_id,
        created_at, updated_at
    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
"#;

fn order_from_row(row: &Row) -> Order {
    Order {
        id: row.get("id"),
        order_id: row.get("order_id"),
        tracking_number: row.get("tracking_number"),
        status: row.get("status"),
        payment_method: row.get("payment_method"),
        quantity: row.get("quantity"),
        total_amount: row.get("total_amount"),
        product_description: row.get("product_description"),
        recipient_name: row.get("recipient_name"),
        recipient_email: row.get("recipient_email"),
        recipient_phone: row.get("recipient_phone"),
        recipient_address: row.get("recipient_address"),
        organization_name: row.get("organization_name"),
        organization_id: row.get("organization_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn order_params<'a>(order: &'a Order) -> [&'a (dyn ToSql + Sync); 16] {
    [
        &order.id,
        &order.order_id,
        &order.tracking_number,
        &order.status,
        &order.payment_method,
        &order.quantity,
        &order.total_amount,
        &order.product_description,
        &order.recipient_name,
        &order.recipient_email,
        &order.recipient_phone,
        &order.recipient_address,
        &order.organization_name,
        &order.organization_id,
        &order.created_at,
        &order.updated_at,
    ]
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn insert_tx(&self, tx: &Transaction<'_>, order: &Order) -> Result<(), RepositoryError> {
        tx.execute(INSERT_ORDER, &order_params(order)).await?;
        Ok(())
    }

    async fn insert_batch_tx(
        &self,
        tx: &Transaction<'_>,
        orders: &[Order],
    ) -> Result<(), RepositoryError> {
        for order in orders {
            tx.execute(INSERT_ORDER, &order_params(order)).await?;
        }
        Ok(())
    }

    async fn get_for_org_tx(
        &self,
        tx: &Transaction<'_>,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Order, RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND organization_id = $2"
        );
        let row = tx.query_opt(&query, &[&id, &organization_id]).await?;
        match row {
            Some(row) => Ok(order_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_for_org(
        &self,
        organization_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     WHERE organization_id = $1 AND status = $2 ORDER BY created_at"
                );
                self.db.query(&query, &[&organization_id, &status]).await?
            }
            None => {
                let query = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     WHERE organization_id = $1 ORDER BY created_at"
                );
                self.db.query(&query, &[&organization_id]).await?
            }
        };
        Ok(rows.iter().map(order_from_row).collect())
    }

    async fn update_fields_tx(
        &self,
        tx: &Transaction<'_>,
        id: Uuid,
        updates: &OrderUpdate,
    ) -> Result<(), RepositoryError> {
        let mut assignments: Vec<String> = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some(quantity) = updates.quantity.as_ref() {
            params.push(quantity);
            assignments.push(format!("quantity = ${}", params.len()));
        }
        if let Some(name) = updates.recipient_name.as_ref() {
            params.push(name);
            assignments.push(format!("recipient_name = ${}", params.len()));
        }
        if let Some(email) = updates.recipient_email.as_ref() {
            params.push(email);
            assignments.push(format!("recipient_email = ${}", params.len()));
        }
        if let Some(address) = updates.recipient_address.as_ref() {
            params.push(address);
            assignments.push(format!("recipient_address = ${}", params.len()));
        }
        if let Some(phone) = updates.recipient_phone.as_ref() {
            params.push(phone);
            assignments.push(format!("recipient_phone = ${}", params.len()));
        }
        if let Some(amount) = updates.total_amount.as_ref() {
            params.push(amount);
            assignments.push(format!("total_amount = ${}", params.len()));
        }
        if let Some(description) = updates.product_description.as_ref() {
            params.push(description);
            assignments.push(format!("product_description = ${}", params.len()));
        }

        if assignments.is_empty() {
            return Ok(());
        }

        assignments.push("updated_at = now()".to_string());
        params.push(&id);
        let query = format!(
            "UPDATE orders SET {} WHERE id = ${}",
            assignments.join(", "),
            params.len()
        );
        let affected = tx.execute(&query, &params).await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_tx(&self, tx: &Transaction<'_>, id: Uuid) -> Result<(), RepositoryError> {
        let affected = tx.execute("DELETE FROM orders WHERE id = $1", &[&id]).await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
