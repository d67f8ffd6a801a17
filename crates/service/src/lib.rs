//! Business logic layer for organizations and shipment orders.
//!
//! Defines the [`OrganizationService`] and [`OrderService`] traits and
//! their async implementations. The services coordinate validation,
//! sanitization and transactional persistence, including the bulk
//! spreadsheet import which inserts every row or none at all.
//!
//! # Features
//! - Atomic multi-row import with row-indexed error reporting.
//! - Single-order update/delete wrapped in the same transaction discipline.
//! - Validation of input data before persistence.
//! - Dependency injection for testability and loose coupling.
//! - Well-typed error handling via [`ServiceError`].

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Pool, PoolError};
use ingest::{IngestError, SheetRow, SpreadsheetIngestor, UploadedFile};
use model::{
    CreateOrderRequest, LoginRequest, Order, OrderStatus, OrderUpdate, Organization,
    PaymentMethod, SignUpRequest, UpdateOrderRequest,
};
use repository::{OrdersRepository, OrganizationsRepository, RepositoryError};
use thiserror::Error;
use tokio::task;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validation::{Row, ValidationError};

/// The main error type for all service operations. Each variant renders the
/// human-readable reason returned to the API caller; the HTTP layer decides
/// the status code.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Please fill all required fields.")]
    MissingFields,
    #[error("Invalid email format.")]
    InvalidEmail,
    #[error("Invalid mobile format")]
    InvalidMobile,
    #[error("Please choose a stronger password.")]
    WeakPassword,
    #[error("Email is already registered.")]
    EmailTaken,
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("User not found")]
    UnknownUser,
    #[error("Invalid email or password")]
    BadCredentials,
    #[error("Unauthorized: organization not found")]
    UnknownOrganization,
    #[error("No file uploaded")]
    NoFile,
    /// A field-level failure, with the row index baked in on bulk paths.
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// The uploaded buffer was rejected before or during parsing.
    #[error("{0}")]
    Ingest(#[from] IngestError),
    #[error("No orders yet.")]
    NoOrders,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Order cannot be updated in its current status.")]
    NotEditable,
    #[error("Order has already been delivered")]
    AlreadyDelivered,
    #[error("No valid fields provided for update.")]
    NoFieldsToUpdate,
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    /// Failed to obtain a database connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// Some unexpected or unhandled error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Trait describing account operations for organizations.
#[async_trait]
pub trait OrganizationService: Send + Sync {
    /// Registers a new organization and returns the stored entity.
    ///
    /// # Errors
    /// Field-level errors for missing/malformed input, [`ServiceError::EmailTaken`]
    /// for duplicate registration, or a DB error.
    async fn sign_up(&self, req: SignUpRequest) -> Result<Organization, ServiceError>;

    /// Authenticates by email and password.
    ///
    /// # Errors
    /// [`ServiceError::UnknownUser`] for an unknown email,
    /// [`ServiceError::BadCredentials`] for a wrong password.
    async fn login(&self, req: LoginRequest) -> Result<Organization, ServiceError>;
}

/// Async implementation of [`OrganizationService`] over a repository.
pub struct OrganizationServiceImpl<R> {
    organizations_repo: R,
}

impl<R> OrganizationServiceImpl<R>
where
    R: OrganizationsRepository + Send + Sync,
{
    pub fn new(organizations_repo: R) -> Self {
        Self { organizations_repo }
    }
}

#[async_trait]
impl<R> OrganizationService for OrganizationServiceImpl<R>
where
    R: OrganizationsRepository + Send + Sync,
{
    #[instrument(skip(self, req))]
    async fn sign_up(&self, req: SignUpRequest) -> Result<Organization, ServiceError> {
        if req.name.trim().is_empty()
            || req.email.trim().is_empty()
            || req.phone.trim().is_empty()
            || req.password.is_empty()
        {
            return Err(ServiceError::MissingFields);
        }
        if !validation::is_valid_email(&req.email) {
            return Err(ServiceError::InvalidEmail);
        }
        match self.organizations_repo.get_by_email(&req.email).await {
            Ok(_) => return Err(ServiceError::EmailTaken),
            Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(ServiceError::Db(e)),
        }
        if !validation::is_strong_password(&req.password) {
            return Err(ServiceError::WeakPassword);
        }
        if !validation::is_valid_mobile(&req.phone) {
            return Err(ServiceError::InvalidMobile);
        }

        // bcrypt is CPU-bound; keep it off the async workers.
        let password = req.password;
        let password_hash = task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Hashing task failed: {e}")))?
            .map_err(|e| ServiceError::Unexpected(e.to_string()))?;

        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            phone: req.phone.trim().to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        };
        self.organizations_repo.insert(&organization).await?;
        info!(organization = %organization.id, "organization signed up");
        Ok(organization)
    }

    #[instrument(skip(self, req))]
    async fn login(&self, req: LoginRequest) -> Result<Organization, ServiceError> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(ServiceError::MissingCredentials);
        }
        let organization = match self.organizations_repo.get_by_email(&req.email).await {
            Ok(org) => org,
            Err(RepositoryError::NotFound) => return Err(ServiceError::UnknownUser),
            Err(e) => return Err(ServiceError::Db(e)),
        };

        let password = req.password;
        let hash = organization.password_hash.clone();
        let matches = task::spawn_blocking(move || auth::verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Verify task failed: {e}")))?
            .map_err(|e| ServiceError::Unexpected(e.to_string()))?;
        if !matches {
            warn!(email = %req.email, "failed login attempt");
            return Err(ServiceError::BadCredentials);
        }
        Ok(organization)
    }
}

/// Trait describing business operations for order management.
///
/// Implementations guarantee atomicity for every mutating operation: the
/// bulk import persists all rows or none, and single-order update/delete
/// run inside their own transaction.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates a single fully-specified order for the organization.
    async fn create_order(
        &self,
        organization_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<Order, ServiceError>;

    /// Imports every row of the uploaded spreadsheet as one atomic batch
    /// and returns the number of created orders.
    async fn import_orders(
        &self,
        organization_id: Uuid,
        file: Option<UploadedFile>,
    ) -> Result<usize, ServiceError>;

    /// Lists the organization's orders, optionally filtered by status.
    ///
    /// # Errors
    /// [`ServiceError::NoOrders`] when the result set is empty — the empty
    /// list is reported as a distinguishable condition, not a success.
    async fn list_orders(
        &self,
        organization_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, ServiceError>;

    /// Applies a partial update to an order still awaiting pickup.
    async fn update_order(
        &self,
        organization_id: Uuid,
        order_id: Uuid,
        req: UpdateOrderRequest,
    ) -> Result<(), ServiceError>;

    /// Deletes an order unless it has already been delivered.
    async fn delete_order(&self, organization_id: Uuid, order_id: Uuid)
        -> Result<(), ServiceError>;
}

/// Async implementation of [`OrderService`] using the repository pattern.
///
/// Wires together the repositories, a Postgres connection pool for
/// transactions, and the spreadsheet ingestor (an explicit configuration
/// value, not process-wide state).
pub struct OrderServiceImpl<R1, R2> {
    db_pool: Pool,
    organizations_repo: R1,
    orders_repo: R2,
    ingestor: SpreadsheetIngestor,
}

impl<R1, R2> OrderServiceImpl<R1, R2>
where
    R1: OrganizationsRepository + Send + Sync,
    R2: OrdersRepository + Send + Sync,
{
    pub fn new(
        db_pool: Pool,
        organizations_repo: R1,
        orders_repo: R2,
        ingestor: SpreadsheetIngestor,
    ) -> Self {
        Self {
            db_pool,
            organizations_repo,
            orders_repo,
            ingestor,
        }
    }

    async fn resolve_organization(&self, id: Uuid) -> Result<Organization, ServiceError> {
        match self.organizations_repo.get_by_id(id).await {
            Ok(org) => Ok(org),
            Err(RepositoryError::NotFound) => Err(ServiceError::UnknownOrganization),
            Err(e) => Err(ServiceError::Db(e)),
        }
    }
}

#[async_trait]
impl<R1, R2> OrderService for OrderServiceImpl<R1, R2>
where
    R1: OrganizationsRepository + Send + Sync,
    R2: OrdersRepository + Send + Sync,
{
    #[instrument(skip(self, req))]
    async fn create_order(
        &self,
        organization_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<Order, ServiceError> {
        let organization = self.resolve_organization(organization_id).await?;

        if req.recipient_name.trim().is_empty()
            || req.recipient_phone.trim().is_empty()
            || req.recipient_email.trim().is_empty()
            || req.recipient_address.trim().is_empty()
            || req.product_description.trim().is_empty()
            || req.payment_method.trim().is_empty()
            || req.quantity.is_none()
            || req.total_amount.is_none()
        {
            return Err(ServiceError::MissingFields);
        }
        let quantity = req.quantity.unwrap_or_default();
        let total_amount = req.total_amount.unwrap_or_default();
        validation::validate_order_fields(
            &req.recipient_email,
            &req.recipient_phone,
            quantity,
            total_amount,
            &req.payment_method,
            Row::none(),
        )?;

        let order = build_order(
            &organization,
            PaymentMethod::parse(&req.payment_method).unwrap_or(PaymentMethod::Cod),
            quantity as i32,
            total_amount,
            &req.product_description,
            &req.recipient_name,
            req.recipient_email.trim(),
            req.recipient_phone.trim(),
            &req.recipient_address,
        );

        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;
        self.orders_repo.insert_tx(&tx, &order).await?;
        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;

        info!(order_id = %order.order_id, "order created");
        Ok(order)
    }

    #[instrument(skip(self, file))]
    async fn import_orders(
        &self,
        organization_id: Uuid,
        file: Option<UploadedFile>,
    ) -> Result<usize, ServiceError> {
        let organization = self.resolve_organization(organization_id).await?;

        let Some(file) = file else {
            return Err(ServiceError::NoFile);
        };

        // Workbook parsing is pure CPU work on an in-memory buffer.
        let ingestor = self.ingestor;
        let rows = task::spawn_blocking(move || ingestor.read_rows(&file))
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Parse task failed: {e}")))??;

        // Per-row failures are collected as explicit results before any
        // insert happens; the transaction below only ever sees a fully
        // validated batch.
        let orders = build_orders_from_rows(&organization, &rows)?;

        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;
        self.orders_repo.insert_batch_tx(&tx, &orders).await?;
        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;

        info!(
            organization = %organization.id,
            count = orders.len(),
            "bulk import committed"
        );
        Ok(orders.len())
    }

    #[instrument(skip(self))]
    async fn list_orders(
        &self,
        organization_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, ServiceError> {
        let organization = self.resolve_organization(organization_id).await?;
        let orders = self
            .orders_repo
            .list_for_org(organization.id, status)
            .await?;
        if orders.is_empty() {
            return Err(ServiceError::NoOrders);
        }
        Ok(orders)
    }

    #[instrument(skip(self, req))]
    async fn update_order(
        &self,
        organization_id: Uuid,
        order_id: Uuid,
        req: UpdateOrderRequest,
    ) -> Result<(), ServiceError> {
        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        let order = match self
            .orders_repo
            .get_for_org_tx(&tx, order_id, organization_id)
            .await
        {
            Ok(order) => order,
            Err(RepositoryError::NotFound) => return Err(ServiceError::OrderNotFound),
            Err(e) => return Err(ServiceError::Db(e)),
        };
        if order.status != OrderStatus::PendingPickup {
            return Err(ServiceError::NotEditable);
        }

        let updates = build_order_update(&req)?;
        if updates.is_empty() {
            return Err(ServiceError::NoFieldsToUpdate);
        }

        self.orders_repo
            .update_fields_tx(&tx, order.id, &updates)
            .await?;
        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;
        info!(order_id = %order.order_id, "order updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_order(
        &self,
        organization_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        let order = match self
            .orders_repo
            .get_for_org_tx(&tx, order_id, organization_id)
            .await
        {
            Ok(order) => order,
            Err(RepositoryError::NotFound) => return Err(ServiceError::OrderNotFound),
            Err(e) => return Err(ServiceError::Db(e)),
        };
        if order.status == OrderStatus::Delivered {
            return Err(ServiceError::AlreadyDelivered);
        }

        self.orders_repo.delete_tx(&tx, order.id).await?;
        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;
        info!(order_id = %order.order_id, "order deleted");
        Ok(())
    }
}

/// Builds one order per sheet row, or the first row's failure.
///
/// Rows are processed in file order; a missing required field or a failed
/// field check aborts the whole batch with the 1-based row index in the
/// message. No partial result is ever returned.
pub fn build_orders_from_rows(
    organization: &Organization,
    rows: &[SheetRow],
) -> Result<Vec<Order>, ServiceError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(order_from_sheet_row(organization, row)?);
    }
    Ok(orders)
}

fn order_from_sheet_row(
    organization: &Organization,
    row: &SheetRow,
) -> Result<Order, ServiceError> {
    let at = Row::at(row.index);

    let (Some(recipient_name), Some(recipient_phone), Some(recipient_address)) = (
        row.value("recipientName"),
        row.value("recipientPhone"),
        row.value("recipientAddress"),
    ) else {
        return Err(ValidationError::MissingFields(at).into());
    };
    let (Some(product_description), Some(quantity_raw), Some(total_amount_raw), Some(payment_method)) = (
        row.value("productDescription"),
        row.value("quantity"),
        row.value("totalAmount"),
        row.value("paymentMethod"),
    ) else {
        return Err(ValidationError::MissingFields(at).into());
    };
    let recipient_email = row.value("recipientEmail").unwrap_or("");

    // Unparsable numbers fall through as NaN and fail the numeric checks.
    let quantity = quantity_raw.parse::<f64>().unwrap_or(f64::NAN);
    let total_amount = total_amount_raw.parse::<f64>().unwrap_or(f64::NAN);
    validation::validate_order_fields(
        recipient_email,
        recipient_phone,
        quantity,
        total_amount,
        payment_method,
        at,
    )?;

    Ok(build_order(
        organization,
        PaymentMethod::parse(payment_method).unwrap_or(PaymentMethod::Cod),
        quantity as i32,
        total_amount,
        product_description,
        recipient_name,
        recipient_email,
        recipient_phone,
        recipient_address,
    ))
}

/// Assembles a persistable order: fresh identifiers, Pending Pickup status,
/// sanitized free-text fields and the owner's identity stamped in.
#[allow(clippy::too_many_arguments)]
fn build_order(
    organization: &Organization,
    payment_method: PaymentMethod,
    quantity: i32,
    total_amount: f64,
    product_description: &str,
    recipient_name: &str,
    recipient_email: &str,
    recipient_phone: &str,
    recipient_address: &str,
) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        order_id: model::new_order_id(),
        tracking_number: model::new_tracking_number(),
        status: OrderStatus::PendingPickup,
        payment_method,
        quantity: if quantity > 0 { quantity } else { 1 },
        total_amount,
        product_description: validation::sanitize_text(product_description),
        recipient_name: validation::sanitize_text(recipient_name),
        recipient_email: recipient_email.to_string(),
        recipient_phone: recipient_phone.to_string(),
        recipient_address: validation::sanitize_text(recipient_address),
        organization_name: organization.name.clone(),
        organization_id: organization.id,
        created_at: now,
        updated_at: now,
    }
}

/// Validates and sanitizes a partial update request into the field set the
/// repository applies. Blank strings count as absent, mirroring the create
/// path's required-field handling.
pub fn build_order_update(req: &UpdateOrderRequest) -> Result<OrderUpdate, ServiceError> {
    let mut updates = OrderUpdate::default();

    if let Some(quantity) = req.quantity {
        if !validation::is_positive_integer(quantity) {
            return Err(ValidationError::Quantity(Row::none()).into());
        }
        updates.quantity = Some(quantity as i32);
    }
    if let Some(name) = non_blank(req.recipient_name.as_deref()) {
        updates.recipient_name = Some(validation::sanitize_text(name));
    }
    if let Some(email) = non_blank(req.recipient_email.as_deref()) {
        if !validation::is_valid_email(email) {
            return Err(ValidationError::Email(Row::none()).into());
        }
        updates.recipient_email = Some(email.to_string());
    }
    if let Some(address) = non_blank(req.recipient_address.as_deref()) {
        updates.recipient_address = Some(validation::sanitize_text(address));
    }
    if let Some(phone) = non_blank(req.recipient_phone.as_deref()) {
        if !validation::is_valid_mobile(phone) {
            return Err(ValidationError::Phone(Row::none()).into());
        }
        updates.recipient_phone = Some(phone.to_string());
    }
    if let Some(amount) = req.total_amount {
        if !validation::is_positive_amount(amount) {
            return Err(ValidationError::TotalAmount(Row::none()).into());
        }
        updates.total_amount = Some(amount);
    }
    if let Some(description) = non_blank(req.product_description.as_deref()) {
        updates.product_description = Some(validation::sanitize_text(description));
    }

    Ok(updates)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_organization() -> Organization {
        Organization {
            id: Uuid::new_v4(),
            name: "Acme Shipping".to_string(),
            email: "ops@acme.example".to_string(),
            phone: "01112345678".to_string(),
            password_hash: "$2b$10$hash".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sheet_row(index: usize, pairs: &[(&str, &str)]) -> SheetRow {
        SheetRow {
            index,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn valid_row(index: usize) -> SheetRow {
        sheet_row(
            index,
            &[
                ("recipientName", "Mona Hassan"),
                ("recipientPhone", "01012345678"),
                ("recipientEmail", "mona@example.com"),
                ("recipientAddress", "12 Tahrir St, Cairo"),
                ("productDescription", "Ceramic mugs"),
                ("quantity", "2"),
                ("totalAmount", "149.5"),
                ("paymentMethod", "COD"),
            ],
        )
    }

    #[test]
    fn test_builds_one_order_per_valid_row() {
        let org = sample_organization();
        let rows = vec![valid_row(1), valid_row(2), valid_row(3)];
        let orders = build_orders_from_rows(&org, &rows).unwrap();
        assert_eq!(orders.len(), 3);
        for order in &orders {
            assert_eq!(order.status, OrderStatus::PendingPickup);
            assert_eq!(order.organization_id, org.id);
            assert_eq!(order.organization_name, "Acme Shipping");
            assert_eq!(order.quantity, 2);
        }
        // Identifiers are unique across rows.
        assert_ne!(orders[0].order_id, orders[1].order_id);
        assert_ne!(orders[0].tracking_number, orders[2].tracking_number);
    }

    #[test]
    fn test_missing_required_field_reports_row() {
        let org = sample_organization();
        let mut row = valid_row(1);
        row.cells.remove("recipientAddress");
        let err = build_orders_from_rows(&org, &[row]).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields in row 1");
    }

    #[test]
    fn test_negative_quantity_fails_whole_batch_with_row_index() {
        let org = sample_organization();
        let mut bad = valid_row(2);
        bad.cells.insert("quantity".to_string(), "-1".to_string());
        let rows = vec![valid_row(1), bad, valid_row(3)];
        let err = build_orders_from_rows(&org, &rows).unwrap_err();
        assert!(err.to_string().contains("row 2"), "got: {err}");
        assert!(err.to_string().contains("Quantity"));
    }

    #[test]
    fn test_unparsable_numbers_fail_validation() {
        let org = sample_organization();
        let mut row = valid_row(1);
        row.cells.insert("quantity".to_string(), "two".to_string());
        let err = build_orders_from_rows(&org, &[row]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid quantity in row 1. Quantity must be a positive integer."
        );
    }

    #[test]
    fn test_bad_payment_method_reports_allowed_values() {
        let org = sample_organization();
        let mut row = valid_row(1);
        row.cells
            .insert("paymentMethod".to_string(), "Cash".to_string());
        let err = build_orders_from_rows(&org, &[row]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payment method in row 1. Allowed values: COD, Card"
        );
    }

    #[test]
    fn test_free_text_fields_are_sanitized() {
        let org = sample_organization();
        let row = sheet_row(
            1,
            &[
                ("recipientName", "  Mona <Hassan> "),
                ("recipientPhone", "01012345678"),
                ("recipientEmail", "mona@example.com"),
                ("recipientAddress", "12 Tahrir St & Co"),
                ("productDescription", "Mugs 'fragile'"),
                ("quantity", "1"),
                ("totalAmount", "10"),
                ("paymentMethod", "Card"),
            ],
        );
        let orders = build_orders_from_rows(&org, &[row]).unwrap();
        assert_eq!(orders[0].recipient_name, "Mona &lt;Hassan&gt;");
        assert_eq!(orders[0].recipient_address, "12 Tahrir St &amp; Co");
        assert_eq!(orders[0].product_description, "Mugs &#x27;fragile&#x27;");
        assert_eq!(orders[0].payment_method, PaymentMethod::Card);
    }

    #[test]
    fn test_update_with_valid_fields() {
        let req = UpdateOrderRequest {
            quantity: Some(4.0),
            recipient_name: Some("Ali <Farouk>".to_string()),
            total_amount: Some(99.9),
            ..Default::default()
        };
        let updates = build_order_update(&req).unwrap();
        assert_eq!(updates.quantity, Some(4));
        assert_eq!(updates.recipient_name.as_deref(), Some("Ali &lt;Farouk&gt;"));
        assert_eq!(updates.total_amount, Some(99.9));
        assert!(updates.recipient_phone.is_none());
    }

    #[test]
    fn test_update_rejects_bad_quantity() {
        let req = UpdateOrderRequest {
            quantity: Some(2.5),
            ..Default::default()
        };
        let err = build_order_update(&req).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid quantity. Quantity must be a positive integer."
        );
    }

    #[test]
    fn test_update_rejects_bad_email_and_phone() {
        let err = build_order_update(&UpdateOrderRequest {
            recipient_email: Some("not-an-email".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Incorrect email format");

        let err = build_order_update(&UpdateOrderRequest {
            recipient_phone: Some("12345".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid phone number format");
    }

    #[test]
    fn test_update_treats_blank_strings_as_absent() {
        let req = UpdateOrderRequest {
            recipient_name: Some("   ".to_string()),
            recipient_email: Some(String::new()),
            ..Default::default()
        };
        let updates = build_order_update(&req).unwrap();
        assert!(updates.is_empty());
    }
}
