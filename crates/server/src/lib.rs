//! Server crate provides HTTP server functionality.
//!
//! This module implements the REST surface of the shipping backend:
//! organization sign-up/login/logout, the protected order routes (single
//! create, bulk spreadsheet upload, list, update, delete), plus health and
//! metrics endpoints. Every protected route passes through the role gate
//! before its handler runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth::{AuthIdentity, AuthKeys, ROLE_ORGANIZATION, RoleGate};
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use ingest::UploadedFile;
use model::{
    CreateOrderRequest, LoginRequest, OrderStatus, Organization, SignUpRequest,
    UpdateOrderRequest,
};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use serde_json::json;
use service::{OrderService, OrganizationService, ServiceError};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

// Multipart framing overhead on top of the spreadsheet size ceiling.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

/// Server represents the HTTP server for the shipping API.
pub struct Server {
    port: String,
    state: AppState,
    upload_body_limit: usize,
}

/// Application state shared between request handlers
#[derive(Clone)]
pub struct AppState {
    pub organizations: Arc<dyn OrganizationService>,
    pub orders: Arc<dyn OrderService>,
    pub auth_keys: Arc<AuthKeys>,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of error responses"),
            &["endpoint", "status"],
        )
        .expect("Failed to create errors_total metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
        if status >= 400 {
            self.errors_total
                .with_label_values(&[endpoint, &status.to_string()])
                .inc();
        }
    }
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `organizations` - Account service (sign-up/login)
    /// * `orders` - Order service (CRUD + bulk import)
    /// * `auth_keys` - Token keys and cookie policy
    /// * `max_upload_bytes` - Spreadsheet size ceiling, used to cap request bodies
    pub fn new(
        port: String,
        organizations: Arc<dyn OrganizationService>,
        orders: Arc<dyn OrderService>,
        auth_keys: Arc<AuthKeys>,
        max_upload_bytes: usize,
    ) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            port,
            state: AppState {
                organizations,
                orders,
                auth_keys,
                metrics: Arc::new(Metrics::new()),
            },
            upload_body_limit: max_upload_bytes + UPLOAD_BODY_SLACK,
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.state.metrics.clone();
        let gate = RoleGate::new(self.state.auth_keys.clone(), &[ROLE_ORGANIZATION]);

        let order_routes = Router::new()
            .route("/upload-orders", post(Self::handle_upload_orders))
            .route("/create-order", post(Self::handle_create_order))
            .route("/orders", get(Self::handle_all_orders))
            .route("/pending-orders", get(Self::handle_pending_orders))
            .route("/delivered-orders", get(Self::handle_delivered_orders))
            .route("/OFD-orders", get(Self::handle_out_for_delivery_orders))
            .route(
                "/order/{order_id}",
                delete(Self::handle_delete_order).patch(Self::handle_update_order),
            )
            .layer(middleware::from_fn_with_state(
                gate,
                auth::authenticate_and_authorize,
            ));

        Router::new()
            .route("/organization/sign-up", post(Self::handle_sign_up))
            .route("/organization/login", post(Self::handle_login))
            .route("/organization/logout", post(Self::handle_logout))
            .nest("/order", order_routes)
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(DefaultBodyLimit::max(self.upload_body_limit))
            .layer(middleware::from_fn_with_state(
                metrics,
                Self::metrics_middleware,
            ))
            .with_state(self.state.clone())
    }

    /// Middleware for collecting metrics on HTTP requests
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let start = std::time::Instant::now();

        let response = next.run(req).await;

        metrics.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed(),
        );
        response
    }

    async fn handle_sign_up(
        State(state): State<AppState>,
        Json(req): Json<SignUpRequest>,
    ) -> Response {
        info!("Received sign-up request");
        match state.organizations.sign_up(req).await {
            Ok(org) => session_response(
                &state,
                &org,
                StatusCode::CREATED,
                "Signed up successfully",
            ),
            Err(e) => error_response(&e, "signing up"),
        }
    }

    async fn handle_login(
        State(state): State<AppState>,
        Json(req): Json<LoginRequest>,
    ) -> Response {
        info!("Received login request");
        match state.organizations.login(req).await {
            Ok(org) => session_response(&state, &org, StatusCode::OK, "logged in successfully"),
            Err(e) => error_response(&e, "logging in"),
        }
    }

    async fn handle_logout(State(state): State<AppState>) -> Response {
        let cookie = state.auth_keys.clear_cookie();
        with_cookie(
            (
                StatusCode::OK,
                Json(json!({ "message": "Logged out successfully" })),
            )
                .into_response(),
            &cookie,
        )
    }

    async fn handle_upload_orders(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
        mut multipart: Multipart,
    ) -> Response {
        info!("Received bulk order upload");

        let mut file: Option<UploadedFile> = None;
        loop {
            match multipart.next_field().await {
                Ok(Some(field)) => {
                    if field.name() != Some("ordersFile") {
                        continue;
                    }
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    match field.bytes().await {
                        Ok(bytes) => {
                            file = Some(UploadedFile {
                                file_name,
                                content_type,
                                bytes: bytes.to_vec(),
                            });
                        }
                        Err(e) => {
                            warn!("Failed to read uploaded file: {e}");
                            return message_response(
                                StatusCode::BAD_REQUEST,
                                "Failed to read uploaded file",
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Malformed multipart body: {e}");
                    return message_response(StatusCode::BAD_REQUEST, "Malformed upload request");
                }
            }
        }

        match state
            .orders
            .import_orders(identity.organization_id, file)
            .await
        {
            Ok(count) => {
                info!(count, "bulk import succeeded");
                message_response(StatusCode::OK, "Orders processed successfully")
            }
            Err(e) => error_response(&e, "processing orders"),
        }
    }

    async fn handle_create_order(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
        Json(req): Json<CreateOrderRequest>,
    ) -> Response {
        match state
            .orders
            .create_order(identity.organization_id, req)
            .await
        {
            Ok(order) => (
                StatusCode::CREATED,
                Json(json!({ "message": "Created order successfully", "order": order })),
            )
                .into_response(),
            Err(e) => error_response(&e, "creating order"),
        }
    }

    async fn handle_all_orders(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
    ) -> Response {
        Self::list_response(&state, &identity, None).await
    }

    async fn handle_pending_orders(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
    ) -> Response {
        Self::list_response(&state, &identity, Some(OrderStatus::PendingPickup)).await
    }

    async fn handle_delivered_orders(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
    ) -> Response {
        Self::list_response(&state, &identity, Some(OrderStatus::Delivered)).await
    }

    async fn handle_out_for_delivery_orders(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
    ) -> Response {
        Self::list_response(&state, &identity, Some(OrderStatus::OutForDelivery)).await
    }

    async fn list_response(
        state: &AppState,
        identity: &AuthIdentity,
        status: Option<OrderStatus>,
    ) -> Response {
        match state
            .orders
            .list_orders(identity.organization_id, status)
            .await
        {
            Ok(orders) => (StatusCode::OK, Json(json!({ "orders": orders }))).into_response(),
            Err(e) => error_response(&e, "fetching orders"),
        }
    }

    async fn handle_delete_order(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
        AxumPath(order_id): AxumPath<Uuid>,
    ) -> Response {
        match state
            .orders
            .delete_order(identity.organization_id, order_id)
            .await
        {
            Ok(()) => message_response(StatusCode::OK, "Deleted order"),
            Err(e) => error_response(&e, "deleting order"),
        }
    }

    async fn handle_update_order(
        State(state): State<AppState>,
        Extension(identity): Extension<AuthIdentity>,
        AxumPath(order_id): AxumPath<Uuid>,
        Json(req): Json<UpdateOrderRequest>,
    ) -> Response {
        match state
            .orders
            .update_order(identity.organization_id, order_id, req)
            .await
        {
            Ok(()) => message_response(StatusCode::OK, "Updated order."),
            Err(e) => error_response(&e, "updating order"),
        }
    }

    async fn handle_health() -> &'static str {
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                message_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data")
            }
        }
    }
}

/// Issues a session token for the organization and attaches the cookie to a
/// success response. Used by both sign-up and login.
fn session_response(
    state: &AppState,
    organization: &Organization,
    status: StatusCode,
    message: &str,
) -> Response {
    match state
        .auth_keys
        .issue(organization.id, ROLE_ORGANIZATION)
    {
        Ok(token) => {
            let cookie = state.auth_keys.session_cookie(&token);
            with_cookie(
                (status, Json(json!({ "message": message }))).into_response(),
                &cookie,
            )
        }
        Err(e) => {
            error!("Failed to issue session token: {e}");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(e) => {
            error!("Failed to encode session cookie: {e}");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Maps a service failure to its HTTP status. Internal failures are logged
/// with detail server-side and surface only a generic message.
fn error_response(err: &ServiceError, context: &str) -> Response {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Error while {context}: {err}");
        message_response(status, "Server error")
    } else {
        warn!("Rejected while {context}: {err}");
        message_response(status, &err.to_string())
    }
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::MissingFields
        | ServiceError::InvalidEmail
        | ServiceError::InvalidMobile
        | ServiceError::WeakPassword
        | ServiceError::EmailTaken
        | ServiceError::MissingCredentials
        | ServiceError::NoFile
        | ServiceError::Validation(_)
        | ServiceError::Ingest(_)
        | ServiceError::NoOrders
        | ServiceError::NotEditable
        | ServiceError::AlreadyDelivered
        | ServiceError::NoFieldsToUpdate => StatusCode::BAD_REQUEST,
        ServiceError::UnknownOrganization | ServiceError::BadCredentials => StatusCode::FORBIDDEN,
        ServiceError::UnknownUser | ServiceError::OrderNotFound => StatusCode::NOT_FOUND,
        ServiceError::Db(_) | ServiceError::Pool(_) | ServiceError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ingest::IngestError;
    use model::{Order, PaymentMethod};

    struct StubOrganizations;

    #[async_trait]
    impl OrganizationService for StubOrganizations {
        async fn sign_up(&self, _req: SignUpRequest) -> Result<Organization, ServiceError> {
            Err(ServiceError::MissingFields)
        }

        async fn login(&self, _req: LoginRequest) -> Result<Organization, ServiceError> {
            Err(ServiceError::UnknownUser)
        }
    }

    struct StubOrders;

    #[async_trait]
    impl OrderService for StubOrders {
        async fn create_order(
            &self,
            organization_id: Uuid,
            _req: CreateOrderRequest,
        ) -> Result<Order, ServiceError> {
            Ok(Order {
                id: Uuid::new_v4(),
                order_id: model::new_order_id(),
                tracking_number: model::new_tracking_number(),
                status: OrderStatus::PendingPickup,
                payment_method: PaymentMethod::Cod,
                quantity: 1,
                total_amount: 1.0,
                product_description: String::new(),
                recipient_name: String::new(),
                recipient_email: String::new(),
                recipient_phone: String::new(),
                recipient_address: String::new(),
                organization_name: String::new(),
                organization_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        }

        async fn import_orders(
            &self,
            _organization_id: Uuid,
            _file: Option<UploadedFile>,
        ) -> Result<usize, ServiceError> {
            Ok(0)
        }

        async fn list_orders(
            &self,
            _organization_id: Uuid,
            _status: Option<OrderStatus>,
        ) -> Result<Vec<Order>, ServiceError> {
            Err(ServiceError::NoOrders)
        }

        async fn update_order(
            &self,
            _organization_id: Uuid,
            _order_id: Uuid,
            _req: UpdateOrderRequest,
        ) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn delete_order(
            &self,
            _organization_id: Uuid,
            _order_id: Uuid,
        ) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    fn create_test_server() -> Server {
        let keys = Arc::new(AuthKeys::new(
            "test-secret",
            Duration::from_secs(3600),
            false,
        ));
        Server::new(
            "8080".to_string(),
            Arc::new(StubOrganizations),
            Arc::new(StubOrders),
            keys,
            2 * 1024 * 1024,
        )
    }

    #[test]
    fn test_server_creation() {
        let server = create_test_server();
        assert_eq!(server.port, "8080");
        assert_eq!(server.upload_body_limit, 2 * 1024 * 1024 + UPLOAD_BODY_SLACK);
    }

    #[test]
    fn test_router_builds() {
        let server = create_test_server();
        let _router = server.create_router();
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ServiceError::WeakPassword),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&ServiceError::NoOrders), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&ServiceError::NotEditable),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::AlreadyDelivered),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::Ingest(IngestError::Empty)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::UnknownOrganization),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ServiceError::BadCredentials),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ServiceError::UnknownUser),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ServiceError::OrderNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ServiceError::Unexpected("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
