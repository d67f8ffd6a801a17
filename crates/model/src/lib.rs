use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a shipment order.
///
/// Transitions only move forward (Pending Pickup -> Out for Delivery ->
/// Delivered) or to Refunded. Orders are editable only while Pending Pickup
/// and can no longer be deleted once Delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "order_status")]
pub enum OrderStatus {
    #[serde(rename = "Pending Pickup")]
    #[postgres(name = "Pending Pickup")]
    PendingPickup,
    #[serde(rename = "Out for Delivery")]
    #[postgres(name = "Out for Delivery")]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    #[postgres(name = "Delivered")]
    Delivered,
    #[serde(rename = "Refunded")]
    #[postgres(name = "Refunded")]
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPickup => "Pending Pickup",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

/// How the recipient pays for the shipment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "payment_method")]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    #[postgres(name = "COD")]
    Cod,
    #[serde(rename = "Card")]
    #[postgres(name = "Card")]
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Card => "Card",
        }
    }

    /// Parses the wire/spreadsheet value. Case-sensitive, matching the
    /// allowed set exactly.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COD" => Some(PaymentMethod::Cod),
            "Card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

/// Organization — the tenant account that owns orders and authenticates
/// against the API. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Order — a single shipment request owned by exactly one organization.
///
/// `order_id` and `tracking_number` are business identifiers assigned at
/// creation and immutable afterwards. `organization_name` is a snapshot of
/// the owner's name at creation time and is never re-synced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_id: String,
    pub tracking_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub quantity: i32,
    pub total_amount: f64,
    pub product_description: String,
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_email: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub organization_name: String,
    // Ownership is enforced by query-time filtering; the reference itself is
    // never exposed in API responses.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generates a business order identifier, e.g. `Order-1f9a2b3c4d`.
pub fn new_order_id() -> String {
    format!("Order-{}", short_token())
}

/// Generates a tracking identifier, e.g. `TRK-1f9a2b3c4d`.
pub fn new_tracking_number() -> String {
    format!("TRK-{}", short_token())
}

fn short_token() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..10].to_string()
}

/// Sign-up request body.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Single-order creation request body.
///
/// Numeric fields arrive as raw numbers so the integer/positivity rules can
/// produce field-level messages instead of body-level deserialization errors.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_email: String,
    pub recipient_address: String,
    pub product_description: String,
    pub payment_method: String,
    pub quantity: Option<f64>,
    pub total_amount: Option<f64>,
}

/// Partial update request body; absent fields are left untouched.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOrderRequest {
    pub quantity: Option<f64>,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_address: Option<String>,
    pub recipient_phone: Option<String>,
    pub total_amount: Option<f64>,
    pub product_description: Option<String>,
}

/// Validated, sanitized field set applied to an order by the repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub quantity: Option<i32>,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_address: Option<String>,
    pub recipient_phone: Option<String>,
    pub total_amount: Option<f64>,
    pub product_description: Option<String>,
}

impl OrderUpdate {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.recipient_name.is_none()
            && self.recipient_email.is_none()
            && self.recipient_address.is_none()
            && self.recipient_phone.is_none()
            && self.total_amount.is_none()
            && self.product_description.is_none()
    }
}
