use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::Cents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::pricing::PricingSnapshot;

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// The human-readable order number, e.g. `CPG-4F7A2C`. Generated by the engine when the checkout session does not
/// carry one.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order exists but no payment confirmation has arrived yet.
    PendingPayment,
    /// Payment has been confirmed in full and a production job has been emitted.
    Paid,
    /// A refund event matching the order's payment reference has been processed. Terminal.
    Refunded,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::PendingPayment => write!(f, "PendingPayment"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Refunded => write!(f, "Refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingPayment" => Ok(Self::PendingPayment),
            "Paid" => Ok(Self::Paid),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PendingPayment");
            OrderStatusType::PendingPayment
        })
    }
}

//--------------------------------------     EventOutcome    ---------------------------------------------------------
/// The terminal processing outcome recorded against a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EventOutcome {
    Success,
    Failed,
    Skipped,
    /// A refund (or similar) event referenced a payment for which no order exists. Recorded as a data-integrity
    /// signal, never silently dropped.
    NoOrder,
}

impl Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventOutcome::Success => write!(f, "Success"),
            EventOutcome::Failed => write!(f, "Failed"),
            EventOutcome::Skipped => write!(f, "Skipped"),
            EventOutcome::NoOrder => write!(f, "NoOrder"),
        }
    }
}

impl FromStr for EventOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Skipped" => Ok(Self::Skipped),
            "NoOrder" => Ok(Self::NoOrder),
            s => Err(ConversionError(format!("Invalid event outcome: {s}"))),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    /// The provider's checkout-session identifier. Unique; two concurrent deliveries for the same session converge
    /// on one row through this constraint.
    pub provider_session_id: String,
    /// The payment reference recorded at the `Paid` transition. Refund events are matched against this.
    pub payment_ref: Option<String>,
    /// The provider event id of the event that last mutated this order.
    pub provider_event_id: Option<String>,
    pub customer_id: Option<i64>,
    pub status: OrderStatusType,
    pub currency: String,
    pub subtotal: Cents,
    pub shipping: Cents,
    pub tax: Cents,
    pub total: Cents,
    /// The immutable pricing snapshot, serialized JSON. Written exactly once; orders are re-read, never re-priced.
    pub pricing_snapshot: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    /// Result of the (non-transactional) confirmation notification, e.g. "sent" or "failed". Metadata only.
    pub confirmation_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Decodes the persisted pricing snapshot. The raw column value is the authoritative record; this is a view.
    pub fn parsed_snapshot(&self) -> Result<Option<PricingSnapshot>, serde_json::Error> {
        self.pricing_snapshot.as_deref().map(serde_json::from_str).transpose()
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub provider_session_id: String,
    pub customer_id: Option<i64>,
    pub currency: String,
    pub shipping: Cents,
    pub tax: Cents,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    /// The time the session was created on the provider side.
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// One priced line within an order. Created atomically with the pricing snapshot and immutable thereafter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub line_total: Cents,
    /// Structured component/option selections for configured products, serialized JSON.
    pub configuration: Option<String>,
    /// Per-item price breakdown (base, deltas, flat fee), serialized JSON.
    pub price_breakdown: Option<String>,
}

//--------------------------------------      Customer       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    /// The provider-issued customer identity. Primary reconciliation key when present.
    pub provider_customer_id: Option<String>,
    /// Secondary natural key.
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub provider_customer_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
}

//--------------------------------------    ProcessedEvent   ---------------------------------------------------------
/// The dedup ledger entry. The uniqueness constraint on `event_id` is the deduplication mechanism; a row with no
/// outcome is an attempt that crashed mid-flight and is re-driven by an external reconciliation sweep.
#[derive(Debug, Clone, FromRow)]
pub struct ProcessedEvent {
    pub id: i64,
    pub event_id: String,
    pub event_type: String,
    pub order_id: Option<i64>,
    pub outcome: Option<EventOutcome>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------      JobStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum JobStatus {
    /// The job has been emitted and awaits pickup by the production floor.
    Queued,
    InProduction,
    Completed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::InProduction => write!(f, "InProduction"),
            JobStatus::Completed => write!(f, "Completed"),
        }
    }
}

//--------------------------------------    ProductionJob    ---------------------------------------------------------
/// A fulfillment work item. At most one is ever created per order; the guard is the order's own `Paid` transition,
/// not a separate idempotency key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductionJob {
    pub id: i64,
    pub order_id: i64,
    pub priority: i64,
    pub status: JobStatus,
    /// Fully denormalized payload: product, configuration, customer contact, shipping and pricing breakdown.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   CatalogProduct    ---------------------------------------------------------
/// A standard (non-configured) product in the catalog store. Read-only to this engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Cents,
}
