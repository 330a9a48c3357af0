use thiserror::Error;

use crate::{
    db_types::{Customer, EventOutcome, NewCustomer, NewOrder, Order, OrderItem, ProcessedEvent},
    pricing::PricingSnapshot,
    traits::data_objects::{NewProductionJob, PaidOrderResult},
};

/// This trait defines the behaviour required of backends supporting the Craft Payment Engine.
///
/// Correctness under concurrent and re-delivered webhooks rests entirely on the backend's uniqueness constraints
/// (`processed_events.event_id` and `orders.provider_session_id`). Every write path that can race is an atomic
/// insert-or-conflict or a guarded `UPDATE ... WHERE status = ...`; there is no in-process lock, and implementations
/// must never substitute a read-then-write for any of these operations.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Attempts to insert a ledger row for the given provider event id. Returns `true` if the row was inserted (the
    /// event is new and the caller now owns processing it), `false` if the id already exists (a duplicate
    /// delivery; the caller must perform no side effects).
    ///
    /// Any failure other than a uniqueness conflict is an error: the engine must not proceed with side effects when
    /// it cannot prove the attempt was recorded.
    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, PaymentGatewayError>;

    /// Records the terminal outcome for a previously recorded event. Must be called exactly once after
    /// [`Self::record_event`] returned `true`.
    async fn finalize_event(
        &self,
        event_id: &str,
        order_id: Option<i64>,
        outcome: EventOutcome,
        error_detail: Option<&str>,
    ) -> Result<(), PaymentGatewayError>;

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, PaymentGatewayError>;

    /// Creates or merges a customer record. Matching precedence is the provider-issued identity first, email second.
    /// A unique-email conflict is resolved internally by updating the email-matched row (attaching the provider
    /// identity); it never surfaces as an error, because customer-identity conflicts must not block payment
    /// processing. Field updates are latest-wins, and a later event carrying less information never clears
    /// known-good data.
    async fn upsert_customer(&self, customer: NewCustomer) -> Result<Customer, PaymentGatewayError>;

    /// Inserts the order, or returns the existing row when `provider_session_id` already exists. The second return
    /// value is `true` when this call created the order. Atomic insert-or-conflict; two concurrent deliveries of
    /// the same session converge on one row.
    async fn insert_or_fetch_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    async fn fetch_order_by_session(&self, session_id: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// Looks up the order whose `Paid` transition recorded the given payment reference.
    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// Writes the pricing snapshot and its line items in one transaction, if and only if the order has no snapshot
    /// yet. A snapshot that is already present is left untouched (orders are re-read, never re-priced). Returns the
    /// current order row either way.
    async fn write_pricing_snapshot(
        &self,
        order_id: i64,
        snapshot: &PricingSnapshot,
    ) -> Result<Order, PaymentGatewayError>;

    /// Attempts the `PendingPayment -> Paid` transition and, in the same transaction, records the payment
    /// reference and enqueues the production job. If the order is already `Paid` the call is a no-op and reports
    /// [`PaidOrderResult::AlreadyPaid`]; the state guard is what makes job emission at-most-once.
    async fn mark_order_paid(
        &self,
        order_id: i64,
        payment_ref: &str,
        event_id: &str,
        job: NewProductionJob,
    ) -> Result<PaidOrderResult, PaymentGatewayError>;

    /// Attempts the `Paid -> Refunded` transition. Returns `None` (with no writes) when the order is not currently
    /// `Paid`.
    async fn mark_order_refunded(&self, order_id: i64, event_id: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// Records the result of the confirmation notification as order metadata. Never affects order or payment state.
    async fn record_notification_result(&self, order_id: i64, status: &str) -> Result<(), PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("No order matches {key} '{value}'")]
    OrderNotFound { key: &'static str, value: String },
    #[error("Could not encode a persisted value. {0}")]
    EncodingError(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PaymentGatewayError {
    fn from(e: serde_json::Error) -> Self {
        PaymentGatewayError::EncodingError(e.to_string())
    }
}
