//! Inbound payment-provider event payloads.
//!
//! The wire format is a signed JSON envelope carrying an event id, an event type string and an event-specific
//! `data` object. Event-type dispatch is a closed enum: adding a new handled type is a compiler-enforced decision,
//! and unhandled types are still recorded in the ledger rather than dropped.

use chrono::{DateTime, Utc};
use cpg_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::ProductConfiguration;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const REFUND_COMPLETED: &str = "charge.refunded";

//--------------------------------------  WebhookEnvelope  -----------------------------------------------------------
/// The outer, signature-verified event envelope. `id` is the provider's globally unique event id and is the ledger
/// dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Error)]
#[error("Malformed '{event_type}' payload. {reason}")]
pub struct PayloadError {
    pub event_type: String,
    pub reason: String,
}

impl WebhookEnvelope {
    /// Maps the envelope onto the closed set of events this engine understands. Types outside that set come back as
    /// [`ProviderEvent::Unhandled`] so the caller can record them.
    pub fn classify(&self) -> Result<ProviderEvent, PayloadError> {
        match self.event_type.as_str() {
            CHECKOUT_COMPLETED => serde_json::from_value::<CheckoutSession>(self.data.clone())
                .map(ProviderEvent::CheckoutCompleted)
                .map_err(|e| PayloadError { event_type: self.event_type.clone(), reason: e.to_string() }),
            REFUND_COMPLETED => serde_json::from_value::<RefundNotice>(self.data.clone())
                .map(ProviderEvent::RefundCompleted)
                .map_err(|e| PayloadError { event_type: self.event_type.clone(), reason: e.to_string() }),
            other => Ok(ProviderEvent::Unhandled { event_type: other.to_string() }),
        }
    }
}

//--------------------------------------   ProviderEvent   -----------------------------------------------------------
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    CheckoutCompleted(CheckoutSession),
    RefundCompleted(RefundNotice),
    Unhandled { event_type: String },
}

//--------------------------------------  CheckoutSession  -----------------------------------------------------------
/// The `data` object of a `checkout.session.completed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// The provider's session id. Orders are upserted against this key.
    pub session_id: String,
    /// The payment reference (charge/intent id) recorded at the `Paid` transition.
    pub payment_ref: String,
    /// Storefront order number, when the upstream checkout flow assigned one.
    #[serde(default)]
    pub order_number: Option<String>,
    pub currency: String,
    /// The provider's view of the total. Informational only; the engine always prices from its own rules.
    #[serde(default)]
    pub amount_total: Option<Cents>,
    #[serde(default)]
    pub shipping: Option<Cents>,
    #[serde(default)]
    pub tax: Option<Cents>,
    pub customer: CustomerDetails,
    #[serde(default)]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default)]
    pub billing_address: Option<serde_json::Value>,
    pub line_items: Vec<SessionLineItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub provider_customer_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    /// Present for configured products; absent for standard catalog items.
    #[serde(default)]
    pub configuration: Option<ProductConfiguration>,
}

//--------------------------------------    RefundNotice   -----------------------------------------------------------
/// The `data` object of a `charge.refunded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundNotice {
    /// Matched against the payment reference recorded when the order was marked paid.
    pub payment_ref: String,
    #[serde(default)]
    pub amount: Option<Cents>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_checkout_completed() {
        let envelope: WebhookEnvelope = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created_at": "2024-05-01T10:00:00Z",
            "data": {
                "session_id": "cs_1",
                "payment_ref": "pay_1",
                "currency": "USD",
                "customer": { "email": "jo@example.com" },
                "line_items": [{ "sku": "MUG-01", "name": "Mug", "quantity": 2 }],
                "created_at": "2024-05-01T09:59:58Z"
            }
        }))
        .unwrap();
        match envelope.classify().unwrap() {
            ProviderEvent::CheckoutCompleted(s) => {
                assert_eq!(s.session_id, "cs_1");
                assert_eq!(s.line_items.len(), 1);
            },
            other => panic!("expected CheckoutCompleted, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_unhandled_not_an_error() {
        let envelope: WebhookEnvelope = serde_json::from_value(serde_json::json!({
            "id": "evt_2",
            "type": "invoice.finalized",
            "created_at": "2024-05-01T10:00:00Z",
            "data": {}
        }))
        .unwrap();
        match envelope.classify().unwrap() {
            ProviderEvent::Unhandled { event_type } => assert_eq!(event_type, "invoice.finalized"),
            other => panic!("expected Unhandled, got {other:?}"),
        }
    }

    #[test]
    fn malformed_known_payload_is_an_error() {
        let envelope: WebhookEnvelope = serde_json::from_value(serde_json::json!({
            "id": "evt_3",
            "type": "charge.refunded",
            "created_at": "2024-05-01T10:00:00Z",
            "data": { "amount": 100 }
        }))
        .unwrap();
        let err = envelope.classify().unwrap_err();
        assert_eq!(err.event_type, "charge.refunded");
    }
}
