//! Craft Payment Engine
//!
//! The Craft Payment Engine is the core of the Craft order-fulfillment pipeline. It receives payment-provider
//! webhook events, deduplicates them against a durable event ledger, reconciles customer identities, resolves a
//! trustworthy price for every order, advances orders through their payment lifecycle and emits production jobs for
//! the fulfillment queue. It is provider-agnostic and HTTP-agnostic; the server crate owns the wire surface.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly.
//!    Instead, use the public API provided by the engine. The exception is the data types used in the database,
//!    which are defined in the `db_types` module and are public.
//! 2. Price resolution ([`mod@pricing`]). A deterministic, auditable mapping from an order's line items to amounts
//!    in minor currency units, backed by a TTL-cached pricing configuration.
//! 3. The engine public API ([`mod@cpe_api`]). [`EventFlowApi`] is the single entry point for processing a
//!    verified webhook event end to end. Backends implement the traits in [`mod@traits`].
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted after money-affecting
//! state has been committed. For example, when an order is confirmed paid, an `OrderPaidEvent` is emitted; the
//! notification dispatcher hangs off this hook so that its failures can never roll back order state.

pub mod cpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pricing;
pub mod provider_types;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use cpe_api::{errors::EventFlowError, event_flow_api::{EventDisposition, EventFlowApi}};
pub use traits::{PaymentGatewayDatabase, PaymentGatewayError, PricingSource, ProductCatalog};
