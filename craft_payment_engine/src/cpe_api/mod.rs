//! The public API of the payment engine. [`event_flow_api::EventFlowApi`] carries a verified webhook event through
//! the ledger, customer reconciliation, pricing, the order state machine and job emission, in that order.
pub mod errors;
pub mod event_flow_api;

pub use errors::EventFlowError;
pub use event_flow_api::{EventDisposition, EventFlowApi};
