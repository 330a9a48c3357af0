use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Customer, Order, OrderNumber, ProductionJob},
    pricing::PricingSnapshot,
};

pub const DEFAULT_JOB_PRIORITY: i64 = 100;

//--------------------------------------  NewProductionJob  ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewProductionJob {
    pub priority: i64,
    pub payload: ProductionJobPayload,
}

/// The denormalized fulfillment payload. Everything the production floor needs travels with the job; it never reads
/// back through the order tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionJobPayload {
    pub order_number: OrderNumber,
    pub currency: String,
    pub customer: Option<Customer>,
    pub shipping_address: Option<serde_json::Value>,
    pub pricing: PricingSnapshot,
}

//--------------------------------------  PaidOrderResult  -----------------------------------------------------------
/// Result of attempting the `PendingPayment -> Paid` transition.
#[derive(Debug, Clone)]
pub enum PaidOrderResult {
    /// The transition happened in this call; exactly one production job was created with it.
    Paid { order: Order, job: ProductionJob },
    /// The order was already `Paid` (a re-delivered or racing event). No writes were performed.
    AlreadyPaid(Order),
}
