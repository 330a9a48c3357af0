use crate::db_types::{Customer, Order, ProductionJob};

/// Emitted after the `Paid` transition and its production job have been committed. Subscribers (e.g. the
/// notification dispatcher) run outside the transaction; whatever they do cannot roll the order back.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub customer: Option<Customer>,
    pub job: ProductionJob,
}

impl OrderPaidEvent {
    pub fn new(order: Order, customer: Option<Customer>, job: ProductionJob) -> Self {
        Self { order, customer, job }
    }
}

/// Emitted after a refund event has moved an order to `Refunded`.
#[derive(Debug, Clone)]
pub struct OrderRefundedEvent {
    pub order: Order,
}

impl OrderRefundedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
