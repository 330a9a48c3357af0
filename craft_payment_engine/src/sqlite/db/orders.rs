use cpg_common::Cents;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderItem},
    pricing::SnapshotItem,
    traits::PaymentGatewayError,
};

/// Inserts the order, deferring to the existing row when the provider session id is already present. The boolean in
/// the result is `true` when this call created the order.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let res = sqlx::query(
        r#"INSERT INTO orders (
               order_number, provider_session_id, customer_id, currency, shipping, tax,
               shipping_address, billing_address, created_at
           ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           ON CONFLICT (provider_session_id) DO NOTHING"#,
    )
    .bind(&order.order_number)
    .bind(&order.provider_session_id)
    .bind(order.customer_id)
    .bind(&order.currency)
    .bind(order.shipping)
    .bind(order.tax)
    .bind(&order.shipping_address)
    .bind(&order.billing_address)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    let inserted = res.rows_affected() > 0;
    if inserted {
        debug!("🗃️ Order {} created for session [{}]", order.order_number, order.provider_session_id);
    } else {
        debug!("🗃️ Session [{}] already has an order. Using the existing row.", order.provider_session_id);
    }
    let row = fetch_order_by_session(&order.provider_session_id, conn).await?.ok_or_else(|| {
        PaymentGatewayError::OrderNotFound {
            key: "provider_session_id",
            value: order.provider_session_id.clone(),
        }
    })?;
    Ok((row, inserted))
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentGatewayError> {
    let order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_session(
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE provider_session_id = $1")
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_ref(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_ref = $1")
        .bind(payment_ref)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, PaymentGatewayError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Writes the snapshot column and totals, but only when no snapshot exists yet. Returns `true` when the write
/// happened. The `pricing_snapshot IS NULL` guard is what makes the snapshot immutable under re-delivery.
pub async fn write_snapshot_guarded(
    order_id: i64,
    snapshot_json: &str,
    subtotal: Cents,
    total: Cents,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let res = sqlx::query(
        r#"UPDATE orders
           SET pricing_snapshot = $2, subtotal = $3, total = $4, updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND pricing_snapshot IS NULL"#,
    )
    .bind(order_id)
    .bind(snapshot_json)
    .bind(subtotal)
    .bind(total)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Inserts the priced line items belonging to a freshly written snapshot. Caller is responsible for running this in
/// the same transaction as [`write_snapshot_guarded`].
pub async fn insert_order_items(
    order_id: i64,
    items: &[SnapshotItem],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    for item in items {
        let configuration = item.configuration.as_ref().map(serde_json::to_string).transpose()?;
        let breakdown = item.breakdown.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"INSERT INTO order_items (order_id, sku, name, quantity, unit_price, line_total, configuration,
               price_breakdown) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(order_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_amount)
        .bind(item.line_total)
        .bind(configuration)
        .bind(breakdown)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// The `PendingPayment -> Paid` transition. The `WHERE status = 'PendingPayment'` guard makes this at-most-once: a
/// second caller gets zero rows back, not a second transition.
pub async fn mark_paid(
    order_id: i64,
    payment_ref: &str,
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as::<_, Order>(
        r#"UPDATE orders
           SET status = 'Paid', payment_ref = $2, provider_event_id = $3, updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'PendingPayment'
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(payment_ref)
    .bind(event_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The `Paid -> Refunded` transition, guarded the same way as [`mark_paid`].
pub async fn mark_refunded(
    order_id: i64,
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as::<_, Order>(
        r#"UPDATE orders
           SET status = 'Refunded', provider_event_id = $2, updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Paid'
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(event_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Notification outcome is metadata; no state guard applies.
pub async fn set_confirmation_status(
    order_id: i64,
    status: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query("UPDATE orders SET confirmation_status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(order_id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}
