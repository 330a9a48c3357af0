use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::ProductionJob, traits::PaymentGatewayError};

/// Inserts a production job. Callers run this in the same transaction as the order's `Paid` transition; the state
/// guard on that transition is what keeps this at-most-once per order.
pub async fn insert_job(
    order_id: i64,
    priority: i64,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<ProductionJob, PaymentGatewayError> {
    let job = sqlx::query_as::<_, ProductionJob>(
        "INSERT INTO production_jobs (order_id, priority, payload) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(order_id)
    .bind(priority)
    .bind(payload)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Production job {} queued for order id {order_id} at priority {priority}", job.id);
    Ok(job)
}

pub async fn fetch_job_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductionJob>, PaymentGatewayError> {
    let job = sqlx::query_as::<_, ProductionJob>("SELECT * FROM production_jobs WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(job)
}
