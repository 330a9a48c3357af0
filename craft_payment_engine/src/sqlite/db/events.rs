//! The processed-event ledger. The `event_id` uniqueness constraint on this table IS the deduplication mechanism;
//! everything else in the engine relies on [`try_record_event`] returning an honest answer.
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{EventOutcome, ProcessedEvent},
    traits::PaymentGatewayError,
};

/// Tries to claim a provider event id by inserting a ledger row. Returns `true` when this call inserted the row,
/// `false` when the id was already present. `INSERT .. ON CONFLICT DO NOTHING` makes the claim atomic; concurrent
/// deliveries of the same event race on the constraint and exactly one of them wins.
pub async fn try_record_event(
    event_id: &str,
    event_type: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let res = sqlx::query(
        r#"INSERT INTO processed_events (event_id, event_type) VALUES ($1, $2)
           ON CONFLICT (event_id) DO NOTHING"#,
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?;
    let inserted = res.rows_affected() > 0;
    if !inserted {
        debug!("🗃️ Event [{event_id}] is already in the ledger. Not claiming it.");
    }
    Ok(inserted)
}

/// Stamps the terminal outcome onto a claimed ledger row.
pub async fn finalize_event(
    event_id: &str,
    order_id: Option<i64>,
    outcome: EventOutcome,
    error_detail: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    let res = sqlx::query(
        r#"UPDATE processed_events
           SET order_id = $2, outcome = $3, error_detail = $4, processed_at = CURRENT_TIMESTAMP
           WHERE event_id = $1"#,
    )
    .bind(event_id)
    .bind(order_id)
    .bind(outcome)
    .bind(error_detail)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(PaymentGatewayError::DatabaseError(format!(
            "Tried to finalize event [{event_id}], but it was never recorded"
        )));
    }
    debug!("🗃️ Event [{event_id}] finalized with outcome {outcome}");
    Ok(())
}

pub async fn fetch_event(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ProcessedEvent>, PaymentGatewayError> {
    let event = sqlx::query_as::<_, ProcessedEvent>("SELECT * FROM processed_events WHERE event_id = $1")
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}
