use chrono::Utc;
use log::{debug, error};
use sqlx::SqlitePool;

use crate::{
    db_types::{CatalogProduct, Customer, EventOutcome, NewCustomer, NewOrder, Order, OrderItem, ProcessedEvent},
    pricing::{PricingConfig, PricingSnapshot},
    sqlite::db,
    traits::{
        CatalogError,
        NewProductionJob,
        PaidOrderResult,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PricingSource,
        PricingSourceError,
        ProductCatalog,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").field("url", &self.url).finish()
    }
}

impl SqliteDatabase {
    /// Connects to the database at `url`, creating the schema if needed.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = db::new_pool(url, max_connections).await?;
        db::run_migrations(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Connects using `CPG_DATABASE_URL`, falling back to the default path.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::events::try_record_event(event_id, event_type, &mut conn).await
    }

    async fn finalize_event(
        &self,
        event_id: &str,
        order_id: Option<i64>,
        outcome: EventOutcome,
        error_detail: Option<&str>,
    ) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::events::finalize_event(event_id, order_id, outcome, error_detail, &mut conn).await
    }

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::events::fetch_event(event_id, &mut conn).await
    }

    async fn upsert_customer(&self, customer: NewCustomer) -> Result<Customer, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::customers::upsert_customer(customer, &mut conn).await
    }

    async fn insert_or_fetch_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::idempotent_insert(order, &mut conn).await
    }

    async fn fetch_order_by_session(&self, session_id: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order_by_session(session_id, &mut conn).await
    }

    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order_by_payment_ref(payment_ref, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn write_pricing_snapshot(
        &self,
        order_id: i64,
        snapshot: &PricingSnapshot,
    ) -> Result<Order, PaymentGatewayError> {
        let snapshot_json = serde_json::to_string(snapshot)?;
        let mut tx = self.pool.begin().await?;
        let written =
            db::orders::write_snapshot_guarded(order_id, &snapshot_json, snapshot.subtotal, snapshot.total, &mut tx)
                .await?;
        if written {
            db::orders::insert_order_items(order_id, &snapshot.items, &mut tx).await?;
            debug!("🗃️ Pricing snapshot written for order id {order_id} ({} item(s))", snapshot.items.len());
        } else {
            debug!("🗃️ Order id {order_id} already has a pricing snapshot. Leaving it untouched.");
        }
        let order = db::orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_paid(
        &self,
        order_id: i64,
        payment_ref: &str,
        event_id: &str,
        job: NewProductionJob,
    ) -> Result<PaidOrderResult, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        match db::orders::mark_paid(order_id, payment_ref, event_id, &mut tx).await? {
            Some(order) => {
                let payload = serde_json::to_string(&job.payload)?;
                let job = db::jobs::insert_job(order_id, job.priority, &payload, &mut tx).await?;
                tx.commit().await?;
                debug!("🗃️ Order {} is now Paid. Production job {} travels with it.", order.order_number, job.id);
                Ok(PaidOrderResult::Paid { order, job })
            },
            None => {
                // Nothing was written; the order has left PendingPayment already.
                tx.commit().await?;
                let mut conn = self.pool.acquire().await?;
                let order = db::orders::fetch_order_by_id(order_id, &mut conn)
                    .await?
                    .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
                debug!("🗃️ Order {} is already {}. No transition performed.", order.order_number, order.status);
                Ok(PaidOrderResult::AlreadyPaid(order))
            },
        }
    }

    async fn mark_order_refunded(&self, order_id: i64, event_id: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::mark_refunded(order_id, event_id, &mut conn).await
    }

    async fn record_notification_result(&self, order_id: i64, status: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_confirmation_status(order_id, status, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn product_by_id(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        db::catalog::product_by_id(product_id, &mut conn).await.map_err(|e| CatalogError::LookupFailed(e.to_string()))
    }

    async fn product_by_sku(&self, sku: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        db::catalog::product_by_sku(sku, &mut conn).await.map_err(|e| CatalogError::LookupFailed(e.to_string()))
    }
}

impl PricingSource for SqliteDatabase {
    async fn fetch_active_config(&self) -> Result<PricingConfig, PricingSourceError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            error!("🗃️ Could not acquire a connection for the pricing-config fetch. {e}");
            PricingSourceError::FetchFailed(e.to_string())
        })?;
        let config = db::pricing_configs::fetch_active_config(Utc::now(), &mut conn).await?;
        config.ok_or(PricingSourceError::NoActiveConfig)
    }
}
