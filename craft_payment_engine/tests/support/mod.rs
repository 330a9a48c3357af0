#![allow(dead_code)]
//! Shared scaffolding for the engine integration tests: an in-memory database seeded with a small catalog and one
//! pricing-config version, plus builders for provider event envelopes.
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use chrono::Duration;
use cpg_common::Cents;
use craft_payment_engine::{
    events::EventProducers,
    pricing::{PriceResolver, PricingCache, PricingConfig},
    provider_types::WebhookEnvelope,
    sqlite::db,
    EventFlowApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

pub type TestApi = EventFlowApi<SqliteDatabase, SqliteDatabase, SqliteDatabase>;

pub async fn new_test_api() -> (SqliteDatabase, TestApi) {
    let _ = dotenvy::dotenv();
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("could not create in-memory db");
    seed(&db).await;
    let cache = Arc::new(PricingCache::new(db.clone(), Duration::seconds(300), StdDuration::from_secs(5)));
    let resolver = PriceResolver::new(db.clone(), cache);
    let api = EventFlowApi::new(db.clone(), resolver, EventProducers::default());
    (db, api)
}

async fn seed(db: &SqliteDatabase) {
    let mut conn = db.pool().acquire().await.expect("could not acquire a connection");
    db::catalog::upsert_product("prod_coaster", "COAST-4", "Coaster set (4)", Cents::from(1800), &mut conn)
        .await
        .expect("could not seed the catalog");
    db::catalog::upsert_product("prod_board", "BOARD-M", "Serving board", Cents::from(5490), &mut conn)
        .await
        .expect("could not seed the catalog");
    let mut variants = HashMap::new();
    variants.insert("desk_standard".to_string(), Cents::from(45000));
    let mut finish = HashMap::new();
    finish.insert("walnut".to_string(), Cents::from(8000));
    finish.insert("oak".to_string(), Cents::from(5000));
    let mut components = HashMap::new();
    components.insert("finish".to_string(), finish);
    let config = PricingConfig {
        version: "2024-05".to_string(),
        variants,
        components,
        flat_fee: Some(Cents::from(1500)),
        valid_from: None,
        valid_until: None,
    };
    db::pricing_configs::upsert_config(&config, &mut conn).await.expect("could not seed the pricing config");
}

pub fn envelope(event_id: &str, event_type: &str, data: Value) -> WebhookEnvelope {
    WebhookEnvelope {
        id: event_id.to_string(),
        event_type: event_type.to_string(),
        created_at: "2024-05-01T10:00:00Z".parse().expect("valid timestamp"),
        data,
    }
}

/// A checkout session with three coaster sets: 3 x 1800 + 500 shipping + 90 tax = 5990.
pub fn checkout_data(session_id: &str, payment_ref: &str) -> Value {
    json!({
        "session_id": session_id,
        "payment_ref": payment_ref,
        "currency": "USD",
        "amount_total": 5990,
        "shipping": 500,
        "tax": 90,
        "customer": { "provider_customer_id": "cus_1", "email": "jo@example.com", "name": "Jo Carver" },
        "line_items": [
            { "product_id": "prod_coaster", "sku": "COAST-4", "name": "Coaster set (4)", "quantity": 3 }
        ],
        "created_at": "2024-05-01T09:59:58Z"
    })
}

/// A checkout session with a single configured desk. Pricing comes from the seeded config version.
pub fn configured_checkout_data(session_id: &str, payment_ref: &str, finish: &str) -> Value {
    json!({
        "session_id": session_id,
        "payment_ref": payment_ref,
        "currency": "USD",
        "customer": { "email": "jo@example.com" },
        "line_items": [
            {
                "sku": "DESK-CFG",
                "name": "Custom desk",
                "quantity": 1,
                "configuration": { "variant": "desk_standard", "selections": { "finish": finish } }
            }
        ],
        "created_at": "2024-05-01T09:59:58Z"
    })
}

pub fn refund_data(payment_ref: &str) -> Value {
    json!({ "payment_ref": payment_ref, "amount": 5990, "reason": "requested_by_customer" })
}

pub async fn job_count(db: &SqliteDatabase, order_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM production_jobs WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(db.pool())
        .await
        .expect("could not count jobs")
}
