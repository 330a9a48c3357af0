//! Endpoint tests: the webhook surface wired to a real in-memory engine, exercised through actix's test harness.
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use cpg_common::{Cents, Secret};
use craft_payment_engine::{
    db_types::{EventOutcome, OrderStatusType},
    events::EventProducers,
    pricing::{PriceResolver, PricingCache, PricingConfig},
    sqlite::db,
    EventFlowApi,
    PaymentGatewayDatabase,
    SqliteDatabase,
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::{
    routes::{health, PaymentWebhookRoute},
    signature::{SignatureVerifier, SIGNATURE_HEADER},
};

const TEST_SECRET: &str = "whsec_test";

async fn test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let database = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("could not create in-memory db");
    let mut conn = database.pool().acquire().await.expect("could not acquire a connection");
    db::catalog::upsert_product("prod_coaster", "COAST-4", "Coaster set (4)", Cents::from(1800), &mut conn)
        .await
        .expect("could not seed the catalog");
    let config = PricingConfig {
        version: "2024-05".to_string(),
        variants: HashMap::new(),
        components: HashMap::new(),
        flat_fee: None,
        valid_from: None,
        valid_until: None,
    };
    db::pricing_configs::upsert_config(&config, &mut conn).await.expect("could not seed the pricing config");
    database
}

fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(vec![Secret::new(TEST_SECRET.to_string())], Duration::seconds(300))
}

fn api_for(database: &SqliteDatabase) -> EventFlowApi<SqliteDatabase, SqliteDatabase, SqliteDatabase> {
    let cache =
        Arc::new(PricingCache::new(database.clone(), Duration::seconds(300), StdDuration::from_secs(5)));
    let resolver = PriceResolver::new(database.clone(), cache);
    EventFlowApi::new(database.clone(), resolver, EventProducers::default())
}

macro_rules! test_app {
    ($db:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new(api_for(&$db)))
                .app_data(web::Data::new(verifier()))
                .service(health)
                .service(PaymentWebhookRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new()),
        )
        .await
    }};
}

fn signature_header(body: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_SECRET.as_bytes()).expect("valid hmac key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body.as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn checkout_event(event_id: &str, session_id: &str, payment_ref: &str) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created_at": "2024-05-01T10:00:00Z",
        "data": {
            "session_id": session_id,
            "payment_ref": payment_ref,
            "currency": "USD",
            "customer": { "email": "jo@example.com" },
            "line_items": [
                { "product_id": "prod_coaster", "name": "Coaster set (4)", "quantity": 2 }
            ],
            "created_at": "2024-05-01T09:59:58Z"
        }
    })
    .to_string()
}

#[actix_web::test]
async fn health_check() {
    let database = test_db().await;
    let app = test_app!(database);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn missing_signature_header_is_a_bad_request() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = checkout_event("evt_1", "o_1", "pay_1");
    let req = test::TestRequest::post().uri("/webhook/payment").set_payload(body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn a_bad_signature_is_forbidden_and_has_no_side_effects() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = checkout_event("evt_1", "o_1", "pay_1");
    let header = format!("t={},v1=deadbeef", Utc::now().timestamp());
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 403);
    assert!(database.fetch_processed_event("evt_1").await.unwrap().is_none());
    assert!(database.fetch_order_by_session("o_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn a_stale_signature_is_forbidden() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = checkout_event("evt_1", "o_1", "pay_1");
    let header = signature_header(&body, Utc::now().timestamp() - 3600);
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[actix_web::test]
async fn a_signed_envelope_that_is_not_an_envelope_is_a_bad_request() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = r#"{"hello": "world"}"#.to_string();
    let header = signature_header(&body, Utc::now().timestamp());
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn a_valid_delivery_is_processed_and_a_redelivery_is_acknowledged() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = checkout_event("evt_1", "o_1", "pay_1");
    let header = signature_header(&body, Utc::now().timestamp());
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header.clone()))
        .set_payload(body.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let order = database.fetch_order_by_session("o_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.total, Cents::from(3600));
    // the exact same request again: still a 2xx, still exactly one order
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: crate::data_objects::JsonResponse = test::read_body_json(resp).await;
    assert!(body.success);
    assert!(body.message.contains("Duplicate"));
}

#[actix_web::test]
async fn an_unusable_payload_is_recorded_and_reported_as_a_processing_failure() {
    let database = test_db().await;
    let app = test_app!(database);
    // a known event type whose data is garbage: the ledger claim succeeds before parsing fails
    let body = json!({
        "id": "evt_m",
        "type": "checkout.session.completed",
        "created_at": "2024-05-01T10:00:00Z",
        "data": { "nope": true }
    })
    .to_string();
    let header = signature_header(&body, Utc::now().timestamp());
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
    let ledger = database.fetch_processed_event("evt_m").await.unwrap().unwrap();
    assert_eq!(ledger.outcome, Some(EventOutcome::Failed));
}

#[actix_web::test]
async fn an_unpriceable_order_asks_for_redelivery() {
    let database = test_db().await;
    let app = test_app!(database);
    let body = json!({
        "id": "evt_bad",
        "type": "checkout.session.completed",
        "created_at": "2024-05-01T10:00:00Z",
        "data": {
            "session_id": "o_bad",
            "payment_ref": "pay_bad",
            "currency": "USD",
            "customer": { "email": "jo@example.com" },
            "line_items": [
                { "product_id": "prod_ghost", "name": "Phantom item", "quantity": 1 }
            ],
            "created_at": "2024-05-01T09:59:58Z"
        }
    })
    .to_string();
    let header = signature_header(&body, Utc::now().timestamp());
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
}
