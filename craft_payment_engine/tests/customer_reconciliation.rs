//! Customer identity reconciliation: provider-id first, email second, latest-wins merges that never clear
//! known-good fields, and silent resolution of unique-email conflicts.
mod support;

use craft_payment_engine::{db_types::NewCustomer, sqlite::db, PaymentGatewayDatabase};
use support::*;

fn customer(provider_id: Option<&str>, email: Option<&str>, name: Option<&str>, phone: Option<&str>) -> NewCustomer {
    NewCustomer {
        provider_customer_id: provider_id.map(String::from),
        email: email.map(String::from),
        name: name.map(String::from),
        phone: phone.map(String::from),
        shipping_address: None,
        billing_address: None,
    }
}

#[tokio::test]
async fn provider_id_matches_merge_into_one_record() {
    let (db, _api) = new_test_api().await;
    let first = db.upsert_customer(customer(Some("cus_9"), Some("ana@example.com"), Some("Ana"), None)).await.unwrap();
    let second = db.upsert_customer(customer(Some("cus_9"), None, None, Some("555-0100"))).await.unwrap();
    assert_eq!(first.id, second.id);
    // the sparser second event set the phone but did not clear the email or name
    assert_eq!(second.email.as_deref(), Some("ana@example.com"));
    assert_eq!(second.name.as_deref(), Some("Ana"));
    assert_eq!(second.phone.as_deref(), Some("555-0100"));
}

#[tokio::test]
async fn newer_values_win_without_clearing_missing_ones() {
    let (db, _api) = new_test_api().await;
    let first = db.upsert_customer(customer(Some("cus_9"), Some("ana@example.com"), Some("Ana"), None)).await.unwrap();
    let second = db.upsert_customer(customer(Some("cus_9"), None, Some("Ana Carver"), None)).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.name.as_deref(), Some("Ana Carver"));
    assert_eq!(second.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn email_only_events_match_by_email() {
    let (db, _api) = new_test_api().await;
    let first = db.upsert_customer(customer(None, Some("ben@example.com"), None, None)).await.unwrap();
    let second = db.upsert_customer(customer(None, Some("ben@example.com"), Some("Ben"), None)).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.name.as_deref(), Some("Ben"));
}

#[tokio::test]
async fn provider_identity_attaches_to_an_existing_email_row() {
    let (db, _api) = new_test_api().await;
    // the guest checkout came first, so the row has an email but no provider identity
    let guest = db.upsert_customer(customer(None, Some("cara@example.com"), Some("Cara"), None)).await.unwrap();
    assert!(guest.provider_customer_id.is_none());
    // a later event carries both keys; the email's unique constraint forces the merge path
    let merged =
        db.upsert_customer(customer(Some("cus_77"), Some("cara@example.com"), None, Some("555-0177"))).await.unwrap();
    assert_eq!(merged.id, guest.id);
    assert_eq!(merged.provider_customer_id.as_deref(), Some("cus_77"));
    assert_eq!(merged.name.as_deref(), Some("Cara"));
    assert_eq!(merged.phone.as_deref(), Some("555-0177"));
}

#[tokio::test]
async fn keys_matching_two_different_rows_resolve_to_the_provider_row() {
    let (db, _api) = new_test_api().await;
    let provider_row =
        db.upsert_customer(customer(Some("cus_x"), Some("dee@example.com"), Some("Dee"), None)).await.unwrap();
    let email_row = db.upsert_customer(customer(None, Some("dee@shop.example.com"), None, None)).await.unwrap();
    // one event now matches both rows at once: the provider id belongs to the first, the email to the second.
    // The upsert must resolve this, not fail the checkout.
    let resolved = db
        .upsert_customer(customer(Some("cus_x"), Some("dee@shop.example.com"), None, Some("555-0199")))
        .await
        .unwrap();
    assert_eq!(resolved.id, provider_row.id);
    assert_eq!(resolved.phone.as_deref(), Some("555-0199"));
    assert_eq!(resolved.name.as_deref(), Some("Dee"));
    // neither row gives up its email; the contested address stays on the row that held it
    assert_eq!(resolved.email.as_deref(), Some("dee@example.com"));
    let mut conn = db.pool().acquire().await.unwrap();
    let other = db::customers::fetch_customer_by_id(email_row.id, &mut conn).await.unwrap().unwrap();
    assert_eq!(other.email.as_deref(), Some("dee@shop.example.com"));
    assert!(other.provider_customer_id.is_none());
}

#[tokio::test]
async fn distinct_identities_create_distinct_records() {
    let (db, _api) = new_test_api().await;
    let a = db.upsert_customer(customer(Some("cus_a"), Some("a@example.com"), None, None)).await.unwrap();
    let b = db.upsert_customer(customer(Some("cus_b"), Some("b@example.com"), None, None)).await.unwrap();
    assert_ne!(a.id, b.id);
}
