//! Catalog reads for standard (non-configured) products. The engine treats the catalog as read-only;
//! [`upsert_product`] exists for store administration and test seeding.
use cpg_common::Cents;
use sqlx::SqliteConnection;

use crate::{db_types::CatalogProduct, traits::PaymentGatewayError};

pub async fn product_by_id(
    product_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CatalogProduct>, PaymentGatewayError> {
    let product = sqlx::query_as::<_, CatalogProduct>("SELECT * FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn product_by_sku(
    sku: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CatalogProduct>, PaymentGatewayError> {
    let product = sqlx::query_as::<_, CatalogProduct>("SELECT * FROM products WHERE sku = $1")
        .bind(sku)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn upsert_product(
    product_id: &str,
    sku: &str,
    name: &str,
    unit_price: Cents,
    conn: &mut SqliteConnection,
) -> Result<CatalogProduct, PaymentGatewayError> {
    let product = sqlx::query_as::<_, CatalogProduct>(
        r#"INSERT INTO products (product_id, sku, name, unit_price) VALUES ($1, $2, $3, $4)
           ON CONFLICT (product_id) DO UPDATE SET sku = excluded.sku, name = excluded.name,
               unit_price = excluded.unit_price
           RETURNING *"#,
    )
    .bind(product_id)
    .bind(sku)
    .bind(name)
    .bind(unit_price)
    .fetch_one(conn)
    .await?;
    Ok(product)
}
