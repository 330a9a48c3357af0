use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, NewCustomer},
    traits::PaymentGatewayError,
};

/// Creates or merges a customer record. The provider-issued id is the primary reconciliation key; email is the
/// secondary one. Merging is latest-wins per field, with `COALESCE(excluded.col, customers.col)` ensuring that a
/// later event carrying less information never clears known-good data.
pub async fn upsert_customer(
    customer: NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, PaymentGatewayError> {
    match (&customer.provider_customer_id, &customer.email) {
        (Some(_), _) => upsert_by_provider_id(&customer, conn).await,
        (None, Some(_)) => upsert_by_email(&customer, conn).await,
        (None, None) => insert_anonymous(&customer, conn).await,
    }
}

async fn upsert_by_provider_id(
    customer: &NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, PaymentGatewayError> {
    let res = sqlx::query_as::<_, Customer>(
        r#"INSERT INTO customers (provider_customer_id, email, name, phone, shipping_address, billing_address)
           VALUES ($1, $2, $3, $4, $5, $6)
           ON CONFLICT (provider_customer_id) DO UPDATE SET
               email = COALESCE(excluded.email, customers.email),
               name = COALESCE(excluded.name, customers.name),
               phone = COALESCE(excluded.phone, customers.phone),
               shipping_address = COALESCE(excluded.shipping_address, customers.shipping_address),
               billing_address = COALESCE(excluded.billing_address, customers.billing_address),
               updated_at = CURRENT_TIMESTAMP
           RETURNING *"#,
    )
    .bind(&customer.provider_customer_id)
    .bind(&customer.email)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.shipping_address)
    .bind(&customer.billing_address)
    .fetch_one(&mut *conn)
    .await;
    match res {
        Ok(c) => Ok(c),
        // The ON CONFLICT clause absorbs a provider-id conflict, so a unique violation here means the email already
        // belongs to a different row. Attach the provider id to that row instead; identity conflicts must not block
        // payment processing.
        Err(e) if is_unique_violation(&e) => {
            let Some(email) = customer.email.as_deref() else {
                return Err(e.into());
            };
            warn!("🗃️ Customer email [{email}] exists under a different provider identity. Merging by email.");
            let merged = sqlx::query_as::<_, Customer>(
                r#"UPDATE customers SET
                       provider_customer_id = $1,
                       name = COALESCE($3, name),
                       phone = COALESCE($4, phone),
                       shipping_address = COALESCE($5, shipping_address),
                       billing_address = COALESCE($6, billing_address),
                       updated_at = CURRENT_TIMESTAMP
                   WHERE email = $2
                   RETURNING *"#,
            )
            .bind(&customer.provider_customer_id)
            .bind(email)
            .bind(&customer.name)
            .bind(&customer.phone)
            .bind(&customer.shipping_address)
            .bind(&customer.billing_address)
            .fetch_one(&mut *conn)
            .await;
            match merged {
                Ok(c) => Ok(c),
                // The provider id and the email each match a *different* row, so attaching the id to the email row
                // would duplicate it. The provider id is the primary key of record: update its row and leave each
                // row's email where it is.
                Err(e) if is_unique_violation(&e) => {
                    warn!(
                        "🗃️ Provider identity and email [{email}] belong to two different customer records. \
                         Updating the provider-identity record and keeping both emails."
                    );
                    update_provider_row(customer, conn).await
                },
                Err(e) => Err(e.into()),
            }
        },
        Err(e) => Err(e.into()),
    }
}

/// Last-resort merge target when an event's provider id and email point at two distinct rows: the provider-id row
/// takes the event's contact fields, except the contested email.
async fn update_provider_row(
    customer: &NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, PaymentGatewayError> {
    let c = sqlx::query_as::<_, Customer>(
        r#"UPDATE customers SET
               name = COALESCE($2, name),
               phone = COALESCE($3, phone),
               shipping_address = COALESCE($4, shipping_address),
               billing_address = COALESCE($5, billing_address),
               updated_at = CURRENT_TIMESTAMP
           WHERE provider_customer_id = $1
           RETURNING *"#,
    )
    .bind(&customer.provider_customer_id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.shipping_address)
    .bind(&customer.billing_address)
    .fetch_one(conn)
    .await?;
    Ok(c)
}

async fn upsert_by_email(
    customer: &NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, PaymentGatewayError> {
    let c = sqlx::query_as::<_, Customer>(
        r#"INSERT INTO customers (email, name, phone, shipping_address, billing_address)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (email) DO UPDATE SET
               name = COALESCE(excluded.name, customers.name),
               phone = COALESCE(excluded.phone, customers.phone),
               shipping_address = COALESCE(excluded.shipping_address, customers.shipping_address),
               billing_address = COALESCE(excluded.billing_address, customers.billing_address),
               updated_at = CURRENT_TIMESTAMP
           RETURNING *"#,
    )
    .bind(&customer.email)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.shipping_address)
    .bind(&customer.billing_address)
    .fetch_one(conn)
    .await?;
    Ok(c)
}

async fn insert_anonymous(
    customer: &NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, PaymentGatewayError> {
    debug!("🗃️ Checkout carried no customer identity. Creating an anonymous customer record.");
    let c = sqlx::query_as::<_, Customer>(
        r#"INSERT INTO customers (name, phone, shipping_address, billing_address)
           VALUES ($1, $2, $3, $4) RETURNING *"#,
    )
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.shipping_address)
    .bind(&customer.billing_address)
    .fetch_one(conn)
    .await?;
    Ok(c)
}

pub async fn fetch_customer_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Customer>, PaymentGatewayError> {
    let c = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(c)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(de) if de.is_unique_violation())
}
