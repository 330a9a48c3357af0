use thiserror::Error;

use crate::db_types::CatalogProduct;

/// Read-only access to the product store. Lookup is by primary identifier first, with sku as the secondary natural
/// key; the resolver owns that fallback order.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog: Clone + Send + Sync {
    async fn product_by_id(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError>;

    async fn product_by_sku(&self, sku: &str) -> Result<Option<CatalogProduct>, CatalogError>;
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog lookup failed. {0}")]
    LookupFailed(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::LookupFailed(e.to_string())
    }
}
