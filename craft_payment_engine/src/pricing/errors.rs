use thiserror::Error;

/// Failure modes of price resolution. Each variant carries the attempted keys and computed values needed to diagnose
/// the failure without re-running the request, and none of them ever degrades to a default price.
#[derive(Debug, Clone, Error)]
pub enum PriceResolutionError {
    #[error("Configured item '{name}' (variant '{variant}') priced to a non-positive amount: {computed} cents")]
    ConfiguratorPriceInvalid { name: String, variant: String, computed: i64 },
    #[error("No pricing rules exist for variant '{variant}' (config version {config_version})")]
    VariantNotFound { variant: String, config_version: String },
    #[error("Catalog product matched by '{matched_key}' has a zero price; zero is misconfiguration, not 'free'")]
    ProductPriceZero { matched_key: String },
    #[error("No catalog product matches primary id {product_id:?} or sku {sku:?}")]
    ProductNotFound { product_id: Option<String>, sku: Option<String> },
    #[error("Line item '{name}' has a non-positive quantity: {quantity}")]
    InvalidQuantity { name: String, quantity: i64 },
    #[error("Line item '{name}' carries neither a configuration nor a catalog key and cannot be priced")]
    UnpriceableItem { name: String },
    #[error("The order contains no line items")]
    EmptyOrder,
    #[error("The pricing configuration could not be fetched. {0}")]
    ConfigUnavailable(String),
    #[error("Catalog lookup failed. {0}")]
    CatalogUnavailable(String),
}
