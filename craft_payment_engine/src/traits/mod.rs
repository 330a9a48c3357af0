//! The trait seams between the engine and its collaborators: the read-write order/customer/event store, the
//! read-only product catalog and the read-only pricing-configuration source. Specific backends (the bundled SQLite
//! implementation, or an external store) implement these to act as a backend for the Craft Payment Server.

mod catalog;
mod data_objects;
mod payment_gateway_database;
mod pricing_source;

pub use catalog::{CatalogError, ProductCatalog};
pub use data_objects::{NewProductionJob, PaidOrderResult, ProductionJobPayload, DEFAULT_JOB_PRIORITY};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use pricing_source::{PricingSource, PricingSourceError};
