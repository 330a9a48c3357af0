//! Price resolution.
//!
//! Maps an order's line items to amounts in minor currency units. Resolution is deterministic and auditable: every
//! resolved amount records where it came from (configurator rules or catalog) and, for configured products, the
//! full base-plus-deltas breakdown. There is no fallback to a default price anywhere in this module; every failure
//! mode is a distinct, named error.

mod cache;
mod config;
mod errors;
mod resolver;

pub use cache::{Clock, PricingCache, SystemClock};
pub use config::{PricingConfig, ProductConfiguration};
pub use errors::PriceResolutionError;
pub use resolver::{
    ComponentDelta,
    PriceBreakdown,
    PriceResolver,
    PriceSource,
    PricingSnapshot,
    ResolvedPrice,
    SnapshotItem,
};
