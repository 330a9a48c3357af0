use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use cpg_common::Cents;
use serde::{Deserialize, Serialize};

//--------------------------------------   PricingConfig   -----------------------------------------------------------
/// A versioned, time-bounded pricing rule set for configured products. Owned by the external pricing administration
/// collaborator; read-only to this engine and cached with a short TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub version: String,
    /// Base price per product variant.
    pub variants: HashMap<String, Cents>,
    /// Price delta per component, per selectable option: `component -> option -> delta`.
    pub components: HashMap<String, HashMap<String, Cents>>,
    /// Optional flat configurator fee applied once per configured item.
    #[serde(default)]
    pub flat_fee: Option<Cents>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl PricingConfig {
    pub fn base_price(&self, variant: &str) -> Option<Cents> {
        self.variants.get(variant).copied()
    }

    /// The delta for a component/option pair, if such a rule exists.
    pub fn option_delta(&self, component: &str, option: &str) -> Option<Cents> {
        self.components.get(component).and_then(|options| options.get(option)).copied()
    }
}

//-----------------------------------  ProductConfiguration  ---------------------------------------------------------
/// The validated component/option selections attached to a configured-product line item. The map is ordered so that
/// persisted snapshots serialize deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductConfiguration {
    pub variant: String,
    pub selections: BTreeMap<String, String>,
}
