use std::sync::Arc;

use chrono::{DateTime, Utc};
use cpg_common::Cents;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::{
    pricing::{cache::PricingCache, config::PricingConfig, errors::PriceResolutionError},
    provider_types::SessionLineItem,
    traits::{PricingSource, ProductCatalog},
};

//--------------------------------------    PriceSource    -----------------------------------------------------------
/// Where a resolved amount came from. Persisted in the snapshot so an order can be audited long after the rules that
/// priced it have changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceSource {
    Configurator { config_version: String },
    Catalog { matched_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDelta {
    pub component: String,
    pub option: String,
    pub delta: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: Cents,
    pub deltas: Vec<ComponentDelta>,
    pub flat_fee: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_amount: Cents,
    pub source: PriceSource,
    pub breakdown: Option<PriceBreakdown>,
}

//--------------------------------------  PricingSnapshot  -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_amount: Cents,
    pub line_total: Cents,
    pub source: PriceSource,
    #[serde(default)]
    pub configuration: Option<crate::pricing::ProductConfiguration>,
    #[serde(default)]
    pub breakdown: Option<PriceBreakdown>,
}

/// The canonical, immutable pricing record written into an order at confirmation time. This is the single schema
/// for persisted pricing; there are no legacy shapes to branch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    /// Version of the pricing-config rule set used for configured items, when any were present.
    pub config_version: Option<String>,
    pub items: Vec<SnapshotItem>,
    pub subtotal: Cents,
    pub shipping: Cents,
    pub tax: Cents,
    pub total: Cents,
    pub resolved_at: DateTime<Utc>,
}

//--------------------------------------    PriceResolver   ----------------------------------------------------------
/// Resolves line items to prices. Configured products are priced from the cached pricing-config rule set; standard
/// products from the catalog, by primary id with an sku fallback.
pub struct PriceResolver<C, P> {
    catalog: C,
    pricing: Arc<PricingCache<P>>,
}

impl<C, P> PriceResolver<C, P>
where
    C: ProductCatalog,
    P: PricingSource,
{
    pub fn new(catalog: C, pricing: Arc<PricingCache<P>>) -> Self {
        Self { catalog, pricing }
    }

    /// Resolves every item in the batch, or fails the batch as a whole. A partial pricing is never returned: the
    /// first item that cannot be priced rejects the entire order, and nothing is persisted by this call.
    pub async fn resolve_order(
        &self,
        items: &[SessionLineItem],
        shipping: Cents,
        tax: Cents,
    ) -> Result<PricingSnapshot, PriceResolutionError> {
        if items.is_empty() {
            return Err(PriceResolutionError::EmptyOrder);
        }
        // One config fetch per batch, and only if the batch actually contains configured items.
        let config = if items.iter().any(|i| i.configuration.is_some()) {
            Some(self.pricing.active_config().await?)
        } else {
            None
        };
        let mut snapshot_items = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity <= 0 {
                return Err(PriceResolutionError::InvalidQuantity {
                    name: item.name.clone(),
                    quantity: item.quantity,
                });
            }
            let resolved = self.resolve_item(item, config.as_deref()).await?;
            trace!("💵️ '{}' resolved to {} x{} via {:?}", item.name, resolved.unit_amount, item.quantity, resolved.source);
            snapshot_items.push(SnapshotItem {
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_amount: resolved.unit_amount,
                line_total: resolved.unit_amount * item.quantity,
                source: resolved.source,
                configuration: item.configuration.clone(),
                breakdown: resolved.breakdown,
            });
        }
        let subtotal = snapshot_items.iter().map(|i| i.line_total).sum::<Cents>();
        let total = subtotal + shipping + tax;
        let snapshot = PricingSnapshot {
            config_version: config.map(|c| c.version.clone()),
            items: snapshot_items,
            subtotal,
            shipping,
            tax,
            total,
            resolved_at: Utc::now(),
        };
        debug!("💵️ Batch of {} item(s) resolved. Subtotal {subtotal}, total {total}", snapshot.items.len());
        Ok(snapshot)
    }

    /// Resolves a single line item. Configured items take precedence over catalog lookups; there is no silent
    /// fallback between the two paths.
    pub async fn resolve_item(
        &self,
        item: &SessionLineItem,
        config: Option<&PricingConfig>,
    ) -> Result<ResolvedPrice, PriceResolutionError> {
        if let Some(cfg) = &item.configuration {
            let config = match config {
                Some(c) => c,
                None => return Err(PriceResolutionError::ConfigUnavailable("no pricing config supplied".into())),
            };
            return resolve_configured(&item.name, cfg, config);
        }
        self.resolve_from_catalog(item).await
    }

    async fn resolve_from_catalog(&self, item: &SessionLineItem) -> Result<ResolvedPrice, PriceResolutionError> {
        let mut matched_key = None;
        let mut product = None;
        if let Some(pid) = item.product_id.as_deref() {
            product = self
                .catalog
                .product_by_id(pid)
                .await
                .map_err(|e| PriceResolutionError::CatalogUnavailable(e.to_string()))?;
            if product.is_some() {
                matched_key = Some(format!("product_id:{pid}"));
            }
        }
        if product.is_none() {
            if let Some(sku) = item.sku.as_deref() {
                product = self
                    .catalog
                    .product_by_sku(sku)
                    .await
                    .map_err(|e| PriceResolutionError::CatalogUnavailable(e.to_string()))?;
                if product.is_some() {
                    matched_key = Some(format!("sku:{sku}"));
                }
            }
        }
        if item.product_id.is_none() && item.sku.is_none() {
            return Err(PriceResolutionError::UnpriceableItem { name: item.name.clone() });
        }
        let (product, matched_key) = match (product, matched_key) {
            (Some(p), Some(k)) => (p, k),
            _ => {
                return Err(PriceResolutionError::ProductNotFound {
                    product_id: item.product_id.clone(),
                    sku: item.sku.clone(),
                })
            },
        };
        if !product.unit_price.is_positive() {
            return Err(PriceResolutionError::ProductPriceZero { matched_key });
        }
        Ok(ResolvedPrice { unit_amount: product.unit_price, source: PriceSource::Catalog { matched_key }, breakdown: None })
    }
}

/// Prices a configured item: base price for the variant, plus the delta for every component selection, plus the
/// optional flat fee. An unknown option contributes a zero delta with a logged warning; it is not a failure and not
/// a silent success.
fn resolve_configured(
    name: &str,
    configuration: &crate::pricing::ProductConfiguration,
    config: &PricingConfig,
) -> Result<ResolvedPrice, PriceResolutionError> {
    let base_price = config.base_price(&configuration.variant).ok_or_else(|| PriceResolutionError::VariantNotFound {
        variant: configuration.variant.clone(),
        config_version: config.version.clone(),
    })?;
    let mut deltas = Vec::with_capacity(configuration.selections.len());
    for (component, option) in &configuration.selections {
        let delta = match config.option_delta(component, option) {
            Some(d) => d,
            None => {
                warn!(
                    "💵️ No pricing rule for {component}={option} on '{name}' (config {}). Using a zero delta.",
                    config.version
                );
                Cents::from(0)
            },
        };
        deltas.push(ComponentDelta { component: component.clone(), option: option.clone(), delta });
    }
    let flat_fee = config.flat_fee.unwrap_or_default();
    let unit_amount = base_price + deltas.iter().map(|d| d.delta).sum::<Cents>() + flat_fee;
    if !unit_amount.is_positive() {
        return Err(PriceResolutionError::ConfiguratorPriceInvalid {
            name: name.to_string(),
            variant: configuration.variant.clone(),
            computed: unit_amount.value(),
        });
    }
    Ok(ResolvedPrice {
        unit_amount,
        source: PriceSource::Configurator { config_version: config.version.clone() },
        breakdown: Some(PriceBreakdown { base_price, deltas, flat_fee }),
    })
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::{
        db_types::CatalogProduct,
        pricing::ProductConfiguration,
        traits::{CatalogError, PricingSourceError},
    };

    #[derive(Clone, Default)]
    struct StubCatalog {
        products: Vec<CatalogProduct>,
    }

    impl ProductCatalog for StubCatalog {
        async fn product_by_id(&self, product_id: &str) -> Result<Option<CatalogProduct>, CatalogError> {
            Ok(self.products.iter().find(|p| p.product_id == product_id).cloned())
        }

        async fn product_by_sku(&self, sku: &str) -> Result<Option<CatalogProduct>, CatalogError> {
            Ok(self.products.iter().find(|p| p.sku == sku).cloned())
        }
    }

    #[derive(Clone)]
    struct StubPricing {
        config: PricingConfig,
    }

    impl PricingSource for StubPricing {
        async fn fetch_active_config(&self) -> Result<PricingConfig, PricingSourceError> {
            Ok(self.config.clone())
        }
    }

    fn test_config() -> PricingConfig {
        let mut variants = HashMap::new();
        variants.insert("desk_standard".to_string(), Cents::from(45000));
        let mut finish = HashMap::new();
        finish.insert("walnut".to_string(), Cents::from(8000));
        finish.insert("oak".to_string(), Cents::from(5000));
        let mut legs = HashMap::new();
        legs.insert("steel".to_string(), Cents::from(3000));
        let mut components = HashMap::new();
        components.insert("finish".to_string(), finish);
        components.insert("legs".to_string(), legs);
        PricingConfig {
            version: "2024-05".to_string(),
            variants,
            components,
            flat_fee: Some(Cents::from(1500)),
            valid_from: None,
            valid_until: None,
        }
    }

    fn resolver(catalog: StubCatalog, config: PricingConfig) -> PriceResolver<StubCatalog, StubPricing> {
        let cache = Arc::new(PricingCache::new(
            StubPricing { config },
            chrono::Duration::seconds(300),
            std::time::Duration::from_secs(5),
        ));
        PriceResolver::new(catalog, cache)
    }

    fn configured_item(selections: &[(&str, &str)]) -> SessionLineItem {
        SessionLineItem {
            product_id: None,
            sku: Some("DESK-CFG".to_string()),
            name: "Custom desk".to_string(),
            quantity: 1,
            configuration: Some(ProductConfiguration {
                variant: "desk_standard".to_string(),
                selections: selections.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
            }),
        }
    }

    fn catalog_item(product_id: Option<&str>, sku: Option<&str>) -> SessionLineItem {
        SessionLineItem {
            product_id: product_id.map(String::from),
            sku: sku.map(String::from),
            name: "Coaster set".to_string(),
            quantity: 2,
            configuration: None,
        }
    }

    #[tokio::test]
    async fn configured_subtotal_is_base_plus_deltas_plus_fee() {
        let r = resolver(StubCatalog::default(), test_config());
        let snapshot =
            r.resolve_order(&[configured_item(&[("finish", "walnut"), ("legs", "steel")])], Cents::from(0), Cents::from(0)).await.unwrap();
        // 45000 + 8000 + 3000 + 1500
        assert_eq!(snapshot.items[0].unit_amount, Cents::from(57500));
        assert_eq!(snapshot.total, Cents::from(57500));
        assert_eq!(snapshot.config_version.as_deref(), Some("2024-05"));
        let breakdown = snapshot.items[0].breakdown.as_ref().unwrap();
        assert_eq!(breakdown.base_price, Cents::from(45000));
        assert_eq!(breakdown.flat_fee, Cents::from(1500));
    }

    #[tokio::test]
    async fn unknown_option_contributes_zero_delta() {
        let r = resolver(StubCatalog::default(), test_config());
        let snapshot = r
            .resolve_order(&[configured_item(&[("finish", "unknown_color")])], Cents::from(0), Cents::from(0))
            .await
            .unwrap();
        // base + 0 + flat fee
        assert_eq!(snapshot.items[0].unit_amount, Cents::from(46500));
        let breakdown = snapshot.items[0].breakdown.as_ref().unwrap();
        assert_eq!(breakdown.deltas[0].delta, Cents::from(0));
    }

    #[tokio::test]
    async fn unknown_variant_is_a_named_failure() {
        let r = resolver(StubCatalog::default(), test_config());
        let mut item = configured_item(&[]);
        item.configuration.as_mut().unwrap().variant = "desk_xl".to_string();
        let err = r.resolve_order(&[item], Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::VariantNotFound { ref variant, .. } if variant == "desk_xl"));
    }

    #[tokio::test]
    async fn negative_configured_price_is_rejected() {
        let mut config = test_config();
        config.variants.insert("desk_standard".to_string(), Cents::from(-50000));
        let r = resolver(StubCatalog::default(), config);
        let err = r.resolve_order(&[configured_item(&[])], Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::ConfiguratorPriceInvalid { .. }));
    }

    #[tokio::test]
    async fn catalog_falls_back_from_id_to_sku() {
        let catalog = StubCatalog {
            products: vec![CatalogProduct {
                id: 1,
                product_id: "prod_77".to_string(),
                sku: "COAST-4".to_string(),
                name: "Coaster set".to_string(),
                unit_price: Cents::from(1800),
            }],
        };
        let r = resolver(catalog, test_config());
        let snapshot = r
            .resolve_order(&[catalog_item(Some("prod_missing"), Some("COAST-4"))], Cents::from(500), Cents::from(0))
            .await
            .unwrap();
        assert_eq!(snapshot.items[0].unit_amount, Cents::from(1800));
        assert_eq!(snapshot.items[0].line_total, Cents::from(3600));
        assert_eq!(snapshot.items[0].source, PriceSource::Catalog { matched_key: "sku:COAST-4".to_string() });
        assert_eq!(snapshot.total, Cents::from(4100));
    }

    #[tokio::test]
    async fn double_miss_reports_both_attempted_keys() {
        let r = resolver(StubCatalog::default(), test_config());
        let err =
            r.resolve_order(&[catalog_item(Some("prod_bad"), Some("SKU-BAD"))], Cents::from(0), Cents::from(0)).await.unwrap_err();
        match err {
            PriceResolutionError::ProductNotFound { product_id, sku } => {
                assert_eq!(product_id.as_deref(), Some("prod_bad"));
                assert_eq!(sku.as_deref(), Some("SKU-BAD"));
            },
            other => panic!("expected ProductNotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn zero_catalog_price_is_misconfiguration() {
        let catalog = StubCatalog {
            products: vec![CatalogProduct {
                id: 1,
                product_id: "prod_0".to_string(),
                sku: "FREE-1".to_string(),
                name: "Misconfigured".to_string(),
                unit_price: Cents::from(0),
            }],
        };
        let r = resolver(catalog, test_config());
        let err = r.resolve_order(&[catalog_item(Some("prod_0"), None)], Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::ProductPriceZero { .. }));
    }

    #[tokio::test]
    async fn one_bad_item_rejects_the_whole_batch() {
        let catalog = StubCatalog {
            products: vec![CatalogProduct {
                id: 1,
                product_id: "prod_77".to_string(),
                sku: "COAST-4".to_string(),
                name: "Coaster set".to_string(),
                unit_price: Cents::from(1800),
            }],
        };
        let r = resolver(catalog, test_config());
        let items = [catalog_item(Some("prod_77"), None), catalog_item(Some("prod_bad"), None)];
        let err = r.resolve_order(&items, Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let r = resolver(StubCatalog::default(), test_config());
        let mut item = configured_item(&[]);
        item.quantity = 0;
        let err = r.resolve_order(&[item], Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::InvalidQuantity { quantity: 0, .. }));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let r = resolver(StubCatalog::default(), test_config());
        let err = r.resolve_order(&[], Cents::from(0), Cents::from(0)).await.unwrap_err();
        assert!(matches!(err, PriceResolutionError::EmptyOrder));
    }
}
