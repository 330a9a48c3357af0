//! Storage for the versioned pricing-configuration rule sets. The `rules` column holds the serialized variant and
//! component tables; version and validity window live in their own columns so the active-config query stays a plain
//! index lookup.
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{FromRow, SqliteConnection};

use crate::{pricing::PricingConfig, traits::PricingSourceError};

#[derive(Debug, Clone, FromRow)]
struct PricingConfigRow {
    version: String,
    rules: String,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RuleSet {
    variants: std::collections::HashMap<String, cpg_common::Cents>,
    components: std::collections::HashMap<String, std::collections::HashMap<String, cpg_common::Cents>>,
    #[serde(default)]
    flat_fee: Option<cpg_common::Cents>,
}

/// Fetches the rule set whose validity window covers `now`. When several qualify, the one that became valid most
/// recently wins.
pub async fn fetch_active_config(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PricingConfig>, PricingSourceError> {
    let row = sqlx::query_as::<_, PricingConfigRow>(
        r#"SELECT version, rules, valid_from, valid_until FROM pricing_configs
           WHERE (valid_from IS NULL OR valid_from <= $1) AND (valid_until IS NULL OR valid_until > $1)
           ORDER BY valid_from DESC LIMIT 1"#,
    )
    .bind(now)
    .fetch_optional(conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let rules: RuleSet =
        serde_json::from_str(&row.rules).map_err(|e| PricingSourceError::FetchFailed(e.to_string()))?;
    debug!("🗃️ Active pricing config is version [{}]", row.version);
    Ok(Some(PricingConfig {
        version: row.version,
        variants: rules.variants,
        components: rules.components,
        flat_fee: rules.flat_fee,
        valid_from: row.valid_from,
        valid_until: row.valid_until,
    }))
}

/// Installs (or replaces) a rule set version. Administration and test seeding only.
pub async fn upsert_config(config: &PricingConfig, conn: &mut SqliteConnection) -> Result<(), PricingSourceError> {
    let rules = RuleSet {
        variants: config.variants.clone(),
        components: config.components.clone(),
        flat_fee: config.flat_fee,
    };
    let rules = serde_json::to_string(&rules).map_err(|e| PricingSourceError::FetchFailed(e.to_string()))?;
    sqlx::query(
        r#"INSERT INTO pricing_configs (version, rules, valid_from, valid_until) VALUES ($1, $2, $3, $4)
           ON CONFLICT (version) DO UPDATE SET rules = excluded.rules, valid_from = excluded.valid_from,
               valid_until = excluded.valid_until"#,
    )
    .bind(&config.version)
    .bind(rules)
    .bind(config.valid_from)
    .bind(config.valid_until)
    .execute(conn)
    .await?;
    Ok(())
}
