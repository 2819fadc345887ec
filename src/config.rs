use std::collections::BTreeMap;

use crate::error::{AnalyticsError, Result};
use crate::risk::{validate_threshold, DEFAULT_RISK_THRESHOLD};

pub const DEFAULT_CURRENCY: &str = "MAD";

/// Reference prices per plan. Plans absent from the catalog are accepted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCatalog {
    prices: BTreeMap<String, f64>,
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self {
            prices: BTreeMap::new(),
        }
    }

    pub fn with_plan(mut self, plan: &str, monthly_price: f64) -> Self {
        self.prices.insert(plan.to_string(), monthly_price);
        self
    }

    pub fn price_of(&self, plan: &str) -> Option<f64> {
        self.prices.get(plan).copied()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        PlanCatalog::new()
            .with_plan("Basic", 99.0)
            .with_plan("Pro", 199.0)
            .with_plan("Premium", 299.0)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub risk_threshold: f64,
    pub currency: String,
    pub catalog: PlanCatalog,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            currency: DEFAULT_CURRENCY.to_string(),
            catalog: PlanCatalog::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            ..Settings::default()
        };

        if let Some(raw) = lookup("RETENTION_RISK_THRESHOLD") {
            let threshold: f64 =
                raw.trim()
                    .parse()
                    .map_err(|_| AnalyticsError::InvalidParameter {
                        name: "RETENTION_RISK_THRESHOLD",
                        value: raw.clone(),
                        reason: "not a number".to_string(),
                    })?;
            settings.risk_threshold = validate_threshold(threshold)?;
        }

        if let Some(currency) = lookup("RETENTION_CURRENCY").filter(|c| !c.trim().is_empty()) {
            settings.currency = currency.trim().to_string();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.risk_threshold, 0.7);
        assert_eq!(settings.currency, "MAD");
        assert_eq!(settings.catalog.price_of("Pro"), Some(199.0));
    }

    #[test]
    fn environment_overrides_threshold_and_currency() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/retention"),
            ("RETENTION_RISK_THRESHOLD", "0.55"),
            ("RETENTION_CURRENCY", "EUR"),
        ]))
        .unwrap();
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/retention")
        );
        assert_eq!(settings.risk_threshold, 0.55);
        assert_eq!(settings.currency, "EUR");
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("RETENTION_RISK_THRESHOLD", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter { .. }));

        let err = Settings::from_lookup(lookup_from(&[("RETENTION_RISK_THRESHOLD", "high")]))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter { .. }));
    }
}
