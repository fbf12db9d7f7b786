// 9.0 config.rs: everything a run needs before tick 0. market layout, confidence
// levels, trader risk settings. validated up front so a bad setting fails before
// any state exists.
// 9.1 presets at the bottom reproduce the reference scenarios.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::market::{AssetConfig, Market, MarketError, RiskConfidence};
use crate::risk::{LimitPolicy, RiskCapabilities, RiskMeasure};
use crate::simulation::RunConfig;
use crate::types::AssetId;

/// Market-wide settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub assets: Vec<AssetConfig>,
    // Spreads are measured against this asset
    pub reference_asset: AssetId,
    pub confidence: RiskConfidence,
    // Clearing floor, keeps log-returns finite
    pub min_price: f64,
    #[serde(default)]
    pub run: RunConfig,
}

impl SimulationConfig {
    pub fn new(assets: Vec<AssetConfig>, reference_asset: impl Into<AssetId>) -> Self {
        Self {
            assets,
            reference_asset: reference_asset.into(),
            confidence: RiskConfidence::default(),
            min_price: 0.01,
            run: RunConfig::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: RiskConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }
        self.confidence.validate()?;
        if !(self.min_price.is_finite() && self.min_price > 0.0) {
            return Err(MarketError::InvalidMinPrice(self.min_price).into());
        }

        if !self.assets.iter().any(|a| a.id == self.reference_asset) {
            return Err(MarketError::UnknownReferenceAsset(self.reference_asset.clone()).into());
        }

        let mut seen = BTreeSet::new();
        for asset in &self.assets {
            asset.validate()?;
            if !seen.insert(asset.id.clone()) {
                return Err(MarketError::DuplicateAsset(asset.id.clone()).into());
            }
            if asset.initial_price.is_none() {
                return Err(MarketError::MissingInitialPrice(asset.id.clone()).into());
            }
            if asset.id != self.reference_asset && asset.initial_spread.is_none() {
                return Err(MarketError::MissingInitialSpread(asset.id.clone()).into());
            }
        }
        if self.run.max_events == 0 {
            return Err(ConfigError::InvalidMaxEvents);
        }
        Ok(())
    }

    pub fn build_market(&self) -> Result<Market, ConfigError> {
        self.validate()?;
        Ok(Market::new(
            self.assets.clone(),
            self.reference_asset.clone(),
            self.confidence,
            self.min_price,
        )?)
    }

    /// Two assets A and B, price 100, liquidity 1000, A as reference.
    pub fn two_asset_example() -> Self {
        Self::new(
            vec![
                AssetConfig::new("A", 100.0, 1000.0),
                AssetConfig::new("B", 100.0, 1000.0).with_initial_spread(0.0),
            ],
            "A",
        )
    }

    /// Three thinner markets at different price levels.
    pub fn three_asset_stress() -> Self {
        Self::new(
            vec![
                AssetConfig::new("A", 100.0, 500.0),
                AssetConfig::new("B", 50.0, 250.0).with_initial_spread(-50.0),
                AssetConfig::new("C", 200.0, 800.0).with_initial_spread(100.0),
            ],
            "A",
        )
    }
}

/// Per-trader risk settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderConfig {
    pub name: String,
    // Rolling window W for means and covariances
    pub covariance_window: usize,
    pub capabilities: RiskCapabilities,
    pub limit_policy: LimitPolicy,
    // Rolling window for the volatility index mean
    pub vol_index_window: usize,
    // Failure is not checked until the tick number exceeds this
    pub failure_warmup: u64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            name: "trader".to_string(),
            covariance_window: 5,
            capabilities: RiskCapabilities::none(),
            limit_policy: LimitPolicy::Constant,
            vol_index_window: 5,
            failure_warmup: 10,
        }
    }
}

impl TraderConfig {
    /// VaR limit of 500 on a 5-tick window.
    pub fn var_constrained() -> Self {
        Self {
            name: "var-trader".to_string(),
            capabilities: RiskCapabilities::var(500.0),
            ..Self::default()
        }
    }

    /// ES limit of 600 on a 5-tick window.
    pub fn es_constrained() -> Self {
        Self {
            name: "es-trader".to_string(),
            capabilities: RiskCapabilities::es(600.0),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.covariance_window = window;
        self
    }

    pub fn with_capabilities(mut self, capabilities: RiskCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    pub fn with_vol_index_window(mut self, window: usize) -> Self {
        self.vol_index_window = window;
        self
    }

    pub fn with_failure_warmup(mut self, ticks: u64) -> Self {
        self.failure_warmup = ticks;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.covariance_window < 2 {
            return Err(ConfigError::InvalidCovarianceWindow(self.covariance_window));
        }
        if self.vol_index_window == 0 {
            return Err(ConfigError::InvalidVolatilityWindow(self.vol_index_window));
        }
        for measure in self.capabilities.measures() {
            if let Some(spec) = self.capabilities.limit(measure) {
                if !spec.is_valid() {
                    return Err(ConfigError::InvalidLimit {
                        measure,
                        limit: spec.base_limit,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("At least one asset must be configured")]
    NoAssets,

    #[error("Covariance window must be at least 2, got {0}")]
    InvalidCovarianceWindow(usize),

    #[error("Volatility index window must be positive, got {0}")]
    InvalidVolatilityWindow(usize),

    #[error("{measure} limit must be finite and non-negative, got {limit}")]
    InvalidLimit { measure: RiskMeasure, limit: f64 },

    #[error("Event log capacity must be positive")]
    InvalidMaxEvents,

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(SimulationConfig::two_asset_example().validate().is_ok());
        assert!(SimulationConfig::three_asset_stress().validate().is_ok());
        assert!(TraderConfig::var_constrained().validate().is_ok());
        assert!(TraderConfig::es_constrained().validate().is_ok());
        assert!(TraderConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_initial_values_rejected() {
        let mut config = SimulationConfig::two_asset_example();
        config.assets[1].initial_spread = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Market(MarketError::MissingInitialSpread(AssetId::new("B"))))
        );

        let mut config = SimulationConfig::two_asset_example();
        config.assets[0].initial_price = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Market(MarketError::MissingInitialPrice(AssetId::new("A"))))
        );
    }

    #[test]
    fn bad_market_settings_rejected() {
        let mut config = SimulationConfig::two_asset_example();
        config.assets[0].liquidity = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Market(MarketError::InvalidLiquidity { .. }))
        ));

        let mut config = SimulationConfig::two_asset_example();
        config.reference_asset = AssetId::new("Z");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Market(MarketError::UnknownReferenceAsset(_)))
        ));

        let config = SimulationConfig::two_asset_example().with_confidence(RiskConfidence { var: 1.0, es: 0.975 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Market(MarketError::InvalidConfidence(_)))
        ));
    }

    #[test]
    fn trader_windows_checked() {
        assert_eq!(
            TraderConfig::default().with_window(1).validate(),
            Err(ConfigError::InvalidCovarianceWindow(1))
        );
        assert_eq!(
            TraderConfig::default().with_vol_index_window(0).validate(),
            Err(ConfigError::InvalidVolatilityWindow(0))
        );
        assert!(matches!(
            TraderConfig::default()
                .with_capabilities(RiskCapabilities::es(f64::NAN))
                .validate(),
            Err(ConfigError::InvalidLimit { measure: RiskMeasure::Es, .. })
        ));
    }
}
