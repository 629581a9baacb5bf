//! Configuration file support.
//!
//! A TOML surface over the engine: risk limits, optimizer selection and
//! blend weights, cost parameters, backtest settings, genetic-search
//! hyperparameters, cache TTL and worker-pool size. Loading is strict on
//! types, lenient on omissions: every section and field has a default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::backtest::BacktestConfiguration;
use crate::cache::CacheConfig;
use crate::costs::CostModelConfig;
use crate::cvar::CvarVariant;
use crate::error::{BallastError, Result};
use crate::genetic::GeneticConfig;
use crate::metrics::RiskCalculatorConfig;
use crate::monitor::RiskLimits;
use crate::orchestrator::OptimizerMethod;
use crate::pool::DEFAULT_MAX_CONCURRENT;
use crate::sizing::{PositionSizerConfig, SizingMethod, DEFAULT_KELLY_CAP};
use crate::types::{to_currency, OptimizationConstraints};

/// Complete engine configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub risk_limits: RiskLimits,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub sizing: SizingSettings,
    #[serde(default)]
    pub costs: CostSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub genetic: GeneticConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pool: PoolSettings,
}

/// Optimizer selection and parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// "hrp", "cvar", or "hybrid".
    pub method: String,
    /// CVaR variant: "min-cvar", "mean-cvar", "return-max", "risk-parity".
    pub cvar_variant: String,
    pub confidence: f64,
    pub risk_aversion: f64,
    pub max_cvar: f64,
    /// Hybrid blend weight on the CVaR leg.
    pub cvar_weight: f64,
    /// Aligned observations to optimize over.
    pub lookback: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            method: "hrp".to_string(),
            cvar_variant: "min-cvar".to_string(),
            confidence: 0.95,
            risk_aversion: 1.0,
            max_cvar: 0.05,
            cvar_weight: 0.5,
            lookback: 252,
        }
    }
}

impl OptimizerSettings {
    fn variant(&self) -> Result<CvarVariant> {
        match self.cvar_variant.as_str() {
            "min-cvar" => Ok(CvarVariant::MinCvar),
            "mean-cvar" => Ok(CvarVariant::MeanCvar {
                risk_aversion: self.risk_aversion,
            }),
            "return-max" => Ok(CvarVariant::ReturnMaxUnderCvar {
                max_cvar: self.max_cvar,
            }),
            "risk-parity" => Ok(CvarVariant::RiskParityCvar {
                max_cvar: self.max_cvar,
            }),
            other => Err(BallastError::ConfigError(format!(
                "unknown cvar_variant: {}",
                other
            ))),
        }
    }

    /// Resolve the configured optimizer method.
    pub fn method(&self) -> Result<OptimizerMethod> {
        match self.method.as_str() {
            "hrp" => Ok(OptimizerMethod::Hrp),
            "cvar" => Ok(OptimizerMethod::Cvar(self.variant()?)),
            "hybrid" => Ok(OptimizerMethod::Hybrid {
                cvar_weight: self.cvar_weight,
                variant: self.variant()?,
            }),
            other => Err(BallastError::ConfigError(format!(
                "unknown optimizer method: {}",
                other
            ))),
        }
    }
}

/// Position sizing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingSettings {
    /// "kelly", "cvar-budget", "risk-parity", "volatility-target".
    pub method: String,
    pub kelly_payoff_ratio: f64,
    pub kelly_cap: f64,
    pub cvar_budget: f64,
    pub target_volatility: f64,
    pub allow_short: bool,
}

impl Default for SizingSettings {
    fn default() -> Self {
        Self {
            method: "kelly".to_string(),
            kelly_payoff_ratio: 1.0,
            kelly_cap: DEFAULT_KELLY_CAP,
            cvar_budget: 0.02,
            target_volatility: 0.15,
            allow_short: false,
        }
    }
}

impl SizingSettings {
    pub fn to_sizer_config(&self) -> Result<PositionSizerConfig> {
        let method = match self.method.as_str() {
            "kelly" => SizingMethod::Kelly {
                payoff_ratio: self.kelly_payoff_ratio,
                cap: self.kelly_cap,
            },
            "cvar-budget" => SizingMethod::CvarBudget {
                budget: self.cvar_budget,
            },
            "risk-parity" => SizingMethod::RiskParity,
            "volatility-target" => SizingMethod::VolatilityTarget {
                target_vol: self.target_volatility,
            },
            other => {
                return Err(BallastError::ConfigError(format!(
                    "unknown sizing method: {}",
                    other
                )))
            }
        };
        Ok(PositionSizerConfig {
            method,
            allow_short: self.allow_short,
        })
    }
}

/// Cost model settings (currency fields as floats in the file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSettings {
    pub fixed_fee: f64,
    pub spread: f64,
    pub impact_coefficient: f64,
    pub participation_warning_threshold: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            fixed_fee: 1.0,
            spread: 0.02,
            impact_coefficient: 0.1,
            participation_warning_threshold: 0.1,
        }
    }
}

impl CostSettings {
    pub fn to_cost_config(&self) -> CostModelConfig {
        CostModelConfig {
            fixed_fee: to_currency(self.fixed_fee),
            spread: to_currency(self.spread),
            default_impact_coefficient: self.impact_coefficient,
            impact_coefficients: Default::default(),
            participation_warning_threshold: self.participation_warning_threshold,
        }
    }
}

/// Backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    pub initial_capital: f64,
    pub rebalance_every: usize,
    pub metrics_lookback: usize,
    pub default_average_daily_volume: f64,
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            rebalance_every: 5,
            metrics_lookback: 20,
            default_average_daily_volume: 1_000_000.0,
            seed: 42,
            show_progress: false,
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub ttl_minutes: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            max_entries: 256,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries,
            ..CacheConfig::default()
        }
        .with_ttl(Duration::from_secs(self.ttl_minutes * 60))
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub max_concurrent_backtests: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_concurrent_backtests: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let serialized = toml::to_string_pretty(self)
            .map_err(|e| BallastError::ConfigError(e.to_string()))?;
        fs::write(path.as_ref(), serialized)?;
        Ok(())
    }

    /// Build a backtest configuration from the file settings, with default
    /// constraints and risk calculation.
    pub fn to_backtest_configuration(&self) -> Result<BacktestConfiguration> {
        if self.backtest.initial_capital <= 0.0 {
            return Err(BallastError::ConfigError(
                "initial_capital must be positive".to_string(),
            ));
        }
        Ok(BacktestConfiguration {
            start: None,
            end: None,
            initial_capital: to_currency(self.backtest.initial_capital),
            rebalance_every: self.backtest.rebalance_every,
            costs: self.costs.to_cost_config(),
            sizing: self.sizing.to_sizer_config()?,
            constraints: OptimizationConstraints::default(),
            risk: RiskCalculatorConfig {
                confidence: self.optimizer.confidence,
                ..Default::default()
            },
            metrics_lookback: self.backtest.metrics_lookback,
            average_daily_volumes: Default::default(),
            default_average_daily_volume: self.backtest.default_average_daily_volume,
            seed: self.backtest.seed,
            show_progress: self.backtest.show_progress,
        })
    }

    /// An example file with every section present.
    pub fn example() -> String {
        let config = EngineConfig {
            risk_limits: RiskLimits {
                max_var: Some(0.05),
                max_cvar: Some(0.08),
                max_drawdown: Some(0.2),
                min_sharpe: Some(0.5),
                max_concentration: Some(0.25),
                max_leverage: Some(1.0),
            },
            ..Default::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.optimizer.method().unwrap(),
            OptimizerMethod::Hrp
        ));
        let backtest = config.to_backtest_configuration().unwrap();
        assert_eq!(backtest.rebalance_every, 5);
        assert_eq!(backtest.seed, 42);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.optimizer.method = "cvar".to_string();
        config.optimizer.cvar_variant = "mean-cvar".to_string();
        config.optimizer.risk_aversion = 2.5;
        config.backtest.seed = 7;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.optimizer.method, "cvar");
        assert_eq!(loaded.backtest.seed, 7);
        match loaded.optimizer.method().unwrap() {
            OptimizerMethod::Cvar(CvarVariant::MeanCvar { risk_aversion }) => {
                assert!((risk_aversion - 2.5).abs() < 1e-12);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[backtest]\nseed = 99\n").unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.backtest.seed, 99);
        // Everything else defaulted.
        assert_eq!(loaded.optimizer.method, "hrp");
        assert_eq!(loaded.cache.ttl_minutes, 10);
        assert_eq!(loaded.pool.max_concurrent_backtests, DEFAULT_MAX_CONCURRENT);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let mut config = EngineConfig::default();
        config.optimizer.method = "astrology".to_string();
        assert!(matches!(
            config.optimizer.method(),
            Err(BallastError::ConfigError(_))
        ));
    }

    #[test]
    fn test_unknown_sizing_rejected() {
        let mut config = EngineConfig::default();
        config.sizing.method = "vibes".to_string();
        assert!(config.to_backtest_configuration().is_err());
    }

    #[test]
    fn test_cache_ttl_clamps() {
        let settings = CacheSettings {
            ttl_minutes: 1,
            max_entries: 10,
        };
        // Below the supported band: clamped up to the minimum.
        assert_eq!(settings.to_cache_config().ttl, crate::cache::MIN_TTL);
    }

    #[test]
    fn test_example_parses() {
        let example = EngineConfig::example();
        let parsed: EngineConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed.risk_limits.max_var, Some(0.05));
    }

    #[test]
    fn test_negative_capital_rejected() {
        let mut config = EngineConfig::default();
        config.backtest.initial_capital = -5.0;
        assert!(config.to_backtest_configuration().is_err());
    }
}
