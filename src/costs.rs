//! Transaction cost estimation.
//!
//! Square-root market-impact model in the Almgren–Chriss style:
//!
//! ```text
//! cost = fixed_fee + λ·σ·√(Q/V)·notional + (spread/2)·Q
//! ```
//!
//! where Q is the order quantity, V the average daily volume, σ the
//! instrument volatility and λ the impact coefficient. The breakdown is
//! returned per component so callers can attribute cost sources.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{BallastError, Result};
use crate::types::to_currency;

/// Default impact coefficient for instruments without a calibration.
pub const DEFAULT_IMPACT_COEFFICIENT: f64 = 0.1;

/// Cost model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModelConfig {
    /// Flat fee per order, in currency.
    pub fixed_fee: Decimal,
    /// Quoted bid-ask spread per unit, in currency.
    pub spread: Decimal,
    /// Impact coefficient applied when no per-instrument calibration exists.
    pub default_impact_coefficient: f64,
    /// Per-instrument calibrated impact coefficients.
    #[serde(default)]
    pub impact_coefficients: HashMap<String, f64>,
    /// Warn when an order exceeds this fraction of average daily volume.
    pub participation_warning_threshold: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            fixed_fee: Decimal::ONE,
            spread: Decimal::new(2, 2), // 0.02
            default_impact_coefficient: DEFAULT_IMPACT_COEFFICIENT,
            impact_coefficients: HashMap::new(),
            participation_warning_threshold: 0.1,
        }
    }
}

impl CostModelConfig {
    /// Zero-cost configuration for frictionless experiments.
    pub fn zero() -> Self {
        Self {
            fixed_fee: Decimal::ZERO,
            spread: Decimal::ZERO,
            default_impact_coefficient: 0.0,
            impact_coefficients: HashMap::new(),
            participation_warning_threshold: 1.0,
        }
    }
}

/// Per-component cost attribution for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fixed: Decimal,
    pub impact: Decimal,
    pub spread: Decimal,
    /// Order quantity as a fraction of average daily volume.
    pub participation: f64,
}

impl CostBreakdown {
    /// No-cost breakdown, used for zero-quantity trades.
    pub fn zero() -> Self {
        Self {
            fixed: Decimal::ZERO,
            impact: Decimal::ZERO,
            spread: Decimal::ZERO,
            participation: 0.0,
        }
    }

    pub fn total(&self) -> Decimal {
        self.fixed + self.impact + self.spread
    }
}

/// An order to be priced.
#[derive(Debug, Clone)]
pub struct OrderEstimate {
    /// Units to trade, sign-free.
    pub quantity: f64,
    /// Reference price per unit.
    pub price: f64,
    /// Annualized volatility of the instrument.
    pub volatility: f64,
    /// Average daily volume in units.
    pub average_daily_volume: f64,
}

/// Estimates execution cost for candidate trades.
#[derive(Debug, Clone, Default)]
pub struct TransactionCostModel {
    config: CostModelConfig,
}

impl TransactionCostModel {
    pub fn new(config: CostModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CostModelConfig {
        &self.config
    }

    /// Impact coefficient for an instrument, defaulted when uncalibrated.
    pub fn impact_coefficient(&self, instrument: &str) -> f64 {
        self.config
            .impact_coefficients
            .get(instrument)
            .copied()
            .unwrap_or(self.config.default_impact_coefficient)
    }

    /// Price an order. Fails with [`BallastError::InvalidVolume`] when the
    /// average daily volume is not positive.
    pub fn estimate(&self, instrument: &str, order: &OrderEstimate) -> Result<CostBreakdown> {
        if order.average_daily_volume <= 0.0 {
            return Err(BallastError::InvalidVolume(order.average_daily_volume));
        }
        if order.quantity < 0.0 || !order.quantity.is_finite() {
            return Err(BallastError::InvalidInput(format!(
                "order quantity must be non-negative and finite, got {}",
                order.quantity
            )));
        }
        if order.quantity == 0.0 {
            return Ok(CostBreakdown::zero());
        }

        let participation = order.quantity / order.average_daily_volume;
        if participation > self.config.participation_warning_threshold {
            warn!(
                instrument,
                participation, "order exceeds participation threshold"
            );
        }
        let lambda = self.impact_coefficient(instrument);
        let notional = order.quantity * order.price;
        let impact_fraction = lambda * order.volatility * participation.sqrt();

        let spread_cost =
            self.config.spread / Decimal::TWO * to_currency(order.quantity);

        Ok(CostBreakdown {
            fixed: self.config.fixed_fee,
            impact: to_currency(impact_fraction * notional),
            spread: spread_cost,
            participation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(quantity: f64, volume: f64) -> OrderEstimate {
        OrderEstimate {
            quantity,
            price: 100.0,
            volatility: 0.2,
            average_daily_volume: volume,
        }
    }

    #[test]
    fn test_rejects_non_positive_volume() {
        let model = TransactionCostModel::default();
        let result = model.estimate("AAPL", &order(100.0, 0.0));
        assert!(matches!(result, Err(BallastError::InvalidVolume(_))));

        let result = model.estimate("AAPL", &order(100.0, -5.0));
        assert!(matches!(result, Err(BallastError::InvalidVolume(_))));
    }

    #[test]
    fn test_zero_quantity_is_free() {
        let model = TransactionCostModel::default();
        let breakdown = model.estimate("AAPL", &order(0.0, 1_000_000.0)).unwrap();
        assert_eq!(breakdown.total(), Decimal::ZERO);
    }

    #[test]
    fn test_breakdown_components() {
        let config = CostModelConfig {
            fixed_fee: dec!(1),
            spread: dec!(0.02),
            default_impact_coefficient: 0.1,
            ..Default::default()
        };
        let model = TransactionCostModel::new(config);
        // Q = 10_000, V = 1_000_000 -> participation 1%, sqrt = 0.1.
        let breakdown = model.estimate("AAPL", &order(10_000.0, 1_000_000.0)).unwrap();

        assert_eq!(breakdown.fixed, dec!(1));
        // spread/2 * Q = 0.01 * 10_000 = 100.
        assert_eq!(breakdown.spread, dec!(100));
        // λ·σ·√(Q/V)·notional = 0.1 * 0.2 * 0.1 * 1_000_000 = 2_000.
        let impact = crate::types::to_stat(breakdown.impact);
        assert!((impact - 2_000.0).abs() < 1e-6);
        assert!((breakdown.participation - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_impact_scales_with_sqrt_of_size() {
        let model = TransactionCostModel::default();
        let small = model.estimate("AAPL", &order(10_000.0, 1_000_000.0)).unwrap();
        let large = model.estimate("AAPL", &order(40_000.0, 1_000_000.0)).unwrap();

        let small_impact = crate::types::to_stat(small.impact);
        let large_impact = crate::types::to_stat(large.impact);
        // 4x quantity -> 4x notional * 2x sqrt participation = 8x impact.
        assert!((large_impact / small_impact - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibrated_coefficient_overrides_default() {
        let mut config = CostModelConfig::default();
        config.impact_coefficients.insert("ILLIQ".to_string(), 0.5);
        let model = TransactionCostModel::new(config);

        assert!((model.impact_coefficient("ILLIQ") - 0.5).abs() < 1e-12);
        assert!(
            (model.impact_coefficient("AAPL") - DEFAULT_IMPACT_COEFFICIENT).abs() < 1e-12
        );
    }
}
