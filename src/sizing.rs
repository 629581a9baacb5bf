//! Position sizing.
//!
//! Converts a signal plus risk metrics into a target weight. Each method
//! first computes a raw weight, then applies the constraint clamp as the
//! final step, so both values stay observable.

use serde::{Deserialize, Serialize};

use crate::error::{BallastError, Result};
use crate::metrics::RiskMetrics;
use crate::types::{Direction, OptimizationConstraints, Signal};

/// Fraction of full Kelly applied by default.
pub const DEFAULT_KELLY_CAP: f64 = 0.25;

/// Sizing method for one request. Exactly one method is active per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SizingMethod {
    /// Kelly criterion with a hard cap at `cap` of full Kelly.
    Kelly { payoff_ratio: f64, cap: f64 },
    /// Keep the position's marginal CVaR contribution under `budget`.
    CvarBudget { budget: f64 },
    /// Weight proportional to inverse volatility, normalized over the
    /// candidate set.
    RiskParity,
    /// Weight = target_vol / instrument_vol, capped by constraints.
    VolatilityTarget { target_vol: f64 },
}

impl Default for SizingMethod {
    fn default() -> Self {
        SizingMethod::Kelly {
            payoff_ratio: 1.0,
            cap: DEFAULT_KELLY_CAP,
        }
    }
}

/// A sized position: the raw method output and the constrained weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizedPosition {
    pub instrument: String,
    pub direction: Direction,
    /// Method output before any constraint was applied.
    pub raw_weight: f64,
    /// Final weight after the constraint clamp.
    pub weight: f64,
}

/// Position sizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PositionSizerConfig {
    pub method: SizingMethod,
    /// Allow short positions; a short signal on a long-only sizer is flat.
    pub allow_short: bool,
}

/// Converts signals and risk metrics into target weights.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: PositionSizerConfig,
}

impl PositionSizer {
    pub fn new(config: PositionSizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PositionSizerConfig {
        &self.config
    }

    /// Size a single signal.
    pub fn size(
        &self,
        signal: &Signal,
        metrics: &RiskMetrics,
        constraints: &OptimizationConstraints,
    ) -> Result<SizedPosition> {
        if !signal.validate() {
            return Err(BallastError::InvalidInput(format!(
                "invalid signal for {}",
                signal.instrument
            )));
        }

        let raw = match &self.config.method {
            SizingMethod::Kelly { payoff_ratio, cap } => {
                kelly_fraction(signal.confidence, *payoff_ratio, *cap)
            }
            SizingMethod::CvarBudget { budget } => {
                if metrics.cvar <= f64::EPSILON {
                    1.0
                } else {
                    budget / metrics.cvar
                }
            }
            SizingMethod::RiskParity => {
                // Meaningful only across a candidate set; a lone signal gets
                // the inverse-vol weight before normalization.
                if metrics.volatility <= f64::EPSILON {
                    0.0
                } else {
                    1.0 / metrics.volatility
                }
            }
            SizingMethod::VolatilityTarget { target_vol } => {
                if metrics.volatility <= f64::EPSILON {
                    0.0
                } else {
                    target_vol / metrics.volatility
                }
            }
        };

        Ok(self.clamp(signal, raw, constraints))
    }

    /// Size a candidate set together. Risk-parity normalizes inverse
    /// volatilities across the set; other methods size independently.
    pub fn size_candidates(
        &self,
        candidates: &[(Signal, RiskMetrics)],
        constraints: &OptimizationConstraints,
    ) -> Result<Vec<SizedPosition>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if matches!(self.config.method, SizingMethod::RiskParity) {
            let inverse_vols: Vec<f64> = candidates
                .iter()
                .map(|(_, m)| {
                    if m.volatility <= f64::EPSILON {
                        0.0
                    } else {
                        1.0 / m.volatility
                    }
                })
                .collect();
            let total: f64 = inverse_vols.iter().sum();
            return candidates
                .iter()
                .zip(&inverse_vols)
                .map(|((signal, _), &iv)| {
                    if !signal.validate() {
                        return Err(BallastError::InvalidInput(format!(
                            "invalid signal for {}",
                            signal.instrument
                        )));
                    }
                    let raw = if total > f64::EPSILON { iv / total } else { 0.0 };
                    Ok(self.clamp(signal, raw, constraints))
                })
                .collect();
        }

        candidates
            .iter()
            .map(|(signal, metrics)| self.size(signal, metrics, constraints))
            .collect()
    }

    /// Final constraint clamp: direction handling, position cap, leverage
    /// cap. Applied after the raw calculation, never before.
    fn clamp(
        &self,
        signal: &Signal,
        raw: f64,
        constraints: &OptimizationConstraints,
    ) -> SizedPosition {
        let cap = constraints
            .max_position_weight
            .min(constraints.max_leverage);

        let weight = match signal.direction {
            Direction::Long => raw.max(0.0).min(cap),
            Direction::Short => {
                if self.config.allow_short && !constraints.long_only {
                    -(raw.max(0.0).min(cap))
                } else {
                    0.0
                }
            }
        };

        SizedPosition {
            instrument: signal.instrument.clone(),
            direction: signal.direction,
            raw_weight: raw,
            weight,
        }
    }
}

/// Kelly fraction f = (p·b − q)/b, hard-capped at `cap`. A negative edge
/// sizes to zero rather than flipping direction.
pub fn kelly_fraction(win_probability: f64, payoff_ratio: f64, cap: f64) -> f64 {
    if payoff_ratio <= 0.0 {
        return 0.0;
    }
    let p = win_probability;
    let q = 1.0 - p;
    let kelly = (p * payoff_ratio - q) / payoff_ratio;
    kelly.max(0.0).min(cap)
}
