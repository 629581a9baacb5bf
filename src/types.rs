//! Core data types for the portfolio engine.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::costs::CostBreakdown;

/// Tolerance used when checking weight-sum invariants.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Trade direction suggested by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// A candidate trading signal from an external signal source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    /// Signal confidence in [0, 1], interpreted as win probability by the
    /// Kelly sizer.
    pub confidence: f64,
}

impl Signal {
    pub fn new(instrument: impl Into<String>, direction: Direction, confidence: f64) -> Self {
        Self {
            instrument: instrument.into(),
            direction,
            confidence,
        }
    }

    /// Validate the signal.
    pub fn validate(&self) -> bool {
        !self.instrument.is_empty() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// A single position held in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Number of units held. Negative for shorts.
    pub quantity: Decimal,
    /// Fraction of portfolio equity allocated to this position.
    pub weight: f64,
    /// Total acquisition cost of the open quantity.
    pub cost_basis: Decimal,
}

impl Position {
    pub fn new(quantity: Decimal, weight: f64, cost_basis: Decimal) -> Self {
        Self {
            quantity,
            weight,
            cost_basis,
        }
    }
}

/// A portfolio: instrument positions plus a cash balance.
///
/// Portfolios are immutable from the optimizer's point of view; rebalancing
/// produces a plan of trades, never an in-place mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub positions: HashMap<String, Position>,
    pub cash: Decimal,
    /// Fraction of equity held as cash.
    pub cash_weight: f64,
    /// Whether negative position weights are permitted.
    pub allow_short: bool,
}

impl Portfolio {
    /// Create an all-cash portfolio.
    pub fn all_cash(cash: Decimal) -> Self {
        Self {
            positions: HashMap::new(),
            cash,
            cash_weight: 1.0,
            allow_short: false,
        }
    }

    pub fn with_shorting(mut self) -> Self {
        self.allow_short = true;
        self
    }

    /// Weight of an instrument, zero when not held.
    pub fn weight(&self, instrument: &str) -> f64 {
        self.positions
            .get(instrument)
            .map(|p| p.weight)
            .unwrap_or(0.0)
    }

    /// Check the weight-sum invariant: position weights plus cash weight
    /// must equal one, and no weight may be negative unless shorting is
    /// enabled.
    pub fn weights_consistent(&self, epsilon: f64) -> bool {
        let sum: f64 = self.positions.values().map(|p| p.weight).sum::<f64>() + self.cash_weight;
        if (sum - 1.0).abs() > epsilon {
            return false;
        }
        if !self.allow_short {
            return self.positions.values().all(|p| p.weight >= -epsilon);
        }
        true
    }

    /// Total equity: cash plus position cost bases marked at supplied prices.
    pub fn equity(&self, prices: &HashMap<String, Decimal>) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .iter()
            .map(|(instrument, pos)| {
                prices
                    .get(instrument)
                    .map(|px| pos.quantity * *px)
                    .unwrap_or(pos.cost_basis)
            })
            .sum();
        self.cash + positions_value
    }
}

/// Immutable constraint set for one optimization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// Disallow negative weights.
    pub long_only: bool,
    /// Maximum gross exposure as a multiple of equity.
    pub max_leverage: f64,
    /// Maximum weight for any single position.
    pub max_position_weight: f64,
    /// Maximum combined weight per sector, when sectors are supplied.
    pub max_sector_weight: Option<f64>,
    /// Instrument -> sector labels used by the sector cap.
    #[serde(default)]
    pub sectors: HashMap<String, String>,
    /// Minimum acceptable expected portfolio return (per period).
    pub min_expected_return: Option<f64>,
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            long_only: true,
            max_leverage: 1.0,
            max_position_weight: 1.0,
            max_sector_weight: None,
            sectors: HashMap::new(),
            min_expected_return: None,
        }
    }
}

impl OptimizationConstraints {
    /// Long-only with a single-position cap.
    pub fn long_only_capped(max_position_weight: f64) -> Self {
        Self {
            max_position_weight,
            ..Default::default()
        }
    }

    /// Check internal consistency (a cap below 1/n can make the weight
    /// simplex empty; leverage and caps must be positive).
    pub fn validate(&self, universe_size: usize) -> std::result::Result<(), String> {
        if self.max_position_weight <= 0.0 {
            return Err(format!(
                "max_position_weight must be positive, got {}",
                self.max_position_weight
            ));
        }
        if self.max_leverage <= 0.0 {
            return Err(format!(
                "max_leverage must be positive, got {}",
                self.max_leverage
            ));
        }
        if let Some(cap) = self.max_sector_weight {
            if cap <= 0.0 {
                return Err(format!("max_sector_weight must be positive, got {}", cap));
            }
        }
        if universe_size > 0 && self.max_position_weight * (universe_size as f64) < 1.0 - WEIGHT_EPSILON
        {
            return Err(format!(
                "max_position_weight {} cannot sum to 1 over {} instruments",
                self.max_position_weight, universe_size
            ));
        }
        Ok(())
    }

    /// Check a weight vector against this constraint set.
    pub fn satisfied_by(&self, weights: &[f64]) -> ConstraintReport {
        let sum: f64 = weights.iter().sum();
        let gross: f64 = weights.iter().map(|w| w.abs()).sum();
        let fully_invested = (sum - 1.0).abs() <= WEIGHT_EPSILON;
        let long_only_ok = !self.long_only || weights.iter().all(|&w| w >= -WEIGHT_EPSILON);
        let position_cap_ok = weights
            .iter()
            .all(|&w| w.abs() <= self.max_position_weight + WEIGHT_EPSILON);
        let leverage_ok = gross <= self.max_leverage + WEIGHT_EPSILON;

        ConstraintReport {
            fully_invested,
            long_only_ok,
            position_cap_ok,
            leverage_ok,
        }
    }
}

/// Per-constraint satisfaction flags for an optimization result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub fully_invested: bool,
    pub long_only_ok: bool,
    pub position_cap_ok: bool,
    pub leverage_ok: bool,
}

impl ConstraintReport {
    pub fn all_satisfied(&self) -> bool {
        self.fully_invested && self.long_only_ok && self.position_cap_ok && self.leverage_ok
    }
}

/// Warnings attached to an optimization result instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationWarning {
    /// Iteration limit reached; the attached solution is the best feasible
    /// point found, not a certified optimum.
    NumericalNonConvergence,
    /// Correlation input required shrinkage regularization before use.
    CorrelationRegularized,
}

/// Weights and diagnostics produced by exactly one optimizer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Request identifier, shared with the orchestrator history entry.
    pub request_id: Uuid,
    /// Instruments in the same order as `weights`.
    pub universe: Vec<String>,
    /// Proposed portfolio weights.
    pub weights: Vec<f64>,
    /// Expected portfolio return per period under the scenario set.
    pub expected_return: f64,
    /// Risk metrics of the proposed allocation, when computable.
    pub metrics: Option<crate::metrics::RiskMetrics>,
    /// Constraint satisfaction flags.
    pub constraints: ConstraintReport,
    /// Optimizer that produced the weights.
    pub method: String,
    /// True when this result came from the HRP fallback path.
    pub fallback: bool,
    pub warnings: Vec<OptimizationWarning>,
    pub timestamp: DateTime<Utc>,
}

impl OptimizationResult {
    /// Weight for a given instrument, zero when absent from the universe.
    pub fn weight(&self, instrument: &str) -> f64 {
        self.universe
            .iter()
            .position(|i| i == instrument)
            .map(|idx| self.weights[idx])
            .unwrap_or(0.0)
    }
}

/// One planned trade inside a rebalance plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTrade {
    pub instrument: String,
    pub direction: Direction,
    /// Units to trade, always positive; direction carries the sign.
    pub quantity: Decimal,
    /// Trade value at the reference price.
    pub notional: Decimal,
    /// Estimated execution cost breakdown.
    pub cost: CostBreakdown,
}

/// The trades required to move a portfolio to a target allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub request_id: Uuid,
    pub trades: Vec<PlannedTrade>,
    pub timestamp: DateTime<Utc>,
}

impl RebalancePlan {
    /// Total estimated execution cost across all trades.
    pub fn total_cost(&self) -> Decimal {
        self.trades.iter().map(|t| t.cost.total()).sum()
    }

    /// Total traded notional.
    pub fn turnover(&self) -> Decimal {
        self.trades.iter().map(|t| t.notional).sum()
    }
}

/// Convert a statistical value into a currency amount.
///
/// Non-finite inputs map to zero rather than propagating NaN into
/// decimal accounting.
pub fn to_currency(value: f64) -> Decimal {
    if value.is_finite() {
        Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Convert a currency amount into a float for statistical use only.
pub fn to_stat(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
