//! Portfolio optimization orchestration.
//!
//! One [`Orchestrator`] instance owns the optimizers, the cost model and a
//! result cache, and drives each request through an explicit state machine:
//!
//! ```text
//! Received → Validating → Optimizing → ConstraintChecking
//!                                        → Completed | Fallback | Failed
//! ```
//!
//! Infeasible CVaR programs are recovered locally: the request transitions
//! to `Fallback`, reruns under HRP, and the fallback is recorded in the
//! result metadata rather than hidden. Commands (run an optimization) and
//! queries (inspect the last result, list history) are separate entry
//! points over the same store.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::cache::{cache_key, CacheConfig, ComputeCache};
use crate::costs::{OrderEstimate, TransactionCostModel};
use crate::cvar::{CvarOptimizer, CvarVariant};
use crate::error::{BallastError, Result};
use crate::hrp::HrpOptimizer;
use crate::metrics::{RiskCalculator, RiskCalculatorConfig, RiskMetrics};
use crate::series::{MarketDataProvider, ReturnSeriesStore};
use crate::types::{
    to_currency, to_stat, Direction, OptimizationConstraints, OptimizationResult,
    OptimizationWarning, PlannedTrade, Portfolio, RebalancePlan,
};

/// Lifecycle states of one optimization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Received,
    Validating,
    Optimizing,
    ConstraintChecking,
    Completed,
    Fallback,
    Failed,
}

/// Which optimizer a request runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OptimizerMethod {
    /// Hierarchical risk parity only.
    Hrp,
    /// Scenario CVaR program.
    Cvar(CvarVariant),
    /// Weighted blend of HRP and CVaR weights; `cvar_weight` ∈ [0, 1].
    Hybrid {
        cvar_weight: f64,
        variant: CvarVariant,
    },
}

impl OptimizerMethod {
    fn label(&self) -> &'static str {
        match self {
            OptimizerMethod::Hrp => "hrp",
            OptimizerMethod::Cvar(_) => "cvar",
            OptimizerMethod::Hybrid { .. } => "hybrid",
        }
    }
}

/// The outcome a caller must match on. Infeasibility and failure are
/// ordinary branches, not exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OptimizationOutcome {
    Success(OptimizationResult),
    /// CVaR was infeasible; these weights come from the HRP fallback.
    Fallback(OptimizationResult),
    Infeasible { reason: String },
    Failed { reason: String },
}

impl OptimizationOutcome {
    pub fn result(&self) -> Option<&OptimizationResult> {
        match self {
            OptimizationOutcome::Success(result) | OptimizationOutcome::Fallback(result) => {
                Some(result)
            }
            _ => None,
        }
    }
}

/// One optimization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub universe: Vec<String>,
    pub constraints: OptimizationConstraints,
    pub method: OptimizerMethod,
    /// Observations of aligned history to optimize over.
    pub lookback: usize,
}

/// History entry for the query side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: Uuid,
    pub method: String,
    pub final_state: RequestState,
    pub fallback: bool,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub risk: RiskCalculatorConfig,
    /// History entries retained for queries.
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            risk: RiskCalculatorConfig::default(),
            history_limit: 128,
        }
    }
}

/// Owns the optimization pipeline for one deployment.
pub struct Orchestrator {
    store: Arc<ReturnSeriesStore>,
    hrp: HrpOptimizer,
    cvar: CvarOptimizer,
    calculator: RiskCalculator,
    cost_model: TransactionCostModel,
    cache: ComputeCache<OptimizationResult>,
    history: Mutex<Vec<HistoryEntry>>,
    last_result: Mutex<Option<OptimizationResult>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ReturnSeriesStore>,
        cvar: CvarOptimizer,
        cost_model: TransactionCostModel,
        cache_config: CacheConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            hrp: HrpOptimizer::new(),
            cvar,
            calculator: RiskCalculator::new(config.risk.clone()),
            cost_model,
            cache: ComputeCache::new(cache_config),
            history: Mutex::new(Vec::new()),
            last_result: Mutex::new(None),
            config,
        }
    }

    /// Convenience constructor with default sub-components.
    pub fn with_defaults(store: Arc<ReturnSeriesStore>) -> Self {
        Self::new(
            store,
            CvarOptimizer::default(),
            TransactionCostModel::default(),
            CacheConfig::default(),
            OrchestratorConfig::default(),
        )
    }

    // ----- command side -------------------------------------------------

    /// Run one optimization request through the state machine.
    pub fn optimize(&self, request: &OptimizationRequest) -> OptimizationOutcome {
        let span = info_span!("optimize", method = request.method.label());
        let _entered = span.enter();

        let request_id = Uuid::new_v4();
        let mut state = RequestState::Received;

        let outcome = self.drive(request, request_id, &mut state);

        let (final_state, fallback) = match &outcome {
            OptimizationOutcome::Success(_) => (RequestState::Completed, false),
            OptimizationOutcome::Fallback(_) => (RequestState::Fallback, true),
            OptimizationOutcome::Infeasible { .. } => (RequestState::Failed, false),
            OptimizationOutcome::Failed { .. } => (RequestState::Failed, false),
        };
        self.record(request_id, request, final_state, fallback, &outcome);
        outcome
    }

    /// Cached variant: identical requests inside the TTL window share one
    /// computation.
    pub fn optimize_cached(&self, request: &OptimizationRequest) -> OptimizationOutcome {
        let key = cache_key(
            &(&request.universe, &request.constraints, &request.method),
            request.lookback,
        );
        let computed = self.cache.get_or_compute(&key, || {
            match self.optimize(request) {
                OptimizationOutcome::Success(result) | OptimizationOutcome::Fallback(result) => {
                    Ok(result)
                }
                OptimizationOutcome::Infeasible { reason } => {
                    Err(BallastError::Infeasible(reason))
                }
                OptimizationOutcome::Failed { reason } => {
                    Err(BallastError::InvalidInput(reason))
                }
            }
        });
        match computed {
            Ok(result) if result.fallback => OptimizationOutcome::Fallback(result),
            Ok(result) => OptimizationOutcome::Success(result),
            Err(BallastError::Infeasible(reason)) => OptimizationOutcome::Infeasible { reason },
            Err(error) => OptimizationOutcome::Failed {
                reason: error.to_string(),
            },
        }
    }

    /// Convert an optimization result into a rebalance plan against the
    /// current portfolio, pricing every trade through the cost model.
    pub fn rebalance_plan(
        &self,
        result: &OptimizationResult,
        portfolio: &Portfolio,
        prices: &HashMap<String, Decimal>,
        provider: &dyn MarketDataProvider,
    ) -> Result<RebalancePlan> {
        let span = info_span!("rebalance_plan");
        let _entered = span.enter();

        let equity = portfolio.equity(prices);
        let mut trades = Vec::new();

        for (instrument, &target_weight) in result.universe.iter().zip(&result.weights) {
            let current_weight = portfolio.weight(instrument);
            let delta = target_weight - current_weight;
            if delta.abs() < crate::types::WEIGHT_EPSILON {
                continue;
            }

            let price = prices.get(instrument).copied().ok_or_else(|| {
                BallastError::DataError(format!("no price for instrument: {}", instrument))
            })?;
            if price <= Decimal::ZERO {
                return Err(BallastError::InvalidInput(format!(
                    "non-positive price for {}",
                    instrument
                )));
            }

            let notional = equity * to_currency(delta.abs());
            let quantity = notional / price;

            let volatility = provider.volatility(instrument)?;
            let adv = provider.average_daily_volume(instrument)?;
            let cost = self.cost_model.estimate(
                instrument,
                &OrderEstimate {
                    quantity: to_stat(quantity),
                    price: to_stat(price),
                    volatility,
                    average_daily_volume: adv,
                },
            )?;

            trades.push(PlannedTrade {
                instrument: instrument.clone(),
                direction: if delta > 0.0 {
                    Direction::Long
                } else {
                    Direction::Short
                },
                quantity,
                notional,
                cost,
            });
        }

        Ok(RebalancePlan {
            request_id: result.request_id,
            trades,
            timestamp: Utc::now(),
        })
    }

    // ----- query side ---------------------------------------------------

    /// Risk metrics of an existing portfolio over a lookback window, at the
    /// given confidence level. Read-only; does not touch optimization
    /// state.
    pub fn risk_metrics(
        &self,
        portfolio: &Portfolio,
        confidence: f64,
        window: usize,
    ) -> Result<RiskMetrics> {
        let span = info_span!("risk_metrics");
        let _entered = span.enter();

        let mut instruments: Vec<String> = portfolio.positions.keys().cloned().collect();
        instruments.sort();
        if instruments.is_empty() {
            return Err(BallastError::InvalidInput(
                "portfolio holds no positions".to_string(),
            ));
        }

        let aligned = self.store.aligned(&instruments, window)?;
        let portfolio_returns: Vec<f64> = (0..aligned.observations())
            .map(|t| {
                aligned
                    .instruments
                    .iter()
                    .zip(&aligned.rows)
                    .map(|(name, row)| portfolio.weight(name) * row[t])
                    .sum()
            })
            .collect();

        let calculator = RiskCalculator::new(RiskCalculatorConfig {
            confidence,
            ..self.config.risk.clone()
        });
        calculator.metrics(&portfolio_returns)
    }

    /// The most recent completed or fallback result.
    pub fn last_result(&self) -> Option<OptimizationResult> {
        self.last_result.lock().unwrap().clone()
    }

    /// Request history, newest last.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    // ----- internals ----------------------------------------------------

    fn drive(
        &self,
        request: &OptimizationRequest,
        request_id: Uuid,
        state: &mut RequestState,
    ) -> OptimizationOutcome {
        *state = RequestState::Validating;
        if request.universe.is_empty() {
            return OptimizationOutcome::Failed {
                reason: "empty instrument universe".to_string(),
            };
        }
        if let Err(reason) = request.constraints.validate(request.universe.len()) {
            return OptimizationOutcome::Failed { reason };
        }
        if let OptimizerMethod::Hybrid { cvar_weight, .. } = &request.method {
            if !(0.0..=1.0).contains(cvar_weight) {
                return OptimizationOutcome::Failed {
                    reason: format!("hybrid cvar_weight {} outside [0, 1]", cvar_weight),
                };
            }
        }

        *state = RequestState::Optimizing;
        let aligned = match self
            .store
            .aligned(&request.universe, request.lookback)
        {
            Ok(aligned) => aligned,
            Err(error) => {
                return OptimizationOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        };

        let mut warnings = Vec::new();
        let mut fallback = false;

        let weights = match &request.method {
            OptimizerMethod::Hrp => match self.run_hrp(&aligned, &mut warnings) {
                Ok(weights) => weights,
                Err(error) => return self.hard_failure(error),
            },
            OptimizerMethod::Cvar(variant) => {
                match self.run_cvar(request, &aligned, variant, &mut warnings) {
                    Ok(weights) => weights,
                    Err(BallastError::Infeasible(reason)) => {
                        warn!(%reason, "CVaR infeasible, falling back to HRP");
                        fallback = true;
                        match self.run_hrp(&aligned, &mut warnings) {
                            Ok(weights) => weights,
                            Err(error) => {
                                return OptimizationOutcome::Infeasible {
                                    reason: format!(
                                        "CVaR infeasible ({}); HRP fallback failed: {}",
                                        reason, error
                                    ),
                                }
                            }
                        }
                    }
                    Err(error) => return self.hard_failure(error),
                }
            }
            OptimizerMethod::Hybrid {
                cvar_weight,
                variant,
            } => {
                let hrp_weights = match self.run_hrp(&aligned, &mut warnings) {
                    Ok(weights) => weights,
                    Err(error) => return self.hard_failure(error),
                };
                match self.run_cvar(request, &aligned, variant, &mut warnings) {
                    Ok(cvar_weights) => hrp_weights
                        .iter()
                        .zip(&cvar_weights)
                        .map(|(h, c)| (1.0 - cvar_weight) * h + cvar_weight * c)
                        .collect(),
                    Err(BallastError::Infeasible(reason)) => {
                        warn!(%reason, "hybrid CVaR leg infeasible, using pure HRP");
                        fallback = true;
                        hrp_weights
                    }
                    Err(error) => return self.hard_failure(error),
                }
            }
        };

        *state = RequestState::ConstraintChecking;
        let constraint_report = request.constraints.satisfied_by(&weights);

        let scenarios = aligned.scenarios();
        let portfolio_returns: Vec<f64> = scenarios
            .iter()
            .map(|row| row.iter().zip(&weights).map(|(r, w)| r * w).sum())
            .collect();
        let expected_return = if portfolio_returns.is_empty() {
            0.0
        } else {
            portfolio_returns.iter().sum::<f64>() / portfolio_returns.len() as f64
        };
        let metrics = self.portfolio_metrics(&portfolio_returns);

        let result = OptimizationResult {
            request_id,
            universe: request.universe.clone(),
            weights,
            expected_return,
            metrics,
            constraints: constraint_report,
            method: request.method.label().to_string(),
            fallback,
            warnings,
            timestamp: Utc::now(),
        };

        info!(
            request_id = %request_id,
            fallback,
            satisfied = constraint_report.all_satisfied(),
            "optimization finished"
        );

        if fallback {
            OptimizationOutcome::Fallback(result)
        } else {
            OptimizationOutcome::Success(result)
        }
    }

    fn run_hrp(
        &self,
        aligned: &crate::series::AlignedReturns,
        warnings: &mut Vec<OptimizationWarning>,
    ) -> Result<Vec<f64>> {
        let allocation = self
            .hrp
            .allocate_from_rows(&aligned.instruments, &aligned.rows)?;
        if allocation.regularized {
            warnings.push(OptimizationWarning::CorrelationRegularized);
        }
        Ok(allocation.weights)
    }

    fn run_cvar(
        &self,
        request: &OptimizationRequest,
        aligned: &crate::series::AlignedReturns,
        variant: &CvarVariant,
        warnings: &mut Vec<OptimizationWarning>,
    ) -> Result<Vec<f64>> {
        let scenarios = aligned.scenarios();
        let solution = self.cvar.optimize(
            &request.universe,
            &scenarios,
            &request.constraints,
            variant,
        )?;
        if !solution.converged {
            warnings.push(OptimizationWarning::NumericalNonConvergence);
        }
        Ok(solution.weights)
    }

    fn portfolio_metrics(&self, portfolio_returns: &[f64]) -> Option<RiskMetrics> {
        self.calculator.metrics(portfolio_returns).ok()
    }

    fn hard_failure(&self, error: BallastError) -> OptimizationOutcome {
        OptimizationOutcome::Failed {
            reason: error.to_string(),
        }
    }

    fn record(
        &self,
        request_id: Uuid,
        request: &OptimizationRequest,
        final_state: RequestState,
        fallback: bool,
        outcome: &OptimizationOutcome,
    ) {
        let mut history = self.history.lock().unwrap();
        history.push(HistoryEntry {
            request_id,
            method: request.method.label().to_string(),
            final_state,
            fallback,
            timestamp: Utc::now(),
        });
        let overflow = history.len().saturating_sub(self.config.history_limit);
        if overflow > 0 {
            history.drain(..overflow);
        }
        drop(history);

        if let Some(result) = outcome.result() {
            *self.last_result.lock().unwrap() = Some(result.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::ReturnSeries;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn seeded_store() -> Arc<ReturnSeriesStore> {
        let mut store = ReturnSeriesStore::new();
        // Deterministic pseudo-returns; enough observations for alignment.
        for (name, scale, drift) in [
            ("STEADY", 0.004_f64, 0.002_f64),
            ("WILD", 0.03, 0.001),
            ("MID", 0.012, 0.0015),
        ] {
            let timestamps: Vec<_> = (0..60)
                .map(|i| {
                    chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::days(i)
                })
                .collect();
            let values: Vec<f64> = (0..60)
                .map(|i| {
                    let wave = ((i * 7 + name.len() * 13) % 11) as f64 / 11.0 - 0.5;
                    drift + scale * wave
                })
                .collect();
            store.insert(ReturnSeries::from_values(name, &timestamps, &values).unwrap());
        }
        Arc::new(store)
    }

    fn request(method: OptimizerMethod) -> OptimizationRequest {
        OptimizationRequest {
            universe: vec![
                "STEADY".to_string(),
                "WILD".to_string(),
                "MID".to_string(),
            ],
            constraints: OptimizationConstraints::default(),
            method,
            lookback: 60,
        }
    }

    #[test]
    fn test_hrp_request_completes() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let outcome = orchestrator.optimize(&request(OptimizerMethod::Hrp));

        let result = match outcome {
            OptimizationOutcome::Success(result) => result,
            other => panic!("expected success, got {:?}", other),
        };
        let sum: f64 = result.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(result.weights.iter().all(|&w| w >= 0.0));
        assert!(result.constraints.all_satisfied());
        assert!(!result.fallback);
        assert!(result.metrics.is_some());
    }

    #[test]
    fn test_cvar_request_completes() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let outcome = orchestrator.optimize(&request(OptimizerMethod::Cvar(CvarVariant::MinCvar)));

        let result = match outcome {
            OptimizationOutcome::Success(result) => result,
            other => panic!("expected success, got {:?}", other),
        };
        let sum: f64 = result.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_cvar_falls_back_to_hrp() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let mut req = request(OptimizerMethod::Cvar(CvarVariant::MinCvar));
        // Daily returns are fractions of a percent; 50% per period is
        // unreachable.
        req.constraints.min_expected_return = Some(0.5);

        let outcome = orchestrator.optimize(&req);
        let result = match outcome {
            OptimizationOutcome::Fallback(result) => result,
            other => panic!("expected fallback, got {:?}", other),
        };
        assert!(result.fallback);
        assert_eq!(result.method, "cvar");
        let sum: f64 = result.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);

        // History records the fallback.
        let history = orchestrator.history();
        assert_eq!(history.last().unwrap().final_state, RequestState::Fallback);
        assert!(history.last().unwrap().fallback);
    }

    #[test]
    fn test_empty_universe_fails() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let mut req = request(OptimizerMethod::Hrp);
        req.universe.clear();

        let outcome = orchestrator.optimize(&req);
        assert!(matches!(outcome, OptimizationOutcome::Failed { .. }));
    }

    #[test]
    fn test_inconsistent_constraints_fail() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let mut req = request(OptimizerMethod::Hrp);
        // 3 instruments capped at 10% cannot sum to 1.
        req.constraints.max_position_weight = 0.1;

        let outcome = orchestrator.optimize(&req);
        assert!(matches!(outcome, OptimizationOutcome::Failed { .. }));
    }

    #[test]
    fn test_hybrid_blends_weights() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let hrp = orchestrator.optimize(&request(OptimizerMethod::Hrp));
        let cvar = orchestrator.optimize(&request(OptimizerMethod::Cvar(CvarVariant::MinCvar)));
        let hybrid = orchestrator.optimize(&request(OptimizerMethod::Hybrid {
            cvar_weight: 0.5,
            variant: CvarVariant::MinCvar,
        }));

        let hrp_w = &hrp.result().unwrap().weights;
        let cvar_w = &cvar.result().unwrap().weights;
        let hybrid_w = &hybrid.result().unwrap().weights;
        for i in 0..3 {
            let expected = 0.5 * hrp_w[i] + 0.5 * cvar_w[i];
            assert!((hybrid_w[i] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_query_side_sees_last_result() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        assert!(orchestrator.last_result().is_none());

        orchestrator.optimize(&request(OptimizerMethod::Hrp));
        let last = orchestrator.last_result().unwrap();
        assert_eq!(last.method, "hrp");
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[test]
    fn test_cached_requests_share_computation() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());
        let req = request(OptimizerMethod::Hrp);

        let first = orchestrator.optimize_cached(&req);
        let second = orchestrator.optimize_cached(&req);

        let first_id = first.result().unwrap().request_id;
        let second_id = second.result().unwrap().request_id;
        // Same cached result object, so the request id is shared.
        assert_eq!(first_id, second_id);
        // Only the first call went through the state machine.
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[test]
    fn test_risk_metrics_query() {
        let orchestrator = Orchestrator::with_defaults(seeded_store());

        let mut portfolio = Portfolio::all_cash(dec!(100_000));
        portfolio.positions.insert(
            "STEADY".to_string(),
            crate::types::Position::new(dec!(600), 0.6, dec!(60_000)),
        );
        portfolio.positions.insert(
            "WILD".to_string(),
            crate::types::Position::new(dec!(400), 0.4, dec!(40_000)),
        );
        portfolio.cash_weight = 0.0;

        let metrics = orchestrator.risk_metrics(&portfolio, 0.9, 60).unwrap();
        assert!((metrics.confidence - 0.9).abs() < 1e-12);
        assert_eq!(metrics.lookback, 60);
        assert!(metrics.cvar >= metrics.var);

        // No positions: the query is rejected, not defaulted.
        let empty = Portfolio::all_cash(dec!(100));
        assert!(orchestrator.risk_metrics(&empty, 0.9, 60).is_err());
    }

    #[test]
    fn test_rebalance_plan_prices_trades() {
        let store = seeded_store();
        let orchestrator = Orchestrator::with_defaults(Arc::clone(&store));
        let outcome = orchestrator.optimize(&request(OptimizerMethod::Hrp));
        let result = outcome.result().unwrap();

        let portfolio = Portfolio::all_cash(dec!(1_000_000));
        let mut prices = HashMap::new();
        prices.insert("STEADY".to_string(), dec!(100));
        prices.insert("WILD".to_string(), dec!(50));
        prices.insert("MID".to_string(), dec!(200));

        struct FixedProvider(Arc<ReturnSeriesStore>);
        impl MarketDataProvider for FixedProvider {
            fn return_series(
                &self,
                instrument: &str,
                window: usize,
            ) -> crate::error::Result<ReturnSeries> {
                self.0.return_series(instrument, window)
            }
            fn volatility(&self, instrument: &str) -> crate::error::Result<f64> {
                self.0.volatility(instrument)
            }
            fn average_daily_volume(&self, _instrument: &str) -> crate::error::Result<f64> {
                Ok(1_000_000.0)
            }
        }

        let plan = orchestrator
            .rebalance_plan(result, &portfolio, &prices, &FixedProvider(store))
            .unwrap();

        // All-cash start: every nonzero weight becomes a buy.
        assert!(!plan.trades.is_empty());
        for trade in &plan.trades {
            assert_eq!(trade.direction, Direction::Long);
            assert!(trade.quantity > Decimal::ZERO);
            assert!(trade.cost.total() > Decimal::ZERO);
        }
        assert!(plan.total_cost() > Decimal::ZERO);
        assert!(plan.turnover() > Decimal::ZERO);
    }
}
