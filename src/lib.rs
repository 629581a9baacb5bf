//! Ballast - a risk-adjusted portfolio management engine.
//!
//! # Overview
//!
//! Ballast turns candidate trading signals and historical return series into
//! risk-aware position sizes and portfolio allocations, validates those
//! allocations against tail-risk constraints, and certifies strategies via
//! historical simulation:
//!
//! - **Risk metrics**: VaR (historical and parametric), CVaR, Sharpe,
//!   Sortino, max drawdown, beta
//! - **Tail-risk optimization**: scenario-based Rockafellar–Uryasev CVaR
//!   programs solved by an embedded simplex, with efficient-frontier sweeps
//! - **Hierarchical Risk Parity**: Ward-linkage correlation clustering and
//!   recursive bisection, no expected-return forecasts required
//! - **Position sizing**: capped Kelly, CVaR budget, risk parity and
//!   volatility targeting, with raw and clamped weights both observable
//! - **Execution costs**: square-root market-impact model with a
//!   fixed/impact/spread breakdown in decimal currency
//! - **Orchestration**: a state machine per optimization request with
//!   recorded HRP fallback on infeasible tail programs
//! - **Strategy certification**: replay, walk-forward, block-bootstrap
//!   Monte Carlo, and seeded genetic parameter search, with post-hoc bias
//!   detection
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ballast::orchestrator::{
//!     OptimizationOutcome, OptimizationRequest, Orchestrator, OptimizerMethod,
//! };
//! use ballast::series::ReturnSeriesStore;
//! use ballast::types::OptimizationConstraints;
//!
//! let store = Arc::new(ReturnSeriesStore::new());
//! // ... insert ReturnSeries per instrument ...
//! let orchestrator = Orchestrator::with_defaults(store);
//!
//! let request = OptimizationRequest {
//!     universe: vec!["AAPL".to_string(), "MSFT".to_string()],
//!     constraints: OptimizationConstraints::default(),
//!     method: OptimizerMethod::Hrp,
//!     lookback: 252,
//! };
//! match orchestrator.optimize(&request) {
//!     OptimizationOutcome::Success(result) => println!("{:?}", result.weights),
//!     OptimizationOutcome::Fallback(result) => println!("fallback: {:?}", result.weights),
//!     OptimizationOutcome::Infeasible { reason } => eprintln!("infeasible: {}", reason),
//!     OptimizationOutcome::Failed { reason } => eprintln!("failed: {}", reason),
//! }
//! ```
//!
//! # Modules
//!
//! - [`series`]: return series storage, alignment, market-data traits
//! - [`metrics`]: risk metric computation
//! - [`matrix`]: covariance/correlation estimation and regularization
//! - [`costs`]: transaction cost model
//! - [`sizing`]: position sizing
//! - [`hrp`]: hierarchical risk parity
//! - [`cvar`]: scenario CVaR optimization ([`lp`] holds the solver)
//! - [`orchestrator`]: request state machine, fallback, rebalance plans
//! - [`backtest`]: historical replay engine
//! - [`walkforward`]: in-sample/out-of-sample validation
//! - [`montecarlo`]: block-bootstrap resampling
//! - [`genetic`]: evolutionary parameter search
//! - [`validation`]: look-ahead/survivorship/data-gap checks
//! - [`monitor`]: risk-alert pub/sub stream
//! - [`cache`]: content-addressed TTL result cache
//! - [`pool`]: bounded worker pool and cancellation
//! - [`config`]: TOML configuration surface

pub mod backtest;
pub mod cache;
pub mod config;
pub mod costs;
pub mod cvar;
pub mod error;
pub mod genetic;
pub mod hrp;
pub mod lp;
pub mod matrix;
pub mod metrics;
pub mod monitor;
pub mod montecarlo;
pub mod orchestrator;
pub mod pool;
pub mod series;
pub mod sizing;
pub mod strategy;
pub mod types;
pub mod validation;
pub mod walkforward;

// Re-exports for convenience
pub use backtest::{BacktestConfiguration, BacktestEngine, BacktestResult};
pub use error::{BallastError, Result};
pub use metrics::{RiskCalculator, RiskCalculatorConfig, RiskMetrics, VarMethod};
pub use orchestrator::{
    OptimizationOutcome, OptimizationRequest, Orchestrator, OptimizerMethod,
};
pub use series::{MarketDataProvider, ReturnSeries, ReturnSeriesStore};
pub use strategy::{Strategy, StrategyContext};
pub use types::{
    OptimizationConstraints, OptimizationResult, Portfolio, Position, RebalancePlan, Signal,
};

// Risk monitoring
pub use monitor::{AlertSeverity, MonitoredMetric, RiskAlert, RiskLimits, RiskMonitor};

// Optimizers
pub use cvar::{CvarOptimizer, CvarOptimizerConfig, CvarVariant};
pub use hrp::{HrpAllocation, HrpOptimizer};

// Sizing
pub use sizing::{PositionSizer, PositionSizerConfig, SizingMethod};

// Certification tooling
pub use genetic::{GeneticConfig, GeneticSearch, ParameterBounds};
pub use montecarlo::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator};
pub use walkforward::{TuneMetric, WalkForwardAnalyzer, WalkForwardConfig, WalkForwardResult};

// Execution resources
pub use pool::{BacktestPool, CancellationToken};
