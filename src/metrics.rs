//! Risk metric computation.
//!
//! [`RiskCalculator`] turns a return series into an immutable [`RiskMetrics`]
//! snapshot: VaR, CVaR, Sharpe, Sortino, max drawdown, beta and volatility,
//! tagged with the confidence level and lookback they were computed under.
//!
//! Losses are reported as positive magnitudes (the Rockafellar–Uryasev
//! convention, loss = −return), which keeps CVaR(c) ≥ VaR(c) for every
//! input, including a degenerate single-scenario series.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{BallastError, Result};

/// Default trading periods per year used for annualization.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VarMethod {
    /// Empirical quantile of the historical loss distribution.
    #[default]
    Historical,
    /// Normal approximation from sample mean and standard deviation.
    Parametric,
}

/// Immutable risk snapshot for one return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Value at risk, as a positive loss fraction.
    pub var: f64,
    /// Conditional value at risk (expected shortfall), ≥ `var`.
    pub cvar: f64,
    /// Annualized Sharpe ratio.
    pub sharpe: f64,
    /// Annualized Sortino ratio.
    pub sortino: f64,
    /// Maximum drawdown as a non-positive fraction (0 = never under water).
    pub max_drawdown: f64,
    /// Beta against the benchmark, when one was supplied.
    pub beta: Option<f64>,
    /// Annualized volatility.
    pub volatility: f64,
    /// Confidence level the tail metrics were computed at.
    pub confidence: f64,
    /// Number of observations used.
    pub lookback: usize,
    /// Annualization constant.
    pub periods_per_year: f64,
    /// Method used for the VaR estimate.
    pub var_method: VarMethod,
}

/// Configuration for risk metric computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCalculatorConfig {
    /// Confidence level for VaR/CVaR, in (0, 1).
    pub confidence: f64,
    /// Per-period risk-free rate.
    pub risk_free_rate: f64,
    /// Trading periods per year for annualization.
    pub periods_per_year: f64,
    pub var_method: VarMethod,
}

impl Default for RiskCalculatorConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            var_method: VarMethod::Historical,
        }
    }
}

/// Computes risk metrics from return observations.
#[derive(Debug, Clone, Default)]
pub struct RiskCalculator {
    config: RiskCalculatorConfig,
}

impl RiskCalculator {
    pub fn new(config: RiskCalculatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskCalculatorConfig {
        &self.config
    }

    /// Compute the full metric set for a return series.
    pub fn metrics(&self, returns: &[f64]) -> Result<RiskMetrics> {
        self.metrics_vs_benchmark(returns, None)
    }

    /// Compute metrics, including beta when a benchmark series of the same
    /// length is supplied.
    pub fn metrics_vs_benchmark(
        &self,
        returns: &[f64],
        benchmark: Option<&[f64]>,
    ) -> Result<RiskMetrics> {
        validate_confidence(self.config.confidence)?;
        if returns.len() < 2 {
            return Err(BallastError::InsufficientData {
                required: 2,
                actual: returns.len(),
            });
        }

        let var = self.value_at_risk(returns)?;
        let cvar = self.conditional_value_at_risk(returns)?;
        let volatility = std_dev(returns) * self.config.periods_per_year.sqrt();

        Ok(RiskMetrics {
            var,
            cvar,
            sharpe: self.sharpe(returns),
            sortino: self.sortino(returns),
            max_drawdown: max_drawdown_from_returns(returns),
            beta: benchmark.map(|b| beta(returns, b)).transpose()?,
            volatility,
            confidence: self.config.confidence,
            lookback: returns.len(),
            periods_per_year: self.config.periods_per_year,
            var_method: self.config.var_method,
        })
    }

    /// Value at risk as a positive loss fraction, using the configured
    /// method.
    pub fn value_at_risk(&self, returns: &[f64]) -> Result<f64> {
        validate_confidence(self.config.confidence)?;
        if returns.is_empty() {
            return Err(BallastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        match self.config.var_method {
            VarMethod::Historical => Ok(historical_var(returns, self.config.confidence)),
            VarMethod::Parametric => parametric_var(returns, self.config.confidence),
        }
    }

    /// Expected shortfall beyond VaR. Always ≥ the VaR estimate.
    pub fn conditional_value_at_risk(&self, returns: &[f64]) -> Result<f64> {
        let var = self.value_at_risk(returns)?;
        let tail: Vec<f64> = returns
            .iter()
            .map(|r| -r)
            .filter(|&loss| loss >= var - 1e-12)
            .collect();
        let cvar = if tail.is_empty() {
            var
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        };
        // The empirical tail mean can dip below the parametric quantile on
        // short series; the bound holds by construction either way.
        Ok(cvar.max(var))
    }

    /// Annualized Sharpe ratio.
    pub fn sharpe(&self, returns: &[f64]) -> f64 {
        let mean = mean(returns);
        let sd = std_dev(returns);
        if sd <= f64::EPSILON {
            return 0.0;
        }
        (mean - self.config.risk_free_rate) / sd * self.config.periods_per_year.sqrt()
    }

    /// Annualized Sortino ratio (downside deviation below the risk-free
    /// rate).
    pub fn sortino(&self, returns: &[f64]) -> f64 {
        let mean = mean(returns);
        let downside: Vec<f64> = returns
            .iter()
            .map(|r| (r - self.config.risk_free_rate).min(0.0))
            .collect();
        let downside_var = downside.iter().map(|d| d * d).sum::<f64>() / returns.len() as f64;
        let downside_dev = downside_var.sqrt();
        if downside_dev <= f64::EPSILON {
            return 0.0;
        }
        (mean - self.config.risk_free_rate) / downside_dev * self.config.periods_per_year.sqrt()
    }
}

fn validate_confidence(confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(BallastError::InvalidConfidenceLevel(confidence));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Empirical c-quantile of the loss distribution.
fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    let mut losses: Vec<f64> = returns.iter().map(|r| -r).collect();
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (confidence * (losses.len() - 1) as f64).round() as usize;
    losses[idx.min(losses.len() - 1)]
}

/// Normal-approximation VaR: loss magnitude of μ − z(c)·σ.
fn parametric_var(returns: &[f64], confidence: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| BallastError::InvalidInput(format!("normal distribution: {}", e)))?;
    let z = normal.inverse_cdf(confidence);
    Ok(z * std_dev(returns) - mean(returns))
}

/// Maximum peak-to-trough drawdown of an equity sequence, as a non-positive
/// fraction. A monotonically non-decreasing sequence yields 0.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst
}

/// Max drawdown of the cumulative equity curve implied by a return series.
pub fn max_drawdown_from_returns(returns: &[f64]) -> f64 {
    let mut equity = Vec::with_capacity(returns.len() + 1);
    let mut level = 1.0;
    equity.push(level);
    for r in returns {
        level *= 1.0 + r;
        equity.push(level);
    }
    max_drawdown(&equity)
}

/// Beta of a return series against a benchmark.
pub fn beta(returns: &[f64], benchmark: &[f64]) -> Result<f64> {
    if returns.len() != benchmark.len() {
        return Err(BallastError::InvalidInput(format!(
            "benchmark length mismatch: {} vs {}",
            returns.len(),
            benchmark.len()
        )));
    }
    if returns.len() < 2 {
        return Err(BallastError::InsufficientData {
            required: 2,
            actual: returns.len(),
        });
    }
    let mean_r = mean(returns);
    let mean_b = mean(benchmark);
    let mut covariance = 0.0;
    let mut bench_variance = 0.0;
    for (r, b) in returns.iter().zip(benchmark) {
        covariance += (r - mean_r) * (b - mean_b);
        bench_variance += (b - mean_b).powi(2);
    }
    if bench_variance <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok(covariance / bench_variance)
}
