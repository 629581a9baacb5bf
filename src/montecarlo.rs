//! Monte Carlo resampling of backtest outcomes.
//!
//! Block bootstrap over period returns: blocks of consecutive observations
//! are resampled with replacement, preserving the autocorrelation an i.i.d.
//! shuffle would destroy. Default block size is floor(√n). Each simulator
//! owns its explicitly seeded PRNG, so concurrent runs are reproducible and
//! independent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::BacktestResult;
use crate::error::{BallastError, Result};
use crate::metrics::max_drawdown;
use crate::pool::CancellationToken;
use crate::types::to_stat;

/// Percentiles reported for terminal equity and drawdown bands.
const BAND_PERCENTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

/// Monte Carlo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of resampled paths.
    pub num_paths: usize,
    /// PRNG seed; equal seeds give identical results.
    pub seed: u64,
    /// Block size override; floor(√n) when unset.
    pub block_size: Option<usize>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_paths: 1000,
            seed: 42,
            block_size: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_paths(mut self, num_paths: usize) -> Self {
        self.num_paths = num_paths;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }
}

/// A percentile band entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub percentile: f64,
    pub value: f64,
}

/// Distributional results over the resampled paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub config: MonteCarloConfig,
    pub num_paths: usize,
    /// Observations per path (input series length).
    pub observations: usize,
    pub block_size: usize,

    pub mean_terminal_equity: f64,
    pub median_terminal_equity: f64,
    /// Probability the path ends below the starting capital.
    pub prob_loss: f64,
    pub terminal_equity_bands: Vec<PercentileBand>,

    /// Mean of the worst drawdown across paths (negative fraction).
    pub mean_max_drawdown: f64,
    pub drawdown_bands: Vec<PercentileBand>,

    /// Mean of all resampled returns, for distribution-preservation checks.
    pub resampled_mean: f64,
    /// Variance of all resampled returns.
    pub resampled_variance: f64,
}

/// Block-bootstrap simulator.
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    /// Resample a backtest's period returns.
    pub fn simulate_result(&self, result: &BacktestResult) -> Result<MonteCarloResult> {
        self.simulate_returns(&result.period_returns(), to_stat(result.initial_capital))
    }

    /// Resample a raw return series from the given starting capital.
    pub fn simulate_returns(
        &self,
        returns: &[f64],
        initial_capital: f64,
    ) -> Result<MonteCarloResult> {
        self.simulate_cancellable(returns, initial_capital, &CancellationToken::new())
    }

    /// Resample with a cancellation checkpoint between paths.
    pub fn simulate_cancellable(
        &self,
        returns: &[f64],
        initial_capital: f64,
        token: &CancellationToken,
    ) -> Result<MonteCarloResult> {
        if returns.len() < 2 {
            return Err(BallastError::InsufficientData {
                required: 2,
                actual: returns.len(),
            });
        }
        if self.config.num_paths == 0 {
            return Err(BallastError::InvalidInput(
                "num_paths must be positive".to_string(),
            ));
        }

        let n = returns.len();
        let block_size = self.block_size(n);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut terminal_equities = Vec::with_capacity(self.config.num_paths);
        let mut worst_drawdowns = Vec::with_capacity(self.config.num_paths);
        let mut resampled_sum = 0.0;
        let mut resampled_sq_sum = 0.0;

        for _ in 0..self.config.num_paths {
            token.checkpoint()?;

            let path = block_resample(returns, block_size, &mut rng);
            let mut equity = initial_capital;
            let mut levels = Vec::with_capacity(n + 1);
            levels.push(equity);
            for &r in &path {
                equity *= 1.0 + r;
                levels.push(equity);
                resampled_sum += r;
                resampled_sq_sum += r * r;
            }
            terminal_equities.push(equity);
            worst_drawdowns.push(max_drawdown(&levels));
        }

        terminal_equities.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        worst_drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let total_samples = (self.config.num_paths * n) as f64;
        let resampled_mean = resampled_sum / total_samples;
        let resampled_variance =
            resampled_sq_sum / total_samples - resampled_mean * resampled_mean;

        let result = MonteCarloResult {
            config: self.config.clone(),
            num_paths: self.config.num_paths,
            observations: n,
            block_size,
            mean_terminal_equity: mean(&terminal_equities),
            median_terminal_equity: percentile(&terminal_equities, 0.5),
            prob_loss: terminal_equities
                .iter()
                .filter(|&&e| e < initial_capital)
                .count() as f64
                / self.config.num_paths as f64,
            terminal_equity_bands: bands(&terminal_equities),
            mean_max_drawdown: mean(&worst_drawdowns),
            drawdown_bands: bands(&worst_drawdowns),
            resampled_mean,
            resampled_variance,
        };

        info!(
            paths = result.num_paths,
            block_size,
            median = result.median_terminal_equity,
            "monte carlo complete"
        );
        Ok(result)
    }

    /// floor(√n) unless overridden, clamped to [1, n].
    fn block_size(&self, n: usize) -> usize {
        match self.config.block_size {
            Some(size) => size.clamp(1, n),
            None => ((n as f64).sqrt().floor() as usize).clamp(1, n),
        }
    }
}

/// Resample `returns` by concatenating random blocks until the original
/// length is reached.
fn block_resample(returns: &[f64], block_size: usize, rng: &mut StdRng) -> Vec<f64> {
    let n = returns.len();
    let max_start = n.saturating_sub(block_size) + 1;
    let mut path = Vec::with_capacity(n);
    while path.len() < n {
        let start = rng.gen_range(0..max_start);
        let end = (start + block_size).min(n);
        path.extend_from_slice(&returns[start..end]);
    }
    path.truncate(n);
    path
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile of sorted data.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn bands(sorted: &[f64]) -> Vec<PercentileBand> {
    BAND_PERCENTILES
        .iter()
        .map(|&p| PercentileBand {
            percentile: p,
            value: percentile(sorted, p),
        })
        .collect()
}
