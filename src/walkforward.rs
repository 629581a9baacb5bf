//! Walk-forward analysis.
//!
//! History is partitioned into in-sample/out-of-sample windows; parameters
//! tuned in-sample are evaluated out-of-sample, and the efficiency ratio
//! (OOS performance over IS performance) flags overfitting. Partitioning is
//! a pure function of the data length and the configuration, so re-running
//! produces identical windows and results.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::{BacktestConfiguration, BacktestEngine, BacktestResult};
use crate::error::{BallastError, Result};
use crate::series::ReturnSeriesStore;
use crate::strategy::Strategy;

/// Walk-forward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Number of windows.
    pub num_windows: usize,
    /// Fraction of each window used in-sample.
    pub in_sample_ratio: f64,
    /// Anchored windows grow the in-sample from the start of history;
    /// rolling windows slide.
    pub anchored: bool,
    /// Minimum periods a window must contain.
    pub min_periods_per_window: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            num_windows: 5,
            in_sample_ratio: 0.7,
            anchored: false,
            min_periods_per_window: 50,
        }
    }
}

impl WalkForwardConfig {
    pub fn new(num_windows: usize, in_sample_ratio: f64) -> Result<Self> {
        if num_windows == 0 {
            return Err(BallastError::InvalidInput(
                "num_windows must be positive".to_string(),
            ));
        }
        if !(in_sample_ratio > 0.0 && in_sample_ratio < 1.0) {
            return Err(BallastError::InvalidInput(format!(
                "in_sample_ratio {} outside (0, 1)",
                in_sample_ratio
            )));
        }
        Ok(Self {
            num_windows,
            in_sample_ratio,
            ..Default::default()
        })
    }

    pub fn with_anchored(mut self) -> Self {
        self.anchored = true;
        self
    }
}

/// Metric maximized during in-sample tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TuneMetric {
    #[default]
    Sharpe,
    Sortino,
    Return,
}

impl TuneMetric {
    pub fn extract(&self, result: &BacktestResult) -> f64 {
        match self {
            TuneMetric::Sharpe => result.sharpe,
            TuneMetric::Sortino => result.sortino,
            TuneMetric::Return => result.total_return_pct,
        }
    }
}

/// One in-sample/out-of-sample partition, expressed in period indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub index: usize,
    pub is_start: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
}

impl WalkForwardWindow {
    pub fn is_periods(&self) -> usize {
        self.is_end - self.is_start + 1
    }

    pub fn oos_periods(&self) -> usize {
        self.oos_end - self.oos_start + 1
    }
}

/// Results from one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub window: WalkForwardWindow,
    /// Index of the winning parameter set in the candidate list.
    pub best_param_index: usize,
    pub in_sample: BacktestResult,
    pub out_of_sample: BacktestResult,
    /// OOS return over IS return.
    pub efficiency_ratio: f64,
}

/// Aggregate walk-forward results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub config: WalkForwardConfig,
    pub windows: Vec<WindowResult>,
    pub avg_is_return: f64,
    pub avg_oos_return: f64,
    pub avg_efficiency_ratio: f64,
    /// Compounded OOS return over compounded IS return.
    pub walk_forward_efficiency: f64,
}

impl WalkForwardResult {
    /// Positive OOS performance with efficiency above the threshold.
    pub fn is_robust(&self, min_efficiency: f64) -> bool {
        self.avg_oos_return > 0.0 && self.walk_forward_efficiency >= min_efficiency
    }
}

/// Runs walk-forward analysis over a parameterized strategy family.
pub struct WalkForwardAnalyzer {
    config: WalkForwardConfig,
    backtest: BacktestConfiguration,
}

impl WalkForwardAnalyzer {
    pub fn new(config: WalkForwardConfig, backtest: BacktestConfiguration) -> Self {
        Self { config, backtest }
    }

    /// Compute window partitions for a data length. Pure and deterministic.
    pub fn calculate_windows(&self, periods: usize) -> Result<Vec<WalkForwardWindow>> {
        let needed = self.config.min_periods_per_window * self.config.num_windows;
        if periods < needed {
            return Err(BallastError::InsufficientData {
                required: needed,
                actual: periods,
            });
        }

        let window_size = periods / self.config.num_windows;
        let is_size =
            ((window_size as f64 * self.config.in_sample_ratio) as usize).max(2);
        let oos_size = window_size.saturating_sub(is_size).max(1);

        let mut windows = Vec::with_capacity(self.config.num_windows);
        for i in 0..self.config.num_windows {
            let window_start = if self.config.anchored { 0 } else { i * window_size };
            let window_end = ((i + 1) * window_size - 1).min(periods - 1);
            let is_end = window_end - oos_size;
            if is_end <= window_start || is_end + 1 > window_end {
                warn!(window = i, "window too small, skipped");
                continue;
            }
            windows.push(WalkForwardWindow {
                index: i,
                is_start: window_start,
                is_end,
                oos_start: is_end + 1,
                oos_end: window_end,
            });
        }

        if windows.is_empty() {
            return Err(BallastError::DataError(
                "no valid walk-forward windows".to_string(),
            ));
        }
        Ok(windows)
    }

    /// Run the analysis: tune over `params` in-sample (in parallel), then
    /// evaluate the winner out-of-sample, window by window.
    pub fn run<P, F>(
        &self,
        store: &ReturnSeriesStore,
        universe: &[String],
        params: &[P],
        factory: F,
        metric: TuneMetric,
    ) -> Result<WalkForwardResult>
    where
        P: Clone + Send + Sync,
        F: Fn(&P) -> Box<dyn Strategy> + Send + Sync,
    {
        if params.is_empty() {
            return Err(BallastError::InvalidInput(
                "no parameter candidates supplied".to_string(),
            ));
        }

        let aligned = store.aligned(universe, usize::MAX)?;
        let timestamps = &aligned.timestamps;
        let windows = self.calculate_windows(timestamps.len())?;
        info!(windows = windows.len(), params = params.len(), "walk-forward start");

        let mut window_results = Vec::with_capacity(windows.len());
        for window in &windows {
            let is_config = self.window_config(timestamps, window.is_start, window.is_end);
            let oos_config = self.window_config(timestamps, window.oos_start, window.oos_end);

            // Parallel in-sample tuning.
            let mut scored: Vec<(usize, BacktestResult)> = params
                .par_iter()
                .enumerate()
                .filter_map(|(index, param)| {
                    let engine = BacktestEngine::new(is_config.clone());
                    let mut strategy = factory(param);
                    engine
                        .run(strategy.as_mut(), store, universe)
                        .ok()
                        .map(|result| (index, result))
                })
                .collect();
            if scored.is_empty() {
                warn!(window = window.index, "in-sample tuning failed, skipped");
                continue;
            }
            scored.sort_by(|a, b| {
                let left = metric.extract(&a.1);
                let right = metric.extract(&b.1);
                right
                    .partial_cmp(&left)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            let (best_param_index, in_sample) = scored.swap_remove(0);

            let engine = BacktestEngine::new(oos_config);
            let mut strategy = factory(&params[best_param_index]);
            let out_of_sample = match engine.run(strategy.as_mut(), store, universe) {
                Ok(result) => result,
                Err(error) => {
                    warn!(window = window.index, %error, "OOS run failed, skipped");
                    continue;
                }
            };

            let efficiency_ratio = if in_sample.total_return_pct.abs() > 1e-3 {
                out_of_sample.total_return_pct / in_sample.total_return_pct
            } else {
                0.0
            };

            window_results.push(WindowResult {
                window: window.clone(),
                best_param_index,
                in_sample,
                out_of_sample,
                efficiency_ratio,
            });
        }

        if window_results.is_empty() {
            return Err(BallastError::DataError(
                "all walk-forward windows failed".to_string(),
            ));
        }

        let count = window_results.len() as f64;
        let avg_is_return =
            window_results.iter().map(|w| w.in_sample.total_return_pct).sum::<f64>() / count;
        let avg_oos_return = window_results
            .iter()
            .map(|w| w.out_of_sample.total_return_pct)
            .sum::<f64>()
            / count;
        let avg_efficiency_ratio = window_results
            .iter()
            .map(|w| w.efficiency_ratio)
            .filter(|e| e.is_finite())
            .sum::<f64>()
            / count;

        let compounded_oos = window_results.iter().fold(1.0, |acc, w| {
            acc * (1.0 + w.out_of_sample.total_return_pct / 100.0)
        }) - 1.0;
        let compounded_is = window_results.iter().fold(1.0, |acc, w| {
            acc * (1.0 + w.in_sample.total_return_pct / 100.0)
        }) - 1.0;
        let walk_forward_efficiency = if compounded_is.abs() > 1e-6 {
            compounded_oos / compounded_is
        } else {
            0.0
        };

        Ok(WalkForwardResult {
            config: self.config.clone(),
            windows: window_results,
            avg_is_return,
            avg_oos_return,
            avg_efficiency_ratio,
            walk_forward_efficiency,
        })
    }

    fn window_config(
        &self,
        timestamps: &[DateTime<Utc>],
        start: usize,
        end: usize,
    ) -> BacktestConfiguration {
        let mut config = self.backtest.clone();
        config.start = Some(timestamps[start]);
        config.end = Some(timestamps[end]);
        config.show_progress = false;
        config
    }
}
