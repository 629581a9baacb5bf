//! Strategy trait and rebalance context.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{Portfolio, Signal};

/// Market state handed to a strategy at each rebalance point.
///
/// History is truncated at the current period: a strategy physically cannot
/// read observations after its decision point.
#[derive(Debug)]
pub struct StrategyContext<'a> {
    /// Index of the current period within the replay.
    pub period: usize,
    /// Timestamp of the current period.
    pub timestamp: DateTime<Utc>,
    /// Instruments in row order of `history`.
    pub instruments: &'a [String],
    /// Per-instrument returns up to and including the current period.
    pub history: &'a [Vec<f64>],
    /// Current portfolio snapshot.
    pub portfolio: &'a Portfolio,
    /// Current equity.
    pub equity: Decimal,
}

impl<'a> StrategyContext<'a> {
    /// Return history for one instrument.
    pub fn returns_for(&self, instrument: &str) -> Option<&[f64]> {
        self.instruments
            .iter()
            .position(|i| i == instrument)
            .map(|idx| self.history[idx].as_slice())
    }

    /// The trailing `n` returns for an instrument.
    pub fn tail_returns(&self, instrument: &str, n: usize) -> Option<&[f64]> {
        self.returns_for(instrument).map(|returns| {
            let start = returns.len().saturating_sub(n);
            &returns[start..]
        })
    }

    /// Number of observed periods so far.
    pub fn observed(&self) -> usize {
        self.period + 1
    }
}

/// A pluggable strategy: portfolio × market state → signals.
pub trait Strategy: Send + Sync {
    /// Name used in result reporting.
    fn name(&self) -> &str;

    /// Called once before the replay starts.
    fn init(&mut self) {}

    /// Produce candidate signals at a rebalance point. An empty vector
    /// liquidates to cash.
    fn on_rebalance(&mut self, ctx: &StrategyContext) -> Vec<Signal>;

    /// Periods to skip before the first rebalance.
    fn warmup_period(&self) -> usize {
        0
    }

    /// Strategy parameters for logging and result metadata.
    fn parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct CountingStrategy {
        calls: usize,
    }

    impl Strategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_rebalance(&mut self, ctx: &StrategyContext) -> Vec<Signal> {
            self.calls += 1;
            ctx.instruments
                .iter()
                .map(|i| Signal::new(i.clone(), Direction::Long, 0.6))
                .collect()
        }

        fn warmup_period(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_context_accessors() {
        let instruments = vec!["A".to_string(), "B".to_string()];
        let history = vec![vec![0.01, 0.02, 0.03], vec![0.04, 0.05, 0.06]];
        let portfolio = Portfolio::all_cash(dec!(1000));
        let ctx = StrategyContext {
            period: 2,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            instruments: &instruments,
            history: &history,
            portfolio: &portfolio,
            equity: dec!(1000),
        };

        assert_eq!(ctx.observed(), 3);
        assert_eq!(ctx.returns_for("B").unwrap(), &[0.04, 0.05, 0.06]);
        assert_eq!(ctx.tail_returns("A", 2).unwrap(), &[0.02, 0.03]);
        assert!(ctx.returns_for("GHOST").is_none());
    }

    #[test]
    fn test_strategy_generates_signals() {
        let mut strategy = CountingStrategy { calls: 0 };
        assert_eq!(strategy.warmup_period(), 3);

        let instruments = vec!["A".to_string()];
        let history = vec![vec![0.01]];
        let portfolio = Portfolio::all_cash(dec!(1000));
        let ctx = StrategyContext {
            period: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            instruments: &instruments,
            history: &history,
            portfolio: &portfolio,
            equity: dec!(1000),
        };

        let signals = strategy.on_rebalance(&ctx);
        assert_eq!(signals.len(), 1);
        assert_eq!(strategy.calls, 1);
    }
}
