//! Return series storage and alignment.
//!
//! A [`ReturnSeries`] is an ordered sequence of (timestamp, return)
//! observations for one instrument. The store aligns several series onto
//! their common timestamps; gaps are reported, never silently interpolated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::{BallastError, Result};

/// One return observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered per-instrument return observations.
///
/// Invariant: timestamps are strictly increasing and every value is finite.
/// The constructor enforces both; there is no way to build a series that
/// violates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    instrument: String,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Build a series, validating ordering and finiteness.
    pub fn new(instrument: impl Into<String>, points: Vec<ReturnPoint>) -> Result<Self> {
        let instrument = instrument.into();
        if instrument.is_empty() {
            return Err(BallastError::InvalidInput(
                "instrument name must not be empty".to_string(),
            ));
        }
        for (i, point) in points.iter().enumerate() {
            if !point.value.is_finite() {
                return Err(BallastError::InvalidInput(format!(
                    "{}: non-finite return at index {}",
                    instrument, i
                )));
            }
            if i > 0 && point.timestamp <= points[i - 1].timestamp {
                return Err(BallastError::InvalidInput(format!(
                    "{}: timestamps must be strictly increasing (index {})",
                    instrument, i
                )));
            }
        }
        Ok(Self { instrument, points })
    }

    /// Build from parallel timestamp/value slices.
    pub fn from_values(
        instrument: impl Into<String>,
        timestamps: &[DateTime<Utc>],
        values: &[f64],
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(BallastError::InvalidInput(format!(
                "timestamp/value length mismatch: {} vs {}",
                timestamps.len(),
                values.len()
            )));
        }
        let points = timestamps
            .iter()
            .zip(values)
            .map(|(&timestamp, &value)| ReturnPoint { timestamp, value })
            .collect();
        Self::new(instrument, points)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    /// Return values without timestamps.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// The trailing `window` observations (all of them when shorter).
    pub fn tail(&self, window: usize) -> &[ReturnPoint] {
        let start = self.points.len().saturating_sub(window);
        &self.points[start..]
    }

    /// Observations within [start, end].
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ReturnPoint> {
        self.points
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .copied()
            .collect()
    }
}

/// A gap detected while aligning series: a timestamp present in some series
/// but missing from another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentGap {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
}

/// Series aligned onto their common timestamps.
#[derive(Debug, Clone)]
pub struct AlignedReturns {
    /// Instruments in row order.
    pub instruments: Vec<String>,
    /// Common timestamps, ascending.
    pub timestamps: Vec<DateTime<Utc>>,
    /// rows\[i\]\[t\] is the return of instrument i at timestamps\[t\].
    pub rows: Vec<Vec<f64>>,
    /// Timestamps dropped because they were missing from some series.
    pub gaps: Vec<AlignmentGap>,
}

impl AlignedReturns {
    /// Number of aligned observations.
    pub fn observations(&self) -> usize {
        self.timestamps.len()
    }

    /// Scenario view: one row per timestamp, one column per instrument.
    /// This is the orientation the CVaR scenario program consumes.
    pub fn scenarios(&self) -> Vec<Vec<f64>> {
        (0..self.timestamps.len())
            .map(|t| self.rows.iter().map(|row| row[t]).collect())
            .collect()
    }
}

/// Market-data collaborator interface. Ingestion and transport live outside
/// this crate; the engine only pulls series and liquidity scalars.
pub trait MarketDataProvider: Send + Sync {
    /// Historical return series for an instrument over a lookback window.
    fn return_series(&self, instrument: &str, window: usize) -> Result<ReturnSeries>;

    /// Annualized volatility estimate.
    fn volatility(&self, instrument: &str) -> Result<f64>;

    /// Average daily volume in units.
    fn average_daily_volume(&self, instrument: &str) -> Result<f64>;
}

/// In-memory store of per-instrument return series.
#[derive(Debug, Clone, Default)]
pub struct ReturnSeriesStore {
    series: HashMap<String, ReturnSeries>,
}

impl ReturnSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the series for an instrument.
    pub fn insert(&mut self, series: ReturnSeries) {
        self.series.insert(series.instrument().to_string(), series);
    }

    pub fn get(&self, instrument: &str) -> Option<&ReturnSeries> {
        self.series.get(instrument)
    }

    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Align the requested instruments onto their common timestamps over the
    /// trailing `window` observations of each series.
    ///
    /// Timestamps missing from any series are dropped and reported as gaps.
    pub fn aligned(&self, instruments: &[String], window: usize) -> Result<AlignedReturns> {
        if instruments.is_empty() {
            return Err(BallastError::InvalidInput(
                "empty instrument universe".to_string(),
            ));
        }

        let mut tails: Vec<(&str, HashMap<DateTime<Utc>, f64>, BTreeSet<DateTime<Utc>>)> =
            Vec::with_capacity(instruments.len());
        for name in instruments {
            let series = self.series.get(name).ok_or_else(|| {
                BallastError::DataError(format!("no return series for instrument: {}", name))
            })?;
            let tail = series.tail(window);
            let by_time: HashMap<DateTime<Utc>, f64> =
                tail.iter().map(|p| (p.timestamp, p.value)).collect();
            let times: BTreeSet<DateTime<Utc>> = tail.iter().map(|p| p.timestamp).collect();
            tails.push((series.instrument(), by_time, times));
        }

        // Intersection of all timestamp sets.
        let mut common = tails[0].2.clone();
        for (_, _, times) in tails.iter().skip(1) {
            common = common.intersection(times).copied().collect();
        }

        // Anything outside the intersection is a gap for the series that
        // lacks it.
        let union: BTreeSet<DateTime<Utc>> = tails
            .iter()
            .flat_map(|(_, _, times)| times.iter().copied())
            .collect();
        let mut gaps = Vec::new();
        for timestamp in union.difference(&common) {
            for (name, by_time, _) in &tails {
                if !by_time.contains_key(timestamp) {
                    gaps.push(AlignmentGap {
                        instrument: name.to_string(),
                        timestamp: *timestamp,
                    });
                }
            }
        }

        let timestamps: Vec<DateTime<Utc>> = common.into_iter().collect();
        let rows: Vec<Vec<f64>> = tails
            .iter()
            .map(|(_, by_time, _)| timestamps.iter().map(|t| by_time[t]).collect())
            .collect();

        Ok(AlignedReturns {
            instruments: instruments.to_vec(),
            timestamps,
            rows,
            gaps,
        })
    }
}

impl MarketDataProvider for ReturnSeriesStore {
    fn return_series(&self, instrument: &str, window: usize) -> Result<ReturnSeries> {
        let series = self.get(instrument).ok_or_else(|| {
            BallastError::DataError(format!("no return series for instrument: {}", instrument))
        })?;
        ReturnSeries::new(instrument, series.tail(window).to_vec())
    }

    fn volatility(&self, instrument: &str) -> Result<f64> {
        let series = self.get(instrument).ok_or_else(|| {
            BallastError::DataError(format!("no return series for instrument: {}", instrument))
        })?;
        let values = series.values();
        if values.len() < 2 {
            return Err(BallastError::InsufficientData {
                required: 2,
                actual: values.len(),
            });
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (values.len() - 1) as f64;
        Ok(variance.sqrt() * (252.0_f64).sqrt())
    }

    fn average_daily_volume(&self, _instrument: &str) -> Result<f64> {
        Err(BallastError::DataError(
            "return series store carries no volume data".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn series(name: &str, days: &[u32], values: &[f64]) -> ReturnSeries {
        let timestamps: Vec<DateTime<Utc>> = days.iter().map(|&d| ts(d)).collect();
        ReturnSeries::from_values(name, &timestamps, values).unwrap()
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let timestamps = vec![ts(2), ts(1)];
        let result = ReturnSeries::from_values("AAPL", &timestamps, &[0.01, 0.02]);
        assert!(matches!(result, Err(BallastError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let timestamps = vec![ts(1), ts(1)];
        let result = ReturnSeries::from_values("AAPL", &timestamps, &[0.01, 0.02]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let timestamps = vec![ts(1), ts(2)];
        let result = ReturnSeries::from_values("AAPL", &timestamps, &[0.01, f64::NAN]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tail_window() {
        let s = series("AAPL", &[1, 2, 3, 4, 5], &[0.1, 0.2, 0.3, 0.4, 0.5]);
        let tail = s.tail(2);
        assert_eq!(tail.len(), 2);
        assert!((tail[0].value - 0.4).abs() < 1e-12);
        assert_eq!(s.tail(10).len(), 5);
    }

    #[test]
    fn test_alignment_drops_gaps() {
        let mut store = ReturnSeriesStore::new();
        store.insert(series("A", &[1, 2, 3, 4], &[0.1, 0.2, 0.3, 0.4]));
        store.insert(series("B", &[1, 3, 4], &[1.0, 3.0, 4.0]));

        let aligned = store
            .aligned(&["A".to_string(), "B".to_string()], 10)
            .unwrap();

        // Day 2 is missing from B, so it is dropped and reported.
        assert_eq!(aligned.observations(), 3);
        assert_eq!(aligned.gaps.len(), 1);
        assert_eq!(aligned.gaps[0].instrument, "B");
        assert_eq!(aligned.gaps[0].timestamp, ts(2));
        assert_eq!(aligned.rows[0], vec![0.1, 0.3, 0.4]);
        assert_eq!(aligned.rows[1], vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_scenario_orientation() {
        let mut store = ReturnSeriesStore::new();
        store.insert(series("A", &[1, 2], &[0.1, 0.2]));
        store.insert(series("B", &[1, 2], &[1.0, 2.0]));

        let aligned = store
            .aligned(&["A".to_string(), "B".to_string()], 10)
            .unwrap();
        let scenarios = aligned.scenarios();
        assert_eq!(scenarios, vec![vec![0.1, 1.0], vec![0.2, 2.0]]);
    }

    #[test]
    fn test_missing_instrument_errors() {
        let store = ReturnSeriesStore::new();
        let result = store.aligned(&["GHOST".to_string()], 10);
        assert!(matches!(result, Err(BallastError::DataError(_))));
    }
}
