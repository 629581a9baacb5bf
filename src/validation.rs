//! Post-hoc backtest validation.
//!
//! These checks never alter results: they mark a
//! [`BacktestResult`](crate::backtest::BacktestResult) invalid with itemized
//! reasons and leave the numbers alone, so the caller decides whether to
//! discard the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::series::AlignmentGap;

/// Categories of validity violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A trade executed before the information it was decided on.
    LookAheadBias,
    /// Universe membership not reflected in the era it applied.
    SurvivorshipBias,
    /// Missing or irregular observations in the input data.
    DataQualityGap,
}

/// One itemized validity violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityViolation {
    pub kind: ViolationKind,
    pub detail: String,
}

/// Aggregate validity verdict for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidityReport {
    pub violations: Vec<ValidityViolation>,
}

impl ValidityReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn merge(&mut self, mut other: ValidityReport) {
        self.violations.append(&mut other.violations);
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ViolationKind) -> Vec<&ValidityViolation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }
}

/// Detect trades whose execution timestamp precedes their decision
/// timestamp. Pairs are `(decision, execution)`.
pub fn check_look_ahead(trades: &[(DateTime<Utc>, DateTime<Utc>)]) -> ValidityReport {
    let mut report = ValidityReport::default();
    for (index, (decision, execution)) in trades.iter().enumerate() {
        if execution < decision {
            report.violations.push(ValidityViolation {
                kind: ViolationKind::LookAheadBias,
                detail: format!(
                    "trade {} executed at {} before decision at {}",
                    index, execution, decision
                ),
            });
        }
    }
    if !report.is_valid() {
        warn!(
            count = report.violations.len(),
            "look-ahead bias detected"
        );
    }
    report
}

/// Detect irregular gaps in a timestamp sequence. The dominant spacing is
/// the median delta; anything beyond `multiplier` times it is flagged.
/// A weekend on daily data (3x spacing) passes the default multiplier.
pub fn check_gaps(timestamps: &[DateTime<Utc>], multiplier: f64) -> ValidityReport {
    let mut report = ValidityReport::default();
    if timestamps.len() < 3 {
        return report;
    }

    let mut deltas: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .collect();
    deltas.sort_unstable();
    let median = deltas[deltas.len() / 2] as f64;
    if median <= 0.0 {
        return report;
    }

    for window in timestamps.windows(2) {
        let delta = (window[1] - window[0]).num_seconds() as f64;
        if delta > median * multiplier {
            report.violations.push(ValidityViolation {
                kind: ViolationKind::DataQualityGap,
                detail: format!(
                    "gap of {:.1}x median spacing between {} and {}",
                    delta / median,
                    window[0],
                    window[1]
                ),
            });
        }
    }
    report
}

/// Flag instruments whose series are missing a material share of the
/// aligned timestamps: a universe member that only exists for part of the
/// window is survivorship-suspect for the era it was absent.
pub fn check_universe_coverage(
    gaps: &[AlignmentGap],
    observations: usize,
    max_missing_fraction: f64,
) -> ValidityReport {
    let mut report = ValidityReport::default();
    if observations == 0 {
        return report;
    }

    let mut missing_counts: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();
    for gap in gaps {
        *missing_counts.entry(gap.instrument.as_str()).or_insert(0) += 1;
    }

    let total = observations + gaps.len();
    let mut flagged: Vec<(&str, usize)> = missing_counts
        .into_iter()
        .filter(|(_, count)| *count as f64 / total as f64 > max_missing_fraction)
        .collect();
    flagged.sort();

    for (instrument, count) in flagged {
        report.violations.push(ValidityViolation {
            kind: ViolationKind::SurvivorshipBias,
            detail: format!(
                "{} missing {} of {} aligned periods",
                instrument, count, total
            ),
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_look_ahead_clean() {
        let trades = vec![(ts(1, 0), ts(1, 0)), (ts(2, 0), ts(2, 1))];
        assert!(check_look_ahead(&trades).is_valid());
    }

    #[test]
    fn test_look_ahead_violation() {
        // Executed an hour before the decision.
        let trades = vec![(ts(2, 1), ts(2, 0))];
        let report = check_look_ahead(&trades);
        assert!(!report.is_valid());
        assert_eq!(report.violations[0].kind, ViolationKind::LookAheadBias);
    }

    #[test]
    fn test_regular_spacing_passes() {
        let timestamps: Vec<_> = (1..=10).map(|d| ts(d, 0)).collect();
        assert!(check_gaps(&timestamps, 3.5).is_valid());
    }

    #[test]
    fn test_weekend_gap_tolerated() {
        // Mon-Fri then next Mon: a 3x gap stays under the 3.5x default.
        let timestamps = vec![ts(1, 0), ts(2, 0), ts(3, 0), ts(4, 0), ts(5, 0), ts(8, 0)];
        assert!(check_gaps(&timestamps, 3.5).is_valid());
    }

    #[test]
    fn test_large_gap_flagged() {
        let timestamps = vec![ts(1, 0), ts(2, 0), ts(3, 0), ts(4, 0), ts(15, 0)];
        let report = check_gaps(&timestamps, 3.5);
        assert!(!report.is_valid());
        assert_eq!(report.violations[0].kind, ViolationKind::DataQualityGap);
    }

    #[test]
    fn test_universe_coverage() {
        let gaps: Vec<AlignmentGap> = (1..=5)
            .map(|d| AlignmentGap {
                instrument: "NEWCO".to_string(),
                timestamp: ts(d, 0),
            })
            .collect();

        // 5 of 15 periods missing: over a 10% threshold.
        let report = check_universe_coverage(&gaps, 10, 0.1);
        assert!(!report.is_valid());
        assert_eq!(report.violations[0].kind, ViolationKind::SurvivorshipBias);

        // Under a 50% threshold the same gaps pass.
        let report = check_universe_coverage(&gaps, 10, 0.5);
        assert!(report.is_valid());
    }

    #[test]
    fn test_merge_reports() {
        let mut report = check_look_ahead(&[(ts(2, 1), ts(2, 0))]);
        report.merge(check_gaps(&[ts(1, 0), ts(2, 0), ts(20, 0)], 3.5));
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.of_kind(ViolationKind::LookAheadBias).len(), 1);
        assert_eq!(report.of_kind(ViolationKind::DataQualityGap).len(), 1);
    }
}
