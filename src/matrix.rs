//! Covariance and correlation estimation over aligned return series.
//!
//! Small dense matrices are kept as `Vec<Vec<f64>>`; universes here are tens
//! of instruments, not thousands.

use serde::{Deserialize, Serialize};

use crate::error::{BallastError, Result};

/// Symmetric covariance matrix with its instrument order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    pub instruments: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Symmetric correlation matrix with unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub instruments: Vec<String>,
    pub values: Vec<Vec<f64>>,
    /// True when shrinkage was required to restore positive
    /// semi-definiteness.
    pub regularized: bool,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.values.len()
    }
}

/// Sample covariance over rows of aligned per-instrument returns.
pub fn covariance(instruments: &[String], rows: &[Vec<f64>]) -> Result<CovarianceMatrix> {
    let n = rows.len();
    if n == 0 {
        return Err(BallastError::InvalidInput(
            "covariance of empty universe".to_string(),
        ));
    }
    let observations = rows[0].len();
    if observations < 2 {
        return Err(BallastError::InsufficientData {
            required: 2,
            actual: observations,
        });
    }
    if rows.iter().any(|row| row.len() != observations) {
        return Err(BallastError::InvalidInput(
            "aligned return rows have unequal lengths".to_string(),
        ));
    }

    let means: Vec<f64> = rows
        .iter()
        .map(|row| row.iter().sum::<f64>() / observations as f64)
        .collect();

    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let mut cov = 0.0;
            for t in 0..observations {
                cov += (rows[i][t] - means[i]) * (rows[j][t] - means[j]);
            }
            cov /= (observations - 1) as f64;
            values[i][j] = cov;
            values[j][i] = cov;
        }
    }

    Ok(CovarianceMatrix {
        instruments: instruments.to_vec(),
        values,
    })
}

/// Correlation derived from a covariance matrix.
///
/// Checks positive semi-definiteness; a degenerate matrix is shrunk toward
/// the identity once and rechecked. Still-degenerate input is surfaced as
/// [`BallastError::DegenerateCorrelationMatrix`].
pub fn correlation(covariance: &CovarianceMatrix) -> Result<CorrelationMatrix> {
    let n = covariance.values.len();
    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let denom = (covariance.values[i][i] * covariance.values[j][j]).sqrt();
            values[i][j] = if denom > f64::EPSILON {
                (covariance.values[i][j] / denom).clamp(-1.0, 1.0)
            } else if i == j {
                1.0
            } else {
                0.0
            };
        }
    }
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    if is_positive_semi_definite(&values) {
        return Ok(CorrelationMatrix {
            instruments: covariance.instruments.clone(),
            values,
            regularized: false,
        });
    }

    // One shrinkage pass toward the identity, then give up.
    let shrunk = shrink_toward_identity(&values, 0.1);
    if is_positive_semi_definite(&shrunk) {
        return Ok(CorrelationMatrix {
            instruments: covariance.instruments.clone(),
            values: shrunk,
            regularized: true,
        });
    }

    Err(BallastError::DegenerateCorrelationMatrix(format!(
        "{}x{} matrix not PSD after shrinkage",
        n, n
    )))
}

/// Convenience path: covariance then correlation in one call.
pub fn correlation_from_rows(
    instruments: &[String],
    rows: &[Vec<f64>],
) -> Result<(CovarianceMatrix, CorrelationMatrix)> {
    let cov = covariance(instruments, rows)?;
    let corr = correlation(&cov)?;
    Ok((cov, corr))
}

/// Shrink a correlation matrix toward the identity: (1−δ)·ρ + δ·I.
pub fn shrink_toward_identity(values: &[Vec<f64>], delta: f64) -> Vec<Vec<f64>> {
    let n = values.len();
    let mut shrunk = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let identity = if i == j { 1.0 } else { 0.0 };
            shrunk[i][j] = (1.0 - delta) * values[i][j] + delta * identity;
        }
    }
    shrunk
}

/// PSD check via Cholesky with a small negative tolerance on pivots.
pub fn is_positive_semi_definite(values: &[Vec<f64>]) -> bool {
    let n = values.len();
    let tolerance = -1e-10;
    let mut chol = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = values[i][j];
            for k in 0..j {
                sum -= chol[i][k] * chol[j][k];
            }
            if i == j {
                if sum < tolerance {
                    return false;
                }
                chol[i][j] = sum.max(0.0).sqrt();
            } else if chol[j][j] > f64::EPSILON {
                chol[i][j] = sum / chol[j][j];
            } else {
                chol[i][j] = 0.0;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("I{}", i)).collect()
    }

    #[test]
    fn test_covariance_symmetric() {
        let rows = vec![
            vec![0.01, -0.02, 0.03, 0.00],
            vec![0.02, -0.01, 0.01, 0.01],
        ];
        let cov = covariance(&names(2), &rows).unwrap();
        assert!((cov.values[0][1] - cov.values[1][0]).abs() < 1e-15);
        assert!(cov.values[0][0] > 0.0);
    }

    #[test]
    fn test_correlation_unit_diagonal() {
        let rows = vec![
            vec![0.01, -0.02, 0.03, 0.00, 0.02],
            vec![0.03, 0.01, -0.02, 0.01, 0.00],
        ];
        let (_, corr) = correlation_from_rows(&names(2), &rows).unwrap();
        assert_eq!(corr.values[0][0], 1.0);
        assert_eq!(corr.values[1][1], 1.0);
        assert!(corr.values[0][1].abs() <= 1.0);
        assert!(!corr.regularized);
    }

    #[test]
    fn test_perfectly_correlated_pair() {
        let a = vec![0.01, -0.02, 0.03, 0.00, 0.02];
        let b: Vec<f64> = a.iter().map(|r| 2.0 * r).collect();
        let (_, corr) = correlation_from_rows(&names(2), &[a, b]).unwrap();
        assert!((corr.values[0][1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identity_is_psd() {
        let identity = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(is_positive_semi_definite(&identity));
    }

    #[test]
    fn test_non_psd_detected() {
        // Correlations of ±1 in an inconsistent triangle.
        let bad = vec![
            vec![1.0, 1.0, -1.0],
            vec![1.0, 1.0, 1.0],
            vec![-1.0, 1.0, 1.0],
        ];
        assert!(!is_positive_semi_definite(&bad));
    }

    #[test]
    fn test_shrinkage_moves_toward_identity() {
        let values = vec![vec![1.0, 0.8], vec![0.8, 1.0]];
        let shrunk = shrink_toward_identity(&values, 0.5);
        assert!((shrunk[0][1] - 0.4).abs() < 1e-12);
        assert!((shrunk[0][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_observations() {
        let rows = vec![vec![0.01], vec![0.02]];
        let result = covariance(&names(2), &rows);
        assert!(matches!(result, Err(BallastError::InsufficientData { .. })));
    }
}
