//! Hierarchical Risk Parity allocation.
//!
//! López de Prado's procedure: correlation distance, Ward-linkage
//! hierarchical clustering, quasi-diagonalization via the dendrogram leaf
//! order, then recursive bisection with inverse-variance allocation at each
//! split. Fully deterministic for a given correlation matrix; ties in the
//! merge step break toward the lowest index.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BallastError, Result};
use crate::matrix::{correlation_from_rows, CorrelationMatrix, CovarianceMatrix};

/// One merge step of the dendrogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMerge {
    /// Node ids being merged; ids < n are leaves, ids ≥ n reference earlier
    /// merges.
    pub left: usize,
    pub right: usize,
    /// Ward merge distance.
    pub distance: f64,
    /// Number of leaves under the merged node.
    pub size: usize,
}

/// HRP allocation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrpAllocation {
    pub instruments: Vec<String>,
    pub weights: Vec<f64>,
    /// Seriated instrument order (dendrogram leaves, left to right).
    pub leaf_order: Vec<usize>,
    /// The dendrogram, for diagnostics.
    pub merges: Vec<ClusterMerge>,
    /// True when the correlation input needed shrinkage.
    pub regularized: bool,
}

/// Hierarchical Risk Parity optimizer.
#[derive(Debug, Clone, Default)]
pub struct HrpOptimizer;

impl HrpOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Allocate from aligned per-instrument return rows.
    pub fn allocate_from_rows(
        &self,
        instruments: &[String],
        rows: &[Vec<f64>],
    ) -> Result<HrpAllocation> {
        let (cov, corr) = correlation_from_rows(instruments, rows)?;
        self.allocate(&cov, &corr)
    }

    /// Allocate from precomputed covariance and correlation.
    pub fn allocate(
        &self,
        covariance: &CovarianceMatrix,
        correlation: &CorrelationMatrix,
    ) -> Result<HrpAllocation> {
        let n = correlation.size();
        if n == 0 {
            return Err(BallastError::InvalidInput(
                "HRP over empty universe".to_string(),
            ));
        }
        if covariance.values.len() != n {
            return Err(BallastError::InvalidInput(format!(
                "covariance/correlation size mismatch: {} vs {}",
                covariance.values.len(),
                n
            )));
        }
        if n == 1 {
            return Ok(HrpAllocation {
                instruments: correlation.instruments.clone(),
                weights: vec![1.0],
                leaf_order: vec![0],
                merges: Vec::new(),
                regularized: correlation.regularized,
            });
        }

        let distance = correlation_distance(&correlation.values);
        let merges = ward_linkage(&distance);
        let leaf_order = seriation(n, &merges);

        let mut weights = vec![1.0; n];
        recursive_bisection(&leaf_order, &covariance.values, &mut weights);

        // Bisection multiplies split fractions, so the sum is already one up
        // to rounding; normalize away the residual.
        let total: f64 = weights.iter().sum();
        if total > f64::EPSILON {
            for w in &mut weights {
                *w /= total;
            }
        }

        debug!(universe = n, "HRP allocation complete");

        Ok(HrpAllocation {
            instruments: correlation.instruments.clone(),
            weights,
            leaf_order,
            merges,
            regularized: correlation.regularized,
        })
    }
}

/// d(i,j) = √(0.5·(1 − ρ(i,j))).
fn correlation_distance(correlation: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = correlation.len();
    let mut distance = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            distance[i][j] = (0.5 * (1.0 - correlation[i][j])).max(0.0).sqrt();
        }
    }
    distance
}

/// Agglomerative clustering with Ward linkage via the Lance–Williams
/// recurrence on squared distances.
fn ward_linkage(distance: &[Vec<f64>]) -> Vec<ClusterMerge> {
    let n = distance.len();
    let mut squared: Vec<Vec<f64>> = distance
        .iter()
        .map(|row| row.iter().map(|d| d * d).collect())
        .collect();
    let mut active = vec![true; n];
    let mut sizes = vec![1usize; n];
    let mut node_id: Vec<usize> = (0..n).collect();
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        let mut best = f64::INFINITY;
        let mut mi = 0;
        let mut mj = 0;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                if squared[i][j] < best {
                    best = squared[i][j];
                    mi = i;
                    mj = j;
                }
            }
        }

        let merged_size = sizes[mi] + sizes[mj];
        merges.push(ClusterMerge {
            left: node_id[mi],
            right: node_id[mj],
            distance: best.max(0.0).sqrt(),
            size: merged_size,
        });

        // Lance–Williams update for Ward: the merged cluster lives in slot
        // mi, slot mj retires.
        for k in 0..n {
            if !active[k] || k == mi || k == mj {
                continue;
            }
            let ni = sizes[mi] as f64;
            let nj = sizes[mj] as f64;
            let nk = sizes[k] as f64;
            let updated = ((ni + nk) * squared[mi][k] + (nj + nk) * squared[mj][k]
                - nk * squared[mi][mj])
                / (ni + nj + nk);
            squared[mi][k] = updated;
            squared[k][mi] = updated;
        }

        sizes[mi] = merged_size;
        node_id[mi] = n + step;
        active[mj] = false;
    }

    merges
}

/// Dendrogram leaf order (quasi-diagonalization of the covariance).
fn seriation(n: usize, merges: &[ClusterMerge]) -> Vec<usize> {
    fn collect(node: usize, n: usize, merges: &[ClusterMerge], out: &mut Vec<usize>) {
        if node < n {
            out.push(node);
        } else {
            let merge = &merges[node - n];
            collect(merge.left, n, merges, out);
            collect(merge.right, n, merges, out);
        }
    }

    if merges.is_empty() {
        return (0..n).collect();
    }
    let root = n + merges.len() - 1;
    let mut order = Vec::with_capacity(n);
    collect(root, n, merges, &mut order);
    order
}

/// Split the seriated list in half repeatedly, allocating between halves by
/// inverse cluster variance.
fn recursive_bisection(order: &[usize], covariance: &[Vec<f64>], weights: &mut [f64]) {
    if order.len() <= 1 {
        return;
    }

    let mid = order.len() / 2;
    let left = &order[..mid];
    let right = &order[mid..];

    let var_left = cluster_variance(left, covariance);
    let var_right = cluster_variance(right, covariance);
    let denom = var_left + var_right;
    let alpha = if denom > 1e-30 {
        1.0 - var_left / denom
    } else {
        0.5
    };

    for &i in left {
        weights[i] *= alpha;
    }
    for &i in right {
        weights[i] *= 1.0 - alpha;
    }

    recursive_bisection(left, covariance, weights);
    recursive_bisection(right, covariance, weights);
}

/// Variance of the inverse-variance-weighted sub-portfolio over `indices`.
fn cluster_variance(indices: &[usize], covariance: &[Vec<f64>]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    if indices.len() == 1 {
        return covariance[indices[0]][indices[0]];
    }

    let inverse_vars: Vec<f64> = indices
        .iter()
        .map(|&i| {
            let v = covariance[i][i];
            if v > 1e-15 {
                1.0 / v
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = inverse_vars.iter().sum();
    if total < 1e-15 {
        return 1.0;
    }
    let w: Vec<f64> = inverse_vars.iter().map(|iv| iv / total).collect();

    let mut variance = 0.0;
    for (a, &ia) in indices.iter().enumerate() {
        for (b, &ib) in indices.iter().enumerate() {
            variance += w[a] * w[b] * covariance[ia][ib];
        }
    }
    variance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CorrelationMatrix;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("I{}", i)).collect()
    }

    fn diag_cov(vars: &[f64]) -> CovarianceMatrix {
        let n = vars.len();
        let mut values = vec![vec![0.0; n]; n];
        for (i, &v) in vars.iter().enumerate() {
            values[i][i] = v;
        }
        CovarianceMatrix {
            instruments: names(n),
            values,
        }
    }

    fn identity_corr(n: usize) -> CorrelationMatrix {
        let mut values = vec![vec![0.0; n]; n];
        for (i, row) in values.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        CorrelationMatrix {
            instruments: names(n),
            values,
            regularized: false,
        }
    }

    #[test]
    fn test_single_instrument_gets_full_weight() {
        let hrp = HrpOptimizer::new();
        let allocation = hrp.allocate(&diag_cov(&[0.04]), &identity_corr(1)).unwrap();
        assert_eq!(allocation.weights, vec![1.0]);
    }

    #[test]
    fn test_zero_correlation_equal_vol_splits_evenly() {
        let hrp = HrpOptimizer::new();
        let allocation = hrp
            .allocate(&diag_cov(&[0.04, 0.04]), &identity_corr(2))
            .unwrap();
        assert!((allocation.weights[0] - 0.5).abs() < 1e-9);
        assert!((allocation.weights[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_lower_volatility_gets_higher_weight() {
        // Vols σ and 2σ: bisection allocates by inverse variance, so the
        // low-vol asset carries weight 4/5.
        let hrp = HrpOptimizer::new();
        let allocation = hrp
            .allocate(&diag_cov(&[0.01, 0.04]), &identity_corr(2))
            .unwrap();
        assert!(allocation.weights[0] > allocation.weights[1]);
        let ratio = allocation.weights[0] / allocation.weights[1];
        assert!((ratio - 4.0).abs() < 1e-9, "ratio = {}", ratio);
        let sum: f64 = allocation.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_correlation_degenerates_to_inverse_variance() {
        let vars = [0.01, 0.02, 0.04, 0.08];
        let hrp = HrpOptimizer::new();
        let allocation = hrp.allocate(&diag_cov(&vars), &identity_corr(4)).unwrap();

        // Weights should be ordered inversely to variance.
        for i in 0..3 {
            assert!(allocation.weights[i] > allocation.weights[i + 1]);
        }
        let sum: f64 = allocation.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlated_pair_clusters_together() {
        // Two tightly correlated instruments plus one independent: the pair
        // should be adjacent in the leaf order.
        let instruments = names(3);
        let values = vec![
            vec![1.0, 0.9, 0.1],
            vec![0.9, 1.0, 0.1],
            vec![0.1, 0.1, 1.0],
        ];
        let corr = CorrelationMatrix {
            instruments: instruments.clone(),
            values,
            regularized: false,
        };
        let mut cov_values = vec![vec![0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                cov_values[i][j] = corr.values[i][j] * 0.04;
            }
        }
        let cov = CovarianceMatrix {
            instruments,
            values: cov_values,
        };

        let hrp = HrpOptimizer::new();
        let allocation = hrp.allocate(&cov, &corr).unwrap();
        let pos_0 = allocation.leaf_order.iter().position(|&i| i == 0).unwrap();
        let pos_1 = allocation.leaf_order.iter().position(|&i| i == 1).unwrap();
        assert_eq!(pos_0.abs_diff(pos_1), 1, "correlated pair not adjacent");
    }

    #[test]
    fn test_deterministic_given_same_inputs() {
        let hrp = HrpOptimizer::new();
        let cov = diag_cov(&[0.01, 0.02, 0.03, 0.04, 0.05]);
        let corr = identity_corr(5);
        let first = hrp.allocate(&cov, &corr).unwrap();
        let second = hrp.allocate(&cov, &corr).unwrap();
        assert_eq!(first.weights, second.weights);
        assert_eq!(first.leaf_order, second.leaf_order);
    }

    #[test]
    fn test_allocate_from_rows() {
        let rows = vec![
            vec![0.01, -0.02, 0.03, 0.00, 0.02, -0.01],
            vec![-0.01, 0.02, -0.02, 0.01, -0.01, 0.02],
            vec![0.02, 0.01, 0.00, -0.01, 0.01, 0.00],
        ];
        let hrp = HrpOptimizer::new();
        let allocation = hrp.allocate_from_rows(&names(3), &rows).unwrap();
        assert_eq!(allocation.weights.len(), 3);
        let sum: f64 = allocation.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(allocation.weights.iter().all(|&w| w >= 0.0));
    }
}
