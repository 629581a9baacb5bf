//! Dense two-phase simplex solver.
//!
//! Small scenario programs (tens of variables, a few hundred rows) do not
//! justify an external solver; this module implements the textbook
//! two-phase method with Bland's rule, which cannot cycle. All variables
//! are non-negative; callers split free variables themselves.

use tracing::debug;

const PIVOT_TOLERANCE: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;

/// Row sense for a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// A solved point.
#[derive(Debug, Clone)]
pub struct LpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
}

/// Typed solver outcome. `IterationLimit` carries the best feasible vertex
/// reached when the cap was hit.
#[derive(Debug, Clone)]
pub enum LpOutcome {
    Optimal(LpSolution),
    Infeasible,
    Unbounded,
    IterationLimit(LpSolution),
}

/// A linear program: minimize cᵀx subject to row constraints, x ≥ 0.
#[derive(Debug, Clone)]
pub struct LpProblem {
    objective: Vec<f64>,
    rows: Vec<(Vec<f64>, Sense, f64)>,
    max_iterations: usize,
}

impl LpProblem {
    /// Start a minimization over `objective.len()` non-negative variables.
    pub fn minimize(objective: Vec<f64>) -> Self {
        Self {
            objective,
            rows: Vec::new(),
            max_iterations: 10_000,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Add a constraint row. Coefficient vectors shorter than the variable
    /// count are zero-extended.
    pub fn constraint(&mut self, mut coefficients: Vec<f64>, sense: Sense, rhs: f64) {
        coefficients.resize(self.objective.len(), 0.0);
        self.rows.push((coefficients, sense, rhs));
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    /// Solve with the two-phase simplex method.
    pub fn solve(&self) -> LpOutcome {
        let n = self.objective.len();
        let m = self.rows.len();
        if n == 0 {
            return LpOutcome::Optimal(LpSolution {
                x: Vec::new(),
                objective: 0.0,
            });
        }

        // Normalize rows to b ≥ 0, then lay out columns as
        // [original | slack/surplus | artificial].
        let mut senses = Vec::with_capacity(m);
        let mut matrix = Vec::with_capacity(m);
        let mut rhs = Vec::with_capacity(m);
        for (coefficients, sense, b) in &self.rows {
            let (row, sense, b) = if *b < 0.0 {
                let flipped: Vec<f64> = coefficients.iter().map(|c| -c).collect();
                let sense = match sense {
                    Sense::Le => Sense::Ge,
                    Sense::Ge => Sense::Le,
                    Sense::Eq => Sense::Eq,
                };
                (flipped, sense, -b)
            } else {
                (coefficients.clone(), *sense, *b)
            };
            matrix.push(row);
            senses.push(sense);
            rhs.push(b);
        }

        let num_slack = senses
            .iter()
            .filter(|s| matches!(s, Sense::Le | Sense::Ge))
            .count();
        let num_artificial = senses
            .iter()
            .filter(|s| matches!(s, Sense::Ge | Sense::Eq))
            .count();
        let total = n + num_slack + num_artificial;

        // Tableau: m constraint rows plus a reduced-cost row; final column
        // is the rhs.
        let mut tableau = vec![vec![0.0; total + 1]; m + 1];
        let mut basis = vec![0usize; m];
        let mut slack_col = n;
        let mut artificial_col = n + num_slack;
        let artificial_start = n + num_slack;

        for i in 0..m {
            tableau[i][..n].copy_from_slice(&matrix[i]);
            tableau[i][total] = rhs[i];
            match senses[i] {
                Sense::Le => {
                    tableau[i][slack_col] = 1.0;
                    basis[i] = slack_col;
                    slack_col += 1;
                }
                Sense::Ge => {
                    tableau[i][slack_col] = -1.0;
                    slack_col += 1;
                    tableau[i][artificial_col] = 1.0;
                    basis[i] = artificial_col;
                    artificial_col += 1;
                }
                Sense::Eq => {
                    tableau[i][artificial_col] = 1.0;
                    basis[i] = artificial_col;
                    artificial_col += 1;
                }
            }
        }

        // Phase 1: minimize the sum of artificials.
        if num_artificial > 0 {
            for j in artificial_start..total {
                tableau[m][j] = 1.0;
            }
            canonicalize_cost_row(&mut tableau, &basis, m, total);

            match run_simplex(&mut tableau, &mut basis, m, total, total, self.max_iterations) {
                SimplexStatus::Optimal => {}
                SimplexStatus::Unbounded => return LpOutcome::Infeasible,
                SimplexStatus::IterationLimit => return LpOutcome::Infeasible,
            }

            let phase1_objective = -tableau[m][total];
            if phase1_objective > FEASIBILITY_TOLERANCE {
                debug!(residual = phase1_objective, "phase 1 residual positive");
                return LpOutcome::Infeasible;
            }

            // Pivot any artificial still basic (at zero level) out of the
            // basis where a non-artificial pivot exists; a fully zero row is
            // redundant and keeps its artificial at zero harmlessly.
            for i in 0..m {
                if basis[i] >= artificial_start {
                    if let Some(j) = (0..artificial_start)
                        .find(|&j| tableau[i][j].abs() > PIVOT_TOLERANCE)
                    {
                        pivot(&mut tableau, i, j, m, total);
                        basis[i] = j;
                    }
                }
            }
        }

        // Phase 2: real objective, artificial columns barred from entering.
        for j in 0..=total {
            tableau[m][j] = 0.0;
        }
        tableau[m][..n].copy_from_slice(&self.objective);
        canonicalize_cost_row(&mut tableau, &basis, m, total);

        let status = run_simplex(
            &mut tableau,
            &mut basis,
            m,
            total,
            artificial_start,
            self.max_iterations,
        );

        let solution = extract_solution(&tableau, &basis, m, n, total, &self.objective);
        match status {
            SimplexStatus::Optimal => LpOutcome::Optimal(solution),
            SimplexStatus::Unbounded => LpOutcome::Unbounded,
            SimplexStatus::IterationLimit => LpOutcome::IterationLimit(solution),
        }
    }
}

enum SimplexStatus {
    Optimal,
    Unbounded,
    IterationLimit,
}

/// Subtract basic-variable costs so reduced costs of basic columns are zero.
fn canonicalize_cost_row(tableau: &mut [Vec<f64>], basis: &[usize], m: usize, total: usize) {
    for i in 0..m {
        let cost = tableau[m][basis[i]];
        if cost.abs() > PIVOT_TOLERANCE {
            let (rows, cost_row) = tableau.split_at_mut(m);
            for j in 0..=total {
                cost_row[0][j] -= cost * rows[i][j];
            }
        }
    }
}

/// Run simplex iterations on a canonical tableau. Columns at or beyond
/// `entering_limit` never enter the basis.
fn run_simplex(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    m: usize,
    total: usize,
    entering_limit: usize,
    max_iterations: usize,
) -> SimplexStatus {
    for _ in 0..max_iterations {
        // Bland's rule: smallest-index column with negative reduced cost.
        let entering = (0..entering_limit).find(|&j| tableau[m][j] < -PIVOT_TOLERANCE);
        let Some(entering) = entering else {
            return SimplexStatus::Optimal;
        };

        // Ratio test; Bland tie-break on the smallest basis index.
        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            let coefficient = tableau[i][entering];
            if coefficient > PIVOT_TOLERANCE {
                let ratio = tableau[i][total] / coefficient;
                let better = ratio < best_ratio - PIVOT_TOLERANCE
                    || (ratio < best_ratio + PIVOT_TOLERANCE
                        && leaving.is_some_and(|l| basis[i] < basis[l]));
                if better {
                    best_ratio = ratio;
                    leaving = Some(i);
                }
            }
        }
        let Some(leaving) = leaving else {
            return SimplexStatus::Unbounded;
        };

        pivot(tableau, leaving, entering, m, total);
        basis[leaving] = entering;
    }
    SimplexStatus::IterationLimit
}

fn pivot(tableau: &mut [Vec<f64>], row: usize, col: usize, m: usize, total: usize) {
    let pivot_value = tableau[row][col];
    for j in 0..=total {
        tableau[row][j] /= pivot_value;
    }
    let pivot_row = tableau[row].clone();
    for i in 0..=m {
        if i == row {
            continue;
        }
        let factor = tableau[i][col];
        if factor.abs() > 0.0 {
            for j in 0..=total {
                tableau[i][j] -= factor * pivot_row[j];
            }
        }
    }
}

fn extract_solution(
    tableau: &[Vec<f64>],
    basis: &[usize],
    m: usize,
    n: usize,
    total: usize,
    objective: &[f64],
) -> LpSolution {
    let mut x = vec![0.0; n];
    for i in 0..m {
        if basis[i] < n {
            x[basis[i]] = tableau[i][total];
        }
    }
    let objective_value = objective.iter().zip(&x).map(|(c, v)| c * v).sum();
    LpSolution {
        x,
        objective: objective_value,
    }
}
