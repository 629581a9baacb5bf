//! Scenario-based CVaR optimization.
//!
//! Implements the Rockafellar–Uryasev linear program: decision variables are
//! the portfolio weights w and an auxiliary VaR level ζ; each scenario gets a
//! non-negative slack capturing loss beyond ζ, and
//!
//! ```text
//! CVaR(w) = min over ζ of   ζ + 1/((1−c)·S) · Σ_s [loss_s(w) − ζ]⁺
//! ```
//!
//! which the simplex solver minimizes exactly. Infeasibility is a typed
//! error the orchestrator recovers from; an iteration-limited solve returns
//! the best feasible vertex with `converged = false` rather than silently
//! claiming optimality.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BallastError, Result};
use crate::lp::{LpOutcome, LpProblem, Sense};
use crate::types::OptimizationConstraints;

/// Objective variant for one CVaR optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CvarVariant {
    /// Minimize CVaR outright.
    MinCvar,
    /// Minimize CVaR − risk_aversion · expected return.
    MeanCvar { risk_aversion: f64 },
    /// Maximize expected return subject to CVaR ≤ max_cvar.
    ReturnMaxUnderCvar { max_cvar: f64 },
    /// Inverse-volatility risk parity, blended toward the min-CVaR
    /// solution when the parity weights breach the budget.
    RiskParityCvar { max_cvar: f64 },
}

/// CVaR optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvarOptimizerConfig {
    /// Tail confidence level in (0, 1).
    pub confidence: f64,
    /// Simplex iteration cap per solve.
    pub max_iterations: usize,
}

impl Default for CvarOptimizerConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            max_iterations: 10_000,
        }
    }
}

/// One solved allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvarSolution {
    pub weights: Vec<f64>,
    /// The optimal ζ (VaR level) of the program.
    pub var: f64,
    /// CVaR of the returned weights.
    pub cvar: f64,
    /// Expected portfolio return per period under the scenario set.
    pub expected_return: f64,
    /// False when the iteration cap was hit; the weights are the best
    /// feasible vertex found.
    pub converged: bool,
}

/// Scenario-based tail-risk optimizer.
#[derive(Debug, Clone, Default)]
pub struct CvarOptimizer {
    config: CvarOptimizerConfig,
}

impl CvarOptimizer {
    pub fn new(config: CvarOptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CvarOptimizerConfig {
        &self.config
    }

    /// Optimize over a scenario matrix (rows = scenarios, columns =
    /// instruments in `universe` order).
    pub fn optimize(
        &self,
        universe: &[String],
        scenarios: &[Vec<f64>],
        constraints: &OptimizationConstraints,
        variant: &CvarVariant,
    ) -> Result<CvarSolution> {
        let (num_scenarios, n) = validate_scenarios(scenarios)?;
        if universe.len() != n {
            return Err(BallastError::InvalidInput(format!(
                "universe/scenario width mismatch: {} vs {}",
                universe.len(),
                n
            )));
        }
        if !(self.config.confidence > 0.0 && self.config.confidence < 1.0) {
            return Err(BallastError::InvalidConfidenceLevel(self.config.confidence));
        }
        constraints
            .validate(n)
            .map_err(BallastError::InvalidInput)?;

        let means = scenario_means(scenarios, n);

        // An unreachable minimum-return constraint is infeasible before any
        // simplex work. Exact only for the long-only polytope; with shorting
        // the achievable set is larger, so the program decides there.
        if constraints.long_only {
            if let Some(min_return) = constraints.min_expected_return {
                let best = max_achievable_return(&means, constraints);
                if best < min_return - 1e-9 {
                    return Err(BallastError::Infeasible(format!(
                        "minimum return {:.6} exceeds best achievable {:.6}",
                        min_return, best
                    )));
                }
            }
        }

        match variant {
            CvarVariant::RiskParityCvar { max_cvar } => {
                self.risk_parity_overlay(universe, scenarios, constraints, *max_cvar)
            }
            _ => self.solve_lp(
                universe,
                scenarios,
                constraints,
                variant,
                num_scenarios,
                n,
                &means,
            ),
        }
    }

    /// Sweep the mean-CVaR tradeoff to trace the efficient frontier.
    pub fn efficient_frontier(
        &self,
        universe: &[String],
        scenarios: &[Vec<f64>],
        constraints: &OptimizationConstraints,
        points: usize,
        max_risk_aversion: f64,
    ) -> Result<Vec<CvarSolution>> {
        if points < 2 {
            return Err(BallastError::InvalidInput(
                "frontier needs at least 2 points".to_string(),
            ));
        }
        let mut frontier = Vec::with_capacity(points);
        for k in 0..points {
            let risk_aversion = max_risk_aversion * k as f64 / (points - 1) as f64;
            let solution = self.optimize(
                universe,
                scenarios,
                constraints,
                &CvarVariant::MeanCvar { risk_aversion },
            )?;
            frontier.push(solution);
        }
        Ok(frontier)
    }

    /// Build and solve the Rockafellar–Uryasev program.
    ///
    /// Variable layout (all non-negative): long-only
    /// `[w_0..w_{n-1}, ζ⁺, ζ⁻, u_0..u_{S-1}]`; with shorting the first n
    /// slots become 2n as `w = p − q`.
    #[allow(clippy::too_many_arguments)]
    fn solve_lp(
        &self,
        universe: &[String],
        scenarios: &[Vec<f64>],
        constraints: &OptimizationConstraints,
        variant: &CvarVariant,
        num_scenarios: usize,
        n: usize,
        means: &[f64],
    ) -> Result<CvarSolution> {
        let shorting = !constraints.long_only;
        let weight_vars = if shorting { 2 * n } else { n };
        let zeta_plus = weight_vars;
        let zeta_minus = weight_vars + 1;
        let slack_start = weight_vars + 2;
        let total_vars = slack_start + num_scenarios;

        let tail_factor = 1.0 / ((1.0 - self.config.confidence) * num_scenarios as f64);

        // Net weight coefficient helper: +1 on p_i, −1 on q_i.
        let weight_coefficient = |column: &mut Vec<f64>, i: usize, value: f64| {
            column[i] += value;
            if shorting {
                column[n + i] -= value;
            }
        };

        let mut objective = vec![0.0; total_vars];
        let cvar_in_objective = match variant {
            CvarVariant::MinCvar => true,
            CvarVariant::MeanCvar { risk_aversion } => {
                for i in 0..n {
                    weight_coefficient(&mut objective, i, -risk_aversion * means[i]);
                }
                true
            }
            CvarVariant::ReturnMaxUnderCvar { .. } => {
                for i in 0..n {
                    weight_coefficient(&mut objective, i, -means[i]);
                }
                false
            }
            CvarVariant::RiskParityCvar { .. } => unreachable!("handled by overlay"),
        };
        if cvar_in_objective {
            objective[zeta_plus] += 1.0;
            objective[zeta_minus] -= 1.0;
            for s in 0..num_scenarios {
                objective[slack_start + s] += tail_factor;
            }
        }

        let mut lp =
            LpProblem::minimize(objective).with_max_iterations(self.config.max_iterations);

        // Full investment: Σ w = 1.
        let mut budget_row = vec![0.0; total_vars];
        for i in 0..n {
            weight_coefficient(&mut budget_row, i, 1.0);
        }
        lp.constraint(budget_row, Sense::Eq, 1.0);

        // Per-scenario tail rows: r_s·w + ζ + u_s ≥ 0.
        for (s, scenario) in scenarios.iter().enumerate() {
            let mut row = vec![0.0; total_vars];
            for i in 0..n {
                weight_coefficient(&mut row, i, scenario[i]);
            }
            row[zeta_plus] = 1.0;
            row[zeta_minus] = -1.0;
            row[slack_start + s] = 1.0;
            lp.constraint(row, Sense::Ge, 0.0);
        }

        // Position caps. Long-only caps w_i; with shorting each leg is
        // capped and gross exposure is bounded by max_leverage.
        for i in 0..weight_vars {
            let mut row = vec![0.0; total_vars];
            row[i] = 1.0;
            lp.constraint(row, Sense::Le, constraints.max_position_weight);
        }
        if shorting {
            let mut gross = vec![0.0; total_vars];
            for i in 0..weight_vars {
                gross[i] = 1.0;
            }
            lp.constraint(gross, Sense::Le, constraints.max_leverage);
        }

        // Minimum expected return.
        if let Some(min_return) = constraints.min_expected_return {
            let mut row = vec![0.0; total_vars];
            for i in 0..n {
                weight_coefficient(&mut row, i, means[i]);
            }
            lp.constraint(row, Sense::Ge, min_return);
        }

        // Sector caps, keyed by instrument name.
        if let Some(cap) = constraints.max_sector_weight {
            let mut sectors: Vec<&String> = constraints.sectors.values().collect();
            sectors.sort();
            sectors.dedup();
            for sector in sectors {
                let mut row = vec![0.0; total_vars];
                let mut any = false;
                for (i, name) in universe.iter().enumerate() {
                    if constraints.sectors.get(name) == Some(sector) {
                        weight_coefficient(&mut row, i, 1.0);
                        any = true;
                    }
                }
                if any {
                    lp.constraint(row, Sense::Le, cap);
                }
            }
        }

        // CVaR budget for the return-maximizing variant.
        if let CvarVariant::ReturnMaxUnderCvar { max_cvar } = variant {
            let mut row = vec![0.0; total_vars];
            row[zeta_plus] = 1.0;
            row[zeta_minus] = -1.0;
            for s in 0..num_scenarios {
                row[slack_start + s] = tail_factor;
            }
            lp.constraint(row, Sense::Le, *max_cvar);
        }

        debug!(
            variables = total_vars,
            constraints = lp.num_constraints(),
            scenarios = num_scenarios,
            "solving CVaR program"
        );

        let (solution, converged) = match lp.solve() {
            LpOutcome::Optimal(solution) => (solution, true),
            LpOutcome::IterationLimit(solution) => {
                warn!("CVaR program hit iteration limit; returning best feasible vertex");
                (solution, false)
            }
            LpOutcome::Infeasible => {
                return Err(BallastError::Infeasible(
                    "scenario program admits no solution".to_string(),
                ))
            }
            LpOutcome::Unbounded => {
                return Err(BallastError::InvalidInput(
                    "CVaR program unbounded; constraint set is malformed".to_string(),
                ))
            }
        };

        let weights: Vec<f64> = (0..n)
            .map(|i| {
                if shorting {
                    solution.x[i] - solution.x[n + i]
                } else {
                    solution.x[i]
                }
            })
            .collect();
        let expected_return = means.iter().zip(&weights).map(|(m, w)| m * w).sum();

        // When CVaR sits in the objective, (ζ, u) minimize the
        // Rockafellar–Uryasev expression for the returned weights and the
        // LP values are the CVaR/VaR estimates. In the budget-constrained
        // variant they are only feasible, so recompute from the weights.
        let (var, cvar) = if cvar_in_objective {
            let var = solution.x[zeta_plus] - solution.x[zeta_minus];
            let slack_sum: f64 =
                (0..num_scenarios).map(|s| solution.x[slack_start + s]).sum();
            (var, var + tail_factor * slack_sum)
        } else {
            (
                empirical_var(scenarios, &weights, self.config.confidence),
                empirical_cvar(scenarios, &weights, self.config.confidence),
            )
        };

        Ok(CvarSolution {
            weights,
            var,
            cvar,
            expected_return,
            converged,
        })
    }

    /// Risk parity with a CVaR overlay: start from inverse-volatility
    /// weights; if they breach the budget, bisect toward the min-CVaR
    /// solution until the budget holds.
    fn risk_parity_overlay(
        &self,
        universe: &[String],
        scenarios: &[Vec<f64>],
        constraints: &OptimizationConstraints,
        max_cvar: f64,
    ) -> Result<CvarSolution> {
        let (_, n) = validate_scenarios(scenarios)?;
        let means = scenario_means(scenarios, n);

        let parity = inverse_volatility_weights(scenarios, n);
        let parity_cvar = empirical_cvar(scenarios, &parity, self.config.confidence);
        if parity_cvar <= max_cvar {
            return Ok(CvarSolution {
                expected_return: means.iter().zip(&parity).map(|(m, w)| m * w).sum(),
                var: empirical_var(scenarios, &parity, self.config.confidence),
                cvar: parity_cvar,
                weights: parity,
                converged: true,
            });
        }

        let min_cvar = self.optimize(universe, scenarios, constraints, &CvarVariant::MinCvar)?;
        if min_cvar.cvar > max_cvar + 1e-9 {
            return Err(BallastError::Infeasible(format!(
                "CVaR budget {:.6} below minimum achievable {:.6}",
                max_cvar, min_cvar.cvar
            )));
        }

        // Smallest blend toward min-CVaR that satisfies the budget.
        let mut low = 0.0;
        let mut high = 1.0;
        for _ in 0..32 {
            let mid = 0.5 * (low + high);
            let blended = blend(&parity, &min_cvar.weights, mid);
            if empirical_cvar(scenarios, &blended, self.config.confidence) <= max_cvar {
                high = mid;
            } else {
                low = mid;
            }
        }
        let weights = blend(&parity, &min_cvar.weights, high);
        let cvar = empirical_cvar(scenarios, &weights, self.config.confidence);

        Ok(CvarSolution {
            expected_return: means.iter().zip(&weights).map(|(m, w)| m * w).sum(),
            var: empirical_var(scenarios, &weights, self.config.confidence),
            cvar,
            weights,
            converged: min_cvar.converged,
        })
    }
}

fn validate_scenarios(scenarios: &[Vec<f64>]) -> Result<(usize, usize)> {
    let num_scenarios = scenarios.len();
    if num_scenarios == 0 {
        return Err(BallastError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    let n = scenarios[0].len();
    if n == 0 {
        return Err(BallastError::InvalidInput(
            "scenarios carry no instruments".to_string(),
        ));
    }
    if scenarios.iter().any(|s| s.len() != n) {
        return Err(BallastError::InvalidInput(
            "ragged scenario matrix".to_string(),
        ));
    }
    Ok((num_scenarios, n))
}

fn scenario_means(scenarios: &[Vec<f64>], n: usize) -> Vec<f64> {
    let mut means = vec![0.0; n];
    for scenario in scenarios {
        for (m, r) in means.iter_mut().zip(scenario) {
            *m += r;
        }
    }
    for m in &mut means {
        *m /= scenarios.len() as f64;
    }
    means
}

/// Best expected return reachable under Σw=1 with the long-only position
/// cap: fill the highest-mean instruments at the cap.
fn max_achievable_return(means: &[f64], constraints: &OptimizationConstraints) -> f64 {
    let mut sorted: Vec<f64> = means.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let cap = constraints.max_position_weight.min(1.0);
    let mut remaining = 1.0;
    let mut best = 0.0;
    for mean in sorted {
        if remaining <= 0.0 {
            break;
        }
        let take = cap.min(remaining);
        best += take * mean;
        remaining -= take;
    }
    best
}

fn inverse_volatility_weights(scenarios: &[Vec<f64>], n: usize) -> Vec<f64> {
    let s = scenarios.len() as f64;
    let means = scenario_means(scenarios, n);
    let mut inverse_vols = vec![0.0; n];
    for i in 0..n {
        let variance: f64 = scenarios
            .iter()
            .map(|row| (row[i] - means[i]).powi(2))
            .sum::<f64>()
            / (s - 1.0).max(1.0);
        let vol = variance.sqrt();
        inverse_vols[i] = if vol > f64::EPSILON { 1.0 / vol } else { 0.0 };
    }
    let total: f64 = inverse_vols.iter().sum();
    if total > f64::EPSILON {
        for w in &mut inverse_vols {
            *w /= total;
        }
    } else {
        let equal = 1.0 / n as f64;
        inverse_vols.iter_mut().for_each(|w| *w = equal);
    }
    inverse_vols
}

/// Empirical portfolio CVaR at confidence `c` (positive loss magnitude).
pub fn empirical_cvar(scenarios: &[Vec<f64>], weights: &[f64], confidence: f64) -> f64 {
    let mut losses = portfolio_losses(scenarios, weights);
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let var = losses[((confidence * (losses.len() - 1) as f64).round() as usize)
        .min(losses.len() - 1)];
    let tail: Vec<f64> = losses.iter().copied().filter(|&l| l >= var - 1e-12).collect();
    if tail.is_empty() {
        var
    } else {
        (tail.iter().sum::<f64>() / tail.len() as f64).max(var)
    }
}

/// Empirical portfolio VaR at confidence `c`.
pub fn empirical_var(scenarios: &[Vec<f64>], weights: &[f64], confidence: f64) -> f64 {
    let mut losses = portfolio_losses(scenarios, weights);
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    losses[((confidence * (losses.len() - 1) as f64).round() as usize).min(losses.len() - 1)]
}

fn portfolio_losses(scenarios: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    scenarios
        .iter()
        .map(|row| -row.iter().zip(weights).map(|(r, w)| r * w).sum::<f64>())
        .collect()
}

fn blend(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter()
        .zip(b)
        .map(|(x, y)| (1.0 - t) * x + t * y)
        .collect()
}
