//! Genetic search over strategy parameters.
//!
//! A population of genomes in [0, 1]^k is decoded against parameter bounds,
//! scored by a caller-supplied fitness function (typically a risk-adjusted
//! return from a backtest run), and evolved with tournament selection,
//! uniform crossover, bounded mutation and elitism. Evolution draws from a
//! single seeded PRNG and fitness evaluation is pure, so a fixed seed
//! reproduces the full fitness trajectory; evaluation parallelism cannot
//! perturb it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backtest::BacktestResult;
use crate::error::{BallastError, Result};
use crate::pool::CancellationToken;

/// Bounds for one decoded parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl ParameterBounds {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    fn decode(&self, gene: f64) -> f64 {
        self.min + gene.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

/// Genetic algorithm hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Mutation step half-width in genome space.
    pub mutation_step: f64,
    pub tournament_size: usize,
    /// Top genomes copied unchanged into the next generation.
    pub elitism: usize,
    pub seed: u64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            generations: 20,
            mutation_rate: 0.1,
            mutation_step: 0.2,
            tournament_size: 3,
            elitism: 1,
            seed: 42,
        }
    }
}

/// Per-generation fitness summary; the trajectory is the reproducibility
/// witness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
}

/// Final search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticResult {
    /// Best genome found across all generations.
    pub best_genome: Vec<f64>,
    /// The genome decoded through the parameter bounds.
    pub best_parameters: Vec<f64>,
    pub best_fitness: f64,
    pub history: Vec<GenerationStats>,
    /// Total fitness evaluations performed.
    pub evaluations: usize,
}

/// Evolutionary optimizer over a bounded parameter space.
pub struct GeneticSearch {
    config: GeneticConfig,
    bounds: Vec<ParameterBounds>,
}

impl GeneticSearch {
    pub fn new(config: GeneticConfig, bounds: Vec<ParameterBounds>) -> Result<Self> {
        if bounds.is_empty() {
            return Err(BallastError::InvalidInput(
                "parameter space is empty".to_string(),
            ));
        }
        if config.population_size < 2 {
            return Err(BallastError::ConfigError(
                "population_size must be at least 2".to_string(),
            ));
        }
        if config.generations == 0 {
            return Err(BallastError::ConfigError(
                "generations must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.mutation_rate) {
            return Err(BallastError::ConfigError(format!(
                "mutation_rate {} outside [0, 1]",
                config.mutation_rate
            )));
        }
        Ok(Self { config, bounds })
    }

    pub fn bounds(&self) -> &[ParameterBounds] {
        &self.bounds
    }

    /// Decode a genome into parameter space.
    pub fn decode(&self, genome: &[f64]) -> Vec<f64> {
        self.bounds
            .iter()
            .zip(genome)
            .map(|(bounds, &gene)| bounds.decode(gene))
            .collect()
    }

    /// Run the search. `fitness` receives decoded parameters and must be a
    /// pure function for the seed guarantee to hold.
    pub fn run<F>(&self, fitness: F) -> Result<GeneticResult>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        self.run_cancellable(fitness, &CancellationToken::new())
    }

    /// Run with a cancellation checkpoint between generations.
    pub fn run_cancellable<F>(
        &self,
        fitness: F,
        token: &CancellationToken,
    ) -> Result<GeneticResult>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let genome_len = self.bounds.len();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut population: Vec<Vec<f64>> = (0..self.config.population_size)
            .map(|_| (0..genome_len).map(|_| rng.gen::<f64>()).collect())
            .collect();

        let mut history = Vec::with_capacity(self.config.generations);
        let mut evaluations = 0;
        let mut global_best: Option<(Vec<f64>, f64)> = None;

        for generation in 0..self.config.generations {
            token.checkpoint()?;

            // Parallel evaluation; collect preserves population order, so
            // the outcome is independent of thread scheduling.
            let scores: Vec<f64> = population
                .par_iter()
                .map(|genome| fitness(&self.decode(genome)))
                .collect();
            evaluations += scores.len();

            let mut ranked: Vec<usize> = (0..population.len()).collect();
            ranked.sort_by(|&a, &b| {
                scores[b]
                    .partial_cmp(&scores[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });

            let best_index = ranked[0];
            let best_fitness = scores[best_index];
            let mean_fitness = scores.iter().sum::<f64>() / scores.len() as f64;
            history.push(GenerationStats {
                generation,
                best_fitness,
                mean_fitness,
            });
            debug!(generation, best_fitness, mean_fitness, "generation scored");

            let improved = global_best
                .as_ref()
                .is_none_or(|(_, fitness)| best_fitness > *fitness);
            if improved {
                global_best = Some((population[best_index].clone(), best_fitness));
            }

            if generation + 1 == self.config.generations {
                break;
            }

            // Next generation: elites unchanged, the rest bred by
            // tournament selection, uniform crossover and bounded mutation.
            let mut next = Vec::with_capacity(self.config.population_size);
            for &index in ranked.iter().take(self.config.elitism) {
                next.push(population[index].clone());
            }
            while next.len() < self.config.population_size {
                let parent_a = self.tournament(&ranked, &mut rng);
                let parent_b = self.tournament(&ranked, &mut rng);
                let mut child = crossover(
                    &population[parent_a],
                    &population[parent_b],
                    &mut rng,
                );
                self.mutate(&mut child, &mut rng);
                next.push(child);
            }
            population = next;
        }

        let (best_genome, best_fitness) = global_best.ok_or_else(|| {
            BallastError::InvalidInput("search produced no evaluations".to_string())
        })?;
        let best_parameters = self.decode(&best_genome);
        info!(
            best_fitness,
            evaluations, "genetic search complete"
        );

        Ok(GeneticResult {
            best_parameters,
            best_genome,
            best_fitness,
            history,
            evaluations,
        })
    }

    /// Rank-based tournament: draw k ranks, keep the best (lowest).
    fn tournament(&self, ranked: &[usize], rng: &mut StdRng) -> usize {
        let n = ranked.len();
        let k = self.config.tournament_size.clamp(1, n);
        let mut best_rank = rng.gen_range(0..n);
        for _ in 1..k {
            let rank = rng.gen_range(0..n);
            if rank < best_rank {
                best_rank = rank;
            }
        }
        ranked[best_rank]
    }

    fn mutate(&self, genome: &mut [f64], rng: &mut StdRng) {
        let step = self.config.mutation_step;
        for gene in genome.iter_mut() {
            if rng.gen::<f64>() < self.config.mutation_rate {
                *gene = (*gene + rng.gen_range(-step..=step)).clamp(0.0, 1.0);
            }
        }
    }
}

/// Gene-wise uniform crossover.
fn crossover(a: &[f64], b: &[f64], rng: &mut StdRng) -> Vec<f64> {
    a.iter()
        .zip(b)
        .map(|(&ga, &gb)| if rng.gen::<bool>() { ga } else { gb })
        .collect()
}

/// Sharpe-ratio fitness for a backtest result.
pub fn sharpe_fitness(result: &BacktestResult) -> f64 {
    result.sharpe
}

/// CVaR-adjusted fitness: annualized return penalized by the empirical tail
/// loss of the period returns.
pub fn cvar_adjusted_fitness(result: &BacktestResult, confidence: f64, risk_aversion: f64) -> f64 {
    let returns = result.period_returns();
    if returns.is_empty() {
        return 0.0;
    }
    let mut losses: Vec<f64> = returns.iter().map(|r| -r).collect();
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((confidence * (losses.len() - 1) as f64).round() as usize).min(losses.len() - 1);
    let tail = &losses[idx..];
    let cvar = tail.iter().sum::<f64>() / tail.len() as f64;
    result.annualized_return_pct / 100.0 - risk_aversion * cvar.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<ParameterBounds> {
        vec![
            ParameterBounds::new("x", -5.0, 5.0),
            ParameterBounds::new("y", -5.0, 5.0),
        ]
    }

    /// Smooth unimodal objective with a known optimum at (2, -1).
    fn objective(params: &[f64]) -> f64 {
        -((params[0] - 2.0).powi(2) + (params[1] + 1.0).powi(2))
    }

    #[test]
    fn test_decode_maps_unit_interval() {
        let search = GeneticSearch::new(GeneticConfig::default(), bounds()).unwrap();
        let decoded = search.decode(&[0.0, 1.0]);
        assert!((decoded[0] - (-5.0)).abs() < 1e-12);
        assert!((decoded[1] - 5.0).abs() < 1e-12);
        // Out-of-range genes clamp instead of extrapolating.
        let clamped = search.decode(&[-0.5, 1.5]);
        assert!((clamped[0] - (-5.0)).abs() < 1e-12);
        assert!((clamped[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_converges_toward_optimum() {
        let config = GeneticConfig {
            population_size: 40,
            generations: 60,
            seed: 7,
            ..Default::default()
        };
        let search = GeneticSearch::new(config, bounds()).unwrap();
        let result = search.run(objective).unwrap();

        assert!((result.best_parameters[0] - 2.0).abs() < 0.5);
        assert!((result.best_parameters[1] + 1.0).abs() < 0.5);
        assert!(result.best_fitness > -0.5);
    }

    #[test]
    fn test_fixed_seed_reproduces_fitness_trajectory() {
        let config = GeneticConfig {
            population_size: 20,
            generations: 15,
            seed: 1234,
            ..Default::default()
        };
        let first = GeneticSearch::new(config.clone(), bounds())
            .unwrap()
            .run(objective)
            .unwrap();
        let second = GeneticSearch::new(config, bounds())
            .unwrap()
            .run(objective)
            .unwrap();

        assert_eq!(first.history, second.history);
        assert_eq!(first.best_genome, second.best_genome);
        assert_eq!(first.best_fitness, second.best_fitness);
    }

    #[test]
    fn test_different_seeds_explore_differently() {
        let mut config = GeneticConfig {
            population_size: 20,
            generations: 10,
            seed: 1,
            ..Default::default()
        };
        let first = GeneticSearch::new(config.clone(), bounds())
            .unwrap()
            .run(objective)
            .unwrap();
        config.seed = 2;
        let second = GeneticSearch::new(config, bounds())
            .unwrap()
            .run(objective)
            .unwrap();

        assert_ne!(first.history, second.history);
    }

    #[test]
    fn test_best_fitness_never_degrades() {
        let config = GeneticConfig {
            population_size: 20,
            generations: 25,
            seed: 9,
            ..Default::default()
        };
        let search = GeneticSearch::new(config, bounds()).unwrap();
        let result = search.run(objective).unwrap();

        // Elitism plus global-best tracking: running best is monotone.
        let mut running_best = f64::NEG_INFINITY;
        for stats in &result.history {
            running_best = running_best.max(stats.best_fitness);
        }
        assert_eq!(result.best_fitness, running_best);
    }

    #[test]
    fn test_evaluation_count() {
        let config = GeneticConfig {
            population_size: 10,
            generations: 5,
            ..Default::default()
        };
        let search = GeneticSearch::new(config, bounds()).unwrap();
        let result = search.run(objective).unwrap();
        assert_eq!(result.evaluations, 50);
        assert_eq!(result.history.len(), 5);
    }

    #[test]
    fn test_cancellation() {
        let search = GeneticSearch::new(GeneticConfig::default(), bounds()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = search.run_cancellable(objective, &token);
        assert!(matches!(result, Err(BallastError::Cancelled)));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(GeneticSearch::new(GeneticConfig::default(), Vec::new()).is_err());
        assert!(GeneticSearch::new(
            GeneticConfig {
                population_size: 1,
                ..Default::default()
            },
            bounds()
        )
        .is_err());
        assert!(GeneticSearch::new(
            GeneticConfig {
                mutation_rate: 1.5,
                ..Default::default()
            },
            bounds()
        )
        .is_err());
    }
}
