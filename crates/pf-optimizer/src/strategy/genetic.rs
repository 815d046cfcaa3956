//! Generational genetic algorithm.

use async_trait::async_trait;
use pf_types::{EvaluationResult, ParameterSet, ParameterSpace, PfResult};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use super::{
    fitness_of, mean_pairwise_distance, seeds_from_prior, Algorithm, BestTracker, GeneticSettings,
    OptimizationConfig, OptimizationResult, SearchStrategy,
};
use crate::engine::SweepEngine;

/// Tournament selection, uniform crossover and Gaussian mutation over raw
/// parameter coordinates. Children are clamped and snapped to the step grid.
/// There is no elitism; the best individual ever evaluated is tracked on the
/// side.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneticSearch;

pub(crate) fn population_size(settings: &GeneticSettings, budget: usize) -> usize {
    settings.population_size.unwrap_or((budget / 5).max(4))
}

type Genome = Vec<f64>;

fn random_genome(space: &ParameterSpace, rng: &mut StdRng) -> Genome {
    space
        .ranges
        .iter()
        .map(|r| r.sample_uniform(rng).as_f64())
        .collect()
}

fn diversity(space: &ParameterSpace, population: &[Genome]) -> f64 {
    let unit: Vec<Vec<f64>> = population
        .iter()
        .map(|g| space.ranges.iter().zip(g).map(|(r, x)| r.to_unit(*x)).collect())
        .collect();
    mean_pairwise_distance(&unit)
}

/// Best of `k` uniformly drawn contestants; the first drawn wins ties.
fn tournament(fitness: &[f64], k: usize, rng: &mut StdRng) -> usize {
    let mut winner = rng.random_range(0..fitness.len());
    for _ in 1..k {
        let challenger = rng.random_range(0..fitness.len());
        if fitness[challenger] > fitness[winner] {
            winner = challenger;
        }
    }
    winner
}

fn breed(
    space: &ParameterSpace,
    population: &[Genome],
    fitness: &[f64],
    settings: &GeneticSettings,
    rng: &mut StdRng,
) -> Vec<Genome> {
    let mutations: Vec<Option<Normal<f64>>> = space
        .ranges
        .iter()
        .map(|r| {
            let sigma = settings.mutation_scale * r.width();
            (sigma > 0.0).then(|| Normal::new(0.0, sigma).ok()).flatten()
        })
        .collect();

    (0..population.len())
        .map(|_| {
            let a = &population[tournament(fitness, settings.tournament_size, rng)];
            let b = &population[tournament(fitness, settings.tournament_size, rng)];
            space
                .ranges
                .iter()
                .enumerate()
                .map(|(i, range)| {
                    let mut gene = if rng.random_bool(0.5) { a[i] } else { b[i] };
                    if let Some(normal) = &mutations[i] {
                        if rng.random::<f64>() < settings.mutation_rate {
                            gene += normal.sample(rng);
                        }
                    }
                    range.snap(gene).as_f64()
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl SearchStrategy for GeneticSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Genetic
    }

    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        config.validate()?;
        let space = &config.space;
        let settings = &config.genetic;
        let request = config.request();
        let mut rng = config.rng();
        let mut tracker = BestTracker::new(config.direction);
        let mut stopper = config.early_stopper();
        let mut stopped_early = false;

        let size = population_size(settings, config.max_evaluations);
        let generations = config.max_evaluations / size;

        let mut population: Vec<Genome> = seeds_from_prior(space, config.direction, prior, size)
            .iter()
            .filter_map(|params| space.to_vector(params))
            .collect();
        let seeded = population.len();
        while population.len() < size {
            population.push(random_genome(space, &mut rng));
        }

        info!(
            population = size,
            generations,
            seeded,
            "genetic search started"
        );

        let mut sequence = 0;
        let mut generation = 0;
        loop {
            let sets: Vec<ParameterSet> = population.iter().map(|g| space.from_vector(g)).collect();
            let results = engine.evaluate_batch(&request, sequence, sets).await;
            sequence += results.len();

            let spread = diversity(space, &population);
            let generation_best = tracker.generation(generation, &results, Some(spread));
            debug!(
                generation,
                best = ?generation_best,
                overall = ?tracker.best_score(),
                diversity = spread,
                "generation evaluated"
            );

            if let (Some(stopper), Some(score)) = (stopper.as_mut(), generation_best) {
                stopped_early = stopper.observe(score);
            }
            if generation >= generations || stopped_early {
                break;
            }

            let fitness: Vec<f64> = results
                .iter()
                .map(|r| fitness_of(config.direction, r))
                .collect();
            population = breed(space, &population, &fitness, settings, &mut rng);
            generation += 1;
        }

        info!(
            evaluated = tracker.evaluated(),
            generations = generation + 1,
            best_score = ?tracker.best_score(),
            stopped_early,
            "genetic search finished"
        );
        Ok(tracker.finish(Algorithm::Genetic, stopped_early))
    }
}
