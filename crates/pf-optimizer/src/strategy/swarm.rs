//! Particle swarm optimization.

use async_trait::async_trait;
use pf_types::{EvaluationResult, ParameterSet, ParameterSpace, PfResult};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use super::{
    fitness_of, mean_pairwise_distance, seeds_from_prior, Algorithm, BestTracker,
    OptimizationConfig, OptimizationResult, SearchStrategy, SwarmSettings,
};
use crate::engine::SweepEngine;

/// Initial velocity bound as a fraction of each range's width.
const INITIAL_VELOCITY_SCALE: f64 = 0.1;

/// Global-best PSO. Particles move through the continuous hull of the space
/// and are evaluated at their snapped positions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParticleSwarmSearch;

pub(crate) fn swarm_size(settings: &SwarmSettings, budget: usize) -> usize {
    settings
        .swarm_size
        .unwrap_or((budget / 5).clamp(4, 30))
        .min(budget)
        .max(1)
}

struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Option<Vec<f64>>,
    best_fitness: f64,
}

impl Particle {
    fn new(space: &ParameterSpace, position: Vec<f64>, rng: &mut StdRng) -> Self {
        let velocity = space
            .ranges
            .iter()
            .map(|r| (rng.random::<f64>() * 2.0 - 1.0) * INITIAL_VELOCITY_SCALE * r.width())
            .collect();
        Self {
            position,
            velocity,
            best_position: None,
            best_fitness: f64::NEG_INFINITY,
        }
    }

    fn random(space: &ParameterSpace, rng: &mut StdRng) -> Self {
        let position = space
            .ranges
            .iter()
            .map(|r| r.min + rng.random::<f64>() * r.width())
            .collect();
        Self::new(space, position, rng)
    }

    fn step(
        &mut self,
        space: &ParameterSpace,
        global_best: Option<&[f64]>,
        settings: &SwarmSettings,
        rng: &mut StdRng,
    ) {
        for d in 0..self.position.len() {
            let x = self.position[d];
            let r1 = rng.random::<f64>();
            let r2 = rng.random::<f64>();
            let cognitive = self
                .best_position
                .as_ref()
                .map_or(0.0, |b| settings.cognitive * r1 * (b[d] - x));
            let social = global_best.map_or(0.0, |g| settings.social * r2 * (g[d] - x));
            self.velocity[d] = settings.inertia * self.velocity[d] + cognitive + social;
            self.position[d] = x + self.velocity[d];
        }
        for axis in space.clamp_vector(&mut self.position) {
            self.velocity[axis] = 0.0;
        }
    }
}

fn spread(space: &ParameterSpace, particles: &[Particle]) -> f64 {
    let unit: Vec<Vec<f64>> = particles
        .iter()
        .map(|p| {
            space
                .ranges
                .iter()
                .zip(&p.position)
                .map(|(r, x)| r.to_unit(*x))
                .collect()
        })
        .collect();
    mean_pairwise_distance(&unit)
}

#[async_trait]
impl SearchStrategy for ParticleSwarmSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ParticleSwarm
    }

    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        config.validate()?;
        let space = &config.space;
        let settings = &config.swarm;
        let request = config.request();
        let mut rng = config.rng();
        let mut tracker = BestTracker::new(config.direction);
        let mut stopper = config.early_stopper();
        let mut stopped_early = false;

        let size = swarm_size(settings, config.max_evaluations);
        let iterations = (config.max_evaluations / size).saturating_sub(1);

        let mut particles: Vec<Particle> = Vec::with_capacity(size);
        for seed in seeds_from_prior(space, config.direction, prior, size) {
            if let Some(position) = space.to_vector(&seed) {
                particles.push(Particle::new(space, position, &mut rng));
            }
        }
        let seeded = particles.len();
        while particles.len() < size {
            particles.push(Particle::random(space, &mut rng));
        }

        info!(swarm = size, iterations, seeded, "particle swarm started");

        let mut global_best: Option<Vec<f64>> = None;
        let mut global_fitness = f64::NEG_INFINITY;
        let mut sequence = 0;
        let mut iteration = 0;

        loop {
            let sets: Vec<ParameterSet> = particles
                .iter()
                .map(|p| space.from_vector(&p.position))
                .collect();
            let results = engine.evaluate_batch(&request, sequence, sets).await;
            sequence += results.len();

            for (particle, result) in particles.iter_mut().zip(&results) {
                let fitness = fitness_of(config.direction, result);
                if fitness > particle.best_fitness {
                    particle.best_fitness = fitness;
                    particle.best_position = Some(particle.position.clone());
                }
                if fitness > global_fitness {
                    global_fitness = fitness;
                    global_best = Some(particle.position.clone());
                }
            }

            let diversity = spread(space, &particles);
            let iteration_best = tracker.generation(iteration, &results, Some(diversity));
            debug!(
                iteration,
                best = ?iteration_best,
                overall = ?tracker.best_score(),
                diversity,
                "swarm iteration evaluated"
            );

            if let (Some(stopper), Some(score)) = (stopper.as_mut(), iteration_best) {
                stopped_early = stopper.observe(score);
            }
            if iteration >= iterations || stopped_early {
                break;
            }

            for particle in particles.iter_mut() {
                particle.step(space, global_best.as_deref(), settings, &mut rng);
            }
            iteration += 1;
        }

        info!(
            evaluated = tracker.evaluated(),
            iterations = iteration + 1,
            best_score = ?tracker.best_score(),
            stopped_early,
            "particle swarm finished"
        );
        Ok(tracker.finish(Algorithm::ParticleSwarm, stopped_early))
    }
}
