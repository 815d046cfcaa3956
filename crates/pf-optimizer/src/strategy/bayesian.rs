//! Gaussian-process guided search.

use async_trait::async_trait;
use pf_types::{EvaluationResult, OptimizerError, PfResult};
use tracing::warn;

use super::random::RandomSearch;
use super::{Algorithm, OptimizationConfig, OptimizationResult, SearchStrategy};
use crate::engine::SweepEngine;

/// Sequential model-based search. A GP surrogate is refit after every
/// evaluation and the next point maximizes `mean + kappa * std` over a pool
/// of random candidates. Without the `surrogate` feature it runs random
/// search instead and reports the fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct BayesianSearch;

/// Number of random points evaluated before the surrogate is consulted.
pub(crate) fn bootstrap_size(initial_samples: usize, budget: usize) -> usize {
    initial_samples.min(budget / 4).max(2).min(budget)
}

async fn fallback_to_random(
    engine: &SweepEngine,
    config: &OptimizationConfig,
    reason: &str,
) -> PfResult<OptimizationResult> {
    warn!(reason, "surrogate unavailable, bayesian search degrading to random search");
    let mut result = RandomSearch::run(engine, config).await?;
    result.algorithm = Algorithm::Bayesian;
    result.fallback = Some(Algorithm::Random);
    Ok(result)
}

#[async_trait]
impl SearchStrategy for BayesianSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Bayesian
    }

    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        config.validate()?;
        match surrogate::run(engine, config, prior).await {
            Err(OptimizerError::SurrogateUnavailable(reason)) => {
                fallback_to_random(engine, config, &reason).await
            }
            other => other,
        }
    }
}

#[cfg(not(feature = "surrogate"))]
mod surrogate {
    use super::*;

    pub(super) async fn run(
        _engine: &SweepEngine,
        _config: &OptimizationConfig,
        _prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        Err(OptimizerError::SurrogateUnavailable(
            "built without the `surrogate` feature".to_string(),
        ))
    }
}

#[cfg(feature = "surrogate")]
mod surrogate {
    use super::*;
    use crate::strategy::gp::GaussianProcess;
    use crate::strategy::{BayesianSettings, BestTracker};
    use pf_types::ParameterSet;
    use rand::rngs::StdRng;
    use rand::Rng;
    use rayon::prelude::*;
    use tracing::{debug, info};

    /// Successful observations on the unit hypercube, targets on a
    /// higher-is-better scale.
    struct TrainingSet {
        inputs: Vec<Vec<f64>>,
        targets: Vec<f64>,
    }

    impl TrainingSet {
        fn absorb(&mut self, config: &OptimizationConfig, result: &EvaluationResult) {
            let Some(score) = result.score.filter(|s| result.success && s.is_finite()) else {
                return;
            };
            if let Some(unit) = config.space.to_unit_vector(&result.parameters) {
                self.inputs.push(unit);
                self.targets.push(config.direction.fitness(score));
            }
        }
    }

    fn propose(
        gp: &GaussianProcess,
        dims: usize,
        settings: &BayesianSettings,
        rng: &mut StdRng,
    ) -> Option<(Vec<f64>, f64)> {
        let candidates: Vec<Vec<f64>> = (0..settings.candidate_pool)
            .map(|_| (0..dims).map(|_| rng.random::<f64>()).collect())
            .collect();

        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|c| {
                let (mean, std) = gp.predict(c);
                mean + settings.kappa * std
            })
            .collect();

        let mut best: Option<usize> = None;
        for (i, score) in scores.iter().enumerate() {
            if !score.is_finite() {
                continue;
            }
            match best {
                Some(b) if *score <= scores[b] => {}
                _ => best = Some(i),
            }
        }
        best.map(|i| (candidates[i].clone(), scores[i]))
    }

    pub(super) async fn run(
        engine: &SweepEngine,
        config: &OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        let budget = config.max_evaluations;
        let settings = &config.bayesian;
        let space = &config.space;
        let request = config.request();
        let mut rng = config.rng();
        let mut tracker = BestTracker::new(config.direction);
        let mut stopper = config.early_stopper();
        let mut stopped_early = false;

        let mut training = TrainingSet {
            inputs: Vec::new(),
            targets: Vec::new(),
        };
        for result in prior {
            training.absorb(config, result);
        }

        let bootstrap = bootstrap_size(settings.initial_samples, budget);
        info!(
            budget,
            bootstrap,
            prior = training.inputs.len(),
            pool = settings.candidate_pool,
            "bayesian search started"
        );

        let sets: Vec<ParameterSet> = (0..bootstrap)
            .map(|_| space.sample_uniform(&mut rng))
            .collect();
        for (sequence, result) in engine
            .evaluate_batch(&request, 0, sets)
            .await
            .iter()
            .enumerate()
        {
            tracker.step(sequence, result);
            training.absorb(config, result);
            if let (Some(stopper), Some(score)) = (stopper.as_mut(), result.score) {
                stopped_early |= stopper.observe(score);
            }
        }

        let mut sequence = bootstrap;
        while sequence < budget && !stopped_early {
            let fitted = GaussianProcess::fit(
                &training.inputs,
                &training.targets,
                settings.length_scale,
                settings.noise,
            );
            let params = match fitted.and_then(|gp| propose(&gp, space.len(), settings, &mut rng)) {
                Some((unit, acquisition)) => {
                    debug!(sequence, acquisition, "surrogate proposal");
                    space.from_unit_vector(&unit)
                }
                None => {
                    debug!(sequence, "surrogate fit unusable, sampling at random");
                    space.sample_uniform(&mut rng)
                }
            };

            let result = engine.evaluate_one(&request, sequence, params).await;
            tracker.step(sequence, &result);
            training.absorb(config, &result);
            if let (Some(stopper), Some(score)) = (stopper.as_mut(), result.score) {
                stopped_early = stopper.observe(score);
            }
            sequence += 1;
        }

        if stopped_early {
            info!(evaluated = tracker.evaluated(), "bayesian search stopped early");
        }
        info!(
            evaluated = tracker.evaluated(),
            best_score = ?tracker.best_score(),
            "bayesian search finished"
        );
        Ok(tracker.finish(Algorithm::Bayesian, stopped_early))
    }
}
