//! Uniform random search.

use async_trait::async_trait;
use pf_types::{EvaluationResult, ParameterSet, PfResult};
use tracing::info;

use super::{Algorithm, BestTracker, OptimizationConfig, OptimizationResult, SearchStrategy};
use crate::engine::SweepEngine;

/// Draws `max_evaluations` snapped points uniformly from the space and runs
/// them as one sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSearch;

impl RandomSearch {
    pub(crate) async fn run(
        engine: &SweepEngine,
        config: &OptimizationConfig,
    ) -> PfResult<OptimizationResult> {
        config.validate()?;
        let mut rng = config.rng();
        let sets: Vec<ParameterSet> = (0..config.max_evaluations)
            .map(|_| config.space.sample_uniform(&mut rng))
            .collect();

        let sweep = engine.create_sweep_with_sets(config.sweep_config(), sets)?;
        info!(
            sweep_id = %sweep.id,
            samples = sweep.total_combinations,
            seed = ?config.seed,
            "random search started"
        );

        let execution = engine.execute_sweep(sweep.id).await?;
        let tracker = BestTracker::from_sweep(config.direction, &execution);
        Ok(tracker.finish(Algorithm::Random, execution.stopped_early))
    }
}

#[async_trait]
impl SearchStrategy for RandomSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Random
    }

    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        _prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        Self::run(engine, config).await
    }
}
