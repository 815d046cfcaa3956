//! Exhaustive grid search.

use async_trait::async_trait;
use pf_types::{EvaluationResult, PfResult};
use tracing::info;

use super::{Algorithm, BestTracker, OptimizationConfig, OptimizationResult, SearchStrategy};
use crate::engine::SweepEngine;

/// Evaluates every point of the Cartesian product as a single sweep. The
/// evaluation budget does not apply; the grid size cap does.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridSearch;

#[async_trait]
impl SearchStrategy for GridSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Grid
    }

    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        _prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        config.validate()?;
        let sweep = engine.create_sweep(config.sweep_config())?;
        info!(
            sweep_id = %sweep.id,
            combinations = sweep.total_combinations,
            "grid search started"
        );

        let execution = engine.execute_sweep(sweep.id).await?;
        let tracker = BestTracker::from_sweep(config.direction, &execution);
        Ok(tracker.finish(Algorithm::Grid, execution.stopped_early))
    }
}
