//! Front door for sweeps and optimization runs.

use parking_lot::RwLock;
use pf_types::{optimization_error, EvaluationResult, PfResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::SweepEngine;
use crate::evaluator::Evaluator;
use crate::ranking::{RankedResults, RankingCriteria, ResultRanker};
use crate::strategy::{
    Algorithm, BayesianSearch, GeneticSearch, GridSearch, OptimizationConfig, OptimizationResult,
    ParticleSwarmSearch, RandomSearch, SearchStrategy,
};
use crate::sweep::{SweepConfig, SweepEvent, SweepExecution, SweepId};

/// Dispatches optimization runs to registered strategies and keeps the
/// history of finished runs and sweeps.
pub struct OptimizationManager {
    engine: SweepEngine,
    strategies: HashMap<Algorithm, Box<dyn SearchStrategy>>,
    runs: RwLock<Vec<OptimizationResult>>,
    ranker: ResultRanker,
}

impl OptimizationManager {
    /// Manager with the five built-in strategies registered.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        let mut manager = Self {
            engine: SweepEngine::new(evaluator),
            strategies: HashMap::new(),
            runs: RwLock::new(Vec::new()),
            ranker: ResultRanker,
        };
        manager.register(Box::new(GridSearch));
        manager.register(Box::new(RandomSearch));
        manager.register(Box::new(BayesianSearch));
        manager.register(Box::new(GeneticSearch));
        manager.register(Box::new(ParticleSwarmSearch));
        manager
    }

    /// Install a strategy under its algorithm, returning the one it replaces.
    pub fn register(
        &mut self,
        strategy: Box<dyn SearchStrategy>,
    ) -> Option<Box<dyn SearchStrategy>> {
        self.strategies.insert(strategy.algorithm(), strategy)
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .into_iter()
            .filter(|a| self.strategies.contains_key(a))
            .collect()
    }

    pub fn engine(&self) -> &SweepEngine {
        &self.engine
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<SweepEvent> {
        self.engine.subscribe()
    }

    // Sweeps

    pub fn create_sweep(&self, config: SweepConfig) -> PfResult<SweepExecution> {
        self.engine.create_sweep(config)
    }

    /// Run a pending sweep; its final state stays queryable afterwards.
    pub async fn execute_sweep(&self, sweep_id: SweepId) -> PfResult<SweepExecution> {
        self.engine.execute_sweep(sweep_id).await
    }

    /// Live state for active sweeps, the archived snapshot otherwise. Covers
    /// sweeps started by grid and random optimization runs too.
    pub fn get_sweep_status(&self, sweep_id: SweepId) -> PfResult<SweepExecution> {
        self.engine.get_sweep_status(sweep_id)
    }

    pub fn cancel_sweep(&self, sweep_id: SweepId) -> bool {
        self.engine.cancel_sweep(sweep_id)
    }

    // Optimization runs

    pub async fn execute_optimization(
        &self,
        algorithm: Algorithm,
        config: OptimizationConfig,
    ) -> PfResult<OptimizationResult> {
        self.execute_optimization_with_prior(algorithm, config, &[])
            .await
    }

    /// Like [`execute_optimization`](Self::execute_optimization), with the
    /// algorithm given by name (`grid`, `random`, `bayesian`, `genetic`,
    /// `particle_swarm` or `pso`).
    pub async fn execute_optimization_named(
        &self,
        algorithm: &str,
        config: OptimizationConfig,
    ) -> PfResult<OptimizationResult> {
        let algorithm: Algorithm = algorithm.parse()?;
        self.execute_optimization(algorithm, config).await
    }

    /// Run a search warm-started from earlier evaluations.
    pub async fn execute_optimization_with_prior(
        &self,
        algorithm: Algorithm,
        config: OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult> {
        let strategy = self
            .strategies
            .get(&algorithm)
            .ok_or_else(|| optimization_error!("no strategy registered for {algorithm}"))?;
        config.validate()?;

        info!(
            algorithm = %algorithm,
            name = %config.name,
            budget = config.max_evaluations,
            target = %config.target_metric,
            prior = prior.len(),
            "optimization started"
        );

        let result = match strategy.optimize(&self.engine, &config, prior).await {
            Ok(result) => result,
            Err(e) => {
                error!(algorithm = %algorithm, error = %e, "optimization failed");
                return Err(e);
            }
        };

        info!(
            run_id = %result.run_id,
            algorithm = %algorithm,
            fallback = ?result.fallback,
            evaluations = result.total_evaluations,
            failed = result.failed_evaluations,
            best_score = ?result.best_score,
            duration_ms = result.duration_ms,
            "optimization finished"
        );
        self.runs.write().push(result.clone());
        Ok(result)
    }

    /// Successful evaluations from stored runs that searched the same space
    /// for the same objective, suitable as `prior` for a new run.
    pub fn prior_evaluations(&self, config: &OptimizationConfig) -> Vec<EvaluationResult> {
        let runs = self.runs.read();
        runs.iter()
            .filter(|run| {
                run.evaluations
                    .first()
                    .is_some_and(|e| config.space.to_vector(&e.parameters).is_some())
            })
            .flat_map(|run| run.successful().cloned())
            .filter(|e| e.metric(&config.target_metric) == e.score)
            .collect()
    }

    // History and ranking

    pub fn optimization_history(&self) -> Vec<OptimizationResult> {
        self.runs.read().clone()
    }

    pub fn get_optimization(&self, run_id: Uuid) -> Option<OptimizationResult> {
        self.runs.read().iter().find(|r| r.run_id == run_id).cloned()
    }

    pub fn rank_results(
        &self,
        results: &[EvaluationResult],
        criteria: &RankingCriteria,
    ) -> PfResult<RankedResults> {
        self.ranker.rank(results, criteria)
    }

    /// Rank the best result of every stored run.
    pub fn rank_runs(&self, criteria: &RankingCriteria) -> PfResult<RankedResults> {
        let best: Vec<EvaluationResult> = self
            .runs
            .read()
            .iter()
            .filter_map(|r| r.best_result.clone())
            .collect();
        self.ranker.rank(&best, criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FnEvaluator;
    use crate::sweep::SweepStatus;
    use async_trait::async_trait;
    use pf_types::{
        EvaluationError, EvaluationOutput, OptimizerError, ParameterSpace, PerformanceMetrics,
    };
    use serde_json::Value;

    fn manager() -> OptimizationManager {
        OptimizationManager::new(Arc::new(FnEvaluator::new(|config: &Value| {
            let x = config["x"].as_f64().unwrap_or(0.0);
            Ok::<_, EvaluationError>(EvaluationOutput::new(PerformanceMetrics {
                sharpe_ratio: Some(1.0 - (x - 4.0).abs() / 10.0),
                total_return: x / 100.0,
                max_drawdown: 0.01 * (x + 1.0),
                win_rate: 0.5,
                profit_factor: Some(1.2),
                ..Default::default()
            }))
        })))
    }

    fn space() -> ParameterSpace {
        ParameterSpace::new().add_integer("x", 0, 10, 1)
    }

    #[tokio::test]
    async fn every_builtin_runs_and_is_recorded() {
        let manager = manager();
        assert_eq!(manager.algorithms(), Algorithm::ALL.to_vec());

        for algorithm in Algorithm::ALL {
            let config = OptimizationConfig::new(algorithm.as_str(), space())
                .with_max_evaluations(12)
                .with_seed(3);
            let result = manager.execute_optimization(algorithm, config).await.unwrap();
            assert_eq!(result.algorithm, algorithm);
            assert!(result.best_score.is_some());
            assert_eq!(result.convergence.len(), result.trace.len());
            assert_eq!(manager.get_optimization(result.run_id), Some(result));
        }
        assert_eq!(manager.optimization_history().len(), 5);

        let ranked = manager.rank_runs(&RankingCriteria::default()).unwrap();
        assert_eq!(ranked.len(), 5);
    }

    #[tokio::test]
    async fn grid_finds_exact_optimum() {
        let manager = manager();
        let config = OptimizationConfig::new("grid", space());
        let result = manager.execute_optimization_named("grid", config).await.unwrap();
        assert_eq!(result.total_evaluations, 11);
        assert_eq!(result.best_score, Some(1.0));
    }

    #[tokio::test]
    async fn unknown_algorithm_is_an_optimization_error() {
        let manager = manager();
        let config = OptimizationConfig::new("nope", space());
        let err = manager
            .execute_optimization_named("hill_climbing", config)
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizerError::Optimization(_)));
        assert!(manager.optimization_history().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_propagates() {
        let manager = manager();
        let space = ParameterSpace::new().add_integer("x", 5, 1, 1);
        let config = OptimizationConfig::new("bad", space);
        let err = manager
            .execute_optimization(Algorithm::Random, config)
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizerError::Configuration { .. }));
    }

    #[tokio::test]
    async fn finished_sweeps_are_archived() {
        let manager = manager();
        let sweep = manager.create_sweep(SweepConfig::new("s", space())).unwrap();
        assert_eq!(
            manager.get_sweep_status(sweep.id).unwrap().status,
            SweepStatus::Pending
        );

        let done = manager.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.status, SweepStatus::Completed);
        assert_eq!(manager.get_sweep_status(sweep.id).unwrap(), done);
        assert!(!manager.cancel_sweep(sweep.id));

        let unknown = Uuid::new_v4();
        assert!(!manager.cancel_sweep(unknown));
        assert!(matches!(
            manager.get_sweep_status(unknown),
            Err(OptimizerError::SweepNotFound { .. })
        ));

        let ranked = manager
            .rank_results(&done.history, &RankingCriteria::single("sharpe_ratio"))
            .unwrap();
        assert_eq!(ranked.best().unwrap().result.score, Some(1.0));
    }

    #[tokio::test]
    async fn sweeps_behind_optimization_runs_stay_queryable() {
        let manager = manager();
        let events = manager.subscribe();

        for algorithm in [Algorithm::Grid, Algorithm::Random] {
            let config = OptimizationConfig::new(algorithm.as_str(), space())
                .with_max_evaluations(6)
                .with_seed(9);
            let result = manager.execute_optimization(algorithm, config).await.unwrap();

            let sweep_id = events
                .try_iter()
                .find_map(|e| match e {
                    SweepEvent::Started { sweep_id, .. } => Some(sweep_id),
                    _ => None,
                })
                .unwrap();
            let sweep = manager.get_sweep_status(sweep_id).unwrap();
            assert_eq!(sweep.status, SweepStatus::Completed);
            assert_eq!(sweep.finished_count(), result.total_evaluations);
            assert_eq!(sweep.best_score(), result.best_score);
            // Drain the rest of this run's events.
            events.try_iter().for_each(drop);
        }
    }

    struct FixedStrategy;

    #[async_trait]
    impl SearchStrategy for FixedStrategy {
        fn algorithm(&self) -> Algorithm {
            Algorithm::Random
        }

        async fn optimize(
            &self,
            _engine: &SweepEngine,
            _config: &OptimizationConfig,
            _prior: &[EvaluationResult],
        ) -> PfResult<OptimizationResult> {
            Err(optimization_error!("fixed strategy never runs"))
        }
    }

    #[tokio::test]
    async fn register_replaces_strategy() {
        let mut manager = manager();
        assert!(manager.register(Box::new(FixedStrategy)).is_some());
        let err = manager
            .execute_optimization(Algorithm::Random, OptimizationConfig::new("r", space()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fixed strategy"));
    }

    #[tokio::test]
    async fn prior_evaluations_feed_later_runs() {
        let manager = manager();
        let config = OptimizationConfig::new("first", space())
            .with_max_evaluations(8)
            .with_seed(1);
        let first = manager
            .execute_optimization(Algorithm::Random, config.clone())
            .await
            .unwrap();

        let prior = manager.prior_evaluations(&config);
        assert_eq!(prior.len(), first.total_evaluations - first.failed_evaluations);

        let second = manager
            .execute_optimization_with_prior(Algorithm::Genetic, config, &prior)
            .await
            .unwrap();
        assert!(second.best_score >= first.best_score);
    }
}
