//! Search strategies over a [`ParameterSpace`].
//!
//! Every strategy consumes an [`OptimizationConfig`] and drives evaluations
//! through a shared [`SweepEngine`]. Grid and random search hand a complete
//! plan to the engine as one sweep; the adaptive strategies submit batches and
//! decide what to try next from what came back.

pub mod bayesian;
pub mod genetic;
#[cfg(feature = "surrogate")]
mod gp;
pub mod grid;
pub mod random;
pub mod swarm;

pub use bayesian::BayesianSearch;
pub use genetic::GeneticSearch;
pub use grid::GridSearch;
pub use random::RandomSearch;
pub use swarm::ParticleSwarmSearch;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pf_types::{
    EvaluationResult, ObjectiveDirection, OptimizerError, ParameterSet, ParameterSpace, PfResult,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

use crate::early_stopping::EarlyStopping;
use crate::engine::{EvaluationRequest, SweepEngine};
use crate::sweep::{SweepConfig, SweepExecution};

/// Identifies a search algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Grid,
    Random,
    Bayesian,
    Genetic,
    ParticleSwarm,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Grid,
        Algorithm::Random,
        Algorithm::Bayesian,
        Algorithm::Genetic,
        Algorithm::ParticleSwarm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Random => "random",
            Self::Bayesian => "bayesian",
            Self::Genetic => "genetic",
            Self::ParticleSwarm => "particle_swarm",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" | "grid_search" => Ok(Self::Grid),
            "random" | "random_search" => Ok(Self::Random),
            "bayesian" | "bayes" => Ok(Self::Bayesian),
            "genetic" | "ga" => Ok(Self::Genetic),
            "particle_swarm" | "pso" => Ok(Self::ParticleSwarm),
            other => Err(OptimizerError::Optimization(format!(
                "unknown optimization algorithm '{other}'"
            ))),
        }
    }
}

/// Gaussian-process search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianSettings {
    /// Requested random bootstrap size before the surrogate takes over.
    pub initial_samples: usize,
    /// Random candidates scored by the acquisition function per iteration.
    pub candidate_pool: usize,
    /// Exploration weight in `mean + kappa * std`.
    pub kappa: f64,
    /// RBF length scale on the unit hypercube.
    pub length_scale: f64,
    /// Diagonal jitter added to the kernel matrix.
    pub noise: f64,
}

impl Default for BayesianSettings {
    fn default() -> Self {
        Self {
            initial_samples: 10,
            candidate_pool: 256,
            kappa: 1.0,
            length_scale: 0.25,
            noise: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticSettings {
    /// Overrides the budget-derived population size.
    pub population_size: Option<usize>,
    pub tournament_size: usize,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Mutation standard deviation as a fraction of the range width.
    pub mutation_scale: f64,
}

impl Default for GeneticSettings {
    fn default() -> Self {
        Self {
            population_size: None,
            tournament_size: 3,
            mutation_rate: 0.1,
            mutation_scale: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSettings {
    /// Overrides the budget-derived swarm size.
    pub swarm_size: Option<usize>,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            swarm_size: None,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
        }
    }
}

/// Configuration shared by every search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub name: String,
    pub base_config: serde_json::Value,
    pub space: ParameterSpace,
    pub target_metric: String,
    pub direction: ObjectiveDirection,
    /// Evaluation budget. Grid search ignores it and evaluates the full grid.
    pub max_evaluations: usize,
    pub max_concurrent_executions: usize,
    /// Seed for reproducible runs; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub early_stopping: bool,
    pub patience: usize,
    #[serde(default)]
    pub bayesian: BayesianSettings,
    #[serde(default)]
    pub genetic: GeneticSettings,
    #[serde(default)]
    pub swarm: SwarmSettings,
}

impl OptimizationConfig {
    pub fn new(name: impl Into<String>, space: ParameterSpace) -> Self {
        Self {
            name: name.into(),
            base_config: serde_json::Value::Object(Default::default()),
            space,
            target_metric: "sharpe_ratio".to_string(),
            direction: ObjectiveDirection::Maximize,
            max_evaluations: 100,
            max_concurrent_executions: 4,
            seed: None,
            early_stopping: false,
            patience: 10,
            bayesian: BayesianSettings::default(),
            genetic: GeneticSettings::default(),
            swarm: SwarmSettings::default(),
        }
    }

    pub fn with_base_config(mut self, config: serde_json::Value) -> Self {
        self.base_config = config;
        self
    }

    pub fn with_objective(mut self, metric: &str, direction: ObjectiveDirection) -> Self {
        self.target_metric = metric.to_string();
        self.direction = direction;
        self
    }

    pub fn with_max_evaluations(mut self, n: usize) -> Self {
        self.max_evaluations = n;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent_executions = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_early_stopping(mut self, patience: usize) -> Self {
        self.early_stopping = true;
        self.patience = patience;
        self
    }

    pub fn with_bayesian(mut self, settings: BayesianSettings) -> Self {
        self.bayesian = settings;
        self
    }

    pub fn with_genetic(mut self, settings: GeneticSettings) -> Self {
        self.genetic = settings;
        self
    }

    pub fn with_swarm(mut self, settings: SwarmSettings) -> Self {
        self.swarm = settings;
        self
    }

    /// Check ranges and every setting, reporting all violations at once. The
    /// grid size cap is left to grid search.
    pub fn validate(&self) -> PfResult<()> {
        let mut violations = match self.space.validate() {
            Ok(()) => Vec::new(),
            Err(e) => e.violations().to_vec(),
        };

        if self.target_metric.trim().is_empty() {
            violations.push("target metric must not be empty".to_string());
        }
        if self.max_evaluations == 0 {
            violations.push("max_evaluations must be at least 1".to_string());
        }
        if self.max_concurrent_executions == 0 {
            violations.push("max_concurrent_executions must be at least 1".to_string());
        }
        if self.early_stopping && self.patience == 0 {
            violations.push("early stopping needs a patience of at least 1".to_string());
        }

        let b = &self.bayesian;
        if b.candidate_pool == 0 {
            violations.push("bayesian.candidate_pool must be at least 1".to_string());
        }
        if !(b.kappa.is_finite() && b.kappa >= 0.0) {
            violations.push("bayesian.kappa must be finite and non-negative".to_string());
        }
        if !(b.length_scale.is_finite() && b.length_scale > 0.0) {
            violations.push("bayesian.length_scale must be positive".to_string());
        }
        if !(b.noise.is_finite() && b.noise >= 0.0) {
            violations.push("bayesian.noise must be finite and non-negative".to_string());
        }

        let g = &self.genetic;
        if g.population_size.is_some_and(|p| p < 2) {
            violations.push("genetic.population_size must be at least 2".to_string());
        }
        if g.tournament_size == 0 {
            violations.push("genetic.tournament_size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&g.mutation_rate) {
            violations.push("genetic.mutation_rate must be within [0, 1]".to_string());
        }
        if !(g.mutation_scale.is_finite() && g.mutation_scale >= 0.0) {
            violations.push("genetic.mutation_scale must be finite and non-negative".to_string());
        }

        let s = &self.swarm;
        if s.swarm_size == Some(0) {
            violations.push("swarm.swarm_size must be at least 1".to_string());
        }
        if ![s.inertia, s.cognitive, s.social].iter().all(|c| c.is_finite()) {
            violations.push("swarm coefficients must be finite".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(OptimizerError::Configuration { violations })
        }
    }

    /// Random source for one run.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn request(&self) -> EvaluationRequest {
        EvaluationRequest::new(
            &self.base_config,
            &self.target_metric,
            self.max_concurrent_executions,
        )
    }

    /// The equivalent engine sweep configuration.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            name: self.name.clone(),
            base_config: self.base_config.clone(),
            space: self.space.clone(),
            target_metric: self.target_metric.clone(),
            direction: self.direction,
            max_concurrent_executions: self.max_concurrent_executions,
            early_stopping: self.early_stopping,
            patience: self.patience,
        }
    }

    pub(crate) fn early_stopper(&self) -> Option<EarlyStopping> {
        self.early_stopping
            .then(|| EarlyStopping::new(self.patience, self.direction))
    }
}

/// One step of a search: a single evaluation for sweep-based and Bayesian
/// search, a whole generation or swarm iteration for population methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub iteration: usize,
    /// Evaluations performed so far, this step included.
    pub evaluations: usize,
    /// Best candidate produced by this step, if any succeeded.
    pub parameters: Option<ParameterSet>,
    pub score: Option<f64>,
    /// Running best up to and including this step.
    pub best_score: Option<f64>,
    /// Mean pairwise distance of the population in the unit hypercube.
    pub diversity: Option<f64>,
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub algorithm: Algorithm,
    /// Set when the requested algorithm could not run and another one was
    /// used in its place.
    pub fallback: Option<Algorithm>,
    pub best_parameters: Option<ParameterSet>,
    pub best_score: Option<f64>,
    pub best_result: Option<EvaluationResult>,
    pub trace: Vec<TraceEntry>,
    /// Running best per trace entry.
    pub convergence: Vec<Option<f64>>,
    /// Every evaluation in the order the strategy observed it.
    pub evaluations: Vec<EvaluationResult>,
    pub total_evaluations: usize,
    pub failed_evaluations: usize,
    pub stopped_early: bool,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationResult {
    /// Successful evaluations, for ranking.
    pub fn successful(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.evaluations.iter().filter(|r| r.success)
    }
}

/// A search strategy.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Run a full search. `prior` holds results from earlier runs over the
    /// same space; strategies that can learn from them do.
    async fn optimize(
        &self,
        engine: &SweepEngine,
        config: &OptimizationConfig,
        prior: &[EvaluationResult],
    ) -> PfResult<OptimizationResult>;
}

/// Running best plus trace bookkeeping for one search. Only strict
/// improvements replace the incumbent.
pub(crate) struct BestTracker {
    direction: ObjectiveDirection,
    best: Option<EvaluationResult>,
    trace: Vec<TraceEntry>,
    convergence: Vec<Option<f64>>,
    evaluations: Vec<EvaluationResult>,
    failed: usize,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl BestTracker {
    pub(crate) fn new(direction: ObjectiveDirection) -> Self {
        Self {
            direction,
            best: None,
            trace: Vec::new(),
            convergence: Vec::new(),
            evaluations: Vec::new(),
            failed: 0,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub(crate) fn best_score(&self) -> Option<f64> {
        self.best.as_ref().and_then(|r| r.score)
    }

    pub(crate) fn evaluated(&self) -> usize {
        self.evaluations.len()
    }

    /// Fold in one evaluation; returns `true` on a new best.
    pub(crate) fn observe(&mut self, result: &EvaluationResult) -> bool {
        self.evaluations.push(result.clone());
        let score = match (result.success, result.score) {
            (true, Some(score)) => score,
            _ => {
                self.failed += 1;
                return false;
            }
        };
        let improves = match self.best_score() {
            None => true,
            Some(current) => self.direction.is_improvement(score, current),
        };
        if improves {
            self.best = Some(result.clone());
        }
        improves
    }

    /// Record one evaluation as its own trace step.
    pub(crate) fn step(&mut self, iteration: usize, result: &EvaluationResult) {
        self.observe(result);
        let (parameters, score) = if result.success {
            (Some(result.parameters.clone()), result.score)
        } else {
            (None, None)
        };
        self.push_trace(iteration, parameters, score, None);
    }

    /// Record a batch (generation, swarm iteration) as one trace step.
    /// Returns the batch's best score.
    pub(crate) fn generation(
        &mut self,
        iteration: usize,
        batch: &[EvaluationResult],
        diversity: Option<f64>,
    ) -> Option<f64> {
        let mut batch_best: Option<&EvaluationResult> = None;
        for result in batch {
            self.observe(result);
            if let (true, Some(score)) = (result.success, result.score) {
                let replace = match batch_best.and_then(|b| b.score) {
                    None => true,
                    Some(current) => self.direction.is_improvement(score, current),
                };
                if replace {
                    batch_best = Some(result);
                }
            }
        }
        let parameters = batch_best.map(|r| r.parameters.clone());
        let score = batch_best.and_then(|r| r.score);
        self.push_trace(iteration, parameters, score, diversity);
        score
    }

    fn push_trace(
        &mut self,
        iteration: usize,
        parameters: Option<ParameterSet>,
        score: Option<f64>,
        diversity: Option<f64>,
    ) {
        let best_score = self.best_score();
        self.trace.push(TraceEntry {
            iteration,
            evaluations: self.evaluations.len(),
            parameters,
            score,
            best_score,
            diversity,
        });
        self.convergence.push(best_score);
    }

    /// Replay a finished sweep's history, one trace step per evaluation.
    pub(crate) fn from_sweep(direction: ObjectiveDirection, execution: &SweepExecution) -> Self {
        let mut tracker = Self::new(direction);
        if let Some(started) = execution.started_at {
            tracker.started_at = started;
        }
        for (i, result) in execution.history.iter().enumerate() {
            tracker.step(i, result);
        }
        tracker
    }

    pub(crate) fn finish(self, algorithm: Algorithm, stopped_early: bool) -> OptimizationResult {
        let best_parameters = self.best.as_ref().map(|r| r.parameters.clone());
        let best_score = self.best_score();
        OptimizationResult {
            run_id: Uuid::new_v4(),
            algorithm,
            fallback: None,
            best_parameters,
            best_score,
            best_result: self.best,
            trace: self.trace,
            convergence: self.convergence,
            total_evaluations: self.evaluations.len(),
            evaluations: self.evaluations,
            failed_evaluations: self.failed,
            stopped_early,
            duration_ms: self.clock.elapsed().as_millis() as u64,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// The best distinct successful parameter sets from earlier runs, snapped
/// into `space`, at most `limit` of them.
pub(crate) fn seeds_from_prior(
    space: &ParameterSpace,
    direction: ObjectiveDirection,
    prior: &[EvaluationResult],
    limit: usize,
) -> Vec<ParameterSet> {
    let mut scored: Vec<(f64, ParameterSet)> = prior
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| {
            let score = r.score?;
            let coords = space.to_vector(&r.parameters)?;
            Some((direction.fitness(score), space.from_vector(&coords)))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut seeds: Vec<ParameterSet> = Vec::new();
    for (_, params) in scored {
        if seeds.len() >= limit {
            break;
        }
        if !seeds.contains(&params) {
            seeds.push(params);
        }
    }
    seeds
}

/// Fitness on a higher-is-better scale; failures rank below everything.
pub(crate) fn fitness_of(direction: ObjectiveDirection, result: &EvaluationResult) -> f64 {
    match (result.success, result.score) {
        (true, Some(score)) => direction.fitness(score),
        _ => f64::NEG_INFINITY,
    }
}

/// Mean pairwise Euclidean distance between points.
pub(crate) fn mean_pairwise_distance(points: &[Vec<f64>]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
        }
    }
    total / (n * (n - 1) / 2) as f64
}
