//! # pf-optimizer
//!
//! Hyperparameter search for ParamForge trading-strategy simulations.
//!
//! Provides the evaluator seam, a bounded-concurrency sweep engine with early
//! stopping and cancellation, grid/random/Bayesian/genetic/particle-swarm
//! search strategies, an optimization manager that keeps run history, and
//! multi-criteria result ranking.

mod early_stopping;
mod engine;
mod evaluator;
mod manager;
mod ranking;
pub mod strategy;
mod sweep;

pub use early_stopping::EarlyStopping;
pub use engine::{EvaluationRequest, SweepEngine};
pub use evaluator::{merge_parameters, BlockingEvaluate, BlockingEvaluator, Evaluator, FnEvaluator};
pub use manager::OptimizationManager;
pub use ranking::{RankedEntry, RankedResults, RankingCriteria, RankingCriterion, ResultRanker};
pub use strategy::{
    Algorithm, BayesianSearch, BayesianSettings, GeneticSearch, GeneticSettings, GridSearch,
    OptimizationConfig, OptimizationResult, ParticleSwarmSearch, RandomSearch, SearchStrategy,
    SwarmSettings, TraceEntry,
};
pub use sweep::{SweepConfig, SweepEvent, SweepExecution, SweepId, SweepStatus};

pub use pf_types;
