//! Sweep configuration, run state and progress events.

use chrono::{DateTime, Utc};
use pf_types::{
    EvaluationResult, ObjectiveDirection, OptimizerError, ParameterSet, ParameterSpace, PfResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Configuration for a batch sweep over a parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,

    /// Base strategy configuration that every parameter set is merged over.
    /// Stored as opaque JSON so the optimizer never depends on the
    /// simulation's own config model.
    pub base_config: serde_json::Value,

    /// The parameter ranges to sweep.
    pub space: ParameterSpace,

    /// Metric name to optimize (e.g. "sharpe_ratio").
    pub target_metric: String,

    pub direction: ObjectiveDirection,

    /// How many evaluations may run at once.
    pub max_concurrent_executions: usize,

    pub early_stopping: bool,

    /// Trailing window size for early stopping.
    pub patience: usize,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, space: ParameterSpace) -> Self {
        Self {
            name: name.into(),
            base_config: serde_json::Value::Object(Default::default()),
            space,
            target_metric: "sharpe_ratio".to_string(),
            direction: ObjectiveDirection::Maximize,
            max_concurrent_executions: 4,
            early_stopping: false,
            patience: 10,
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

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent_executions = n;
        self
    }

    pub fn with_early_stopping(mut self, patience: usize) -> Self {
        self.early_stopping = true;
        self.patience = patience;
        self
    }

    /// Product of every range's value count.
    pub fn total_combinations(&self) -> usize {
        self.space.total_combinations()
    }

    fn settings_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.target_metric.trim().is_empty() {
            violations.push("target metric must not be empty".to_string());
        }
        if self.max_concurrent_executions == 0 {
            violations.push("max_concurrent_executions must be at least 1".to_string());
        }
        if self.early_stopping && self.patience == 0 {
            violations.push("early stopping needs a patience of at least 1".to_string());
        }
        violations
    }

    /// Validate ranges, grid size and execution settings.
    pub fn validate(&self) -> PfResult<()> {
        let mut violations = match self.space.validate_grid() {
            Ok(()) => Vec::new(),
            Err(e) => e.violations().to_vec(),
        };
        violations.extend(self.settings_violations());
        into_result(violations)
    }

    /// Validate ranges and execution settings, without the grid size cap.
    /// Used when the parameter sets are supplied explicitly.
    pub fn validate_ranges(&self) -> PfResult<()> {
        let mut violations = match self.space.validate() {
            Ok(()) => Vec::new(),
            Err(e) => e.violations().to_vec(),
        };
        violations.extend(self.settings_violations());
        into_result(violations)
    }
}

fn into_result(violations: Vec<String>) -> PfResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(OptimizerError::Configuration { violations })
    }
}

/// Lifecycle state for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SweepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Mutable run state of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepExecution {
    pub id: SweepId,
    pub config: SweepConfig,
    pub status: SweepStatus,
    pub total_combinations: usize,
    /// Successful evaluations.
    pub completed: usize,
    pub failed: usize,
    pub best_result: Option<EvaluationResult>,
    pub best_parameters: Option<ParameterSet>,
    /// Every evaluation in completion order.
    pub history: Vec<EvaluationResult>,
    pub stopped_early: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SweepExecution {
    pub fn new(config: SweepConfig, total_combinations: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: SweepStatus::Pending,
            total_combinations,
            completed: 0,
            failed: 0,
            best_result: None,
            best_parameters: None,
            history: Vec::new(),
            stopped_early: false,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_result.as_ref().and_then(|r| r.score)
    }

    /// Evaluations that have landed, successful or not.
    pub fn finished_count(&self) -> usize {
        self.completed + self.failed
    }

    /// Fraction of planned evaluations that have landed.
    pub fn progress(&self) -> f64 {
        if self.total_combinations == 0 {
            return 1.0;
        }
        self.finished_count() as f64 / self.total_combinations as f64
    }

    pub fn mark_running(&mut self) -> bool {
        if self.status != SweepStatus::Pending {
            return false;
        }
        self.status = SweepStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    pub fn mark_completed(&mut self) -> bool {
        if self.status != SweepStatus::Running {
            return false;
        }
        self.status = SweepStatus::Completed;
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn mark_failed(&mut self, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SweepStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
        true
    }

    /// Only a running sweep can be cancelled.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status != SweepStatus::Running {
            return false;
        }
        self.status = SweepStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Fold one finished evaluation into the counters and history. Returns
    /// `true` if it became the new best. Results landing after cancellation
    /// are counted but never touch the best pointer.
    pub fn record(&mut self, result: EvaluationResult) -> bool {
        let mut new_best = false;
        match result.score {
            Some(score) if result.success => {
                self.completed += 1;
                if self.status != SweepStatus::Cancelled {
                    let improves = match self.best_score() {
                        None => true,
                        Some(current) => self.config.direction.is_improvement(score, current),
                    };
                    if improves {
                        self.best_parameters = Some(result.parameters.clone());
                        self.best_result = Some(result.clone());
                        new_best = true;
                    }
                }
            }
            _ => self.failed += 1,
        }
        self.history.push(result);
        new_best
    }

    /// Count an evaluation whose outcome was lost entirely.
    pub fn record_lost(&mut self) {
        self.failed += 1;
    }
}

/// Progress notifications published by the sweep engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SweepEvent {
    Started {
        sweep_id: SweepId,
        total: usize,
    },
    EvaluationCompleted {
        sweep_id: SweepId,
        sequence: usize,
        success: bool,
        score: Option<f64>,
        completed: usize,
        failed: usize,
        total: usize,
    },
    NewBest {
        sweep_id: SweepId,
        score: f64,
        parameters: ParameterSet,
    },
    EarlyStopped {
        sweep_id: SweepId,
        evaluated: usize,
    },
    Finished {
        sweep_id: SweepId,
        status: SweepStatus,
        best_score: Option<f64>,
    },
}
