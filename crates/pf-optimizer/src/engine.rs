//! Bounded-concurrency sweep executor.
//!
//! The [`SweepEngine`] owns every sweep it creates until the sweep reaches a
//! terminal state, then keeps a read-only snapshot of the final execution in
//! its archive. Evaluations run as spawned tasks, at most
//! `max_concurrent_executions` at a time; the coordinator awaits their
//! completion and folds each result into the sweep state under a single
//! mutex, so concurrently finishing workers can never lose a best-result
//! update.

use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use pf_types::{
    describe_parameters, EvaluationError, EvaluationResult, OptimizerError, ParameterSet, PfResult,
};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::early_stopping::EarlyStopping;
use crate::evaluator::{merge_parameters, Evaluator};
use crate::sweep::{SweepConfig, SweepEvent, SweepExecution, SweepId, SweepStatus};

/// What to evaluate against: shared by every candidate of one search.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub base_config: Arc<Value>,
    pub target_metric: Arc<str>,
    pub max_concurrency: usize,
}

impl EvaluationRequest {
    pub fn new(base_config: &Value, target_metric: &str, max_concurrency: usize) -> Self {
        Self {
            base_config: Arc::new(base_config.clone()),
            target_metric: Arc::from(target_metric),
            max_concurrency: max_concurrency.max(1),
        }
    }
}

enum SweepPlan {
    Grid,
    Explicit(Vec<ParameterSet>),
}

struct SweepSlot {
    execution: Mutex<SweepExecution>,
    plan: Mutex<Option<SweepPlan>>,
}

/// Maps parameter sets onto evaluator calls under bounded concurrency.
pub struct SweepEngine {
    evaluator: Arc<dyn Evaluator>,
    sweeps: DashMap<SweepId, Arc<SweepSlot>>,
    archive: DashMap<SweepId, SweepExecution>,
    subscribers: Mutex<Vec<Sender<SweepEvent>>>,
}

impl SweepEngine {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            sweeps: DashMap::new(),
            archive: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a progress observer. Events for every sweep are delivered on
    /// the returned channel until it is dropped.
    pub fn subscribe(&self) -> Receiver<SweepEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn emit(&self, event: SweepEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Validate `config` and register a pending grid sweep over its full
    /// Cartesian product.
    pub fn create_sweep(&self, config: SweepConfig) -> PfResult<SweepExecution> {
        config.validate()?;
        let total = config.total_combinations();
        Ok(self.register(config, total, SweepPlan::Grid))
    }

    /// Register a pending sweep over an explicit list of parameter sets.
    pub fn create_sweep_with_sets(
        &self,
        config: SweepConfig,
        sets: Vec<ParameterSet>,
    ) -> PfResult<SweepExecution> {
        config.validate_ranges()?;
        if sets.is_empty() {
            return Err(OptimizerError::configuration("sweep has no parameter sets"));
        }
        if let Some(i) = sets.iter().position(|s| s.is_empty()) {
            return Err(OptimizerError::configuration(format!(
                "parameter set #{i} is empty"
            )));
        }
        let total = sets.len();
        Ok(self.register(config, total, SweepPlan::Explicit(sets)))
    }

    fn register(&self, config: SweepConfig, total: usize, plan: SweepPlan) -> SweepExecution {
        let execution = SweepExecution::new(config, total);
        info!(
            sweep_id = %execution.id,
            name = %execution.config.name,
            total,
            "sweep created"
        );
        let snapshot = execution.clone();
        self.sweeps.insert(
            execution.id,
            Arc::new(SweepSlot {
                execution: Mutex::new(execution),
                plan: Mutex::new(Some(plan)),
            }),
        );
        snapshot
    }

    fn slot(&self, sweep_id: SweepId) -> PfResult<Arc<SweepSlot>> {
        self.sweeps
            .get(&sweep_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| OptimizerError::SweepNotFound {
                sweep_id: sweep_id.to_string(),
            })
    }

    /// Live state of an active sweep, or the archived final state of a
    /// finished one.
    pub fn get_sweep_status(&self, sweep_id: SweepId) -> PfResult<SweepExecution> {
        if let Some(slot) = self.sweeps.get(&sweep_id).map(|e| Arc::clone(e.value())) {
            return Ok(slot.execution.lock().clone());
        }
        self.archive
            .get(&sweep_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OptimizerError::SweepNotFound {
                sweep_id: sweep_id.to_string(),
            })
    }

    /// Ids of sweeps that are pending or running.
    pub fn active_sweeps(&self) -> Vec<SweepId> {
        self.sweeps.iter().map(|entry| *entry.key()).collect()
    }

    /// Cancel a running sweep. Pending, finished or unknown sweeps are left
    /// alone and `false` is returned. In-flight evaluations are not
    /// interrupted.
    pub fn cancel_sweep(&self, sweep_id: SweepId) -> bool {
        let Ok(slot) = self.slot(sweep_id) else {
            return false;
        };
        let cancelled = slot.execution.lock().mark_cancelled();
        if cancelled {
            info!(sweep_id = %sweep_id, "sweep cancelled");
        }
        cancelled
    }

    /// Run a pending sweep to a terminal state and hand back the final
    /// execution, which is also archived. Dropping the returned future before
    /// it resolves cancels the sweep.
    pub async fn execute_sweep(&self, sweep_id: SweepId) -> PfResult<SweepExecution> {
        let slot = self.slot(sweep_id)?;

        let config = {
            let mut execution = slot.execution.lock();
            if !execution.mark_running() {
                return Err(OptimizerError::InvalidState(format!(
                    "sweep {sweep_id} is {:?}, expected Pending",
                    execution.status
                )));
            }
            execution.config.clone()
        };
        let guard = RunGuard {
            engine: self,
            sweep_id,
            slot: Arc::clone(&slot),
            released: false,
        };

        let sets = match slot.plan.lock().take() {
            Some(SweepPlan::Grid) => config.space.generate_parameter_sets(),
            Some(SweepPlan::Explicit(sets)) => sets,
            None => Vec::new(),
        };

        if sets.is_empty() {
            let execution = {
                let mut execution = slot.execution.lock();
                execution.mark_failed("no parameter sets to evaluate".to_string());
                execution.clone()
            };
            error!(sweep_id = %sweep_id, "sweep failed: no parameter sets to evaluate");
            guard.release(&execution);
            return Ok(execution);
        }

        let total = sets.len();
        info!(
            sweep_id = %sweep_id,
            total,
            concurrency = config.max_concurrent_executions,
            target = %config.target_metric,
            "sweep started"
        );
        self.emit(SweepEvent::Started { sweep_id, total });

        let request = EvaluationRequest::new(
            &config.base_config,
            &config.target_metric,
            config.max_concurrent_executions,
        );
        let mut stopper = config
            .early_stopping
            .then(|| EarlyStopping::new(config.patience, config.direction));

        let mut pending = sets.into_iter().enumerate();
        let mut in_flight = JoinSet::new();
        let mut halted = false;

        loop {
            while !halted && in_flight.len() < request.max_concurrency {
                if slot.execution.lock().status != SweepStatus::Running {
                    halted = true;
                    break;
                }
                match pending.next() {
                    Some((sequence, params)) => {
                        in_flight.spawn(run_evaluation(
                            Arc::clone(&self.evaluator),
                            request.clone(),
                            sequence,
                            params,
                        ));
                    }
                    None => break,
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(sweep_id = %sweep_id, error = %e, "evaluation task lost");
                    slot.execution.lock().record_lost();
                    continue;
                }
            };

            let sequence = result.sequence;
            let success = result.success;
            let score = result.score;
            let best_params = result.parameters.clone();

            let (new_best, completed, failed, running) = {
                let mut execution = slot.execution.lock();
                let new_best = execution.record(result);
                (
                    new_best,
                    execution.completed,
                    execution.failed,
                    execution.status == SweepStatus::Running,
                )
            };

            self.emit(SweepEvent::EvaluationCompleted {
                sweep_id,
                sequence,
                success,
                score,
                completed,
                failed,
                total,
            });

            if let (true, Some(score)) = (new_best, score) {
                debug!(
                    sweep_id = %sweep_id,
                    score,
                    params = %describe_parameters(&best_params),
                    "new best"
                );
                self.emit(SweepEvent::NewBest {
                    sweep_id,
                    score,
                    parameters: best_params,
                });
            }

            let watching = running && !halted;
            if let (Some(stopper), Some(score), true) = (stopper.as_mut(), score, watching) {
                if stopper.observe(score) {
                    halted = true;
                    slot.execution.lock().stopped_early = true;
                    info!(
                        sweep_id = %sweep_id,
                        evaluated = completed + failed,
                        patience = stopper.patience(),
                        "early stopping: no improvement in trailing window"
                    );
                    self.emit(SweepEvent::EarlyStopped {
                        sweep_id,
                        evaluated: completed + failed,
                    });
                }
            }
        }

        let execution = {
            let mut execution = slot.execution.lock();
            execution.mark_completed();
            execution.clone()
        };

        info!(
            sweep_id = %sweep_id,
            status = ?execution.status,
            completed = execution.completed,
            failed = execution.failed,
            best_score = ?execution.best_score(),
            "sweep finished"
        );
        guard.release(&execution);
        Ok(execution)
    }

    fn finish(&self, sweep_id: SweepId, execution: &SweepExecution) {
        self.archive.insert(sweep_id, execution.clone());
        self.sweeps.remove(&sweep_id);
        self.emit(SweepEvent::Finished {
            sweep_id,
            status: execution.status,
            best_score: execution.best_score(),
        });
    }

    /// Evaluate a single parameter set.
    pub async fn evaluate_one(
        &self,
        request: &EvaluationRequest,
        sequence: usize,
        params: ParameterSet,
    ) -> EvaluationResult {
        run_evaluation(Arc::clone(&self.evaluator), request.clone(), sequence, params).await
    }

    /// Evaluate a batch under the request's concurrency bound. Results come
    /// back in submission order; sequences start at `first_sequence`.
    pub async fn evaluate_batch(
        &self,
        request: &EvaluationRequest,
        first_sequence: usize,
        sets: Vec<ParameterSet>,
    ) -> Vec<EvaluationResult> {
        stream::iter(sets.into_iter().enumerate().map(|(i, params)| {
            run_evaluation(
                Arc::clone(&self.evaluator),
                request.clone(),
                first_sequence + i,
                params,
            )
        }))
        .buffered(request.max_concurrency)
        .collect()
        .await
    }
}

/// Releases a running sweep into the archive. If the driving future is
/// dropped first, the sweep is cancelled on the way out.
struct RunGuard<'a> {
    engine: &'a SweepEngine,
    sweep_id: SweepId,
    slot: Arc<SweepSlot>,
    released: bool,
}

impl RunGuard<'_> {
    fn release(mut self, execution: &SweepExecution) {
        self.released = true;
        self.engine.finish(self.sweep_id, execution);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let execution = {
            let mut execution = self.slot.execution.lock();
            execution.mark_cancelled();
            execution.clone()
        };
        warn!(
            sweep_id = %self.sweep_id,
            completed = execution.completed,
            failed = execution.failed,
            "sweep abandoned before finishing"
        );
        self.engine.finish(self.sweep_id, &execution);
    }
}

/// Merge, evaluate and time one candidate. Evaluator panics are caught and
/// reported as failures.
async fn run_evaluation(
    evaluator: Arc<dyn Evaluator>,
    request: EvaluationRequest,
    sequence: usize,
    params: ParameterSet,
) -> EvaluationResult {
    let config = merge_parameters(&request.base_config, &params);
    let started = Instant::now();

    let outcome = match AssertUnwindSafe(evaluator.evaluate(&config))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => Err(EvaluationError::Panicked {
            message: panic_message(panic.as_ref()),
        }),
    };

    let result = EvaluationResult::from_outcome(
        sequence,
        params,
        outcome,
        &request.target_metric,
        started.elapsed(),
    );

    match (&result.score, &result.error) {
        (Some(score), _) => debug!(
            sequence,
            score,
            elapsed_ms = result.duration_ms,
            "evaluation finished"
        ),
        (None, Some(error)) => warn!(sequence, error = %error, "evaluation failed"),
        (None, None) => warn!(sequence, "evaluation failed"),
    }
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FnEvaluator;
    use async_trait::async_trait;
    use pf_types::{
        EvaluationOutput, ObjectiveDirection, ParameterSpace, ParameterValue, PerformanceMetrics,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn sharpe(value: f64) -> EvaluationOutput {
        EvaluationOutput::new(PerformanceMetrics {
            sharpe_ratio: Some(value),
            ..Default::default()
        })
    }

    /// Sharpe = fast / 10 + size, failing whenever `fast == 10`.
    fn analytic_engine() -> SweepEngine {
        SweepEngine::new(Arc::new(FnEvaluator::new(|config: &Value| {
            let fast = config["fast"].as_f64().unwrap_or(0.0);
            let size = config["size"].as_f64().unwrap_or(0.0);
            if fast == 10.0 {
                return Err(EvaluationError::simulation("data gap"));
            }
            Ok(sharpe(fast / 10.0 + size))
        })))
    }

    fn grid_config() -> SweepConfig {
        let space = ParameterSpace::new()
            .add_integer("fast", 5, 15, 5)
            .add_real("size", 0.5, 1.0, 0.5);
        SweepConfig::new("grid", space)
            .with_base_config(json!({"strategy": "ma_crossover"}))
            .with_concurrency(3)
    }

    #[tokio::test]
    async fn create_sweep_rejects_invalid_ranges() {
        let engine = analytic_engine();
        let space = ParameterSpace::new()
            .add_real("a", 2.0, 1.0, 0.1)
            .add_real("b", 0.0, 1.0, -1.0);
        let err = engine.create_sweep(SweepConfig::new("bad", space)).unwrap_err();
        assert_eq!(err.violations().len(), 2);
        assert!(engine.active_sweeps().is_empty());
    }

    #[tokio::test]
    async fn grid_sweep_evaluates_every_combination() {
        let engine = analytic_engine();
        let events = engine.subscribe();

        let sweep = engine.create_sweep(grid_config()).unwrap();
        assert_eq!(sweep.status, SweepStatus::Pending);
        assert_eq!(sweep.total_combinations, 6);

        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.status, SweepStatus::Completed);
        assert_eq!(done.completed, 4);
        assert_eq!(done.failed, 2);
        assert_eq!(done.history.len(), 6);
        assert_eq!(done.best_score(), Some(2.5));
        assert_eq!(
            done.best_parameters.as_ref().unwrap()["fast"],
            ParameterValue::Int(15)
        );

        for result in done.history.iter().filter(|r| r.success) {
            assert!(result.score.unwrap() <= done.best_score().unwrap());
        }

        // Released by the engine once terminal, but still readable.
        assert!(engine.active_sweeps().is_empty());
        assert_eq!(engine.get_sweep_status(sweep.id).unwrap(), done);

        let received: Vec<SweepEvent> = events.try_iter().collect();
        assert!(matches!(received.first(), Some(SweepEvent::Started { total: 6, .. })));
        assert!(matches!(
            received.last(),
            Some(SweepEvent::Finished {
                status: SweepStatus::Completed,
                ..
            })
        ));
        let completions = received
            .iter()
            .filter(|e| matches!(e, SweepEvent::EvaluationCompleted { .. }))
            .count();
        assert_eq!(completions, 6);
    }

    #[tokio::test]
    async fn execute_twice_is_rejected() {
        let engine = analytic_engine();
        let sweep = engine.create_sweep(grid_config()).unwrap();
        let slot = engine.slot(sweep.id).unwrap();
        slot.execution.lock().mark_running();
        let err = engine.execute_sweep(sweep.id).await.unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidState(_)));
    }

    struct CountingEvaluator {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Evaluator for CountingEvaluator {
        async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(sharpe(config["x"].as_f64().unwrap_or(0.0)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let evaluator = Arc::new(CountingEvaluator {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let engine = SweepEngine::new(evaluator.clone());
        let config = SweepConfig::new("bounded", ParameterSpace::new().add_integer("x", 1, 12, 1))
            .with_concurrency(3);

        let sweep = engine.create_sweep(config).unwrap();
        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.completed, 12);
        assert!(evaluator.peak.load(Ordering::SeqCst) <= 3);
        assert!(evaluator.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn early_stopping_halts_plateaued_sweep() {
        // Score peaks at x = 1 then decays, so the window never improves.
        let engine = SweepEngine::new(Arc::new(FnEvaluator::new(|config: &Value| {
            let x = config["x"].as_f64().unwrap_or(0.0);
            Ok(sharpe(1.0 / x))
        })));
        let config = SweepConfig::new("plateau", ParameterSpace::new().add_integer("x", 1, 100, 1))
            .with_concurrency(1)
            .with_early_stopping(5);

        let sweep = engine.create_sweep(config).unwrap();
        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert!(done.stopped_early);
        assert_eq!(done.status, SweepStatus::Completed);
        assert_eq!(done.finished_count(), 6);
        assert_eq!(done.best_score(), Some(1.0));
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let engine = SweepEngine::new(Arc::new(FnEvaluator::new(|_: &Value| {
            Err(EvaluationError::simulation("remote engine unavailable"))
        })));
        let config = SweepConfig::new("all_fail", ParameterSpace::new().add_integer("x", 1, 4, 1));
        let sweep = engine.create_sweep(config).unwrap();
        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.status, SweepStatus::Completed);
        assert_eq!(done.failed, 4);
        assert!(done.best_result.is_none());
    }

    #[tokio::test]
    async fn evaluator_panic_becomes_failure() {
        let engine = SweepEngine::new(Arc::new(FnEvaluator::new(|config: &Value| {
            if config["x"] == json!(2) {
                panic!("simulation client bug");
            }
            Ok(sharpe(1.0))
        })));
        let config = SweepConfig::new("panicky", ParameterSpace::new().add_integer("x", 1, 3, 1));
        let sweep = engine.create_sweep(config).unwrap();
        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.completed, 2);
        assert_eq!(done.failed, 1);
        let failure = done.history.iter().find(|r| !r.success).unwrap();
        assert!(failure.error.as_ref().unwrap().contains("simulation client bug"));
    }

    /// Blocks every evaluation until released.
    struct GatedEvaluator {
        gate: Notify,
        started: AtomicUsize,
    }

    #[async_trait]
    impl Evaluator for GatedEvaluator {
        async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(sharpe(config["x"].as_f64().unwrap_or(0.0)))
        }
    }

    #[tokio::test]
    async fn cancel_pending_is_noop_and_running_freezes_best() {
        let evaluator = Arc::new(GatedEvaluator {
            gate: Notify::new(),
            started: AtomicUsize::new(0),
        });
        let engine = Arc::new(SweepEngine::new(evaluator.clone()));
        let config = SweepConfig::new("cancel", ParameterSpace::new().add_integer("x", 1, 10, 1))
            .with_concurrency(2);
        let sweep = engine.create_sweep(config).unwrap();

        assert!(!engine.cancel_sweep(sweep.id));
        assert_eq!(
            engine.get_sweep_status(sweep.id).unwrap().status,
            SweepStatus::Pending
        );

        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.execute_sweep(sweep.id).await })
        };

        while evaluator.started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(engine.cancel_sweep(sweep.id));
        assert!(!engine.cancel_sweep(sweep.id));
        evaluator.gate.notify_waiters();

        let done = runner.await.unwrap().unwrap();
        assert_eq!(done.status, SweepStatus::Cancelled);
        // In-flight work finished and was counted, but nothing new started.
        assert_eq!(done.completed, 2);
        assert!(done.best_result.is_none());
        assert_eq!(evaluator.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_run_is_cancelled_and_archived() {
        let evaluator = Arc::new(GatedEvaluator {
            gate: Notify::new(),
            started: AtomicUsize::new(0),
        });
        let engine = Arc::new(SweepEngine::new(evaluator.clone()));
        let config = SweepConfig::new("abandoned", ParameterSpace::new().add_integer("x", 1, 10, 1))
            .with_concurrency(2);
        let sweep = engine.create_sweep(config).unwrap();
        let events = engine.subscribe();

        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.execute_sweep(sweep.id).await })
        };
        while evaluator.started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        runner.abort();
        assert!(runner.await.unwrap_err().is_cancelled());

        assert!(engine.active_sweeps().is_empty());
        let state = engine.get_sweep_status(sweep.id).unwrap();
        assert_eq!(state.status, SweepStatus::Cancelled);
        assert!(state.finished_at.is_some());
        assert!(events.try_iter().any(|e| matches!(
            e,
            SweepEvent::Finished {
                status: SweepStatus::Cancelled,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn batch_results_keep_submission_order() {
        let engine = analytic_engine();
        let request = EvaluationRequest::new(&json!({}), "sharpe_ratio", 4);
        let sets: Vec<ParameterSet> = [5, 10, 15]
            .iter()
            .map(|fast| {
                let mut p = ParameterSet::new();
                p.insert("fast".into(), ParameterValue::Int(*fast));
                p
            })
            .collect();

        let results = engine.evaluate_batch(&request, 7, sets).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].sequence, 7);
        assert_eq!(results[0].score, Some(0.5));
        assert!(!results[1].success);
        assert_eq!(results[2].score, Some(1.5));
    }

    #[tokio::test]
    async fn explicit_sets_are_validated() {
        let engine = analytic_engine();
        let space = ParameterSpace::new().add_integer("fast", 5, 15, 5);
        let config = SweepConfig::new("explicit", space)
            .with_objective("sharpe_ratio", ObjectiveDirection::Maximize);
        assert!(engine.create_sweep_with_sets(config.clone(), Vec::new()).is_err());
        assert!(engine
            .create_sweep_with_sets(config.clone(), vec![ParameterSet::new()])
            .is_err());

        let mut p = ParameterSet::new();
        p.insert("fast".into(), ParameterValue::Int(15));
        let sweep = engine.create_sweep_with_sets(config, vec![p.clone(), p]).unwrap();
        assert_eq!(sweep.total_combinations, 2);
        let done = engine.execute_sweep(sweep.id).await.unwrap();
        assert_eq!(done.completed, 2);
        assert_eq!(done.best_score(), Some(1.5));
    }
}
