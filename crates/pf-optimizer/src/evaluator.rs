//! The evaluator seam: the only way the optimizer reaches a simulation.

use async_trait::async_trait;
use pf_types::{EvaluationError, EvaluationOutput, ParameterSet};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Executes one fully-merged strategy configuration.
///
/// Implementations may call a remote simulation service and wait minutes for
/// an answer; callers never assume a latency bound. Failures must come back
/// as an [`EvaluationError`], never as a disguised low score.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError>;
}

#[async_trait]
impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
        (**self).evaluate(config).await
    }
}

/// A synchronous, blocking evaluation client.
pub trait BlockingEvaluate: Send + Sync + 'static {
    fn evaluate_blocking(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError>;
}

/// Adapts a [`BlockingEvaluate`] client by running every call on its own
/// blocking worker thread, so the async coordinator is never stalled.
pub struct BlockingEvaluator<E> {
    inner: Arc<E>,
}

impl<E: BlockingEvaluate> BlockingEvaluator<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<E: BlockingEvaluate> Evaluator for BlockingEvaluator<E> {
    async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
        let inner = Arc::clone(&self.inner);
        let config = config.clone();
        match tokio::task::spawn_blocking(move || inner.evaluate_blocking(&config)).await {
            Ok(outcome) => outcome,
            Err(e) => Err(EvaluationError::Panicked {
                message: e.to_string(),
            }),
        }
    }
}

/// In-process evaluator backed by a closure. Handy for deterministic test
/// objectives and for cheap analytic functions.
pub struct FnEvaluator<F> {
    func: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&Value) -> Result<EvaluationOutput, EvaluationError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&Value) -> Result<EvaluationOutput, EvaluationError> + Send + Sync,
{
    async fn evaluate(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
        (self.func)(config)
    }
}

/// Overlay `params` on top of `base`. Overrides win on conflicting keys, and
/// dotted names (`risk.stop_loss`) address nested objects, creating them as
/// needed. A non-object base is replaced by an empty object.
pub fn merge_parameters(base: &Value, params: &ParameterSet) -> Value {
    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    for (name, value) in params {
        let path: Vec<&str> = name.split('.').collect();
        insert_path(&mut merged, &path, value.to_json());
    }

    Value::Object(merged)
}

fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [leaf] => {
            map.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_types::{ParameterValue, PerformanceMetrics};
    use serde_json::json;

    #[test]
    fn overrides_win_over_base() {
        let base = json!({"strategy": "ma_crossover", "fast": 5, "slow": 30});
        let mut params = ParameterSet::new();
        params.insert("fast".into(), ParameterValue::Int(12));
        params.insert("position_size".into(), ParameterValue::Float(0.5));

        let merged = merge_parameters(&base, &params);
        assert_eq!(
            merged,
            json!({"strategy": "ma_crossover", "fast": 12, "slow": 30, "position_size": 0.5})
        );
    }

    #[test]
    fn dotted_names_reach_nested_objects() {
        let base = json!({"risk": {"stop_loss": 0.05, "take_profit": 0.1}, "mode": 3});
        let mut params = ParameterSet::new();
        params.insert("risk.stop_loss".into(), ParameterValue::Float(0.02));
        params.insert("mode.level".into(), ParameterValue::Int(1));
        params.insert("sizing.kelly.fraction".into(), ParameterValue::Float(0.25));

        let merged = merge_parameters(&base, &params);
        assert_eq!(merged["risk"]["stop_loss"], json!(0.02));
        assert_eq!(merged["risk"]["take_profit"], json!(0.1));
        assert_eq!(merged["mode"], json!({"level": 1}));
        assert_eq!(merged["sizing"]["kelly"]["fraction"], json!(0.25));
    }

    #[test]
    fn null_base_becomes_object() {
        let mut params = ParameterSet::new();
        params.insert("x".into(), ParameterValue::Int(1));
        assert_eq!(merge_parameters(&Value::Null, &params), json!({"x": 1}));
    }

    struct SlowSimulation;

    impl BlockingEvaluate for SlowSimulation {
        fn evaluate_blocking(&self, config: &Value) -> Result<EvaluationOutput, EvaluationError> {
            std::thread::sleep(std::time::Duration::from_millis(5));
            let x = config["x"].as_f64().ok_or_else(|| EvaluationError::Rejected {
                reason: "x missing".into(),
            })?;
            Ok(EvaluationOutput::new(PerformanceMetrics {
                sharpe_ratio: Some(x * 2.0),
                ..Default::default()
            }))
        }
    }

    #[tokio::test]
    async fn blocking_evaluator_runs_off_the_runtime() {
        let evaluator = BlockingEvaluator::new(SlowSimulation);

        let output = evaluator.evaluate(&json!({"x": 1.5})).await.unwrap();
        assert_eq!(output.metrics.sharpe_ratio, Some(3.0));

        let err = evaluator.evaluate(&json!({})).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Rejected { .. }));
    }
}
