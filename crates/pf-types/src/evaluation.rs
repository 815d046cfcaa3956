//! Outcome of evaluating a single parameter set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::EvaluationError;
use crate::metrics::PerformanceMetrics;
use crate::parameter::ParameterSet;

/// What an evaluator hands back for a successful simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub metrics: PerformanceMetrics,
    /// Reference to the stored simulation artifact (backtest id, file path,
    /// URL), if the evaluator keeps one.
    pub artifact: Option<String>,
}

impl EvaluationOutput {
    pub fn new(metrics: PerformanceMetrics) -> Self {
        Self {
            metrics,
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }
}

/// A completed (successful or failed) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: Uuid,
    /// Submission index within the sweep or search that produced it.
    pub sequence: usize,
    pub parameters: ParameterSet,
    /// Value of the target metric; `None` on failure.
    pub score: Option<f64>,
    pub metrics: Option<PerformanceMetrics>,
    pub success: bool,
    pub error: Option<String>,
    pub artifact: Option<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Build a result from an evaluator outcome. A success whose target
    /// metric is missing or not finite is recorded as a failure.
    pub fn from_outcome(
        sequence: usize,
        parameters: ParameterSet,
        outcome: Result<EvaluationOutput, EvaluationError>,
        target_metric: &str,
        elapsed: Duration,
    ) -> Self {
        match outcome {
            Ok(output) => match output.metrics.get_finite(target_metric) {
                Some(score) => Self {
                    id: Uuid::new_v4(),
                    sequence,
                    parameters,
                    score: Some(score),
                    metrics: Some(output.metrics),
                    success: true,
                    error: None,
                    artifact: output.artifact,
                    duration_ms: elapsed.as_millis() as u64,
                    completed_at: Utc::now(),
                },
                None => {
                    let error = EvaluationError::MissingMetric {
                        metric: target_metric.to_string(),
                    };
                    let mut result = Self::failure(sequence, parameters, &error, elapsed);
                    result.metrics = Some(output.metrics);
                    result.artifact = output.artifact;
                    result
                }
            },
            Err(error) => Self::failure(sequence, parameters, &error, elapsed),
        }
    }

    pub fn failure(
        sequence: usize,
        parameters: ParameterSet,
        error: &EvaluationError,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            parameters,
            score: None,
            metrics: None,
            success: false,
            error: Some(error.to_string()),
            artifact: None,
            duration_ms: elapsed.as_millis() as u64,
            completed_at: Utc::now(),
        }
    }

    /// Any metric by name, when metrics are present.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.as_ref().and_then(|m| m.get_finite(name))
    }
}
