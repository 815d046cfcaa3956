use thiserror::Error;

/// Main error type for ParamForge orchestration.
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Configuration error: {}", violations.join("; "))]
    Configuration { violations: Vec<String> },

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Surrogate model unavailable: {0}")]
    SurrogateUnavailable(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Sweep not found: {sweep_id}")]
    SweepNotFound { sweep_id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OptimizerError {
    /// Build a configuration error from a single violation message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            violations: vec![message.into()],
        }
    }

    /// Every violation carried by a configuration error, empty otherwise.
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Configuration { violations } => violations,
            _ => &[],
        }
    }
}

/// Failure of a single candidate evaluation.
///
/// These never abort a sweep or a search; the engine records them and moves
/// on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Simulation failed: {message}")]
    Simulation { message: String },

    #[error("Configuration rejected by evaluator: {reason}")]
    Rejected { reason: String },

    #[error("Target metric missing or not finite: {metric}")]
    MissingMetric { metric: String },

    #[error("Evaluator panicked: {message}")]
    Panicked { message: String },

    #[error("Evaluation cancelled")]
    Cancelled,
}

impl EvaluationError {
    pub fn simulation(message: impl Into<String>) -> Self {
        Self::Simulation {
            message: message.into(),
        }
    }
}

/// Result type alias for ParamForge operations
pub type PfResult<T> = Result<T, OptimizerError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::OptimizerError::configuration(format!($($arg)*))
    };
}

/// Macro for creating orchestration errors
#[macro_export]
macro_rules! optimization_error {
    ($($arg:tt)*) => {
        $crate::OptimizerError::Optimization(format!($($arg)*))
    };
}
