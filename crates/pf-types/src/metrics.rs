//! Performance metrics record and objective direction.
//!
//! [`PerformanceMetrics`] is the fixed record the statistics library derives
//! from a simulation's trade history. The optimizer only ever reads it by
//! metric name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric names where a smaller value is better.
const LOWER_IS_BETTER: &[&str] = &["max_drawdown", "volatility", "max_drawdown_duration_days"];

/// Whether we are maximizing or minimizing an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Maximize
    }
}

impl ObjectiveDirection {
    /// Natural direction for a well-known metric name.
    pub fn for_metric(metric: &str) -> Self {
        if LOWER_IS_BETTER.contains(&metric) {
            Self::Minimize
        } else {
            Self::Maximize
        }
    }

    /// Strict improvement test. Equal scores are never an improvement, so the
    /// earlier-found candidate wins ties.
    pub fn is_improvement(&self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Maximize => candidate > current,
            Self::Minimize => candidate < current,
        }
    }

    /// Map a score onto a higher-is-better scale.
    pub fn fitness(&self, score: f64) -> f64 {
        match self {
            Self::Maximize => score,
            Self::Minimize => -score,
        }
    }

    /// The better of two scores, keeping `current` on ties.
    pub fn better(&self, current: f64, candidate: f64) -> f64 {
        if self.is_improvement(candidate, current) {
            candidate
        } else {
            current
        }
    }
}

/// Metrics produced for one simulated configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    /// Peak-to-trough loss as a positive fraction.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: Option<f64>,
    pub total_trades: u64,
    /// Anything else the statistics library reports.
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl PerformanceMetrics {
    /// Look up a metric by name. Unknown names fall through to `extra`.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "total_return" => Some(self.total_return),
            "annualized_return" => Some(self.annualized_return),
            "volatility" => Some(self.volatility),
            "sharpe_ratio" => self.sharpe_ratio,
            "sortino_ratio" => self.sortino_ratio,
            "calmar_ratio" => self.calmar_ratio,
            "max_drawdown" => Some(self.max_drawdown),
            "win_rate" => Some(self.win_rate),
            "profit_factor" => self.profit_factor,
            "total_trades" => Some(self.total_trades as f64),
            other => self.extra.get(other).copied(),
        }
    }

    /// Like [`get`](Self::get) but rejects NaN and infinities.
    pub fn get_finite(&self, name: &str) -> Option<f64> {
        self.get(name).filter(|v| v.is_finite())
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}
