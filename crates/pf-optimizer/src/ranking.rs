//! Multi-criteria ranking of evaluation results.
//!
//! Each metric is normalized to `[0, 1]` across the batch being ranked, then
//! combined as a weighted mean. Normalization is relative, so the same result
//! can score differently in a different batch.

use pf_types::{EvaluationResult, ObjectiveDirection, OptimizerError, PfResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One weighted metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingCriterion {
    pub metric: String,
    pub weight: f64,
    pub direction: ObjectiveDirection,
}

/// Weighted metrics used to build a composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingCriteria {
    pub criteria: Vec<RankingCriterion>,
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self::new()
            .with("sharpe_ratio", 0.30, ObjectiveDirection::Maximize)
            .with("total_return", 0.25, ObjectiveDirection::Maximize)
            .with("max_drawdown", 0.20, ObjectiveDirection::Minimize)
            .with("win_rate", 0.15, ObjectiveDirection::Maximize)
            .with("profit_factor", 0.10, ObjectiveDirection::Maximize)
    }
}

impl RankingCriteria {
    /// Empty criteria; add metrics with [`with`](Self::with).
    pub fn new() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    pub fn with(mut self, metric: &str, weight: f64, direction: ObjectiveDirection) -> Self {
        self.criteria.push(RankingCriterion {
            metric: metric.to_string(),
            weight,
            direction,
        });
        self
    }

    /// Rank on a single metric in its natural direction.
    pub fn single(metric: &str) -> Self {
        Self::new().with(metric, 1.0, ObjectiveDirection::for_metric(metric))
    }

    pub fn validate(&self) -> PfResult<()> {
        let mut violations = Vec::new();
        if self.criteria.is_empty() {
            violations.push("ranking needs at least one criterion".to_string());
        }
        for c in &self.criteria {
            if c.metric.trim().is_empty() {
                violations.push("ranking metric name must not be empty".to_string());
            }
            if !(c.weight.is_finite() && c.weight >= 0.0) {
                violations.push(format!(
                    "{}: weight ({}) must be finite and non-negative",
                    c.metric, c.weight
                ));
            }
        }
        if violations.is_empty() && self.total_weight() <= 0.0 {
            violations.push("ranking weights must not all be zero".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(OptimizerError::Configuration { violations })
        }
    }

    fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    pub composite_score: f64,
    /// Normalized value per metric.
    pub breakdown: BTreeMap<String, f64>,
    pub result: EvaluationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResults {
    /// Sorted by composite score, best first.
    pub entries: Vec<RankedEntry>,
    pub criteria: RankingCriteria,
    /// Results left out for failing or carrying no metrics.
    pub excluded: usize,
}

impl RankedResults {
    pub fn best(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scores and orders evaluation results.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultRanker;

impl ResultRanker {
    pub fn rank(
        &self,
        results: &[EvaluationResult],
        criteria: &RankingCriteria,
    ) -> PfResult<RankedResults> {
        criteria.validate()?;

        let eligible: Vec<&EvaluationResult> = results
            .iter()
            .filter(|r| r.success && r.metrics.is_some())
            .collect();
        let excluded = results.len() - eligible.len();

        // Normalized column per criterion, aligned with `eligible`.
        let columns: Vec<Vec<f64>> = criteria
            .criteria
            .iter()
            .map(|c| {
                let raw: Vec<Option<f64>> = eligible.iter().map(|r| r.metric(&c.metric)).collect();
                normalize(&raw, c.direction)
            })
            .collect();

        let total_weight = criteria.total_weight();
        let mut entries: Vec<RankedEntry> = eligible
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let mut breakdown = BTreeMap::new();
                let mut weighted = 0.0;
                for (c, column) in criteria.criteria.iter().zip(&columns) {
                    weighted += c.weight * column[i];
                    breakdown.insert(c.metric.clone(), column[i]);
                }
                RankedEntry {
                    rank: 0,
                    composite_score: weighted / total_weight,
                    breakdown,
                    result: (*result).clone(),
                }
            })
            .collect();

        entries.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }

        Ok(RankedResults {
            entries,
            criteria: criteria.clone(),
            excluded,
        })
    }
}

/// Map raw values onto `[0, 1]`, 1 being best. Missing values score 0.
/// Higher-is-better uses min-max scaling and gives 1 to every value when
/// they are all equal. Lower-is-better scales by distance below the maximum
/// and gives 1 to every value when the maximum is zero.
fn normalize(raw: &[Option<f64>], direction: ObjectiveDirection) -> Vec<f64> {
    let present = raw.iter().flatten();
    let min = present.clone().copied().fold(f64::INFINITY, f64::min);
    let max = present.copied().fold(f64::NEG_INFINITY, f64::max);

    raw.iter()
        .map(|value| {
            let Some(v) = value else {
                return 0.0;
            };
            let n = match direction {
                ObjectiveDirection::Maximize if max == min => 1.0,
                ObjectiveDirection::Maximize => (v - min) / (max - min),
                ObjectiveDirection::Minimize if max == 0.0 => 1.0,
                ObjectiveDirection::Minimize => (max - v) / max,
            };
            if n.is_finite() {
                n.clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pf_types::{EvaluationError, ParameterSet, ParameterValue, PerformanceMetrics};
    use std::time::Duration;
    use uuid::Uuid;

    fn result(
        id: i64,
        sharpe: f64,
        ret: f64,
        dd: f64,
        win: f64,
        pf: Option<f64>,
    ) -> EvaluationResult {
        let mut params = ParameterSet::new();
        params.insert("id".into(), ParameterValue::Int(id));
        EvaluationResult {
            id: Uuid::new_v4(),
            sequence: id as usize,
            parameters: params,
            score: Some(sharpe),
            metrics: Some(PerformanceMetrics {
                sharpe_ratio: Some(sharpe),
                total_return: ret,
                max_drawdown: dd,
                win_rate: win,
                profit_factor: pf,
                ..Default::default()
            }),
            success: true,
            error: None,
            artifact: None,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_by_weighted_composite() {
        let results = vec![
            result(0, 0.5, 0.05, 0.20, 0.40, Some(1.1)),
            result(1, 2.0, 0.30, 0.05, 0.60, Some(2.0)),
            result(2, 1.0, 0.10, 0.10, 0.50, None),
        ];
        let ranked = ResultRanker.rank(&results, &RankingCriteria::default()).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.excluded, 0);
        let order: Vec<usize> = ranked.entries.iter().map(|e| e.result.sequence).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(ranked.entries.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);

        // Best on every axis; its 0.05 drawdown normalizes to 0.75 against
        // the 0.20 maximum.
        assert!((ranked.entries[0].composite_score - 0.95).abs() < 1e-9);
        for entry in &ranked.entries {
            assert!((0.0..=1.0).contains(&entry.composite_score));
            assert!(entry.breakdown.values().all(|v| (0.0..=1.0).contains(v)));
        }
        assert!(ranked
            .entries
            .windows(2)
            .all(|w| w[0].composite_score >= w[1].composite_score));
        // Missing profit factor scores zero.
        assert_eq!(ranked.entries[1].breakdown["profit_factor"], 0.0);
    }

    #[test]
    fn failures_and_metricless_results_are_excluded() {
        let mut no_metrics = result(1, 1.0, 0.1, 0.1, 0.5, None);
        no_metrics.metrics = None;
        let failed = EvaluationResult::failure(
            2,
            ParameterSet::new(),
            &EvaluationError::simulation("crash"),
            Duration::ZERO,
        );
        let results = vec![result(0, 1.0, 0.1, 0.1, 0.5, Some(1.5)), no_metrics, failed];

        let ranked = ResultRanker.rank(&results, &RankingCriteria::default()).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked.excluded, 2);
    }

    #[test]
    fn degenerate_columns() {
        let raw = [Some(1.0), Some(1.0), None];
        assert_eq!(normalize(&raw, ObjectiveDirection::Maximize), vec![1.0, 1.0, 0.0]);

        let zero_dd = [Some(0.0), Some(0.0)];
        assert_eq!(normalize(&zero_dd, ObjectiveDirection::Minimize), vec![1.0, 1.0]);

        // Lower-is-better scaled against the maximum.
        let dd = [Some(0.1), Some(0.2), Some(0.05)];
        let n = normalize(&dd, ObjectiveDirection::Minimize);
        assert_eq!(n[1], 0.0);
        assert!((n[0] - 0.5).abs() < 1e-12);
        assert!((n[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let results = vec![
            result(0, 1.0, 0.1, 0.1, 0.5, Some(1.5)),
            result(1, 1.0, 0.1, 0.1, 0.5, Some(1.5)),
        ];
        let ranked = ResultRanker
            .rank(&results, &RankingCriteria::single("sharpe_ratio"))
            .unwrap();
        assert_eq!(ranked.entries[0].result.sequence, 0);
        assert_eq!(ranked.entries[1].result.sequence, 1);
    }

    #[test]
    fn invalid_weights_rejected() {
        let criteria = RankingCriteria::new()
            .with("sharpe_ratio", -1.0, ObjectiveDirection::Maximize)
            .with("win_rate", f64::NAN, ObjectiveDirection::Maximize);
        assert_eq!(ResultRanker.rank(&[], &criteria).unwrap_err().violations().len(), 2);
        assert!(ResultRanker.rank(&[], &RankingCriteria::new()).is_err());
        assert!(ResultRanker
            .rank(&[], &RankingCriteria::new().with("x", 0.0, ObjectiveDirection::Maximize))
            .is_err());
    }

    #[test]
    fn empty_batch_ranks_to_nothing() {
        let ranked = ResultRanker.rank(&[], &RankingCriteria::default()).unwrap();
        assert!(ranked.is_empty());
        assert!(ranked.best().is_none());
    }
}
