//! Parameter ranges, parameter sets and the combined search space.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::{OptimizerError, PfResult};

/// Upper bound on the number of values a single range may generate.
pub const MAX_VALUES_PER_PARAMETER: usize = 1_000;

/// Upper bound on the number of grid points a sweep may enumerate.
pub const MAX_TOTAL_COMBINATIONS: usize = 10_000;

/// Relative slack used when counting steps, so that `0.0..=1.0` by `0.1`
/// still lands on `1.0`.
const STEP_TOLERANCE: f64 = 1e-9;

/// Numeric type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Real,
}

/// A concrete parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One point in the search space: parameter name to value.
pub type ParameterSet = BTreeMap<String, ParameterValue>;

/// Render a parameter set as `a=1, b=0.5` for log lines.
pub fn describe_parameters(params: &ParameterSet) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single stepped dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    /// Parameter name, e.g. "fast_period". Dotted names address nested keys
    /// of the base configuration.
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value_type: ValueType,
}

impl ParameterRange {
    pub fn new(
        name: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            step,
            value_type,
        }
    }

    pub fn integer(name: impl Into<String>, min: i64, max: i64, step: i64) -> Self {
        Self::new(name, min as f64, max as f64, step as f64, ValueType::Integer)
    }

    pub fn real(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self::new(name, min, max, step, ValueType::Real)
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    fn is_well_formed(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.step.is_finite()
            && self.step > 0.0
            && self.min <= self.max
    }

    /// Number of values produced by [`generate_values`](Self::generate_values):
    /// `floor((max - min) / step) + 1`, or zero for a malformed range.
    pub fn value_count(&self) -> usize {
        if !self.is_well_formed() {
            return 0;
        }
        let raw = self.width() / self.step;
        let steps = (raw + STEP_TOLERANCE * raw.max(1.0)).floor();
        if steps >= usize::MAX as f64 {
            usize::MAX
        } else {
            steps as usize + 1
        }
    }

    /// The `index`-th generated value. Computed as `min + index * step` so
    /// long ranges do not accumulate rounding drift; never exceeds `max`.
    pub fn value_at(&self, index: usize) -> ParameterValue {
        let raw = (self.min + index as f64 * self.step).min(self.max);
        self.typed(raw)
    }

    fn typed(&self, raw: f64) -> ParameterValue {
        match self.value_type {
            ValueType::Integer => ParameterValue::Int(raw.round() as i64),
            ValueType::Real => ParameterValue::Float(raw),
        }
    }

    /// Ordered candidate values `min, min + step, ...` up to `max`.
    pub fn generate_values(&self) -> Vec<ParameterValue> {
        (0..self.value_count()).map(|i| self.value_at(i)).collect()
    }

    /// Map any real number to the nearest step-quantized value inside the
    /// range.
    pub fn snap(&self, x: f64) -> ParameterValue {
        let count = self.value_count();
        if count == 0 {
            return self.typed(self.min);
        }
        let x = if x.is_finite() { x.clamp(self.min, self.max) } else { self.min };
        let index = ((x - self.min) / self.step).round().max(0.0) as usize;
        self.value_at(index.min(count - 1))
    }

    /// Uniform draw from the continuous hull `[min, max]`, snapped to the
    /// step grid.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterValue {
        if self.min >= self.max {
            return self.snap(self.min);
        }
        self.snap(rng.random_range(self.min..=self.max))
    }

    /// Position of `x` within the range on a `[0, 1]` scale.
    pub fn to_unit(&self, x: f64) -> f64 {
        let width = self.width();
        if width <= 0.0 {
            return 0.0;
        }
        ((x - self.min) / width).clamp(0.0, 1.0)
    }

    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = if u.is_finite() { u.clamp(0.0, 1.0) } else { 0.0 };
        self.snap(self.min + u * self.width())
    }

    /// True if `value` is one of the generated values (within tolerance).
    pub fn contains(&self, value: &ParameterValue) -> bool {
        let x = value.as_f64();
        if x < self.min - STEP_TOLERANCE || x > self.max + STEP_TOLERANCE {
            return false;
        }
        let snapped = self.snap(x).as_f64();
        (snapped - x).abs() <= STEP_TOLERANCE * self.step.abs().max(1.0)
    }

    /// Every rule this range breaks, as human-readable messages.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let name = if self.name.trim().is_empty() {
            violations.push("parameter name must not be empty".to_string());
            "<unnamed>"
        } else {
            self.name.as_str()
        };

        if !(self.min.is_finite() && self.max.is_finite() && self.step.is_finite()) {
            violations.push(format!("{name}: min, max and step must be finite"));
            return violations;
        }
        if self.min >= self.max {
            violations.push(format!(
                "{name}: min ({}) must be less than max ({})",
                self.min, self.max
            ));
        }
        if self.step <= 0.0 {
            violations.push(format!("{name}: step ({}) must be positive", self.step));
        }
        if self.value_type == ValueType::Integer
            && (self.min.fract() != 0.0 || self.max.fract() != 0.0 || self.step.fract() != 0.0)
        {
            violations.push(format!("{name}: integer parameter needs integral min, max and step"));
        }
        if violations.is_empty() && self.value_count() > MAX_VALUES_PER_PARAMETER {
            violations.push(format!(
                "{name}: {} values exceeds the per-parameter limit of {MAX_VALUES_PER_PARAMETER}",
                self.value_count()
            ));
        }
        violations
    }
}

/// The full search space: an ordered list of parameter ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub ranges: Vec<ParameterRange>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn from_ranges(ranges: Vec<ParameterRange>) -> Self {
        Self { ranges }
    }

    pub fn add_range(mut self, range: ParameterRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn add_integer(self, name: impl Into<String>, min: i64, max: i64, step: i64) -> Self {
        self.add_range(ParameterRange::integer(name, min, max, step))
    }

    pub fn add_real(self, name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        self.add_range(ParameterRange::real(name, min, max, step))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn range(&self, name: &str) -> Option<&ParameterRange> {
        self.ranges.iter().find(|r| r.name == name)
    }

    /// Product of every range's value count (saturating).
    pub fn total_combinations(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges
            .iter()
            .try_fold(1usize, |acc, r| acc.checked_mul(r.value_count()))
            .unwrap_or(usize::MAX)
    }

    fn range_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.ranges.is_empty() {
            violations.push("search space has no parameters".to_string());
        }
        let mut seen = HashSet::new();
        for range in &self.ranges {
            if !range.name.is_empty() && !seen.insert(range.name.as_str()) {
                violations.push(format!("{}: duplicate parameter name", range.name));
            }
            violations.extend(range.violations());
        }
        violations
    }

    /// Validate every range. Adaptive strategies never enumerate the grid, so
    /// the combination cap is not applied here.
    pub fn validate(&self) -> PfResult<()> {
        let violations = self.range_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(OptimizerError::Configuration { violations })
        }
    }

    /// Validate every range and the total grid size.
    pub fn validate_grid(&self) -> PfResult<()> {
        let mut violations = self.range_violations();
        if violations.is_empty() && self.total_combinations() > MAX_TOTAL_COMBINATIONS {
            violations.push(format!(
                "{} combinations exceeds the sweep limit of {MAX_TOTAL_COMBINATIONS}",
                self.total_combinations()
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(OptimizerError::Configuration { violations })
        }
    }

    /// Cartesian product over all ranges in declaration order; the first
    /// range varies slowest.
    pub fn generate_parameter_sets(&self) -> Vec<ParameterSet> {
        if self.ranges.is_empty() {
            return Vec::new();
        }

        let mut result: Vec<ParameterSet> = vec![ParameterSet::new()];
        for range in &self.ranges {
            let values = range.generate_values();
            let mut next = Vec::with_capacity(result.len() * values.len());
            for existing in &result {
                for value in &values {
                    let mut combo = existing.clone();
                    combo.insert(range.name.clone(), *value);
                    next.push(combo);
                }
            }
            result = next;
        }
        result
    }

    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterSet {
        self.ranges
            .iter()
            .map(|r| (r.name.clone(), r.sample_uniform(rng)))
            .collect()
    }

    /// Raw numeric coordinates in declaration order. `None` if a parameter is
    /// missing from `params`.
    pub fn to_vector(&self, params: &ParameterSet) -> Option<Vec<f64>> {
        self.ranges
            .iter()
            .map(|r| params.get(&r.name).map(ParameterValue::as_f64))
            .collect()
    }

    /// Coordinates rescaled to the unit hypercube.
    pub fn to_unit_vector(&self, params: &ParameterSet) -> Option<Vec<f64>> {
        self.ranges
            .iter()
            .map(|r| params.get(&r.name).map(|v| r.to_unit(v.as_f64())))
            .collect()
    }

    /// Inverse of [`to_unit_vector`](Self::to_unit_vector); coordinates are
    /// clamped and snapped to valid values.
    pub fn from_unit_vector(&self, unit: &[f64]) -> ParameterSet {
        self.ranges
            .iter()
            .zip(unit)
            .map(|(r, u)| (r.name.clone(), r.from_unit(*u)))
            .collect()
    }

    /// Clamp and snap raw coordinates to valid values.
    pub fn from_vector(&self, coords: &[f64]) -> ParameterSet {
        self.ranges
            .iter()
            .zip(coords)
            .map(|(r, x)| (r.name.clone(), r.snap(*x)))
            .collect()
    }

    /// Clamp raw coordinates into each range's bounds without snapping.
    /// Returns the axes that had to be clamped.
    pub fn clamp_vector(&self, coords: &mut [f64]) -> Vec<usize> {
        let mut clamped = Vec::new();
        for (axis, (range, x)) in self.ranges.iter().zip(coords.iter_mut()).enumerate() {
            let value = *x;
            let bounded = if value.is_finite() {
                value.clamp(range.min, range.max)
            } else {
                range.min
            };
            if bounded != value {
                *x = bounded;
                clamped.push(axis);
            }
        }
        clamped
    }

    /// True if `params` holds exactly one generated value for every range.
    pub fn contains(&self, params: &ParameterSet) -> bool {
        params.len() == self.ranges.len()
            && self
                .ranges
                .iter()
                .all(|r| params.get(&r.name).is_some_and(|v| r.contains(v)))
    }
}
