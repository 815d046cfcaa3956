//! Patience-based early stopping for sweeps.

use pf_types::ObjectiveDirection;
use std::collections::VecDeque;

/// Watches successful scores in completion order and signals a stop once the
/// trailing `patience` results fail to strictly improve on the best score
/// seen before them. Ties count as no improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    direction: ObjectiveDirection,
    /// The trailing `patience` scores.
    window: VecDeque<f64>,
    /// Best score among everything that has left the window.
    best_before_window: Option<f64>,
}

impl EarlyStopping {
    pub fn new(patience: usize, direction: ObjectiveDirection) -> Self {
        Self {
            patience,
            direction,
            window: VecDeque::with_capacity(patience + 1),
            best_before_window: None,
        }
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    /// Record a score; returns `true` when the search should stop submitting
    /// new work.
    pub fn observe(&mut self, score: f64) -> bool {
        if self.patience == 0 {
            return false;
        }
        self.window.push_back(score);
        if self.window.len() <= self.patience {
            return false;
        }

        let Some(leaving) = self.window.pop_front() else {
            return false;
        };
        let before = match self.best_before_window {
            Some(best) => self.direction.better(best, leaving),
            None => leaving,
        };
        self.best_before_window = Some(before);

        let window_best = self
            .window
            .iter()
            .skip(1)
            .fold(self.window[0], |best, s| self.direction.better(best, *s));
        !self.direction.is_improvement(window_best, before)
    }
}
