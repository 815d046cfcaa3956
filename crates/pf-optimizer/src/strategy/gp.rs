//! Gaussian-process regression used as the Bayesian search surrogate.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

/// Zero-mean GP with an RBF kernel over standardized targets.
pub(crate) struct GaussianProcess {
    inputs: Vec<Vec<f64>>,
    factor: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-0.5 * sq / (length_scale * length_scale)).exp()
}

impl GaussianProcess {
    /// Fit on `(input, target)` pairs. `None` when there are fewer than two
    /// points or the kernel matrix is not positive definite.
    pub(crate) fn fit(
        inputs: &[Vec<f64>],
        targets: &[f64],
        length_scale: f64,
        noise: f64,
    ) -> Option<Self> {
        let n = inputs.len();
        if n < 2 || targets.len() != n {
            return None;
        }

        let y_mean = targets.iter().sum::<f64>() / n as f64;
        let variance = targets.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if variance.sqrt() > 1e-12 { variance.sqrt() } else { 1.0 };
        let y = DVector::from_iterator(n, targets.iter().map(|t| (t - y_mean) / y_std));

        let kernel = DMatrix::from_fn(n, n, |i, j| {
            let k = rbf(&inputs[i], &inputs[j], length_scale);
            if i == j {
                k + noise.max(1e-10)
            } else {
                k
            }
        });

        let factor = kernel.cholesky()?;
        let alpha = factor.solve(&y);
        if alpha.iter().any(|a| !a.is_finite()) {
            return None;
        }

        Some(Self {
            inputs: inputs.to_vec(),
            factor,
            alpha,
            length_scale,
            y_mean,
            y_std,
        })
    }

    /// Posterior mean and standard deviation at `x`, in target units.
    pub(crate) fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k = DVector::from_iterator(
            self.inputs.len(),
            self.inputs.iter().map(|p| rbf(p, x, self.length_scale)),
        );
        let mean = k.dot(&self.alpha);
        let v = self.factor.solve(&k);
        let variance = (1.0 - k.dot(&v)).max(0.0);
        (
            self.y_mean + mean * self.y_std,
            variance.sqrt() * self.y_std,
        )
    }
}
