//! Ridge regression on standardized features
//!
//! Solves `(XᵀX + αI) w = Xᵀy` on centered, unit-variance columns with a
//! Cholesky factorization. The intercept is the target mean.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::FitError;
use crate::featurize::FeatureMatrix;

/// Fitted linear model in the original feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    means: Array1<f64>,
    scales: Array1<f64>,
    coefficients: Array1<f64>,
}

impl LinearModel {
    /// Vectors of the wrong width score NaN
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> f64 {
        if features.len() != self.coefficients.len() {
            return f64::NAN;
        }
        let standardized = (&features - &self.means) / &self.scales;
        self.intercept + standardized.dot(&self.coefficients)
    }

    /// Coefficients on standardized features
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    /// Finite parameters, positive scales and matching widths
    pub fn is_valid(&self) -> bool {
        let width = self.coefficients.len();
        self.means.len() == width
            && self.scales.len() == width
            && self.intercept.is_finite()
            && self
                .means
                .iter()
                .chain(&self.scales)
                .chain(&self.coefficients)
                .all(|v| v.is_finite())
            && self.scales.iter().all(|s| *s > 0.0)
    }
}

/// L2-regularized least squares
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeRegression {
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn fit(&self, data: &FeatureMatrix) -> Result<LinearModel, FitError> {
        if data.is_empty() {
            return Err(FitError::Dataset("cannot fit ridge on an empty dataset".into()));
        }
        if self.alpha.is_nan() || self.alpha < 0.0 {
            return Err(FitError::Training(format!(
                "ridge alpha must be non-negative, got {}",
                self.alpha
            )));
        }

        let x = &data.features;
        let y = &data.targets;
        let n_features = data.feature_count();

        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| FitError::Dataset("feature matrix has no rows".into()))?;
        let centered = x - &means.view().insert_axis(Axis(0));
        let scales = centered
            .mapv(|v| v * v)
            .mean_axis(Axis(0))
            .ok_or_else(|| FitError::Dataset("feature matrix has no rows".into()))?
            .mapv(|variance| if variance > 1e-24 { variance.sqrt() } else { 1.0 });
        let standardized = &centered / &scales.view().insert_axis(Axis(0));

        let y_mean = y.mean().unwrap_or(0.0);
        let y_centered = y - y_mean;

        // (ZᵀZ + αI) w = Zᵀy on standardized columns
        let mut xtx = standardized.t().dot(&standardized);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = standardized.t().dot(&y_centered);

        let coefficients = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            FitError::Training("normal equations are not positive definite".into())
        })?;

        let model = LinearModel {
            intercept: y_mean,
            means,
            scales,
            coefficients,
        };
        if !model.is_valid() {
            return Err(FitError::Training("ridge produced non-finite coefficients".into()));
        }
        Ok(model)
    }
}

/// Solve the symmetric positive-definite system `a x = b`.
/// Retries once with a small diagonal jitter when `a` is near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve_inner(a, b) {
        return Some(x);
    }

    let n = a.nrows();
    let jitter = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let mut regularized = a.clone();
    for i in 0..n {
        regularized[[i, i]] += jitter.max(1e-12);
    }
    cholesky_solve_inner(&regularized, b)
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L Lᵀ
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}
