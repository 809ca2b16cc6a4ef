//! Regression metrics and the evaluator built on them

use ndarray::{Array1, ArrayView1};
use tabreg_core::{DataView, EngineError, ModelEvaluator, RegressionMetrics, RegressionModel};

use crate::featurize::labels;

/// MAE, MSE, RMSE and R² of `predictions` against `targets`.
///
/// R² is NaN when the targets have no variance. Both vectors must be
/// non-empty and of equal length.
pub fn regression_metrics(
    predictions: ArrayView1<'_, f64>,
    targets: ArrayView1<'_, f64>,
) -> RegressionMetrics {
    let n = targets.len().min(predictions.len()) as f64;
    let mean = targets.iter().take(predictions.len()).sum::<f64>() / n;

    let mut abs_error = 0.0;
    let mut sq_error = 0.0;
    let mut ss_tot = 0.0;
    for (prediction, target) in predictions.iter().zip(targets.iter()) {
        let residual = target - prediction;
        abs_error += residual.abs();
        sq_error += residual * residual;
        ss_tot += (target - mean).powi(2);
    }

    let mse = sq_error / n;
    let r_squared = if ss_tot > 0.0 {
        1.0 - sq_error / ss_tot
    } else {
        f64::NAN
    };

    RegressionMetrics {
        mean_absolute_error: abs_error / n,
        mean_squared_error: mse,
        root_mean_squared_error: mse.sqrt(),
        r_squared,
    }
}

/// Scores any [`RegressionModel`] on labelled rows
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionEvaluator;

impl<M: RegressionModel> ModelEvaluator<M> for RegressionEvaluator {
    fn evaluate(
        &self,
        model: &M,
        data: &DataView,
        target_column: &str,
    ) -> Result<RegressionMetrics, EngineError> {
        if data.is_empty() {
            return Err(EngineError::Evaluation("evaluation set is empty".into()));
        }
        let targets = labels(data, target_column)
            .map_err(|e| EngineError::Evaluation(e.to_string()))?;

        let predictions = data
            .rows()
            .iter()
            .map(|row| model.predict(row).map(f64::from))
            .collect::<Result<Array1<f64>, _>>()
            .map_err(|e| EngineError::Evaluation(e.to_string()))?;

        Ok(regression_metrics(predictions.view(), targets.view()))
    }
}
