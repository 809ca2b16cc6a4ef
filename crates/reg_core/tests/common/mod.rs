//! In-memory engine used by the lifecycle tests: the "model" is the mean of
//! the target column.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabreg_core::{
    AlgorithmRun, ColumnValue, DataRow, DataView, Engine, EngineError, FieldDescriptor, FieldType,
    ModelEvaluator, ModelSerializer, ModelTrainer, Record, RegressionMetrics, RegressionModel,
    Schema, SearchOutcome,
};

#[derive(Debug, Clone, PartialEq)]
pub struct House {
    pub district: String,
    pub garden: bool,
    pub size: f32,
    pub price: f32,
}

impl Record for House {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("district", FieldType::Text),
            FieldDescriptor::new("garden", FieldType::Boolean),
            FieldDescriptor::new("size", FieldType::Float32),
            FieldDescriptor::new("price", FieldType::Float32),
        ]
    }

    fn value(&self, field: &str) -> Option<ColumnValue> {
        match field {
            "district" => Some(ColumnValue::Text(self.district.clone())),
            "garden" => Some(ColumnValue::Boolean(self.garden)),
            "size" => Some(ColumnValue::Float32(self.size)),
            "price" => Some(ColumnValue::Float32(self.price)),
            _ => None,
        }
    }
}

/// `count` houses priced `base`, `base + 1`, ...
pub fn houses(count: usize, base: f32) -> Vec<House> {
    (0..count)
        .map(|i| House {
            district: if i % 2 == 0 { "north" } else { "south" }.to_string(),
            garden: i % 3 == 0,
            size: 50.0 + i as f32,
            price: base + i as f32,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanModel {
    pub mean: f32,
}

impl RegressionModel for MeanModel {
    fn predict(&self, _row: &DataRow) -> Result<f32, EngineError> {
        Ok(self.mean)
    }

    fn algorithm_name(&self) -> &str {
        "Mean"
    }
}

/// Fits [`MeanModel`]; can be slowed down or made to fail after a number of calls
#[derive(Default)]
pub struct MeanTrainer {
    pub delay: Duration,
    pub succeed_calls: Option<usize>,
    calls: AtomicUsize,
}

impl MeanTrainer {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing_after(succeed_calls: usize) -> Self {
        Self {
            succeed_calls: Some(succeed_calls),
            ..Self::default()
        }
    }
}

impl ModelTrainer for MeanTrainer {
    type Model = MeanModel;

    fn search(
        &self,
        data: &DataView,
        target_column: &str,
        _budget: Duration,
    ) -> Result<SearchOutcome<MeanModel>, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.succeed_calls {
            if call >= limit {
                return Err(EngineError::Search("trainer switched off".into()));
            }
        }
        std::thread::sleep(self.delay);

        let labels = data
            .float_column(target_column)
            .ok_or_else(|| EngineError::InvalidData(format!("no float column {target_column}")))?;
        if labels.is_empty() {
            return Err(EngineError::InvalidData("no rows".into()));
        }
        let mean = labels.iter().sum::<f32>() / labels.len() as f32;

        let model = MeanModel { mean };
        let metrics = mean_metrics(&model, &labels);
        Ok(SearchOutcome {
            best_model: model,
            best_algorithm: "Mean".into(),
            candidates: vec![AlgorithmRun::new("Mean", 0.0, metrics)],
        })
    }
}

pub struct MeanEvaluator;

impl ModelEvaluator<MeanModel> for MeanEvaluator {
    fn evaluate(
        &self,
        model: &MeanModel,
        data: &DataView,
        target_column: &str,
    ) -> Result<RegressionMetrics, EngineError> {
        let labels = data
            .float_column(target_column)
            .ok_or_else(|| EngineError::Evaluation(format!("no float column {target_column}")))?;
        if labels.is_empty() {
            return Err(EngineError::Evaluation("evaluation set is empty".into()));
        }
        Ok(mean_metrics(model, &labels))
    }
}

fn mean_metrics(model: &MeanModel, labels: &[f32]) -> RegressionMetrics {
    let n = labels.len() as f64;
    let mae = labels
        .iter()
        .map(|y| (*y as f64 - model.mean as f64).abs())
        .sum::<f64>()
        / n;
    let mse = labels
        .iter()
        .map(|y| (*y as f64 - model.mean as f64).powi(2))
        .sum::<f64>()
        / n;
    RegressionMetrics {
        mean_absolute_error: mae,
        mean_squared_error: mse,
        root_mean_squared_error: mse.sqrt(),
        r_squared: 0.0,
    }
}

#[derive(Serialize, Deserialize)]
struct TomlSnapshot {
    mean: f32,
    schema: Schema,
}

/// Text snapshots; `broken` makes every save fail
#[derive(Default)]
pub struct TomlSerializer {
    pub broken: bool,
}

impl ModelSerializer<MeanModel> for TomlSerializer {
    fn save(&self, model: &MeanModel, schema: &Schema) -> Result<Vec<u8>, EngineError> {
        if self.broken {
            return Err(EngineError::Serialization("disk full".into()));
        }
        let snapshot = TomlSnapshot {
            mean: model.mean,
            schema: schema.clone(),
        };
        toml::to_string(&snapshot)
            .map(String::into_bytes)
            .map_err(|e| EngineError::Serialization(e.to_string()))
    }

    fn load(&self, bytes: &[u8]) -> Result<(MeanModel, Schema), EngineError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| EngineError::Deserialization(e.to_string()))?;
        let snapshot: TomlSnapshot =
            toml::from_str(text).map_err(|e| EngineError::Deserialization(e.to_string()))?;
        Ok((MeanModel { mean: snapshot.mean }, snapshot.schema))
    }
}

pub fn engine_with(trainer: MeanTrainer) -> Engine<MeanModel> {
    Engine::new(trainer, MeanEvaluator, TomlSerializer::default())
}

pub fn mean_engine() -> Engine<MeanModel> {
    engine_with(MeanTrainer::default())
}
