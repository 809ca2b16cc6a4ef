//! Conversion of tabular rows into numeric feature vectors
//!
//! Float32 columns pass through, booleans become 0/1 and text columns are
//! one-hot encoded over the vocabulary seen at fit time. The target column is
//! excluded from the features and must be float32.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tabreg_core::{ColumnKind, ColumnValue, DataRow, DataView, Schema};

use crate::errors::FitError;

/// How one schema column contributes to the feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Encoding {
    Numeric,
    Flag,
    OneHot { categories: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureColumn {
    index: usize,
    name: String,
    encoding: Encoding,
}

/// Fitted mapping from rows to feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Featurizer {
    target_index: usize,
    columns: Vec<FeatureColumn>,
    width: usize,
}

/// Dense features with their labels, one row per sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl FeatureMatrix {
    pub fn new(features: Array2<f64>, targets: Array1<f64>) -> Result<Self, FitError> {
        if features.nrows() != targets.len() {
            return Err(FitError::Dataset(format!(
                "{} feature rows but {} targets",
                features.nrows(),
                targets.len()
            )));
        }
        Ok(Self { features, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            features: self.features.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }
}

/// Index of the float32 target column in `schema`
pub fn target_index(schema: &Schema, target_column: &str) -> Result<usize, FitError> {
    let index = schema
        .index_of(target_column)
        .ok_or_else(|| FitError::Dataset(format!("target column {} not found", target_column)))?;
    match schema.columns()[index].kind {
        ColumnKind::Float32 => Ok(index),
        kind => Err(FitError::Dataset(format!(
            "target column {} is {}, expected float32",
            target_column, kind
        ))),
    }
}

/// Float32 labels of `data`; non-finite labels are rejected
pub fn labels(data: &DataView, target_column: &str) -> Result<Array1<f64>, FitError> {
    let index = target_index(data.schema(), target_column)?;
    data.rows()
        .iter()
        .enumerate()
        .map(|(i, row)| label_of(row, index, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from)
}

fn label_of(row: &DataRow, index: usize, row_number: usize) -> Result<f64, FitError> {
    match row.get(index) {
        Some(ColumnValue::Float32(v)) if v.is_finite() => Ok(*v as f64),
        Some(ColumnValue::Float32(v)) => Err(FitError::Dataset(format!(
            "row {} has non-finite label {}",
            row_number, v
        ))),
        _ => Err(FitError::Dataset(format!(
            "row {} has no float32 label",
            row_number
        ))),
    }
}

impl Featurizer {
    /// Learn the encoding of every non-target column of `data`
    pub fn fit(data: &DataView, target_column: &str) -> Result<Self, FitError> {
        let schema = data.schema();
        let target_index = target_index(schema, target_column)?;

        let mut columns = Vec::new();
        let mut width = 0;
        for (index, column) in schema.columns().iter().enumerate() {
            if index == target_index {
                continue;
            }
            let encoding = match column.kind {
                ColumnKind::Float32 => Encoding::Numeric,
                ColumnKind::Boolean => Encoding::Flag,
                ColumnKind::Text => {
                    let vocabulary: BTreeSet<&str> = data
                        .rows()
                        .iter()
                        .filter_map(|row| row.get(index).and_then(ColumnValue::as_text))
                        .collect();
                    Encoding::OneHot {
                        categories: vocabulary.into_iter().map(str::to_string).collect(),
                    }
                }
            };
            width += match &encoding {
                Encoding::OneHot { categories } => categories.len(),
                _ => 1,
            };
            columns.push(FeatureColumn {
                index,
                name: column.name.clone(),
                encoding,
            });
        }

        Ok(Self {
            target_index,
            columns,
            width,
        })
    }

    /// Length of every produced feature vector
    pub fn width(&self) -> usize {
        self.width
    }

    /// Feature vector of one row. Unseen categories encode as all zeros,
    /// non-finite floats as 0.
    pub fn transform(&self, row: &DataRow) -> Result<Array1<f64>, FitError> {
        let mut features = Vec::with_capacity(self.width);
        for column in &self.columns {
            let value = row.get(column.index).ok_or_else(|| {
                FitError::Features(format!("row has no value for column {}", column.name))
            })?;
            match (&column.encoding, value) {
                (Encoding::Numeric, ColumnValue::Float32(v)) => {
                    features.push(if v.is_finite() { *v as f64 } else { 0.0 })
                }
                (Encoding::Flag, ColumnValue::Boolean(b)) => {
                    features.push(if *b { 1.0 } else { 0.0 })
                }
                (Encoding::OneHot { categories }, ColumnValue::Text(text)) => {
                    let hit = categories.binary_search(text).ok();
                    features.extend((0..categories.len()).map(|i| {
                        if Some(i) == hit {
                            1.0
                        } else {
                            0.0
                        }
                    }));
                }
                (_, other) => {
                    return Err(FitError::Features(format!(
                        "column {} holds an unexpected {} value",
                        column.name,
                        other.kind()
                    )))
                }
            }
        }
        Ok(Array1::from(features))
    }

    /// Features and labels of every row of `data`
    pub fn matrix(&self, data: &DataView) -> Result<FeatureMatrix, FitError> {
        let mut features = Array2::zeros((data.len(), self.width));
        let mut targets = Array1::zeros(data.len());
        for (i, row) in data.rows().iter().enumerate() {
            let encoded = self.transform(row)?;
            if encoded.len() != self.width {
                return Err(FitError::Features(format!(
                    "row {} encodes to {} features, expected {}",
                    i,
                    encoded.len(),
                    self.width
                )));
            }
            features.row_mut(i).assign(&encoded);
            targets[i] = label_of(row, self.target_index, i)?;
        }
        FeatureMatrix::new(features, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::sync::Arc;
    use tabreg_core::Column;

    fn view() -> DataView {
        let schema = Arc::new(Schema::new(vec![
            Column {
                name: "city".into(),
                kind: ColumnKind::Text,
            },
            Column {
                name: "express".into(),
                kind: ColumnKind::Boolean,
            },
            Column {
                name: "minutes".into(),
                kind: ColumnKind::Float32,
            },
            Column {
                name: "fare".into(),
                kind: ColumnKind::Float32,
            },
        ]));
        let rows = [("paris", true, 10.0, 7.5), ("lyon", false, 20.0, 12.0)]
            .into_iter()
            .map(|(city, express, minutes, fare)| {
                DataRow::new(vec![
                    ColumnValue::Text(city.into()),
                    ColumnValue::Boolean(express),
                    ColumnValue::Float32(minutes),
                    ColumnValue::Float32(fare),
                ])
            })
            .collect();
        DataView::new(schema, rows)
    }

    #[test]
    fn test_encoding_excludes_target() {
        let data = view();
        let featurizer = Featurizer::fit(&data, "fare").unwrap();
        assert_eq!(featurizer.width(), 4);

        let matrix = featurizer.matrix(&data).unwrap();
        // categories sorted: lyon, paris
        assert_eq!(
            matrix.features,
            array![[0.0, 1.0, 1.0, 10.0], [1.0, 0.0, 0.0, 20.0]]
        );
        assert_eq!(matrix.targets, array![7.5, 12.0]);
    }

    #[test]
    fn test_unseen_category_is_all_zeros() {
        let data = view();
        let featurizer = Featurizer::fit(&data, "fare").unwrap();
        let row = DataRow::new(vec![
            ColumnValue::Text("nice".into()),
            ColumnValue::Boolean(false),
            ColumnValue::Float32(5.0),
            ColumnValue::Float32(0.0),
        ]);
        assert_eq!(featurizer.transform(&row).unwrap(), array![0.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let data = view();
        let matrix = Featurizer::fit(&data, "fare").unwrap().matrix(&data).unwrap();

        let picked = matrix.select(&[1, 0]);
        assert_eq!(picked.targets, array![12.0, 7.5]);
        assert_eq!(picked.features.row(0), matrix.features.row(1));
        assert_eq!(picked.feature_count(), 4);
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let result = FeatureMatrix::new(Array2::zeros((3, 2)), Array1::zeros(2));
        assert!(matches!(result, Err(FitError::Dataset(_))));
    }

    #[test]
    fn test_target_must_be_float() {
        let data = view();
        assert!(matches!(
            Featurizer::fit(&data, "city"),
            Err(FitError::Dataset(_))
        ));
        assert!(matches!(
            Featurizer::fit(&data, "missing"),
            Err(FitError::Dataset(_))
        ));
    }
}
