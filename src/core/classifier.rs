use crate::core::table::{ColumnData, FeatureTable};
use thiserror::Error;

/// Errors raised while a model scores a feature table
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("missing feature column '{0}'")]
    MissingFeature(String),

    #[error("feature column '{0}' is not numeric")]
    NonNumeric(String),

    #[error("feature '{feature}' has a non-finite value at row {row}")]
    NonFinite { feature: String, row: usize },

    #[error("model has no trees")]
    EmptyModel,

    #[error("{0}")]
    Other(String),
}

/// A fitted model that maps each row of a feature table to a class label.
///
/// Columns are looked up by name, so callers may pass them in any order.
pub trait Classifier: Send + Sync {
    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError>;

    /// Short human-readable model description used in logs
    fn describe(&self) -> String;
}

/// Gather `feature_names` from `table` as row-major numeric vectors
pub fn rows_for_features(table: &FeatureTable, feature_names: &[String]) -> Result<Vec<Vec<f64>>, ModelError> {
    let mut columns = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let column = table
            .column(name)
            .ok_or_else(|| ModelError::MissingFeature(name.clone()))?;
        if matches!(column.data, ColumnData::Text(_)) {
            return Err(ModelError::NonNumeric(name.clone()));
        }
        columns.push(column);
    }

    let n_rows = table.n_rows();
    let mut rows = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            match column.data.get_f64(row) {
                Some(v) if v.is_finite() => values.push(v),
                _ => {
                    return Err(ModelError::NonFinite {
                        feature: column.name.clone(),
                        row,
                    })
                }
            }
        }
        rows.push(values);
    }
    Ok(rows)
}
