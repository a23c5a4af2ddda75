use crate::core::table::{ColumnData, FeatureTable};

/// Normalise a feature table before training or inference.
///
/// Integer columns are widened to floating point so that they can later
/// carry missing values (NaN). Float and text columns pass through as-is,
/// which makes the operation idempotent.
pub fn preprocess_features(mut table: FeatureTable) -> FeatureTable {
    let mut converted = 0usize;

    for column in table.columns_mut() {
        if let ColumnData::Int(values) = &column.data {
            column.data = ColumnData::Float(values.iter().map(|v| *v as f64).collect());
            converted += 1;
        }
    }

    tracing::debug!(
        converted_columns = converted,
        total_columns = table.n_columns(),
        "Preprocessed feature table"
    );

    table
}
