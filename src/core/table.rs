use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

/// Tokens read as a missing value when loading CSV data
const MISSING_TOKENS: &[&str] = &["", "?", "NA", "NaN", "nan"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Row {row} has {actual} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Storage of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ColumnData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            ColumnData::Int(_) => "int64",
            ColumnData::Float(_) => "float64",
            ColumnData::Text(_) => "object",
        }
    }

    /// Numeric value at `row`; text cells and missing rows read as `None`
    pub fn get_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Int(v) => v.get(row).map(|x| *x as f64),
            ColumnData::Float(v) => v.get(row).copied(),
            ColumnData::Text(_) => None,
        }
    }

    fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Int(v) => ColumnData::Int(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Column-oriented table with named, typed columns of equal length
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<Column>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, checking its name is unique and its length matches
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Result<Self, TableError> {
        self.push_column(name, data)?;
        Ok(self)
    }

    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<(), TableError> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        if let Some(first) = self.columns.first() {
            let expected = first.data.len();
            if data.len() != expected {
                return Err(TableError::LengthMismatch {
                    column: name,
                    expected,
                    actual: data.len(),
                });
            }
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.n_rows() == 0
    }

    /// Split off `name` and return it alongside the remaining columns
    pub fn split_column(mut self, name: &str) -> Result<(FeatureTable, Column), TableError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        let column = self.columns.remove(idx);
        Ok((self, column))
    }

    /// New table holding only the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(rows),
                })
                .collect(),
        }
    }

    /// Read CSV data, inferring each column as int, float or text.
    ///
    /// With `has_headers == false` the caller supplies the column names and
    /// every record must have exactly that many fields. Missing-value tokens
    /// (`?`, empty, `NA`) turn an integer column into a float column holding NaN.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        has_headers: bool,
        names: Option<&[&str]>,
    ) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = if has_headers {
            rdr.headers()?.iter().map(str::to_string).collect()
        } else {
            names.unwrap_or_default().iter().map(|s| s.to_string()).collect()
        };

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() == 1 && record.get(0).map(str::is_empty).unwrap_or(false) {
                continue;
            }
            if record.len() != names.len() {
                return Err(TableError::RaggedRow {
                    row,
                    expected: names.len(),
                    actual: record.len(),
                });
            }
            for (cells, value) in raw.iter_mut().zip(record.iter()) {
                cells.push(value.to_string());
            }
        }

        let mut table = FeatureTable::new();
        for (name, cells) in names.into_iter().zip(raw) {
            table.push_column(name, infer_column(cells))?;
        }
        Ok(table)
    }
}

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

fn infer_column(cells: Vec<String>) -> ColumnData {
    let present = || cells.iter().filter(|c| !is_missing(c));

    let all_int = present().all(|c| c.parse::<i64>().is_ok());
    let any_missing = cells.iter().any(|c| is_missing(c));
    if all_int && !any_missing {
        return ColumnData::Int(cells.iter().filter_map(|c| c.parse().ok()).collect());
    }

    if present().all(|c| c.parse::<f64>().is_ok()) {
        return ColumnData::Float(
            cells
                .iter()
                .map(|c| if is_missing(c) { f64::NAN } else { c.parse().unwrap_or(f64::NAN) })
                .collect(),
        );
    }

    ColumnData::Text(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_with_headers_infers_types() {
        let data = "age,oldpeak,label\n63,2.3,a\n37,3.5,b\n";
        let table = FeatureTable::from_csv_reader(data.as_bytes(), true, None).unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("age").unwrap().data, ColumnData::Int(vec![63, 37]));
        assert_eq!(table.column("oldpeak").unwrap().data, ColumnData::Float(vec![2.3, 3.5]));
        assert_eq!(table.column("label").unwrap().data.dtype(), "object");
    }

    #[test]
    fn test_csv_missing_tokens_become_nan() {
        let data = "1,0.0\n?,1.0\n";
        let table = FeatureTable::from_csv_reader(data.as_bytes(), false, Some(&["ca", "thal"])).unwrap();

        match &table.column("ca").unwrap().data {
            ColumnData::Float(values) => {
                assert_eq!(values[0], 1.0);
                assert!(values[1].is_nan());
            }
            other => panic!("expected float column, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let data = "1,2\n3\n";
        let result = FeatureTable::from_csv_reader(data.as_bytes(), false, Some(&["a", "b"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_column_length_mismatch() {
        let result = FeatureTable::new()
            .with_column("a", ColumnData::Int(vec![1, 2]))
            .and_then(|t| t.with_column("b", ColumnData::Int(vec![1])));
        assert!(matches!(result, Err(TableError::LengthMismatch { .. })));
    }

    #[test]
    fn test_split_and_take_rows() {
        let table = FeatureTable::new()
            .with_column("x", ColumnData::Float(vec![1.0, 2.0, 3.0]))
            .unwrap()
            .with_column("y", ColumnData::Int(vec![0, 1, 0]))
            .unwrap();

        let (features, target) = table.split_column("y").unwrap();
        assert_eq!(features.column_names(), vec!["x".to_string()]);
        assert_eq!(target.data, ColumnData::Int(vec![0, 1, 0]));

        let subset = features.take_rows(&[2, 0]);
        assert_eq!(subset.column("x").unwrap().data, ColumnData::Float(vec![3.0, 1.0]));
    }
}
