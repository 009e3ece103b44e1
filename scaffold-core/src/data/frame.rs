//! Named tabular frames and the numeric normalization step at the training boundary.

use crate::error::{Result, ScaffoldError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A named tabular frame: column headers plus rows of JSON cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Remove a column, returning its cells in row order.
    pub fn take_column(&mut self, name: &str) -> Result<Vec<serde_json::Value>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ScaffoldError::dataset(format!("Column '{name}' not found")))?;
        self.columns.remove(idx);
        let mut taken = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter_mut().enumerate() {
            if idx >= row.len() {
                return Err(ScaffoldError::dataset(format!(
                    "Row {i} has {} cells, expected at least {}",
                    row.len(),
                    idx + 1
                )));
            }
            taken.push(row.remove(idx));
        }
        Ok(taken)
    }
}

/// Everything `train` accepts as its feature input.
#[derive(Debug, Clone)]
pub enum TrainingInput {
    /// Column-named frame; names become the router's feature names.
    Frame(Frame),
    /// Raw numeric matrix without names.
    Matrix(Array2<f64>),
}

impl From<Frame> for TrainingInput {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

impl From<Array2<f64>> for TrainingInput {
    fn from(matrix: Array2<f64>) -> Self {
        Self::Matrix(matrix)
    }
}

/// Canonical in-memory form every algorithm downstream of `train` sees.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    pub columns: Option<Vec<String>>,
    pub values: Array2<f64>,
}

impl TrainingInput {
    /// Normalize into a finite, non-empty numeric table.
    pub fn into_table(self) -> Result<NumericTable> {
        let table = match self {
            Self::Matrix(values) => NumericTable {
                columns: None,
                values,
            },
            Self::Frame(frame) => frame_to_table(frame)?,
        };
        let (rows, cols) = table.values.dim();
        if rows == 0 || cols == 0 {
            return Err(ScaffoldError::unsupported_input(format!(
                "expected a non-empty table, got {rows}x{cols}"
            )));
        }
        if let Some(pos) = table.values.iter().position(|v| !v.is_finite()) {
            return Err(ScaffoldError::unsupported_input(format!(
                "non-finite value at row {}, column {}",
                pos / cols,
                pos % cols
            )));
        }
        Ok(table)
    }
}

fn frame_to_table(frame: Frame) -> Result<NumericTable> {
    let n_cols = frame.column_count();
    let mut flat = Vec::with_capacity(frame.row_count() * n_cols);
    for (i, row) in frame.rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(ScaffoldError::unsupported_input(format!(
                "row {i} has {} cells but the frame has {n_cols} columns",
                row.len()
            )));
        }
        for (j, cell) in row.iter().enumerate() {
            flat.push(cell_to_f64(cell).ok_or_else(|| {
                ScaffoldError::unsupported_input(format!(
                    "column '{}' row {i}: cell {cell} is not numeric",
                    frame.columns[j]
                ))
            })?);
        }
    }
    let values = Array2::from_shape_vec((frame.row_count(), n_cols), flat)?;
    Ok(NumericTable {
        columns: Some(frame.columns),
        values,
    })
}

/// Numeric value of a JSON cell; booleans map to 0/1 and numeric strings are parsed.
pub fn cell_to_f64(cell: &serde_json::Value) -> Option<f64> {
    match cell {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn frame() -> Frame {
        Frame::new(
            vec!["age".into(), "priors".into(), "sex".into()],
            vec![
                vec![json!(25), json!(1.5), json!(true)],
                vec![json!(40), json!("2"), json!(false)],
            ],
        )
    }

    #[test]
    fn test_frame_into_table() {
        let table = TrainingInput::from(frame()).into_table().unwrap();
        assert_eq!(
            table.columns,
            Some(vec!["age".to_string(), "priors".to_string(), "sex".to_string()])
        );
        assert_eq!(table.values, array![[25.0, 1.5, 1.0], [40.0, 2.0, 0.0]]);
    }

    #[test]
    fn test_matrix_has_no_names() {
        let table = TrainingInput::from(array![[1.0, 2.0]]).into_table().unwrap();
        assert!(table.columns.is_none());
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let mut f = frame();
        f.rows[1][0] = json!("forty");
        let err = TrainingInput::from(f).into_table().unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedInput(_)));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_ragged_frame_rejected() {
        let mut f = frame();
        f.rows[0].pop();
        let err = TrainingInput::from(f).into_table().unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedInput(_)));
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        let empty = TrainingInput::from(Array2::<f64>::zeros((0, 3))).into_table();
        assert!(matches!(empty, Err(ScaffoldError::UnsupportedInput(_))));

        let nan = TrainingInput::from(array![[1.0, f64::NAN]]).into_table();
        assert!(matches!(nan, Err(ScaffoldError::UnsupportedInput(_))));
    }

    #[test]
    fn test_take_column() {
        let mut f = frame();
        let taken = f.take_column("priors").unwrap();
        assert_eq!(taken, vec![json!(1.5), json!("2")]);
        assert_eq!(f.columns, vec!["age", "sex"]);
        assert_eq!(f.rows[0].len(), 2);
        assert!(f.take_column("missing").is_err());
    }
}
