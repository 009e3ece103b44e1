//! Minimal CSV reading and writing for experiment datasets and cached synthetic sets.

use crate::data::frame::Frame;
use crate::error::{Result, ScaffoldError};
use crate::persistence::atomic_write;
use std::path::Path;

const DELIMITER: char = ',';

/// Read a CSV file with a header row into a [`Frame`], typing each cell.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let columns = split_fields(
        lines
            .next()
            .ok_or_else(|| ScaffoldError::dataset(format!("Empty CSV file: {}", path.display())))?,
    );

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let row: Vec<serde_json::Value> = split_fields(line).iter().map(|s| parse_cell(s)).collect();
        if row.len() != columns.len() {
            return Err(ScaffoldError::dataset(format!(
                "{}: line {} has {} fields, header has {}",
                path.display(),
                i + 2,
                row.len(),
                columns.len()
            )));
        }
        rows.push(row);
    }
    Ok(Frame::new(columns, rows))
}

/// Read a CSV file whose every body cell is numeric.
pub fn read_numeric(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = split_fields(
        lines
            .next()
            .ok_or_else(|| ScaffoldError::dataset(format!("Empty CSV file: {}", path.display())))?,
    );

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let fields = split_fields(line);
        if fields.len() != header.len() {
            return Err(ScaffoldError::dataset(format!(
                "{}: line {} has {} fields, header has {}",
                path.display(),
                i + 2,
                fields.len(),
                header.len()
            )));
        }
        let row = fields
            .iter()
            .map(|f| {
                f.parse::<f64>().map_err(|_| {
                    ScaffoldError::dataset(format!(
                        "{}: line {}: '{f}' is not a number",
                        path.display(),
                        i + 2
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok((header, rows))
}

/// Atomically write a header and pre-formatted rows.
pub fn write_rows<I>(path: &Path, header: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = join_fields(header.iter().map(String::as_str));
    out.push('\n');
    for row in rows {
        out.push_str(&join_fields(row.iter().map(String::as_str)));
        out.push('\n');
    }
    atomic_write(path, out.as_bytes())?;
    Ok(())
}

fn join_fields<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(quote_field).collect::<Vec<_>>().join(",")
}

fn quote_field(field: &str) -> String {
    if field.contains(DELIMITER) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV line, honoring double-quoted fields and `""` escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == DELIMITER && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn parse_cell(s: &str) -> serde_json::Value {
    if s.is_empty() {
        serde_json::Value::Null
    } else if let Ok(i) = s.parse::<i64>() {
        serde_json::Value::Number(i.into())
    } else if let Ok(f) = s.parse::<f64>() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(s.to_string()))
    } else if s == "true" || s == "false" {
        serde_json::Value::Bool(s == "true")
    } else {
        serde_json::Value::String(s.to_string())
    }
}
