//! Flattening of decoded JSON documents into CSV tables.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use serde_json::{Map, Value};

/// A JSON object treated as one table row.
pub type Record = Map<String, Value>;

/// Pulls the list of row objects out of a decoded document.
///
/// A top-level array is used as is (non-object items are dropped). An
/// object contributes its first array-valued field, or is itself the only
/// row when it has none.
pub fn extract_records(doc: &Value) -> Vec<Record> {
    match doc {
        Value::Array(items) => objects(items),
        Value::Object(map) => match map.values().find_map(Value::as_array) {
            Some(items) => objects(items),
            None => vec![map.clone()],
        },
        _ => Vec::new(),
    }
}

fn objects(items: &[Value]) -> Vec<Record> {
    items.iter().filter_map(Value::as_object).cloned().collect()
}

/// Union of record keys, in first-seen order.
pub fn columns(records: &[Record]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for r in records {
        for k in r.keys() {
            if !cols.iter().any(|c| c == k) {
                cols.push(k.clone());
            }
        }
    }
    cols
}

/// Renders a JSON value as a CSV cell.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Writes records as CSV with a header of [`columns`].
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_records_csv(records: &[Record], writer: impl Write) -> io::Result<()> {
    let cols = columns(records);
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(&cols)?;
    for r in records {
        wtr.write_record(cols.iter().map(|c| cell(r.get(c))))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes records to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an `io::Error` if the directory or file cannot be written.
pub fn export_records_csv(records: &[Record], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_records_csv(records, io::BufWriter::new(file))
}
