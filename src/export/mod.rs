//! Row export in union-schema column order

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};

use crate::schema::{Row, Schema};

/// Write rows as CSV with the header in schema order
pub fn write_csv<W: Write>(writer: W, schema: &Schema, rows: &[Row]) -> Result<usize, Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(schema.columns().iter().map(|column| column.name.as_str()))?;

    for row in rows {
        let record: Vec<String> = schema
            .columns()
            .iter()
            .map(|column| value_to_cell(row.get(&column.name).unwrap_or(&Value::Null)))
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(rows.len())
}

/// Write rows to a CSV file
pub fn write_csv_file(
    path: &Path,
    schema: &Schema,
    rows: &[Row],
) -> Result<usize, Box<dyn std::error::Error>> {
    write_csv(File::create(path)?, schema, rows)
}

/// Write rows as a JSON array of objects, fields in schema order
pub fn write_json<W: Write>(
    mut writer: W,
    schema: &Schema,
    rows: &[Row],
) -> Result<usize, Box<dyn std::error::Error>> {
    let ordered: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(schema.len());
            for column in schema.columns() {
                object.insert(
                    column.name.clone(),
                    row.get(&column.name).cloned().unwrap_or(Value::Null),
                );
            }
            Value::Object(object)
        })
        .collect();

    serde_json::to_writer_pretty(&mut writer, &ordered)?;
    writeln!(writer)?;
    Ok(rows.len())
}

/// Write rows to a JSON file
pub fn write_json_file(
    path: &Path,
    schema: &Schema,
    rows: &[Row],
) -> Result<usize, Box<dyn std::error::Error>> {
    write_json(File::create(path)?, schema, rows)
}

/// Render a single cell: null as empty, strings bare, everything else as
/// its JSON text
fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, DataType};
    use serde_json::json;

    fn fixture() -> (Schema, Vec<Row>) {
        let schema = Schema::from_columns(vec![
            Column::new("name", DataType::String),
            Column::new("value", DataType::Int64),
        ]);
        let mut row = Row::new();
        row.insert("name".to_string(), json!("swap"));
        row.insert("value".to_string(), json!(42));
        let mut partial = Row::new();
        partial.insert("name".to_string(), json!("empty"));
        (schema, vec![row, partial])
    }

    #[test]
    fn test_csv_header_order_and_nulls() {
        let (schema, rows) = fixture();
        let mut out = Vec::new();
        let written = write_csv(&mut out, &schema, &rows).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,value");
        assert_eq!(lines[1], "swap,42");
        assert_eq!(lines[2], "empty,");
    }

    #[test]
    fn test_json_field_order() {
        let (schema, rows) = fixture();
        let mut out = Vec::new();
        write_json(&mut out, &schema, &rows).unwrap();

        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["value"], json!(42));
        assert_eq!(parsed[1]["value"], Value::Null);
    }
}
