//! CSV input and output for the command-line front end.

use std::path::Path;

/// Headers plus rows of text cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads a CSV file whose first record is the header row. Ragged rows are kept as-is.
pub fn read_csv(path: &Path) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| format!("Unable to open {}: {}", path.display(), e))?;

    let headers = reader
        .headers()
        .map_err(|e| format!("Unable to read headers of {}: {}", path.display(), e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("CSV read error in {}: {}", path.display(), e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}

/// Writes headers and rows to a CSV file.
pub fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| format!("Unable to create {}: {}", path.display(), e))?;

    writer
        .write_record(headers)
        .map_err(|e| format!("CSV write error: {}", e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| format!("CSV write error: {}", e))?;
    }
    writer.flush().map_err(|e| format!("CSV write error: {}", e))
}
