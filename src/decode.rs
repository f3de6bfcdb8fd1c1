//! Decoding of uploaded batch files into customer records.

use crate::errors::AppError;
use crate::models::CustomerRecord;
use calamine::{open_workbook_from_rs, Reader, Xlsx};
use std::io::{Cursor, Read};
use std::path::Path;

/// Upload formats accepted by the batch loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    /// Picks the format from the file extension.
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(UploadFormat::Csv),
            Some("xlsx") => Ok(UploadFormat::Xlsx),
            _ => Err(AppError::Decode(format!(
                "unsupported file '{}', expected .csv or .xlsx",
                filename
            ))),
        }
    }
}

/// Decodes an uploaded file into records, dispatching on its extension.
pub fn decode_upload(filename: &str, bytes: &[u8]) -> Result<Vec<CustomerRecord>, AppError> {
    let records = match UploadFormat::from_filename(filename)? {
        UploadFormat::Csv => decode_csv(bytes)?,
        UploadFormat::Xlsx => decode_csv(xlsx_to_csv(bytes)?.as_slice())?,
    };

    tracing::info!("Decoded {} row(s) from {}", records.len(), filename);
    Ok(records)
}

/// Decodes CSV with a header row. Extra columns are ignored.
pub fn decode_csv<R: Read>(reader: R) -> Result<Vec<CustomerRecord>, AppError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<CustomerRecord>().enumerate() {
        let record = result.map_err(|e| AppError::Decode(describe_csv_error(idx + 1, &e)))?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(AppError::Decode("file contains no customer rows".to_string()));
    }

    Ok(records)
}

/// Re-encodes the first worksheet as CSV so both formats share one decoder.
fn xlsx_to_csv(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::Decode(format!("not a readable spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Decode("spreadsheet has no worksheets".to_string()))?
        .map_err(|e| AppError::Decode(format!("could not read first worksheet: {}", e)))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        writer
            .write_record(&cells)
            .map_err(|e| AppError::Decode(format!("could not convert spreadsheet: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Decode(format!("could not convert spreadsheet: {}", e)))
}

fn describe_csv_error(row: usize, err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("row {}, column {}: {}", row, field + 1, err.kind()),
            None => format!("row {}: {}", row, err.kind()),
        },
        _ => format!("row {}: {}", row, err),
    }
}
