use crate::core::queue::QueuedCandidate;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use std::path::Path;
use thiserror::Error;

/// Column set of the exported sheet
pub const HEADERS: [&str; 7] = [
    "combined_1",
    "combined_2",
    "faiss_score",
    "fuzzy_combined",
    "predicted",
    "confidence",
    "user_validasi",
];

/// Placeholder for cells without a value (e.g. unreviewed rows)
pub const PLACEHOLDER: &str = "-";

const SHEET_NAME: &str = "Matches";

/// Errors that can occur while writing a workbook
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

fn write_rows(worksheet: &mut Worksheet, entries: &[QueuedCandidate]) -> Result<(), WorkbookError> {
    let header_format = Format::new().set_bold().set_align(FormatAlign::Center);
    let percent_format = Format::new().set_num_format("0.00%");

    worksheet.set_name(SHEET_NAME)?;
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    worksheet.set_column_width(0, 40)?;
    worksheet.set_column_width(1, 40)?;

    for (i, entry) in entries.iter().enumerate() {
        let row = i as u32 + 1;
        let candidate = &entry.candidate;

        worksheet.write_string(row, 0, &candidate.combined_key_a)?;
        worksheet.write_string(row, 1, &candidate.combined_key_b)?;
        worksheet.write_number(row, 2, candidate.similarity_score)?;
        worksheet.write_number(row, 3, candidate.fuzzy_score)?;

        match candidate.predicted_label {
            Some(predicted) => worksheet.write_number(row, 4, u8::from(predicted))?,
            None => worksheet.write_string(row, 4, PLACEHOLDER)?,
        };
        match candidate.confidence {
            Some(confidence) => worksheet.write_number_with_format(row, 5, confidence, &percent_format)?,
            None => worksheet.write_string(row, 5, PLACEHOLDER)?,
        };
        match candidate.user_validation {
            Some(label) => worksheet.write_number(row, 6, label.as_flag())?,
            None => worksheet.write_string(row, 6, PLACEHOLDER)?,
        };
    }

    Ok(())
}

fn build(entries: &[QueuedCandidate]) -> Result<Workbook, WorkbookError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_rows(worksheet, entries)?;
    Ok(workbook)
}

/// Render the queue as an xlsx document in memory
pub fn queue_workbook_bytes(entries: &[QueuedCandidate]) -> Result<Vec<u8>, WorkbookError> {
    let mut workbook = build(entries)?;
    Ok(workbook.save_to_buffer()?)
}

/// Write the queue to `path` as an xlsx document
pub fn write_queue_workbook(entries: &[QueuedCandidate], path: &Path) -> Result<(), WorkbookError> {
    let mut workbook = build(entries)?;
    workbook.save(path)?;
    tracing::info!("Wrote {} rows to {}", entries.len(), path.display());
    Ok(())
}
