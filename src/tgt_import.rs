// src/tgt_import.rs
//
// Bulk import of the daily TGT sheet. The sheet is tabular CSV: one row
// whose cells are dates, plus two label rows named below. Each date column
// upserts one DailyMetricStore record. Row order is free and extra rows are
// ignored, which is how the exports actually arrive.

use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::stores::{date_key, DailyMetric, DailyMetricStore};

pub const LABEL_SALDATO_TGT: &str = "SALDATO TGT";
pub const LABEL_WO_TGT: &str = "WO TGT";

/// Structured result handed back to whoever drove the import. The sheet is
/// user-selected input, so failure is a rendered message, not a panic or a
/// propagated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub ok: bool,
    pub message: String,
    pub success_count: usize,
}

#[derive(Error, Debug)]
enum SheetError {
    #[error("sheet must contain at least a date row and a data row")]
    TooShort,
    #[error("no row with date cells found")]
    MissingDateHeader,
    #[error("label row '{0}' not found")]
    MissingLabel(&'static str),
    #[error("unreadable sheet: {0}")]
    Csv(#[from] csv::Error),
}

pub fn import_sheet<R: Read>(reader: R, store: &DailyMetricStore) -> ImportOutcome {
    match import_rows(reader, store) {
        Ok(count) => {
            info!("TGT import: {} day columns loaded", count);
            ImportOutcome {
                ok: true,
                message: format!("TGT data loaded for {} days", count),
                success_count: count,
            }
        }
        Err(err) => {
            warn!("TGT import failed: {}", err);
            ImportOutcome {
                ok: false,
                message: err.to_string(),
                success_count: 0,
            }
        }
    }
}

fn import_rows<R: Read>(reader: R, store: &DailyMetricStore) -> Result<usize, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.len() < 2 {
        return Err(SheetError::TooShort);
    }

    let date_row = rows
        .iter()
        .find(|row| row.iter().any(|cell| parse_date_cell(cell).is_some()))
        .ok_or(SheetError::MissingDateHeader)?;
    let saldato_row = find_label_row(&rows, LABEL_SALDATO_TGT)
        .ok_or(SheetError::MissingLabel(LABEL_SALDATO_TGT))?;
    let wo_row =
        find_label_row(&rows, LABEL_WO_TGT).ok_or(SheetError::MissingLabel(LABEL_WO_TGT))?;

    let mut count = 0;
    for (column, cell) in date_row.iter().enumerate() {
        // Same policy as the shift parser: a cell that is not a date is
        // skipped, never a hard failure.
        let Some(date) = parse_date_cell(cell) else {
            continue;
        };
        let metric = DailyMetric {
            saldato_tgt: saldato_row.get(column).and_then(|c| parse_amount(c)),
            wo_tgt: wo_row.get(column).and_then(|c| parse_amount(c)),
        };
        store.merge(&date_key(date), metric);
        count += 1;
    }
    Ok(count)
}

fn find_label_row<'a>(rows: &'a [Vec<String>], label: &str) -> Option<&'a Vec<String>> {
    rows.iter()
        .find(|row| row.iter().any(|cell| cell.trim().eq_ignore_ascii_case(label)))
}

/// Date cells arrive either ISO or in the local day-first convention.
fn parse_date_cell(cell: &str) -> Option<NaiveDate> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}

/// Amount cells may use a decimal comma. Blank or non-numeric cells import
/// as missing.
fn parse_amount(cell: &str) -> Option<Decimal> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_str(&trimmed.replace(',', ".")))
        .ok()
}
