//! Normalizes exchange transaction exports into lots.
//!
//! Rows are handled independently: an unparseable row becomes an entry in
//! `errors`, a row that is skipped for a benign reason (missing field,
//! non-trade transaction) becomes an entry in `warnings`, and the import
//! carries on either way.

pub mod formats;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use serde::Serialize;
use std::fmt;

pub use formats::{base_asset, detect_format, ExportFormat};
use formats::{normalize_header, Layout, RowOutcome};

use crate::models::Lot;

/// A problem tied to a 1-based source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub message: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedImport {
    pub format: ExportFormat,
    pub lots: Vec<Lot>,
    /// Lowercased `symbol`, when one is known.
    pub token_id: Option<String>,
    pub symbol: Option<String>,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

impl ParsedImport {
    fn empty(format: ExportFormat) -> Self {
        Self {
            format,
            lots: Vec::new(),
            token_id: None,
            symbol: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Parses CSV export text into lots for a single asset.
///
/// With `target_symbol`, rows for other assets are dropped silently. Without
/// it, the first symbol seen becomes the import's asset and rows for any other
/// symbol are skipped with a warning.
pub fn parse(csv_text: &str, target_symbol: Option<&str>) -> ParsedImport {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes());
    let mut records = rdr.records();

    let headers: Vec<String> = match records.next() {
        Some(Ok(record)) => record.iter().map(normalize_header).collect(),
        Some(Err(e)) => {
            let mut parsed = ParsedImport::empty(ExportFormat::Generic);
            parsed.errors.push(RowIssue {
                line: 1,
                message: format!("unreadable header row: {}", e),
            });
            return parsed;
        }
        None => {
            let mut parsed = ParsedImport::empty(ExportFormat::Generic);
            parsed.errors.push(RowIssue {
                line: 1,
                message: "file is empty".to_string(),
            });
            return parsed;
        }
    };

    let format = detect_format(&headers);
    let layout = Layout::resolve(format, &headers);
    let mut parsed = ParsedImport::empty(format);
    debug!("Detected {:?} export with columns {:?}", format, headers);

    let missing = layout.missing_columns();
    if !missing.is_empty() {
        parsed.errors.push(RowIssue {
            line: 1,
            message: format!("missing required column(s): {}", missing.join(", ")),
        });
        return parsed;
    }

    let target = target_symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());
    let mut symbol = target.clone();

    for (row_number, result) in records.enumerate() {
        // Header is line 1; used when the reader cannot report a position.
        let fallback_line = row_number as u64 + 2;
        let record: StringRecord = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                parsed.errors.push(RowIssue {
                    line,
                    message: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let row = layout.extract(&record);
        // Other assets are dropped before any parsing, so their content never
        // shows up as an error or warning.
        if let (Some(target), Some(row_symbol)) = (&target, row.symbol()) {
            if *target != row_symbol {
                continue;
            }
        }

        match row.into_outcome() {
            RowOutcome::Lot { symbol: row_symbol, lot } => {
                if let (None, Some(row_symbol)) = (&target, row_symbol) {
                    if let Some(current) = &symbol {
                        if *current != row_symbol {
                            parsed.warnings.push(RowIssue {
                                line,
                                message: format!(
                                    "skipped {} row in a {} import; pass a symbol filter to import it",
                                    row_symbol, current
                                ),
                            });
                            continue;
                        }
                    } else {
                        symbol = Some(row_symbol);
                    }
                }
                parsed.lots.push(lot);
            }
            RowOutcome::Skipped(message) => parsed.warnings.push(RowIssue { line, message }),
            RowOutcome::Invalid(message) => parsed.errors.push(RowIssue { line, message }),
        }
    }

    parsed.token_id = symbol.as_ref().map(|s| s.to_lowercase());
    parsed.symbol = symbol;
    parsed
}
