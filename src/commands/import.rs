use anyhow::{anyhow, Context};
use log::warn;
use std::fs;
use std::path::PathBuf;

use crate::ingest::{self, ExportFormat, RowIssue};
use crate::ledger::{ImportMode, ImportSummary, Ledger};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Ledger key for the imported lots; defaults to the lowercased symbol.
    pub token_id: Option<String>,
    /// Asset symbol; defaults to the one found in the file. When `filter` is
    /// unset it also acts as the row filter, so it must match the symbol the
    /// export uses (`BTC` for a `BTCUSDT` pair).
    pub symbol: Option<String>,
    /// Keep only rows for this symbol.
    pub filter: Option<String>,
    pub mode: ImportMode,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            token_id: None,
            symbol: None,
            filter: None,
            mode: ImportMode::Merge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub format: ExportFormat,
    pub summary: ImportSummary,
    pub warnings: Vec<RowIssue>,
}

pub fn import_transactions(
    file: &PathBuf,
    ledger: &mut Ledger,
    options: &ImportOptions,
) -> anyhow::Result<ImportReport> {
    let text = fs::read_to_string(file).with_context(|| format!("Error reading file {:?}", file))?;
    import_csv(&text, ledger, options)
}

/// Parses, validates and records an export. Rows with hard errors reject the
/// whole import; an import whose rows were all skipped is rejected as well.
pub fn import_csv(
    csv_text: &str,
    ledger: &mut Ledger,
    options: &ImportOptions,
) -> anyhow::Result<ImportReport> {
    let filter = options.filter.as_deref().or(options.symbol.as_deref());
    let parsed = ingest::parse(csv_text, filter);

    for warning in &parsed.warnings {
        warn!("{}", warning);
    }

    if !parsed.errors.is_empty() {
        let details: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(anyhow!(
            "{} row(s) could not be parsed:\n{}",
            parsed.errors.len(),
            details.join("\n")
        ));
    }
    if parsed.lots.is_empty() {
        return Err(match filter {
            Some(filter) => anyhow!(
                "No importable rows found for symbol {} ({} skipped)",
                filter.trim().to_uppercase(),
                parsed.warnings.len()
            ),
            None => anyhow!("No importable rows found ({} skipped)", parsed.warnings.len()),
        });
    }

    let symbol = options
        .symbol
        .clone()
        .or_else(|| parsed.symbol.clone())
        .ok_or_else(|| anyhow!("Could not detect the asset symbol; pass --symbol"))?
        .to_uppercase();
    let token_id = options
        .token_id
        .clone()
        .or_else(|| ledger.find(&symbol).map(|e| e.token_id.clone()))
        .unwrap_or_else(|| symbol.to_lowercase());

    let summary = ledger.import_lots(&token_id, &symbol, parsed.lots, options.mode)?;

    Ok(ImportReport {
        format: parsed.format,
        summary,
        warnings: parsed.warnings,
    })
}
