use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::models::Lot;

/// One structural problem with a candidate lot. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub index: usize,
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lot {}: {} {}", self.index, self.field, self.message)
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"))
}

/// Checks every lot and returns every problem found, in lot order.
pub fn validate_lots(lots: &[Lot]) -> Vec<ValidationError> {
    lots.iter()
        .enumerate()
        .flat_map(|(i, lot)| validate_lot(i + 1, lot))
        .collect()
}

pub fn validate_lot(index: usize, lot: &Lot) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !date_pattern().is_match(&lot.date) {
        errors.push(ValidationError {
            index,
            field: "date",
            message: format!("must be YYYY-MM-DD, got '{}'", lot.date),
        });
    } else if NaiveDate::parse_from_str(&lot.date, "%Y-%m-%d").is_err() {
        errors.push(ValidationError {
            index,
            field: "date",
            message: format!("'{}' is not a calendar date", lot.date),
        });
    }

    if !lot.qty.is_finite() || lot.qty == 0.0 {
        errors.push(ValidationError {
            index,
            field: "qty",
            message: "must be a non-zero number".to_string(),
        });
    }

    if !lot.price_per_unit.is_finite() || lot.price_per_unit <= 0.0 {
        errors.push(ValidationError {
            index,
            field: "price_per_unit",
            message: format!("must be greater than zero, got {}", lot.price_per_unit),
        });
    }

    errors
}
