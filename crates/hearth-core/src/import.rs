//! CSV import: decoding, cell parsing and the row parser
//!
//! The row parser turns mapped raw cells into typed transaction drafts. Rows
//! whose date or amount cannot be parsed are skipped and counted, never
//! treated as a fatal error.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::categories::{derive_tags, has_payment_keyword, infer_category};
use crate::error::{Error, Result};
use crate::format::{BankDialect, Field, FormatDetection};
use crate::models::round_cents;
use crate::normalize::{derive_vendor, normalize_description, normalize_text};

/// Date formats tried in order; first match wins
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2026-01-15
    "%m/%d/%Y", // 01/15/2026
    "%m/%d/%y", // 01/15/26
    "%d/%m/%Y", // 15/01/2026
    "%d/%m/%y", // 15/01/26
    "%d %b %Y", // 15 Jan 2026
    "%d %B %Y", // 15 January 2026
];

fn embedded_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\D)([-+]?\d[\d,]*\.\d{1,2})(?:\D|$)").expect("valid regex")
    })
}

/// Decode raw file bytes
///
/// Tries UTF-8 (with or without BOM), then Windows-1252, then Latin-1.
/// Binary or UTF-16 content is rejected with [`Error::Encoding`].
pub fn decode_csv_bytes(bytes: &[u8]) -> Result<String> {
    let text = if let Some(stripped) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        std::str::from_utf8(stripped).ok().map(str::to_string)
    } else {
        None
    };

    let text = text
        .or_else(|| std::str::from_utf8(bytes).ok().map(str::to_string))
        .or_else(|| {
            encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned())
        })
        .unwrap_or_else(|| bytes.iter().map(|&b| b as char).collect());

    if text.contains('\0') {
        return Err(Error::Encoding);
    }
    Ok(text)
}

/// Read CSV text into a cell matrix, dropping rows where every cell is blank
pub fn read_csv_rows(content: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if row.iter().any(|c| !c.trim().is_empty()) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Parse a money cell
///
/// Strips thousands separators and `$`; `(12.50)` means -12.50.
pub fn parse_money(value: &str) -> Option<f64> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }
    let mut cleaned = text.replace([',', '$'], "");
    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() >= 2 {
        cleaned = format!("-{}", &cleaned[1..cleaned.len() - 1]);
    }
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a transaction date, trying each supported format in order
pub fn parse_transaction_date(value: &str) -> Option<NaiveDate> {
    let cleaned = value.trim().replace('.', "");
    if cleaned.is_empty() {
        return None;
    }

    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(&cleaned, fmt)
            .ok()
            // A four-digit year field must not swallow a two-digit year
            .filter(|d| !fmt.contains("%Y") || d.year() >= 1000)
    })
}

/// Pull a decimal amount out of a description
///
/// Returns the amount and the description with the number removed.
pub fn extract_embedded_amount(description: &str) -> Option<(f64, String)> {
    let text = description.trim();
    let captures = embedded_amount_re().captures(text)?;
    let found = captures.get(1)?;
    let amount = parse_money(found.as_str())?;

    let joined = format!("{} {}", &text[..found.start()], &text[found.end()..]);
    let cleaned = joined
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == ' ' || c == '-' || c == '\t')
        .to_string();
    Some((amount, cleaned))
}

/// Signature of a file's shape, used to key saved column mappings
pub fn build_file_signature(filename: &str, header_row: &[String]) -> String {
    let header: Vec<&str> = header_row.iter().map(|c| c.trim()).collect();
    let base = format!("{}|{}", filename.trim().to_lowercase(), header.join("|"));
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hex::encode(hasher.finalize())
}

/// A transaction draft produced by the row parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// Position among the data rows
    pub row_index: usize,
    pub date: NaiveDate,
    /// Rounded to cents
    pub amount: f64,
    pub description: String,
    pub vendor: String,
    pub vendor_key: String,
    pub normalized_description: String,
    /// Heuristic category before the user's category set is consulted
    pub category: String,
    pub tags: Vec<String>,
}

/// Output of [`parse_rows`]
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub rows: Vec<ParsedRow>,
    /// Rows dropped because the date or amount did not parse
    pub skipped: usize,
}

fn mapped_cell(row: &[String], detection: &FormatDetection, field: Field) -> String {
    detection
        .mapping
        .get(field)
        .and_then(|i| row.get(i))
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

/// Resolve the signed amount of a row
fn row_amount(row: &[String], detection: &FormatDetection) -> Option<f64> {
    if detection.mapping.amount.is_some() {
        return parse_money(&mapped_cell(row, detection, Field::Amount));
    }
    let debit = parse_money(&mapped_cell(row, detection, Field::Debit));
    let credit = parse_money(&mapped_cell(row, detection, Field::Credit));
    match (debit, credit) {
        (Some(d), _) => Some(-d.abs()),
        (None, Some(c)) => Some(c.abs()),
        (None, None) => None,
    }
}

/// Parse the data rows of a detected export into transaction drafts
pub fn parse_rows(rows: &[Vec<String>], detection: &FormatDetection) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let amex = detection.dialect == BankDialect::Amex;

    for (row_index, row) in detection.data_rows(rows).iter().enumerate() {
        let date = parse_transaction_date(&mapped_cell(row, detection, Field::Date));
        let raw_category = mapped_cell(row, detection, Field::Category);
        let mapped_vendor = mapped_cell(row, detection, Field::Vendor);
        let mut description = mapped_cell(row, detection, Field::Description);
        let mut normalized = normalize_description(&description);
        let mut amount = row_amount(row, detection);

        if amount.is_none() && amex && has_payment_keyword(&normalized) {
            if let Some((extracted, cleaned)) = extract_embedded_amount(&description) {
                amount = Some(extracted);
                description = cleaned;
                normalized = normalize_description(&description);
            }
        }

        let (date, mut amount) = match (date, amount) {
            (Some(d), Some(a)) => (d, a),
            _ => {
                debug!("Skipping row {}: unparseable date or amount", row_index);
                outcome.skipped += 1;
                continue;
            }
        };

        if amex {
            amount = if has_payment_keyword(&normalized) {
                amount.abs()
            } else {
                -amount.abs()
            };
        }

        let vendor = if mapped_vendor.is_empty() {
            derive_vendor(&description)
        } else {
            mapped_vendor
        };

        outcome.rows.push(ParsedRow {
            row_index,
            date,
            amount: round_cents(amount),
            vendor_key: normalize_text(&vendor),
            category: infer_category(&description, &raw_category, &[]),
            tags: derive_tags(&description),
            normalized_description: normalized,
            description,
            vendor,
        });
    }

    outcome
}
