//! Bank export format detection
//!
//! Bank CSV exports arrive in several shapes: with a header row somewhere in
//! the first few lines, Amex-style with a single signed amount column, or
//! CIBC-style with no header at all and separate debit/credit columns. The
//! detector looks at the raw cell matrix once and produces a
//! [`FormatDetection`] that the row parser consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::import::{parse_money, parse_transaction_date};
use crate::normalize::normalize_header_name;

/// How many leading rows are scanned for a header
const HEADER_SCAN_LIMIT: usize = 50;

const DATE_HEADERS: &[&str] = &["date", "transaction date", "date processed"];

/// A transaction field that can be mapped to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Date,
    Description,
    Vendor,
    Amount,
    Debit,
    Credit,
    Category,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Date,
        Field::Description,
        Field::Vendor,
        Field::Amount,
        Field::Debit,
        Field::Credit,
        Field::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Vendor => "vendor",
            Self::Amount => "amount",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field -> 0-based column index
///
/// Columns are always referenced by index, since headerless exports have no
/// names to go by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub vendor: Option<usize>,
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnMapping {
    /// date/description/debit/credit in columns 0..=3
    pub fn positional() -> Self {
        Self {
            date: Some(0),
            description: Some(1),
            debit: Some(2),
            credit: Some(3),
            ..Self::default()
        }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::Date => self.date,
            Field::Description => self.description,
            Field::Vendor => self.vendor,
            Field::Amount => self.amount,
            Field::Debit => self.debit,
            Field::Credit => self.credit,
            Field::Category => self.category,
        }
    }

    pub fn set(&mut self, field: Field, column: Option<usize>) {
        let slot = match field {
            Field::Date => &mut self.date,
            Field::Description => &mut self.description,
            Field::Vendor => &mut self.vendor,
            Field::Amount => &mut self.amount,
            Field::Debit => &mut self.debit,
            Field::Credit => &mut self.credit,
            Field::Category => &mut self.category,
        };
        *slot = column;
    }

    /// True when no field is mapped
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Fill unmapped fields from another mapping
    pub fn fill_from(&mut self, other: &ColumnMapping) {
        for field in Field::ALL {
            if self.get(field).is_none() {
                self.set(field, other.get(field));
            }
        }
    }
}

/// Row shape decided by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedFormat {
    /// Generic header row
    Header,
    /// No header; positional columns
    Headerless,
    /// Header with a single signed amount column
    #[serde(rename = "headered")]
    AmexHeadered,
    /// No header; date, description, debit, credit, then anything
    CibcHeaderless,
}

impl DetectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Headerless => "headerless",
            Self::AmexHeadered => "headered",
            Self::CibcHeaderless => "cibc_headerless",
        }
    }

    pub fn has_header(&self) -> bool {
        matches!(self, Self::Header | Self::AmexHeadered)
    }
}

impl std::str::FromStr for DetectedFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "header" => Ok(Self::Header),
            "headerless" => Ok(Self::Headerless),
            "headered" => Ok(Self::AmexHeadered),
            "cibc_headerless" => Ok(Self::CibcHeaderless),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sign convention of the issuing bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankDialect {
    #[default]
    Default,
    /// Charges may be exported as positive; signs are re-normalized
    Amex,
}

impl BankDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Amex => "amex",
        }
    }
}

/// Result of format detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDetection {
    pub has_header: bool,
    pub mapping: ColumnMapping,
    pub header_row_index: usize,
    pub format: DetectedFormat,
    pub dialect: BankDialect,
}

impl FormatDetection {
    /// The header row, when there is one
    pub fn header_row<'a>(&self, rows: &'a [Vec<String>]) -> Option<&'a [String]> {
        match self.format {
            DetectedFormat::Header | DetectedFormat::AmexHeadered => {
                rows.get(self.header_row_index).map(|r| r.as_slice())
            }
            DetectedFormat::Headerless | DetectedFormat::CibcHeaderless => None,
        }
    }

    /// Rows holding transactions
    pub fn data_rows<'a>(&self, rows: &'a [Vec<String>]) -> &'a [Vec<String>] {
        match self.format {
            DetectedFormat::Header | DetectedFormat::AmexHeadered => {
                rows.get(self.header_row_index + 1..).unwrap_or(&[])
            }
            DetectedFormat::Headerless | DetectedFormat::CibcHeaderless => rows,
        }
    }
}

/// Normalized header name -> column index; later duplicates win
fn header_lookup(row: &[String]) -> HashMap<String, usize> {
    let mut lookup = HashMap::new();
    for (i, cell) in row.iter().enumerate() {
        let name = normalize_header_name(cell);
        if !name.is_empty() {
            lookup.insert(name, i);
        }
    }
    lookup
}

fn first_of(lookup: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| lookup.get(*n).copied())
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.as_str()).unwrap_or("")
}

fn is_numeric_or_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || parse_money(value).is_some()
}

/// Find the header row and build a mapping from its names
///
/// Returns `(has_header, mapping, header_row_index)`. When no header names
/// are recognized, falls back to the positional headerless heuristic on the
/// first row.
pub fn detect_header_and_mapping(rows: &[Vec<String>]) -> (bool, ColumnMapping, usize) {
    if rows.is_empty() {
        return (false, ColumnMapping::default(), 0);
    }

    let header_row_index = rows
        .iter()
        .take(HEADER_SCAN_LIMIT)
        .position(|row| {
            let names: Vec<String> = row
                .iter()
                .map(|c| normalize_header_name(c))
                .filter(|c| !c.is_empty())
                .collect();
            let has = |n: &str| names.iter().any(|c| c == n);
            DATE_HEADERS.iter().any(|d| has(*d))
                && has("amount")
                && (has("description") || has("merchant"))
        })
        .unwrap_or(0);

    let mut header: &[String] = &rows[header_row_index];
    while header.last().is_some_and(|c| c.trim().is_empty()) {
        header = &header[..header.len() - 1];
    }

    let lookup = header_lookup(header);
    let mut mapping = ColumnMapping {
        date: first_of(&lookup, DATE_HEADERS),
        description: first_of(&lookup, &["description", "merchant"]),
        vendor: first_of(&lookup, &["merchant", "vendor", "description"]),
        amount: first_of(&lookup, &["amount"]),
        debit: first_of(&lookup, &["debit"]),
        credit: first_of(&lookup, &["credit"]),
        category: first_of(&lookup, &["category"]),
    };

    let has_header = [
        mapping.date,
        mapping.amount,
        mapping.debit,
        mapping.credit,
        mapping.description,
    ]
    .iter()
    .any(|c| c.is_some());

    if has_header {
        if mapping.amount.is_some() {
            mapping.debit = None;
            mapping.credit = None;
        }
        return (true, mapping, header_row_index);
    }

    let first = &rows[0];
    let debit = cell(first, 2);
    let credit = cell(first, 3);
    let looks_positional = parse_transaction_date(cell(first, 0)).is_some()
        && !cell(first, 1).trim().is_empty()
        && (parse_money(debit).is_some()
            || parse_money(credit).is_some()
            || (debit.trim().is_empty() && credit.trim().is_empty()));

    if looks_positional {
        (false, ColumnMapping::positional(), 0)
    } else {
        (false, ColumnMapping::default(), 0)
    }
}

/// Recognize a CIBC-style headerless export
///
/// Looks at the first row with any non-blank cell, so leading blank rows
/// and trailing extra columns are tolerated.
pub fn detect_cibc_headerless(rows: &[Vec<String>]) -> Option<ColumnMapping> {
    let first: Vec<&str> = rows
        .iter()
        .map(|row| row.iter().map(|c| c.trim()).collect::<Vec<_>>())
        .find(|row| row.iter().any(|c| !c.is_empty()))?;

    if first.len() < 4 {
        return None;
    }

    let matches = parse_transaction_date(first[0]).is_some()
        && !first[1].is_empty()
        && is_numeric_or_blank(first[2])
        && is_numeric_or_blank(first[3]);

    matches.then(ColumnMapping::positional)
}

/// Recognize an Amex-style header with a single signed amount column
pub fn detect_amex_headered(rows: &[Vec<String>], header_row_index: usize) -> Option<ColumnMapping> {
    let header = rows.get(header_row_index)?;
    let lookup = header_lookup(header);

    let amount = first_of(&lookup, &["amount"])?;
    let date = first_of(&lookup, DATE_HEADERS)?;
    let description = first_of(&lookup, &["description", "merchant"])?;

    Some(ColumnMapping {
        date: Some(date),
        description: Some(description),
        vendor: first_of(&lookup, &["merchant", "description"]),
        amount: Some(amount),
        debit: None,
        credit: None,
        category: first_of(&lookup, &["category"]),
    })
}

/// Amex exports name their columns exactly date/description/amount
pub fn detect_dialect(header_row: &[String]) -> BankDialect {
    let names: Vec<String> = header_row.iter().map(|c| normalize_header_name(c)).collect();
    let has = |n: &str| names.iter().any(|c| c == n);
    if has("date") && has("description") && has("amount") {
        BankDialect::Amex
    } else {
        BankDialect::Default
    }
}

/// Decide the format of a CSV export
///
/// `explicit` is the caller-supplied mapping and `saved` the last mapping
/// stored for a file with the same signature. Auto-detected fields win;
/// unmapped fields are filled from `explicit`, then from `saved`.
pub fn detect_format(
    rows: &[Vec<String>],
    explicit: &ColumnMapping,
    saved: Option<&ColumnMapping>,
) -> FormatDetection {
    let (has_header, inferred, header_row_index) = detect_header_and_mapping(rows);

    let dialect = if has_header {
        rows.get(header_row_index)
            .map(|r| detect_dialect(r))
            .unwrap_or_default()
    } else {
        BankDialect::Default
    };

    if has_header {
        if let Some(mapping) = detect_amex_headered(rows, header_row_index) {
            return FormatDetection {
                has_header,
                mapping,
                header_row_index,
                format: DetectedFormat::AmexHeadered,
                dialect,
            };
        }
    } else if explicit.is_empty() {
        if let Some(mapping) = detect_cibc_headerless(rows) {
            return FormatDetection {
                has_header,
                mapping,
                header_row_index: 0,
                format: DetectedFormat::CibcHeaderless,
                dialect,
            };
        }
    }

    let mut mapping = inferred;
    mapping.fill_from(explicit);
    if let Some(saved) = saved {
        mapping.fill_from(saved);
    }

    FormatDetection {
        has_header,
        mapping,
        header_row_index,
        format: if has_header {
            DetectedFormat::Header
        } else {
            DetectedFormat::Headerless
        },
        dialect,
    }
}
