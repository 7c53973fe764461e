//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Session setup, init, health, household members, categorize
//! - `import` - Staged CSV import (preview, edit, confirm, discard)
//! - `transactions` - Transaction commands (list, add, edit, delete, bulk)
//! - `categories` - Category management
//! - `rules` - Learned rule management
//! - `settle` - Settlement summary, monthly breakdown and repayments
//! - `export` - CSV export and audit log

pub mod categories;
pub mod core;
pub mod export;
pub mod import;
pub mod rules;
pub mod settle;
pub mod transactions;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use export::*;
pub use import::*;
pub use rules::*;
pub use settle::*;
pub use transactions::*;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use hearth_core::models::{Party, Period};

use crate::cli::PeriodArgs;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Red for money out, green for money in
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("\x1b[31m${:.2}\x1b[0m", amount.abs())
    } else {
        format!("\x1b[32m+${:.2}\x1b[0m", amount)
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (use YYYY-MM-DD)", value))
}

/// "DK" or "YZ"; an empty string means no payer
pub fn parse_party(value: &str) -> Result<Option<Party>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e: String| anyhow::anyhow!(e))
}

pub fn parse_month(value: &str) -> Result<Period> {
    Period::parse_month(value).map_err(|e| anyhow::anyhow!(e))
}

/// Turn period flags into a period; defaults to the current month
pub fn resolve_period(args: &PeriodArgs) -> Result<Period> {
    match (&args.month, &args.from, &args.to) {
        (Some(month), _, _) => parse_month(month),
        (None, Some(from), Some(to)) => {
            let start = parse_date(from)?;
            let end = parse_date(to)?;
            if end < start {
                anyhow::bail!("--to ({}) is before --from ({})", end, start);
            }
            Ok(Period::Range { start, end })
        }
        (None, None, None) => Ok(Period::month_of(Local::now().date_naive())),
        _ => anyhow::bail!("--from and --to must be given together"),
    }
}
