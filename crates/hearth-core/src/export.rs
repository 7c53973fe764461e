//! CSV export of household transactions
//!
//! Four fixed columns: `date,amount,category,description`, oldest first,
//! with "Uncategorized" standing in for a missing category.

use std::io::Write;

use rusqlite::params;
use serde::Serialize;

use crate::context::RequestContext;
use crate::db::Database;
use crate::error::Result;
use crate::models::Period;

/// Header written at the top of every export
pub const EXPORT_HEADER: [&str; 4] = ["date", "amount", "category", "description"];

/// One exported line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub description: String,
}

impl Database {
    /// Rows for a period in ascending date order
    pub fn export_rows(&self, ctx: &RequestContext, period: &Period) -> Result<Vec<ExportRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.date, t.amount, COALESCE(c.name, 'Uncategorized'), t.description
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.household_id = ? AND t.date >= ? AND t.date < ?
            ORDER BY t.date ASC, t.id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![
                    ctx.household_id,
                    period.start().to_string(),
                    period.end_exclusive().to_string()
                ],
                |row| {
                    Ok(ExportRow {
                        date: row.get(0)?,
                        amount: row.get(1)?,
                        category: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Write a period's transactions as CSV, returning the row count
    pub fn export_csv<W: Write>(
        &self,
        ctx: &RequestContext,
        period: &Period,
        writer: W,
    ) -> Result<usize> {
        let rows = self.export_rows(ctx, period)?;

        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(EXPORT_HEADER)?;
        for row in &rows {
            csv.write_record([
                row.date.as_str(),
                &format!("{:.2}", row.amount),
                row.category.as_str(),
                row.description.as_str(),
            ])?;
        }
        csv.flush()?;

        Ok(rows.len())
    }
}
