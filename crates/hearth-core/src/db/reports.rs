//! Spending reports

use rusqlite::{params, Connection};

use super::Database;
use crate::context::RequestContext;
use crate::error::Result;
use crate::models::{round_cents, CategorySpending, Period, SpendingSummary};

fn net_spending(conn: &Connection, household_id: i64, period: &Period, filter: &str) -> Result<f64> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE household_id = ? AND date >= ? AND date < ? {}",
        filter
    );
    let total: f64 = conn.query_row(
        &sql,
        params![
            household_id,
            period.start().to_string(),
            period.end_exclusive().to_string()
        ],
        |row| row.get(0),
    )?;
    Ok(round_cents(-total))
}

impl Database {
    /// Spending per category for a period, with the month and shared totals
    pub fn spending_summary(&self, ctx: &RequestContext, period: &Period) -> Result<SpendingSummary> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(c.name, 'Uncategorized') AS category,
                   -SUM(t.amount) AS total,
                   COUNT(*)
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.household_id = ? AND t.date >= ? AND t.date < ?
              AND t.is_transfer = 0 AND t.is_personal = 0
            GROUP BY COALESCE(c.name, 'Uncategorized')
            ORDER BY total DESC, category
            "#,
        )?;
        let categories = stmt
            .query_map(
                params![
                    ctx.household_id,
                    period.start().to_string(),
                    period.end_exclusive().to_string()
                ],
                |row| {
                    Ok(CategorySpending {
                        category: row.get(0)?,
                        total: round_cents(row.get(1)?),
                        transaction_count: row.get(2)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SpendingSummary {
            period: period.label(),
            total: net_spending(&conn, ctx.household_id, period, "AND is_transfer = 0")?,
            shared_total: net_spending(
                &conn,
                ctx.household_id,
                period,
                "AND is_transfer = 0 AND is_personal = 0",
            )?,
            categories,
        })
    }
}
