//! Settlement aggregates and repayment records
//!
//! Sums are taken over the household's spending rows (negative amounts)
//! within a half-open date window. `None` bounds leave that side open, which
//! is how opening balances are computed: everything before the period.

use chrono::NaiveDate;
use rusqlite::{params, Connection, ToSql};
use tracing::info;

use super::{party_column, Database};
use crate::categories::{CREDIT_CARD_PAYMENTS_CATEGORY, PERSONAL_CATEGORY, PET_CATEGORIES};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::{round_cents, NewSettlementPayment, Period, SettlementPayment};
use crate::settlement::{
    balance_of, chain_months, summarize, MonthlySettlement, RepaymentTotals, SettlementSummary,
    SettlementTotals,
};

/// Upper bound on the number of months in one breakdown
const MAX_BREAKDOWN_MONTHS: usize = 240;

fn pet_list() -> String {
    PET_CATEGORIES
        .iter()
        .map(|c| format!("'{}'", c.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `AND date >= ? AND date < ?` for whichever bounds are present
fn window_clause(
    column: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    params: &mut Vec<Box<dyn ToSql>>,
) -> String {
    let mut clause = String::new();
    if let Some(start) = start {
        clause.push_str(&format!(" AND {} >= ?", column));
        params.push(Box::new(start.to_string()));
    }
    if let Some(end) = end {
        clause.push_str(&format!(" AND {} < ?", column));
        params.push(Box::new(end.to_string()));
    }
    clause
}

fn spending_totals(
    conn: &Connection,
    household_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<SettlementTotals> {
    let pets = pet_list();
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(household_id)];
    let window = window_clause("t.date", start, end, &mut params);

    let sql = format!(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN t.paid_by = 'DK' AND {shared} THEN ROUND(ABS(t.amount), 2) END), 0),
            COALESCE(SUM(CASE WHEN t.paid_by = 'YZ' AND {shared} THEN ROUND(ABS(t.amount), 2) END), 0),
            COALESCE(SUM(CASE WHEN t.paid_by = 'DK' AND {pet} THEN ROUND(ABS(t.amount), 2) END), 0),
            COALESCE(SUM(CASE WHEN t.paid_by = 'YZ' AND {pet} THEN ROUND(ABS(t.amount), 2) END), 0),
            COALESCE(SUM(CASE WHEN ({shared} OR {pet})
                              AND (t.paid_by IS NULL OR TRIM(t.paid_by) = '') THEN 1 END), 0)
        FROM transactions t
        LEFT JOIN categories c ON c.id = t.category_id
        WHERE t.household_id = ? AND t.amount < 0{window}
        "#,
        shared = format!(
            "(t.is_transfer = 0 AND COALESCE(c.name, '') NOT IN ('{personal}', '{ccp}', {pets}))",
            personal = PERSONAL_CATEGORY,
            ccp = CREDIT_CARD_PAYMENTS_CATEGORY,
            pets = pets
        ),
        pet = format!("(COALESCE(c.name, '') IN ({}))", pets),
        window = window,
    );

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let totals = conn.query_row(&sql, param_refs.as_slice(), |row| {
        Ok(SettlementTotals {
            dk_shared: round_cents(row.get(0)?),
            yz_shared: round_cents(row.get(1)?),
            pet_paid_by_dk: round_cents(row.get(2)?),
            pet_paid_by_yz: round_cents(row.get(3)?),
            missing_paid_by_count: row.get(4)?,
        })
    })?;

    Ok(totals)
}

fn repayment_totals(
    conn: &Connection,
    household_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<RepaymentTotals> {
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(household_id)];
    let window = window_clause("date", start, end, &mut params);

    let sql = format!(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN from_person = 'DK' AND to_person = 'YZ' THEN amount END), 0),
            COALESCE(SUM(CASE WHEN from_person = 'YZ' AND to_person = 'DK' THEN amount END), 0)
        FROM settlement_payments
        WHERE household_id = ?{}
        "#,
        window
    );

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let totals = conn.query_row(&sql, param_refs.as_slice(), |row| {
        Ok(RepaymentTotals {
            dk_to_yz: round_cents(row.get(0)?),
            yz_to_dk: round_cents(row.get(1)?),
        })
    })?;

    Ok(totals)
}

/// Balance carried into a period: everything strictly before `start`
fn opening_balance(conn: &Connection, household_id: i64, start: NaiveDate) -> Result<f64> {
    let totals = spending_totals(conn, household_id, None, Some(start))?;
    let repayments = repayment_totals(conn, household_id, None, Some(start))?;
    Ok(balance_of(&totals, &repayments))
}

fn row_to_payment(row: &rusqlite::Row) -> rusqlite::Result<SettlementPayment> {
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SettlementPayment {
        id: row.get(0)?,
        household_id: row.get(1)?,
        date,
        from_person: party_column(row, 3)?,
        to_person: party_column(row, 4)?,
        amount: row.get(5)?,
        note: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Settlement for one period, opening at the balance carried from before it
    pub fn settlement_summary(&self, ctx: &RequestContext, period: &Period) -> Result<SettlementSummary> {
        let conn = self.conn()?;
        let start = period.start();
        let end = period.end_exclusive();

        let opening = opening_balance(&conn, ctx.household_id, start)?;
        let totals = spending_totals(&conn, ctx.household_id, Some(start), Some(end))?;
        let repayments = repayment_totals(&conn, ctx.household_id, Some(start), Some(end))?;

        Ok(summarize(period.label(), opening, &totals, &repayments))
    }

    /// Month-by-month settlement from `start` through `end`, inclusive
    ///
    /// Each month opens at the previous month's closing balance.
    pub fn monthly_breakdown(
        &self,
        ctx: &RequestContext,
        start: Period,
        end: Period,
    ) -> Result<Vec<MonthlySettlement>> {
        if !matches!(start, Period::Month { .. }) || !matches!(end, Period::Month { .. }) {
            return Err(Error::InvalidData("Breakdown bounds must be months".into()));
        }
        if end.start() < start.start() {
            return Err(Error::InvalidData(format!(
                "Breakdown ends ({}) before it starts ({})",
                end, start
            )));
        }

        let conn = self.conn()?;
        let opening = opening_balance(&conn, ctx.household_id, start.start())?;

        let mut months = Vec::new();
        let mut current = Some(start);
        while let Some(month) = current {
            if month.start() > end.start() {
                break;
            }
            if months.len() >= MAX_BREAKDOWN_MONTHS {
                return Err(Error::InvalidData(format!(
                    "Breakdown is limited to {} months",
                    MAX_BREAKDOWN_MONTHS
                )));
            }
            let (from, to) = (month.start(), month.end_exclusive());
            months.push((
                month.label(),
                spending_totals(&conn, ctx.household_id, Some(from), Some(to))?,
                repayment_totals(&conn, ctx.household_id, Some(from), Some(to))?,
            ));
            current = month.next_month();
        }

        Ok(chain_months(opening, &months))
    }

    /// Record a repayment between the two parties
    pub fn record_payment(&self, ctx: &RequestContext, payment: &NewSettlementPayment) -> Result<SettlementPayment> {
        if payment.from_person == payment.to_person {
            return Err(Error::InvalidData(
                "A repayment must go between two different people".into(),
            ));
        }
        if !payment.amount.is_finite() || round_cents(payment.amount) <= 0.0 {
            return Err(Error::InvalidData("Repayment amount must be positive".into()));
        }

        let conn = self.conn()?;
        let note = payment
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        conn.execute(
            r#"
            INSERT INTO settlement_payments (household_id, date, from_person, to_person, amount, note)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                ctx.household_id,
                payment.date.to_string(),
                payment.from_person.as_str(),
                payment.to_person.as_str(),
                round_cents(payment.amount),
                note,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(
            "Recorded repayment {} -> {} of {:.2} on {}",
            payment.from_person, payment.to_person, payment.amount, payment.date
        );

        let recorded = conn.query_row(
            r#"
            SELECT id, household_id, date, from_person, to_person, amount, note, created_at
            FROM settlement_payments WHERE id = ?
            "#,
            params![id],
            row_to_payment,
        )?;
        Ok(recorded)
    }

    /// Repayments for the household, newest first, optionally within a period
    pub fn list_payments(&self, ctx: &RequestContext, period: Option<&Period>) -> Result<Vec<SettlementPayment>> {
        let conn = self.conn()?;
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(ctx.household_id)];
        let window = match period {
            Some(p) => window_clause("date", Some(p.start()), Some(p.end_exclusive()), &mut params),
            None => String::new(),
        };

        let sql = format!(
            r#"
            SELECT id, household_id, date, from_person, to_person, amount, note, created_at
            FROM settlement_payments
            WHERE household_id = ?{}
            ORDER BY date DESC, id DESC
            "#,
            window
        );
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let payments = stmt
            .query_map(param_refs.as_slice(), row_to_payment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(payments)
    }

    /// Delete a repayment
    pub fn delete_payment(&self, ctx: &RequestContext, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM settlement_payments WHERE id = ? AND household_id = ?",
            params![id, ctx.household_id],
        )?;
        Ok(deleted > 0)
    }
}
