//! Transaction CRUD, duplicate detection and bulk actions

use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use tracing::{debug, info, warn};

use super::categories::{category_names, find_category};
use super::rules::learn_rule;
use super::{next_updated_at, party_column, Database};
use crate::categories::{
    derive_tags, is_personal_category, is_transfer_category, is_transfer_transaction,
    TRANSFERS_CATEGORY,
};
use crate::categorize::categorize_on;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::{
    round_cents, BulkAction, Categorization, Category, CategorySource, NewTransaction, Party,
    RuleSource, Transaction, TransactionFilter,
};
use crate::normalize::{derive_vendor, normalize_description, normalize_vendor_key};

const SELECT_TRANSACTION: &str = r#"
    SELECT t.id, t.user_id, t.household_id, t.date, t.amount, t.description, t.vendor,
           t.category_id, c.name, t.is_transfer, t.is_personal, t.paid_by,
           t.category_confidence, t.category_source, t.tags, t.updated_at
    FROM transactions t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(3)?;
    let paid_by = match row.get::<_, Option<String>>(11)? {
        Some(_) => Some(party_column(row, 11)?),
        None => None,
    };
    let source: String = row.get(13)?;
    let tags: String = row.get(14)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        household_id: row.get(2)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        amount: row.get(4)?,
        description: row.get(5)?,
        vendor: row.get(6)?,
        category_id: row.get(7)?,
        category: row.get(8)?,
        is_transfer: row.get(9)?,
        is_personal: row.get(10)?,
        paid_by,
        category_confidence: row.get(12)?,
        category_source: source.parse().unwrap_or_default(),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        updated_at: row.get(15)?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Everything needed to write one transaction row
pub(crate) struct TransactionRecord<'a> {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: &'a str,
    pub vendor: &'a str,
    /// Resolved category; `None` stores the row uncategorized
    pub category: Option<&'a Category>,
    pub paid_by: Option<Party>,
    pub categorization: &'a Categorization,
}

impl TransactionRecord<'_> {
    fn category_name(&self) -> &str {
        self.category.map(|c| c.name.as_str()).unwrap_or("")
    }
}

/// Insert a transaction for the caller's household
pub(crate) fn insert_transaction(
    conn: &Connection,
    ctx: &RequestContext,
    record: &TransactionRecord<'_>,
) -> Result<i64> {
    let category_name = record.category_name();
    let tags = serde_json::to_string(&derive_tags(record.description))?;

    conn.execute(
        r#"
        INSERT INTO transactions (
            user_id, household_id, date, amount, description, vendor, vendor_normalized,
            category_id, is_transfer, is_personal, paid_by, category_confidence,
            category_source, tags, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            ctx.user_id,
            ctx.household_id,
            record.date.to_string(),
            round_cents(record.amount),
            record.description,
            record.vendor,
            normalize_vendor_key(record.vendor),
            record.category.map(|c| c.id),
            is_transfer_transaction(record.description, category_name),
            is_personal_category(category_name),
            record.paid_by.map(|p| p.as_str()),
            record.categorization.confidence,
            record.categorization.source.as_str(),
            tags,
            next_updated_at(None),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Whether the household already has this transaction
///
/// Same date, same amount (to the cent), and a description that is equal
/// after normalization.
pub(crate) fn is_duplicate(
    conn: &Connection,
    household_id: i64,
    date: NaiveDate,
    amount: f64,
    description: &str,
) -> Result<bool> {
    let mut stmt = conn.prepare(
        r#"
        SELECT description FROM transactions
        WHERE household_id = ? AND date = ? AND ABS(amount - ?) < 0.005
        "#,
    )?;
    let wanted = normalize_description(description);
    let descriptions = stmt
        .query_map(
            params![household_id, date.to_string(), round_cents(amount)],
            |row| row.get::<_, String>(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(descriptions
        .iter()
        .any(|d| normalize_description(d) == wanted))
}

fn get_transaction(conn: &Connection, ctx: &RequestContext, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("{} WHERE t.id = ? AND t.household_id = ?", SELECT_TRANSACTION);
    let transaction = conn
        .query_row(&sql, params![id, ctx.household_id], row_to_transaction)
        .optional()?;
    Ok(transaction)
}

fn validate_input(input: &NewTransaction) -> Result<()> {
    if input.description.trim().is_empty() {
        return Err(Error::InvalidData("Description is required".into()));
    }
    if !input.amount.is_finite() || round_cents(input.amount) == 0.0 {
        return Err(Error::InvalidData("Amount must be a non-zero number".into()));
    }
    Ok(())
}

fn vendor_for(input: &NewTransaction) -> String {
    match input.vendor.as_deref().map(str::trim) {
        Some(vendor) if !vendor.is_empty() => vendor.to_string(),
        _ => derive_vendor(&input.description),
    }
}

/// Category for a manual write: the person's choice, else the engine's
///
/// A chosen name that doesn't exist leaves the row uncategorized.
fn resolve_category(
    conn: &Connection,
    ctx: &RequestContext,
    input: &NewTransaction,
    vendor: &str,
) -> Result<(Option<Category>, Categorization)> {
    if let Some(name) = input.category.as_deref().filter(|n| !n.trim().is_empty()) {
        return Ok(match find_category(conn, ctx.user_id, name)? {
            Some(category) => {
                let categorization = Categorization::manual(category.name.clone());
                (Some(category), categorization)
            }
            None => {
                warn!("Unknown category '{}', leaving uncategorized", name);
                (None, Categorization::unknown())
            }
        });
    }

    let available = category_names(conn, ctx.user_id)?;
    let categorization = categorize_on(conn, ctx, &available, &input.description, vendor, "")?;
    match find_category(conn, ctx.user_id, &categorization.category)? {
        Some(category) => Ok((Some(category), categorization)),
        None => Ok((None, Categorization::unknown())),
    }
}

impl Database {
    /// Enter a transaction by hand
    pub fn create_transaction(
        &self,
        ctx: &RequestContext,
        input: &NewTransaction,
    ) -> Result<Transaction> {
        validate_input(input)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let vendor = vendor_for(input);
        let (category, categorization) = resolve_category(&tx, ctx, input, &vendor)?;
        let id = insert_transaction(
            &tx,
            ctx,
            &TransactionRecord {
                date: input.date,
                amount: input.amount,
                description: input.description.trim(),
                vendor: &vendor,
                category: category.as_ref(),
                paid_by: input.paid_by,
                categorization: &categorization,
            },
        )?;
        let created = get_transaction(&tx, ctx, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        tx.commit()?;

        debug!("Created transaction {} ({})", id, categorization.source);
        Ok(created)
    }

    /// Get a transaction visible to the caller's household
    pub fn get_transaction(&self, ctx: &RequestContext, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        get_transaction(&conn, ctx, id)
    }

    /// List household transactions, newest first
    pub fn list_transactions(
        &self,
        ctx: &RequestContext,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut sql = format!("{} WHERE t.household_id = ?", SELECT_TRANSACTION);
        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(ctx.household_id)];

        if let Some(period) = &filter.period {
            sql.push_str(" AND t.date >= ? AND t.date < ?");
            params_vec.push(Box::new(period.start().to_string()));
            params_vec.push(Box::new(period.end_exclusive().to_string()));
        }

        if let Some(name) = filter.category.as_deref() {
            match find_category(&conn, ctx.user_id, name)? {
                Some(category) => {
                    sql.push_str(" AND t.category_id = ?");
                    params_vec.push(Box::new(category.id));
                }
                None => return Ok(Vec::new()),
            }
        }

        sql.push_str(" ORDER BY t.date DESC, t.id DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params_vec.push(Box::new(limit));
        }

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_refs.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Replace a transaction, guarded by the `updated_at` the caller last read
    ///
    /// Fails with [`Error::Conflict`] if someone else wrote the row since.
    /// Choosing a different category teaches a rule for the row's vendor.
    /// A category picked by the engine never does.
    pub fn update_transaction(
        &self,
        ctx: &RequestContext,
        id: i64,
        expected_updated_at: &str,
        input: &NewTransaction,
    ) -> Result<Transaction> {
        validate_input(input)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = get_transaction(&tx, ctx, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        let vendor = vendor_for(input);
        let (category, categorization) = resolve_category(&tx, ctx, input, &vendor)?;
        let category_name = category.as_ref().map(|c| c.name.as_str()).unwrap_or("");
        let description = input.description.trim();

        let updated = tx.execute(
            r#"
            UPDATE transactions
            SET date = ?, amount = ?, description = ?, vendor = ?, vendor_normalized = ?,
                category_id = ?, is_transfer = ?, is_personal = ?, paid_by = ?,
                category_confidence = ?, category_source = ?, tags = ?, updated_at = ?
            WHERE id = ? AND household_id = ? AND updated_at = ?
            "#,
            params![
                input.date.to_string(),
                round_cents(input.amount),
                description,
                vendor,
                normalize_vendor_key(&vendor),
                category.as_ref().map(|c| c.id),
                is_transfer_transaction(description, category_name),
                is_personal_category(category_name),
                input.paid_by.map(|p| p.as_str()),
                categorization.confidence,
                categorization.source.as_str(),
                serde_json::to_string(&derive_tags(description))?,
                next_updated_at(Some(expected_updated_at)),
                id,
                ctx.household_id,
                expected_updated_at,
            ],
        )?;
        if updated == 0 {
            return Err(Error::Conflict);
        }

        let chosen = input
            .category
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if let Some(new_category) = category.as_ref().filter(|_| chosen) {
            if existing.category_id != Some(new_category.id) {
                learn_rule(
                    &tx,
                    ctx,
                    description,
                    &vendor,
                    new_category.id,
                    RuleSource::ManualEdit,
                )?;
            }
        }

        let saved = get_transaction(&tx, ctx, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        tx.commit()?;

        Ok(saved)
    }

    /// Delete a transaction
    pub fn delete_transaction(&self, ctx: &RequestContext, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND household_id = ?",
            params![id, ctx.household_id],
        )?;
        Ok(deleted > 0)
    }

    /// Apply one action to a selection of transactions, all or nothing
    ///
    /// Every id must belong to the caller's household; otherwise nothing is
    /// changed and [`Error::InvalidSelection`] is returned.
    pub fn bulk_action(
        &self,
        ctx: &RequestContext,
        ids: &[i64],
        action: &BulkAction,
    ) -> Result<usize> {
        let mut ids: Vec<i64> = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(Error::InvalidData("No transactions selected".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let selected: Vec<Transaction> = {
            let sql = format!(
                "{} WHERE t.household_id = ? AND t.id IN ({})",
                SELECT_TRANSACTION,
                placeholders(ids.len())
            );
            let mut params_vec: Vec<&dyn ToSql> = vec![&ctx.household_id];
            params_vec.extend(ids.iter().map(|id| id as &dyn ToSql));
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_vec.as_slice(), row_to_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        if selected.len() != ids.len() {
            return Err(Error::InvalidSelection(format!(
                "{} of {} selected transactions are not in this household",
                ids.len() - selected.len(),
                ids.len()
            )));
        }

        let affected = match action {
            BulkAction::Delete => {
                let sql = format!(
                    "DELETE FROM transactions WHERE household_id = ? AND id IN ({})",
                    placeholders(ids.len())
                );
                let mut params_vec: Vec<&dyn ToSql> = vec![&ctx.household_id];
                params_vec.extend(ids.iter().map(|id| id as &dyn ToSql));
                tx.execute(&sql, params_vec.as_slice())?
            }
            BulkAction::SetPaidBy(paid_by) => {
                let mut affected = 0;
                for row in &selected {
                    affected += tx.execute(
                        "UPDATE transactions SET paid_by = ?, updated_at = ? WHERE id = ?",
                        params![
                            paid_by.map(|p| p.as_str()),
                            next_updated_at(Some(&row.updated_at)),
                            row.id
                        ],
                    )?;
                }
                affected
            }
            BulkAction::SetCategory(name) => {
                let category = match name.as_deref().filter(|n| !n.trim().is_empty()) {
                    Some(name) => {
                        let found = find_category(&tx, ctx.user_id, name)?;
                        if found.is_none() {
                            warn!("Unknown category '{}', clearing category", name);
                        }
                        found
                    }
                    None => None,
                };
                let mut learned = HashSet::new();
                let mut affected = 0;
                for row in &selected {
                    affected += set_category(&tx, row, category.as_ref())?;
                    if let Some(category) = &category {
                        if row.category_id != Some(category.id) {
                            let vendor = if row.vendor.is_empty() {
                                derive_vendor(&row.description)
                            } else {
                                row.vendor.clone()
                            };
                            if let Some(rule) = learn_rule(
                                &tx,
                                ctx,
                                &row.description,
                                &vendor,
                                category.id,
                                RuleSource::ManualEdit,
                            )? {
                                learned.insert((rule.key_type, rule.pattern));
                            }
                        }
                    }
                }
                if !learned.is_empty() {
                    debug!("Bulk category change learned {} rule(s)", learned.len());
                }
                affected
            }
            BulkAction::SetTransfer(true) => {
                let transfers = find_category(&tx, ctx.user_id, TRANSFERS_CATEGORY)?;
                let mut affected = 0;
                for row in &selected {
                    if row.category.as_deref().is_some_and(is_transfer_category) {
                        affected += tx.execute(
                            "UPDATE transactions SET is_transfer = 1, is_personal = 0, updated_at = ? WHERE id = ?",
                            params![next_updated_at(Some(&row.updated_at)), row.id],
                        )?;
                    } else {
                        affected += set_category(&tx, row, transfers.as_ref())?;
                        tx.execute(
                            "UPDATE transactions SET is_transfer = 1 WHERE id = ?",
                            params![row.id],
                        )?;
                    }
                }
                affected
            }
            BulkAction::SetTransfer(false) => {
                let mut affected = 0;
                for row in &selected {
                    let category_id = if row.category.as_deref().is_some_and(is_transfer_category) {
                        None
                    } else {
                        row.category_id
                    };
                    let (confidence, source) = if category_id.is_none() {
                        (25, CategorySource::Unknown)
                    } else {
                        (row.category_confidence, row.category_source)
                    };
                    affected += tx.execute(
                        r#"
                        UPDATE transactions
                        SET category_id = ?, is_transfer = 0, category_confidence = ?,
                            category_source = ?, updated_at = ?
                        WHERE id = ?
                        "#,
                        params![
                            category_id,
                            confidence,
                            source.as_str(),
                            next_updated_at(Some(&row.updated_at)),
                            row.id
                        ],
                    )?;
                }
                affected
            }
        };

        tx.commit()?;
        info!("Bulk {:?} applied to {} transaction(s)", action, affected);
        Ok(affected)
    }
}

/// Point a row at a category (or none) and refresh its derived fields
fn set_category(conn: &Connection, row: &Transaction, category: Option<&Category>) -> Result<usize> {
    let category_name = category.map(|c| c.name.as_str()).unwrap_or("");
    let categorization = match category {
        Some(c) => Categorization::manual(c.name.clone()),
        None => Categorization::unknown(),
    };
    let updated = conn.execute(
        r#"
        UPDATE transactions
        SET category_id = ?, is_transfer = ?, is_personal = ?, category_confidence = ?,
            category_source = ?, updated_at = ?
        WHERE id = ?
        "#,
        params![
            category.map(|c| c.id),
            is_transfer_transaction(&row.description, category_name),
            is_personal_category(category_name),
            categorization.confidence,
            categorization.source.as_str(),
            next_updated_at(Some(&row.updated_at)),
            row.id
        ],
    )?;
    Ok(updated)
}
