//! Transaction command implementations

use anyhow::{Context, Result};
use hearth_core::models::{BulkAction, NewTransaction, TransactionFilter};

use super::{format_amount, parse_date, parse_party, resolve_period, truncate, Session};
use crate::cli::{BulkCommand, PeriodArgs};

/// Fields to change on `transactions edit`; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub paid_by: Option<String>,
}

pub fn cmd_transactions_list(
    s: &Session,
    period: &PeriodArgs,
    category: Option<&str>,
    limit: i64,
) -> Result<()> {
    let period = resolve_period(period)?;
    let transactions = s.db.list_transactions(
        &s.ctx,
        &TransactionFilter {
            period: Some(period),
            category: category.map(str::to_string),
            limit: Some(limit),
        },
    )?;

    if transactions.is_empty() {
        println!("No transactions in {}. Import some with:", period);
        println!("  hearth import preview --file statement.csv");
        return Ok(());
    }

    println!();
    println!("📝 Transactions for {}", period);
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let mut flags = String::new();
        if tx.is_transfer {
            flags.push_str(" [transfer]");
        }
        if tx.is_personal {
            flags.push_str(" [personal]");
        }
        println!(
            "   [{}] {} │ {:>10} │ {:<36} │ {:<22} │ {}{}",
            tx.id,
            tx.date,
            format_amount(tx.amount),
            truncate(&tx.description, 36),
            truncate(tx.category.as_deref().unwrap_or("Uncategorized"), 22),
            tx.paid_by.map(|p| p.to_string()).unwrap_or_else(|| "?".into()),
            flags
        );
    }

    Ok(())
}

pub fn cmd_transactions_add(
    s: &Session,
    date: &str,
    amount: f64,
    description: &str,
    vendor: Option<&str>,
    category: Option<&str>,
    paid_by: Option<&str>,
) -> Result<()> {
    let input = NewTransaction {
        date: parse_date(date)?,
        amount,
        description: description.to_string(),
        vendor: vendor.map(str::to_string),
        category: category.map(str::to_string),
        paid_by: paid_by.map(parse_party).transpose()?.flatten(),
    };
    let tx = s
        .db
        .create_transaction(&s.ctx, &input)
        .context("Failed to add transaction")?;

    println!(
        "✅ Added transaction {}: {} │ {} │ {}",
        tx.id,
        tx.date,
        format_amount(tx.amount),
        tx.category.as_deref().unwrap_or("Uncategorized")
    );
    Ok(())
}

pub fn cmd_transactions_edit(s: &Session, id: i64, changes: &TransactionChanges) -> Result<()> {
    let current = s
        .db
        .get_transaction(&s.ctx, id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", id))?;

    let input = NewTransaction {
        date: match &changes.date {
            Some(d) => parse_date(d)?,
            None => current.date,
        },
        amount: changes.amount.unwrap_or(current.amount),
        description: changes
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone()),
        vendor: Some(
            changes
                .vendor
                .clone()
                .unwrap_or_else(|| current.vendor.clone()),
        ),
        category: match &changes.category {
            Some(name) => Some(name.clone()),
            None => current.category.clone(),
        },
        paid_by: match &changes.paid_by {
            Some(value) => parse_party(value)?,
            None => current.paid_by,
        },
    };

    let updated = s
        .db
        .update_transaction(&s.ctx, id, &current.updated_at, &input)
        .with_context(|| format!("Failed to update transaction {}", id))?;

    println!(
        "✅ Updated transaction {}: {} │ {} │ {}",
        updated.id,
        updated.date,
        format_amount(updated.amount),
        updated.category.as_deref().unwrap_or("Uncategorized")
    );
    Ok(())
}

pub fn cmd_transactions_delete(s: &Session, id: i64) -> Result<()> {
    if !s.db.delete_transaction(&s.ctx, id)? {
        anyhow::bail!("Transaction {} not found", id);
    }
    println!("🗑️  Deleted transaction {}", id);
    Ok(())
}

pub fn cmd_transactions_bulk(s: &Session, ids: &[i64], command: &BulkCommand) -> Result<()> {
    let action = match command {
        BulkCommand::Category { name } => {
            let name = name.trim();
            BulkAction::SetCategory((!name.is_empty()).then(|| name.to_string()))
        }
        BulkCommand::PaidBy { party } => BulkAction::SetPaidBy(parse_party(party)?),
        BulkCommand::Transfer { value } => BulkAction::SetTransfer(*value),
        BulkCommand::Delete => BulkAction::Delete,
    };

    let affected = s.db.bulk_action(&s.ctx, ids, &action)?;
    println!("✅ {} transactions updated", affected);
    Ok(())
}
