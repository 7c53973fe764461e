//! Spending summary and settlement command implementations

use anyhow::{Context, Result};
use chrono::Local;
use hearth_core::models::NewSettlementPayment;
use hearth_core::settlement::Settlement;

use super::{parse_date, parse_month, parse_party, resolve_period, truncate, Session};
use crate::cli::PeriodArgs;

fn outcome_line(outcome: &Settlement) -> String {
    match outcome {
        Settlement::Settled => "✅ Settled".to_string(),
        owes => format!("💸 {}", owes),
    }
}

pub fn cmd_summary(s: &Session, period: &PeriodArgs, json: bool) -> Result<()> {
    let period = resolve_period(period)?;
    let summary = s.db.spending_summary(&s.ctx, &period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("📊 Spending for {}", summary.period);
    println!("   ─────────────────────────────────────────────");
    if summary.categories.is_empty() {
        println!("   No spending recorded.");
    }
    for category in &summary.categories {
        println!(
            "   {:<26} {:>10.2}  ({})",
            truncate(&category.category, 26),
            category.total,
            category.transaction_count
        );
    }
    println!("   ─────────────────────────────────────────────");
    println!("   {:<26} {:>10.2}", "Shared total", summary.shared_total);
    println!("   {:<26} {:>10.2}", "Total (excl. transfers)", summary.total);

    Ok(())
}

pub fn cmd_settle_summary(s: &Session, period: &PeriodArgs, json: bool) -> Result<()> {
    let period = resolve_period(period)?;
    let summary = s.db.settlement_summary(&s.ctx, &period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("⚖️  Settlement for {}", summary.period);
    println!("   ─────────────────────────────");
    println!("   Opening balance:     {:>10.2}", summary.opening_balance);
    println!("   Shared paid by DK:   {:>10.2}", summary.dk_shared);
    println!("   Shared paid by YZ:   {:>10.2}", summary.yz_shared);
    println!("   Each share:          {:>10.2}", summary.each_share);
    println!("   Pet paid by DK:      {:>10.2}", summary.pet_paid_by_dk);
    println!("   Pet paid by YZ:      {:>10.2}", summary.pet_paid_by_yz);
    println!("   Repayments DK → YZ:  {:>10.2}", summary.repayments_dk_to_yz);
    println!("   Repayments YZ → DK:  {:>10.2}", summary.repayments_yz_to_dk);
    println!("   Closing balance:     {:>10.2}", summary.closing_balance);
    println!();
    println!("   {}", outcome_line(&summary.outcome));

    if summary.missing_paid_by_count > 0 {
        println!();
        println!(
            "   ⚠️  {} transactions have no payer and were left out.",
            summary.missing_paid_by_count
        );
    }

    Ok(())
}

pub fn cmd_settle_monthly(s: &Session, from: &str, to: &str) -> Result<()> {
    let months = s
        .db
        .monthly_breakdown(&s.ctx, parse_month(from)?, parse_month(to)?)?;

    println!();
    println!("📅 Monthly settlement {} to {}", from, to);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:<8} │ {:>10} │ {:>10} │ {:>10} │ {:>10} │ {:>10}",
        "Month", "Opening", "Shared", "Pet", "Repaid", "Closing"
    );
    for month in months {
        println!(
            "   {:<8} │ {:>10.2} │ {:>10.2} │ {:>10.2} │ {:>10.2} │ {:>10.2}  {}",
            month.month,
            month.opening_balance,
            month.shared_delta,
            month.pet_delta,
            month.repayment_effect,
            month.closing_balance,
            month.outcome
        );
    }

    Ok(())
}

pub fn cmd_settle_pay(
    s: &Session,
    from: &str,
    to: &str,
    amount: f64,
    date: Option<&str>,
    note: Option<&str>,
) -> Result<()> {
    let from_person = parse_party(from)?.context("--from must be DK or YZ")?;
    let to_person = parse_party(to)?.context("--to must be DK or YZ")?;
    let date = match date {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };

    let payment = s.db.record_payment(
        &s.ctx,
        &NewSettlementPayment {
            date,
            from_person,
            to_person,
            amount,
            note: note.map(str::to_string),
        },
    )?;

    println!(
        "✅ Recorded repayment {}: {} paid {} ${:.2} on {}",
        payment.id, payment.from_person, payment.to_person, payment.amount, payment.date
    );
    Ok(())
}

pub fn cmd_settle_payments(s: &Session, month: Option<&str>) -> Result<()> {
    let period = month.map(parse_month).transpose()?;
    let payments = s.db.list_payments(&s.ctx, period.as_ref())?;

    if payments.is_empty() {
        println!("No repayments recorded.");
        return Ok(());
    }

    println!();
    println!("💸 Repayments");
    println!("   ─────────────────────────────");
    for payment in payments {
        println!(
            "   [{}] {} │ {} → {} │ ${:>9.2} │ {}",
            payment.id,
            payment.date,
            payment.from_person,
            payment.to_person,
            payment.amount,
            payment.note.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub fn cmd_settle_delete_payment(s: &Session, id: i64) -> Result<()> {
    if !s.db.delete_payment(&s.ctx, id)? {
        anyhow::bail!("Repayment {} not found", id);
    }
    println!("🗑️  Deleted repayment {}", id);
    Ok(())
}
