//! Household settlement math
//!
//! Pure functions over aggregated totals; the queries that produce the totals
//! live in `db::settlement`. Balances are signed from DK's point of view:
//! a positive balance means YZ owes DK, a negative one means DK owes YZ.
//!
//! For a period:
//!
//! - shared delta = DK's shared spending minus half the shared total
//! - pet delta = pet spending paid by DK (owed back in full by YZ)
//! - repayment effect = DK→YZ repayments minus YZ→DK repayments
//! - closing = opening + shared delta + pet delta + repayment effect
//!
//! A closing balance within half a cent of zero is reported as settled.

use serde::Serialize;

use crate::models::{round_cents, Party};

/// Residual below which a balance counts as settled
pub const SETTLED_EPSILON: f64 = 0.005;

/// Spending sums for one period, already split by payer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SettlementTotals {
    pub dk_shared: f64,
    pub yz_shared: f64,
    pub pet_paid_by_dk: f64,
    pub pet_paid_by_yz: f64,
    /// Shared-eligible or pet rows with no payer; excluded from the sums
    pub missing_paid_by_count: i64,
}

/// Recorded repayments for one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RepaymentTotals {
    pub dk_to_yz: f64,
    pub yz_to_dk: f64,
}

impl RepaymentTotals {
    pub fn effect(&self) -> f64 {
        round_cents(self.dk_to_yz - self.yz_to_dk)
    }
}

/// Who owes whom after netting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settlement {
    Settled,
    Owes {
        debtor: Party,
        creditor: Party,
        amount: f64,
    },
}

impl Settlement {
    pub fn from_balance(balance: f64) -> Self {
        if balance.abs() <= SETTLED_EPSILON {
            return Self::Settled;
        }
        if balance > 0.0 {
            Self::Owes {
                debtor: Party::Yz,
                creditor: Party::Dk,
                amount: round_cents(balance),
            }
        } else {
            Self::Owes {
                debtor: Party::Dk,
                creditor: Party::Yz,
                amount: round_cents(-balance),
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled)
    }
}

impl std::fmt::Display for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settled => write!(f, "Settled"),
            Self::Owes {
                debtor,
                creditor,
                amount,
            } => write!(f, "{} owes {} ${:.2}", debtor, creditor, amount),
        }
    }
}

/// Period deltas before the opening balance and repayments are applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodDelta {
    pub shared_total: f64,
    pub each_share: f64,
    pub shared_delta: f64,
    pub pet_delta: f64,
    pub period_delta: f64,
}

/// Net obligation created by one period's spending
pub fn period_delta(totals: &SettlementTotals) -> PeriodDelta {
    let shared_total = round_cents(totals.dk_shared + totals.yz_shared);
    let each_share = round_cents(shared_total / 2.0);
    let shared_delta = round_cents(totals.dk_shared - each_share);
    let pet_delta = round_cents(totals.pet_paid_by_dk);
    PeriodDelta {
        shared_total,
        each_share,
        shared_delta,
        pet_delta,
        period_delta: round_cents(shared_delta + pet_delta),
    }
}

/// Balance carried out of everything before a period
pub fn balance_of(totals: &SettlementTotals, repayments: &RepaymentTotals) -> f64 {
    round_cents(period_delta(totals).period_delta + repayments.effect())
}

/// Settlement report for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub period: String,
    pub opening_balance: f64,
    pub dk_shared: f64,
    pub yz_shared: f64,
    pub shared_total: f64,
    pub each_share: f64,
    pub pet_paid_by_dk: f64,
    pub pet_paid_by_yz: f64,
    pub shared_delta: f64,
    pub pet_delta: f64,
    pub period_delta: f64,
    pub repayments_dk_to_yz: f64,
    pub repayments_yz_to_dk: f64,
    pub repayment_effect: f64,
    pub closing_balance: f64,
    pub missing_paid_by_count: i64,
    pub outcome: Settlement,
}

pub fn summarize(
    period: impl Into<String>,
    opening_balance: f64,
    totals: &SettlementTotals,
    repayments: &RepaymentTotals,
) -> SettlementSummary {
    let delta = period_delta(totals);
    let repayment_effect = repayments.effect();
    let closing_balance = round_cents(opening_balance + delta.period_delta + repayment_effect);

    SettlementSummary {
        period: period.into(),
        opening_balance: round_cents(opening_balance),
        dk_shared: round_cents(totals.dk_shared),
        yz_shared: round_cents(totals.yz_shared),
        shared_total: delta.shared_total,
        each_share: delta.each_share,
        pet_paid_by_dk: round_cents(totals.pet_paid_by_dk),
        pet_paid_by_yz: round_cents(totals.pet_paid_by_yz),
        shared_delta: delta.shared_delta,
        pet_delta: delta.pet_delta,
        period_delta: delta.period_delta,
        repayments_dk_to_yz: round_cents(repayments.dk_to_yz),
        repayments_yz_to_dk: round_cents(repayments.yz_to_dk),
        repayment_effect,
        closing_balance,
        missing_paid_by_count: totals.missing_paid_by_count,
        outcome: Settlement::from_balance(closing_balance),
    }
}

/// One row of a month-by-month breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySettlement {
    pub month: String,
    pub opening_balance: f64,
    pub shared_delta: f64,
    pub pet_delta: f64,
    pub repayment_effect: f64,
    pub closing_balance: f64,
    pub missing_paid_by_count: i64,
    pub outcome: Settlement,
}

/// Chain per-month results, each month opening at the previous close
pub fn chain_months(
    opening_balance: f64,
    months: &[(String, SettlementTotals, RepaymentTotals)],
) -> Vec<MonthlySettlement> {
    let mut running = round_cents(opening_balance);
    months
        .iter()
        .map(|(month, totals, repayments)| {
            let summary = summarize(month.clone(), running, totals, repayments);
            running = summary.closing_balance;
            MonthlySettlement {
                month: summary.period,
                opening_balance: summary.opening_balance,
                shared_delta: summary.shared_delta,
                pet_delta: summary.pet_delta,
                repayment_effect: summary.repayment_effect,
                closing_balance: summary.closing_balance,
                missing_paid_by_count: summary.missing_paid_by_count,
                outcome: summary.outcome,
            }
        })
        .collect()
}
