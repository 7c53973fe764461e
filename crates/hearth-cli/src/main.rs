//! Hearth CLI - Shared household expense tracking
//!
//! Usage:
//!   hearth init                             Initialize database
//!   hearth import preview --file CSV        Stage a bank export
//!   hearth import confirm <id> --paid-by DK Commit a staged batch
//!   hearth settle summary --month 2026-01   Who owes whom

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use commands::Session;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let session = || Session::open(&cli.db, cli.user.as_deref(), cli.config.as_deref());

    match &cli.command {
        Commands::Init => commands::cmd_init(&session()?),
        Commands::Health => commands::cmd_health(&session()?),
        Commands::Members { action } => {
            let s = session()?;
            match action {
                None | Some(MembersAction::List) => commands::cmd_members_list(&s),
                Some(MembersAction::Add { name }) => commands::cmd_members_add(&s, name),
            }
        }
        Commands::Import { action } => {
            let s = session()?;
            match action {
                ImportAction::Preview {
                    file,
                    show_all,
                    mapping,
                    json,
                } => commands::cmd_import_preview(&s, file, *show_all, mapping, *json),
                ImportAction::Rows { import_id } => commands::cmd_import_rows(&s, import_id),
                ImportAction::Edit {
                    import_id,
                    row,
                    edit,
                } => commands::cmd_import_edit(&s, import_id, *row, edit),
                ImportAction::Bulk {
                    import_id,
                    rows,
                    edit,
                } => commands::cmd_import_bulk(&s, import_id, rows, edit),
                ImportAction::Vendor {
                    import_id,
                    vendor,
                    category,
                } => commands::cmd_import_vendor(&s, import_id, vendor, category),
                ImportAction::Confirm { import_id, paid_by } => {
                    commands::cmd_import_confirm(&s, import_id, paid_by.as_deref())
                }
                ImportAction::Discard { import_id } => commands::cmd_import_discard(&s, import_id),
                ImportAction::Sweep => commands::cmd_import_sweep(&s),
            }
        }
        Commands::Categorize {
            description,
            vendor,
        } => commands::cmd_categorize(&session()?, description, vendor.as_deref()),
        Commands::Transactions { action } => {
            let s = session()?;
            match action {
                None => commands::cmd_transactions_list(&s, &PeriodArgs::default(), None, 50),
                Some(TransactionsAction::List {
                    period,
                    category,
                    limit,
                }) => commands::cmd_transactions_list(&s, period, category.as_deref(), *limit),
                Some(TransactionsAction::Add {
                    date,
                    amount,
                    description,
                    vendor,
                    category,
                    paid_by,
                }) => commands::cmd_transactions_add(
                    &s,
                    date,
                    *amount,
                    description,
                    vendor.as_deref(),
                    category.as_deref(),
                    paid_by.as_deref(),
                ),
                Some(TransactionsAction::Edit {
                    id,
                    date,
                    amount,
                    description,
                    vendor,
                    category,
                    paid_by,
                }) => commands::cmd_transactions_edit(
                    &s,
                    *id,
                    &commands::TransactionChanges {
                        date: date.clone(),
                        amount: *amount,
                        description: description.clone(),
                        vendor: vendor.clone(),
                        category: category.clone(),
                        paid_by: paid_by.clone(),
                    },
                ),
                Some(TransactionsAction::Delete { id }) => commands::cmd_transactions_delete(&s, *id),
                Some(TransactionsAction::Bulk { ids, action }) => {
                    commands::cmd_transactions_bulk(&s, ids, action)
                }
            }
        }
        Commands::Categories { action } => {
            let s = session()?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&s),
                Some(CategoriesAction::Add { name }) => commands::cmd_categories_add(&s, name),
                Some(CategoriesAction::Rename { old_name, new_name }) => {
                    commands::cmd_categories_rename(&s, old_name, new_name)
                }
                Some(CategoriesAction::Delete { name }) => commands::cmd_categories_delete(&s, name),
            }
        }
        Commands::Rules { action } => {
            let s = session()?;
            match action {
                None | Some(RulesAction::List) => commands::cmd_rules_list(&s),
                Some(RulesAction::Retarget { id, category }) => {
                    commands::cmd_rules_retarget(&s, *id, category)
                }
                Some(RulesAction::Enable { id }) => commands::cmd_rules_set_enabled(&s, *id, true),
                Some(RulesAction::Disable { id }) => {
                    commands::cmd_rules_set_enabled(&s, *id, false)
                }
                Some(RulesAction::Delete { id }) => commands::cmd_rules_delete(&s, *id),
            }
        }
        Commands::Summary { period, json } => commands::cmd_summary(&session()?, period, *json),
        Commands::Settle { action } => {
            let s = session()?;
            match action {
                SettleAction::Summary { period, json } => {
                    commands::cmd_settle_summary(&s, period, *json)
                }
                SettleAction::Monthly { from, to } => commands::cmd_settle_monthly(&s, from, to),
                SettleAction::Pay {
                    from,
                    to,
                    amount,
                    date,
                    note,
                } => commands::cmd_settle_pay(
                    &s,
                    from,
                    to,
                    *amount,
                    date.as_deref(),
                    note.as_deref(),
                ),
                SettleAction::Payments { month } => {
                    commands::cmd_settle_payments(&s, month.as_deref())
                }
                SettleAction::DeletePayment { id } => commands::cmd_settle_delete_payment(&s, *id),
            }
        }
        Commands::Export { period, output } => {
            commands::cmd_export(&session()?, period, output.as_deref())
        }
        Commands::Audit { limit } => commands::cmd_audit(&session()?, *limit),
    }
}
