//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use clap::Parser;
use hearth_core::db::{Database, PreviewOptions};
use hearth_core::models::{NewTransaction, Party, Period, TransactionFilter};
use hearth_core::HearthConfig;

use crate::cli::{BulkCommand, Cli, Commands, ImportAction, MappingArgs, PeriodArgs, StagedEditArgs};
use crate::commands::{self, truncate, Session};

fn setup_session() -> Session {
    let db = Database::in_memory().unwrap();
    Session::with_database(db, HearthConfig::default(), Some("dk")).unwrap()
}

fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn add_spending(s: &Session, date: &str, amount: f64, description: &str, paid_by: Option<Party>) -> i64 {
    s.db.create_transaction(
        &s.ctx,
        &NewTransaction {
            date: commands::parse_date(date).unwrap(),
            amount,
            description: description.to_string(),
            paid_by,
            ..Default::default()
        },
    )
    .unwrap()
    .id
}

fn january() -> PeriodArgs {
    PeriodArgs {
        month: Some("2026-01".into()),
        ..Default::default()
    }
}

const CIBC: &str = "2026-01-05,METRO #123,45.10,,4500********1234\n\
                    2026-01-08,FROMAGERIE HAMEL,22.00,,4500********1234\n";

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_import_preview() {
    let cli = Cli::try_parse_from([
        "hearth",
        "--db",
        "test.db",
        "import",
        "preview",
        "--file",
        "jan.csv",
        "--amount-col",
        "2",
    ])
    .unwrap();
    assert_eq!(cli.db.to_str(), Some("test.db"));
    match cli.command {
        Commands::Import {
            action: ImportAction::Preview { file, mapping, .. },
        } => {
            assert_eq!(file.to_str(), Some("jan.csv"));
            assert_eq!(mapping.amount_col, Some(2));
        }
        _ => panic!("expected import preview"),
    }
}

#[test]
fn test_parse_bulk_row_list() {
    let cli = Cli::try_parse_from([
        "hearth", "import", "bulk", "abc", "--rows", "0,2,5", "--paid-by", "YZ",
    ])
    .unwrap();
    match cli.command {
        Commands::Import {
            action: ImportAction::Bulk { rows, edit, .. },
        } => {
            assert_eq!(rows, vec![0, 2, 5]);
            assert_eq!(edit.paid_by.as_deref(), Some("YZ"));
        }
        _ => panic!("expected import bulk"),
    }
}

#[test]
fn test_parse_summary() {
    let cli = Cli::try_parse_from(["hearth", "summary", "--month", "2026-01", "--json"]).unwrap();
    match cli.command {
        Commands::Summary { period, json } => {
            assert_eq!(period.month.as_deref(), Some("2026-01"));
            assert!(json);
        }
        _ => panic!("expected summary"),
    }
}

#[test]
fn test_parse_month_conflicts_with_range() {
    let result = Cli::try_parse_from([
        "hearth", "export", "--month", "2026-01", "--from", "2026-01-01", "--to", "2026-01-31",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_parse_negative_amount() {
    let cli = Cli::try_parse_from([
        "hearth",
        "transactions",
        "add",
        "--date",
        "2026-01-05",
        "--amount",
        "-12.50",
        "--description",
        "Metro",
    ]);
    assert!(cli.is_ok());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long description here", 10), "a long ...");
    assert_eq!(truncate("CAFÉ DÉPÔT MONTRÉAL", 8), "CAFÉ ...");
}

#[test]
fn test_parse_party() {
    assert_eq!(commands::parse_party("dk").unwrap(), Some(Party::Dk));
    assert_eq!(commands::parse_party("").unwrap(), None);
    assert!(commands::parse_party("XX").is_err());
}

#[test]
fn test_resolve_period() {
    assert_eq!(
        commands::resolve_period(&january()).unwrap(),
        Period::Month {
            year: 2026,
            month: 1
        }
    );

    let range = PeriodArgs {
        month: None,
        from: Some("2026-01-10".into()),
        to: Some("2026-02-09".into()),
    };
    assert!(matches!(
        commands::resolve_period(&range).unwrap(),
        Period::Range { .. }
    ));

    let backwards = PeriodArgs {
        month: None,
        from: Some("2026-02-01".into()),
        to: Some("2026-01-01".into()),
    };
    assert!(commands::resolve_period(&backwards).is_err());

    assert!(matches!(
        commands::resolve_period(&PeriodArgs::default()).unwrap(),
        Period::Month { .. }
    ));
}

// ========== Session Tests ==========

#[test]
fn test_session_uses_config_default_user() {
    let db = Database::in_memory().unwrap();
    let config = HearthConfig {
        default_user: "yz".into(),
        ..Default::default()
    };
    let session = Session::with_database(db, config, None).unwrap();
    assert_eq!(session.ctx.user_name, "yz");
}

#[test]
fn test_session_open_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hearth.db");
    let missing_config = dir.path().join("absent.toml");

    let session = commands::Session::open(&db_path, Some("dk"), Some(&missing_config)).unwrap();
    assert!(db_path.exists());
    assert!(commands::cmd_init(&session).is_ok());
    assert!(commands::cmd_health(&session).is_ok());
}

#[test]
fn test_cmd_members() {
    let s = setup_session();
    assert!(commands::cmd_members_add(&s, "yz").is_ok());
    assert!(commands::cmd_members_list(&s).is_ok());
    assert_eq!(s.db.household_members(&s.ctx).unwrap().len(), 2);
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_workflow() {
    let s = setup_session();
    let dir = tempfile::tempdir().unwrap();
    let file = write_csv(&dir, "cibc.csv", CIBC);

    assert!(commands::cmd_import_preview(&s, &file, false, &MappingArgs::default(), false).is_ok());

    // The command prints the id; stage the same file directly to learn it
    let preview = s
        .db
        .preview_import(&s.ctx, "cibc.csv", CIBC.as_bytes(), &PreviewOptions::default())
        .unwrap();
    let id = preview.import_id;

    let edit = StagedEditArgs {
        category: Some("Groceries".into()),
        ..Default::default()
    };
    assert!(commands::cmd_import_edit(&s, &id, 1, &edit).is_ok());
    assert!(commands::cmd_import_rows(&s, &id).is_ok());

    // No payer anywhere
    let err = commands::cmd_import_confirm(&s, &id, None).unwrap_err();
    assert!(err.to_string().contains("no payer"));

    assert!(commands::cmd_import_confirm(&s, &id, Some("YZ")).is_ok());
    let rows = s
        .db
        .list_transactions(&s.ctx, &TransactionFilter::default())
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|t| t.paid_by == Some(Party::Yz)));

    let err = commands::cmd_import_confirm(&s, &id, Some("YZ")).unwrap_err();
    assert!(err.to_string().contains("expired"));
}

#[test]
fn test_cmd_import_bulk_rejects_bad_party() {
    let s = setup_session();
    let preview = s
        .db
        .preview_import(&s.ctx, "cibc.csv", CIBC.as_bytes(), &PreviewOptions::default())
        .unwrap();

    let edit = StagedEditArgs {
        paid_by: Some("ZZ".into()),
        ..Default::default()
    };
    assert!(commands::cmd_import_bulk(&s, &preview.import_id, &[0, 1], &edit).is_err());
}

#[test]
fn test_cmd_import_vendor_and_discard() {
    let s = setup_session();
    let preview = s
        .db
        .preview_import(&s.ctx, "cibc.csv", CIBC.as_bytes(), &PreviewOptions::default())
        .unwrap();

    assert!(commands::cmd_import_vendor(&s, &preview.import_id, "fromagerie hamel", "Groceries").is_ok());
    let rows = s.db.staged_rows(&s.ctx, &preview.import_id).unwrap();
    assert_eq!(rows[1].categorization.category, "Groceries");

    assert!(commands::cmd_import_discard(&s, &preview.import_id).is_ok());
    assert!(s.db.staged_rows(&s.ctx, &preview.import_id).is_err());
    assert!(commands::cmd_import_sweep(&s).is_ok());
}

#[test]
fn test_cmd_import_preview_missing_file() {
    let s = setup_session();
    let result = commands::cmd_import_preview(
        &s,
        std::path::Path::new("/nonexistent/statement.csv"),
        false,
        &MappingArgs::default(),
        false,
    );
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Failed to read file"));
}

// ========== Transaction Command Tests ==========

#[test]
fn test_cmd_transactions_add_and_list() {
    let s = setup_session();
    let result = commands::cmd_transactions_add(
        &s,
        "2026-01-05",
        -45.10,
        "METRO #123",
        None,
        None,
        Some("DK"),
    );
    assert!(result.is_ok());

    let rows = s
        .db
        .list_transactions(&s.ctx, &TransactionFilter::default())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category.as_deref(), Some("Groceries"));

    assert!(commands::cmd_transactions_list(&s, &january(), None, 50).is_ok());
    assert!(commands::cmd_transactions_list(&s, &january(), Some("Groceries"), 50).is_ok());
}

#[test]
fn test_cmd_transactions_add_bad_date() {
    let s = setup_session();
    let result = commands::cmd_transactions_add(&s, "05/01/2026", -1.0, "X", None, None, None);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("YYYY-MM-DD"));
}

#[test]
fn test_cmd_transactions_edit_keeps_unchanged_fields() {
    let s = setup_session();
    let id = add_spending(&s, "2026-01-05", -45.10, "METRO #123", Some(Party::Dk));

    let changes = commands::TransactionChanges {
        category: Some("Restaurants".into()),
        ..Default::default()
    };
    assert!(commands::cmd_transactions_edit(&s, id, &changes).is_ok());

    let tx = s.db.get_transaction(&s.ctx, id).unwrap().unwrap();
    assert_eq!(tx.category.as_deref(), Some("Restaurants"));
    assert_eq!(tx.amount, -45.10);
    assert_eq!(tx.paid_by, Some(Party::Dk));
}

#[test]
fn test_cmd_transactions_edit_not_found() {
    let s = setup_session();
    let result = commands::cmd_transactions_edit(&s, 999, &Default::default());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_cmd_transactions_bulk_and_delete() {
    let s = setup_session();
    let a = add_spending(&s, "2026-01-05", -10.0, "METRO", None);
    let b = add_spending(&s, "2026-01-06", -20.0, "SHELL", None);

    assert!(commands::cmd_transactions_bulk(
        &s,
        &[a, b],
        &BulkCommand::PaidBy {
            party: "YZ".into()
        }
    )
    .is_ok());
    let tx = s.db.get_transaction(&s.ctx, b).unwrap().unwrap();
    assert_eq!(tx.paid_by, Some(Party::Yz));

    assert!(commands::cmd_transactions_bulk(&s, &[a], &BulkCommand::Transfer { value: true }).is_ok());
    assert!(s.db.get_transaction(&s.ctx, a).unwrap().unwrap().is_transfer);

    assert!(commands::cmd_transactions_delete(&s, a).is_ok());
    assert!(commands::cmd_transactions_delete(&s, a).is_err());
}

// ========== Category and Rule Command Tests ==========

#[test]
fn test_cmd_categories() {
    let s = setup_session();
    assert!(commands::cmd_categories_list(&s).is_ok());
    assert!(commands::cmd_categories_add(&s, "Board Games").is_ok());
    assert!(commands::cmd_categories_rename(&s, "board games", "Games").is_ok());
    assert!(s.db.find_category(&s.ctx, "Games").unwrap().is_some());
    assert!(commands::cmd_categories_delete(&s, "Games").is_ok());
    assert!(commands::cmd_categories_delete(&s, "Games").is_err());
}

#[test]
fn test_cmd_rules() {
    let s = setup_session();
    assert!(commands::cmd_rules_list(&s).is_ok());

    let id = add_spending(&s, "2026-01-05", -45.10, "FROMAGERIE HAMEL", Some(Party::Dk));
    let changes = commands::TransactionChanges {
        category: Some("Groceries".into()),
        ..Default::default()
    };
    commands::cmd_transactions_edit(&s, id, &changes).unwrap();

    let rules = s.db.list_rules(&s.ctx).unwrap();
    assert_eq!(rules.len(), 1);
    let rule_id = rules[0].id;

    assert!(commands::cmd_rules_list(&s).is_ok());
    assert!(commands::cmd_rules_set_enabled(&s, rule_id, false).is_ok());
    assert!(!s.db.list_rules(&s.ctx).unwrap()[0].enabled);
    assert!(commands::cmd_rules_retarget(&s, rule_id, "Restaurants").is_ok());
    assert!(commands::cmd_rules_retarget(&s, rule_id, "No Such Category").is_err());
    assert!(commands::cmd_rules_delete(&s, rule_id).is_ok());
    assert!(commands::cmd_rules_delete(&s, rule_id).is_err());
}

#[test]
fn test_cmd_categorize() {
    let s = setup_session();
    assert!(commands::cmd_categorize(&s, "SHELL STATION 1234", None).is_ok());
    assert!(commands::cmd_categorize(&s, "zzz", Some("zzz")).is_ok());
}

// ========== Settlement and Export Command Tests ==========

#[test]
fn test_cmd_settle() {
    let s = setup_session();
    add_spending(&s, "2026-01-05", -70.0, "METRO", Some(Party::Dk));
    add_spending(&s, "2026-01-06", -130.0, "IGA", Some(Party::Yz));

    assert!(commands::cmd_settle_summary(&s, &january(), false).is_ok());
    assert!(commands::cmd_settle_summary(&s, &january(), true).is_ok());
    assert!(commands::cmd_settle_monthly(&s, "2026-01", "2026-03").is_ok());
    assert!(commands::cmd_settle_monthly(&s, "2026-03", "2026-01").is_err());

    assert!(commands::cmd_settle_pay(&s, "DK", "YZ", 30.0, Some("2026-01-31"), Some("e-transfer")).is_ok());
    let summary = s
        .db
        .settlement_summary(
            &s.ctx,
            &Period::Month {
                year: 2026,
                month: 1,
            },
        )
        .unwrap();
    assert!(summary.outcome.is_settled());

    assert!(commands::cmd_settle_pay(&s, "DK", "DK", 5.0, None, None).is_err());
    assert!(commands::cmd_settle_payments(&s, Some("2026-01")).is_ok());

    let payments = s.db.list_payments(&s.ctx, None).unwrap();
    assert!(commands::cmd_settle_delete_payment(&s, payments[0].id).is_ok());
    assert!(commands::cmd_settle_delete_payment(&s, payments[0].id).is_err());
}

#[test]
fn test_cmd_summary() {
    let s = setup_session();
    assert!(commands::cmd_summary(&s, &january(), false).is_ok());

    add_spending(&s, "2026-01-05", -45.10, "METRO", Some(Party::Dk));
    assert!(commands::cmd_summary(&s, &january(), false).is_ok());
    assert!(commands::cmd_summary(&s, &january(), true).is_ok());

    let summary = s
        .db
        .spending_summary(
            &s.ctx,
            &Period::Month {
                year: 2026,
                month: 1,
            },
        )
        .unwrap();
    assert_eq!(summary.categories[0].category, "Groceries");
    assert_eq!(summary.total, 45.1);
}

#[test]
fn test_cmd_export_to_file() {
    let s = setup_session();
    add_spending(&s, "2026-01-05", -45.10, "METRO #123", Some(Party::Dk));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("jan.csv");
    assert!(commands::cmd_export(&s, &january(), Some(&out)).is_ok());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("date,amount,category,description"));
    assert!(text.contains("2026-01-05,-45.10,Groceries,METRO #123"));
}

#[test]
fn test_cmd_audit() {
    let s = setup_session();
    assert!(commands::cmd_audit(&s, 10).is_ok());
}
