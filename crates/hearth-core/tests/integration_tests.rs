//! Integration tests for hearth-core
//!
//! These tests exercise the full preview → edit → confirm → settle workflow.

use hearth_core::{
    db::{ConfirmOptions, Database, PreviewOptions, StagedEdit},
    format::{ColumnMapping, DetectedFormat},
    models::{CategorySource, Party, Period, RuleKeyType, RuleSource, TransactionFilter},
    settlement::Settlement,
    EngineOptions, Error, RequestContext,
};

/// Headerless CIBC-style export: date, description, debit, credit, card
fn cibc_csv() -> &'static str {
    "2026-01-05,METRO #123,45.10,,4500********1234\n\
     2026-01-06,SHELL STATION 1234,60.00,,4500********1234\n\
     2026-01-07,PAYMENT THANK YOU,,500.00,4500********1234\n\
     2026-01-08,FROMAGERIE HAMEL,22.00,,4500********1234\n"
}

/// Amex-style export: charges positive, payment amount embedded in the text
fn amex_csv() -> &'static str {
    "Date,Description,Amount\n\
     01/10/2026,SUSHI RESTAURANT,20.00\n\
     01/12/2026,PAYMENT THANK YOU -162.67,\n\
     01/13/2026,FROMAGERIE HAMEL,35.50\n"
}

fn setup() -> (Database, RequestContext) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let ctx = db
        .request_context("dk", EngineOptions::default())
        .expect("Failed to resolve request context");
    (db, ctx)
}

fn paid_by_dk() -> ConfirmOptions {
    ConfirmOptions {
        default_paid_by: Some(Party::Dk),
    }
}

fn january() -> Period {
    Period::Month {
        year: 2026,
        month: 1,
    }
}

// =============================================================================
// Import Workflow
// =============================================================================

#[test]
fn test_preview_edit_confirm_workflow() {
    let (db, ctx) = setup();

    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    assert_eq!(preview.detection.format, DetectedFormat::CibcHeaderless);
    assert_eq!(preview.total_rows, 4);
    assert_eq!(preview.skipped_rows, 0);
    assert!(!preview.truncated);

    let metro = &preview.rows[0];
    assert_eq!(metro.row.amount, -45.1);
    assert_eq!(metro.row.vendor, "metro");
    assert_eq!(metro.categorization.category, "Groceries");

    let payment = &preview.rows[2];
    assert_eq!(payment.row.amount, 500.0);
    assert_eq!(payment.categorization.category, "Credit Card Payments");
    assert_eq!(payment.categorization.source, CategorySource::Transfer);
    assert_eq!(payment.categorization.confidence, 100);

    let cheese = &preview.rows[3];
    assert_eq!(cheese.categorization.category, "");
    assert_eq!(cheese.categorization.confidence, 25);

    db.edit_staged_row(
        &ctx,
        &preview.import_id,
        3,
        &StagedEdit {
            category: Some("Groceries".into()),
            ..Default::default()
        },
    )
    .expect("Failed to edit staged row");

    let summary = db
        .confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");
    assert_eq!(summary.imported, 4);
    assert_eq!(summary.skipped_duplicates, 0);
    assert_eq!(summary.learned_rules, 1);

    let transactions = db
        .list_transactions(&ctx, &TransactionFilter::default())
        .expect("Failed to list");
    assert_eq!(transactions.len(), 4);
    let stored = transactions
        .iter()
        .find(|t| t.description == "FROMAGERIE HAMEL")
        .expect("imported row");
    assert_eq!(stored.category.as_deref(), Some("Groceries"));
    assert_eq!(stored.category_source, CategorySource::Manual);
    assert_eq!(stored.paid_by, Some(Party::Dk));

    let payment = transactions
        .iter()
        .find(|t| t.description == "PAYMENT THANK YOU")
        .expect("imported payment");
    assert!(payment.is_transfer);

    let rules = db.list_rules(&ctx).expect("Failed to list rules");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].key_type, RuleKeyType::Vendor);
    assert_eq!(rules[0].pattern, "fromagerie hamel");
    assert_eq!(rules[0].source, RuleSource::ImportOverride);

    // Staged rows are gone and the confirm is audited
    assert!(matches!(
        db.staged_rows(&ctx, &preview.import_id),
        Err(Error::PreviewExpired)
    ));
    let audit = db.list_audit_log(&ctx, 10).expect("Failed to read audit log");
    assert_eq!(audit[0].action, "import_confirm");
    assert!(audit[0]
        .details
        .as_deref()
        .is_some_and(|d| d.contains("\"imported\":4")));
}

#[test]
fn test_reimport_is_deduplicated() {
    let (db, ctx) = setup();

    let first = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    db.confirm_import(&ctx, &first.import_id, &paid_by_dk())
        .expect("Failed to confirm");

    let second = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview again");
    assert_ne!(second.import_id, first.import_id);

    let summary = db
        .confirm_import(&ctx, &second.import_id, &paid_by_dk())
        .expect("Failed to confirm again");
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.skipped_duplicates, 4);

    let all = db
        .list_transactions(&ctx, &TransactionFilter::default())
        .expect("Failed to list");
    assert_eq!(all.len(), 4);
}

#[test]
fn test_duplicate_rows_within_one_file() {
    let (db, ctx) = setup();
    let csv = "2026-01-05,METRO,45.10,,card\n2026-01-05,metro,45.10,,card\n";

    let preview = db
        .preview_import(&ctx, "twice.csv", csv.as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    let summary = db
        .confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped_duplicates, 1);
}

#[test]
fn test_missing_payer_counts_repeated_row_once() {
    let (db, ctx) = setup();
    let csv = "2026-01-05,METRO,45.10,,card\n2026-01-05,METRO,45.10,,card\n";

    let preview = db
        .preview_import(&ctx, "twice.csv", csv.as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    let result = db.confirm_import(&ctx, &preview.import_id, &ConfirmOptions::default());
    assert!(matches!(result, Err(Error::MissingPayer { count: 1 })));
}

#[test]
fn test_missing_payer_blocks_whole_confirm() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");

    let result = db.confirm_import(&ctx, &preview.import_id, &ConfirmOptions::default());
    assert!(matches!(result, Err(Error::MissingPayer { count: 3 })));
    assert!(db
        .list_transactions(&ctx, &TransactionFilter::default())
        .expect("Failed to list")
        .is_empty());

    // The batch is still staged; assign payers and retry
    let updated = db
        .bulk_edit_staged(
            &ctx,
            &preview.import_id,
            &[0, 1, 3],
            &StagedEdit {
                paid_by: Some(Party::Yz),
                ..Default::default()
            },
        )
        .expect("Failed to bulk edit");
    assert_eq!(updated, 3);

    let summary = db
        .confirm_import(&ctx, &preview.import_id, &ConfirmOptions::default())
        .expect("Failed to confirm");
    assert_eq!(summary.imported, 4);

    let rows = db
        .list_transactions(&ctx, &TransactionFilter::default())
        .expect("Failed to list");
    let payment = rows
        .iter()
        .find(|t| t.amount > 0.0)
        .expect("income row");
    assert_eq!(payment.paid_by, None);
}

#[test]
fn test_bulk_edit_rejects_unknown_rows() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");

    let result = db.bulk_edit_staged(
        &ctx,
        &preview.import_id,
        &[0, 42],
        &StagedEdit {
            paid_by: Some(Party::Yz),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(Error::InvalidSelection(_))));

    let rows = db
        .staged_rows(&ctx, &preview.import_id)
        .expect("Failed to read staged rows");
    assert!(rows.iter().all(|r| r.paid_by.is_none()));
}

#[test]
fn test_unknown_import_id_is_expired() {
    let (db, ctx) = setup();
    let result = db.confirm_import(&ctx, "not-a-real-import", &paid_by_dk());
    assert!(matches!(result, Err(Error::PreviewExpired)));
}

#[test]
fn test_staged_batches_are_private_to_household() {
    let (db, ctx) = setup();
    let other = db
        .request_context("stranger", EngineOptions::default())
        .expect("Failed to resolve other context");

    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    let result = db.confirm_import(&other, &preview.import_id, &paid_by_dk());
    assert!(matches!(result, Err(Error::PreviewExpired)));
}

// =============================================================================
// Format Fixtures
// =============================================================================

#[test]
fn test_amex_export() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "amex.csv", amex_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");

    assert_eq!(preview.detection.format, DetectedFormat::AmexHeadered);
    assert!(preview.detection.has_header);
    assert_eq!(preview.total_rows, 3);

    assert_eq!(preview.rows[0].row.amount, -20.0);
    assert_eq!(preview.rows[0].row.vendor, "SUSHI RESTAURANT");

    let payment = &preview.rows[1];
    assert_eq!(payment.row.amount, 162.67);
    assert_eq!(payment.row.description, "PAYMENT THANK YOU");
    assert_eq!(payment.categorization.category, "Credit Card Payments");

    assert_eq!(preview.rows[2].row.amount, -35.5);
}

#[test]
fn test_saved_mapping_is_reused() {
    let (db, ctx) = setup();
    let csv = "When,Memo,Value\n2026-01-05,METRO,-45.10\n";

    let explicit = PreviewOptions {
        mapping: ColumnMapping {
            date: Some(0),
            description: Some(1),
            amount: Some(2),
            ..Default::default()
        },
        ..Default::default()
    };
    let first = db
        .preview_import(&ctx, "custom.csv", csv.as_bytes(), &explicit)
        .expect("Failed to preview with mapping");
    assert_eq!(first.total_rows, 1);
    assert_eq!(first.skipped_rows, 1);

    // Same file shape, no mapping supplied this time
    let second = db
        .preview_import(&ctx, "custom.csv", csv.as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview with saved mapping");
    assert_eq!(second.total_rows, 1);
    assert_eq!(second.detection.mapping.amount, Some(2));
    assert_eq!(second.file_signature, first.file_signature);

    let saved = db
        .get_column_mapping(&ctx, &first.file_signature)
        .expect("Failed to load mapping")
        .expect("mapping saved");
    assert_eq!(saved.mapping.description, Some(1));
}

#[test]
fn test_unreadable_files() {
    let (db, ctx) = setup();

    let binary = db.preview_import(&ctx, "x.csv", b"\x00\x01\x02", &PreviewOptions::default());
    assert!(matches!(binary, Err(Error::Encoding)));

    let empty = db.preview_import(&ctx, "x.csv", b"\n\n", &PreviewOptions::default());
    assert!(matches!(empty, Err(Error::Import(_))));

    let nonsense = db.preview_import(&ctx, "x.csv", b"hello,world\n", &PreviewOptions::default());
    assert!(matches!(nonsense, Err(Error::Import(_))));
}

#[test]
fn test_windows_1252_export() {
    let (db, ctx) = setup();
    // "CAFÉ" with É encoded as 0xC9
    let bytes = b"2026-01-05,CAF\xC9 OLIMPICO,4.50,,card\n";
    let preview = db
        .preview_import(&ctx, "cafe.csv", bytes, &PreviewOptions::default())
        .expect("Failed to preview");
    assert_eq!(preview.rows[0].row.description, "CAFÉ OLIMPICO");
    assert_eq!(preview.rows[0].categorization.category, "Bakery & Coffee");
}

#[test]
fn test_preview_slice_and_show_all() {
    let (db, ctx) = setup();
    let csv: String = (1..=30)
        .map(|d| format!("2026-01-{:02},STORE {},{}.00,,card\n", d.min(28), d, d))
        .collect();

    let preview = db
        .preview_import(&ctx, "big.csv", csv.as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    assert_eq!(preview.total_rows, 30);
    assert_eq!(preview.rows.len(), 20);
    assert!(preview.truncated);
    assert!(!preview.needs_show_all);

    let strict = PreviewOptions {
        show_all_threshold: 25,
        ..Default::default()
    };
    let preview = db
        .preview_import(&ctx, "big.csv", csv.as_bytes(), &strict)
        .expect("Failed to preview");
    assert!(preview.needs_show_all);

    let everything = PreviewOptions {
        show_all: true,
        ..strict
    };
    let preview = db
        .preview_import(&ctx, "big.csv", csv.as_bytes(), &everything)
        .expect("Failed to preview");
    assert_eq!(preview.rows.len(), 30);
    assert!(!preview.truncated);
    assert!(!preview.needs_show_all);
}

// =============================================================================
// Learning
// =============================================================================

#[test]
fn test_import_override_outranks_keywords() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    assert_eq!(preview.rows[0].categorization.source, CategorySource::KeywordVendor);

    db.edit_staged_row(
        &ctx,
        &preview.import_id,
        0,
        &StagedEdit {
            category: Some("Restaurants".into()),
            ..Default::default()
        },
    )
    .expect("Failed to edit");
    db.confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");

    let categorized = db
        .categorize(&ctx, "METRO #999", "", "")
        .expect("Failed to categorize");
    assert_eq!(categorized.category, "Restaurants");
    assert_eq!(categorized.source, CategorySource::LearnedVendor);
    assert_eq!(categorized.confidence, 95);
}

#[test]
fn test_vendor_override_learns_once() {
    let (db, ctx) = setup();
    let csv = "2026-01-05,FROMAGERIE HAMEL,12.00,,card\n\
               2026-01-12,FROMAGERIE HAMEL,18.00,,card\n\
               2026-01-13,METRO,30.00,,card\n";
    let preview = db
        .preview_import(&ctx, "cheese.csv", csv.as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");

    let updated = db
        .apply_vendor_override(&ctx, &preview.import_id, "Fromagerie Hamel", "Groceries")
        .expect("Failed to apply vendor override");
    assert_eq!(updated, 2);

    let summary = db
        .confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.learned_rules, 1);

    let rules = db.list_rules(&ctx).expect("Failed to list rules");
    assert_eq!(rules.len(), 1);
}

#[test]
fn test_override_matching_suggestion_is_not_learned() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");

    db.edit_staged_row(
        &ctx,
        &preview.import_id,
        0,
        &StagedEdit {
            category: Some("groceries".into()),
            ..Default::default()
        },
    )
    .expect("Failed to edit");

    let summary = db
        .confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");
    assert_eq!(summary.learned_rules, 0);
    assert!(db.list_rules(&ctx).expect("Failed to list rules").is_empty());
}

// =============================================================================
// Settlement and Export
// =============================================================================

#[test]
fn test_settlement_after_import() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    db.confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");

    let summary = db
        .settlement_summary(&ctx, &january())
        .expect("Failed to summarize");
    // The card payment is a transfer; the other three are shared
    assert_eq!(summary.dk_shared, 127.1);
    assert_eq!(summary.each_share, 63.55);
    assert_eq!(summary.closing_balance, 63.55);
    assert_eq!(summary.outcome.to_string(), "YZ owes DK $63.55");
    assert_eq!(summary.missing_paid_by_count, 0);

    let breakdown = db
        .monthly_breakdown(
            &ctx,
            january(),
            Period::Month {
                year: 2026,
                month: 3,
            },
        )
        .expect("Failed to break down");
    assert_eq!(breakdown.len(), 3);
    assert_eq!(breakdown[2].opening_balance, 63.55);
    assert_eq!(breakdown[2].closing_balance, 63.55);
    assert_ne!(breakdown[2].outcome, Settlement::Settled);
}

#[test]
fn test_export_csv() {
    let (db, ctx) = setup();
    let preview = db
        .preview_import(&ctx, "cibc.csv", cibc_csv().as_bytes(), &PreviewOptions::default())
        .expect("Failed to preview");
    db.confirm_import(&ctx, &preview.import_id, &paid_by_dk())
        .expect("Failed to confirm");

    let mut out = Vec::new();
    let written = db
        .export_csv(&ctx, &january(), &mut out)
        .expect("Failed to export");
    assert_eq!(written, 4);

    let text = String::from_utf8(out).expect("utf-8 export");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "date,amount,category,description");
    assert_eq!(lines[1], "2026-01-05,-45.10,Groceries,METRO #123");
    assert_eq!(lines[3], "2026-01-07,500.00,Credit Card Payments,PAYMENT THANK YOU");
    assert_eq!(lines[4], "2026-01-08,-22.00,Uncategorized,FROMAGERIE HAMEL");
}
