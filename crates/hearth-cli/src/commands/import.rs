//! Staged import command implementations

use std::path::Path;

use anyhow::{Context, Result};
use hearth_core::{
    db::{ConfirmOptions, ImportPreview, PreviewOptions, StagedEdit, StagedRow},
    format::ColumnMapping,
    Error,
};

use super::{format_amount, parse_party, truncate, Session};
use crate::cli::{MappingArgs, StagedEditArgs};

fn column_mapping(args: &MappingArgs) -> ColumnMapping {
    ColumnMapping {
        date: args.date_col,
        description: args.description_col,
        vendor: args.vendor_col,
        amount: args.amount_col,
        debit: args.debit_col,
        credit: args.credit_col,
        category: args.category_col,
    }
}

fn staged_edit(args: &StagedEditArgs) -> Result<StagedEdit> {
    let paid_by = match args.paid_by.as_deref() {
        Some(value) => Some(parse_party(value)?.context("--paid-by must be DK or YZ")?),
        None => None,
    };
    Ok(StagedEdit {
        category: args.category.clone(),
        vendor: args.vendor.clone(),
        paid_by,
    })
}

fn print_rows(rows: &[StagedRow]) {
    for row in rows {
        let category = if row.categorization.category.is_empty() {
            "-"
        } else {
            row.categorization.category.as_str()
        };
        let payer = row.paid_by.map(|p| p.to_string()).unwrap_or_default();
        let marker = if row.override_category.is_some() { "*" } else { " " };
        println!(
            "   {:>3} │ {} │ {:>10} │ {:<32} │ {:<24}{} {:<6} │ {}",
            row.row_index(),
            row.row.date,
            format_amount(row.row.amount),
            truncate(&row.row.description, 32),
            truncate(category, 24),
            marker,
            row.confidence_label(),
            payer
        );
    }
}

fn print_preview(preview: &ImportPreview) {
    println!(
        "   Format: {} ({} dialect){}",
        preview.detection.format,
        preview.detection.dialect.as_str(),
        if preview.detection.has_header {
            ", with header"
        } else {
            ""
        }
    );
    println!(
        "   Rows: {} staged, {} skipped",
        preview.total_rows, preview.skipped_rows
    );
    println!("   ─────────────────────────────────────────────────────────────");
    print_rows(&preview.rows);

    if preview.truncated {
        println!();
        println!(
            "   Showing {} of {} rows.",
            preview.rows.len(),
            preview.total_rows
        );
        if preview.needs_show_all {
            println!("   Large import: pass --show-all to review every row before confirming.");
        } else {
            println!("   Use 'hearth import rows {}' to see the rest.", preview.import_id);
        }
    }
}

pub fn cmd_import_preview(
    s: &Session,
    file: &Path,
    show_all: bool,
    mapping: &MappingArgs,
    json: bool,
) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let options = PreviewOptions {
        mapping: column_mapping(mapping),
        show_all,
        ..PreviewOptions::from(&s.config)
    };
    let preview = s
        .db
        .preview_import(&s.ctx, &filename, &bytes, &options)
        .with_context(|| format!("Failed to preview {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!();
    println!("📥 Preview of {}", file.display());
    print_preview(&preview);
    println!();
    println!("   Import id: {}", preview.import_id);
    println!("   Confirm with: hearth import confirm {} --paid-by DK", preview.import_id);

    Ok(())
}

pub fn cmd_import_rows(s: &Session, import_id: &str) -> Result<()> {
    let rows = s.db.staged_rows(&s.ctx, import_id)?;

    println!();
    println!("📋 Staged import {} ({} rows)", import_id, rows.len());
    println!("   ─────────────────────────────────────────────────────────────");
    print_rows(&rows);

    Ok(())
}

pub fn cmd_import_edit(s: &Session, import_id: &str, row: usize, edit: &StagedEditArgs) -> Result<()> {
    let updated = s.db.edit_staged_row(&s.ctx, import_id, row, &staged_edit(edit)?)?;
    println!("✅ Updated row {}", updated.row_index());
    print_rows(std::slice::from_ref(&updated));
    Ok(())
}

pub fn cmd_import_bulk(
    s: &Session,
    import_id: &str,
    rows: &[usize],
    edit: &StagedEditArgs,
) -> Result<()> {
    let updated = s.db.bulk_edit_staged(&s.ctx, import_id, rows, &staged_edit(edit)?)?;
    println!("✅ Updated {} rows", updated);
    Ok(())
}

pub fn cmd_import_vendor(s: &Session, import_id: &str, vendor: &str, category: &str) -> Result<()> {
    let updated = s
        .db
        .apply_vendor_override(&s.ctx, import_id, vendor, category)?;
    if updated == 0 {
        println!("No staged rows from vendor '{}'", vendor);
    } else {
        println!("✅ Set {} rows from '{}' to {}", updated, vendor, category);
    }
    Ok(())
}

pub fn cmd_import_confirm(s: &Session, import_id: &str, paid_by: Option<&str>) -> Result<()> {
    let default_paid_by = match paid_by {
        Some(value) => parse_party(value)?,
        None => s.config.default_paid_by,
    };

    let summary = match s
        .db
        .confirm_import(&s.ctx, import_id, &ConfirmOptions { default_paid_by })
    {
        Ok(summary) => summary,
        Err(Error::MissingPayer { count }) => {
            anyhow::bail!(
                "{} spending row(s) have no payer. Set them with 'hearth import bulk {} --rows ... --paid-by DK' or pass --paid-by",
                count,
                import_id
            );
        }
        Err(Error::PreviewExpired) => {
            anyhow::bail!("Import {} has expired or does not exist; preview the file again", import_id);
        }
        Err(e) => return Err(e.into()),
    };

    println!("✅ Import complete!");
    println!("   Imported: {}", summary.imported);
    println!("   Skipped (duplicates): {}", summary.skipped_duplicates);
    if summary.learned_rules > 0 {
        println!("   Learned rules: {}", summary.learned_rules);
    }

    Ok(())
}

pub fn cmd_import_discard(s: &Session, import_id: &str) -> Result<()> {
    let deleted = s.db.discard_import(&s.ctx, import_id)?;
    if deleted == 0 {
        println!("Nothing staged under {}", import_id);
    } else {
        println!("🗑️  Discarded {} staged rows", deleted);
    }
    Ok(())
}

pub fn cmd_import_sweep(s: &Session) -> Result<()> {
    let deleted = s.db.sweep_expired_staging()?;
    println!("🧹 Removed {} expired staged rows", deleted);
    Ok(())
}
