//! Import staging: preview, staged edits, confirm
//!
//! A preview parses and categorizes a bank export without touching the
//! ledger. Every parsed row is stored in `import_staging` under a random
//! import id, where it can be edited (category, vendor, payer) until the
//! batch is confirmed, discarded, or expires.
//!
//! Confirm runs in one SQLite transaction: either every non-duplicate row
//! is inserted or nothing is.

use std::collections::{BTreeSet, HashSet};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audit::log_audit;
use super::categories::{category_names, find_category};
use super::mappings::{load_column_mapping, save_column_mapping};
use super::rules::learn_rule;
use super::transactions::{insert_transaction, is_duplicate, TransactionRecord};
use super::Database;
use crate::categorize::categorize_on;
use crate::config::HearthConfig;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::format::{detect_format, detect_header_and_mapping, ColumnMapping, FormatDetection};
use crate::import::{build_file_signature, decode_csv_bytes, parse_rows, read_csv_rows, ParsedRow};
use crate::models::{Categorization, Category, ConfidenceLabel, Party, RuleSource};
use crate::normalize::{normalize_description, normalize_text};

/// Knobs for [`Database::preview_import`]
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    /// Caller-supplied columns; fills fields the detector left unmapped
    pub mapping: ColumnMapping,
    /// Return every staged row instead of the first `preview_limit`
    pub show_all: bool,
    pub preview_limit: usize,
    pub show_all_threshold: usize,
    pub staging_ttl_hours: i64,
}

impl From<&HearthConfig> for PreviewOptions {
    fn from(config: &HearthConfig) -> Self {
        Self {
            mapping: ColumnMapping::default(),
            show_all: false,
            preview_limit: config.preview_limit,
            show_all_threshold: config.show_all_threshold,
            staging_ttl_hours: config.staging_ttl_hours,
        }
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::from(&HearthConfig::default())
    }
}

/// A parsed row waiting for confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRow {
    pub row: ParsedRow,
    /// What the engine suggested at preview time
    pub auto: Categorization,
    /// Current category, after any override
    pub categorization: Categorization,
    pub override_category: Option<String>,
    pub override_vendor: Option<String>,
    pub paid_by: Option<Party>,
}

impl StagedRow {
    fn new(row: ParsedRow, auto: Categorization) -> Self {
        Self {
            row,
            categorization: auto.clone(),
            auto,
            override_category: None,
            override_vendor: None,
            paid_by: None,
        }
    }

    pub fn row_index(&self) -> usize {
        self.row.row_index
    }

    /// Vendor that will be stored
    pub fn vendor(&self) -> &str {
        self.override_vendor.as_deref().unwrap_or(&self.row.vendor)
    }

    pub fn confidence_label(&self) -> ConfidenceLabel {
        self.categorization.label()
    }
}

/// Result of [`Database::preview_import`]
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub import_id: String,
    pub file_signature: String,
    pub detection: FormatDetection,
    pub total_rows: usize,
    /// Rows dropped because their date or amount did not parse
    pub skipped_rows: usize,
    /// Preview slice
    pub rows: Vec<StagedRow>,
    /// Some staged rows are not in `rows`
    pub truncated: bool,
    /// Seeing the rest requires an explicit "show all"
    pub needs_show_all: bool,
}

/// Changes to staged rows; `None` leaves a field alone
///
/// An empty category clears a previous override. An empty vendor restores
/// the parsed vendor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagedEdit {
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub paid_by: Option<Party>,
}

/// Knobs for [`Database::confirm_import`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmOptions {
    /// Payer for rows that were left blank
    pub default_paid_by: Option<Party>,
}

/// Result of [`Database::confirm_import`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub import_id: String,
    pub imported: usize,
    pub skipped_duplicates: usize,
    pub learned_rules: usize,
}

fn load_staged(conn: &Connection, ctx: &RequestContext, import_id: &str) -> Result<Vec<StagedRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT row_json FROM import_staging
        WHERE import_id = ? AND household_id = ? AND user_id = ?
          AND expires_at > CURRENT_TIMESTAMP
        ORDER BY row_index
        "#,
    )?;
    let blobs = stmt
        .query_map(params![import_id, ctx.household_id, ctx.user_id], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if blobs.is_empty() {
        return Err(Error::PreviewExpired);
    }

    blobs
        .iter()
        .map(|b| serde_json::from_str(b).map_err(Error::from))
        .collect()
}

fn store_staged(conn: &Connection, ctx: &RequestContext, import_id: &str, row: &StagedRow) -> Result<()> {
    conn.execute(
        r#"
        UPDATE import_staging SET row_json = ?, status = 'edited'
        WHERE import_id = ? AND household_id = ? AND row_index = ?
        "#,
        params![
            serde_json::to_string(row)?,
            import_id,
            ctx.household_id,
            row.row_index() as i64
        ],
    )?;
    Ok(())
}

fn sweep_expired(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM import_staging WHERE expires_at <= CURRENT_TIMESTAMP",
        [],
    )?;
    if deleted > 0 {
        debug!("Swept {} expired staging row(s)", deleted);
    }
    Ok(deleted)
}

fn apply_edit(conn: &Connection, ctx: &RequestContext, row: &mut StagedRow, edit: &StagedEdit) -> Result<()> {
    if let Some(name) = edit.category.as_deref().map(str::trim) {
        if name.is_empty() {
            row.override_category = None;
            row.categorization = row.auto.clone();
        } else {
            match find_category(conn, ctx.user_id, name)? {
                Some(category) => {
                    row.categorization = Categorization::manual(category.name.clone());
                    row.override_category = Some(category.name);
                }
                None => {
                    warn!("Unknown category '{}' for staged row {}", name, row.row_index());
                    row.override_category = None;
                    row.categorization = Categorization::unknown();
                }
            }
        }
    }

    if let Some(vendor) = edit.vendor.as_deref().map(str::trim) {
        row.override_vendor = (!vendor.is_empty()).then(|| vendor.to_string());
    }

    if let Some(paid_by) = edit.paid_by {
        row.paid_by = Some(paid_by);
    }

    Ok(())
}

/// Category a confirmed row is stored with
///
/// A person's override wins, then the category staged at preview time, then
/// a fresh run of the engine for rows the preview left uncategorized.
fn final_category(
    conn: &Connection,
    ctx: &RequestContext,
    available: &[String],
    row: &StagedRow,
) -> Result<(Option<Category>, Categorization)> {
    if let Some(name) = row.override_category.as_deref() {
        if let Some(category) = find_category(conn, ctx.user_id, name)? {
            let categorization = Categorization::manual(category.name.clone());
            return Ok((Some(category), categorization));
        }
        warn!("Override category '{}' no longer exists", name);
    }

    if !row.categorization.category.is_empty() {
        if let Some(category) = find_category(conn, ctx.user_id, &row.categorization.category)? {
            return Ok((Some(category), row.categorization.clone()));
        }
    }

    let categorization = categorize_on(
        conn,
        ctx,
        available,
        &row.row.description,
        row.vendor(),
        &row.row.category,
    )?;
    match find_category(conn, ctx.user_id, &categorization.category)? {
        Some(category) => Ok((Some(category), categorization)),
        None => Ok((None, Categorization::unknown())),
    }
}

impl Database {
    /// Parse and categorize a bank export into a new staged batch
    ///
    /// Nothing is written to the ledger. The detected mapping is saved under
    /// the file's signature so the next export of the same shape maps the
    /// same way.
    pub fn preview_import(
        &self,
        ctx: &RequestContext,
        filename: &str,
        bytes: &[u8],
        options: &PreviewOptions,
    ) -> Result<ImportPreview> {
        let content = decode_csv_bytes(bytes)?;
        let rows = read_csv_rows(&content)?;
        if rows.is_empty() {
            return Err(Error::Import("CSV file is empty".into()));
        }

        let (has_header, _, header_row_index) = detect_header_and_mapping(&rows);
        let header: &[String] = if has_header {
            rows.get(header_row_index).map(|r| r.as_slice()).unwrap_or(&[])
        } else {
            &[]
        };
        let file_signature = build_file_signature(filename, header);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        sweep_expired(&tx)?;

        let saved = load_column_mapping(&tx, ctx.user_id, &file_signature)?;
        let detection = detect_format(&rows, &options.mapping, saved.as_ref().map(|s| &s.mapping));
        debug!(
            "Detected {} format ({} dialect) for {}",
            detection.format,
            detection.dialect.as_str(),
            filename
        );

        let outcome = parse_rows(&rows, &detection);
        if outcome.rows.is_empty() {
            return Err(Error::Import(format!(
                "No transactions could be read ({} row(s) skipped); check the column mapping",
                outcome.skipped
            )));
        }

        save_column_mapping(&tx, ctx.user_id, &file_signature, &detection)?;

        let available = category_names(&tx, ctx.user_id)?;
        let import_id = Uuid::new_v4().to_string();
        let expires = format!("+{} hours", options.staging_ttl_hours.max(1));

        let mut staged = Vec::with_capacity(outcome.rows.len());
        for parsed in outcome.rows {
            let auto = categorize_on(
                &tx,
                ctx,
                &available,
                &parsed.description,
                &parsed.vendor,
                &parsed.category,
            )?;
            let row = StagedRow::new(parsed, auto);
            tx.execute(
                r#"
                INSERT INTO import_staging (import_id, household_id, user_id, row_index, row_json, expires_at)
                VALUES (?, ?, ?, ?, ?, datetime('now', ?))
                "#,
                params![
                    import_id,
                    ctx.household_id,
                    ctx.user_id,
                    row.row_index() as i64,
                    serde_json::to_string(&row)?,
                    expires
                ],
            )?;
            staged.push(row);
        }
        tx.commit()?;

        let total_rows = staged.len();
        info!(
            "Staged import {}: {} row(s), {} skipped",
            import_id, total_rows, outcome.skipped
        );

        if !options.show_all {
            staged.truncate(options.preview_limit);
        }
        let truncated = staged.len() < total_rows;

        Ok(ImportPreview {
            import_id,
            file_signature,
            detection,
            total_rows,
            skipped_rows: outcome.skipped,
            rows: staged,
            truncated,
            needs_show_all: truncated && total_rows > options.show_all_threshold,
        })
    }

    /// Every row of a staged batch
    pub fn staged_rows(&self, ctx: &RequestContext, import_id: &str) -> Result<Vec<StagedRow>> {
        let conn = self.conn()?;
        load_staged(&conn, ctx, import_id)
    }

    /// Edit one staged row
    pub fn edit_staged_row(
        &self,
        ctx: &RequestContext,
        import_id: &str,
        row_index: usize,
        edit: &StagedEdit,
    ) -> Result<StagedRow> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut row = load_staged(&tx, ctx, import_id)?
            .into_iter()
            .find(|r| r.row_index() == row_index)
            .ok_or_else(|| Error::InvalidSelection(format!("No staged row {}", row_index)))?;

        apply_edit(&tx, ctx, &mut row, edit)?;
        store_staged(&tx, ctx, import_id, &row)?;
        tx.commit()?;

        Ok(row)
    }

    /// Apply one edit to several staged rows
    ///
    /// Every index must exist in the batch, otherwise nothing changes.
    pub fn bulk_edit_staged(
        &self,
        ctx: &RequestContext,
        import_id: &str,
        row_indexes: &[usize],
        edit: &StagedEdit,
    ) -> Result<usize> {
        let wanted: BTreeSet<usize> = row_indexes.iter().copied().collect();
        if wanted.is_empty() {
            return Err(Error::InvalidData("No rows selected".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut rows: Vec<StagedRow> = load_staged(&tx, ctx, import_id)?
            .into_iter()
            .filter(|r| wanted.contains(&r.row_index()))
            .collect();
        if rows.len() != wanted.len() {
            return Err(Error::InvalidSelection(format!(
                "{} of {} selected row(s) are not in import {}",
                wanted.len() - rows.len(),
                wanted.len(),
                import_id
            )));
        }

        for row in &mut rows {
            apply_edit(&tx, ctx, row, edit)?;
            store_staged(&tx, ctx, import_id, row)?;
        }
        tx.commit()?;

        Ok(rows.len())
    }

    /// Set the category of every staged row from one vendor
    pub fn apply_vendor_override(
        &self,
        ctx: &RequestContext,
        import_id: &str,
        vendor_key: &str,
        category: &str,
    ) -> Result<usize> {
        let vendor_key = normalize_text(vendor_key);
        if vendor_key.is_empty() || category.trim().is_empty() {
            return Err(Error::InvalidData("Vendor and category are required".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let edit = StagedEdit {
            category: Some(category.to_string()),
            ..Default::default()
        };
        let mut updated = 0;
        for mut row in load_staged(&tx, ctx, import_id)? {
            if normalize_text(row.vendor()) != vendor_key {
                continue;
            }
            apply_edit(&tx, ctx, &mut row, &edit)?;
            store_staged(&tx, ctx, import_id, &row)?;
            updated += 1;
        }
        tx.commit()?;

        debug!("Vendor override '{}' -> '{}' on {} row(s)", vendor_key, category, updated);
        Ok(updated)
    }

    /// Commit a staged batch to the ledger
    ///
    /// Rows that already exist in the household are skipped. If any spending
    /// row that would be inserted has no payer (after `default_paid_by`), the
    /// whole batch is rejected and stays staged. Overrides that disagree with
    /// the engine's suggestion are learned as rules.
    pub fn confirm_import(
        &self,
        ctx: &RequestContext,
        import_id: &str,
        options: &ConfirmOptions,
    ) -> Result<ImportSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut summary = ImportSummary {
            import_id: import_id.to_string(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for row in load_staged(&tx, ctx, import_id)? {
            let key = (
                row.row.date,
                (row.row.amount * 100.0).round() as i64,
                normalize_description(&row.row.description),
            );
            // Same row twice in one file counts once
            if !seen.insert(key)
                || is_duplicate(&tx, ctx.household_id, row.row.date, row.row.amount, &row.row.description)?
            {
                summary.skipped_duplicates += 1;
            } else {
                pending.push(row);
            }
        }

        let missing = pending
            .iter()
            .filter(|r| r.row.amount < 0.0 && r.paid_by.or(options.default_paid_by).is_none())
            .count();
        if missing > 0 {
            return Err(Error::MissingPayer { count: missing });
        }

        let available = category_names(&tx, ctx.user_id)?;
        let mut learned = HashSet::new();

        for row in &pending {
            let (category, categorization) = final_category(&tx, ctx, &available, row)?;
            insert_transaction(
                &tx,
                ctx,
                &TransactionRecord {
                    date: row.row.date,
                    amount: row.row.amount,
                    description: &row.row.description,
                    vendor: row.vendor(),
                    category: category.as_ref(),
                    paid_by: row.paid_by.or(options.default_paid_by),
                    categorization: &categorization,
                },
            )?;
            summary.imported += 1;

            let (Some(chosen), Some(category)) = (row.override_category.as_deref(), category.as_ref())
            else {
                continue;
            };
            if normalize_description(chosen) == normalize_description(&row.auto.category) {
                continue;
            }
            if let Some(pattern) = learn_rule(
                &tx,
                ctx,
                &row.row.description,
                row.vendor(),
                category.id,
                RuleSource::ImportOverride,
            )? {
                learned.insert(pattern);
            }
        }
        summary.learned_rules = learned.len();

        tx.execute(
            "DELETE FROM import_staging WHERE import_id = ? AND household_id = ?",
            params![import_id, ctx.household_id],
        )?;
        log_audit(
            &tx,
            ctx,
            "import_confirm",
            Some("import"),
            None,
            Some(&serde_json::to_string(&summary)?),
        )?;
        tx.commit()?;

        info!(
            "Confirmed import {}: {} imported, {} duplicate(s) skipped, {} rule(s) learned",
            import_id, summary.imported, summary.skipped_duplicates, summary.learned_rules
        );
        Ok(summary)
    }

    /// Drop a staged batch without importing it
    pub fn discard_import(&self, ctx: &RequestContext, import_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_staging WHERE import_id = ? AND household_id = ?",
            params![import_id, ctx.household_id],
        )?;
        Ok(deleted)
    }

    /// Delete staged rows past their expiry
    pub fn sweep_expired_staging(&self) -> Result<usize> {
        let conn = self.conn()?;
        sweep_expired(&conn)
    }
}
