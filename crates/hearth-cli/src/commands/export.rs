//! Export and audit command implementations

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::{resolve_period, truncate, Session};
use crate::cli::PeriodArgs;

pub fn cmd_export(s: &Session, period: &PeriodArgs, output: Option<&Path>) -> Result<()> {
    let period = resolve_period(period)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let count = s.db.export_csv(&s.ctx, &period, file)?;
            eprintln!("✅ Exported {} transactions to {}", count, path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            s.db.export_csv(&s.ctx, &period, &mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}

pub fn cmd_audit(s: &Session, limit: i64) -> Result<()> {
    let entries = s.db.list_audit_log(&s.ctx, limit)?;

    if entries.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }

    println!();
    println!("📜 Audit log");
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in entries {
        println!(
            "   {} │ {:<10} │ {:<18} │ {}",
            entry.timestamp,
            entry.user_name.as_deref().unwrap_or("-"),
            entry.action,
            truncate(entry.details.as_deref().unwrap_or(""), 60)
        );
    }

    Ok(())
}
