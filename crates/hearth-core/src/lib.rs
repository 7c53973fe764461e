//! Hearth Core Library
//!
//! Shared functionality for the Hearth household expense tool:
//! - Database access, migrations and schema health
//! - Bank CSV format detection and row parsing
//! - Text normalization and learned-rule pattern extraction
//! - Strategy-chain categorization with confidence scoring
//! - Import staging, deduplication and confirm
//! - Two-party settlement ledger with repayments
//! - Four-column CSV export

pub mod categories;
pub mod categorize;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod models;
pub mod normalize;
pub mod settlement;

pub use categorize::{Categorizer, ClassificationStrategy, ClassifyContext};
pub use config::HearthConfig;
pub use context::{EngineOptions, RequestContext};
pub use db::{
    AuditEntry, ConfirmOptions, Database, HouseholdMember, ImportPreview, ImportSummary,
    LearnedPattern, PreviewOptions, SavedMapping, SchemaHealth, StagedEdit, StagedRow,
};
pub use error::{Error, Result};
pub use export::ExportRow;
pub use format::{ColumnMapping, DetectedFormat, FormatDetection};
pub use import::ParsedRow;
pub use settlement::{MonthlySettlement, Settlement, SettlementSummary};
