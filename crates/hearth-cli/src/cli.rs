//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Hearth - Shared household expenses, categorized and settled
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Household expense categorization and settlement", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "hearth.db", global = true)]
    pub db: PathBuf,

    /// Act as this user (defaults to `default_user` from the config)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Configuration file (defaults to HEARTH_CONFIG, then the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and enroll the current user
    Init,

    /// Check that every expected table, column and index exists
    Health,

    /// List or add household members
    Members {
        #[command(subcommand)]
        action: Option<MembersAction>,
    },

    /// Preview, edit and confirm a bank CSV import
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },

    /// Show how a description would be categorized
    Categorize {
        /// Transaction description
        description: String,

        /// Vendor (derived from the description if omitted)
        #[arg(long)]
        vendor: Option<String>,
    },

    /// Manage transactions (list, add, edit, delete, bulk)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage categories (list, add, rename, delete)
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage learned rules (list, retarget, enable, disable, delete)
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Spending by category for a period
    Summary {
        #[command(flatten)]
        period: PeriodArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Settlement between the two household members
    Settle {
        #[command(subcommand)]
        action: SettleAction,
    },

    /// Export a period's transactions as CSV
    Export {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

/// A month, an explicit range, or (with neither) the current month
#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// Month (YYYY-MM)
    #[arg(short, long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,

    /// Range start (YYYY-MM-DD), inclusive
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Range end (YYYY-MM-DD), inclusive
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

/// Zero-based column positions for files the detector cannot map
#[derive(Args, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Date column
    #[arg(long)]
    pub date_col: Option<usize>,

    /// Description column
    #[arg(long)]
    pub description_col: Option<usize>,

    /// Vendor column
    #[arg(long)]
    pub vendor_col: Option<usize>,

    /// Signed amount column
    #[arg(long)]
    pub amount_col: Option<usize>,

    /// Debit (money out) column
    #[arg(long)]
    pub debit_col: Option<usize>,

    /// Credit (money in) column
    #[arg(long)]
    pub credit_col: Option<usize>,

    /// Bank category column
    #[arg(long)]
    pub category_col: Option<usize>,
}

/// Fields a staged edit can change
#[derive(Args, Debug, Clone, Default)]
pub struct StagedEditArgs {
    /// Category override ("" restores the suggestion)
    #[arg(long)]
    pub category: Option<String>,

    /// Vendor override ("" restores the parsed vendor)
    #[arg(long)]
    pub vendor: Option<String>,

    /// Who paid: DK or YZ
    #[arg(long)]
    pub paid_by: Option<String>,
}

#[derive(Subcommand)]
pub enum MembersAction {
    /// List members of your household
    List,
    /// Add a user to your household
    Add {
        /// User name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ImportAction {
    /// Parse and categorize a CSV into a staged batch
    Preview {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Show every staged row
        #[arg(long)]
        show_all: bool,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show every row of a staged batch
    Rows {
        /// Import id from the preview
        import_id: String,
    },

    /// Edit one staged row
    Edit {
        import_id: String,

        /// Row index from the preview
        row: usize,

        #[command(flatten)]
        edit: StagedEditArgs,
    },

    /// Apply one edit to several staged rows
    Bulk {
        import_id: String,

        /// Row indexes, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        rows: Vec<usize>,

        #[command(flatten)]
        edit: StagedEditArgs,
    },

    /// Set the category of every staged row from one vendor
    Vendor {
        import_id: String,

        /// Vendor as shown in the preview
        vendor: String,

        /// Category to apply
        category: String,
    },

    /// Commit a staged batch
    Confirm {
        import_id: String,

        /// Payer for spending rows left blank (DK or YZ)
        #[arg(long)]
        paid_by: Option<String>,
    },

    /// Drop a staged batch
    Discard { import_id: String },

    /// Delete expired staged rows
    Sweep,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions
    List {
        #[command(flatten)]
        period: PeriodArgs,

        /// Only this category
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum number to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Add a transaction by hand
    Add {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Signed amount; negative is money out
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,

        #[arg(long)]
        description: String,

        #[arg(long)]
        vendor: Option<String>,

        /// Category (categorized automatically if omitted)
        #[arg(long)]
        category: Option<String>,

        /// DK or YZ
        #[arg(long)]
        paid_by: Option<String>,
    },

    /// Change fields of a transaction
    Edit {
        id: i64,

        #[arg(long)]
        date: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        amount: Option<f64>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        vendor: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// DK or YZ
        #[arg(long)]
        paid_by: Option<String>,
    },

    /// Delete a transaction
    Delete { id: i64 },

    /// Apply one change to several transactions
    Bulk {
        /// Transaction ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,

        #[command(subcommand)]
        action: BulkCommand,
    },
}

#[derive(Subcommand)]
pub enum BulkCommand {
    /// Set the category ("" clears it)
    Category { name: String },
    /// Set the payer ("" clears it)
    PaidBy { party: String },
    /// Mark or unmark as a transfer
    Transfer {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Delete the selection
    Delete,
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,
    /// Add a category
    Add { name: String },
    /// Rename a category
    Rename { old_name: String, new_name: String },
    /// Delete a category; its transactions become uncategorized
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List learned rules
    List,
    /// Point a rule at another category
    Retarget { id: i64, category: String },
    /// Re-enable a rule
    Enable { id: i64 },
    /// Disable a rule without deleting it
    Disable { id: i64 },
    /// Delete a rule
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum SettleAction {
    /// Settlement for one period
    Summary {
        #[command(flatten)]
        period: PeriodArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Month-by-month settlement
    Monthly {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: String,

        /// Last month (YYYY-MM)
        #[arg(long)]
        to: String,
    },

    /// Record a repayment
    Pay {
        /// Who paid: DK or YZ
        #[arg(long)]
        from: String,

        /// Who received: DK or YZ
        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: f64,

        /// Date (YYYY-MM-DD), today if omitted
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// List recorded repayments
    Payments {
        /// Only this month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Delete a recorded repayment
    DeletePayment { id: i64 },
}
