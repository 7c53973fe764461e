//! Domain models for Hearth

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One of the two people sharing a household ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    #[serde(rename = "DK")]
    Dk,
    #[serde(rename = "YZ")]
    Yz,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dk => "DK",
            Self::Yz => "YZ",
        }
    }

    /// The other party
    pub fn other(&self) -> Self {
        match self {
            Self::Dk => Self::Yz,
            Self::Yz => Self::Dk,
        }
    }
}

impl std::str::FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DK" => Ok(Self::Dk),
            "YZ" => Ok(Self::Yz),
            _ => Err(format!("Unknown party: {} (expected DK or YZ)", s)),
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transaction's category was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Transfer,
    LearnedVendor,
    LearnedDescription,
    KeywordVendor,
    KeywordDescription,
    /// Chosen by a person (manual entry/edit or import override)
    Manual,
    #[default]
    Unknown,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::LearnedVendor => "learned_vendor",
            Self::LearnedDescription => "learned_description",
            Self::KeywordVendor => "keyword_vendor",
            Self::KeywordDescription => "keyword_description",
            Self::Manual => "manual",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for CategorySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(Self::Transfer),
            "learned_vendor" => Ok(Self::LearnedVendor),
            "learned_description" => Ok(Self::LearnedDescription),
            "keyword_vendor" => Ok(Self::KeywordVendor),
            "keyword_description" => Ok(Self::KeywordDescription),
            "manual" => Ok(Self::Manual),
            "unknown" | "" => Ok(Self::Unknown),
            _ => Err(format!("Unknown category source: {}", s)),
        }
    }
}

impl std::fmt::Display for CategorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Three-tier reading of a 0-100 confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= 80 {
            Self::High
        } else if confidence >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of categorizing one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    /// Category name, empty when uncategorized
    pub category: String,
    pub confidence: u8,
    pub source: CategorySource,
}

impl Categorization {
    pub fn new(category: impl Into<String>, confidence: u8, source: CategorySource) -> Self {
        Self {
            category: category.into(),
            confidence,
            source,
        }
    }

    /// The "nothing matched" result
    pub fn unknown() -> Self {
        Self::new("", 25, CategorySource::Unknown)
    }

    /// A category picked by a person
    pub fn manual(category: impl Into<String>) -> Self {
        Self::new(category, 100, CategorySource::Manual)
    }

    pub fn label(&self) -> ConfidenceLabel {
        ConfidenceLabel::from_confidence(self.confidence)
    }
}

/// A spending category owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// What a learned rule is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKeyType {
    Vendor,
    Description,
}

impl RuleKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Description => "description",
        }
    }
}

impl std::str::FromStr for RuleKeyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vendor" => Ok(Self::Vendor),
            "description" => Ok(Self::Description),
            _ => Err(format!("Unknown rule key type: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleKeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a learned rule came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    ManualEdit,
    ImportOverride,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualEdit => "manual_edit",
            Self::ImportOverride => "import_override",
        }
    }
}

impl std::str::FromStr for RuleSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual_edit" => Ok(Self::ManualEdit),
            "import_override" => Ok(Self::ImportOverride),
            _ => Err(format!("Unknown rule source: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A learned categorization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub key_type: RuleKeyType,
    pub pattern: String,
    pub category_id: i64,
    pub category: String,
    pub priority: i64,
    pub hits: i64,
    pub source: RuleSource,
    pub enabled: bool,
    pub last_used_at: Option<String>,
    pub updated_at: String,
}

/// A committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub household_id: i64,
    pub date: NaiveDate,
    /// Negative = money out, positive = money in
    pub amount: f64,
    pub description: String,
    pub vendor: String,
    pub category_id: Option<i64>,
    pub category: Option<String>,
    pub is_transfer: bool,
    pub is_personal: bool,
    pub paid_by: Option<Party>,
    pub category_confidence: u8,
    pub category_source: CategorySource,
    pub tags: Vec<String>,
    /// Optimistic-lock token; must be echoed back on edit
    pub updated_at: String,
}

/// Input for a manually entered transaction, also used as the full-row edit payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    /// Derived from the description when absent
    pub vendor: Option<String>,
    /// Category name; the engine decides when absent
    pub category: Option<String>,
    pub paid_by: Option<Party>,
}

/// Bulk operations over a selection of transaction ids
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Category name, or `None` to clear
    SetCategory(Option<String>),
    SetPaidBy(Option<Party>),
    SetTransfer(bool),
    Delete,
}

/// A month or an inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Month { year: i32, month: u32 },
    Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// Parse "YYYY-MM"
    pub fn parse_month(value: &str) -> std::result::Result<Self, String> {
        let (year, month) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month: {} (expected YYYY-MM)", value))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in month: {}", value))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month: {}", value))?;
        if !(1..=12).contains(&month) {
            return Err(format!("Invalid month: {}", value));
        }
        Ok(Self::Month { year, month })
    }

    pub fn month_of(date: NaiveDate) -> Self {
        Self::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day covered
    pub fn start(&self) -> NaiveDate {
        match *self {
            Self::Month { year, month } => {
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
            }
            Self::Range { start, .. } => start,
        }
    }

    /// First day after the period
    pub fn end_exclusive(&self) -> NaiveDate {
        match *self {
            Self::Month { year, month } => {
                let (y, m) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MAX)
            }
            Self::Range { end, .. } => end.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }

    /// The following calendar month (months only)
    pub fn next_month(&self) -> Option<Self> {
        match *self {
            Self::Month { .. } => Some(Self::month_of(self.end_exclusive())),
            Self::Range { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match *self {
            Self::Month { year, month } => format!("{:04}-{:02}", year, month),
            Self::Range { start, end } => format!("{} to {}", start, end),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Filter for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub period: Option<Period>,
    /// Category name (case/accent-insensitive)
    pub category: Option<String>,
    pub limit: Option<i64>,
}

/// Net spending in one category over a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// "Uncategorized" for rows without a category
    pub category: String,
    pub total: f64,
    pub transaction_count: i64,
}

/// Spending overview for a period
///
/// Totals are net spending: purchases count positive and refunds reduce them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub period: String,
    /// Everything except transfers
    pub total: f64,
    /// Everything except transfers and personal rows
    pub shared_total: f64,
    /// Per-category totals, transfers and personal rows excluded, largest first
    pub categories: Vec<CategorySpending>,
}

/// An out-of-band reimbursement between the two household members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPayment {
    pub id: i64,
    pub household_id: i64,
    pub date: NaiveDate,
    pub from_person: Party,
    pub to_person: Party,
    pub amount: f64,
    pub note: Option<String>,
    pub created_at: String,
}

/// Input for recording a reimbursement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSettlementPayment {
    pub date: NaiveDate,
    pub from_person: Party,
    pub to_person: Party,
    pub amount: f64,
    pub note: Option<String>,
}

/// Round to cents
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
