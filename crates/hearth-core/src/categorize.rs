//! Categorization engine
//!
//! A transaction's category is decided by an ordered chain of strategies.
//! The first strategy that produces a result wins:
//!
//! 1. Transfer detection (100, `transfer`)
//! 2. Learned vendor rule (95, `learned_vendor`)
//! 3. Learned description rule (90, `learned_description`)
//! 4. Keyword table against the vendor (75, `keyword_vendor`)
//! 5. Keyword table against the description (65, `keyword_description`)
//! 6. AI extension point, when enabled (25, `unknown`)
//!
//! Anything left over is uncategorized with confidence 25.
//!
//! Strategies work on a borrowed SQLite connection rather than the pool, so
//! categorization can run inside the caller's transaction (import confirm,
//! manual edit) without competing for the write lock.

use rusqlite::Connection;
use tracing::debug;

use crate::categories::{
    infer_category, is_transfer_transaction, pick_existing_category,
    CREDIT_CARD_PAYMENTS_CATEGORY, TRANSFERS_CATEGORY,
};
use crate::context::RequestContext;
use crate::db::{category_names, resolve_learned_category, Database};
use crate::error::Result;
use crate::models::{Categorization, CategorySource, RuleKeyType};
use crate::normalize::{
    derive_vendor, extract_pattern, DESCRIPTION_PATTERN_WORDS, VENDOR_PATTERN_WORDS,
};

/// Everything a strategy may look at
pub struct ClassifyContext<'a> {
    pub conn: &'a Connection,
    pub request: &'a RequestContext,
    /// Category names the user owns
    pub available: &'a [String],
    pub description: &'a str,
    pub vendor: &'a str,
    /// Category hint supplied by the bank export, if any
    pub raw_category: &'a str,
}

impl ClassifyContext<'_> {
    /// Vendor as given, or derived from the description
    fn vendor_or_derived(&self) -> String {
        if self.vendor.trim().is_empty() {
            derive_vendor(self.description)
        } else {
            self.vendor.to_string()
        }
    }
}

/// One step of the categorization chain
pub trait ClassificationStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Return a categorization, or `None` to defer to the next strategy
    fn try_classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<Categorization>>;
}

/// Payments, refunds and transfers between accounts
pub struct TransferDetection;

impl ClassificationStrategy for TransferDetection {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn try_classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<Categorization>> {
        if !is_transfer_transaction(ctx.description, ctx.raw_category) {
            return Ok(None);
        }
        let category = pick_existing_category(
            CREDIT_CARD_PAYMENTS_CATEGORY,
            ctx.available,
            Some(TRANSFERS_CATEGORY),
        );
        Ok(Some(Categorization::new(
            category,
            100,
            CategorySource::Transfer,
        )))
    }
}

/// Rules learned from the user's own corrections
pub struct LearnedRule {
    pub key_type: RuleKeyType,
}

impl LearnedRule {
    fn pattern(&self, ctx: &ClassifyContext<'_>) -> String {
        match self.key_type {
            RuleKeyType::Vendor => extract_pattern(&ctx.vendor_or_derived(), VENDOR_PATTERN_WORDS),
            RuleKeyType::Description => {
                extract_pattern(ctx.description, DESCRIPTION_PATTERN_WORDS)
            }
        }
    }
}

impl ClassificationStrategy for LearnedRule {
    fn name(&self) -> &'static str {
        match self.key_type {
            RuleKeyType::Vendor => "learned_vendor",
            RuleKeyType::Description => "learned_description",
        }
    }

    fn try_classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<Categorization>> {
        if !ctx.request.options.learning_enabled {
            return Ok(None);
        }
        let pattern = self.pattern(ctx);
        let category = resolve_learned_category(
            ctx.conn,
            ctx.request.user_id,
            self.key_type,
            &pattern,
            ctx.available,
        )?;
        if category.is_empty() {
            return Ok(None);
        }
        let (confidence, source) = match self.key_type {
            RuleKeyType::Vendor => (95, CategorySource::LearnedVendor),
            RuleKeyType::Description => (90, CategorySource::LearnedDescription),
        };
        Ok(Some(Categorization::new(category, confidence, source)))
    }
}

/// Which text the keyword table runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordField {
    Vendor,
    Description,
}

/// The static keyword and merchant table
pub struct KeywordHeuristic {
    pub field: KeywordField,
}

impl ClassificationStrategy for KeywordHeuristic {
    fn name(&self) -> &'static str {
        match self.field {
            KeywordField::Vendor => "keyword_vendor",
            KeywordField::Description => "keyword_description",
        }
    }

    fn try_classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<Categorization>> {
        let (text, confidence, source) = match self.field {
            KeywordField::Vendor => (ctx.vendor, 75, CategorySource::KeywordVendor),
            KeywordField::Description => (ctx.description, 65, CategorySource::KeywordDescription),
        };
        let category = infer_category(text, ctx.raw_category, ctx.available);
        if category.is_empty() {
            return Ok(None);
        }
        Ok(Some(Categorization::new(category, confidence, source)))
    }
}

/// Extension point for a model-backed classifier. No backend is wired in,
/// so it never produces a category.
pub struct AiSuggestion;

impl AiSuggestion {
    fn suggest(&self, _description: &str, _vendor: &str) -> String {
        String::new()
    }
}

impl ClassificationStrategy for AiSuggestion {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn try_classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<Categorization>> {
        if !ctx.request.options.ai_enabled {
            return Ok(None);
        }
        let suggested = self.suggest(ctx.description, ctx.vendor);
        let category = pick_existing_category(&suggested, ctx.available, None);
        if category.is_empty() {
            return Ok(None);
        }
        Ok(Some(Categorization::new(category, 25, CategorySource::Unknown)))
    }
}

/// Ordered strategy chain
pub struct Categorizer {
    strategies: Vec<Box<dyn ClassificationStrategy>>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Categorizer {
    /// The standard chain
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(TransferDetection),
            Box::new(LearnedRule {
                key_type: RuleKeyType::Vendor,
            }),
            Box::new(LearnedRule {
                key_type: RuleKeyType::Description,
            }),
            Box::new(KeywordHeuristic {
                field: KeywordField::Vendor,
            }),
            Box::new(KeywordHeuristic {
                field: KeywordField::Description,
            }),
            Box::new(AiSuggestion),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ClassificationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategy names in evaluation order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain; falls back to uncategorized
    pub fn categorize(&self, ctx: &ClassifyContext<'_>) -> Result<Categorization> {
        for strategy in &self.strategies {
            if let Some(result) = strategy.try_classify(ctx)? {
                debug!(
                    "{} matched '{}': '{}' ({})",
                    strategy.name(),
                    ctx.description,
                    result.category,
                    result.confidence
                );
                return Ok(result);
            }
        }
        debug!("No category for '{}'", ctx.description);
        Ok(Categorization::unknown())
    }
}

/// Categorize on an open connection, e.g. inside a transaction
pub(crate) fn categorize_on(
    conn: &Connection,
    request: &RequestContext,
    available: &[String],
    description: &str,
    vendor: &str,
    raw_category: &str,
) -> Result<Categorization> {
    Categorizer::new().categorize(&ClassifyContext {
        conn,
        request,
        available,
        description,
        vendor,
        raw_category,
    })
}

impl Database {
    /// Categorize a description without storing anything
    ///
    /// A learned-rule match still counts as a hit on that rule.
    pub fn categorize(
        &self,
        ctx: &RequestContext,
        description: &str,
        vendor: &str,
        raw_category: &str,
    ) -> Result<Categorization> {
        let conn = self.conn()?;
        let available = category_names(&conn, ctx.user_id)?;
        categorize_on(&conn, ctx, &available, description, vendor, raw_category)
    }
}
