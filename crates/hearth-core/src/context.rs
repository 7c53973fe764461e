//! Per-operation request context
//!
//! Every core operation receives the caller's identity and the engine
//! switches explicitly instead of reading them from shared state. A context
//! is resolved once per operation with [`Database::request_context`] and
//! dropped when the operation ends.
//!
//! [`Database::request_context`]: crate::db::Database::request_context

use serde::Serialize;

use crate::config::HearthConfig;

/// Engine switches carried with each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    pub learning_enabled: bool,
    pub ai_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            learning_enabled: true,
            ai_enabled: false,
        }
    }
}

impl From<&HearthConfig> for EngineOptions {
    fn from(config: &HearthConfig) -> Self {
        Self {
            learning_enabled: config.enable_learning_rules,
            ai_enabled: config.enable_ai_categorization,
        }
    }
}

/// Who is acting, and within which household
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub user_id: i64,
    pub user_name: String,
    pub household_id: i64,
    pub options: EngineOptions,
}
