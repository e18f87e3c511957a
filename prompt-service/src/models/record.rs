//! Persisted input/output pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Default page size for record listings.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a listing may return.
pub const MAX_PAGE_SIZE: i64 = 100;

/// One generation request and, once it succeeded, its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Record {
    /// Identity assigned by the store at creation.
    pub id: i64,

    /// Text submitted by the caller.
    pub input_text: String,

    /// Generated text; absent until the external call succeeds.
    pub output_text: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Set whenever `output_text` is written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Whether the external call for this record has completed.
    pub fn is_complete(&self) -> bool {
        self.output_text.is_some()
    }
}

/// The two request flavours the service accepts. Each keeps its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Free-form prompt, sent to the model verbatim.
    Generate,
    /// Code snippet the model is asked to explain.
    Explain,
}

impl Variant {
    /// Table backing this variant's records.
    pub fn table(&self) -> &'static str {
        match self {
            Variant::Generate => "prompt_responses",
            Variant::Explain => "code_requests",
        }
    }

    /// JSON field carrying the input text in request bodies.
    pub fn input_field(&self) -> &'static str {
        match self {
            Variant::Generate => "prompt",
            Variant::Explain => "code",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Generate => "generate",
            Variant::Explain => "explain",
        }
    }

    /// Build the text sent to the model from the caller's input.
    pub fn render_prompt(&self, input_text: &str) -> String {
        match self {
            Variant::Generate => input_text.to_string(),
            Variant::Explain => format!(
                "Explain what the following code does, step by step, in plain language.\n\n```\n{}\n```",
                input_text
            ),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyset page over records, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRecords {
    pub limit: i64,
    /// Only return records with an id strictly below this one.
    pub before_id: Option<i64>,
}

impl ListRecords {
    pub fn new(limit: Option<i64>, before_id: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            before_id,
        }
    }
}

impl Default for ListRecords {
    fn default() -> Self {
        Self::new(None, None)
    }
}
