//! Human-in-the-loop decisions.
//!
//! Every component that cannot decide automatically goes through an
//! [`InteractionGateway`]. Gateways only return decisions; persisting them
//! is the caller's job.

use async_trait::async_trait;
use galsync_core::TagSource;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod channel;
pub mod console;
pub mod gate;
#[cfg(test)]
pub(crate) mod scripted;

pub use channel::{ChannelGateway, PendingInteraction};
pub use console::ConsoleGateway;
pub use gate::{GateGuard, InteractionGate};

// ─── Decisions ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateDecision {
    Translate(String),
    /// Skip this occurrence only.
    Skip,
    /// Never ask about this raw tag again.
    IgnorePermanently,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    Merge,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDecision {
    Create,
    /// Overwrite the top-ranked existing record.
    Update,
    Skip,
}

/// One entry of a ranked list shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChoice {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub score: f64,
}

impl RankedChoice {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            detail: None,
            score,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail.filter(|d| !d.is_empty());
        self
    }
}

// ─── Requests / responses ──────────────────────────────────

/// A question for the human, with everything needed to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionRequest {
    TranslateTag {
        source: TagSource,
        raw_tag: String,
    },
    MergeOrCreate {
        concept: String,
        candidate: String,
    },
    SelectFromRanked {
        keyword: String,
        choices: Vec<RankedChoice>,
    },
    ConfirmDuplicate {
        title: String,
        candidates: Vec<RankedChoice>,
    },
    ConfirmBrandMerge {
        name: String,
        candidate: String,
        score: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InteractionResponse {
    Translation(TranslateDecision),
    Merge(MergeDecision),
    /// Index into the offered choices; `None` abandons.
    Selection(Option<usize>),
    Duplicate(DuplicateDecision),
    BrandMerge(MergeDecision),
}

impl InteractionRequest {
    /// The least destructive answer, used on timeout or when no answer can
    /// be obtained.
    pub fn default_response(&self) -> InteractionResponse {
        match self {
            InteractionRequest::TranslateTag { .. } => {
                InteractionResponse::Translation(TranslateDecision::Skip)
            }
            InteractionRequest::MergeOrCreate { .. } => InteractionResponse::Merge(MergeDecision::Create),
            InteractionRequest::SelectFromRanked { .. } => InteractionResponse::Selection(None),
            InteractionRequest::ConfirmDuplicate { .. } => {
                InteractionResponse::Duplicate(DuplicateDecision::Skip)
            }
            InteractionRequest::ConfirmBrandMerge { .. } => {
                InteractionResponse::BrandMerge(MergeDecision::Create)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InteractionRequest::TranslateTag { .. } => "translate_tag",
            InteractionRequest::MergeOrCreate { .. } => "merge_or_create",
            InteractionRequest::SelectFromRanked { .. } => "select_from_ranked",
            InteractionRequest::ConfirmDuplicate { .. } => "confirm_duplicate",
            InteractionRequest::ConfirmBrandMerge { .. } => "confirm_brand_merge",
        }
    }
}

// ─── Gateway ───────────────────────────────────────────────

/// Presents a bounded set of choices to a human and returns the decision.
///
/// Implementations provide [`respond`](Self::respond); the typed methods
/// build the request and fall back to the request's default when the answer
/// does not fit the question.
#[async_trait]
pub trait InteractionGateway: Send + Sync {
    /// Answer a request. Must always return; never drop the question.
    async fn respond(&self, request: InteractionRequest) -> InteractionResponse;

    async fn translate_tag(&self, source: TagSource, raw_tag: &str) -> TranslateDecision {
        let request = InteractionRequest::TranslateTag {
            source,
            raw_tag: raw_tag.to_string(),
        };
        match self.respond(request).await {
            InteractionResponse::Translation(TranslateDecision::Translate(t)) if t.trim().is_empty() => {
                TranslateDecision::Skip
            }
            InteractionResponse::Translation(d) => d,
            other => mismatched("translate_tag", other, TranslateDecision::Skip),
        }
    }

    async fn merge_or_create(&self, concept: &str, candidate: &str) -> MergeDecision {
        let request = InteractionRequest::MergeOrCreate {
            concept: concept.to_string(),
            candidate: candidate.to_string(),
        };
        match self.respond(request).await {
            InteractionResponse::Merge(d) => d,
            other => mismatched("merge_or_create", other, MergeDecision::Create),
        }
    }

    /// Pick one of `choices`; `None` means abandon.
    async fn select_from_ranked(&self, keyword: &str, choices: &[RankedChoice]) -> Option<usize> {
        let request = InteractionRequest::SelectFromRanked {
            keyword: keyword.to_string(),
            choices: choices.to_vec(),
        };
        match self.respond(request).await {
            InteractionResponse::Selection(Some(i)) if i < choices.len() => Some(i),
            InteractionResponse::Selection(_) => None,
            other => mismatched("select_from_ranked", other, None),
        }
    }

    async fn confirm_duplicate(&self, title: &str, candidates: &[RankedChoice]) -> DuplicateDecision {
        let request = InteractionRequest::ConfirmDuplicate {
            title: title.to_string(),
            candidates: candidates.to_vec(),
        };
        match self.respond(request).await {
            InteractionResponse::Duplicate(d) => d,
            other => mismatched("confirm_duplicate", other, DuplicateDecision::Skip),
        }
    }

    async fn confirm_brand_merge(&self, name: &str, candidate: &str, score: f64) -> MergeDecision {
        let request = InteractionRequest::ConfirmBrandMerge {
            name: name.to_string(),
            candidate: candidate.to_string(),
            score,
        };
        match self.respond(request).await {
            InteractionResponse::BrandMerge(d) => d,
            other => mismatched("confirm_brand_merge", other, MergeDecision::Create),
        }
    }
}

fn mismatched<T>(kind: &str, response: InteractionResponse, default: T) -> T {
    warn!(kind, ?response, "response does not match the question, using default");
    default
}
