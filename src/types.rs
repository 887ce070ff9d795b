//! Caller-facing result records and the shaping rules that produce them
//! from raw wire responses.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::wire::{GenerateContentResponse, ModelEntry};

/// Conversation role. History reconstruction alternates these by position,
/// never trusting caller-supplied labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One chat turn as supplied by or returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Token usage counters; all zero when the service omits usage metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Safety rating attached to a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
}

/// One shaped candidate, preserving wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// First content part's text; empty when the candidate has no parts.
    pub content: String,
    pub finish_reason: Option<String>,
    pub safety_ratings: Vec<SafetyRating>,
}

/// Shaped result of a successful generate call. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub text: String,
    pub candidates: Vec<CandidateSummary>,
    pub usage: Usage,
    /// Wall-clock time from just before the first attempt to just after the
    /// successful one.
    #[serde(rename = "elapsed_seconds", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

/// Shaped result of a chat conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResult {
    pub text: String,
    /// The session's own transcript with roles alternating by position.
    pub history: Vec<ChatMessage>,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

/// Descriptive fields of one remote model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: Option<u32>,
    pub output_token_limit: Option<u32>,
    pub supported_generation_methods: Vec<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
}

impl From<ModelEntry> for ModelInfo {
    fn from(entry: ModelEntry) -> Self {
        Self {
            name: entry.name,
            display_name: entry.display_name,
            description: entry.description,
            input_token_limit: entry.input_token_limit,
            output_token_limit: entry.output_token_limit,
            supported_generation_methods: entry.supported_generation_methods,
            temperature: entry.temperature,
            top_p: entry.top_p,
            top_k: entry.top_k,
        }
    }
}

/// Model introspection outcome: always a record, never an error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModelInfoReport {
    Found(ModelInfo),
    Error { error: String },
}

impl ModelInfoReport {
    pub fn not_found() -> Self {
        ModelInfoReport::Error {
            error: "model information not found".to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ModelInfoReport::Found(_))
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Reject responses the service marked as blocked before shaping them.
pub(crate) fn ensure_not_blocked(resp: &GenerateContentResponse) -> Result<()> {
    if let Some(feedback) = &resp.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(Error::PolicyBlock(format!("prompt blocked: {reason}")));
        }
    }
    if resp.primary_text().is_empty() {
        if let Some(candidate) = resp.candidates.first() {
            if candidate.finish_reason.as_deref() == Some("SAFETY") {
                return Err(Error::PolicyBlock(
                    "response withheld by safety filters".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Shape a raw wire response into a [`GenerationResult`].
///
/// Deterministic: missing text shapes to "", missing usage metadata to zero
/// counters, candidates map 1:1 in wire order.
pub(crate) fn shape_generation(
    resp: GenerateContentResponse,
    elapsed: Duration,
) -> Result<GenerationResult> {
    ensure_not_blocked(&resp)?;

    let text = resp.primary_text();
    let candidates = resp
        .candidates
        .iter()
        .map(|candidate| CandidateSummary {
            content: candidate
                .content
                .as_ref()
                .map(|content| content.first_part_text())
                .unwrap_or_default(),
            finish_reason: candidate.finish_reason.clone(),
            safety_ratings: candidate
                .safety_ratings
                .iter()
                .map(|rating| SafetyRating {
                    category: rating.category.clone(),
                    probability: rating.probability.clone(),
                })
                .collect(),
        })
        .collect();
    let usage = resp
        .usage_metadata
        .map(|meta| Usage {
            prompt_tokens: meta.prompt_token_count,
            output_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        })
        .unwrap_or_default();

    Ok(GenerationResult {
        text,
        candidates,
        usage,
        elapsed,
        completed_at: OffsetDateTime::now_utc(),
    })
}
