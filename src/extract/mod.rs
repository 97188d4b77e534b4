// src/extract/mod.rs
//! Extraction seam: free text in, structured vacancy (or nothing) out.
//!
//! The service behind [`Extractor`] is best-effort, so its output is never
//! trusted as-is: [`parse_model_json`] handles the wire quirks (code fences,
//! explicit `null`) and [`promote`] enforces the schema (required fields
//! present, work format known, salary bounds coerced to non-negative
//! integers) before anything becomes a [`CandidateVacancy`].

pub mod anthropic;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ExtractorKind, Settings};
use crate::models::{CandidateVacancy, ContactInfo, SalaryInfo, SalaryRange, WorkFormat, UNSPECIFIED};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Service errored or timed out. Worth retrying.
    #[error("extraction service unavailable: {0}")]
    Unavailable(String),
    /// Service answered but the output fails schema validation. Not retried.
    #[error("extraction output malformed: {0}")]
    Malformed(String),
}

impl ExtractError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Unavailable(_))
    }
}

/// Capability interface over the structured-extraction service.
/// `Ok(None)` is the clean "not a vacancy" outcome.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<Option<CandidateVacancy>, ExtractError>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Build the configured extraction backend.
pub fn build_extractor(settings: &Settings) -> anyhow::Result<Arc<dyn Extractor>> {
    match settings.extractor {
        ExtractorKind::Anthropic => {
            let client = anthropic::AnthropicExtractor::new(
                settings.anthropic_api_key.clone(),
                settings.anthropic_model.clone(),
            )?;
            Ok(Arc::new(client))
        }
        ExtractorKind::Mock => Ok(Arc::new(mock::MockExtractor::heuristic())),
    }
}

// --- Response payload schema ---

/// What the extraction service is asked to return. Every field is optional
/// at the wire level; [`promote`] decides what is actually required.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub work_format: Option<String>,
    #[serde(default)]
    pub salary: Option<PayloadSalary>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contacts: Option<PayloadContact>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PayloadSalary {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub range: Option<PayloadRange>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PayloadRange {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PayloadContact {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Parse the model's reply text into a payload.
///
/// Accepts a bare JSON object, a code-fenced one, or the literal `null`
/// (= "not a vacancy"). Anything else is [`ExtractError::Malformed`].
pub fn parse_model_json(reply: &str) -> Result<Option<ExtractionPayload>, ExtractError> {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re_fence = RE_FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex"));

    let mut body = reply.trim();
    if let Some(caps) = re_fence.captures(body) {
        body = caps.get(1).map_or(body, |m| m.as_str());
    }

    if body.is_empty() || body == "null" {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ExtractError::Malformed(format!("reply is not valid JSON: {e}")))?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ExtractError::Malformed(format!("reply does not match schema: {e}")))
}

/// Validate a payload against the vacancy schema and normalize it.
///
/// Required: `title`, `work_format` (must be a known value), `location`,
/// `description`. Normalized: salary nulls -> 0 (and clamped non-negative),
/// absent company/contacts -> "unspecified" sentinels.
pub fn promote(
    payload: ExtractionPayload,
    posted_at: DateTime<Utc>,
    raw_text: &str,
) -> Result<CandidateVacancy, ExtractError> {
    fn required(field: &'static str, v: Option<String>) -> Result<String, ExtractError> {
        match v {
            Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(ExtractError::Malformed(format!(
                "missing required field `{field}`"
            ))),
        }
    }

    let title = required("title", payload.title)?;
    let format_raw = required("work_format", payload.work_format)?;
    let location = required("location", payload.location)?;
    let description = required("description", payload.description)?;

    let work_format = WorkFormat::parse(&format_raw).ok_or_else(|| {
        ExtractError::Malformed(format!("unknown work_format `{format_raw}`"))
    })?;

    let company = payload
        .company
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| UNSPECIFIED.to_string());

    let salary = payload.salary.map(normalize_salary).unwrap_or_default();

    let contacts = payload
        .contacts
        .map(|c| ContactInfo {
            kind: c
                .kind
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| UNSPECIFIED.to_string()),
            value: c.value.map(|v| v.trim().to_string()).unwrap_or_default(),
        })
        .unwrap_or_default();

    Ok(CandidateVacancy {
        title,
        published_date: posted_at,
        work_format,
        salary,
        location,
        company,
        description,
        contacts,
        raw_text: raw_text.to_string(),
    })
}

fn normalize_salary(s: PayloadSalary) -> SalaryInfo {
    let range = s.range.unwrap_or_default();
    SalaryInfo {
        amount: s
            .amount
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNSPECIFIED.to_string()),
        currency: s.currency.filter(|c| !c.trim().is_empty()),
        range: SalaryRange {
            min: range.min.unwrap_or(0).max(0),
            max: range.max.unwrap_or(0).max(0),
        },
    }
}
