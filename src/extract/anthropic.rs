// src/extract/anthropic.rs
//! Anthropic Messages API extraction backend.
//!
//! One request per call, bounded by a 30s timeout; the bounded retry lives
//! at the call site in the channel worker so the policy stays in one place.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::{parse_model_json, promote, ExtractError, Extractor};
use crate::models::CandidateVacancy;

const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 1000;

const SYSTEM_PROMPT: &str = "You are a specialized job-vacancy parser for Ukrainian, Russian and \
     English postings. Extract the requested fields and return only valid JSON.";

pub struct AnthropicExtractor {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

// --- Messages API wire types ---

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    type_: String,
    message: String,
}

impl AnthropicExtractor {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).context("invalid API key header value")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building extraction HTTP client")?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            model,
        })
    }

    /// Point the client at a different server (tests use wiremock here).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(&self, text: &str, posted_at: DateTime<Utc>) -> MessageRequest<'_> {
        let prompt = format!(
            "Analyze this job posting and return a JSON object with exactly these fields:\n\
             {{\n\
             \x20 \"title\": \"full job title\",\n\
             \x20 \"company\": \"company name or null\",\n\
             \x20 \"work_format\": \"remote\" | \"office\" | \"hybrid\",\n\
             \x20 \"salary\": {{\n\
             \x20   \"amount\": \"range or single value or null\",\n\
             \x20   \"currency\": \"UAH/USD/EUR or null\",\n\
             \x20   \"range\": {{\"min\": number or null, \"max\": number or null}}\n\
             \x20 }},\n\
             \x20 \"location\": \"work location or null\",\n\
             \x20 \"description\": \"brief job description (max 300 chars)\",\n\
             \x20 \"contacts\": {{\"type\": \"telegram/email/phone\", \"value\": \"contact value\"}}\n\
             }}\n\n\
             The posting was published on {date}.\n\
             If the text is not a job vacancy, return exactly null.\n\
             Return ONLY valid JSON, no commentary.\n\n\
             Text:\n{text}",
            date = posted_at.to_rfc3339(),
        );
        MessageRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn extract(
        &self,
        text: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<Option<CandidateVacancy>, ExtractError> {
        let request = self.build_request(text, posted_at);

        let t0 = Instant::now();
        let response = self
            .http
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Unavailable(format!("request timed out: {e}"))
                } else {
                    ExtractError::Unavailable(format!("request failed: {e}"))
                }
            })?;
        histogram!("extraction_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| format!("{} ({})", e.error.message, e.error.type_))
                .unwrap_or(body);
            return Err(ExtractError::Unavailable(format!(
                "API returned {status}: {detail}"
            )));
        }

        let body: MessageResponse = response.json().await.map_err(|e| {
            ExtractError::Malformed(format!("unreadable API response: {e}"))
        })?;
        let reply = body
            .content
            .iter()
            .find_map(|b| b.text.as_deref())
            .ok_or_else(|| ExtractError::Malformed("response has no text content".into()))?;

        debug!(reply_len = reply.len(), "extraction reply received");

        match parse_model_json(reply)? {
            Some(payload) => promote(payload, posted_at, text).map(Some),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
