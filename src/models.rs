// src/models.rs
//! Vacancy domain model shared by the pipeline, the stores, and the read API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored when the extraction service omits an optional text field.
pub const UNSPECIFIED: &str = "unspecified";

/// Work format advertised by a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkFormat {
    Remote,
    Office,
    Hybrid,
}

impl WorkFormat {
    /// Tolerant parse of the extraction service's `work_format` string.
    /// Returns `None` for anything outside the three known values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(Self::Remote),
            "office" => Some(Self::Office),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Office => "office",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for WorkFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric salary bounds. Never null in stored form: absent bounds are
/// coerced to 0 at the ingestion boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryInfo {
    #[serde(default = "unspecified_string")]
    pub amount: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub range: SalaryRange,
}

impl Default for SalaryInfo {
    fn default() -> Self {
        Self {
            amount: UNSPECIFIED.to_string(),
            currency: None,
            range: SalaryRange::default(),
        }
    }
}

fn unspecified_string() -> String {
    UNSPECIFIED.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self {
            kind: UNSPECIFIED.to_string(),
            value: String::new(),
        }
    }
}

/// A structured, not-yet-persisted extraction result. Transient: owned by a
/// single channel cycle and discarded after the persistence attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateVacancy {
    pub title: String,
    pub published_date: DateTime<Utc>,
    pub work_format: WorkFormat,
    pub salary: SalaryInfo,
    pub location: String,
    pub company: String,
    pub description: String,
    pub contacts: ContactInfo,
    pub raw_text: String,
}

/// A persisted vacancy as surfaced by the read API. `(telegram_message_id,
/// channel_id)` is the sole deduplication key and is unique store-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVacancy {
    pub id: String,
    #[serde(flatten)]
    pub vacancy: CandidateVacancy,
    pub telegram_message_id: i64,
    pub channel_id: String,
    pub parsed_at: DateTime<Utc>,
}

/// Per-channel resume point. Created on first successful batch, upserted
/// after each one, never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCursorState {
    pub channel_id: String,
    pub last_message_id: i64,
    pub updated_at: DateTime<Utc>,
}
