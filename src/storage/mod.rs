// src/storage/mod.rs
//! Store seams: channel cursors and the vacancy collection.
//!
//! The pipeline writes through [`CursorStore`] and [`VacancyStore`]; the read
//! API queries through [`VacancyStore`]. MongoDB backs both in production
//! ([`mongo`]); tests and `STORE=memory` runs use the in-memory versions
//! ([`memory`]).

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CandidateVacancy, StoredVacancy};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("invalid record id: {0}")]
    InvalidId(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Per-channel resume points.
///
/// `advance` is an idempotent upsert and never moves a cursor backwards.
/// Different channels may be advanced concurrently; the worker serializes
/// calls for any single channel by construction.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Last processed message id, 0 when the channel has no state yet.
    async fn last_message_id(&self, channel_id: &str) -> Result<i64, StoreError>;

    async fn advance(&self, channel_id: &str, message_id: i64) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    PublishedDate,
    Title,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published_date" => Some(Self::PublishedDate),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublishedDate => "published_date",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Mongo-style order flag: 1 ascending, -1 descending.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }
}

/// List query for the read API. Salary bounds select vacancies whose
/// advertised range overlaps the requested one.
#[derive(Debug, Clone)]
pub struct VacancyQuery {
    pub company: Option<String>,
    pub specialization: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub skip: u64,
    pub limit: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for VacancyQuery {
    fn default() -> Self {
        Self {
            company: None,
            specialization: None,
            salary_min: None,
            salary_max: None,
            skip: 0,
            limit: 10,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VacancyPage {
    pub vacancies: Vec<StoredVacancy>,
    pub total: u64,
}

/// Deduplicating persistence gateway plus the read-side queries.
#[async_trait]
pub trait VacancyStore: Send + Sync {
    /// Idempotent insert keyed on `(telegram_message_id, channel_id)`.
    /// Stamps `parsed_at` with the current time on insert. Duplicate-key
    /// races resolve to `AlreadyExists`, never an error, so the call is
    /// safely retryable.
    async fn save_if_new(
        &self,
        candidate: &CandidateVacancy,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<SaveOutcome, StoreError>;

    async fn exists(
        &self,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<bool, StoreError>;

    async fn list(&self, query: &VacancyQuery) -> Result<VacancyPage, StoreError>;

    /// Single-record lookup. `Err(InvalidId)` for malformed ids, `Ok(None)`
    /// for well-formed ids with no record.
    async fn get(&self, id: &str) -> Result<Option<StoredVacancy>, StoreError>;
}
