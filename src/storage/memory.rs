// src/storage/memory.rs
//! In-memory store backends. Used by the test suite and by `STORE=memory`
//! runs where no MongoDB is available; behavior mirrors the Mongo backends,
//! unique-key semantics included.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{CandidateVacancy, ChannelCursorState, StoredVacancy};
use crate::storage::{
    CursorStore, SaveOutcome, SortField, SortOrder, StoreError, VacancyPage, VacancyQuery,
    VacancyStore,
};

#[derive(Default)]
pub struct MemoryCursorStore {
    inner: Mutex<HashMap<String, ChannelCursorState>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, channel_id: &str) -> Option<ChannelCursorState> {
        self.inner
            .lock()
            .expect("cursor store mutex poisoned")
            .get(channel_id)
            .cloned()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn last_message_id(&self, channel_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("cursor store mutex poisoned")
            .get(channel_id)
            .map(|s| s.last_message_id)
            .unwrap_or(0))
    }

    async fn advance(&self, channel_id: &str, message_id: i64) -> Result<(), StoreError> {
        let mut map = self.inner.lock().expect("cursor store mutex poisoned");
        let entry = map
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelCursorState {
                channel_id: channel_id.to_string(),
                last_message_id: 0,
                updated_at: Utc::now(),
            });
        entry.last_message_id = entry.last_message_id.max(message_id);
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryVacancyStore {
    inner: Mutex<Vec<StoredVacancy>>,
    seq: AtomicU64,
}

impl MemoryVacancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("vacancy store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<StoredVacancy> {
        self.inner
            .lock()
            .expect("vacancy store mutex poisoned")
            .clone()
    }

    /// Seed a record directly, bypassing the gateway (test setup).
    pub fn insert_raw(&self, stored: StoredVacancy) {
        self.inner
            .lock()
            .expect("vacancy store mutex poisoned")
            .push(stored);
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(v: &StoredVacancy, q: &VacancyQuery) -> bool {
    if let Some(company) = &q.company {
        if !contains_ci(&v.vacancy.company, company) {
            return false;
        }
    }
    if let Some(spec) = &q.specialization {
        if !contains_ci(&v.vacancy.title, spec) && !contains_ci(&v.vacancy.description, spec) {
            return false;
        }
    }
    if let Some(min) = q.salary_min {
        if v.vacancy.salary.range.max < min {
            return false;
        }
    }
    if let Some(max) = q.salary_max {
        if v.vacancy.salary.range.min > max {
            return false;
        }
    }
    true
}

#[async_trait]
impl VacancyStore for MemoryVacancyStore {
    async fn save_if_new(
        &self,
        candidate: &CandidateVacancy,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<SaveOutcome, StoreError> {
        let mut records = self.inner.lock().expect("vacancy store mutex poisoned");
        let dup = records
            .iter()
            .any(|v| v.telegram_message_id == telegram_message_id && v.channel_id == channel_id);
        if dup {
            return Ok(SaveOutcome::AlreadyExists);
        }
        // 24 hex chars, shaped like the ids the Mongo backend hands out.
        let id = format!("{:024x}", self.seq.fetch_add(1, Ordering::SeqCst) + 1);
        records.push(StoredVacancy {
            id,
            vacancy: candidate.clone(),
            telegram_message_id,
            channel_id: channel_id.to_string(),
            parsed_at: Utc::now(),
        });
        Ok(SaveOutcome::Inserted)
    }

    async fn exists(
        &self,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("vacancy store mutex poisoned")
            .iter()
            .any(|v| v.telegram_message_id == telegram_message_id && v.channel_id == channel_id))
    }

    async fn list(&self, query: &VacancyQuery) -> Result<VacancyPage, StoreError> {
        let records = self.inner.lock().expect("vacancy store mutex poisoned");
        let mut filtered: Vec<StoredVacancy> = records
            .iter()
            .filter(|v| matches(v, query))
            .cloned()
            .collect();
        let total = filtered.len() as u64;

        match query.sort_by {
            SortField::PublishedDate => {
                filtered.sort_by_key(|v| v.vacancy.published_date);
            }
            SortField::Title => filtered.sort_by(|a, b| a.vacancy.title.cmp(&b.vacancy.title)),
        }
        if query.sort_order == SortOrder::Desc {
            filtered.reverse();
        }

        let vacancies = filtered
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(VacancyPage { vacancies, total })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredVacancy>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("vacancy store mutex poisoned")
            .iter()
            .find(|v| v.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::mock::MockExtractor;
    use crate::models::WorkFormat;

    fn candidate(title: &str) -> CandidateVacancy {
        let mut c =
            MockExtractor::candidate_from_text(title, Utc::now(), WorkFormat::Remote);
        c.title = title.to_string();
        c
    }

    #[tokio::test]
    async fn save_if_new_is_idempotent_on_the_dedup_key() {
        let store = MemoryVacancyStore::new();
        let c = candidate("Rust Developer");

        let first = store.save_if_new(&c, 101, "-100123").await.unwrap();
        let second = store.save_if_new(&c, 101, "-100123").await.unwrap();

        assert_eq!(first, SaveOutcome::Inserted);
        assert_eq!(second, SaveOutcome::AlreadyExists);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn same_message_id_in_another_channel_is_a_new_record() {
        let store = MemoryVacancyStore::new();
        let c = candidate("Rust Developer");
        store.save_if_new(&c, 101, "-100123").await.unwrap();
        let out = store.save_if_new(&c, 101, "-100456").await.unwrap();
        assert_eq!(out, SaveOutcome::Inserted);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn absent_cursor_reads_as_zero_and_never_regresses() {
        let cursors = MemoryCursorStore::new();
        assert_eq!(cursors.last_message_id("-100123").await.unwrap(), 0);

        cursors.advance("-100123", 50).await.unwrap();
        cursors.advance("-100123", 30).await.unwrap();
        assert_eq!(cursors.last_message_id("-100123").await.unwrap(), 50);

        cursors.advance("-100123", 80).await.unwrap();
        assert_eq!(cursors.last_message_id("-100123").await.unwrap(), 80);
    }

    #[tokio::test]
    async fn list_filters_by_specialization_and_salary_overlap() {
        let store = MemoryVacancyStore::new();

        let mut rustdev = candidate("Senior Rust Developer");
        rustdev.salary.range.min = 3000;
        rustdev.salary.range.max = 5000;
        store.save_if_new(&rustdev, 1, "a").await.unwrap();

        let pm = candidate("Project Manager");
        store.save_if_new(&pm, 2, "a").await.unwrap();

        let page = store
            .list(&VacancyQuery {
                specialization: Some("rust".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.vacancies[0].vacancy.title, "Senior Rust Developer");

        // Salary 4000 falls inside rustdev's advertised range; pm advertises
        // no range (0..0) and is filtered out.
        let page = store
            .list(&VacancyQuery {
                salary_min: Some(4000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn list_paginates_and_sorts_by_title() {
        let store = MemoryVacancyStore::new();
        for (i, title) in ["b title", "a title", "c title"].iter().enumerate() {
            store
                .save_if_new(&candidate(title), i as i64 + 1, "a")
                .await
                .unwrap();
        }

        let page = store
            .list(&VacancyQuery {
                sort_by: SortField::Title,
                sort_order: SortOrder::Asc,
                skip: 1,
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.vacancies.len(), 1);
        assert_eq!(page.vacancies[0].vacancy.title, "b title");
    }
}
