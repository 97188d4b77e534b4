// src/extract/mock.rs
//! Deterministic extraction backend for tests and local runs
//! (`EXTRACTOR=mock`). No network, no credentials.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::extract::{ExtractError, Extractor};
use crate::models::{CandidateVacancy, ContactInfo, SalaryInfo, WorkFormat, UNSPECIFIED};

/// One scripted reply. Scripted outcomes are consumed per call (retries
/// consume too), after which the extractor falls back to the heuristic.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Vacancy(WorkFormat),
    NotAVacancy,
    Unavailable,
    Malformed,
}

#[derive(Default)]
pub struct MockExtractor {
    script: Mutex<VecDeque<MockOutcome>>,
    calls: AtomicU32,
}

impl MockExtractor {
    /// Text-driven mode: anything mentioning a vacancy parses, work format
    /// is guessed from the text. Same text, same output.
    pub fn heuristic() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Total extract calls, retries included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Build a plausible candidate out of raw text.
    pub fn candidate_from_text(
        text: &str,
        posted_at: DateTime<Utc>,
        work_format: WorkFormat,
    ) -> CandidateVacancy {
        let title: String = text
            .lines()
            .next()
            .unwrap_or("untitled")
            .trim()
            .chars()
            .take(80)
            .collect();
        let description: String = text.chars().take(300).collect();
        CandidateVacancy {
            title,
            published_date: posted_at,
            work_format,
            salary: SalaryInfo::default(),
            location: match work_format {
                WorkFormat::Remote => "remote".to_string(),
                _ => UNSPECIFIED.to_string(),
            },
            company: UNSPECIFIED.to_string(),
            description,
            contacts: ContactInfo::default(),
            raw_text: text.to_string(),
        }
    }

    fn heuristic_outcome(text: &str) -> MockOutcome {
        let lower = text.to_lowercase();
        let looks_like_vacancy = ["vacancy", "hiring", "ваканс", "ищем", "шукаємо"]
            .iter()
            .any(|t| lower.contains(t));
        if !looks_like_vacancy {
            return MockOutcome::NotAVacancy;
        }
        let remote = ["remote", "віддален", "удал"].iter().any(|t| lower.contains(t));
        MockOutcome::Vacancy(if remote {
            WorkFormat::Remote
        } else {
            WorkFormat::Office
        })
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(
        &self,
        text: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<Option<CandidateVacancy>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .expect("mock extractor mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Self::heuristic_outcome(text));
        match outcome {
            MockOutcome::Vacancy(format) => {
                Ok(Some(Self::candidate_from_text(text, posted_at, format)))
            }
            MockOutcome::NotAVacancy => Ok(None),
            MockOutcome::Unavailable => {
                Err(ExtractError::Unavailable("scripted outage".into()))
            }
            MockOutcome::Malformed => {
                Err(ExtractError::Malformed("scripted schema violation".into()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heuristic_is_deterministic() {
        let ex = MockExtractor::heuristic();
        let now = Utc::now();
        let text = "Вакансія: Rust engineer, remote, зп 5000";
        let a = ex.extract(text, now).await.unwrap().unwrap();
        let b = ex.extract(text, now).await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.work_format, WorkFormat::Remote);
        assert_eq!(ex.calls(), 2);
    }

    #[tokio::test]
    async fn non_vacancy_text_yields_none() {
        let ex = MockExtractor::heuristic();
        let out = ex.extract("weekly ecosystem digest", Utc::now()).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let ex = MockExtractor::scripted(vec![
            MockOutcome::Unavailable,
            MockOutcome::Vacancy(WorkFormat::Hybrid),
        ]);
        let now = Utc::now();
        assert!(ex.extract("x", now).await.is_err());
        let v = ex.extract("x", now).await.unwrap().unwrap();
        assert_eq!(v.work_format, WorkFormat::Hybrid);
    }
}
