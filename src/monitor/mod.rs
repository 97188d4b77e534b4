// src/monitor/mod.rs
//! The ingestion pipeline: per-channel workers driven by a monitoring loop.

pub mod scheduler;
pub mod worker;

use std::sync::Arc;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::extract::Extractor;
use crate::models::WorkFormat;
use crate::retry::RetryPolicy;
use crate::source::ChannelSource;
use crate::storage::{CursorStore, VacancyStore};
use crate::validator::ValidatorConfig;

/// Everything a channel cycle needs. One instance is shared by all channel
/// tasks; per-channel state (cursor, message batch) stays inside each task.
pub struct PipelineCtx {
    pub source: Arc<dyn ChannelSource>,
    pub extractor: Arc<dyn Extractor>,
    pub vacancies: Arc<dyn VacancyStore>,
    pub cursors: Arc<dyn CursorStore>,
    pub validator: ValidatorConfig,
    pub retry: RetryPolicy,
    /// Accepted work formats; `None` accepts everything.
    pub accept_formats: Option<Vec<WorkFormat>>,
    /// Page size for each channel fetch.
    pub fetch_limit: usize,
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Completed monitoring cycles.");
        describe_counter!(
            "monitor_messages_processed_total",
            "Messages walked by channel workers, per channel."
        );
        describe_counter!(
            "monitor_vacancies_stored_total",
            "New vacancies persisted, per channel."
        );
        describe_counter!(
            "monitor_duplicates_total",
            "Messages skipped because their vacancy was already stored."
        );
        describe_counter!(
            "monitor_rejected_total",
            "Messages rejected by the validator before extraction."
        );
        describe_counter!(
            "monitor_no_vacancy_total",
            "Extractions that cleanly found no (matching) vacancy."
        );
        describe_counter!(
            "monitor_errors_total",
            "Per-message and per-channel failures, per channel."
        );
        describe_counter!(
            "monitor_extraction_retries_total",
            "Extraction attempts repeated after a transient failure."
        );
        describe_histogram!("extraction_request_ms", "Extraction call time in milliseconds.");
        describe_gauge!(
            "monitor_last_success_ts",
            "Unix ts of the channel's last successful cycle."
        );
        describe_gauge!(
            "monitor_channel_active",
            "1 while a channel is being monitored without errors, 0 otherwise."
        );
        describe_gauge!("monitor_up", "1 while the monitoring loop is running.");
    });
}
