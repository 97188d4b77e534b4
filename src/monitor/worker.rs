// src/monitor/worker.rs
//! Per-channel processing cycle:
//! fetch -> validate -> extract (with bounded retry) -> persist -> advance.
//!
//! Per-message failures are contained here and never abort the cycle; only a
//! failed fetch (or an unreadable cursor) terminates a channel's cycle, and
//! even that touches nothing but this channel. Once a non-empty batch has
//! been walked, the cursor advances to the newest fetched id regardless of
//! individual outcomes: forward progress over completeness. A message that
//! keeps failing is therefore dropped rather than retried forever; the
//! unique store index absorbs any replay caused by a crash before advance.

use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::extract::ExtractError;
use crate::monitor::PipelineCtx;
use crate::source::{ChannelRef, RawMessage, SourceError};
use crate::storage::{SaveOutcome, StoreError};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub fetched: usize,
    pub stored: usize,
    pub duplicates: usize,
    /// Rejected by the validator (normal outcome, not an error).
    pub rejected: usize,
    /// Extraction cleanly found nothing, or the work-format filter dropped it.
    pub no_vacancy: usize,
    /// Extraction/persistence failures; the cycle kept going past them.
    pub failed: usize,
    pub advanced_to: Option<i64>,
}

/// Terminates a single channel's cycle. Never crosses channels.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("message fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("cursor read failed: {0}")]
    Cursor(#[from] StoreError),
}

enum MessageOutcome {
    Stored,
    Duplicate,
    Rejected,
    NoVacancy,
    Failed,
}

pub async fn run_channel_cycle(
    ctx: &PipelineCtx,
    channel: &ChannelRef,
) -> Result<CycleSummary, CycleError> {
    let channel_id = channel.to_string();

    let since = ctx.cursors.last_message_id(&channel_id).await?;
    debug!(channel = %channel_id, since, phase = "fetching", "starting channel cycle");

    let mut messages = ctx
        .source
        .fetch_messages(channel, since, ctx.fetch_limit)
        .await?;
    // Sources are expected to deliver oldest-first; normalize regardless.
    messages.sort_by_key(|m| m.id);

    let mut summary = CycleSummary {
        fetched: messages.len(),
        ..Default::default()
    };
    let Some(newest) = messages.last().map(|m| m.id) else {
        debug!(channel = %channel_id, "no new messages");
        return Ok(summary);
    };

    for message in &messages {
        counter!("monitor_messages_processed_total", "channel" => channel_id.clone())
            .increment(1);
        match process_message(ctx, &channel_id, message).await {
            MessageOutcome::Stored => {
                summary.stored += 1;
                counter!("monitor_vacancies_stored_total", "channel" => channel_id.clone())
                    .increment(1);
            }
            MessageOutcome::Duplicate => {
                summary.duplicates += 1;
                counter!("monitor_duplicates_total", "channel" => channel_id.clone())
                    .increment(1);
            }
            MessageOutcome::Rejected => {
                summary.rejected += 1;
                counter!("monitor_rejected_total", "channel" => channel_id.clone())
                    .increment(1);
            }
            MessageOutcome::NoVacancy => {
                summary.no_vacancy += 1;
                counter!("monitor_no_vacancy_total", "channel" => channel_id.clone())
                    .increment(1);
            }
            MessageOutcome::Failed => {
                summary.failed += 1;
                counter!("monitor_errors_total", "channel" => channel_id.clone()).increment(1);
            }
        }
    }

    // Every fetched message reached a terminal outcome, so the batch counts
    // as handled: advance to its newest id. If the advance itself fails the
    // next cycle refetches the batch and the dedup index absorbs the replay.
    match ctx.cursors.advance(&channel_id, newest).await {
        Ok(()) => {
            summary.advanced_to = Some(newest);
            gauge!("monitor_last_success_ts", "channel" => channel_id.clone())
                .set(chrono::Utc::now().timestamp() as f64);
            debug!(channel = %channel_id, cursor = newest, phase = "advancing", "cursor advanced");
        }
        Err(e) => {
            summary.failed += 1;
            counter!("monitor_errors_total", "channel" => channel_id.clone()).increment(1);
            warn!(channel = %channel_id, error = %e, "cursor advance failed; batch will be refetched");
        }
    }

    Ok(summary)
}

async fn process_message(
    ctx: &PipelineCtx,
    channel_id: &str,
    message: &RawMessage,
) -> MessageOutcome {
    let classification = ctx.validator.classify(message.text.as_deref());
    if !classification.is_valid {
        debug!(
            channel = channel_id,
            message_id = message.id,
            reason = classification.reason,
            phase = "validating",
            "message rejected"
        );
        return MessageOutcome::Rejected;
    }
    // Validation guarantees text is present from here on.
    let text = message.text.as_deref().unwrap_or_default();

    // Cheap dedup probe before paying for an extraction call. Only relevant
    // when a crash before the cursor advance replays a batch.
    match ctx.vacancies.exists(message.id, channel_id).await {
        Ok(true) => {
            debug!(
                channel = channel_id,
                message_id = message.id,
                "already stored, skipping"
            );
            return MessageOutcome::Duplicate;
        }
        Ok(false) => {}
        Err(e) => {
            error!(
                channel = channel_id,
                message_id = message.id,
                error = %e,
                phase = "persisting",
                "duplicate probe failed"
            );
            return MessageOutcome::Failed;
        }
    }

    let extraction = ctx
        .retry
        .run(ExtractError::is_transient, || {
            ctx.extractor.extract(text, message.posted_at)
        })
        .await;

    let candidate = match extraction {
        Ok(Some(candidate)) => candidate,
        Ok(None) => {
            debug!(
                channel = channel_id,
                message_id = message.id,
                phase = "extracting",
                "not a vacancy"
            );
            return MessageOutcome::NoVacancy;
        }
        Err(e @ ExtractError::Unavailable(_)) => {
            warn!(
                channel = channel_id,
                message_id = message.id,
                error = %e,
                phase = "extracting",
                "extraction unavailable after retries, skipping message"
            );
            return MessageOutcome::Failed;
        }
        Err(e @ ExtractError::Malformed(_)) => {
            warn!(
                channel = channel_id,
                message_id = message.id,
                error = %e,
                phase = "extracting",
                "extraction output failed schema validation"
            );
            return MessageOutcome::Failed;
        }
    };

    if let Some(accepted) = &ctx.accept_formats {
        if !accepted.contains(&candidate.work_format) {
            debug!(
                channel = channel_id,
                message_id = message.id,
                work_format = %candidate.work_format,
                "dropped by work-format filter"
            );
            return MessageOutcome::NoVacancy;
        }
    }

    match ctx
        .vacancies
        .save_if_new(&candidate, message.id, channel_id)
        .await
    {
        Ok(SaveOutcome::Inserted) => {
            info!(
                channel = channel_id,
                message_id = message.id,
                title = %candidate.title,
                "vacancy stored"
            );
            MessageOutcome::Stored
        }
        Ok(SaveOutcome::AlreadyExists) => MessageOutcome::Duplicate,
        Err(e) => {
            // Deliberate trade-off: the cursor still advances past this
            // message, so a store outage can lose it. See crate docs.
            error!(
                channel = channel_id,
                message_id = message.id,
                error = %e,
                phase = "persisting",
                "failed to persist vacancy"
            );
            MessageOutcome::Failed
        }
    }
}
