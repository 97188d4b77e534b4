// src/monitor/scheduler.rs
//! The monitoring loop.
//!
//! Each cycle runs one worker per configured channel (concurrently in the
//! default mode, one-by-one with a rate-limit delay in sequential mode),
//! waits for all of them, then sleeps. Channel failures are contained per
//! channel; the loop itself only stops on the shutdown token.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::monitor::worker::run_channel_cycle;
use crate::monitor::{ensure_metrics_described, PipelineCtx};
use crate::source::ChannelRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleMode {
    /// All channels at once, fan-out / fan-in.
    Concurrent,
    /// One channel at a time with a delay in between (gentler on the source).
    Sequential { channel_delay: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub mode: ScheduleMode,
    /// Delay between cycles.
    pub cycle_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Concurrent,
            cycle_delay: Duration::from_secs(60),
        }
    }
}

/// Run monitoring cycles until `shutdown` fires.
///
/// Invalid channel references are dropped up front with an error log; the
/// loop refuses to start if nothing valid remains. The in-flight cycle is
/// allowed to finish after cancellation (each extraction call carries its
/// own timeout, so that wait is bounded), then the source is closed.
pub async fn run_monitor(
    ctx: Arc<PipelineCtx>,
    channels: Vec<String>,
    cfg: MonitorConfig,
    shutdown: CancellationToken,
) {
    ensure_metrics_described();

    let channels: Vec<ChannelRef> = channels
        .iter()
        .filter_map(|raw| match ChannelRef::parse(raw) {
            Ok(c) => Some(c),
            Err(e) => {
                error!(channel = raw.as_str(), error = %e, "invalid channel reference, skipping");
                None
            }
        })
        .collect();

    if channels.is_empty() {
        error!("no valid channels to monitor");
        return;
    }

    info!(channels = channels.len(), mode = ?cfg.mode, "monitoring started");
    gauge!("monitor_up").set(1.0);

    while !shutdown.is_cancelled() {
        match &cfg.mode {
            ScheduleMode::Concurrent => {
                join_all(channels.iter().map(|c| run_guarded_cycle(&ctx, c))).await;
            }
            ScheduleMode::Sequential { channel_delay } => {
                for channel in &channels {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    run_guarded_cycle(&ctx, channel).await;
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(*channel_delay) => {}
                    }
                }
            }
        }
        counter!("monitor_cycles_total").increment(1);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(cfg.cycle_delay) => {}
        }
    }

    gauge!("monitor_up").set(0.0);
    for channel in &channels {
        gauge!("monitor_channel_active", "channel" => channel.to_string()).set(0.0);
    }
    if let Err(e) = ctx.source.close().await {
        warn!(error = %e, "closing channel source failed");
    }
    info!("monitoring stopped");
}

/// One channel's cycle with its failure contained: an error is logged and
/// counted, flips the channel's activity gauge, and goes no further.
async fn run_guarded_cycle(ctx: &PipelineCtx, channel: &ChannelRef) {
    let channel_id = channel.to_string();
    match run_channel_cycle(ctx, channel).await {
        Ok(summary) => {
            gauge!("monitor_channel_active", "channel" => channel_id.clone()).set(1.0);
            info!(
                channel = %channel_id,
                fetched = summary.fetched,
                stored = summary.stored,
                duplicates = summary.duplicates,
                rejected = summary.rejected,
                no_vacancy = summary.no_vacancy,
                failed = summary.failed,
                cursor = summary.advanced_to,
                "channel cycle complete"
            );
        }
        Err(e) => {
            counter!("monitor_errors_total", "channel" => channel_id.clone()).increment(1);
            gauge!("monitor_channel_active", "channel" => channel_id.clone()).set(0.0);
            error!(channel = %channel_id, error = %e, "channel cycle failed");
        }
    }
}
