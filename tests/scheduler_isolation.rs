// tests/scheduler_isolation.rs
//
// Monitor-loop behavior: one channel's failure never blocks another's
// cycle, shutdown stops new cycles and closes the source, and invalid
// channel lists refuse to start.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vacancy_harvester::extract::mock::MockExtractor;
use vacancy_harvester::monitor::PipelineCtx;
use vacancy_harvester::retry::RetryPolicy;
use vacancy_harvester::source::mock::MockSource;
use vacancy_harvester::storage::memory::{MemoryCursorStore, MemoryVacancyStore};
use vacancy_harvester::validator::ValidatorConfig;
use vacancy_harvester::{run_monitor, MonitorConfig, ScheduleMode};

const VACANCY: &str = "Vacancy: Rust Developer (remote)\n\
    Requirements: Rust, async\n\
    Salary: 4000 USD\n\
    Contacts: @hr";

fn harness() -> (Arc<MockSource>, Arc<MemoryVacancyStore>, Arc<PipelineCtx>) {
    let source = Arc::new(MockSource::new());
    let vacancies = Arc::new(MemoryVacancyStore::new());
    let ctx = Arc::new(PipelineCtx {
        source: source.clone(),
        extractor: Arc::new(MockExtractor::heuristic()),
        vacancies: vacancies.clone(),
        cursors: Arc::new(MemoryCursorStore::new()),
        validator: ValidatorConfig::default(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
            max_delay: Duration::ZERO,
        },
        accept_formats: None,
        fetch_limit: 50,
    });
    (source, vacancies, ctx)
}

async fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(deadline, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn failing_channel_does_not_block_the_healthy_one() {
    let (source, vacancies, ctx) = harness();
    source.fail_channel("@broken");
    source.push_history("@healthy", vec![MockSource::msg(1, Some(VACANCY))]);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_monitor(
        ctx,
        vec!["@broken".into(), "@healthy".into()],
        MonitorConfig {
            mode: ScheduleMode::Concurrent,
            cycle_delay: Duration::from_secs(3600),
        },
        shutdown.clone(),
    ));

    // The healthy channel persists its vacancy in the same cycle in which
    // the broken one errors out.
    wait_until(Duration::from_secs(5), || vacancies.len() == 1).await;
    assert_eq!(vacancies.all()[0].channel_id, "@healthy");

    shutdown.cancel();
    task.await.unwrap();
    assert!(source.closed(), "shutdown must close the channel source");
}

#[tokio::test]
async fn sequential_mode_also_isolates_failures() {
    let (source, vacancies, ctx) = harness();
    source.fail_channel("@broken");
    source.push_history("@healthy", vec![MockSource::msg(1, Some(VACANCY))]);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_monitor(
        ctx,
        vec!["@broken".into(), "@healthy".into()],
        MonitorConfig {
            mode: ScheduleMode::Sequential {
                channel_delay: Duration::from_millis(1),
            },
            cycle_delay: Duration::from_secs(3600),
        },
        shutdown.clone(),
    ));

    wait_until(Duration::from_secs(5), || vacancies.len() == 1).await;

    shutdown.cancel();
    task.await.unwrap();
    assert!(source.closed());
}

#[tokio::test]
async fn monitor_refuses_to_start_without_valid_channels() {
    let (_source, vacancies, ctx) = harness();
    let shutdown = CancellationToken::new();

    // Returns on its own: nothing valid to poll.
    tokio::time::timeout(
        Duration::from_secs(2),
        run_monitor(
            ctx,
            vec!["not a channel!".into(), "".into()],
            MonitorConfig::default(),
            shutdown,
        ),
    )
    .await
    .expect("monitor should bail out immediately");

    assert!(vacancies.is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_the_loop_before_the_first_cycle() {
    let (source, vacancies, ctx) = harness();
    source.push_history("@healthy", vec![MockSource::msg(1, Some(VACANCY))]);

    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(
        Duration::from_secs(2),
        run_monitor(
            ctx,
            vec!["@healthy".into()],
            MonitorConfig::default(),
            shutdown,
        ),
    )
    .await
    .expect("cancelled monitor should return promptly");

    assert!(vacancies.is_empty(), "no cycle may start after cancellation");
    assert!(source.closed());
}
