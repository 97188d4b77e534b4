//! Harvester binary entrypoint.
//! Wires the stores, the channel source and the extractor into the
//! monitoring loop, serves the read API, and shuts everything down cleanly
//! on ctrl-c.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vacancy_harvester::api;
use vacancy_harvester::config::{Settings, StoreKind};
use vacancy_harvester::extract;
use vacancy_harvester::metrics::Metrics;
use vacancy_harvester::monitor::scheduler::run_monitor;
use vacancy_harvester::monitor::PipelineCtx;
use vacancy_harvester::retry::RetryPolicy;
use vacancy_harvester::source::botapi::BotApiSource;
use vacancy_harvester::source::ChannelSource;
use vacancy_harvester::storage::memory::{MemoryCursorStore, MemoryVacancyStore};
use vacancy_harvester::storage::mongo::{self, MongoCursorStore, MongoVacancyStore};
use vacancy_harvester::storage::{CursorStore, VacancyStore};
use vacancy_harvester::validator::ValidatorConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env().context("loading settings")?;
    let metrics = Metrics::init(settings.monitor.cycle_delay.as_secs());

    let (vacancies, cursors): (Arc<dyn VacancyStore>, Arc<dyn CursorStore>) =
        match settings.store {
            StoreKind::Mongo => {
                let client = mongodb::Client::with_uri_str(&settings.mongodb_url)
                    .await
                    .context("connecting to MongoDB")?;
                let db = client.database(&settings.database_name);
                mongo::ensure_indexes(&db)
                    .await
                    .context("creating MongoDB indexes")?;
                info!(database = %settings.database_name, "connected to MongoDB");
                (
                    Arc::new(MongoVacancyStore::new(&db)),
                    Arc::new(MongoCursorStore::new(&db)),
                )
            }
            StoreKind::Memory => {
                warn!("using in-memory store; nothing survives a restart");
                (
                    Arc::new(MemoryVacancyStore::new()),
                    Arc::new(MemoryCursorStore::new()),
                )
            }
        };

    let source: Arc<dyn ChannelSource> = Arc::new(
        BotApiSource::new(&settings.telegram_bot_token).context("building Telegram client")?,
    );
    // Unreachable/unauthenticated channel source is fatal at startup.
    source
        .health_check()
        .await
        .context("Telegram authentication failed")?;

    let extractor = extract::build_extractor(&settings)?;
    info!(extractor = extractor.name(), "extraction backend ready");

    let validator = ValidatorConfig::load_default().context("loading validator config")?;

    let ctx = Arc::new(PipelineCtx {
        source: source.clone(),
        extractor,
        vacancies: vacancies.clone(),
        cursors,
        validator,
        retry: RetryPolicy::default(),
        accept_formats: settings.work_format_filter.clone(),
        fetch_limit: settings.fetch_limit,
    });

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(run_monitor(
        ctx,
        settings.channels.clone(),
        settings.monitor.clone(),
        shutdown.clone(),
    ));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let app = api::router(api::AppState { vacancies }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "read API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("serving read API")?;

    // The monitor stops spawning cycles, finishes the in-flight one, and
    // closes the source before the task resolves.
    shutdown.cancel();
    let _ = monitor_task.await;
    Ok(())
}
