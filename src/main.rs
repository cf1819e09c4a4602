use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use webpatrol::config::CrawlerConfig;
use webpatrol::{scheduler, AppState, PageStore, QueueStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(CrawlerConfig::from_env());

    std::fs::create_dir_all(&config.data_dir).context("failed to create data directory")?;

    // Console plus a rolling file under data/; the guard must outlive main.
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "webpatrol.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("=== webpatrol v{} continuous crawl engine ===", env!("CARGO_PKG_VERSION"));
    info!(
        "data directory: {}",
        std::fs::canonicalize(&config.data_dir)
            .unwrap_or_else(|_| config.data_dir.clone())
            .display()
    );
    info!(
        "system: {} {}",
        sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        sysinfo::System::os_version().unwrap_or_default()
    );

    // Queue store: a schema failure here is fatal.
    let queue = QueueStore::connect(Arc::clone(&config))
        .await
        .context("queue store unavailable")?;
    queue
        .init_schema()
        .await
        .context("queue store schema initialization failed")?;
    queue.seed_if_empty().await.context("seeding failed")?;

    let pages = PageStore::open(&config.sqlite_path())
        .await
        .context("content store initialization failed")?;

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .context("failed to build HTTP client")?;

    let state = AppState::new(http_client, queue, pages, config);

    // Cooperative shutdown: ctrl-c only raises a flag, and the scheduler
    // checks it between batches, so in-flight workers finish their batch
    // before the process exits.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing current batch before exit");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    scheduler::run(state, shutdown).await;

    Ok(())
}
