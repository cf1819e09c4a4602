use std::sync::Arc;

use crate::core::config::CrawlerConfig;
use crate::store::{PageStore, QueueStore};

/// Shared dependencies for the scheduler and its workers.
///
/// Everything here is built once at startup and passed explicitly; there are
/// no ambient globals. The HTTP client is safe for concurrent use and keeps
/// at most five idle connections per host.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub queue: QueueStore,
    pub pages: PageStore,
    pub config: Arc<CrawlerConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("data_dir", &self.config.data_dir)
            .finish()
    }
}

impl AppState {
    pub fn new(
        http_client: reqwest::Client,
        queue: QueueStore,
        pages: PageStore,
        config: Arc<CrawlerConfig>,
    ) -> Self {
        Self {
            http_client,
            queue,
            pages,
            config,
        }
    }
}
