use chrono::{DateTime, Utc};

/// A queue row handed to a worker by `claim`. While a worker holds one of
/// these, the row's `in_progress` flag is set in the queue store.
#[derive(Debug, Clone)]
pub struct ClaimedUrl {
    pub id: i64,
    pub url: String,
    pub domain: String,
}

/// Extracted page content ready for the content store.
#[derive(Debug, Clone)]
pub struct PageExtract {
    pub title: String,
    pub text: String,
    pub language: String,
    /// RFC 3339 timestamp of the extraction (the render fallback stamps its
    /// own, taken after the page settled).
    pub timestamp: String,
}

/// Result of the static HTML pipeline before the minimum-content gate.
#[derive(Debug, Clone)]
pub struct StaticExtract {
    pub title: String,
    pub text: String,
    pub language: String,
    pub script_count: usize,
}

/// Final result of crawling one page: content plus outbound links.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub extract: PageExtract,
    pub links: Vec<String>,
}

/// Why a URL attempt produced nothing indexable.
///
/// Every variant except `RobotsDenied` is recorded as an error against the
/// queue row, so chronically useless URLs eventually blacklist themselves.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CrawlSkip {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("bot trap (403 with bot marker)")]
    BotTrap,
    #[error("disallowed by robots.txt")]
    RobotsDenied,
    #[error("page is noindex, untitled, or an error page")]
    NotIndexable,
    #[error("content below minimum length")]
    TooShort,
    #[error("render fallback produced no usable content")]
    RenderFailed,
    #[error("spam content")]
    Spam,
    #[error("store error: {0}")]
    Store(String),
}

impl CrawlSkip {
    /// Short machine-readable label stored in the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlSkip::Transport(_) => "transport",
            CrawlSkip::HttpStatus(_) => "http_status",
            CrawlSkip::BotTrap => "bot_trap",
            CrawlSkip::RobotsDenied => "robots_denied",
            CrawlSkip::NotIndexable => "not_indexable",
            CrawlSkip::TooShort => "too_short",
            CrawlSkip::RenderFailed => "render_failed",
            CrawlSkip::Spam => "spam",
            CrawlSkip::Store(_) => "store",
        }
    }
}

/// Post-operation state of a domain's daily counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainQuota {
    pub count: i64,
    pub whitelisted: bool,
}

impl DomainQuota {
    pub fn exhausted(&self) -> bool {
        !self.whitelisted && self.count >= crate::core::config::DOMAIN_LIMIT
    }
}

pub fn now_rfc3339() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339()
}
