//! Per-URL worker: the full pipeline for one claimed queue row.
//!
//! Every failure mode funnels through a single `CrawlSkip` value at the end
//! of `process_url`; workers never panic across the scheduler boundary and
//! always leave their row in a terminal state (visited or errored).

use std::time::Duration;

use rand::prelude::*;
use tracing::{debug, error, info};

use crate::core::config::MIN_CONTENT_LENGTH;
use crate::core::content_quality::{gate_content, is_spam, ContentGate};
use crate::core::types::{now_rfc3339, ClaimedUrl, CrawlSkip, CrawledPage, PageExtract};
use crate::core::AppState;
use crate::scraping::{fetch, parse, render, robots, sitemap};

/// Process one claimed URL end to end and settle its queue row.
pub async fn process_url(state: &AppState, item: &ClaimedUrl, timeout_factor: f64) {
    info!(url = %item.url, "processing");

    // Sitemap harvesting is opportunistic link discovery; its failures are
    // isolated from the fate of the URL itself.
    let harvested = sitemap::harvest(&state.http_client, &item.domain).await;
    if !harvested.is_empty() {
        info!(domain = %item.domain, count = harvested.len(), "sitemap links found");
        let links: Vec<String> = harvested.into_iter().collect();
        if let Err(err) = state.queue.insert_bulk(&links, &state.pages).await {
            error!(domain = %item.domain, %err, "failed to queue sitemap links");
        }
    }

    let outcome = match crawl_page(&state.http_client, &item.url, timeout_factor).await {
        Ok(page) => persist(state, item, page).await,
        Err(skip) => Err(skip),
    };

    match outcome {
        Ok(()) => info!(url = %item.url, "done"),
        Err(CrawlSkip::RobotsDenied) => {
            // Policy compliance counts as processed; see release notes about
            // site-wide disallows consuming their seeds.
            if let Err(err) = state.queue.mark_visited(item.id).await {
                error!(id = item.id, %err, "failed to mark robots-denied URL visited");
            }
        }
        Err(skip) => {
            info!(url = %item.url, reason = skip.kind(), "attempt failed");
            if let Err(err) = state
                .queue
                .log_error(&item.url, skip.kind(), &skip.to_string())
                .await
            {
                debug!(%err, "error log write failed");
            }
            if let Err(err) = state.queue.mark_error(item.id).await {
                error!(id = item.id, %err, "failed to mark URL errored");
            }
        }
    }

    // Polite pacing before the worker slot is released.
    let pause = rand::rng().random_range(1.0..4.0);
    tokio::time::sleep(Duration::from_secs_f64(pause)).await;
}

/// Fetch and extract one page: robots gate, static fetch, HTML pipeline,
/// render fallback, spam filter, link extraction.
pub async fn crawl_page(
    client: &reqwest::Client,
    url: &str,
    timeout_factor: f64,
) -> Result<CrawledPage, CrawlSkip> {
    if !robots::can_fetch(client, url).await {
        return Err(CrawlSkip::RobotsDenied);
    }

    let html = fetch::fetch_page(client, url, timeout_factor).await?;

    let static_extract = parse::extract_content(&html).ok_or(CrawlSkip::NotIndexable)?;
    let text_len = static_extract.text.chars().count();

    let extract = match gate_content(text_len, static_extract.script_count) {
        ContentGate::Accept => PageExtract {
            title: static_extract.title,
            text: static_extract.text,
            language: static_extract.language,
            timestamp: now_rfc3339(),
        },
        ContentGate::NeedsRender => {
            info!(url, scripts = static_extract.script_count, "escalating to render fallback");
            let rendered = render::fetch_with_js(url).await.map_err(|err| {
                debug!(url, %err, "render fallback failed");
                CrawlSkip::RenderFailed
            })?;
            if rendered.text.chars().count() >= MIN_CONTENT_LENGTH {
                rendered
            } else {
                return Err(CrawlSkip::RenderFailed);
            }
        }
        ContentGate::TooShort => return Err(CrawlSkip::TooShort),
    };

    if is_spam(&extract.text) {
        return Err(CrawlSkip::Spam);
    }

    let links = parse::extract_links(&html, url);
    debug!(url, links = links.len(), "links extracted");

    Ok(CrawledPage { extract, links })
}

async fn persist(
    state: &AppState,
    item: &ClaimedUrl,
    page: CrawledPage,
) -> Result<(), CrawlSkip> {
    state
        .pages
        .save(&item.url, &page.extract)
        .await
        .map_err(|err| CrawlSkip::Store(err.to_string()))?;

    if !page.links.is_empty() {
        state
            .queue
            .insert_bulk(&page.links, &state.pages)
            .await
            .map_err(|err| CrawlSkip::Store(err.to_string()))?;
    }

    state
        .queue
        .mark_visited(item.id)
        .await
        .map_err(|err| CrawlSkip::Store(err.to_string()))?;
    Ok(())
}
