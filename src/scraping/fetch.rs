//! Static page fetch: browser-like headers, rotating user agents, transient
//! retry, and bot-trap detection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use rand::prelude::*;
use tracing::{info, warn};

use crate::core::config::{
    ACCEPT_HEADER, ACCEPT_LANGUAGE_HEADER, REFERER_HEADER, REQUEST_TIMEOUT_SECS, USER_AGENTS,
};
use crate::core::types::CrawlSkip;

/// Transport attempts per page before giving up.
const MAX_FETCH_ATTEMPTS: usize = 2;

/// Pick a user agent from the configured pool.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    USER_AGENTS[rng.random_range(0..USER_AGENTS.len())]
}

/// Fetch `url` and return its HTML body.
///
/// `timeout_factor` scales the configured request timeout; the adaptive
/// scheduler widens it when the host is under pressure. A 403 whose body
/// mentions bots is treated as detection by the remote site and skipped
/// without retry; any other non-200 status is a plain failure.
pub async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    timeout_factor: f64,
) -> Result<String, CrawlSkip> {
    let timeout = Duration::from_secs_f64(REQUEST_TIMEOUT_SECS as f64 * timeout_factor);

    let attempts = AtomicUsize::new(0);
    let send = || async {
        let dnt = if rand::rng().random_bool(0.5) { "1" } else { "0" };
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        let result = client
            .get(url)
            .header("User-Agent", random_user_agent())
            .header("Accept", ACCEPT_HEADER)
            .header("Accept-Language", ACCEPT_LANGUAGE_HEADER)
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Referer", REFERER_HEADER)
            .header("DNT", dnt)
            .timeout(timeout)
            .send()
            .await;
        match result {
            Ok(response) => Ok(response),
            Err(err) if n + 1 < MAX_FETCH_ATTEMPTS => Err(backoff::Error::transient(err)),
            Err(err) => Err(backoff::Error::permanent(err)),
        }
    };

    let backoff_policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(2))
        .with_max_interval(Duration::from_secs(10))
        .build();

    let response = retry(backoff_policy, send)
        .await
        .map_err(|err| CrawlSkip::Transport(err.to_string()))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|err| CrawlSkip::Transport(err.to_string()))?;

    if status == 403 && body.to_lowercase().contains("bot") {
        warn!(url, "bot trap page");
        return Err(CrawlSkip::BotTrap);
    }
    if status != 200 {
        info!(url, status, "non-200 response");
        return Err(CrawlSkip::HttpStatus(status));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ok_response_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><title>t</title></html>")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let body = fetch_page(&client, &format!("{}/page", server.url()), 1.0)
            .await
            .expect("fetch succeeds");
        assert!(body.contains("<title>t</title>"));
    }

    #[tokio::test]
    async fn forbidden_with_bot_marker_is_a_bot_trap() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/trap")
            .with_status(403)
            .with_body("Our Bot Protection flagged this request")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = fetch_page(&client, &format!("{}/trap", server.url()), 1.0)
            .await
            .expect_err("bot trap is a skip");
        assert!(matches!(err, CrawlSkip::BotTrap));
    }

    #[tokio::test]
    async fn plain_forbidden_is_a_status_failure() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/forbidden")
            .with_status(403)
            .with_body("nope")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = fetch_page(&client, &format!("{}/forbidden", server.url()), 1.0)
            .await
            .expect_err("403 is a failure");
        assert!(matches!(err, CrawlSkip::HttpStatus(403)));
    }

    #[tokio::test]
    async fn server_errors_are_status_failures() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/boom")
            .with_status(500)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = fetch_page(&client, &format!("{}/boom", server.url()), 1.0)
            .await
            .expect_err("500 is a failure");
        assert!(matches!(err, CrawlSkip::HttpStatus(500)));
    }
}
