//! robots.txt gate.
//!
//! Only the `User-agent: *` group's `Disallow:` paths are honored. The gate
//! is best-effort: any network, timeout, or parse failure answers "allowed"
//! so a broken robots endpoint can never stall the crawl.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use tracing::{debug, info};
use url::Url;

use crate::core::config::ROBOTS_TIMEOUT_SECS;

/// Transport attempts against the robots endpoint before failing open.
const MAX_ROBOTS_ATTEMPTS: usize = 2;

/// Whether crawl policy permits fetching `url`.
pub async fn can_fetch(client: &reqwest::Client, url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    let robots_url = match parsed.port() {
        Some(port) => format!("{}://{}:{}/robots.txt", parsed.scheme(), host, port),
        None => format!("{}://{}/robots.txt", parsed.scheme(), host),
    };

    let attempts = AtomicUsize::new(0);
    let fetch = || async {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        let result = client
            .get(&robots_url)
            .timeout(Duration::from_secs(ROBOTS_TIMEOUT_SECS))
            .send()
            .await;
        match result {
            Ok(response) => Ok(response),
            Err(err) if n + 1 < MAX_ROBOTS_ATTEMPTS => Err(backoff::Error::transient(err)),
            Err(err) => Err(backoff::Error::permanent(err)),
        }
    };

    let backoff_policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(2))
        .with_max_interval(Duration::from_secs(10))
        .build();

    let response = match retry(backoff_policy, fetch).await {
        Ok(response) => response,
        Err(err) => {
            debug!(%robots_url, %err, "robots.txt unreachable, failing open");
            return true;
        }
    };

    if response.status().as_u16() != 200 {
        return true;
    }
    let Ok(body) = response.text().await else {
        return true;
    };

    let disallowed = parse_wildcard_disallows(&body);
    for prefix in &disallowed {
        if parsed.path().starts_with(prefix.as_str()) {
            info!(url, prefix = %prefix, "blocked by robots.txt");
            return false;
        }
    }
    true
}

/// Collect `Disallow:` paths belonging to the `User-agent: *` group.
pub fn parse_wildcard_disallows(content: &str) -> Vec<String> {
    let mut disallowed = Vec::new();
    let mut in_wildcard_group = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_lowercase();
        if lower.starts_with("user-agent:") {
            let agent = line.splitn(2, ':').nth(1).unwrap_or("").trim();
            in_wildcard_group = agent == "*";
        } else if lower.starts_with("disallow:") && in_wildcard_group {
            let path = line.splitn(2, ':').nth(1).unwrap_or("").trim();
            if !path.is_empty() {
                disallowed.push(path.to_string());
            }
        }
    }

    disallowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_wildcard_group_is_collected() {
        let content = "User-agent: Googlebot\nDisallow: /google-only/\n\
                       User-agent: *\nDisallow: /private/\nDisallow: /tmp/\n\
                       User-agent: BadBot\nDisallow: /";
        assert_eq!(parse_wildcard_disallows(content), vec!["/private/", "/tmp/"]);
    }

    #[test]
    fn empty_disallow_lines_are_ignored() {
        let content = "User-agent: *\nDisallow:\nDisallow: /keep-out/";
        assert_eq!(parse_wildcard_disallows(content), vec!["/keep-out/"]);
    }

    #[tokio::test]
    async fn disallowed_prefix_blocks_and_others_pass() {
        let mut server = mockito::Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /private/")
            .expect_at_least(1)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let blocked = format!("{}/private/x", server.url());
        let allowed = format!("{}/public/y", server.url());

        assert!(!can_fetch(&client, &blocked).await);
        assert!(can_fetch(&client, &allowed).await);
    }

    #[tokio::test]
    async fn missing_robots_fails_open() {
        let mut server = mockito::Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(404)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/anything", server.url());
        assert!(can_fetch(&client, &url).await);
    }
}
