//! Sitemap harvester: probes the well-known sitemap locations for a domain,
//! expands sitemap indexes recursively, and emits the URLs they list.
//! Everything here is best-effort; failures are logged at debug and skipped.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use url::Url;

use crate::core::urls::is_valid;

const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap"];
const SITEMAP_TIMEOUT_SECS: u64 = 10;

/// Sitemap indexes nest shallowly in practice; anything deeper is a loop.
const MAX_SITEMAP_DEPTH: usize = 4;

/// Probe the sitemap endpoints of `domain` (a bare host or an origin) and
/// return the union of valid URLs they declare.
pub async fn harvest(client: &reqwest::Client, domain: &str) -> HashSet<String> {
    harvest_at_depth(client, domain.to_string(), 0).await
}

fn harvest_at_depth(
    client: &reqwest::Client,
    domain: String,
    depth: usize,
) -> BoxFuture<'_, HashSet<String>> {
    async move {
        let mut found = HashSet::new();
        if depth >= MAX_SITEMAP_DEPTH {
            debug!(%domain, "sitemap recursion limit reached");
            return found;
        }

        let base = if domain.starts_with("http") {
            domain.clone()
        } else {
            format!("https://{domain}")
        };

        for path in SITEMAP_PATHS {
            let sitemap_url = format!("{base}{path}");

            let response = client
                .get(&sitemap_url)
                .timeout(Duration::from_secs(SITEMAP_TIMEOUT_SECS))
                .send()
                .await;
            let response = match response {
                Ok(r) if r.status().as_u16() == 200 => r,
                Ok(r) => {
                    debug!(%sitemap_url, status = r.status().as_u16(), "sitemap probe miss");
                    continue;
                }
                Err(err) => {
                    debug!(%sitemap_url, %err, "sitemap probe failed");
                    continue;
                }
            };

            let Ok(content) = response.text().await else {
                continue;
            };
            if !content.contains("<urlset") && !content.contains("<sitemapindex") {
                continue;
            }

            let parsed = parse_sitemap_xml(&content);
            if parsed.is_index {
                for loc in parsed.locations {
                    let Some(origin) = origin_of(&loc) else {
                        continue;
                    };
                    found.extend(harvest_at_depth(client, origin, depth + 1).await);
                }
            } else {
                found.extend(parsed.locations.into_iter().filter(|loc| is_valid(loc)));
            }
        }

        found
    }
    .boxed()
}

pub struct SitemapDocument {
    /// True for a `<sitemapindex>` of nested sitemaps, false for a `<urlset>`.
    pub is_index: bool,
    pub locations: Vec<String>,
}

/// Pull every `<loc>` out of a sitemap document. Malformed XML yields
/// whatever was readable up to the error.
pub fn parse_sitemap_xml(content: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut in_loc = false;
    let mut locations = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Ok(Event::Text(text)) if in_loc => {
                if let Ok(value) = text.unescape() {
                    let value = value.trim();
                    if !value.is_empty() {
                        locations.push(value.to_string());
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Eof) => break,
            Err(err) => {
                debug!(%err, "sitemap XML parse error");
                break;
            }
            _ => {}
        }
    }

    SitemapDocument {
        is_index,
        locations,
    }
}

/// `scheme://host[:port]` of a sitemap `<loc>`, which the harvester treats as
/// another domain to probe.
fn origin_of(loc: &str) -> Option<String> {
    if !loc.starts_with("http") {
        return None;
    }
    let parsed = Url::parse(loc).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlset_locations_are_collected() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>https://example.com/one</loc></url>
                <url><loc> https://example.com/two </loc></url>
            </urlset>"#;
        let doc = parse_sitemap_xml(xml);
        assert!(!doc.is_index);
        assert_eq!(
            doc.locations,
            vec!["https://example.com/one", "https://example.com/two"]
        );
    }

    #[test]
    fn sitemapindex_is_detected() {
        let xml = r#"<sitemapindex>
                <sitemap><loc>https://example.com/sitemap-news.xml</loc></sitemap>
            </sitemapindex>"#;
        let doc = parse_sitemap_xml(xml);
        assert!(doc.is_index);
        assert_eq!(doc.locations, vec!["https://example.com/sitemap-news.xml"]);
    }

    #[tokio::test]
    async fn harvest_collects_urlset_and_filters_assets() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "<urlset><url><loc>{0}/article</loc></url>\
             <url><loc>{0}/logo.png</loc></url></urlset>",
            server.url()
        );
        let _rest = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _sitemap = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let found = harvest(&client, &server.url()).await;
        assert_eq!(found.len(), 1);
        assert!(found.contains(&format!("{}/article", server.url())));
    }

    #[tokio::test]
    async fn harvest_expands_a_sitemap_index() {
        let mut server = mockito::Server::new_async().await;
        let index = format!(
            "<sitemapindex><sitemap><loc>{}/sitemap.xml</loc></sitemap></sitemapindex>",
            server.url()
        );
        let urlset = format!(
            "<urlset><url><loc>{}/from-child</loc></url></urlset>",
            server.url()
        );
        let _rest = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _index = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(200)
            .with_body(index)
            .create_async()
            .await;
        let _child = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(urlset)
            .expect_at_least(1)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let found = harvest(&client, &server.url()).await;
        assert!(found.contains(&format!("{}/from-child", server.url())));
    }
}
