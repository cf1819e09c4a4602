use url::Url;

use crate::core::config::SKIP_EXTENSIONS;

/// Canonicalize a URL to `scheme://host[:port]/path[?query]`.
///
/// The scheme defaults to `http` when missing, the host is lowercased with a
/// leading `www.` stripped, trailing slashes are removed from the path and the
/// fragment is dropped. The query string is preserved verbatim. Unparseable
/// input is returned trimmed, so the function never fails on garbage links.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim();

    let parsed = match Url::parse(trimmed) {
        Ok(u) => Some(u),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{trimmed}")).ok()
        }
        Err(_) => None,
    };

    let Some(parsed) = parsed else {
        return trimmed.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_string();
    };

    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    let netloc = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path = parsed.path().trim_end_matches('/');
    let query = match parsed.query() {
        Some(q) => format!("?{q}"),
        None => String::new(),
    };

    format!("{}://{}{}{}", parsed.scheme(), netloc, path, query)
}

/// Whether a discovered link is worth queueing at all.
///
/// Rejects empty strings, script/mail/tel pseudo-schemes, anything that is not
/// plain http(s), and URLs whose path ends in a binary or asset extension.
pub fn is_valid(link: &str) -> bool {
    if link.is_empty() {
        return false;
    }
    if link.starts_with("javascript:") || link.starts_with("mailto:") || link.starts_with("tel:") {
        return false;
    }
    if !(link.starts_with("http://") || link.starts_with("https://")) {
        return false;
    }

    match Url::parse(link) {
        Ok(parsed) => !SKIP_EXTENSIONS.is_match(parsed.path()),
        Err(_) => !SKIP_EXTENSIONS.is_match(link),
    }
}

/// Network location of a URL, used as the queue row's domain column.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_www_fragment_and_trailing_slash() {
        assert_eq!(
            normalize("https://www.Example.com/news/?id=3#frag"),
            "https://example.com/news?id=3"
        );
        assert_eq!(
            normalize("https://www.shiftdelete.net/"),
            "https://shiftdelete.net"
        );
    }

    #[test]
    fn normalize_defaults_scheme_to_http() {
        assert_eq!(normalize("example.com/page"), "http://example.com/page");
    }

    #[test]
    fn normalize_preserves_query_verbatim() {
        assert_eq!(
            normalize("http://example.com/search?q=a+b&x="),
            "http://example.com/search?q=a+b&x="
        );
    }

    #[test]
    fn normalize_keeps_explicit_port() {
        assert_eq!(normalize("http://example.com:8080/x/"), "http://example.com:8080/x");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in [
            "https://www.example.com/a/b/?q=1#top",
            "example.com",
            "http://Example.com:8080//",
            "not a url at all",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn is_valid_rejects_pseudo_schemes_and_assets() {
        assert!(!is_valid(""));
        assert!(!is_valid("javascript:void(0)"));
        assert!(!is_valid("mailto:a@b.c"));
        assert!(!is_valid("tel:+901234"));
        assert!(!is_valid("ftp://example.com/file"));
        assert!(!is_valid("https://example.com/logo.PNG"));
        assert!(!is_valid("https://example.com/app.js"));
        assert!(is_valid("https://example.com/article"));
        assert!(is_valid("http://example.com/page?view=full"));
    }

    #[test]
    fn asset_check_applies_to_the_path_not_the_query() {
        assert!(is_valid("https://example.com/view?file=report.pdf"));
        assert!(!is_valid("https://example.com/report.pdf"));
    }
}
