use std::sync::LazyLock;

use aho_corasick::AhoCorasick;

use crate::core::config::{JS_RENDER_THRESHOLD, MIN_CONTENT_LENGTH, SPAM_KEYWORDS};

static SPAM_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(SPAM_KEYWORDS).expect("spam keyword automaton builds")
});

/// Number of times any single spam keyword may appear before the page is
/// considered spam.
const SPAM_KEYWORD_LIMIT: usize = 5;

/// Link-farm heuristic: more than this many `http` or `www.` substrings.
const LINK_FARM_LIMIT: usize = 25;

/// Spam heuristic over extracted visible text.
///
/// Empty text is spam. A page is also spam when any configured keyword occurs
/// at least five times in the lowercased text, or when it reads like a link
/// farm (more than 25 `http` or `www.` occurrences).
pub fn is_spam(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }

    let lower = text.to_lowercase();

    let mut keyword_hits = vec![0usize; SPAM_KEYWORDS.len()];
    for m in SPAM_MATCHER.find_iter(&lower) {
        keyword_hits[m.pattern().as_usize()] += 1;
        if keyword_hits[m.pattern().as_usize()] >= SPAM_KEYWORD_LIMIT {
            return true;
        }
    }

    lower.matches("http").count() > LINK_FARM_LIMIT
        || lower.matches("www.").count() > LINK_FARM_LIMIT
}

/// What to do with a statically extracted page body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentGate {
    /// Enough static text to index as-is.
    Accept,
    /// Too little text on a script-heavy page; try the headless renderer.
    NeedsRender,
    /// Too little text and not script-heavy; not worth rendering.
    TooShort,
}

/// Minimum-content decision for a static extraction.
pub fn gate_content(text_len: usize, script_count: usize) -> ContentGate {
    if text_len >= MIN_CONTENT_LENGTH {
        ContentGate::Accept
    } else if script_count > JS_RENDER_THRESHOLD {
        ContentGate::NeedsRender
    } else {
        ContentGate::TooShort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_spam() {
        assert!(is_spam(""));
    }

    #[test]
    fn keyword_threshold_is_exactly_five() {
        let four = "casino ".repeat(4);
        let five = "casino ".repeat(5);
        assert!(!is_spam(&four));
        assert!(is_spam(&five));
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert!(is_spam(&"VIAGRA ".repeat(5)));
    }

    #[test]
    fn http_threshold_is_sharp_at_25() {
        let at_limit = "http ".repeat(25);
        let over_limit = "http ".repeat(26);
        assert!(!is_spam(&at_limit));
        assert!(is_spam(&over_limit));
    }

    #[test]
    fn www_threshold_is_sharp_at_25() {
        let at_limit = "www. ".repeat(25);
        let over_limit = "www. ".repeat(26);
        assert!(!is_spam(&at_limit));
        assert!(is_spam(&over_limit));
    }

    #[test]
    fn normal_prose_is_not_spam() {
        assert!(!is_spam(
            "A perfectly ordinary article about the history of typography."
        ));
    }

    #[test]
    fn gate_prefers_render_only_when_script_heavy() {
        assert_eq!(gate_content(200, 0), ContentGate::Accept);
        assert_eq!(gate_content(10, 5), ContentGate::NeedsRender);
        assert_eq!(gate_content(10, 3), ContentGate::TooShort);
    }
}
