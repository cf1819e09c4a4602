use proptest::prelude::*;

use webpatrol::urls::{is_valid, normalize};

proptest! {
    /// Canonicalization is a fixpoint: applying it twice changes nothing.
    #[test]
    fn normalize_is_idempotent_on_arbitrary_input(input in "\\PC{0,100}") {
        let once = normalize(&input);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_on_urlish_input(
        scheme in prop::sample::select(vec!["http", "https", ""]),
        www in prop::bool::ANY,
        host in "[a-z]{1,12}(\\.[a-z]{2,3}){1,2}",
        path in "(/[a-z0-9]{0,8}){0,4}/?",
        query in prop::option::of("[a-z]{1,5}=[a-z0-9]{0,5}"),
    ) {
        let mut url = String::new();
        if !scheme.is_empty() {
            url.push_str(scheme);
            url.push_str("://");
        }
        if www {
            url.push_str("www.");
        }
        url.push_str(&host);
        url.push_str(&path);
        if let Some(q) = &query {
            url.push('?');
            url.push_str(q);
        }

        let once = normalize(&url);
        prop_assert_eq!(normalize(&once), once.clone());

        // The canonical form never keeps a www prefix or a trailing slash.
        prop_assert!(!once.contains("://www."));
        prop_assert!(!once.ends_with('/') || once.ends_with("://"));
    }

    #[test]
    fn is_valid_never_panics(input in "\\PC{0,200}") {
        let _ = is_valid(&input);
    }

    #[test]
    fn valid_links_survive_normalization(
        host in "[a-z]{1,12}\\.[a-z]{2,3}",
        path in "(/[a-z0-9]{1,8}){0,3}",
    ) {
        let url = format!("https://{host}{path}");
        prop_assume!(is_valid(&url));
        prop_assert!(is_valid(&normalize(&url)));
    }
}
