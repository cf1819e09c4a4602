use tempfile::tempdir;

use webpatrol::types::PageExtract;
use webpatrol::PageStore;

fn extract(text: &str) -> PageExtract {
    PageExtract {
        title: "A Title".to_string(),
        text: text.to_string(),
        language: "en".to_string(),
        timestamp: "2026-08-01T00:00:00+00:00".to_string(),
    }
}

#[tokio::test]
async fn save_then_exists_round_trip() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("pages.db")).await.unwrap();

    assert!(!store.exists("https://example.com/a").await.unwrap());
    store
        .save("https://example.com/a", &extract("body text"))
        .await
        .unwrap();
    assert!(store.exists("https://example.com/a").await.unwrap());
    assert_eq!(store.page_count().await.unwrap(), 1);
}

#[tokio::test]
async fn long_content_is_truncated_to_five_thousand_chars() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("pages.db")).await.unwrap();

    let long_text = "x".repeat(6000);
    store
        .save("https://example.com/long", &extract(&long_text))
        .await
        .unwrap();

    let (_, content, _, _) = store
        .fetch("https://example.com/long")
        .await
        .unwrap()
        .expect("row present");
    assert_eq!(content.chars().count(), 5000);
}

#[tokio::test]
async fn resaving_replaces_the_row_and_resets_analyzed() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("pages.db")).await.unwrap();

    store
        .save("https://example.com/p", &extract("first version"))
        .await
        .unwrap();
    store
        .save("https://example.com/p", &extract("second version"))
        .await
        .unwrap();

    assert_eq!(store.page_count().await.unwrap(), 1);
    let (_, content, _, analyzed) = store
        .fetch("https://example.com/p")
        .await
        .unwrap()
        .expect("row present");
    assert_eq!(content, "second version");
    assert!(!analyzed);
}

#[tokio::test]
async fn concurrent_writers_do_not_conflict() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("pages.db")).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .save(
                    &format!("https://example.com/{i}"),
                    &extract(&format!("body {i}")),
                )
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.page_count().await.unwrap(), 16);
}
