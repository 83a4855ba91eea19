//! History persistence tests on a real file.

use super::{init_test_env, test_history_config};
use rappit_core::auth::AuthScheme;
use rappit_core::formatter::process;
use rappit_core::history::{HistoryConfig, HistoryFilter, HistoryStore, PendingEntry};
use rappit_core::models::{ExecutionOutcome, HttpMethod, OutcomeKind, RequestSpec};
use std::time::Duration;
use tempfile::TempDir;

fn success(body: &str) -> (ExecutionOutcome, Option<rappit_core::formatter::FormattedResponse>) {
    let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    let formatted = process(200, &headers, body.as_bytes());
    let outcome = ExecutionOutcome::Success {
        status_code: 200,
        reason: "OK".to_string(),
        final_url: "https://api.example.com/".to_string(),
        headers,
        body: body.as_bytes().to_vec(),
        elapsed: Duration::from_millis(42),
    };
    (outcome, Some(formatted))
}

fn pending(path: &str, body: &str) -> PendingEntry {
    let spec = RequestSpec::builder(HttpMethod::GET, format!("https://api.example.com{}", path))
        .auth(AuthScheme::Bearer {
            token: "s3cret".to_string(),
        })
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let (outcome, formatted) = success(body);
    PendingEntry::new(spec, outcome, formatted)
}

#[tokio::test]
async fn test_entries_survive_reopen_in_order() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("history.jsonl");

    {
        let store = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
        store.append(pending("/a", r#"{"a":1}"#)).await.unwrap();
        store.append(pending("/b", r#"{"b":2}"#)).await.unwrap();
    }

    let store = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    let entries = store.list(&HistoryFilter::new());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, 2);
    assert_eq!(entries[1].id, 1);
    assert_eq!(store.search("\"b\": 2").len(), 1);

    let next = store.append(pending("/c", "{}")).await.unwrap();
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn test_corrupted_line_is_skipped() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    {
        let store = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
        store.append(pending("/a", "{}")).await.unwrap();
    }
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str("{not json at all\n");
    std::fs::write(&path, contents).unwrap();

    let store = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    assert_eq!(store.len(), 1);

    store.append(pending("/b", "{}")).await.unwrap();
    let reopened = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    assert_eq!(reopened.len(), 2);
}

#[tokio::test]
async fn test_retention_cap_evicts_oldest() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    let config = HistoryConfig {
        max_entries: 3,
        redact_sensitive_headers: false,
        compaction_threshold: 2,
    };
    {
        let store = HistoryStore::open(&path, config.clone()).await.unwrap();
        for i in 0..5 {
            store.append(pending(&format!("/{}", i), "{}")).await.unwrap();
        }
        let ids: Vec<u64> = store.list(&HistoryFilter::new()).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    let store = HistoryStore::open(&path, config).await.unwrap();
    let ids: Vec<u64> = store.list(&HistoryFilter::new()).iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![5, 4, 3]);
}

#[tokio::test]
async fn test_redaction_hides_credentials_on_disk() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    let config = HistoryConfig {
        max_entries: 10,
        redact_sensitive_headers: true,
        compaction_threshold: 5,
    };
    let store = HistoryStore::open(&path, config).await.unwrap();
    store.append(pending("/secure", "{}")).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains("s3cret"));
    assert!(contents.contains("/secure"));
}

#[tokio::test]
async fn test_remove_and_clear() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    let store = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    store.append(pending("/a", "{}")).await.unwrap();
    store.append(pending("/b", "{}")).await.unwrap();

    assert!(store.remove(1).await.unwrap());
    assert!(!store.remove(1).await.unwrap());
    assert!(store.get(1).is_none());
    assert!(store.get(2).is_some());

    let reopened = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    assert_eq!(reopened.len(), 1);
    drop(reopened);

    store.clear().await.unwrap();
    assert!(store.is_empty());
    drop(store);

    let reopened = HistoryStore::open(&path, test_history_config(10)).await.unwrap();
    assert!(reopened.is_empty());
    let next = reopened.append(pending("/c", "{}")).await.unwrap();
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn test_filter_by_outcome() {
    init_test_env();
    let store = HistoryStore::in_memory(test_history_config(10));
    store.append(pending("/ok", "{}")).await.unwrap();

    let spec = RequestSpec::builder(HttpMethod::POST, "https://api.example.com/slow")
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    store
        .append(PendingEntry::new(
            spec,
            ExecutionOutcome::Timeout {
                elapsed: Duration::from_secs(1),
            },
            None,
        ))
        .await
        .unwrap();

    let timeouts = store.list(&HistoryFilter::new().outcome(OutcomeKind::Timeout));
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].request.method(), HttpMethod::POST);

    let gets = store.list(&HistoryFilter::new().method(HttpMethod::GET).status_code(200));
    assert_eq!(gets.len(), 1);
}
